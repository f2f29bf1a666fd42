use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, TryRecvError, TrySendError};

use crate::shared::frame_record::FrameRecord;

/// Queue between the ingestion thread and the writer pool.
pub type BoundedFrameQueue = BoundedQueue<FrameRecord>;

/// Fixed-capacity FIFO that sheds load at the producer.
///
/// `offer` never blocks: when the queue is full the item is handed back to
/// the caller as rejected. Consumers wait in `take` for at most the given
/// timeout so they can re-check their stop condition.
pub struct BoundedQueue<T> {
    tx: Sender<T>,
    rx: Receiver<T>,
    capacity: usize,
}

impl<T> BoundedQueue<T> {
    /// A zero capacity is raised to one; a rendezvous queue would reject
    /// every offer made while no writer happens to be waiting.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        Self { tx, rx, capacity }
    }

    /// Enqueues `item` unless the queue is full. Returns false when rejected.
    pub fn offer(&self, item: T) -> bool {
        match self.tx.try_send(item) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Removes the oldest item, waiting up to `timeout` for one to arrive.
    pub fn take(&self, timeout: Duration) -> Option<T> {
        self.rx.recv_timeout(timeout).ok()
    }

    pub fn size(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Discards everything queued and returns how many items were dropped.
    pub fn clear(&self) -> usize {
        let mut cleared = 0;
        loop {
            match self.rx.try_recv() {
                Ok(_) => cleared += 1,
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return cleared,
            }
        }
    }
}
