use ndarray::ArrayViewMut3;

/// Raw pixels of one decoded frame: tightly packed, row-major, interleaved channels.
///
/// Not `Clone`: a frame buffer is moved from the source through the queue
/// into exactly one writer.
#[derive(Debug)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
    index: u64,
}

impl Frame {
    /// `index` is the source's own decode counter, not the pipeline sequence.
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8, index: u64) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * (channels as usize),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            channels,
            index,
        }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    /// Mutable `[row, col, channel]` view, for sources that paint in place.
    pub fn pixels_mut(&mut self) -> ArrayViewMut3<'_, u8> {
        let dims = (
            self.height as usize,
            self.width as usize,
            self.channels as usize,
        );
        ArrayViewMut3::from_shape(dims, &mut self.data)
            .expect("Frame data length must match dimensions")
    }
}
