pub mod constants;
pub mod error_event;
pub mod frame;
pub mod frame_record;
pub mod hardware_time;
