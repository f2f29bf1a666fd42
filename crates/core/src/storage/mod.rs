pub mod frame_file_name;
pub mod frame_file_writer;
pub mod latency_report;
