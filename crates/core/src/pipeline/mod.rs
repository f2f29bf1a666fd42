pub mod bounded_queue;
pub mod capture_config;
pub mod capture_session;
pub mod error_channel;
mod infrastructure;
pub mod run_state;
mod shared_state;
pub mod statistics;
