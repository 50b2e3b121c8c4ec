//! Utility modules

pub mod cmd;

pub use cmd::log_cmd;
