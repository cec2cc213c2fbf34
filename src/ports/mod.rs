//! Port traits (interfaces) for external dependencies.

pub mod config_port;
pub mod data_port;
pub mod indicator_port;
pub mod report_port;
