//! The Formline notification settings service.

pub mod config;
pub mod controller;

pub use config::{FormlineConfig, find_config_file};
pub use controller::{Formline, SHUTDOWN_BROADCAST};
