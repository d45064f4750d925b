//! # Configuration Module
//!
//! Typed relay configuration and JSON persistence of the connection settings.

pub mod config;
pub mod store;

pub use config::{
    ConnectionSettings, DEFAULT_CONFIG_FILE, DEFAULT_FPS, DEFAULT_HEIGHT, DEFAULT_IP,
    DEFAULT_PORT, DEFAULT_PULL_TIMEOUT, DEFAULT_WIDTH, FormInput, FrameParams, MAX_PULL_TIMEOUT,
    RelayConfig, check_pull_timeout, parse_duration,
};
pub use store::{ConfigStore, StoredSettings};
