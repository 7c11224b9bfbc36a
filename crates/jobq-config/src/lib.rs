//! Layered configuration for jobq.
//!
//! Tunables resolve with a fixed precedence: values persisted by
//! `jobq config set` in a JSON file, then environment variables, then
//! built-in defaults.

pub mod error;
pub mod settings;

pub use error::{ConfigError, ConfigResult};
pub use settings::{ConfigProvider, KEYS, Settings};
