//! Engine configuration
//!
//! - `EngineConfig`: sizing and initial state, fixed for an engine's lifetime
//! - Generic YAML config loading/saving
//! - Default config file location
//!
//! # Usage
//!
//! ```ignore
//! use lowlat_core::config::{default_config_path, load_config, EngineConfig};
//!
//! let config: EngineConfig = load_config(&default_config_path());
//! config.validate()?;
//! ```

mod engine;
mod io;
mod paths;

pub use engine::{EngineConfig, FilterConfig, ReverbConfig, DEFAULT_COMMAND_QUEUE_CAPACITY};
pub use io::{load_config, read_config, save_config};
pub use paths::{default_config_dir, default_config_path};
