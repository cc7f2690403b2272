//! Path utilities for lowlat configuration files

use std::path::PathBuf;

/// Config file name inside the config directory
const CONFIG_FILE_NAME: &str = "engine.yaml";

/// Get the default configuration directory
///
/// Returns: `<platform config dir>/lowlat` (e.g. `~/.config/lowlat` on Linux)
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("lowlat")
}

/// Get the default engine config file path
///
/// Returns: `<platform config dir>/lowlat/engine.yaml`
pub fn default_config_path() -> PathBuf {
    default_config_dir().join(CONFIG_FILE_NAME)
}
