//! Configuration paths
//!
//! Uses the directories crate for platform-appropriate locations:
//! - Linux: `~/.config/conformance-autopilot/`
//! - macOS: `~/Library/Application Support/conformance-autopilot/`
//! - Windows: `%APPDATA%\conformance-autopilot\`

use std::path::PathBuf;

/// Name used for the settings directory
const APP_NAME: &str = "conformance-autopilot";

/// Get the configuration directory path
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the settings file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.toml"))
}
