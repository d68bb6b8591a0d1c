//! Configuration for tilemux.
//!
//! The configuration file is located at `~/.tilemux/config.toml`:
//!
//! ```toml
//! # Shell to run in every pane (default: $SHELL, then /bin/sh)
//! shell = "/bin/bash"
//!
//! # Initial tiling: single, quad, columns, rows
//! layout = "quad"
//!
//! # Pane count for the columns/rows layouts
//! panes = 2
//!
//! # Prefix key for pane commands (Ctrl + letter)
//! prefix_key = "b"
//!
//! # Log filter for ~/.tilemux/tilemux.log (TILEMUX_LOG overrides)
//! log_level = "info"
//! ```

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::pty::default_shell;
use crate::ui::PrefixKey;
use crate::wm::LayoutKind;

/// Main configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Shell command for every pane
    pub shell: Option<String>,
    /// Initial tiling
    pub layout: LayoutKind,
    /// Pane count for the columns/rows layouts
    pub panes: u16,
    /// Prefix key name
    pub prefix_key: String,
    /// Log filter directive
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            shell: None,
            layout: LayoutKind::Quad,
            panes: 2,
            prefix_key: "b".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from file, falling back to defaults
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }

        match fs::read_to_string(&path) {
            Ok(content) => Self::parse(&content).unwrap_or_else(|e| {
                warn!("Ignoring invalid config {}: {}", path.display(), e);
                Self::default()
            }),
            Err(e) => {
                warn!("Failed to read config {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Directory holding the config file and log
    pub fn dir() -> Option<PathBuf> {
        home_dir().map(|home| home.join(".tilemux"))
    }

    fn config_path() -> Option<PathBuf> {
        Self::dir().map(|dir| dir.join("config.toml"))
    }

    /// Shell to spawn: config, then `$SHELL`, then `/bin/sh`
    pub fn shell(&self) -> String {
        self.shell
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(default_shell)
    }

    /// Parsed prefix key, Ctrl+B when the name is not understood
    pub fn prefix(&self) -> PrefixKey {
        PrefixKey::parse(&self.prefix_key).unwrap_or_else(|| {
            warn!("Unknown prefix key {:?}, using Ctrl+B", self.prefix_key);
            PrefixKey::default()
        })
    }
}

/// Get home directory
fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
}
