//! Configuration loading and management.

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use tm_core::{
    DEFAULT_END_MARKER, DEFAULT_SERVICE_WIDTH, DEFAULT_START_MARKER, FormatOptions, Markers,
};

/// Log file read when no path is given on the command line.
pub const DEFAULT_LOG_PATH: &str = "logs.log";

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log file to analyze when no path argument is given.
    pub log_path: PathBuf,

    /// Substring that opens a turn.
    pub start_marker: String,

    /// Substring that closes a turn.
    pub end_marker: String,

    /// Column width for service ids in turn listings.
    pub service_width: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_path: PathBuf::from(DEFAULT_LOG_PATH),
            start_marker: DEFAULT_START_MARKER.to_string(),
            end_marker: DEFAULT_END_MARKER.to_string(),
            service_width: DEFAULT_SERVICE_WIDTH,
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Load from default config location
        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        // Load from specified config file
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Load from environment variables (TM_*)
        figment = figment.merge(Env::prefixed("TM_"));

        figment.extract()
    }

    /// Turn markers as passed to the segmenter.
    pub fn markers(&self) -> Markers {
        Markers {
            start: self.start_marker.clone(),
            end: self.end_marker.clone(),
        }
    }

    pub const fn format_options(&self) -> FormatOptions {
        FormatOptions {
            service_width: self.service_width,
        }
    }
}

/// Returns the platform-specific config directory for tm.
///
/// On Linux: `~/.config/tm`
pub fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("tm"))
}
