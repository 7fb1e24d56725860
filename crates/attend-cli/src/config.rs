//! Configuration loading and management.

use std::path::{Path, PathBuf};

use attend_core::{DecisionPolicy, PresencePercent, ValidationError};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

use crate::server::ServerConfig;

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Path to the database file.
    pub database_path: PathBuf,
    /// Address the HTTP server binds to.
    pub host: String,
    pub port: u16,
    /// Repeat scans closer than this to the last action are ignored.
    pub debounce_window_secs: u32,
    /// Minimum stay before a scan counts as a checkout.
    pub min_checkout_secs: u32,
    /// Presence percent for events created without one.
    pub default_presence_percent: f64,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            database_path: data_dir.join("attend.db"),
            host: "0.0.0.0".to_string(),
            port: 3001,
            debounce_window_secs: 10,
            min_checkout_secs: 60,
            default_presence_percent: PresencePercent::DEFAULT.value(),
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    ///
    /// Later sources win: defaults, `~/.config/attend/config.toml`, the
    /// given file, then `ATTEND_*` environment variables.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        figment = figment.merge(Env::prefixed("ATTEND_"));

        figment.extract()
    }

    pub fn policy(&self) -> DecisionPolicy {
        DecisionPolicy::from_secs(self.debounce_window_secs, self.min_checkout_secs)
    }

    pub fn presence_percent(&self) -> Result<PresencePercent, ValidationError> {
        PresencePercent::new(self.default_presence_percent)
    }

    pub fn server(&self) -> ServerConfig {
        ServerConfig {
            host: self.host.clone(),
            port: self.port,
        }
    }
}

/// Returns the platform-specific config directory for attend.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("attend"))
}

/// Returns the platform-specific data directory for attend.
///
/// On Linux: `~/.local/share/attend`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("attend"))
}
