//! Configuration management for the observer daemon.
//!
//! Loads configuration from TOML files and provides runtime defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{info, warn};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub debounce: DebounceConfig,

    #[serde(default)]
    pub offers: OfferPolicyConfig,

    #[serde(default)]
    pub timeouts: TimeoutConfig,

    #[serde(default)]
    pub persistence: PersistenceConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            debounce: DebounceConfig::default(),
            offers: OfferPolicyConfig::default(),
            timeouts: TimeoutConfig::default(),
            persistence: PersistenceConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Whether the observer is enabled
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebounceConfig {
    /// Coalescing delay for content-changed signals
    #[serde(default = "default_coalesce_ms")]
    pub coalesce_ms: u64,

    /// Maximum time between processed snapshots before the delay is
    /// bypassed (starvation guard)
    #[serde(default = "default_max_staleness_ms")]
    pub max_staleness_ms: u64,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            coalesce_ms: 80,
            max_staleness_ms: 1500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfferPolicyConfig {
    /// Minimum acceptable pay per mile, in dollars
    #[serde(default = "default_min_per_mile")]
    pub min_dollars_per_mile: f64,

    /// Minimum acceptable projected pay per hour, in dollars
    #[serde(default = "default_min_per_hour")]
    pub min_dollars_per_hour: f64,

    /// Flat pay that accepts an offer regardless of rates
    #[serde(default = "default_auto_accept_pay")]
    pub auto_accept_pay: f64,
}

impl Default for OfferPolicyConfig {
    fn default() -> Self {
        Self {
            min_dollars_per_mile: 1.5,
            min_dollars_per_hour: 18.0,
            auto_accept_pay: 12.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Safety timeout while the dash is paused; expiry forces IdleOffline
    #[serde(default = "default_pause_safety_ms")]
    pub pause_safety_ms: u64,

    /// How long an offer may stay on screen before it is presumed expired
    #[serde(default = "default_offer_expiry_ms")]
    pub offer_expiry_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            pause_safety_ms: 5 * 60 * 1000,
            offer_expiry_ms: 60 * 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Path to the SQLite event database; default under the data dir
    #[serde(default)]
    pub db_path: Option<PathBuf>,

    /// Path to the persisted session-state snapshot
    #[serde(default)]
    pub state_path: Option<PathBuf>,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            state_path: None,
        }
    }
}

impl PersistenceConfig {
    /// Resolved database path
    pub fn db_path(&self) -> PathBuf {
        self.db_path.clone().unwrap_or_else(|| {
            data_dir().join("events.db")
        })
    }

    /// Resolved session-state snapshot path
    pub fn state_path(&self) -> PathBuf {
        self.state_path.clone().unwrap_or_else(|| {
            data_dir().join("session-state.json")
        })
    }
}

fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("dash-observer")
}

// Default value functions for serde
fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_coalesce_ms() -> u64 {
    80
}

fn default_max_staleness_ms() -> u64 {
    1500
}

fn default_min_per_mile() -> f64 {
    1.5
}

fn default_min_per_hour() -> f64 {
    18.0
}

fn default_auto_accept_pay() -> f64 {
    12.0
}

fn default_pause_safety_ms() -> u64 {
    5 * 60 * 1000
}

fn default_offer_expiry_ms() -> u64 {
    60 * 1000
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Self {
        Self::load_from_path(Self::default_config_path())
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: PathBuf) -> Self {
        match std::fs::read_to_string(&path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => {
                    info!("Loaded configuration from {:?}", path);
                    config
                }
                Err(e) => {
                    warn!("Failed to parse config file: {}, using defaults", e);
                    Self::default()
                }
            },
            Err(_) => {
                info!("No config file found at {:?}, using defaults", path);
                Self::default()
            }
        }
    }

    /// Get the default configuration file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("dash-observer")
            .join("config.toml")
    }

    /// Save configuration to the default path
    pub fn save(&self) -> std::io::Result<()> {
        self.save_to_path(Self::default_config_path())
    }

    /// Save configuration to a specific path
    pub fn save_to_path(&self, path: PathBuf) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;

        std::fs::write(&path, contents)?;
        info!("Saved configuration to {:?}", path);
        Ok(())
    }
}
