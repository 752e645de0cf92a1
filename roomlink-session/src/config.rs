//! Session Configuration
//!
//! Configuration surface for the coordination core: slot count, dispatch
//! rate ceilings, queue depth, staleness window and the presenter request
//! TTL. All options carry defaults so an empty file is a valid config.

use crate::{Result, SessionError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Session configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SessionConfig {
    /// Render slot configuration
    #[serde(default)]
    pub slots: SlotConfig,

    /// Frame dispatch configuration
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Presenter arbitration configuration
    #[serde(default)]
    pub presenter: PresenterConfig,
}

/// Render slot configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotConfig {
    /// Total number of render slots, including the reserved local slot 0
    #[serde(default = "default_slot_count")]
    pub count: usize,
}

/// Frame dispatch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Minimum spacing between any two dispatched frames, in milliseconds
    #[serde(default = "default_global_min_interval_ms")]
    pub global_min_interval_ms: u64,

    /// Minimum spacing between two dispatches for the same key, in milliseconds
    #[serde(default = "default_per_key_min_interval_ms")]
    pub per_key_min_interval_ms: u64,

    /// Drop-oldest queue depth per key
    #[serde(default = "default_queue_capacity_per_key")]
    pub queue_capacity_per_key: usize,

    /// Frames older than this at dispatch time are discarded, in milliseconds
    #[serde(default = "default_max_frame_age_ms")]
    pub max_frame_age_ms: u64,
}

/// Presenter arbitration configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresenterConfig {
    /// How long a presenter request may stay pending before it times out,
    /// in seconds
    #[serde(default = "default_request_ttl_secs")]
    pub request_ttl_secs: u64,
}

fn default_slot_count() -> usize {
    4
}

fn default_global_min_interval_ms() -> u64 {
    // ~15 fps aggregate across all keys
    66
}

fn default_per_key_min_interval_ms() -> u64 {
    // ~20 fps ceiling per key
    50
}

fn default_queue_capacity_per_key() -> usize {
    2
}

fn default_max_frame_age_ms() -> u64 {
    500
}

fn default_request_ttl_secs() -> u64 {
    10
}

impl Default for SlotConfig {
    fn default() -> Self {
        Self {
            count: default_slot_count(),
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            global_min_interval_ms: default_global_min_interval_ms(),
            per_key_min_interval_ms: default_per_key_min_interval_ms(),
            queue_capacity_per_key: default_queue_capacity_per_key(),
            max_frame_age_ms: default_max_frame_age_ms(),
        }
    }
}

impl Default for PresenterConfig {
    fn default() -> Self {
        Self {
            request_ttl_secs: default_request_ttl_secs(),
        }
    }
}

impl DispatchConfig {
    /// Global minimum dispatch interval as a Duration
    pub fn global_min_interval(&self) -> Duration {
        Duration::from_millis(self.global_min_interval_ms)
    }

    /// Per-key minimum dispatch interval as a Duration
    pub fn per_key_min_interval(&self) -> Duration {
        Duration::from_millis(self.per_key_min_interval_ms)
    }

    /// Staleness window as a Duration
    pub fn max_frame_age(&self) -> Duration {
        Duration::from_millis(self.max_frame_age_ms)
    }
}

impl PresenterConfig {
    /// Presenter request TTL as a Duration
    pub fn request_ttl(&self) -> Duration {
        Duration::from_secs(self.request_ttl_secs)
    }
}

impl SessionConfig {
    /// Default configuration file path
    /// (`$XDG_CONFIG_HOME/roomlink/session.toml`)
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join("roomlink")
            .join("session.toml")
    }

    /// Load configuration from the default path, creating a default file
    /// if none exists
    pub fn load() -> Result<Self> {
        Self::load_from(Self::default_path())
    }

    /// Load configuration from a specific path
    pub fn load_from(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if path.exists() {
            let contents = fs::read_to_string(&path)?;
            let config: SessionConfig = toml::from_str(&contents)?;
            config.validate()?;
            Ok(config)
        } else {
            let config = SessionConfig::default();
            config.save_to(&path)?;
            Ok(config)
        }
    }

    /// Save configuration to a specific path
    pub fn save_to(&self, path: impl Into<PathBuf>) -> Result<()> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        fs::write(&path, contents)?;
        Ok(())
    }

    /// Check configuration values for internal consistency
    pub fn validate(&self) -> Result<()> {
        if self.slots.count < 2 {
            return Err(SessionError::invalid_configuration(
                "slot count must be at least 2 (local slot plus one remote)",
            ));
        }
        if self.dispatch.queue_capacity_per_key == 0 {
            return Err(SessionError::invalid_configuration(
                "queue capacity per key must be at least 1",
            ));
        }
        if self.dispatch.global_min_interval_ms == 0 {
            return Err(SessionError::invalid_configuration(
                "global minimum interval must be non-zero",
            ));
        }
        if self.presenter.request_ttl_secs == 0 {
            return Err(SessionError::invalid_configuration(
                "presenter request TTL must be non-zero",
            ));
        }
        Ok(())
    }
}
