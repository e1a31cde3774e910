//! Configuration system for Ordo.
//!
//! Resolution order: environment variables → config file → defaults.
//!
//! Config file location:
//!   1. $ORDO_CONFIG (explicit override)
//!   2. $XDG_CONFIG_HOME/ordo/config.toml
//!   3. ~/.config/ordo/config.toml

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::wire::DEFAULT_TOPIC;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OrdoConfig {
    pub node: NodeConfig,
    pub transport: TransportConfig,
    pub reorder: ReorderConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Names of the nodes the demo joins to the topic. The first one publishes.
    pub names: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Topic name. Hashed to a TopicId before use.
    pub topic: String,
    /// Upper bound on the random per-delivery delay, in milliseconds.
    /// 0 = deliver immediately (still unordered across tasks).
    pub max_jitter_ms: u64,
    /// Chance, in percent, that a delivery is sent twice. 0..=100.
    pub duplicate_percent: u8,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReorderConfig {
    /// Max units held out of order. 0 = unlimited.
    pub max_pending: usize,
}

// ── Defaults ──────────────────────────────────────────────────────────────────

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            names: vec!["a".to_string(), "b".to_string()],
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            topic: DEFAULT_TOPIC.to_string(),
            max_jitter_ms: 25,
            duplicate_percent: 0,
        }
    }
}

// ── Path helpers ──────────────────────────────────────────────────────────────

fn config_dir() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
        .join("ordo")
}

fn home_dir() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {0}: {1}")]
    ReadFailed(PathBuf, std::io::Error),
    #[error("failed to parse {0}: {1}")]
    ParseFailed(PathBuf, toml::de::Error),
    #[error("failed to write {0}: {1}")]
    WriteFailed(PathBuf, std::io::Error),
    #[error("failed to serialize: {0}")]
    SerializeFailed(toml::ser::Error),
    #[error("duplicate_percent must be 0..=100, got {0}")]
    DuplicatePercentOutOfRange(u8),
}

// ── Loading ───────────────────────────────────────────────────────────────────

impl OrdoConfig {
    /// Load config: env vars → file → defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::file_path();
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadFailed(path.clone(), e))?;
            Self::from_toml(&text).map_err(|e| ConfigError::ParseFailed(path.clone(), e))?
        } else {
            OrdoConfig::default()
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Parse config text. Missing sections and keys fall back to defaults.
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Config file path.
    pub fn file_path() -> PathBuf {
        std::env::var("ORDO_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("config.toml"))
    }

    /// Write default config if none exists. Returns the path.
    pub fn write_default_if_missing() -> Result<PathBuf, ConfigError> {
        let path = Self::file_path();
        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
            }
            let text = toml::to_string_pretty(&OrdoConfig::default())
                .map_err(ConfigError::SerializeFailed)?;
            std::fs::write(&path, text).map_err(|e| ConfigError::WriteFailed(path.clone(), e))?;
        }
        Ok(path)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.transport.duplicate_percent > 100 {
            return Err(ConfigError::DuplicatePercentOutOfRange(
                self.transport.duplicate_percent,
            ));
        }
        Ok(())
    }

    /// Apply ORDO_* env var overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("ORDO_NODE__NAMES") {
            let names: Vec<String> = v
                .split(',')
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(String::from)
                .collect();
            if !names.is_empty() {
                self.node.names = names;
            }
        }
        if let Ok(v) = std::env::var("ORDO_TRANSPORT__TOPIC") {
            self.transport.topic = v;
        }
        if let Ok(v) = std::env::var("ORDO_TRANSPORT__MAX_JITTER_MS") {
            if let Ok(ms) = v.parse() {
                self.transport.max_jitter_ms = ms;
            }
        }
        if let Ok(v) = std::env::var("ORDO_TRANSPORT__DUPLICATE_PERCENT") {
            if let Ok(p) = v.parse() {
                self.transport.duplicate_percent = p;
            }
        }
        if let Ok(v) = std::env::var("ORDO_REORDER__MAX_PENDING") {
            if let Ok(n) = v.parse() {
                self.reorder.max_pending = n;
            }
        }
    }
}
