//! Configuration management for board-speaker-rs.
//!
//! Loads config from a YAML file in standard locations. Every section and
//! field is optional; missing values fall back to defaults.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::board::Dialect;
use crate::speech::relay::{DEFAULT_RELAY_HOST, DEFAULT_RELAY_PORT};
use crate::speech::DEFAULT_LOCALE;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    pub dialect: Dialect,
    pub poll_interval_ms: u64,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            dialect: Dialect::Jbbs,
            poll_interval_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// Voice to start with; empty keeps the engine's first voice.
    pub voice: String,
    pub rate: i32,
    pub volume: u8,
    pub locale: String,
    pub announce_number: bool,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            voice: String::new(),
            rate: 0,
            volume: 100,
            locale: DEFAULT_LOCALE.into(),
            announce_number: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub host: String,
    pub port: u16,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_RELAY_HOST.into(),
            port: DEFAULT_RELAY_PORT,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KokoroConfig {
    pub enabled: bool,
    pub model_path: String,
    pub voices_path: String,
    pub tokenizer_path: String,
}

impl Default for KokoroConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model_path: String::new(),
            voices_path: String::new(),
            tokenizer_path: String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: 8768,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub enabled: bool,
    /// Skip posts already spoken in an earlier run on the same thread.
    pub resume: bool,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            resume: true,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub board: BoardConfig,
    pub speech: SpeechConfig,
    pub relay: RelayConfig,
    pub kokoro: KokoroConfig,
    pub api: ApiConfig,
    pub history: HistoryConfig,
}

impl Config {
    /// Load configuration from YAML file.
    ///
    /// Searches standard locations if no path is provided:
    /// 1. ./board-speaker.yaml
    /// 2. ~/.config/board-speaker/config.yaml
    /// 3. /etc/board-speaker/config.yaml
    pub fn load(path: Option<&Path>) -> Self {
        let resolved = path.map(PathBuf::from).or_else(|| {
            let candidates = [
                std::env::current_dir().ok().map(|d| d.join("board-speaker.yaml")),
                dirs::home_dir().map(|h| h.join(".config/board-speaker/config.yaml")),
                Some(PathBuf::from("/etc/board-speaker/config.yaml")),
            ];
            candidates.into_iter().flatten().find(|p| p.exists())
        });

        let Some(config_path) = resolved else {
            info!("No config file found, using defaults");
            return Self::default();
        };

        match std::fs::read_to_string(&config_path) {
            Ok(contents) => match Self::from_yaml(&contents) {
                Ok(config) => {
                    info!("Loaded config from {}", config_path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {e}, using defaults", config_path.display());
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read {}: {e}, using defaults", config_path.display());
                Self::default()
            }
        }
    }

    pub fn from_yaml(contents: &str) -> Result<Self, serde_yml::Error> {
        serde_yml::from_str(contents)
    }
}
