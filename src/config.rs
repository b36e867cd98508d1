//! Configuration management for redeem-tts.
//!
//! Loads config from YAML files in standard locations. Every section falls
//! back to its defaults, so a partial file is fine.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::ConfigError;
use crate::pipeline::numbers::Language;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TtsConfig {
    /// Reward title whose redemptions are spoken.
    pub reward_name: String,
    /// Max sample-library references per message.
    pub sound_cap: usize,
    /// Ceiling on repetitions of one effect id within a segment.
    pub max_effect_repetitions: Option<u32>,
    pub endpoint: String,
    pub language: Language,
    pub request_timeout_secs: u64,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            reward_name: "TTS".into(),
            sound_cap: 3,
            max_effect_repetitions: Some(3),
            endpoint: "http://localhost:5002/api/tts".into(),
            language: Language::Polish,
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub sounds_dir: PathBuf,
    pub tmp_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            sounds_dir: PathBuf::from("sounds"),
            tmp_dir: PathBuf::from("tmp"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    pub sample_rate: u32,
    pub channels: u16,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            sample_rate: 22050,
            channels: 1,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub poll_interval_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            initial_backoff_ms: 500,
            max_backoff_ms: 30_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    pub enabled: bool,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    pub accept_whispers: bool,
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
            enabled: true,
            port: 8768,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tts: TtsConfig,
    pub paths: PathsConfig,
    pub library: LibraryConfig,
    pub queue: QueueConfig,
    pub supervisor: SupervisorConfig,
    pub playback: PlaybackConfig,
    pub events: EventsConfig,
    pub api: ApiConfig,
}

impl Config {
    /// Load configuration, falling back to defaults when no file is usable.
    ///
    /// An explicit `path` wins; otherwise the first existing file of
    /// `./config.yaml`, `~/.config/redeem-tts/config.yaml` and
    /// `/etc/redeem-tts/config.yaml` is used.
    pub fn load(path: Option<&Path>) -> Self {
        let Some(config_path) = path.map(PathBuf::from).or_else(Self::discover) else {
            info!("No config file found, using defaults");
            return Self::default();
        };

        match Self::from_file(&config_path) {
            Ok(config) => {
                info!("Loaded config from {}", config_path.display());
                config
            }
            Err(e) => {
                warn!("{e}, using defaults");
                Self::default()
            }
        }
    }

    fn discover() -> Option<PathBuf> {
        [
            std::env::current_dir().ok().map(|d| d.join("config.yaml")),
            dirs::home_dir().map(|h| h.join(".config/redeem-tts/config.yaml")),
            Some(PathBuf::from("/etc/redeem-tts/config.yaml")),
        ]
        .into_iter()
        .flatten()
        .find(|p| p.exists())
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(contents: &str) -> Result<Self, serde_yml::Error> {
        serde_yml::from_str(contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let config = Config::parse("tts:\n  sound_cap: 1\n  language: en\n").unwrap();
        assert_eq!(config.tts.sound_cap, 1);
        assert_eq!(config.tts.language, Language::English);
        assert_eq!(config.tts.reward_name, "TTS");
        assert_eq!(config.paths.tmp_dir, PathBuf::from("tmp"));
        assert_eq!(config.queue.poll_interval_ms, 1000);
    }

    #[test]
    fn null_ceiling_disables_clamping() {
        let config = Config::parse("tts:\n  max_effect_repetitions: null\n").unwrap();
        assert_eq!(config.tts.max_effect_repetitions, None);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = Config::load(Some(&dir.path().join("absent.yaml")));
        assert_eq!(config.api.port, 8768);
        assert!(config.playback.enabled);
    }

    #[test]
    fn broken_yaml_reports_the_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "tts: [unclosed\n").unwrap();

        let err = Config::from_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("config.yaml"));
        assert_eq!(Config::load(Some(&path)).tts.sound_cap, 3);
    }
}
