/// Configuration management
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub type ConfigResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Environment variables with this prefix override file values,
/// e.g. `HUSHPLAY__SPOTIFY__CLIENT_ID`
const ENV_PREFIX: &str = "HUSHPLAY";

/// Bounds for the audio monitor period
const MIN_POLL_INTERVAL_MS: u64 = 500;
const MAX_POLL_INTERVAL_MS: u64 = 2000;
const MIN_PRESENTER_INTERVAL_MS: u64 = 1000;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub spotify: SpotifyConfig,
    pub monitor: MonitorConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Directory for the settings store (tokens, selection, policy)
    pub data_dir: Option<String>,
    /// Log level (error, warn, info, debug, trace)
    pub log_level: String,
}

/// Spotify application registration and endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpotifyConfig {
    /// Spotify Client ID (OAuth application)
    pub client_id: String,
    /// Spotify Client Secret (OAuth application)
    pub client_secret: Option<String>,
    /// Redirect URI for OAuth flow, must be registered with the application
    pub redirect_uri: String,
    pub api_base_url: String,
    pub accounts_base_url: String,
}

/// Audio monitor and now-playing poll settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub poll_interval_ms: u64,
    pub presenter_interval_ms: u64,
    /// Audio surfaces whose origin contains one of these belong to Spotify itself
    pub target_patterns: Vec<String>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            log_level: "info".to_string(),
        }
    }
}

impl Default for SpotifyConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: None,
            redirect_uri: "http://127.0.0.1:8989/callback".to_string(),
            api_base_url: "https://api.spotify.com/v1".to_string(),
            accounts_base_url: "https://accounts.spotify.com".to_string(),
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            presenter_interval_ms: 5000,
            target_patterns: vec![
                "spotify.com".to_string(),
                "org.mpris.MediaPlayer2.spotify".to_string(),
            ],
        }
    }
}

impl MonitorConfig {
    /// Monitor period, clamped to 0.5s..=2s
    pub fn poll_interval(&self) -> Duration {
        let clamped = self
            .poll_interval_ms
            .clamp(MIN_POLL_INTERVAL_MS, MAX_POLL_INTERVAL_MS);
        if clamped != self.poll_interval_ms {
            tracing::warn!(
                "monitor.poll_interval_ms={} is out of range, using {}",
                self.poll_interval_ms,
                clamped
            );
        }
        Duration::from_millis(clamped)
    }

    pub fn presenter_interval(&self) -> Duration {
        Duration::from_millis(self.presenter_interval_ms.max(MIN_PRESENTER_INTERVAL_MS))
    }
}

impl Config {
    /// Load configuration from the default location, creating it on first run
    pub fn load() -> ConfigResult<Self> {
        let config_path = Self::config_dir()?.join("config.toml");

        if !config_path.exists() {
            if let Some(dir) = config_path.parent() {
                std::fs::create_dir_all(dir)?;
            }
            let content = toml::to_string_pretty(&Self::default())?;
            std::fs::write(&config_path, content)?;
            tracing::info!("Wrote default configuration to {:?}", config_path);
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific file layered under environment overrides
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Save configuration to file
    pub fn save_to(&self, path: &Path) -> ConfigResult<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get configuration directory path
    pub fn config_dir() -> ConfigResult<PathBuf> {
        let dir = dirs::config_dir()
            .ok_or("Unable to determine config directory")?
            .join("hushplay");
        Ok(dir)
    }

    /// Get the settings store directory
    pub fn data_dir(&self) -> ConfigResult<PathBuf> {
        if let Some(ref custom_dir) = self.general.data_dir {
            Ok(PathBuf::from(custom_dir))
        } else {
            let dir = dirs::data_dir()
                .ok_or("Unable to determine data directory")?
                .join("hushplay");
            Ok(dir)
        }
    }
}
