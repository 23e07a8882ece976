//! Configuration module - environment variable parsing

pub mod settings;

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

pub use settings::{
    GameSettings, MovementSettings, NetSettings, PickupSpawn, PlayerSettings, WeaponSettings,
};

/// Process configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Emit JSON log lines instead of the compact format
    pub log_json: bool,
    /// Authority simulation rate in ticks per second
    pub tick_rate: u32,
    /// Optional TOML file with gameplay tuning
    pub settings_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // PORT wins over SERVER_ADDR so hosted deployments work unchanged
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string())
        };

        let tick_rate = match env::var("TICK_RATE") {
            Ok(raw) => raw
                .parse::<u32>()
                .ok()
                .filter(|rate| (1..=240).contains(rate))
                .ok_or(ConfigError::InvalidTickRate(raw))?,
            Err(_) => crate::util::time::SIMULATION_TPS,
        };

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_json: matches!(env::var("LOG_FORMAT").as_deref(), Ok("json")),
            tick_rate,
            settings_path: env::var("SETTINGS_PATH").ok().map(PathBuf::from),
        })
    }

    /// Gameplay tuning: the settings file when configured, defaults otherwise
    pub fn game_settings(&self) -> Result<GameSettings, ConfigError> {
        match &self.settings_path {
            Some(path) => GameSettings::from_file(path),
            None => Ok(GameSettings::with_default_layout()),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid server address format")]
    InvalidAddress,

    #[error("Invalid TICK_RATE {0:?}, expected 1..=240")]
    InvalidTickRate(String),

    #[error("Failed to read settings file {path}: {source}")]
    SettingsRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed settings: {0}")]
    SettingsParse(#[from] toml::de::Error),

    #[error("Invalid setting: {0}")]
    InvalidSetting(&'static str),
}
