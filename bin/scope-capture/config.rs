use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    pub scope: ScopeConfig,
    pub capture: CaptureConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ScopeConfig {
    pub address: Option<String>,
    pub port: u16,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CaptureConfig {
    pub outfile: Option<String>,
    pub channels: String,
    pub trigger: Option<String>,
    pub format: String,
    pub compression: Option<u32>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            scope: ScopeConfig::default(),
            capture: CaptureConfig::default(),
        }
    }
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            address: None,
            port: 5555,
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            outfile: None,
            channels: "1234".to_string(),
            trigger: None,
            format: "byte".to_string(),
            compression: None,
        }
    }
}

/// Load configuration from file with layered fallbacks
pub fn load_config(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder().add_source(Config::try_from(&AppConfig::default())?);

    if let Some(path) = config_path {
        if path.exists() {
            builder = builder.add_source(File::from(path));
        } else {
            return Err(ConfigError::Message(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
    } else if Path::new("scope_capture.toml").exists() {
        builder = builder.add_source(File::with_name("scope_capture.toml"));
    }

    // Add environment variable overrides with prefix "SCOPE_CAPTURE_"
    builder = builder.add_source(
        Environment::with_prefix("SCOPE_CAPTURE")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    config.try_deserialize::<AppConfig>()
}

/// Load configuration with better error handling and defaults
pub fn load_config_or_default(config_path: Option<&Path>) -> AppConfig {
    match load_config(config_path) {
        Ok(config) => {
            log::debug!("Configuration loaded successfully");
            config
        }
        Err(e) => {
            log::warn!("Failed to load config ({}), using defaults", e);
            AppConfig::default()
        }
    }
}
