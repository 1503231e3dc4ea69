use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Source of a configuration value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    Default,
    File,
    Environment,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Default => write!(f, "default"),
            ConfigSource::File => write!(f, "file"),
            ConfigSource::Environment => write!(f, "environment"),
        }
    }
}

/// A configuration value with its source
#[derive(Debug, Clone, Serialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }
}

/// Application configuration with source tracking
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Path to the TOML file holding terms and taxonomies
    pub store_path: ConfigValue<PathBuf>,
    /// Database identity column carried in taxonomy updates
    pub id_column: ConfigValue<String>,
    /// Config file path used (if any)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file: Option<PathBuf>,
}

/// Internal struct for deserializing config file
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ConfigFile {
    store_path: Option<PathBuf>,
    id_column: Option<String>,
}

impl Config {
    /// Load configuration with priority: env vars > config file > defaults
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let default_store_path = Self::default_data_dir().join("terms.toml");

        let mut store_path = ConfigValue::new(default_store_path, ConfigSource::Default);
        let mut id_column =
            ConfigValue::new("term_taxonomy_id".to_string(), ConfigSource::Default);
        let mut config_file = None;

        let path = config_path.unwrap_or_else(Self::default_config_path);
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadError(path.clone(), e))?;
            let file_config: ConfigFile = serde_yaml::from_str(&contents)
                .map_err(|e| ConfigError::ParseError(path.clone(), e))?;

            config_file = Some(path.clone());

            if let Some(file_store_path) = file_config.store_path {
                // Relative paths are relative to the config file
                let resolved = if file_store_path.is_relative() {
                    path.parent()
                        .map(|p| p.join(&file_store_path))
                        .unwrap_or(file_store_path)
                } else {
                    file_store_path
                };
                store_path = ConfigValue::new(resolved, ConfigSource::File);
            }
            if let Some(column) = file_config.id_column {
                id_column = ConfigValue::new(column, ConfigSource::File);
            }
        }

        if let Ok(env_path) = std::env::var("TERMSTORE_STORE_PATH") {
            store_path = ConfigValue::new(PathBuf::from(env_path), ConfigSource::Environment);
        }
        if let Ok(column) = std::env::var("TERMSTORE_ID_COLUMN") {
            id_column = ConfigValue::new(column, ConfigSource::Environment);
        }

        Ok(Self {
            store_path,
            id_column,
            config_file,
        })
    }

    /// Default config directory (platform-specific):
    /// - Linux: ~/.config/termstore/
    /// - macOS: ~/Library/Application Support/termstore/
    /// - Windows: %APPDATA%/termstore/
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("termstore")
    }

    /// Default data directory (platform-specific):
    /// - Linux: ~/.local/share/termstore/
    /// - macOS: ~/Library/Application Support/termstore/
    /// - Windows: %APPDATA%/termstore/
    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("termstore")
    }

    /// Default config file path (platform-specific config dir + config.yaml)
    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join("config.yaml")
    }
}

#[derive(Debug)]
pub enum ConfigError {
    ReadError(PathBuf, std::io::Error),
    ParseError(PathBuf, serde_yaml::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
