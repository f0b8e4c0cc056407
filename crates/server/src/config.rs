use serde::Deserialize;
use splitbill_ocr::ParserConfig;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CONFIG_PATH_VAR: &str = "SPLITBILL_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "splitbill.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("Failed to parse TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Invalid value for {var}: '{value}'")]
    InvalidOverride { var: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Bunyan,
}

impl std::str::FromStr for LogFormat {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "bunyan" | "json" => Ok(LogFormat::Bunyan),
            other => Err(format!("Unknown log format: '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct OcrSettings {
    /// When false the server never tries to build an OCR backend.
    pub enabled: bool,
    /// Tesseract language pack.
    pub language: String,
    /// Directory holding `tessdata`; system default when unset.
    pub data_path: Option<String>,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self { enabled: true, language: "vie".to_string(), data_path: None }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub database_path: PathBuf,
    /// Uploaded receipt images live under `<data_dir>/attachments`.
    pub data_dir: PathBuf,
    /// Upper bound on request bodies; base64 photos are large.
    pub max_body_bytes: usize,
    pub log_format: LogFormat,
    pub ocr: OcrSettings,
    pub parser: ParserConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8000".to_string(),
            database_path: PathBuf::from("splitbill.db"),
            data_dir: PathBuf::from("data"),
            max_body_bytes: 15 * 1024 * 1024,
            log_format: LogFormat::Pretty,
            ocr: OcrSettings::default(),
            parser: ParserConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Read the TOML file named by `SPLITBILL_CONFIG` (or `splitbill.toml`,
    /// if present) and apply environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let explicit = std::env::var(CONFIG_PATH_VAR).ok();
        let path = PathBuf::from(explicit.as_deref().unwrap_or(DEFAULT_CONFIG_PATH));

        let config = if explicit.is_some() || path.exists() {
            Self::from_file(&path)?
        } else {
            Self::default()
        };
        config.with_overrides(|var| std::env::var(var).ok())
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(toml_content: &str) -> Result<Self, ConfigError> {
        let mut config: ServerConfig = toml::from_str(toml_content)?;
        config.parser = config.parser.normalized();
        Ok(config)
    }

    /// Apply `SPLITBILL_*` overrides looked up through `lookup`.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bind) = lookup("SPLITBILL_BIND") {
            self.bind = bind;
        }
        if let Some(db) = lookup("SPLITBILL_DATABASE") {
            self.database_path = PathBuf::from(db);
        }
        if let Some(dir) = lookup("SPLITBILL_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(value) = lookup("SPLITBILL_OCR_ENABLED") {
            self.ocr.enabled = match value.to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => return Err(ConfigError::InvalidOverride { var: "SPLITBILL_OCR_ENABLED", value }),
            };
        }
        if let Some(value) = lookup("SPLITBILL_LOG_FORMAT") {
            self.log_format = value
                .parse()
                .map_err(|_| ConfigError::InvalidOverride { var: "SPLITBILL_LOG_FORMAT", value })?;
        }
        Ok(self)
    }

    pub fn attachments_dir(&self) -> PathBuf {
        self.data_dir.join("attachments")
    }
}
