//! INI configuration file.
//!
//! ```ini
//! [download]
//! workers = 4
//! timeout_secs = 300
//! output_dir = ~/Music/dashfetch
//! quality = HI_RES_LOSSLESS
//!
//! [api]
//! base_url = https://api.tidal.com
//! country_code = US
//!
//! [logging]
//! level = info
//! file = ~/.dashfetch/dashfetch.log
//! ```
//!
//! Every key is optional. A missing file yields the defaults.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ini::Ini;
use thiserror::Error;

use super::DownloadConfig;
use crate::api::{AudioQuality, DEFAULT_BASE_URL};
use crate::coordinator::DEFAULT_WORKERS;
use crate::fetch::DEFAULT_TIMEOUT_SECS;

/// Errors loading the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file exists but could not be read or parsed.
    #[error("failed to load {}: {reason}", path.display())]
    Load { path: PathBuf, reason: String },

    /// A key has a value of the wrong shape.
    #[error("invalid value '{value}' for [{section}] {key}: {reason}")]
    InvalidValue {
        section: &'static str,
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// `[download]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadSettings {
    pub workers: usize,
    pub timeout_secs: u64,
    pub output_dir: Option<PathBuf>,
    pub quality: AudioQuality,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            output_dir: None,
            quality: AudioQuality::default(),
        }
    }
}

/// `[api]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiSettings {
    pub base_url: String,
    pub country_code: Option<String>,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            country_code: None,
        }
    }
}

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    pub level: String,
    pub file: Option<PathBuf>,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// Parsed configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    pub download: DownloadSettings,
    pub api: ApiSettings,
    pub logging: LoggingSettings,
}

/// Default location: `~/.dashfetch/config.ini`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".dashfetch").join("config.ini"))
}

impl ConfigFile {
    /// Load from the default location, falling back to defaults.
    pub fn load_default() -> Result<Self, ConfigError> {
        match default_config_path() {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let ini = Ini::load_from_file(path).map_err(|e| ConfigError::Load {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_ini(&ini)
    }

    /// Parse configuration from INI text.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(text).map_err(|e| ConfigError::Load {
            path: PathBuf::from("<string>"),
            reason: e.to_string(),
        })?;
        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let get = |section: &str, key: &str| lookup(ini, section, key);

        if let Some(v) = get("download", "workers") {
            config.download.workers = parse_value::<usize>("download", "workers", v)?;
            if config.download.workers == 0 {
                return Err(invalid("download", "workers", v, "must be at least 1"));
            }
        }
        if let Some(v) = get("download", "timeout_secs") {
            config.download.timeout_secs = parse_value("download", "timeout_secs", v)?;
        }
        if let Some(v) = get("download", "output_dir") {
            config.download.output_dir = Some(expand_tilde(v));
        }
        if let Some(v) = get("download", "quality") {
            config.download.quality = AudioQuality::from_str(v)
                .map_err(|e| invalid("download", "quality", v, &e.to_string()))?;
        }

        if let Some(v) = get("api", "base_url") {
            config.api.base_url = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = get("api", "country_code") {
            config.api.country_code = Some(v.to_string());
        }

        if let Some(v) = get("logging", "level") {
            config.logging.level = v.to_string();
        }
        if let Some(v) = get("logging", "file") {
            config.logging.file = Some(expand_tilde(v));
        }

        Ok(config)
    }

    /// Runtime download configuration from the `[download]` section.
    pub fn to_download_config(&self) -> DownloadConfig {
        DownloadConfig::default()
            .with_workers(self.download.workers)
            .with_timeout(Duration::from_secs(self.download.timeout_secs))
    }
}

fn lookup<'a>(ini: &'a Ini, section: &str, key: &str) -> Option<&'a str> {
    ini.section(Some(section))
        .and_then(|props| props.get(key))
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn parse_value<T>(section: &'static str, key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e: T::Err| invalid(section, key, value, &e.to_string()))
}

fn invalid(section: &'static str, key: &'static str, value: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        section,
        key,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn expand_tilde(value: &str) -> PathBuf {
    match value.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(value)),
        None => PathBuf::from(value),
    }
}
