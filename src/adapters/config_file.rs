//! Configuration adapters.
//!
//! Both implement [`ConfigPort`] and return a validated [`SystemConfig`]:
//!
//! - [`FileConfig`]: a document on the host filesystem.  `.yaml` / `.yml`
//!   files are parsed as YAML, anything else as JSON.
//! - [`EmbeddedConfig`]: the document compiled into the firmware image
//!   (`config/tankguard.json`), for boards without a writable filesystem.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::{error, info};

use crate::app::ports::ConfigPort;
use crate::config::SystemConfig;
use crate::error::ConfigError;

/// Document syntax, chosen from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Yaml,
}

impl ConfigFormat {
    pub fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                Self::Yaml
            }
            _ => Self::Json,
        }
    }
}

/// Loads `SystemConfig` from a JSON or YAML file.
pub struct FileConfig {
    path: PathBuf,
}

impl FileConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> ConfigFormat {
        ConfigFormat::for_path(&self.path)
    }
}

impl ConfigPort for FileConfig {
    fn load(&self) -> Result<SystemConfig, ConfigError> {
        let text = fs::read_to_string(&self.path).map_err(|e| {
            error!("config: cannot read {}: {}", self.path.display(), e);
            match e.kind() {
                ErrorKind::NotFound => ConfigError::NotFound,
                _ => ConfigError::IoError,
            }
        })?;
        let cfg = match self.format() {
            ConfigFormat::Yaml => SystemConfig::from_yaml(&text)?,
            ConfigFormat::Json => SystemConfig::from_json(&text)?,
        };
        info!("Config loaded from {}", self.path.display());
        Ok(cfg)
    }
}

/// The configuration baked into the binary.
pub struct EmbeddedConfig;

impl EmbeddedConfig {
    pub const DOCUMENT: &'static str = include_str!("../../config/tankguard.json");
}

impl ConfigPort for EmbeddedConfig {
    fn load(&self) -> Result<SystemConfig, ConfigError> {
        let cfg = SystemConfig::from_json(Self::DOCUMENT)?;
        info!("Config loaded from firmware image");
        Ok(cfg)
    }
}
