//! Stack configuration loading.

use std::fs;
use std::path::Path;

use tracing::{debug, info};

use crate::config::StackConfig;
use crate::error::{TemplateError, TemplateResult};

/// Configuration file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigFormat {
    Yaml,
    Toml,
}

impl ConfigFormat {
    fn from_path(path: &Path) -> TemplateResult<Self> {
        match path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .as_deref()
        {
            Some("yaml") | Some("yml") => Ok(ConfigFormat::Yaml),
            Some("toml") => Ok(ConfigFormat::Toml),
            _ => Err(TemplateError::UnsupportedFormat(path.to_path_buf())),
        }
    }
}

/// Loads and writes stack configuration files.
pub struct StackConfigLoader;

impl StackConfigLoader {
    /// Load a stack configuration, picking the format from the extension.
    pub fn load(path: impl AsRef<Path>) -> TemplateResult<StackConfig> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(TemplateError::ConfigNotFound(path.to_path_buf()));
        }

        let format = ConfigFormat::from_path(path)?;
        debug!("Loading stack configuration from {:?}", path);
        let content = fs::read_to_string(path)?;

        let config = match format {
            ConfigFormat::Yaml => Self::from_yaml(&content)?,
            ConfigFormat::Toml => Self::from_toml(&content)?,
        };
        info!(
            "Loaded stack configuration: {} / {}",
            config.language, config.framework
        );
        Ok(config)
    }

    /// Parse a YAML configuration.
    pub fn from_yaml(content: &str) -> TemplateResult<StackConfig> {
        // An empty file means "all defaults".
        let config: StackConfig = if content.trim().is_empty() {
            StackConfig::default()
        } else {
            serde_yaml::from_str(content)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML configuration.
    pub fn from_toml(content: &str) -> TemplateResult<StackConfig> {
        let config: StackConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the default configuration. Fails if the file exists and `force` is not set.
    pub fn write_default(path: impl AsRef<Path>, force: bool) -> TemplateResult<()> {
        let path = path.as_ref();
        if path.exists() && !force {
            return Err(TemplateError::AlreadyExists(path.to_path_buf()));
        }

        let config = StackConfig::default();
        let content = match ConfigFormat::from_path(path)? {
            ConfigFormat::Yaml => serde_yaml::to_string(&config)?,
            ConfigFormat::Toml => toml::to_string_pretty(&config)?,
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(path, content)?;
        info!("Wrote default stack configuration to {:?}", path);
        Ok(())
    }
}
