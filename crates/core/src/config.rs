use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::EngineSettings;

/// Configuration manager for engine settings
/// Keeps the schema of valid options apart from the persisted values. Configuration is
/// stored in lumen.json in the working directory by default
pub struct ConfigManager {
    config_path: PathBuf,
    settings: EngineSettings,
}

/// Available configuration options with validation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigSchema {
    pub timing: TimingConfigSchema,
    pub output: OutputConfigSchema,
    pub control: ControlConfigSchema,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfigSchema {
    pub frequency_hz: ConfigOption<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfigSchema {
    pub universes: ConfigOption<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlConfigSchema {
    pub default_fade_out_ms: ConfigOption<u32>,
    pub event_capacity: ConfigOption<usize>,
}

/// Configuration option with validation and available choices
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigOption<T> {
    pub default: T,
    pub valid_range: Option<(T, T)>,
    pub valid_choices: Option<Vec<T>>,
    pub description: String,
    pub requires_restart: bool,
}

/// Persisted configuration file format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    pub settings: EngineSettings,
    pub created_at: String,
    pub modified_at: String,
}

impl ConfigManager {
    /// Create a new configuration manager
    /// If no path is provided, defaults to 'lumen.json' in the current working directory
    pub fn new(config_path: Option<PathBuf>) -> Self {
        let config_path = config_path.unwrap_or_else(|| PathBuf::from("lumen.json"));

        Self {
            config_path,
            settings: EngineSettings::default(),
        }
    }

    /// Load settings from the configuration file
    /// Writes a default file if none exists yet
    pub fn load(&mut self) -> Result<EngineSettings, ConfigError> {
        if !self.config_path.exists() {
            self.save()?;
            return Ok(self.settings.clone());
        }

        let content = fs::read_to_string(&self.config_path)
            .map_err(|e| ConfigError::Read(e.to_string()))?;

        let config_file: ConfigFile =
            serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;

        if config_file.version != env!("CARGO_PKG_VERSION") {
            log::warn!(
                "Config file version {} doesn't match engine version {}. Using defaults for new settings.",
                config_file.version,
                env!("CARGO_PKG_VERSION")
            );
        }

        Self::validate_settings(&config_file.settings).map_err(ConfigError::Validation)?;

        self.settings = config_file.settings;
        Ok(self.settings.clone())
    }

    /// Save current settings to the configuration file
    pub fn save(&self) -> Result<(), ConfigError> {
        if let Some(parent) = self.config_path.parent() {
            if parent != Path::new("") && parent != Path::new(".") {
                fs::create_dir_all(parent).map_err(|e| ConfigError::Write(e.to_string()))?;
            }
        }

        let now = chrono::Utc::now().to_rfc3339();
        let created_at = self.existing_created_at().unwrap_or_else(|| now.clone());

        let config_file = ConfigFile {
            version: env!("CARGO_PKG_VERSION").to_string(),
            settings: self.settings.clone(),
            created_at,
            modified_at: now,
        };

        let content = serde_json::to_string_pretty(&config_file)
            .map_err(|e| ConfigError::Serialize(e.to_string()))?;

        fs::write(&self.config_path, content).map_err(|e| ConfigError::Write(e.to_string()))?;

        Ok(())
    }

    fn existing_created_at(&self) -> Option<String> {
        let content = fs::read_to_string(&self.config_path).ok()?;
        let config_file: ConfigFile = serde_json::from_str(&content).ok()?;
        Some(config_file.created_at)
    }

    /// Validate, update and save settings
    pub fn update_settings(&mut self, settings: EngineSettings) -> Result<(), ConfigError> {
        Self::validate_settings(&settings).map_err(ConfigError::Validation)?;
        self.settings = settings;
        self.save()
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Get configuration schema with available options
    pub fn schema() -> ConfigSchema {
        let defaults = EngineSettings::default();
        ConfigSchema {
            timing: TimingConfigSchema {
                frequency_hz: ConfigOption {
                    default: defaults.frequency_hz,
                    valid_range: Some((1, 1000)),
                    valid_choices: None,
                    description: "Master timer tick frequency in Hz".to_string(),
                    requires_restart: true,
                },
            },
            output: OutputConfigSchema {
                universes: ConfigOption {
                    default: defaults.universes,
                    valid_range: Some((1, 64)),
                    valid_choices: None,
                    description: "Number of 512 channel universes in the output buffer"
                        .to_string(),
                    requires_restart: true,
                },
            },
            control: ControlConfigSchema {
                default_fade_out_ms: ConfigOption {
                    default: defaults.default_fade_out_ms,
                    valid_range: Some((0, 600_000)),
                    valid_choices: None,
                    description: "Fade time used by fade-and-stop when none is given".to_string(),
                    requires_restart: false,
                },
                event_capacity: ConfigOption {
                    default: defaults.event_capacity,
                    valid_range: Some((1, 4096)),
                    valid_choices: None,
                    description: "Events buffered per observer before the oldest are dropped"
                        .to_string(),
                    requires_restart: true,
                },
            },
        }
    }

    /// Validate settings against schema
    pub fn validate_settings(settings: &EngineSettings) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        let schema = Self::schema();

        check_range(
            &mut errors,
            "frequency_hz",
            settings.frequency_hz,
            &schema.timing.frequency_hz,
        );
        check_range(
            &mut errors,
            "universes",
            settings.universes,
            &schema.output.universes,
        );
        check_range(
            &mut errors,
            "default_fade_out_ms",
            settings.default_fade_out_ms,
            &schema.control.default_fade_out_ms,
        );
        check_range(
            &mut errors,
            "event_capacity",
            settings.event_capacity,
            &schema.control.event_capacity,
        );

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn check_range<T>(errors: &mut Vec<String>, name: &str, value: T, option: &ConfigOption<T>)
where
    T: PartialOrd + Copy + std::fmt::Display,
{
    if let Some((min, max)) = option.valid_range {
        if value < min || value > max {
            errors.push(format!("{} must be between {} and {}", name, min, max));
        }
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Read(String),
    #[error("Failed to parse config: {0}")]
    Parse(String),
    #[error("Failed to serialize config: {0}")]
    Serialize(String),
    #[error("Failed to write config: {0}")]
    Write(String),
    #[error("Config validation errors: {}", .0.join(", "))]
    Validation(Vec<String>),
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_config_manager_new() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test_config.json");

        let manager = ConfigManager::new(Some(config_path.clone()));
        assert_eq!(manager.config_path(), config_path);
        assert_eq!(manager.settings(), &EngineSettings::default());
    }

    #[test]
    fn test_load_creates_default_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("lumen.json");

        let mut manager = ConfigManager::new(Some(config_path.clone()));
        let settings = manager.load().unwrap();

        assert_eq!(settings, EngineSettings::default());
        assert!(config_path.exists());
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("test_config.json");

        let mut manager = ConfigManager::new(Some(config_path.clone()));

        let mut settings = EngineSettings::default();
        settings.frequency_hz = 30;
        settings.universes = 8;
        manager.update_settings(settings).unwrap();

        let mut manager2 = ConfigManager::new(Some(config_path));
        let loaded_settings = manager2.load().unwrap();

        assert_eq!(loaded_settings.frequency_hz, 30);
        assert_eq!(loaded_settings.universes, 8);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("partial.json");
        fs::write(
            &config_path,
            r#"{"version":"0.0.0","settings":{"frequency_hz":44},"created_at":"","modified_at":""}"#,
        )
        .unwrap();

        let mut manager = ConfigManager::new(Some(config_path));
        let settings = manager.load().unwrap();
        assert_eq!(settings.frequency_hz, 44);
        assert_eq!(settings.universes, EngineSettings::default().universes);
    }

    #[test]
    fn test_invalid_file_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("broken.json");
        fs::write(&config_path, "not json").unwrap();

        let mut manager = ConfigManager::new(Some(config_path));
        assert!(matches!(manager.load(), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_validation() {
        let mut settings = EngineSettings::default();
        assert!(ConfigManager::validate_settings(&settings).is_ok());

        settings.frequency_hz = 0;
        settings.universes = 100;
        let errors = ConfigManager::validate_settings(&settings).unwrap_err();
        assert_eq!(errors.len(), 2);

        let temp_dir = TempDir::new().unwrap();
        let mut manager = ConfigManager::new(Some(temp_dir.path().join("c.json")));
        assert!(matches!(
            manager.update_settings(settings),
            Err(ConfigError::Validation(_))
        ));
    }
}
