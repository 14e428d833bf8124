// ⚙️ Configuration - TOML file, environment, CLI
//
// Precedence (highest first):
//   1. CLI flags (applied by the binary)
//   2. Environment variables (SPEND_PERSONA_*)
//   3. Configuration file (TOML)
//   4. Defaults
//
// Persona thresholds are product behavior and are not configurable here.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Looked up in the working directory when no --config is given
pub const DEFAULT_CONFIG_FILE: &str = "spend_persona.toml";

pub const ENV_CONFIG: &str = "SPEND_PERSONA_CONFIG";
pub const ENV_DB: &str = "SPEND_PERSONA_DB";
pub const ENV_LOG_LEVEL: &str = "SPEND_PERSONA_LOG_LEVEL";
pub const ENV_LOG_JSON: &str = "SPEND_PERSONA_LOG_JSON";

const LOG_LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "warning", "error"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseSettings,
    pub logging: LoggingSettings,
    pub assignment: AssignmentSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// SQLite file
    pub path: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: "spend_persona.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// trace, debug, info, warn, error
    pub level: String,
    pub json_format: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        LoggingSettings {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssignmentSettings {
    pub save_history: bool,

    /// Reference date (YYYY-MM-DD); today when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub as_of: Option<String>,
}

impl Default for AssignmentSettings {
    fn default() -> Self {
        AssignmentSettings {
            save_history: true,
            as_of: None,
        }
    }
}

impl AssignmentSettings {
    pub fn as_of_date(&self) -> Result<Option<NaiveDate>> {
        self.as_of
            .as_deref()
            .map(parse_date)
            .transpose()
            .context("Invalid assignment.as_of")
    }
}

/// YYYY-MM-DD
pub fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .with_context(|| format!("Expected a YYYY-MM-DD date, got '{}'", value))
}

impl AppConfig {
    /// File (explicit or default) + environment overrides, validated
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut config = match Self::find_config_file(config_path)? {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        debug!(path = %path.display(), "loading configuration file");
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    fn find_config_file(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            if !path.exists() {
                bail!("Configuration file not found: {}", path.display());
            }
            return Ok(Some(path.to_path_buf()));
        }

        let default = PathBuf::from(DEFAULT_CONFIG_FILE);
        Ok(default.exists().then_some(default))
    }

    /// Environment-style overrides from any key lookup
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup(ENV_DB) {
            self.database.path = path;
        }
        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            self.logging.level = level;
        }
        if let Some(json) = lookup(ENV_LOG_JSON) {
            self.logging.json_format = matches!(json.to_lowercase().as_str(), "1" | "true" | "yes");
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.database.path.trim().is_empty() {
            bail!("database.path must not be empty");
        }
        if !LOG_LEVELS.contains(&self.logging.level.to_lowercase().as_str()) {
            bail!(
                "logging.level must be one of trace, debug, info, warn, error (got '{}')",
                self.logging.level
            );
        }
        self.assignment.as_of_date()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.database.path, "spend_persona.db");
        assert_eq!(config.logging.level, "info");
        assert!(config.assignment.save_history);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[database]\npath = \"/tmp/personas.db\"\n\n[assignment]\nas_of = \"2024-07-01\"").unwrap();

        let config = AppConfig::load(Some(file.path())).unwrap();

        assert_eq!(config.database.path, "/tmp/personas.db");
        assert_eq!(config.logging.level, "info");
        assert!(config.assignment.save_history);
        assert_eq!(
            config.assignment.as_of_date().unwrap(),
            Some(NaiveDate::from_ymd_opt(2024, 7, 1).unwrap())
        );
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let err = AppConfig::load(Some(Path::new("/nonexistent/spend_persona.toml"))).unwrap_err();
        assert!(err.to_string().contains("Configuration file not found"));
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("SPEND_PERSONA_DB", "override.db"),
            ("SPEND_PERSONA_LOG_LEVEL", "debug"),
            ("SPEND_PERSONA_LOG_JSON", "true"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.database.path, "override.db");
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json_format);
    }

    #[test]
    fn test_validation() {
        let mut config = AppConfig::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.assignment.as_of = Some("07/01/2024".to_string());
        assert!(config.validate().is_err());
    }
}
