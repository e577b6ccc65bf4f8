//! Configuration for capture pools, their loggers and redaction rules

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::logger::{EncoderConfig, Encoding, Level};
use crate::logging::DEFAULT_ALLOCATE_TIMEOUT;
use crate::redact::RedactionRules;

/// Top-level configuration, usually read from a TOML file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub pool: PoolConfig,

    #[serde(default)]
    pub redaction: RedactionConfig,
}

impl Config {
    /// Load configuration from `path`, or return defaults if the file does not exist
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path).context("Failed to read config file")?;
            Self::from_toml_str(&content)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content).context("Failed to parse config file")?;
        config.validate().context("Invalid configuration")?;
        Ok(config)
    }

    /// Save configuration to `path`
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content).context("Failed to write config file")?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.pool.validate()
    }
}

/// Capture-buffer pool settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Number of buffer loggers created up front (default: 4)
    #[serde(default = "default_pool_size")]
    pub size: usize,

    /// Name given to every pooled logger
    #[serde(default = "default_pool_name")]
    pub name: String,

    /// Wait used by `allocate(None)` in milliseconds (default: 10000)
    #[serde(default = "default_allocate_timeout_ms")]
    pub allocate_timeout_ms: u64,

    #[serde(default)]
    pub logger: LoggerConfig,
}

fn default_pool_size() -> usize {
    4
}

fn default_pool_name() -> String {
    "capture".to_string()
}

fn default_allocate_timeout_ms() -> u64 {
    DEFAULT_ALLOCATE_TIMEOUT.as_millis() as u64
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            size: default_pool_size(),
            name: default_pool_name(),
            allocate_timeout_ms: default_allocate_timeout_ms(),
            logger: LoggerConfig::default(),
        }
    }
}

impl PoolConfig {
    pub fn with_size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_allocate_timeout(mut self, timeout: Duration) -> Self {
        self.allocate_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_logger(mut self, logger: LoggerConfig) -> Self {
        self.logger = logger;
        self
    }

    pub fn allocate_timeout(&self) -> Duration {
        Duration::from_millis(self.allocate_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.size == 0 {
            return Err(Error::config("pool size must be at least 1"));
        }
        self.logger.validate()
    }
}

/// Settings for one logger
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoggerConfig {
    #[serde(default)]
    pub encoding: Encoding,

    /// Minimum level written (default: info)
    #[serde(default)]
    pub level: Level,

    /// JSON encoder settings, ignored by the console encoding
    #[serde(default)]
    pub json: EncoderConfig,
}

impl LoggerConfig {
    /// Console settings for test suites; `verbose` lowers the level to debug
    pub fn for_tests(verbose: bool) -> Self {
        Self {
            encoding: Encoding::Console,
            level: if verbose { Level::Debug } else { Level::Info },
            json: EncoderConfig::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.json.validate()
    }
}

/// Redaction rules applied to every pooled logger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedactionConfig {
    #[serde(default = "default_redaction_enabled")]
    pub enabled: bool,

    /// Exact strings replaced by the mask
    #[serde(default)]
    pub literals: Vec<String>,

    /// Keys whose `key=value` / `key: value` values are replaced
    #[serde(default)]
    pub value_keys: Vec<String>,
}

fn default_redaction_enabled() -> bool {
    true
}

impl Default for RedactionConfig {
    fn default() -> Self {
        Self {
            enabled: default_redaction_enabled(),
            literals: Vec::new(),
            value_keys: Vec::new(),
        }
    }
}

impl RedactionConfig {
    /// Whether any rule is configured
    pub fn has_rules(&self) -> bool {
        !self.literals.is_empty() || !self.value_keys.is_empty()
    }

    /// Compile the configured rules into a shared rule set
    pub fn build_rules(&self) -> Result<RedactionRules> {
        let rules = RedactionRules::new();
        rules.add_redactions(&self.literals)?;
        rules.add_value_redactions(&self.value_keys)?;
        rules.set_enabled(self.enabled);
        Ok(rules)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::VarGroupMode;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.pool.size, 4);
        assert_eq!(config.pool.name, "capture");
        assert_eq!(config.pool.allocate_timeout(), Duration::from_secs(10));
        assert_eq!(config.pool.logger.encoding, Encoding::Json);
        assert_eq!(config.pool.logger.level, Level::Info);
        assert!(config.redaction.enabled);
        assert!(!config.redaction.has_rules());
    }

    #[test]
    fn test_config_serialization() {
        let mut config = Config::default();
        config.pool.size = 8;
        config.pool.logger.json = EncoderConfig::grouped("vars", VarGroupMode::Structured);
        config.redaction.literals = vec!["hunter2".to_string()];
        config.redaction.value_keys = vec!["password".to_string()];

        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = Config::from_toml_str(
            r#"
            [pool]
            size = 2

            [pool.logger]
            level = "debug"

            [redaction]
            value_keys = ["password", "token"]
            "#,
        )
        .unwrap();

        assert_eq!(config.pool.size, 2);
        assert_eq!(config.pool.name, "capture");
        assert_eq!(config.pool.logger.level, Level::Debug);
        assert_eq!(config.pool.logger.json.line_ending, "\n");
        assert!(config.redaction.enabled);
        assert_eq!(config.redaction.value_keys, ["password", "token"]);
    }

    #[test]
    fn test_invalid_toml_rejected() {
        assert!(Config::from_toml_str("[pool]\nsize = 0\n").is_err());
        assert!(Config::from_toml_str("[pool.logger]\nencoding = \"xml\"\n").is_err());
        assert!(Config::from_toml_str("[pool.logger.json]\nline_ending = \";\"\n").is_err());
    }

    #[test]
    fn test_load_missing_file_returns_default() {
        let dir = TempDir::new().unwrap();
        let config = Config::load_from(&dir.path().join("missing.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("logsieve.toml");

        let config = Config {
            pool: PoolConfig::default()
                .with_size(3)
                .with_name("requests")
                .with_allocate_timeout(Duration::from_millis(250)),
            redaction: RedactionConfig {
                enabled: false,
                literals: vec!["secret".to_string()],
                value_keys: Vec::new(),
            },
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.pool.allocate_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn test_build_rules() {
        let config = RedactionConfig {
            enabled: true,
            literals: vec!["hunter2".to_string(), String::new()],
            value_keys: vec!["password".to_string()],
        };
        let rules = config.build_rules().unwrap();
        assert_eq!(rules.redactions(), ["hunter2"]);
        assert_eq!(rules.value_redactions(), ["password"]);
        assert!(rules.is_enabled());

        let disabled = RedactionConfig {
            enabled: false,
            ..config
        };
        assert!(!disabled.build_rules().unwrap().is_enabled());
    }

    #[test]
    fn test_build_rules_invalid_key() {
        let config = RedactionConfig {
            value_keys: vec!["pass(word".to_string()],
            ..RedactionConfig::default()
        };
        assert!(matches!(
            config.build_rules(),
            Err(Error::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_logger_config_for_tests() {
        assert_eq!(LoggerConfig::for_tests(false).level, Level::Info);
        assert_eq!(LoggerConfig::for_tests(true).level, Level::Debug);
        assert_eq!(LoggerConfig::for_tests(true).encoding, Encoding::Console);
    }
}
