//! DocRing Configuration
//!
//! This module provides configuration structures for the DocRing
//! load balancer and its servers.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::ring::ReplicaMode;

/// Main DocRing configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocRingConfig {
    /// Ring and server configuration
    #[serde(default)]
    pub ring: RingConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Ring configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RingConfig {
    /// Virtual replicas per server (1 or 3)
    #[serde(default = "default_replicas")]
    pub replicas: u32,

    /// Capacity of each server's pending-edit queue
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (pretty, compact)
    #[serde(default = "default_log_format")]
    pub format: String,
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
const LOG_FORMATS: [&str; 2] = ["pretty", "compact"];

// Default value functions
fn default_replicas() -> u32 {
    1
}

fn default_queue_capacity() -> usize {
    1000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for RingConfig {
    fn default() -> Self {
        Self {
            replicas: default_replicas(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl DocRingConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Load configuration from a TOML string
    pub fn from_str(content: &str) -> crate::Result<Self> {
        let config: DocRingConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` when given, otherwise fall back to defaults
    pub fn load(path: Option<&PathBuf>) -> crate::Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> crate::Result<()> {
        if ReplicaMode::from_count(self.ring.replicas).is_none() {
            return Err(crate::Error::Config(format!(
                "ring.replicas must be 1 or 3, got {}",
                self.ring.replicas
            )));
        }

        if self.ring.queue_capacity == 0 {
            return Err(crate::Error::Config("ring.queue_capacity must be positive".into()));
        }

        if !LOG_LEVELS.contains(&self.logging.level.as_str()) {
            return Err(crate::Error::Config(format!(
                "unknown logging.level: {}",
                self.logging.level
            )));
        }

        if !LOG_FORMATS.contains(&self.logging.format.as_str()) {
            return Err(crate::Error::Config(format!(
                "unknown logging.format: {}",
                self.logging.format
            )));
        }

        Ok(())
    }

    /// Replica mode selected by `ring.replicas`
    pub fn replica_mode(&self) -> ReplicaMode {
        ReplicaMode::from_count(self.ring.replicas).unwrap_or(ReplicaMode::Single)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_config() {
        let toml = r#"
[ring]
replicas = 3
queue_capacity = 64

[logging]
level = "debug"
format = "compact"
"#;

        let config = DocRingConfig::from_str(toml).unwrap();
        assert_eq!(config.ring.queue_capacity, 64);
        assert_eq!(config.replica_mode(), ReplicaMode::Triple);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = DocRingConfig::from_str("").unwrap();
        assert_eq!(config.ring.replicas, 1);
        assert_eq!(config.ring.queue_capacity, 1000);
        assert_eq!(config.replica_mode(), ReplicaMode::Single);
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_rejects_bad_replicas() {
        let err = DocRingConfig::from_str("[ring]\nreplicas = 2\n").unwrap_err();
        assert!(matches!(err, crate::Error::Config(_)));
    }

    #[test]
    fn test_rejects_zero_queue_and_unknown_level() {
        assert!(DocRingConfig::from_str("[ring]\nqueue_capacity = 0\n").is_err());
        assert!(DocRingConfig::from_str("[logging]\nlevel = \"loud\"\n").is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[ring]\nreplicas = 3").unwrap();

        let config = DocRingConfig::from_file(file.path()).unwrap();
        assert_eq!(config.replica_mode(), ReplicaMode::Triple);

        let path = file.path().to_path_buf();
        let loaded = DocRingConfig::load(Some(&path)).unwrap();
        assert_eq!(loaded.ring.replicas, 3);
        assert_eq!(DocRingConfig::load(None).unwrap().ring.replicas, 1);
    }
}
