//! Loader for CLIFp's own configuration.

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use std::path::Path;
use thiserror::Error;

use crate::domain::config::ClifpConfig;

/// Configuration validation failures.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid bider poll rate: {0} ms. Must be positive")]
    InvalidPollRate(u64),

    #[error("Invalid transfer timeout: {0} ms. Must be positive")]
    InvalidTransferTimeout(u64),

    #[error("Invalid QMP timeout: {0} ms. Must be positive")]
    InvalidQmpTimeout(u64),

    #[error("Invalid log retention: {0}. Must be at least 1")]
    InvalidRetention(usize),

    #[error("Release API URL cannot be empty")]
    EmptyReleaseUrl,
}

/// Configuration loader with hierarchical merging.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging.
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults
    /// 2. `clifp.yaml` in the given directory (normally next to the binary)
    /// 3. Environment variables (`CLIFP_*` prefix)
    pub fn load(config_dir: &Path) -> Result<ClifpConfig> {
        let config: ClifpConfig = Figment::new()
            .merge(Serialized::defaults(ClifpConfig::default()))
            .merge(Yaml::file(config_dir.join("clifp.yaml")))
            .merge(Env::prefixed("CLIFP_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading.
    pub fn validate(config: &ClifpConfig) -> Result<(), ConfigError> {
        if config.bider.poll_rate_ms == 0 {
            return Err(ConfigError::InvalidPollRate(config.bider.poll_rate_ms));
        }

        if config.net.transfer_timeout_ms == 0 {
            return Err(ConfigError::InvalidTransferTimeout(
                config.net.transfer_timeout_ms,
            ));
        }

        if config.net.qmp_timeout_ms == 0 {
            return Err(ConfigError::InvalidQmpTimeout(config.net.qmp_timeout_ms));
        }

        if config.log.retention == 0 {
            return Err(ConfigError::InvalidRetention(config.log.retention));
        }

        if config.update.release_api_url.is_empty() {
            return Err(ConfigError::EmptyReleaseUrl);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::config::ClifpConfig;

    #[test]
    fn test_defaults_pass_validation() {
        assert!(ConfigLoader::validate(&ClifpConfig::default()).is_ok());
    }

    #[test]
    fn test_zero_poll_rate_rejected() {
        let mut cfg = ClifpConfig::default();
        cfg.bider.poll_rate_ms = 0;
        assert!(matches!(
            ConfigLoader::validate(&cfg),
            Err(ConfigError::InvalidPollRate(0))
        ));
    }

    #[test]
    fn test_zero_retention_rejected() {
        let mut cfg = ClifpConfig::default();
        cfg.log.retention = 0;
        assert!(matches!(
            ConfigLoader::validate(&cfg),
            Err(ConfigError::InvalidRetention(0))
        ));
    }

    #[test]
    fn test_load_from_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("clifp.yaml"),
            "bider:\n  poll_rate_ms: 125\nnet:\n  qmp_timeout_ms: 2500\n",
        )
        .unwrap();

        let cfg = ConfigLoader::load(dir.path()).unwrap();
        assert_eq!(cfg.bider.poll_rate_ms, 125);
        assert_eq!(cfg.net.qmp_timeout_ms, 2500);
        assert_eq!(cfg.log.retention, 50);
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = ConfigLoader::load(dir.path()).unwrap();
        assert_eq!(cfg, ClifpConfig::default());
    }
}
