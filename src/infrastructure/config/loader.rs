use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::EngineConfig;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Domain list cannot be empty")]
    EmptyDomains,

    #[error("Duplicate domain label: {0}")]
    DuplicateDomain(String),

    #[error("Invalid tick interval: {0} ms. Must be positive")]
    InvalidTickInterval(u64),

    #[error("Invalid max_retries: {0}. Cannot be 0")]
    InvalidMaxRetries(u32),

    #[error("Invalid threshold '{name}': {value}. Must be within [0,1]")]
    InvalidThreshold { name: &'static str, value: f64 },

    #[error("Invalid split_complexity: {0}. Must be within [1,10]")]
    InvalidSplitComplexity(f64),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. ./loc.yaml (project config)
    /// 3. Environment variables (LOC_* prefix, highest priority)
    pub fn load() -> Result<EngineConfig> {
        let config: EngineConfig = Figment::new()
            .merge(Serialized::defaults(EngineConfig::default()))
            .merge(Yaml::file("loc.yaml"))
            .merge(Env::prefixed("LOC_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<EngineConfig> {
        let config: EngineConfig = Figment::new()
            .merge(Serialized::defaults(EngineConfig::default()))
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &EngineConfig) -> Result<(), ConfigError> {
        if config.domains.is_empty() {
            return Err(ConfigError::EmptyDomains);
        }
        for (i, domain) in config.domains.iter().enumerate() {
            if config.domains[..i].contains(domain) {
                return Err(ConfigError::DuplicateDomain(domain.clone()));
            }
        }

        let sched = &config.scheduler;
        if sched.tick_interval_ms == 0 {
            return Err(ConfigError::InvalidTickInterval(sched.tick_interval_ms));
        }
        if sched.max_retries == 0 {
            return Err(ConfigError::InvalidMaxRetries(sched.max_retries));
        }

        for (name, value) in [
            ("remediation_threshold", sched.remediation_threshold),
            ("low_confidence_threshold", sched.low_confidence_threshold),
            ("min_compatibility", sched.min_compatibility),
            ("interference_penalty", sched.interference_penalty),
            ("prediction_floor", sched.prediction_floor),
        ] {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidThreshold { name, value });
            }
        }

        if !sched.split_complexity.is_finite() || !(1.0..=10.0).contains(&sched.split_complexity) {
            return Err(ConfigError::InvalidSplitComplexity(sched.split_complexity));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn valid_config() -> EngineConfig {
        EngineConfig::with_domains(["analysis", "logic"])
    }

    #[test]
    fn test_validate_accepts_defaults_with_domains() {
        assert!(ConfigLoader::validate(&valid_config()).is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_domains() {
        let config = EngineConfig::default();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::EmptyDomains)
        ));
    }

    #[test]
    fn test_validate_rejects_duplicate_domains() {
        let config = EngineConfig::with_domains(["analysis", "analysis"]);
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::DuplicateDomain(_))
        ));
    }

    #[test]
    fn test_validate_rejects_bad_thresholds() {
        let mut config = valid_config();
        config.scheduler.remediation_threshold = 1.5;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidThreshold { .. })
        ));

        let mut config = valid_config();
        config.scheduler.tick_interval_ms = 0;
        assert!(ConfigLoader::validate(&config).is_err());

        let mut config = valid_config();
        config.logging.level = "verbose".to_string();
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidLogLevel(_))
        ));
    }

    #[test]
    fn test_load_from_yaml_file() {
        let mut file = tempfile::Builder::new()
            .suffix(".yaml")
            .tempfile()
            .unwrap();
        writeln!(
            file,
            "domains: [analysis, logic]\nscheduler:\n  tick_interval_ms: 250\n  max_retries: 5"
        )
        .unwrap();

        let config = ConfigLoader::load_from_file(file.path()).unwrap();
        assert_eq!(config.domains, vec!["analysis", "logic"]);
        assert_eq!(config.scheduler.tick_interval_ms, 250);
        assert_eq!(config.scheduler.max_retries, 5);
        // Untouched sections keep their defaults
        assert!((config.scheduler.remediation_threshold - 0.65).abs() < f64::EPSILON);
    }
}
