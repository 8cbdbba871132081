//! Engine configuration model.

use serde::{Deserialize, Serialize};

/// Logging output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
}

/// Log file rotation policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RotationPolicy {
    Daily,
    Hourly,
    Never,
}

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Default level directive (trace/debug/info/warn/error)
    pub level: String,
    /// Stdout format
    pub format: LogFormat,
    /// Optional directory for rolling file output
    pub log_dir: Option<String>,
    /// Rotation policy for file output
    pub rotation: RotationPolicy,
    /// Whether stdout output is enabled alongside file output
    pub enable_stdout: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            log_dir: None,
            rotation: RotationPolicy::Daily,
            enable_stdout: true,
        }
    }
}

/// Scheduling thresholds and cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Tick cadence in milliseconds
    pub tick_interval_ms: u64,
    /// Reassignments allowed before a task fails terminally
    pub max_retries: u32,
    /// Predicted success below which remediation is applied
    pub remediation_threshold: f64,
    /// Result confidence below which the task is reassigned
    pub low_confidence_threshold: f64,
    /// Compatibility score below which an agent is not a candidate
    pub min_compatibility: f64,
    /// Predicted-success penalty per active interfering task
    pub interference_penalty: f64,
    /// Lower bound on any success prediction
    pub prediction_floor: f64,
    /// Complexity above which a low-prediction task is split
    pub split_complexity: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 1000,
            max_retries: 3,
            remediation_threshold: 0.65,
            low_confidence_threshold: 0.6,
            min_compatibility: 0.2,
            interference_penalty: 0.15,
            prediction_floor: 0.1,
            split_complexity: 6.0,
        }
    }
}

/// Top-level engine configuration.
///
/// The domain list is the closed set of valid labels; task and agent
/// submissions referencing labels outside it are rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Closed set of valid domain labels
    pub domains: Vec<String>,
    /// Scheduling thresholds and cadence
    pub scheduler: SchedulerConfig,
    /// Logging section
    pub logging: LogConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            domains: Vec::new(),
            scheduler: SchedulerConfig::default(),
            logging: LogConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Config with the given valid domain set and default thresholds.
    pub fn with_domains<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            domains: domains.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_thresholds() {
        let config = EngineConfig::default();
        assert_eq!(config.scheduler.tick_interval_ms, 1000);
        assert_eq!(config.scheduler.max_retries, 3);
        assert!((config.scheduler.remediation_threshold - 0.65).abs() < f64::EPSILON);
        assert!((config.scheduler.low_confidence_threshold - 0.6).abs() < f64::EPSILON);
    }

    #[test]
    fn test_with_domains() {
        let config = EngineConfig::with_domains(["analysis", "logic"]);
        assert_eq!(config.domains, vec!["analysis", "logic"]);
    }
}
