//! Observability configuration parsing from environment variables.
//!
//! Metrics are never served; when enabled the host logs a Prometheus text
//! snapshot at a fixed interval.

use super::EnvSource;
use std::time::Duration;

/// Observability environment configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ObservabilityEnvConfig {
    pub enabled: bool,
    pub report_interval: Duration,
}

impl Default for ObservabilityEnvConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            report_interval: Duration::from_secs(60),
        }
    }
}

impl ObservabilityEnvConfig {
    pub(crate) fn from_source<S: EnvSource>(source: &S) -> Self {
        let defaults = Self::default();
        let interval = source
            .get("OBSERVABILITY_INTERVAL_SECS")
            .and_then(|raw| raw.trim().parse::<u64>().ok())
            .unwrap_or(defaults.report_interval.as_secs());
        Self {
            enabled: source.parse_bool("OBSERVABILITY_ENABLED", defaults.enabled),
            report_interval: Duration::from_secs(interval.max(1)),
        }
    }
}
