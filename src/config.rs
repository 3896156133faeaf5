//! Scheduler configuration.
//!
//! Planning and execution parameters, loadable from TOML:
//!
//! ```toml
//! [planning]
//! span_days = 3650
//! stagger_days = 13
//! saturation = 0.85
//! cohorts = 2
//!
//! [execution]
//! worker_count = 8
//! failure_tolerance = 0
//! ```
//!
//! Every field has a default. Unknown keys are rejected so that a typo
//! does not silently fall back to a default.

use std::num::NonZeroUsize;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::capacity::check_parameters;
use crate::duration::DEFAULT_MAX_STAGE_DAYS;
use crate::error::{ConfigError, ConfigurationError};

/// Default values for configuration
mod defaults {
    use std::num::NonZeroUsize;

    pub fn span_days() -> i64 { 365 }
    pub fn stagger_days() -> i64 { 7 }
    pub fn saturation() -> f64 { 0.85 }
    pub fn cohorts() -> u32 { 1 }
    pub fn max_stage_days() -> i64 { super::DEFAULT_MAX_STAGE_DAYS }
    pub fn worker_count() -> NonZeroUsize { NonZeroUsize::MIN }
}

/// Planning parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlanningConfig {
    /// Planning horizon in days.
    #[serde(default = "defaults::span_days")]
    pub span_days: i64,
    /// Days between successive job starts within a cohort.
    #[serde(default = "defaults::stagger_days")]
    pub stagger_days: i64,
    /// Fraction of each pool that may be occupied at once, in `(0, 1]`.
    #[serde(default = "defaults::saturation")]
    pub saturation: f64,
    /// Fixed job count. Derived from capacity when absent.
    #[serde(default)]
    pub batch_count: Option<usize>,
    /// Number of interleaved cohorts.
    #[serde(default = "defaults::cohorts")]
    pub cohorts: u32,
    /// Convergence limit for a single stage simulation.
    #[serde(default = "defaults::max_stage_days")]
    pub max_stage_days: i64,
    /// Master seed from which per-job seeds are drawn.
    #[serde(default)]
    pub base_seed: u64,
}

impl Default for PlanningConfig {
    fn default() -> Self {
        Self {
            span_days: defaults::span_days(),
            stagger_days: defaults::stagger_days(),
            saturation: defaults::saturation(),
            batch_count: None,
            cohorts: defaults::cohorts(),
            max_stage_days: defaults::max_stage_days(),
            base_seed: 0,
        }
    }
}

/// Execution parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExecutionConfig {
    /// Number of parallel workers.
    #[serde(default = "defaults::worker_count")]
    pub worker_count: NonZeroUsize,
    /// Failed jobs allowed before the run reports failure.
    #[serde(default)]
    pub failure_tolerance: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            worker_count: defaults::worker_count(),
            failure_tolerance: 0,
        }
    }
}

/// Complete scheduler configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchedulerConfig {
    /// Planning parameters.
    #[serde(default)]
    pub planning: PlanningConfig,
    /// Execution parameters.
    #[serde(default)]
    pub execution: ExecutionConfig,
}

impl SchedulerConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses, and validates a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Applies the same parameter rules as planning.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let p = &self.planning;
        check_parameters(p.span_days, p.stagger_days, p.saturation, p.cohorts)?;
        if p.max_stage_days <= 0 {
            return Err(ConfigurationError::NonPositiveStageLimit(p.max_stage_days));
        }
        Ok(())
    }
}
