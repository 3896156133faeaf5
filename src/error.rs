//! Error types.
//!
//! Every failure here stems from deterministic inputs, so none of these
//! errors is retried: the remedy is a configuration or model fix.

use thiserror::Error;

use crate::models::{JobStatus, StageKind};
use crate::validation::InputError;

/// Invalid planning parameters or model configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("stagger must be positive, got {0} days")]
    NonPositiveStagger(i64),
    #[error("span must be positive, got {0} days")]
    NonPositiveSpan(i64),
    #[error("saturation must be in (0, 1], got {0}")]
    SaturationOutOfRange(f64),
    #[error("at least one cohort is required")]
    NoCohorts,
    #[error("stage simulation limit must be positive, got {0} days")]
    NonPositiveStageLimit(i64),
    #[error(
        "{stage} requires {required} units of '{unit_type}' but the largest pool holds \
         {available}"
    )]
    StageExceedsPool {
        stage: StageKind,
        unit_type: String,
        required: u32,
        available: usize,
    },
    #[error(
        "{stage} requires {required} units of '{unit_type}' but saturation allows at most \
         {limit} in any one pool"
    )]
    StageExceedsSaturation {
        stage: StageKind,
        unit_type: String,
        required: u32,
        limit: usize,
    },
    #[error("{stage} requires unit type '{unit_type}' which no pool provides")]
    UnknownUnitType { stage: StageKind, unit_type: String },
    #[error("environment series is empty")]
    EmptyEnvironment,
    #[error("environment value for day {day} is not finite")]
    NonFiniteEnvironment { day: i64 },
    #[error("no growth rate configured for {0}")]
    MissingStageRate(StageKind),
    #[error("growth rate for {stage} must be finite and non-negative, got {rate}")]
    InvalidStageRate { stage: StageKind, rate: f64 },
    #[error("{stage} of job '{job_id}' does not reach {target} within {limit_days} days")]
    StageDoesNotConverge {
        job_id: String,
        stage: StageKind,
        target: f64,
        limit_days: i64,
    },
    #[error("invalid planning input: {}", join_messages(.0))]
    InvalidInput(Vec<InputError>),
}

fn join_messages(errors: &[InputError]) -> String {
    errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

/// The planner could not satisfy a stage's resource request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "job '{job_id}' {stage}: needs {requested} units of '{unit_type}' over days \
     [{window_start}, {window_end}) but at most {available} can be allocated"
)]
pub struct CapacityExceededError {
    pub job_id: String,
    pub stage: StageKind,
    pub unit_type: String,
    pub window_start: i64,
    pub window_end: i64,
    pub requested: u32,
    pub available: usize,
}

/// Errors returned by planning.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlanError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
    #[error("capacity exceeded: {0}")]
    CapacityExceeded(#[from] CapacityExceededError),
}

/// A job status change that the state machine does not allow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid job status transition {from:?} -> {to:?}")]
pub struct InvalidTransition {
    pub from: JobStatus,
    pub to: JobStatus,
}

/// Failure inside one job's execution. Recorded as `Failed` for that job only.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum JobExecutionError {
    #[error(
        "{stage} did not reach {target} within its planned window \
         [{start_day}, {planned_end_day})"
    )]
    NotConverged {
        stage: StageKind,
        target: f64,
        start_day: i64,
        planned_end_day: i64,
    },
    #[error(
        "{stage}: target resampled from seed ({resampled}) differs from planned target \
         ({planned})"
    )]
    TargetMismatch {
        stage: StageKind,
        planned: f64,
        resampled: f64,
    },
    #[error("{stage} ended on day {actual_end_day}, after its planned end {planned_end_day}")]
    StageOverrun {
        stage: StageKind,
        actual_end_day: i64,
        planned_end_day: i64,
    },
    #[error("no assignment planned for {0}")]
    MissingAssignment(StageKind),
    #[error("no growth rate configured for {0}")]
    MissingRate(StageKind),
    #[error("job panicked: {0}")]
    Panicked(String),
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
}

/// Errors loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(#[from] ConfigurationError),
}

/// Errors writing records to a persistence sink.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("record serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}
