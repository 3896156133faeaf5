//! Deterministic staggered-cohort production scheduler.
//!
//! Allocates a finite inventory of typed, reusable resource units to many
//! long-running, multi-stage jobs whose stage durations are partly random.
//! Every random draw comes from the job's own seed and every stage is
//! planned at its worst case, so the resulting schedule is conflict-free
//! and can be replayed by independent workers without any locking.
//!
//! # Modules
//!
//! - **`models`**: Domain types: `Job`, `Stage`, `ResourcePool`,
//!   `StageAssignment`, `Schedule`, `ExecutionLog`
//! - **`capacity`**: Job-count bound from span, stagger, and saturation
//! - **`duration`**: Growth-curve stage durations (worst case and actual)
//! - **`scheduler`**: Planner, allocator, KPIs, and the `ProductionScheduler` facade
//! - **`validation`**: Input checks and schedule conflict detection
//! - **`executor`**: Parallel replay with per-job failure isolation
//! - **`config`**: TOML configuration
//! - **`sink`**: Persistence record contract
//! - **`error`**: Error types
//!
//! # Pipeline
//!
//! ```text
//! ConstraintCalculator → DurationModel (worst case) → SchedulePlanner
//!     → Schedule → validate → ScheduleExecutor → ExecutionReport
//! ```
//!
//! # References
//!
//! - Pinedo (2016), "Scheduling: Theory, Algorithms, and Systems"
//! - Brucker (2007), "Scheduling Algorithms"

pub mod capacity;
pub mod config;
pub mod duration;
pub mod error;
pub mod executor;
pub mod models;
pub mod scheduler;
pub mod sink;
pub mod validation;

pub use error::{CapacityExceededError, ConfigurationError, JobExecutionError, PlanError};
pub use executor::{ExecutionReport, ExitStatus};
pub use scheduler::{JobTemplate, ProductionScheduler};
pub use validation::{validate, Conflict};
