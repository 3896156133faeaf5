//! Scheduling domain models.
//!
//! Provides the data types shared by planning, validation, and execution.
//!
//! # Domain Mappings
//!
//! | u-cohort | Aquaculture | Fermentation | Greenhouse |
//! |----------|-------------|--------------|------------|
//! | Job | Fish batch | Brew | Crop batch |
//! | Stage | Hatchery / grow-out | Primary / conditioning | Propagation / finishing |
//! | ResourceUnit | Tank / pen | Fermenter | Bench |
//! | Schedule | Stocking plan | Cellar plan | Bench plan |

mod execution;
mod job;
mod resource;
mod schedule;
mod stage;

pub use execution::{ExecutionLog, JobLog, JobStatus, LogEntry, LogEvent};
pub use job::{Job, JobSeed};
pub use resource::{InventorySnapshot, ResourcePool, ResourceUnit};
pub use schedule::{CompletedStage, PlannedJob, Schedule, StageAssignment};
pub use stage::{ResourceRequirement, Stage, StageKind, TargetRange};
