//! Schedule (solution) model.
//!
//! A schedule binds every stage of every job to concrete resource units
//! over a fixed day window. It is the sole output of planning and is never
//! mutated afterwards. Re-planning produces a new value. Execution records
//! actual completion days in its own log and leaves the schedule untouched.

use serde::{Deserialize, Serialize};

use super::{Job, ResourcePool, StageKind};
use crate::error::JobExecutionError;

/// A (job, stage) → units × days binding over `[start_day, planned_end_day)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageAssignment {
    /// Owning job.
    pub job_id: String,
    /// Stage order index.
    pub stage: StageKind,
    /// Pool the units were drawn from.
    pub pool_id: String,
    /// Assigned units, in selection order.
    pub unit_ids: Vec<String>,
    /// First occupied day.
    pub start_day: i64,
    /// First day after the worst-case window.
    pub planned_end_day: i64,
}

impl StageAssignment {
    /// Creates an assignment.
    pub fn new(
        job_id: impl Into<String>,
        stage: StageKind,
        pool_id: impl Into<String>,
        unit_ids: Vec<String>,
        start_day: i64,
        planned_end_day: i64,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            stage,
            pool_id: pool_id.into(),
            unit_ids,
            start_day,
            planned_end_day,
        }
    }

    /// Window length in days.
    #[inline]
    pub fn duration_days(&self) -> i64 {
        self.planned_end_day - self.start_day
    }

    /// Unit-days reserved by this assignment.
    pub fn unit_days(&self) -> i64 {
        self.duration_days() * self.unit_ids.len() as i64
    }

    /// Whether the window intersects `[start_day, end_day)`.
    #[inline]
    pub fn overlaps(&self, start_day: i64, end_day: i64) -> bool {
        self.start_day < end_day && start_day < self.planned_end_day
    }

    /// Whether the assignment holds the given unit.
    pub fn uses_unit(&self, unit_id: &str) -> bool {
        self.unit_ids.iter().any(|u| u == unit_id)
    }

    /// Records the actual end day, consuming the assignment.
    ///
    /// Fails if the stage ran past its planned window.
    pub fn complete(self, actual_end_day: i64) -> Result<CompletedStage, JobExecutionError> {
        if actual_end_day > self.planned_end_day {
            return Err(JobExecutionError::StageOverrun {
                stage: self.stage,
                actual_end_day,
                planned_end_day: self.planned_end_day,
            });
        }
        Ok(CompletedStage {
            assignment: self,
            actual_end_day,
        })
    }
}

/// A stage assignment with its recorded actual end day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedStage {
    /// The planned assignment.
    pub assignment: StageAssignment,
    /// Day the stage reached its exit target (`<= planned_end_day`).
    pub actual_end_day: i64,
}

impl CompletedStage {
    /// Realized duration in days.
    pub fn actual_days(&self) -> i64 {
        self.actual_end_day - self.assignment.start_day
    }

    /// Unit-days between the actual and the planned end.
    pub fn released_unit_days(&self) -> i64 {
        (self.assignment.planned_end_day - self.actual_end_day)
            * self.assignment.unit_ids.len() as i64
    }
}

/// A job together with its resolved stage assignments (one per stage, in order).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedJob {
    /// The job.
    pub job: Job,
    /// Assignments in stage order.
    pub assignments: Vec<StageAssignment>,
}

impl PlannedJob {
    /// Assignment for a given stage.
    pub fn assignment(&self, stage: StageKind) -> Option<&StageAssignment> {
        self.assignments.iter().find(|a| a.stage == stage)
    }

    /// End of the last planned window.
    pub fn planned_end_day(&self) -> Option<i64> {
        self.assignments.iter().map(|a| a.planned_end_day).max()
    }
}

/// The complete, immutable output of planning.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    saturation: f64,
    pools: Vec<ResourcePool>,
    jobs: Vec<PlannedJob>,
}

impl Schedule {
    /// Assembles a schedule from its parts.
    ///
    /// The planner is the normal producer. Other callers (deserialization,
    /// tests) must run the result through [`crate::validation::validate`].
    pub fn from_parts(saturation: f64, pools: Vec<ResourcePool>, jobs: Vec<PlannedJob>) -> Self {
        Self {
            saturation,
            pools,
            jobs,
        }
    }

    /// Saturation factor the schedule was planned with.
    pub fn saturation(&self) -> f64 {
        self.saturation
    }

    /// Inventory snapshot the schedule was planned against.
    pub fn pools(&self) -> &[ResourcePool] {
        &self.pools
    }

    /// Finds a pool by ID.
    pub fn pool(&self, pool_id: &str) -> Option<&ResourcePool> {
        self.pools.iter().find(|p| p.pool_id == pool_id)
    }

    /// Planned jobs in processing order.
    pub fn jobs(&self) -> &[PlannedJob] {
        &self.jobs
    }

    /// Finds a planned job by ID.
    pub fn job(&self, job_id: &str) -> Option<&PlannedJob> {
        self.jobs.iter().find(|j| j.job.job_id == job_id)
    }

    /// All assignments, job by job.
    pub fn assignments(&self) -> impl Iterator<Item = &StageAssignment> {
        self.jobs.iter().flat_map(|j| j.assignments.iter())
    }

    /// Assignments holding a given unit.
    pub fn assignments_for_unit(&self, unit_id: &str) -> Vec<&StageAssignment> {
        self.assignments().filter(|a| a.uses_unit(unit_id)).collect()
    }

    /// Number of jobs.
    pub fn job_count(&self) -> usize {
        self.jobs.len()
    }

    /// Number of assignments.
    pub fn assignment_count(&self) -> usize {
        self.jobs.iter().map(|j| j.assignments.len()).sum()
    }

    /// Whether the schedule contains no jobs.
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// First occupied day.
    pub fn first_day(&self) -> i64 {
        self.assignments().map(|a| a.start_day).min().unwrap_or(0)
    }

    /// Latest planned end day.
    pub fn makespan_day(&self) -> i64 {
        self.assignments()
            .map(|a| a.planned_end_day)
            .max()
            .unwrap_or(0)
    }

    /// Canonical serialized form. Identical inputs to the planner produce
    /// identical bytes.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}
