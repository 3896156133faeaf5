//! Execution outcome and run report.

use crate::error::JobExecutionError;
use crate::models::{CompletedStage, ExecutionLog, JobStatus};
use crate::validation::Conflict;

/// Process exit status of an execution run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExitStatus {
    /// Every started job completed, or failures stayed within tolerance.
    Success,
    /// More jobs failed than the tolerance allows.
    FailuresExceeded,
    /// The schedule did not pass validation; nothing was executed.
    ValidationFailed,
    /// The run was cancelled before every job was started.
    Cancelled,
}

impl ExitStatus {
    /// Numeric exit code.
    pub fn code(self) -> i32 {
        match self {
            Self::Success => 0,
            Self::FailuresExceeded => 1,
            Self::ValidationFailed => 2,
            Self::Cancelled => 3,
        }
    }
}

/// Result of replaying one job.
#[derive(Debug, Clone, PartialEq)]
pub struct JobOutcome {
    /// Job ID.
    pub job_id: String,
    /// Worker that owned the job.
    pub worker: usize,
    /// Final status (`Planned` if the run was cancelled first).
    pub status: JobStatus,
    /// Stages that finished, in order.
    pub stages: Vec<CompletedStage>,
    /// Actual end day of the last stage, if the job completed.
    pub completion_day: Option<i64>,
    /// Failure cause, if the job failed.
    pub error: Option<JobExecutionError>,
    /// Unit-days freed by stages finishing before their planned end.
    pub released_unit_days: i64,
}

impl JobOutcome {
    pub(crate) fn not_started(job_id: impl Into<String>, worker: usize) -> Self {
        Self {
            job_id: job_id.into(),
            worker,
            status: JobStatus::Planned,
            stages: Vec::new(),
            completion_day: None,
            error: None,
            released_unit_days: 0,
        }
    }

    /// Realized stage durations in days, in stage order.
    pub fn actual_days(&self) -> Vec<i64> {
        self.stages.iter().map(CompletedStage::actual_days).collect()
    }
}

/// Aggregated result of an execution run.
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    /// Overall status.
    pub status: ExitStatus,
    /// Per-job outcomes, in schedule order. Empty if validation failed.
    pub outcomes: Vec<JobOutcome>,
    /// Merged execution log, in schedule order.
    pub log: ExecutionLog,
    /// Validation conflicts that prevented execution.
    pub conflicts: Vec<Conflict>,
}

impl ExecutionReport {
    pub(crate) fn rejected(conflicts: Vec<Conflict>) -> Self {
        Self {
            status: ExitStatus::ValidationFailed,
            outcomes: Vec::new(),
            log: ExecutionLog::default(),
            conflicts,
        }
    }

    /// Numeric exit code.
    pub fn exit_code(&self) -> i32 {
        self.status.code()
    }

    fn count(&self, status: JobStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }

    /// Number of completed jobs.
    pub fn completed_count(&self) -> usize {
        self.count(JobStatus::Completed)
    }

    /// Number of failed jobs.
    pub fn failed_count(&self) -> usize {
        self.count(JobStatus::Failed)
    }

    /// Number of jobs never started.
    pub fn not_started_count(&self) -> usize {
        self.count(JobStatus::Planned)
    }

    /// Failed job IDs with their errors.
    pub fn failed_jobs(&self) -> Vec<(&str, &JobExecutionError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.error.as_ref().map(|e| (o.job_id.as_str(), e)))
            .collect()
    }

    /// Outcome of one job.
    pub fn outcome(&self, job_id: &str) -> Option<&JobOutcome> {
        self.outcomes.iter().find(|o| o.job_id == job_id)
    }

    /// Unit-days released early across all jobs.
    pub fn released_unit_days(&self) -> i64 {
        self.outcomes.iter().map(|o| o.released_unit_days).sum()
    }
}
