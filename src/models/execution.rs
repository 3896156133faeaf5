//! Execution state and the append-only execution log.
//!
//! Each job moves through `Planned → Running → {Completed | Failed}`.
//! Every job has exactly one log, written only by the worker that owns the
//! job. Entries are appended and never rewritten.

use serde::{Deserialize, Serialize};

use super::StageKind;
use crate::error::InvalidTransition;

/// Lifecycle status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// In the schedule, not yet picked up by a worker.
    Planned,
    /// Dequeued by its owning worker.
    Running,
    /// Every stage finished within its planned window.
    Completed,
    /// An unrecoverable per-stage error occurred.
    Failed,
}

impl JobStatus {
    /// Whether no further transitions are possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Applies a transition, rejecting anything outside the state machine.
    pub fn transition(self, to: JobStatus) -> Result<JobStatus, InvalidTransition> {
        match (self, to) {
            (Self::Planned, Self::Running)
            | (Self::Running, Self::Completed)
            | (Self::Running, Self::Failed) => Ok(to),
            (from, to) => Err(InvalidTransition { from, to }),
        }
    }
}

/// What happened to a job at a given day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LogEvent {
    /// The owning worker picked the job up.
    Dequeued { worker: usize },
    /// A stage began on its assigned units.
    StageStarted { stage: StageKind, units: usize },
    /// A stage reached its exit target.
    StageCompleted {
        stage: StageKind,
        actual_end_day: i64,
        planned_end_day: i64,
    },
    /// All stages completed.
    Completed { completion_day: i64 },
    /// The job failed.
    Failed { error: String },
}

impl LogEvent {
    /// Status change implied by this event, if any.
    fn status_change(&self) -> Option<JobStatus> {
        match self {
            Self::Dequeued { .. } => Some(JobStatus::Running),
            Self::Completed { .. } => Some(JobStatus::Completed),
            Self::Failed { .. } => Some(JobStatus::Failed),
            Self::StageStarted { .. } | Self::StageCompleted { .. } => None,
        }
    }
}

/// One log record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Job the entry belongs to.
    pub job_id: String,
    /// Position within the job's log (0-based).
    pub sequence: u32,
    /// Simulation day of the event.
    pub day: i64,
    /// Job status after the event.
    pub status: JobStatus,
    /// The event.
    #[serde(flatten)]
    pub event: LogEvent,
}

/// Append-only log of one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobLog {
    job_id: String,
    status: JobStatus,
    entries: Vec<LogEntry>,
}

impl JobLog {
    /// Creates an empty log for a planned job.
    pub fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            status: JobStatus::Planned,
            entries: Vec::new(),
        }
    }

    /// Appends an event, advancing the status when the event implies it.
    ///
    /// Events after a terminal status, and status changes the state machine
    /// forbids, are rejected and leave the log unchanged.
    pub fn append(&mut self, day: i64, event: LogEvent) -> Result<(), InvalidTransition> {
        let status = match event.status_change() {
            Some(next) => self.status.transition(next)?,
            None if self.status != JobStatus::Running => {
                return Err(InvalidTransition {
                    from: self.status,
                    to: JobStatus::Running,
                })
            }
            None => self.status,
        };
        self.entries.push(LogEntry {
            job_id: self.job_id.clone(),
            sequence: self.entries.len() as u32,
            day,
            status,
            event,
        });
        self.status = status;
        Ok(())
    }

    /// Job ID.
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Current status.
    pub fn status(&self) -> JobStatus {
        self.status
    }

    /// Entries in append order.
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }
}

/// Execution log of a whole run: one `JobLog` per job, in schedule order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionLog {
    jobs: Vec<JobLog>,
}

impl ExecutionLog {
    /// Assembles a run log from per-job logs.
    pub fn from_job_logs(jobs: Vec<JobLog>) -> Self {
        Self { jobs }
    }

    /// Per-job logs.
    pub fn job_logs(&self) -> &[JobLog] {
        &self.jobs
    }

    /// Log of one job.
    pub fn job(&self, job_id: &str) -> Option<&JobLog> {
        self.jobs.iter().find(|j| j.job_id == job_id)
    }

    /// All entries, job by job.
    pub fn entries(&self) -> impl Iterator<Item = &LogEntry> {
        self.jobs.iter().flat_map(|j| j.entries.iter())
    }

    /// Total number of entries.
    pub fn len(&self) -> usize {
        self.jobs.iter().map(|j| j.entries.len()).sum()
    }

    /// Whether no entry was written.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
