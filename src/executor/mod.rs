//! Parallel schedule executor.
//!
//! Replays a validated [`Schedule`] across `N` workers. The planner already
//! guarantees that no unit is ever held by two jobs at once, so any split
//! of the jobs into disjoint groups is conflict-free: workers share no
//! mutable state and take no locks.
//!
//! # Algorithm
//!
//! 1. Run [`validate`]. Any conflict aborts the run before a single job
//!    starts (exit status 2).
//! 2. Deal jobs round-robin into `N` groups, in schedule order.
//! 3. Each worker replays its group sequentially on a scoped thread. For
//!    every stage it re-samples the job's target from its seed and solves
//!    for the first day the target is reached inside the planned window.
//! 4. A failing or panicking job is marked `Failed` and the worker moves on.
//! 5. Outcomes and per-job logs are merged back in schedule order.
//!
//! Cancellation is checked between jobs: the in-flight job finishes, the
//! remaining jobs of the worker stay `Planned`.
//!
//! Results never depend on `N`: each job is replayed from its own seed and
//! its own planned windows only.

mod report;
mod worker;

pub use report::{ExecutionReport, ExitStatus, JobOutcome};

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use tracing::{info, info_span, warn};

use crate::duration::{CubeRootGrowth, DurationModel, GrowthCurve};
use crate::error::JobExecutionError;
use crate::models::{ExecutionLog, JobLog, JobStatus, Schedule};
use crate::validation::validate;

/// Shared cancellation switch, checked by workers between jobs.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    /// Creates a flag that is not set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Deals `job_count` schedule positions round-robin into `workers` groups.
pub fn partition(job_count: usize, workers: NonZeroUsize) -> Vec<Vec<usize>> {
    let n = workers.get();
    let mut groups = vec![Vec::with_capacity(job_count.div_ceil(n)); n];
    for index in 0..job_count {
        groups[index % n].push(index);
    }
    groups
}

/// Replays schedules with a duration model.
#[derive(Debug, Clone)]
pub struct ScheduleExecutor<'a, C = CubeRootGrowth> {
    model: &'a DurationModel<C>,
    failure_tolerance: usize,
    cancellation: CancellationFlag,
}

impl<'a, C: GrowthCurve> ScheduleExecutor<'a, C> {
    /// Creates an executor with zero failure tolerance.
    pub fn new(model: &'a DurationModel<C>) -> Self {
        Self {
            model,
            failure_tolerance: 0,
            cancellation: CancellationFlag::new(),
        }
    }

    /// Sets how many failed jobs a run may contain and still succeed.
    pub fn with_failure_tolerance(mut self, tolerance: usize) -> Self {
        self.failure_tolerance = tolerance;
        self
    }

    /// Uses an externally controlled cancellation flag.
    pub fn with_cancellation(mut self, flag: CancellationFlag) -> Self {
        self.cancellation = flag;
        self
    }

    /// The cancellation flag observed by this executor's workers.
    pub fn cancellation(&self) -> &CancellationFlag {
        &self.cancellation
    }

    /// Validates and replays a schedule on `workers` threads.
    pub fn execute(&self, schedule: &Schedule, workers: NonZeroUsize) -> ExecutionReport {
        let span = info_span!("execute", jobs = schedule.job_count(), workers = workers.get());
        let _guard = span.enter();

        let conflicts = validate(schedule);
        if !conflicts.is_empty() {
            warn!(conflicts = conflicts.len(), "schedule rejected by validation");
            return ExecutionReport::rejected(conflicts);
        }

        let jobs = schedule.jobs();
        let groups = partition(jobs.len(), workers);
        let mut slots: Vec<Option<(JobOutcome, JobLog)>> = vec![None; jobs.len()];

        thread::scope(|scope| {
            let handles: Vec<_> = groups
                .iter()
                .enumerate()
                .map(|(worker, group)| {
                    let handle = scope.spawn(move || {
                        let mut results = Vec::with_capacity(group.len());
                        for &index in group {
                            let planned = &jobs[index];
                            let result = if self.cancellation.is_cancelled() {
                                (
                                    JobOutcome::not_started(planned.job.job_id.clone(), worker),
                                    JobLog::new(planned.job.job_id.clone()),
                                )
                            } else {
                                worker::run_job(self.model, planned, worker)
                            };
                            results.push((index, result));
                        }
                        results
                    });
                    (worker, handle)
                })
                .collect();

            for (worker, handle) in handles {
                match handle.join() {
                    Ok(results) => {
                        for (index, result) in results {
                            slots[index] = Some(result);
                        }
                    }
                    Err(_) => warn!(worker, "worker thread panicked"),
                }
            }
        });

        let mut outcomes = Vec::with_capacity(jobs.len());
        let mut logs = Vec::with_capacity(jobs.len());
        for (index, slot) in slots.into_iter().enumerate() {
            let (outcome, log) = slot.unwrap_or_else(|| {
                let job_id = jobs[index].job.job_id.clone();
                let mut outcome = JobOutcome::not_started(job_id.clone(), index % workers.get());
                outcome.status = JobStatus::Failed;
                outcome.error = Some(JobExecutionError::Panicked("worker lost".to_string()));
                (outcome, JobLog::new(job_id))
            });
            outcomes.push(outcome);
            logs.push(log);
        }

        let mut report = ExecutionReport {
            status: ExitStatus::Success,
            outcomes,
            log: ExecutionLog::from_job_logs(logs),
            conflicts,
        };
        report.status = if report.failed_count() > self.failure_tolerance {
            ExitStatus::FailuresExceeded
        } else if report.not_started_count() > 0 {
            ExitStatus::Cancelled
        } else {
            ExitStatus::Success
        };

        info!(
            completed = report.completed_count(),
            failed = report.failed_count(),
            not_started = report.not_started_count(),
            released_unit_days = report.released_unit_days(),
            exit_code = report.exit_code(),
            "execution finished"
        );
        report
    }
}
