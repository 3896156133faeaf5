//! Replay of a single job by its owning worker.

use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::{debug, warn};

use super::report::JobOutcome;
use crate::duration::{DurationModel, GrowthCurve};
use crate::error::JobExecutionError;
use crate::models::{CompletedStage, JobLog, JobStatus, LogEvent, PlannedJob};

/// Replays one job from its planned windows.
///
/// Failures and panics inside the job are recorded on the job and never
/// escape to the caller.
pub(crate) fn run_job<C: GrowthCurve>(
    model: &DurationModel<C>,
    planned: &PlannedJob,
    worker: usize,
) -> (JobOutcome, JobLog) {
    let job = &planned.job;
    let mut log = JobLog::new(job.job_id.clone());
    let mut outcome = JobOutcome::not_started(job.job_id.clone(), worker);

    if let Err(e) = log.append(job.start_day, LogEvent::Dequeued { worker }) {
        outcome.status = JobStatus::Failed;
        outcome.error = Some(e.into());
        return (outcome, log);
    }
    outcome.status = JobStatus::Running;

    let mut stages = Vec::with_capacity(job.stages.len());
    let result = catch_unwind(AssertUnwindSafe(|| {
        replay(model, planned, &mut log, &mut stages)
    }))
    .unwrap_or_else(|payload| Err(JobExecutionError::Panicked(panic_message(payload.as_ref()))));

    outcome.released_unit_days = stages.iter().map(CompletedStage::released_unit_days).sum();
    let last_day = stages
        .last()
        .map_or(job.start_day, |s| s.actual_end_day);
    outcome.stages = stages;

    let terminal = match result {
        Ok(()) => {
            debug!(job_id = %job.job_id, completion_day = last_day, "job completed");
            outcome.completion_day = Some(last_day);
            LogEvent::Completed {
                completion_day: last_day,
            }
        }
        Err(e) => {
            warn!(job_id = %job.job_id, error = %e, "job failed");
            let event = LogEvent::Failed {
                error: e.to_string(),
            };
            outcome.error = Some(e);
            event
        }
    };
    let failed = matches!(terminal, LogEvent::Failed { .. });
    match log.append(last_day, terminal) {
        Ok(()) => outcome.status = log.status(),
        Err(e) => {
            outcome.status = JobStatus::Failed;
            if !failed {
                outcome.error = Some(e.into());
                outcome.completion_day = None;
            }
        }
    }
    (outcome, log)
}

fn replay<C: GrowthCurve>(
    model: &DurationModel<C>,
    planned: &PlannedJob,
    log: &mut JobLog,
    stages: &mut Vec<CompletedStage>,
) -> Result<(), JobExecutionError> {
    let job = &planned.job;
    let mut entry = job.initial_state;

    for (index, stage) in job.stages.iter().enumerate() {
        let assignment = planned
            .assignment(stage.kind)
            .ok_or(JobExecutionError::MissingAssignment(stage.kind))?;
        log.append(
            assignment.start_day,
            LogEvent::StageStarted {
                stage: stage.kind,
                units: assignment.unit_ids.len(),
            },
        )?;

        let reach = model.actual_duration(
            job,
            index,
            entry,
            assignment.start_day,
            assignment.duration_days(),
        )?;
        let done = assignment
            .clone()
            .complete(assignment.start_day + reach.days)?;
        log.append(
            done.actual_end_day,
            LogEvent::StageCompleted {
                stage: stage.kind,
                actual_end_day: done.actual_end_day,
                planned_end_day: done.assignment.planned_end_day,
            },
        )?;

        entry = reach.state;
        stages.push(done);
    }
    Ok(())
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
