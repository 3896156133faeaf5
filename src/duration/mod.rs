//! Weight-aware stage duration model.
//!
//! Stage durations come from a day-by-day growth simulation: a job leaves a
//! stage on the first day its state reaches the stage's exit target. The
//! target is random, but it is drawn from a generator seeded by the job, so
//! every draw can be replayed exactly.
//!
//! # Worst-case planning
//!
//! Planning evaluates each stage at the *maximum* of its target range and
//! at the *smallest* state the job can possibly enter the stage with.
//! Execution replays the same stage from the same start day with the real
//! (resampled) target and the real entry state. Since the real target is
//! never larger, the real entry state is never smaller, and the growth
//! curve is monotone, execution always finishes no later than planned:
//!
//! ```text
//! actual_duration(seed, stage) <= plan_duration(seed, stage)
//! ```
//!
//! # Stage boundaries
//!
//! A stage starts at its planned start day even when the previous stage
//! finished early. Between reaching its target and the next planned start,
//! a job holds its state.

mod curve;
mod environment;

pub use curve::{CubeRootGrowth, GrowthCurve, LinearGrowth};
pub use environment::{EnvironmentSeries, StageRateTable};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigurationError, JobExecutionError};
use crate::models::{Job, Stage, StageKind};

/// Default upper bound on a single stage's simulated duration (days).
pub const DEFAULT_MAX_STAGE_DAYS: i64 = 3650;

/// Result of solving for the first day a target is reached.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reach {
    /// Elapsed days until the target was first reached (0 if already reached).
    pub days: i64,
    /// State on that day (`>= target`).
    pub state: f64,
}

/// Worst-case window of one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedWindow {
    /// Stage order index.
    pub stage: StageKind,
    /// First day of the window.
    pub start_day: i64,
    /// Worst-case duration from the growth simulation.
    pub worst_case_days: i64,
    /// Exclusive end of the window (`start_day + max(worst_case_days, 1)`).
    pub end_day: i64,
}

impl PlannedWindow {
    /// Window length in days.
    pub fn len_days(&self) -> i64 {
        self.end_day - self.start_day
    }
}

/// Stage duration model over a growth curve, a rate table, and an
/// environment series.
#[derive(Debug, Clone)]
pub struct DurationModel<C = CubeRootGrowth> {
    curve: C,
    rates: StageRateTable,
    environment: EnvironmentSeries,
    max_stage_days: i64,
}

impl<C: GrowthCurve> DurationModel<C> {
    /// Creates a model.
    pub fn new(curve: C, rates: StageRateTable, environment: EnvironmentSeries) -> Self {
        Self {
            curve,
            rates,
            environment,
            max_stage_days: DEFAULT_MAX_STAGE_DAYS,
        }
    }

    /// Sets the convergence limit for a single stage.
    pub fn with_max_stage_days(mut self, days: i64) -> Self {
        self.max_stage_days = days.max(1);
        self
    }

    /// The growth curve.
    pub fn curve(&self) -> &C {
        &self.curve
    }

    /// The rate table.
    pub fn rates(&self) -> &StageRateTable {
        &self.rates
    }

    /// The environment series.
    pub fn environment(&self) -> &EnvironmentSeries {
        &self.environment
    }

    /// Convergence limit for a single stage.
    pub fn max_stage_days(&self) -> i64 {
        self.max_stage_days
    }

    /// Samples one exit target per stage from the job's seed.
    pub fn sample_targets(&self, job: &Job) -> Vec<f64> {
        job.seed.sample_targets(&job.stages)
    }

    /// Simulates from `start_day` until `target` is first reached.
    ///
    /// Returns `None` if the target is not reached within `limit_days`.
    pub fn days_to_reach(
        &self,
        state0: f64,
        target: f64,
        rate: f64,
        start_day: i64,
        limit_days: i64,
    ) -> Option<Reach> {
        let mut state = state0;
        if state >= target {
            return Some(Reach { days: 0, state });
        }
        for elapsed in 1..=limit_days {
            let env = self.environment.value_at(start_day + elapsed - 1);
            state = self.curve.advance(state, rate, env);
            if state >= target {
                return Some(Reach {
                    days: elapsed,
                    state,
                });
            }
        }
        None
    }

    /// Worst-case duration of one stage: time to reach the top of the
    /// stage's target range from `entry_state`, starting at `start_day`.
    pub fn plan_duration(
        &self,
        job_id: &str,
        stage: &Stage,
        entry_state: f64,
        start_day: i64,
    ) -> Result<i64, ConfigurationError> {
        let rate = self.rates.checked_rate(stage.kind)?;
        let target = stage.exit_target.max;
        self.days_to_reach(entry_state, target, rate, start_day, self.max_stage_days)
            .map(|r| r.days)
            .ok_or_else(|| ConfigurationError::StageDoesNotConverge {
                job_id: job_id.to_string(),
                stage: stage.kind,
                target,
                limit_days: self.max_stage_days,
            })
    }

    /// Worst-case windows for every stage of a job, chained from its start day.
    ///
    /// The entry state assumed for stage `i + 1` is the smallest state the
    /// job can leave stage `i` with: `max(entry_i, exit_target_i.min)`.
    /// Each window lasts at least one day.
    pub fn plan_job(&self, job: &Job) -> Result<Vec<PlannedWindow>, ConfigurationError> {
        let mut windows = Vec::with_capacity(job.stages.len());
        let mut start_day = job.start_day;
        let mut entry = job.initial_state;

        for stage in &job.stages {
            let worst = self.plan_duration(&job.job_id, stage, entry, start_day)?;
            let end_day = start_day + worst.max(1);
            windows.push(PlannedWindow {
                stage: stage.kind,
                start_day,
                worst_case_days: worst,
                end_day,
            });
            entry = entry.max(stage.exit_target.min);
            start_day = end_day;
        }

        Ok(windows)
    }

    /// Realized duration of stage `stage_index`.
    ///
    /// Resamples the job's targets from its seed, checks them against the
    /// planned targets, and solves for the first day the resampled target
    /// is reached, at most `limit_days` after `start_day`.
    pub fn actual_duration(
        &self,
        job: &Job,
        stage_index: usize,
        entry_state: f64,
        start_day: i64,
        limit_days: i64,
    ) -> Result<Reach, JobExecutionError> {
        let stage = job
            .stages
            .get(stage_index)
            .ok_or(JobExecutionError::MissingAssignment(StageKind(
                stage_index as u32,
            )))?;
        let resampled = self
            .sample_targets(job)
            .get(stage_index)
            .copied()
            .unwrap_or(f64::NAN);
        let planned = job.targets.get(stage_index).copied().unwrap_or(f64::NAN);
        if resampled.to_bits() != planned.to_bits() {
            return Err(JobExecutionError::TargetMismatch {
                stage: stage.kind,
                planned,
                resampled,
            });
        }

        let rate = self
            .rates
            .checked_rate(stage.kind)
            .map_err(|_| JobExecutionError::MissingRate(stage.kind))?;

        self.days_to_reach(entry_state, resampled, rate, start_day, limit_days)
            .ok_or(JobExecutionError::NotConverged {
                stage: stage.kind,
                target: resampled,
                start_day,
                planned_end_day: start_day + limit_days,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::JobSeed;
    use proptest::prelude::*;

    fn two_stage_job(seed: u64, initial: f64, start_day: i64) -> Job {
        let stages = vec![
            Stage::new(0, "tray", 1).with_exit_target(40.0, 80.0),
            Stage::new(1, "tank", 2).with_exit_target(300.0, 450.0),
        ];
        Job::new(format!("J{seed}"), start_day, JobSeed(seed), initial, stages)
    }

    fn model(env: EnvironmentSeries) -> DurationModel {
        let rates = StageRateTable::new()
            .with_rate(StageKind(0), 0.002)
            .with_rate(StageKind(1), 0.0015);
        DurationModel::new(CubeRootGrowth, rates, env)
    }

    fn seasonal() -> EnvironmentSeries {
        let values = (0..365)
            .map(|d| 11.0 + 5.0 * (d as f64 / 365.0 * std::f64::consts::TAU).sin())
            .collect();
        EnvironmentSeries::new(0, values).unwrap()
    }

    /// Replays every stage the way the executor does.
    fn replay(model: &DurationModel, job: &Job, windows: &[PlannedWindow]) -> Vec<i64> {
        let mut entry = job.initial_state;
        let mut days = Vec::new();
        for (i, w) in windows.iter().enumerate() {
            let reach = model
                .actual_duration(job, i, entry, w.start_day, w.len_days())
                .unwrap();
            days.push(reach.days);
            entry = reach.state;
        }
        days
    }

    #[test]
    fn test_days_to_reach_linear() {
        let m = DurationModel::new(
            LinearGrowth,
            StageRateTable::new(),
            EnvironmentSeries::constant(1.0).unwrap(),
        );
        let r = m.days_to_reach(0.0, 10.0, 2.0, 0, 100).unwrap();
        assert_eq!(r.days, 5);
        assert_eq!(r.state, 10.0);
        assert_eq!(m.days_to_reach(12.0, 10.0, 2.0, 0, 100).unwrap().days, 0);
        assert!(m.days_to_reach(0.0, 10.0, 2.0, 0, 4).is_none());
    }

    #[test]
    fn test_days_to_reach_uses_environment_by_day() {
        // Growth only happens on even days.
        let env = EnvironmentSeries::new(0, vec![1.0, 0.0]).unwrap();
        let m = DurationModel::new(LinearGrowth, StageRateTable::new(), env);
        assert_eq!(m.days_to_reach(0.0, 3.0, 1.0, 0, 100).unwrap().days, 5);
        assert_eq!(m.days_to_reach(0.0, 3.0, 1.0, 1, 100).unwrap().days, 6);
    }

    #[test]
    fn test_plan_job_chains_windows() {
        let m = model(seasonal());
        let job = two_stage_job(7, 5.0, 30);
        let windows = m.plan_job(&job).unwrap();

        assert_eq!(windows.len(), 2);
        assert_eq!(windows[0].start_day, 30);
        assert_eq!(windows[1].start_day, windows[0].end_day);
        assert!(windows.iter().all(|w| w.len_days() >= 1));
    }

    #[test]
    fn test_plan_uses_range_max() {
        let m = model(EnvironmentSeries::constant(10.0).unwrap());
        let stage = Stage::new(0, "tray", 1).with_exit_target(40.0, 80.0);
        let at_max = m.plan_duration("J", &stage, 5.0, 0).unwrap();
        let reach_min = m.days_to_reach(5.0, 40.0, 0.002, 0, 10_000).unwrap();
        assert!(at_max > reach_min.days);
    }

    #[test]
    fn test_plan_rejects_non_converging_stage() {
        let m = model(EnvironmentSeries::constant(0.0).unwrap()).with_max_stage_days(100);
        let job = two_stage_job(1, 5.0, 0);
        let err = m.plan_job(&job).unwrap_err();
        assert!(matches!(
            err,
            ConfigurationError::StageDoesNotConverge { limit_days: 100, .. }
        ));
    }

    #[test]
    fn test_plan_requires_rate() {
        let m = DurationModel::new(
            CubeRootGrowth,
            StageRateTable::new().with_rate(StageKind(0), 0.002),
            EnvironmentSeries::constant(10.0).unwrap(),
        );
        let err = m.plan_job(&two_stage_job(1, 5.0, 0)).unwrap_err();
        assert_eq!(err, ConfigurationError::MissingStageRate(StageKind(1)));
    }

    #[test]
    fn test_actual_detects_target_tampering() {
        let m = model(seasonal());
        let mut job = two_stage_job(11, 5.0, 0);
        job.targets[1] += 1.0;
        let windows = m.plan_job(&job).unwrap();
        assert!(m
            .actual_duration(&job, 0, 5.0, windows[0].start_day, windows[0].len_days())
            .is_ok());
        let err = m
            .actual_duration(&job, 1, 80.0, windows[1].start_day, windows[1].len_days())
            .unwrap_err();
        assert!(matches!(err, JobExecutionError::TargetMismatch { .. }));
    }

    #[test]
    fn test_actual_not_converged_inside_short_window() {
        let m = model(EnvironmentSeries::constant(10.0).unwrap());
        let job = two_stage_job(3, 5.0, 0);
        let err = m.actual_duration(&job, 0, 5.0, 0, 2).unwrap_err();
        assert!(matches!(
            err,
            JobExecutionError::NotConverged {
                start_day: 0,
                planned_end_day: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_same_seed_different_initial_state() {
        // Same seed → same targets; different initial state → different durations.
        let m = model(EnvironmentSeries::constant(10.0).unwrap());
        let small = two_stage_job(2024, 5.0, 0);
        let large = two_stage_job(2024, 35.0, 0);
        assert_eq!(m.sample_targets(&small), m.sample_targets(&large));

        let small_days = replay(&m, &small, &m.plan_job(&small).unwrap());
        let large_days = replay(&m, &large, &m.plan_job(&large).unwrap());
        assert_ne!(small_days[0], large_days[0]);
        assert!(large_days[0] < small_days[0]);
    }

    proptest! {
        #[test]
        fn actual_never_exceeds_plan(
            seed in any::<u64>(),
            initial in 0.5f64..30.0,
            start_day in 0i64..730,
            env in proptest::collection::vec(-2.0f64..25.0, 1..400),
        ) {
            // A strictly positive floor keeps every stage convergent.
            let env: Vec<f64> = env.into_iter().map(|v| v.max(2.0)).collect();
            let m = model(EnvironmentSeries::new(0, env).unwrap());
            let job = two_stage_job(seed, initial, start_day);
            let windows = m.plan_job(&job).unwrap();
            let actual = replay(&m, &job, &windows);
            for (w, days) in windows.iter().zip(actual) {
                prop_assert!(days <= w.worst_case_days);
                prop_assert!(days <= w.len_days());
            }
        }
    }
}
