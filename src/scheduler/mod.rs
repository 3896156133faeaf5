//! Planning pipeline and KPI evaluation.
//!
//! Provides the worst-case planner, its resource allocator, schedule
//! quality metrics, and [`ProductionScheduler`], which ties the whole
//! pipeline together:
//!
//! ```text
//! capacity bound → job creation → worst-case windows → allocation
//!     → Schedule → validate → parallel replay → ExecutionReport
//! ```
//!
//! # Algorithm
//!
//! `SchedulePlanner` is greedy in start order: every stage window is
//! reserved in full before the next stage or job is looked at. It does not
//! optimize utilization beyond the saturation target.
//!
//! # KPI
//!
//! `ScheduleKpi` reports makespan, per-pool peak occupancy, and utilization.
//!
//! # References
//!
//! - Pinedo (2016), "Scheduling: Theory, Algorithms, and Systems", Ch. 3-4
//! - Baker & Trietsch (2019), "Principles of Sequencing and Scheduling"

mod allocator;
mod kpi;
mod planner;

pub use allocator::ResourceAllocator;
pub use kpi::ScheduleKpi;
pub use planner::SchedulePlanner;

use std::num::NonZeroUsize;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::capacity::{
    check_parameters, CohortLayout, ConstraintCalculator, JobCountBound, JobSlot, StageDemand,
};
use crate::config::{PlanningConfig, SchedulerConfig};
use crate::duration::{CubeRootGrowth, DurationModel, GrowthCurve};
use crate::error::{ConfigurationError, PlanError};
use crate::executor::{ExecutionReport, ScheduleExecutor};
use crate::models::{InventorySnapshot, Job, JobSeed, Schedule, Stage};
use crate::validation::{validate, validate_template, Conflict};

/// Blueprint for the jobs a plan creates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobTemplate {
    /// Prefix of generated job IDs (`{prefix}0001`, `{prefix}0002`, ...).
    pub id_prefix: String,
    /// Stage sequence every job follows.
    pub stages: Vec<Stage>,
    /// State every job starts with.
    pub initial_state: f64,
}

impl JobTemplate {
    /// Creates a template with prefix `"J"` and initial state 0.
    pub fn new(stages: Vec<Stage>) -> Self {
        Self {
            id_prefix: "J".to_string(),
            stages,
            initial_state: 0.0,
        }
    }

    /// Sets the job ID prefix.
    pub fn with_id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.id_prefix = prefix.into();
        self
    }

    /// Sets the initial state.
    pub fn with_initial_state(mut self, state: f64) -> Self {
        self.initial_state = state;
        self
    }
}

/// End-to-end production scheduler: plan, validate, execute.
///
/// # Example
///
/// ```
/// use std::num::NonZeroUsize;
/// use u_cohort::duration::{DurationModel, EnvironmentSeries, LinearGrowth, StageRateTable};
/// use u_cohort::models::{InventorySnapshot, ResourcePool, Stage, StageKind};
/// use u_cohort::scheduler::{JobTemplate, ProductionScheduler};
/// use u_cohort::executor::ExitStatus;
///
/// let inventory = InventorySnapshot::default()
///     .with_pool(ResourcePool::new("P1", "tank").with_units(20));
/// let template = JobTemplate::new(vec![
///     Stage::new(0, "tank", 2).with_exit_target(40.0, 50.0),
/// ]);
/// let model = DurationModel::new(
///     LinearGrowth,
///     StageRateTable::new().with_rate(StageKind(0), 1.0),
///     EnvironmentSeries::constant(1.0).unwrap(),
/// );
///
/// let scheduler = ProductionScheduler::new(inventory, template, model);
/// let schedule = scheduler.plan(365, 10, 1.0, None).unwrap();
/// assert!(scheduler.validate(&schedule).is_empty());
///
/// let report = scheduler.execute(&schedule, NonZeroUsize::new(4).unwrap());
/// assert_eq!(report.status, ExitStatus::Success);
///
/// let scheduler = scheduler.with_worker_count(NonZeroUsize::new(2).unwrap());
/// assert_eq!(scheduler.run(&schedule).status, ExitStatus::Success);
/// ```
#[derive(Debug, Clone)]
pub struct ProductionScheduler<C = CubeRootGrowth> {
    inventory: InventorySnapshot,
    template: JobTemplate,
    model: DurationModel<C>,
    cohorts: u32,
    base_seed: u64,
    failure_tolerance: usize,
    worker_count: NonZeroUsize,
}

impl<C: GrowthCurve> ProductionScheduler<C> {
    /// Creates a scheduler with one cohort, seed 0, zero failure tolerance,
    /// and a single worker.
    pub fn new(
        inventory: InventorySnapshot,
        template: JobTemplate,
        model: DurationModel<C>,
    ) -> Self {
        Self {
            inventory,
            template,
            model,
            cohorts: 1,
            base_seed: 0,
            failure_tolerance: 0,
            worker_count: NonZeroUsize::MIN,
        }
    }

    /// Creates a scheduler from a validated configuration.
    pub fn from_config(
        config: &SchedulerConfig,
        inventory: InventorySnapshot,
        template: JobTemplate,
        model: DurationModel<C>,
    ) -> Result<Self, ConfigurationError> {
        config.validate()?;
        let model = model.with_max_stage_days(config.planning.max_stage_days);
        Ok(Self::new(inventory, template, model)
            .with_cohorts(config.planning.cohorts)
            .with_base_seed(config.planning.base_seed)
            .with_failure_tolerance(config.execution.failure_tolerance)
            .with_worker_count(config.execution.worker_count))
    }

    /// Sets the number of interleaved cohorts.
    pub fn with_cohorts(mut self, cohorts: u32) -> Self {
        self.cohorts = cohorts;
        self
    }

    /// Sets the master seed from which per-job seeds are drawn.
    pub fn with_base_seed(mut self, seed: u64) -> Self {
        self.base_seed = seed;
        self
    }

    /// Sets how many failed jobs an execution run tolerates.
    pub fn with_failure_tolerance(mut self, tolerance: usize) -> Self {
        self.failure_tolerance = tolerance;
        self
    }

    /// Sets the number of workers [`run`](Self::run) replays on.
    pub fn with_worker_count(mut self, workers: NonZeroUsize) -> Self {
        self.worker_count = workers;
        self
    }

    /// Workers used by [`run`](Self::run).
    pub fn worker_count(&self) -> NonZeroUsize {
        self.worker_count
    }

    /// The inventory snapshot.
    pub fn inventory(&self) -> &InventorySnapshot {
        &self.inventory
    }

    /// The job template.
    pub fn template(&self) -> &JobTemplate {
        &self.template
    }

    /// The duration model.
    pub fn model(&self) -> &DurationModel<C> {
        &self.model
    }

    /// Rejects a template whose jobs would fail input validation, before any
    /// job is built and any target is drawn from it.
    fn check_template(&self) -> Result<(), ConfigurationError> {
        validate_template(
            &self.template.id_prefix,
            &self.template.stages,
            self.template.initial_state,
            &self.inventory,
        )
        .map_err(ConfigurationError::InvalidInput)
    }

    /// Creates one job per slot. Seeds are drawn from the master seed in
    /// slot order, so a prefix of the slots always yields the same jobs.
    pub fn create_jobs(&self, slots: &[JobSlot]) -> Vec<Job> {
        let mut master = StdRng::seed_from_u64(self.base_seed);
        slots
            .iter()
            .enumerate()
            .map(|(i, slot)| {
                let seed = JobSeed(master.random());
                Job::new(
                    format!("{}{:04}", self.template.id_prefix, i + 1),
                    slot.start_day,
                    seed,
                    self.template.initial_state,
                    self.template.stages.clone(),
                )
                .with_cohort(slot.cohort)
            })
            .collect()
    }

    /// Maximum job count for the given parameters.
    ///
    /// Stage durations are the longest worst-case windows among every job
    /// that could start within the span.
    pub fn bound(
        &self,
        span_days: i64,
        stagger_days: i64,
        saturation: f64,
    ) -> Result<JobCountBound, PlanError> {
        Ok(self.bound_with_candidates(span_days, stagger_days, saturation)?.0)
    }

    fn bound_with_candidates(
        &self,
        span_days: i64,
        stagger_days: i64,
        saturation: f64,
    ) -> Result<(JobCountBound, Vec<Job>), PlanError> {
        check_parameters(span_days, stagger_days, saturation, self.cohorts)?;
        self.check_template()?;
        let layout = CohortLayout::new(self.cohorts, stagger_days);
        let candidates = self.create_jobs(&layout.slots_within(span_days));

        let mut durations = vec![1i64; self.template.stages.len()];
        for job in &candidates {
            for (i, window) in self.model.plan_job(job)?.iter().enumerate() {
                durations[i] = durations[i].max(window.len_days());
            }
        }
        let demands: Vec<StageDemand> = self
            .template
            .stages
            .iter()
            .zip(&durations)
            .map(|(stage, &days)| StageDemand::from_stage(stage).with_duration(days))
            .collect();

        let bound = ConstraintCalculator::new(&self.inventory)
            .with_cohorts(self.cohorts)
            .max_job_count(span_days, stagger_days, saturation, &demands)?;
        Ok((bound, candidates))
    }

    /// Plans a schedule.
    ///
    /// With `batch_count = None` the job count is derived from the capacity
    /// bound. With `Some(n)` exactly `n` jobs are planned, and the planner
    /// fails fast if they do not fit.
    pub fn plan(
        &self,
        span_days: i64,
        stagger_days: i64,
        saturation: f64,
        batch_count: Option<usize>,
    ) -> Result<Schedule, PlanError> {
        let jobs = match batch_count {
            Some(count) => {
                check_parameters(span_days, stagger_days, saturation, self.cohorts)?;
                self.check_template()?;
                let layout = CohortLayout::new(self.cohorts, stagger_days);
                self.create_jobs(&layout.first_slots(count))
            }
            None => {
                let (bound, mut candidates) =
                    self.bound_with_candidates(span_days, stagger_days, saturation)?;
                info!(
                    time_bound = bound.time_bound,
                    resource_bound = ?bound.resource_bound,
                    job_count = bound.job_count,
                    "job count derived"
                );
                candidates.truncate(bound.job_count);
                candidates
            }
        };

        SchedulePlanner::new(&self.model, &self.inventory)
            .with_saturation(saturation)
            .plan(&jobs)
    }

    /// Plans with the parameters of a planning configuration.
    pub fn plan_from_config(&self, config: &PlanningConfig) -> Result<Schedule, PlanError> {
        self.plan(
            config.span_days,
            config.stagger_days,
            config.saturation,
            config.batch_count,
        )
    }

    /// Re-verifies a schedule.
    pub fn validate(&self, schedule: &Schedule) -> Vec<Conflict> {
        validate(schedule)
    }

    /// An executor over this scheduler's duration model.
    pub fn executor(&self) -> ScheduleExecutor<'_, C> {
        ScheduleExecutor::new(&self.model).with_failure_tolerance(self.failure_tolerance)
    }

    /// Validates and replays a schedule on `workers` threads.
    pub fn execute(&self, schedule: &Schedule, workers: NonZeroUsize) -> ExecutionReport {
        self.executor().execute(schedule, workers)
    }

    /// Validates and replays a schedule on the configured worker count.
    pub fn run(&self, schedule: &Schedule) -> ExecutionReport {
        self.execute(schedule, self.worker_count)
    }
}
