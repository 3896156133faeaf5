//! Worst-case schedule planner.
//!
//! # Algorithm
//!
//! 1. Validate the jobs and the inventory.
//! 2. Order jobs by `(start_day, cohort, job_id)`.
//! 3. For each job, compute its chained worst-case stage windows.
//! 4. For each stage window, reserve the required units through the
//!    [`ResourceAllocator`] for the entire window.
//! 5. The first request that cannot be met aborts the run.
//!
//! Planning is single-threaded and depends only on its inputs: the same
//! jobs, seeds, inventory, and model always produce a byte-identical
//! [`Schedule`].
//!
//! # Complexity
//! O(n · s · a) where n = jobs, s = stages per job, a = allocator cost.
//!
//! # Reference
//! Pinedo (2016), "Scheduling", Ch. 4: Priority Dispatching

use tracing::{debug, info, info_span, warn};

use super::allocator::ResourceAllocator;
use crate::capacity::check_saturation;
use crate::duration::{CubeRootGrowth, DurationModel, GrowthCurve};
use crate::error::{ConfigurationError, PlanError};
use crate::models::{InventorySnapshot, Job, PlannedJob, Schedule};
use crate::validation::validate_input;

/// Plans jobs against a fixed inventory using worst-case stage durations.
///
/// # Example
///
/// ```
/// use u_cohort::duration::{DurationModel, EnvironmentSeries, LinearGrowth, StageRateTable};
/// use u_cohort::models::{InventorySnapshot, Job, JobSeed, ResourcePool, Stage, StageKind};
/// use u_cohort::scheduler::SchedulePlanner;
///
/// let model = DurationModel::new(
///     LinearGrowth,
///     StageRateTable::new().with_rate(StageKind(0), 1.0),
///     EnvironmentSeries::constant(1.0).unwrap(),
/// );
/// let inventory = InventorySnapshot::default()
///     .with_pool(ResourcePool::new("P1", "tank").with_units(2));
/// let stages = vec![Stage::new(0, "tank", 1).with_exit_target(5.0, 10.0)];
/// let jobs = vec![Job::new("J1", 0, JobSeed(7), 0.0, stages)];
///
/// let schedule = SchedulePlanner::new(&model, &inventory).plan(&jobs).unwrap();
/// assert_eq!(schedule.assignment_count(), 1);
/// assert_eq!(schedule.makespan_day(), 10);
/// ```
#[derive(Debug, Clone)]
pub struct SchedulePlanner<'a, C = CubeRootGrowth> {
    model: &'a DurationModel<C>,
    inventory: &'a InventorySnapshot,
    saturation: f64,
}

impl<'a, C: GrowthCurve> SchedulePlanner<'a, C> {
    /// Creates a planner allowing full pool occupancy.
    pub fn new(model: &'a DurationModel<C>, inventory: &'a InventorySnapshot) -> Self {
        Self {
            model,
            inventory,
            saturation: 1.0,
        }
    }

    /// Sets the saturation factor (fraction of each pool that may be
    /// occupied at once).
    pub fn with_saturation(mut self, saturation: f64) -> Self {
        self.saturation = saturation;
        self
    }

    /// Plans every job or fails without producing a schedule.
    ///
    /// # Errors
    /// - [`PlanError::Configuration`] for invalid input, an out-of-range
    ///   saturation, a stage larger than every pool of its type, or a
    ///   stage that never converges.
    /// - [`PlanError::CapacityExceeded`] naming the first job and stage
    ///   whose window cannot be served.
    pub fn plan(&self, jobs: &[Job]) -> Result<Schedule, PlanError> {
        let span = info_span!("plan", jobs = jobs.len(), saturation = self.saturation);
        let _guard = span.enter();

        check_saturation(self.saturation)?;
        validate_input(jobs, self.inventory).map_err(ConfigurationError::InvalidInput)?;
        self.check_stage_sizes(jobs)?;

        let mut order: Vec<&Job> = jobs.iter().collect();
        order.sort_by(|a, b| {
            (a.start_day, a.cohort, &a.job_id).cmp(&(b.start_day, b.cohort, &b.job_id))
        });

        let mut allocator = ResourceAllocator::new(self.inventory, self.saturation);
        let mut planned = Vec::with_capacity(order.len());

        for job in order {
            let windows = self.model.plan_job(job)?;
            let mut assignments = Vec::with_capacity(windows.len());
            for (stage, window) in job.stages.iter().zip(&windows) {
                let assignment = allocator
                    .allocate(&job.job_id, stage, window.start_day, window.end_day)
                    .map_err(|e| {
                        warn!(
                            job_id = %e.job_id,
                            stage = e.stage.0,
                            requested = e.requested,
                            available = e.available,
                            "capacity exceeded"
                        );
                        e
                    })?;
                assignments.push(assignment);
            }
            debug!(
                job_id = %job.job_id,
                start_day = job.start_day,
                end_day = windows.last().map(|w| w.end_day).unwrap_or(job.start_day),
                "job planned"
            );
            planned.push(PlannedJob {
                job: job.clone(),
                assignments,
            });
        }

        let schedule =
            Schedule::from_parts(self.saturation, self.inventory.sorted_pools(), planned);
        info!(
            jobs = schedule.job_count(),
            assignments = schedule.assignment_count(),
            makespan_day = schedule.makespan_day(),
            reserved_unit_days = allocator.reserved_unit_days(),
            "schedule planned"
        );
        Ok(schedule)
    }

    /// Rejects stages that need more units than the largest pool of their
    /// type holds, or more than any one pool may occupy at the saturation
    /// target. Such a stage can never be served.
    fn check_stage_sizes(&self, jobs: &[Job]) -> Result<(), ConfigurationError> {
        for stage in jobs.iter().flat_map(|j| j.stages.iter()) {
            let unit_type = &stage.requirement.unit_type;
            let required = stage.requirement.count as usize;
            let pools = self.inventory.pools_of_type(unit_type);
            let largest = pools.iter().map(|p| p.total_count()).max().unwrap_or(0);
            if required > largest {
                return Err(ConfigurationError::StageExceedsPool {
                    stage: stage.kind,
                    unit_type: unit_type.clone(),
                    required: stage.requirement.count,
                    available: largest,
                });
            }
            let usable = pools
                .iter()
                .map(|p| p.unit_limit(self.saturation))
                .max()
                .unwrap_or(0);
            if required > usable {
                return Err(ConfigurationError::StageExceedsSaturation {
                    stage: stage.kind,
                    unit_type: unit_type.clone(),
                    required: stage.requirement.count,
                    limit: usable,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::duration::{EnvironmentSeries, LinearGrowth, StageRateTable};
    use crate::models::{JobSeed, ResourcePool, Stage, StageKind};
    use crate::validation::validate;
    use proptest::prelude::*;

    fn linear_model() -> DurationModel<LinearGrowth> {
        DurationModel::new(
            LinearGrowth,
            StageRateTable::new()
                .with_rate(StageKind(0), 1.0)
                .with_rate(StageKind(1), 2.0),
            EnvironmentSeries::constant(1.0).unwrap(),
        )
    }

    fn stages(units0: u32, units1: u32) -> Vec<Stage> {
        vec![
            Stage::new(0, "tray", units0).with_exit_target(5.0, 15.0),
            Stage::new(1, "tank", units1).with_exit_target(20.0, 45.0),
        ]
    }

    fn inventory(trays: usize, tanks: usize) -> InventorySnapshot {
        InventorySnapshot::default()
            .with_pool(ResourcePool::new("TR", "tray").with_units(trays))
            .with_pool(ResourcePool::new("TK", "tank").with_units(tanks))
    }

    fn jobs(count: usize, stagger: i64, units0: u32, units1: u32) -> Vec<Job> {
        (0..count)
            .map(|i| {
                Job::new(
                    format!("J{i:04}"),
                    i as i64 * stagger,
                    JobSeed(1000 + i as u64),
                    0.0,
                    stages(units0, units1),
                )
            })
            .collect()
    }

    #[test]
    fn test_plan_windows_are_worst_case() {
        let model = linear_model();
        let inv = inventory(4, 4);
        let schedule = SchedulePlanner::new(&model, &inv)
            .plan(&jobs(1, 10, 1, 2))
            .unwrap();

        // Stage 0: 0 → 15 at 1/day = 15 days.
        // Stage 1: entry max(0, 5) = 5 → 45 at 2/day = 20 days.
        let job = &schedule.jobs()[0];
        assert_eq!(job.assignments[0].start_day, 0);
        assert_eq!(job.assignments[0].planned_end_day, 15);
        assert_eq!(job.assignments[1].start_day, 15);
        assert_eq!(job.assignments[1].planned_end_day, 35);
        assert_eq!(job.assignments[1].unit_ids.len(), 2);
        assert_eq!(job.assignments[1].pool_id, "TK");
    }

    #[test]
    fn test_jobs_processed_in_start_order() {
        let model = linear_model();
        let inv = inventory(4, 4);
        let mut input = jobs(3, 5, 1, 1);
        input.reverse();
        input[0] = input[0].clone().with_cohort(1);

        let schedule = SchedulePlanner::new(&model, &inv).plan(&input).unwrap();
        let ids: Vec<&str> = schedule.jobs().iter().map(|j| j.job.job_id.as_str()).collect();
        assert_eq!(ids, vec!["J0000", "J0001", "J0002"]);
    }

    #[test]
    fn test_capacity_exhaustion_names_first_violation() {
        // 10 one-unit trays, 15-day windows, one job per day.
        let model = linear_model();
        let inv = inventory(10, 1000);
        let err = SchedulePlanner::new(&model, &inv)
            .plan(&jobs(1000, 1, 1, 1))
            .unwrap_err();

        match err {
            PlanError::CapacityExceeded(e) => {
                assert_eq!(e.job_id, "J0010");
                assert_eq!(e.stage, StageKind(0));
                assert_eq!(e.unit_type, "tray");
                assert_eq!((e.window_start, e.window_end), (10, 25));
                assert_eq!(e.available, 0);
            }
            other => panic!("expected capacity error, got {other:?}"),
        }
    }

    #[test]
    fn test_saturation_limits_allocation() {
        let model = linear_model();
        let inv = inventory(10, 10);
        let planner = SchedulePlanner::new(&model, &inv).with_saturation(0.5);
        // 5 trays usable; 6 jobs starting the same day cannot all fit.
        let same_day: Vec<Job> = (0..6)
            .map(|i| Job::new(format!("S{i}"), 0, JobSeed(i), 0.0, stages(1, 1)))
            .collect();
        assert!(matches!(
            planner.plan(&same_day[..5]),
            Ok(ref s) if s.job_count() == 5
        ));
        assert!(matches!(
            planner.plan(&same_day),
            Err(PlanError::CapacityExceeded(ref e)) if e.job_id == "S5"
        ));
    }

    #[test]
    fn test_invalid_input_rejected() {
        let model = linear_model();
        let inv = inventory(4, 4);
        let mut input = jobs(2, 5, 1, 1);
        input[1].job_id = input[0].job_id.clone();

        let err = SchedulePlanner::new(&model, &inv).plan(&input).unwrap_err();
        assert!(matches!(
            err,
            PlanError::Configuration(ConfigurationError::InvalidInput(ref errors))
                if errors.len() == 1
        ));
    }

    #[test]
    fn test_stage_larger_than_pool_rejected() {
        let model = linear_model();
        let inv = inventory(4, 4);
        let err = SchedulePlanner::new(&model, &inv)
            .plan(&jobs(1, 5, 1, 5))
            .unwrap_err();
        assert_eq!(
            err,
            PlanError::Configuration(ConfigurationError::StageExceedsPool {
                stage: StageKind(1),
                unit_type: "tank".into(),
                required: 5,
                available: 4,
            })
        );
    }

    #[test]
    fn test_stage_above_saturation_limit_rejected() {
        // floor(4 × 0.5) = 2 tanks usable, stage 1 needs 3.
        let model = linear_model();
        let inv = inventory(4, 4);
        let err = SchedulePlanner::new(&model, &inv)
            .with_saturation(0.5)
            .plan(&jobs(1, 5, 1, 3))
            .unwrap_err();
        assert_eq!(
            err,
            PlanError::Configuration(ConfigurationError::StageExceedsSaturation {
                stage: StageKind(1),
                unit_type: "tank".into(),
                required: 3,
                limit: 2,
            })
        );
    }

    #[test]
    fn test_bad_saturation_rejected() {
        let model = linear_model();
        let inv = inventory(4, 4);
        let err = SchedulePlanner::new(&model, &inv)
            .with_saturation(1.5)
            .plan(&jobs(1, 5, 1, 1))
            .unwrap_err();
        assert_eq!(
            err,
            PlanError::Configuration(ConfigurationError::SaturationOutOfRange(1.5))
        );
    }

    #[test]
    fn test_empty_job_list() {
        let model = linear_model();
        let inv = inventory(1, 1);
        let schedule = SchedulePlanner::new(&model, &inv).plan(&[]).unwrap();
        assert!(schedule.is_empty());
        assert!(validate(&schedule).is_empty());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn planned_schedules_never_overlap(
            trays in 1usize..8,
            tanks in 2usize..12,
            stagger in 1i64..20,
            count in 1usize..40,
            units1 in 1u32..3,
            saturation in 0.3f64..1.0,
        ) {
            let model = linear_model();
            let inv = inventory(trays, tanks);
            let result = SchedulePlanner::new(&model, &inv)
                .with_saturation(saturation)
                .plan(&jobs(count, stagger, 1, units1));

            match result {
                Ok(schedule) => {
                    prop_assert_eq!(schedule.job_count(), count);
                    prop_assert!(validate(&schedule).is_empty());
                }
                Err(PlanError::CapacityExceeded(_)) => {}
                Err(PlanError::Configuration(
                    ConfigurationError::StageExceedsSaturation { .. },
                )) => {}
                Err(other) => prop_assert!(false, "unexpected error: {other}"),
            }
        }

        #[test]
        fn planning_is_idempotent(
            stagger in 1i64..15,
            count in 1usize..25,
        ) {
            let model = linear_model();
            let inv = inventory(40, 80);
            let input = jobs(count, stagger, 1, 2);
            let planner = SchedulePlanner::new(&model, &inv).with_saturation(0.9);

            let first = planner.plan(&input);
            let second = planner.plan(&input);
            match (first, second) {
                (Ok(a), Ok(b)) => prop_assert_eq!(
                    a.to_json_bytes().unwrap(),
                    b.to_json_bytes().unwrap()
                ),
                (Err(a), Err(b)) => prop_assert_eq!(a, b),
                _ => prop_assert!(false, "runs disagree"),
            }
        }
    }
}
