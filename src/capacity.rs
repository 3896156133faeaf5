//! Capacity bounds for staggered cohorts.
//!
//! Computes how many jobs a planning horizon can hold, before any
//! allocation is attempted.
//!
//! # Time bound
//!
//! `m` interleaved cohorts each start a job every `stagger` days. Cohort
//! `c` is offset by `floor(c × stagger / m)` days. A job is counted only if
//! a full stagger interval fits between its start and the end of the span:
//!
//! ```text
//! time_bound = Σ_c floor((span − offset_c) / stagger)
//! ```
//!
//! # Resource bound
//!
//! A stage lasting `d` days overlaps at most `ceil(d / stagger)` later
//! starts of the same cohort, so at most `c_s = m × ceil(d / stagger)` jobs
//! are inside it at once. With `L_p = floor(total_p × saturation)`:
//!
//! - per stage: if `c_s > Σ_p floor(L_p / r_s)`, the job count is capped at
//!   that sum;
//! - per unit type shared by several stages: the job count `N` must satisfy
//!   `Σ_s min(N, c_s) × r_s ≤ Σ_p L_p`.
//!
//! The result is `min(time_bound, resource_bound)`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;
use crate::models::{InventorySnapshot, Stage, StageKind};

/// Validates planning parameters shared by every entry point.
pub fn check_parameters(
    span_days: i64,
    stagger_days: i64,
    saturation: f64,
    cohorts: u32,
) -> Result<(), ConfigurationError> {
    if stagger_days <= 0 {
        return Err(ConfigurationError::NonPositiveStagger(stagger_days));
    }
    if span_days <= 0 {
        return Err(ConfigurationError::NonPositiveSpan(span_days));
    }
    check_saturation(saturation)?;
    if cohorts == 0 {
        return Err(ConfigurationError::NoCohorts);
    }
    Ok(())
}

/// Rejects saturation factors outside `(0, 1]` (including NaN).
pub fn check_saturation(saturation: f64) -> Result<(), ConfigurationError> {
    if saturation > 0.0 && saturation <= 1.0 {
        Ok(())
    } else {
        Err(ConfigurationError::SaturationOutOfRange(saturation))
    }
}

/// Start-day layout of interleaved cohorts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CohortLayout {
    cohorts: u32,
    stagger_days: i64,
}

/// A job slot: cohort and start day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct JobSlot {
    /// Start day.
    pub start_day: i64,
    /// Cohort index.
    pub cohort: u32,
}

impl CohortLayout {
    /// Creates a layout. `cohorts` and `stagger_days` must be positive.
    pub fn new(cohorts: u32, stagger_days: i64) -> Self {
        Self {
            cohorts: cohorts.max(1),
            stagger_days: stagger_days.max(1),
        }
    }

    /// Start offset of a cohort.
    pub fn offset(&self, cohort: u32) -> i64 {
        cohort as i64 * self.stagger_days / self.cohorts as i64
    }

    /// Number of jobs cohort `cohort` can start within the span.
    fn cohort_slots(&self, cohort: u32, span_days: i64) -> i64 {
        ((span_days - self.offset(cohort)) / self.stagger_days).max(0)
    }

    /// Total job slots within the span.
    pub fn time_bound(&self, span_days: i64) -> usize {
        (0..self.cohorts)
            .map(|c| self.cohort_slots(c, span_days) as usize)
            .sum()
    }

    /// Upper bound on jobs simultaneously inside a stage of `duration_days`.
    pub fn concurrent_jobs(&self, duration_days: i64) -> usize {
        if duration_days <= 0 {
            return 0;
        }
        let per_cohort = (duration_days + self.stagger_days - 1) / self.stagger_days;
        per_cohort as usize * self.cohorts as usize
    }

    /// Every slot within the span, ordered by start day then cohort.
    pub fn slots_within(&self, span_days: i64) -> Vec<JobSlot> {
        let mut slots: Vec<JobSlot> = (0..self.cohorts)
            .flat_map(|c| {
                (0..self.cohort_slots(c, span_days)).map(move |k| JobSlot {
                    start_day: self.offset(c) + k * self.stagger_days,
                    cohort: c,
                })
            })
            .collect();
        slots.sort();
        slots
    }

    /// The first `count` slots, ignoring any span.
    pub fn first_slots(&self, count: usize) -> Vec<JobSlot> {
        let rounds = count.div_ceil(self.cohorts as usize) as i64;
        let mut slots: Vec<JobSlot> = (0..rounds)
            .flat_map(|k| {
                (0..self.cohorts).map(move |c| JobSlot {
                    start_day: self.offset(c) + k * self.stagger_days,
                    cohort: c,
                })
            })
            .collect();
        slots.sort();
        slots.truncate(count);
        slots
    }
}

/// Resource demand of one stage for capacity estimation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageDemand {
    /// Stage order index.
    pub stage: StageKind,
    /// Required unit type.
    pub unit_type: String,
    /// Units held while the stage is active.
    pub units_required: u32,
    /// Occupancy duration (days).
    pub duration_days: i64,
}

impl StageDemand {
    /// Demand of a stage at its nominal duration.
    pub fn from_stage(stage: &Stage) -> Self {
        Self {
            stage: stage.kind,
            unit_type: stage.requirement.unit_type.clone(),
            units_required: stage.requirement.count,
            duration_days: stage.nominal_days,
        }
    }

    /// Overrides the duration.
    pub fn with_duration(mut self, duration_days: i64) -> Self {
        self.duration_days = duration_days;
        self
    }
}

/// Maximum feasible job count and which bound produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobCountBound {
    /// Jobs that fit in the span.
    pub time_bound: usize,
    /// Jobs the inventory supports. `None` if capacity never binds.
    pub resource_bound: Option<usize>,
    /// Stage responsible for `resource_bound`.
    pub limiting_stage: Option<StageKind>,
    /// `min(time_bound, resource_bound)`.
    pub job_count: usize,
}

/// Computes the maximum feasible job count.
///
/// # Example
/// ```
/// use u_cohort::capacity::{ConstraintCalculator, StageDemand};
/// use u_cohort::models::{InventorySnapshot, ResourcePool, StageKind};
///
/// let inventory = InventorySnapshot::default()
///     .with_pool(ResourcePool::new("P1", "tank").with_units(400));
/// let demand = StageDemand {
///     stage: StageKind(0),
///     unit_type: "tank".into(),
///     units_required: 10,
///     duration_days: 450,
/// };
/// let bound = ConstraintCalculator::new(&inventory)
///     .max_job_count(3650, 13, 0.85, &[demand])
///     .unwrap();
/// assert_eq!(bound.job_count, 34);
/// ```
#[derive(Debug, Clone)]
pub struct ConstraintCalculator<'a> {
    inventory: &'a InventorySnapshot,
    cohorts: u32,
}

impl<'a> ConstraintCalculator<'a> {
    /// Creates a calculator with a single cohort.
    pub fn new(inventory: &'a InventorySnapshot) -> Self {
        Self {
            inventory,
            cohorts: 1,
        }
    }

    /// Sets the number of interleaved cohorts sharing the inventory.
    pub fn with_cohorts(mut self, cohorts: u32) -> Self {
        self.cohorts = cohorts;
        self
    }

    /// Computes `min(time_bound, resource_bound)`.
    ///
    /// # Errors
    /// Any invalid parameter, a stage whose unit type has no pool, or a
    /// stage needing more units than the largest pool of its type holds or
    /// than any one pool may occupy at `saturation`.
    pub fn max_job_count(
        &self,
        span_days: i64,
        stagger_days: i64,
        saturation: f64,
        demands: &[StageDemand],
    ) -> Result<JobCountBound, ConfigurationError> {
        check_parameters(span_days, stagger_days, saturation, self.cohorts)?;
        let layout = CohortLayout::new(self.cohorts, stagger_days);
        let time_bound = layout.time_bound(span_days);

        let mut bound: Option<(usize, StageKind)> = None;
        let mut tighten = |n: usize, stage: StageKind| {
            if bound.map_or(true, |(b, _)| n < b) {
                bound = Some((n, stage));
            }
        };

        // unit type → (demand, concurrent jobs)
        let mut by_type: BTreeMap<&str, Vec<(&StageDemand, usize)>> = BTreeMap::new();

        for demand in demands {
            let pools = self.inventory.pools_of_type(&demand.unit_type);
            if pools.is_empty() {
                return Err(ConfigurationError::UnknownUnitType {
                    stage: demand.stage,
                    unit_type: demand.unit_type.clone(),
                });
            }
            let largest = pools.iter().map(|p| p.total_count()).max().unwrap_or(0);
            if demand.units_required as usize > largest {
                return Err(ConfigurationError::StageExceedsPool {
                    stage: demand.stage,
                    unit_type: demand.unit_type.clone(),
                    required: demand.units_required,
                    available: largest,
                });
            }
            if demand.units_required == 0 {
                continue;
            }
            // A stage is served from a single pool.
            let usable = pools
                .iter()
                .map(|p| p.unit_limit(saturation))
                .max()
                .unwrap_or(0);
            if demand.units_required as usize > usable {
                return Err(ConfigurationError::StageExceedsSaturation {
                    stage: demand.stage,
                    unit_type: demand.unit_type.clone(),
                    required: demand.units_required,
                    limit: usable,
                });
            }

            let concurrent = layout.concurrent_jobs(demand.duration_days);
            let per_stage: usize = pools
                .iter()
                .map(|p| p.unit_limit(saturation) / demand.units_required as usize)
                .sum();
            if concurrent > per_stage {
                tighten(per_stage, demand.stage);
            }
            by_type
                .entry(demand.unit_type.as_str())
                .or_default()
                .push((demand, concurrent));
        }

        for (unit_type, stages) in &by_type {
            let limit: usize = self
                .inventory
                .pools_of_type(unit_type)
                .iter()
                .map(|p| p.unit_limit(saturation))
                .sum();
            let units_at = |n: usize| -> usize {
                stages
                    .iter()
                    .map(|(d, c)| n.min(*c) * d.units_required as usize)
                    .sum()
            };
            let saturating = stages.iter().map(|(_, c)| *c).max().unwrap_or(0);
            if units_at(saturating) <= limit {
                continue;
            }
            // units_at(lo) <= limit < units_at(hi)
            let (mut lo, mut hi) = (0usize, saturating);
            while hi - lo > 1 {
                let mid = lo + (hi - lo) / 2;
                if units_at(mid) <= limit {
                    lo = mid;
                } else {
                    hi = mid;
                }
            }
            let limiting = stages
                .iter()
                .max_by_key(|(d, c)| (c * d.units_required as usize, std::cmp::Reverse(d.stage)))
                .map(|(d, _)| d.stage);
            if let Some(stage) = limiting {
                tighten(lo, stage);
            }
        }

        let resource_bound = bound.map(|(n, _)| n);
        Ok(JobCountBound {
            time_bound,
            resource_bound,
            limiting_stage: bound.map(|(_, s)| s),
            job_count: time_bound.min(resource_bound.unwrap_or(usize::MAX)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ResourcePool;

    fn inventory(units: usize) -> InventorySnapshot {
        InventorySnapshot::default().with_pool(ResourcePool::new("P1", "tank").with_units(units))
    }

    fn demand(stage: u32, units: u32, days: i64) -> StageDemand {
        StageDemand {
            stage: StageKind(stage),
            unit_type: "tank".into(),
            units_required: units,
            duration_days: days,
        }
    }

    /// Peak number of jobs inside `[start, start + duration)` windows.
    fn peak_concurrency(slots: &[JobSlot], duration: i64) -> usize {
        let horizon = slots.iter().map(|s| s.start_day).max().unwrap_or(0) + duration;
        (0..horizon)
            .map(|day| {
                slots
                    .iter()
                    .filter(|s| s.start_day <= day && day < s.start_day + duration)
                    .count()
            })
            .max()
            .unwrap_or(0)
    }

    #[test]
    fn test_scenario_pool_400_saturation_085() {
        let inv = inventory(400);
        let calc = ConstraintCalculator::new(&inv);
        let bound = calc
            .max_job_count(3650, 13, 0.85, &[demand(0, 10, 450)])
            .unwrap();

        assert_eq!(bound.time_bound, 280);
        assert_eq!(bound.resource_bound, Some(34));
        assert_eq!(bound.limiting_stage, Some(StageKind(0)));
        assert_eq!(bound.job_count, 34);

        let slots = CohortLayout::new(1, 13).first_slots(bound.job_count);
        assert!(peak_concurrency(&slots, 450) <= 34);
    }

    #[test]
    fn test_time_bound_binds() {
        let inv = inventory(400);
        let bound = ConstraintCalculator::new(&inv)
            .max_job_count(365, 13, 0.85, &[demand(0, 10, 450)])
            .unwrap();
        assert_eq!(bound.time_bound, 28);
        assert_eq!(bound.job_count, 28);
    }

    #[test]
    fn test_resource_never_binds() {
        let inv = inventory(100);
        let bound = ConstraintCalculator::new(&inv)
            .max_job_count(1000, 10, 1.0, &[demand(0, 2, 30)])
            .unwrap();
        // 3 concurrent jobs × 2 units fits in 100 units.
        assert_eq!(bound.resource_bound, None);
        assert_eq!(bound.job_count, 100);
    }

    #[test]
    fn test_shared_pool_across_stages() {
        // Two stages on the same 100-unit pool: 10 + 20 units/job.
        // c_0 = ceil(50/10) = 5, c_1 = ceil(100/10) = 10.
        // N=3: 3·10 + 3·20 = 90 ≤ 100; N=4: 40 + 80 = 120 > 100.
        let inv = inventory(100);
        let bound = ConstraintCalculator::new(&inv)
            .max_job_count(1000, 10, 1.0, &[demand(0, 10, 50), demand(1, 20, 100)])
            .unwrap();
        assert_eq!(bound.resource_bound, Some(3));
        assert_eq!(bound.limiting_stage, Some(StageKind(1)));
    }

    #[test]
    fn test_interleaved_cohorts() {
        let layout = CohortLayout::new(2, 10);
        assert_eq!(layout.offset(0), 0);
        assert_eq!(layout.offset(1), 5);
        assert_eq!(layout.time_bound(100), 10 + 9);
        assert_eq!(layout.concurrent_jobs(25), 6);

        let starts: Vec<i64> = layout.first_slots(5).iter().map(|s| s.start_day).collect();
        assert_eq!(starts, vec![0, 5, 10, 15, 20]);
        assert_eq!(layout.slots_within(100).len(), 19);
    }

    #[test]
    fn test_rejects_bad_parameters() {
        let inv = inventory(10);
        let calc = ConstraintCalculator::new(&inv);
        let d = [demand(0, 1, 10)];
        assert_eq!(
            calc.max_job_count(100, 0, 0.5, &d),
            Err(ConfigurationError::NonPositiveStagger(0))
        );
        assert_eq!(
            calc.max_job_count(100, -3, 0.5, &d),
            Err(ConfigurationError::NonPositiveStagger(-3))
        );
        assert!(matches!(
            calc.max_job_count(100, 5, 1.5, &d),
            Err(ConfigurationError::SaturationOutOfRange(_))
        ));
        assert!(matches!(
            calc.max_job_count(100, 5, 0.0, &d),
            Err(ConfigurationError::SaturationOutOfRange(_))
        ));
        assert!(matches!(
            calc.max_job_count(100, 5, f64::NAN, &d),
            Err(ConfigurationError::SaturationOutOfRange(_))
        ));
        assert_eq!(
            calc.clone().with_cohorts(0).max_job_count(100, 5, 0.5, &d),
            Err(ConfigurationError::NoCohorts)
        );
    }

    #[test]
    fn test_rejects_stage_larger_than_pool() {
        let inv = inventory(10);
        let err = ConstraintCalculator::new(&inv)
            .max_job_count(100, 5, 1.0, &[demand(2, 11, 10)])
            .unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::StageExceedsPool {
                stage: StageKind(2),
                unit_type: "tank".into(),
                required: 11,
                available: 10,
            }
        );
    }

    #[test]
    fn test_rejects_stage_above_saturation_limit() {
        // 6 of 10 units fits the pool but not floor(10 × 0.5) = 5.
        let inv = inventory(10);
        let calc = ConstraintCalculator::new(&inv);
        assert_eq!(
            calc.max_job_count(365, 10, 0.5, &[demand(0, 6, 30)]),
            Err(ConfigurationError::StageExceedsSaturation {
                stage: StageKind(0),
                unit_type: "tank".into(),
                required: 6,
                limit: 5,
            })
        );
        assert!(calc.max_job_count(365, 10, 0.6, &[demand(0, 6, 30)]).is_ok());
    }

    #[test]
    fn test_rejects_unknown_unit_type() {
        let inv = inventory(10);
        let mut d = demand(0, 1, 10);
        d.unit_type = "pond".into();
        assert!(matches!(
            ConstraintCalculator::new(&inv).max_job_count(100, 5, 1.0, &[d]),
            Err(ConfigurationError::UnknownUnitType { .. })
        ));
    }

    #[test]
    fn test_demand_from_stage() {
        let stage = Stage::new(1, "tank", 4).with_nominal_days(90);
        let d = StageDemand::from_stage(&stage).with_duration(120);
        assert_eq!(d.stage, StageKind(1));
        assert_eq!(d.units_required, 4);
        assert_eq!(d.duration_days, 120);
    }
}
