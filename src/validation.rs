//! Input and schedule validation.
//!
//! Two independent gates, both pure and both collecting every problem in a
//! single pass rather than stopping at the first:
//!
//! - [`validate_input`] checks jobs and inventory before planning:
//!   duplicate IDs, inconsistent units, empty jobs, stage ordering, target
//!   ranges, unknown unit types.
//! - [`validate`] re-verifies a finished [`Schedule`]: no two jobs share a
//!   unit at the same time, pool saturation limits hold, every unit exists,
//!   and each job's stages are sequential. It is the pre-flight gate of the
//!   executor and can be run on its own.
//!
//! # Reference
//! Cormen et al. (2009), "Introduction to Algorithms", Ch. 14 (interval
//! overlap via sorted sweep)

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{InventorySnapshot, Job, Schedule, Stage, StageAssignment, StageKind};

/// Validation result.
pub type ValidationResult = Result<(), Vec<InputError>>;

/// A planning input error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputError {
    /// Error category.
    pub kind: InputErrorKind,
    /// Human-readable description.
    pub message: String,
}

/// Categories of input errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputErrorKind {
    /// Two entities share the same ID.
    DuplicateId,
    /// A unit's type or pool disagrees with its pool.
    UnitPoolMismatch,
    /// A job has no stages.
    EmptyJob,
    /// Stage indices are not exactly `0..n` in order.
    StageOrder,
    /// A stage's exit target range is not finite, non-negative, and ordered.
    InvalidTargetRange,
    /// A stage requires zero units.
    EmptyRequirement,
    /// A stage requires a unit type no pool provides.
    UnknownUnitType,
    /// A job's initial state is not finite and non-negative.
    InvalidInitialState,
}

impl InputError {
    pub(crate) fn new(kind: InputErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Validates jobs and inventory before planning.
///
/// # Returns
/// `Ok(())` if all checks pass, `Err(errors)` with all detected issues.
pub fn validate_input(jobs: &[Job], inventory: &InventorySnapshot) -> ValidationResult {
    let mut errors = Vec::new();

    let mut pool_ids = HashSet::new();
    let mut unit_ids = HashSet::new();
    for pool in &inventory.pools {
        if !pool_ids.insert(pool.pool_id.as_str()) {
            errors.push(InputError::new(
                InputErrorKind::DuplicateId,
                format!("Duplicate pool ID: {}", pool.pool_id),
            ));
        }
        for unit in &pool.units {
            if !unit_ids.insert(unit.unit_id.as_str()) {
                errors.push(InputError::new(
                    InputErrorKind::DuplicateId,
                    format!("Duplicate unit ID: {}", unit.unit_id),
                ));
            }
            if unit.unit_type != pool.unit_type || unit.pool_id != pool.pool_id {
                errors.push(InputError::new(
                    InputErrorKind::UnitPoolMismatch,
                    format!(
                        "Unit '{}' ({} in {}) does not match pool '{}' ({})",
                        unit.unit_id, unit.unit_type, unit.pool_id, pool.pool_id, pool.unit_type
                    ),
                ));
            }
        }
    }

    let mut job_ids = HashSet::new();
    for job in jobs {
        if !job_ids.insert(job.job_id.as_str()) {
            errors.push(InputError::new(
                InputErrorKind::DuplicateId,
                format!("Duplicate job ID: {}", job.job_id),
            ));
        }

        check_stages(&job.job_id, &job.stages, job.initial_state, inventory, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validates a job template before any job is built from it.
///
/// Applies the per-job checks of [`validate_input`] to a stage list and
/// initial state. `label` names the template in error messages.
pub fn validate_template(
    label: &str,
    stages: &[Stage],
    initial_state: f64,
    inventory: &InventorySnapshot,
) -> ValidationResult {
    let mut errors = Vec::new();
    check_stages(label, stages, initial_state, inventory, &mut errors);
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_stages(
    job_id: &str,
    stages: &[Stage],
    initial_state: f64,
    inventory: &InventorySnapshot,
    errors: &mut Vec<InputError>,
) {
    if stages.is_empty() {
        errors.push(InputError::new(
            InputErrorKind::EmptyJob,
            format!("Job '{job_id}' has no stages"),
        ));
    }

    if !initial_state.is_finite() || initial_state < 0.0 {
        errors.push(InputError::new(
            InputErrorKind::InvalidInitialState,
            format!("Job '{job_id}' has invalid initial state {initial_state}"),
        ));
    }

    for (i, stage) in stages.iter().enumerate() {
        if stage.kind.index() != i {
            errors.push(InputError::new(
                InputErrorKind::StageOrder,
                format!("Job '{job_id}' has {} at position {i}", stage.kind),
            ));
        }
        if !stage.exit_target.is_valid() {
            errors.push(InputError::new(
                InputErrorKind::InvalidTargetRange,
                format!(
                    "Job '{job_id}' {} has invalid target range [{}, {}]",
                    stage.kind, stage.exit_target.min, stage.exit_target.max
                ),
            ));
        }
        if stage.requirement.count == 0 {
            errors.push(InputError::new(
                InputErrorKind::EmptyRequirement,
                format!("Job '{job_id}' {} requires no units", stage.kind),
            ));
        }
        if !inventory.has_unit_type(&stage.requirement.unit_type) {
            errors.push(InputError::new(
                InputErrorKind::UnknownUnitType,
                format!(
                    "Job '{job_id}' {} requires unknown unit type '{}'",
                    stage.kind, stage.requirement.unit_type
                ),
            ));
        }
    }
}

/// A schedule conflict found by [`validate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "conflict", rename_all = "snake_case")]
pub enum Conflict {
    /// Two jobs hold the same unit over intersecting windows.
    #[error(
        "unit '{unit_id}': job '{first_job}' {first_stage} overlaps job '{second_job}' \
         {second_stage} over days [{overlap_start}, {overlap_end})"
    )]
    UnitOverlap {
        unit_id: String,
        first_job: String,
        first_stage: StageKind,
        second_job: String,
        second_stage: StageKind,
        overlap_start: i64,
        overlap_end: i64,
    },
    /// A pool holds more units than its saturation limit allows.
    #[error("pool '{pool_id}': {units} units occupied from day {day}, limit {limit}")]
    SaturationExceeded {
        pool_id: String,
        day: i64,
        units: usize,
        limit: usize,
    },
    /// An assignment references a unit outside its pool.
    #[error("job '{job_id}' {stage}: unit '{unit_id}' is not in pool '{pool_id}'")]
    UnknownUnit {
        job_id: String,
        stage: StageKind,
        pool_id: String,
        unit_id: String,
    },
    /// A stage starts before the previous stage's window ends, or stages
    /// are out of order.
    #[error("job '{job_id}' {stage} starts on day {start_day}, before day {previous_end}")]
    StageOrder {
        job_id: String,
        stage: StageKind,
        start_day: i64,
        previous_end: i64,
    },
}

/// Re-verifies a schedule. Returns every conflict found (empty = valid).
pub fn validate(schedule: &Schedule) -> Vec<Conflict> {
    let mut conflicts = Vec::new();

    // Unit membership: unit_id → pool_id.
    let mut unit_pool: BTreeMap<&str, &str> = BTreeMap::new();
    for pool in schedule.pools() {
        for unit in &pool.units {
            unit_pool.insert(unit.unit_id.as_str(), pool.pool_id.as_str());
        }
    }

    let mut by_unit: BTreeMap<&str, Vec<&StageAssignment>> = BTreeMap::new();
    for a in schedule.assignments() {
        for unit_id in &a.unit_ids {
            if unit_pool.get(unit_id.as_str()) != Some(&a.pool_id.as_str()) {
                conflicts.push(Conflict::UnknownUnit {
                    job_id: a.job_id.clone(),
                    stage: a.stage,
                    pool_id: a.pool_id.clone(),
                    unit_id: unit_id.clone(),
                });
            }
            by_unit.entry(unit_id.as_str()).or_default().push(a);
        }
    }

    for (unit_id, assignments) in &mut by_unit {
        check_unit_timeline(unit_id, assignments, &mut conflicts);
    }

    for pool in schedule.pools() {
        let limit = pool.unit_limit(schedule.saturation());
        check_pool_saturation(schedule, &pool.pool_id, limit, &mut conflicts);
    }

    for planned in schedule.jobs() {
        for pair in planned.assignments.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            if next.stage <= prev.stage || next.start_day < prev.planned_end_day {
                conflicts.push(Conflict::StageOrder {
                    job_id: next.job_id.clone(),
                    stage: next.stage,
                    start_day: next.start_day,
                    previous_end: prev.planned_end_day,
                });
            }
        }
    }

    conflicts
}

/// Sweeps one unit's assignments in start order, reporting every pair of
/// different jobs whose windows intersect.
fn check_unit_timeline(
    unit_id: &str,
    assignments: &mut [&StageAssignment],
    conflicts: &mut Vec<Conflict>,
) {
    assignments.sort_by(|a, b| {
        (a.start_day, a.planned_end_day, &a.job_id, a.stage)
            .cmp(&(b.start_day, b.planned_end_day, &b.job_id, b.stage))
    });

    let mut active: Vec<&StageAssignment> = Vec::new();
    for &current in assignments.iter() {
        active.retain(|a| a.planned_end_day > current.start_day);
        for earlier in &active {
            if earlier.job_id != current.job_id {
                conflicts.push(Conflict::UnitOverlap {
                    unit_id: unit_id.to_string(),
                    first_job: earlier.job_id.clone(),
                    first_stage: earlier.stage,
                    second_job: current.job_id.clone(),
                    second_stage: current.stage,
                    overlap_start: current.start_day,
                    overlap_end: current.planned_end_day.min(earlier.planned_end_day),
                });
            }
        }
        active.push(current);
    }
}

/// Sweeps a pool's occupancy, reporting each run of days above `limit` once.
fn check_pool_saturation(
    schedule: &Schedule,
    pool_id: &str,
    limit: usize,
    conflicts: &mut Vec<Conflict>,
) {
    let mut events: Vec<(i64, i64)> = Vec::new();
    for a in schedule.assignments().filter(|a| a.pool_id == pool_id) {
        let units = a.unit_ids.len() as i64;
        events.push((a.start_day, units));
        events.push((a.planned_end_day, -units));
    }
    // Releases before acquisitions on the same day (half-open windows).
    events.sort();

    let mut running: i64 = 0;
    let mut over = false;
    for (day, delta) in events {
        running += delta;
        let exceeded = running > limit as i64;
        if exceeded && !over {
            conflicts.push(Conflict::SaturationExceeded {
                pool_id: pool_id.to_string(),
                day,
                units: running as usize,
                limit,
            });
        }
        over = exceeded;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Job, JobSeed, PlannedJob, ResourcePool, Stage};

    fn sample_inventory() -> InventorySnapshot {
        InventorySnapshot::default()
            .with_pool(ResourcePool::new("P1", "tank").with_units(4))
            .with_pool(ResourcePool::new("P2", "tray").with_units(2))
    }

    fn job(id: &str, stages: Vec<Stage>) -> Job {
        Job::new(id, 0, JobSeed(1), 1.0, stages)
    }

    fn two_stages() -> Vec<Stage> {
        vec![
            Stage::new(0, "tray", 1).with_exit_target(5.0, 10.0),
            Stage::new(1, "tank", 2).with_exit_target(50.0, 80.0),
        ]
    }

    fn planned(id: &str, assignments: Vec<StageAssignment>) -> PlannedJob {
        PlannedJob {
            job: job(id, two_stages()),
            assignments,
        }
    }

    fn assign(job: &str, stage: u32, units: &[&str], start: i64, end: i64) -> StageAssignment {
        StageAssignment::new(
            job,
            StageKind(stage),
            "P1",
            units.iter().map(|u| u.to_string()).collect(),
            start,
            end,
        )
    }

    fn schedule(saturation: f64, jobs: Vec<PlannedJob>) -> Schedule {
        let pools = vec![ResourcePool::new("P1", "tank").with_units(4)];
        Schedule::from_parts(saturation, pools, jobs)
    }

    #[test]
    fn test_valid_input() {
        let jobs = vec![job("J1", two_stages()), job("J2", two_stages())];
        assert!(validate_input(&jobs, &sample_inventory()).is_ok());
    }

    #[test]
    fn test_duplicate_ids() {
        let jobs = vec![job("J1", two_stages()), job("J1", two_stages())];
        let inv = sample_inventory()
            .with_pool(ResourcePool::new("P1", "tank").with_units(1));
        let errors = validate_input(&jobs, &inv).unwrap_err();

        let dup: Vec<&InputError> = errors
            .iter()
            .filter(|e| e.kind == InputErrorKind::DuplicateId)
            .collect();
        assert!(dup.iter().any(|e| e.message.contains("job")));
        assert!(dup.iter().any(|e| e.message.contains("pool")));
        assert!(dup.iter().any(|e| e.message.contains("unit")));
    }

    #[test]
    fn test_unit_pool_mismatch() {
        let mut pool = ResourcePool::new("P1", "tank").with_units(1);
        pool.units[0].unit_type = "tray".into();
        let inv = InventorySnapshot::new(vec![pool]);
        let errors = validate_input(&[], &inv).unwrap_err();
        assert_eq!(errors[0].kind, InputErrorKind::UnitPoolMismatch);
    }

    #[test]
    fn test_empty_job_and_bad_stages() {
        let bad_stages = vec![
            Stage::new(1, "tray", 0).with_exit_target(9.0, 3.0),
            Stage::new(1, "pond", 1).with_exit_target(1.0, 2.0),
        ];
        let mut negative = job("J3", two_stages());
        negative.initial_state = -1.0;
        let jobs = vec![job("J1", vec![]), job("J2", bad_stages), negative];

        let errors = validate_input(&jobs, &sample_inventory()).unwrap_err();
        let kinds: Vec<&InputErrorKind> = errors.iter().map(|e| &e.kind).collect();
        assert!(kinds.contains(&&InputErrorKind::EmptyJob));
        assert!(kinds.contains(&&InputErrorKind::StageOrder));
        assert!(kinds.contains(&&InputErrorKind::InvalidTargetRange));
        assert!(kinds.contains(&&InputErrorKind::EmptyRequirement));
        assert!(kinds.contains(&&InputErrorKind::UnknownUnitType));
        assert!(kinds.contains(&&InputErrorKind::InvalidInitialState));
    }

    #[test]
    fn test_clean_schedule_has_no_conflicts() {
        let s = schedule(
            1.0,
            vec![
                planned(
                    "A",
                    vec![
                        assign("A", 0, &["P1-000"], 0, 10),
                        assign("A", 1, &["P1-001"], 10, 20),
                    ],
                ),
                planned("B", vec![assign("B", 0, &["P1-000"], 10, 15)]),
            ],
        );
        assert!(validate(&s).is_empty());
    }

    #[test]
    fn test_overlap_detected() {
        let s = schedule(
            1.0,
            vec![
                planned("A", vec![assign("A", 0, &["P1-000", "P1-001"], 0, 10)]),
                planned("B", vec![assign("B", 0, &["P1-001"], 7, 12)]),
            ],
        );
        let conflicts = validate(&s);
        assert_eq!(conflicts.len(), 1);
        assert_eq!(
            conflicts[0],
            Conflict::UnitOverlap {
                unit_id: "P1-001".into(),
                first_job: "A".into(),
                first_stage: StageKind(0),
                second_job: "B".into(),
                second_stage: StageKind(0),
                overlap_start: 7,
                overlap_end: 10,
            }
        );
    }

    #[test]
    fn test_all_conflicts_collected() {
        // Three jobs stacked on the same unit → three pairwise overlaps.
        let s = schedule(
            1.0,
            vec![
                planned("A", vec![assign("A", 0, &["P1-000"], 0, 30)]),
                planned("B", vec![assign("B", 0, &["P1-000"], 5, 25)]),
                planned("C", vec![assign("C", 0, &["P1-000"], 10, 20)]),
            ],
        );
        let overlaps = validate(&s)
            .into_iter()
            .filter(|c| matches!(c, Conflict::UnitOverlap { .. }))
            .count();
        assert_eq!(overlaps, 3);
    }

    #[test]
    fn test_saturation_exceeded() {
        // Limit floor(4 × 0.5) = 2; three units held on days [5, 10).
        let s = schedule(
            0.5,
            vec![
                planned("A", vec![assign("A", 0, &["P1-000", "P1-001"], 0, 10)]),
                planned("B", vec![assign("B", 0, &["P1-002"], 5, 15)]),
            ],
        );
        let conflicts = validate(&s);
        assert_eq!(
            conflicts,
            vec![Conflict::SaturationExceeded {
                pool_id: "P1".into(),
                day: 5,
                units: 3,
                limit: 2,
            }]
        );
    }

    #[test]
    fn test_back_to_back_is_not_saturation() {
        let s = schedule(
            0.5,
            vec![
                planned("A", vec![assign("A", 0, &["P1-000", "P1-001"], 0, 10)]),
                planned("B", vec![assign("B", 0, &["P1-002", "P1-003"], 10, 20)]),
            ],
        );
        assert!(validate(&s).is_empty());
    }

    #[test]
    fn test_unknown_unit_and_stage_order() {
        let s = schedule(
            1.0,
            vec![planned(
                "A",
                vec![assign("A", 0, &["ghost"], 0, 10), assign("A", 1, &["P1-000"], 8, 20)],
            )],
        );
        let conflicts = validate(&s);
        assert!(conflicts
            .iter()
            .any(|c| matches!(c, Conflict::UnknownUnit { unit_id, .. } if unit_id == "ghost")));
        assert!(conflicts.iter().any(|c| matches!(
            c,
            Conflict::StageOrder {
                start_day: 8,
                previous_end: 10,
                ..
            }
        )));
    }

    #[test]
    fn test_conflict_message() {
        let c = Conflict::SaturationExceeded {
            pool_id: "P1".into(),
            day: 3,
            units: 5,
            limit: 4,
        };
        assert_eq!(c.to_string(), "pool 'P1': 5 units occupied from day 3, limit 4");
    }
}
