//! Resource allocator.
//!
//! Tracks, for every unit, the day windows it is already reserved for, and
//! for every pool, how many of its units are occupied on each day. A
//! request is served from the first pool (in `pool_id` order) that has
//! enough units free for the *whole* window while staying at or below the
//! pool's saturation limit on every day of it.
//!
//! # Unit selection
//!
//! Among the free units of a pool, the least recently released are taken
//! first (never-used units before any used one, ties broken by registry
//! order). This spreads occupancy evenly instead of wearing out the first
//! few units of each pool.
//!
//! # Complexity
//! O(u · r) per request, where u = units in the candidate pools and r =
//! reservations held by a unit.

use tracing::trace;

use crate::error::CapacityExceededError;
use crate::models::{InventorySnapshot, Stage, StageAssignment};

#[derive(Debug, Clone)]
struct UnitState {
    unit_id: String,
    busy: Vec<(i64, i64)>,
    last_release: Option<i64>,
}

impl UnitState {
    fn is_free(&self, start_day: i64, end_day: i64) -> bool {
        self.busy.iter().all(|&(s, e)| e <= start_day || end_day <= s)
    }
}

#[derive(Debug, Clone)]
struct PoolState {
    pool_id: String,
    unit_type: String,
    limit: usize,
    units: Vec<UnitState>,
    /// `(start_day, end_day, units)` for every reservation in the pool.
    reservations: Vec<(i64, i64, usize)>,
}

impl PoolState {
    /// Largest number of units occupied on any day of `[start_day, end_day)`.
    fn peak_usage(&self, start_day: i64, end_day: i64) -> usize {
        let mut events: Vec<(i64, i64)> = Vec::new();
        for &(s, e, n) in &self.reservations {
            if s < end_day && start_day < e {
                events.push((s.max(start_day), n as i64));
                events.push((e, -(n as i64)));
            }
        }
        // Releases sort before acquisitions on the same day.
        events.sort();

        let mut running: i64 = 0;
        let mut peak: i64 = 0;
        for (day, delta) in events {
            if day >= end_day {
                break;
            }
            running += delta;
            peak = peak.max(running);
        }
        peak as usize
    }

    /// Units that can be handed out over the window without exceeding
    /// either the free unit count or the saturation limit.
    fn available(&self, start_day: i64, end_day: i64) -> (usize, Vec<usize>) {
        let headroom = self.limit.saturating_sub(self.peak_usage(start_day, end_day));
        let free: Vec<usize> = self
            .units
            .iter()
            .enumerate()
            .filter(|(_, u)| u.is_free(start_day, end_day))
            .map(|(i, _)| i)
            .collect();
        (headroom.min(free.len()), free)
    }
}

/// Allocates units to stage windows without overlap or over-saturation.
#[derive(Debug, Clone)]
pub struct ResourceAllocator {
    pools: Vec<PoolState>,
}

impl ResourceAllocator {
    /// Creates an allocator with every unit free.
    ///
    /// Pools are ordered by `pool_id`; each pool may hold at most
    /// `floor(total × saturation)` units at any instant.
    pub fn new(inventory: &InventorySnapshot, saturation: f64) -> Self {
        let pools = inventory
            .sorted_pools()
            .into_iter()
            .map(|pool| PoolState {
                limit: pool.unit_limit(saturation),
                units: pool
                    .units
                    .iter()
                    .map(|u| UnitState {
                        unit_id: u.unit_id.clone(),
                        busy: Vec::new(),
                        last_release: None,
                    })
                    .collect(),
                pool_id: pool.pool_id,
                unit_type: pool.unit_type,
                reservations: Vec::new(),
            })
            .collect();
        Self { pools }
    }

    /// Reserves `stage.requirement.count` units of the stage's unit type
    /// over `[start_day, end_day)`.
    ///
    /// On failure nothing is reserved and the error reports the most units
    /// any single pool of the type could have provided.
    pub fn allocate(
        &mut self,
        job_id: &str,
        stage: &Stage,
        start_day: i64,
        end_day: i64,
    ) -> Result<StageAssignment, CapacityExceededError> {
        let requested = stage.requirement.count as usize;
        let unit_type = stage.requirement.unit_type.as_str();
        let mut best_available = 0;

        for pool in self.pools.iter_mut().filter(|p| p.unit_type == unit_type) {
            let (available, mut free) = pool.available(start_day, end_day);
            best_available = best_available.max(available);
            if available < requested {
                continue;
            }

            free.sort_by_key(|&i| (pool.units[i].last_release.unwrap_or(i64::MIN), i));
            let mut unit_ids = Vec::with_capacity(requested);
            for &i in free.iter().take(requested) {
                let unit = &mut pool.units[i];
                unit.busy.push((start_day, end_day));
                unit.last_release = Some(unit.last_release.map_or(end_day, |d| d.max(end_day)));
                unit_ids.push(unit.unit_id.clone());
            }
            pool.reservations.push((start_day, end_day, requested));

            trace!(
                job_id,
                stage = stage.kind.0,
                pool_id = %pool.pool_id,
                units = requested,
                start_day,
                end_day,
                "units reserved"
            );
            return Ok(StageAssignment::new(
                job_id,
                stage.kind,
                pool.pool_id.clone(),
                unit_ids,
                start_day,
                end_day,
            ));
        }

        Err(CapacityExceededError {
            job_id: job_id.to_string(),
            stage: stage.kind,
            unit_type: unit_type.to_string(),
            window_start: start_day,
            window_end: end_day,
            requested: stage.requirement.count,
            available: best_available,
        })
    }

    /// Units of a pool occupied at the peak of `[start_day, end_day)`.
    pub fn peak_usage(&self, pool_id: &str, start_day: i64, end_day: i64) -> Option<usize> {
        self.pools
            .iter()
            .find(|p| p.pool_id == pool_id)
            .map(|p| p.peak_usage(start_day, end_day))
    }

    /// Total unit-days reserved so far.
    pub fn reserved_unit_days(&self) -> i64 {
        self.pools
            .iter()
            .flat_map(|p| p.reservations.iter())
            .map(|&(s, e, n)| (e - s) * n as i64)
            .sum()
    }
}
