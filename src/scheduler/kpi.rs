//! Schedule quality metrics (KPIs).
//!
//! Computes occupancy indicators from a planned schedule.
//!
//! # Metrics
//!
//! | Metric | Definition |
//! |--------|-----------|
//! | Makespan | Latest planned end day |
//! | Horizon | Makespan minus first occupied day |
//! | Peak units | Most units of a pool occupied on any single day |
//! | Utilization | Reserved unit-days / (pool size × horizon) |
//! | Avg Flow Time | Mean(planned end − start day) over jobs |
//!
//! # Reference
//! Pinedo (2016), "Scheduling", Ch. 1.2: Performance Measures

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::Schedule;

/// Schedule performance indicators. All time values are in days.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleKpi {
    /// Latest planned end day.
    pub makespan_day: i64,
    /// Days between the first occupied day and the makespan.
    pub horizon_days: i64,
    /// Number of planned jobs.
    pub job_count: usize,
    /// Unit-days reserved across all pools.
    pub total_unit_days: i64,
    /// Peak simultaneous units per pool.
    pub peak_units_by_pool: BTreeMap<String, usize>,
    /// Per-pool utilization over the horizon (0.0..1.0).
    pub utilization_by_pool: BTreeMap<String, f64>,
    /// Mean of the per-pool utilizations.
    pub avg_utilization: f64,
    /// Mean planned flow time per job.
    pub avg_flow_days: f64,
}

impl ScheduleKpi {
    /// Computes KPIs from a schedule.
    pub fn calculate(schedule: &Schedule) -> Self {
        let makespan = schedule.makespan_day();
        let horizon = (makespan - schedule.first_day()).max(0);

        let mut unit_days: BTreeMap<&str, i64> = BTreeMap::new();
        let mut events: BTreeMap<&str, Vec<(i64, i64)>> = BTreeMap::new();
        for a in schedule.assignments() {
            *unit_days.entry(a.pool_id.as_str()).or_default() += a.unit_days();
            let n = a.unit_ids.len() as i64;
            let pool_events = events.entry(a.pool_id.as_str()).or_default();
            pool_events.push((a.start_day, n));
            pool_events.push((a.planned_end_day, -n));
        }

        let mut peak_units_by_pool = BTreeMap::new();
        let mut utilization_by_pool = BTreeMap::new();
        for pool in schedule.pools() {
            let id = pool.pool_id.as_str();
            let peak = events.get_mut(id).map_or(0, |e| peak_of(e));
            peak_units_by_pool.insert(pool.pool_id.clone(), peak);

            let capacity = pool.total_count() as i64 * horizon;
            let used = unit_days.get(id).copied().unwrap_or(0);
            let utilization = if capacity > 0 {
                used as f64 / capacity as f64
            } else {
                0.0
            };
            utilization_by_pool.insert(pool.pool_id.clone(), utilization);
        }

        let avg_utilization = if utilization_by_pool.is_empty() {
            0.0
        } else {
            let sum: f64 = utilization_by_pool.values().sum();
            sum / utilization_by_pool.len() as f64
        };

        let flows: Vec<i64> = schedule
            .jobs()
            .iter()
            .filter_map(|j| j.planned_end_day().map(|end| end - j.job.start_day))
            .collect();
        let avg_flow_days = if flows.is_empty() {
            0.0
        } else {
            flows.iter().sum::<i64>() as f64 / flows.len() as f64
        };

        Self {
            makespan_day: makespan,
            horizon_days: horizon,
            job_count: schedule.job_count(),
            total_unit_days: unit_days.values().sum(),
            peak_units_by_pool,
            utilization_by_pool,
            avg_utilization,
            avg_flow_days,
        }
    }

    /// Whether the schedule meets the given quality thresholds.
    pub fn meets_thresholds(&self, max_makespan_day: i64, min_utilization: f64) -> bool {
        self.makespan_day <= max_makespan_day && self.avg_utilization >= min_utilization
    }
}

fn peak_of(events: &mut [(i64, i64)]) -> usize {
    events.sort();
    let mut running = 0i64;
    let mut peak = 0i64;
    for &(_, delta) in events.iter() {
        running += delta;
        peak = peak.max(running);
    }
    peak as usize
}
