//! Resource inventory model.
//!
//! Resources are the physical units a job occupies while one of its stages
//! is active (tanks, pens, bays). Units are grouped into typed pools, and
//! the whole inventory is a read-only snapshot supplied by the
//! infrastructure registry: the scheduler never creates, retires, or
//! repairs a unit during the scheduling horizon.

use serde::{Deserialize, Serialize};

/// Tolerance applied before flooring `total × saturation`.
///
/// `400 × 0.85` evaluates to `339.99999999999994` in binary floating point.
const LIMIT_EPSILON: f64 = 1e-9;

/// An addressable unit of capacity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceUnit {
    /// Unique unit identifier (unique across the whole inventory).
    pub unit_id: String,
    /// Unit type, matched against `ResourceRequirement::unit_type`.
    pub unit_type: String,
    /// Owning pool.
    pub pool_id: String,
    /// Region tag inherited from the pool.
    pub region: String,
}

/// A typed collection of resource units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourcePool {
    /// Unique pool identifier.
    pub pool_id: String,
    /// Type shared by every unit in the pool.
    pub unit_type: String,
    /// Region tag (site, building, ...).
    pub region: String,
    /// Member units, in registry order.
    pub units: Vec<ResourceUnit>,
}

impl ResourcePool {
    /// Creates an empty pool.
    pub fn new(pool_id: impl Into<String>, unit_type: impl Into<String>) -> Self {
        Self {
            pool_id: pool_id.into(),
            unit_type: unit_type.into(),
            region: String::new(),
            units: Vec::new(),
        }
    }

    /// Sets the region tag on the pool and on every unit already added.
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        for unit in &mut self.units {
            unit.region = self.region.clone();
        }
        self
    }

    /// Adds one unit with an explicit identifier.
    pub fn with_unit(mut self, unit_id: impl Into<String>) -> Self {
        let unit = ResourceUnit {
            unit_id: unit_id.into(),
            unit_type: self.unit_type.clone(),
            pool_id: self.pool_id.clone(),
            region: self.region.clone(),
        };
        self.units.push(unit);
        self
    }

    /// Adds `count` units named `{pool_id}-{n:03}`, continuing the numbering.
    pub fn with_units(mut self, count: usize) -> Self {
        let first = self.units.len();
        for n in first..first + count {
            let unit_id = format!("{}-{n:03}", self.pool_id);
            self = self.with_unit(unit_id);
        }
        self
    }

    /// Number of units in the pool.
    #[inline]
    pub fn total_count(&self) -> usize {
        self.units.len()
    }

    /// Maximum number of units that may be occupied at the same instant:
    /// `floor(total_count × saturation)`.
    pub fn unit_limit(&self, saturation: f64) -> usize {
        let raw = self.total_count() as f64 * saturation + LIMIT_EPSILON;
        if raw <= 0.0 {
            0
        } else {
            (raw.floor() as usize).min(self.total_count())
        }
    }

    /// Whether the pool contains a unit with the given ID.
    pub fn contains(&self, unit_id: &str) -> bool {
        self.units.iter().any(|u| u.unit_id == unit_id)
    }
}

/// Read-only inventory snapshot handed over by the infrastructure registry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InventorySnapshot {
    /// All pools, in registry order.
    pub pools: Vec<ResourcePool>,
}

impl InventorySnapshot {
    /// Creates a snapshot from a list of pools.
    pub fn new(pools: Vec<ResourcePool>) -> Self {
        Self { pools }
    }

    /// Adds a pool.
    pub fn with_pool(mut self, pool: ResourcePool) -> Self {
        self.pools.push(pool);
        self
    }

    /// Finds a pool by ID.
    pub fn pool(&self, pool_id: &str) -> Option<&ResourcePool> {
        self.pools.iter().find(|p| p.pool_id == pool_id)
    }

    /// Pools providing the given unit type, ordered by pool ID.
    pub fn pools_of_type(&self, unit_type: &str) -> Vec<&ResourcePool> {
        let mut pools: Vec<&ResourcePool> = self
            .pools
            .iter()
            .filter(|p| p.unit_type == unit_type)
            .collect();
        pools.sort_by(|a, b| a.pool_id.cmp(&b.pool_id));
        pools
    }

    /// Whether any pool provides the given unit type.
    pub fn has_unit_type(&self, unit_type: &str) -> bool {
        self.pools.iter().any(|p| p.unit_type == unit_type)
    }

    /// Total number of units across all pools.
    pub fn unit_count(&self) -> usize {
        self.pools.iter().map(ResourcePool::total_count).sum()
    }

    /// Pools ordered by pool ID (the order used by planning and validation).
    pub fn sorted_pools(&self) -> Vec<ResourcePool> {
        let mut pools = self.pools.clone();
        pools.sort_by(|a, b| a.pool_id.cmp(&b.pool_id));
        pools
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_builder() {
        let pool = ResourcePool::new("P1", "tank")
            .with_region("north")
            .with_units(3)
            .with_unit("spare");

        assert_eq!(pool.total_count(), 4);
        assert_eq!(pool.units[0].unit_id, "P1-000");
        assert_eq!(pool.units[2].unit_id, "P1-002");
        assert!(pool.contains("spare"));
        assert!(pool.units.iter().all(|u| u.region == "north"));
        assert!(pool.units.iter().all(|u| u.unit_type == "tank"));
        assert!(pool.units.iter().all(|u| u.pool_id == "P1"));
    }

    #[test]
    fn test_region_applies_to_existing_units() {
        let pool = ResourcePool::new("P1", "tank").with_units(2).with_region("south");
        assert!(pool.units.iter().all(|u| u.region == "south"));
    }

    #[test]
    fn test_unit_limit() {
        let pool = ResourcePool::new("P1", "tank").with_units(400);
        assert_eq!(pool.unit_limit(0.85), 340);
        assert_eq!(pool.unit_limit(1.0), 400);

        let small = ResourcePool::new("P2", "tank").with_units(10);
        assert_eq!(small.unit_limit(0.55), 5);
        assert_eq!(small.unit_limit(0.0), 0);
    }

    #[test]
    fn test_pools_of_type_sorted() {
        let inv = InventorySnapshot::default()
            .with_pool(ResourcePool::new("B", "tank").with_units(1))
            .with_pool(ResourcePool::new("C", "cage").with_units(1))
            .with_pool(ResourcePool::new("A", "tank").with_units(2));

        let ids: Vec<&str> = inv
            .pools_of_type("tank")
            .iter()
            .map(|p| p.pool_id.as_str())
            .collect();
        assert_eq!(ids, vec!["A", "B"]);
        assert!(inv.has_unit_type("cage"));
        assert!(!inv.has_unit_type("pond"));
        assert_eq!(inv.unit_count(), 4);
        assert!(inv.pool("C").is_some());
    }
}
