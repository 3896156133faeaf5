//! Growth curves.
//!
//! A growth curve advances a job's state by one day given the stage rate
//! and that day's environment value. The duration model only relies on two
//! properties of `advance`:
//!
//! - it never decreases the state, and
//! - it is monotone non-decreasing in the input state.
//!
//! Together they guarantee that a job entering a stage with a larger state
//! reaches any given target no later than one entering with a smaller state.
//!
//! # Reference
//! von Bertalanffy (1938); Iwama & Tautz (1981), "A simple growth model for
//! salmonids in hatcheries" (cube-root thermal growth coefficient).

use std::fmt::Debug;

/// One-day state transition.
pub trait GrowthCurve: Send + Sync + Debug {
    /// Curve name.
    fn name(&self) -> &'static str;

    /// State after one day at `rate` under `environment`.
    fn advance(&self, state: f64, rate: f64, environment: f64) -> f64;
}

/// Cube-root accumulation:
/// `state^(1/3) = state0^(1/3) + rate × environment × elapsed_days`.
///
/// Negative increments are clamped to zero.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CubeRootGrowth;

impl GrowthCurve for CubeRootGrowth {
    fn name(&self) -> &'static str {
        "cube-root"
    }

    fn advance(&self, state: f64, rate: f64, environment: f64) -> f64 {
        let increment = (rate * environment).max(0.0);
        let root = state.max(0.0).cbrt() + increment;
        (root * root * root).max(state)
    }
}

/// Linear accumulation: `state += rate × environment` per day.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LinearGrowth;

impl GrowthCurve for LinearGrowth {
    fn name(&self) -> &'static str {
        "linear"
    }

    fn advance(&self, state: f64, rate: f64, environment: f64) -> f64 {
        state + (rate * environment).max(0.0)
    }
}
