//! Job model.
//!
//! A job is the top-level schedulable unit: a long-running sequence of
//! stages that starts on a fixed day. Each job owns a seed. Every random
//! quantity belonging to the job is drawn from a generator built from that
//! seed, so planning and execution observe exactly the same draws no matter
//! which thread replays the job.

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use super::{Stage, StageKind};

/// Per-job random seed. Fixed at job creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobSeed(pub u64);

impl JobSeed {
    /// A fresh generator for this seed.
    pub fn rng(self) -> StdRng {
        StdRng::seed_from_u64(self.0)
    }

    /// Samples one exit target per stage, in stage order.
    ///
    /// Calling this twice with the same stages yields identical values.
    pub fn sample_targets(self, stages: &[Stage]) -> Vec<f64> {
        let mut rng = self.rng();
        stages
            .iter()
            .map(|s| s.exit_target.sample(&mut rng))
            .collect()
    }
}

/// A job to be scheduled.
///
/// # Time Representation
/// Days are counted from the scheduling epoch (day 0).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Unique job identifier.
    pub job_id: String,
    /// Cohort the job belongs to (interleaved start sequence).
    pub cohort: u32,
    /// Day the first stage starts.
    pub start_day: i64,
    /// Seed for every random draw of this job.
    pub seed: JobSeed,
    /// State value when the job starts (e.g., stocking weight).
    pub initial_state: f64,
    /// Ordered stages.
    pub stages: Vec<Stage>,
    /// Per-stage exit targets sampled from `seed` at creation.
    pub targets: Vec<f64>,
}

impl Job {
    /// Creates a job and samples its stage targets from `seed`.
    pub fn new(
        job_id: impl Into<String>,
        start_day: i64,
        seed: JobSeed,
        initial_state: f64,
        stages: Vec<Stage>,
    ) -> Self {
        let targets = seed.sample_targets(&stages);
        Self {
            job_id: job_id.into(),
            cohort: 0,
            start_day,
            seed,
            initial_state,
            stages,
            targets,
        }
    }

    /// Sets the cohort.
    pub fn with_cohort(mut self, cohort: u32) -> Self {
        self.cohort = cohort;
        self
    }

    /// Finds a stage by order index.
    pub fn stage(&self, kind: StageKind) -> Option<&Stage> {
        self.stages.iter().find(|s| s.kind == kind)
    }

    /// Sampled exit target for a stage.
    pub fn target(&self, kind: StageKind) -> Option<f64> {
        self.stages
            .iter()
            .position(|s| s.kind == kind)
            .and_then(|i| self.targets.get(i).copied())
    }

    /// Number of stages.
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Sum of nominal stage durations (days).
    pub fn nominal_days(&self) -> i64 {
        self.stages.iter().map(|s| s.nominal_days).sum()
    }
}
