//! Environment series and stage rate table.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;
use crate::models::StageKind;

/// Daily environment input (e.g., water temperature), indexed by absolute day.
///
/// Days outside `[first_day, first_day + len)` wrap around, so a one-year
/// series serves any horizon as a repeating annual profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentSeries {
    first_day: i64,
    values: Vec<f64>,
}

impl EnvironmentSeries {
    /// Creates a series starting at `first_day`.
    ///
    /// Rejects empty series and non-finite values.
    pub fn new(first_day: i64, values: Vec<f64>) -> Result<Self, ConfigurationError> {
        if values.is_empty() {
            return Err(ConfigurationError::EmptyEnvironment);
        }
        if let Some(i) = values.iter().position(|v| !v.is_finite()) {
            return Err(ConfigurationError::NonFiniteEnvironment {
                day: first_day + i as i64,
            });
        }
        Ok(Self { first_day, values })
    }

    /// A series with the same value every day.
    pub fn constant(value: f64) -> Result<Self, ConfigurationError> {
        Self::new(0, vec![value])
    }

    /// Value for an absolute day.
    pub fn value_at(&self, day: i64) -> f64 {
        let len = self.values.len() as i64;
        let idx = (day - self.first_day).rem_euclid(len);
        self.values[idx as usize]
    }

    /// Number of distinct days in the series.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Always false; empty series are rejected at construction.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Growth rate per stage, keyed by stage order index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StageRateTable {
    rates: BTreeMap<StageKind, f64>,
}

impl StageRateTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the rate for a stage.
    pub fn with_rate(mut self, stage: StageKind, rate: f64) -> Self {
        self.rates.insert(stage, rate);
        self
    }

    /// Rate for a stage.
    pub fn rate(&self, stage: StageKind) -> Option<f64> {
        self.rates.get(&stage).copied()
    }

    /// Rate for a stage, rejecting missing, negative, or non-finite values.
    pub fn checked_rate(&self, stage: StageKind) -> Result<f64, ConfigurationError> {
        let rate = self
            .rate(stage)
            .ok_or(ConfigurationError::MissingStageRate(stage))?;
        if !rate.is_finite() || rate < 0.0 {
            return Err(ConfigurationError::InvalidStageRate { stage, rate });
        }
        Ok(rate)
    }
}
