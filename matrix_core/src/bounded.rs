//! Bounded scalars for derived agent state.

use serde::{Deserialize, Serialize};

/// A scalar that always stays within `[min, max]`.
///
/// Every write clamps, so no sequence of deltas can push the value out of
/// range. NaN writes are ignored and leave the previous value in place.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounded {
    value: f64,
    min: f64,
    max: f64,
}

impl Bounded {
    /// Creates a bounded scalar, clamping the initial value.
    ///
    /// Reversed bounds are swapped.
    pub fn new(value: f64, min: f64, max: f64) -> Self {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        let mut bounded = Self { value: min, min, max };
        bounded.set(value);
        bounded
    }

    /// Scalar in `[0, 1]`, e.g. need or affinity.
    pub fn unit(value: f64) -> Self {
        Self::new(value, 0.0, 1.0)
    }

    /// Scalar in `[-1, 1]`, e.g. satisfaction.
    pub fn signed_unit(value: f64) -> Self {
        Self::new(value, -1.0, 1.0)
    }

    pub fn get(&self) -> f64 {
        self.value
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    /// Sets the value, clamped to range.
    pub fn set(&mut self, value: f64) {
        if value.is_nan() {
            return;
        }
        self.value = value.clamp(self.min, self.max);
    }

    /// Moves the value by `delta`, clamped to range.
    pub fn shift(&mut self, delta: f64) {
        self.set(self.value + delta);
    }
}
