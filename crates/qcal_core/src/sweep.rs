//! Sweep ranges
//!
//! Gantree: L0_Foundation → Sweep
//!
//! Half-open arithmetic ranges `[min, max)` with a positive step, validated on
//! construction. Point `i` is `min + i * step`.

use crate::error::{QcalError, QcalResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unvalidated sweep bounds as written in parameter files
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SweepBounds {
    /// Inclusive start
    pub min: f64,
    /// Exclusive end
    pub max: f64,
    /// Increment
    pub step: f64,
}

/// Validated sweep range
/// Gantree: SweepRange // 스윕 범위
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "SweepBounds", into = "SweepBounds")]
pub struct SweepRange {
    min: f64,
    max: f64,
    step: f64,
    len: usize,
}

impl SweepRange {
    /// Create a validated range
    /// Gantree: new(min,max,step) -> QcalResult<Self> // 검증 생성
    pub fn new(min: f64, max: f64, step: f64) -> QcalResult<Self> {
        if !(min.is_finite() && max.is_finite() && step.is_finite()) {
            return Err(QcalError::config(format!(
                "sweep bounds must be finite (min={}, max={}, step={})",
                min, max, step
            )));
        }
        if step == 0.0 {
            return Err(QcalError::config("sweep step must be non-zero"));
        }
        if min >= max {
            return Err(QcalError::config(format!(
                "sweep min ({}) must be below max ({})",
                min, max
            )));
        }
        if step < 0.0 {
            return Err(QcalError::config(format!(
                "sweep step {} runs away from max; no points would be produced",
                step
            )));
        }

        let len = ((max - min) / step).ceil();
        if !(len >= 1.0) || len > u32::MAX as f64 {
            return Err(QcalError::config(format!(
                "sweep [{}, {}) with step {} yields {} points",
                min, max, step, len
            )));
        }

        Ok(Self {
            min,
            max,
            step,
            len: len as usize,
        })
    }

    /// Inclusive start
    pub fn min(&self) -> f64 {
        self.min
    }

    /// Exclusive end
    pub fn max(&self) -> f64 {
        self.max
    }

    /// Increment
    pub fn step(&self) -> f64 {
        self.step
    }

    /// Number of sweep points, `ceil((max - min) / step)`
    pub fn len(&self) -> usize {
        self.len
    }

    /// Always false; kept for clippy's `len_without_is_empty`
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Value of point `i`
    pub fn value(&self, i: usize) -> f64 {
        self.min + i as f64 * self.step
    }

    /// All sweep points
    /// Gantree: values() -> Vec<f64> // 스윕 배열
    pub fn values(&self) -> Vec<f64> {
        (0..self.len).map(|i| self.value(i)).collect()
    }
}

impl TryFrom<SweepBounds> for SweepRange {
    type Error = QcalError;

    fn try_from(bounds: SweepBounds) -> QcalResult<Self> {
        SweepRange::new(bounds.min, bounds.max, bounds.step)
    }
}

impl From<SweepRange> for SweepBounds {
    fn from(range: SweepRange) -> Self {
        SweepBounds {
            min: range.min,
            max: range.max,
            step: range.step,
        }
    }
}

impl fmt::Display for SweepRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {}) step {} ({} points)",
            self.min, self.max, self.step, self.len
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
