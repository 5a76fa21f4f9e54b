//! Linear least squares and line intersections
//!
//! Gantree: L4_Fit → Linear

use crate::error::{check_xy, FitError, FitOutcome};
use qcal_core::fit::PARALLEL_EPS;
use serde::{Deserialize, Serialize};

/// Degree-1 least-squares fit `y = slope·x + intercept`
/// Gantree: LinearFit // 선형 피팅
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearFit {
    /// Slope
    pub slope: f64,
    /// Intercept
    pub intercept: f64,
    /// Standard error of the slope (0 for two points)
    pub slope_err: f64,
    /// Standard error of the intercept (0 for two points)
    pub intercept_err: f64,
}

impl LinearFit {
    /// Evaluate the line
    pub fn eval(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

/// Fit a straight line
/// Gantree: fit_linear(x,y) -> FitOutcome<LinearFit> // 최소제곱
pub fn fit_linear(x: &[f64], y: &[f64]) -> FitOutcome<LinearFit> {
    check_xy(x, y, 2)?;
    let n = x.len() as f64;
    let mean_x = x.iter().sum::<f64>() / n;
    let mean_y = y.iter().sum::<f64>() / n;

    let sxx: f64 = x.iter().map(|xi| (xi - mean_x).powi(2)).sum();
    let sxy: f64 = x.iter().zip(y).map(|(xi, yi)| (xi - mean_x) * (yi - mean_y)).sum();
    if sxx <= 0.0 {
        return Err(FitError::Degenerate("all x values identical".to_string()));
    }

    let slope = sxy / sxx;
    let intercept = mean_y - slope * mean_x;

    let (slope_err, intercept_err) = if x.len() > 2 {
        let ssr: f64 = x
            .iter()
            .zip(y)
            .map(|(xi, yi)| (yi - (slope * xi + intercept)).powi(2))
            .sum();
        let s2 = ssr / (n - 2.0);
        let slope_var = s2 / sxx;
        let intercept_var = s2 * (1.0 / n + mean_x * mean_x / sxx);
        (slope_var.sqrt(), intercept_var.sqrt())
    } else {
        (0.0, 0.0)
    };

    Ok(LinearFit {
        slope,
        intercept,
        slope_err,
        intercept_err,
    })
}

/// Abscissa where two lines cross: `-Δb / Δm`
/// Gantree: intersection(first,second) -> FitOutcome<f64> // 교차점
pub fn intersection(first: &LinearFit, second: &LinearFit) -> FitOutcome<f64> {
    let dm = second.slope - first.slope;
    let db = second.intercept - first.intercept;
    if dm.abs() < PARALLEL_EPS {
        return Err(FitError::Degenerate("lines are parallel".to_string()));
    }
    let x = -db / dm;
    if !x.is_finite() {
        return Err(FitError::Diverged("intersection not finite".to_string()));
    }
    Ok(x)
}

// ============================================================================
// Tests
// ============================================================================
