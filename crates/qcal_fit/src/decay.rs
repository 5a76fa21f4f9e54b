//! Exponential decay fit
//!
//! Gantree: L4_Fit → Decay
//!
//! Model `y = a·exp(d·t) + c`. The seed comes from a log-linear regression of
//! the baseline-subtracted data; Levenberg-Marquardt refines all three
//! parameters and the covariance is `s²·(JᵀJ)⁻¹`.

use crate::error::{check_xy, FitError, FitOutcome};
use crate::linear::fit_linear;
use log::debug;
use nalgebra::{Matrix3, Vector3};
use qcal_core::fit::{CONVERGENCE_TOL, MAX_ITERATIONS};
use serde::{Deserialize, Serialize};

/// Fitted exponential decay
/// Gantree: DecayFit // 지수 감쇠 피팅
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecayFit {
    /// Amplitude `a`
    pub amplitude: f64,
    /// Rate `d` (negative for a decay)
    pub decay: f64,
    /// Offset `c`
    pub offset: f64,
    /// Parameter covariance, order `(a, d, c)`
    pub covariance: Matrix3<f64>,
    /// Iterations used
    pub iterations: usize,
}

impl DecayFit {
    /// Evaluate the model
    pub fn eval(&self, t: f64) -> f64 {
        model(&Vector3::new(self.amplitude, self.decay, self.offset), t)
    }

    /// Variance of the decay rate
    pub fn decay_variance(&self) -> f64 {
        self.covariance[(1, 1)]
    }

    /// Time constant `-1/d` and its standard error `τ·σ_d/|d|`
    pub fn time_constant(&self) -> FitOutcome<(f64, f64)> {
        if self.decay >= 0.0 {
            return Err(FitError::Degenerate(format!(
                "non-decaying rate {:.4e}",
                self.decay
            )));
        }
        let tau = -1.0 / self.decay;
        let err = tau * self.decay_variance().max(0.0).sqrt() / self.decay.abs();
        Ok((tau, err))
    }
}

fn model(p: &Vector3<f64>, t: f64) -> f64 {
    p[0] * (p[1] * t).exp() + p[2]
}

fn ssr(p: &Vector3<f64>, t: &[f64], y: &[f64]) -> f64 {
    t.iter().zip(y).map(|(ti, yi)| (yi - model(p, *ti)).powi(2)).sum()
}

/// Fit `a·exp(d·t) + c`
/// Gantree: fit_decay_exp(t,y) -> FitOutcome<DecayFit> // 감쇠 피팅
pub fn fit_decay_exp(t: &[f64], y: &[f64]) -> FitOutcome<DecayFit> {
    check_xy(t, y, 4)?;
    let mut p = seed(t, y);
    debug!("Decay seed a={:.4e} d={:.4e} c={:.4e}", p[0], p[1], p[2]);

    let mut lambda = 1e-3;
    let mut cost = ssr(&p, t, y);
    let mut iterations = 0;

    while iterations < MAX_ITERATIONS {
        iterations += 1;
        let (jtj, jtr) = normal_equations(&p, t, y);

        let mut damped = jtj;
        for k in 0..3 {
            damped[(k, k)] += lambda * jtj[(k, k)].max(f64::MIN_POSITIVE);
        }
        let Some(step) = damped.lu().solve(&jtr) else {
            lambda *= 10.0;
            if lambda > 1e12 {
                break;
            }
            continue;
        };

        let candidate = p + step;
        let candidate_cost = ssr(&candidate, t, y);
        if candidate_cost.is_finite() && candidate_cost < cost {
            let improvement = cost - candidate_cost;
            let small_step = step
                .iter()
                .zip(p.iter())
                .all(|(s, v)| s.abs() <= 1e-10 * (v.abs() + 1e-10));
            p = candidate;
            cost = candidate_cost;
            lambda = (lambda / 10.0).max(1e-12);
            if small_step && improvement <= CONVERGENCE_TOL * cost.max(CONVERGENCE_TOL) {
                break;
            }
        } else {
            lambda *= 10.0;
            if lambda > 1e12 {
                break;
            }
        }
    }

    if p.iter().any(|v| !v.is_finite()) || !cost.is_finite() {
        return Err(FitError::Diverged("non-finite parameters".to_string()));
    }

    let (jtj, _) = normal_equations(&p, t, y);
    let dof = (t.len() as f64 - 3.0).max(1.0);
    let covariance = jtj
        .try_inverse()
        .filter(|inv| inv.iter().all(|v| v.is_finite()))
        .map(|inv| inv * (cost / dof))
        .ok_or_else(|| FitError::Degenerate("singular Jacobian at the optimum".to_string()))?;

    Ok(DecayFit {
        amplitude: p[0],
        decay: p[1],
        offset: p[2],
        covariance,
        iterations,
    })
}

/// Initial guess: offset from the tail, rate from log-linear regression
fn seed(t: &[f64], y: &[f64]) -> Vector3<f64> {
    let n = y.len();
    let tail = (n / 10).max(1);
    let offset = y[n - tail..].iter().sum::<f64>() / tail as f64;
    let amplitude = y[0] - offset;
    let span = (t[n - 1] - t[0]).abs().max(f64::MIN_POSITIVE);
    let fallback = -3.0 / span;

    let sign = amplitude.signum();
    let floor = amplitude.abs() * 1e-3;
    let (xs, ys): (Vec<f64>, Vec<f64>) = t
        .iter()
        .zip(y)
        .filter_map(|(ti, yi)| {
            let shifted = (yi - offset) * sign;
            (shifted > floor).then(|| (*ti, shifted.ln()))
        })
        .unzip();

    let decay = match fit_linear(&xs, &ys) {
        Ok(line) if line.slope < 0.0 && line.slope.is_finite() => line.slope,
        _ => fallback,
    };
    Vector3::new(amplitude, decay, offset)
}

fn normal_equations(p: &Vector3<f64>, t: &[f64], y: &[f64]) -> (Matrix3<f64>, Vector3<f64>) {
    let mut jtj = Matrix3::zeros();
    let mut jtr = Vector3::zeros();
    for (ti, yi) in t.iter().zip(y) {
        let e = (p[1] * ti).exp();
        let j = Vector3::new(e, p[0] * ti * e, 1.0);
        let r = yi - (p[0] * e + p[2]);
        jtr += j * r;
        jtj += j * j.transpose();
    }
    (jtj, jtr)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn times() -> Vec<f64> {
        (0..40).map(|i| i as f64 * 1.5).collect()
    }

    #[test]
    fn test_exact_decay() {
        let t = times();
        let y: Vec<f64> = t.iter().map(|ti| 0.4 * (-ti / 15.0).exp() + 0.1).collect();
        let fit = fit_decay_exp(&t, &y).unwrap();

        assert_relative_eq!(fit.decay, -1.0 / 15.0, epsilon = 1e-6);
        assert_relative_eq!(fit.amplitude, 0.4, epsilon = 1e-6);
        assert_relative_eq!(fit.offset, 0.1, epsilon = 1e-6);
        let (tau, err) = fit.time_constant().unwrap();
        assert_relative_eq!(tau, 15.0, epsilon = 1e-4);
        assert!(err < 1e-3);
    }

    #[test]
    fn test_rising_decay() {
        // Population relaxing upwards, a < 0
        let t = times();
        let y: Vec<f64> = t.iter().map(|ti| -0.3 * (-ti / 20.0).exp() + 0.5).collect();
        let fit = fit_decay_exp(&t, &y).unwrap();
        assert_relative_eq!(fit.decay, -0.05, epsilon = 1e-6);
        assert_relative_eq!(fit.amplitude, -0.3, epsilon = 1e-6);
    }

    #[test]
    fn test_noisy_decay_has_uncertainty() {
        let t = times();
        let y: Vec<f64> = t
            .iter()
            .enumerate()
            .map(|(i, ti)| {
                let wiggle = if i % 2 == 0 { 0.004 } else { -0.004 };
                0.4 * (-ti / 15.0).exp() + 0.1 + wiggle
            })
            .collect();
        let fit = fit_decay_exp(&t, &y).unwrap();
        let (tau, err) = fit.time_constant().unwrap();
        assert!((tau - 15.0).abs() < 1.0, "tau = {}", tau);
        assert!(err > 0.0 && err < 2.0, "err = {}", err);
    }

    #[test]
    fn test_deterministic() {
        let t = times();
        let y: Vec<f64> = t.iter().map(|ti| 0.2 * (-ti / 5.0).exp()).collect();
        assert_eq!(fit_decay_exp(&t, &y).unwrap(), fit_decay_exp(&t, &y).unwrap());
    }

    #[test]
    fn test_bad_input() {
        assert!(matches!(
            fit_decay_exp(&[0.0, 1.0], &[1.0, 0.5]),
            Err(FitError::TooFewPoints { .. })
        ));
        assert_eq!(
            fit_decay_exp(&[0.0, 1.0, 2.0, 3.0], &[1.0, f64::NAN, 0.2, 0.1]),
            Err(FitError::NonFinite)
        );
    }

    #[test]
    fn test_flat_data_is_not_a_decay() {
        let t = times();
        let y = vec![0.3; t.len()];
        let outcome = fit_decay_exp(&t, &y).and_then(|f| f.time_constant());
        assert!(outcome.is_err());
    }

    #[test]
    fn test_covariance_is_symmetric() {
        let t = times();
        let y: Vec<f64> = t
            .iter()
            .enumerate()
            .map(|(i, ti)| 0.4 * (-ti / 15.0).exp() + 0.1 + if i % 3 == 0 { 0.003 } else { -0.0015 })
            .collect();
        let fit = fit_decay_exp(&t, &y).unwrap();
        assert_relative_eq!(fit.covariance, fit.covariance.transpose(), epsilon = 1e-12);
        assert!((0..3).all(|k| fit.covariance[(k, k)] > 0.0));
    }
}
