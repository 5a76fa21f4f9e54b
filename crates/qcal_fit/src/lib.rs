//! # QCAL Fit
//!
//! Deterministic fitting routines and per-device fit results.
//!
//! ## Gantree Architecture
//!
//! ```text
//! qcal_fit // L4: Fit (완료)
//!     FitError // 피팅 오류 (완료)
//!     Linear // 최소제곱, 교차점 -Δb/Δm (완료)
//!     Decay // a·exp(d·t)+c, 로그-선형 시드 + LM (완료)
//!     Discriminator // IQ 회전, 최소 오분류 임계값, 충실도 (완료)
//!     FitResult // 장치별 결과, 실패 격리 (완료)
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use qcal_fit::prelude::*;
//!
//! let amps = [0.2, 0.6, 1.0, 1.4];
//! let first: Vec<f64> = amps.iter().map(|a| 0.5 + 0.3 * (a - 0.8)).collect();
//! let second: Vec<f64> = amps.iter().map(|a| 0.5 - 0.2 * (a - 0.8)).collect();
//!
//! let crossing = intersection(
//!     &fit_linear(&amps, &first).unwrap(),
//!     &fit_linear(&amps, &second).unwrap(),
//! ).unwrap();
//! assert!((crossing - 0.8).abs() < 1e-9);
//! ```

#![warn(missing_docs)]

// ============================================================================
// Module Declarations
// ============================================================================

/// Fit errors (Gantree: L4_Fit → FitError)
pub mod error;

/// Linear fits (Gantree: L4_Fit → Linear)
pub mod linear;

/// Exponential decay (Gantree: L4_Fit → Decay)
pub mod decay;

/// IQ discriminator (Gantree: L4_Fit → Discriminator)
pub mod discriminator;

/// Per-device results (Gantree: L4_Fit → FitResult)
pub mod result;

// ============================================================================
// Re-exports
// ============================================================================

pub use decay::{fit_decay_exp, DecayFit};
pub use discriminator::{two_state_discriminator, Discrimination};
pub use error::{FitError, FitOutcome};
pub use linear::{fit_linear, intersection, LinearFit};
pub use result::{DeviceFit, FitResult, FitStatus};

// ============================================================================
// Prelude
// ============================================================================

/// Convenient imports for common use cases
pub mod prelude {
    //! Prelude module for convenient imports
    //!
    //! ```rust
    //! use qcal_fit::prelude::*;
    //! ```

    pub use crate::decay::{fit_decay_exp, DecayFit};
    pub use crate::discriminator::{two_state_discriminator, Discrimination};
    pub use crate::error::{FitError, FitOutcome};
    pub use crate::linear::{fit_linear, intersection, LinearFit};
    pub use crate::result::{DeviceFit, FitResult, FitStatus};
}

// ============================================================================
// Integration Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::prelude::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_failure_isolated_to_one_device() {
        let t: Vec<f64> = (0..30).map(|i| i as f64 * 0.5).collect();
        let good: Vec<f64> = t.iter().map(|ti| 0.3 * (-ti / 4.0).exp() + 0.05).collect();
        let broken: Vec<f64> = t
            .iter()
            .enumerate()
            .map(|(i, ti)| if i == 3 { f64::NAN } else { *ti })
            .collect();

        let result = FitResult::per_device(&["q1", "q2"], |device| {
            let y = if device == "q1" { &good } else { &broken };
            let fit = fit_decay_exp(&t, y)?;
            let (tau, err) = fit.time_constant()?;
            Ok(DeviceFit::ok(device).with_estimate("T2e", tau, err))
        });

        assert_relative_eq!(result.get("q1").unwrap().parameter("T2e").unwrap(), 4.0, epsilon = 1e-4);
        assert_eq!(result.failed_devices(), vec!["q2"]);
        assert!(result
            .get("q2")
            .unwrap()
            .failure()
            .unwrap()
            .contains("non-finite"));
    }
}
