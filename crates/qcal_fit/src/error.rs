//! Fit errors
//!
//! Gantree: L4_Fit → FitError

// Variant fields are self-documenting via error messages
#![allow(missing_docs)]

use thiserror::Error;

/// Why a fit could not produce parameters
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FitError {
    /// Not enough data points for the model
    #[error("need at least {needed} points, got {got}")]
    TooFewPoints { needed: usize, got: usize },

    /// Input contains NaN or infinite values
    #[error("non-finite input data")]
    NonFinite,

    /// Input lengths differ
    #[error("length mismatch: {0} x values, {1} y values")]
    LengthMismatch(usize, usize),

    /// Model is not identifiable from the data
    #[error("degenerate data: {0}")]
    Degenerate(String),

    /// Iteration produced non-finite parameters
    #[error("fit diverged: {0}")]
    Diverged(String),
}

/// Result alias for fit routines
pub type FitOutcome<T> = Result<T, FitError>;

/// Common input validation
pub(crate) fn check_xy(x: &[f64], y: &[f64], needed: usize) -> FitOutcome<()> {
    if x.len() != y.len() {
        return Err(FitError::LengthMismatch(x.len(), y.len()));
    }
    if x.len() < needed {
        return Err(FitError::TooFewPoints {
            needed,
            got: x.len(),
        });
    }
    if x.iter().chain(y).any(|v| !v.is_finite()) {
        return Err(FitError::NonFinite);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_xy() {
        assert!(check_xy(&[1.0, 2.0], &[1.0, 2.0], 2).is_ok());
        assert_eq!(
            check_xy(&[1.0], &[1.0], 2),
            Err(FitError::TooFewPoints { needed: 2, got: 1 })
        );
        assert_eq!(check_xy(&[1.0, 2.0], &[1.0], 1), Err(FitError::LengthMismatch(2, 1)));
        assert_eq!(check_xy(&[1.0, f64::NAN], &[1.0, 2.0], 2), Err(FitError::NonFinite));
    }
}
