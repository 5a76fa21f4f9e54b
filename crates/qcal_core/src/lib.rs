//! # QCAL Core
//!
//! Foundation types for the QCAL calibration node lifecycle.
//!
//! ## Gantree Architecture
//!
//! ```text
//! qcal_core // L0: Foundation (완료)
//!     CoreTypes // FluxPoint, ResetType, Quantity (완료)
//!     Constants // 타이밍/기본값/피팅 상수 (완료)
//!     Errors // QcalError 분류 (완료)
//!     Sweep // SweepRange 검증 (완료)
//!     NodeParameters // 공통 파라미터 (완료)
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use qcal_core::prelude::*;
//!
//! // DRAG amplitude-factor sweep
//! let amps = SweepRange::new(0.0001, 2.0, 0.05).unwrap();
//! assert_eq!(amps.len(), 40);
//!
//! // Node parameters from a parameter file
//! let params: NodeParameters =
//!     serde_json::from_str(r#"{"qubits": "q1,q2", "reset_type": "active"}"#).unwrap();
//! assert_eq!(params.reset_type(), ResetType::Active);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// ============================================================================
// Module Declarations
// ============================================================================

/// Core types (Gantree: L0_Foundation → CoreTypes)
pub mod types;

/// Constants (Gantree: L0_Foundation → Constants)
pub mod constants;

/// Error types (Gantree: L0_Foundation → Errors)
pub mod error;

/// Sweep ranges (Gantree: L0_Foundation → Sweep)
pub mod sweep;

/// Node parameters (Gantree: L0_Foundation → NodeParameters)
pub mod params;

// ============================================================================
// Re-exports
// ============================================================================

pub use constants::{defaults, fit, timing};
pub use error::{ConnectionFailure, QcalError, QcalResult};
pub use params::{NodeParameters, NodeParametersSpec, QubitSelection};
pub use sweep::{SweepBounds, SweepRange};
pub use types::{DeviceId, FluxPoint, Quantity, ResetType};

// ============================================================================
// Prelude
// ============================================================================

pub mod prelude {
    //! Convenient imports for common use cases
    //!
    //! ```rust
    //! use qcal_core::prelude::*;
    //! ```

    pub use crate::constants::{defaults, fit, timing};
    pub use crate::error::{ConnectionFailure, QcalError, QcalResult};
    pub use crate::params::{NodeParameters, NodeParametersSpec, QubitSelection};
    pub use crate::sweep::{SweepBounds, SweepRange};
    pub use crate::types::{DeviceId, FluxPoint, Quantity, ResetType};
}

// ============================================================================
// Version Information
// ============================================================================

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");

// ============================================================================
// Integration Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::prelude::*;

    #[test]
    fn test_t2_echo_wait_sweep_in_cycles() {
        // 16 ns .. 50 us, step 300 ns, all in clock cycles
        let min = timing::ns_to_cycles(16) as f64;
        let max = timing::ns_to_cycles(50_000) as f64;
        let step = timing::ns_to_cycles(300) as f64;
        let sweep = SweepRange::new(min, max, step).unwrap();

        assert_eq!(sweep.values()[0], 4.0);
        assert_eq!(sweep.len(), ((12_500.0 - 4.0) / 75.0_f64).ceil() as usize);
    }

    #[test]
    fn test_step_below_clock_cycle_rejected() {
        let step = timing::ns_to_cycles(3) as f64;
        assert!(SweepRange::new(4.0, 100.0, step).is_err());
    }

    #[test]
    fn test_parameters_from_file_fragment() {
        let params: NodeParameters = serde_json::from_str(
            r#"{
                "qubits": ["q1"],
                "num_averages": 250,
                "flux_point": "arbitrary",
                "reset_type": "active",
                "simulate": true,
                "timeout": 30
            }"#,
        )
        .unwrap();

        assert_eq!(params.flux_point(), FluxPoint::Arbitrary);
        assert!(params.simulate());
        assert_eq!(params.timeout().as_secs(), 30);
        assert_eq!(params.simulation_duration(), timing::DEFAULT_SIMULATION_CYCLES);
    }

    #[test]
    fn test_bad_parameters_are_configuration_errors() {
        let err = NodeParameters::new(NodeParametersSpec {
            num_averages: 0,
            ..Default::default()
        })
        .unwrap_err();
        assert!(err.is_setup_error());
        assert!(!err.is_recoverable());
    }
}
