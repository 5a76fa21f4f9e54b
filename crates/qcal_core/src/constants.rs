//! Constants for QCAL
//!
//! Gantree: L0_Foundation → Constants
//!
//! Timing and default values shared by the calibration nodes.

// ============================================================================
// Timing Constants
// Gantree: timing // 타이밍 상수
// ============================================================================

pub mod timing {
    //! Controller timing

    /// One controller clock cycle in nanoseconds
    /// Gantree: CLOCK_CYCLE_NS: u64 = 4
    pub const CLOCK_CYCLE_NS: u64 = 4;

    /// Minimum wait the controller accepts, in clock cycles
    pub const MIN_WAIT_CYCLES: u64 = 4;

    /// Default simulation duration in clock cycles
    pub const DEFAULT_SIMULATION_CYCLES: u64 = 10_000;

    /// Convert nanoseconds to whole clock cycles (floor)
    #[inline]
    pub const fn ns_to_cycles(ns: u64) -> u64 {
        ns / CLOCK_CYCLE_NS
    }

    /// Convert clock cycles to microseconds
    #[inline]
    pub fn cycles_to_us(cycles: f64) -> f64 {
        cycles * CLOCK_CYCLE_NS as f64 / 1e3
    }
}

// ============================================================================
// Node Defaults
// Gantree: defaults // 기본값
// ============================================================================

pub mod defaults {
    //! Default node parameters

    /// Default number of averages
    pub const NUM_AVERAGES: u32 = 1000;

    /// Default session timeout in seconds
    pub const TIMEOUT_S: u64 = 100;

    /// Active reset gives up after this many conditional pulses
    pub const ACTIVE_RESET_MAX_ATTEMPTS: u32 = 3;

    /// Environment variable holding the device-state path
    pub const STATE_PATH_ENV: &str = "QCAL_STATE_PATH";

    /// Environment variable holding the artifact directory
    pub const DATA_DIR_ENV: &str = "QCAL_DATA_DIR";

    /// Directory under the home directory used when no path is configured
    pub const HOME_DIR_NAME: &str = ".qcal";
}

// ============================================================================
// Fit Constants
// Gantree: fit // 피팅 상수
// ============================================================================

pub mod fit {
    //! Fit tolerances

    /// Slope differences below this are treated as parallel lines
    pub const PARALLEL_EPS: f64 = 1e-12;

    /// Maximum damped Gauss-Newton iterations for the decay fit
    pub const MAX_ITERATIONS: usize = 200;

    /// Relative cost improvement that ends the decay fit
    pub const CONVERGENCE_TOL: f64 = 1e-12;

    /// Tolerance used when comparing proposed values for a shared attribute
    pub const SHARED_VALUE_TOL: f64 = 1e-12;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ns_to_cycles() {
        assert_eq!(timing::ns_to_cycles(16), 4);
        assert_eq!(timing::ns_to_cycles(50_000), 12_500);
        assert_eq!(timing::ns_to_cycles(3), 0);
    }

    #[test]
    fn test_cycles_to_us() {
        assert!((timing::cycles_to_us(250.0) - 1.0).abs() < 1e-12);
    }
}
