//! # QCAL Results
//!
//! Live polling of running jobs and labeled result arrays.
//!
//! ## Gantree Architecture
//!
//! ```text
//! qcal_results // L3: Results (완료)
//!     ResultArray // 라벨 배열, qubit 축 우선 (완료)
//!     Dataset // 측정량별 배열 (완료)
//!     Fetcher // 결과 수집 (완료)
//!         poll_live() - 진행률, 관찰자
//!         assemble() - {quantity}{i+1} 스트림 재구성
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use qcal_results::prelude::*;
//! use qcal_core::Quantity;
//! use qcal_runtime::ResultHandles;
//!
//! let mut handles = ResultHandles::default();
//! handles.insert("state1", vec![0.1, 0.2, 0.3, 0.4]);
//!
//! let axes = vec![
//!     AxisSpec::labels("sequence", ["x180_y90", "y180_x90"]),
//!     AxisSpec::numeric("amp", vec![0.5, 1.0]),
//! ];
//! let ds = assemble(&handles, &["q1".to_string()], &axes, &[Quantity::State]).unwrap();
//! assert_eq!(ds.get(Quantity::State).unwrap().shape(), &[1, 2, 2]);
//! ```

#![warn(missing_docs)]

// ============================================================================
// Module Declarations
// ============================================================================

/// Result arrays (Gantree: L3_Results → ResultArray)
pub mod array;

/// Live polling and assembly (Gantree: L3_Results → Fetcher)
pub mod fetch;

// ============================================================================
// Re-exports
// ============================================================================

pub use array::{AxisSpec, Coords, Dataset, ResultArray, QUBIT_AXIS};
pub use fetch::{
    assemble, poll_live, wait_for_completion, wait_observed, LivePoll, Progress, ProgressCounter,
    ProgressObserver,
};

// ============================================================================
// Prelude
// ============================================================================

/// Convenient imports for common use cases
pub mod prelude {
    //! Prelude module for convenient imports
    //!
    //! ```rust
    //! use qcal_results::prelude::*;
    //! ```

    pub use crate::array::{AxisSpec, Coords, Dataset, ResultArray};
    pub use crate::fetch::{assemble, poll_live, wait_for_completion, Progress, ProgressObserver};
}

// ============================================================================
// Integration Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::prelude::*;
    use qcal_core::Quantity;
    use qcal_runtime::prelude::*;
    use qcal_state::DeviceState;
    use rand::RngCore;
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn test_poll_then_assemble_from_synthetic_job() {
        let state = DeviceState::from_value(json!({
            "qubits": {"q1": {"xy": {"operations": {}}}, "q2": {"xy": {"operations": {}}}}
        }))
        .unwrap();
        let session = Session::from_state(state, "state.json");
        let runtime = SyntheticRuntime::new().with_polls(3).with_model(
            |p: &PointContext<'_>, _: &mut dyn RngCore| {
                p.device_index as f64 * 10.0 + p.coord("t").unwrap_or(0.0)
            },
        );

        let program = SequenceProgram {
            name: "decay".into(),
            num_averages: 90,
            axes: vec![SweepAxis::new("t", vec![1.0, 2.0, 3.0])],
            variant_axis: None,
            blocks: ["q1", "q2"]
                .iter()
                .map(|d| DeviceBlock {
                    device: d.to_string(),
                    flux: vec![],
                    reset: ResetStrategy::Thermal { wait_ns: 0.0 },
                    variants: vec![vec![]],
                })
                .collect(),
            quantities: vec![Quantity::I],
            averaged: true,
        };

        let mut guard = session.connect(&runtime, Duration::from_secs(1)).unwrap();
        let mut job = guard.execute(&program).unwrap();
        let fields = program.stream_names();
        let last = wait_for_completion(poll_live(job.as_mut(), &fields, 90))
            .unwrap()
            .unwrap();
        assert_eq!(last.iteration, 90);

        let devices = vec!["q1".to_string(), "q2".to_string()];
        let axes: Vec<AxisSpec> = program.axes.iter().map(AxisSpec::from).collect();
        let ds = assemble(&job.result_handles().unwrap(), &devices, &axes, &program.quantities).unwrap();
        let i = ds.get(Quantity::I).unwrap();
        assert_eq!(i.flatten(), vec![vec![1.0, 2.0, 3.0], vec![11.0, 12.0, 13.0]]);
    }
}
