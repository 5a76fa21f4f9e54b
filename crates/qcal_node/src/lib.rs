//! # QCAL Node
//!
//! Calibration experiments and the node run lifecycle.
//!
//! ## Gantree Architecture
//!
//! ```text
//! qcal_node // L5: Node (완료)
//!     Params // 계층형 파라미터 로딩 (완료)
//!     Flux // 플럭스 바이어스 준비 (완료)
//!     Experiment // 실험 트레이트, 실행 컨텍스트 (완료)
//!     Update // 공유 대상 갱신 계획 (완료)
//!     Drag // DRAG 180/90 보정 (완료)
//!     T2Echo // 한 에코 결맞음 (완료)
//!     IqBlobs // 단일 샷 판별 (완료)
//!     Storage // 실행 폴더, 산출물 (완료)
//!     Reporter // report.md, fit_results.csv (완료)
//!     Runner // 실행 수명주기 (완료)
//!         run() - 대상 해석 → 프로그램 → 실행/시뮬레이션 → 피팅 → 갱신 → 저장
//!     Demo // 데모 장치, 합성 응답 (완료)
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use qcal_node::prelude::*;
//! use qcal_runtime::{Session, SyntheticRuntime};
//! use qcal_state::DeviceState;
//!
//! let dir = tempfile::tempdir().unwrap();
//! let state = DeviceState::from_value(demo_state()).unwrap();
//! let mut session = Session::from_state(state, dir.path().join("state.json"));
//!
//! let runtime = SyntheticRuntime::new().with_model(DemoResponse::default());
//! let node = CalibrationNode::new(&runtime, RunStorage::new(dir.path().join("data")));
//!
//! let spec: DragParametersSpec =
//!     load_spec(None, &serde_json::json!({"qubits": "q1", "num_averages": 10})).unwrap();
//! let report = node.run(&DragCalibration::new(spec).unwrap(), &mut session).unwrap();
//!
//! let alpha = report.fits.unwrap().get("q1").unwrap().parameter("alpha").unwrap();
//! assert!((alpha + 0.8).abs() < 1e-6);
//! ```

#![warn(missing_docs)]

// ============================================================================
// Module Declarations
// ============================================================================

/// Experiment parameters (Gantree: L5_Node → Params)
pub mod params;

/// Flux bias preparation (Gantree: L5_Node → Flux)
pub mod flux;

/// Experiment trait and run context (Gantree: L5_Node → Experiment)
pub mod experiment;

/// State update planning (Gantree: L5_Node → Update)
pub mod update;

/// DRAG calibration (Gantree: L5_Node → Drag)
pub mod drag;

/// T2 echo (Gantree: L5_Node → T2Echo)
pub mod t2_echo;

/// IQ blobs (Gantree: L5_Node → IqBlobs)
pub mod iq_blobs;

/// Run artifact storage (Gantree: L5_Node → Storage)
pub mod storage;

/// Run reports (Gantree: L5_Node → Reporter)
pub mod report;

/// Run lifecycle (Gantree: L5_Node → Runner)
pub mod runner;

/// Demo device (Gantree: L5_Node → Demo)
pub mod demo;

#[cfg(test)]
pub(crate) mod testing;

// ============================================================================
// Re-exports
// ============================================================================

pub use demo::{demo_state, DemoResponse};
pub use drag::DragCalibration;
pub use experiment::{Experiment, RunContext};
pub use iq_blobs::IqBlobs;
pub use params::{
    load_parameters, load_spec, DragParameters, DragParametersSpec, IqBlobsParameters,
    IqBlobsParametersSpec, T2EchoParameters, T2EchoParametersSpec,
};
pub use report::Reporter;
pub use runner::{CalibrationNode, NodeRecord, NodeReport, RunStatus};
pub use storage::{files, RunFolder, RunStorage};
pub use t2_echo::T2Echo;
pub use update::{PlannedUpdate, Proposal, UpdateDecision, UpdatePlan};

// ============================================================================
// Prelude
// ============================================================================

/// Convenient imports for common use cases
pub mod prelude {
    //! Prelude module for convenient imports
    //!
    //! ```rust
    //! use qcal_node::prelude::*;
    //! ```

    pub use crate::demo::{demo_state, DemoResponse};
    pub use crate::drag::DragCalibration;
    pub use crate::experiment::{Experiment, RunContext};
    pub use crate::iq_blobs::IqBlobs;
    pub use crate::params::{
        load_spec, DragParametersSpec, IqBlobsParametersSpec, T2EchoParametersSpec,
    };
    pub use crate::runner::{CalibrationNode, NodeReport, RunStatus};
    pub use crate::storage::RunStorage;
    pub use crate::t2_echo::T2Echo;
    pub use crate::update::UpdatePlan;
}

// ============================================================================
// Integration Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::prelude::*;
    use crate::storage::files;
    use crate::testing::demo_session_at;
    use approx::assert_relative_eq;
    use qcal_core::{FluxPoint, QcalError};
    use qcal_runtime::{Session, SyntheticRuntime};
    use qcal_state::{DeviceState, StatePath};
    use serde_json::json;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Session, RunStorage) {
        let dir = tempfile::tempdir().unwrap();
        let session = demo_session_at(&dir.path().join("state.json"));
        let storage = RunStorage::new(dir.path().join("data"));
        (dir, session, storage)
    }

    fn drag(overrides: serde_json::Value) -> DragCalibration {
        DragCalibration::new(load_spec(None, &overrides).unwrap()).unwrap()
    }

    #[test]
    fn test_drag_end_to_end() {
        let (dir, mut session, storage) = setup();
        let runtime = SyntheticRuntime::new().with_model(DemoResponse::default());
        let node = CalibrationNode::new(&runtime, storage);

        let report = node.run(&drag(json!({"num_averages": 20})), &mut session).unwrap();
        assert_eq!(report.record.status, RunStatus::Completed);
        assert!(report.record.failed_devices.is_empty());

        // Updated values survive a reload; the override value never does
        let saved = DeviceState::load(dir.path().join("state.json")).unwrap();
        let q1_alpha = StatePath::parse("qubits/q1/xy/operations/x180/alpha");
        let q2_alpha = StatePath::parse("qubits/q2/xy/operations/x180/alpha");
        assert_relative_eq!(saved.get_f64(&q1_alpha).unwrap(), -0.8, epsilon = 1e-9);
        assert_relative_eq!(saved.get_f64(&q2_alpha).unwrap(), -1.1, epsilon = 1e-9);
        assert_eq!(session.state().outstanding_overrides(), 0);

        let artifacts = report.folder.artifacts().unwrap();
        for name in [
            files::DATASET,
            files::FIT_RESULTS,
            files::FIT_RESULTS_CSV,
            files::NODE,
            files::STATE,
            files::REPORT,
        ] {
            assert!(artifacts.contains(&name.to_string()), "missing {}", name);
        }
        assert_eq!(report.record.updates.applied().count(), 2);
    }

    #[test]
    fn test_flux_parked_after_run() {
        let (_dir, mut session, storage) = setup();
        let runtime = SyntheticRuntime::new().with_model(DemoResponse::default());
        let node = CalibrationNode::new(&runtime, storage);

        let echo = T2Echo::new(
            load_spec(None, &json!({"num_averages": 5, "flux_point": "joint"})).unwrap(),
        )
        .unwrap();
        assert_eq!(echo.params().common().flux_point(), FluxPoint::Joint);
        node.run(&echo, &mut session).unwrap();

        let log = runtime.log();
        assert!(log.offset_history.contains(&("q1.z".to_string(), 0.04)));
        assert_eq!(log.offset("q1.z"), 0.0);
        assert_eq!(log.offset("q2.z"), 0.0);
        assert_eq!(log.closed, 1);
    }

    #[test]
    fn test_simulate_never_executes() {
        let (dir, mut session, storage) = setup();
        let runtime = SyntheticRuntime::new();
        let node = CalibrationNode::new(&runtime, storage);

        let report = node
            .run(&drag(json!({"simulate": true, "qubits": ["q1"]})), &mut session)
            .unwrap();
        assert_eq!(report.record.status, RunStatus::Simulated);
        assert!(report.samples.is_some());
        assert!(report.fits.is_none());

        let log = runtime.log();
        assert_eq!(log.opened, 0);
        assert!(log.executed.is_empty());
        assert_eq!(log.simulated, vec!["drag_calibration_180_90"]);

        let artifacts = report.folder.artifacts().unwrap();
        assert!(artifacts.contains(&files::SIMULATED_SAMPLES.to_string()));
        assert!(!artifacts.contains(&files::DATASET.to_string()));
        assert!(!dir.path().join("state.json").exists());
        assert_eq!(session.state().outstanding_overrides(), 0);
    }

    #[test]
    fn test_iq_blobs_updates_readout() {
        let (_dir, mut session, storage) = setup();
        let runtime = SyntheticRuntime::new()
            .with_seed(7)
            .with_model(DemoResponse::default());
        let node = CalibrationNode::new(&runtime, storage);

        let blobs = IqBlobs::new(load_spec(None, &json!({"num_runs": 400})).unwrap()).unwrap();
        let report = node.run(&blobs, &mut session).unwrap();

        let fits = report.fits.unwrap();
        for device in ["q1", "q2"] {
            assert!(fits.get(device).unwrap().parameter("fidelity").unwrap() > 0.95);
        }
        // Three readout attributes per device
        assert_eq!(report.record.updates.applied().count(), 6);
        let threshold = StatePath::parse("qubits/q1/resonator/operations/readout/threshold");
        assert_eq!(
            session.state().get_f64(&threshold).unwrap(),
            fits.get("q1").unwrap().parameter("threshold").unwrap()
        );
    }

    #[test]
    fn test_run_indices_increase() {
        let (_dir, mut session, storage) = setup();
        let runtime = SyntheticRuntime::new();
        let node = CalibrationNode::new(&runtime, storage);
        let simulated = drag(json!({"simulate": true}));

        let first = node.run(&simulated, &mut session).unwrap();
        let second = node.run(&simulated, &mut session).unwrap();
        assert_eq!(first.record.run_index + 1, second.record.run_index);
    }

    #[test]
    fn test_unknown_parameter_rejected() {
        let err = load_spec::<DragParametersSpec>(None, &json!({"amplitude": 1.0})).unwrap_err();
        assert!(matches!(err, QcalError::Configuration(_)));
    }
}
