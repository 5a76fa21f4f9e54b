//! # QCAL Runtime
//!
//! Boundary to the control runtime and device sessions.
//!
//! ## Gantree Architecture
//!
//! ```text
//! qcal_runtime // L2: Runtime (완료)
//!     SequenceProgram // 선언적 프로그램 (완료)
//!     RuntimeTraits // ControlRuntime, Machine, RunningJob (완료)
//!     SyntheticRuntime // 합성 런타임 (완료)
//!         open_machine() - 지연/인증 검사
//!         execute() - 응답 모델 + 시드 노이즈
//!         simulate() - 요소별 진폭 트레이스
//!     Session // 장치 세션 (완료)
//!         resolve_targets(), connect(), save()
//!     MachineGuard // 플럭스 0 복귀 후 해제 (완료)
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use qcal_runtime::prelude::*;
//! use qcal_state::DeviceState;
//! use serde_json::json;
//! use std::time::Duration;
//!
//! let state = DeviceState::from_value(json!({
//!     "qubits": {"q1": {"z": {"independent_offset": 0.1}}}
//! })).unwrap();
//! let session = Session::from_state(state, "state.json");
//!
//! let runtime = SyntheticRuntime::new().with_seed(42);
//! let mut guard = session.connect(&runtime, Duration::from_secs(10)).unwrap();
//! guard.set_dc_offset("q1.z", 0.1).unwrap();
//! guard.close().unwrap();
//!
//! assert_eq!(runtime.log().offset("q1.z"), 0.0);
//! ```

#![warn(missing_docs)]

// ============================================================================
// Module Declarations
// ============================================================================

/// Sequence programs (Gantree: L2_Runtime → SequenceProgram)
pub mod program;

/// Runtime traits (Gantree: L2_Runtime → RuntimeTraits)
pub mod runtime;

/// Synthetic runtime (Gantree: L2_Runtime → SyntheticRuntime)
pub mod synthetic;

/// Device sessions (Gantree: L2_Runtime → Session)
pub mod session;

// ============================================================================
// Re-exports
// ============================================================================

pub use program::{
    AmplitudeScale, DeviceBlock, PulseStep, ResetStrategy, Scalar, SequenceProgram, SweepAxis,
    ITERATION_STREAM,
};
pub use runtime::{
    ControlRuntime, Machine, PartialRecord, ResultHandles, RunningJob, SimulatedSamples,
    SimulationConfig,
};
pub use session::{MachineGuard, Session};
pub use synthetic::{gaussian, ConstantResponse, MachineLog, PointContext, ResponseModel, SyntheticRuntime};

// ============================================================================
// Prelude
// ============================================================================

/// Convenient imports for common use cases
pub mod prelude {
    //! Prelude module for convenient imports
    //!
    //! ```rust
    //! use qcal_runtime::prelude::*;
    //! ```

    pub use crate::program::{
        AmplitudeScale, DeviceBlock, PulseStep, ResetStrategy, Scalar, SequenceProgram, SweepAxis,
    };
    pub use crate::runtime::{
        ControlRuntime, Machine, ResultHandles, RunningJob, SimulatedSamples, SimulationConfig,
    };
    pub use crate::session::{MachineGuard, Session};
    pub use crate::synthetic::{PointContext, ResponseModel, SyntheticRuntime};
}

// ============================================================================
// Integration Tests
// ============================================================================
