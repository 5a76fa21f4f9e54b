//! # QCAL State
//!
//! Persisted device state for calibration nodes.
//!
//! ## Gantree Architecture
//!
//! ```text
//! qcal_state // L1: State (완료)
//!     Path // StatePath, Reference (완료)
//!     DeviceState // 로드/조회/갱신/저장 (완료)
//!         load(), get(), set(), save()
//!         concrete_path() - 참조 해석, 순환 검사
//!     TrackedUpdate // 되돌릴 수 있는 갱신 (완료)
//!         begin(), set(), revert(), commit()
//!     Qubit // 큐비트 뷰 (완료)
//!     HardwareConfig // 하드웨어 설정 생성 (완료)
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use qcal_state::prelude::*;
//! use serde_json::json;
//!
//! let mut state = DeviceState::from_value(json!({
//!     "qubits": {"q1": {"xy": {"operations": {
//!         "x180": {"alpha": 0.8},
//!         "x90": {"alpha": "#../x180/alpha"}
//!     }}}}
//! })).unwrap();
//!
//! let q1 = Qubit::lookup(&state, "q1").unwrap();
//! assert_eq!(q1.operation_value(&state, "x90", "alpha").unwrap(), 0.8);
//!
//! // Temporary override, reverted before saving
//! let mut update = TrackedUpdate::begin(&mut state, TrackOptions::default());
//! update.set(&mut state, &q1.operation_attr("x180", "alpha"), json!(-1.0)).unwrap();
//! update.revert(&mut state).unwrap();
//! assert_eq!(q1.operation_value(&state, "x180", "alpha").unwrap(), 0.8);
//! ```

#![warn(missing_docs)]

// ============================================================================
// Module Declarations
// ============================================================================

/// Paths and references (Gantree: L1_State → Path)
pub mod path;

/// Device-state document (Gantree: L1_State → DeviceState)
pub mod state;

/// Tracked updates (Gantree: L1_State → TrackedUpdate)
pub mod tracked;

/// Qubit views (Gantree: L1_State → Qubit)
pub mod qubit;

/// Hardware configuration (Gantree: L1_State → HardwareConfig)
pub mod config;

// ============================================================================
// Re-exports
// ============================================================================

pub use config::{ElementConfig, ElementKind, HardwareConfig, NetworkConfig};
pub use path::{Reference, StatePath};
pub use qubit::{FluxOffsets, Qubit};
pub use state::DeviceState;
pub use tracked::{ScopedOverride, TrackOptions, TrackedUpdate};

// ============================================================================
// Prelude
// ============================================================================

/// Convenient imports for common use cases
pub mod prelude {
    //! Prelude module for convenient imports
    //!
    //! ```rust
    //! use qcal_state::prelude::*;
    //! ```

    pub use crate::config::{HardwareConfig, NetworkConfig};
    pub use crate::path::{Reference, StatePath};
    pub use crate::qubit::{FluxOffsets, Qubit};
    pub use crate::state::DeviceState;
    pub use crate::tracked::{ScopedOverride, TrackOptions, TrackedUpdate};
}

// ============================================================================
// Integration Tests
// ============================================================================
