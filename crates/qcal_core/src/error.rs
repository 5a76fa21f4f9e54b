//! Error types for QCAL
//!
//! Gantree: L0_Foundation → Errors
//!
//! One taxonomy for the whole node lifecycle. Setup errors abort before any
//! hardware contact; fit failures are reported per device.

// Error variant fields are self-documenting via error messages
#![allow(missing_docs)]

use std::fmt;
use thiserror::Error;

/// Why a hardware session could not be established
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionFailure {
    /// Session establishment exceeded the configured timeout
    Timeout,
    /// Runtime rejected the credentials
    Authentication,
    /// Runtime unreachable or refused the configuration
    Unavailable,
}

impl fmt::Display for ConnectionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionFailure::Timeout => write!(f, "timeout"),
            ConnectionFailure::Authentication => write!(f, "authentication failed"),
            ConnectionFailure::Unavailable => write!(f, "unavailable"),
        }
    }
}

/// Main error type for QCAL
/// Gantree: QcalError // enum
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QcalError {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Bad parameter set, detected before any hardware contact
    /// Gantree: Configuration(String) // 파라미터 검증
    #[error("Configuration error: {0}")]
    Configuration(String),

    // ========================================================================
    // State Errors
    // ========================================================================
    /// Device-state document malformed or incomplete
    /// Gantree: StateLoad(String) // 상태 로드
    #[error("Failed to load device state: {0}")]
    StateLoad(String),

    /// Requested device not present in the device state
    #[error("Unknown device '{0}'")]
    UnknownDevice(String),

    /// Reference string that does not resolve
    #[error("Invalid reference '{reference}' at {path}: {reason}")]
    InvalidReference {
        path: String,
        reference: String,
        reason: String,
    },

    /// Reference chain that loops back on itself
    #[error("Reference cycle through {0}")]
    ReferenceCycle(String),

    /// Attribute path absent from the state tree
    #[error("Attribute not found: {0}")]
    AttributeNotFound(String),

    /// Save attempted while a tracked update is still outstanding
    #[error("{0} tracked update(s) still outstanding; revert or commit before saving")]
    PendingOverride(usize),

    // ========================================================================
    // Runtime Errors
    // ========================================================================
    /// Hardware session could not be established
    /// Gantree: Connection{{kind,detail}} // 연결 실패
    #[error("Connection error ({kind}): {detail}")]
    Connection {
        kind: ConnectionFailure,
        detail: String,
    },

    /// Runtime reported a job or machine failure
    #[error("Runtime error: {0}")]
    Runtime(String),

    // ========================================================================
    // Data Errors
    // ========================================================================
    /// Streamed buffer does not match the declared sweep shape
    /// Gantree: ShapeMismatch{{stream,expected,actual}} // 형상 불일치
    #[error("Shape mismatch for stream '{stream}': expected {expected} points, got {actual}")]
    ShapeMismatch {
        stream: String,
        expected: usize,
        actual: usize,
    },

    /// Expected stream missing from the job results
    #[error("Stream '{0}' missing from job results")]
    MissingStream(String),

    /// Per-device fit failure
    /// Gantree: FitFailed{{device,reason}} // 피팅 실패
    #[error("Fit failed for {device}: {reason}")]
    FitFailed { device: String, reason: String },

    // ========================================================================
    // I/O Errors
    // ========================================================================
    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(String),

    /// File I/O error
    #[error("File error: {0}")]
    File(String),

    // ========================================================================
    // Generic Errors
    // ========================================================================
    /// Internal error (should not happen)
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for QCAL operations
/// Gantree: QcalResult<T> // type alias
pub type QcalResult<T> = Result<T, QcalError>;

// ============================================================================
// Error Conversion Helpers
// ============================================================================

impl From<serde_json::Error> for QcalError {
    fn from(err: serde_json::Error) -> Self {
        QcalError::Json(err.to_string())
    }
}

impl From<std::io::Error> for QcalError {
    fn from(err: std::io::Error) -> Self {
        QcalError::File(err.to_string())
    }
}

// ============================================================================
// Error Helpers
// ============================================================================

impl QcalError {
    /// Shorthand for a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        QcalError::Configuration(msg.into())
    }

    /// Check if error is recoverable (run continues for other devices)
    pub fn is_recoverable(&self) -> bool {
        matches!(self, QcalError::FitFailed { .. })
    }

    /// Check if error belongs to setup (parameters, state, connection)
    pub fn is_setup_error(&self) -> bool {
        matches!(
            self,
            QcalError::Configuration(_)
                | QcalError::StateLoad(_)
                | QcalError::UnknownDevice(_)
                | QcalError::InvalidReference { .. }
                | QcalError::ReferenceCycle(_)
                | QcalError::Connection { .. }
        )
    }

    /// Check if error is a data-integrity error
    pub fn is_data_error(&self) -> bool {
        matches!(
            self,
            QcalError::ShapeMismatch { .. } | QcalError::MissingStream(_)
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
