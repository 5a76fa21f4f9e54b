//! Core types for QCAL
//!
//! Gantree: L0_Foundation → CoreTypes
//!
//! Enumerated selectors shared by every calibration node.

use crate::error::{QcalError, QcalResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Device identifier (qubit name as recorded in the device state)
/// Gantree: DeviceId = String
pub type DeviceId = String;

// ============================================================================
// FluxPoint
// ============================================================================

/// Bias configuration applied before sequencing
/// Gantree: FluxPoint // 플럭스 바이어스 모드
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FluxPoint {
    /// Other qubits parked at their minimum, target at its independent idle
    #[default]
    Independent,
    /// Every qubit at its joint idle offset
    Joint,
    /// Joint idle plus a per-qubit arbitrary offset pulsed during the sequence
    Arbitrary,
}

impl FluxPoint {
    /// All selector values
    pub const ALL: [FluxPoint; 3] = [FluxPoint::Independent, FluxPoint::Joint, FluxPoint::Arbitrary];

    /// Selector name as written in parameter files
    pub fn as_str(&self) -> &'static str {
        match self {
            FluxPoint::Independent => "independent",
            FluxPoint::Joint => "joint",
            FluxPoint::Arbitrary => "arbitrary",
        }
    }
}

impl fmt::Display for FluxPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FluxPoint {
    type Err = QcalError;

    fn from_str(s: &str) -> QcalResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "independent" => Ok(FluxPoint::Independent),
            "joint" => Ok(FluxPoint::Joint),
            "arbitrary" => Ok(FluxPoint::Arbitrary),
            other => Err(QcalError::config(format!(
                "flux_point '{}' must be one of independent, joint, arbitrary",
                other
            ))),
        }
    }
}

// ============================================================================
// ResetType
// ============================================================================

/// How the qubit is returned to ground between shots
/// Gantree: ResetType // 리셋 방식
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResetType {
    /// Wait for the thermalization time
    #[default]
    Thermal,
    /// Measurement-conditioned pi pulses until ground
    Active,
}

impl ResetType {
    /// Selector name as written in parameter files
    pub fn as_str(&self) -> &'static str {
        match self {
            ResetType::Thermal => "thermal",
            ResetType::Active => "active",
        }
    }
}

impl fmt::Display for ResetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResetType {
    type Err = QcalError;

    fn from_str(s: &str) -> QcalResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "thermal" => Ok(ResetType::Thermal),
            "active" => Ok(ResetType::Active),
            other => Err(QcalError::config(format!(
                "reset_type '{}' must be one of active, thermal",
                other
            ))),
        }
    }
}

// ============================================================================
// Quantity
// ============================================================================

/// Measured quantity streamed back by the runtime
/// Gantree: Quantity // 측정량
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Quantity {
    /// Discriminated qubit state (averaged: excited population)
    #[serde(rename = "state")]
    State,
    /// In-phase quadrature
    I,
    /// Quadrature
    Q,
}

impl Quantity {
    /// Stream prefix used by the runtime
    pub fn as_str(&self) -> &'static str {
        match self {
            Quantity::State => "state",
            Quantity::I => "I",
            Quantity::Q => "Q",
        }
    }

    /// Stream name for the device at `index` (streams are numbered from 1)
    pub fn stream_name(&self, index: usize) -> String {
        format!("{}{}", self.as_str(), index + 1)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Tests
// ============================================================================
