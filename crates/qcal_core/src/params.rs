//! Node parameters
//!
//! Gantree: L0_Foundation → NodeParameters
//!
//! Parameters shared by every calibration node. A [`NodeParametersSpec`] holds
//! the raw values (file defaults plus overrides); converting it into
//! [`NodeParameters`] validates everything once, after which the parameters
//! are read-only.

use crate::constants::{defaults, timing};
use crate::error::{QcalError, QcalResult};
use crate::types::{DeviceId, FluxPoint, ResetType};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Qubit selection as accepted in parameter files
///
/// Either a JSON list or a comma separated string (`"q1, q2"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QubitSelection {
    /// Explicit list
    List(Vec<String>),
    /// Comma separated names
    Csv(String),
}

impl QubitSelection {
    /// Normalize to a list of trimmed names; empty means "all active"
    pub fn names(&self) -> Vec<String> {
        let raw: Vec<String> = match self {
            QubitSelection::List(list) => list.clone(),
            QubitSelection::Csv(csv) => csv.split(',').map(str::to_string).collect(),
        };
        raw.into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

/// Raw node parameters (defaults + overrides, not yet validated)
/// Gantree: NodeParametersSpec // 원시 파라미터
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeParametersSpec {
    /// Target qubits; `None` selects the active qubits
    pub qubits: Option<QubitSelection>,

    /// Number of averages
    pub num_averages: i64,

    /// Flux bias mode
    pub flux_point: FluxPoint,

    /// Reset strategy
    pub reset_type: ResetType,

    /// Replay against the simulator instead of measuring
    pub simulate: bool,

    /// Session establishment timeout (seconds)
    pub timeout: i64,

    /// Simulation duration (clock cycles)
    pub simulation_duration: i64,
}

impl Default for NodeParametersSpec {
    fn default() -> Self {
        Self {
            qubits: None,
            num_averages: defaults::NUM_AVERAGES as i64,
            flux_point: FluxPoint::default(),
            reset_type: ResetType::default(),
            simulate: false,
            timeout: defaults::TIMEOUT_S as i64,
            simulation_duration: timing::DEFAULT_SIMULATION_CYCLES as i64,
        }
    }
}

/// Validated, read-only node parameters
/// Gantree: NodeParameters // 검증된 파라미터
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "NodeParametersSpec", into = "NodeParametersSpec")]
pub struct NodeParameters {
    qubits: Option<Vec<DeviceId>>,
    num_averages: u32,
    flux_point: FluxPoint,
    reset_type: ResetType,
    simulate: bool,
    timeout: Duration,
    simulation_duration: u64,
}

impl NodeParameters {
    /// Validate a raw spec
    /// Gantree: new(spec) -> QcalResult<Self> // 검증
    pub fn new(spec: NodeParametersSpec) -> QcalResult<Self> {
        if spec.num_averages <= 0 {
            return Err(QcalError::config(format!(
                "num_averages must be positive, got {}",
                spec.num_averages
            )));
        }
        if spec.num_averages > u32::MAX as i64 {
            return Err(QcalError::config(format!(
                "num_averages {} exceeds {}",
                spec.num_averages,
                u32::MAX
            )));
        }
        if spec.timeout <= 0 {
            return Err(QcalError::config(format!(
                "timeout must be positive, got {}",
                spec.timeout
            )));
        }
        if spec.simulation_duration < timing::MIN_WAIT_CYCLES as i64 {
            return Err(QcalError::config(format!(
                "simulation_duration must be at least {} clock cycles, got {}",
                timing::MIN_WAIT_CYCLES,
                spec.simulation_duration
            )));
        }

        let qubits = match spec.qubits {
            None => None,
            Some(selection) => {
                let names = selection.names();
                let mut seen = std::collections::HashSet::new();
                for name in &names {
                    if !seen.insert(name.as_str()) {
                        return Err(QcalError::config(format!(
                            "qubit '{}' listed more than once",
                            name
                        )));
                    }
                }
                if names.is_empty() {
                    None
                } else {
                    Some(names)
                }
            }
        };

        Ok(Self {
            qubits,
            num_averages: spec.num_averages as u32,
            flux_point: spec.flux_point,
            reset_type: spec.reset_type,
            simulate: spec.simulate,
            timeout: Duration::from_secs(spec.timeout as u64),
            simulation_duration: spec.simulation_duration as u64,
        })
    }

    /// Defaults, already valid
    pub fn defaults() -> Self {
        Self {
            qubits: None,
            num_averages: defaults::NUM_AVERAGES,
            flux_point: FluxPoint::default(),
            reset_type: ResetType::default(),
            simulate: false,
            timeout: Duration::from_secs(defaults::TIMEOUT_S),
            simulation_duration: timing::DEFAULT_SIMULATION_CYCLES,
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Requested qubits, or `None` for the active set
    pub fn qubits(&self) -> Option<&[DeviceId]> {
        self.qubits.as_deref()
    }

    /// Number of averages
    pub fn num_averages(&self) -> u32 {
        self.num_averages
    }

    /// Flux bias mode
    pub fn flux_point(&self) -> FluxPoint {
        self.flux_point
    }

    /// Reset strategy
    pub fn reset_type(&self) -> ResetType {
        self.reset_type
    }

    /// Whether the node replays against the simulator
    pub fn simulate(&self) -> bool {
        self.simulate
    }

    /// Session establishment timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Simulation duration in clock cycles
    pub fn simulation_duration(&self) -> u64 {
        self.simulation_duration
    }
}

impl Default for NodeParameters {
    fn default() -> Self {
        Self::defaults()
    }
}

impl TryFrom<NodeParametersSpec> for NodeParameters {
    type Error = QcalError;

    fn try_from(spec: NodeParametersSpec) -> QcalResult<Self> {
        NodeParameters::new(spec)
    }
}

impl From<NodeParameters> for NodeParametersSpec {
    fn from(params: NodeParameters) -> Self {
        Self {
            qubits: params.qubits.map(QubitSelection::List),
            num_averages: params.num_averages as i64,
            flux_point: params.flux_point,
            reset_type: params.reset_type,
            simulate: params.simulate,
            timeout: params.timeout.as_secs() as i64,
            simulation_duration: params.simulation_duration as i64,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
