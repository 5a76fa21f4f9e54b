//! Experiment parameters
//!
//! Gantree: L5_Node → Params
//!
//! Each experiment has a raw `*Spec` (serde, every field defaulted) and a
//! validated, read-only counterpart built through `TryFrom`. Parameter
//! layers are merged as JSON before validation: experiment defaults, then the
//! parameter file, then command-line overrides.

use qcal_core::{
    timing, FluxPoint, NodeParameters, NodeParametersSpec, QcalError, QcalResult, ResetType,
    SweepRange,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

// ============================================================================
// Layered Loading
// ============================================================================

/// Merge `layer` into `base`; keys absent from `base` are rejected
fn merge_layer(base: &mut Map<String, Value>, layer: &Value, origin: &str) -> QcalResult<()> {
    let Some(entries) = layer.as_object() else {
        if layer.is_null() {
            return Ok(());
        }
        return Err(QcalError::config(format!("{} must be a JSON object", origin)));
    };
    for (key, value) in entries {
        match base.get_mut(key) {
            Some(slot) => *slot = value.clone(),
            None => {
                return Err(QcalError::config(format!(
                    "unknown parameter '{}' in {}",
                    key, origin
                )))
            }
        }
    }
    Ok(())
}

/// Build a raw spec from defaults, an optional parameter file and overrides
/// Gantree: load_spec(file,overrides) -> QcalResult<T> // 파라미터 병합
pub fn load_spec<T>(file: Option<&Path>, overrides: &Value) -> QcalResult<T>
where
    T: Default + Serialize + DeserializeOwned,
{
    let Value::Object(mut merged) = serde_json::to_value(T::default())? else {
        return Err(QcalError::Internal("parameter defaults are not an object".into()));
    };

    if let Some(path) = file {
        let content = fs::read_to_string(path)
            .map_err(|e| QcalError::File(format!("{}: {}", path.display(), e)))?;
        let layer: Value = serde_json::from_str(&content)
            .map_err(|e| QcalError::config(format!("{}: {}", path.display(), e)))?;
        merge_layer(&mut merged, &layer, &path.display().to_string())?;
    }
    merge_layer(&mut merged, overrides, "overrides")?;

    serde_json::from_value(Value::Object(merged)).map_err(|e| QcalError::config(e.to_string()))
}

/// Load and validate in one step
pub fn load_parameters<S, P>(file: Option<&Path>, overrides: &Value) -> QcalResult<P>
where
    S: Default + Serialize + DeserializeOwned,
    P: TryFrom<S, Error = QcalError>,
{
    P::try_from(load_spec::<S>(file, overrides)?)
}

fn positive_u32(name: &str, value: i64) -> QcalResult<u32> {
    if value <= 0 || value > u32::MAX as i64 {
        return Err(QcalError::config(format!(
            "{} must be a positive count, got {}",
            name, value
        )));
    }
    Ok(value as u32)
}

// ============================================================================
// DRAG 180/90
// ============================================================================

/// Raw DRAG calibration parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DragParametersSpec {
    /// Shared node parameters
    #[serde(flatten)]
    pub common: NodeParametersSpec,
    /// Drive operation whose DRAG coefficient is calibrated
    pub operation: String,
    /// Lowest amplitude factor
    pub min_amp_factor: f64,
    /// Highest amplitude factor (exclusive)
    pub max_amp_factor: f64,
    /// Amplitude factor step
    pub amp_factor_step: f64,
    /// Repetitions of each pulse pair per sweep point
    pub max_number_pulses_per_sweep: i64,
}

impl Default for DragParametersSpec {
    fn default() -> Self {
        Self {
            common: NodeParametersSpec::default(),
            operation: "x180".to_string(),
            min_amp_factor: 0.0001,
            max_amp_factor: 2.0,
            amp_factor_step: 0.05,
            max_number_pulses_per_sweep: 1,
        }
    }
}

/// Validated DRAG calibration parameters
/// Gantree: DragParameters // DRAG 파라미터
#[derive(Debug, Clone, PartialEq)]
pub struct DragParameters {
    common: NodeParameters,
    operation: String,
    amps: SweepRange,
    pulses_per_sweep: u32,
}

impl DragParameters {
    /// Shared node parameters
    pub fn common(&self) -> &NodeParameters {
        &self.common
    }

    /// Calibrated operation
    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Amplitude-factor sweep
    pub fn amps(&self) -> &SweepRange {
        &self.amps
    }

    /// Pulse-pair repetitions per point
    pub fn pulses_per_sweep(&self) -> u32 {
        self.pulses_per_sweep
    }
}

impl TryFrom<DragParametersSpec> for DragParameters {
    type Error = QcalError;

    fn try_from(spec: DragParametersSpec) -> QcalResult<Self> {
        let operation = spec.operation.trim().to_string();
        if operation.is_empty() {
            return Err(QcalError::config("operation must not be empty"));
        }
        Ok(Self {
            common: NodeParameters::new(spec.common)?,
            operation,
            amps: SweepRange::new(spec.min_amp_factor, spec.max_amp_factor, spec.amp_factor_step)?,
            pulses_per_sweep: positive_u32(
                "max_number_pulses_per_sweep",
                spec.max_number_pulses_per_sweep,
            )?,
        })
    }
}

// ============================================================================
// T2 Echo
// ============================================================================

/// Raw T2 echo parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct T2EchoParametersSpec {
    /// Shared node parameters
    #[serde(flatten)]
    pub common: NodeParametersSpec,
    /// Shortest half-echo idle, ns
    pub min_wait_time_in_ns: i64,
    /// Longest half-echo idle (exclusive), ns
    pub max_wait_time_in_ns: i64,
    /// Idle step, ns
    pub wait_time_step_in_ns: i64,
    /// Stream discriminated states instead of raw I/Q
    pub use_state_discrimination: bool,
}

impl Default for T2EchoParametersSpec {
    fn default() -> Self {
        Self {
            common: NodeParametersSpec {
                num_averages: 100,
                flux_point: FluxPoint::Arbitrary,
                ..NodeParametersSpec::default()
            },
            min_wait_time_in_ns: 16,
            max_wait_time_in_ns: 50_000,
            wait_time_step_in_ns: 300,
            use_state_discrimination: true,
        }
    }
}

/// Validated T2 echo parameters
/// Gantree: T2EchoParameters // T2 에코 파라미터
#[derive(Debug, Clone, PartialEq)]
pub struct T2EchoParameters {
    common: NodeParameters,
    idle_cycles: SweepRange,
    use_state_discrimination: bool,
}

impl T2EchoParameters {
    /// Shared node parameters
    pub fn common(&self) -> &NodeParameters {
        &self.common
    }

    /// Half-echo idle sweep in clock cycles
    pub fn idle_cycles(&self) -> &SweepRange {
        &self.idle_cycles
    }

    /// Whether states are discriminated in real time
    pub fn use_state_discrimination(&self) -> bool {
        self.use_state_discrimination
    }
}

impl TryFrom<T2EchoParametersSpec> for T2EchoParameters {
    type Error = QcalError;

    fn try_from(spec: T2EchoParametersSpec) -> QcalResult<Self> {
        if spec.min_wait_time_in_ns < 0 || spec.wait_time_step_in_ns <= 0 {
            return Err(QcalError::config(format!(
                "wait times must be positive (min={}, step={})",
                spec.min_wait_time_in_ns, spec.wait_time_step_in_ns
            )));
        }
        let to_cycles = |ns: i64| timing::ns_to_cycles(ns.max(0) as u64) as f64;
        let min = to_cycles(spec.min_wait_time_in_ns);
        if min < timing::MIN_WAIT_CYCLES as f64 {
            return Err(QcalError::config(format!(
                "min_wait_time_in_ns must be at least {} ns",
                timing::MIN_WAIT_CYCLES * timing::CLOCK_CYCLE_NS
            )));
        }
        let idle_cycles = SweepRange::new(
            min,
            to_cycles(spec.max_wait_time_in_ns),
            to_cycles(spec.wait_time_step_in_ns),
        )?;
        Ok(Self {
            common: NodeParameters::new(spec.common)?,
            idle_cycles,
            use_state_discrimination: spec.use_state_discrimination,
        })
    }
}

// ============================================================================
// IQ Blobs
// ============================================================================

/// Raw IQ-blob parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IqBlobsParametersSpec {
    /// Shared node parameters
    #[serde(flatten)]
    pub common: NodeParametersSpec,
    /// Single shots per prepared state
    pub num_runs: i64,
}

impl Default for IqBlobsParametersSpec {
    fn default() -> Self {
        Self {
            common: NodeParametersSpec {
                reset_type: ResetType::Active,
                ..NodeParametersSpec::default()
            },
            num_runs: 10_000,
        }
    }
}

/// Validated IQ-blob parameters
/// Gantree: IqBlobsParameters // IQ 블롭 파라미터
#[derive(Debug, Clone, PartialEq)]
pub struct IqBlobsParameters {
    common: NodeParameters,
    num_runs: u32,
}

impl IqBlobsParameters {
    /// Shared node parameters
    pub fn common(&self) -> &NodeParameters {
        &self.common
    }

    /// Shots per prepared state
    pub fn num_runs(&self) -> u32 {
        self.num_runs
    }
}

impl TryFrom<IqBlobsParametersSpec> for IqBlobsParameters {
    type Error = QcalError;

    fn try_from(spec: IqBlobsParametersSpec) -> QcalResult<Self> {
        let num_runs = positive_u32("num_runs", spec.num_runs)?;
        if num_runs < 2 {
            return Err(QcalError::config("num_runs must be at least 2"));
        }
        Ok(Self {
            common: NodeParameters::new(spec.common)?,
            num_runs,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
