//! Control-runtime boundary
//!
//! Gantree: L2_Runtime → RuntimeTraits
//!
//! The interface every control runtime implements: open a machine from a
//! hardware configuration, execute a program as a job, stream partial
//! results, hand over the final buffers, or simulate the program offline.

use crate::program::SequenceProgram;
use qcal_core::{QcalError, QcalResult};
use qcal_state::HardwareConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Final buffers of a finished job, keyed by stream name
/// Gantree: ResultHandles // 결과 핸들
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultHandles {
    buffers: BTreeMap<String, Vec<f64>>,
}

impl ResultHandles {
    /// Create from buffers
    pub fn new(buffers: BTreeMap<String, Vec<f64>>) -> Self {
        Self { buffers }
    }

    /// Buffer of a stream
    pub fn get(&self, stream: &str) -> Option<&[f64]> {
        self.buffers.get(stream).map(Vec::as_slice)
    }

    /// Stream names
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.buffers.keys().map(String::as_str)
    }

    /// Number of streams
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    /// No streams at all
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Insert or replace a stream
    pub fn insert(&mut self, stream: impl Into<String>, values: Vec<f64>) {
        self.buffers.insert(stream.into(), values);
    }
}

/// Latest values of the fields requested during live polling
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialRecord {
    /// Field → latest scalar (iteration count, running average)
    pub values: BTreeMap<String, f64>,
}

impl PartialRecord {
    /// Value of a field
    pub fn get(&self, field: &str) -> Option<f64> {
        self.values.get(field).copied()
    }
}

/// Offline simulation settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Duration in clock cycles
    pub duration_cycles: u64,
}

/// Sample traces produced by offline simulation
/// Gantree: SimulatedSamples // 시뮬레이션 샘플
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulatedSamples {
    /// Program name
    pub program: String,
    /// Simulated duration in clock cycles
    pub duration_cycles: u64,
    /// Sample period in nanoseconds
    pub sample_period_ns: f64,
    /// Element → amplitude trace
    pub traces: BTreeMap<String, Vec<f64>>,
}

impl SimulatedSamples {
    /// Trace of an element
    pub fn trace(&self, element: &str) -> Option<&[f64]> {
        self.traces.get(element).map(Vec::as_slice)
    }

    /// Elements that carry any non-zero sample
    pub fn active_elements(&self) -> Vec<&str> {
        self.traces
            .iter()
            .filter(|(_, t)| t.iter().any(|v| *v != 0.0))
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

impl fmt::Display for SimulatedSamples {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SimulatedSamples(program={}, cycles={}, elements={})",
            self.program,
            self.duration_cycles,
            self.traces.len()
        )
    }
}

// ============================================================================
// Traits
// ============================================================================

/// A job submitted to the machine
/// Gantree: RunningJob // 실행 중 작업
pub trait RunningJob {
    /// Job identifier
    fn id(&self) -> &str;

    /// Is the job still producing data
    fn is_processing(&mut self) -> bool;

    /// Latest values of the requested fields
    fn fetch_partial(&mut self, fields: &[String]) -> QcalResult<PartialRecord>;

    /// Final buffers; fails while the job is still processing
    fn result_handles(&self) -> QcalResult<ResultHandles>;
}

/// An open machine on the control runtime
/// Gantree: Machine // 머신 핸들
pub trait Machine {
    /// Execute a program
    fn execute(&mut self, program: &SequenceProgram) -> QcalResult<Box<dyn RunningJob>>;

    /// Set the DC offset of an element
    fn set_dc_offset(&mut self, element: &str, offset: f64) -> QcalResult<()>;

    /// Release the machine
    fn close(&mut self) -> QcalResult<()>;
}

/// Control runtime: machine factory and offline simulator
/// Gantree: ControlRuntime // 제어 런타임
pub trait ControlRuntime {
    /// Runtime name
    fn name(&self) -> &str;

    /// Open a machine; fails with a connection error past `timeout`
    fn open_machine(&self, config: &HardwareConfig, timeout: Duration) -> QcalResult<Box<dyn Machine>>;

    /// Simulate a program without hardware
    fn simulate(
        &self,
        config: &HardwareConfig,
        program: &SequenceProgram,
        simulation: SimulationConfig,
    ) -> QcalResult<SimulatedSamples>;
}

/// Error for reading results of an unfinished job
pub(crate) fn not_finished(job_id: &str) -> QcalError {
    QcalError::Runtime(format!("job {} still processing", job_id))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_handles() {
        let mut handles = ResultHandles::default();
        assert!(handles.is_empty());
        handles.insert("state1", vec![0.1, 0.2]);
        handles.insert("n", vec![10.0]);
        assert_eq!(handles.len(), 2);
        assert_eq!(handles.get("state1"), Some(&[0.1, 0.2][..]));
        assert!(handles.get("state2").is_none());
        assert_eq!(handles.names().collect::<Vec<_>>(), vec!["n", "state1"]);
    }

    #[test]
    fn test_active_elements() {
        let mut traces = BTreeMap::new();
        traces.insert("q1.xy".to_string(), vec![0.0, 0.3, 0.0]);
        traces.insert("q1.z".to_string(), vec![0.0, 0.0, 0.0]);
        let samples = SimulatedSamples {
            program: "drag".into(),
            duration_cycles: 1,
            sample_period_ns: 1.0,
            traces,
        };
        assert_eq!(samples.active_elements(), vec!["q1.xy"]);
        assert!(samples.to_string().contains("elements=2"));
    }
}
