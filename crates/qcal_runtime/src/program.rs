//! Sequence programs
//!
//! Gantree: L2_Runtime → SequenceProgram
//!
//! Declarative description of what the control runtime should play: sweep
//! axes, per-device blocks (flux preparation, reset, sequence variants,
//! measured quantities) and the streams the job will produce. Compiling it
//! into real-time instructions is the runtime's business.

use qcal_core::{Quantity, QcalError, QcalResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Name of the averaging-counter stream
pub const ITERATION_STREAM: &str = "n";

/// One swept dimension
/// Gantree: SweepAxis // 스윕 축
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepAxis {
    /// Axis label (`amp`, `sequence`, `idle_time`)
    pub name: String,
    /// Coordinates in loop order
    pub values: Vec<f64>,
}

impl SweepAxis {
    /// Create an axis
    pub fn new(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    /// Axis with integer labels `0..n`
    pub fn indexed(name: impl Into<String>, n: usize) -> Self {
        Self::new(name, (0..n).map(|i| i as f64).collect())
    }

    /// Number of points
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Is the axis empty
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Constant or swept scalar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scalar {
    /// Fixed value
    Const(f64),
    /// Current coordinate of the named axis, times a factor
    Axis {
        /// Axis name
        axis: String,
        /// Multiplier
        factor: f64,
    },
}

impl Scalar {
    /// Swept value, unit factor
    pub fn axis(name: impl Into<String>) -> Self {
        Scalar::Axis {
            axis: name.into(),
            factor: 1.0,
        }
    }

    /// Evaluate at a sweep point given `(axis, value)` pairs
    pub fn eval(&self, point: &[(&str, f64)]) -> f64 {
        match self {
            Scalar::Const(v) => *v,
            Scalar::Axis { axis, factor } => point
                .iter()
                .find(|(name, _)| *name == axis.as_str())
                .map(|(_, v)| v * factor)
                .unwrap_or(0.0),
        }
    }
}

/// Amplitude matrix applied to a played operation
///
/// `main` scales the in-phase envelope, `drag` the derivative quadrature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmplitudeScale {
    /// In-phase scale
    pub main: Scalar,
    /// Derivative-quadrature scale
    pub drag: Scalar,
}

impl AmplitudeScale {
    /// No scaling
    pub fn unit() -> Self {
        Self {
            main: Scalar::Const(1.0),
            drag: Scalar::Const(1.0),
        }
    }
}

impl Default for AmplitudeScale {
    fn default() -> Self {
        Self::unit()
    }
}

/// One instruction of a sequence variant
/// Gantree: PulseStep // 펄스 단계
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum PulseStep {
    /// Play a named operation on an element
    Play {
        /// Element name
        element: String,
        /// Operation name
        operation: String,
        /// Amplitude matrix
        scale: AmplitudeScale,
        /// Override of the operation length, clock cycles
        duration: Option<Scalar>,
    },
    /// Idle an element
    Wait {
        /// Element name
        element: String,
        /// Clock cycles
        cycles: Scalar,
    },
    /// Synchronize every element of the block
    Align,
    /// Measure with the readout operation
    Measure {
        /// Resonator element
        element: String,
        /// Readout operation
        operation: String,
    },
}

impl PulseStep {
    /// Play an operation without scaling
    pub fn play(element: impl Into<String>, operation: impl Into<String>) -> Self {
        PulseStep::Play {
            element: element.into(),
            operation: operation.into(),
            scale: AmplitudeScale::unit(),
            duration: None,
        }
    }

    /// Play with an amplitude matrix
    pub fn play_scaled(
        element: impl Into<String>,
        operation: impl Into<String>,
        scale: AmplitudeScale,
    ) -> Self {
        PulseStep::Play {
            element: element.into(),
            operation: operation.into(),
            scale,
            duration: None,
        }
    }

    /// Idle for a number of clock cycles
    pub fn wait(element: impl Into<String>, cycles: Scalar) -> Self {
        PulseStep::Wait {
            element: element.into(),
            cycles,
        }
    }
}

/// How the qubit is reset between shots
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResetStrategy {
    /// Idle for the thermalization time
    Thermal {
        /// Wait in nanoseconds
        wait_ns: f64,
    },
    /// Measurement-conditioned pi pulses
    Active {
        /// Pi operation on the drive line
        pi_operation: String,
        /// State threshold on I
        threshold: f64,
        /// Give up after this many conditional pulses
        max_attempts: u32,
    },
}

/// Program section executed for one device
/// Gantree: DeviceBlock // 장치 블록
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceBlock {
    /// Device name
    pub device: String,
    /// DC offsets applied before the averaging loop, `(flux element, offset)`
    pub flux: Vec<(String, f64)>,
    /// Reset before each shot
    pub reset: ResetStrategy,
    /// Sequence variants; more than one requires a variant axis
    pub variants: Vec<Vec<PulseStep>>,
}

/// Declarative program handed to the runtime
/// Gantree: SequenceProgram // 시퀀스 프로그램
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceProgram {
    /// Program name
    pub name: String,
    /// Averaging loop count; every shot is streamed when not averaged
    pub num_averages: u32,
    /// Sweep axes, outermost first; the last axis varies fastest
    pub axes: Vec<SweepAxis>,
    /// Axis whose coordinate selects the sequence variant
    pub variant_axis: Option<String>,
    /// One block per device, measured sequentially
    pub blocks: Vec<DeviceBlock>,
    /// Quantities streamed per device
    pub quantities: Vec<Quantity>,
    /// Whether streams are averaged over the loop (else every shot is kept)
    pub averaged: bool,
}

impl SequenceProgram {
    /// Check structural consistency
    /// Gantree: validate() -> QcalResult<()> // 구조 검증
    pub fn validate(&self) -> QcalResult<()> {
        if self.num_averages == 0 {
            return Err(QcalError::config(format!(
                "program '{}' has zero averages",
                self.name
            )));
        }
        let mut names = HashSet::new();
        for axis in &self.axes {
            if axis.is_empty() {
                return Err(QcalError::config(format!("axis '{}' is empty", axis.name)));
            }
            if !names.insert(axis.name.as_str()) {
                return Err(QcalError::config(format!(
                    "axis '{}' declared twice",
                    axis.name
                )));
            }
        }
        if self.quantities.is_empty() {
            return Err(QcalError::config(format!(
                "program '{}' measures nothing",
                self.name
            )));
        }

        let variant_len = match &self.variant_axis {
            Some(name) => self
                .axis(name)
                .map(SweepAxis::len)
                .ok_or_else(|| QcalError::config(format!("variant axis '{}' not declared", name)))?,
            None => 1,
        };
        for block in &self.blocks {
            if block.variants.len() != variant_len {
                return Err(QcalError::config(format!(
                    "device {} defines {} variant(s), expected {}",
                    block.device,
                    block.variants.len(),
                    variant_len
                )));
            }
        }
        Ok(())
    }

    /// Axis by name
    pub fn axis(&self, name: &str) -> Option<&SweepAxis> {
        self.axes.iter().find(|a| a.name == name)
    }

    /// Sweep points per device (product of axis lengths)
    pub fn points_per_stream(&self) -> usize {
        self.axes.iter().map(SweepAxis::len).product()
    }

    /// Values per stream: one per point when averaged, else one per shot and point
    pub fn stream_len(&self) -> usize {
        if self.averaged {
            self.points_per_stream()
        } else {
            self.points_per_stream() * self.num_averages as usize
        }
    }

    /// Device names in block order
    pub fn devices(&self) -> Vec<&str> {
        self.blocks.iter().map(|b| b.device.as_str()).collect()
    }

    /// Every stream the job will produce, iteration counter first
    pub fn stream_names(&self) -> Vec<String> {
        let mut names = vec![ITERATION_STREAM.to_string()];
        for (i, _) in self.blocks.iter().enumerate() {
            for q in &self.quantities {
                names.push(q.stream_name(i));
            }
        }
        names
    }
}

// ============================================================================
// Tests
// ============================================================================
