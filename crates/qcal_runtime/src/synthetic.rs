//! In-process synthetic control runtime
//!
//! Gantree: L2_Runtime → SyntheticRuntime
//!
//! Replays a [`SequenceProgram`] against a response model instead of
//! hardware. Each sweep point of each device block is evaluated once by the
//! model, optionally perturbed by seeded Gaussian noise. Offline simulation
//! lays out piecewise-constant amplitude traces per element from the program
//! steps and the operation attributes in the hardware configuration.
//!
//! Every machine-level side effect (open, DC offsets, close) is recorded in a
//! shared [`MachineLog`] so callers can observe teardown.

use crate::program::{DeviceBlock, PulseStep, ResetStrategy, SequenceProgram, ITERATION_STREAM};
use crate::runtime::{
    not_finished, ControlRuntime, Machine, PartialRecord, ResultHandles, RunningJob,
    SimulatedSamples, SimulationConfig,
};
use log::{debug, info};
use qcal_core::{timing, ConnectionFailure, Quantity, QcalError, QcalResult};
use qcal_state::HardwareConfig;
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Default operation length when the configuration has none, ns
pub const DEFAULT_OPERATION_LENGTH_NS: f64 = 40.0;

/// Default number of polls a job stays processing
pub const DEFAULT_POLLS_PER_JOB: u32 = 4;

// ============================================================================
// Response Models
// ============================================================================

/// One sweep point as seen by a response model
#[derive(Debug, Clone)]
pub struct PointContext<'a> {
    /// Device name
    pub device: &'a str,
    /// Block index of the device
    pub device_index: usize,
    /// Quantity being produced
    pub quantity: Quantity,
    /// `(axis, coordinate)` pairs, outermost first
    pub coords: &'a [(&'a str, f64)],
    /// Index of the active sequence variant
    pub variant: usize,
    /// Shot index (always 0 for averaged programs)
    pub shot: usize,
}

impl PointContext<'_> {
    /// Coordinate of an axis
    pub fn coord(&self, axis: &str) -> Option<f64> {
        self.coords
            .iter()
            .find(|(name, _)| *name == axis)
            .map(|(_, v)| *v)
    }
}

/// Model of the device response at one sweep point
/// Gantree: ResponseModel // 응답 모델
pub trait ResponseModel: Send + Sync {
    /// Value of the requested quantity
    fn respond(&self, point: &PointContext<'_>, rng: &mut dyn RngCore) -> f64;
}

impl<F> ResponseModel for F
where
    F: Fn(&PointContext<'_>, &mut dyn RngCore) -> f64 + Send + Sync,
{
    fn respond(&self, point: &PointContext<'_>, rng: &mut dyn RngCore) -> f64 {
        self(point, rng)
    }
}

/// Same value everywhere
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstantResponse(pub f64);

impl ResponseModel for ConstantResponse {
    fn respond(&self, _point: &PointContext<'_>, _rng: &mut dyn RngCore) -> f64 {
        self.0
    }
}

/// Standard normal sample (Box-Muller)
pub fn gaussian(rng: &mut dyn RngCore) -> f64 {
    let u1: f64 = 1.0 - rng.gen::<f64>();
    let u2: f64 = rng.gen::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

// ============================================================================
// Machine Log
// ============================================================================

/// Side effects recorded by synthetic machines
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MachineLog {
    /// Machines opened
    pub opened: usize,
    /// Machines closed
    pub closed: usize,
    /// Current DC offset per element
    pub dc_offsets: BTreeMap<String, f64>,
    /// Every offset write, in order
    pub offset_history: Vec<(String, f64)>,
    /// Programs executed
    pub executed: Vec<String>,
    /// Programs simulated
    pub simulated: Vec<String>,
}

impl MachineLog {
    /// Current offset of an element (0.0 if never set)
    pub fn offset(&self, element: &str) -> f64 {
        self.dc_offsets.get(element).copied().unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, Default)]
struct SharedLog(Arc<Mutex<MachineLog>>);

impl SharedLog {
    fn lock(&self) -> MutexGuard<'_, MachineLog> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_offset(&self, element: &str, offset: f64) {
        let mut log = self.lock();
        log.dc_offsets.insert(element.to_string(), offset);
        log.offset_history.push((element.to_string(), offset));
    }
}

// ============================================================================
// Synthetic Runtime
// ============================================================================

/// Synthetic control runtime
/// Gantree: SyntheticRuntime // 합성 런타임
pub struct SyntheticRuntime {
    name: String,
    seed: u64,
    noise_std: f64,
    connect_latency: Duration,
    required_token: Option<String>,
    unavailable: bool,
    polls_per_job: u32,
    model: Arc<dyn ResponseModel>,
    log: SharedLog,
}

impl SyntheticRuntime {
    /// Runtime answering 0.0 everywhere, no noise, instant connection
    pub fn new() -> Self {
        Self {
            name: "synthetic".to_string(),
            seed: 0,
            noise_std: 0.0,
            connect_latency: Duration::ZERO,
            required_token: None,
            unavailable: false,
            polls_per_job: DEFAULT_POLLS_PER_JOB,
            model: Arc::new(ConstantResponse(0.0)),
            log: SharedLog::default(),
        }
    }

    /// Set the noise seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Additive Gaussian noise per shot (reduced by averaging)
    pub fn with_noise(mut self, std: f64) -> Self {
        self.noise_std = std;
        self
    }

    /// Simulated session-establishment latency
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.connect_latency = latency;
        self
    }

    /// Reject sessions whose network token differs
    pub fn with_required_token(mut self, token: &str) -> Self {
        self.required_token = Some(token.to_string());
        self
    }

    /// Refuse every session
    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    /// Number of polls a job reports processing
    pub fn with_polls(mut self, polls: u32) -> Self {
        self.polls_per_job = polls;
        self
    }

    /// Response model
    pub fn with_model(mut self, model: impl ResponseModel + 'static) -> Self {
        self.model = Arc::new(model);
        self
    }

    /// Snapshot of the recorded side effects
    pub fn log(&self) -> MachineLog {
        self.log.lock().clone()
    }
}

impl Default for SyntheticRuntime {
    fn default() -> Self {
        Self::new()
    }
}

impl ControlRuntime for SyntheticRuntime {
    fn name(&self) -> &str {
        &self.name
    }

    fn open_machine(&self, config: &HardwareConfig, timeout: Duration) -> QcalResult<Box<dyn Machine>> {
        let network = &config.network;
        if self.unavailable || network.host.is_empty() {
            return Err(QcalError::Connection {
                kind: ConnectionFailure::Unavailable,
                detail: format!("no runtime at '{}'", network.host),
            });
        }
        if self.connect_latency > timeout {
            return Err(QcalError::Connection {
                kind: ConnectionFailure::Timeout,
                detail: format!("{} did not answer within {:?}", network.host, timeout),
            });
        }
        if let Some(required) = &self.required_token {
            if network.token.as_deref() != Some(required.as_str()) {
                return Err(QcalError::Connection {
                    kind: ConnectionFailure::Authentication,
                    detail: format!("token rejected by {}", network.host),
                });
            }
        }

        self.log.lock().opened += 1;
        info!(
            "Opened synthetic machine on {} ({}), {} element(s)",
            network.host,
            network.cluster_name,
            config.elements.len()
        );

        Ok(Box::new(SyntheticMachine {
            config: config.clone(),
            rng: ChaCha8Rng::seed_from_u64(self.seed),
            noise_std: self.noise_std,
            polls_per_job: self.polls_per_job,
            model: Arc::clone(&self.model),
            log: self.log.clone(),
            jobs: 0,
            closed: false,
        }))
    }

    fn simulate(
        &self,
        config: &HardwareConfig,
        program: &SequenceProgram,
        simulation: SimulationConfig,
    ) -> QcalResult<SimulatedSamples> {
        program.validate()?;
        let samples = TraceBuilder::new(config, simulation.duration_cycles).run(program)?;
        self.log.lock().simulated.push(program.name.clone());
        info!("Simulated {}: {}", program.name, samples);
        Ok(samples)
    }
}

// ============================================================================
// Machine & Job
// ============================================================================

struct SyntheticMachine {
    config: HardwareConfig,
    rng: ChaCha8Rng,
    noise_std: f64,
    polls_per_job: u32,
    model: Arc<dyn ResponseModel>,
    log: SharedLog,
    jobs: usize,
    closed: bool,
}

impl SyntheticMachine {
    fn ensure_open(&self) -> QcalResult<()> {
        if self.closed {
            return Err(QcalError::Runtime("machine already closed".to_string()));
        }
        Ok(())
    }

    fn block_buffers(
        &mut self,
        program: &SequenceProgram,
        index: usize,
        block: &DeviceBlock,
        handles: &mut ResultHandles,
    ) {
        let points = program.points_per_stream();
        let variant_pos = program
            .variant_axis
            .as_ref()
            .and_then(|name| program.axes.iter().position(|a| &a.name == name));
        let noise = if program.averaged {
            self.noise_std / f64::from(program.num_averages).sqrt()
        } else {
            self.noise_std
        };

        let shots = if program.averaged {
            1
        } else {
            program.num_averages as usize
        };

        for quantity in &program.quantities {
            let mut buffer = Vec::with_capacity(points * shots);
            for shot in 0..shots {
                for flat in 0..points {
                    let indices = unravel(flat, program);
                    let coords: Vec<(&str, f64)> = program
                        .axes
                        .iter()
                        .zip(&indices)
                        .map(|(axis, &i)| (axis.name.as_str(), axis.values[i]))
                        .collect();
                    let point = PointContext {
                        device: &block.device,
                        device_index: index,
                        quantity: *quantity,
                        coords: &coords,
                        variant: variant_pos.map(|p| indices[p]).unwrap_or(0),
                        shot,
                    };
                    let mut value = self.model.respond(&point, &mut self.rng);
                    if noise > 0.0 {
                        value += noise * gaussian(&mut self.rng);
                    }
                    buffer.push(value);
                }
            }
            let stream = quantity.stream_name(index);
            debug!("Stream {}: {} point(s)", stream, buffer.len());
            handles.insert(stream, buffer);
        }
    }
}

impl Machine for SyntheticMachine {
    fn execute(&mut self, program: &SequenceProgram) -> QcalResult<Box<dyn RunningJob>> {
        self.ensure_open()?;
        program.validate()?;

        let mut handles = ResultHandles::default();
        handles.insert(ITERATION_STREAM, vec![f64::from(program.num_averages)]);
        for (index, block) in program.blocks.iter().enumerate() {
            for (element, offset) in &block.flux {
                self.set_dc_offset(element, *offset)?;
            }
            self.block_buffers(program, index, block, &mut handles);
        }

        self.jobs += 1;
        self.log.lock().executed.push(program.name.clone());
        let id = format!("{}-{}", program.name, self.jobs);
        info!("Submitted job {}", id);

        Ok(Box::new(SyntheticJob {
            id,
            handles,
            num_averages: program.num_averages,
            total_polls: self.polls_per_job,
            remaining: self.polls_per_job,
        }))
    }

    fn set_dc_offset(&mut self, element: &str, offset: f64) -> QcalResult<()> {
        self.ensure_open()?;
        if self.config.element_config(element).is_none() {
            return Err(QcalError::Runtime(format!("unknown element '{}'", element)));
        }
        debug!("DC offset {} = {}", element, offset);
        self.log.set_offset(element, offset);
        Ok(())
    }

    fn close(&mut self) -> QcalResult<()> {
        if !self.closed {
            self.closed = true;
            self.log.lock().closed += 1;
            info!("Closed synthetic machine");
        }
        Ok(())
    }
}

struct SyntheticJob {
    id: String,
    handles: ResultHandles,
    num_averages: u32,
    total_polls: u32,
    remaining: u32,
}

impl RunningJob for SyntheticJob {
    fn id(&self) -> &str {
        &self.id
    }

    fn is_processing(&mut self) -> bool {
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        true
    }

    fn fetch_partial(&mut self, fields: &[String]) -> QcalResult<PartialRecord> {
        let done = if self.total_polls == 0 {
            1.0
        } else {
            f64::from(self.total_polls - self.remaining) / f64::from(self.total_polls)
        };
        let mut record = PartialRecord::default();
        for field in fields {
            let value = if field == ITERATION_STREAM {
                (f64::from(self.num_averages) * done).floor()
            } else {
                let buffer = self
                    .handles
                    .get(field)
                    .ok_or_else(|| QcalError::MissingStream(field.clone()))?;
                mean(buffer)
            };
            record.values.insert(field.clone(), value);
        }
        Ok(record)
    }

    fn result_handles(&self) -> QcalResult<ResultHandles> {
        if self.remaining > 0 {
            return Err(not_finished(&self.id));
        }
        Ok(self.handles.clone())
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Row-major multi-index of a flat point index (last axis fastest)
fn unravel(mut flat: usize, program: &SequenceProgram) -> Vec<usize> {
    let mut indices = vec![0; program.axes.len()];
    for (k, axis) in program.axes.iter().enumerate().rev() {
        indices[k] = flat % axis.len();
        flat /= axis.len();
    }
    indices
}

// ============================================================================
// Offline Trace Layout
// ============================================================================

struct TraceBuilder<'a> {
    config: &'a HardwareConfig,
    total: usize,
    traces: BTreeMap<String, Vec<f64>>,
    cursors: BTreeMap<String, usize>,
}

impl<'a> TraceBuilder<'a> {
    fn new(config: &'a HardwareConfig, duration_cycles: u64) -> Self {
        let total = (duration_cycles * timing::CLOCK_CYCLE_NS) as usize;
        let traces = config
            .elements
            .keys()
            .map(|name| (name.clone(), vec![0.0; total]))
            .collect();
        let cursors = config.elements.keys().map(|name| (name.clone(), 0)).collect();
        Self {
            config,
            total,
            traces,
            cursors,
        }
    }

    fn run(mut self, program: &SequenceProgram) -> QcalResult<SimulatedSamples> {
        let variant_pos = program
            .variant_axis
            .as_ref()
            .and_then(|name| program.axes.iter().position(|a| &a.name == name));

        'points: for flat in 0..program.points_per_stream() {
            let indices = unravel(flat, program);
            let coords: Vec<(&str, f64)> = program
                .axes
                .iter()
                .zip(&indices)
                .map(|(axis, &i)| (axis.name.as_str(), axis.values[i]))
                .collect();
            let variant = variant_pos.map(|p| indices[p]).unwrap_or(0);

            for block in &program.blocks {
                if self.filled() {
                    break 'points;
                }
                self.block(block, variant, &coords)?;
                self.align_all();
            }
        }

        Ok(SimulatedSamples {
            program: program.name.clone(),
            duration_cycles: (self.total as u64) / timing::CLOCK_CYCLE_NS,
            sample_period_ns: 1.0,
            traces: self.traces,
        })
    }

    fn block(&mut self, block: &DeviceBlock, variant: usize, coords: &[(&str, f64)]) -> QcalResult<()> {
        let elements = self.block_elements(&block.device);

        for (element, offset) in &block.flux {
            let start = self.cursor(element)?;
            if let Some(trace) = self.traces.get_mut(element) {
                for sample in trace.iter_mut().skip(start) {
                    *sample = *offset;
                }
            }
        }

        match &block.reset {
            ResetStrategy::Thermal { wait_ns } => {
                let wait = wait_ns.max(0.0) as usize;
                for element in &elements {
                    self.advance(element, wait);
                }
            }
            ResetStrategy::Active { pi_operation, .. } => {
                let resonator = format!("{}.resonator", block.device);
                let xy = format!("{}.xy", block.device);
                self.emit(&resonator, "readout", 1.0, None)?;
                self.align(&elements);
                self.emit(&xy, pi_operation, 1.0, None)?;
            }
        }
        self.align(&elements);

        let steps = block.variants.get(variant).map(Vec::as_slice).unwrap_or(&[]);
        for step in steps {
            match step {
                PulseStep::Play {
                    element,
                    operation,
                    scale,
                    duration,
                } => {
                    let length = duration
                        .as_ref()
                        .map(|d| d.eval(coords) * timing::CLOCK_CYCLE_NS as f64);
                    self.emit(element, operation, scale.main.eval(coords), length)?;
                }
                PulseStep::Wait { element, cycles } => {
                    let samples = cycles.eval(coords).max(0.0) * timing::CLOCK_CYCLE_NS as f64;
                    self.advance(element, samples as usize);
                }
                PulseStep::Align => self.align(&elements),
                PulseStep::Measure { element, operation } => {
                    self.emit(element, operation, 1.0, None)?;
                }
            }
        }
        Ok(())
    }

    fn block_elements(&self, device: &str) -> Vec<String> {
        self.config
            .elements
            .iter()
            .filter(|(_, e)| e.qubit == device)
            .map(|(name, _)| name.clone())
            .collect()
    }

    fn cursor(&self, element: &str) -> QcalResult<usize> {
        self.cursors
            .get(element)
            .copied()
            .ok_or_else(|| QcalError::Runtime(format!("unknown element '{}'", element)))
    }

    fn operation(&self, element: &str, operation: &str) -> QcalResult<&Map<String, Value>> {
        self.config
            .element_config(element)
            .and_then(|e| e.operations.get(operation))
            .ok_or_else(|| {
                QcalError::Runtime(format!("element '{}' has no operation '{}'", element, operation))
            })
    }

    fn emit(&mut self, element: &str, operation: &str, scale: f64, length_ns: Option<f64>) -> QcalResult<()> {
        let op = self.operation(element, operation)?;
        let amplitude = op.get("amplitude").and_then(Value::as_f64).unwrap_or(0.0) * scale;
        let length = length_ns
            .or_else(|| op.get("length").and_then(Value::as_f64))
            .unwrap_or(DEFAULT_OPERATION_LENGTH_NS)
            .max(0.0) as usize;

        let start = self.cursor(element)?;
        let end = (start + length).min(self.total);
        if let Some(trace) = self.traces.get_mut(element) {
            for sample in &mut trace[start.min(end)..end] {
                *sample = amplitude;
            }
        }
        self.advance(element, length);
        Ok(())
    }

    fn advance(&mut self, element: &str, samples: usize) {
        if let Some(cursor) = self.cursors.get_mut(element) {
            *cursor += samples;
        }
    }

    fn align(&mut self, elements: &[String]) {
        let latest = elements
            .iter()
            .filter_map(|e| self.cursors.get(e))
            .copied()
            .max()
            .unwrap_or(0);
        for element in elements {
            if let Some(cursor) = self.cursors.get_mut(element) {
                *cursor = latest;
            }
        }
    }

    fn align_all(&mut self) {
        let all: Vec<String> = self.cursors.keys().cloned().collect();
        self.align(&all);
    }

    fn filled(&self) -> bool {
        !self.cursors.is_empty() && self.cursors.values().all(|c| *c >= self.total)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::{AmplitudeScale, Scalar, SweepAxis};
    use approx::assert_relative_eq;
    use qcal_state::DeviceState;
    use serde_json::json;

    fn config() -> HardwareConfig {
        let state = DeviceState::from_value(json!({
            "qubits": {
                "q1": {
                    "xy": {"operations": {"x180": {"amplitude": 0.2, "length": 40}}},
                    "z": {"independent_offset": 0.1},
                    "resonator": {"operations": {"readout": {"amplitude": 0.05, "length": 100}}}
                }
            },
            "network": {"host": "lab", "cluster_name": "c1", "token": "secret"}
        }))
        .unwrap();
        HardwareConfig::generate(&state).unwrap()
    }

    fn program() -> SequenceProgram {
        SequenceProgram {
            name: "smoke".into(),
            num_averages: 100,
            axes: vec![SweepAxis::new("amp", vec![0.5, 1.0, 1.5])],
            variant_axis: None,
            blocks: vec![DeviceBlock {
                device: "q1".into(),
                flux: vec![("q1.z".into(), 0.1)],
                reset: ResetStrategy::Thermal { wait_ns: 20.0 },
                variants: vec![vec![
                    PulseStep::play_scaled(
                        "q1.xy",
                        "x180",
                        AmplitudeScale {
                            main: Scalar::axis("amp"),
                            drag: Scalar::Const(1.0),
                        },
                    ),
                    PulseStep::Align,
                    PulseStep::Measure {
                        element: "q1.resonator".into(),
                        operation: "readout".into(),
                    },
                ]],
            }],
            quantities: vec![Quantity::State],
            averaged: true,
        }
    }

    #[test]
    fn test_connection_failures() {
        let cfg = config();
        let slow = SyntheticRuntime::new().with_latency(Duration::from_secs(5));
        match slow.open_machine(&cfg, Duration::from_secs(1)) {
            Err(QcalError::Connection { kind, .. }) => assert_eq!(kind, ConnectionFailure::Timeout),
            _ => panic!("expected timeout"),
        }

        let guarded = SyntheticRuntime::new().with_required_token("other");
        match guarded.open_machine(&cfg, Duration::from_secs(1)) {
            Err(QcalError::Connection { kind, .. }) => {
                assert_eq!(kind, ConnectionFailure::Authentication)
            }
            _ => panic!("expected authentication failure"),
        }
        assert_eq!(guarded.log().opened, 0);

        let ok = SyntheticRuntime::new().with_required_token("secret");
        assert!(ok.open_machine(&cfg, Duration::from_secs(1)).is_ok());
        assert_eq!(ok.log().opened, 1);
    }

    #[test]
    fn test_execute_with_model() {
        let runtime = SyntheticRuntime::new()
            .with_polls(2)
            .with_model(|p: &PointContext<'_>, _: &mut dyn RngCore| p.coord("amp").unwrap_or(0.0) * 0.5);
        let mut machine = runtime.open_machine(&config(), Duration::from_secs(1)).unwrap();
        let mut job = machine.execute(&program()).unwrap();

        assert!(job.result_handles().is_err());
        assert!(job.is_processing());
        let partial = job.fetch_partial(&["n".to_string()]).unwrap();
        assert_eq!(partial.get("n"), Some(50.0));
        assert!(job.is_processing());
        assert!(!job.is_processing());

        let handles = job.result_handles().unwrap();
        assert_eq!(handles.get("state1"), Some(&[0.25, 0.5, 0.75][..]));
        assert_eq!(handles.get("n"), Some(&[100.0][..]));
        assert_relative_eq!(runtime.log().offset("q1.z"), 0.1);
    }

    #[test]
    fn test_seeded_noise_is_reproducible() {
        let run = |seed| {
            let runtime = SyntheticRuntime::new().with_seed(seed).with_noise(1.0).with_polls(0);
            let mut machine = runtime.open_machine(&config(), Duration::from_secs(1)).unwrap();
            let job = machine.execute(&program()).unwrap();
            job.result_handles().unwrap()
        };
        assert_eq!(run(7), run(7));
        assert_ne!(run(7), run(8));
    }

    #[test]
    fn test_closed_machine_rejects_calls() {
        let runtime = SyntheticRuntime::new();
        let mut machine = runtime.open_machine(&config(), Duration::from_secs(1)).unwrap();
        assert!(machine.set_dc_offset("q9.z", 0.1).is_err());
        machine.close().unwrap();
        machine.close().unwrap();
        assert!(machine.set_dc_offset("q1.z", 0.0).is_err());
        assert_eq!(runtime.log().closed, 1);
    }

    #[test]
    fn test_simulate_lays_out_traces() {
        let runtime = SyntheticRuntime::new();
        let samples = runtime
            .simulate(&config(), &program(), SimulationConfig { duration_cycles: 100 })
            .unwrap();
        assert_eq!(samples.duration_cycles, 100);

        let xy = samples.trace("q1.xy").unwrap();
        assert_eq!(xy.len(), 400);
        // Thermal wait of 20 ns, then x180 at amp 0.5
        assert_eq!(xy[19], 0.0);
        assert_relative_eq!(xy[20], 0.1);
        assert_relative_eq!(xy[59], 0.1);

        let z = samples.trace("q1.z").unwrap();
        assert_relative_eq!(z[0], 0.1);
        assert_eq!(runtime.log().simulated, vec!["smoke".to_string()]);
        assert_eq!(runtime.log().executed.len(), 0);
    }
}
