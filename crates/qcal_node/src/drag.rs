//! DRAG coefficient calibration (180/90 pulse pairs)
//!
//! Gantree: L5_Node → DragCalibration
//!
//! Two pulse pairs, `x180·y90` and `y180·x90`, are played while the DRAG
//! quadrature is scaled by a swept factor. With the coefficient temporarily
//! set to `-1.0` the excited population of both pairs is linear in the factor
//! and the two lines cross at the factor that cancels the phase error. The
//! calibrated coefficient is the one actually played at the crossing, that is
//! the crossing times the override coefficient.

use crate::experiment::{measure, reset_strategy, Experiment, RunContext};
use crate::flux::flux_preparation;
use crate::params::{DragParameters, DragParametersSpec};
use crate::update::Proposal;
use log::info;
use qcal_core::{Quantity, QcalError, QcalResult};
use qcal_fit::{fit_linear, intersection, DeviceFit, FitError, FitResult};
use qcal_results::{AxisSpec, Dataset};
use qcal_runtime::{
    AmplitudeScale, DeviceBlock, PulseStep, Scalar, SequenceProgram, SweepAxis,
};
use qcal_state::Qubit;
use serde_json::{json, Value};

/// Temporary coefficient used while sweeping
pub const OVERRIDE_ALPHA: f64 = -1.0;

/// Sweep axis selecting the pulse pair
pub const SEQUENCE_AXIS: &str = "sequence";

/// Sweep axis of the DRAG amplitude factor
pub const AMP_AXIS: &str = "amp";

/// Pulse pairs, in variant order
pub const PULSE_PAIRS: [(&str, &str); 2] = [("x180", "y90"), ("y180", "x90")];

/// DRAG 180/90 calibration node
/// Gantree: DragCalibration // DRAG 보정
#[derive(Debug, Clone)]
pub struct DragCalibration {
    spec: DragParametersSpec,
    params: DragParameters,
}

impl DragCalibration {
    /// Validate parameters
    pub fn new(spec: DragParametersSpec) -> QcalResult<Self> {
        let params = DragParameters::try_from(spec.clone())?;
        Ok(Self { spec, params })
    }

    /// Validated parameters
    pub fn params(&self) -> &DragParameters {
        &self.params
    }

    fn variants(&self, qubit: &Qubit) -> Vec<Vec<PulseStep>> {
        let drag_scaled = AmplitudeScale {
            main: Scalar::Const(1.0),
            drag: Scalar::axis(AMP_AXIS),
        };
        PULSE_PAIRS
            .iter()
            .map(|(first, second)| {
                let mut steps = Vec::new();
                for _ in 0..self.params.pulses_per_sweep() {
                    steps.push(PulseStep::play_scaled(qubit.xy_element(), *first, drag_scaled.clone()));
                    steps.push(PulseStep::play_scaled(qubit.xy_element(), *second, drag_scaled.clone()));
                }
                steps.push(PulseStep::Align);
                steps.push(measure(qubit));
                steps
            })
            .collect()
    }
}

impl Experiment for DragCalibration {
    fn name(&self) -> &str {
        "drag_calibration_180_90"
    }

    fn common(&self) -> &qcal_core::NodeParameters {
        self.params.common()
    }

    fn parameters_json(&self) -> Value {
        serde_json::to_value(&self.spec).unwrap_or(Value::Null)
    }

    fn prepare(&self, ctx: &mut RunContext<'_>) -> QcalResult<()> {
        let targets = ctx.targets().to_vec();
        for qubit in &targets {
            for op in [self.params.operation()]
                .into_iter()
                .chain(PULSE_PAIRS.iter().flat_map(|(a, b)| [*a, *b]))
            {
                if !qubit.has_operation(ctx.state(), op) {
                    return Err(QcalError::config(format!(
                        "{} has no drive operation '{}'",
                        qubit.name(),
                        op
                    )));
                }
            }
            let alpha = qubit.operation_attr(self.params.operation(), "alpha");
            ctx.override_value(&alpha, json!(OVERRIDE_ALPHA))?;
        }
        Ok(())
    }

    fn build_program(&self, ctx: &RunContext<'_>) -> QcalResult<SequenceProgram> {
        let state = ctx.state();
        let common = self.params.common();
        let blocks = ctx
            .targets()
            .iter()
            .map(|qubit| {
                Ok(DeviceBlock {
                    device: qubit.name().to_string(),
                    flux: flux_preparation(state, qubit, common.flux_point())?,
                    reset: reset_strategy(state, qubit, common.reset_type())?,
                    variants: self.variants(qubit),
                })
            })
            .collect::<QcalResult<Vec<_>>>()?;

        Ok(SequenceProgram {
            name: self.name().to_string(),
            num_averages: common.num_averages(),
            axes: vec![
                SweepAxis::indexed(SEQUENCE_AXIS, PULSE_PAIRS.len()),
                SweepAxis::new(AMP_AXIS, self.params.amps().values()),
            ],
            variant_axis: Some(SEQUENCE_AXIS.to_string()),
            blocks,
            quantities: vec![Quantity::State],
            averaged: true,
        })
    }

    fn result_axes(&self, _program: &SequenceProgram) -> Vec<AxisSpec> {
        vec![
            AxisSpec::labels(
                SEQUENCE_AXIS,
                PULSE_PAIRS.iter().map(|(a, b)| format!("{}_{}", a, b)),
            ),
            AxisSpec::numeric(AMP_AXIS, self.params.amps().values()),
        ]
    }

    fn fit(&self, ctx: &RunContext<'_>, dataset: &Dataset) -> QcalResult<FitResult> {
        let states = dataset.require(Quantity::State)?;
        let amps = self.params.amps().values();

        let result = FitResult::per_device(&ctx.device_names(), |device| {
            let line = |pair: usize| -> Result<_, FitError> {
                let view = states
                    .device_at(device, SEQUENCE_AXIS, pair)
                    .ok_or_else(|| FitError::Degenerate(format!("no data for {}", device)))?;
                let y: Vec<f64> = view.iter().copied().collect();
                fit_linear(&amps, &y)
            };
            let crossing = intersection(&line(0)?, &line(1)?)?;
            Ok(DeviceFit::ok(device)
                .with_parameter("intersection", crossing)
                .with_parameter("alpha", crossing * OVERRIDE_ALPHA))
        });

        for qubit in ctx.targets() {
            let Some(fit) = result.get(qubit.name()).filter(|f| f.is_ok()) else {
                continue;
            };
            if let (Some(x), Some(alpha)) = (fit.parameter("intersection"), fit.parameter("alpha")) {
                let path = qubit.operation_attr(self.params.operation(), "alpha");
                info!(
                    "{}: DRAG crossing at {:.4}, alpha {:.6} -> {:.6}",
                    fit.device,
                    x,
                    ctx.value_before_override(&path)?,
                    alpha
                );
            }
        }
        Ok(result)
    }

    fn proposals(&self, _ctx: &RunContext<'_>, qubit: &Qubit, fit: &DeviceFit) -> QcalResult<Vec<Proposal>> {
        Ok(vec![Proposal::number(
            qubit.name(),
            qubit.operation_attr(self.params.operation(), "alpha"),
            fit.parameter("alpha"),
        )])
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{demo_session, targets};
    use approx::assert_relative_eq;
    use qcal_results::ResultArray;
    use qcal_state::StatePath;

    fn drag() -> DragCalibration {
        DragCalibration::new(DragParametersSpec::default()).unwrap()
    }

    #[test]
    fn test_program_layout() {
        let mut session = demo_session();
        let targets = targets(&session, &["q1", "q2"]);
        let node = drag();
        let mut ctx = RunContext::new(&mut session, targets);
        node.prepare(&mut ctx).unwrap();
        let program = node.build_program(&ctx).unwrap();

        program.validate().unwrap();
        assert_eq!(program.points_per_stream(), 80);
        assert_eq!(program.devices(), vec!["q1", "q2"]);
        assert_eq!(program.stream_names(), vec!["n", "state1", "state2"]);
        let first = &program.blocks[0].variants[0][0];
        assert!(matches!(first, PulseStep::Play { operation, .. } if operation == "x180"));

        let alpha = ctx.targets()[0].operation_attr("x180", "alpha");
        assert_eq!(ctx.state().get_f64(&alpha).unwrap(), OVERRIDE_ALPHA);
        ctx.revert_overrides().unwrap();
    }

    #[test]
    fn test_missing_operation_is_config_error() {
        let mut session = demo_session();
        let targets = targets(&session, &["q1"]);
        let node = DragCalibration::new(DragParametersSpec {
            operation: "x45".into(),
            ..Default::default()
        })
        .unwrap();
        let mut ctx = RunContext::new(&mut session, targets);
        assert!(matches!(node.prepare(&mut ctx), Err(QcalError::Configuration(_))));
    }

    fn crossing_dataset(node: &DragCalibration, ctx: &RunContext<'_>, crossing: f64) -> Dataset {
        let amps = node.params().amps().values();
        let rising: Vec<f64> = amps.iter().map(|a| 0.5 + 0.3 * (a - crossing)).collect();
        let falling: Vec<f64> = amps.iter().map(|a| 0.5 - 0.2 * (a - crossing)).collect();
        let buffer: Vec<f64> = rising.iter().chain(&falling).copied().collect();

        let mut dataset = Dataset::new();
        dataset.insert(
            ResultArray::from_buffers(
                Quantity::State,
                &["q1".to_string()],
                &node.result_axes(&node.build_program(ctx).unwrap()),
                &[buffer.as_slice()],
            )
            .unwrap(),
        );
        dataset
    }

    #[test]
    fn test_fit_scales_crossing_by_played_coefficient() {
        let mut session = demo_session();
        let targets = targets(&session, &["q1"]);
        let node = drag();
        let mut ctx = RunContext::new(&mut session, targets);
        node.prepare(&mut ctx).unwrap();

        let dataset = crossing_dataset(&node, &ctx, 0.8);
        let result = node.fit(&ctx, &dataset).unwrap();
        let fit = result.get("q1").unwrap();
        assert_relative_eq!(fit.parameter("intersection").unwrap(), 0.8, epsilon = 1e-9);
        assert_relative_eq!(fit.parameter("alpha").unwrap(), 0.8 * OVERRIDE_ALPHA, epsilon = 1e-9);

        let proposals = node.proposals(&ctx, &ctx.targets()[0], fit).unwrap();
        assert_eq!(proposals[0].path, ctx.targets()[0].operation_attr("x180", "alpha"));
        ctx.revert_overrides().unwrap();
    }

    #[test]
    fn test_zero_alpha_still_calibrates() {
        let mut session = demo_session();
        let alpha = StatePath::parse("qubits/q1/xy/operations/x180/alpha");
        session.state_mut().set(&alpha, json!(0.0)).unwrap();
        let targets = targets(&session, &["q1"]);
        let node = drag();
        let mut ctx = RunContext::new(&mut session, targets);
        node.prepare(&mut ctx).unwrap();

        let dataset = crossing_dataset(&node, &ctx, 0.8);
        let result = node.fit(&ctx, &dataset).unwrap();
        assert_relative_eq!(result.get("q1").unwrap().parameter("alpha").unwrap(), -0.8, epsilon = 1e-9);
        ctx.revert_overrides().unwrap();
        assert_eq!(ctx.state().get_f64(&alpha).unwrap(), 0.0);
    }
}
