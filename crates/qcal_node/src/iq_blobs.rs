//! Single-shot readout discrimination (IQ blobs)
//!
//! Gantree: L5_Node → IqBlobs
//!
//! Every shot is streamed for two prepared states: ground (reset only) and
//! excited (reset, then `x180`). The two-state discriminator yields the
//! rotation that puts the blob separation on I, the threshold that
//! misassigns the fewest rotated shots and the readout fidelity.

use crate::experiment::{measure, reset_strategy, Experiment, RunContext};
use crate::flux::flux_preparation;
use crate::params::{IqBlobsParameters, IqBlobsParametersSpec};
use crate::update::Proposal;
use log::info;
use qcal_core::{NodeParameters, Quantity, QcalResult};
use qcal_fit::{two_state_discriminator, DeviceFit, FitError, FitResult};
use qcal_results::{AxisSpec, Dataset, ResultArray};
use qcal_runtime::{DeviceBlock, PulseStep, SequenceProgram, SweepAxis};
use qcal_state::Qubit;
use serde_json::Value;

/// Axis selecting the prepared state (0 = ground, 1 = excited)
pub const PREPARED_AXIS: &str = "prepared";

/// Axis of single shots in the assembled arrays
pub const SHOT_AXIS: &str = "shot";

/// IQ-blob node
/// Gantree: IqBlobs // IQ 블롭
#[derive(Debug, Clone)]
pub struct IqBlobs {
    spec: IqBlobsParametersSpec,
    params: IqBlobsParameters,
}

impl IqBlobs {
    /// Validate parameters
    pub fn new(spec: IqBlobsParametersSpec) -> QcalResult<Self> {
        let params = IqBlobsParameters::try_from(spec.clone())?;
        Ok(Self { spec, params })
    }

    /// Validated parameters
    pub fn params(&self) -> &IqBlobsParameters {
        &self.params
    }
}

fn shots(array: &ResultArray, device: &str, prepared: usize) -> Result<Vec<f64>, FitError> {
    array
        .device_at(device, PREPARED_AXIS, prepared)
        .map(|view| view.iter().copied().collect())
        .ok_or_else(|| FitError::Degenerate(format!("no shots for {}", device)))
}

impl Experiment for IqBlobs {
    fn name(&self) -> &str {
        "iq_blobs"
    }

    fn common(&self) -> &NodeParameters {
        self.params.common()
    }

    fn parameters_json(&self) -> Value {
        serde_json::to_value(&self.spec).unwrap_or(Value::Null)
    }

    fn build_program(&self, ctx: &RunContext<'_>) -> QcalResult<SequenceProgram> {
        let state = ctx.state();
        let common = self.params.common();
        let blocks = ctx
            .targets()
            .iter()
            .map(|qubit| {
                let ground = vec![PulseStep::Align, measure(qubit)];
                let excited = vec![
                    PulseStep::play(qubit.xy_element(), "x180"),
                    PulseStep::Align,
                    measure(qubit),
                ];
                Ok(DeviceBlock {
                    device: qubit.name().to_string(),
                    flux: flux_preparation(state, qubit, common.flux_point())?,
                    reset: reset_strategy(state, qubit, common.reset_type())?,
                    variants: vec![ground, excited],
                })
            })
            .collect::<QcalResult<Vec<_>>>()?;

        Ok(SequenceProgram {
            name: self.name().to_string(),
            num_averages: self.params.num_runs(),
            axes: vec![SweepAxis::indexed(PREPARED_AXIS, 2)],
            variant_axis: Some(PREPARED_AXIS.to_string()),
            blocks,
            quantities: vec![Quantity::I, Quantity::Q],
            averaged: false,
        })
    }

    fn result_axes(&self, _program: &SequenceProgram) -> Vec<AxisSpec> {
        let runs = self.params.num_runs() as usize;
        vec![
            AxisSpec::numeric(SHOT_AXIS, (0..runs).map(|i| i as f64).collect()),
            AxisSpec::labels(PREPARED_AXIS, ["g", "e"]),
        ]
    }

    fn fit(&self, ctx: &RunContext<'_>, dataset: &Dataset) -> QcalResult<FitResult> {
        let i = dataset.require(Quantity::I)?;
        let q = dataset.require(Quantity::Q)?;

        let result = FitResult::per_device(&ctx.device_names(), |device| {
            let d = two_state_discriminator(
                &shots(i, device, 0)?,
                &shots(q, device, 0)?,
                &shots(i, device, 1)?,
                &shots(q, device, 1)?,
            )?;
            Ok(DeviceFit::ok(device)
                .with_parameter("angle", d.angle)
                .with_parameter("threshold", d.threshold)
                .with_parameter("rus_threshold", d.rus_threshold)
                .with_parameter("fidelity", d.fidelity)
                .with_parameter("gg", d.confusion[0][0])
                .with_parameter("ge", d.confusion[0][1])
                .with_parameter("eg", d.confusion[1][0])
                .with_parameter("ee", d.confusion[1][1]))
        });

        for fit in result.iter() {
            if let Some(fidelity) = fit.parameter("fidelity") {
                info!("{}: readout fidelity {:.2}%", fit.device, 100.0 * fidelity);
            }
        }
        Ok(result)
    }

    fn proposals(&self, ctx: &RunContext<'_>, qubit: &Qubit, fit: &DeviceFit) -> QcalResult<Vec<Proposal>> {
        let weights = qubit.readout_attr("integration_weights_angle");
        let current = if ctx.state().contains(&weights) {
            ctx.state().get_f64(&weights)?
        } else {
            0.0
        };
        let device = qubit.name();
        Ok(vec![
            Proposal::number(device, weights, fit.parameter("angle").map(|a| current - a)),
            Proposal::number(device, qubit.readout_attr("threshold"), fit.parameter("threshold")),
            Proposal::number(
                device,
                qubit.readout_attr("rus_exit_threshold"),
                fit.parameter("rus_threshold"),
            ),
        ])
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
    use qcal_core::ResetType;
    use qcal_runtime::ResetStrategy;

    fn blobs(runs: i64) -> IqBlobs {
        IqBlobs::new(IqBlobsParametersSpec {
            num_runs: runs,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_program_streams_every_shot() {
        let mut session = demo_session();
        let targets = targets(&session, &["q1"]);
        let node = blobs(50);
        let ctx = RunContext::new(&mut session, targets);
        let program = node.build_program(&ctx).unwrap();

        assert!(!program.averaged);
        assert_eq!(program.stream_len(), 100);
        let axes = node.result_axes(&program);
        assert_eq!(axes.iter().map(AxisSpec::len).product::<usize>(), 100);
        assert_eq!(node.common().reset_type(), ResetType::Active);
        assert!(matches!(program.blocks[0].reset, ResetStrategy::Active { .. }));
    }

    #[test]
    fn test_fit_and_proposals() {
        let mut session = demo_session();
        let targets = targets(&session, &["q1"]);
        let node = blobs(4);
        let ctx = RunContext::new(&mut session, targets);
        let axes = node.result_axes(&node.build_program(&ctx).unwrap());

        // Shot-major layout: [g, e] per shot
        let i = [0.0, 2e-4, 1e-5, 2.1e-4, -1e-5, 1.9e-4, 0.0, 2e-4];
        let q = [0.0; 8];
        let mut dataset = Dataset::new();
        let devices = ["q1".to_string()];
        dataset.insert(ResultArray::from_buffers(Quantity::I, &devices, &axes, &[&i[..]]).unwrap());
        dataset.insert(ResultArray::from_buffers(Quantity::Q, &devices, &axes, &[&q[..]]).unwrap());

        let result = node.fit(&ctx, &dataset).unwrap();
        let fit = result.get("q1").unwrap();
        assert_relative_eq!(fit.parameter("angle").unwrap(), 0.0, epsilon = 1e-12);
        // Highest ground shot; every excited shot lies above it
        assert_relative_eq!(fit.parameter("threshold").unwrap(), 1e-5, epsilon = 1e-12);
        assert_relative_eq!(fit.parameter("fidelity").unwrap(), 1.0);

        let proposals = node.proposals(&ctx, &ctx.targets()[0], fit).unwrap();
        assert_eq!(proposals.len(), 3);
        assert_eq!(proposals[1].value, Some(serde_json::json!(fit.parameter("threshold").unwrap())));
    }
}
