//! Hahn-echo coherence (T2 echo)
//!
//! Gantree: L5_Node → T2Echo
//!
//! `x90 · idle · x180 · idle · -x90` with both idles swept together. Under the
//! `arbitrary` flux point the target's extra offset is pulsed on its flux line
//! during each idle. The decay of the echo signal gives `T2e` in µs. The node
//! reports coherence only and proposes no state changes.

use crate::experiment::{measure, reset_strategy, Experiment, RunContext};
use crate::flux::{arbitrary_bias, flux_preparation};
use crate::params::{T2EchoParameters, T2EchoParametersSpec};
use log::info;
use qcal_core::{timing, NodeParameters, Quantity, QcalError, QcalResult};
use qcal_fit::{fit_decay_exp, DeviceFit, FitError, FitResult};
use qcal_results::{AxisSpec, Dataset};
use qcal_runtime::{
    AmplitudeScale, DeviceBlock, PulseStep, Scalar, SequenceProgram, SweepAxis,
};
use qcal_state::{DeviceState, Qubit};
use serde_json::Value;

/// Sweep axis of the half-echo idle (clock cycles in the program, µs in results)
pub const IDLE_AXIS: &str = "idle_time";

/// Settling wait around flux pulses, clock cycles
pub const FLUX_SETTLE_CYCLES: f64 = 20.0;

/// T2 echo node
/// Gantree: T2Echo // T2 에코
#[derive(Debug, Clone)]
pub struct T2Echo {
    spec: T2EchoParametersSpec,
    params: T2EchoParameters,
}

impl T2Echo {
    /// Validate parameters
    pub fn new(spec: T2EchoParametersSpec) -> QcalResult<Self> {
        let params = T2EchoParameters::try_from(spec.clone())?;
        Ok(Self { spec, params })
    }

    /// Validated parameters
    pub fn params(&self) -> &T2EchoParameters {
        &self.params
    }

    /// Total echo idle per sweep point, µs
    pub fn idle_times_us(&self) -> Vec<f64> {
        self.params
            .idle_cycles()
            .values()
            .iter()
            .map(|c| 2.0 * timing::cycles_to_us(*c))
            .collect()
    }

    fn quantities(&self) -> Vec<Quantity> {
        if self.params.use_state_discrimination() {
            vec![Quantity::State]
        } else {
            vec![Quantity::I, Quantity::Q]
        }
    }

    /// Steps for one swept idle
    fn idle(&self, state: &DeviceState, qubit: &Qubit) -> QcalResult<Vec<PulseStep>> {
        let bias = arbitrary_bias(state, qubit, self.params.common().flux_point())?;
        if bias == 0.0 || !qubit.has_flux_line(state) {
            return Ok(vec![PulseStep::wait(qubit.xy_element(), Scalar::axis(IDLE_AXIS))]);
        }

        let const_amplitude = state.get_f64(&qubit.attr("z/operations/const/amplitude"))?;
        if const_amplitude == 0.0 {
            return Err(QcalError::config(format!(
                "{} flux 'const' operation has zero amplitude",
                qubit.name()
            )));
        }
        let z = qubit.z_element();
        Ok(vec![
            PulseStep::wait(z.clone(), Scalar::Const(FLUX_SETTLE_CYCLES)),
            PulseStep::Play {
                element: z.clone(),
                operation: "const".to_string(),
                scale: AmplitudeScale {
                    main: Scalar::Const(bias / const_amplitude),
                    drag: Scalar::Const(1.0),
                },
                duration: Some(Scalar::axis(IDLE_AXIS)),
            },
            PulseStep::wait(z, Scalar::Const(FLUX_SETTLE_CYCLES)),
        ])
    }

    fn sequence(&self, state: &DeviceState, qubit: &Qubit) -> QcalResult<Vec<PulseStep>> {
        let xy = qubit.xy_element();
        let idle = self.idle(state, qubit)?;

        let mut steps = vec![PulseStep::play(xy.clone(), "x90"), PulseStep::Align];
        steps.extend(idle.iter().cloned());
        steps.extend([PulseStep::Align, PulseStep::play(xy.clone(), "x180"), PulseStep::Align]);
        steps.extend(idle);
        steps.extend([
            PulseStep::Align,
            PulseStep::play(xy, "-x90"),
            PulseStep::Align,
            measure(qubit),
        ]);
        Ok(steps)
    }
}

impl Experiment for T2Echo {
    fn name(&self) -> &str {
        "t2_echo"
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
                Ok(DeviceBlock {
                    device: qubit.name().to_string(),
                    flux: flux_preparation(state, qubit, common.flux_point())?,
                    reset: reset_strategy(state, qubit, common.reset_type())?,
                    variants: vec![self.sequence(state, qubit)?],
                })
            })
            .collect::<QcalResult<Vec<_>>>()?;

        Ok(SequenceProgram {
            name: self.name().to_string(),
            num_averages: common.num_averages(),
            axes: vec![SweepAxis::new(IDLE_AXIS, self.params.idle_cycles().values())],
            variant_axis: None,
            blocks,
            quantities: self.quantities(),
            averaged: true,
        })
    }

    fn result_axes(&self, _program: &SequenceProgram) -> Vec<AxisSpec> {
        vec![AxisSpec::numeric(IDLE_AXIS, self.idle_times_us())]
    }

    fn fit(&self, ctx: &RunContext<'_>, dataset: &Dataset) -> QcalResult<FitResult> {
        let signal = if self.params.use_state_discrimination() {
            dataset.require(Quantity::State)?
        } else {
            dataset.require(Quantity::I)?
        };
        let t = self.idle_times_us();

        let result = FitResult::per_device(&ctx.device_names(), |device| {
            let y: Vec<f64> = signal
                .device(device)
                .ok_or_else(|| FitError::Degenerate(format!("no data for {}", device)))?
                .iter()
                .copied()
                .collect();
            let decay = fit_decay_exp(&t, &y)?;
            let (tau, err) = decay.time_constant()?;
            Ok(DeviceFit::ok(device)
                .with_estimate("T2e", tau, err)
                .with_parameter("amplitude", decay.amplitude)
                .with_parameter("offset", decay.offset))
        });

        for fit in result.iter() {
            if let (Some(tau), Some(err)) = (fit.parameter("T2e"), fit.uncertainties.get("T2e")) {
                info!("{}: T2e = {:.3} ± {:.3} µs", fit.device, tau, err);
            }
        }
        Ok(result)
    }
}

// ============================================================================
// Tests
// ============================================================================
