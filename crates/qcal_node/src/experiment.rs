//! Experiment abstraction and run context
//!
//! Gantree: L5_Node → Experiment
//!
//! An [`Experiment`] describes one calibration: its program, how the results
//! are fitted and which state attributes the fit proposes to change. The
//! [`RunContext`] replaces module-level globals: it carries the session, the
//! resolved targets and any temporary overrides made while preparing.

use crate::update::Proposal;
use chrono::{DateTime, Local};
use log::debug;
use qcal_core::{defaults, NodeParameters, QcalResult, ResetType};
use qcal_fit::{DeviceFit, FitResult};
use qcal_results::{AxisSpec, Dataset};
use qcal_runtime::{PulseStep, ResetStrategy, SequenceProgram, Session};
use qcal_state::{DeviceState, Qubit, StatePath, TrackOptions, TrackedUpdate};
use serde_json::Value;

// ============================================================================
// Run Context
// ============================================================================

/// State shared by every stage of one node run
/// Gantree: RunContext // 실행 컨텍스트
pub struct RunContext<'s> {
    session: &'s mut Session,
    targets: Vec<Qubit>,
    overrides: Option<TrackedUpdate>,
    started: DateTime<Local>,
}

impl<'s> RunContext<'s> {
    /// Context over resolved targets
    pub fn new(session: &'s mut Session, targets: Vec<Qubit>) -> Self {
        Self {
            session,
            targets,
            overrides: None,
            started: Local::now(),
        }
    }

    /// Current (possibly overridden) device state
    pub fn state(&self) -> &DeviceState {
        self.session.state()
    }

    /// Session
    pub fn session(&self) -> &Session {
        self.session
    }

    /// Mutable session
    pub fn session_mut(&mut self) -> &mut Session {
        self.session
    }

    /// Target qubits in measurement order
    pub fn targets(&self) -> &[Qubit] {
        &self.targets
    }

    /// Target names in measurement order
    pub fn device_names(&self) -> Vec<String> {
        self.targets.iter().map(|q| q.name().to_string()).collect()
    }

    /// Run start time
    pub fn started(&self) -> DateTime<Local> {
        self.started
    }

    /// Temporarily change an attribute for the duration of the run
    /// Gantree: override_value(path,value) // 임시 덮어쓰기
    pub fn override_value(&mut self, path: &StatePath, value: Value) -> QcalResult<()> {
        let state = self.session.state_mut();
        let tracker = self
            .overrides
            .get_or_insert_with(|| TrackedUpdate::begin(state, TrackOptions::default()));
        debug!("Override {} = {}", path, value);
        tracker.set(state, path, value)
    }

    /// Numeric attribute as it was before any override of this run
    pub fn value_before_override(&self, path: &StatePath) -> QcalResult<f64> {
        let state = self.session.state();
        let concrete = state.concrete_path(path)?;
        let original = self
            .overrides
            .as_ref()
            .and_then(|tracker| tracker.original(&concrete))
            .and_then(Value::as_f64);
        match original {
            Some(value) => Ok(value),
            None => state.get_f64(&concrete),
        }
    }

    /// Are overrides outstanding
    pub fn has_overrides(&self) -> bool {
        self.overrides.is_some()
    }

    /// Restore every overridden attribute
    /// Gantree: revert_overrides() // 원복
    pub fn revert_overrides(&mut self) -> QcalResult<()> {
        match self.overrides.take() {
            Some(tracker) => tracker.revert(self.session.state_mut()),
            None => Ok(()),
        }
    }
}

impl Drop for RunContext<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.revert_overrides() {
            log::warn!("Failed to revert overrides: {}", e);
        }
    }
}

// ============================================================================
// Experiment
// ============================================================================

/// One calibration node
/// Gantree: Experiment // 실험 트레이트
pub trait Experiment {
    /// Node name used for artifacts and the program
    fn name(&self) -> &str;

    /// Shared node parameters
    fn common(&self) -> &NodeParameters;

    /// Parameters as recorded in `node.json`
    fn parameters_json(&self) -> Value;

    /// Temporary state changes before the program is built
    fn prepare(&self, _ctx: &mut RunContext<'_>) -> QcalResult<()> {
        Ok(())
    }

    /// Declarative program for every target
    fn build_program(&self, ctx: &RunContext<'_>) -> QcalResult<SequenceProgram>;

    /// Axes of the assembled arrays (after the qubit axis)
    fn result_axes(&self, program: &SequenceProgram) -> Vec<AxisSpec> {
        program.axes.iter().map(AxisSpec::from).collect()
    }

    /// One fit per target
    fn fit(&self, ctx: &RunContext<'_>, dataset: &Dataset) -> QcalResult<FitResult>;

    /// State changes proposed by one device's fit
    fn proposals(&self, _ctx: &RunContext<'_>, _qubit: &Qubit, _fit: &DeviceFit) -> QcalResult<Vec<Proposal>> {
        Ok(Vec::new())
    }
}

// ============================================================================
// Program Helpers
// ============================================================================

/// Reset strategy of one qubit
pub fn reset_strategy(state: &DeviceState, qubit: &Qubit, reset: ResetType) -> QcalResult<ResetStrategy> {
    match reset {
        ResetType::Thermal => Ok(ResetStrategy::Thermal {
            wait_ns: qubit.thermalization_time(state)?,
        }),
        ResetType::Active => {
            let rus = qubit.readout_attr("rus_exit_threshold");
            let threshold = if state.contains(&rus) {
                state.get_f64(&rus)?
            } else {
                qubit.readout_threshold(state)?
            };
            Ok(ResetStrategy::Active {
                pi_operation: "x180".to_string(),
                threshold,
                max_attempts: defaults::ACTIVE_RESET_MAX_ATTEMPTS,
            })
        }
    }
}

/// Readout of one qubit
pub fn measure(qubit: &Qubit) -> PulseStep {
    PulseStep::Measure {
        element: qubit.resonator_element(),
        operation: "readout".to_string(),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn session() -> Session {
        let state = DeviceState::from_value(json!({
            "qubits": {
                "q1": {
                    "xy": {"operations": {"x180": {"alpha": "#/shared/alpha"}}},
                    "resonator": {"operations": {"readout": {"threshold": 0.002}}},
                    "thermalization_time": 800
                }
            },
            "shared": {"alpha": -0.5}
        }))
        .unwrap();
        Session::from_state(state, "unused.json")
    }

    #[test]
    fn test_override_then_revert() {
        let mut session = session();
        let q1 = Qubit::lookup(session.state(), "q1").unwrap();
        let path = q1.operation_attr("x180", "alpha");

        let mut ctx = RunContext::new(&mut session, vec![q1]);
        ctx.override_value(&path, json!(-1.0)).unwrap();
        assert_eq!(ctx.state().get_f64(&path).unwrap(), -1.0);
        assert_eq!(ctx.value_before_override(&path).unwrap(), -0.5);
        assert!(ctx.state().save("never.json").is_err());

        ctx.revert_overrides().unwrap();
        assert!(!ctx.has_overrides());
        drop(ctx);
        assert_eq!(session.state().get_f64(&path).unwrap(), -0.5);
        assert_eq!(session.state().outstanding_overrides(), 0);
    }

    #[test]
    fn test_drop_reverts() {
        let mut session = session();
        let q1 = Qubit::lookup(session.state(), "q1").unwrap();
        let path = q1.operation_attr("x180", "alpha");
        {
            let mut ctx = RunContext::new(&mut session, vec![q1]);
            ctx.override_value(&path, json!(2.0)).unwrap();
        }
        assert_eq!(session.state().get_f64(&path).unwrap(), -0.5);
    }

    #[test]
    fn test_reset_strategies() {
        let session = session();
        let q1 = Qubit::lookup(session.state(), "q1").unwrap();
        assert_eq!(
            reset_strategy(session.state(), &q1, ResetType::Thermal).unwrap(),
            ResetStrategy::Thermal { wait_ns: 800.0 }
        );
        match reset_strategy(session.state(), &q1, ResetType::Active).unwrap() {
            ResetStrategy::Active { threshold, .. } => assert_eq!(threshold, 0.002),
            other => panic!("unexpected {:?}", other),
        }
    }
}
