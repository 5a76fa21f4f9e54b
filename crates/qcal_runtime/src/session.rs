//! Device sessions
//!
//! Gantree: L2_Runtime → Session
//!
//! A [`Session`] owns the device state for one node run: it resolves target
//! devices, produces the hardware configuration, opens the machine and
//! persists the state afterwards. The opened machine lives in a
//! [`MachineGuard`] that parks every flux line at 0.0 before releasing it,
//! whether the run finished, failed, or unwound.

use crate::runtime::{ControlRuntime, Machine, RunningJob};
use crate::program::SequenceProgram;
use log::{info, warn};
use qcal_core::{NodeParameters, QcalError, QcalResult};
use qcal_state::{DeviceState, HardwareConfig, Qubit};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Device session
/// Gantree: Session // 장치 세션
#[derive(Debug)]
pub struct Session {
    state: DeviceState,
    path: PathBuf,
}

impl Session {
    /// Load the device state from `path`
    /// Gantree: open(path) -> QcalResult<Session> // 세션 열기
    pub fn open(path: impl AsRef<Path>) -> QcalResult<Self> {
        let path = path.as_ref().to_path_buf();
        let state = DeviceState::load(&path)?;
        Ok(Self { state, path })
    }

    /// Wrap an already loaded state; `save` writes to `path`
    pub fn from_state(state: DeviceState, path: impl Into<PathBuf>) -> Self {
        Self {
            state,
            path: path.into(),
        }
    }

    /// Requested devices, or every active device
    /// Gantree: resolve_targets(params) -> QcalResult<Vec<Qubit>> // 대상 해석
    pub fn resolve_targets(&self, params: &NodeParameters) -> QcalResult<Vec<Qubit>> {
        let targets = match params.qubits() {
            Some(names) => names
                .iter()
                .map(|name| Qubit::lookup(&self.state, name))
                .collect::<QcalResult<Vec<_>>>()?,
            None => Qubit::active(&self.state)?,
        };
        if targets.is_empty() {
            return Err(QcalError::config("no target devices"));
        }
        Ok(targets)
    }

    /// Hardware configuration of the current (possibly overridden) state
    pub fn hardware_config(&self) -> QcalResult<HardwareConfig> {
        HardwareConfig::generate(&self.state)
    }

    /// Open the machine
    /// Gantree: connect(runtime,timeout) -> QcalResult<MachineGuard> // 연결
    pub fn connect(&self, runtime: &dyn ControlRuntime, timeout: Duration) -> QcalResult<MachineGuard> {
        let config = self.hardware_config()?;
        info!(
            "Connecting to {} at {} (timeout {:?})",
            runtime.name(),
            config.network.host,
            timeout
        );
        let machine = runtime.open_machine(&config, timeout)?;
        Ok(MachineGuard::new(machine, config.flux_elements()))
    }

    /// Write the state back to the session path
    pub fn save(&self) -> QcalResult<()> {
        self.state.save(&self.path)
    }

    /// Device state
    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    /// Mutable device state
    pub fn state_mut(&mut self) -> &mut DeviceState {
        &mut self.state
    }

    /// State file path
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Open machine that parks every flux line on release
/// Gantree: MachineGuard // 머신 가드
pub struct MachineGuard {
    machine: Option<Box<dyn Machine>>,
    flux_elements: Vec<String>,
}

impl MachineGuard {
    /// Take ownership of an open machine
    pub fn new(machine: Box<dyn Machine>, flux_elements: Vec<String>) -> Self {
        Self {
            machine: Some(machine),
            flux_elements,
        }
    }

    /// Execute a program on the machine
    pub fn execute(&mut self, program: &SequenceProgram) -> QcalResult<Box<dyn RunningJob>> {
        self.machine_mut()?.execute(program)
    }

    /// Set a DC offset
    pub fn set_dc_offset(&mut self, element: &str, offset: f64) -> QcalResult<()> {
        self.machine_mut()?.set_dc_offset(element, offset)
    }

    /// Flux elements parked on release
    pub fn flux_elements(&self) -> &[String] {
        &self.flux_elements
    }

    /// Park flux lines and release the machine
    /// Gantree: close() -> QcalResult<()> // 종료
    pub fn close(mut self) -> QcalResult<()> {
        self.release()
    }

    fn machine_mut(&mut self) -> QcalResult<&mut Box<dyn Machine>> {
        self.machine
            .as_mut()
            .ok_or_else(|| QcalError::Runtime("machine already released".to_string()))
    }

    fn release(&mut self) -> QcalResult<()> {
        let Some(mut machine) = self.machine.take() else {
            return Ok(());
        };

        // Every flux line is attempted even if one fails
        let mut first_error = None;
        for element in &self.flux_elements {
            if let Err(e) = machine.set_dc_offset(element, 0.0) {
                warn!("Could not zero {}: {}", element, e);
                first_error.get_or_insert(e);
            }
        }
        if let Err(e) = machine.close() {
            first_error.get_or_insert(e);
        }
        info!("Released machine, {} flux line(s) zeroed", self.flux_elements.len());

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl Drop for MachineGuard {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!("Machine teardown failed: {}", e);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic::SyntheticRuntime;
    use qcal_core::{NodeParametersSpec, QubitSelection};
    use serde_json::json;

    fn state() -> DeviceState {
        DeviceState::from_value(json!({
            "qubits": {
                "q1": {"z": {"independent_offset": 0.1}, "xy": {"operations": {}}},
                "q2": {"z": {"independent_offset": -0.2}},
                "q3": {"xy": {"operations": {}}}
            },
            "active_qubit_names": ["q1", "q2"]
        }))
        .unwrap()
    }

    fn params(qubits: Option<&str>) -> NodeParameters {
        NodeParameters::new(NodeParametersSpec {
            qubits: qubits.map(|q| QubitSelection::Csv(q.to_string())),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_resolve_targets() {
        let session = Session::from_state(state(), "unused.json");
        let active = session.resolve_targets(&params(None)).unwrap();
        let names: Vec<_> = active.iter().map(|q| q.name().to_string()).collect();
        assert_eq!(names, vec!["q1", "q2"]);

        let chosen = session.resolve_targets(&params(Some("q3"))).unwrap();
        assert_eq!(chosen[0].name(), "q3");
    }

    #[test]
    fn test_unknown_device_never_connects() {
        let runtime = SyntheticRuntime::new();
        let session = Session::from_state(state(), "unused.json");
        let err = session.resolve_targets(&params(Some("q1,q7"))).unwrap_err();
        assert_eq!(err, QcalError::UnknownDevice("q7".into()));
        assert_eq!(runtime.log().opened, 0);
    }

    #[test]
    fn test_guard_zeroes_flux_on_close() {
        let runtime = SyntheticRuntime::new();
        let session = Session::from_state(state(), "unused.json");
        let mut guard = session.connect(&runtime, Duration::from_secs(1)).unwrap();
        guard.set_dc_offset("q1.z", 0.1).unwrap();
        guard.set_dc_offset("q2.z", -0.2).unwrap();
        guard.close().unwrap();

        let log = runtime.log();
        assert_eq!(log.offset("q1.z"), 0.0);
        assert_eq!(log.offset("q2.z"), 0.0);
        assert_eq!(log.closed, 1);
    }

    #[test]
    fn test_guard_zeroes_flux_on_unwind() {
        let runtime = SyntheticRuntime::new();
        let session = Session::from_state(state(), "unused.json");

        let outcome: QcalResult<()> = (|| {
            let mut guard = session.connect(&runtime, Duration::from_secs(1))?;
            guard.set_dc_offset("q1.z", 0.3)?;
            Err(QcalError::Runtime("job aborted".into()))
        })();

        assert!(outcome.is_err());
        let log = runtime.log();
        assert_eq!(log.offset("q1.z"), 0.0);
        assert_eq!(log.closed, 1);
    }

    #[test]
    fn test_save_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        Session::from_state(state(), &path).save().unwrap();

        let reopened = Session::open(&path).unwrap();
        assert_eq!(reopened.state(), &state());
        assert_eq!(reopened.path(), path.as_path());
    }
}
