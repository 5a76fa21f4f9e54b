//! Shared test fixtures

use crate::demo::demo_state;
use qcal_runtime::Session;
use qcal_state::{DeviceState, Qubit};
use std::path::Path;

/// Demo session saving to `path`
pub(crate) fn demo_session_at(path: &Path) -> Session {
    let state = DeviceState::from_value(demo_state()).unwrap();
    Session::from_state(state, path)
}

/// Demo session that is never saved
pub(crate) fn demo_session() -> Session {
    demo_session_at(Path::new("unused-state.json"))
}

/// Look up qubits by name
pub(crate) fn targets(session: &Session, names: &[&str]) -> Vec<Qubit> {
    names
        .iter()
        .map(|name| Qubit::lookup(session.state(), name).unwrap())
        .collect()
}
