//! Qubit views over the device state
//!
//! Gantree: L1_State → Qubit
//!
//! A [`Qubit`] is a name plus the path of its subtree; every attribute is read
//! from the [`DeviceState`] on demand so overrides are always visible.

use crate::path::StatePath;
use crate::state::{DeviceState, ACTIVE_QUBITS_KEY, QUBITS_KEY};
use qcal_core::{DeviceId, QcalError, QcalResult};
use serde::{Deserialize, Serialize};

/// Flux-line idle offsets of one qubit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FluxOffsets {
    /// Offset when biased independently
    pub independent: f64,
    /// Offset shared at the joint idle point
    pub joint: f64,
    /// Parking offset
    pub min: f64,
    /// Extra offset used by the arbitrary flux point
    pub arbitrary: f64,
}

/// View of one qubit in the device state
/// Gantree: Qubit // 큐비트 뷰
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Qubit {
    name: DeviceId,
    path: StatePath,
}

impl Qubit {
    /// Look up a qubit by name
    /// Gantree: lookup(state,name) -> QcalResult<Qubit> // 큐비트 조회
    pub fn lookup(state: &DeviceState, name: &str) -> QcalResult<Self> {
        let path = StatePath::from_segments([QUBITS_KEY, name]);
        match state.raw(&path) {
            Some(v) if v.is_object() => Ok(Self {
                name: name.to_string(),
                path,
            }),
            _ => Err(QcalError::UnknownDevice(name.to_string())),
        }
    }

    /// Every qubit in the document, in document order
    pub fn all(state: &DeviceState) -> Vec<Self> {
        state
            .raw(&StatePath::from_segments([QUBITS_KEY]))
            .and_then(|v| v.as_object())
            .map(|qubits| {
                qubits
                    .keys()
                    .map(|name| Self {
                        name: name.clone(),
                        path: StatePath::from_segments([QUBITS_KEY, name.as_str()]),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Active qubits (`active_qubit_names`, or every qubit if the list is absent)
    pub fn active(state: &DeviceState) -> QcalResult<Vec<Self>> {
        match state.raw(&StatePath::from_segments([ACTIVE_QUBITS_KEY])) {
            Some(names) => names
                .as_array()
                .map(|list| list.iter().filter_map(|v| v.as_str()).collect::<Vec<_>>())
                .unwrap_or_default()
                .into_iter()
                .map(|name| Self::lookup(state, name))
                .collect(),
            None => Ok(Self::all(state)),
        }
    }

    // ========================================================================
    // Identity
    // ========================================================================

    /// Qubit name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path of the qubit subtree
    pub fn path(&self) -> &StatePath {
        &self.path
    }

    /// Path of an attribute below the qubit (`"xy/operations/x180/alpha"`)
    pub fn attr(&self, relative: &str) -> StatePath {
        self.path.join(&StatePath::parse(relative))
    }

    /// Path of an operation attribute on the drive line
    pub fn operation_attr(&self, operation: &str, attribute: &str) -> StatePath {
        self.path
            .join(&StatePath::from_segments(["xy", "operations", operation, attribute]))
    }

    /// Path of the readout operation attribute
    pub fn readout_attr(&self, attribute: &str) -> StatePath {
        self.path.join(&StatePath::from_segments([
            "resonator",
            "operations",
            "readout",
            attribute,
        ]))
    }

    /// Drive element name
    pub fn xy_element(&self) -> String {
        format!("{}.xy", self.name)
    }

    /// Flux element name
    pub fn z_element(&self) -> String {
        format!("{}.z", self.name)
    }

    /// Readout element name
    pub fn resonator_element(&self) -> String {
        format!("{}.resonator", self.name)
    }

    // ========================================================================
    // Attributes
    // ========================================================================

    /// Does the qubit carry a flux line
    pub fn has_flux_line(&self, state: &DeviceState) -> bool {
        state.contains(&self.attr("z"))
    }

    /// Flux-line offsets (zeros if the qubit has no flux line)
    pub fn flux_offsets(&self, state: &DeviceState) -> QcalResult<FluxOffsets> {
        if !self.has_flux_line(state) {
            return Ok(FluxOffsets {
                independent: 0.0,
                joint: 0.0,
                min: 0.0,
                arbitrary: 0.0,
            });
        }
        let read = |key: &str| -> QcalResult<f64> {
            let path = self.attr(&format!("z/{}", key));
            if state.contains(&path) {
                state.get_f64(&path)
            } else {
                Ok(0.0)
            }
        };
        Ok(FluxOffsets {
            independent: read("independent_offset")?,
            joint: read("joint_offset")?,
            min: read("min_offset")?,
            arbitrary: read("arbitrary_offset")?,
        })
    }

    /// Thermalization time in ns (qubit entry, else the document-level value)
    pub fn thermalization_time(&self, state: &DeviceState) -> QcalResult<f64> {
        let own = self.attr("thermalization_time");
        if state.contains(&own) {
            return state.get_f64(&own);
        }
        state.get_f64(&StatePath::from_segments(["thermalization_time"]))
    }

    /// Readout discrimination threshold
    pub fn readout_threshold(&self, state: &DeviceState) -> QcalResult<f64> {
        state.get_f64(&self.readout_attr("threshold"))
    }

    /// Numeric attribute of a drive operation
    pub fn operation_value(&self, state: &DeviceState, operation: &str, attribute: &str) -> QcalResult<f64> {
        state.get_f64(&self.operation_attr(operation, attribute))
    }

    /// Does the drive line define `operation`
    pub fn has_operation(&self, state: &DeviceState, operation: &str) -> bool {
        state.contains(
            &self
                .path
                .join(&StatePath::from_segments(["xy", "operations", operation])),
        )
    }

    /// Plot grid location, `"col,row"`
    pub fn grid_location(&self, state: &DeviceState) -> Option<String> {
        state
            .get_str(&self.attr("grid_location"))
            .ok()
            .map(str::to_string)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn state() -> DeviceState {
        DeviceState::from_value(json!({
            "qubits": {
                "q1": {
                    "z": {"independent_offset": 0.1, "joint_offset": 0.2, "min_offset": -0.3},
                    "resonator": {"operations": {"readout": {"threshold": 0.004}}},
                    "grid_location": "0,0"
                },
                "q2": {"thermalization_time": 2000},
                "q3": {}
            },
            "active_qubit_names": ["q2", "q1"],
            "thermalization_time": 5000
        }))
        .unwrap()
    }

    #[test]
    fn test_active_order() {
        let s = state();
        let active = Qubit::active(&s).unwrap();
        let names: Vec<_> = active.iter().map(Qubit::name).collect();
        assert_eq!(names, vec!["q2", "q1"]);
        assert_eq!(Qubit::all(&s).len(), 3);
    }

    #[test]
    fn test_unknown_qubit() {
        let s = state();
        assert_eq!(
            Qubit::lookup(&s, "q9").unwrap_err(),
            QcalError::UnknownDevice("q9".into())
        );
    }

    #[test]
    fn test_flux_offsets() {
        let s = state();
        let q1 = Qubit::lookup(&s, "q1").unwrap();
        let offsets = q1.flux_offsets(&s).unwrap();
        assert_eq!(offsets.joint, 0.2);
        assert_eq!(offsets.arbitrary, 0.0);

        let q3 = Qubit::lookup(&s, "q3").unwrap();
        assert!(!q3.has_flux_line(&s));
        assert_eq!(q3.flux_offsets(&s).unwrap().min, 0.0);
    }

    #[test]
    fn test_thermalization_fallback() {
        let s = state();
        let q1 = Qubit::lookup(&s, "q1").unwrap();
        let q2 = Qubit::lookup(&s, "q2").unwrap();
        assert_eq!(q1.thermalization_time(&s).unwrap(), 5000.0);
        assert_eq!(q2.thermalization_time(&s).unwrap(), 2000.0);
    }

    #[test]
    fn test_element_names_and_paths() {
        let s = state();
        let q1 = Qubit::lookup(&s, "q1").unwrap();
        assert_eq!(q1.xy_element(), "q1.xy");
        assert_eq!(q1.z_element(), "q1.z");
        assert_eq!(
            q1.operation_attr("x180", "alpha").to_string(),
            "/qubits/q1/xy/operations/x180/alpha"
        );
        assert_eq!(q1.readout_threshold(&s).unwrap(), 0.004);
        assert_eq!(q1.grid_location(&s).as_deref(), Some("0,0"));
    }
}
