//! Hardware configuration generation
//!
//! Gantree: L1_State → HardwareConfig
//!
//! Flattens the device state into what the control runtime needs: one element
//! per line (drive, flux, readout) with every operation's attributes fully
//! resolved, plus the network settings used to open a session.

use crate::path::StatePath;
use crate::qubit::Qubit;
use crate::state::DeviceState;
use log::debug;
use qcal_core::QcalResult;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Key holding the network section
pub const NETWORK_KEY: &str = "network";

/// Kind of control line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    /// Microwave drive
    Xy,
    /// Flux bias
    Z,
    /// Readout resonator
    Resonator,
}

impl ElementKind {
    fn key(&self) -> &'static str {
        match self {
            ElementKind::Xy => "xy",
            ElementKind::Z => "z",
            ElementKind::Resonator => "resonator",
        }
    }
}

/// One control element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementConfig {
    /// Owning qubit
    pub qubit: String,
    /// Line kind
    pub kind: ElementKind,
    /// Operations with resolved attributes
    pub operations: BTreeMap<String, Map<String, Value>>,
    /// Scalar line attributes (offsets, frequencies), resolved
    pub attributes: Map<String, Value>,
}

/// Network settings for opening a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Runtime host
    pub host: String,
    /// Cluster name
    pub cluster_name: String,
    /// Port
    pub port: Option<u16>,
    /// Access token, if the runtime requires one
    pub token: Option<String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            cluster_name: "Cluster_1".to_string(),
            port: None,
            token: None,
        }
    }
}

/// Configuration handed to the control runtime
/// Gantree: HardwareConfig // 하드웨어 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HardwareConfig {
    /// Network settings
    pub network: NetworkConfig,
    /// Elements by name (`q1.xy`, `q1.z`, `q1.resonator`)
    pub elements: BTreeMap<String, ElementConfig>,
}

impl HardwareConfig {
    /// Generate from the current device state
    /// Gantree: generate(state) -> QcalResult<Self> // 설정 생성
    pub fn generate(state: &DeviceState) -> QcalResult<Self> {
        let network = match state.raw(&StatePath::from_segments([NETWORK_KEY])) {
            Some(_) => {
                let resolved = state.get_resolved_object(&StatePath::from_segments([NETWORK_KEY]))?;
                serde_json::from_value(Value::Object(resolved))?
            }
            None => NetworkConfig::default(),
        };

        let mut elements = BTreeMap::new();
        for qubit in Qubit::all(state) {
            for kind in [ElementKind::Xy, ElementKind::Z, ElementKind::Resonator] {
                let line = qubit.attr(kind.key());
                if !state.contains(&line) {
                    continue;
                }
                let element = Self::element(state, &qubit, kind, &line)?;
                let name = format!("{}.{}", qubit.name(), kind.key());
                debug!("Element {}: {} operation(s)", name, element.operations.len());
                elements.insert(name, element);
            }
        }

        Ok(Self { network, elements })
    }

    fn element(
        state: &DeviceState,
        qubit: &Qubit,
        kind: ElementKind,
        line: &StatePath,
    ) -> QcalResult<ElementConfig> {
        let resolved = state.get_resolved_object(line)?;
        let mut operations = BTreeMap::new();
        let mut attributes = Map::new();

        for (key, value) in resolved {
            if key == "operations" {
                let ops_path = state.concrete_path(&line.child("operations"))?;
                if let Some(ops) = value.as_object() {
                    for op_name in ops.keys() {
                        let op = state.get_resolved_object(&ops_path.child(op_name.as_str()))?;
                        operations.insert(op_name.clone(), op);
                    }
                }
            } else if !value.is_object() && !value.is_array() {
                attributes.insert(key, value);
            }
        }

        Ok(ElementConfig {
            qubit: qubit.name().to_string(),
            kind,
            operations,
            attributes,
        })
    }

    /// Names of every flux element
    pub fn flux_elements(&self) -> Vec<String> {
        self.elements
            .iter()
            .filter(|(_, e)| e.kind == ElementKind::Z)
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Look up an element
    pub fn element_config(&self, name: &str) -> Option<&ElementConfig> {
        self.elements.get(name)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_generate_resolves_operations() {
        let state = DeviceState::from_value(json!({
            "qubits": {
                "q1": {
                    "anharmonicity": -2e8,
                    "xy": {
                        "intermediate_frequency": 5e7,
                        "operations": {
                            "x180_DragGaussian": {"amplitude": 0.1, "sigma": 7, "alpha": 1.0,
                                                  "anharmonicity": "#/qubits/q1/anharmonicity"},
                            "x90_DragGaussian": {"amplitude": 0.05, "sigma": "#../x180_DragGaussian/sigma"},
                            "x180": "#./x180_DragGaussian"
                        }
                    },
                    "z": {"joint_offset": 0.1, "operations": {"const": {"amplitude": 0.1, "length": 100}}}
                },
                "q2": {"resonator": {"operations": {"readout": {"threshold": 0.0}}}}
            },
            "network": {"host": "10.0.0.5", "cluster_name": "lab"}
        }))
        .unwrap();

        let config = HardwareConfig::generate(&state).unwrap();
        assert_eq!(config.network.host, "10.0.0.5");
        assert_eq!(config.elements.len(), 3);

        let xy = config.element_config("q1.xy").unwrap();
        assert_eq!(xy.operations["x90_DragGaussian"]["sigma"], json!(7));
        assert_eq!(xy.operations["x180"]["anharmonicity"], json!(-2e8));
        assert_eq!(xy.attributes["intermediate_frequency"], json!(5e7));

        assert_eq!(config.flux_elements(), vec!["q1.z".to_string()]);
    }

    #[test]
    fn test_default_network() {
        let state = DeviceState::from_value(json!({"qubits": {}})).unwrap();
        let config = HardwareConfig::generate(&state).unwrap();
        assert_eq!(config.network, NetworkConfig::default());
        assert!(config.elements.is_empty());
    }
}
