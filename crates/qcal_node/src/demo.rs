//! Demo device and synthetic responses
//!
//! Gantree: L5_Node → Demo
//!
//! A two-qubit device state and a response model that answers every node in
//! this crate, so the runner can be exercised end to end against the
//! synthetic runtime.

use crate::drag::{AMP_AXIS, SEQUENCE_AXIS};
use crate::iq_blobs::PREPARED_AXIS;
use crate::t2_echo::IDLE_AXIS;
use qcal_core::{timing, Quantity};
use qcal_runtime::{gaussian, PointContext, ResponseModel};
use rand::RngCore;
use serde_json::{json, Value};

/// Two-qubit demo device state
pub fn demo_state() -> Value {
    let qubit = |independent: f64, joint: f64, alpha: f64, threshold: f64| {
        json!({
            "xy": {
                "operations": {
                    "x180": {"amplitude": 0.25, "length": 40, "alpha": alpha},
                    "y180": {"amplitude": 0.25, "length": 40, "alpha": "#../x180/alpha"},
                    "x90": {"amplitude": 0.125, "length": 40, "alpha": "#../x180/alpha"},
                    "y90": {"amplitude": 0.125, "length": 40, "alpha": "#../x180/alpha"},
                    "-x90": {"amplitude": -0.125, "length": 40, "alpha": "#../x180/alpha"}
                }
            },
            "z": {
                "independent_offset": independent,
                "joint_offset": joint,
                "min_offset": -0.25,
                "arbitrary_offset": 0.02,
                "operations": {"const": {"amplitude": 0.1, "length": 100}}
            },
            "resonator": {
                "operations": {
                    "readout": {
                        "amplitude": 0.05,
                        "length": 1000,
                        "threshold": threshold,
                        "rus_exit_threshold": threshold,
                        "integration_weights_angle": 0.0
                    }
                }
            }
        })
    };
    json!({
        "qubits": {
            "q1": qubit(0.05, 0.04, 0.05, 2e-4),
            "q2": qubit(-0.03, -0.02, -0.08, 3e-4)
        },
        "active_qubit_names": ["q1", "q2"],
        "thermalization_time": 4000,
        "network": {"host": "127.0.0.1", "cluster_name": "Cluster_1"}
    })
}

/// Response of the demo device to every node
///
/// Dispatches on the sweep axes present at the point: `amp` for DRAG,
/// `idle_time` for T2 echo, `prepared` for IQ blobs.
#[derive(Debug, Clone, PartialEq)]
pub struct DemoResponse {
    /// DRAG crossing per device index
    pub drag_crossings: Vec<f64>,
    /// Echo coherence time per device index, µs
    pub t2_echo_us: Vec<f64>,
    /// Ground and excited IQ centers per device index
    pub blobs: Vec<([f64; 2], [f64; 2])>,
    /// Blob width
    pub blob_sigma: f64,
}

impl Default for DemoResponse {
    fn default() -> Self {
        Self {
            drag_crossings: vec![0.8, 1.1],
            t2_echo_us: vec![12.0, 8.0],
            blobs: vec![([0.0, 0.0], [4e-4, 1e-4]), ([1e-4, 0.0], [1e-4, 6e-4])],
            blob_sigma: 5e-5,
        }
    }
}

fn pick<T: Copy>(values: &[T], index: usize, fallback: T) -> T {
    values.get(index).copied().unwrap_or(fallback)
}

impl ResponseModel for DemoResponse {
    fn respond(&self, point: &PointContext<'_>, rng: &mut dyn RngCore) -> f64 {
        let index = point.device_index;

        if let Some(amp) = point.coord(AMP_AXIS) {
            let crossing = pick(&self.drag_crossings, index, 1.0);
            let slope = match point.coord(SEQUENCE_AXIS) {
                Some(s) if s > 0.5 => -0.2,
                _ => 0.3,
            };
            return (0.5 + slope * (amp - crossing)).clamp(0.0, 1.0);
        }

        if let Some(cycles) = point.coord(IDLE_AXIS) {
            let t_us = 2.0 * timing::cycles_to_us(cycles);
            let coherence = (-t_us / pick(&self.t2_echo_us, index, 10.0)).exp();
            return match point.quantity {
                Quantity::State => 0.5 - 0.5 * coherence,
                Quantity::I => 1e-4 * (1.0 - coherence),
                Quantity::Q => 0.0,
            };
        }

        if point.coord(PREPARED_AXIS).is_some() {
            let (ground, excited) = pick(&self.blobs, index, ([0.0, 0.0], [1e-4, 0.0]));
            let center = if point.variant == 0 { ground } else { excited };
            let component = match point.quantity {
                Quantity::Q => center[1],
                Quantity::I | Quantity::State => center[0],
            };
            return component + self.blob_sigma * gaussian(rng);
        }

        0.0
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use qcal_state::{DeviceState, HardwareConfig, Qubit};

    #[test]
    fn test_demo_state_loads() {
        let state = DeviceState::from_value(demo_state()).unwrap();
        let active = Qubit::active(&state).unwrap();
        assert_eq!(active.len(), 2);

        let q2 = &active[1];
        assert_eq!(q2.operation_value(&state, "y90", "alpha").unwrap(), -0.08);
        let config = HardwareConfig::generate(&state).unwrap();
        assert_eq!(config.flux_elements(), vec!["q1.z", "q2.z"]);
    }

    #[test]
    fn test_drag_response_crosses() {
        let model = DemoResponse::default();
        let mut rng = rand::rngs::mock::StepRng::new(0, 1);
        let mut at = |sequence: f64| {
            let coords = [(SEQUENCE_AXIS, sequence), (AMP_AXIS, 0.8)];
            let point = PointContext {
                device: "q1",
                device_index: 0,
                quantity: Quantity::State,
                coords: &coords,
                variant: sequence as usize,
                shot: 0,
            };
            model.respond(&point, &mut rng)
        };
        assert_eq!(at(0.0), at(1.0));
    }
}
