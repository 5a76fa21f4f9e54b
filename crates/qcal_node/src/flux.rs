//! Flux-point preparation
//!
//! Gantree: L5_Node → Flux
//!
//! DC offsets of every flux line in the device while one target is measured.
//!
//! | Flux point    | Target             | Other qubits   |
//! |---------------|--------------------|----------------|
//! | `independent` | independent offset | minimum offset |
//! | `joint`       | joint offset       | joint offset   |
//! | `arbitrary`   | joint offset       | joint offset   |
//!
//! Under `arbitrary` the extra offset is pulsed by the sequence itself.

use qcal_core::{FluxPoint, QcalResult};
use qcal_state::{DeviceState, Qubit};

/// `(flux element, offset)` for every flux line while measuring `target`
/// Gantree: flux_preparation(state,target,point) -> Vec<(String,f64)> // 플럭스 준비
pub fn flux_preparation(
    state: &DeviceState,
    target: &Qubit,
    point: FluxPoint,
) -> QcalResult<Vec<(String, f64)>> {
    let mut offsets = Vec::new();
    for qubit in Qubit::all(state) {
        if !qubit.has_flux_line(state) {
            continue;
        }
        let line = qubit.flux_offsets(state)?;
        let offset = match point {
            FluxPoint::Independent if qubit == *target => line.independent,
            FluxPoint::Independent => line.min,
            FluxPoint::Joint | FluxPoint::Arbitrary => line.joint,
        };
        offsets.push((qubit.z_element(), offset));
    }
    Ok(offsets)
}

/// Offset pulsed on the target during idles (zero unless `arbitrary`)
pub fn arbitrary_bias(state: &DeviceState, target: &Qubit, point: FluxPoint) -> QcalResult<f64> {
    match point {
        FluxPoint::Arbitrary => Ok(target.flux_offsets(state)?.arbitrary),
        FluxPoint::Independent | FluxPoint::Joint => Ok(0.0),
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
                "q1": {"z": {"independent_offset": 0.1, "joint_offset": 0.2, "min_offset": -0.3, "arbitrary_offset": 0.01}},
                "q2": {"z": {"independent_offset": 0.4, "joint_offset": 0.5, "min_offset": -0.6}},
                "q3": {}
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_independent_parks_others() {
        let s = state();
        let q1 = Qubit::lookup(&s, "q1").unwrap();
        let offsets = flux_preparation(&s, &q1, FluxPoint::Independent).unwrap();
        assert_eq!(
            offsets,
            vec![("q1.z".to_string(), 0.1), ("q2.z".to_string(), -0.6)]
        );
    }

    #[test]
    fn test_joint_and_arbitrary() {
        let s = state();
        let q2 = Qubit::lookup(&s, "q2").unwrap();
        for point in [FluxPoint::Joint, FluxPoint::Arbitrary] {
            let offsets = flux_preparation(&s, &q2, point).unwrap();
            assert_eq!(offsets[0].1, 0.2);
            assert_eq!(offsets[1].1, 0.5);
        }
    }

    #[test]
    fn test_arbitrary_bias() {
        let s = state();
        let q1 = Qubit::lookup(&s, "q1").unwrap();
        assert_eq!(arbitrary_bias(&s, &q1, FluxPoint::Arbitrary).unwrap(), 0.01);
        assert_eq!(arbitrary_bias(&s, &q1, FluxPoint::Joint).unwrap(), 0.0);
    }
}
