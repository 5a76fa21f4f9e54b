//! Labeled result arrays
//!
//! Gantree: L3_Results → ResultArray
//!
//! Axis order is fixed: `qubit` first, then the sweep axes in loop nesting
//! order (outermost first). The innermost axis varies fastest in the flat
//! stream buffers, so reshaping is plain row-major.

use ndarray::{ArrayD, ArrayViewD, Axis, IxDyn};
use qcal_core::{Quantity, QcalError, QcalResult};
use qcal_runtime::SweepAxis;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Name of the leading device axis
pub const QUBIT_AXIS: &str = "qubit";

/// Coordinates along one axis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Coords {
    /// Numeric coordinates (amplitude factors, idle times)
    Numeric(Vec<f64>),
    /// Labels (device names, sequence names)
    Labels(Vec<String>),
}

impl Coords {
    /// Number of coordinates
    pub fn len(&self) -> usize {
        match self {
            Coords::Numeric(v) => v.len(),
            Coords::Labels(v) => v.len(),
        }
    }

    /// No coordinates
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Numeric coordinates, if any
    pub fn as_numeric(&self) -> Option<&[f64]> {
        match self {
            Coords::Numeric(v) => Some(v),
            Coords::Labels(_) => None,
        }
    }
}

/// Named axis with coordinates
/// Gantree: AxisSpec // 축 정의
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisSpec {
    /// Axis name
    pub name: String,
    /// Coordinates
    pub coords: Coords,
}

impl AxisSpec {
    /// Numeric axis
    pub fn numeric(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            coords: Coords::Numeric(values),
        }
    }

    /// Labeled axis
    pub fn labels<S: Into<String>>(name: impl Into<String>, labels: impl IntoIterator<Item = S>) -> Self {
        Self {
            name: name.into(),
            coords: Coords::Labels(labels.into_iter().map(Into::into).collect()),
        }
    }

    /// Number of points
    pub fn len(&self) -> usize {
        self.coords.len()
    }

    /// No points
    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }
}

impl From<&SweepAxis> for AxisSpec {
    fn from(axis: &SweepAxis) -> Self {
        AxisSpec::numeric(axis.name.clone(), axis.values.clone())
    }
}

/// One quantity over devices and sweep axes
/// Gantree: ResultArray // 결과 배열
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultArray {
    quantity: Quantity,
    axes: Vec<AxisSpec>,
    data: ArrayD<f64>,
}

impl ResultArray {
    /// Build from one flat buffer per device
    /// Gantree: from_buffers(quantity,devices,axes,buffers) -> QcalResult<Self> // 재구성
    pub fn from_buffers(
        quantity: Quantity,
        devices: &[String],
        sweep_axes: &[AxisSpec],
        buffers: &[&[f64]],
    ) -> QcalResult<Self> {
        if devices.len() != buffers.len() {
            return Err(QcalError::Internal(format!(
                "{} device(s) but {} buffer(s)",
                devices.len(),
                buffers.len()
            )));
        }
        let points: usize = sweep_axes.iter().map(AxisSpec::len).product();

        let mut flat = Vec::with_capacity(points * devices.len());
        for (i, buffer) in buffers.iter().enumerate() {
            if buffer.len() != points {
                return Err(QcalError::ShapeMismatch {
                    stream: quantity.stream_name(i),
                    expected: points,
                    actual: buffer.len(),
                });
            }
            flat.extend_from_slice(buffer);
        }

        let mut axes = Vec::with_capacity(sweep_axes.len() + 1);
        axes.push(AxisSpec::labels(QUBIT_AXIS, devices.iter().cloned()));
        axes.extend(sweep_axes.iter().cloned());

        let shape: Vec<usize> = axes.iter().map(AxisSpec::len).collect();
        let data = ArrayD::from_shape_vec(IxDyn(&shape), flat)
            .map_err(|e| QcalError::Internal(format!("reshape failed: {}", e)))?;

        Ok(Self { quantity, axes, data })
    }

    /// Quantity stored
    pub fn quantity(&self) -> Quantity {
        self.quantity
    }

    /// Axes, `qubit` first
    pub fn axes(&self) -> &[AxisSpec] {
        &self.axes
    }

    /// Axis by name
    pub fn axis(&self, name: &str) -> Option<&AxisSpec> {
        self.axes.iter().find(|a| a.name == name)
    }

    /// Array shape
    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    /// Underlying array
    pub fn data(&self) -> &ArrayD<f64> {
        &self.data
    }

    /// Device names along the qubit axis
    pub fn devices(&self) -> Vec<&str> {
        match self.axes.first().map(|a| &a.coords) {
            Some(Coords::Labels(labels)) => labels.iter().map(String::as_str).collect(),
            _ => Vec::new(),
        }
    }

    /// Sub-array of one device
    pub fn device(&self, name: &str) -> Option<ArrayViewD<'_, f64>> {
        let index = self.devices().iter().position(|d| *d == name)?;
        Some(self.data.index_axis(Axis(0), index))
    }

    /// Sub-array of one device with one sweep axis fixed at `index`
    pub fn device_at(&self, name: &str, axis: &str, index: usize) -> Option<ArrayViewD<'_, f64>> {
        let position = self.axes.iter().position(|a| a.name == axis)?;
        if position == 0 || index >= self.axes[position].len() {
            return None;
        }
        let view = self.device(name)?;
        Some(view.index_axis_move(Axis(position - 1), index))
    }

    /// Flat buffers per device, the inverse of [`ResultArray::from_buffers`]
    pub fn flatten(&self) -> Vec<Vec<f64>> {
        self.data
            .axis_iter(Axis(0))
            .map(|device| device.iter().copied().collect())
            .collect()
    }
}

impl fmt::Display for ResultArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dims: Vec<String> = self
            .axes
            .iter()
            .map(|a| format!("{}: {}", a.name, a.len()))
            .collect();
        write!(f, "{}[{}]", self.quantity, dims.join(", "))
    }
}

/// Result arrays of one run, keyed by quantity
/// Gantree: Dataset // 데이터셋
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    arrays: BTreeMap<Quantity, ResultArray>,
}

impl Dataset {
    /// Empty dataset
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an array
    pub fn insert(&mut self, array: ResultArray) {
        self.arrays.insert(array.quantity(), array);
    }

    /// Array of a quantity
    pub fn get(&self, quantity: Quantity) -> Option<&ResultArray> {
        self.arrays.get(&quantity)
    }

    /// Array of a quantity, or a missing-stream error
    pub fn require(&self, quantity: Quantity) -> QcalResult<&ResultArray> {
        self.get(quantity)
            .ok_or_else(|| QcalError::MissingStream(quantity.to_string()))
    }

    /// Quantities present
    pub fn quantities(&self) -> impl Iterator<Item = Quantity> + '_ {
        self.arrays.keys().copied()
    }

    /// Number of arrays
    pub fn len(&self) -> usize {
        self.arrays.len()
    }

    /// No arrays
    pub fn is_empty(&self) -> bool {
        self.arrays.is_empty()
    }

    /// Pretty JSON
    pub fn to_json(&self) -> QcalResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn devices(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("q{}", i)).collect()
    }

    #[test]
    fn test_innermost_axis_fastest() {
        let axes = vec![
            AxisSpec::labels("sequence", ["x180_y90", "y180_x90"]),
            AxisSpec::numeric("amp", vec![0.1, 0.2, 0.3]),
        ];
        let buffer: Vec<f64> = (0..6).map(f64::from).collect();
        let array =
            ResultArray::from_buffers(Quantity::State, &devices(1), &axes, &[buffer.as_slice()]).unwrap();

        assert_eq!(array.shape(), &[1, 2, 3]);
        assert_eq!(array.data()[[0, 0, 2]], 2.0);
        assert_eq!(array.data()[[0, 1, 0]], 3.0);

        let second = array.device_at("q1", "sequence", 1).unwrap();
        assert_eq!(second.iter().copied().collect::<Vec<_>>(), vec![3.0, 4.0, 5.0]);
        assert!(array.device_at("q1", "amp", 3).is_none());
        assert_eq!(array.to_string(), "state[qubit: 1, sequence: 2, amp: 3]");
    }

    #[test]
    fn test_shape_mismatch_names_stream() {
        let axes = vec![AxisSpec::numeric("t", vec![1.0, 2.0, 3.0])];
        let good = [1.0, 2.0, 3.0];
        let short = [1.0, 2.0];
        let err = ResultArray::from_buffers(Quantity::I, &devices(2), &axes, &[&good[..], &short[..]])
            .unwrap_err();
        assert_eq!(
            err,
            QcalError::ShapeMismatch {
                stream: "I2".into(),
                expected: 3,
                actual: 2
            }
        );
    }

    #[test]
    fn test_dataset_lookup() {
        let axes = vec![AxisSpec::numeric("t", vec![1.0])];
        let mut ds = Dataset::new();
        ds.insert(ResultArray::from_buffers(Quantity::I, &devices(1), &axes, &[&[0.5][..]]).unwrap());
        assert!(ds.get(Quantity::I).is_some());
        assert!(matches!(ds.require(Quantity::Q), Err(QcalError::MissingStream(_))));
        assert_eq!(ds.quantities().collect::<Vec<_>>(), vec![Quantity::I]);
        assert!(ds.to_json().unwrap().contains("\"qubit\""));
    }

    proptest! {
        #[test]
        fn prop_flatten_inverts_reshape(
            dims in proptest::collection::vec(1usize..4, 0..4),
            n_devices in 1usize..4,
        ) {
            let axes: Vec<AxisSpec> = dims
                .iter()
                .enumerate()
                .map(|(k, &n)| AxisSpec::numeric(format!("a{}", k), (0..n).map(|i| i as f64).collect()))
                .collect();
            let points: usize = dims.iter().product();
            let buffers: Vec<Vec<f64>> = (0..n_devices)
                .map(|d| (0..points).map(|i| (d * 1000 + i) as f64).collect())
                .collect();
            let refs: Vec<&[f64]> = buffers.iter().map(Vec::as_slice).collect();

            let array = ResultArray::from_buffers(Quantity::State, &devices(n_devices), &axes, &refs).unwrap();
            prop_assert_eq!(array.flatten(), buffers);
        }
    }
}
