//! Per-device fit results
//!
//! Gantree: L4_Fit → FitResult
//!
//! Exactly one [`DeviceFit`] per target device. A device whose fit failed
//! carries the reason and no parameters; other devices are unaffected.

use crate::error::FitError;
use log::warn;
use qcal_core::{QcalError, QcalResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Outcome of one device's fit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FitStatus {
    /// Parameters are valid
    Ok,
    /// Fit failed; no parameters
    FitFailed {
        /// Failure reason
        reason: String,
    },
}

/// Fit of one device
/// Gantree: DeviceFit // 장치별 피팅
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceFit {
    /// Device name
    pub device: String,
    /// Outcome
    pub status: FitStatus,
    /// Named parameters
    pub parameters: BTreeMap<String, f64>,
    /// Standard errors, by parameter name
    pub uncertainties: BTreeMap<String, f64>,
}

impl DeviceFit {
    /// Successful fit with no parameters yet
    pub fn ok(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            status: FitStatus::Ok,
            parameters: BTreeMap::new(),
            uncertainties: BTreeMap::new(),
        }
    }

    /// Failed fit
    pub fn failed(device: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            status: FitStatus::FitFailed {
                reason: reason.into(),
            },
            parameters: BTreeMap::new(),
            uncertainties: BTreeMap::new(),
        }
    }

    /// Add a parameter
    pub fn with_parameter(mut self, name: &str, value: f64) -> Self {
        self.parameters.insert(name.to_string(), value);
        self
    }

    /// Add a parameter with its standard error
    pub fn with_estimate(mut self, name: &str, value: f64, err: f64) -> Self {
        self.parameters.insert(name.to_string(), value);
        self.uncertainties.insert(name.to_string(), err);
        self
    }

    /// Did the fit succeed
    pub fn is_ok(&self) -> bool {
        self.status == FitStatus::Ok
    }

    /// Parameter value
    pub fn parameter(&self, name: &str) -> Option<f64> {
        self.parameters.get(name).copied()
    }

    /// Parameter value or an error naming the device
    pub fn require(&self, name: &str) -> QcalResult<f64> {
        match &self.status {
            FitStatus::FitFailed { reason } => Err(QcalError::FitFailed {
                device: self.device.clone(),
                reason: reason.clone(),
            }),
            FitStatus::Ok => self.parameter(name).ok_or_else(|| QcalError::FitFailed {
                device: self.device.clone(),
                reason: format!("no parameter '{}'", name),
            }),
        }
    }

    /// Failure reason, if any
    pub fn failure(&self) -> Option<&str> {
        match &self.status {
            FitStatus::FitFailed { reason } => Some(reason),
            FitStatus::Ok => None,
        }
    }

    /// Downgrade to a failure if any parameter is not finite
    fn checked(self) -> Self {
        let bad = self
            .parameters
            .iter()
            .find(|(_, v)| !v.is_finite())
            .map(|(k, _)| k.clone());
        match bad {
            Some(name) if self.is_ok() => {
                let device = self.device.clone();
                DeviceFit::failed(device, format!("parameter '{}' not finite", name))
            }
            _ => self,
        }
    }
}

/// Fits of every target device
/// Gantree: FitResult // 피팅 결과
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FitResult {
    fits: Vec<DeviceFit>,
}

impl FitResult {
    /// Fit every device with `fit`; errors become per-device failures
    /// Gantree: per_device(devices,fit) -> FitResult // 장치별 피팅
    pub fn per_device<S, F>(devices: &[S], mut fit: F) -> Self
    where
        S: AsRef<str>,
        F: FnMut(&str) -> Result<DeviceFit, FitError>,
    {
        let fits = devices
            .iter()
            .map(|d| {
                let device = d.as_ref();
                let result = match fit(device) {
                    Ok(f) => f.checked(),
                    Err(e) => DeviceFit::failed(device, e.to_string()),
                };
                if let Some(reason) = result.failure() {
                    warn!("Fit failed for {}: {}", device, reason);
                }
                result
            })
            .collect();
        Self { fits }
    }

    /// Fit of one device
    pub fn get(&self, device: &str) -> Option<&DeviceFit> {
        self.fits.iter().find(|f| f.device == device)
    }

    /// All fits in target order
    pub fn iter(&self) -> impl Iterator<Item = &DeviceFit> {
        self.fits.iter()
    }

    /// Number of devices
    pub fn len(&self) -> usize {
        self.fits.len()
    }

    /// No devices
    pub fn is_empty(&self) -> bool {
        self.fits.is_empty()
    }

    /// Devices whose fit failed
    pub fn failed_devices(&self) -> Vec<&str> {
        self.fits
            .iter()
            .filter(|f| !f.is_ok())
            .map(|f| f.device.as_str())
            .collect()
    }

    /// Number of successful fits
    pub fn success_count(&self) -> usize {
        self.fits.iter().filter(|f| f.is_ok()).count()
    }
}

impl fmt::Display for FitResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FitResult({}/{} ok)", self.success_count(), self.len())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_fit_per_device() {
        let result = FitResult::per_device(&["q1", "q2", "q3"], |d| match d {
            "q2" => Err(FitError::NonFinite),
            "q3" => Ok(DeviceFit::ok(d).with_parameter("alpha", f64::NAN)),
            _ => Ok(DeviceFit::ok(d).with_estimate("alpha", 0.8, 0.01)),
        });

        assert_eq!(result.len(), 3);
        assert_eq!(result.failed_devices(), vec!["q2", "q3"]);
        assert_eq!(result.get("q1").unwrap().require("alpha").unwrap(), 0.8);
        assert!(result.get("q3").unwrap().parameters.is_empty());
        assert!(matches!(
            result.get("q2").unwrap().require("alpha"),
            Err(QcalError::FitFailed { .. })
        ));
        assert_eq!(result.to_string(), "FitResult(1/3 ok)");
    }

    #[test]
    fn test_status_serialization() {
        let fit = DeviceFit::failed("q1", "lines are parallel");
        let json = serde_json::to_value(&fit).unwrap();
        assert_eq!(json["status"]["status"], "fit_failed");
        assert_eq!(json["status"]["reason"], "lines are parallel");
    }
}
