//! State update policy
//!
//! Gantree: L5_Node → Update
//!
//! Proposals from every device are gathered after all fits finished, grouped
//! by the concrete attribute they land on (references followed) and then
//! either applied or withheld:
//!
//! - a device whose fit failed proposes `None` and writes nothing;
//! - a target shared by several devices is withheld if any contributor failed;
//! - a shared target is withheld if the contributors disagree.

use log::{info, warn};
use qcal_core::{fit::SHARED_VALUE_TOL, QcalError, QcalResult};
use qcal_state::{DeviceState, StatePath};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// One attribute change proposed by one device's fit
/// Gantree: Proposal // 갱신 제안
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    /// Proposing device
    pub device: String,
    /// Attribute path as addressed by the device (may hold a reference)
    pub path: StatePath,
    /// New value; `None` when the device's fit failed
    pub value: Option<Value>,
}

impl Proposal {
    /// Create a proposal
    pub fn new(device: impl Into<String>, path: StatePath, value: Option<Value>) -> Self {
        Self {
            device: device.into(),
            path,
            value,
        }
    }

    /// Numeric proposal from an optional fit parameter
    pub fn number(device: impl Into<String>, path: StatePath, value: Option<f64>) -> Self {
        Self::new(device, path, value.map(Value::from))
    }
}

/// What happens to one concrete target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum UpdateDecision {
    /// Value is written
    Apply,
    /// Value is left untouched
    Withhold {
        /// Why
        reason: String,
    },
}

/// Planned change of one concrete attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedUpdate {
    /// Concrete attribute path
    pub target: StatePath,
    /// Devices whose proposals land here
    pub contributors: Vec<String>,
    /// Value written when applied
    pub value: Value,
    /// Decision
    pub decision: UpdateDecision,
}

impl PlannedUpdate {
    /// Will this change be written
    pub fn is_applied(&self) -> bool {
        self.decision == UpdateDecision::Apply
    }
}

/// Every planned change of one run
/// Gantree: UpdatePlan // 갱신 계획
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdatePlan {
    entries: Vec<PlannedUpdate>,
}

/// Concrete location a write to `path` lands on (new attributes included)
fn write_target(state: &DeviceState, path: &StatePath) -> QcalResult<StatePath> {
    match state.concrete_path(path) {
        Ok(concrete) => Ok(concrete),
        Err(QcalError::AttributeNotFound(_)) => {
            let parent = path
                .parent()
                .ok_or_else(|| QcalError::Internal("cannot replace the document root".into()))?;
            let name = path.name().unwrap_or_default().to_string();
            Ok(state.concrete_path(&parent)?.child(name))
        }
        Err(e) => Err(e),
    }
}

fn agree(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => (x - y).abs() <= SHARED_VALUE_TOL * x.abs().max(y.abs()).max(1.0),
        _ => a == b,
    }
}

impl UpdatePlan {
    /// Group proposals by concrete target and decide each group
    /// Gantree: build(state,proposals) -> QcalResult<UpdatePlan> // 갱신 계획 수립
    pub fn build(state: &DeviceState, proposals: &[Proposal]) -> QcalResult<Self> {
        // (target, [(device, value)]) in first-seen order
        let mut groups: Vec<(StatePath, Vec<(&str, Option<&Value>)>)> = Vec::new();
        for proposal in proposals {
            let target = write_target(state, &proposal.path)?;
            let entry = (proposal.device.as_str(), proposal.value.as_ref());
            match groups.iter_mut().find(|(t, _)| *t == target) {
                Some((_, members)) => members.push(entry),
                None => groups.push((target, vec![entry])),
            }
        }

        let mut entries = Vec::new();
        for (target, members) in groups {
            let values: Vec<&Value> = members.iter().filter_map(|(_, v)| *v).collect();
            let Some(first) = values.first().copied() else {
                continue;
            };
            let contributors: Vec<String> = members.iter().map(|(d, _)| d.to_string()).collect();

            let decision = if values.len() < members.len() {
                let failed: Vec<&str> = members
                    .iter()
                    .filter(|(_, v)| v.is_none())
                    .map(|(d, _)| *d)
                    .collect();
                UpdateDecision::Withhold {
                    reason: format!("contributor failed: {}", failed.join(", ")),
                }
            } else if values.iter().any(|v| !agree(first, v)) {
                UpdateDecision::Withhold {
                    reason: "conflicting values".to_string(),
                }
            } else {
                UpdateDecision::Apply
            };

            entries.push(PlannedUpdate {
                target,
                contributors,
                value: first.clone(),
                decision,
            });
        }
        Ok(Self { entries })
    }

    /// Write every applied change
    /// Gantree: apply(state) -> QcalResult<usize> // 갱신 적용
    pub fn apply(&self, state: &mut DeviceState) -> QcalResult<usize> {
        let mut written = 0;
        for entry in &self.entries {
            match &entry.decision {
                UpdateDecision::Apply => {
                    state.set(&entry.target, entry.value.clone())?;
                    info!("Updated {} = {}", entry.target, entry.value);
                    written += 1;
                }
                UpdateDecision::Withhold { reason } => {
                    warn!(
                        "Withheld update of {} from {}: {}",
                        entry.target,
                        entry.contributors.join(", "),
                        reason
                    );
                }
            }
        }
        Ok(written)
    }

    /// All planned changes
    pub fn entries(&self) -> &[PlannedUpdate] {
        &self.entries
    }

    /// Changes that will be written
    pub fn applied(&self) -> impl Iterator<Item = &PlannedUpdate> {
        self.entries.iter().filter(|e| e.is_applied())
    }

    /// Changes that will not be written
    pub fn withheld(&self) -> impl Iterator<Item = &PlannedUpdate> {
        self.entries.iter().filter(|e| !e.is_applied())
    }

    /// No changes at all
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for UpdatePlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "UpdatePlan({} applied, {} withheld)",
            self.applied().count(),
            self.withheld().count()
        )
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
                "q1": {"xy": {"operations": {"x180": {"alpha": "#/shared/alpha", "amplitude": 0.1}}}},
                "q2": {"xy": {"operations": {"x180": {"alpha": "#/shared/alpha", "amplitude": 0.2}}}},
                "q3": {"xy": {"operations": {"x180": {"alpha": 0.3, "amplitude": 0.3}}}}
            },
            "shared": {"alpha": -0.5}
        }))
        .unwrap()
    }

    fn alpha(device: &str) -> StatePath {
        StatePath::parse(&format!("qubits/{}/xy/operations/x180/alpha", device))
    }

    #[test]
    fn test_independent_targets_applied() {
        let mut s = state();
        let proposals = vec![Proposal::number("q3", alpha("q3"), Some(0.7))];
        let plan = UpdatePlan::build(&s, &proposals).unwrap();
        assert_eq!(plan.apply(&mut s).unwrap(), 1);
        assert_eq!(s.get_f64(&alpha("q3")).unwrap(), 0.7);
    }

    #[test]
    fn test_failed_device_writes_nothing() {
        let mut s = state();
        let before = s.document().clone();
        let proposals = vec![Proposal::number("q3", alpha("q3"), None)];
        let plan = UpdatePlan::build(&s, &proposals).unwrap();
        assert!(plan.is_empty());
        plan.apply(&mut s).unwrap();
        assert_eq!(s.document(), &before);
    }

    #[test]
    fn test_shared_target_with_failed_contributor_withheld() {
        let mut s = state();
        let proposals = vec![
            Proposal::number("q1", alpha("q1"), Some(0.4)),
            Proposal::number("q2", alpha("q2"), None),
        ];
        let plan = UpdatePlan::build(&s, &proposals).unwrap();
        assert_eq!(plan.entries().len(), 1);
        let entry = &plan.entries()[0];
        assert_eq!(entry.target, StatePath::parse("shared/alpha"));
        assert!(matches!(
            &entry.decision,
            UpdateDecision::Withhold { reason } if reason.contains("q2")
        ));
        assert_eq!(plan.apply(&mut s).unwrap(), 0);
        assert_eq!(s.get_f64(&alpha("q1")).unwrap(), -0.5);
    }

    #[test]
    fn test_shared_target_conflict_withheld() {
        let s = state();
        let proposals = vec![
            Proposal::number("q1", alpha("q1"), Some(0.4)),
            Proposal::number("q2", alpha("q2"), Some(0.41)),
        ];
        let plan = UpdatePlan::build(&s, &proposals).unwrap();
        assert_eq!(plan.withheld().count(), 1);
        assert_eq!(plan.to_string(), "UpdatePlan(0 applied, 1 withheld)");
    }

    #[test]
    fn test_shared_target_agreement_applied_once() {
        let mut s = state();
        let proposals = vec![
            Proposal::number("q1", alpha("q1"), Some(0.4)),
            Proposal::number("q2", alpha("q2"), Some(0.4)),
        ];
        let plan = UpdatePlan::build(&s, &proposals).unwrap();
        assert_eq!(plan.apply(&mut s).unwrap(), 1);
        assert_eq!(s.get_f64(&alpha("q2")).unwrap(), 0.4);
        // Reference kept intact
        assert_eq!(
            s.raw(&alpha("q1")).unwrap(),
            &json!("#/shared/alpha")
        );
    }

    #[test]
    fn test_new_attribute_target() {
        let mut s = state();
        let path = StatePath::parse("qubits/q3/xy/operations/x180/beta");
        let plan = UpdatePlan::build(&s, &[Proposal::number("q3", path.clone(), Some(1.0))]).unwrap();
        plan.apply(&mut s).unwrap();
        assert_eq!(s.get_f64(&path).unwrap(), 1.0);
    }
}
