//! Device-state document
//!
//! Gantree: L1_State → DeviceState
//!
//! The device state is kept as the JSON tree it was loaded from, so fields this
//! crate knows nothing about survive a load/save cycle untouched (key order
//! included). References are resolved lazily on read and checked once, for
//! dangling targets and cycles, at load time.

use crate::path::{Reference, StatePath};
use log::{debug, info};
use qcal_core::{defaults, QcalError, QcalResult};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

/// Key holding the per-qubit subtrees
pub const QUBITS_KEY: &str = "qubits";

/// Key holding the names of the active qubits
pub const ACTIVE_QUBITS_KEY: &str = "active_qubit_names";

/// Persisted device state
/// Gantree: DeviceState // 장치 상태 트리
#[derive(Debug, Clone)]
pub struct DeviceState {
    /// Raw document
    root: Value,

    /// File the state was loaded from
    source: Option<PathBuf>,

    /// Tracked updates not yet reverted or committed
    outstanding: usize,
}

impl PartialEq for DeviceState {
    fn eq(&self, other: &Self) -> bool {
        self.root == other.root
    }
}

impl DeviceState {
    // ========================================================================
    // Constructors
    // ========================================================================

    /// Load from a JSON file
    /// Gantree: load(path) -> QcalResult<Self> // 상태 로드
    pub fn load(path: impl AsRef<Path>) -> QcalResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| QcalError::StateLoad(format!("{}: {}", path.display(), e)))?;
        let root: Value = serde_json::from_str(&content)
            .map_err(|e| QcalError::StateLoad(format!("{}: {}", path.display(), e)))?;

        let mut state = Self::from_value(root)?;
        state.source = Some(path.to_path_buf());
        info!("Loaded device state from {}", path.display());
        Ok(state)
    }

    /// Build from an in-memory document, validating structure and references
    pub fn from_value(root: Value) -> QcalResult<Self> {
        let state = Self {
            root,
            source: None,
            outstanding: 0,
        };
        state.validate()?;
        Ok(state)
    }

    /// Default state path: `$QCAL_STATE_PATH`, else `~/.qcal/state.json`
    pub fn default_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(defaults::STATE_PATH_ENV) {
            return Some(PathBuf::from(path));
        }
        dirs::home_dir().map(|home| home.join(defaults::HOME_DIR_NAME).join("state.json"))
    }

    // ========================================================================
    // Validation
    // ========================================================================

    fn validate(&self) -> QcalResult<()> {
        let root = self
            .root
            .as_object()
            .ok_or_else(|| QcalError::StateLoad("document root must be an object".into()))?;

        let qubits = root
            .get(QUBITS_KEY)
            .and_then(Value::as_object)
            .ok_or_else(|| QcalError::StateLoad(format!("missing '{}' section", QUBITS_KEY)))?;

        for (name, qubit) in qubits {
            if !qubit.is_object() {
                return Err(QcalError::StateLoad(format!(
                    "qubit entry '{}' must be an object",
                    name
                )));
            }
        }

        if let Some(active) = root.get(ACTIVE_QUBITS_KEY) {
            let names = active.as_array().ok_or_else(|| {
                QcalError::StateLoad(format!("'{}' must be a list", ACTIVE_QUBITS_KEY))
            })?;
            for name in names {
                let name = name.as_str().ok_or_else(|| {
                    QcalError::StateLoad(format!("'{}' entries must be strings", ACTIVE_QUBITS_KEY))
                })?;
                if !qubits.contains_key(name) {
                    return Err(QcalError::StateLoad(format!(
                        "active qubit '{}' has no entry under '{}'",
                        name, QUBITS_KEY
                    )));
                }
            }
        }

        let mut references = Vec::new();
        collect_references(&self.root, &StatePath::root(), &mut references);
        debug!("Checking {} references", references.len());
        for path in references {
            self.concrete_path(&path)
                .map_err(|e| QcalError::StateLoad(e.to_string()))?;
        }

        Ok(())
    }

    // ========================================================================
    // Resolution
    // ========================================================================

    /// Raw node at `path`, references not followed
    pub fn raw(&self, path: &StatePath) -> Option<&Value> {
        path.segments()
            .iter()
            .try_fold(&self.root, |node, seg| node.as_object()?.get(seg))
    }

    /// Concrete location of `path` with every reference along the way followed
    /// Gantree: concrete_path(path) -> StatePath // 참조 해석
    pub fn concrete_path(&self, path: &StatePath) -> QcalResult<StatePath> {
        let mut visited = Vec::new();
        self.concrete_with(path, &mut visited)
    }

    fn concrete_with(&self, path: &StatePath, visited: &mut Vec<StatePath>) -> QcalResult<StatePath> {
        let mut current = StatePath::root();
        for seg in path.segments() {
            current = current.child(seg.as_str());
            let node = self
                .raw(&current)
                .ok_or_else(|| QcalError::AttributeNotFound(current.to_string()))?;

            if let Some(reference) = node.as_str().and_then(Reference::parse) {
                if visited.contains(&current) {
                    return Err(QcalError::ReferenceCycle(current.to_string()));
                }
                visited.push(current.clone());

                let target = reference.target_from(&current)?;
                current = self.concrete_with(&target, visited).map_err(|e| match e {
                    QcalError::AttributeNotFound(missing) => QcalError::InvalidReference {
                        path: current.to_string(),
                        reference: reference.to_string(),
                        reason: format!("{} does not exist", missing),
                    },
                    other => other,
                })?;
            }
        }
        Ok(current)
    }

    /// Resolved value at `path`
    /// Gantree: get(path) -> QcalResult<Value> // 값 조회
    pub fn get(&self, path: &StatePath) -> QcalResult<&Value> {
        let concrete = self.concrete_path(path)?;
        self.raw(&concrete)
            .ok_or_else(|| QcalError::AttributeNotFound(concrete.to_string()))
    }

    /// Resolved numeric value
    pub fn get_f64(&self, path: &StatePath) -> QcalResult<f64> {
        let value = self.get(path)?;
        value.as_f64().ok_or_else(|| {
            QcalError::StateLoad(format!("{} is not a number: {}", path, value))
        })
    }

    /// Resolved string value
    pub fn get_str(&self, path: &StatePath) -> QcalResult<&str> {
        let value = self.get(path)?;
        value.as_str().ok_or_else(|| {
            QcalError::StateLoad(format!("{} is not a string: {}", path, value))
        })
    }

    /// Object with every member resolved (one level deep)
    pub fn get_resolved_object(&self, path: &StatePath) -> QcalResult<Map<String, Value>> {
        let concrete = self.concrete_path(path)?;
        let object = self
            .raw(&concrete)
            .and_then(Value::as_object)
            .ok_or_else(|| QcalError::StateLoad(format!("{} is not an object", path)))?;

        let mut resolved = Map::new();
        for key in object.keys() {
            let value = self.get(&concrete.child(key.as_str()))?;
            resolved.insert(key.clone(), value.clone());
        }
        Ok(resolved)
    }

    /// Does `path` resolve to an existing node
    pub fn contains(&self, path: &StatePath) -> bool {
        self.get(path).is_ok()
    }

    // ========================================================================
    // Mutation
    // ========================================================================

    /// Write `value` at the concrete location `path` resolves to
    ///
    /// If the attribute holds a reference the write lands on its target, so
    /// shared attributes stay shared. Returns the concrete path and the
    /// previous raw value.
    /// Gantree: set(path,value) -> (StatePath,Option<Value>) // 값 갱신
    pub fn set(&mut self, path: &StatePath, value: Value) -> QcalResult<(StatePath, Option<Value>)> {
        let target = match self.concrete_path(path) {
            Ok(concrete) => concrete,
            Err(QcalError::AttributeNotFound(_)) => {
                // New attribute: parent must exist
                let parent = path
                    .parent()
                    .ok_or_else(|| QcalError::Internal("cannot replace the document root".into()))?;
                let name = path.name().unwrap_or_default().to_string();
                self.concrete_path(&parent)?.child(name)
            }
            Err(e) => return Err(e),
        };
        let previous = self.set_raw(&target, Some(value))?;
        Ok((target, previous))
    }

    /// Write or remove the raw node at `path` without following references
    ///
    /// `None` removes the attribute. Returns the previous raw value.
    pub fn set_raw(&mut self, path: &StatePath, value: Option<Value>) -> QcalResult<Option<Value>> {
        let parent = path
            .parent()
            .ok_or_else(|| QcalError::Internal("cannot replace the document root".into()))?;
        let name = path.name().unwrap_or_default();

        let object = parent
            .segments()
            .iter()
            .try_fold(&mut self.root, |node, seg| node.as_object_mut()?.get_mut(seg))
            .and_then(Value::as_object_mut)
            .ok_or_else(|| QcalError::AttributeNotFound(parent.to_string()))?;

        let previous = match value {
            Some(v) => object.insert(name.to_string(), v),
            None => object.shift_remove(name),
        };
        Ok(previous)
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    /// Save to `path` (write to a temporary sibling, then rename)
    /// Gantree: save(path) -> QcalResult<()> // 상태 저장
    pub fn save(&self, path: impl AsRef<Path>) -> QcalResult<()> {
        if self.outstanding > 0 {
            return Err(QcalError::PendingOverride(self.outstanding));
        }
        let path = path.as_ref();
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)?;
            }
        }
        let content = serde_json::to_string_pretty(&self.root)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, content)?;
        fs::rename(&tmp, path)?;
        info!("Saved device state to {}", path.display());
        Ok(())
    }

    /// Save back to the file the state was loaded from
    pub fn save_in_place(&self) -> QcalResult<()> {
        let source = self
            .source
            .clone()
            .ok_or_else(|| QcalError::File("device state has no source file".into()))?;
        self.save(source)
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Raw document
    pub fn document(&self) -> &Value {
        &self.root
    }

    /// File the state was loaded from
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Number of tracked updates still open
    pub fn outstanding_overrides(&self) -> usize {
        self.outstanding
    }

    pub(crate) fn open_override(&mut self) {
        self.outstanding += 1;
    }

    pub(crate) fn close_override(&mut self) {
        self.outstanding = self.outstanding.saturating_sub(1);
    }
}

/// Collect the paths of every string leaf that parses as a reference
fn collect_references(node: &Value, path: &StatePath, out: &mut Vec<StatePath>) {
    match node {
        Value::Object(map) => {
            for (key, child) in map {
                collect_references(child, &path.child(key.as_str()), out);
            }
        }
        Value::Array(items) => {
            for (i, child) in items.iter().enumerate() {
                // Array members cannot be addressed; only nested objects are walked
                if child.is_object() || child.is_array() {
                    collect_references(child, &path.child(i.to_string()), out);
                }
            }
        }
        Value::String(s) => {
            if Reference::parse(s).is_some() {
                out.push(path.clone());
            }
        }
        _ => {}
    }
}

// ============================================================================
// Tests
// ============================================================================
