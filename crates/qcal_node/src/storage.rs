//! Run artifact storage
//!
//! Gantree: L5_Node → Storage
//!
//! Every run gets its own folder `<root>/<YYYY-MM-DD>/#<n>_<node>_<HHMMSS>/`.
//! The run index `n` is one above the highest index found under any date
//! folder, so indices keep increasing across days.

use chrono::{DateTime, Local};
use log::{debug, info};
use qcal_core::{defaults, QcalError, QcalResult};
use serde::Serialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Artifact file names
pub mod files {
    /// Assembled dataset
    pub const DATASET: &str = "ds.json";
    /// Per-device fits
    pub const FIT_RESULTS: &str = "fit_results.json";
    /// Per-device fits, flat table
    pub const FIT_RESULTS_CSV: &str = "fit_results.csv";
    /// Parameters, outcome and timestamps
    pub const NODE: &str = "node.json";
    /// Device-state snapshot after the run
    pub const STATE: &str = "state.json";
    /// Human-readable summary
    pub const REPORT: &str = "report.md";
    /// Offline simulation traces
    pub const SIMULATED_SAMPLES: &str = "simulated_samples.json";
}

/// Root of all run folders
/// Gantree: RunStorage // 산출물 저장소
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunStorage {
    root: PathBuf,
}

/// Folder of one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunFolder {
    path: PathBuf,
    index: u64,
}

/// Index of a run folder name `#<n>_...`
fn run_index(name: &str) -> Option<u64> {
    name.strip_prefix('#')?.split('_').next()?.parse().ok()
}

impl RunStorage {
    /// Storage under `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `QCAL_DATA_DIR`, else `~/.qcal/data`
    pub fn from_env() -> QcalResult<Self> {
        if let Ok(dir) = env::var(defaults::DATA_DIR_ENV) {
            if !dir.trim().is_empty() {
                return Ok(Self::new(dir));
            }
        }
        dirs::home_dir()
            .map(|home| Self::new(home.join(defaults::HOME_DIR_NAME).join("data")))
            .ok_or_else(|| {
                QcalError::config(format!(
                    "no home directory; set {} to choose a data folder",
                    defaults::DATA_DIR_ENV
                ))
            })
    }

    /// Root folder
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Highest run index stored so far (0 if none)
    pub fn last_index(&self) -> QcalResult<u64> {
        if !self.root.is_dir() {
            return Ok(0);
        }
        let mut last = 0;
        for day in fs::read_dir(&self.root)? {
            let day = day?;
            if !day.file_type()?.is_dir() {
                continue;
            }
            for run in fs::read_dir(day.path())? {
                let run = run?;
                if let Some(index) = run.file_name().to_str().and_then(run_index) {
                    last = last.max(index);
                }
            }
        }
        Ok(last)
    }

    /// Create the folder of a new run
    /// Gantree: create_run(node,started) -> QcalResult<RunFolder> // 실행 폴더 생성
    pub fn create_run(&self, node: &str, started: DateTime<Local>) -> QcalResult<RunFolder> {
        let index = self.last_index()? + 1;
        let path = self
            .root
            .join(started.format("%Y-%m-%d").to_string())
            .join(format!("#{}_{}_{}", index, node, started.format("%H%M%S")));
        fs::create_dir_all(&path)
            .map_err(|e| QcalError::File(format!("{}: {}", path.display(), e)))?;
        info!("Run folder {}", path.display());
        Ok(RunFolder { path, index })
    }
}

impl RunFolder {
    /// Folder path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run index
    pub fn index(&self) -> u64 {
        self.index
    }

    /// Write a text artifact
    pub fn write_text(&self, name: &str, content: &str) -> QcalResult<PathBuf> {
        let file = self.path.join(name);
        fs::write(&file, content).map_err(|e| QcalError::File(format!("{}: {}", file.display(), e)))?;
        debug!("Wrote {}", file.display());
        Ok(file)
    }

    /// Write a JSON artifact
    pub fn write_json<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> QcalResult<PathBuf> {
        let content = serde_json::to_string_pretty(value)?;
        self.write_text(name, &content)
    }

    /// Names of the files written so far
    pub fn artifacts(&self) -> QcalResult<Vec<String>> {
        let mut names: Vec<String> = fs::read_dir(&self.path)?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .collect();
        names.sort();
        Ok(names)
    }
}

// ============================================================================
// Tests
// ============================================================================
