//! Result fetching
//!
//! Gantree: L3_Results → Fetcher
//!
//! Live polling of a running job and assembly of its final streams into a
//! [`Dataset`]. Polling is a single-threaded busy loop driven by the caller
//! through an iterator; it ends when the job stops processing.

use crate::array::{AxisSpec, Dataset, ResultArray};
use log::{debug, info};
use qcal_core::{Quantity, QcalError, QcalResult};
use qcal_runtime::{PartialRecord, ResultHandles, RunningJob, ITERATION_STREAM};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

// ============================================================================
// Progress
// ============================================================================

/// Percent steps at which the counter logs
pub const LOG_EVERY_PERCENT: u64 = 10;

/// One live update
/// Gantree: Progress // 진행 상황
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    /// Completed iterations
    pub iteration: u64,
    /// Total iterations
    pub total: u64,
    /// Time since polling started
    pub elapsed: Duration,
    /// Latest values of every polled field
    pub record: PartialRecord,
}

impl Progress {
    /// Completed fraction in `[0, 1]`
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        (self.iteration as f64 / self.total as f64).clamp(0.0, 1.0)
    }
}

/// Receives every live update; rendering is left to the caller
/// Gantree: ProgressObserver // 진행 관찰자
pub trait ProgressObserver {
    /// Called once per update, in order
    fn on_update(&self, progress: &Progress);
}

/// No rendering
impl ProgressObserver for () {
    fn on_update(&self, _progress: &Progress) {}
}

/// Progress counter logging milestones
/// Gantree: ProgressCounter // 진행 카운터
#[derive(Debug, Clone)]
pub struct ProgressCounter {
    total: u64,
    started: Instant,
    last_milestone: Option<u64>,
}

impl ProgressCounter {
    /// Start counting towards `total` iterations
    pub fn start(total: u64) -> Self {
        Self {
            total,
            started: Instant::now(),
            last_milestone: None,
        }
    }

    /// Build an update for `iteration` completed iterations
    pub fn update(&mut self, iteration: u64, record: PartialRecord) -> Progress {
        let progress = Progress {
            iteration,
            total: self.total,
            elapsed: self.started.elapsed(),
            record,
        };

        let milestone = Self::milestone(progress.fraction());
        if self.last_milestone.map_or(true, |last| milestone > last) {
            self.last_milestone = Some(milestone);
            info!("Progress {}% ({}/{})", milestone, iteration, self.total);
        }
        progress
    }

    /// Completed fraction rounded down to a logging step
    pub fn milestone(fraction: f64) -> u64 {
        let percent = (fraction.clamp(0.0, 1.0) * 100.0).floor() as u64;
        percent - percent % LOG_EVERY_PERCENT
    }

    /// Time since start
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

// ============================================================================
// Live Polling
// ============================================================================

/// Iterator over live updates of a running job
/// Gantree: LivePoll // 실시간 폴링
pub struct LivePoll<'j> {
    job: &'j mut dyn RunningJob,
    fields: Vec<String>,
    counter: ProgressCounter,
    updates: usize,
    done: bool,
}

impl LivePoll<'_> {
    /// Updates yielded so far
    pub fn updates(&self) -> usize {
        self.updates
    }
}

impl Iterator for LivePoll<'_> {
    type Item = QcalResult<Progress>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if !self.job.is_processing() {
            self.done = true;
            info!(
                "Job {} finished after {} update(s) in {:.1}s",
                self.job.id(),
                self.updates,
                self.counter.elapsed().as_secs_f64()
            );
            return None;
        }

        match self.job.fetch_partial(&self.fields) {
            Ok(record) => {
                let iteration = record.get(ITERATION_STREAM).unwrap_or(0.0).max(0.0) as u64;
                self.updates += 1;
                Some(Ok(self.counter.update(iteration, record)))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Poll a running job until it stops processing
/// Gantree: poll_live(job,fields,total) -> LivePoll // 실시간 폴링
pub fn poll_live<'j>(job: &'j mut dyn RunningJob, fields: &[String], total: u64) -> LivePoll<'j> {
    debug!("Polling job {} for {:?}", job.id(), fields);
    LivePoll {
        job,
        fields: fields.to_vec(),
        counter: ProgressCounter::start(total),
        updates: 0,
        done: false,
    }
}

/// Drain the poller, keeping the last update
pub fn wait_for_completion(poll: LivePoll<'_>) -> QcalResult<Option<Progress>> {
    wait_observed(poll, &())
}

/// Drain the poller, handing every update to `observer`
/// Gantree: wait_observed(poll,observer) -> QcalResult<Option<Progress>> // 관찰 대기
pub fn wait_observed(
    poll: LivePoll<'_>,
    observer: &dyn ProgressObserver,
) -> QcalResult<Option<Progress>> {
    let mut last = None;
    for update in poll {
        let progress = update?;
        observer.on_update(&progress);
        last = Some(progress);
    }
    Ok(last)
}

// ============================================================================
// Assembly
// ============================================================================

/// Reshape final streams into one labeled array per quantity
/// Gantree: assemble(handles,devices,axes,quantities) -> QcalResult<Dataset> // 결과 조립
pub fn assemble(
    handles: &ResultHandles,
    devices: &[String],
    axes: &[AxisSpec],
    quantities: &[Quantity],
) -> QcalResult<Dataset> {
    let mut dataset = Dataset::new();
    for quantity in quantities {
        let buffers = devices
            .iter()
            .enumerate()
            .map(|(i, _)| {
                let stream = quantity.stream_name(i);
                handles.get(&stream).ok_or(QcalError::MissingStream(stream))
            })
            .collect::<QcalResult<Vec<_>>>()?;

        let array = ResultArray::from_buffers(*quantity, devices, axes, &buffers)?;
        debug!("Assembled {}", array);
        dataset.insert(array);
    }
    Ok(dataset)
}

// ============================================================================
// Tests
// ============================================================================
