//! Tracked (reversible) updates
//!
//! Gantree: L1_State → TrackedUpdate
//!
//! A tracked update remembers the raw value of every attribute it touches
//! before the first write. Reverting replays those values in reverse order;
//! committing forgets them. Until one of the two happens the device state
//! refuses to be saved.

use crate::path::StatePath;
use crate::state::DeviceState;
use log::{debug, warn};
use qcal_core::QcalResult;
use serde_json::Value;

/// Options for a tracked update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TrackOptions {
    /// Skip writes of `null` instead of clearing the attribute
    pub dont_assign_to_none: bool,
}

/// Reversible mutation record over a [`DeviceState`]
/// Gantree: TrackedUpdate // 되돌릴 수 있는 갱신
#[must_use = "a tracked update must be reverted or committed"]
#[derive(Debug)]
pub struct TrackedUpdate {
    /// (concrete path, raw value before the first write)
    saved: Vec<(StatePath, Option<Value>)>,

    options: TrackOptions,

    finished: bool,
}

impl TrackedUpdate {
    /// Open a tracked update on `state`
    pub fn begin(state: &mut DeviceState, options: TrackOptions) -> Self {
        state.open_override();
        Self {
            saved: Vec::new(),
            options,
            finished: false,
        }
    }

    /// Write through the tracker
    /// Gantree: set(state,path,value) // 기록 후 갱신
    pub fn set(&mut self, state: &mut DeviceState, path: &StatePath, value: Value) -> QcalResult<()> {
        if self.options.dont_assign_to_none && value.is_null() {
            debug!("Skipping null assignment to {}", path);
            return Ok(());
        }

        let (target, previous) = state.set(path, value)?;
        // Only the first write to a location keeps the original value
        if !self.saved.iter().any(|(p, _)| *p == target) {
            self.saved.push((target, previous));
        }
        Ok(())
    }

    /// Concrete paths touched so far
    pub fn touched(&self) -> impl Iterator<Item = &StatePath> {
        self.saved.iter().map(|(p, _)| p)
    }

    /// Original raw value of a touched location
    pub fn original(&self, concrete: &StatePath) -> Option<&Value> {
        self.saved
            .iter()
            .find(|(p, _)| p == concrete)
            .and_then(|(_, v)| v.as_ref())
    }

    /// Restore every touched attribute to its value before the update
    /// Gantree: revert(state) // 원복
    pub fn revert(mut self, state: &mut DeviceState) -> QcalResult<()> {
        self.finished = true;
        state.close_override();
        for (path, previous) in self.saved.drain(..).rev() {
            state.set_raw(&path, previous)?;
        }
        Ok(())
    }

    /// Keep the current values
    /// Gantree: commit(state) // 확정
    pub fn commit(mut self, state: &mut DeviceState) {
        self.finished = true;
        self.saved.clear();
        state.close_override();
    }
}

impl Drop for TrackedUpdate {
    fn drop(&mut self) {
        if !self.finished {
            warn!(
                "Tracked update over {} attribute(s) dropped without revert or commit",
                self.saved.len()
            );
        }
    }
}

/// Tracked update that reverts itself when it goes out of scope
pub struct ScopedOverride<'a> {
    state: &'a mut DeviceState,
    update: Option<TrackedUpdate>,
}

impl<'a> ScopedOverride<'a> {
    /// Open a scoped override on `state`
    pub fn new(state: &'a mut DeviceState, options: TrackOptions) -> Self {
        let update = TrackedUpdate::begin(state, options);
        Self {
            state,
            update: Some(update),
        }
    }

    /// Write through the override
    pub fn set(&mut self, path: &StatePath, value: Value) -> QcalResult<()> {
        match self.update.as_mut() {
            Some(update) => update.set(self.state, path, value),
            None => Ok(()),
        }
    }

    /// Read access to the overridden state
    pub fn state(&self) -> &DeviceState {
        self.state
    }

    /// Keep the overridden values instead of reverting
    pub fn commit(mut self) {
        if let Some(update) = self.update.take() {
            update.commit(self.state);
        }
    }
}

impl Drop for ScopedOverride<'_> {
    fn drop(&mut self) {
        if let Some(update) = self.update.take() {
            if let Err(e) = update.revert(self.state) {
                warn!("Failed to revert scoped override: {}", e);
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
