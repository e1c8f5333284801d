// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::rotator::controller::broadcast::Broadcaster;
use crate::rotator::error::RotResult;
use crate::rotator::protocol::DaemonReply;

/// Fold any angle into `[0, 360)`.
pub fn normalize_azimuth(azimuth: f64) -> f64 {
    let folded = azimuth.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs.
    if folded >= 360.0 {
        0.0
    } else {
        folded
    }
}

/// Health of the rotctld link as seen by viewers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RotatorStatus {
    #[default]
    Disconnected,
    Connected,
    Error,
}

impl RotatorStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connected => "connected",
            Self::Error => "error",
        }
    }
}

/// Rotator state shared by the link, the command handlers and viewers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RotatorState {
    pub status: RotatorStatus,
    pub current_azimuth: f64,
    pub target_azimuth: f64,
    pub updated_at: DateTime<Utc>,
    /// Set once the target has been commanded or seeded from a reading.
    #[serde(skip)]
    pub target_initialized: bool,
}

impl RotatorState {
    pub fn new() -> Self {
        Self {
            status: RotatorStatus::Disconnected,
            current_azimuth: 0.0,
            target_azimuth: 0.0,
            updated_at: Utc::now(),
            target_initialized: false,
        }
    }

    /// Record a position reading. Returns whether anything changed.
    pub fn record_position(&mut self, raw_azimuth: f64) -> bool {
        let azimuth = normalize_azimuth(raw_azimuth);
        let mut changed = self.current_azimuth != azimuth;
        self.current_azimuth = azimuth;

        // First non-zero reading seeds the target so viewers never see a
        // bogus 0 deg target before any command was issued.
        if !self.target_initialized && self.target_azimuth == 0.0 && azimuth != 0.0 {
            self.target_azimuth = azimuth;
            self.target_initialized = true;
            changed = true;
        }
        changed
    }

    pub fn record_target(&mut self, azimuth: f64) -> bool {
        let azimuth = normalize_azimuth(azimuth);
        let changed = self.target_azimuth != azimuth || !self.target_initialized;
        self.target_azimuth = azimuth;
        self.target_initialized = true;
        changed
    }

    pub fn record_status(&mut self, status: RotatorStatus) -> bool {
        let changed = self.status != status;
        self.status = status;
        changed
    }
}

impl Default for RotatorState {
    fn default() -> Self {
        Self::new()
    }
}

/// Owner of the single [`RotatorState`].
///
/// Every mutation that changes the state is published to the broadcaster
/// while the state lock is still held, so subscribers observe changes in
/// mutation order. Publishing never blocks on a subscriber.
pub struct StateStore {
    state: Mutex<RotatorState>,
    broadcaster: Arc<Broadcaster>,
}

impl StateStore {
    pub fn new(broadcaster: Arc<Broadcaster>) -> Self {
        Self {
            state: Mutex::new(RotatorState::new()),
            broadcaster,
        }
    }

    pub fn broadcaster(&self) -> &Arc<Broadcaster> {
        &self.broadcaster
    }

    pub fn snapshot(&self) -> RotatorState {
        self.lock().clone()
    }

    pub fn status(&self) -> RotatorStatus {
        self.lock().status
    }

    pub fn is_connected(&self) -> bool {
        self.status() == RotatorStatus::Connected
    }

    /// Run `f` against the current state with mutations held off.
    pub fn with_snapshot<R>(&self, f: impl FnOnce(&RotatorState) -> R) -> R {
        let guard = self.lock();
        f(&guard)
    }

    pub fn set_status(&self, status: RotatorStatus) -> bool {
        self.update(|state| state.record_status(status))
    }

    pub fn set_current_azimuth(&self, raw_azimuth: f64) -> bool {
        self.update(|state| state.record_position(raw_azimuth))
    }

    pub fn set_target_azimuth(&self, azimuth: f64) -> bool {
        self.update(|state| state.record_target(azimuth))
    }

    /// Apply one classified daemon reply. Non-positional replies are
    /// dropped without touching the state.
    pub fn apply_reply(&self, reply: &DaemonReply) -> RotResult<f64> {
        let raw = reply.azimuth().inspect_err(|e| {
            debug!("Ignoring rotctld reply: {}", e);
        })?;
        self.set_current_azimuth(raw);
        Ok(normalize_azimuth(raw))
    }

    fn update(&self, f: impl FnOnce(&mut RotatorState) -> bool) -> bool {
        let mut guard = self.lock();
        let changed = f(&mut guard);
        if changed {
            guard.updated_at = Utc::now();
            self.broadcaster.publish(&guard);
        }
        changed
    }

    fn lock(&self) -> MutexGuard<'_, RotatorState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
