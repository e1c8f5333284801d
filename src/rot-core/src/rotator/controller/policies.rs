// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Timing policies for reconnecting to and polling the daemon.
//!
//! The defaults never back off, never jitter and never give up: an
//! unreachable daemon is retried every few seconds for as long as the
//! process runs.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::rotator::state::RotatorStatus;

pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(100);
pub const DEFAULT_STABILIZATION_DELAY: Duration = Duration::from_millis(200);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Policy for re-establishing a lost daemon connection.
pub trait ReconnectPolicy: Send + Sync + fmt::Debug {
    /// Delay before reconnect attempt number `attempt` (0-based).
    fn delay(&self, attempt: u32) -> Duration;

    /// Whether to try again at all.
    fn should_retry(&self, _attempt: u32) -> bool {
        true
    }
}

/// Constant reconnect delay, unlimited attempts.
#[derive(Debug, Clone)]
pub struct FixedReconnect {
    delay: Duration,
}

impl FixedReconnect {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for FixedReconnect {
    fn default() -> Self {
        Self::new(DEFAULT_RECONNECT_DELAY)
    }
}

impl ReconnectPolicy for FixedReconnect {
    fn delay(&self, _attempt: u32) -> Duration {
        self.delay
    }
}

/// Policy for background position polling.
pub trait PollingPolicy: Send + Sync + fmt::Debug {
    fn interval(&self) -> Duration;

    /// Whether a poller should run at all.
    fn enabled(&self) -> bool {
        true
    }

    fn should_poll(&self, status: RotatorStatus) -> bool;
}

/// Poll at a constant interval while the link is up.
#[derive(Debug, Clone)]
pub struct FixedPolling {
    interval: Duration,
}

impl FixedPolling {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Default for FixedPolling {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

impl PollingPolicy for FixedPolling {
    fn interval(&self) -> Duration {
        self.interval
    }

    fn should_poll(&self, status: RotatorStatus) -> bool {
        status == RotatorStatus::Connected
    }
}

/// Disables background polling.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPolling;

impl PollingPolicy for NoPolling {
    fn interval(&self) -> Duration {
        Duration::MAX
    }

    fn enabled(&self) -> bool {
        false
    }

    fn should_poll(&self, _status: RotatorStatus) -> bool {
        false
    }
}

/// All timing knobs of the daemon link.
#[derive(Debug, Clone)]
pub struct LinkPolicy {
    pub reconnect: Arc<dyn ReconnectPolicy>,
    pub polling: Arc<dyn PollingPolicy>,
    /// Wait after a write before reporting a command as sent. This stands
    /// in for an acknowledgment the protocol does not provide.
    pub settle_delay: Duration,
    /// Wait after connecting before the first position request.
    pub stabilization_delay: Duration,
    pub connect_timeout: Duration,
}

impl Default for LinkPolicy {
    fn default() -> Self {
        Self {
            reconnect: Arc::new(FixedReconnect::default()),
            polling: Arc::new(FixedPolling::default()),
            settle_delay: DEFAULT_SETTLE_DELAY,
            stabilization_delay: DEFAULT_STABILIZATION_DELAY,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}
