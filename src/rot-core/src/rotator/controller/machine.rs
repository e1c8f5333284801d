// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Connection state machine for the rotctld link.
//!
//! The machine is pure: it consumes socket events and returns the actions
//! the link task must carry out. Keeping the reconnect bookkeeping here
//! makes "at most one pending retry" checkable without a socket.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::rotator::controller::policies::ReconnectPolicy;
use crate::rotator::state::RotatorStatus;

/// Lifecycle phase of the daemon connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LinkPhase {
    #[default]
    Idle,
    Connecting,
    Connected,
    Error,
    Disconnected,
}

impl fmt::Display for LinkPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Error => "error",
            Self::Disconnected => "disconnected",
        };
        f.write_str(name)
    }
}

/// Socket level events fed into the machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// Start a connection attempt now.
    Connect,
    /// TCP connect succeeded.
    Connected,
    /// Socket reported an error. The socket is not gone until `Closed`.
    IoError(String),
    /// Socket closed (or the connect attempt failed for good).
    Closed,
    /// The pending reconnect timer fired.
    RetryElapsed,
}

/// Side effects requested by a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkAction {
    SetStatus(RotatorStatus),
    OpenSocket,
    CancelReconnect,
    ScheduleReconnect(Duration),
    RequestPositionAfter(Duration),
}

#[derive(Debug)]
pub struct LinkMachine {
    phase: LinkPhase,
    reconnect_pending: bool,
    attempt: u32,
    reconnect: Arc<dyn ReconnectPolicy>,
    stabilization_delay: Duration,
}

impl LinkMachine {
    pub fn new(reconnect: Arc<dyn ReconnectPolicy>, stabilization_delay: Duration) -> Self {
        Self {
            phase: LinkPhase::Idle,
            reconnect_pending: false,
            attempt: 0,
            reconnect,
            stabilization_delay,
        }
    }

    pub fn phase(&self) -> LinkPhase {
        self.phase
    }

    pub fn reconnect_pending(&self) -> bool {
        self.reconnect_pending
    }

    pub fn handle(&mut self, event: LinkEvent) -> Vec<LinkAction> {
        match event {
            LinkEvent::Connect => self.begin_connect(),
            LinkEvent::RetryElapsed => {
                if !self.reconnect_pending {
                    return Vec::new();
                }
                self.reconnect_pending = false;
                self.begin_connect()
            }
            LinkEvent::Connected => {
                self.phase = LinkPhase::Connected;
                self.attempt = 0;
                let mut actions = vec![LinkAction::SetStatus(RotatorStatus::Connected)];
                actions.extend(self.cancel_pending());
                actions.push(LinkAction::RequestPositionAfter(self.stabilization_delay));
                actions
            }
            LinkEvent::IoError(_) => {
                self.phase = LinkPhase::Error;
                vec![LinkAction::SetStatus(RotatorStatus::Error)]
            }
            LinkEvent::Closed => {
                self.phase = LinkPhase::Disconnected;
                let mut actions = vec![LinkAction::SetStatus(RotatorStatus::Disconnected)];
                actions.extend(self.cancel_pending());
                if self.reconnect.should_retry(self.attempt) {
                    let delay = self.reconnect.delay(self.attempt);
                    self.attempt = self.attempt.saturating_add(1);
                    self.reconnect_pending = true;
                    actions.push(LinkAction::ScheduleReconnect(delay));
                }
                actions
            }
        }
    }

    fn begin_connect(&mut self) -> Vec<LinkAction> {
        self.phase = LinkPhase::Connecting;
        let mut actions: Vec<LinkAction> = self.cancel_pending().into_iter().collect();
        actions.push(LinkAction::OpenSocket);
        actions
    }

    fn cancel_pending(&mut self) -> Option<LinkAction> {
        if self.reconnect_pending {
            self.reconnect_pending = false;
            Some(LinkAction::CancelReconnect)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rotator::controller::policies::FixedReconnect;

    const RETRY: Duration = Duration::from_secs(5);

    fn machine() -> LinkMachine {
        LinkMachine::new(
            Arc::new(FixedReconnect::new(RETRY)),
            Duration::from_millis(200),
        )
    }

    /// Mirror of the link task's single retry slot.
    fn apply(slot: &mut Option<Duration>, actions: &[LinkAction]) {
        for action in actions {
            match action {
                LinkAction::CancelReconnect => *slot = None,
                LinkAction::ScheduleReconnect(d) => {
                    assert!(slot.is_none(), "retry scheduled on top of a pending one");
                    *slot = Some(*d);
                }
                _ => {}
            }
        }
    }

    #[test]
    fn connect_then_connected() {
        let mut m = machine();
        assert_eq!(m.handle(LinkEvent::Connect), vec![LinkAction::OpenSocket]);
        assert_eq!(m.phase(), LinkPhase::Connecting);

        let actions = m.handle(LinkEvent::Connected);
        assert_eq!(
            actions,
            vec![
                LinkAction::SetStatus(RotatorStatus::Connected),
                LinkAction::RequestPositionAfter(Duration::from_millis(200)),
            ]
        );
        assert_eq!(m.phase(), LinkPhase::Connected);
    }

    #[test]
    fn error_keeps_socket_until_close() {
        let mut m = machine();
        m.handle(LinkEvent::Connect);
        m.handle(LinkEvent::Connected);

        let actions = m.handle(LinkEvent::IoError("reset".into()));
        assert_eq!(actions, vec![LinkAction::SetStatus(RotatorStatus::Error)]);
        assert!(!m.reconnect_pending());

        let actions = m.handle(LinkEvent::Closed);
        assert!(actions.contains(&LinkAction::SetStatus(RotatorStatus::Disconnected)));
        assert!(actions.contains(&LinkAction::ScheduleReconnect(RETRY)));
    }

    #[test]
    fn double_close_leaves_exactly_one_retry() {
        let mut m = machine();
        let mut slot = None;
        apply(&mut slot, &m.handle(LinkEvent::Connect));
        apply(&mut slot, &m.handle(LinkEvent::Connected));

        let first = m.handle(LinkEvent::Closed);
        assert_eq!(first[0], LinkAction::SetStatus(RotatorStatus::Disconnected));
        apply(&mut slot, &first);

        let second = m.handle(LinkEvent::Closed);
        assert!(second.contains(&LinkAction::CancelReconnect));
        apply(&mut slot, &second);

        assert_eq!(slot, Some(RETRY));
        assert!(m.reconnect_pending());
        assert_eq!(m.phase(), LinkPhase::Disconnected);
    }

    #[test]
    fn retry_reconnects_once() {
        let mut m = machine();
        m.handle(LinkEvent::Connect);
        m.handle(LinkEvent::Closed);

        assert_eq!(m.handle(LinkEvent::RetryElapsed), vec![LinkAction::OpenSocket]);
        assert_eq!(m.phase(), LinkPhase::Connecting);
        // A stale timer firing again does nothing.
        assert!(m.handle(LinkEvent::RetryElapsed).is_empty());
    }

    #[test]
    fn manual_connect_cancels_pending_retry() {
        let mut m = machine();
        m.handle(LinkEvent::Connect);
        m.handle(LinkEvent::Closed);
        assert!(m.reconnect_pending());

        assert_eq!(
            m.handle(LinkEvent::Connect),
            vec![LinkAction::CancelReconnect, LinkAction::OpenSocket]
        );
        assert!(!m.reconnect_pending());
    }

    #[test]
    fn connect_while_connecting_opens_again_without_cancel() {
        let mut m = machine();
        assert_eq!(m.handle(LinkEvent::Connect), vec![LinkAction::OpenSocket]);
        assert_eq!(m.handle(LinkEvent::Connect), vec![LinkAction::OpenSocket]);
        assert_eq!(m.phase(), LinkPhase::Connecting);
        assert!(!m.reconnect_pending());
    }

    #[test]
    fn failed_connect_retries_forever() {
        let mut m = machine();
        for _ in 0..100 {
            m.handle(LinkEvent::RetryElapsed);
            m.handle(LinkEvent::Connect);
            m.handle(LinkEvent::IoError("refused".into()));
            let actions = m.handle(LinkEvent::Closed);
            assert!(actions.contains(&LinkAction::ScheduleReconnect(RETRY)));
        }
    }
}
