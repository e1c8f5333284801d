// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Fan-out of state snapshots to live subscribers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::debug;

use crate::rotator::endpoint::RotctldEndpoint;
use crate::rotator::error::{RotError, RotResult};
use crate::rotator::state::RotatorState;
use crate::rotator::view::{shape, AccessContext, StatusView};

/// Push channel towards one viewer. Implementations must not block.
pub trait SubscriberSink: Send + Sync {
    fn push(&self, view: StatusView) -> RotResult<()>;
}

impl SubscriberSink for mpsc::Sender<StatusView> {
    fn push(&self, view: StatusView) -> RotResult<()> {
        self.try_send(view).map_err(|e| match e {
            TrySendError::Full(_) => RotError::SubscriberWrite("subscriber queue full".into()),
            TrySendError::Closed(_) => RotError::SubscriberWrite("subscriber closed".into()),
        })
    }
}

/// Handle identifying one registered subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

struct Subscriber {
    sink: Arc<dyn SubscriberSink>,
    access: AccessContext,
}

impl Subscriber {
    fn push(&self, state: &RotatorState, endpoint: &RotctldEndpoint) -> RotResult<()> {
        self.sink.push(shape(state, &self.access, endpoint))
    }
}

/// Registry of subscribers. Order is irrelevant.
pub struct Broadcaster {
    endpoint: RotctldEndpoint,
    subscribers: Mutex<HashMap<SubscriberId, Arc<Subscriber>>>,
}

impl Broadcaster {
    pub fn new(endpoint: RotctldEndpoint) -> Self {
        Self {
            endpoint,
            subscribers: Mutex::new(HashMap::new()),
        }
    }

    pub fn endpoint(&self) -> &RotctldEndpoint {
        &self.endpoint
    }

    /// Push one snapshot of `current` shaped for `access`, then register.
    ///
    /// A sink that cannot take the initial snapshot is never registered.
    pub fn subscribe(
        &self,
        sink: Arc<dyn SubscriberSink>,
        access: AccessContext,
        current: &RotatorState,
    ) -> RotResult<SubscriberId> {
        let subscriber = Arc::new(Subscriber { sink, access });
        subscriber.push(current, &self.endpoint)?;

        let id = SubscriberId::new();
        self.registry().insert(id, subscriber);
        debug!("Subscriber {:?} registered", id);
        Ok(id)
    }

    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let removed = self.registry().remove(&id).is_some();
        if removed {
            debug!("Subscriber {:?} unregistered", id);
        }
        removed
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry().len()
    }

    /// Push `state` to every subscriber registered right now. Subscribers
    /// whose push fails are dropped; the others are unaffected.
    pub fn publish(&self, state: &RotatorState) {
        let targets: Vec<(SubscriberId, Arc<Subscriber>)> = self
            .registry()
            .iter()
            .map(|(id, sub)| (*id, sub.clone()))
            .collect();

        let failed: Vec<SubscriberId> = targets
            .into_iter()
            .filter_map(|(id, sub)| match sub.push(state, &self.endpoint) {
                Ok(()) => None,
                Err(e) => {
                    debug!("Pruning subscriber {:?}: {}", id, e);
                    Some(id)
                }
            })
            .collect();

        if !failed.is_empty() {
            let mut registry = self.registry();
            for id in failed {
                registry.remove(&id);
            }
        }
    }

    fn registry(&self) -> MutexGuard<'_, HashMap<SubscriberId, Arc<Subscriber>>> {
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rotator::state::RotatorStatus;

    struct BrokenSink;

    impl SubscriberSink for BrokenSink {
        fn push(&self, _view: StatusView) -> RotResult<()> {
            Err(RotError::SubscriberWrite("broken pipe".into()))
        }
    }

    fn broadcaster() -> Broadcaster {
        Broadcaster::new(RotctldEndpoint::new("127.0.0.1", 4533))
    }

    fn drain(rx: &mut mpsc::Receiver<StatusView>) -> Vec<StatusView> {
        let mut out = Vec::new();
        while let Ok(view) = rx.try_recv() {
            out.push(view);
        }
        out
    }

    #[test]
    fn subscribe_pushes_one_snapshot() {
        let hub = broadcaster();
        let (tx, mut rx) = mpsc::channel(8);
        let mut state = RotatorState::new();
        state.record_position(42.0);

        hub.subscribe(Arc::new(tx), AccessContext::anonymous(), &state)
            .expect("subscribe");

        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].current_azimuth, 42.0);
        assert_eq!(hub.subscriber_count(), 1);
    }

    #[test]
    fn publish_delivers_in_order() {
        let hub = broadcaster();
        let (tx, mut rx) = mpsc::channel(8);
        let mut state = RotatorState::new();
        hub.subscribe(Arc::new(tx), AccessContext::anonymous(), &state)
            .expect("subscribe");

        for az in [10.0, 20.0, 30.0] {
            state.record_position(az);
            hub.publish(&state);
        }

        let azimuths: Vec<f64> = drain(&mut rx).iter().map(|v| v.current_azimuth).collect();
        assert_eq!(azimuths, vec![0.0, 10.0, 20.0, 30.0]);
    }

    #[test]
    fn each_subscriber_gets_its_own_shape() {
        let hub = broadcaster();
        let (anon_tx, mut anon_rx) = mpsc::channel(8);
        let (op_tx, mut op_rx) = mpsc::channel(8);
        let state = RotatorState::new();
        hub.subscribe(Arc::new(anon_tx), AccessContext::anonymous(), &state)
            .expect("subscribe anon");
        hub.subscribe(Arc::new(op_tx), AccessContext::operator("admin"), &state)
            .expect("subscribe operator");

        let anon = drain(&mut anon_rx);
        let op = drain(&mut op_rx);
        assert!(!anon[0].authenticated);
        assert!(op[0].authenticated);
        assert_eq!(op[0].username.as_deref(), Some("admin"));
    }

    #[test]
    fn failed_push_prunes_only_that_subscriber() {
        let hub = broadcaster();
        let (live_tx, mut live_rx) = mpsc::channel(8);
        let (dead_tx, dead_rx) = mpsc::channel(8);
        let mut state = RotatorState::new();
        hub.subscribe(Arc::new(live_tx), AccessContext::anonymous(), &state)
            .expect("subscribe live");
        hub.subscribe(Arc::new(dead_tx), AccessContext::anonymous(), &state)
            .expect("subscribe dead");
        drop(dead_rx);
        assert_eq!(hub.subscriber_count(), 2);

        state.record_status(RotatorStatus::Connected);
        hub.publish(&state);

        assert_eq!(hub.subscriber_count(), 1);
        let events = drain(&mut live_rx);
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].status, RotatorStatus::Connected);
    }

    #[test]
    fn slow_subscriber_is_dropped_not_awaited() {
        let hub = broadcaster();
        let (tx, _rx) = mpsc::channel(1);
        let mut state = RotatorState::new();
        hub.subscribe(Arc::new(tx), AccessContext::anonymous(), &state)
            .expect("subscribe");

        state.record_position(5.0);
        hub.publish(&state);
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[test]
    fn broken_sink_is_never_registered() {
        let hub = broadcaster();
        let err = hub
            .subscribe(Arc::new(BrokenSink), AccessContext::anonymous(), &RotatorState::new())
            .expect_err("must fail");
        assert!(matches!(err, RotError::SubscriberWrite(_)));
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[test]
    fn unsubscribe_removes_once() {
        let hub = broadcaster();
        let (tx, _rx) = mpsc::channel(8);
        let id = hub
            .subscribe(Arc::new(tx), AccessContext::anonymous(), &RotatorState::new())
            .expect("subscribe");
        assert!(hub.unsubscribe(id));
        assert!(!hub.unsubscribe(id));
    }
}
