// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::rotator::controller::broadcast::{Broadcaster, SubscriberId, SubscriberSink};
use crate::rotator::controller::link::{run_link, LinkHandle, LinkRequest};
use crate::rotator::controller::poller::run_poller;
use crate::rotator::controller::policies::LinkPolicy;
use crate::rotator::endpoint::RotctldEndpoint;
use crate::rotator::error::RotResult;
use crate::rotator::state::{RotatorState, StateStore};
use crate::rotator::view::{shape, AccessContext, StatusView};

const LINK_CHANNEL_BUFFER: usize = 32;

/// Construction parameters for a [`ControlPlane`].
#[derive(Debug, Clone)]
pub struct ControlPlaneConfig {
    pub endpoint: RotctldEndpoint,
    pub policy: LinkPolicy,
}

impl ControlPlaneConfig {
    pub fn new(endpoint: RotctldEndpoint) -> Self {
        Self {
            endpoint,
            policy: LinkPolicy::default(),
        }
    }
}

/// Owns the state store, the broadcaster and the daemon link for the life
/// of the process.
pub struct ControlPlane {
    endpoint: RotctldEndpoint,
    policy: LinkPolicy,
    store: Arc<StateStore>,
    link: LinkHandle,
    link_rx: Mutex<Option<mpsc::Receiver<LinkRequest>>>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl ControlPlane {
    pub fn new(config: ControlPlaneConfig) -> Self {
        let broadcaster = Arc::new(Broadcaster::new(config.endpoint.clone()));
        let store = Arc::new(StateStore::new(broadcaster));
        let (tx, rx) = mpsc::channel(LINK_CHANNEL_BUFFER);
        let link = LinkHandle::new(tx, store.clone(), config.policy.settle_delay);
        let (shutdown_tx, _) = watch::channel(false);

        Self {
            endpoint: config.endpoint,
            policy: config.policy,
            store,
            link,
            link_rx: Mutex::new(Some(rx)),
            shutdown_tx,
            tasks: Mutex::new(Vec::new()),
        }
    }

    /// Spawn the link and poller tasks. Must run inside a tokio runtime.
    /// Returns false when already started.
    pub fn start(&self) -> bool {
        let Some(rx) = self.link_rx.lock().ok().and_then(|mut guard| guard.take()) else {
            warn!("Control plane already started");
            return false;
        };

        info!("Starting control plane (rotctld: {})", self.endpoint);
        let link_task = tokio::spawn(run_link(
            self.endpoint.clone(),
            self.policy.clone(),
            self.store.clone(),
            rx,
            self.shutdown_tx.subscribe(),
        ));
        let poller_task = tokio::spawn(run_poller(
            self.link.clone(),
            self.store.clone(),
            self.policy.polling.clone(),
            self.shutdown_tx.subscribe(),
        ));

        if let Ok(mut tasks) = self.tasks.lock() {
            tasks.push(link_task);
            tasks.push(poller_task);
        }
        true
    }

    /// Signal shutdown and wait for the background tasks to finish.
    pub async fn stop(&self) {
        self.shutdown_tx.send_replace(true);
        let tasks: Vec<JoinHandle<()>> = self
            .tasks
            .lock()
            .map(|mut guard| guard.drain(..).collect())
            .unwrap_or_default();
        for task in tasks {
            if let Err(e) = task.await {
                warn!("Control plane task ended abnormally: {}", e);
            }
        }
        info!("Control plane stopped");
    }

    pub fn endpoint(&self) -> &RotctldEndpoint {
        &self.endpoint
    }

    pub fn policy(&self) -> &LinkPolicy {
        &self.policy
    }

    pub fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    pub fn link(&self) -> &LinkHandle {
        &self.link
    }

    pub fn snapshot(&self) -> RotatorState {
        self.store.snapshot()
    }

    pub fn view(&self, access: &AccessContext) -> StatusView {
        self.store
            .with_snapshot(|state| shape(state, access, &self.endpoint))
    }

    /// Register a viewer. It receives one snapshot right away and one per
    /// state change afterwards.
    pub fn subscribe(
        &self,
        sink: Arc<dyn SubscriberSink>,
        access: AccessContext,
    ) -> RotResult<SubscriberId> {
        // Holding the state lock keeps a change from slipping in between
        // the initial snapshot and registration.
        self.store.with_snapshot(|state| {
            self.store.broadcaster().subscribe(sink, access, state)
        })
    }

    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.store.broadcaster().unsubscribe(id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.store.broadcaster().subscriber_count()
    }

    #[cfg(test)]
    pub(crate) fn take_link_rx(&self) -> Option<mpsc::Receiver<LinkRequest>> {
        self.link_rx.lock().ok().and_then(|mut guard| guard.take())
    }
}
