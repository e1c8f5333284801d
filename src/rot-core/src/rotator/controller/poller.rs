// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, warn};

use crate::rotator::controller::link::LinkHandle;
use crate::rotator::controller::policies::PollingPolicy;
use crate::rotator::protocol::RotCommand;
use crate::rotator::state::StateStore;

/// Ask for the position on every tick while connected. Failures are logged
/// and never stop the loop.
pub async fn run_poller(
    link: LinkHandle,
    store: Arc<StateStore>,
    policy: Arc<dyn PollingPolicy>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    if !policy.enabled() {
        debug!("Position polling disabled");
        return;
    }

    let mut interval = time::interval(policy.interval());
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                match changed {
                    Ok(()) if *shutdown_rx.borrow() => return,
                    Ok(()) => {}
                    Err(_) => return,
                }
            }
            _ = interval.tick() => {
                if !policy.should_poll(store.status()) {
                    continue;
                }
                if let Err(e) = link.send(RotCommand::GetPosition).await {
                    warn!("Position poll failed: {}", e);
                }
            }
        }
    }
}
