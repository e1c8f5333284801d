// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Control plane: the rotctld link, position polling, fan-out to viewers
//! and the operator commands built on top of them.

pub mod broadcast;
pub mod handlers;
pub mod link;
pub mod machine;
pub mod plane;
pub mod policies;
pub mod poller;

pub use broadcast::{Broadcaster, SubscriberId, SubscriberSink};
pub use handlers::{CommandOutcome, PositionReport};
pub use link::{LinkHandle, SendReceipt};
pub use machine::{LinkAction, LinkEvent, LinkMachine, LinkPhase};
pub use plane::{ControlPlane, ControlPlaneConfig};
pub use policies::{
    FixedPolling, FixedReconnect, LinkPolicy, NoPolling, PollingPolicy, ReconnectPolicy,
};
