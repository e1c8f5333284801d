// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

pub mod geo;
pub mod rotator;

pub type DynResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

pub use rotator::controller::{ControlPlane, ControlPlaneConfig};
pub use rotator::endpoint::RotctldEndpoint;
pub use rotator::error::{RotError, RotResult};
pub use rotator::protocol::{DaemonReply, RotCommand};
pub use rotator::state::{normalize_azimuth, RotatorState, RotatorStatus, StateStore};
pub use rotator::view::{shape, AccessContext, Authorizer, StatusView};
