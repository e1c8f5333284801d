// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Authorization-aware views of the rotator state.
//!
//! The control plane never inspects credentials. Callers resolve an
//! [`AccessContext`] through an [`Authorizer`] and [`shape`] turns a state
//! snapshot into what that caller is allowed to see.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::rotator::endpoint::RotctldEndpoint;
use crate::rotator::state::{RotatorState, RotatorStatus};

/// Text shown instead of daemon details to unauthorized viewers.
pub const REDACTED_CONNECTION_DETAILS: &str = "Connected to backend";

/// Authorization collaborator supplied by the frontend.
pub trait Authorizer {
    /// Request context the frontend resolves identity from.
    type Context: ?Sized;

    fn is_authorized(&self, ctx: &Self::Context) -> bool;

    fn current_user(&self, ctx: &Self::Context) -> Option<String>;
}

/// Snapshot of a caller's authorization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessContext {
    pub authorized: bool,
    pub username: Option<String>,
}

impl AccessContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn operator(username: impl Into<String>) -> Self {
        Self {
            authorized: true,
            username: Some(username.into()),
        }
    }

    pub fn resolve<A: Authorizer + ?Sized>(authorizer: &A, ctx: &A::Context) -> Self {
        let authorized = authorizer.is_authorized(ctx);
        Self {
            authorized,
            username: if authorized {
                authorizer.current_user(ctx)
            } else {
                None
            },
        }
    }
}

/// Payload of the status endpoint and of every stream event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusView {
    pub status: RotatorStatus,
    pub current_azimuth: f64,
    pub target_azimuth: f64,
    pub timestamp: DateTime<Utc>,
    pub authenticated: bool,
    pub connection_details: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// Shape `state` for a caller with `access`.
pub fn shape(state: &RotatorState, access: &AccessContext, endpoint: &RotctldEndpoint) -> StatusView {
    let (connection_details, username) = if access.authorized {
        (
            format!("Rotctld active at {}", endpoint),
            access.username.clone(),
        )
    } else {
        (REDACTED_CONNECTION_DETAILS.to_string(), None)
    };

    StatusView {
        status: state.status,
        current_azimuth: state.current_azimuth,
        target_azimuth: state.target_azimuth,
        timestamp: state.updated_at,
        authenticated: access.authorized,
        connection_details,
        username,
    }
}
