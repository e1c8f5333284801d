// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use thiserror::Error;

/// Error type returned by control-plane operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RotError {
    /// A command was attempted while the daemon link is not connected.
    #[error("Not connected to rotctld")]
    LinkDisconnected,

    /// Socket level failure on the daemon link.
    #[error("rotctld link I/O error: {0}")]
    LinkIo(String),

    /// A daemon reply that carries no position data.
    #[error("unparseable rotctld reply: {0}")]
    Protocol(String),

    /// Operator input rejected before touching the link.
    #[error("{0}")]
    Validation(String),

    /// Pushing a snapshot to a subscriber failed.
    #[error("subscriber write failed: {0}")]
    SubscriberWrite(String),
}

pub type RotResult<T> = Result<T, RotError>;

impl RotError {
    pub fn io(message: impl Into<String>) -> Self {
        Self::LinkIo(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Whether the failure is about link availability rather than the request itself.
    pub fn is_link_failure(&self) -> bool {
        matches!(self, Self::LinkDisconnected | Self::LinkIo(_))
    }
}

impl From<std::io::Error> for RotError {
    fn from(err: std::io::Error) -> Self {
        Self::LinkIo(err.to_string())
    }
}
