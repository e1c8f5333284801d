// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Operator commands. Each one validates its input, touches the state
//! store and hands the wire command to the link.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time;
use tracing::{info, warn};

use crate::rotator::controller::plane::ControlPlane;
use crate::rotator::error::{RotError, RotResult};
use crate::rotator::protocol::RotCommand;
use crate::rotator::state::normalize_azimuth;
use crate::rotator::view::{AccessContext, StatusView};

/// Extra wait after a position query so the reply can land in the store.
pub const POSITION_REPLY_WINDOW: Duration = Duration::from_millis(200);

pub const MIN_AZIMUTH: f64 = 0.0;
pub const MAX_AZIMUTH: f64 = 360.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azimuth: Option<f64>,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionReport {
    pub azimuth: f64,
    pub elevation: f64,
}

pub fn validate_azimuth(azimuth: f64) -> RotResult<f64> {
    if azimuth.is_finite() && (MIN_AZIMUTH..=MAX_AZIMUTH).contains(&azimuth) {
        Ok(azimuth)
    } else {
        Err(RotError::validation("Invalid azimuth value"))
    }
}

/// Point the rotator at `azimuth` degrees.
///
/// The target is recorded before the command goes out, so it survives a
/// failed send.
pub async fn set_azimuth(plane: &ControlPlane, azimuth: f64) -> RotResult<CommandOutcome> {
    let azimuth = validate_azimuth(azimuth)?;
    plane.store().set_target_azimuth(normalize_azimuth(azimuth));

    info!("Setting azimuth to {}", azimuth);
    plane
        .link()
        .send(RotCommand::set_azimuth(azimuth))
        .await
        .inspect_err(|e| warn!("Set azimuth {} failed: {}", azimuth, e))?;

    Ok(CommandOutcome {
        success: true,
        azimuth: Some(azimuth),
        message: format!("Setting azimuth to {}°", azimuth),
    })
}

pub async fn stop(plane: &ControlPlane) -> RotResult<CommandOutcome> {
    info!("Stopping rotator");
    plane.link().send(RotCommand::Stop).await?;
    Ok(CommandOutcome {
        success: true,
        azimuth: None,
        message: "Stop command sent".to_string(),
    })
}

pub fn get_status(plane: &ControlPlane, access: &AccessContext) -> StatusView {
    plane.view(access)
}

/// Ask the daemon for a fresh reading and report what the store holds
/// afterwards. The rotator only turns in azimuth; elevation is always 0.
pub async fn get_position(plane: &ControlPlane) -> RotResult<PositionReport> {
    plane.link().send(RotCommand::GetPosition).await?;
    time::sleep(POSITION_REPLY_WINDOW).await;
    Ok(PositionReport {
        azimuth: plane.snapshot().current_azimuth,
        elevation: 0.0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use chrono::Utc;

    use crate::rotator::controller::plane::ControlPlaneConfig;
    use crate::rotator::controller::policies::LinkPolicy;
    use crate::rotator::endpoint::RotctldEndpoint;
    use crate::rotator::protocol::DaemonReply;
    use crate::rotator::state::RotatorStatus;

    fn plane() -> ControlPlane {
        ControlPlane::new(ControlPlaneConfig {
            endpoint: RotctldEndpoint::new("127.0.0.1", 4533),
            policy: LinkPolicy {
                settle_delay: Duration::from_millis(1),
                ..LinkPolicy::default()
            },
        })
    }

    /// Stand-in for the link task: records every line and confirms the write.
    fn fake_link(plane: &ControlPlane, reply: Option<&'static str>) -> Arc<Mutex<Vec<String>>> {
        let mut rx = plane.take_link_rx().expect("link receiver");
        let store = plane.store().clone();
        let lines = Arc::new(Mutex::new(Vec::new()));
        let seen = lines.clone();
        tokio::spawn(async move {
            while let Some(req) = rx.recv().await {
                seen.lock().expect("lines").push(req.cmd.to_line());
                if let Some(text) = reply {
                    let _ = store.apply_reply(&DaemonReply::parse(text));
                }
                let _ = req.respond_to.send(Ok(Utc::now()));
            }
        });
        lines
    }

    #[tokio::test]
    async fn out_of_range_azimuth_is_rejected() {
        let plane = plane();
        plane.store().set_target_azimuth(42.0);
        for bad in [400.0, -1.0, f64::NAN] {
            let err = set_azimuth(&plane, bad).await.expect_err("invalid");
            assert!(matches!(err, RotError::Validation(_)));
        }
        assert_eq!(plane.snapshot().target_azimuth, 42.0);
    }

    #[tokio::test]
    async fn disconnected_send_keeps_target() {
        let plane = plane();
        let err = set_azimuth(&plane, 185.0).await.expect_err("disconnected");
        assert_eq!(err, RotError::LinkDisconnected);
        assert_eq!(plane.snapshot().target_azimuth, 185.0);
    }

    #[tokio::test]
    async fn set_azimuth_issues_position_command() {
        let plane = plane();
        let lines = fake_link(&plane, None);
        plane.store().set_status(RotatorStatus::Connected);

        let outcome = set_azimuth(&plane, 185.0).await.expect("set");
        assert!(outcome.success);
        assert_eq!(outcome.azimuth, Some(185.0));
        assert_eq!(outcome.message, "Setting azimuth to 185°");
        assert_eq!(plane.snapshot().target_azimuth, 185.0);
        assert_eq!(*lines.lock().expect("lines"), vec!["P 185 0".to_string()]);
    }

    #[tokio::test]
    async fn full_turn_is_stored_as_north() {
        let plane = plane();
        let lines = fake_link(&plane, None);
        plane.store().set_status(RotatorStatus::Connected);

        set_azimuth(&plane, 360.0).await.expect("set");
        assert_eq!(plane.snapshot().target_azimuth, 0.0);
        assert_eq!(*lines.lock().expect("lines"), vec!["P 360 0".to_string()]);
    }

    #[tokio::test]
    async fn stop_sends_stop_line() {
        let plane = plane();
        let lines = fake_link(&plane, None);
        plane.store().set_status(RotatorStatus::Connected);

        let outcome = stop(&plane).await.expect("stop");
        assert_eq!(outcome.message, "Stop command sent");
        assert_eq!(*lines.lock().expect("lines"), vec!["S".to_string()]);
    }

    #[tokio::test]
    async fn stop_while_disconnected_fails() {
        let plane = plane();
        assert_eq!(stop(&plane).await, Err(RotError::LinkDisconnected));
    }

    #[tokio::test]
    async fn position_reads_back_store() {
        let plane = plane();
        let lines = fake_link(&plane, Some("123.5\n"));
        plane.store().set_status(RotatorStatus::Connected);

        let report = get_position(&plane).await.expect("position");
        assert_eq!(report, PositionReport { azimuth: 123.5, elevation: 0.0 });
        assert_eq!(*lines.lock().expect("lines"), vec!["p".to_string()]);
    }

    #[test]
    fn status_is_shaped_for_caller() {
        let plane = plane();
        let view = get_status(&plane, &AccessContext::anonymous());
        assert_eq!(view.status, RotatorStatus::Disconnected);
        assert_eq!(view.connection_details, "Connected to backend");
        assert!(view.username.is_none());
    }
}
