// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! The single TCP link to rotctld.
//!
//! One task owns the socket for its whole life. Callers talk to it through
//! a [`LinkHandle`]; inbound replies go straight into the [`StateStore`].

use std::future::pending;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{self, Sleep};
use tracing::{debug, info, warn};

use crate::rotator::controller::machine::{LinkAction, LinkEvent, LinkMachine};
use crate::rotator::controller::policies::LinkPolicy;
use crate::rotator::endpoint::RotctldEndpoint;
use crate::rotator::error::{RotError, RotResult};
use crate::rotator::protocol::{DaemonReply, RotCommand};
use crate::rotator::state::{RotatorStatus, StateStore};

const IO_TIMEOUT: Duration = Duration::from_secs(10);
const READ_BUFFER_BYTES: usize = 4096;

/// Request sent to the link task.
#[derive(Debug)]
pub struct LinkRequest {
    pub cmd: RotCommand,
    pub issued_at: DateTime<Utc>,
    /// Resolved with the time the line was flushed to the socket.
    pub respond_to: oneshot::Sender<RotResult<DateTime<Utc>>>,
}

/// Record of a command that was written and then left to settle.
///
/// `written_at` is when the bytes reached the socket. `settled_at` is only
/// the end of the fixed settle delay; rotctld sends nothing that confirms
/// the rotator actually acted on the command.
#[derive(Debug, Clone, PartialEq)]
pub struct SendReceipt {
    pub command: RotCommand,
    pub issued_at: DateTime<Utc>,
    pub written_at: DateTime<Utc>,
    pub settled_at: DateTime<Utc>,
}

/// Cloneable sender side of the link.
#[derive(Clone)]
pub struct LinkHandle {
    tx: mpsc::Sender<LinkRequest>,
    store: Arc<StateStore>,
    settle_delay: Duration,
}

impl LinkHandle {
    pub fn new(
        tx: mpsc::Sender<LinkRequest>,
        store: Arc<StateStore>,
        settle_delay: Duration,
    ) -> Self {
        Self {
            tx,
            store,
            settle_delay,
        }
    }

    /// Write `cmd` to the daemon and wait out the settle delay.
    ///
    /// Fails fast with [`RotError::LinkDisconnected`] unless the link is
    /// currently connected.
    pub async fn send(&self, cmd: RotCommand) -> RotResult<SendReceipt> {
        if !self.store.is_connected() {
            return Err(RotError::LinkDisconnected);
        }

        let issued_at = Utc::now();
        let (resp_tx, resp_rx) = oneshot::channel();
        self.tx
            .send(LinkRequest {
                cmd,
                issued_at,
                respond_to: resp_tx,
            })
            .await
            .map_err(|_| RotError::LinkDisconnected)?;

        let written_at = resp_rx.await.map_err(|_| RotError::LinkDisconnected)??;
        time::sleep(self.settle_delay).await;

        Ok(SendReceipt {
            command: cmd,
            issued_at,
            written_at,
            settled_at: Utc::now(),
        })
    }
}

enum SessionEnd {
    Closed,
    Failed(RotError),
    Shutdown,
}

enum Wait {
    RetryElapsed,
    Request(LinkRequest),
    Shutdown,
}

/// Executes machine actions against the store and the retry timer.
struct LinkDriver {
    machine: LinkMachine,
    store: Arc<StateStore>,
    retry: Option<Pin<Box<Sleep>>>,
    initial_poll: Option<Duration>,
}

impl LinkDriver {
    /// Returns true when the machine asks for a new socket.
    fn dispatch(&mut self, event: LinkEvent) -> bool {
        let mut open = false;
        for action in self.machine.handle(event) {
            match action {
                LinkAction::SetStatus(status) => {
                    self.store.set_status(status);
                }
                LinkAction::OpenSocket => open = true,
                LinkAction::CancelReconnect => self.retry = None,
                LinkAction::ScheduleReconnect(delay) => {
                    debug!("Reconnect to rotctld scheduled in {:?}", delay);
                    self.retry = Some(Box::pin(time::sleep(delay)));
                }
                LinkAction::RequestPositionAfter(delay) => self.initial_poll = Some(delay),
            }
        }
        open
    }
}

/// Run the link until shutdown. Connection loss always leads to another
/// attempt after the policy's reconnect delay.
pub async fn run_link(
    endpoint: RotctldEndpoint,
    policy: LinkPolicy,
    store: Arc<StateStore>,
    mut rx: mpsc::Receiver<LinkRequest>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut driver = LinkDriver {
        machine: LinkMachine::new(policy.reconnect.clone(), policy.stabilization_delay),
        store: store.clone(),
        retry: None,
        initial_poll: None,
    };
    let addr = endpoint.connect_addr();
    let mut open = driver.dispatch(LinkEvent::Connect);

    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        if open {
            open = false;
            debug!("Connecting to rotctld at {}", addr);
            let end = match time::timeout(policy.connect_timeout, TcpStream::connect(&addr)).await {
                Ok(Ok(stream)) => {
                    info!("Connected to rotctld at {}", endpoint);
                    driver.dispatch(LinkEvent::Connected);
                    let initial_poll = driver.initial_poll.take();
                    run_session(stream, initial_poll, &store, &mut rx, &mut shutdown_rx).await
                }
                Ok(Err(e)) => SessionEnd::Failed(e.into()),
                Err(_) => SessionEnd::Failed(RotError::io(format!(
                    "connect timed out after {:?}",
                    policy.connect_timeout
                ))),
            };

            match end {
                SessionEnd::Shutdown => break,
                SessionEnd::Failed(e) => {
                    warn!("rotctld connection error: {}", e);
                    driver.dispatch(LinkEvent::IoError(e.to_string()));
                    driver.dispatch(LinkEvent::Closed);
                }
                SessionEnd::Closed => {
                    info!("rotctld connection closed");
                    driver.dispatch(LinkEvent::Closed);
                }
            }
        }

        let wait = {
            let retry = async {
                match driver.retry.as_mut() {
                    Some(timer) => timer.await,
                    None => pending::<()>().await,
                }
            };
            tokio::select! {
                _ = retry => Wait::RetryElapsed,
                req = rx.recv() => match req {
                    Some(req) => Wait::Request(req),
                    None => Wait::Shutdown,
                },
                changed = shutdown_rx.changed() => match changed {
                    Ok(()) if *shutdown_rx.borrow() => Wait::Shutdown,
                    Ok(()) => continue,
                    Err(_) => Wait::Shutdown,
                },
            }
        };

        match wait {
            Wait::RetryElapsed => {
                driver.retry = None;
                info!("Attempting to reconnect to rotctld...");
                open = driver.dispatch(LinkEvent::RetryElapsed);
            }
            Wait::Request(req) => {
                debug!("Rejecting '{}' while disconnected", req.cmd);
                let _ = req.respond_to.send(Err(RotError::LinkDisconnected));
            }
            Wait::Shutdown => break,
        }
    }

    info!("rotctld link shutting down");
    store.set_status(RotatorStatus::Disconnected);
}

async fn run_session(
    stream: TcpStream,
    initial_poll: Option<Duration>,
    store: &StateStore,
    rx: &mut mpsc::Receiver<LinkRequest>,
    shutdown_rx: &mut watch::Receiver<bool>,
) -> SessionEnd {
    let (mut reader, mut writer) = stream.into_split();
    let mut buf = vec![0u8; READ_BUFFER_BYTES];
    let stabilize = time::sleep(initial_poll.unwrap_or(Duration::ZERO));
    tokio::pin!(stabilize);
    let mut primed = initial_poll.is_none();

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                match changed {
                    Ok(()) if *shutdown_rx.borrow() => return SessionEnd::Shutdown,
                    Ok(()) => {}
                    Err(_) => return SessionEnd::Shutdown,
                }
            }
            _ = &mut stabilize, if !primed => {
                primed = true;
                if let Err(e) = write_line(&mut writer, &RotCommand::GetPosition).await {
                    return SessionEnd::Failed(e);
                }
            }
            read = reader.read(&mut buf) => {
                match read {
                    Ok(0) => return SessionEnd::Closed,
                    Ok(n) => {
                        let chunk = String::from_utf8_lossy(&buf[..n]);
                        debug!("rotctld response: {}", chunk.trim());
                        let _ = store.apply_reply(&DaemonReply::parse(&chunk));
                    }
                    Err(e) => return SessionEnd::Failed(e.into()),
                }
            }
            req = rx.recv() => {
                let Some(req) = req else {
                    return SessionEnd::Shutdown;
                };
                match write_line(&mut writer, &req.cmd).await {
                    Ok(()) => {
                        let _ = req.respond_to.send(Ok(Utc::now()));
                    }
                    Err(e) => {
                        let _ = req.respond_to.send(Err(e.clone()));
                        return SessionEnd::Failed(e);
                    }
                }
            }
        }
    }
}

async fn write_line(writer: &mut OwnedWriteHalf, cmd: &RotCommand) -> RotResult<()> {
    let line = format!("{}\n", cmd.to_line());
    time::timeout(IO_TIMEOUT, writer.write_all(line.as_bytes()))
        .await
        .map_err(|_| RotError::io(format!("write timed out after {:?}", IO_TIMEOUT)))?
        .map_err(|e| RotError::io(format!("write failed: {e}")))?;
    time::timeout(IO_TIMEOUT, writer.flush())
        .await
        .map_err(|_| RotError::io(format!("flush timed out after {:?}", IO_TIMEOUT)))?
        .map_err(|e| RotError::io(format!("flush failed: {e}")))?;
    Ok(())
}
