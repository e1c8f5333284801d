// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

mod config;

use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::signal;
use tracing::{info, warn};

use rot_app::{init_logging, ConfigFile};
use rot_core::geo::GeoPoint;
use rot_core::{ControlPlane, ControlPlaneConfig, DynResult, RotctldEndpoint};
use rot_frontend_http::{spawn_frontend, HttpFrontendConfig};

use config::ServerConfig;

const PKG_DESCRIPTION: &str = concat!(env!("CARGO_PKG_NAME"), " - ", env!("CARGO_PKG_DESCRIPTION"));
const FRONTEND_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Parser)]
#[command(
    author = env!("CARGO_PKG_AUTHORS"),
    version = env!("CARGO_PKG_VERSION"),
    about = PKG_DESCRIPTION,
)]
struct Cli {
    /// Path to configuration file
    #[arg(long = "config", short = 'C', value_name = "FILE")]
    config: Option<PathBuf>,
    /// Print example configuration and exit
    #[arg(long = "print-config")]
    print_config: bool,
    /// rotctld address (host[:port])
    #[arg(long = "rotctld", value_name = "HOST[:PORT]")]
    rotctld: Option<String>,
    /// HTTP listen address
    #[arg(long = "http-listen")]
    http_listen: Option<IpAddr>,
    /// HTTP listen port
    #[arg(long = "http-port")]
    http_port: Option<u16>,
    /// Log level (trace, debug, info, warn, error)
    #[arg(long = "log-level")]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> DynResult<()> {
    let cli = Cli::parse();

    if cli.print_config {
        println!("{}", ServerConfig::example_toml());
        return Ok(());
    }

    let (mut cfg, config_path) = ServerConfig::load(cli.config.as_deref())?;
    apply_cli_overrides(&mut cfg, &cli)?;
    cfg.validate()?;

    init_logging(cfg.general.log_level.as_deref());

    match config_path {
        Some(ref path) => info!("Loaded configuration from {}", path.display()),
        None => info!("No configuration file found, using defaults"),
    }

    let endpoint = cfg.rotctld.endpoint();
    let listen = cfg.http.socket_addr();
    info!(
        "Starting rot-server (rotctld: {}, http: {})",
        endpoint, listen
    );

    let plane = Arc::new(ControlPlane::new(ControlPlaneConfig {
        endpoint,
        policy: cfg.rotctld.link_policy(),
    }));
    plane.start();

    let mut frontend = spawn_frontend(
        plane.clone(),
        HttpFrontendConfig {
            listen,
            station: GeoPoint::new(cfg.station.latitude, cfg.station.longitude),
            auth: cfg.auth.to_auth_config(),
        },
    );

    tokio::select! {
        res = signal::ctrl_c() => {
            res?;
            info!("Ctrl+C received, shutting down");
        }
        res = &mut frontend => {
            plane.stop().await;
            return match res {
                Ok(Ok(())) => Err("HTTP frontend stopped unexpectedly".into()),
                Ok(Err(e)) => Err(format!("HTTP frontend failed: {}", e).into()),
                Err(e) => Err(format!("HTTP frontend task failed: {}", e).into()),
            };
        }
    }

    plane.stop().await;
    if tokio::time::timeout(FRONTEND_SHUTDOWN_TIMEOUT, frontend)
        .await
        .is_err()
    {
        warn!("HTTP frontend did not stop in time");
    }
    Ok(())
}

fn apply_cli_overrides(cfg: &mut ServerConfig, cli: &Cli) -> DynResult<()> {
    if let Some(ref addr) = cli.rotctld {
        let endpoint = RotctldEndpoint::parse(addr)
            .map_err(|e| format!("Invalid rotctld address: {}", e))?;
        cfg.rotctld.host = endpoint.host;
        cfg.rotctld.port = endpoint.port;
    }
    if let Some(listen) = cli.http_listen {
        cfg.http.listen = listen;
    }
    if let Some(port) = cli.http_port {
        cfg.http.port = port;
    }
    if let Some(ref level) = cli.log_level {
        cfg.general.log_level = Some(level.clone());
    }
    Ok(())
}
