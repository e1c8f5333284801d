// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::net::SocketAddr;
use std::sync::Arc;

use actix_web::dev::Server;
use actix_web::{web, App, HttpServer};
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{error, info};

use rot_core::geo::{BeamShape, GeoPoint};
use rot_core::ControlPlane;

use crate::api;
use crate::auth::{AuthConfig, AuthMiddleware, AuthState};

/// Everything the HTTP frontend needs besides the control plane.
#[derive(Debug, Clone)]
pub struct HttpFrontendConfig {
    pub listen: SocketAddr,
    pub station: GeoPoint,
    pub auth: AuthConfig,
}

/// Shared, read-only request context.
#[derive(Debug, Clone)]
pub struct FrontendContext {
    pub station: GeoPoint,
    pub beam: BeamShape,
}

/// Run the HTTP frontend on its own task.
///
/// The handle resolves once the server stops; a bind failure resolves it
/// right away with the error.
pub fn spawn_frontend(
    plane: Arc<ControlPlane>,
    config: HttpFrontendConfig,
) -> JoinHandle<std::io::Result<()>> {
    tokio::spawn(async move {
        let result = serve(plane, config).await;
        if let Err(ref e) = result {
            error!("HTTP server error: {:?}", e);
        }
        result
    })
}

async fn serve(plane: Arc<ControlPlane>, config: HttpFrontendConfig) -> std::io::Result<()> {
    let addr = config.listen;
    let server = build_server(plane, config)?;
    let handle = server.handle();
    tokio::spawn(async move {
        let _ = signal::ctrl_c().await;
        handle.stop(true).await;
    });
    info!("http frontend listening on {}", addr);
    server.await
}

fn build_server(plane: Arc<ControlPlane>, config: HttpFrontendConfig) -> std::io::Result<Server> {
    if !config.auth.enabled {
        info!("Authentication disabled; every caller may control the rotator");
    }
    let plane_data = web::Data::from(plane);
    let auth_data = web::Data::new(AuthState::new(config.auth));
    let context_data = web::Data::new(FrontendContext {
        station: config.station,
        beam: BeamShape::default(),
    });

    let server = HttpServer::new(move || {
        App::new()
            .wrap(AuthMiddleware)
            .app_data(plane_data.clone())
            .app_data(auth_data.clone())
            .app_data(context_data.clone())
            .configure(api::configure)
    })
    .shutdown_timeout(1)
    .disable_signals()
    .bind(config.listen)?
    .run();
    Ok(server)
}
