// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::sync::Arc;

use actix_web::{get, post, web, HttpRequest, HttpResponse, Responder};
use actix_web::{http::header, Error};
use bytes::Bytes;
use futures_util::future::ready;
use futures_util::stream::{select, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::{self, Duration, Instant};
use tokio_stream::wrappers::{IntervalStream, ReceiverStream};
use tracing::debug;

use rot_core::geo::{beam_polygon, BeamPolygon, GeoPoint};
use rot_core::rotator::controller::handlers;
use rot_core::{AccessContext, ControlPlane, RotError, StatusView};

use crate::auth::{self, AuthState};
use crate::server::FrontendContext;

const PING_INTERVAL: Duration = Duration::from_secs(5);
const EVENT_BUFFER: usize = 64;

fn access_for(req: &HttpRequest, auth_state: &AuthState) -> AccessContext {
    AccessContext::resolve(auth_state, req)
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

/// Map a control-plane error onto a JSON error response.
fn error_response(context: &str, err: RotError) -> HttpResponse {
    match err {
        RotError::Validation(msg) => HttpResponse::BadRequest().json(ErrorBody {
            error: &msg,
            details: None,
        }),
        err if err.is_link_failure() => HttpResponse::ServiceUnavailable().json(ErrorBody {
            error: context,
            details: Some(err.to_string()),
        }),
        other => HttpResponse::InternalServerError().json(ErrorBody {
            error: context,
            details: Some(other.to_string()),
        }),
    }
}

#[get("/status")]
pub async fn status_api(
    req: HttpRequest,
    plane: web::Data<ControlPlane>,
    auth_state: web::Data<AuthState>,
) -> impl Responder {
    let access = access_for(&req, &auth_state);
    HttpResponse::Ok().json(handlers::get_status(&plane, &access))
}

#[post("/azimuth")]
pub async fn set_azimuth(
    body: web::Json<serde_json::Value>,
    plane: web::Data<ControlPlane>,
) -> HttpResponse {
    let Some(azimuth) = body.get("azimuth").and_then(serde_json::Value::as_f64) else {
        return error_response(
            "Failed to send command",
            RotError::validation("Invalid azimuth value"),
        );
    };

    match handlers::set_azimuth(&plane, azimuth).await {
        Ok(outcome) => HttpResponse::Ok().json(outcome),
        Err(e) => error_response("Failed to send command", e),
    }
}

#[post("/stop")]
pub async fn stop(plane: web::Data<ControlPlane>) -> HttpResponse {
    match handlers::stop(&plane).await {
        Ok(outcome) => HttpResponse::Ok().json(outcome),
        Err(e) => error_response("Failed to send stop command", e),
    }
}

#[get("/position")]
pub async fn position(plane: web::Data<ControlPlane>) -> HttpResponse {
    match handlers::get_position(&plane).await {
        Ok(report) => HttpResponse::Ok().json(report),
        Err(e) => error_response("Failed to get position", e),
    }
}

#[derive(Deserialize)]
pub struct BeamQuery {
    pub azimuth: Option<f64>,
}

#[derive(Serialize)]
struct BeamResponse {
    origin: GeoPoint,
    azimuth: f64,
    #[serde(flatten)]
    beam: BeamPolygon,
}

#[get("/beam")]
pub async fn beam(
    query: web::Query<BeamQuery>,
    plane: web::Data<ControlPlane>,
    context: web::Data<FrontendContext>,
) -> HttpResponse {
    let azimuth = match query.azimuth {
        Some(value) => match handlers::validate_azimuth(value) {
            Ok(value) => value,
            Err(e) => return error_response("Invalid beam request", e),
        },
        None => plane.snapshot().current_azimuth,
    };

    HttpResponse::Ok().json(BeamResponse {
        origin: context.station,
        azimuth,
        beam: beam_polygon(context.station, azimuth, &context.beam),
    })
}

fn sse_frame(view: &StatusView) -> Option<Result<Bytes, Error>> {
    serde_json::to_string(view)
        .ok()
        .map(|json| Ok(Bytes::from(format!("data: {json}\n\n"))))
}

#[get("/events")]
pub async fn events(
    req: HttpRequest,
    plane: web::Data<ControlPlane>,
    auth_state: web::Data<AuthState>,
) -> Result<HttpResponse, Error> {
    let access = access_for(&req, &auth_state);
    let (tx, rx) = mpsc::channel::<StatusView>(EVENT_BUFFER);
    let sink = Arc::new(tx);
    let alive = Arc::downgrade(&sink);

    let id = plane
        .subscribe(sink, access)
        .map_err(actix_web::error::ErrorInternalServerError)?;
    debug!("Event stream {:?} opened", id);

    let updates = ReceiverStream::new(rx).filter_map(|view| ready(sse_frame(&view)));

    // Pings stop once the broadcaster drops this subscriber, which ends
    // the stream and lets the browser reconnect.
    let pings = IntervalStream::new(time::interval_at(
        Instant::now() + PING_INTERVAL,
        PING_INTERVAL,
    ))
    .take_while(move |_| ready(alive.strong_count() > 0))
    .map(|_| Ok::<Bytes, Error>(Bytes::from(": ping\n\n")));

    let plane_drop = plane.clone();
    let stream = select(updates, pings);
    let stream = DropStream::new(Box::pin(stream), move || {
        if plane_drop.unsubscribe(id) {
            debug!("Event stream {:?} closed", id);
        }
    });

    Ok(HttpResponse::Ok()
        .insert_header((header::CONTENT_TYPE, "text/event-stream"))
        .insert_header((header::CACHE_CONTROL, "no-cache"))
        .insert_header((header::CONNECTION, "keep-alive"))
        .streaming(stream))
}

/// A stream wrapper that calls a callback when dropped.
struct DropStream<I> {
    inner: std::pin::Pin<Box<dyn futures_util::Stream<Item = I> + 'static>>,
    on_drop: Option<Box<dyn FnOnce() + Send>>,
}

impl<I> DropStream<I> {
    fn new<S, F>(inner: std::pin::Pin<Box<S>>, on_drop: F) -> Self
    where
        S: futures_util::Stream<Item = I> + 'static,
        F: FnOnce() + Send + 'static,
    {
        Self {
            inner,
            on_drop: Some(Box::new(on_drop)),
        }
    }
}

impl<I> Drop for DropStream<I> {
    fn drop(&mut self) {
        if let Some(f) = self.on_drop.take() {
            f();
        }
    }
}

impl<I> futures_util::Stream for DropStream<I> {
    type Item = I;
    fn poll_next(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .service(status_api)
            .service(set_azimuth)
            .service(stop)
            .service(position)
            .service(beam)
            .service(events)
            .service(auth::login)
            .service(auth::logout)
            .service(auth::auth_status),
    );
}
