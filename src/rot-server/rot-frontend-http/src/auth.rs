// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Session-based operator authentication for the HTTP frontend.
//!
//! Operators log in with a username and password and receive a session
//! cookie. Status and the event stream stay public but are shaped by the
//! caller's session; control routes require one.

use actix_web::{
    body::EitherBody,
    cookie::Cookie,
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    get, post, web, Error, HttpRequest, HttpResponse, Responder,
};
use futures_util::future::LocalBoxFuture;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockWriteGuard};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

use rot_core::Authorizer;

pub const SESSION_COOKIE: &str = "rotweb_sid";

/// Name reported for callers when authentication is turned off.
pub const ANONYMOUS_OPERATOR: &str = "anonymous";

/// Unique session identifier (hex-encoded 128-bit random)
pub type SessionId = String;

#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub username: String,
    pub issued_at: SystemTime,
    pub expires_at: SystemTime,
    pub last_seen: SystemTime,
}

impl SessionRecord {
    pub fn is_expired(&self) -> bool {
        SystemTime::now() > self.expires_at
    }
}

/// Thread-safe in-memory session store
#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<SessionId, SessionRecord>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, username: &str, ttl: Duration) -> SessionId {
        let now = SystemTime::now();
        let session_id = Self::generate_session_id();
        let record = SessionRecord {
            username: username.to_string(),
            issued_at: now,
            expires_at: now + ttl,
            last_seen: now,
        };
        self.write().insert(session_id.clone(), record);
        session_id
    }

    /// Live session by ID. Expired sessions are dropped on lookup.
    pub fn get(&self, session_id: &str) -> Option<SessionRecord> {
        let mut store = self.write();
        let record = store.get_mut(session_id)?;
        if record.is_expired() {
            store.remove(session_id);
            return None;
        }
        record.last_seen = SystemTime::now();
        Some(record.clone())
    }

    pub fn remove(&self, session_id: &str) -> bool {
        self.write().remove(session_id).is_some()
    }

    pub fn cleanup_expired(&self) {
        let now = SystemTime::now();
        self.write().retain(|_, record| record.expires_at > now);
    }

    pub fn len(&self) -> usize {
        self.sessions.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<SessionId, SessionRecord>> {
        self.sessions.write().unwrap_or_else(|e| e.into_inner())
    }

    fn generate_session_id() -> SessionId {
        hex::encode(rand::random::<[u8; 16]>())
    }
}

/// Runtime authentication configuration
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub enabled: bool,
    /// username -> password
    pub users: HashMap<String, String>,
    pub session_ttl: Duration,
    pub cookie_secure: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            users: HashMap::new(),
            session_ttl: Duration::from_secs(8 * 60 * 60),
            cookie_secure: false,
        }
    }
}

impl AuthConfig {
    /// Returns the canonical username when the credentials match.
    pub fn check_credentials(&self, username: &str, password: &str) -> Option<String> {
        let expected = self.users.get(username)?;
        constant_time_eq(password, expected).then(|| username.to_string())
    }
}

/// Application data for authentication
pub struct AuthState {
    pub config: AuthConfig,
    pub store: SessionStore,
}

impl AuthState {
    pub fn new(config: AuthConfig) -> Self {
        Self {
            config,
            store: SessionStore::new(),
        }
    }

    /// Username of the session attached to `req`, if any.
    pub fn session_user(&self, req: &HttpRequest) -> Option<String> {
        let session_id = extract_session_id(req)?;
        self.store.get(&session_id).map(|record| record.username)
    }
}

impl Authorizer for AuthState {
    type Context = HttpRequest;

    fn is_authorized(&self, req: &HttpRequest) -> bool {
        !self.config.enabled || self.session_user(req).is_some()
    }

    fn current_user(&self, req: &HttpRequest) -> Option<String> {
        if !self.config.enabled {
            return Some(ANONYMOUS_OPERATOR.to_string());
        }
        self.session_user(req)
    }
}

/// Constant-time string comparison to mitigate timing attacks
fn constant_time_eq(a: &str, b: &str) -> bool {
    let a_bytes = a.as_bytes();
    let b_bytes = b.as_bytes();

    if a_bytes.len() != b_bytes.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a_bytes.iter().zip(b_bytes.iter()) {
        result |= x ^ y;
    }
    result == 0
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthStatus {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

fn extract_session_id(req: &HttpRequest) -> Option<SessionId> {
    req.cookie(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
}

fn session_cookie(value: String, max_age_secs: i64, secure: bool) -> Cookie<'static> {
    let mut cookie = Cookie::new(SESSION_COOKIE, value);
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_secure(secure);
    cookie.set_same_site(actix_web::cookie::SameSite::Lax);
    cookie.set_max_age(actix_web::cookie::time::Duration::seconds(max_age_secs));
    cookie
}

#[post("/login")]
pub async fn login(
    body: web::Json<LoginRequest>,
    auth_state: web::Data<AuthState>,
) -> Result<impl Responder, Error> {
    if !auth_state.config.enabled {
        return Ok(HttpResponse::NotFound().finish());
    }

    let Some(username) = auth_state
        .config
        .check_credentials(&body.username, &body.password)
    else {
        warn!("Rejected login for '{}'", body.username);
        return Ok(HttpResponse::Unauthorized().json(serde_json::json!({
            "error": "Invalid credentials"
        })));
    };

    auth_state.store.cleanup_expired();
    let session_id = auth_state
        .store
        .create(&username, auth_state.config.session_ttl);
    info!("Operator '{}' logged in", username);

    let ttl_secs = auth_state.config.session_ttl.as_secs() as i64;
    let cookie = session_cookie(session_id, ttl_secs, auth_state.config.cookie_secure);

    Ok(HttpResponse::Ok().cookie(cookie).json(AuthStatus {
        authenticated: true,
        username: Some(username),
    }))
}

#[post("/logout")]
pub async fn logout(
    req: HttpRequest,
    auth_state: web::Data<AuthState>,
) -> Result<impl Responder, Error> {
    if !auth_state.config.enabled {
        return Ok(HttpResponse::NotFound().finish());
    }

    if let Some(session_id) = extract_session_id(&req) {
        if auth_state.store.remove(&session_id) {
            debug!("Session closed");
        }
    }

    let cookie = session_cookie(String::new(), 0, auth_state.config.cookie_secure);
    Ok(HttpResponse::Ok().cookie(cookie).json(serde_json::json!({
        "loggedOut": true
    })))
}

#[get("/auth-status")]
pub async fn auth_status(
    req: HttpRequest,
    auth_state: web::Data<AuthState>,
) -> Result<impl Responder, Error> {
    let authenticated = auth_state.is_authorized(&req);
    let username = if authenticated {
        auth_state.current_user(&req)
    } else {
        None
    };
    Ok(HttpResponse::Ok().json(AuthStatus {
        authenticated,
        username,
    }))
}

/// Route classification for access control
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RouteAccess {
    /// Anyone; responses are shaped by session
    Public,
    /// Logged-in operators only
    Control,
}

impl RouteAccess {
    fn from_path(path: &str) -> Self {
        let path = path.split('?').next().unwrap_or(path);
        match path.trim_end_matches('/') {
            "/api/azimuth" | "/api/stop" => Self::Control,
            _ => Self::Public,
        }
    }
}

/// Rejects control routes for callers without a session.
pub struct AuthMiddleware;

impl<S, B> Transform<S, ServiceRequest> for AuthMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthMiddlewareService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(AuthMiddlewareService { service }))
    }
}

pub struct AuthMiddlewareService<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for AuthMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        if RouteAccess::from_path(req.path()) == RouteAccess::Control {
            let allowed = req
                .app_data::<web::Data<AuthState>>()
                .map(|auth_state| auth_state.is_authorized(req.request()))
                .unwrap_or(true);

            if !allowed {
                debug!("Unauthorized {} {}", req.method(), req.path());
                let response = HttpResponse::Unauthorized().json(serde_json::json!({
                    "error": "Authentication required"
                }));
                let res = req.into_response(response).map_into_right_body();
                return Box::pin(async move { Ok(res) });
            }
        }

        let fut = self.service.call(req);
        Box::pin(async move {
            let res = fut.await?;
            Ok(res.map_into_left_body())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    fn enabled_config() -> AuthConfig {
        AuthConfig {
            enabled: true,
            users: HashMap::from([("admin".to_string(), "s3cret".to_string())]),
            ..AuthConfig::default()
        }
    }

    #[test]
    fn test_route_access_classification() {
        assert_eq!(RouteAccess::from_path("/api/azimuth"), RouteAccess::Control);
        assert_eq!(RouteAccess::from_path("/api/stop"), RouteAccess::Control);
        assert_eq!(RouteAccess::from_path("/api/stop/"), RouteAccess::Control);
        assert_eq!(RouteAccess::from_path("/api/status"), RouteAccess::Public);
        assert_eq!(RouteAccess::from_path("/api/events"), RouteAccess::Public);
        assert_eq!(RouteAccess::from_path("/api/position"), RouteAccess::Public);
        assert_eq!(RouteAccess::from_path("/api/login"), RouteAccess::Public);
    }

    #[test]
    fn test_session_store_create_and_get() {
        let store = SessionStore::new();
        let session_id = store.create("admin", Duration::from_secs(3600));
        let record = store.get(&session_id).expect("session");
        assert_eq!(record.username, "admin");
        assert!(!record.is_expired());
        assert_eq!(session_id.len(), 32);
    }

    #[test]
    fn test_session_store_remove() {
        let store = SessionStore::new();
        let session_id = store.create("admin", Duration::from_secs(3600));
        assert!(store.remove(&session_id));
        assert!(store.get(&session_id).is_none());
        assert!(!store.remove(&session_id));
    }

    #[test]
    fn test_expired_session_is_dropped() {
        let store = SessionStore::new();
        let session_id = store.create("admin", Duration::ZERO);
        std::thread::sleep(Duration::from_millis(5));
        assert!(store.get(&session_id).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq("test", "test"));
        assert!(!constant_time_eq("test", "fail"));
        assert!(!constant_time_eq("test", "test2"));
        assert!(!constant_time_eq("", "test"));
    }

    #[test]
    fn test_check_credentials() {
        let config = enabled_config();
        assert_eq!(
            config.check_credentials("admin", "s3cret"),
            Some("admin".to_string())
        );
        assert_eq!(config.check_credentials("admin", "wrong"), None);
        assert_eq!(config.check_credentials("nobody", "s3cret"), None);
    }

    #[test]
    fn test_authorizer_with_session_cookie() {
        let state = AuthState::new(enabled_config());
        let anonymous = TestRequest::default().to_http_request();
        assert!(!state.is_authorized(&anonymous));

        let session_id = state.store.create("admin", Duration::from_secs(60));
        let req = TestRequest::default()
            .cookie(Cookie::new(SESSION_COOKIE, session_id))
            .to_http_request();
        assert!(state.is_authorized(&req));
        assert_eq!(state.current_user(&req), Some("admin".to_string()));
    }

    #[test]
    fn test_authorizer_when_disabled() {
        let state = AuthState::new(AuthConfig::default());
        let req = TestRequest::default().to_http_request();
        assert!(state.is_authorized(&req));
        assert_eq!(state.current_user(&req), Some(ANONYMOUS_OPERATOR.to_string()));
    }
}
