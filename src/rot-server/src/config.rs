// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Configuration file support for rot-server.
//!
//! The `[rot-server]` section of `rotweb.toml` is searched for in:
//! 1. Path specified via `--config` CLI argument
//! 2. `./rotweb.toml` (current directory)
//! 3. `~/.config/rotweb/rotweb.toml` (XDG config)
//! 4. `/etc/rotweb/rotweb.toml` (system-wide)

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use rot_app::{ConfigError, ConfigFile};
use rot_core::rotator::controller::{FixedPolling, FixedReconnect, LinkPolicy};
use rot_core::RotctldEndpoint;
use rot_frontend_http::AuthConfig;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub general: GeneralConfig,
    pub rotctld: RotctldConfig,
    pub station: StationConfig,
    pub http: HttpConfig,
    pub auth: AuthSection,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: Option<String>,
}

/// rotctld daemon connection and link timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RotctldConfig {
    pub host: String,
    pub port: u16,
    pub reconnect_delay_ms: u64,
    pub poll_interval_ms: u64,
    /// Pause after each write before the caller is released
    pub settle_delay_ms: u64,
    /// Pause after connecting before the first position query
    pub stabilization_delay_ms: u64,
    pub connect_timeout_ms: u64,
}

impl Default for RotctldConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: rot_core::rotator::endpoint::DEFAULT_ROTCTLD_PORT,
            reconnect_delay_ms: 5000,
            poll_interval_ms: 2000,
            settle_delay_ms: 100,
            stabilization_delay_ms: 200,
            connect_timeout_ms: 5000,
        }
    }
}

impl RotctldConfig {
    pub fn endpoint(&self) -> RotctldEndpoint {
        RotctldEndpoint::new(self.host.clone(), self.port)
    }

    pub fn link_policy(&self) -> LinkPolicy {
        LinkPolicy {
            reconnect: Arc::new(FixedReconnect::new(Duration::from_millis(
                self.reconnect_delay_ms,
            ))),
            polling: Arc::new(FixedPolling::new(Duration::from_millis(
                self.poll_interval_ms,
            ))),
            settle_delay: Duration::from_millis(self.settle_delay_ms),
            stabilization_delay: Duration::from_millis(self.stabilization_delay_ms),
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
        }
    }
}

/// Station location, used as the beam origin.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StationConfig {
    pub latitude: f64,
    pub longitude: f64,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            latitude: 52.6667,
            longitude: -8.6333,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub listen: IpAddr,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            listen: IpAddr::from([127, 0, 0, 1]),
            port: 3000,
        }
    }
}

impl HttpConfig {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.listen, self.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserEntry {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSection {
    pub enabled: bool,
    pub users: Vec<UserEntry>,
    /// Session lifetime in minutes
    pub session_ttl_min: u64,
    pub cookie_secure: bool,
}

impl Default for AuthSection {
    fn default() -> Self {
        Self {
            enabled: false,
            users: Vec::new(),
            session_ttl_min: 480,
            cookie_secure: false,
        }
    }
}

impl AuthSection {
    pub fn to_auth_config(&self) -> AuthConfig {
        AuthConfig {
            enabled: self.enabled,
            users: self
                .users
                .iter()
                .map(|u| (u.username.clone(), u.password.clone()))
                .collect::<HashMap<_, _>>(),
            session_ttl: Duration::from_secs(self.session_ttl_min * 60),
            cookie_secure: self.cookie_secure,
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.check().map_err(ConfigError::Invalid)
    }

    fn check(&self) -> Result<(), String> {
        validate_log_level(self.general.log_level.as_deref())?;

        if self.rotctld.host.trim().is_empty() {
            return Err("[rotctld].host must not be empty".to_string());
        }
        if self.rotctld.port == 0 {
            return Err("[rotctld].port must be > 0".to_string());
        }
        for (name, value) in [
            ("reconnect_delay_ms", self.rotctld.reconnect_delay_ms),
            ("poll_interval_ms", self.rotctld.poll_interval_ms),
            ("connect_timeout_ms", self.rotctld.connect_timeout_ms),
        ] {
            if value == 0 {
                return Err(format!("[rotctld].{name} must be > 0"));
            }
        }

        if !(-90.0..=90.0).contains(&self.station.latitude) {
            return Err("[station].latitude must be within [-90, 90]".to_string());
        }
        if !(-180.0..=180.0).contains(&self.station.longitude) {
            return Err("[station].longitude must be within [-180, 180]".to_string());
        }

        if self.http.port == 0 {
            return Err("[http].port must be > 0".to_string());
        }

        if self.auth.enabled {
            if self.auth.users.is_empty() {
                return Err("[auth].users must not be empty when auth is enabled".to_string());
            }
            if self.auth.session_ttl_min == 0 {
                return Err("[auth].session_ttl_min must be > 0".to_string());
            }
        }
        for user in &self.auth.users {
            if user.username.trim().is_empty() || user.password.is_empty() {
                return Err("[auth].users entries need a username and a password".to_string());
            }
        }

        Ok(())
    }

    /// Generate an example configuration as a TOML string.
    pub fn example_toml() -> String {
        let example = ServerConfig {
            general: GeneralConfig {
                log_level: Some("info".to_string()),
            },
            auth: AuthSection {
                enabled: true,
                users: vec![UserEntry {
                    username: "admin".to_string(),
                    password: "change-me".to_string(),
                }],
                ..AuthSection::default()
            },
            ..ServerConfig::default()
        };

        let mut root = toml::Table::new();
        match toml::Value::try_from(&example) {
            Ok(section) => {
                root.insert(Self::section_key().to_string(), section);
            }
            Err(_) => return String::new(),
        }
        toml::to_string_pretty(&root).unwrap_or_default()
    }
}

fn validate_log_level(level: Option<&str>) -> Result<(), String> {
    if let Some(level) = level {
        match level {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(format!(
                    "[general].log_level '{}' is invalid (expected one of: trace, debug, info, warn, error)",
                    level
                ))
            }
        }
    }
    Ok(())
}

impl ConfigFile for ServerConfig {
    fn section_key() -> &'static str {
        "rot-server"
    }
}
