// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::fmt;

use serde::{Deserialize, Serialize};

/// Default rotctld TCP port.
pub const DEFAULT_ROTCTLD_PORT: u16 = 4533;

/// Address of the rotctld daemon.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotctldEndpoint {
    pub host: String,
    pub port: u16,
}

impl RotctldEndpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Address suitable for `TcpStream::connect`.
    pub fn connect_addr(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Parse `host`, `host:port`, `[v6]:port` or `tcp://host:port`.
    pub fn parse(input: &str) -> Result<Self, String> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err("rotctld address is empty".into());
        }
        let addr = trimmed.strip_prefix("tcp://").unwrap_or(trimmed);

        if let Some(rest) = addr.strip_prefix('[') {
            let closing = rest
                .find(']')
                .ok_or("invalid rotctld address: missing closing ']' for IPv6 host")?;
            let host = &rest[..closing];
            let remainder = &rest[closing + 1..];
            if host.is_empty() {
                return Err("invalid rotctld address: host is empty".into());
            }
            let port = if remainder.is_empty() {
                DEFAULT_ROTCTLD_PORT
            } else if let Some(port_str) = remainder.strip_prefix(':') {
                parse_port(port_str)?
            } else {
                return Err("invalid rotctld address: expected ':<port>' after ']'".into());
            };
            return Ok(Self::new(host, port));
        }

        if addr.contains(':') {
            if addr.matches(':').count() > 1 {
                return Err(
                    "invalid rotctld address: IPv6 host must be bracketed like [::1]:4533".into(),
                );
            }
            let (host, port_str) = addr
                .rsplit_once(':')
                .ok_or("invalid rotctld address: expected host:port")?;
            if host.is_empty() {
                return Err("invalid rotctld address: host is empty".into());
            }
            return Ok(Self::new(host, parse_port(port_str)?));
        }

        Ok(Self::new(addr, DEFAULT_ROTCTLD_PORT))
    }
}

impl fmt::Display for RotctldEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.connect_addr())
    }
}

fn parse_port(port_str: &str) -> Result<u16, String> {
    let port: u16 = port_str
        .parse()
        .map_err(|_| format!("invalid rotctld port: '{port_str}'"))?;
    if port == 0 {
        return Err("invalid rotctld port: 0".into());
    }
    Ok(port)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_host_default_port() {
        let parsed = RotctldEndpoint::parse("rotator.local").expect("must parse");
        assert_eq!(parsed, RotctldEndpoint::new("rotator.local", 4533));
    }

    #[test]
    fn parse_ipv4_with_port() {
        let parsed = RotctldEndpoint::parse("tcp://192.168.100.3:4534").expect("must parse");
        assert_eq!(parsed, RotctldEndpoint::new("192.168.100.3", 4534));
        assert_eq!(parsed.to_string(), "192.168.100.3:4534");
    }

    #[test]
    fn parse_bracketed_ipv6() {
        let parsed = RotctldEndpoint::parse("[::1]:7000").expect("must parse");
        assert_eq!(parsed, RotctldEndpoint::new("::1", 7000));
        assert_eq!(parsed.connect_addr(), "[::1]:7000");
    }

    #[test]
    fn reject_unbracketed_ipv6_and_zero_port() {
        let err = RotctldEndpoint::parse("::1:7000").expect_err("must fail");
        assert!(err.contains("must be bracketed"));
        assert!(RotctldEndpoint::parse("host:0").is_err());
        assert!(RotctldEndpoint::parse("   ").is_err());
    }
}
