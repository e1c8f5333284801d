// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! rotctld line protocol.
//!
//! Commands are single ASCII lines. Replies carry no request id, so a reply
//! can only be classified by its shape: a leading number is a position, a
//! line holding the `RPRT` marker is a status report.

use std::fmt;

use crate::rotator::error::{RotError, RotResult};

/// Marker token rotctld uses for status/error report lines.
pub const ERROR_REPORT_MARKER: &str = "RPRT";

/// Command written to the daemon.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RotCommand {
    /// `p`: report current position.
    GetPosition,
    /// `P <az> <el>`: move to position.
    SetPosition { azimuth: f64, elevation: f64 },
    /// `S`: stop movement.
    Stop,
}

impl RotCommand {
    pub fn set_azimuth(azimuth: f64) -> Self {
        Self::SetPosition {
            azimuth,
            elevation: 0.0,
        }
    }

    /// Wire representation without the trailing newline.
    pub fn to_line(&self) -> String {
        match self {
            Self::GetPosition => "p".to_string(),
            Self::SetPosition { azimuth, elevation } => format!("P {azimuth} {elevation}"),
            Self::Stop => "S".to_string(),
        }
    }

    pub fn verb(&self) -> &'static str {
        match self {
            Self::GetPosition => "p",
            Self::SetPosition { .. } => "P",
            Self::Stop => "S",
        }
    }
}

impl fmt::Display for RotCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_line())
    }
}

/// Classified inbound data chunk.
#[derive(Debug, Clone, PartialEq)]
pub enum DaemonReply {
    /// Raw azimuth reading from the first reply line, not yet normalized.
    Position(f64),
    /// `RPRT <code>` status line.
    Report(Option<i32>),
    /// Anything else.
    Unparsed(String),
}

impl DaemonReply {
    /// Classify one inbound chunk. Only its first non-empty line is looked
    /// at; the elevation line that follows a position is ignored.
    pub fn parse(chunk: &str) -> Self {
        let Some(line) = chunk.lines().map(str::trim).find(|l| !l.is_empty()) else {
            return Self::Unparsed(String::new());
        };

        if line.contains(ERROR_REPORT_MARKER) {
            let code = line
                .split_whitespace()
                .skip_while(|tok| *tok != ERROR_REPORT_MARKER)
                .nth(1)
                .and_then(|tok| tok.parse::<i32>().ok());
            return Self::Report(code);
        }

        match line
            .split_whitespace()
            .next()
            .and_then(|tok| tok.parse::<f64>().ok())
        {
            Some(value) if value.is_finite() => Self::Position(value),
            _ => Self::Unparsed(line.to_string()),
        }
    }

    /// Azimuth carried by this reply, if any.
    pub fn azimuth(&self) -> RotResult<f64> {
        match self {
            Self::Position(az) => Ok(*az),
            Self::Report(code) => Err(RotError::Protocol(format!(
                "status report {}",
                code.map(|c| c.to_string()).unwrap_or_else(|| "?".into())
            ))),
            Self::Unparsed(line) => Err(RotError::Protocol(line.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_lines() {
        assert_eq!(RotCommand::GetPosition.to_line(), "p");
        assert_eq!(RotCommand::set_azimuth(185.0).to_line(), "P 185 0");
        assert_eq!(RotCommand::set_azimuth(12.5).to_line(), "P 12.5 0");
        assert_eq!(RotCommand::Stop.to_line(), "S");
    }

    #[test]
    fn parses_first_line_only() {
        assert_eq!(DaemonReply::parse("185.000000\n10.000000\n"), DaemonReply::Position(185.0));
        assert_eq!(DaemonReply::parse("-10\n"), DaemonReply::Position(-10.0));
        assert_eq!(DaemonReply::parse("\n  42 7\n"), DaemonReply::Position(42.0));
    }

    #[test]
    fn report_lines_are_not_positions() {
        assert_eq!(DaemonReply::parse("RPRT 0\n"), DaemonReply::Report(Some(0)));
        assert_eq!(DaemonReply::parse("RPRT -1"), DaemonReply::Report(Some(-1)));
        assert!(DaemonReply::parse("RPRT 0").azimuth().is_err());
    }

    #[test]
    fn garbage_is_unparsed() {
        assert!(matches!(DaemonReply::parse("hello"), DaemonReply::Unparsed(_)));
        assert!(matches!(DaemonReply::parse("NaN"), DaemonReply::Unparsed(_)));
        assert!(matches!(DaemonReply::parse(""), DaemonReply::Unparsed(_)));
    }
}
