//
// Copyright 2017-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//


//! Core types for the diagnostic console

use std::fmt;
use std::str::FromStr;
use tracing::Level;

/// Unique identifier for a connection (monotonically increasing, never reused)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Create a new connection ID
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the underlying u64 value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// The backend feeding a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionKind {
    /// An accepted TCP client
    Telnet,
    /// The process's own terminal
    Stdio,
    /// A command file being replayed
    Script,
}

impl fmt::Display for ConnectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Telnet => write!(f, "telnet"),
            Self::Stdio => write!(f, "stdio"),
            Self::Script => write!(f, "script"),
        }
    }
}

/// Which process log events are echoed to a connection
///
/// Stored as an atomic u8 on the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum LogEchoMode {
    /// No echo
    #[default]
    Off = 0,
    /// Warnings and errors only
    Warnings = 1,
    /// Every event
    All = 2,
}

impl LogEchoMode {
    /// Every mode, in ascending verbosity
    pub const ALL: [LogEchoMode; 3] = [LogEchoMode::Off, LogEchoMode::Warnings, LogEchoMode::All];

    /// Convert from u8 (for atomic operations)
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Warnings,
            2 => Self::All,
            _ => Self::Off,
        }
    }

    /// Convert to u8 (for atomic operations)
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Name accepted by the `logEcho` command
    pub fn name(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Warnings => "warn",
            Self::All => "all",
        }
    }

    /// Check whether an event of `level` passes this mode
    pub fn allows(self, level: Level) -> bool {
        match self {
            Self::Off => false,
            Self::Warnings => level <= Level::WARN,
            Self::All => true,
        }
    }
}

impl fmt::Display for LogEchoMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LogEchoMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LogEchoMode::ALL
            .into_iter()
            .find(|mode| mode.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("expected one of off, warn, all; got '{}'", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id() {
        let id1 = ConnectionId::new(1);
        let id2 = ConnectionId::new(2);

        assert_eq!(id1.as_u64(), 1);
        assert_ne!(id1, id2);
        assert!(id1 < id2);
        assert_eq!(id2.to_string(), "conn-2");
    }

    #[test]
    fn test_echo_mode_table_complete() {
        for mode in LogEchoMode::ALL {
            assert_eq!(LogEchoMode::from_u8(mode.as_u8()), mode);
            assert_eq!(mode.name().parse::<LogEchoMode>(), Ok(mode));
        }
        let mut names: Vec<&str> = LogEchoMode::ALL.iter().map(|mode| mode.name()).collect();
        names.dedup();
        assert_eq!(names.len(), LogEchoMode::ALL.len());
    }

    #[test]
    fn test_echo_mode_filtering() {
        assert!(!LogEchoMode::Off.allows(Level::ERROR));
        assert!(LogEchoMode::Warnings.allows(Level::ERROR));
        assert!(LogEchoMode::Warnings.allows(Level::WARN));
        assert!(!LogEchoMode::Warnings.allows(Level::INFO));
        assert!(LogEchoMode::All.allows(Level::TRACE));
    }

    #[test]
    fn test_echo_mode_parse_rejects_unknown() {
        assert!("loud".parse::<LogEchoMode>().is_err());
        assert_eq!("WARN".parse::<LogEchoMode>(), Ok(LogEchoMode::Warnings));
    }
}
