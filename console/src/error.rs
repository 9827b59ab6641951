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


//! Error types for the diagnostic console

use diagnostix_registry::RegistryError;
use std::net::SocketAddr;
use thiserror::Error;

/// Result type for console operations
pub type Result<T> = std::result::Result<T, ConsoleError>;

/// Console error types
#[derive(Debug, Error)]
pub enum ConsoleError {
    /// I/O error from a socket, file or terminal
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The telnet listener could not be bound
    #[error("Failed to bind console listener on {address}: {source}")]
    Bind {
        address: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Error raised by the command registry
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Connection has been closed
    #[error("Connection closed")]
    ConnectionClosed,

    /// Server is not running
    #[error("Server not running")]
    ServerNotRunning,

    /// Server was already started
    #[error("Server already running")]
    AlreadyRunning,

    /// Generic error with a message
    #[error("{0}")]
    Other(String),
}

impl ConsoleError {
    /// Check if the error is recoverable
    ///
    /// Recoverable errors affect a single connection and leave the console
    /// itself usable.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ConsoleError::ConnectionClosed | ConsoleError::Io(_) | ConsoleError::Registry(_)
        )
    }

    /// Check if the error is a connection error
    pub fn is_connection_error(&self) -> bool {
        matches!(self, ConsoleError::ConnectionClosed | ConsoleError::Io(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_is_recoverable() {
        assert!(ConsoleError::ConnectionClosed.is_recoverable());
        assert!(ConsoleError::Registry(RegistryError::UnknownCommand("x".into())).is_recoverable());
        assert!(!ConsoleError::ServerNotRunning.is_recoverable());
        assert!(!ConsoleError::AlreadyRunning.is_recoverable());
    }

    #[test]
    fn test_error_is_connection_error() {
        assert!(ConsoleError::ConnectionClosed.is_connection_error());
        assert!(!ConsoleError::Other("x".into()).is_connection_error());
    }

    #[test]
    fn test_error_display() {
        let err = ConsoleError::Bind {
            address: "127.0.0.1:2323".parse().unwrap(),
            source: std::io::Error::new(std::io::ErrorKind::AddrInUse, "address in use"),
        };
        assert_eq!(
            err.to_string(),
            "Failed to bind console listener on 127.0.0.1:2323: address in use"
        );

        let err = ConsoleError::from(RegistryError::ReadOnly("uptime".into()));
        assert_eq!(err.to_string(), "Variable 'uptime' is read-only");
    }
}
