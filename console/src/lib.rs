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


//! # Diagnostix Console
//!
//! An embedded operator console for long-running server processes. Operators
//! reach it over telnet, over the process's own stdin, or by replaying a
//! script file. Every line they type goes through a
//! [`LineEditor`](diagnostix_lineedit::LineEditor) and is dispatched through a
//! shared [`ConsoleRegistry`].
//!
//! # Architecture
//!
//! ```text
//! TelnetServer ─┐
//! stdio ────────┼─→ Connection (line editor, suspension, recording)
//! processFile ──┘        ↓
//!                     Console → ConsoleRegistry → command handlers
//! ```
//!
//! Log events reach telnet clients through an [`EchoLayer`] installed into the
//! process's `tracing` subscriber.
//!
//! # Example
//!
//! ```no_run
//! use diagnostix_console::{Console, ConsoleConfig, TelnetServer};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let console = Console::builder(ConsoleConfig::default()).build()?;
//!     let server = TelnetServer::new(console.clone()).await?;
//!     server.start().await?;
//!     console.wait_for_shutdown().await;
//!     server.shutdown().await?;
//!     Ok(())
//! }
//! ```

mod builtins;
mod collaborators;
mod config;
mod connection;
mod console;
mod error;
mod logging;
mod script;
mod server;
mod stdio;
pub mod telnet;
mod telnet_connection;
mod terminal_driver;
mod types;
mod utf8;

pub use self::collaborators::{ConfigStore, MapConfigStore, SystemTimeReference, TimeReference};
pub use self::config::{ConsoleConfig, DEFAULT_BIND_ADDRESS, DEFAULT_STDIN_ENV_VAR};
pub use self::connection::{Connection, ERROR_PREFIX, MemoryTransport, Transport};
pub use self::console::{Console, ConsoleBuilder, ConsoleRegistry, Session};
pub use self::error::{ConsoleError, Result};
pub use self::logging::{EchoLayer, LogEvent, LogEventSource};
pub use self::server::TelnetServer;
pub use self::stdio::start_stdio;
pub use self::terminal_driver::{CrosstermDriver, RawModeGuard, TerminalDriver, best_effort_restore};
pub use self::types::{ConnectionId, ConnectionKind, LogEchoMode};
pub use self::utf8::Utf8Decoder;
pub use diagnostix_registry::{
    CommandOutput, DispatchOutcome, FnVariable, RegistryError, StandbyProbe, TypedVariable,
};
