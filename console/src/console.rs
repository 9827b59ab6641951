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


//! Console runtime
//!
//! The [`Console`] owns the command registry, the external collaborators and
//! every attached [`Connection`]. Input from any backend passes through
//! [`Console::process_input`], which runs the line editor and dispatches
//! completed lines one at a time per connection.
//!
//! Connections are never torn down from inside their own command handler.
//! A disconnect only marks the connection; it is queued for destruction and
//! swept after the current line has been dispatched.

use crate::builtins;
use crate::collaborators::{ConfigStore, MapConfigStore, SystemTimeReference, TimeReference};
use crate::config::ConsoleConfig;
use crate::connection::{Connection, Transport};
use crate::logging::LogEventSource;
use crate::types::{ConnectionId, ConnectionKind};
use crate::{ConsoleError, Result};
use dashmap::DashMap;
use diagnostix_lineedit::InputUnits;
use diagnostix_registry::{CommandOutput, CommandRegistry, DispatchOutcome, StandbyProbe};
use metrics::counter;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

/// Registry type shared by every console connection
pub type ConsoleRegistry = CommandRegistry<Session>;

/// Invocation context handed to command handlers
#[derive(Clone)]
pub struct Session {
    console: Arc<Console>,
    connection: Arc<Connection>,
}

impl Session {
    pub fn new(console: Arc<Console>, connection: Arc<Connection>) -> Self {
        Self {
            console,
            connection,
        }
    }

    pub fn console(&self) -> &Arc<Console> {
        &self.console
    }

    /// The connection that issued the command
    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }
}

impl CommandOutput for Session {
    fn print(&self, text: &str) {
        self.connection.print(text);
    }

    fn print_error(&self, text: &str) {
        self.connection.print_error(text);
    }
}

/// Builder for a [`Console`]
pub struct ConsoleBuilder {
    config: ConsoleConfig,
    config_store: Arc<dyn ConfigStore>,
    time: Arc<dyn TimeReference>,
    log_source: Option<LogEventSource>,
    standby_probe: Option<Arc<dyn StandbyProbe>>,
}

impl ConsoleBuilder {
    pub fn new(config: ConsoleConfig) -> Self {
        Self {
            config,
            config_store: Arc::new(MapConfigStore::new()),
            time: Arc::new(SystemTimeReference::new()),
            log_source: None,
            standby_probe: None,
        }
    }

    /// Set the store queried by the `config` command
    pub fn with_config_store(mut self, store: Arc<dyn ConfigStore>) -> Self {
        self.config_store = store;
        self
    }

    /// Set the time reference used by the time commands
    pub fn with_time_reference(mut self, time: Arc<dyn TimeReference>) -> Self {
        self.time = time;
        self
    }

    /// Use an existing log event source, typically one whose layer is
    /// already installed in the global subscriber
    pub fn with_log_source(mut self, source: LogEventSource) -> Self {
        self.log_source = Some(source);
        self
    }

    /// Set the collaborator reporting exec/standby state
    pub fn with_standby_probe(mut self, probe: Arc<dyn StandbyProbe>) -> Self {
        self.standby_probe = Some(probe);
        self
    }

    /// Build the console and register the built-in commands
    pub fn build(self) -> Result<Arc<Console>> {
        let registry = Arc::new(ConsoleRegistry::new());
        if let Some(probe) = self.standby_probe {
            registry.set_standby_probe(probe);
        }
        builtins::register(&registry, self.config_store.clone())?;

        let log_source = self
            .log_source
            .unwrap_or_else(|| LogEventSource::new(self.config.log_echo_capacity));

        Ok(Arc::new(Console {
            config: self.config,
            registry,
            config_store: self.config_store,
            time: self.time,
            log_source,
            connections: DashMap::new(),
            doomed: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            shutdown: CancellationToken::new(),
        }))
    }
}

/// The diagnostic console
pub struct Console {
    config: ConsoleConfig,
    registry: Arc<ConsoleRegistry>,
    config_store: Arc<dyn ConfigStore>,
    time: Arc<dyn TimeReference>,
    log_source: LogEventSource,
    /// Attached connections
    connections: DashMap<ConnectionId, Arc<Connection>>,
    /// Connections waiting to be destroyed
    doomed: Mutex<Vec<ConnectionId>>,
    next_id: AtomicU64,
    shutdown: CancellationToken,
}

impl Console {
    /// Start building a console
    pub fn builder(config: ConsoleConfig) -> ConsoleBuilder {
        ConsoleBuilder::new(config)
    }

    pub fn config(&self) -> &ConsoleConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ConsoleRegistry> {
        &self.registry
    }

    pub fn config_store(&self) -> &Arc<dyn ConfigStore> {
        &self.config_store
    }

    pub fn time_reference(&self) -> &Arc<dyn TimeReference> {
        &self.time
    }

    pub fn log_source(&self) -> &LogEventSource {
        &self.log_source
    }

    // ===== Connections =====

    /// Create a connection around `transport` and start tracking it
    #[instrument(skip(self, transport))]
    pub fn attach<T>(&self, kind: ConnectionKind, name: &str, transport: T) -> Arc<Connection>
    where
        T: Transport + 'static,
    {
        let id = ConnectionId::new(self.next_id.fetch_add(1, Ordering::SeqCst));
        let connection = Arc::new(Connection::new(
            id,
            kind,
            name,
            self.config.history_limit,
            Box::new(transport),
        ));
        if kind == ConnectionKind::Script {
            connection.set_autocompletion(false);
            connection.set_echo_input(false);
        }
        self.connections.insert(id, connection.clone());
        info!(connection_id = %id, "Connection attached");
        connection
    }

    pub fn connection(&self, id: ConnectionId) -> Option<Arc<Connection>> {
        self.connections.get(&id).map(|entry| entry.value().clone())
    }

    /// Snapshot of every attached connection
    pub fn connections(&self) -> Vec<Arc<Connection>> {
        self.connections
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Queue a connection for destruction at the next sweep
    pub fn schedule_destroy(&self, id: ConnectionId) {
        let mut doomed = self.doomed.lock().unwrap_or_else(PoisonError::into_inner);
        if !doomed.contains(&id) {
            doomed.push(id);
        }
    }

    /// Destroy every queued connection that is not executing a command.
    /// Busy connections stay queued.
    pub fn sweep(&self) {
        let doomed =
            std::mem::take(&mut *self.doomed.lock().unwrap_or_else(PoisonError::into_inner));
        let mut busy = Vec::new();
        for id in doomed {
            if self.connection(id).is_some_and(|connection| connection.is_busy()) {
                busy.push(id);
                continue;
            }
            if let Some((_, connection)) = self.connections.remove(&id) {
                connection.close();
                info!(connection_id = %id, kind = %connection.kind(), "Connection destroyed");
            }
        }
        if !busy.is_empty() {
            self.doomed
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .extend(busy);
        }
    }

    /// Queue and sweep in one step, for backends whose input has ended
    pub fn detach(&self, id: ConnectionId) {
        if let Some(connection) = self.connection(id) {
            connection.disconnect();
        }
        self.schedule_destroy(id);
        self.sweep();
    }

    // ===== Input =====

    /// Run a complete command line on behalf of `connection`
    pub fn execute(self: &Arc<Self>, connection: &Arc<Connection>, line: &str) -> DispatchOutcome {
        let session = Session::new(self.clone(), connection.clone());
        connection.begin_dispatch();
        let outcome = self.registry.dispatch(&session, line);
        connection.end_dispatch();
        if outcome != DispatchOutcome::Empty {
            counter!("diagnostix.console.commands.dispatched").increment(1);
            debug!(connection_id = %connection.id(), ?outcome, "Command dispatched");
        }
        outcome
    }

    /// Feed raw input text from `connection` through its line editor.
    ///
    /// Units are processed strictly in order. A completed line runs to
    /// completion, including any work it deferred such as a script, before
    /// the next unit is looked at. A pending input delay holds back only
    /// this connection.
    pub async fn process_input(self: &Arc<Self>, connection: &Arc<Connection>, text: &str) {
        let registry = self.registry.clone();
        let completer = move |line: &str| registry.complete(line);
        for unit in InputUnits::new(text) {
            connection.input_ready().await;
            if connection.is_closing() {
                break;
            }

            let outcome = connection.edit(unit, Some(&completer));
            if !outcome.reply.is_empty() && connection.echo_input() {
                connection.print_internal(outcome.reply.as_bytes());
            }
            if outcome.interrupt {
                debug!(connection_id = %connection.id(), "Line aborted");
                connection.interrupt();
            }
            if let Some(line) = outcome.line {
                self.run_line(connection, &line).await;
            }
        }
    }

    /// Run one already assembled command line, bypassing the line editor.
    ///
    /// Used for input that is not typed, such as script files, so control
    /// characters inside the line reach the command splitter untouched. The
    /// connection's input delay still applies.
    pub async fn process_line(self: &Arc<Self>, connection: &Arc<Connection>, line: &str) {
        connection.input_ready().await;
        if connection.is_closing() {
            return;
        }
        self.run_line(connection, line).await;
    }

    async fn run_line(self: &Arc<Self>, connection: &Arc<Connection>, line: &str) {
        self.execute(connection, line);
        for task in connection.take_deferred() {
            let _ = task.await;
        }
        if connection.is_closing() {
            self.schedule_destroy(connection.id());
        }
        self.sweep();
    }

    // ===== Shutdown =====

    /// Ask the embedding process to shut down
    pub fn request_shutdown(&self) {
        info!("Console shutdown requested");
        self.shutdown.cancel();
    }

    pub fn shutdown_requested(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Resolves once [`request_shutdown`](Self::request_shutdown) has been called
    pub async fn wait_for_shutdown(&self) {
        self.shutdown.cancelled().await
    }

    /// Disconnect and destroy every connection
    pub fn close_all(&self) {
        for connection in self.connections() {
            connection.disconnect();
            self.schedule_destroy(connection.id());
        }
        self.sweep();
    }
}

impl std::fmt::Debug for Console {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Console")
            .field("connections", &self.connection_count())
            .field("registry", &self.registry)
            .field("shutdown_requested", &self.shutdown_requested())
            .finish()
    }
}

impl From<ConsoleError> for diagnostix_registry::RegistryError {
    fn from(error: ConsoleError) -> Self {
        match error {
            ConsoleError::Registry(error) => error,
            other => diagnostix_registry::RegistryError::Failed(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::MemoryTransport;
    use diagnostix_registry::RegistryError;

    fn console() -> Arc<Console> {
        Console::builder(ConsoleConfig::default()).build().unwrap()
    }

    #[tokio::test]
    async fn test_typed_line_is_dispatched() {
        let console = console();
        let transport = MemoryTransport::new();
        let connection = console.attach(ConnectionKind::Telnet, "t", transport.clone());
        console.process_input(&connection, "help timeOffset\r").await;
        assert!(transport.contents().contains("timeOffset"));
        assert!(transport.internal().ends_with(b"\r\n"));
    }

    #[tokio::test]
    async fn test_unknown_command_reports_error() {
        let console = console();
        let transport = MemoryTransport::new();
        let connection = console.attach(ConnectionKind::Telnet, "t", transport.clone());
        console.process_input(&connection, "bogus 1 2\r").await;
        assert!(transport.contents().starts_with("ERROR: Unknown command 'bogus'"));
    }

    #[tokio::test]
    async fn test_disconnect_is_deferred_until_sweep() {
        let console = console();
        let connection = console.attach(ConnectionKind::Telnet, "t", MemoryTransport::new());
        assert_eq!(console.connection_count(), 1);
        console.process_input(&connection, "disconnect\rhelp\r").await;
        assert!(connection.is_closing());
        assert_eq!(console.connection_count(), 0);
    }

    #[tokio::test]
    async fn test_busy_connection_survives_sweep() {
        let console = console();
        let connection = console.attach(ConnectionKind::Telnet, "t", MemoryTransport::new());
        connection.begin_dispatch();
        console.schedule_destroy(connection.id());
        console.sweep();
        assert_eq!(console.connection_count(), 1);
        connection.end_dispatch();
        console.sweep();
        assert_eq!(console.connection_count(), 0);
    }

    #[tokio::test]
    async fn test_handler_may_disconnect_itself() {
        let console = console();
        console
            .registry()
            .register("bye", "", |session: &Session, _: &[String]| {
                session.connection().disconnect();
                session.console().sweep();
                assert_eq!(session.console().connection_count(), 1);
                Ok(())
            })
            .unwrap();
        let connection = console.attach(ConnectionKind::Telnet, "t", MemoryTransport::new());
        console.schedule_destroy(connection.id());
        console.process_input(&connection, "bye\r").await;
        assert_eq!(console.connection_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_holds_only_this_connection() {
        let console = console();
        let slow_out = MemoryTransport::new();
        let fast_out = MemoryTransport::new();
        let slow = console.attach(ConnectionKind::Telnet, "slow", slow_out.clone());
        let fast = console.attach(ConnectionKind::Telnet, "fast", fast_out.clone());

        let task = {
            let console = console.clone();
            let slow = slow.clone();
            tokio::spawn(async move {
                console
                    .process_input(&slow, "delay 1000\rtimeOffset\r")
                    .await;
            })
        };
        tokio::task::yield_now().await;
        console.process_input(&fast, "timeOffset\r").await;
        assert_eq!(fast_out.contents(), "Time offset: 0 ms\n");
        assert!(slow_out.contents().is_empty());

        tokio::time::advance(std::time::Duration::from_millis(1001)).await;
        task.await.unwrap();
        assert_eq!(slow_out.contents(), "Time offset: 0 ms\n");
    }

    #[tokio::test]
    async fn test_quit_requests_shutdown() {
        let console = console();
        let connection = console.attach(ConnectionKind::Telnet, "t", MemoryTransport::new());
        assert!(!console.shutdown_requested());
        console.process_input(&connection, "quit\r").await;
        assert!(console.shutdown_requested());
    }

    #[test]
    fn test_console_error_into_registry_error() {
        let err: RegistryError = ConsoleError::ConnectionClosed.into();
        assert_eq!(err, RegistryError::Failed("Connection closed".to_string()));
        let err: RegistryError =
            ConsoleError::Registry(RegistryError::UnknownVariable("x".into())).into();
        assert_eq!(err, RegistryError::UnknownVariable("x".into()));
    }
}
