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


use crate::connection::Connection;
use crate::console::Console;
use crate::logging::LogEvent;
use crate::telnet_connection::TelnetSession;
use crate::types::ConnectionId;
use crate::{ConsoleError, Result};
use dashmap::DashMap;
use metrics::{counter, gauge};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Live telnet connections and the log echo subscription they share.
///
/// The subscription exists exactly while the set is non-empty.
struct LiveSet {
    console: Arc<Console>,
    connections: DashMap<ConnectionId, Arc<Connection>>,
    echo_task: Mutex<Option<JoinHandle<()>>>,
}

impl LiveSet {
    fn new(console: Arc<Console>) -> Self {
        Self {
            console,
            connections: DashMap::new(),
            echo_task: Mutex::new(None),
        }
    }

    fn insert(self: &Arc<Self>, connection: Arc<Connection>) {
        let mut echo_task = self.echo_task.lock().unwrap_or_else(PoisonError::into_inner);
        self.connections.insert(connection.id(), connection);
        if echo_task.is_none() {
            let events = self.console.log_source().subscribe();
            *echo_task = Some(tokio::spawn(fan_out(Arc::downgrade(self), events)));
            debug!("Subscribed to log echo");
        }
        gauge!("diagnostix.telnet.connections.active").set(self.connections.len() as f64);
    }

    fn remove(&self, id: ConnectionId) {
        let mut echo_task = self.echo_task.lock().unwrap_or_else(PoisonError::into_inner);
        self.connections.remove(&id);
        if self.connections.is_empty() {
            if let Some(task) = echo_task.take() {
                task.abort();
                debug!("Unsubscribed from log echo");
            }
        }
        gauge!("diagnostix.telnet.connections.active").set(self.connections.len() as f64);
    }

    fn snapshot(&self) -> Vec<Arc<Connection>> {
        self.connections
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    fn is_subscribed(&self) -> bool {
        self.echo_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn len(&self) -> usize {
        self.connections.len()
    }
}

/// Copy every log event to the connections that asked for its level
async fn fan_out(live: Weak<LiveSet>, mut events: broadcast::Receiver<LogEvent>) {
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                counter!("diagnostix.telnet.echo.lagged").increment(skipped);
                continue;
            }
            Err(RecvError::Closed) => break,
        };
        let Some(live) = live.upgrade() else { break };
        let line = event.echo_line();
        // Printing may close a connection, so work from a copy
        for connection in live.snapshot() {
            if !connection.is_closing() && connection.echo_mode().allows(event.level) {
                connection.print(&line);
            }
        }
    }
}

/// TCP listener serving telnet console sessions
pub struct TelnetServer {
    console: Arc<Console>,
    live: Arc<LiveSet>,
    /// TCP listener (shared with the accept loop)
    listener: Arc<tokio::sync::Mutex<TcpListener>>,
    bind_address: SocketAddr,
    started_at: Instant,
    running: Arc<AtomicBool>,
    shutdown_notify: Arc<Notify>,
    accept_handle: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl TelnetServer {
    /// Bind the console's configured address.
    ///
    /// Connections are not accepted until [`start`](Self::start) is called.
    pub async fn new(console: Arc<Console>) -> Result<Self> {
        let address = console.config().bind_address;
        let listener = TcpListener::bind(address)
            .await
            .map_err(|source| ConsoleError::Bind { address, source })?;
        let bind_address = listener.local_addr()?;

        info!(%bind_address, "Telnet console bound");

        Ok(Self {
            live: Arc::new(LiveSet::new(console.clone())),
            console,
            listener: Arc::new(tokio::sync::Mutex::new(listener)),
            bind_address,
            started_at: Instant::now(),
            running: Arc::new(AtomicBool::new(false)),
            shutdown_notify: Arc::new(Notify::new()),
            accept_handle: tokio::sync::Mutex::new(None),
        })
    }

    /// Start accepting connections
    pub async fn start(&self) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(ConsoleError::AlreadyRunning);
        }

        info!(bind_address = %self.bind_address, "Starting telnet console");

        let handle = self.spawn_accept_loop();
        *self.accept_handle.lock().await = Some(handle);
        Ok(())
    }

    fn spawn_accept_loop(&self) -> JoinHandle<()> {
        let console = self.console.clone();
        let live = self.live.clone();
        let listener = self.listener.clone();
        let running = self.running.clone();
        let shutdown_notify = self.shutdown_notify.clone();

        tokio::spawn(async move {
            loop {
                if !running.load(Ordering::SeqCst) {
                    break;
                }

                let accept_result = tokio::select! {
                    result = async { listener.lock().await.accept().await } => result,
                    _ = shutdown_notify.notified() => break,
                };

                match accept_result {
                    Ok((socket, peer_addr)) => {
                        if let Err(error) = socket.set_nodelay(true) {
                            debug!(%peer_addr, %error, "Unable to disable Nagle");
                        }
                        let greeting = console.config().greeting.clone();
                        let session = TelnetSession::open(&console, socket, peer_addr, &greeting);
                        let id = session.id();
                        live.insert(session.connection.clone());
                        info!(connection_id = %id, %peer_addr, "Telnet connection established");

                        let console = console.clone();
                        let live = live.clone();
                        tokio::spawn(async move {
                            session.run(console).await;
                            live.remove(id);
                            info!(connection_id = %id, "Telnet connection closed");
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to accept connection");
                        // Back off on errors to avoid a tight loop
                        tokio::time::sleep(Duration::from_millis(100)).await;
                    }
                }
            }

            info!("Accept loop terminated");
        })
    }

    /// Stop accepting and close every telnet connection
    pub async fn shutdown(&self) -> Result<()> {
        if !self.running.swap(false, Ordering::SeqCst) {
            return Err(ConsoleError::ServerNotRunning);
        }

        info!("Shutting down telnet console");

        self.shutdown_notify.notify_waiters();
        if let Some(handle) = self.accept_handle.lock().await.take() {
            let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
        }

        for connection in self.live.snapshot() {
            self.console.detach(connection.id());
            self.live.remove(connection.id());
        }

        info!("Telnet console shutdown complete");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// The address actually bound, useful when the configured port was 0
    pub fn bind_address(&self) -> SocketAddr {
        self.bind_address
    }

    /// Number of live telnet connections
    pub fn connection_count(&self) -> usize {
        self.live.len()
    }

    /// Check whether the server currently receives log events
    pub fn is_echo_subscribed(&self) -> bool {
        self.live.is_subscribed()
    }

    pub fn console(&self) -> &Arc<Console> {
        &self.console
    }
}

impl std::fmt::Debug for TelnetServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelnetServer")
            .field("bind_address", &self.bind_address())
            .field("running", &self.is_running())
            .field("connection_count", &self.connection_count())
            .field("uptime", &self.started_at.elapsed())
            .finish()
    }
}

impl Drop for TelnetServer {
    fn drop(&mut self) {
        if self.running.load(Ordering::SeqCst) {
            warn!("TelnetServer dropped while still running");
            self.running.store(false, Ordering::SeqCst);
            self.shutdown_notify.notify_waiters();
        }
    }
}
