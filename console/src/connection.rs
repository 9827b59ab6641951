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


//! Console connections
//!
//! A [`Connection`] owns one line editor and the per-client session state:
//!
//! - a suspend depth; while it is above zero, printed lines are held back and
//!   delivered in order once the depth returns to zero
//! - an optional recording file mirroring every printed line
//! - named time marks
//! - a pending input delay
//!
//! The backend specific part is a [`Transport`], which only moves bytes.

use crate::types::{ConnectionId, ConnectionKind, LogEchoMode};
use chrono::{DateTime, Utc};
use diagnostix_lineedit::{Completer, EditOutcome, LineEditor};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::{info, warn};

/// Prefix marking a printed line as an error
pub const ERROR_PREFIX: &str = "ERROR: ";

/// Byte sink behind a connection
///
/// Implementations are called with the connection's state lock held and must
/// not call back into the connection.
pub trait Transport: Send + Sync {
    /// Deliver one printed line, terminated with `\n`
    fn write_output(&self, text: &str);

    /// Deliver protocol bytes: negotiation and line editor echo
    fn print_internal(&self, bytes: &[u8]);

    /// The line editor aborted the current line
    fn on_interrupt(&self) {}

    /// The connection has been removed from the console
    fn close(&self) {}
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn write_output(&self, text: &str) {
        (**self).write_output(text)
    }

    fn print_internal(&self, bytes: &[u8]) {
        (**self).print_internal(bytes)
    }

    fn on_interrupt(&self) {
        (**self).on_interrupt()
    }

    fn close(&self) {
        (**self).close()
    }
}

/// Translate bare `\n` into `\r\n`
pub(crate) fn to_crlf(text: &str) -> Cow<'_, str> {
    if !text.contains('\n') {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len() + 8);
    let mut previous = '\0';
    for ch in text.chars() {
        if ch == '\n' && previous != '\r' {
            out.push('\r');
        }
        out.push(ch);
        previous = ch;
    }
    Cow::Owned(out)
}

struct Recording {
    path: PathBuf,
    file: File,
}

struct SessionState {
    editor: LineEditor,
    suspend_depth: usize,
    held: Vec<String>,
    recording: Option<Recording>,
    time_marks: HashMap<String, DateTime<Utc>>,
    resume_input_at: Option<Instant>,
}

/// One attached console client
pub struct Connection {
    id: ConnectionId,
    kind: ConnectionKind,
    name: String,
    transport: Box<dyn Transport>,
    state: Mutex<SessionState>,
    echo_mode: AtomicU8,
    echo_input: AtomicBool,
    in_flight: AtomicUsize,
    deferred: Mutex<Vec<JoinHandle<()>>>,
    closing: CancellationToken,
    created_at: std::time::Instant,
}

impl Connection {
    pub fn new(
        id: ConnectionId,
        kind: ConnectionKind,
        name: impl Into<String>,
        history_limit: usize,
        transport: Box<dyn Transport>,
    ) -> Self {
        Self {
            id,
            kind,
            name: name.into(),
            transport,
            state: Mutex::new(SessionState {
                editor: LineEditor::with_history_limit(history_limit),
                suspend_depth: 0,
                held: Vec::new(),
                recording: None,
                time_marks: HashMap::new(),
                resume_input_at: None,
            }),
            echo_mode: AtomicU8::new(LogEchoMode::Off.as_u8()),
            echo_input: AtomicBool::new(true),
            in_flight: AtomicUsize::new(0),
            deferred: Mutex::new(Vec::new()),
            closing: CancellationToken::new(),
            created_at: std::time::Instant::now(),
        }
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn kind(&self) -> ConnectionKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn created_at(&self) -> std::time::Instant {
        self.created_at
    }

    // ===== Output =====

    /// Print a line of output
    pub fn print(&self, text: &str) {
        let mut state = self.state();
        let failed = match state.recording.as_mut() {
            Some(recording) => writeln!(recording.file, "{}", text)
                .err()
                .map(|error| (recording.path.clone(), error)),
            None => None,
        };
        if let Some((path, error)) = failed {
            warn!(
                connection_id = %self.id,
                path = %path.display(),
                %error,
                "Session recording failed, stopping"
            );
            state.recording = None;
        }
        let line = format!("{}\n", text);
        if state.suspend_depth > 0 {
            state.held.push(line);
        } else {
            self.transport.write_output(&line);
        }
    }

    /// Print a line of output marked as an error
    pub fn print_error(&self, text: &str) {
        self.print(&format!("{}{}", ERROR_PREFIX, text));
    }

    /// Write protocol bytes, bypassing recording and suspension
    pub fn print_internal(&self, bytes: &[u8]) {
        self.transport.print_internal(bytes);
    }

    // ===== Suspension =====

    /// Hold back printed output until the matching [`resume`](Self::resume)
    pub fn suspend(&self) {
        self.state().suspend_depth += 1;
    }

    /// Undo one [`suspend`](Self::suspend). Held output is delivered when
    /// the depth returns to zero.
    ///
    /// # Panics
    ///
    /// Panics if the connection is not suspended.
    pub fn resume(&self) {
        let mut state = self.state();
        assert!(
            state.suspend_depth > 0,
            "resume() called on {} without a matching suspend()",
            self.id
        );
        state.suspend_depth -= 1;
        if state.suspend_depth == 0 {
            for line in std::mem::take(&mut state.held) {
                self.transport.write_output(&line);
            }
        }
    }

    pub fn suspend_depth(&self) -> usize {
        self.state().suspend_depth
    }

    // ===== Recording =====

    /// Start mirroring printed output into `path`, replacing any current
    /// recording. Returns false if the file could not be created.
    pub fn record_session(&self, path: &Path) -> bool {
        match File::create(path) {
            Ok(file) => {
                info!(connection_id = %self.id, path = %path.display(), "Recording session");
                self.state().recording = Some(Recording {
                    path: path.to_path_buf(),
                    file,
                });
                true
            }
            Err(error) => {
                warn!(
                    connection_id = %self.id,
                    path = %path.display(),
                    %error,
                    "Unable to open session recording"
                );
                false
            }
        }
    }

    /// Stop recording, returning the path that was being recorded
    pub fn stop_recording(&self) -> Option<PathBuf> {
        let recording = self.state().recording.take()?;
        info!(connection_id = %self.id, path = %recording.path.display(), "Recording stopped");
        Some(recording.path)
    }

    pub fn is_recording(&self) -> bool {
        self.state().recording.is_some()
    }

    // ===== Time marks =====

    pub fn set_time_mark(&self, name: &str, timestamp: DateTime<Utc>) {
        self.state().time_marks.insert(name.to_string(), timestamp);
    }

    pub fn time_mark(&self, name: &str) -> Option<DateTime<Utc>> {
        self.state().time_marks.get(name).copied()
    }

    // ===== Input =====

    /// Delay processing of further input on this connection only
    pub fn delay_input_for(&self, delay: Duration) {
        self.state().resume_input_at = Some(Instant::now() + delay);
    }

    /// Wait out a pending input delay
    pub(crate) async fn input_ready(&self) {
        let resume_at = self.state().resume_input_at.take();
        if let Some(resume_at) = resume_at {
            tokio::time::sleep_until(resume_at).await;
        }
    }

    /// Feed one unit of input to the line editor
    pub fn edit(&self, unit: &str, completer: Option<&dyn Completer>) -> EditOutcome {
        self.state().editor.handle(unit, completer)
    }

    pub fn is_line_empty(&self) -> bool {
        self.state().editor.is_line_empty()
    }

    pub fn current_line(&self) -> String {
        self.state().editor.current_line()
    }

    pub fn set_autocompletion(&self, enabled: bool) {
        self.state().editor.set_autocompletion(enabled);
    }

    pub(crate) fn interrupt(&self) {
        self.transport.on_interrupt();
    }

    /// Whether line editor replies are written back to the client
    pub fn echo_input(&self) -> bool {
        self.echo_input.load(Ordering::SeqCst)
    }

    pub fn set_echo_input(&self, enabled: bool) {
        self.echo_input.store(enabled, Ordering::SeqCst);
    }

    // ===== Log echo =====

    pub fn echo_mode(&self) -> LogEchoMode {
        LogEchoMode::from_u8(self.echo_mode.load(Ordering::SeqCst))
    }

    pub fn set_echo_mode(&self, mode: LogEchoMode) {
        self.echo_mode.store(mode.as_u8(), Ordering::SeqCst);
    }

    // ===== Lifecycle =====

    /// Request that the connection be closed. Teardown happens when the
    /// console next sweeps.
    pub fn disconnect(&self) {
        self.closing.cancel();
    }

    pub fn is_closing(&self) -> bool {
        self.closing.is_cancelled()
    }

    /// Resolves once [`disconnect`](Self::disconnect) has been requested
    pub fn closed(&self) -> WaitForCancellationFuture<'_> {
        self.closing.cancelled()
    }

    pub(crate) fn cancellation_token(&self) -> CancellationToken {
        self.closing.clone()
    }

    pub(crate) fn begin_dispatch(&self) {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn end_dispatch(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    /// Check if a command for this connection is executing
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    /// Hold further input on this connection until `task` completes
    pub(crate) fn defer_until(&self, task: JoinHandle<()>) {
        self.deferred
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(task);
    }

    pub(crate) fn take_deferred(&self) -> Vec<JoinHandle<()>> {
        std::mem::take(&mut *self.deferred.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub(crate) fn close(&self) {
        self.closing.cancel();
        self.transport.close();
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("echo_mode", &self.echo_mode())
            .field("closing", &self.is_closing())
            .finish()
    }
}

/// Transport collecting output in memory
#[derive(Debug, Default, Clone)]
pub struct MemoryTransport {
    output: Arc<Mutex<String>>,
    internal: Arc<Mutex<Vec<u8>>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything printed so far
    pub fn contents(&self) -> String {
        self.output
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Drain everything printed so far
    pub fn take(&self) -> String {
        std::mem::take(&mut *self.output.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Protocol bytes written so far
    pub fn internal(&self) -> Vec<u8> {
        self.internal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Transport for MemoryTransport {
    fn write_output(&self, text: &str) {
        self.output
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_str(text);
    }

    fn print_internal(&self, bytes: &[u8]) {
        self.internal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connection() -> (Connection, MemoryTransport) {
        let transport = MemoryTransport::new();
        let connection = Connection::new(
            ConnectionId::new(1),
            ConnectionKind::Telnet,
            "test",
            10,
            Box::new(transport.clone()),
        );
        (connection, transport)
    }

    #[test]
    fn test_print_and_error_prefix() {
        let (connection, transport) = connection();
        connection.print("hello");
        connection.print_error("bad");
        assert_eq!(transport.contents(), "hello\nERROR: bad\n");
    }

    #[test]
    fn test_nested_suspend_holds_output() {
        let (connection, transport) = connection();
        connection.suspend();
        connection.print("a");
        connection.suspend();
        connection.print("b");
        connection.resume();
        assert_eq!(transport.contents(), "");
        connection.print("c");
        connection.resume();
        assert_eq!(transport.contents(), "a\nb\nc\n");
        assert_eq!(connection.suspend_depth(), 0);
    }

    #[test]
    #[should_panic(expected = "without a matching suspend")]
    fn test_resume_underflow_panics() {
        let (connection, _) = connection();
        connection.resume();
    }

    #[test]
    fn test_print_internal_bypasses_suspend() {
        let (connection, transport) = connection();
        connection.suspend();
        connection.print_internal(b"\xff\xfb\x01");
        assert_eq!(transport.internal(), vec![0xff, 0xfb, 0x01]);
        connection.resume();
    }

    #[test]
    fn test_recording_mirrors_output() {
        let (connection, _) = connection();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.txt");
        assert!(connection.record_session(&path));
        connection.print("one");
        connection.print_error("two");
        assert_eq!(connection.stop_recording(), Some(path.clone()));
        connection.print("three");
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "one\nERROR: two\n"
        );
        assert_eq!(connection.stop_recording(), None);
    }

    #[test]
    fn test_recording_bad_path() {
        let (connection, _) = connection();
        let dir = tempfile::tempdir().unwrap();
        assert!(!connection.record_session(&dir.path().join("missing").join("x.txt")));
        assert!(!connection.is_recording());
    }

    #[test]
    fn test_time_marks() {
        let (connection, _) = connection();
        let now = Utc::now();
        connection.set_time_mark("start", now);
        assert_eq!(connection.time_mark("start"), Some(now));
        assert_eq!(connection.time_mark("other"), None);
    }

    #[test]
    fn test_disconnect_is_a_request() {
        let (connection, _) = connection();
        assert!(!connection.is_closing());
        connection.disconnect();
        assert!(connection.is_closing());
    }

    #[test]
    fn test_crlf_translation() {
        assert_eq!(to_crlf("a\nb"), "a\r\nb");
        assert_eq!(to_crlf("a\r\nb\n"), "a\r\nb\r\n");
        assert!(matches!(to_crlf("plain"), Cow::Borrowed(_)));
    }
}
