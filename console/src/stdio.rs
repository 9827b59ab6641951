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


//! Console on the process's own stdin and stdout
//!
//! Enabled only when the configured environment variable is `"1"`. A
//! dedicated thread performs the blocking stdin reads and hands each chunk
//! to the async side over a bounded channel; commands always run on the
//! runtime, never on the reader thread.

use crate::connection::{Connection, Transport, to_crlf};
use crate::console::Console;
use crate::terminal_driver::{CrosstermDriver, RawModeGuard, TerminalDriver};
use crate::types::ConnectionKind;
use crate::utf8::Utf8Decoder;
use crate::Result;
use std::io::{self, IsTerminal, Read, Write};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const INTERRUPT: char = '\x03';
const SUSPEND: char = '\x1a';

/// Control characters delivered as process signals
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ControlSignal {
    Interrupt,
    Suspend,
}

impl ControlSignal {
    fn from_char(ch: char) -> Option<Self> {
        match ch {
            INTERRUPT => Some(ControlSignal::Interrupt),
            SUSPEND => Some(ControlSignal::Suspend),
            _ => None,
        }
    }
}

/// Raise `signal` against this process with the terminal in its original
/// mode, then return to raw mode once the process carries on.
fn raise_signal(driver: &dyn TerminalDriver, signal: ControlSignal) {
    if let Err(error) = driver.restore_mode() {
        warn!(%error, "Failed to restore terminal before signal");
    }
    deliver(signal);
    if let Err(error) = driver.enable_raw_mode() {
        warn!(%error, "Failed to re-enable raw mode after signal");
    }
}

#[cfg(unix)]
fn deliver(signal: ControlSignal) {
    use nix::sys::signal::{Signal, raise};
    let signal = match signal {
        ControlSignal::Interrupt => Signal::SIGINT,
        ControlSignal::Suspend => Signal::SIGTSTP,
    };
    if let Err(error) = raise(signal) {
        warn!(?signal, %error, "Failed to raise signal");
    }
}

#[cfg(not(unix))]
fn deliver(signal: ControlSignal) {
    debug!(?signal, "Signal delivery is not supported on this platform");
}

struct StdioTransport {
    /// Present while stdin is an interactive terminal in raw mode
    driver: Option<Arc<dyn TerminalDriver>>,
}

impl StdioTransport {
    fn write(&self, bytes: &[u8]) {
        let mut stdout = io::stdout().lock();
        if let Err(error) = stdout.write_all(bytes).and_then(|()| stdout.flush()) {
            debug!(%error, "Unable to write to stdout");
        }
    }
}

impl Transport for StdioTransport {
    fn write_output(&self, text: &str) {
        if self.driver.is_some() {
            self.write(to_crlf(text).as_bytes());
        } else {
            self.write(text.as_bytes());
        }
    }

    fn print_internal(&self, bytes: &[u8]) {
        self.write(bytes);
    }

    fn on_interrupt(&self) {
        if let Some(driver) = &self.driver {
            raise_signal(driver.as_ref(), ControlSignal::Interrupt);
        }
    }
}

/// Attach the stdio console if the environment gate allows it.
///
/// Returns `None` when stdin is disabled. The returned task finishes when
/// stdin closes or the connection is disconnected.
pub fn start_stdio(console: &Arc<Console>) -> Result<Option<JoinHandle<()>>> {
    let config = console.config();
    if !config.stdin_enabled() {
        debug!(env_var = %config.stdin_env_var, "Stdin console disabled");
        return Ok(None);
    }

    let (sender, receiver) = mpsc::channel(config.input_channel_capacity.max(1));
    std::thread::Builder::new()
        .name("diagnostix-stdin".to_string())
        .spawn(move || read_stdin(sender))?;

    let (driver, guard) = if io::stdin().is_terminal() {
        let driver: Arc<dyn TerminalDriver> = Arc::new(CrosstermDriver::new());
        let guard = RawModeGuard::enable(driver.clone())?;
        (Some(driver), Some(guard))
    } else {
        (None, None)
    };

    let connection = console.attach(
        ConnectionKind::Stdio,
        "stdio",
        StdioTransport {
            driver: driver.clone(),
        },
    );
    connection.set_echo_input(driver.is_some());
    info!(connection_id = %connection.id(), raw = driver.is_some(), "Stdin console attached");

    let console = console.clone();
    Ok(Some(tokio::spawn(async move {
        drive(&console, &connection, receiver, driver).await;
        drop(guard);
    })))
}

/// Blocking reader, run on its own thread
fn read_stdin(sender: mpsc::Sender<Vec<u8>>) {
    let mut stdin = io::stdin().lock();
    let mut buffer = [0u8; 1024];
    loop {
        match stdin.read(&mut buffer) {
            Ok(0) => break,
            Ok(read) => {
                if sender.blocking_send(buffer[..read].to_vec()).is_err() {
                    break;
                }
            }
            Err(error) if error.kind() == io::ErrorKind::Interrupted => continue,
            Err(error) => {
                warn!(%error, "Stdin read failed");
                break;
            }
        }
    }
    debug!("Stdin reader finished");
}

/// Process stdin chunks for `connection` until the input ends.
///
/// Interrupt and suspend characters become signals when `driver` is set
/// and the current line is empty. Stdin closing after any input injects
/// `quit`.
pub(crate) async fn drive(
    console: &Arc<Console>,
    connection: &Arc<Connection>,
    mut input: mpsc::Receiver<Vec<u8>>,
    driver: Option<Arc<dyn TerminalDriver>>,
) {
    let mut decoder = Utf8Decoder::new();
    let mut received_input = false;

    loop {
        let chunk = tokio::select! {
            _ = connection.closed() => break,
            chunk = input.recv() => chunk,
        };
        let Some(bytes) = chunk else {
            if received_input && !connection.is_closing() {
                info!("Stdin closed, shutting down");
                console.execute(connection, "quit");
            }
            break;
        };
        received_input |= !bytes.is_empty();
        let text = decoder.decode(&bytes);
        match driver.as_deref() {
            Some(driver) => forward_with_signals(console, connection, &text, driver).await,
            None => console.process_input(connection, &text).await,
        }
    }

    console.detach(connection.id());
}

async fn forward_with_signals(
    console: &Arc<Console>,
    connection: &Arc<Connection>,
    text: &str,
    driver: &dyn TerminalDriver,
) {
    let mut rest = text;
    while let Some(index) = rest.find([INTERRUPT, SUSPEND]) {
        let (head, tail) = rest.split_at(index);
        if !head.is_empty() {
            console.process_input(connection, head).await;
        }
        let (control, remainder) = tail.split_at(1);
        rest = remainder;
        match control.chars().next().and_then(ControlSignal::from_char) {
            Some(signal) if connection.is_line_empty() => {
                debug!(?signal, "Translating control character to signal");
                raise_signal(driver, signal);
            }
            _ => console.process_input(connection, control).await,
        }
    }
    if !rest.is_empty() {
        console.process_input(connection, rest).await;
    }
}
