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


//! Telnet connection backend
//!
//! Each accepted socket is split into a reader loop and a writer task. The
//! connection's transport only enqueues bytes for the writer, so printing
//! never blocks a command handler. A failed write cancels the connection,
//! which ends the reader loop and removes it from the console.

use crate::connection::{Connection, Transport, to_crlf};
use crate::console::Console;
use crate::telnet::{NEGOTIATION_REQUEST, NegotiationState, TelnetFilter, TelnetInput};
use crate::types::{ConnectionId, ConnectionKind, LogEchoMode};
use crate::utf8::Utf8Decoder;
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use metrics::counter;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::{BytesCodec, FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace, warn};

const INTERRUPT: char = '\x03';

struct TelnetTransport {
    writer: mpsc::UnboundedSender<Bytes>,
}

impl TelnetTransport {
    fn send(&self, bytes: Bytes) {
        // The writer task has already cancelled the connection if this fails
        let _ = self.writer.send(bytes);
    }
}

impl Transport for TelnetTransport {
    fn write_output(&self, text: &str) {
        self.send(Bytes::from(to_crlf(text).into_owned()));
    }

    fn print_internal(&self, bytes: &[u8]) {
        self.send(Bytes::copy_from_slice(bytes));
    }
}

/// A running telnet client
pub(crate) struct TelnetSession {
    pub(crate) connection: Arc<Connection>,
    pub(crate) reader: FramedRead<OwnedReadHalf, TelnetFilter>,
}

impl TelnetSession {
    /// Attach a connection for `socket`, queue the negotiation request and
    /// greeting, and start the writer task.
    #[instrument(skip(console, socket, greeting))]
    pub(crate) fn open(
        console: &Arc<Console>,
        socket: TcpStream,
        peer_addr: SocketAddr,
        greeting: &str,
    ) -> Self {
        let (read_half, write_half) = socket.into_split();
        let (writer, queue) = mpsc::unbounded_channel();
        let connection = console.attach(
            ConnectionKind::Telnet,
            &peer_addr.to_string(),
            TelnetTransport { writer },
        );
        // Until the client acknowledges, it echoes locally
        connection.set_echo_input(false);
        connection.print_internal(&NEGOTIATION_REQUEST);
        if !greeting.is_empty() {
            connection.print(greeting);
        }

        counter!("diagnostix.telnet.connections.total").increment(1);
        spawn_writer(
            connection.id(),
            FramedWrite::new(write_half, BytesCodec::new()),
            queue,
            connection.cancellation_token(),
        );

        Self {
            connection,
            reader: FramedRead::new(read_half, TelnetFilter::new()),
        }
    }

    pub(crate) fn id(&self) -> ConnectionId {
        self.connection.id()
    }

    /// Read until the peer closes or the connection is cancelled
    pub(crate) async fn run(mut self, console: Arc<Console>) {
        let connection = self.connection.clone();
        let closing = connection.cancellation_token();
        let mut negotiation = NegotiationState::default();
        let mut decoder = Utf8Decoder::new();

        loop {
            let item = tokio::select! {
                _ = closing.cancelled() => break,
                item = self.reader.next() => item,
            };
            match item {
                Some(Ok(TelnetInput::Data(bytes))) => {
                    counter!("diagnostix.telnet.bytes.received").increment(bytes.len() as u64);
                    let text = decoder.decode(&bytes);
                    forward(&console, &connection, &text).await;
                }
                Some(Ok(TelnetInput::Negotiation { command, option })) => {
                    trace!(connection_id = %connection.id(), %command, option, "Negotiation");
                    if negotiation.accept(command, option) {
                        connection.set_echo_input(true);
                        connection.set_echo_mode(LogEchoMode::Warnings);
                        debug!(connection_id = %connection.id(), "Client switched to character mode");
                    }
                }
                Some(Ok(other)) => {
                    trace!(connection_id = %connection.id(), ?other, "Ignoring telnet control input");
                }
                Some(Err(error)) => {
                    warn!(connection_id = %connection.id(), %error, "Telnet read failed");
                    break;
                }
                None => {
                    info!(connection_id = %connection.id(), "Client closed connection");
                    break;
                }
            }
        }

        console.detach(connection.id());
    }
}

/// Pass decoded input to the console. A trailing interrupt on an empty line
/// becomes an explicit `disconnect`.
async fn forward(console: &Arc<Console>, connection: &Arc<Connection>, text: &str) {
    let Some(head) = text.strip_suffix(INTERRUPT) else {
        console.process_input(connection, text).await;
        return;
    };
    if !head.is_empty() {
        console.process_input(connection, head).await;
    }
    if connection.is_line_empty() {
        console.process_input(connection, "disconnect\r").await;
    } else {
        console
            .process_input(connection, &INTERRUPT.to_string())
            .await;
    }
}

fn spawn_writer(
    id: ConnectionId,
    mut sink: FramedWrite<OwnedWriteHalf, BytesCodec>,
    mut queue: mpsc::UnboundedReceiver<Bytes>,
    closing: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let bytes = tokio::select! {
                biased;
                next = queue.recv() => match next {
                    Some(bytes) => bytes,
                    None => break,
                },
                _ = closing.cancelled() => {
                    // Deliver whatever was queued before the close
                    while let Ok(bytes) = queue.try_recv() {
                        if sink.send(bytes).await.is_err() {
                            break;
                        }
                    }
                    break;
                }
            };
            if let Err(error) = sink.send(bytes).await {
                warn!(connection_id = %id, %error, "Socket write failed, closing connection");
                counter!("diagnostix.telnet.write.errors").increment(1);
                closing.cancel();
                break;
            }
        }
        let _ = SinkExt::<Bytes>::close(&mut sink).await;
        debug!(connection_id = %id, "Writer finished");
    })
}
