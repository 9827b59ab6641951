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


//! File-script connections
//!
//! A script replays a command file line by line on its own connection. The
//! connection that issued `processFile` is suspended for the duration; when
//! the script disconnects, its transcript is printed into the still
//! suspended output connection and the output connection is resumed, so
//! the whole transcript appears at once.
//!
//! If any line produced an error only the errors are flushed, under a
//! banner naming the file.

use crate::connection::{Connection, ERROR_PREFIX, Transport};
use crate::console::Console;
use crate::types::ConnectionKind;
use crate::{ConsoleError, Result};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
struct Transcript {
    output: String,
    errors: String,
    encountered_error: bool,
    flushed: bool,
}

/// Transport accumulating a script's output for its output connection
pub(crate) struct ScriptTransport {
    output: Arc<Connection>,
    path: PathBuf,
    transcript: Mutex<Transcript>,
}

impl ScriptTransport {
    pub(crate) fn new(output: Arc<Connection>, path: &Path) -> Self {
        Self {
            output,
            path: path.to_path_buf(),
            transcript: Mutex::new(Transcript::default()),
        }
    }
}

impl Transport for ScriptTransport {
    fn write_output(&self, text: &str) {
        let mut transcript = self
            .transcript
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if text.starts_with(ERROR_PREFIX) {
            transcript.encountered_error = true;
            transcript.errors.push_str(text);
        }
        transcript.output.push_str(text);
    }

    fn print_internal(&self, _bytes: &[u8]) {}

    fn close(&self) {
        let transcript = {
            let mut transcript = self
                .transcript
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if transcript.flushed {
                return;
            }
            let taken = std::mem::take(&mut *transcript);
            transcript.flushed = true;
            taken
        };

        if transcript.encountered_error {
            self.output.print_error(&format!(
                "Errors encountered while processing {}:",
                self.path.display()
            ));
            for line in transcript.errors.lines() {
                self.output.print(line);
            }
        } else {
            for line in transcript.output.lines() {
                self.output.print(line);
            }
        }
        self.output.resume();
        info!(
            connection_id = %self.output.id(),
            path = %self.path.display(),
            failed = transcript.encountered_error,
            "Script finished"
        );
    }
}

/// Start replaying `path` with `output` receiving the transcript.
///
/// Fails without side effects if the file cannot be opened. On success the
/// output connection stays suspended and its further input is held until
/// the script has finished.
pub(crate) fn process_file(console: &Arc<Console>, output: &Arc<Connection>, path: &Path) -> Result<()> {
    let file = std::fs::File::open(path)?;
    let runtime = tokio::runtime::Handle::try_current()
        .map_err(|error| ConsoleError::Other(error.to_string()))?;

    output.suspend();
    let script = console.attach(
        ConnectionKind::Script,
        &format!("script:{}", path.display()),
        ScriptTransport::new(output.clone(), path),
    );
    debug!(
        connection_id = %script.id(),
        output = %output.id(),
        path = %path.display(),
        "Processing script"
    );

    let task = runtime.spawn(run_script(
        console.clone(),
        script,
        tokio::fs::File::from_std(file),
    ));
    output.defer_until(task);
    Ok(())
}

async fn run_script(console: Arc<Console>, script: Arc<Connection>, file: tokio::fs::File) {
    let mut lines = BufReader::new(file).lines();
    while !script.is_closing() {
        match lines.next_line().await {
            Ok(Some(line)) => console.process_line(&script, &line).await,
            Ok(None) => break,
            Err(error) => {
                warn!(connection_id = %script.id(), %error, "Script read failed");
                script.print_error(&format!("Read failed: {}", error));
                break;
            }
        }
    }
    if !script.is_closing() {
        console.process_line(&script, "disconnect").await;
    }
    console.detach(script.id());
}
