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

use crate::escape::{EscapeAccumulator, EscapeProgress};
use crate::history::History;
use crate::key::{ESC, Key};
use std::borrow::Cow;
use std::fmt::Write;
use tracing::{debug, trace, warn};

const NEWLINE: &str = "\r\n";
const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";
const ERASE_LINE: &str = "\x1b[K";
const CURSOR_LEFT: &str = "\x1b[D";
const CURSOR_RIGHT: &str = "\x1b[C";

/// Source of tab-completion candidates
///
/// `complete` receives the whole current line and returns candidate words for
/// its final (possibly empty) word.
pub trait Completer {
    fn complete(&self, line: &str) -> Vec<String>;
}

impl<F> Completer for F
where
    F: Fn(&str) -> Vec<String>,
{
    fn complete(&self, line: &str) -> Vec<String> {
        self(line)
    }
}

/// Result of handling one unit of input
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EditOutcome {
    /// The submitted line, when a terminator was received
    pub line: Option<String>,
    /// Terminal control output to echo back to the client
    pub reply: String,
    /// The line was aborted and the host should be interrupted
    pub interrupt: bool,
}

impl EditOutcome {
    fn reply(reply: String) -> Self {
        Self {
            reply,
            ..Default::default()
        }
    }
}

/// Line editing state for one connection
#[derive(Clone, Debug)]
pub struct LineEditor {
    line: Vec<char>,
    cursor: usize,
    escape: EscapeAccumulator,
    history: History,
    autocompletion: bool,
    swallow_linefeed: bool,
}

impl Default for LineEditor {
    fn default() -> Self {
        Self::new()
    }
}

impl LineEditor {
    /// Creates an editor with the default history limit
    pub fn new() -> Self {
        Self::with_history_limit(crate::DEFAULT_HISTORY_LIMIT)
    }

    /// Creates an editor retaining at most `limit` history entries
    pub fn with_history_limit(limit: usize) -> Self {
        Self {
            line: Vec::new(),
            cursor: 0,
            escape: EscapeAccumulator::new(),
            history: History::new(limit),
            autocompletion: true,
            swallow_linefeed: false,
        }
    }

    /// The line being edited
    pub fn current_line(&self) -> String {
        self.line.iter().collect()
    }

    /// Cursor position in characters from the start of the line
    pub fn cursor_position(&self) -> usize {
        self.cursor
    }

    pub fn is_line_empty(&self) -> bool {
        self.line.is_empty()
    }

    pub fn has_pending_escape(&self) -> bool {
        self.escape.is_pending()
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn autocompletion_enabled(&self) -> bool {
        self.autocompletion
    }

    pub fn set_autocompletion(&mut self, enabled: bool) {
        self.autocompletion = enabled;
    }

    /// Handle a chunk of input, splitting it into units first.
    pub fn feed(&mut self, input: &str, completer: Option<&dyn Completer>) -> Vec<EditOutcome> {
        InputUnits::new(input)
            .map(|unit| self.handle(unit, completer))
            .collect()
    }

    /// Handle a single unit of input.
    ///
    /// A unit is one character, one line terminator, or an escape sequence
    /// (whole or partial). Partial sequences are accumulated across calls.
    pub fn handle(&mut self, raw: &str, completer: Option<&dyn Completer>) -> EditOutcome {
        if raw.is_empty() {
            return EditOutcome::default();
        }
        if std::mem::take(&mut self.swallow_linefeed) && matches!(raw, "\n" | "\0") {
            trace!("Swallowing linefeed after carriage return");
            return EditOutcome::default();
        }

        if self.escape.is_pending() && raw.contains(ESC) {
            let dropped = self.escape.take();
            warn!(
                sequence = %hex_dump(&dropped),
                "Escape received while another escape sequence was pending, discarding"
            );
            if !raw.starts_with(ESC) {
                return EditOutcome::default();
            }
        }

        let effective: Cow<'_, str> = if self.escape.is_pending() {
            match self.escape.extend(raw) {
                EscapeProgress::Pending => return EditOutcome::default(),
                EscapeProgress::Complete(sequence) => Cow::Owned(sequence),
            }
        } else if raw.starts_with(ESC) {
            // A new escape also restarts accumulation after a discarded partial
            match self.escape.start(raw) {
                EscapeProgress::Pending => return EditOutcome::default(),
                EscapeProgress::Complete(sequence) => Cow::Owned(sequence),
            }
        } else {
            Cow::Borrowed(raw)
        };

        let key = Key::classify(&effective);
        trace!(key = %key.kind(), "Handling key");
        let outcome = self.apply(key, completer);
        if effective == "\r" && outcome.line.is_some() {
            self.swallow_linefeed = true;
        }
        assert!(
            self.cursor <= self.line.len(),
            "cursor {} beyond line length {}",
            self.cursor,
            self.line.len()
        );
        outcome
    }

    fn apply(&mut self, key: Key, completer: Option<&dyn Completer>) -> EditOutcome {
        match key {
            Key::ClearScreen => EditOutcome::reply(format!("{}{}", CLEAR_SCREEN, self.redraw())),
            Key::KillToEnd => {
                self.line.truncate(self.cursor);
                EditOutcome::reply(self.redraw())
            }
            Key::KillToStart => {
                self.line.drain(..self.cursor);
                self.cursor = 0;
                EditOutcome::reply(self.redraw())
            }
            Key::Abort => {
                self.line.clear();
                self.cursor = 0;
                self.history.reset();
                EditOutcome {
                    line: None,
                    reply: NEWLINE.to_string(),
                    interrupt: true,
                }
            }
            Key::HistoryPrevious => {
                if let Some(entry) = self.history.previous() {
                    self.line = entry.chars().collect();
                    self.cursor = self.line.len();
                }
                EditOutcome::reply(self.redraw())
            }
            Key::HistoryNext => {
                if let Some(entry) = self.history.next() {
                    self.line = entry.chars().collect();
                    self.cursor = self.line.len();
                }
                EditOutcome::reply(self.redraw())
            }
            Key::CursorLeft => {
                if self.cursor > 0 {
                    self.cursor -= 1;
                    EditOutcome::reply(CURSOR_LEFT.to_string())
                } else {
                    EditOutcome::default()
                }
            }
            Key::CursorRight => {
                if self.cursor < self.line.len() {
                    self.cursor += 1;
                    EditOutcome::reply(CURSOR_RIGHT.to_string())
                } else {
                    EditOutcome::default()
                }
            }
            Key::Home => {
                self.cursor = 0;
                EditOutcome::reply(self.redraw())
            }
            Key::End => {
                self.cursor = self.line.len();
                EditOutcome::reply(self.redraw())
            }
            Key::Backspace => {
                if self.cursor > 0 {
                    self.cursor -= 1;
                    self.line.remove(self.cursor);
                }
                EditOutcome::reply(self.redraw())
            }
            Key::Delete => {
                if self.cursor < self.line.len() {
                    self.line.remove(self.cursor);
                }
                EditOutcome::reply(self.redraw())
            }
            Key::Insert(ch) => {
                self.line.insert(self.cursor, ch);
                self.cursor += 1;
                EditOutcome::reply(self.redraw())
            }
            Key::Tab => self.complete(completer),
            Key::Submit => {
                let line: String = self.line.drain(..).collect();
                self.cursor = 0;
                self.history.push(&line);
                EditOutcome {
                    line: Some(line),
                    reply: NEWLINE.to_string(),
                    interrupt: false,
                }
            }
            Key::Unknown(input) => {
                debug!(input = %hex_dump(&input), "Ignoring input");
                EditOutcome::default()
            }
        }
    }

    fn complete(&mut self, completer: Option<&dyn Completer>) -> EditOutcome {
        let Some(completer) = completer.filter(|_| self.autocompletion) else {
            return EditOutcome::default();
        };
        let candidates = completer.complete(&self.current_line());
        match candidates.as_slice() {
            [] => EditOutcome::reply(self.redraw()),
            [single] => {
                let word_start = self
                    .line
                    .iter()
                    .rposition(|ch| ch.is_whitespace())
                    .map_or(0, |index| index + 1);
                self.line.truncate(word_start);
                self.line.extend(single.chars());
                self.line.push(' ');
                self.cursor = self.line.len();
                EditOutcome::reply(self.redraw())
            }
            many => {
                let mut reply = String::from(NEWLINE);
                for candidate in many {
                    reply.push_str(candidate);
                    reply.push_str(NEWLINE);
                }
                reply.push_str(&self.redraw());
                EditOutcome::reply(reply)
            }
        }
    }

    fn redraw(&self) -> String {
        redraw(&self.current_line(), self.line.len() - self.cursor)
    }
}

/// Render a line: carriage return, erase line, content, then enough cursor
/// left moves to leave the cursor `back` characters before the end.
pub fn redraw(line: &str, back: usize) -> String {
    let mut out = String::with_capacity(line.len() + 4 + back * CURSOR_LEFT.len());
    out.push('\r');
    out.push_str(ERASE_LINE);
    out.push_str(line);
    for _ in 0..back {
        out.push_str(CURSOR_LEFT);
    }
    out
}

/// Space separated hexadecimal rendering of the bytes of `input`
pub fn hex_dump(input: &str) -> String {
    let mut out = String::with_capacity(input.len() * 3);
    for (index, byte) in input.bytes().enumerate() {
        if index > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{:02x}", byte);
    }
    out
}

/// Iterator splitting raw input into editor units
///
/// `\r\n` and `\r\0` are yielded as one unit, everything else one character
/// at a time.
pub struct InputUnits<'a> {
    input: &'a str,
}

impl<'a> InputUnits<'a> {
    pub fn new(input: &'a str) -> Self {
        Self { input }
    }
}

impl<'a> Iterator for InputUnits<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let first = self.input.chars().next()?;
        let mut len = first.len_utf8();
        if first == '\r' && matches!(self.input.as_bytes().get(1), Some(b'\n' | b'\0')) {
            len += 1;
        }
        let (unit, rest) = self.input.split_at(len);
        self.input = rest;
        Some(unit)
    }
}
