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

//! # Diagnostix Line Editor
//!
//! A pure, I/O free state machine that turns the raw keystroke stream of a
//! single console connection into edited command lines.
//!
//! The editor owns:
//!
//! - the line buffer and cursor (`0 <= cursor <= len(line)`)
//! - an escape accumulator for partially received control sequences
//! - a bounded command history with wrapping navigation
//! - the autocompletion switch
//!
//! Every call to [`LineEditor::handle`] produces an [`EditOutcome`] holding the
//! terminal control reply that should be echoed back to the client and, when
//! a line terminator was received, the completed command text.
//!
//! ```rust
//! use diagnostix_lineedit::LineEditor;
//!
//! let mut editor = LineEditor::new();
//! let mut completed = Vec::new();
//! for outcome in editor.feed("help\r", None) {
//!     if let Some(line) = outcome.line {
//!         completed.push(line);
//!     }
//! }
//! assert_eq!(completed, vec!["help".to_string()]);
//! ```

mod editor;
mod escape;
mod history;
mod key;

pub use self::editor::{Completer, EditOutcome, InputUnits, LineEditor, hex_dump, redraw};
pub use self::escape::{EscapeAccumulator, EscapeProgress};
pub use self::history::History;
pub use self::key::{ESC, Key, KeyKind};

/// Default number of history entries retained per editor
pub const DEFAULT_HISTORY_LIMIT: usize = 500;
