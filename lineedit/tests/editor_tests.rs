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

//! Property and workflow tests for the line editor

use diagnostix_lineedit::{LineEditor, hex_dump};
use proptest::prelude::*;

fn unit_strategy() -> impl Strategy<Value = &'static str> {
    prop_oneof![
        Just("a"),
        Just("z"),
        Just(" "),
        Just("\x1b[D"),
        Just("\x1b[C"),
        Just("\x02"),
        Just("\x06"),
        Just("\x01"),
        Just("\x05"),
        Just("\x7f"),
        Just("\x1b[3~"),
        Just("\x0b"),
        Just("\x15"),
        Just("\x1b[A"),
        Just("\x1b[B"),
        Just("\r"),
    ]
}

proptest! {
    #[test]
    fn cursor_stays_within_line(units in proptest::collection::vec(unit_strategy(), 0..200)) {
        let mut editor = LineEditor::new();
        for unit in units {
            editor.handle(unit, None);
            let len = editor.current_line().chars().count();
            prop_assert!(editor.cursor_position() <= len);
        }
    }

    #[test]
    fn printable_text_round_trips(text in "[a-zA-Z0-9 ]{1,64}") {
        let mut editor = LineEditor::new();
        let mut lines = Vec::new();
        for outcome in editor.feed(&format!("{}\r", text), None) {
            if let Some(line) = outcome.line {
                lines.push(line);
            }
        }
        prop_assert_eq!(lines, vec![text]);
        prop_assert!(editor.is_line_empty());
    }
}

#[test]
fn test_history_recall_then_edit() {
    let mut editor = LineEditor::new();
    editor.feed("get alpha\r", None);
    editor.feed("\x1b[A", None);
    editor.feed("\x7f\x7f\x7f\x7f\x7fbeta", None);
    let lines: Vec<String> = editor
        .feed("\r", None)
        .into_iter()
        .filter_map(|outcome| outcome.line)
        .collect();
    assert_eq!(lines, vec!["get beta".to_string()]);
    let history: Vec<&str> = editor.history().iter().collect();
    assert_eq!(history, vec!["get alpha", "get beta"]);
}

#[test]
fn test_escape_split_across_chunks() {
    let mut editor = LineEditor::new();
    editor.feed("abc\x1b", None);
    assert!(editor.has_pending_escape());
    editor.feed("[", None);
    editor.feed("D\x1b[Dx", None);
    assert_eq!(editor.current_line(), "axbc");
    assert_eq!(editor.cursor_position(), 2);
}

#[test]
fn test_unknown_escape_leaves_buffer() {
    let mut editor = LineEditor::new();
    editor.feed("abc", None);
    let outcomes = editor.feed("\x1b[Z", None);
    assert!(outcomes.iter().all(|o| o.reply.is_empty() && o.line.is_none()));
    assert_eq!(editor.current_line(), "abc");
    assert_eq!(hex_dump("\x1b[Z"), "1b 5b 5a");
}
