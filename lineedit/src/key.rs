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

use enum_kinds::EnumKind;

/// Escape marker that introduces a terminal control sequence
pub const ESC: char = '\x1b';

/// A classified unit of editor input
#[derive(Clone, Debug, PartialEq, Eq, EnumKind)]
#[enum_kind(KeyKind)]
pub enum Key {
    /// Ctrl-L: clear the screen and redraw the line
    ClearScreen,
    /// Ctrl-K: cut from the cursor to the end of the line
    KillToEnd,
    /// Ctrl-U: cut from the start of the line to the cursor
    KillToStart,
    /// Ctrl-C: abandon the current line
    Abort,
    HistoryPrevious,
    HistoryNext,
    CursorLeft,
    CursorRight,
    Home,
    End,
    /// Delete the character before the cursor
    Backspace,
    /// Delete the character under the cursor
    Delete,
    Tab,
    /// Any line terminator variant
    Submit,
    /// A single printable character
    Insert(char),
    /// Input the editor does not act upon
    Unknown(String),
}

impl Key {
    /// Classify one input unit (a single character, a line terminator or a
    /// complete escape sequence).
    pub fn classify(unit: &str) -> Key {
        match unit {
            "\r" | "\r\0" | "\n" | "\r\n" => Key::Submit,
            "\x0c" => Key::ClearScreen,
            "\x0b" => Key::KillToEnd,
            "\x15" => Key::KillToStart,
            "\x03" => Key::Abort,
            "\x1b[A" | "\x1bOA" | "\x10" => Key::HistoryPrevious,
            "\x1b[B" | "\x1bOB" | "\x0e" => Key::HistoryNext,
            "\x1b[D" | "\x1bOD" | "\x02" => Key::CursorLeft,
            "\x1b[C" | "\x1bOC" | "\x06" => Key::CursorRight,
            "\x1b[H" | "\x1bOH" | "\x1b[1~" | "\x1b[7~" | "\x01" => Key::Home,
            "\x1b[F" | "\x1bOF" | "\x1b[4~" | "\x1b[8~" | "\x05" => Key::End,
            "\x7f" | "\x08" => Key::Backspace,
            "\x1b[3~" | "\x04" => Key::Delete,
            "\t" => Key::Tab,
            _ => {
                let mut chars = unit.chars();
                match (chars.next(), chars.next()) {
                    (Some(ch), None) if !ch.is_control() => Key::Insert(ch),
                    _ => Key::Unknown(unit.to_string()),
                }
            }
        }
    }

    /// The discriminant of this key without its payload
    pub fn kind(&self) -> KeyKind {
        KeyKind::from(self)
    }
}

impl KeyKind {
    /// Every key kind, in declaration order
    pub const ALL: [KeyKind; 16] = [
        KeyKind::ClearScreen,
        KeyKind::KillToEnd,
        KeyKind::KillToStart,
        KeyKind::Abort,
        KeyKind::HistoryPrevious,
        KeyKind::HistoryNext,
        KeyKind::CursorLeft,
        KeyKind::CursorRight,
        KeyKind::Home,
        KeyKind::End,
        KeyKind::Backspace,
        KeyKind::Delete,
        KeyKind::Tab,
        KeyKind::Submit,
        KeyKind::Insert,
        KeyKind::Unknown,
    ];

    /// Stable name used in log output
    pub fn name(self) -> &'static str {
        match self {
            KeyKind::ClearScreen => "clear-screen",
            KeyKind::KillToEnd => "kill-to-end",
            KeyKind::KillToStart => "kill-to-start",
            KeyKind::Abort => "abort",
            KeyKind::HistoryPrevious => "history-previous",
            KeyKind::HistoryNext => "history-next",
            KeyKind::CursorLeft => "cursor-left",
            KeyKind::CursorRight => "cursor-right",
            KeyKind::Home => "home",
            KeyKind::End => "end",
            KeyKind::Backspace => "backspace",
            KeyKind::Delete => "delete",
            KeyKind::Tab => "tab",
            KeyKind::Submit => "submit",
            KeyKind::Insert => "insert",
            KeyKind::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for KeyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
