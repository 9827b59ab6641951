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

use std::collections::VecDeque;

/// Command history with wrapping navigation
///
/// Entries are kept in chronological order. The navigation position rests one
/// past the newest entry after every push, so the first `previous()` yields
/// the most recent command.
#[derive(Clone, Debug)]
pub struct History {
    entries: VecDeque<String>,
    position: usize,
    limit: usize,
}

impl History {
    /// Create an empty history retaining at most `limit` entries
    pub fn new(limit: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            position: 0,
            limit: limit.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Current navigation index (equal to `len()` when resting past the newest entry)
    pub fn position(&self) -> usize {
        self.position
    }

    /// Iterate entries, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    /// Append a submitted line. Empty lines are not recorded.
    pub fn push(&mut self, line: &str) {
        if line.is_empty() {
            self.reset();
            return;
        }
        self.entries.push_back(line.to_string());
        while self.entries.len() > self.limit {
            self.entries.pop_front();
        }
        self.reset();
    }

    /// Move the navigation position past the newest entry
    pub fn reset(&mut self) {
        self.position = self.entries.len();
    }

    /// Step back one entry, wrapping from the oldest to the newest.
    pub fn previous(&mut self) -> Option<&str> {
        if self.entries.is_empty() {
            return None;
        }
        self.position = if self.position == 0 {
            self.entries.len() - 1
        } else {
            self.position - 1
        };
        self.entries.get(self.position).map(String::as_str)
    }

    /// Step forward one entry, wrapping from the newest to the oldest.
    pub fn next(&mut self) -> Option<&str> {
        if self.entries.is_empty() {
            return None;
        }
        self.position = if self.position + 1 >= self.entries.len() {
            0
        } else {
            self.position + 1
        };
        self.entries.get(self.position).map(String::as_str)
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new(crate::DEFAULT_HISTORY_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn history_of(lines: &[&str]) -> History {
        let mut history = History::default();
        for line in lines {
            history.push(line);
        }
        history
    }

    #[test]
    fn test_previous_wraps() {
        let mut history = history_of(&["a", "b", "c"]);
        assert_eq!(history.previous(), Some("c"));
        assert_eq!(history.previous(), Some("b"));
        assert_eq!(history.previous(), Some("a"));
        assert_eq!(history.previous(), Some("c"));
    }

    #[test]
    fn test_next_wraps() {
        let mut history = history_of(&["a", "b", "c"]);
        assert_eq!(history.previous(), Some("c"));
        assert_eq!(history.next(), Some("a"));
        assert_eq!(history.next(), Some("b"));
    }

    #[test]
    fn test_empty_history() {
        let mut history = History::default();
        assert_eq!(history.previous(), None);
        assert_eq!(history.next(), None);
    }

    #[test]
    fn test_empty_lines_skipped() {
        let history = history_of(&["a", "", "b"]);
        assert_eq!(history.iter().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn test_limit_drops_oldest() {
        let mut history = History::new(2);
        history.push("a");
        history.push("b");
        history.push("c");
        assert_eq!(history.iter().collect::<Vec<_>>(), vec!["b", "c"]);
        assert_eq!(history.position(), 2);
    }

    #[test]
    fn test_push_resets_position() {
        let mut history = history_of(&["a", "b"]);
        history.previous();
        history.previous();
        history.push("c");
        assert_eq!(history.previous(), Some("c"));
    }
}
