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

//! Escape sequence accumulation
//!
//! A control sequence is complete when:
//!
//! - it is two characters long and the second character is not one of the
//!   introducers `[` (CSI) or `O` (SS3), or
//! - it is longer than two characters and its final character lies in `@`..=`~`.

use crate::key::ESC;

/// Result of adding input to the accumulator
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EscapeProgress {
    /// More input is needed
    Pending,
    /// The assembled sequence; the accumulator is empty again
    Complete(String),
}

/// Buffer for a partially received control sequence
#[derive(Clone, Debug, Default)]
pub struct EscapeAccumulator {
    pending: String,
}

impl EscapeAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if a sequence is being assembled
    pub fn is_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// The partial sequence assembled so far
    pub fn pending(&self) -> &str {
        &self.pending
    }

    /// Start a new sequence from input that begins with the escape marker.
    pub fn start(&mut self, input: &str) -> EscapeProgress {
        debug_assert!(input.starts_with(ESC));
        self.pending.clear();
        self.extend(input)
    }

    /// Append input to the pending sequence.
    pub fn extend(&mut self, input: &str) -> EscapeProgress {
        self.pending.push_str(input);
        if is_complete(&self.pending) {
            EscapeProgress::Complete(self.take())
        } else {
            EscapeProgress::Pending
        }
    }

    /// Discard the pending sequence, returning it.
    pub fn take(&mut self) -> String {
        std::mem::take(&mut self.pending)
    }
}

/// Check whether an escape sequence is complete.
pub(crate) fn is_complete(sequence: &str) -> bool {
    let mut chars = sequence.chars();
    if chars.next() != Some(ESC) {
        return false;
    }
    let rest: Vec<char> = chars.collect();
    match rest.as_slice() {
        [] => false,
        [second] => !matches!(second, '[' | 'O'),
        [.., last] => ('@'..='~').contains(last),
    }
}
