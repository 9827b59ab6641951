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

//! Command types and the seams the registry calls through

use crate::Result;
use std::sync::Arc;

/// Sink for command output
pub trait CommandOutput {
    /// Report normal output
    fn print(&self, text: &str);
    /// Report a failure
    fn print_error(&self, text: &str);
}

/// External collaborator reporting whether the process is in standby
pub trait StandbyProbe: Send + Sync {
    fn is_standby(&self) -> bool;
}

impl<F> StandbyProbe for F
where
    F: Fn() -> bool + Send + Sync,
{
    fn is_standby(&self) -> bool {
        self()
    }
}

/// Read access to the names known by a registry
pub trait NameIndex {
    fn command_names(&self) -> Vec<String>;
    fn variable_names(&self) -> Vec<String>;
}

/// A command handler. Receives the invocation context and the arguments
/// following the command name.
pub type CommandHandler<C> = Arc<dyn Fn(&C, &[String]) -> Result<()> + Send + Sync>;

/// A completion handler. Receives the registry's names, the arguments typed
/// so far (the last one being the partial word) and pushes every candidate
/// for that position. The registry filters by prefix.
pub type CompletionHandler =
    Arc<dyn Fn(&dyn NameIndex, &[String], &mut Vec<String>) + Send + Sync>;

/// A registered command
pub struct RegisteredCommand<C: ?Sized> {
    pub name: String,
    pub help: String,
    pub handler: CommandHandler<C>,
    pub completion: Option<CompletionHandler>,
    /// May run while standby suppression is active
    pub standby_safe: bool,
}

impl<C: ?Sized> Clone for RegisteredCommand<C> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            help: self.help.clone(),
            handler: self.handler.clone(),
            completion: self.completion.clone(),
            standby_safe: self.standby_safe,
        }
    }
}

impl<C: ?Sized> std::fmt::Debug for RegisteredCommand<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredCommand")
            .field("name", &self.name)
            .field("help", &self.help)
            .field("completion", &self.completion.is_some())
            .field("standby_safe", &self.standby_safe)
            .finish()
    }
}

/// What happened to a dispatched line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The handler ran and succeeded
    Executed,
    /// The line held no words
    Empty,
    /// No command with that name
    Unknown,
    /// Blocked by standby suppression
    Suppressed,
    /// The handler ran and reported an error
    Failed,
}
