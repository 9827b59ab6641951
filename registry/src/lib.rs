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

//! # Diagnostix Command Registry
//!
//! Maps command names to typed handlers and variable names to typed get/set
//! bindings. The registry is shared by every console connection; it performs
//! dispatch, tab-completion lookups, variable writes with change observers
//! and standby suppression gating.
//!
//! The registry is generic over the invocation context `C` handed to each
//! handler. Dispatch only requires that the context can report output
//! through [`CommandOutput`].
//!
//! ```rust
//! use diagnostix_registry::{CommandOutput, CommandRegistry, DispatchOutcome};
//! use std::sync::Mutex;
//!
//! #[derive(Default)]
//! struct Capture(Mutex<String>);
//!
//! impl CommandOutput for Capture {
//!     fn print(&self, text: &str) {
//!         self.0.lock().unwrap().push_str(text);
//!     }
//!     fn print_error(&self, text: &str) {
//!         self.0.lock().unwrap().push_str(text);
//!     }
//! }
//!
//! let registry = CommandRegistry::<Capture>::new();
//! registry
//!     .register("echo", "Print the arguments", |out: &Capture, args: &[String]| {
//!         out.print(&args.join(" "));
//!         Ok(())
//!     })
//!     .unwrap();
//!
//! let out = Capture::default();
//! assert_eq!(registry.dispatch(&out, "echo hi there"), DispatchOutcome::Executed);
//! ```

mod args;
mod command;
mod error;
mod registry;
mod variable;

pub use self::args::split_command_line;
pub use self::command::{
    CommandHandler, CommandOutput, CompletionHandler, DispatchOutcome, NameIndex,
    RegisteredCommand, StandbyProbe,
};
pub use self::error::{RegistryError, Result};
pub use self::registry::{CommandRegistration, CommandRegistry, VariableRegistration};
pub use self::variable::{FnVariable, Observer, TypedVariable, Variable, VariableBinding};
