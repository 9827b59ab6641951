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

//! Command registry implementation

use crate::args::split_command_line;
use crate::command::{
    CommandHandler, CommandOutput, CompletionHandler, DispatchOutcome, NameIndex,
    RegisteredCommand, StandbyProbe,
};
use crate::variable::{Observer, Variable, VariableBinding};
use crate::{RegistryError, Result};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// Shared command and variable registry
///
/// Names are unique. Registering a name that already exists is rejected with
/// [`RegistryError::DuplicateCommand`] / [`RegistryError::DuplicateVariable`].
/// Handlers are cloned out of the table before they run, so a handler may
/// freely call back into the registry.
pub struct CommandRegistry<C: ?Sized> {
    commands: RwLock<BTreeMap<String, RegisteredCommand<C>>>,
    variables: RwLock<BTreeMap<String, Variable>>,
    suppress_standby: AtomicBool,
    standby_probe: RwLock<Option<Arc<dyn StandbyProbe>>>,
}

impl<C: ?Sized> Default for CommandRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: ?Sized> CommandRegistry<C> {
    pub fn new() -> Self {
        Self {
            commands: RwLock::new(BTreeMap::new()),
            variables: RwLock::new(BTreeMap::new()),
            suppress_standby: AtomicBool::new(false),
            standby_probe: RwLock::new(None),
        }
    }

    // ===== Commands =====

    /// Register a command handler.
    pub fn register<F>(
        &self,
        name: &str,
        help: &str,
        handler: F,
    ) -> Result<CommandRegistration<'_, C>>
    where
        F: Fn(&C, &[String]) -> Result<()> + Send + Sync + 'static,
    {
        let handler: CommandHandler<C> = Arc::new(handler);
        let mut commands = write(&self.commands);
        if commands.contains_key(name) {
            warn!(command = name, "Rejecting duplicate command registration");
            return Err(RegistryError::DuplicateCommand(name.to_string()));
        }
        commands.insert(
            name.to_string(),
            RegisteredCommand {
                name: name.to_string(),
                help: help.to_string(),
                handler,
                completion: None,
                standby_safe: false,
            },
        );
        debug!(command = name, "Registered command");
        Ok(CommandRegistration {
            registry: self,
            name: name.to_string(),
        })
    }

    /// Remove a command, returning whether it existed
    pub fn unregister(&self, name: &str) -> bool {
        write(&self.commands).remove(name).is_some()
    }

    pub fn contains(&self, name: &str) -> bool {
        read(&self.commands).contains_key(name)
    }

    /// A copy of the registered command
    pub fn command(&self, name: &str) -> Option<RegisteredCommand<C>> {
        read(&self.commands).get(name).cloned()
    }

    /// `(name, help)` for every command, sorted by name
    pub fn help_entries(&self) -> Vec<(String, String)> {
        read(&self.commands)
            .values()
            .map(|command| (command.name.clone(), command.help.clone()))
            .collect()
    }

    // ===== Standby suppression =====

    /// Install the collaborator that reports exec/standby state
    pub fn set_standby_probe(&self, probe: Arc<dyn StandbyProbe>) {
        *write(&self.standby_probe) = Some(probe);
    }

    pub fn set_standby_suppression(&self, enabled: bool) {
        info!(enabled, "Standby suppression changed");
        self.suppress_standby.store(enabled, Ordering::SeqCst);
    }

    pub fn standby_suppression(&self) -> bool {
        self.suppress_standby.load(Ordering::SeqCst)
    }

    /// Check if only standby-safe commands may currently run
    pub fn is_suppressing(&self) -> bool {
        self.standby_suppression()
            && read(&self.standby_probe)
                .as_ref()
                .is_some_and(|probe| probe.is_standby())
    }

    // ===== Completion =====

    /// Candidates for the final word of a partially typed line.
    ///
    /// The first word completes against command and variable names. Later
    /// words are delegated to the command's completion handler, if it has one.
    pub fn complete(&self, line: &str) -> Vec<String> {
        let mut words = split_command_line(line);
        if words.is_empty() || line.ends_with(char::is_whitespace) {
            words.push(String::new());
        }

        let mut candidates = if words.len() == 1 {
            let mut names = self.command_names();
            names.extend(self.variable_names());
            names
        } else {
            let completion = read(&self.commands)
                .get(&words[0])
                .and_then(|command| command.completion.clone());
            let mut candidates = Vec::new();
            if let Some(completion) = completion {
                completion(self, &words[1..], &mut candidates);
            }
            candidates
        };

        let partial = words.last().map(String::as_str).unwrap_or_default();
        candidates.retain(|candidate| candidate.starts_with(partial));
        candidates.sort();
        candidates.dedup();
        candidates
    }

    // ===== Variables =====

    /// Register a variable binding.
    pub fn register_variable<B>(
        &self,
        name: &str,
        help: &str,
        binding: B,
        settable: bool,
    ) -> Result<VariableRegistration<'_, C>>
    where
        B: VariableBinding + 'static,
    {
        let mut variables = write(&self.variables);
        if variables.contains_key(name) {
            warn!(variable = name, "Rejecting duplicate variable registration");
            return Err(RegistryError::DuplicateVariable(name.to_string()));
        }
        variables.insert(
            name.to_string(),
            Variable {
                name: name.to_string(),
                help: help.to_string(),
                binding: Arc::new(binding),
                settable,
                standby_safe: false,
                observers: Vec::new(),
            },
        );
        debug!(variable = name, settable, "Registered variable");
        Ok(VariableRegistration {
            registry: self,
            name: name.to_string(),
        })
    }

    pub fn find_variable(&self, name: &str) -> Option<Variable> {
        read(&self.variables).get(name).cloned()
    }

    /// All variables sorted by name
    pub fn variables(&self) -> Vec<Variable> {
        read(&self.variables).values().cloned().collect()
    }

    pub fn get_variable(&self, name: &str) -> Result<String> {
        self.find_variable(name)
            .map(|variable| variable.value())
            .ok_or_else(|| RegistryError::UnknownVariable(name.to_string()))
    }

    /// Write a variable from text and notify its observers in registration
    /// order. Observers are only notified when the write succeeded. Returns
    /// the rendered new value.
    pub fn set_variable(&self, name: &str, value: &str) -> Result<String> {
        let variable = self
            .find_variable(name)
            .ok_or_else(|| RegistryError::UnknownVariable(name.to_string()))?;
        if !variable.settable {
            return Err(RegistryError::ReadOnly(name.to_string()));
        }
        if !variable.standby_safe && self.is_suppressing() {
            return Err(RegistryError::StandbySuppressed(name.to_string()));
        }
        variable
            .binding
            .set(value)
            .map_err(|reason| RegistryError::InvalidValue {
                name: name.to_string(),
                value: value.to_string(),
                reason,
            })?;

        let rendered = variable.binding.get();
        info!(variable = name, value = %rendered, "Variable changed");
        for observer in &variable.observers {
            (observer.callback)(name, &rendered);
        }
        Ok(rendered)
    }

    /// Attach a change observer to a variable.
    pub fn observe<F>(&self, name: &str, target: &str, callback: F) -> Result<()>
    where
        F: Fn(&str, &str) + Send + Sync + 'static,
    {
        let mut variables = write(&self.variables);
        let variable = variables
            .get_mut(name)
            .ok_or_else(|| RegistryError::UnknownVariable(name.to_string()))?;
        variable.observers.push(Observer {
            target: target.to_string(),
            callback: Arc::new(callback),
        });
        Ok(())
    }

    /// Detach every observer registered by `target`, returning how many were removed
    pub fn unobserve(&self, target: &str) -> usize {
        let mut removed = 0;
        for variable in write(&self.variables).values_mut() {
            let before = variable.observers.len();
            variable.observers.retain(|observer| observer.target != target);
            removed += before - variable.observers.len();
        }
        removed
    }
}

impl<C: ?Sized + CommandOutput> CommandRegistry<C> {
    /// Split a command line, look up the command and run it.
    ///
    /// Unknown commands, suppressed commands and handler failures are
    /// reported to `context` through [`CommandOutput::print_error`].
    pub fn dispatch(&self, context: &C, line: &str) -> DispatchOutcome {
        let words = split_command_line(line);
        let Some((name, args)) = words.split_first() else {
            return DispatchOutcome::Empty;
        };

        let Some(command) = self.command(name) else {
            debug!(command = %name, "Unknown command");
            context.print_error(&format!(
                "{}. Type 'help' for a list of commands.",
                RegistryError::UnknownCommand(name.clone())
            ));
            return DispatchOutcome::Unknown;
        };

        if !command.standby_safe && self.is_suppressing() {
            debug!(command = %name, "Command suppressed in standby");
            context.print_error(&RegistryError::StandbySuppressed(name.clone()).to_string());
            return DispatchOutcome::Suppressed;
        }

        debug!(command = %name, args = args.len(), "Dispatching command");
        match (command.handler)(context, args) {
            Ok(()) => DispatchOutcome::Executed,
            Err(error) => {
                context.print_error(&error.to_string());
                DispatchOutcome::Failed
            }
        }
    }
}

impl<C: ?Sized> NameIndex for CommandRegistry<C> {
    fn command_names(&self) -> Vec<String> {
        read(&self.commands).keys().cloned().collect()
    }

    fn variable_names(&self) -> Vec<String> {
        read(&self.variables).keys().cloned().collect()
    }
}

impl<C: ?Sized> std::fmt::Debug for CommandRegistry<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandRegistry")
            .field("commands", &read(&self.commands).len())
            .field("variables", &read(&self.variables).len())
            .field("suppress_standby", &self.standby_suppression())
            .finish()
    }
}

/// Handle returned by [`CommandRegistry::register`] for fluent configuration
pub struct CommandRegistration<'a, C: ?Sized> {
    registry: &'a CommandRegistry<C>,
    name: String,
}

impl<'a, C: ?Sized> CommandRegistration<'a, C> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Allow the command to run while standby suppression is active
    pub fn allow_during_standby(self) -> Self {
        if let Some(command) = write(&self.registry.commands).get_mut(&self.name) {
            command.standby_safe = true;
        }
        self
    }

    /// Attach a completion handler for the command's arguments
    pub fn with_completion<F>(self, completion: F) -> Self
    where
        F: Fn(&dyn NameIndex, &[String], &mut Vec<String>) + Send + Sync + 'static,
    {
        let completion: CompletionHandler = Arc::new(completion);
        if let Some(command) = write(&self.registry.commands).get_mut(&self.name) {
            command.completion = Some(completion);
        }
        self
    }
}

/// Handle returned by [`CommandRegistry::register_variable`]
pub struct VariableRegistration<'a, C: ?Sized> {
    registry: &'a CommandRegistry<C>,
    name: String,
}

impl<'a, C: ?Sized> VariableRegistration<'a, C> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Allow writes while standby suppression is active
    pub fn allow_during_standby(self) -> Self {
        if let Some(variable) = write(&self.registry.variables).get_mut(&self.name) {
            variable.standby_safe = true;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TypedVariable;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;
    use tracing_test::traced_test;

    #[derive(Default)]
    struct Capture {
        out: Mutex<Vec<String>>,
        err: Mutex<Vec<String>>,
    }

    impl CommandOutput for Capture {
        fn print(&self, text: &str) {
            self.out.lock().unwrap().push(text.to_string());
        }
        fn print_error(&self, text: &str) {
            self.err.lock().unwrap().push(text.to_string());
        }
    }

    fn registry() -> CommandRegistry<Capture> {
        let registry = CommandRegistry::new();
        registry
            .register("echo", "Print arguments", |out: &Capture, args: &[String]| {
                out.print(&args.join(" "));
                Ok(())
            })
            .unwrap()
            .allow_during_standby();
        registry
            .register("fail", "Always fails", |_: &Capture, _: &[String]| {
                Err(RegistryError::Usage("fail never works".to_string()))
            })
            .unwrap();
        registry
    }

    #[test]
    fn test_dispatch_executes() {
        let registry = registry();
        let out = Capture::default();
        assert_eq!(
            registry.dispatch(&out, "echo a \"b c\""),
            DispatchOutcome::Executed
        );
        assert_eq!(*out.out.lock().unwrap(), vec!["a b c".to_string()]);
    }

    #[test]
    fn test_dispatch_unknown_reports_error() {
        let registry = registry();
        let out = Capture::default();
        assert_eq!(registry.dispatch(&out, "nope"), DispatchOutcome::Unknown);
        let errors = out.err.lock().unwrap();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("Unknown command 'nope'"));
    }

    #[test]
    fn test_dispatch_empty() {
        let registry = registry();
        let out = Capture::default();
        assert_eq!(registry.dispatch(&out, "   "), DispatchOutcome::Empty);
        assert!(out.err.lock().unwrap().is_empty());
    }

    #[test]
    fn test_handler_error_reported() {
        let registry = registry();
        let out = Capture::default();
        assert_eq!(registry.dispatch(&out, "fail"), DispatchOutcome::Failed);
        assert_eq!(
            *out.err.lock().unwrap(),
            vec!["Usage: fail never works".to_string()]
        );
    }

    #[test]
    #[traced_test]
    fn test_duplicate_rejected() {
        let registry = registry();
        let result = registry.register("echo", "again", |_: &Capture, _: &[String]| Ok(()));
        assert!(matches!(result, Err(RegistryError::DuplicateCommand(name)) if name == "echo"));
        assert_eq!(registry.command("echo").unwrap().help, "Print arguments");
        assert!(logs_contain("Rejecting duplicate command registration"));
    }

    #[test]
    fn test_standby_gating() {
        let registry = registry();
        let standby = Arc::new(AtomicBool::new(true));
        let probe = standby.clone();
        registry.set_standby_probe(Arc::new(move || probe.load(Ordering::SeqCst)));
        let out = Capture::default();

        assert_eq!(registry.dispatch(&out, "fail"), DispatchOutcome::Failed);

        registry.set_standby_suppression(true);
        assert!(registry.is_suppressing());
        assert_eq!(registry.dispatch(&out, "fail"), DispatchOutcome::Suppressed);
        assert_eq!(registry.dispatch(&out, "echo ok"), DispatchOutcome::Executed);

        standby.store(false, Ordering::SeqCst);
        assert!(!registry.is_suppressing());
        assert_eq!(registry.dispatch(&out, "fail"), DispatchOutcome::Failed);
    }

    #[test]
    fn test_complete_command_names() {
        let registry = registry();
        registry
            .register("exit", "", |_: &Capture, _: &[String]| Ok(()))
            .unwrap();
        assert_eq!(registry.complete("e"), vec!["echo", "exit"]);
        assert_eq!(registry.complete("ec"), vec!["echo"]);
        assert_eq!(registry.complete(""), vec!["echo", "exit", "fail"]);
        assert!(registry.complete("zz").is_empty());
    }

    #[test]
    fn test_complete_first_word_includes_variables() {
        let registry = registry();
        registry
            .register_variable("effort", "", TypedVariable::new(3), true)
            .unwrap();
        assert_eq!(registry.complete("e"), vec!["echo", "effort"]);
        assert_eq!(registry.complete("ef"), vec!["effort"]);
    }

    #[test]
    fn test_unregister_removes_command() {
        let registry = registry();
        let out = Capture::default();
        assert!(registry.unregister("echo"));
        assert!(!registry.contains("echo"));
        assert!(!registry.unregister("echo"));
        assert_eq!(registry.dispatch(&out, "echo hi"), DispatchOutcome::Unknown);
        assert!(out.out.lock().unwrap().is_empty());
        assert!(registry.complete("e").is_empty());
    }

    #[test]
    fn test_complete_arguments() {
        let registry = registry();
        registry
            .register_variable("alpha", "", TypedVariable::new(1), true)
            .unwrap();
        registry
            .register_variable("alpine", "", TypedVariable::new(2), true)
            .unwrap();
        registry
            .register("get", "", |_: &Capture, _: &[String]| Ok(()))
            .unwrap()
            .with_completion(|names, args, out| {
                if args.len() == 1 {
                    out.extend(names.variable_names());
                }
            });
        assert_eq!(registry.complete("get al"), vec!["alpha", "alpine"]);
        assert_eq!(registry.complete("get alph"), vec!["alpha"]);
        assert_eq!(registry.complete("get "), vec!["alpha", "alpine"]);
        assert!(registry.complete("get alpha ").is_empty());
        assert!(registry.complete("echo x").is_empty());
    }

    #[test]
    fn test_set_variable_notifies_in_order() {
        let registry = registry();
        let var = TypedVariable::new(0u32);
        let cell = var.cell();
        registry.register_variable("count", "", var, true).unwrap();

        let calls = Arc::new(Mutex::new(Vec::new()));
        for target in ["first", "second"] {
            let calls = calls.clone();
            registry
                .observe("count", target, move |name, value| {
                    calls.lock().unwrap().push(format!("{}:{}={}", target, name, value));
                })
                .unwrap();
        }

        assert_eq!(registry.set_variable("count", "7").unwrap(), "7");
        assert_eq!(*cell.read().unwrap(), 7);
        assert_eq!(
            *calls.lock().unwrap(),
            vec!["first:count=7".to_string(), "second:count=7".to_string()]
        );
    }

    #[test]
    fn test_set_variable_failures_do_not_notify() {
        let registry = registry();
        registry
            .register_variable("count", "", TypedVariable::new(0u32), true)
            .unwrap();
        registry
            .register_variable("fixed", "", TypedVariable::new(1u32), false)
            .unwrap();
        let notified = Arc::new(AtomicUsize::new(0));
        let counter = notified.clone();
        registry
            .observe("count", "t", move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        assert!(matches!(
            registry.set_variable("count", "minus"),
            Err(RegistryError::InvalidValue { .. })
        ));
        assert_eq!(
            registry.set_variable("fixed", "2"),
            Err(RegistryError::ReadOnly("fixed".to_string()))
        );
        assert_eq!(
            registry.set_variable("missing", "2"),
            Err(RegistryError::UnknownVariable("missing".to_string()))
        );
        assert_eq!(notified.load(Ordering::SeqCst), 0);
        assert_eq!(registry.get_variable("count").unwrap(), "0");
    }

    #[test]
    fn test_unobserve() {
        let registry = registry();
        registry
            .register_variable("a", "", TypedVariable::new(0), true)
            .unwrap();
        registry.observe("a", "x", |_, _| {}).unwrap();
        registry.observe("a", "y", |_, _| {}).unwrap();
        registry.observe("a", "x", |_, _| {}).unwrap();
        assert_eq!(registry.unobserve("x"), 2);
        assert_eq!(registry.find_variable("a").unwrap().observer_count(), 1);
    }

    #[test]
    fn test_variable_standby_gating() {
        let registry = registry();
        registry
            .register_variable("unsafe", "", TypedVariable::new(0), true)
            .unwrap();
        registry
            .register_variable("safe", "", TypedVariable::new(0), true)
            .unwrap()
            .allow_during_standby();
        registry.set_standby_probe(Arc::new(|| true));
        registry.set_standby_suppression(true);
        assert_eq!(
            registry.set_variable("unsafe", "1"),
            Err(RegistryError::StandbySuppressed("unsafe".to_string()))
        );
        assert_eq!(registry.set_variable("safe", "1").unwrap(), "1");
    }
}
