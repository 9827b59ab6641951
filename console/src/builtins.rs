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


//! Built-in console commands

use crate::collaborators::ConfigStore;
use crate::console::{ConsoleRegistry, Session};
use crate::script;
use crate::types::LogEchoMode;
use chrono::SecondsFormat;
use diagnostix_registry::{CommandOutput, NameIndex, RegistryError, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

fn usage(text: &str) -> RegistryError {
    RegistryError::Usage(text.to_string())
}

fn complete_commands(names: &dyn NameIndex, args: &[String], out: &mut Vec<String>) {
    if args.len() == 1 {
        out.extend(names.command_names());
    }
}

fn complete_variables(names: &dyn NameIndex, args: &[String], out: &mut Vec<String>) {
    if args.len() == 1 {
        out.extend(names.variable_names());
    }
}

fn parse_switch(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "on" | "true" | "1" => Some(true),
        "off" | "false" | "0" => Some(false),
        _ => None,
    }
}

/// Register every built-in command
pub(crate) fn register(registry: &ConsoleRegistry, store: Arc<dyn ConfigStore>) -> Result<()> {
    register_session_commands(registry)?;
    register_variable_commands(registry)?;
    register_log_commands(registry)?;
    register_time_commands(registry)?;

    registry
        .register("config", "config [name]: show configuration values", config)?
        .allow_during_standby()
        .with_completion(move |_, args, out| {
            if args.len() == 1 {
                out.extend(store.names());
            }
        });
    Ok(())
}

fn register_session_commands(registry: &ConsoleRegistry) -> Result<()> {
    registry
        .register("help", "help [command]: list commands or describe one", help)?
        .allow_during_standby()
        .with_completion(complete_commands);
    registry
        .register("disconnect", "disconnect: close this connection", |session, _| {
            session.connection().disconnect();
            Ok(())
        })?
        .allow_during_standby();
    registry
        .register("quit", "quit: shut down the process", |session, _| {
            session.print("Shutting down");
            session.console().request_shutdown();
            Ok(())
        })?
        .allow_during_standby();
    registry.register(
        "processFile",
        "processFile <path>: run the commands in a file",
        process_file,
    )?;
    registry
        .register(
            "recordSession",
            "recordSession <path>: copy this connection's output to a file",
            record_session,
        )?
        .allow_during_standby();
    registry
        .register("stopRecording", "stopRecording: stop recording this connection", |session, _| {
            match session.connection().stop_recording() {
                Some(path) => {
                    session.print(&format!("Stopped recording to {}", path.display()));
                    Ok(())
                }
                None => Err(RegistryError::Failed("Not recording".to_string())),
            }
        })?
        .allow_during_standby();
    registry
        .register("delay", "delay <ms>: pause input on this connection", delay)?
        .allow_during_standby();
    registry
        .register(
            "suppressStandby",
            "suppressStandby [on|off]: restrict commands while in standby",
            suppress_standby,
        )?
        .allow_during_standby();
    Ok(())
}

fn register_variable_commands(registry: &ConsoleRegistry) -> Result<()> {
    registry
        .register("set", "set <var> <value>: change a variable", set)?
        .allow_during_standby()
        .with_completion(complete_variables);
    registry
        .register("get", "get [var]: show one or all variables", get)?
        .allow_during_standby()
        .with_completion(complete_variables);
    Ok(())
}

fn register_log_commands(registry: &ConsoleRegistry) -> Result<()> {
    registry
        .register("logMark", "logMark <text>: write a marker into the log", |session, args| {
            if args.is_empty() {
                return Err(usage("logMark <text>"));
            }
            let text = args.join(" ");
            info!(connection_id = %session.connection().id(), "----- {} -----", text);
            session.print(&format!("Marked: {}", text));
            Ok(())
        })?
        .allow_during_standby();
    registry
        .register(
            "logEcho",
            "logEcho [off|warn|all]: echo process log events to this connection",
            log_echo,
        )?
        .allow_during_standby()
        .with_completion(|_, args, out| {
            if args.len() == 1 {
                out.extend(LogEchoMode::ALL.iter().map(|mode| mode.name().to_string()));
            }
        });
    Ok(())
}

fn register_time_commands(registry: &ConsoleRegistry) -> Result<()> {
    registry
        .register("time", "time: show the current process time", |session, _| {
            let now = session.console().time_reference().now();
            session.print(&now.to_rfc3339_opts(SecondsFormat::Millis, true));
            Ok(())
        })?
        .allow_during_standby();
    registry.register(
        "timeOffset",
        "timeOffset [ms]: show or set the simulated time offset",
        time_offset,
    )?;
    registry
        .register(
            "setTimeMark",
            "setTimeMark <name>: remember the current time under a name",
            |session, args| {
                let [name] = args else {
                    return Err(usage("setTimeMark <name>"));
                };
                let now = session.console().time_reference().now();
                session.connection().set_time_mark(name, now);
                session.print(&format!(
                    "Mark '{}' set at {}",
                    name,
                    now.to_rfc3339_opts(SecondsFormat::Millis, true)
                ));
                Ok(())
            },
        )?
        .allow_during_standby();
    registry
        .register(
            "timeSinceMark",
            "timeSinceMark <name>: show the time elapsed since a mark",
            |session, args| {
                let [name] = args else {
                    return Err(usage("timeSinceMark <name>"));
                };
                let mark = session
                    .connection()
                    .time_mark(name)
                    .ok_or_else(|| RegistryError::Failed(format!("No time mark named '{}'", name)))?;
                let elapsed = (session.console().time_reference().now() - mark).num_milliseconds();
                let sign = if elapsed < 0 { "-" } else { "" };
                let millis = elapsed.unsigned_abs();
                session.print(&format!(
                    "{}: {}{}.{:03}s",
                    name,
                    sign,
                    millis / 1000,
                    millis % 1000
                ));
                Ok(())
            },
        )?
        .allow_during_standby();
    Ok(())
}

fn help(session: &Session, args: &[String]) -> Result<()> {
    let registry = session.console().registry();
    match args {
        [] => {
            let entries = registry.help_entries();
            let width = entries.iter().map(|(name, _)| name.len()).max().unwrap_or(0);
            session.print("Available commands:");
            for (name, help) in entries {
                session.print(&format!("  {:<width$}  {}", name, help, width = width));
            }
            Ok(())
        }
        [name] => {
            let command = registry
                .command(name)
                .ok_or_else(|| RegistryError::UnknownCommand(name.clone()))?;
            session.print(&format!("{}  {}", command.name, command.help));
            Ok(())
        }
        _ => Err(usage("help [command]")),
    }
}

fn set(session: &Session, args: &[String]) -> Result<()> {
    let [name, value] = args else {
        return Err(usage("set <var> <value>"));
    };
    let value = session.console().registry().set_variable(name, value)?;
    session.print(&format!("{} = {}", name, value));
    Ok(())
}

fn get(session: &Session, args: &[String]) -> Result<()> {
    let registry = session.console().registry();
    match args {
        [] => {
            let variables = registry.variables();
            if variables.is_empty() {
                session.print("No variables registered");
            }
            for variable in variables {
                let access = if variable.settable { "" } else { " (read-only)" };
                session.print(&format!("{} = {}{}", variable.name, variable.value(), access));
            }
            Ok(())
        }
        [name] => {
            session.print(&format!("{} = {}", name, registry.get_variable(name)?));
            Ok(())
        }
        _ => Err(usage("get [var]")),
    }
}

fn process_file(session: &Session, args: &[String]) -> Result<()> {
    let [path] = args else {
        return Err(usage("processFile <path>"));
    };
    script::process_file(session.console(), session.connection(), Path::new(path))
        .map_err(|error| RegistryError::Failed(format!("Unable to process '{}': {}", path, error)))
}

fn record_session(session: &Session, args: &[String]) -> Result<()> {
    let [path] = args else {
        return Err(usage("recordSession <path>"));
    };
    if session.connection().record_session(Path::new(path)) {
        session.print(&format!("Recording session to {}", path));
        Ok(())
    } else {
        Err(RegistryError::Failed(format!("Unable to record to '{}'", path)))
    }
}

fn delay(session: &Session, args: &[String]) -> Result<()> {
    let [ms] = args else {
        return Err(usage("delay <ms>"));
    };
    let ms: u64 = ms.parse().map_err(|_| usage("delay <ms>"))?;
    session.connection().delay_input_for(Duration::from_millis(ms));
    Ok(())
}

fn suppress_standby(session: &Session, args: &[String]) -> Result<()> {
    let registry = session.console().registry();
    match args {
        [] => {}
        [value] => {
            let enabled = parse_switch(value).ok_or_else(|| usage("suppressStandby [on|off]"))?;
            registry.set_standby_suppression(enabled);
        }
        _ => return Err(usage("suppressStandby [on|off]")),
    }
    let state = if registry.standby_suppression() { "on" } else { "off" };
    session.print(&format!("Standby suppression is {}", state));
    Ok(())
}

fn log_echo(session: &Session, args: &[String]) -> Result<()> {
    let connection = session.connection();
    match args {
        [] => {}
        [mode] => {
            let mode = mode.parse::<LogEchoMode>().map_err(|_| usage("logEcho [off|warn|all]"))?;
            connection.set_echo_mode(mode);
        }
        _ => return Err(usage("logEcho [off|warn|all]")),
    }
    session.print(&format!("Log echo is {}", connection.echo_mode()));
    Ok(())
}

fn config(session: &Session, args: &[String]) -> Result<()> {
    let store = session.console().config_store();
    match args {
        [] => {
            for name in store.names() {
                session.print(&name);
            }
            Ok(())
        }
        [name] => {
            let value = store
                .lookup(name)
                .ok_or_else(|| RegistryError::Failed(format!("Unknown configuration '{}'", name)))?;
            session.print(&format!("{} = {}", name, value));
            Ok(())
        }
        _ => Err(usage("config [name]")),
    }
}

fn time_offset(session: &Session, args: &[String]) -> Result<()> {
    let time = session.console().time_reference();
    match args {
        [] => {}
        [ms] => {
            let ms: i64 = ms.parse().map_err(|_| usage("timeOffset [ms]"))?;
            time.set_offset(ms);
            info!(offset_ms = ms, "Time offset changed");
        }
        _ => return Err(usage("timeOffset [ms]")),
    }
    session.print(&format!("Time offset: {} ms", time.offset()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::MapConfigStore;
    use crate::connection::MemoryTransport;
    use crate::{Console, ConsoleConfig, ConnectionKind};
    use diagnostix_registry::{DispatchOutcome, TypedVariable};

    fn setup() -> (Arc<Console>, Arc<crate::Connection>, MemoryTransport) {
        let store: MapConfigStore = [("db.host", "localhost"), ("db.port", "5432")]
            .into_iter()
            .collect();
        let console = Console::builder(ConsoleConfig::default())
            .with_config_store(Arc::new(store))
            .build()
            .unwrap();
        let transport = MemoryTransport::new();
        let connection = console.attach(ConnectionKind::Telnet, "t", transport.clone());
        (console, connection, transport)
    }

    #[test]
    fn test_help_lists_every_builtin() {
        let (console, connection, transport) = setup();
        console.execute(&connection, "help");
        let text = transport.contents();
        for name in [
            "config", "delay", "disconnect", "get", "help", "logEcho", "logMark", "processFile",
            "quit", "recordSession", "set", "setTimeMark", "stopRecording", "suppressStandby",
            "time", "timeOffset", "timeSinceMark",
        ] {
            assert!(text.contains(&format!("  {} ", name)), "missing {}", name);
        }
    }

    #[test]
    fn test_set_and_get() {
        let (console, connection, transport) = setup();
        console
            .registry()
            .register_variable("level", "", TypedVariable::new(2u8), true)
            .unwrap();
        assert_eq!(console.execute(&connection, "set level 4"), DispatchOutcome::Executed);
        assert_eq!(console.execute(&connection, "get"), DispatchOutcome::Executed);
        assert_eq!(console.execute(&connection, "set level"), DispatchOutcome::Failed);
        assert_eq!(
            transport.contents(),
            "level = 4\nlevel = 4\nERROR: Usage: set <var> <value>\n"
        );
    }

    #[test]
    fn test_log_echo_modes() {
        let (console, connection, transport) = setup();
        console.execute(&connection, "logEcho all");
        assert_eq!(connection.echo_mode(), LogEchoMode::All);
        console.execute(&connection, "logEcho loud");
        assert_eq!(connection.echo_mode(), LogEchoMode::All);
        console.execute(&connection, "logEcho");
        assert_eq!(
            transport.contents(),
            "Log echo is all\nERROR: Usage: logEcho [off|warn|all]\nLog echo is all\n"
        );
    }

    #[test]
    fn test_config_lookup() {
        let (console, connection, transport) = setup();
        console.execute(&connection, "config db.port");
        console.execute(&connection, "config nope");
        assert_eq!(
            transport.contents(),
            "db.port = 5432\nERROR: Unknown configuration 'nope'\n"
        );
        assert_eq!(console.registry().complete("config db."), vec!["db.host", "db.port"]);
    }

    #[test]
    fn test_time_marks_and_offset() {
        let (console, connection, transport) = setup();
        console.execute(&connection, "setTimeMark start");
        console.execute(&connection, "timeOffset 60000");
        transport.take();
        console.execute(&connection, "timeSinceMark start");
        assert!(transport.take().starts_with("start: 60."));
        console.execute(&connection, "timeSinceMark other");
        assert_eq!(transport.take(), "ERROR: No time mark named 'other'\n");
    }

    #[test]
    fn test_time_since_mark_keeps_sign_below_one_second() {
        let (console, connection, transport) = setup();
        console.execute(&connection, "setTimeMark m");
        console.execute(&connection, "timeOffset -500");
        transport.take();
        console.execute(&connection, "timeSinceMark m");
        let text = transport.take();
        assert!(text.starts_with("m: -0.4") || text.starts_with("m: -0.5"), "{}", text);
    }

    #[test]
    fn test_standby_suppression_blocks_unsafe_commands() {
        let (console, connection, transport) = setup();
        console.registry().set_standby_probe(Arc::new(|| true));
        console.execute(&connection, "suppressStandby on");
        assert_eq!(
            console.execute(&connection, "timeOffset 5"),
            DispatchOutcome::Suppressed
        );
        assert_eq!(console.execute(&connection, "time"), DispatchOutcome::Executed);
        assert!(transport.contents().starts_with("Standby suppression is on\nERROR: "));
    }

    #[test]
    fn test_record_and_stop() {
        let (console, connection, transport) = setup();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rec.txt");
        console.execute(&connection, &format!("recordSession \"{}\"", path.display()));
        console.execute(&connection, "logEcho");
        console.execute(&connection, "stopRecording");
        console.execute(&connection, "stopRecording");
        let recorded = std::fs::read_to_string(&path).unwrap();
        assert!(recorded.starts_with("Recording session to "));
        assert!(recorded.ends_with("Log echo is off\n"));
        assert!(transport.contents().ends_with("ERROR: Not recording\n"));
    }

    #[test]
    fn test_delay_rejects_bad_argument() {
        let (console, connection, transport) = setup();
        assert_eq!(console.execute(&connection, "delay soon"), DispatchOutcome::Failed);
        assert_eq!(transport.contents(), "ERROR: Usage: delay <ms>\n");
    }
}
