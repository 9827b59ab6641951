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


//! Diagnostic Console Demo
//!
//! Starts a console with a couple of example variables and configuration
//! entries, serves it over telnet and optionally on this terminal.
//!
//! ## Usage
//!
//! ```bash
//! DIAGNOSTIX_STDIN=1 cargo run --example diag_console
//! ```
//!
//! Connect with a telnet client:
//! ```bash
//! telnet localhost 2323
//! ```
//!
//! Try `help`, `get`, `set workers 8`, `logEcho all` and `quit`.

use diagnostix_console::{
    Console, ConsoleConfig, LogEventSource, MapConfigStore, TelnetServer, TypedVariable,
    best_effort_restore, start_stdio,
};
use std::sync::Arc;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::Layer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ConsoleConfig::default().with_greeting("diag_console demo. Type 'help'.");

    let log_source = LogEventSource::new(config.log_echo_capacity);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(LevelFilter::INFO),
        )
        .with(log_source.layer().with_filter(LevelFilter::DEBUG))
        .init();

    let store: MapConfigStore = [
        ("service.name", "diag_console"),
        ("service.region", "local"),
    ]
    .into_iter()
    .collect();

    let console = Console::builder(config.clone())
        .with_config_store(Arc::new(store))
        .with_log_source(log_source)
        .build()?;

    console.registry().register_variable(
        "workers",
        "Worker thread count",
        TypedVariable::new(4u32),
        true,
    )?;
    console.registry().observe("workers", "demo", |_, value| {
        tracing::info!(workers = %value, "Worker pool resized");
    })?;
    console.registry().register_variable(
        "verbose",
        "Verbose request logging",
        TypedVariable::new(false),
        true,
    )?;

    let server = if config.enable_telnet {
        let server = TelnetServer::new(console.clone()).await?;
        server.start().await?;
        println!("Telnet console on {}", server.bind_address());
        Some(server)
    } else {
        None
    };

    let stdio = start_stdio(&console)?;

    tokio::select! {
        _ = console.wait_for_shutdown() => {}
        result = tokio::signal::ctrl_c() => result?,
    }

    console.close_all();
    if let Some(server) = server {
        server.shutdown().await?;
    }
    if let Some(stdio) = stdio {
        stdio.abort();
    }
    best_effort_restore();
    tracing::info!("Stopped");
    Ok(())
}
