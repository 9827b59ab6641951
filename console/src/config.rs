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


//! Console configuration
//!
//! ```
//! use diagnostix_console::ConsoleConfig;
//!
//! let config = ConsoleConfig::new("0.0.0.0:2323".parse().unwrap())
//!     .with_greeting("billing-daemon diagnostic console")
//!     .with_history_limit(100);
//! ```

use std::net::SocketAddr;

/// Default telnet listen address
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:2323";

/// Environment variable that must be `"1"` for the stdio console to attach
pub const DEFAULT_STDIN_ENV_VAR: &str = "DIAGNOSTIX_STDIN";

/// Console configuration
#[derive(Debug, Clone)]
pub struct ConsoleConfig {
    /// Address the telnet listener binds to
    pub bind_address: SocketAddr,

    /// Line sent to every telnet client after negotiation
    pub greeting: String,

    /// Environment variable gating the stdio connection
    pub stdin_env_var: String,

    /// Per-connection history entries
    pub history_limit: usize,

    /// Capacity of the stdin reader hand-off channel
    pub input_channel_capacity: usize,

    /// Capacity of the log event broadcast channel
    pub log_echo_capacity: usize,

    /// Start the telnet listener
    pub enable_telnet: bool,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([127, 0, 0, 1], 2323)),
            greeting: "Diagnostic console. Type 'help' for a list of commands.".to_string(),
            stdin_env_var: DEFAULT_STDIN_ENV_VAR.to_string(),
            history_limit: diagnostix_lineedit::DEFAULT_HISTORY_LIMIT,
            input_channel_capacity: 64,
            log_echo_capacity: 256,
            enable_telnet: true,
        }
    }
}

impl ConsoleConfig {
    /// Create a new configuration listening on the given address
    pub fn new(bind_address: SocketAddr) -> Self {
        Self {
            bind_address,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn with_bind_address(mut self, address: SocketAddr) -> Self {
        self.bind_address = address;
        self
    }

    /// Set the greeting line
    pub fn with_greeting(mut self, greeting: impl Into<String>) -> Self {
        self.greeting = greeting.into();
        self
    }

    /// Set the environment variable gating stdin
    pub fn with_stdin_env_var(mut self, name: impl Into<String>) -> Self {
        self.stdin_env_var = name.into();
        self
    }

    /// Set the history limit
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    /// Set the stdin hand-off channel capacity
    pub fn with_input_channel_capacity(mut self, capacity: usize) -> Self {
        self.input_channel_capacity = capacity;
        self
    }

    /// Set the log event channel capacity
    pub fn with_log_echo_capacity(mut self, capacity: usize) -> Self {
        self.log_echo_capacity = capacity;
        self
    }

    /// Enable or disable the telnet listener
    pub fn with_telnet(mut self, enabled: bool) -> Self {
        self.enable_telnet = enabled;
        self
    }

    /// Check whether the stdin gate variable is set to `"1"`
    pub fn stdin_enabled(&self) -> bool {
        std::env::var(&self.stdin_env_var).is_ok_and(|value| value == "1")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ConsoleConfig::default();
        assert_eq!(config.bind_address.to_string(), DEFAULT_BIND_ADDRESS);
        assert_eq!(config.stdin_env_var, DEFAULT_STDIN_ENV_VAR);
        assert_eq!(config.history_limit, 500);
        assert!(config.enable_telnet);
    }

    #[test]
    fn test_config_builder() {
        let config = ConsoleConfig::new("127.0.0.1:0".parse().unwrap())
            .with_greeting("hi")
            .with_history_limit(3)
            .with_input_channel_capacity(8)
            .with_telnet(false);
        assert_eq!(config.bind_address.port(), 0);
        assert_eq!(config.greeting, "hi");
        assert_eq!(config.history_limit, 3);
        assert_eq!(config.input_channel_capacity, 8);
        assert!(!config.enable_telnet);
    }

    #[test]
    fn test_stdin_gate_unset() {
        let config = ConsoleConfig::default().with_stdin_env_var("DIAGNOSTIX_TEST_GATE_NEVER_SET");
        assert!(!config.stdin_enabled());
    }
}
