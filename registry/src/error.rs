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

//! Error types for the command registry

use thiserror::Error;

/// Result type for registry operations and command handlers
pub type Result<T> = std::result::Result<T, RegistryError>;

/// Registry and dispatch error types
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// A command with this name already exists
    #[error("Command '{0}' is already registered")]
    DuplicateCommand(String),

    /// A variable with this name already exists
    #[error("Variable '{0}' is already registered")]
    DuplicateVariable(String),

    #[error("Unknown command '{0}'")]
    UnknownCommand(String),

    #[error("Unknown variable '{0}'")]
    UnknownVariable(String),

    /// Attempt to write a variable registered as not settable
    #[error("Variable '{0}' is read-only")]
    ReadOnly(String),

    /// The binding rejected the textual value
    #[error("Invalid value '{value}' for variable '{name}': {reason}")]
    InvalidValue {
        name: String,
        value: String,
        reason: String,
    },

    /// The command or variable is not standby-safe and suppression is active
    #[error("'{0}' is not allowed while the process is in standby")]
    StandbySuppressed(String),

    /// Wrong number or shape of arguments
    #[error("Usage: {0}")]
    Usage(String),

    /// A handler failed for another reason
    #[error("{0}")]
    Failed(String),
}

impl RegistryError {
    /// Check if the error was caused by the caller's input rather than the
    /// state of the registry
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            RegistryError::UnknownCommand(_)
                | RegistryError::UnknownVariable(_)
                | RegistryError::InvalidValue { .. }
                | RegistryError::Usage(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RegistryError::InvalidValue {
            name: "level".to_string(),
            value: "loud".to_string(),
            reason: "invalid digit found in string".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid value 'loud' for variable 'level': invalid digit found in string"
        );
        assert_eq!(
            RegistryError::Usage("get <var>".to_string()).to_string(),
            "Usage: get <var>"
        );
    }

    #[test]
    fn test_user_errors() {
        assert!(RegistryError::UnknownCommand("x".into()).is_user_error());
        assert!(RegistryError::Usage("x".into()).is_user_error());
        assert!(!RegistryError::ReadOnly("x".into()).is_user_error());
        assert!(!RegistryError::DuplicateCommand("x".into()).is_user_error());
    }
}
