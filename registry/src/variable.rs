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

//! Variable bindings and observers

use std::fmt::Display;
use std::str::FromStr;
use std::sync::{Arc, PoisonError, RwLock};

/// Typed accessor behind a registered variable
pub trait VariableBinding: Send + Sync {
    /// Render the current value
    fn get(&self) -> String;
    /// Parse and store a new value, returning the parse failure reason
    fn set(&self, value: &str) -> std::result::Result<(), String>;
}

/// Binding over a shared value parsed with `FromStr` and rendered with `Display`
pub struct TypedVariable<T> {
    value: Arc<RwLock<T>>,
}

impl<T> TypedVariable<T> {
    pub fn new(initial: T) -> Self {
        Self {
            value: Arc::new(RwLock::new(initial)),
        }
    }

    /// Bind to a value owned elsewhere
    pub fn shared(value: Arc<RwLock<T>>) -> Self {
        Self { value }
    }

    /// The shared cell backing this variable
    pub fn cell(&self) -> Arc<RwLock<T>> {
        self.value.clone()
    }
}

impl<T: Clone> TypedVariable<T> {
    pub fn value(&self) -> T {
        self.value
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl<T> VariableBinding for TypedVariable<T>
where
    T: FromStr + Display + Send + Sync,
    T::Err: Display,
{
    fn get(&self) -> String {
        self.value
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .to_string()
    }

    fn set(&self, value: &str) -> std::result::Result<(), String> {
        let parsed = value.parse::<T>().map_err(|e| e.to_string())?;
        *self.value.write().unwrap_or_else(PoisonError::into_inner) = parsed;
        Ok(())
    }
}

type Getter = Box<dyn Fn() -> String + Send + Sync>;
type Setter = Box<dyn Fn(&str) -> std::result::Result<(), String> + Send + Sync>;

/// Binding built from getter and setter closures
pub struct FnVariable {
    getter: Getter,
    setter: Option<Setter>,
}

impl FnVariable {
    /// A binding that only renders a value
    pub fn read_only<G>(getter: G) -> Self
    where
        G: Fn() -> String + Send + Sync + 'static,
    {
        Self {
            getter: Box::new(getter),
            setter: None,
        }
    }

    pub fn new<G, S>(getter: G, setter: S) -> Self
    where
        G: Fn() -> String + Send + Sync + 'static,
        S: Fn(&str) -> std::result::Result<(), String> + Send + Sync + 'static,
    {
        Self {
            getter: Box::new(getter),
            setter: Some(Box::new(setter)),
        }
    }
}

impl VariableBinding for FnVariable {
    fn get(&self) -> String {
        (self.getter)()
    }

    fn set(&self, value: &str) -> std::result::Result<(), String> {
        match &self.setter {
            Some(setter) => setter(value),
            None => Err("no setter".to_string()),
        }
    }
}

/// Change observer attached to a variable
#[derive(Clone)]
pub struct Observer {
    /// Identifies the party that registered the observer
    pub target: String,
    pub callback: Arc<dyn Fn(&str, &str) + Send + Sync>,
}

/// A registered variable
#[derive(Clone)]
pub struct Variable {
    pub name: String,
    pub help: String,
    pub binding: Arc<dyn VariableBinding>,
    pub settable: bool,
    /// May be written while standby suppression is active
    pub standby_safe: bool,
    pub(crate) observers: Vec<Observer>,
}

impl Variable {
    /// Render the current value
    pub fn value(&self) -> String {
        self.binding.get()
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }
}

impl std::fmt::Debug for Variable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Variable")
            .field("name", &self.name)
            .field("settable", &self.settable)
            .field("standby_safe", &self.standby_safe)
            .field("observers", &self.observers.len())
            .finish()
    }
}
