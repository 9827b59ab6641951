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


//! Interfaces to the process subsystems the console forwards to

use chrono::{DateTime, TimeDelta, Utc};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{PoisonError, RwLock};

/// Read-only view of the process configuration
pub trait ConfigStore: Send + Sync {
    /// Look up a configuration value by name
    fn lookup(&self, name: &str) -> Option<String>;
    /// All known configuration names, sorted
    fn names(&self) -> Vec<String>;
}

/// In-memory configuration store
#[derive(Debug, Default)]
pub struct MapConfigStore {
    values: RwLock<BTreeMap<String, String>>,
}

impl MapConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a value
    pub fn insert(&self, name: impl Into<String>, value: impl Into<String>) {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), value.into());
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MapConfigStore {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: RwLock::new(
                iter.into_iter()
                    .map(|(name, value)| (name.into(), value.into()))
                    .collect(),
            ),
        }
    }
}

impl ConfigStore for MapConfigStore {
    fn lookup(&self, name: &str) -> Option<String> {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    fn names(&self) -> Vec<String> {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }
}

/// Source of the process's notion of the current time
pub trait TimeReference: Send + Sync {
    /// Current (possibly simulated) time
    fn now(&self) -> DateTime<Utc>;
    /// Shift simulated time relative to the wall clock
    fn set_offset(&self, offset_ms: i64);
    /// Current simulated offset in milliseconds
    fn offset(&self) -> i64;
}

/// Wall clock plus an adjustable offset
#[derive(Debug, Default)]
pub struct SystemTimeReference {
    offset_ms: AtomicI64,
}

impl SystemTimeReference {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TimeReference for SystemTimeReference {
    fn now(&self) -> DateTime<Utc> {
        Utc::now() + TimeDelta::milliseconds(self.offset())
    }

    fn set_offset(&self, offset_ms: i64) {
        self.offset_ms.store(offset_ms, Ordering::SeqCst);
    }

    fn offset(&self) -> i64 {
        self.offset_ms.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_config_store() {
        let store: MapConfigStore = [("db.host", "localhost"), ("db.port", "5432")]
            .into_iter()
            .collect();
        store.insert("alpha", "1");
        assert_eq!(store.lookup("db.port").as_deref(), Some("5432"));
        assert_eq!(store.lookup("missing"), None);
        assert_eq!(store.names(), vec!["alpha", "db.host", "db.port"]);
    }

    #[test]
    fn test_time_offset_shifts_now() {
        let time = SystemTimeReference::new();
        assert_eq!(time.offset(), 0);
        time.set_offset(3_600_000);
        let shifted = time.now();
        let delta = shifted - Utc::now();
        assert!(delta > TimeDelta::minutes(59));
        assert!(delta <= TimeDelta::hours(1));
    }
}
