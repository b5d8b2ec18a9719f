//! In-process call counters.
//!
//! Counters live for the lifetime of the process and reset on restart.

use std::collections::BTreeMap;

use dashmap::DashMap;

use forkline_types::chat::ChatType;

/// Named monotonically increasing counters.
#[derive(Debug, Default)]
pub struct CallMetrics {
    counters: DashMap<String, u64>,
}

impl CallMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment `name` by one.
    pub fn inc(&self, name: &str) {
        *self.counters.entry(name.to_string()).or_insert(0) += 1;
    }

    /// Increment a counter namespaced by chat type, e.g. `primary_messages`.
    pub fn inc_for(&self, chat_type: ChatType, suffix: &str) {
        self.inc(&format!("{}_{suffix}", chat_type.as_str()));
    }

    pub fn get(&self, name: &str) -> u64 {
        self.counters.get(name).map(|v| *v).unwrap_or(0)
    }

    /// Point-in-time copy of every counter, sorted by name.
    pub fn snapshot(&self) -> BTreeMap<String, u64> {
        self.counters
            .iter()
            .map(|entry| (entry.key().clone(), *entry.value()))
            .collect()
    }
}
