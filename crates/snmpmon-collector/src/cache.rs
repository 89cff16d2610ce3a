use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

/// Last raw reading of one metric and when it was taken (Unix seconds).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachedMetric {
    pub value: i64,
    pub timestamp: i64,
}

/// Previous samples keyed `device:interface:mib`.
///
/// Entries never expire; an interface that disappears from the directory
/// keeps its entries for the life of the cache.
#[derive(Debug, Default)]
pub struct SampleCache {
    entries: Mutex<HashMap<String, CachedMetric>>,
}

impl SampleCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key(device: &str, interface: &str, mib: &str) -> String {
        format!("{device}:{interface}:{mib}")
    }

    fn lock_entries(&self) -> MutexGuard<'_, HashMap<String, CachedMetric>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, key: &str) -> Option<CachedMetric> {
        self.lock_entries().get(key).copied()
    }

    pub fn set(&self, key: impl Into<String>, sample: CachedMetric) {
        self.lock_entries().insert(key.into(), sample);
    }

    pub fn len(&self) -> usize {
        self.lock_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_entries().is_empty()
    }
}
