//! Last-known-good readings, owned by the caller
//!
//! Only successful, valid readings are stored. A failed cycle never
//! touches an entry, so callers can keep showing the previous value.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use super::FetchError;
use crate::types::WeatherReading;

#[derive(Debug, Clone)]
pub struct CachedReading {
    pub reading: WeatherReading,
    pub stored_at: DateTime<Utc>,
}

impl CachedReading {
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.stored_at
    }
}

/// Per-source last-known-good reading.
#[derive(Debug, Default)]
pub struct ReadingCache {
    entries: Mutex<HashMap<String, CachedReading>>,
}

impl ReadingCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CachedReading>> {
        // A panic while holding the lock cannot leave a half-written entry
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Store the outcome of a cycle. Returns true if the cache changed.
    pub fn record(&self, result: &Result<WeatherReading, FetchError>) -> bool {
        match result {
            Ok(reading) => self.store(reading.clone()),
            Err(_) => false,
        }
    }

    /// Store a reading if it is valid.
    pub fn store(&self, reading: WeatherReading) -> bool {
        if !reading.valid {
            return false;
        }
        let id = reading.source_id.clone();
        self.lock().insert(
            id,
            CachedReading {
                reading,
                stored_at: Utc::now(),
            },
        );
        true
    }

    pub fn get(&self, source_id: &str) -> Option<CachedReading> {
        self.lock().get(source_id).cloned()
    }

    /// The cached reading if it is no older than `max_age`.
    pub fn get_fresh(&self, source_id: &str, max_age: Duration) -> Option<WeatherReading> {
        let now = Utc::now();
        self.get(source_id)
            .filter(|c| c.age(now) <= max_age)
            .map(|c| c.reading)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}
