//! In-process ICounterStore
//!
//! Counters live in a `DashMap`. Each operation goes through the map's
//! entry API and so holds the shard lock for its whole read-modify-write.

use dashmap::DashMap;

use msgate_core::ports::ICounterStore;

/// Counter store for a single worker process
#[derive(Debug, Default)]
pub struct InMemoryCounterStore {
    counters: DashMap<String, i64>,
}

impl InMemoryCounterStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key` to `value`, e.g. to seed a test scenario
    pub fn set(&self, key: &str, value: i64) {
        self.counters.insert(key.to_string(), value.max(0));
    }
}

#[async_trait::async_trait]
impl ICounterStore for InMemoryCounterStore {
    async fn increment(&self, key: &str) -> anyhow::Result<i64> {
        let mut count = self.counters.entry(key.to_string()).or_insert(0);
        *count += 1;
        Ok(*count)
    }

    async fn decrement(&self, key: &str) -> anyhow::Result<i64> {
        let Some(mut count) = self.counters.get_mut(key) else {
            return Ok(0);
        };
        *count = (*count - 1).max(0);
        Ok(*count)
    }

    async fn read(&self, key: &str) -> anyhow::Result<i64> {
        Ok(self.counters.get(key).map_or(0, |c| *c))
    }

    async fn increment_below(&self, key: &str, ceiling: i64) -> anyhow::Result<Option<i64>> {
        if ceiling <= 0 {
            return Ok(None);
        }
        let mut count = self.counters.entry(key.to_string()).or_insert(0);
        if *count >= ceiling {
            return Ok(None);
        }
        *count += 1;
        Ok(Some(*count))
    }
}
