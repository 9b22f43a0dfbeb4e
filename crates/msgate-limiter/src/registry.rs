//! Keyed limiter registry
//!
//! [`ConcurrencyLimiterRegistry`] maps keys to [`KeyedConcurrencyLimiter`]s,
//! creating them on first use and dropping them as soon as they are empty.
//! One registry is built per worker at startup and cloned into every request
//! handler; clones share the same state.
//!
//! A `stop()` for a key that has no limiter creates one and fails with
//! [`LimiterError::NegativeConcurrency`]. The empty limiter is removed again
//! straight away, so the failed call leaves no trace.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, error, trace};

use crate::keyed::KeyedConcurrencyLimiter;
use crate::ticket::AdmissionTicket;
use crate::LimiterError;

// ============================================================================
// ConcurrencyLimiterRegistry
// ============================================================================

struct RegistryInner {
    limit: i64,
    limiters: Mutex<HashMap<String, KeyedConcurrencyLimiter>>,
}

impl RegistryInner {
    fn lock(&self) -> MutexGuard<'_, HashMap<String, KeyedConcurrencyLimiter>> {
        self.limiters.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Removes the limiter for `key` if nothing is active or waiting
    fn cleanup(limiters: &mut HashMap<String, KeyedConcurrencyLimiter>, key: &str) {
        if limiters.get_mut(key).is_some_and(KeyedConcurrencyLimiter::is_empty) {
            limiters.remove(key);
            trace!(key, "Removed empty concurrency limiter");
        }
    }

    fn get_or_create<'a>(
        &self,
        limiters: &'a mut HashMap<String, KeyedConcurrencyLimiter>,
        key: &str,
    ) -> &'a mut KeyedConcurrencyLimiter {
        limiters.entry(key.to_string()).or_insert_with(|| {
            debug!(key, limit = self.limit, "Created concurrency limiter");
            KeyedConcurrencyLimiter::new(key, self.limit)
        })
    }

    fn stop(&self, key: &str) -> Result<(), LimiterError> {
        let mut limiters = self.lock();
        let result = self.get_or_create(&mut limiters, key).stop();
        Self::cleanup(&mut limiters, key);
        result
    }

    /// Settles a ticket dropped before its admission was consumed
    fn abandon(&self, key: &str, granted: bool) {
        let mut limiters = self.lock();
        if granted {
            debug!(key, "Releasing slot granted to an abandoned ticket");
            if let Some(limiter) = limiters.get_mut(key) {
                if let Err(e) = limiter.compensate() {
                    error!(key, error = %e, "Failed to release abandoned admission");
                }
            }
        } else if let Some(limiter) = limiters.get_mut(key) {
            limiter.prune_abandoned();
        }
        Self::cleanup(&mut limiters, key);
    }
}

/// Process-local, per-key concurrency limiting
///
/// All keys share the limit given at construction. See
/// [`KeyedConcurrencyLimiter`] for how the limit value is interpreted.
#[derive(Clone)]
pub struct ConcurrencyLimiterRegistry {
    inner: Arc<RegistryInner>,
}

impl ConcurrencyLimiterRegistry {
    /// Creates an empty registry applying `limit` to every key
    pub fn new(limit: i64) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                limit,
                limiters: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Limit applied to every key
    pub fn limit(&self) -> i64 {
        self.inner.limit
    }

    /// Requests admission for `key`
    ///
    /// Dropping the returned ticket before it resolves withdraws the request.
    /// If the slot had already been granted, it is handed back.
    pub fn start(&self, key: &str) -> AdmissionTicket {
        let ticket = {
            let mut limiters = self.inner.lock();
            let ticket = self.inner.get_or_create(&mut limiters, key).start();
            RegistryInner::cleanup(&mut limiters, key);
            ticket
        };

        if !ticket.is_tracked() {
            return ticket;
        }

        let inner = Arc::clone(&self.inner);
        let owned_key = key.to_string();
        ticket.with_abandon_hook(Box::new(move |granted| inner.abandon(&owned_key, granted)))
    }

    /// Releases one admission for `key`
    ///
    /// # Errors
    ///
    /// [`LimiterError::NegativeConcurrency`] when `key` has no admission to
    /// release. The registry state is left untouched.
    pub fn stop(&self, key: &str) -> Result<(), LimiterError> {
        let result = self.inner.stop(key);
        if let Err(e) = &result {
            error!(key, error = %e, "Unbalanced concurrency stop");
        }
        result
    }

    /// Waits for admission and returns a permit that releases it on drop
    pub async fn acquire(&self, key: &str) -> Result<ConcurrencyPermit, LimiterError> {
        self.start(key).await?;
        Ok(ConcurrencyPermit {
            registry: self.clone(),
            key: key.to_string(),
            released: false,
        })
    }

    /// Keys that currently have a limiter, in no particular order
    pub fn active_keys(&self) -> Vec<String> {
        self.inner.lock().keys().cloned().collect()
    }

    /// Number of granted admissions for `key`
    pub fn active_count(&self, key: &str) -> usize {
        self.inner
            .lock()
            .get(key)
            .map_or(0, KeyedConcurrencyLimiter::active_count)
    }

    /// Number of callers waiting on `key`
    pub fn waiting_count(&self, key: &str) -> usize {
        self.inner
            .lock()
            .get(key)
            .map_or(0, KeyedConcurrencyLimiter::waiting_count)
    }

    /// Whether a limiter currently exists for `key`
    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.lock().contains_key(key)
    }

    /// Number of keys with a live limiter
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// True when no key has a live limiter
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

impl std::fmt::Debug for ConcurrencyLimiterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConcurrencyLimiterRegistry")
            .field("limit", &self.inner.limit)
            .field("keys", &self.len())
            .finish()
    }
}

// ============================================================================
// ConcurrencyPermit
// ============================================================================

/// A granted admission that is released when dropped
///
/// Prefer [`release`](Self::release) when the caller wants to observe an
/// unbalanced stop; dropping logs it instead.
#[derive(Debug)]
pub struct ConcurrencyPermit {
    registry: ConcurrencyLimiterRegistry,
    key: String,
    released: bool,
}

impl ConcurrencyPermit {
    /// Key the permit was granted for
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Releases the admission now
    pub fn release(mut self) -> Result<(), LimiterError> {
        self.released = true;
        self.registry.stop(&self.key)
    }
}

impl Drop for ConcurrencyPermit {
    fn drop(&mut self) {
        if !self.released {
            // Errors are already logged by stop()
            let _ = self.registry.stop(&self.key);
        }
    }
}
