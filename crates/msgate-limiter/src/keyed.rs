//! Single-key concurrency limiter
//!
//! [`KeyedConcurrencyLimiter`] bounds the number of concurrently admitted
//! operations for one key. Callers beyond the limit queue in FIFO order and
//! are admitted as earlier holders call [`stop`](KeyedConcurrencyLimiter::stop).
//!
//! The limiter is plain data with `&mut self` methods. Sharing across tasks
//! goes through [`ConcurrencyLimiterRegistry`](crate::ConcurrencyLimiterRegistry),
//! which owns every limiter behind a single mutex.
//!
//! ## Limit semantics
//!
//! | limit | behaviour                                                 |
//! |-------|-----------------------------------------------------------|
//! | `< 0` | unlimited; tickets resolve immediately and nothing is kept |
//! | `0`   | nothing is ever admitted; tickets never resolve           |
//! | `> 0` | at most `limit` active, the rest wait in arrival order    |

use std::collections::VecDeque;

use tokio::sync::oneshot;
use tracing::trace;

use crate::ticket::AdmissionTicket;
use crate::LimiterError;

/// Bounded FIFO admission for a single key
#[derive(Debug)]
pub struct KeyedConcurrencyLimiter {
    key: String,
    limit: i64,
    active: usize,
    waiters: VecDeque<oneshot::Sender<()>>,
}

impl KeyedConcurrencyLimiter {
    /// Creates an empty limiter for `key`
    pub fn new(key: impl Into<String>, limit: i64) -> Self {
        Self {
            key: key.into(),
            limit,
            active: 0,
            waiters: VecDeque::new(),
        }
    }

    /// Key this limiter guards
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Configured limit
    pub fn limit(&self) -> i64 {
        self.limit
    }

    /// Number of admissions currently granted and not yet stopped
    pub fn active_count(&self) -> usize {
        self.active
    }

    /// Number of callers still waiting for admission
    ///
    /// Waiters whose ticket has been dropped are not counted.
    pub fn waiting_count(&self) -> usize {
        self.waiters.iter().filter(|tx| !tx.is_closed()).count()
    }

    /// Requests admission
    ///
    /// The returned ticket resolves once the caller is admitted. Every
    /// resolved ticket must be matched by exactly one [`stop`](Self::stop).
    pub fn start(&mut self) -> AdmissionTicket {
        if self.limit < 0 {
            return AdmissionTicket::granted(self.key.clone());
        }
        if self.limit == 0 {
            return AdmissionTicket::never(self.key.clone());
        }

        let (tx, rx) = oneshot::channel();
        self.waiters.push_back(tx);
        self.check_concurrent();
        AdmissionTicket::waiting(self.key.clone(), rx)
    }

    /// Releases one admission and admits the next waiter, if any
    ///
    /// A no-op for limits of zero or below. Fails with
    /// [`LimiterError::NegativeConcurrency`] when nothing is active; the
    /// limiter is left unchanged in that case.
    pub fn stop(&mut self) -> Result<(), LimiterError> {
        if self.limit <= 0 {
            return Ok(());
        }
        if self.active == 0 {
            return Err(LimiterError::NegativeConcurrency {
                key: self.key.clone(),
            });
        }
        self.active -= 1;
        self.check_concurrent();
        Ok(())
    }

    /// Hands a granted-but-unobserved slot back
    ///
    /// Same as [`stop`](Self::stop); kept separate so call sites read clearly.
    pub(crate) fn compensate(&mut self) -> Result<(), LimiterError> {
        self.stop()
    }

    /// Drops waiters whose tickets have gone away
    pub(crate) fn prune_abandoned(&mut self) {
        self.waiters.retain(|tx| !tx.is_closed());
    }

    /// True when nothing is active and nobody is waiting
    ///
    /// Abandoned waiters are pruned first.
    pub fn is_empty(&mut self) -> bool {
        self.prune_abandoned();
        self.active == 0 && self.waiters.is_empty()
    }

    fn check_concurrent(&mut self) {
        while (self.active as i64) < self.limit {
            let Some(tx) = self.waiters.pop_front() else {
                break;
            };
            // Count the slot first; a closed receiver gives it straight back.
            self.active += 1;
            if tx.send(()).is_err() {
                self.active -= 1;
                trace!(key = %self.key, "Skipped abandoned waiter");
            }
        }
    }
}
