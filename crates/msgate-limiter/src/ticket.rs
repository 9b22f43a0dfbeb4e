//! Admission tickets
//!
//! An [`AdmissionTicket`] is the handle returned by `start()`. It is a future
//! that resolves once the limiter grants the admission. Internally a queued
//! ticket is the receiving half of a `tokio::sync::oneshot` channel whose
//! sender sits in the limiter's wait queue.
//!
//! ## Abandonment
//!
//! Dropping a ticket before it resolves abandons it:
//!
//! - If the grant had not happened yet, the channel is closed so the limiter
//!   skips (and prunes) the waiter instead of granting it.
//! - If the grant had already been sent but was never observed, the slot is
//!   handed back through the abandon hook installed by the registry, which
//!   performs the compensating `stop()`.
//!
//! A grant observed through [`AdmissionTicket::is_granted`] belongs to the
//! caller from then on, exactly as if the ticket had been awaited.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::LimiterError;

/// Callback run when a ticket is dropped before its admission was consumed.
///
/// The argument is `true` when the admission had already been granted.
pub(crate) type AbandonHook = Box<dyn FnOnce(bool) + Send + 'static>;

enum TicketState {
    /// Granted and owned by the caller
    Granted,
    /// Queued, waiting for the limiter to send the grant
    Waiting(oneshot::Receiver<()>),
    /// Limit of zero: never granted
    Never,
    /// Resolved and handed to the caller
    Consumed,
}

/// Handle for a pending or granted admission
///
/// Await it to wait for admission. Once it resolves with `Ok(())` the caller
/// holds one slot and must call `stop()` for the same key when done.
pub struct AdmissionTicket {
    key: String,
    state: TicketState,
    on_abandon: Option<AbandonHook>,
}

impl AdmissionTicket {
    pub(crate) fn granted(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            state: TicketState::Granted,
            on_abandon: None,
        }
    }

    pub(crate) fn never(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            state: TicketState::Never,
            on_abandon: None,
        }
    }

    pub(crate) fn waiting(key: impl Into<String>, rx: oneshot::Receiver<()>) -> Self {
        Self {
            key: key.into(),
            state: TicketState::Waiting(rx),
            on_abandon: None,
        }
    }

    /// Installs the hook run when this ticket is dropped unconsumed
    pub(crate) fn with_abandon_hook(mut self, hook: AbandonHook) -> Self {
        self.on_abandon = Some(hook);
        self
    }

    /// Whether this ticket needs a hook to keep the limiter's books straight
    pub(crate) fn is_tracked(&self) -> bool {
        matches!(self.state, TicketState::Waiting(_))
    }

    /// Key this ticket was issued for
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Checks, without waiting, whether the admission has been granted
    pub fn is_granted(&mut self) -> bool {
        match &mut self.state {
            TicketState::Granted | TicketState::Consumed => true,
            TicketState::Never => false,
            TicketState::Waiting(rx) => {
                if rx.try_recv().is_ok() {
                    self.state = TicketState::Granted;
                    true
                } else {
                    false
                }
            }
        }
    }
}

impl Future for AdmissionTicket {
    type Output = Result<(), LimiterError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match &mut this.state {
            TicketState::Granted => {
                this.state = TicketState::Consumed;
                Poll::Ready(Ok(()))
            }
            TicketState::Never => Poll::Pending,
            TicketState::Waiting(rx) => match Pin::new(rx).poll(cx) {
                Poll::Ready(Ok(())) => {
                    this.state = TicketState::Consumed;
                    Poll::Ready(Ok(()))
                }
                Poll::Ready(Err(_)) => {
                    this.state = TicketState::Consumed;
                    Poll::Ready(Err(LimiterError::Closed {
                        key: this.key.clone(),
                    }))
                }
                Poll::Pending => Poll::Pending,
            },
            TicketState::Consumed => panic!("AdmissionTicket polled after completion"),
        }
    }
}

impl Drop for AdmissionTicket {
    fn drop(&mut self) {
        let TicketState::Waiting(rx) = &mut self.state else {
            return;
        };
        // After close() the limiter can no longer grant us; a grant already
        // sent is still readable.
        rx.close();
        let granted = rx.try_recv().is_ok();

        if let Some(hook) = self.on_abandon.take() {
            hook(granted);
        }
    }
}

impl fmt::Debug for AdmissionTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &self.state {
            TicketState::Granted => "granted",
            TicketState::Waiting(_) => "waiting",
            TicketState::Never => "never",
            TicketState::Consumed => "consumed",
        };
        f.debug_struct("AdmissionTicket")
            .field("key", &self.key)
            .field("state", &state)
            .finish()
    }
}
