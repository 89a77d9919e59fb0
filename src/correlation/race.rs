//! # Expectation: a waiter registered under one or more keys, raced
//! against a deadline and the session's cancellation token.
//!
//! ```text
//! Expectation::register(registry, [k1, k2, ...])
//!     ├─ all keys inserted ─────────► Ok(expectation)
//!     └─ some key already live ─────► rollback inserted keys,
//!                                     Err(DuplicateRegistration)
//!
//! expectation.race(step, deadline, token)
//!     select! {
//!         waiter fulfilled  ─► Ok(event)
//!         token cancelled   ─► waiter.cancel(), Err(Canceled)
//!         deadline elapsed  ─► waiter.cancel(), Err(Timeout)
//!     }
//!     drop ─► release every key still held by this waiter
//! ```
//!
//! ## Rules
//! - Fulfillment wins ties (`biased` select).
//! - After a timeout the keys are gone from the registry, so a late event is
//!   reported stale by [`EventRegistry::dispatch`].
//! - Cleanup on drop only touches entries that still belong to this waiter.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::key::CorrelationKey;
use super::registry::EventRegistry;
use super::waiter::{Resolution, WaitHandle, Waiter};
use crate::call::{Action, CallEvent};
use crate::error::StepError;

/// A pending wait for the first of several correlated events.
pub struct Expectation {
    registry: Arc<EventRegistry>,
    waiter: Waiter,
    handle: Option<WaitHandle>,
    keys: Vec<CorrelationKey>,
}

impl Expectation {
    /// Registers one fresh waiter under every key in `keys`.
    ///
    /// Either all keys are registered or none are.
    pub fn register(
        registry: &Arc<EventRegistry>,
        keys: Vec<CorrelationKey>,
    ) -> Result<Self, StepError> {
        let (waiter, handle) = Waiter::new();

        for (i, key) in keys.iter().enumerate() {
            if !registry.register(key.clone(), &waiter) {
                for held in &keys[..i] {
                    registry.release(held, &waiter);
                }
                return Err(StepError::DuplicateRegistration { key: key.clone() });
            }
        }

        Ok(Self {
            registry: Arc::clone(registry),
            waiter,
            handle: Some(handle),
            keys,
        })
    }

    /// Keys this expectation is registered under.
    pub fn keys(&self) -> &[CorrelationKey] {
        &self.keys
    }

    pub fn waiter(&self) -> &Waiter {
        &self.waiter
    }

    /// Waits for the first matching event.
    ///
    /// `deadline = None` waits without a time limit (only an event or
    /// cancellation ends the wait).
    pub async fn race(
        mut self,
        step: Action,
        deadline: Option<Duration>,
        cancel: &CancellationToken,
    ) -> Result<CallEvent, StepError> {
        let Some(handle) = self.handle.take() else {
            return Err(StepError::Canceled);
        };

        let res = tokio::select! {
            biased;
            r = handle.wait() => match r {
                Resolution::Fulfilled(ev) => Ok(ev),
                Resolution::Canceled => Err(StepError::Canceled),
            },
            _ = cancel.cancelled() => Err(StepError::Canceled),
            _ = elapsed(deadline) => Err(StepError::Timeout {
                step,
                timeout: deadline.unwrap_or_default(),
            }),
        };

        if res.is_err() {
            self.waiter.cancel();
        }
        res
    }
}

impl Drop for Expectation {
    fn drop(&mut self) {
        for key in &self.keys {
            self.registry.release(key, &self.waiter);
        }
    }
}

async fn elapsed(deadline: Option<Duration>) {
    match deadline {
        Some(d) => tokio::time::sleep(d).await,
        None => std::future::pending().await,
    }
}
