//! # EventRegistry: routes backend notifications to the step awaiting them.
//!
//! One table, `CorrelationKey → Waiter`, shared by every session through an
//! `Arc`. It is the only shared mutable state of the orchestration core.
//!
//! ## Architecture
//! ```text
//! Session task                          Webhook adapter
//!   register(key, waiter) ──┐              │
//!   unregister(key) ────────┤              ▼
//!                           ▼       dispatch(event)
//!                  ┌─────────────────────────────┐
//!                  │ Mutex<HashMap<Key, Waiter>> │
//!                  └─────────────────────────────┘
//!                           │ remove under lock
//!                           ▼
//!                   waiter.fulfill(event)   (outside the lock)
//!                           │ oneshot send
//!                           ▼
//!                   session task resumes on its own
//! ```
//!
//! ## Rules
//! - `register` never overwrites a live entry.
//! - `unregister` is idempotent.
//! - `dispatch` performs lookup + removal as one atomic unit, so for a given
//!   key at most one event is ever delivered to the waiter registered at
//!   dispatch time; everything else is [`Dispatch::Stale`].
//! - Fulfillment is a non-blocking channel send performed after the lock is
//!   released; session logic never runs inside the critical section.

use std::collections::HashMap;

use parking_lot::Mutex;

use super::key::CorrelationKey;
use super::waiter::Waiter;
use crate::call::CallEvent;

/// Outcome of [`EventRegistry::dispatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// A live waiter took the event.
    Delivered { key: CorrelationKey },
    /// No live waiter for the key; the event was dropped.
    Stale { key: CorrelationKey },
}

impl Dispatch {
    #[inline]
    pub fn key(&self) -> &CorrelationKey {
        match self {
            Dispatch::Delivered { key } | Dispatch::Stale { key } => key,
        }
    }

    #[inline]
    pub fn is_delivered(&self) -> bool {
        matches!(self, Dispatch::Delivered { .. })
    }
}

/// Thread-safe `CorrelationKey → Waiter` table.
#[derive(Default)]
pub struct EventRegistry {
    table: Mutex<HashMap<CorrelationKey, Waiter>>,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `waiter` under `key`.
    ///
    /// Returns `false`, leaving the existing entry untouched, if the key is
    /// already held.
    pub fn register(&self, key: CorrelationKey, waiter: &Waiter) -> bool {
        let mut table = self.table.lock();
        if table.contains_key(&key) {
            tracing::debug!(key = %key, "registration refused: key is live");
            return false;
        }
        table.insert(key, waiter.clone());
        true
    }

    /// Removes the entry for `key`, if any. Returns whether one was removed.
    pub fn unregister(&self, key: &CorrelationKey) -> bool {
        self.table.lock().remove(key).is_some()
    }

    /// Removes the entry for `key` only if it still belongs to `waiter`.
    ///
    /// Used by registration owners on cleanup so that a fresh waiter
    /// registered later under the same key is left alone.
    pub fn release(&self, key: &CorrelationKey, waiter: &Waiter) -> bool {
        let mut table = self.table.lock();
        match table.get(key) {
            Some(current) if current.same(waiter) => {
                table.remove(key);
                true
            }
            _ => false,
        }
    }

    /// Routes `event` to the waiter registered under its key.
    pub fn dispatch(&self, event: CallEvent) -> Dispatch {
        let key = CorrelationKey::of(&event);
        let waiter = self.table.lock().remove(&key);

        match waiter {
            Some(w) if w.fulfill(event) => {
                tracing::debug!(key = %key, waiter = w.id(), "event delivered");
                Dispatch::Delivered { key }
            }
            _ => {
                tracing::debug!(key = %key, "stale event dropped");
                Dispatch::Stale { key }
            }
        }
    }

    pub fn contains(&self, key: &CorrelationKey) -> bool {
        self.table.lock().contains_key(key)
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.table.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.lock().is_empty()
    }

    /// Sorted snapshot of live keys (diagnostics only).
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.table.lock().keys().map(|k| k.to_string()).collect();
        keys.sort_unstable();
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call::{CallEventKind, EventPayload};
    use crate::correlation::{Resolution, WaiterState};

    fn play_done(op: &str) -> CallEvent {
        CallEvent::new(CallEventKind::PlayCompleted, op, EventPayload::None)
    }

    #[tokio::test]
    async fn test_single_delivery_for_repeated_events() {
        let reg = EventRegistry::new();
        let (waiter, handle) = Waiter::new();
        let key = CorrelationKey::new(CallEventKind::PlayCompleted, "op-1");
        assert!(reg.register(key.clone(), &waiter));

        let outcomes: Vec<Dispatch> = (0..5).map(|_| reg.dispatch(play_done("op-1"))).collect();

        assert_eq!(outcomes[0], Dispatch::Delivered { key: key.clone() });
        let stale = Dispatch::Stale { key: key.clone() };
        assert!(outcomes[1..].iter().all(|d| *d == stale));

        let got = handle.wait().await;
        assert_eq!(got, Resolution::Fulfilled(play_done("op-1")));
        assert!(reg.is_empty());
    }

    #[test]
    fn test_second_register_keeps_original() {
        let reg = EventRegistry::new();
        let (first, _h1) = Waiter::new();
        let (second, _h2) = Waiter::new();
        let key = CorrelationKey::new(CallEventKind::CallConnected, "leg-1");

        assert!(reg.register(key.clone(), &first));
        assert!(!reg.register(key.clone(), &second));
        assert_eq!(reg.len(), 1);

        let ev = CallEvent::new(CallEventKind::CallConnected, "leg-1", EventPayload::None);
        assert!(reg.dispatch(ev).is_delivered());
        assert_eq!(first.state(), WaiterState::Fulfilled);
        assert_eq!(second.state(), WaiterState::Pending);
    }

    #[test]
    fn test_unmatched_event_leaves_registry_unchanged() {
        let reg = EventRegistry::new();
        let (waiter, _h) = Waiter::new();
        let key = CorrelationKey::new(CallEventKind::PlayCompleted, "op-1");
        reg.register(key.clone(), &waiter);

        let out = reg.dispatch(play_done("op-2"));
        let expected = CorrelationKey::new(CallEventKind::PlayCompleted, "op-2");
        assert_eq!(out, Dispatch::Stale { key: expected });
        assert_eq!(reg.keys(), vec![key.to_string()]);
        assert_eq!(waiter.state(), WaiterState::Pending);
    }

    #[test]
    fn test_unregister_is_idempotent() {
        let reg = EventRegistry::new();
        let (waiter, _h) = Waiter::new();
        let key = CorrelationKey::new(CallEventKind::CallDisconnected, "leg-9");
        reg.register(key.clone(), &waiter);

        assert!(reg.unregister(&key));
        assert!(!reg.unregister(&key));
        assert!(!reg.contains(&key));
    }

    #[test]
    fn test_release_ignores_newer_waiter() {
        let reg = EventRegistry::new();
        let (old, _h1) = Waiter::new();
        let (new, _h2) = Waiter::new();
        let key = CorrelationKey::new(CallEventKind::RecognizeCompleted, "leg-1");

        reg.register(key.clone(), &old);
        reg.unregister(&key);
        reg.register(key.clone(), &new);

        assert!(!reg.release(&key, &old));
        assert!(reg.contains(&key));
        assert!(reg.release(&key, &new));
        assert!(reg.is_empty());
    }

    #[test]
    fn test_sibling_keys_resolve_once() {
        let reg = EventRegistry::new();
        let (waiter, _h) = Waiter::new();
        let done = CorrelationKey::new(CallEventKind::PlayCompleted, "op-5");
        let failed = CorrelationKey::new(CallEventKind::PlayFailed, "op-5");
        reg.register(done.clone(), &waiter);
        reg.register(failed.clone(), &waiter);

        assert!(reg.dispatch(play_done("op-5")).is_delivered());
        let late = reg.dispatch(CallEvent::new(
            CallEventKind::PlayFailed,
            "op-5",
            EventPayload::None,
        ));
        assert_eq!(late, Dispatch::Stale { key: failed });
    }
}
