//! # One-shot waiter.
//!
//! A [`Waiter`] is the fulfilling half of a single-use slot; the matching
//! [`WaitHandle`] is the half a session suspends on. The pair wraps a
//! `tokio::sync::oneshot` channel, so resolving a waiter is a non-blocking
//! send and the session resumes on its own task.
//!
//! ## State machine
//! ```text
//!            fulfill(event)
//!   Pending ───────────────► Fulfilled
//!      │
//!      │ cancel()
//!      └───────────────────► Canceled
//! ```
//!
//! ## Rules
//! - Exactly one resolution is honored; later `fulfill`/`cancel` calls return `false`.
//! - A waiter can be registered under several keys: the first matching event wins,
//!   siblings that arrive afterwards find it resolved.
//! - Dropping the [`WaitHandle`] does not resolve the waiter; the registry
//!   entry is removed by whoever owns the registration.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::call::CallEvent;

static WAITER_SEQ: AtomicU64 = AtomicU64::new(1);

/// Lifecycle of a waiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaiterState {
    Pending,
    Fulfilled,
    Canceled,
}

/// What a [`WaitHandle`] resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A matching event arrived.
    Fulfilled(CallEvent),
    /// The waiter was canceled (or its fulfilling half vanished).
    Canceled,
}

struct Slot {
    state: WaiterState,
    tx: Option<oneshot::Sender<Resolution>>,
}

/// Fulfilling half of a one-shot slot. Cheap to clone; clones share the slot.
#[derive(Clone)]
pub struct Waiter {
    id: u64,
    slot: Arc<Mutex<Slot>>,
}

impl std::fmt::Debug for Waiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Waiter")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish()
    }
}

impl Waiter {
    /// Creates a pending waiter and the handle that observes it.
    pub fn new() -> (Waiter, WaitHandle) {
        let (tx, rx) = oneshot::channel();
        let waiter = Waiter {
            id: WAITER_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            slot: Arc::new(Mutex::new(Slot {
                state: WaiterState::Pending,
                tx: Some(tx),
            })),
        };
        let handle = WaitHandle {
            waiter: waiter.clone(),
            rx,
        };
        (waiter, handle)
    }

    /// Process-unique id (for logs).
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> WaiterState {
        self.slot.lock().state
    }

    /// Delivers `event`. Returns `false` if the waiter was already resolved.
    pub fn fulfill(&self, event: CallEvent) -> bool {
        self.resolve(WaiterState::Fulfilled, Resolution::Fulfilled(event))
    }

    /// Resolves the waiter as canceled. Returns `false` if already resolved.
    pub fn cancel(&self) -> bool {
        self.resolve(WaiterState::Canceled, Resolution::Canceled)
    }

    /// True if both handles refer to the same slot.
    #[inline]
    pub fn same(&self, other: &Waiter) -> bool {
        Arc::ptr_eq(&self.slot, &other.slot)
    }

    fn resolve(&self, next: WaiterState, resolution: Resolution) -> bool {
        let tx = {
            let mut slot = self.slot.lock();
            if slot.state != WaiterState::Pending {
                return false;
            }
            slot.state = next;
            slot.tx.take()
        };
        if let Some(tx) = tx {
            // Receiver may be gone (session already left the step); the
            // resolution is still recorded.
            let _ = tx.send(resolution);
        }
        true
    }
}

/// Observing half of a one-shot slot, owned by the session that created it.
pub struct WaitHandle {
    waiter: Waiter,
    rx: oneshot::Receiver<Resolution>,
}

impl WaitHandle {
    /// The fulfilling half this handle observes.
    pub fn waiter(&self) -> &Waiter {
        &self.waiter
    }

    /// Suspends until the waiter is resolved.
    pub async fn wait(self) -> Resolution {
        self.rx.await.unwrap_or(Resolution::Canceled)
    }
}
