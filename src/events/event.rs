//! # Lifecycle events emitted by the orchestrator and call sessions.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Session events**: a session started, changed state, was canceled, terminated
//! - **Step events**: actions issued/failed/skipped, waiters registered, timeouts, branches
//! - **Routing events**: backend notifications delivered to a waiter or dropped as stale
//! - **Shutdown events**: runtime shutdown progress
//!
//! The [`Event`] struct carries additional metadata such as timestamps, session id,
//! call leg, correlation key, state and reasons.
//!
//! These are *not* the backend's call notifications (see [`CallEvent`](crate::CallEvent));
//! they describe what the orchestration core decided.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//! use callvisor::{Action, Event, EventKind};
//!
//! let ev = Event::new(EventKind::StepTimedOut)
//!     .with_session("session-4")
//!     .with_call_leg("leg-9")
//!     .with_action(Action::Recognize)
//!     .with_timeout(Duration::from_secs(30));
//!
//! assert_eq!(ev.kind, EventKind::StepTimedOut);
//! assert_eq!(ev.session.as_deref(), Some("session-4"));
//! assert_eq!(ev.timeout_ms, Some(30_000));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use crate::call::Action;
use crate::core::SessionState;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Shutdown events ===
    /// Shutdown requested (OS signal or explicit call).
    ///
    /// Sets:
    /// - `at`: wall-clock timestamp
    /// - `seq`: global sequence
    ShutdownRequested,

    /// All sessions stopped within configured grace period.
    ///
    /// Sets:
    /// - `at`, `seq`
    AllStoppedWithin,

    /// Grace period exceeded; some sessions did not stop in time.
    ///
    /// Sets:
    /// - `reason`: comma-separated stuck session ids
    /// - `at`, `seq`
    GraceExceeded,

    // === Session events ===
    /// A session was spawned.
    ///
    /// Sets:
    /// - `session`: session id
    /// - `reason`: call origin (`inbound` / `outbound`)
    SessionStarted,

    /// A session moved to a new state.
    ///
    /// Sets:
    /// - `session`, `call_leg` (once known)
    /// - `state`: the state entered
    StateChanged,

    /// Cancellation of a session was requested by the operator.
    ///
    /// Sets:
    /// - `session`
    SessionCanceled,

    /// A session reached `Terminated`.
    ///
    /// Sets:
    /// - `session`, `call_leg`
    /// - `reason`: outcome label
    SessionTerminated,

    // === Step events ===
    /// A backend action was acknowledged.
    ///
    /// Sets:
    /// - `session`, `call_leg`, `action`
    /// - `key`: correlation key the outcome is awaited on (play, recognize,
    ///   confirmed add-participant)
    ActionIssued,

    /// A backend action (or its outcome notification) failed.
    ///
    /// Sets:
    /// - `session`, `call_leg`, `action`
    /// - `reason`: error message
    ActionFailed,

    /// A backend action was suppressed because the session was canceled.
    ///
    /// Sets:
    /// - `session`, `action`
    ActionSkipped,

    /// A waiter was registered.
    ///
    /// Sets:
    /// - `session`, `key`
    WaiterRegistered,

    /// No matching notification arrived before the step deadline.
    ///
    /// Sets:
    /// - `session`, `call_leg`, `action`, `timeout_ms`
    StepTimedOut,

    /// The menu picked a branch.
    ///
    /// Sets:
    /// - `session`, `call_leg`
    /// - `reason`: branch label (tone, `invalid`, `no_input`)
    BranchSelected,

    // === Routing events ===
    /// A backend notification fulfilled a waiter.
    ///
    /// Sets:
    /// - `key`
    EventDelivered,

    /// A backend notification matched no live waiter and was dropped.
    ///
    /// Sets:
    /// - `key`
    EventDropped,
}

/// Lifecycle event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Session id, if applicable.
    pub session: Option<Arc<str>>,
    /// Call-leg id, once known.
    pub call_leg: Option<Arc<str>>,
    /// Rendered correlation key.
    pub key: Option<Arc<str>>,
    /// Session state (for `StateChanged`).
    pub state: Option<SessionState>,
    /// Backend action concerned.
    pub action: Option<Action>,
    /// Human-readable reason (errors, outcome, branch label, etc.).
    pub reason: Option<Arc<str>>,
    /// Step timeout in milliseconds (compact).
    pub timeout_ms: Option<u32>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            session: None,
            call_leg: None,
            key: None,
            state: None,
            action: None,
            reason: None,
            timeout_ms: None,
        }
    }

    #[inline]
    pub fn with_session(mut self, session: impl Into<Arc<str>>) -> Self {
        self.session = Some(session.into());
        self
    }

    #[inline]
    pub fn with_call_leg(mut self, leg: impl Into<Arc<str>>) -> Self {
        self.call_leg = Some(leg.into());
        self
    }

    /// Attaches a call leg if one is known.
    #[inline]
    pub fn with_call_leg_opt(self, leg: Option<&str>) -> Self {
        match leg {
            Some(leg) => self.with_call_leg(leg),
            None => self,
        }
    }

    #[inline]
    pub fn with_key(mut self, key: impl ToString) -> Self {
        self.key = Some(key.to_string().into());
        self
    }

    #[inline]
    pub fn with_state(mut self, state: SessionState) -> Self {
        self.state = Some(state);
        self
    }

    #[inline]
    pub fn with_action(mut self, action: Action) -> Self {
        self.action = Some(action);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a timeout duration (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.timeout_ms = Some(ms);
        self
    }

    /// True for events emitted by a session (as opposed to routing/shutdown).
    #[inline]
    pub fn is_session_scoped(&self) -> bool {
        self.session.is_some()
    }
}
