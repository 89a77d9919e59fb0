//! # callvisor
//!
//! **Callvisor** is the orchestration core of a telephony call-automation
//! service.
//!
//! A call session issues an action to the telephony backend (answer, play,
//! recognize, add participant, hang up), then suspends until the matching
//! asynchronous notification arrives on a webhook, a deadline elapses or the
//! session is cancelled. The crate pairs those notifications with the
//! suspended sessions and drives each call leg through a scripted flow.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   webhook body ─► webhook::decode_call_events ─► CallEvent
//!                                                     │
//!                                      Orchestrator::dispatch(ev)
//!                                                     ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Orchestrator                                                     │
//! │  - EventRegistry (CorrelationKey ─► Waiter)                       │
//! │  - live sessions (SessionId ─► CancellationToken)                 │
//! │  - Bus (broadcast lifecycle events)                               │
//! └──────┬──────────────────┬──────────────────┬──────────────────────┘
//!        ▼                  ▼                  ▼
//!   ┌───────────┐      ┌───────────┐      ┌───────────┐
//!   │CallSession│      │CallSession│      │CallSession│   one task per call leg
//!   │ (script)  │      │ (script)  │      │ (script)  │
//!   └─────┬─────┘      └─────┬─────┘      └─────┬─────┘
//!         │ CallControl::{answer, play, recognize_dtmf, ...}
//!         ▼
//!   telephony backend ── later ──► webhook ──► dispatch ──► Waiter fulfilled
//!
//!   Sessions publish StateChanged, ActionIssued, StepTimedOut, ...
//!         ▼
//!   Bus ─► subscriber_listener ─► SubscriberSet ─► LogWriter / custom
//! ```
//!
//! ### One step
//! ```text
//! register waiters (keys) ─► issue action ─► race {
//!     event      ─► next state
//!     deadline   ─► StepTimedOut ─► Terminating
//!     cancelled  ─► Terminated (no further actions)
//! }
//! ```
//!
//! ## Features
//! | Area              | Description                                                    | Key types / traits                         |
//! |-------------------|----------------------------------------------------------------|--------------------------------------------|
//! | **Backend**       | Capability the core drives calls through.                      | [`CallControl`], [`Ack`], [`BackendError`] |
//! | **Correlation**   | Route notifications to the session waiting for them.           | [`EventRegistry`], [`CorrelationKey`]      |
//! | **Flows**         | Scripted call flows and presets.                               | [`FlowScript`], [`Menu`], [`Branch`]       |
//! | **Orchestration** | Start, cancel and shut down sessions.                          | [`Orchestrator`], [`SessionReport`]        |
//! | **Subscriber API**| Hook into lifecycle events.                                    | [`Subscribe`], [`LogWriter`]               |
//! | **Errors**        | Typed errors for steps, runtime and decoding.                  | [`StepError`], [`RuntimeError`]            |
//! | **Configuration** | Deadlines, grace period and recognize defaults.                | [`Config`]                                 |
//!
//! ## Example
//! ```rust
//! use callvisor::{CallEvent, CallEventKind, CorrelationKey, EventPayload, EventRegistry, Waiter};
//!
//! let registry = EventRegistry::new();
//! let (waiter, _handle) = Waiter::new();
//! registry.register(CorrelationKey::new(CallEventKind::CallConnected, "leg-1"), &waiter);
//!
//! let ev = CallEvent::new(CallEventKind::CallConnected, "leg-1", EventPayload::None);
//! assert!(registry.dispatch(ev.clone()).is_delivered());
//! assert!(!registry.dispatch(ev).is_delivered()); // second delivery is stale
//! ```
mod call;
mod config;
mod core;
mod correlation;
mod error;
mod events;
mod flows;
mod subscribers;

pub mod webhook;

// ---- Public re-exports ----

pub use call::{
    Ack, Action, CallControl, CallEvent, CallEventKind, CallLegId, ControlRef, DtmfTone,
    EventPayload, KeySpace, Participant, Prompt, RecognizeOptions, UnknownTone,
};
pub use config::Config;
pub use core::{
    Orchestrator, OrchestratorBuilder, SessionHandle, SessionId, SessionOutcome, SessionReport,
    SessionState,
};
pub use correlation::{
    CorrelationKey, Dispatch, EventRegistry, Expectation, Resolution, WaitHandle, Waiter,
    WaiterState,
};
pub use error::{BackendError, ConfigError, DecodeError, RuntimeError, StepError};
pub use events::{Bus, Event, EventKind};
pub use flows::{Branch, CallOrigin, FlowScript, Menu, Selection};
pub use subscribers::{LogWriter, Subscribe, SubscriberSet};
