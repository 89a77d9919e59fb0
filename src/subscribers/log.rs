//! # Structured logging subscriber.
//!
//! [`LogWriter`] renders each lifecycle [`Event`] as a `tracing` record with
//! structured fields. Install any `tracing` subscriber (e.g.
//! `tracing_subscriber::fmt`) in the process to see the output.
//!
//! ## Output (fmt subscriber)
//! ```text
//! INFO  session started session="session-1" origin="inbound"
//! INFO  state changed session="session-1" call_leg="leg-7" state=Connected
//! INFO  action issued session="session-1" call_leg="leg-7" action=play key="PlayCompleted-3f2a.."
//! WARN  step timed out session="session-1" action=recognize timeout_ms=30000
//! DEBUG event dropped key="PlayCompleted-op-3"
//! INFO  session terminated session="session-1" outcome="completed"
//! ```
//!
//! ## Example
//! ```no_run
//! # use std::sync::Arc;
//! # use callvisor::{Config, ControlRef, LogWriter, Orchestrator, Subscribe};
//! # fn control() -> ControlRef { unimplemented!() }
//! let orchestrator = Orchestrator::builder(Config::default(), control())
//!     .with_subscribers(vec![Arc::new(LogWriter) as Arc<dyn Subscribe>])
//!     .build();
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Subscriber that forwards lifecycle events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogWriter;

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let session = e.session.as_deref().unwrap_or("-");
        let call_leg = e.call_leg.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("");

        match e.kind {
            EventKind::SessionStarted => {
                tracing::info!(seq = e.seq, session, origin = reason, "session started");
            }
            EventKind::StateChanged => {
                tracing::info!(seq = e.seq, session, call_leg, state = ?e.state, "state changed");
            }
            EventKind::ActionIssued => {
                tracing::info!(
                    seq = e.seq,
                    session,
                    call_leg,
                    action = ?e.action,
                    key = e.key.as_deref(),
                    "action issued"
                );
            }
            EventKind::ActionFailed => {
                tracing::warn!(
                    seq = e.seq,
                    session,
                    call_leg,
                    action = ?e.action,
                    error = reason,
                    "action failed"
                );
            }
            EventKind::ActionSkipped => {
                tracing::info!(
                    seq = e.seq,
                    session,
                    action = ?e.action,
                    "action skipped: session cancelled"
                );
            }
            EventKind::WaiterRegistered => {
                tracing::debug!(
                    seq = e.seq,
                    session,
                    key = e.key.as_deref(),
                    "waiter registered"
                );
            }
            EventKind::StepTimedOut => {
                tracing::warn!(
                    seq = e.seq,
                    session,
                    call_leg,
                    action = ?e.action,
                    timeout_ms = e.timeout_ms,
                    "step timed out"
                );
            }
            EventKind::BranchSelected => {
                tracing::info!(
                    seq = e.seq,
                    session,
                    call_leg,
                    branch = reason,
                    "branch selected"
                );
            }
            EventKind::SessionCanceled => {
                tracing::info!(seq = e.seq, session, "session cancel requested");
            }
            EventKind::SessionTerminated => {
                tracing::info!(
                    seq = e.seq,
                    session,
                    call_leg,
                    outcome = reason,
                    "session terminated"
                );
            }
            EventKind::EventDelivered => {
                tracing::debug!(seq = e.seq, key = e.key.as_deref(), "event delivered");
            }
            EventKind::EventDropped => {
                tracing::debug!(
                    seq = e.seq,
                    key = e.key.as_deref(),
                    "event dropped: no live waiter"
                );
            }
            EventKind::ShutdownRequested => {
                tracing::info!(seq = e.seq, "shutdown requested");
            }
            EventKind::AllStoppedWithin => {
                tracing::info!(seq = e.seq, "all sessions stopped within grace");
            }
            EventKind::GraceExceeded => {
                tracing::error!(seq = e.seq, stuck = reason, "grace exceeded");
            }
        }
    }

    fn name(&self) -> &'static str {
        "log_writer"
    }
}
