//! # Run a single step of a call session.
//!
//! A step is: register the waiters for the outcome, issue one backend
//! action, then wait for the outcome under a deadline. This module holds the
//! three pieces and publishes the lifecycle events for each.
//!
//! ## Event flow
//!
//! ```text
//! expect():   token cancelled? ─► Err(Canceled)
//!             register keys    ─► WaiterRegistered (per key)
//!                              └► Err(DuplicateRegistration) + ActionFailed
//!
//! issue():    token cancelled? ─► ActionSkipped, Err(Canceled)   (backend never called)
//!             backend Ok(ack)  ─► ActionIssued (with the key the outcome will arrive on)
//!             backend Err(e)   ─► ActionFailed, Err(Backend)
//!
//! await_outcome():
//!             event            ─► Ok(event)
//!             deadline         ─► StepTimedOut, Err(Timeout)
//!             token cancelled  ─► Err(Disconnected) if the call leg is gone,
//!                                 Err(Canceled) otherwise
//! ```
//!
//! ## Rules
//! - The cancellation token is checked **before** every registration and
//!   every backend action; a cancelled session issues nothing further.
//! - An in-flight backend call is abandoned if the token trips meanwhile.
//! - Waiters are dropped (and their keys released) whenever a step errors out.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::{
    call::{Ack, Action, CallEvent},
    correlation::{CorrelationKey, EventRegistry, Expectation},
    error::{BackendError, StepError},
    events::{Bus, Event, EventKind},
};

/// Borrowed view of a session used by the step helpers.
pub(crate) struct StepCtx<'a> {
    pub session: &'a str,
    pub call_leg: Option<&'a str>,
    pub bus: &'a Bus,
    pub registry: &'a Arc<EventRegistry>,
    /// Session token: tripped on cancel, shutdown, disconnect and termination.
    pub token: &'a CancellationToken,
    /// Tripped only when `CallDisconnected` was observed.
    pub disconnected: &'a CancellationToken,
}

impl StepCtx<'_> {
    fn event(&self, kind: EventKind) -> Event {
        Event::new(kind)
            .with_session(self.session)
            .with_call_leg_opt(self.call_leg)
    }

    /// Maps a plain cancellation to `Disconnected` when the call is gone.
    fn cancel_reason(&self) -> StepError {
        if self.disconnected.is_cancelled() {
            StepError::Disconnected
        } else {
            StepError::Canceled
        }
    }
}

/// Registers one waiter under all `keys` (all-or-nothing).
pub(crate) fn expect(
    ctx: &StepCtx<'_>,
    step: Action,
    keys: Vec<CorrelationKey>,
) -> Result<Expectation, StepError> {
    if ctx.token.is_cancelled() {
        return Err(ctx.cancel_reason());
    }

    match Expectation::register(ctx.registry, keys) {
        Ok(exp) => {
            for key in exp.keys() {
                ctx.bus
                    .publish(ctx.event(EventKind::WaiterRegistered).with_key(key));
            }
            Ok(exp)
        }
        Err(e) => {
            publish_failed(ctx, step, &e);
            Err(e)
        }
    }
}

/// Issues one backend action unless the session is cancelled.
///
/// `call` is not polled when the token is already tripped. `key` is the
/// correlation key the outcome is expected on, if any.
pub(crate) async fn issue<F>(
    ctx: &StepCtx<'_>,
    action: Action,
    key: Option<&CorrelationKey>,
    call: F,
) -> Result<Ack, StepError>
where
    F: Future<Output = Result<Ack, BackendError>>,
{
    if ctx.token.is_cancelled() {
        ctx.bus
            .publish(ctx.event(EventKind::ActionSkipped).with_action(action));
        return Err(ctx.cancel_reason());
    }

    let res = tokio::select! {
        biased;
        _ = ctx.token.cancelled() => {
            ctx.bus.publish(ctx.event(EventKind::ActionSkipped).with_action(action));
            return Err(ctx.cancel_reason());
        }
        r = call => r,
    };

    match res {
        Ok(ack) => {
            let mut ev = ctx.event(EventKind::ActionIssued).with_action(action);
            if ctx.call_leg.is_none() {
                ev = ev.with_call_leg(ack.call_leg_id.as_str());
            }
            if let Some(key) = key {
                ev = ev.with_key(key);
            }
            ctx.bus.publish(ev);
            Ok(ack)
        }
        Err(e) => {
            let err = StepError::from(e);
            publish_failed(ctx, action, &err);
            Err(err)
        }
    }
}

/// Waits for the outcome of `step` under `deadline`.
pub(crate) async fn await_outcome(
    ctx: &StepCtx<'_>,
    exp: Expectation,
    step: Action,
    deadline: Option<Duration>,
) -> Result<CallEvent, StepError> {
    match exp.race(step, deadline, ctx.token).await {
        Ok(ev) => Ok(ev),
        Err(StepError::Timeout { step, timeout }) => {
            ctx.bus.publish(
                ctx.event(EventKind::StepTimedOut)
                    .with_action(step)
                    .with_timeout(timeout),
            );
            Err(StepError::Timeout { step, timeout })
        }
        Err(StepError::Canceled) => Err(ctx.cancel_reason()),
        Err(e) => {
            publish_failed(ctx, step, &e);
            Err(e)
        }
    }
}

/// Publishes `ActionFailed` for a step error detected outside the backend call.
pub(crate) fn publish_failed(ctx: &StepCtx<'_>, action: Action, err: &StepError) {
    ctx.bus.publish(
        ctx.event(EventKind::ActionFailed)
            .with_action(action)
            .with_reason(err.as_message()),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call::{CallEventKind, EventPayload};

    struct Fixture {
        bus: Bus,
        registry: Arc<EventRegistry>,
        token: CancellationToken,
        disconnected: CancellationToken,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                bus: Bus::new(64),
                registry: Arc::new(EventRegistry::new()),
                token: CancellationToken::new(),
                disconnected: CancellationToken::new(),
            }
        }

        fn ctx(&self) -> StepCtx<'_> {
            StepCtx {
                session: "session-test",
                call_leg: Some("leg-1"),
                bus: &self.bus,
                registry: &self.registry,
                token: &self.token,
                disconnected: &self.disconnected,
            }
        }
    }

    #[tokio::test]
    async fn test_cancelled_session_skips_backend() {
        let fx = Fixture::new();
        let mut rx = fx.bus.subscribe();
        fx.token.cancel();

        let never = std::future::pending::<Result<Ack, BackendError>>();
        let res = issue(&fx.ctx(), Action::Play, None, never).await;

        assert_eq!(res, Err(StepError::Canceled));
        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::ActionSkipped);
        assert_eq!(ev.action, Some(Action::Play));
    }

    #[tokio::test]
    async fn test_backend_failure_is_published() {
        let fx = Fixture::new();
        let mut rx = fx.bus.subscribe();

        let res = issue(&fx.ctx(), Action::HangUp, None, async {
            Err::<Ack, _>(BackendError::new(Action::HangUp, "gone").with_status(404))
        })
        .await;

        assert!(matches!(res, Err(StepError::Backend(_))));
        assert_eq!(rx.recv().await.unwrap().kind, EventKind::ActionFailed);
    }

    #[tokio::test]
    async fn test_issued_action_carries_correlation_key() {
        let fx = Fixture::new();
        let mut rx = fx.bus.subscribe();
        let key = CorrelationKey::new(CallEventKind::PlayCompleted, "op-9");

        let res = issue(&fx.ctx(), Action::Play, Some(&key), async {
            Ok::<_, BackendError>(Ack::new("leg-1"))
        })
        .await;

        assert!(res.is_ok());
        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::ActionIssued);
        assert_eq!(ev.key.as_deref(), Some("PlayCompleted-op-9"));
    }

    #[tokio::test]
    async fn test_cancel_after_disconnect_reports_disconnected() {
        let fx = Fixture::new();
        let ctx = fx.ctx();
        let exp = expect(
            &ctx,
            Action::Recognize,
            vec![CorrelationKey::new(CallEventKind::RecognizeCompleted, "leg-1")],
        )
        .unwrap();

        fx.disconnected.cancel();
        fx.token.cancel();

        let res = await_outcome(&ctx, exp, Action::Recognize, None).await;
        assert_eq!(res, Err(StepError::Disconnected));
        assert!(fx.registry.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_publishes_step_timed_out() {
        let fx = Fixture::new();
        let mut rx = fx.bus.subscribe();
        let ctx = fx.ctx();
        let exp = expect(
            &ctx,
            Action::Play,
            vec![CorrelationKey::new(CallEventKind::PlayCompleted, "op-1")],
        )
        .unwrap();
        assert_eq!(rx.recv().await.unwrap().kind, EventKind::WaiterRegistered);

        let res = await_outcome(&ctx, exp, Action::Play, Some(Duration::from_secs(30))).await;
        assert!(matches!(res, Err(StepError::Timeout { .. })));

        let ev = rx.recv().await.unwrap();
        assert_eq!(ev.kind, EventKind::StepTimedOut);
        assert_eq!(ev.timeout_ms, Some(30_000));

        let late = fx.registry.dispatch(CallEvent::new(
            CallEventKind::PlayCompleted,
            "op-1",
            EventPayload::None,
        ));
        assert!(!late.is_delivered());
    }
}
