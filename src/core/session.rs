//! # CallSession: drives one call leg through its script.
//!
//! One session runs on its own task and is the single writer of its state.
//! It issues a backend action, registers the waiters for the notifications
//! that action will produce, suspends until one arrives (or the deadline or
//! cancellation wins), decides the next action and repeats.
//!
//! ## Flow
//! ```text
//! Created ─► Connecting: answer / create_call
//!               ├─ register CallConnected(leg)
//!               └─ spawn disconnect watcher: CallDisconnected(leg)
//! Connected ─► Recording (optional, fire-and-forget)
//!           ─► Prompting: play(greeting), wait Play{Completed,Failed,Canceled}(op ctx)
//!           ─► Recognizing: recognize_dtmf(menu), wait Recognize{Completed,Failed}(leg)
//!           ─► Branching: first tone → Branch
//!                 ├─ Play            ─► Prompting
//!                 ├─ AddParticipant  ─► [Prompting] ─► AddingParticipant
//!                 └─ HangUp
//!           ─► Terminating: hang_up, wait for the disconnect watcher
//!           ─► Terminated: cancel token, release waiters, report
//! ```
//!
//! ## Rules
//! - A step error never escapes the session; it forces `Terminating`.
//! - No hang-up is attempted once the call is gone or the session was
//!   cancelled; the session goes straight to `Terminated`.
//! - The disconnect watcher trips the session token, so any pending step
//!   resolves as `Disconnected`.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::runner::{self, StepCtx};
use super::state::SessionState;
use crate::{
    call::{
        Action, CallEvent, CallEventKind, CallLegId, ControlRef, DtmfTone, EventPayload,
        Participant, Prompt,
    },
    config::Config,
    correlation::{CorrelationKey, EventRegistry},
    error::StepError,
    events::{Bus, Event, EventKind},
    flows::{Branch, CallOrigin, FlowScript, Menu},
};

static SESSION_SEQ: AtomicU64 = AtomicU64::new(1);

/// Process-unique session identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    pub(crate) fn next() -> Self {
        Self(SESSION_SEQ.fetch_add(1, AtomicOrdering::Relaxed))
    }

    #[inline]
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// How a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The script ran to its end and the call was hung up.
    Completed,
    /// The call disconnected before the script finished.
    CallerHungUp,
    /// The session was cancelled (operator or shutdown).
    Canceled,
    /// A step failed (timeout, backend error, ...).
    Failed(StepError),
}

impl SessionOutcome {
    pub fn as_label(&self) -> &'static str {
        match self {
            SessionOutcome::Completed => "completed",
            SessionOutcome::CallerHungUp => "caller_hung_up",
            SessionOutcome::Canceled => "canceled",
            SessionOutcome::Failed(e) => e.as_label(),
        }
    }
}

/// Final summary returned by [`SessionHandle::wait`](super::SessionHandle::wait).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
    pub id: SessionId,
    /// Call leg, if the backend acknowledged the connect action.
    pub call_leg: Option<CallLegId>,
    /// Always `Terminated`.
    pub final_state: SessionState,
    pub outcome: SessionOutcome,
    /// Every state entered, in order, starting with `Created`.
    pub history: Vec<SessionState>,
}

/// Shared collaborators handed to every session.
#[derive(Clone)]
pub(crate) struct SessionDeps {
    pub cfg: Arc<Config>,
    pub control: ControlRef,
    pub registry: Arc<EventRegistry>,
    pub bus: Bus,
}

pub(crate) struct CallSession {
    id: SessionId,
    label: String,
    origin: CallOrigin,
    script: FlowScript,
    deps: SessionDeps,
    token: CancellationToken,
    disconnected: CancellationToken,
    state: SessionState,
    call_leg: Option<CallLegId>,
    history: Vec<SessionState>,
    watcher: Option<JoinHandle<()>>,
}

impl CallSession {
    pub(crate) fn new(
        id: SessionId,
        origin: CallOrigin,
        script: FlowScript,
        deps: SessionDeps,
        token: CancellationToken,
    ) -> Self {
        Self {
            id,
            label: id.to_string(),
            origin,
            script,
            deps,
            token,
            disconnected: CancellationToken::new(),
            state: SessionState::Created,
            call_leg: None,
            history: vec![SessionState::Created],
            watcher: None,
        }
    }

    /// Runs the script to `Terminated` and reports how it ended.
    pub(crate) async fn run(mut self) -> SessionReport {
        let result = self.drive().await;
        let hang_up = self.call_leg.is_some()
            && !self.token.is_cancelled()
            && result.as_ref().err().is_none_or(StepError::wants_hang_up);

        let outcome = match result {
            Ok(()) => SessionOutcome::Completed,
            Err(StepError::Disconnected) => SessionOutcome::CallerHungUp,
            Err(StepError::Canceled) if self.disconnected.is_cancelled() => {
                SessionOutcome::CallerHungUp
            }
            Err(StepError::Canceled) => SessionOutcome::Canceled,
            Err(e) => {
                tracing::warn!(
                    session = %self.id,
                    state = %self.state,
                    error = %e,
                    "step failed, terminating"
                );
                SessionOutcome::Failed(e)
            }
        };

        if hang_up {
            self.hang_up().await;
        }
        self.terminate(&outcome).await;

        SessionReport {
            id: self.id,
            call_leg: self.call_leg.clone(),
            final_state: self.state,
            outcome,
            history: std::mem::take(&mut self.history),
        }
    }

    async fn drive(&mut self) -> Result<(), StepError> {
        self.connect().await?;

        if self.script.record {
            self.record().await?;
        }
        if let Some(greeting) = self.script.greeting.clone() {
            self.play(&greeting).await?;
        }
        match self.script.menu.clone() {
            Some(menu) => {
                let branch = self.recognize(&menu).await?;
                self.branch(branch).await
            }
            None if self.script.is_hold() => self.hold().await,
            None => Ok(()),
        }
    }

    fn ctx(&self) -> StepCtx<'_> {
        StepCtx {
            session: &self.label,
            call_leg: self.call_leg.as_ref().map(CallLegId::as_str),
            bus: &self.deps.bus,
            registry: &self.deps.registry,
            token: &self.token,
            disconnected: &self.disconnected,
        }
    }

    fn leg(&self) -> Result<CallLegId, StepError> {
        self.call_leg.clone().ok_or_else(|| StepError::Rejected {
            reason: "no call leg".to_string(),
        })
    }

    fn advance(&mut self, next: SessionState) -> Result<(), StepError> {
        if !self.state.can_advance_to(next) {
            return Err(StepError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        self.state = next;
        self.history.push(next);
        self.deps.bus.publish(
            Event::new(EventKind::StateChanged)
                .with_session(self.label.as_str())
                .with_call_leg_opt(self.call_leg.as_ref().map(CallLegId::as_str))
                .with_state(next),
        );
        Ok(())
    }

    async fn connect(&mut self) -> Result<(), StepError> {
        self.advance(SessionState::Connecting)?;

        let (action, ack) = {
            let ctx = self.ctx();
            let control = &self.deps.control;
            let callback = self.deps.cfg.callback_url.as_str();
            match &self.origin {
                CallOrigin::Inbound {
                    incoming_call_context,
                } => {
                    let call = control.answer(incoming_call_context, callback);
                    let ack = runner::issue(&ctx, Action::Answer, None, call).await?;
                    (Action::Answer, ack)
                }
                CallOrigin::Outbound { source, target } => {
                    let call = control.create_call(source, target, callback);
                    let ack = runner::issue(&ctx, Action::CreateCall, None, call).await?;
                    (Action::CreateCall, ack)
                }
            }
        };
        self.call_leg = Some(ack.call_leg_id.clone());
        let leg = ack.call_leg_id;

        let key = CorrelationKey::new(CallEventKind::CallConnected, leg.as_str());
        let connected = runner::expect(&self.ctx(), action, vec![key])?;
        self.watch_disconnect(&leg, action)?;

        let ctx = self.ctx();
        let deadline = self.deps.cfg.connect_deadline();
        runner::await_outcome(&ctx, connected, action, deadline).await?;
        self.advance(SessionState::Connected)
    }

    /// Registers `CallDisconnected` for the whole call and trips the session
    /// token when it fires.
    fn watch_disconnect(&mut self, leg: &CallLegId, action: Action) -> Result<(), StepError> {
        let key = CorrelationKey::new(CallEventKind::CallDisconnected, leg.as_str());
        let exp = runner::expect(&self.ctx(), action, vec![key])?;
        let token = self.token.clone();
        let disconnected = self.disconnected.clone();
        let session = self.id;

        self.watcher = Some(tokio::spawn(async move {
            if exp.race(action, None, &token).await.is_ok() {
                tracing::debug!(session = %session, "call disconnected");
                disconnected.cancel();
                token.cancel();
            }
        }));
        Ok(())
    }

    /// Starts recording; the acknowledgment is logged, failures are not fatal.
    async fn record(&mut self) -> Result<(), StepError> {
        self.advance(SessionState::Recording)?;
        let leg = self.leg()?;
        let ctx = self.ctx();
        let call = self.deps.control.start_recording(&leg);

        match runner::issue(&ctx, Action::StartRecording, None, call).await {
            Ok(ack) => {
                tracing::info!(session = %self.id, recording = ?ack.reference, "recording started");
                Ok(())
            }
            Err(e @ (StepError::Canceled | StepError::Disconnected)) => Err(e),
            Err(e) => {
                tracing::warn!(session = %self.id, error = %e, "recording failed, continuing");
                Ok(())
            }
        }
    }

    /// Plays `prompt` and waits for its outcome under the step deadline.
    async fn play(&mut self, prompt: &Prompt) -> Result<CallEvent, StepError> {
        self.advance(SessionState::Prompting)?;
        let leg = self.leg()?;
        let op = Uuid::new_v4().to_string();
        let ctx = self.ctx();

        let keys = [
            CallEventKind::PlayCompleted,
            CallEventKind::PlayFailed,
            CallEventKind::PlayCanceled,
        ]
        .into_iter()
        .map(|kind| CorrelationKey::new(kind, op.as_str()))
        .collect();
        let exp = runner::expect(&ctx, Action::Play, keys)?;

        let call = self.deps.control.play(&leg, prompt, &op);
        runner::issue(&ctx, Action::Play, exp.keys().first(), call).await?;

        let deadline = self.deps.cfg.step_deadline();
        let ev = runner::await_outcome(&ctx, exp, Action::Play, deadline).await?;
        if ev.kind() == CallEventKind::PlayFailed {
            let err = StepError::Failed {
                step: Action::Play,
                reason: failure_reason(&ev),
            };
            runner::publish_failed(&ctx, Action::Play, &err);
            return Err(err);
        }
        Ok(ev)
    }

    /// Runs the menu and returns the branch its first tone selects.
    async fn recognize(&mut self, menu: &Menu) -> Result<Branch, StepError> {
        self.advance(SessionState::Recognizing)?;
        let leg = self.leg()?;
        let op = Uuid::new_v4().to_string();
        let options = menu.options.as_ref().unwrap_or(&self.deps.cfg.recognize);

        let ev = {
            let ctx = self.ctx();
            let keys = vec![
                CorrelationKey::new(CallEventKind::RecognizeCompleted, leg.as_str()),
                CorrelationKey::new(CallEventKind::RecognizeFailed, leg.as_str()),
            ];
            let exp = runner::expect(&ctx, Action::Recognize, keys)?;

            let control = &self.deps.control;
            let call = control.recognize_dtmf(&leg, &op, options, Some(&menu.prompt));
            runner::issue(&ctx, Action::Recognize, exp.keys().first(), call).await?;

            let deadline = self.deps.cfg.step_deadline();
            runner::await_outcome(&ctx, exp, Action::Recognize, deadline).await?
        };

        self.advance(SessionState::Branching)?;
        let tones: &[DtmfTone] = match ev.kind() {
            CallEventKind::RecognizeCompleted => ev.tones(),
            _ => &[],
        };
        let (selection, branch) = menu.select(tones);
        self.deps.bus.publish(
            Event::new(EventKind::BranchSelected)
                .with_session(self.label.as_str())
                .with_call_leg(leg.as_str())
                .with_reason(selection.to_string()),
        );
        Ok(branch.clone())
    }

    async fn branch(&mut self, branch: Branch) -> Result<(), StepError> {
        match branch {
            Branch::HangUp => Ok(()),
            Branch::Play(prompt) => self.play(&prompt).await.map(|_| ()),
            Branch::AddParticipant {
                target,
                announce,
                await_confirmation,
            } => {
                if let Some(prompt) = announce {
                    self.play(&prompt).await?;
                }
                self.add_participant(&target, await_confirmation).await
            }
        }
    }

    async fn add_participant(
        &mut self,
        target: &Participant,
        await_confirmation: bool,
    ) -> Result<(), StepError> {
        self.advance(SessionState::AddingParticipant)?;
        let leg = self.leg()?;
        let ctx = self.ctx();

        if !target.is_known() {
            let err = StepError::Rejected {
                reason: format!("unrecognized participant id {target:?}"),
            };
            runner::publish_failed(&ctx, Action::AddParticipant, &err);
            return Err(err);
        }

        let exp = if await_confirmation {
            let keys = vec![
                CorrelationKey::new(CallEventKind::AddParticipantSucceeded, leg.as_str()),
                CorrelationKey::new(CallEventKind::AddParticipantFailed, leg.as_str()),
            ];
            Some(runner::expect(&ctx, Action::AddParticipant, keys)?)
        } else {
            None
        };
        let key = exp.as_ref().and_then(|exp| exp.keys().first());
        let call = self.deps.control.add_participant(&leg, target);
        runner::issue(&ctx, Action::AddParticipant, key, call).await?;

        let Some(exp) = exp else {
            return Ok(());
        };
        let deadline = self.deps.cfg.participant_deadline();
        let ev = runner::await_outcome(&ctx, exp, Action::AddParticipant, deadline).await?;
        if ev.kind() == CallEventKind::AddParticipantFailed {
            let err = StepError::Failed {
                step: Action::AddParticipant,
                reason: failure_reason(&ev),
            };
            runner::publish_failed(&ctx, Action::AddParticipant, &err);
            return Err(err);
        }
        Ok(())
    }

    /// Keeps the call up until it disconnects or the session is cancelled.
    async fn hold(&mut self) -> Result<(), StepError> {
        self.token.cancelled().await;
        if self.disconnected.is_cancelled() {
            Ok(())
        } else {
            Err(StepError::Canceled)
        }
    }

    /// Best-effort hang-up, then waits for the disconnect notification.
    async fn hang_up(&mut self) {
        if self.advance(SessionState::Terminating).is_err() {
            return;
        }
        let Ok(leg) = self.leg() else { return };
        let ctx = self.ctx();

        let call = self.deps.control.hang_up(&leg);
        let issued = runner::issue(&ctx, Action::HangUp, None, call).await;
        if issued.is_err() {
            return;
        }

        let wait = self.token.cancelled();
        match self.deps.cfg.disconnect_deadline() {
            Some(d) => {
                if tokio::time::timeout(d, wait).await.is_err() {
                    ctx.bus.publish(
                        Event::new(EventKind::StepTimedOut)
                            .with_session(self.label.as_str())
                            .with_call_leg(leg.as_str())
                            .with_action(Action::HangUp)
                            .with_timeout(d),
                    );
                }
            }
            None => wait.await,
        }
    }

    async fn terminate(&mut self, outcome: &SessionOutcome) {
        if let Err(e) = self.advance(SessionState::Terminated) {
            tracing::error!(session = %self.id, error = %e, "terminate from unexpected state");
            self.state = SessionState::Terminated;
        }
        self.token.cancel();
        if let Some(watcher) = self.watcher.take() {
            let _ = watcher.await;
        }

        self.deps.bus.publish(
            Event::new(EventKind::SessionTerminated)
                .with_session(self.label.as_str())
                .with_call_leg_opt(self.call_leg.as_ref().map(CallLegId::as_str))
                .with_reason(outcome.as_label()),
        );
    }
}

fn failure_reason(ev: &CallEvent) -> String {
    match ev.payload() {
        EventPayload::Failure { code, message } => match code {
            Some(c) => format!("{message} (code {c})"),
            None => message.clone(),
        },
        _ => ev.kind().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_ids_are_unique_and_render() {
        let a = SessionId::next();
        let b = SessionId::next();
        assert!(b > a);
        assert_eq!(a.to_string(), format!("session-{}", a.as_u64()));
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(SessionOutcome::CallerHungUp.as_label(), "caller_hung_up");
        let failed = SessionOutcome::Failed(StepError::Timeout {
            step: Action::Recognize,
            timeout: std::time::Duration::from_secs(30),
        });
        assert_eq!(failed.as_label(), "step_timeout");
    }

    #[test]
    fn test_failure_reason_prefers_payload() {
        let ev = CallEvent::new(
            CallEventKind::PlayFailed,
            "op",
            EventPayload::Failure {
                code: Some(8535),
                message: "file format".into(),
            },
        );
        assert_eq!(failure_reason(&ev), "file format (code 8535)");
    }
}
