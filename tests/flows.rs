//! End-to-end call flows against a scripted in-memory backend.
//!
//! Every test runs with paused time: deadlines elapse as soon as the runtime
//! has nothing else to do, so timeouts are deterministic.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};

use callvisor::{
    Ack, Action, BackendError, Branch, CallControl, CallEvent, CallEventKind, CallLegId, Config,
    CorrelationKey, Dispatch, DtmfTone, Event, EventKind, EventPayload, FlowScript, Menu,
    Orchestrator, Participant, Prompt, RecognizeOptions, SessionOutcome, SessionState, StepError,
};

const LEG: &str = "leg-1";

/// Backend that acknowledges everything and reports each call on a channel.
struct Scripted {
    calls: mpsc::UnboundedSender<(Action, String)>,
    fail: Vec<Action>,
}

impl Scripted {
    fn ack(&self, action: Action, detail: impl Into<String>) -> Result<Ack, BackendError> {
        let _ = self.calls.send((action, detail.into()));
        if self.fail.contains(&action) {
            return Err(BackendError::new(action, "scripted failure").with_status(500));
        }
        Ok(Ack::new(LEG))
    }
}

#[async_trait]
impl CallControl for Scripted {
    async fn answer(&self, ctx: &str, _callback: &str) -> Result<Ack, BackendError> {
        self.ack(Action::Answer, ctx)
    }

    async fn create_call(
        &self,
        _source: &Participant,
        target: &Participant,
        _callback: &str,
    ) -> Result<Ack, BackendError> {
        self.ack(Action::CreateCall, target.raw_id())
    }

    async fn start_recording(&self, _leg: &CallLegId) -> Result<Ack, BackendError> {
        self.ack(Action::StartRecording, "")
    }

    async fn play(
        &self,
        _leg: &CallLegId,
        _prompt: &Prompt,
        op: &str,
    ) -> Result<Ack, BackendError> {
        self.ack(Action::Play, op)
    }

    async fn recognize_dtmf(
        &self,
        _leg: &CallLegId,
        op: &str,
        _options: &RecognizeOptions,
        _prompt: Option<&Prompt>,
    ) -> Result<Ack, BackendError> {
        self.ack(Action::Recognize, op)
    }

    async fn add_participant(
        &self,
        _leg: &CallLegId,
        target: &Participant,
    ) -> Result<Ack, BackendError> {
        self.ack(Action::AddParticipant, target.raw_id())
    }

    async fn hang_up(&self, _leg: &CallLegId) -> Result<Ack, BackendError> {
        self.ack(Action::HangUp, "")
    }
}

struct Harness {
    orch: Arc<Orchestrator>,
    calls: mpsc::UnboundedReceiver<(Action, String)>,
    events: broadcast::Receiver<Event>,
}

impl Harness {
    fn new(fail: Vec<Action>) -> Self {
        let (tx, calls) = mpsc::unbounded_channel();
        let backend = Arc::new(Scripted { calls: tx, fail });
        let orch = Orchestrator::builder(Config::default(), backend).build();
        let events = orch.bus().subscribe();
        Self {
            orch,
            calls,
            events,
        }
    }

    async fn next(&mut self) -> (Action, String) {
        self.calls.recv().await.expect("backend channel closed")
    }

    /// Dispatches `ev` once a waiter for it is registered.
    async fn deliver(&self, ev: CallEvent) {
        let key = CorrelationKey::of(&ev);
        while !self.orch.registry().contains(&key) {
            tokio::task::yield_now().await;
        }
        assert!(self.orch.dispatch(ev).is_delivered());
    }

    async fn connect(&mut self, expected: Action) {
        assert_eq!(self.next().await.0, expected);
        self.deliver(on_leg(CallEventKind::CallConnected)).await;
    }

    async fn disconnect(&self) {
        self.deliver(on_leg(CallEventKind::CallDisconnected)).await;
    }

    fn drain_events(&mut self) -> Vec<Event> {
        let mut out = Vec::new();
        while let Ok(ev) = self.events.try_recv() {
            out.push(ev);
        }
        out
    }
}

/// Payload-less notification keyed by the call leg.
fn on_leg(kind: CallEventKind) -> CallEvent {
    CallEvent::new(kind, LEG, EventPayload::None)
}

/// Payload-less notification keyed by an operation context.
fn on_op(kind: CallEventKind, op: &str) -> CallEvent {
    CallEvent::new(kind, op, EventPayload::None)
}

fn agent() -> Participant {
    Participant::parse("+15550001111")
}

fn agent_menu() -> FlowScript {
    FlowScript::new().with_menu(
        Menu::new(Prompt::new("menu.wav")).on(DtmfTone::One, Branch::add_participant(agent())),
    )
}

#[tokio::test(start_paused = true)]
async fn play_completed_then_hang_up() {
    let mut h = Harness::new(vec![]);
    let script = FlowScript::play_and_hang_up(Prompt::new("notice.wav"));
    let handle = h.orch.start_inbound("ctx-a", script);

    h.connect(Action::Answer).await;

    let (action, op) = h.next().await;
    assert_eq!(action, Action::Play);
    h.deliver(on_op(CallEventKind::PlayCompleted, &op)).await;

    assert_eq!(h.next().await.0, Action::HangUp);
    h.disconnect().await;

    let report = handle.wait().await.unwrap();
    use SessionState::*;
    assert_eq!(report.final_state, Terminated);
    assert_eq!(report.outcome, SessionOutcome::Completed);
    assert_eq!(report.call_leg, Some(CallLegId::new(LEG)));
    assert_eq!(
        report.history,
        vec![
            Created,
            Connecting,
            Connected,
            Prompting,
            Terminating,
            Terminated,
        ]
    );
    assert!(h.orch.registry().is_empty());

    // Retransmitted notification after hang-up.
    let late = h.orch.dispatch(on_op(CallEventKind::PlayCompleted, &op));
    assert!(matches!(late, Dispatch::Stale { .. }));
}

#[tokio::test(start_paused = true)]
async fn tone_one_adds_participant_then_hangs_up() {
    let mut h = Harness::new(vec![]);
    let handle = h.orch.start_inbound("ctx-b", agent_menu());

    h.connect(Action::Answer).await;
    assert_eq!(h.next().await.0, Action::Recognize);
    h.deliver(CallEvent::new(
        CallEventKind::RecognizeCompleted,
        LEG,
        EventPayload::Tones(vec![DtmfTone::One]),
    ))
    .await;

    let (action, target) = h.next().await;
    assert_eq!(action, Action::AddParticipant);
    assert_eq!(target, "+15550001111");
    assert_eq!(h.next().await.0, Action::HangUp);
    h.disconnect().await;

    let report = handle.wait().await.unwrap();
    use SessionState::*;
    assert_eq!(report.outcome, SessionOutcome::Completed);
    assert_eq!(
        report.history,
        vec![
            Created,
            Connecting,
            Connected,
            Recognizing,
            Branching,
            AddingParticipant,
            Terminating,
            Terminated,
        ]
    );

    let branch = h
        .drain_events()
        .into_iter()
        .find(|e| e.kind == EventKind::BranchSelected)
        .expect("branch selected event");
    assert_eq!(branch.reason.as_deref(), Some("tone:1"));
}

#[tokio::test(start_paused = true)]
async fn recognize_timeout_hangs_up() {
    let mut h = Harness::new(vec![]);
    let handle = h.orch.start_inbound("ctx-c", agent_menu());

    h.connect(Action::Answer).await;
    assert_eq!(h.next().await.0, Action::Recognize);

    // No RecognizeCompleted: the step deadline elapses.
    assert_eq!(h.next().await.0, Action::HangUp);
    h.disconnect().await;

    let report = handle.wait().await.unwrap();
    assert_eq!(report.final_state, SessionState::Terminated);
    assert_eq!(
        report.outcome,
        SessionOutcome::Failed(StepError::Timeout {
            step: Action::Recognize,
            timeout: Duration::from_secs(30),
        })
    );
    assert!(!report.history.contains(&SessionState::Branching));

    let late = h.orch.dispatch(CallEvent::new(
        CallEventKind::RecognizeCompleted,
        LEG,
        EventPayload::Tones(vec![DtmfTone::One]),
    ));
    assert!(!late.is_delivered());

    let timed_out = h
        .drain_events()
        .into_iter()
        .find(|e| e.kind == EventKind::StepTimedOut)
        .expect("step timed out event");
    assert_eq!(timed_out.action, Some(Action::Recognize));
    assert_eq!(timed_out.timeout_ms, Some(30_000));
}

#[tokio::test(start_paused = true)]
async fn unmatched_notification_is_dropped() {
    let mut h = Harness::new(vec![]);

    let out = h.orch.dispatch(CallEvent::new(
        CallEventKind::RecognizeCompleted,
        "ghost-leg",
        EventPayload::Tones(vec![DtmfTone::Two]),
    ));
    assert!(matches!(out, Dispatch::Stale { .. }));
    assert!(h.orch.registry().is_empty());
    assert!(h.orch.active().is_empty());

    let ev = h.drain_events().pop().expect("drop event");
    assert_eq!(ev.kind, EventKind::EventDropped);
    assert_eq!(ev.key.as_deref(), Some("RecognizeCompleted-ghost-leg"));
}

#[tokio::test(start_paused = true)]
async fn cancel_halts_further_actions() {
    let mut h = Harness::new(vec![]);
    let handle = h.orch.start_inbound("ctx-p4", agent_menu());
    let id = handle.id();

    h.connect(Action::Answer).await;
    assert_eq!(h.next().await.0, Action::Recognize);

    assert!(h.orch.cancel(id));
    let report = handle.wait().await.unwrap();

    assert_eq!(report.outcome, SessionOutcome::Canceled);
    assert_eq!(report.final_state, SessionState::Terminated);
    assert!(h.calls.try_recv().is_err(), "no action after cancel");
    assert!(h.orch.registry().is_empty());
    assert!(!h.orch.cancel(id));
}

#[tokio::test(start_paused = true)]
async fn disconnect_mid_flow_converges_without_hang_up() {
    let mut h = Harness::new(vec![]);
    let handle = h.orch.start_inbound("ctx-p5", agent_menu());

    h.connect(Action::Answer).await;
    assert_eq!(h.next().await.0, Action::Recognize);
    h.disconnect().await;

    let report = handle.wait().await.unwrap();
    assert_eq!(report.outcome, SessionOutcome::CallerHungUp);
    assert_eq!(
        &report.history[report.history.len() - 2..],
        &[SessionState::Recognizing, SessionState::Terminated]
    );
    assert!(h.calls.try_recv().is_err());
    assert!(h.orch.registry().is_empty());
}

#[tokio::test(start_paused = true)]
async fn backend_error_forces_termination() {
    let mut h = Harness::new(vec![Action::Play]);
    let script = FlowScript::play_and_hang_up(Prompt::new("notice.wav"));
    let handle = h.orch.start_inbound("ctx-err", script);

    h.connect(Action::Answer).await;
    assert_eq!(h.next().await.0, Action::Play);
    assert_eq!(h.next().await.0, Action::HangUp);

    // No disconnect notification: the hang-up wait gives up after its deadline.
    let report = handle.wait().await.unwrap();
    assert!(matches!(
        report.outcome,
        SessionOutcome::Failed(StepError::Backend(ref e)) if e.status == Some(500)
    ));
    assert_eq!(report.final_state, SessionState::Terminated);
    assert!(h.orch.registry().is_empty());
}

#[tokio::test(start_paused = true)]
async fn unknown_agent_is_rejected_without_backend_call() {
    let mut h = Harness::new(vec![]);
    let unknown = Branch::add_participant(Participant::parse("not-a-number"));
    let menu = Menu::new(Prompt::new("menu.wav")).on(DtmfTone::One, unknown);
    let script = FlowScript::new().with_menu(menu);
    let handle = h.orch.start_inbound("ctx-unknown", script);

    h.connect(Action::Answer).await;
    assert_eq!(h.next().await.0, Action::Recognize);
    h.deliver(CallEvent::new(
        CallEventKind::RecognizeCompleted,
        LEG,
        EventPayload::Tones(vec![DtmfTone::One]),
    ))
    .await;

    assert_eq!(h.next().await.0, Action::HangUp);
    h.disconnect().await;

    let report = handle.wait().await.unwrap();
    assert!(matches!(
        report.outcome,
        SessionOutcome::Failed(StepError::Rejected { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn outbound_silence_plays_no_input_prompt() {
    let mut h = Harness::new(vec![]);
    let handle = h.orch.start_outbound(
        Participant::parse("+15550009999"),
        Participant::parse("+15551234567"),
        FlowScript::appointment_reminder("https://host/audio"),
    );

    let (action, target) = h.next().await;
    assert_eq!(action, Action::CreateCall);
    assert_eq!(target, "+15551234567");
    h.deliver(on_leg(CallEventKind::CallConnected)).await;

    assert_eq!(h.next().await.0, Action::Recognize);
    h.deliver(CallEvent::new(
        CallEventKind::RecognizeFailed,
        LEG,
        EventPayload::Failure {
            code: Some(8510),
            message: "initial silence timeout".into(),
        },
    ))
    .await;

    let (action, op) = h.next().await;
    assert_eq!(action, Action::Play);
    h.deliver(on_op(CallEventKind::PlayCompleted, &op)).await;
    assert_eq!(h.next().await.0, Action::HangUp);
    h.disconnect().await;

    let report = handle.wait().await.unwrap();
    assert_eq!(report.outcome, SessionOutcome::Completed);
    let branch = h
        .drain_events()
        .into_iter()
        .find(|e| e.kind == EventKind::BranchSelected)
        .expect("branch selected event");
    assert_eq!(branch.reason.as_deref(), Some("no_input"));
}

#[tokio::test(start_paused = true)]
async fn shutdown_cancels_held_calls() {
    let mut h = Harness::new(vec![]);
    let handle = h.orch.start_inbound("ctx-hold", FlowScript::connect_only());
    h.connect(Action::Answer).await;

    let held = CorrelationKey::new(CallEventKind::CallDisconnected, LEG);
    while !h.orch.registry().contains(&held) {
        tokio::task::yield_now().await;
    }
    assert_eq!(h.orch.active(), vec![handle.id()]);

    h.orch.shutdown().await.unwrap();
    let report = handle.wait().await.unwrap();
    assert_eq!(report.outcome, SessionOutcome::Canceled);
    assert!(h.orch.active().is_empty());

    let kinds: Vec<EventKind> = h.drain_events().into_iter().map(|e| e.kind).collect();
    assert!(kinds.contains(&EventKind::ShutdownRequested));
    assert!(kinds.contains(&EventKind::AllStoppedWithin));
}

#[tokio::test(start_paused = true)]
async fn simple_ivr_survives_recording_failure_and_awaits_agent() {
    let mut h = Harness::new(vec![Action::StartRecording]);
    let script = FlowScript::simple_ivr(Prompt::new("menu.wav"), agent());
    let handle = h.orch.start_inbound("ctx-ivr", script);

    h.connect(Action::Answer).await;
    assert_eq!(h.next().await.0, Action::StartRecording);
    assert_eq!(h.next().await.0, Action::Recognize);
    h.deliver(CallEvent::new(
        CallEventKind::RecognizeCompleted,
        LEG,
        EventPayload::Tones(vec![DtmfTone::One]),
    ))
    .await;

    assert_eq!(h.next().await.0, Action::AddParticipant);
    h.deliver(CallEvent::new(
        CallEventKind::AddParticipantSucceeded,
        LEG,
        EventPayload::Participant("+15550001111".into()),
    ))
    .await;
    assert_eq!(h.next().await.0, Action::HangUp);
    h.disconnect().await;

    let report = handle.wait().await.unwrap();
    assert_eq!(report.outcome, SessionOutcome::Completed);
    assert!(report.history.contains(&SessionState::Recording));
    assert!(report.history.contains(&SessionState::AddingParticipant));
}

#[tokio::test(start_paused = true)]
async fn play_failure_hangs_up() {
    let mut h = Harness::new(vec![]);
    let script = FlowScript::play_and_hang_up(Prompt::new("missing.wav"));
    let handle = h.orch.start_inbound("ctx-play-failed", script);

    h.connect(Action::Answer).await;
    let (action, op) = h.next().await;
    assert_eq!(action, Action::Play);
    h.deliver(CallEvent::new(
        CallEventKind::PlayFailed,
        op.as_str(),
        EventPayload::Failure {
            code: Some(400),
            message: "file not found".into(),
        },
    ))
    .await;

    assert_eq!(h.next().await.0, Action::HangUp);
    h.disconnect().await;

    let report = handle.wait().await.unwrap();
    assert_eq!(report.final_state, SessionState::Terminated);
    assert_eq!(
        report.outcome,
        SessionOutcome::Failed(StepError::Failed {
            step: Action::Play,
            reason: "file not found (code 400)".into(),
        })
    );
    assert!(h.orch.registry().is_empty());

    // The failure consumed the play waiters, completion included.
    let late = h.orch.dispatch(on_op(CallEventKind::PlayCompleted, &op));
    assert!(matches!(late, Dispatch::Stale { .. }));
}

#[tokio::test(start_paused = true)]
async fn play_timeout_hangs_up() {
    let mut h = Harness::new(vec![]);
    let script = FlowScript::play_and_hang_up(Prompt::new("notice.wav"));
    let handle = h.orch.start_inbound("ctx-play-timeout", script);

    h.connect(Action::Answer).await;
    let (action, op) = h.next().await;
    assert_eq!(action, Action::Play);

    // No PlayCompleted: the step deadline elapses.
    assert_eq!(h.next().await.0, Action::HangUp);
    h.disconnect().await;

    let report = handle.wait().await.unwrap();
    assert_eq!(report.final_state, SessionState::Terminated);
    assert_eq!(
        report.outcome,
        SessionOutcome::Failed(StepError::Timeout {
            step: Action::Play,
            timeout: Duration::from_secs(30),
        })
    );
    assert!(!report.history.contains(&SessionState::Recognizing));

    let late = h.orch.dispatch(on_op(CallEventKind::PlayCompleted, &op));
    assert!(matches!(late, Dispatch::Stale { .. }));

    let timed_out = h
        .drain_events()
        .into_iter()
        .find(|e| e.kind == EventKind::StepTimedOut)
        .expect("step timed out event");
    assert_eq!(timed_out.action, Some(Action::Play));
}

#[tokio::test(start_paused = true)]
async fn add_participant_failure_hangs_up() {
    let mut h = Harness::new(vec![]);
    let transfer = Branch::AddParticipant {
        target: agent(),
        announce: Some(Prompt::new("connecting.wav")),
        await_confirmation: true,
    };
    let menu = Menu::new(Prompt::new("menu.wav")).on(DtmfTone::One, transfer);
    let script = FlowScript::new().with_menu(menu);
    let handle = h.orch.start_inbound("ctx-agent-failed", script);

    h.connect(Action::Answer).await;
    assert_eq!(h.next().await.0, Action::Recognize);
    h.deliver(CallEvent::new(
        CallEventKind::RecognizeCompleted,
        LEG,
        EventPayload::Tones(vec![DtmfTone::One]),
    ))
    .await;

    let (action, op) = h.next().await;
    assert_eq!(action, Action::Play);
    h.deliver(on_op(CallEventKind::PlayCompleted, &op)).await;

    assert_eq!(h.next().await.0, Action::AddParticipant);
    h.deliver(CallEvent::new(
        CallEventKind::AddParticipantFailed,
        LEG,
        EventPayload::Failure {
            code: Some(403),
            message: "target unreachable".into(),
        },
    ))
    .await;

    assert_eq!(h.next().await.0, Action::HangUp);
    h.disconnect().await;

    let report = handle.wait().await.unwrap();
    use SessionState::*;
    assert_eq!(report.final_state, Terminated);
    assert_eq!(
        report.outcome,
        SessionOutcome::Failed(StepError::Failed {
            step: Action::AddParticipant,
            reason: "target unreachable (code 403)".into(),
        })
    );
    assert_eq!(
        &report.history[report.history.len() - 4..],
        &[Prompting, AddingParticipant, Terminating, Terminated]
    );
    assert!(h.orch.registry().is_empty());

    // Retransmitted announce completion and a late join are both stale.
    let late = h.orch.dispatch(on_op(CallEventKind::PlayCompleted, &op));
    assert!(matches!(late, Dispatch::Stale { .. }));
    let joined = on_leg(CallEventKind::AddParticipantSucceeded);
    let late = h.orch.dispatch(joined);
    assert!(matches!(late, Dispatch::Stale { .. }));

    let failed = h
        .drain_events()
        .into_iter()
        .find(|e| e.kind == EventKind::ActionFailed)
        .expect("action failed event");
    assert_eq!(failed.action, Some(Action::AddParticipant));
}
