//! # Orchestrator: owns the correlation registry and the live sessions.
//!
//! The [`Orchestrator`] is the process-wide entry point. It starts call
//! sessions, routes asynchronous backend notifications to whichever session
//! is waiting for them, cancels sessions on request and performs graceful
//! shutdown.
//!
//! ## Architecture
//! ```text
//! start(origin, script)
//!   └─► CallSession::new(.., runtime_token.child_token())
//!         └─► tokio::spawn(session.run())  ──► SessionHandle { id, join }
//!
//! dispatch(CallEvent)   (webhook ingress)
//!   └─► EventRegistry::dispatch
//!         ├─ Delivered ─► Bus.publish(EventDelivered)
//!         └─ Stale     ─► Bus.publish(EventDropped)
//!
//! cancel(id)
//!   └─► session token.cancel() ─► Bus.publish(SessionCanceled)
//!
//! shutdown()
//!   └─► Bus.publish(ShutdownRequested)
//!   └─► runtime_token.cancel()   → propagates to every session token
//!   └─► wait until no session is live, within cfg.grace:
//!          ├─ Ok       → Bus.publish(AllStoppedWithin)
//!          └─ Timeout  → Bus.publish(GraceExceeded), Err(GraceExceeded { stuck })
//! ```
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use callvisor::{
//!     Ack, BackendError, CallControl, CallLegId, Config, FlowScript, LogWriter,
//!     Orchestrator, Participant, Prompt, RecognizeOptions, Subscribe,
//! };
//!
//! struct Backend;
//!
//! #[async_trait::async_trait]
//! impl CallControl for Backend {
//!     async fn answer(&self, _ctx: &str, _cb: &str) -> Result<Ack, BackendError> {
//!         Ok(Ack::new("leg-1"))
//!     }
//!     async fn create_call(&self, _s: &Participant, _t: &Participant, _cb: &str) -> Result<Ack, BackendError> {
//!         Ok(Ack::new("leg-2"))
//!     }
//!     async fn start_recording(&self, leg: &CallLegId) -> Result<Ack, BackendError> {
//!         Ok(Ack::new(leg.clone()))
//!     }
//!     async fn play(&self, leg: &CallLegId, _p: &Prompt, _op: &str) -> Result<Ack, BackendError> {
//!         Ok(Ack::new(leg.clone()))
//!     }
//!     async fn recognize_dtmf(
//!         &self,
//!         leg: &CallLegId,
//!         _op: &str,
//!         _o: &RecognizeOptions,
//!         _p: Option<&Prompt>,
//!     ) -> Result<Ack, BackendError> {
//!         Ok(Ack::new(leg.clone()))
//!     }
//!     async fn add_participant(&self, leg: &CallLegId, _t: &Participant) -> Result<Ack, BackendError> {
//!         Ok(Ack::new(leg.clone()))
//!     }
//!     async fn hang_up(&self, leg: &CallLegId) -> Result<Ack, BackendError> {
//!         Ok(Ack::new(leg.clone()))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter)];
//!     let orch = Orchestrator::builder(Config::from_env()?, Arc::new(Backend))
//!         .with_subscribers(subs)
//!         .build();
//!
//!     let handle = orch.start_inbound("ctx", FlowScript::main_menu(
//!         "https://host/audio",
//!         Participant::parse("+15550001111"),
//!     ));
//!     // webhook handlers feed notifications through `orch.dispatch(..)`
//!
//!     orch.run_until_signal().await?;
//!     let _ = handle.wait().await;
//!     Ok(())
//! }
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;

use super::builder::OrchestratorBuilder;
use super::session::{CallSession, SessionDeps, SessionId, SessionReport};
use super::shutdown;
use crate::{
    call::{CallEvent, ControlRef, Participant},
    config::Config,
    correlation::{Dispatch, EventRegistry},
    error::RuntimeError,
    events::{Bus, Event, EventKind},
    flows::{CallOrigin, FlowScript},
};

type LiveSessions = Arc<Mutex<HashMap<SessionId, CancellationToken>>>;

/// Handle to a running session.
#[derive(Debug)]
pub struct SessionHandle {
    id: SessionId,
    join: JoinHandle<SessionReport>,
}

impl SessionHandle {
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Waits for the session to reach `Terminated`.
    pub async fn wait(self) -> Result<SessionReport, JoinError> {
        self.join.await
    }
}

/// Starts sessions, routes notifications and coordinates shutdown.
pub struct Orchestrator {
    deps: SessionDeps,
    runtime_token: CancellationToken,
    sessions: LiveSessions,
    idle: Arc<Notify>,
}

impl Orchestrator {
    /// Returns a builder for an orchestrator driving `control`.
    pub fn builder(cfg: Config, control: ControlRef) -> OrchestratorBuilder {
        OrchestratorBuilder::new(cfg, control)
    }

    pub(crate) fn new_internal(
        cfg: Config,
        control: ControlRef,
        bus: Bus,
        runtime_token: CancellationToken,
    ) -> Self {
        Self {
            deps: SessionDeps {
                cfg: Arc::new(cfg),
                control,
                registry: Arc::new(EventRegistry::new()),
                bus,
            },
            runtime_token,
            sessions: Arc::new(Mutex::new(HashMap::new())),
            idle: Arc::new(Notify::new()),
        }
    }

    /// Spawns a session that connects via `origin` and runs `script`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(&self, origin: CallOrigin, script: FlowScript) -> SessionHandle {
        let id = SessionId::next();
        let token = self.runtime_token.child_token();
        self.sessions.lock().insert(id, token.clone());

        self.deps.bus.publish(
            Event::new(EventKind::SessionStarted)
                .with_session(id.to_string())
                .with_reason(origin.as_str()),
        );

        let session = CallSession::new(id, origin, script, self.deps.clone(), token);
        let live = Live {
            id,
            sessions: Arc::clone(&self.sessions),
            idle: Arc::clone(&self.idle),
        };
        let join = tokio::spawn(async move {
            let _live = live;
            session.run().await
        });
        SessionHandle { id, join }
    }

    /// Answers an incoming call and runs `script` on it.
    pub fn start_inbound(
        &self,
        incoming_call_context: impl Into<String>,
        script: FlowScript,
    ) -> SessionHandle {
        self.start(CallOrigin::inbound(incoming_call_context), script)
    }

    /// Dials `target` from `source` and runs `script` once connected.
    pub fn start_outbound(
        &self,
        source: Participant,
        target: Participant,
        script: FlowScript,
    ) -> SessionHandle {
        self.start(CallOrigin::outbound(source, target), script)
    }

    /// Routes one backend notification to the session waiting for it.
    pub fn dispatch(&self, ev: CallEvent) -> Dispatch {
        let out = self.deps.registry.dispatch(ev);
        let event_kind = match &out {
            Dispatch::Delivered { .. } => EventKind::EventDelivered,
            Dispatch::Stale { .. } => EventKind::EventDropped,
        };
        let bus = &self.deps.bus;
        bus.publish(Event::new(event_kind).with_key(out.key()));
        out
    }

    /// Cancels one session. Returns `false` if it is not live.
    pub fn cancel(&self, id: SessionId) -> bool {
        let token = self.sessions.lock().get(&id).cloned();
        match token {
            Some(token) => {
                token.cancel();
                self.deps.bus.publish(
                    Event::new(EventKind::SessionCanceled)
                        .with_session(id.to_string())
                        .with_reason("operator"),
                );
                true
            }
            None => false,
        }
    }

    /// Ids of live sessions, sorted.
    pub fn active(&self) -> Vec<SessionId> {
        let mut ids: Vec<SessionId> = self.sessions.lock().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn registry(&self) -> &Arc<EventRegistry> {
        &self.deps.registry
    }

    pub fn bus(&self) -> &Bus {
        &self.deps.bus
    }

    pub fn config(&self) -> &Config {
        &self.deps.cfg
    }

    /// Cancels every session and waits for them within `cfg.grace`.
    ///
    /// Publishes [`EventKind::AllStoppedWithin`] on success, or
    /// [`EventKind::GraceExceeded`] and returns
    /// [`RuntimeError::GraceExceeded`] with the sessions still live.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        let bus = &self.deps.bus;
        bus.publish(Event::new(EventKind::ShutdownRequested));
        self.runtime_token.cancel();

        let grace = self.deps.cfg.grace;
        match tokio::time::timeout(grace, self.wait_idle()).await {
            Ok(()) => {
                bus.publish(Event::new(EventKind::AllStoppedWithin));
                Ok(())
            }
            Err(_) => {
                let stuck: Vec<String> = self.active().iter().map(ToString::to_string).collect();
                bus.publish(
                    Event::new(EventKind::GraceExceeded).with_reason(stuck.join(",")),
                );
                Err(RuntimeError::GraceExceeded { grace, stuck })
            }
        }
    }

    /// Waits for a termination signal, then shuts down.
    pub async fn run_until_signal(&self) -> Result<(), RuntimeError> {
        shutdown::wait_for_shutdown_signal().await?;
        self.shutdown().await
    }

    async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            if self.sessions.lock().is_empty() {
                return;
            }
            notified.await;
        }
    }
}

/// Removes a session from the live set when its task ends (or panics).
struct Live {
    id: SessionId,
    sessions: LiveSessions,
    idle: Arc<Notify>,
}

impl Drop for Live {
    fn drop(&mut self) {
        let empty = {
            let mut sessions = self.sessions.lock();
            sessions.remove(&self.id);
            sessions.is_empty()
        };
        if empty {
            self.idle.notify_waiters();
        }
    }
}
