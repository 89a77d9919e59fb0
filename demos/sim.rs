//! In-process telephony backend for the demos.
//!
//! Acknowledges every action and, a moment later, posts the matching
//! notification as a webhook JSON body on `webhooks`. The demo's pump task
//! decodes those bodies and dispatches them, the same path a real HTTP
//! callback handler takes.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use callvisor::{
    Ack, Action, BackendError, CallControl, CallLegId, DtmfTone, Orchestrator, Participant,
    Prompt, RecognizeOptions, webhook,
};
use parking_lot::Mutex;
use serde_json::json;
use tokio::sync::mpsc;

const LATENCY: Duration = Duration::from_millis(150);

/// What the simulated caller does at each recognize prompt.
#[derive(Debug, Clone, Copy)]
pub enum Press {
    Tone(DtmfTone),
    Silence,
}

pub struct Simulator {
    legs: AtomicU64,
    presses: Mutex<Vec<Press>>,
    webhooks: mpsc::UnboundedSender<String>,
}

impl Simulator {
    /// `presses` are consumed in order, one per recognize.
    pub fn new(presses: Vec<Press>) -> (Arc<Self>, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut presses = presses;
        presses.reverse();
        let sim = Arc::new(Self {
            legs: AtomicU64::new(1),
            presses: Mutex::new(presses),
            webhooks: tx,
        });
        (sim, rx)
    }

    fn post_later(&self, event_type: &str, data: serde_json::Value) {
        let body = json!([{
            "type": format!("Microsoft.Communication.{event_type}"),
            "data": data,
        }]);
        let tx = self.webhooks.clone();
        tokio::spawn(async move {
            tokio::time::sleep(LATENCY).await;
            let _ = tx.send(body.to_string());
        });
    }

    fn connect(&self) -> Ack {
        let leg = format!("sim-leg-{}", self.legs.fetch_add(1, Ordering::Relaxed));
        self.post_later("CallConnected", json!({ "callConnectionId": leg }));
        Ack::new(leg)
    }
}

#[async_trait]
impl CallControl for Simulator {
    async fn answer(&self, _ctx: &str, _callback: &str) -> Result<Ack, BackendError> {
        Ok(self.connect())
    }

    async fn create_call(
        &self,
        _source: &Participant,
        target: &Participant,
        _callback: &str,
    ) -> Result<Ack, BackendError> {
        if !target.is_known() {
            let err = BackendError::new(Action::CreateCall, "invalid target");
            return Err(err.with_status(400));
        }
        Ok(self.connect())
    }

    async fn start_recording(&self, leg: &CallLegId) -> Result<Ack, BackendError> {
        Ok(Ack::new(leg.clone()).with_reference(format!("rec-{leg}")))
    }

    async fn play(&self, leg: &CallLegId, prompt: &Prompt, op: &str) -> Result<Ack, BackendError> {
        tracing::info!(leg = %leg, uri = %prompt.uri, "simulated playback");
        self.post_later(
            "PlayCompleted",
            json!({ "callConnectionId": leg.as_str(), "operationContext": op }),
        );
        Ok(Ack::new(leg.clone()).with_operation_context(op))
    }

    async fn recognize_dtmf(
        &self,
        leg: &CallLegId,
        op: &str,
        _options: &RecognizeOptions,
        _prompt: Option<&Prompt>,
    ) -> Result<Ack, BackendError> {
        let press = self.presses.lock().pop().unwrap_or(Press::Silence);
        match press {
            Press::Tone(tone) => self.post_later(
                "RecognizeCompleted",
                json!({
                    "callConnectionId": leg.as_str(),
                    "operationContext": op,
                    "recognitionType": "dtmf",
                    "dtmfResult": { "tones": [tone.as_name()] },
                }),
            ),
            Press::Silence => self.post_later(
                "RecognizeFailed",
                json!({
                    "callConnectionId": leg.as_str(),
                    "operationContext": op,
                    "resultInformation": {
                        "code": 400,
                        "subCode": 8510,
                        "message": "initial silence timeout",
                    },
                }),
            ),
        }
        Ok(Ack::new(leg.clone()).with_operation_context(op))
    }

    async fn add_participant(
        &self,
        leg: &CallLegId,
        target: &Participant,
    ) -> Result<Ack, BackendError> {
        self.post_later(
            "AddParticipantSucceeded",
            json!({
                "callConnectionId": leg.as_str(),
                "participant": { "rawId": target.raw_id() },
            }),
        );
        Ok(Ack::new(leg.clone()))
    }

    async fn hang_up(&self, leg: &CallLegId) -> Result<Ack, BackendError> {
        self.post_later(
            "CallDisconnected",
            json!({ "callConnectionId": leg.as_str() }),
        );
        Ok(Ack::new(leg.clone()))
    }
}

/// Decodes posted bodies and routes them into `orch` until the channel closes.
pub fn pump(orch: Arc<Orchestrator>, mut webhooks: mpsc::UnboundedReceiver<String>) {
    tokio::spawn(async move {
        while let Some(body) = webhooks.recv().await {
            match webhook::decode_call_events(&body) {
                Ok(events) => {
                    for ev in events {
                        orch.dispatch(ev);
                    }
                }
                Err(e) => tracing::warn!(error = %e, "undecodable webhook body"),
            }
        }
    });
}
