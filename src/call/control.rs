//! # Call-control capability.
//!
//! [`CallControl`] is the seam between the orchestration core and the
//! telephony backend client. Every method issues one backend action and
//! returns its synchronous acknowledgment ([`Ack`]) or a [`BackendError`];
//! the *outcome* of the action arrives later as a [`CallEvent`](super::CallEvent).
//!
//! ## Rules
//! - Implementations must not retry; a failed call is surfaced as-is.
//! - The ack of `answer`/`create_call` carries the call-leg id every later
//!   action is addressed to.
//! - Play results are correlated by the operation context the caller passes
//!   in; the ack echoes it back.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::participant::Participant;
use super::tone::DtmfTone;
use crate::error::BackendError;

/// Backend-assigned identifier of one call leg.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallLegId(Arc<str>);

impl CallLegId {
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallLegId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CallLegId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for CallLegId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Backend actions, used to label acks, errors and lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Answer,
    CreateCall,
    StartRecording,
    Play,
    Recognize,
    AddParticipant,
    HangUp,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Answer => "answer",
            Action::CreateCall => "create_call",
            Action::StartRecording => "start_recording",
            Action::Play => "play",
            Action::Recognize => "recognize",
            Action::AddParticipant => "add_participant",
            Action::HangUp => "hang_up",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Audio prompt to play.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    /// Location the backend fetches the audio from.
    pub uri: String,
    /// Optional backend-side id of the play source.
    pub source_id: Option<String>,
    /// Repeat until canceled.
    pub looped: bool,
}

impl Prompt {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            source_id: None,
            looped: false,
        }
    }

    pub fn with_source_id(mut self, id: impl Into<String>) -> Self {
        self.source_id = Some(id.into());
        self
    }

    pub fn looped(mut self) -> Self {
        self.looped = true;
        self
    }
}

/// DTMF collection parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognizeOptions {
    /// Maximum number of tones to collect.
    pub max_tones: u8,
    /// How long to wait for the first tone.
    pub initial_silence: Duration,
    /// How long to wait between tones.
    pub inter_tone: Duration,
    /// Tones that end collection early.
    pub stop_tones: Vec<DtmfTone>,
    /// Whether a keypress interrupts the prompt.
    pub interrupt_prompt: bool,
}

impl Default for RecognizeOptions {
    /// One tone, 5s initial silence, 10s inter-tone, `#` stops, prompt interruptible.
    fn default() -> Self {
        Self {
            max_tones: 1,
            initial_silence: Duration::from_secs(5),
            inter_tone: Duration::from_secs(10),
            stop_tones: vec![DtmfTone::Pound],
            interrupt_prompt: true,
        }
    }
}

/// Synchronous acknowledgment of a backend action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    /// Call leg the action applies to.
    pub call_leg_id: CallLegId,
    /// Operation context echoed back (play / recognize).
    pub operation_context: Option<Arc<str>>,
    /// Extra backend reference (recording id, invitation id, ...).
    pub reference: Option<String>,
}

impl Ack {
    pub fn new(call_leg_id: impl Into<CallLegId>) -> Self {
        Self {
            call_leg_id: call_leg_id.into(),
            operation_context: None,
            reference: None,
        }
    }

    pub fn with_operation_context(mut self, ctx: impl Into<Arc<str>>) -> Self {
        self.operation_context = Some(ctx.into());
        self
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }
}

/// Capability to drive calls on the telephony backend.
///
/// ### Example
/// ```no_run
/// use async_trait::async_trait;
/// use callvisor::{Ack, BackendError, CallControl, CallLegId, Participant, Prompt, RecognizeOptions};
///
/// struct Noop;
///
/// #[async_trait]
/// impl CallControl for Noop {
///     async fn answer(&self, _ctx: &str, _cb: &str) -> Result<Ack, BackendError> { Ok(Ack::new("leg")) }
///     async fn create_call(&self, _s: &Participant, _t: &Participant, _cb: &str) -> Result<Ack, BackendError> { Ok(Ack::new("leg")) }
///     async fn start_recording(&self, leg: &CallLegId) -> Result<Ack, BackendError> { Ok(Ack::new(leg.clone())) }
///     async fn play(&self, leg: &CallLegId, _p: &Prompt, op: &str) -> Result<Ack, BackendError> {
///         Ok(Ack::new(leg.clone()).with_operation_context(op))
///     }
///     async fn recognize_dtmf(&self, leg: &CallLegId, op: &str, _o: &RecognizeOptions, _p: Option<&Prompt>) -> Result<Ack, BackendError> {
///         Ok(Ack::new(leg.clone()).with_operation_context(op))
///     }
///     async fn add_participant(&self, leg: &CallLegId, _t: &Participant) -> Result<Ack, BackendError> { Ok(Ack::new(leg.clone())) }
///     async fn hang_up(&self, leg: &CallLegId) -> Result<Ack, BackendError> { Ok(Ack::new(leg.clone())) }
/// }
/// ```
#[async_trait]
pub trait CallControl: Send + Sync + 'static {
    /// Answers an inbound call; events are delivered to `callback_url`.
    async fn answer(
        &self,
        incoming_call_context: &str,
        callback_url: &str,
    ) -> Result<Ack, BackendError>;

    /// Places an outbound call from `source` to `target`.
    async fn create_call(
        &self,
        source: &Participant,
        target: &Participant,
        callback_url: &str,
    ) -> Result<Ack, BackendError>;

    /// Starts recording the call.
    async fn start_recording(&self, call_leg: &CallLegId) -> Result<Ack, BackendError>;

    /// Plays `prompt` to everyone on the call.
    async fn play(
        &self,
        call_leg: &CallLegId,
        prompt: &Prompt,
        operation_context: &str,
    ) -> Result<Ack, BackendError>;

    /// Collects DTMF input, optionally playing `prompt` first.
    async fn recognize_dtmf(
        &self,
        call_leg: &CallLegId,
        operation_context: &str,
        options: &RecognizeOptions,
        prompt: Option<&Prompt>,
    ) -> Result<Ack, BackendError>;

    /// Invites `target` into the call.
    async fn add_participant(
        &self,
        call_leg: &CallLegId,
        target: &Participant,
    ) -> Result<Ack, BackendError>;

    /// Hangs up the call for everyone.
    async fn hang_up(&self, call_leg: &CallLegId) -> Result<Ack, BackendError>;
}

/// Shared handle to a [`CallControl`] implementation.
pub type ControlRef = Arc<dyn CallControl>;
