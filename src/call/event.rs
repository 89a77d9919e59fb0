//! # Notifications emitted by the call-control backend.
//!
//! A [`CallEvent`] is the already-decoded form of one backend notification.
//! It carries the [`CallEventKind`], the correlation id the backend echoed
//! back and a kind-specific [`EventPayload`].
//!
//! ## Key spaces
//! The backend echoes different identifiers depending on the action that
//! produced the notification. Each kind is bound to exactly one
//! [`KeySpace`]:
//!
//! ```text
//! CallConnected / CallDisconnected          ─► call-leg id
//! RecognizeCompleted / RecognizeFailed      ─► call-leg id
//! AddParticipantSucceeded / ...Failed       ─► call-leg id
//! PlayCompleted / PlayFailed / PlayCanceled ─► operation-context id
//! ```
//!
//! Sessions register their waiters in the same key space, so the choice is
//! made in one place ([`CallEventKind::key_space`]).

use std::fmt;
use std::sync::Arc;

use super::tone::DtmfTone;

/// Classification of backend notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallEventKind {
    /// The call leg is established.
    CallConnected,
    /// The call leg is gone (either side hung up).
    CallDisconnected,
    /// DTMF collection finished; payload carries the tones.
    RecognizeCompleted,
    /// DTMF collection failed (silence timeout, bad input, ...).
    RecognizeFailed,
    /// A prompt finished playing.
    PlayCompleted,
    /// A prompt could not be played.
    PlayFailed,
    /// A prompt was canceled before it finished.
    PlayCanceled,
    /// A participant joined the call.
    AddParticipantSucceeded,
    /// A participant could not be added.
    AddParticipantFailed,
}

/// Which identifier a notification is correlated by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySpace {
    CallLeg,
    OperationContext,
}

impl CallEventKind {
    /// Returns the stable name used in correlation keys and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            CallEventKind::CallConnected => "CallConnected",
            CallEventKind::CallDisconnected => "CallDisconnected",
            CallEventKind::RecognizeCompleted => "RecognizeCompleted",
            CallEventKind::RecognizeFailed => "RecognizeFailed",
            CallEventKind::PlayCompleted => "PlayCompleted",
            CallEventKind::PlayFailed => "PlayFailed",
            CallEventKind::PlayCanceled => "PlayCanceled",
            CallEventKind::AddParticipantSucceeded => "AddParticipantSucceeded",
            CallEventKind::AddParticipantFailed => "AddParticipantFailed",
        }
    }

    /// Maps a backend event-type string to a kind.
    ///
    /// Accepts the bare name and the `Microsoft.Communication.` prefixed form;
    /// `AddParticipantsSucceeded` (plural) is accepted as an alias.
    pub fn from_type(ty: &str) -> Option<Self> {
        let bare = ty.strip_prefix("Microsoft.Communication.").unwrap_or(ty);
        let kind = match bare {
            "CallConnected" => CallEventKind::CallConnected,
            "CallDisconnected" => CallEventKind::CallDisconnected,
            "RecognizeCompleted" => CallEventKind::RecognizeCompleted,
            "RecognizeFailed" => CallEventKind::RecognizeFailed,
            "PlayCompleted" => CallEventKind::PlayCompleted,
            "PlayFailed" => CallEventKind::PlayFailed,
            "PlayCanceled" => CallEventKind::PlayCanceled,
            "AddParticipantSucceeded" | "AddParticipantsSucceeded" => {
                CallEventKind::AddParticipantSucceeded
            }
            "AddParticipantFailed" | "AddParticipantsFailed" => CallEventKind::AddParticipantFailed,
            _ => return None,
        };
        Some(kind)
    }

    /// Returns the identifier space this kind is correlated by.
    pub fn key_space(&self) -> KeySpace {
        match self {
            CallEventKind::PlayCompleted
            | CallEventKind::PlayFailed
            | CallEventKind::PlayCanceled => KeySpace::OperationContext,
            _ => KeySpace::CallLeg,
        }
    }
}

impl fmt::Display for CallEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind-specific data carried by a notification.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EventPayload {
    #[default]
    None,
    /// Tones collected by a recognize operation, in order.
    Tones(Vec<DtmfTone>),
    /// Backend-reported failure details.
    Failure { code: Option<u16>, message: String },
    /// Raw id of a participant that joined.
    Participant(String),
}

/// One decoded backend notification. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallEvent {
    kind: CallEventKind,
    correlation_id: Arc<str>,
    payload: EventPayload,
}

impl CallEvent {
    /// Creates an event correlated by `correlation_id`.
    pub fn new(
        kind: CallEventKind,
        correlation_id: impl Into<Arc<str>>,
        payload: EventPayload,
    ) -> Self {
        Self {
            kind,
            correlation_id: correlation_id.into(),
            payload,
        }
    }

    /// Builds an event from both identifiers the backend reported, picking
    /// the one that matches the kind's [`KeySpace`].
    ///
    /// Returns `None` if the required identifier is missing.
    pub fn correlate(
        kind: CallEventKind,
        call_leg_id: Option<&str>,
        operation_context: Option<&str>,
        payload: EventPayload,
    ) -> Option<Self> {
        let id = match kind.key_space() {
            KeySpace::CallLeg => call_leg_id,
            KeySpace::OperationContext => operation_context,
        }?;
        if id.is_empty() {
            return None;
        }
        Some(Self::new(kind, id, payload))
    }

    #[inline]
    pub fn kind(&self) -> CallEventKind {
        self.kind
    }

    #[inline]
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    #[inline]
    pub fn payload(&self) -> &EventPayload {
        &self.payload
    }

    /// Returns the collected tones (empty for non-recognize payloads).
    pub fn tones(&self) -> &[DtmfTone] {
        match &self.payload {
            EventPayload::Tones(t) => t,
            _ => &[],
        }
    }
}
