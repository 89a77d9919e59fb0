//! # Session states and the transition table.
//!
//! ```text
//! Created ─► Connecting ─► Connected ─┬─► Recording ─┐
//!                                     ├─► Prompting ◄┼──────────────┐
//!                                     └─► Recognizing◄┘              │
//!                                             │                      │
//!                                             ▼                      │
//!                                         Branching ─► Prompting ────┤
//!                                             │                      ▼
//!                                             └─────────────► AddingParticipant
//!
//! any non-terminal ─► Terminating ─► Terminated
//! any non-terminal ─────────────────► Terminated   (call already gone / cancelled)
//! ```
//!
//! ## Rules
//! - `Terminated` is absorbing.
//! - Every non-terminal state can reach `Terminating` and `Terminated`, so a
//!   disconnect, timeout or backend error converges from anywhere.

use std::fmt;

/// Where a call session is in its flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Created,
    Connecting,
    Connected,
    Recording,
    Prompting,
    Recognizing,
    Branching,
    AddingParticipant,
    Terminating,
    Terminated,
}

impl SessionState {
    /// All states, in flow order.
    pub const ALL: [SessionState; 10] = [
        SessionState::Created,
        SessionState::Connecting,
        SessionState::Connected,
        SessionState::Recording,
        SessionState::Prompting,
        SessionState::Recognizing,
        SessionState::Branching,
        SessionState::AddingParticipant,
        SessionState::Terminating,
        SessionState::Terminated,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Created => "created",
            SessionState::Connecting => "connecting",
            SessionState::Connected => "connected",
            SessionState::Recording => "recording",
            SessionState::Prompting => "prompting",
            SessionState::Recognizing => "recognizing",
            SessionState::Branching => "branching",
            SessionState::AddingParticipant => "adding_participant",
            SessionState::Terminating => "terminating",
            SessionState::Terminated => "terminated",
        }
    }

    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Terminated)
    }

    /// Whether the table allows `self → next`.
    pub fn can_advance_to(&self, next: SessionState) -> bool {
        use SessionState::*;

        if self.is_terminal() {
            return false;
        }
        if matches!(next, Terminated) {
            return true;
        }
        match self {
            Created => matches!(next, Connecting | Terminating),
            Connecting => matches!(next, Connected | Terminating),
            Connected => matches!(next, Recording | Prompting | Recognizing | Terminating),
            Recording => matches!(next, Prompting | Recognizing | Terminating),
            Prompting => matches!(next, Recognizing | AddingParticipant | Terminating),
            Recognizing => matches!(next, Branching | Terminating),
            Branching => matches!(next, Prompting | AddingParticipant | Terminating),
            AddingParticipant => matches!(next, Terminating),
            Terminating | Terminated => false,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
