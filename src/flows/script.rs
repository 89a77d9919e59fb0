//! # Flow scripts: what a session does at each stage.
//!
//! A [`FlowScript`] is data; the session state machine interprets it.
//!
//! ```text
//! connect ─► [record] ─► [greeting] ─► [menu] ─► branch ─► hang up
//!                                         │
//!                     first tone ─────────┼─► mapped    ─► Branch
//!                     unmapped tone ──────┼─► invalid   ─► Branch
//!                     no tone / failed ───┴─► no_input  ─► Branch
//! ```
//!
//! A script with neither greeting nor menu holds the call until the caller
//! hangs up.

use std::fmt;

use crate::call::{DtmfTone, Participant, Prompt, RecognizeOptions};

/// How a session obtains its call leg.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOrigin {
    /// Answer a ringing call.
    Inbound { incoming_call_context: String },
    /// Place a call.
    Outbound {
        source: Participant,
        target: Participant,
    },
}

impl CallOrigin {
    pub fn inbound(incoming_call_context: impl Into<String>) -> Self {
        CallOrigin::Inbound {
            incoming_call_context: incoming_call_context.into(),
        }
    }

    pub fn outbound(source: Participant, target: Participant) -> Self {
        CallOrigin::Outbound { source, target }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CallOrigin::Inbound { .. } => "inbound",
            CallOrigin::Outbound { .. } => "outbound",
        }
    }
}

/// What to do after the menu picked an option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Branch {
    /// Play a prompt, then hang up.
    Play(Prompt),
    /// Optionally announce, then invite `target`, then hang up.
    AddParticipant {
        target: Participant,
        announce: Option<Prompt>,
        /// Wait for the join/failure notification before hanging up.
        await_confirmation: bool,
    },
    /// Hang up right away.
    HangUp,
}

impl Branch {
    pub fn add_participant(target: Participant) -> Self {
        Branch::AddParticipant {
            target,
            announce: None,
            await_confirmation: false,
        }
    }
}

/// Why a branch was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// The first tone is mapped.
    Tone(DtmfTone),
    /// The first tone is not mapped.
    Invalid(DtmfTone),
    /// No tone was collected (or recognition failed).
    NoInput,
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selection::Tone(t) => write!(f, "tone:{t}"),
            Selection::Invalid(t) => write!(f, "invalid:{t}"),
            Selection::NoInput => f.write_str("no_input"),
        }
    }
}

/// DTMF menu: prompt, collection options and tone → branch table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Menu {
    pub prompt: Prompt,
    /// Overrides `Config::recognize` when set.
    pub options: Option<RecognizeOptions>,
    pub branches: Vec<(DtmfTone, Branch)>,
    pub invalid: Branch,
    pub no_input: Branch,
}

impl Menu {
    /// Menu with no options; unmapped input and silence both hang up.
    pub fn new(prompt: Prompt) -> Self {
        Self {
            prompt,
            options: None,
            branches: Vec::new(),
            invalid: Branch::HangUp,
            no_input: Branch::HangUp,
        }
    }

    /// Maps `tone` to `branch`, replacing an earlier mapping.
    pub fn on(mut self, tone: DtmfTone, branch: Branch) -> Self {
        self.branches.retain(|(t, _)| *t != tone);
        self.branches.push((tone, branch));
        self
    }

    pub fn on_invalid(mut self, branch: Branch) -> Self {
        self.invalid = branch;
        self
    }

    pub fn on_no_input(mut self, branch: Branch) -> Self {
        self.no_input = branch;
        self
    }

    pub fn with_options(mut self, options: RecognizeOptions) -> Self {
        self.options = Some(options);
        self
    }

    /// Picks the branch for the collected `tones` (only the first one counts).
    pub fn select(&self, tones: &[DtmfTone]) -> (Selection, &Branch) {
        let Some(first) = tones.first().copied() else {
            return (Selection::NoInput, &self.no_input);
        };
        match self.branches.iter().find(|(t, _)| *t == first) {
            Some((_, branch)) => (Selection::Tone(first), branch),
            None => (Selection::Invalid(first), &self.invalid),
        }
    }
}

/// The scripted interaction a session drives a call through.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlowScript {
    /// Start recording once connected (fire-and-forget).
    pub record: bool,
    /// Prompt played after connecting.
    pub greeting: Option<Prompt>,
    /// DTMF menu run after the greeting.
    pub menu: Option<Menu>,
}

impl FlowScript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_recording(mut self) -> Self {
        self.record = true;
        self
    }

    pub fn with_greeting(mut self, prompt: Prompt) -> Self {
        self.greeting = Some(prompt);
        self
    }

    pub fn with_menu(mut self, menu: Menu) -> Self {
        self.menu = Some(menu);
        self
    }

    /// True if the script only holds the call open.
    pub fn is_hold(&self) -> bool {
        self.greeting.is_none() && self.menu.is_none()
    }
}
