//! Call domain: backend notifications, the call-control capability and the
//! value types they exchange.
//!
//! ## Contents
//! - [`CallEvent`], [`CallEventKind`], [`EventPayload`] decoded backend notifications
//! - [`CallControl`] the backend capability, with [`Ack`] and [`Action`]
//! - [`Prompt`], [`RecognizeOptions`], [`DtmfTone`], [`Participant`] request values

mod control;
mod event;
mod participant;
mod tone;

pub use control::{Ack, Action, CallControl, CallLegId, ControlRef, Prompt, RecognizeOptions};
pub use event::{CallEvent, CallEventKind, EventPayload, KeySpace};
pub use participant::Participant;
pub use tone::{DtmfTone, UnknownTone};
