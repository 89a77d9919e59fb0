//! Webhook decoding adapter.
//!
//! Turns the JSON bodies the telephony backend posts to the callback and
//! incoming-call endpoints into [`CallEvent`](crate::CallEvent)s and
//! [`InboundNotice`]s. It makes no decisions: the caller hands the result to
//! [`Orchestrator::dispatch`](crate::Orchestrator::dispatch) or
//! [`Orchestrator::start_inbound`](crate::Orchestrator::start_inbound).

mod decode;

pub use decode::{InboundNotice, decode_call_events, decode_incoming_call};
