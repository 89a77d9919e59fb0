//! Scripted call flows.
//!
//! ## Contents
//! - [`FlowScript`], [`Menu`], [`Branch`], [`Selection`] the script data model
//! - [`CallOrigin`] inbound answer vs outbound dial
//! - presets: `FlowScript::{play_and_hang_up, simple_ivr, main_menu, appointment_reminder, connect_only}`

mod presets;
mod script;

pub use script::{Branch, CallOrigin, FlowScript, Menu, Selection};
