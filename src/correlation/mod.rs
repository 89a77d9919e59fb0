//! Event correlation: keys, one-shot waiters, the shared registry and the
//! deadline/cancel race a session suspends on.
//!
//! ## Contents
//! - [`CorrelationKey`] event kind + correlation id
//! - [`Waiter`], [`WaitHandle`] single-fulfillment slot and its observer
//! - [`EventRegistry`], [`Dispatch`] key → waiter table and routing outcome
//! - [`Expectation`] multi-key registration raced against deadline and token
//!
//! ## Flow
//! ```text
//! session:  Expectation::register(reg, keys) ──► race(step, deadline, token)
//!                                                        ▲
//! adapter:  decode ─► CallEvent ─► reg.dispatch(ev) ─────┘ (oneshot)
//! ```

mod key;
mod race;
mod registry;
mod waiter;

pub use key::CorrelationKey;
pub use race::Expectation;
pub use registry::{Dispatch, EventRegistry};
pub use waiter::{Resolution, WaitHandle, Waiter, WaiterState};
