//! Runtime core: call sessions and their orchestration.
//!
//! The public API is [`Orchestrator`] (built via [`OrchestratorBuilder`]),
//! which starts sessions, routes backend notifications and shuts down
//! gracefully.
//!
//! Internal modules:
//! - [`state`]: session states and the transition table;
//! - [`runner`]: one step (register, issue, await) with event publishing;
//! - [`session`]: drives one call leg through its script;
//! - [`orchestrator`]: live sessions, dispatch, cancel, shutdown;
//! - [`shutdown`]: cross-platform shutdown signal handling.

mod builder;
mod orchestrator;
mod runner;
mod session;
mod shutdown;
mod state;

pub use builder::OrchestratorBuilder;
pub use orchestrator::{Orchestrator, SessionHandle};
pub use session::{SessionId, SessionOutcome, SessionReport};
pub use state::SessionState;
