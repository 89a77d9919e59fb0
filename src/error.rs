//! Error types used by the callvisor runtime and call sessions.
//!
//! This module defines the following error types:
//!
//! - [`BackendError`]: a synchronous failure reported by a [`CallControl`](crate::CallControl) call.
//! - [`StepError`]: why a session step did not complete (backend, timeout, cancel, ...).
//! - [`RuntimeError`]: errors raised by the orchestration runtime itself.
//! - [`ConfigError`]: an environment override that could not be parsed or was out of range.
//! - [`DecodeError`]: a webhook body the adapter could not decode.
//!
//! `StepError` and `RuntimeError` provide `as_label` (stable snake_case for
//! logs/metrics) and `as_message` helpers.

use std::time::Duration;
use thiserror::Error;

use crate::call::Action;
use crate::core::SessionState;
use crate::correlation::CorrelationKey;

/// # Failure reported synchronously by the call-control backend.
///
/// Backend errors are never retried: the session that hit one abandons the
/// current step and moves towards hang-up.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{action} failed{}: {message}", .status.map(|s| format!(" (status {s})")).unwrap_or_default())]
pub struct BackendError {
    /// Action that was rejected.
    pub action: Action,
    /// Backend status code, when one was reported.
    pub status: Option<u16>,
    /// Backend-provided description.
    pub message: String,
}

impl BackendError {
    pub fn new(action: Action, message: impl Into<String>) -> Self {
        Self {
            action,
            status: None,
            message: message.into(),
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }
}

/// # Why a session step did not complete.
///
/// Step errors never escape a session: they are logged and translated into
/// a forced transition to `Terminating`.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StepError {
    /// A backend call failed synchronously.
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    /// No matching notification arrived before the step deadline.
    #[error("{step} timed out after {timeout:?}")]
    Timeout {
        /// Action whose outcome was awaited.
        step: Action,
        /// The deadline that elapsed.
        timeout: Duration,
    },

    /// The session's cancellation token was tripped.
    #[error("session cancelled")]
    Canceled,

    /// The backend acknowledged the action but later reported it failed.
    #[error("{step} reported failure: {reason}")]
    Failed {
        /// Action whose outcome notification was a failure.
        step: Action,
        /// Backend-provided detail.
        reason: String,
    },

    /// A waiter is already live under this key (correlation bug).
    #[error("duplicate registration for {key}")]
    DuplicateRegistration {
        /// The contested key.
        key: CorrelationKey,
    },

    /// The call leg disconnected while the step was in flight.
    #[error("call disconnected")]
    Disconnected,

    /// The step was refused before reaching the backend.
    #[error("rejected: {reason}")]
    Rejected {
        /// Why the step could not be issued.
        reason: String,
    },

    /// The state machine was asked for a transition its table forbids.
    #[error("invalid transition {from:?} -> {to:?}")]
    InvalidTransition {
        from: SessionState,
        to: SessionState,
    },
}

impl StepError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use callvisor::{Action, StepError};
    /// use std::time::Duration;
    ///
    /// let err = StepError::Timeout { step: Action::Recognize, timeout: Duration::from_secs(30) };
    /// assert_eq!(err.as_label(), "step_timeout");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            StepError::Backend(_) => "step_backend_error",
            StepError::Timeout { .. } => "step_timeout",
            StepError::Canceled => "step_canceled",
            StepError::Failed { .. } => "step_failed",
            StepError::DuplicateRegistration { .. } => "step_duplicate_registration",
            StepError::Disconnected => "step_disconnected",
            StepError::Rejected { .. } => "step_rejected",
            StepError::InvalidTransition { .. } => "step_invalid_transition",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            StepError::Backend(e) => format!("backend: {e}"),
            StepError::Timeout { step, timeout } => format!("{step} timeout: {timeout:?}"),
            StepError::Canceled => "session cancelled".to_string(),
            StepError::Failed { step, reason } => format!("{step} failed: {reason}"),
            StepError::DuplicateRegistration { key } => format!("duplicate waiter: {key}"),
            StepError::Disconnected => "call disconnected".to_string(),
            StepError::Rejected { reason } => format!("rejected: {reason}"),
            StepError::InvalidTransition { from, to } => {
                format!("invalid transition: {from:?} -> {to:?}")
            }
        }
    }

    /// Indicates whether a hang-up should still be attempted after this error.
    ///
    /// Returns `false` when the call is already gone or the session was
    /// cancelled (no further backend actions are allowed).
    ///
    /// # Example
    /// ```
    /// use callvisor::StepError;
    ///
    /// assert!(!StepError::Canceled.wants_hang_up());
    /// assert!(StepError::Rejected { reason: "bad target".into() }.wants_hang_up());
    /// ```
    pub fn wants_hang_up(&self) -> bool {
        !matches!(self, StepError::Canceled | StepError::Disconnected)
    }
}

/// # Errors produced by the callvisor runtime.
///
/// These represent failures in the orchestration system itself,
/// such as a shutdown sequence exceeding its grace period.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Shutdown grace period was exceeded; some sessions were still running.
    #[error("shutdown timeout {grace:?} exceeded; stuck: {stuck:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Ids of sessions that did not finish in time.
        stuck: Vec<String>,
    },

    /// OS signal handlers could not be installed.
    #[error("signal handler setup failed: {0}")]
    Signal(#[from] std::io::Error),
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use callvisor::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(5), stuck: vec![] };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
            RuntimeError::Signal(_) => "runtime_signal_setup",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            RuntimeError::GraceExceeded { grace, stuck } => {
                format!("grace exceeded after {grace:?}; stuck sessions={stuck:?}")
            }
            RuntimeError::Signal(e) => format!("signal setup: {e}"),
        }
    }
}

/// # Invalid configuration override.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable held a value of the wrong shape.
    #[error("invalid value for {name}: {value:?}")]
    InvalidValue {
        /// Variable name.
        name: &'static str,
        /// Raw value as found.
        value: String,
    },

    /// A session deadline override was `0`.
    #[error("{name} must be greater than zero")]
    ZeroDeadline {
        /// Variable name.
        name: &'static str,
    },
}

/// # Webhook body that could not be decoded.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum DecodeError {
    /// The body is not valid JSON of the expected shape.
    #[error("malformed body: {0}")]
    Json(#[from] serde_json::Error),

    /// A notification lacks a field required to route it.
    #[error("{event_type}: missing {field}")]
    MissingField {
        /// Backend event type of the offending entry.
        event_type: String,
        /// Name of the absent field.
        field: &'static str,
    },

    /// The body held no entry the adapter understands.
    #[error("no usable notification in body")]
    Empty,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_error_display_includes_status() {
        let err = BackendError::new(Action::Play, "media unavailable").with_status(503);
        assert_eq!(
            err.to_string(),
            "play failed (status 503): media unavailable"
        );

        let bare = BackendError::new(Action::HangUp, "gone");
        assert_eq!(bare.to_string(), "hang_up failed: gone");
    }

    #[test]
    fn test_backend_converts_into_step_error() {
        let step: StepError = BackendError::new(Action::Answer, "denied").into();
        assert_eq!(step.as_label(), "step_backend_error");
        assert!(step.wants_hang_up());
    }

    #[test]
    fn test_disconnected_does_not_want_hang_up() {
        assert!(!StepError::Disconnected.wants_hang_up());
    }
}
