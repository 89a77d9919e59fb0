//! Registry lookup key.

use std::fmt;
use std::sync::Arc;

use crate::call::{CallEvent, CallEventKind};

/// Lookup key of the [`EventRegistry`](super::EventRegistry): an event kind
/// plus the identifier the backend echoes for that kind.
///
/// Two keys are equal iff both the kind and the id match. Renders as
/// `<kind>-<id>` (e.g. `PlayCompleted-3f2a...`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CorrelationKey {
    kind: CallEventKind,
    id: Arc<str>,
}

impl CorrelationKey {
    pub fn new(kind: CallEventKind, id: impl Into<Arc<str>>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }

    /// Key an incoming event is routed by.
    pub fn of(event: &CallEvent) -> Self {
        Self::new(event.kind(), event.correlation_id())
    }

    #[inline]
    pub fn kind(&self) -> CallEventKind {
        self.kind
    }

    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Display for CorrelationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.kind, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call::EventPayload;

    #[test]
    fn test_equality_needs_both_fields() {
        let a = CorrelationKey::new(CallEventKind::CallConnected, "leg-1");
        let b = CorrelationKey::new(CallEventKind::CallConnected, "leg-1");
        let c = CorrelationKey::new(CallEventKind::CallDisconnected, "leg-1");
        let d = CorrelationKey::new(CallEventKind::CallConnected, "leg-2");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
    }

    #[test]
    fn test_display_joins_kind_and_id() {
        let key = CorrelationKey::new(CallEventKind::PlayCompleted, "op-7");
        assert_eq!(key.to_string(), "PlayCompleted-op-7");
    }

    #[test]
    fn test_key_of_event() {
        let ev = CallEvent::new(CallEventKind::RecognizeFailed, "leg-3", EventPayload::None);
        assert_eq!(
            CorrelationKey::of(&ev),
            CorrelationKey::new(CallEventKind::RecognizeFailed, "leg-3")
        );
    }
}
