//! Participant identifier classification.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

static PHONE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+\d{10,14}$").expect("valid regex"));

static COMMUNICATION_USER: LazyLock<Regex> = LazyLock::new(|| {
    const UUID: &str = "[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}";
    Regex::new(&format!("(?i)^8:acs:{UUID}_{UUID}$")).expect("valid regex")
});

/// A call participant, classified from its raw identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Participant {
    /// E.164 phone number (`+` followed by 10 to 14 digits).
    Phone(String),
    /// Backend user identity (`8:acs:<uuid>_<uuid>`).
    CommunicationUser(String),
    /// Anything else; never sent to the backend.
    Unknown(String),
}

impl Participant {
    /// Classifies `raw` (surrounding whitespace is ignored).
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if PHONE.is_match(raw) {
            Participant::Phone(raw.to_string())
        } else if COMMUNICATION_USER.is_match(raw) {
            Participant::CommunicationUser(raw.to_string())
        } else {
            Participant::Unknown(raw.to_string())
        }
    }

    /// Returns the raw identifier.
    pub fn raw_id(&self) -> &str {
        match self {
            Participant::Phone(s)
            | Participant::CommunicationUser(s)
            | Participant::Unknown(s) => s,
        }
    }

    #[inline]
    pub fn is_known(&self) -> bool {
        !matches!(self, Participant::Unknown(_))
    }
}

impl fmt::Display for Participant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.raw_id())
    }
}
