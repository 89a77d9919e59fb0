//! # DTMF keypad tones.
//!
//! [`DtmfTone`] covers the sixteen DTMF symbols. Backends spell tones
//! differently (`"1"`, `"one"`, `"#"`, `"pound"`), so parsing accepts
//! digits, symbols and the spelled-out names, case-insensitively.

use std::fmt;
use std::str::FromStr;

/// One DTMF symbol collected from the caller's keypad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DtmfTone {
    Zero,
    One,
    Two,
    Three,
    Four,
    Five,
    Six,
    Seven,
    Eight,
    Nine,
    /// `*`
    Asterisk,
    /// `#`
    Pound,
    A,
    B,
    C,
    D,
}

impl DtmfTone {
    /// Returns the keypad symbol for this tone (`"0"`..`"9"`, `"*"`, `"#"`, `"A"`..`"D"`).
    pub fn as_symbol(&self) -> &'static str {
        match self {
            DtmfTone::Zero => "0",
            DtmfTone::One => "1",
            DtmfTone::Two => "2",
            DtmfTone::Three => "3",
            DtmfTone::Four => "4",
            DtmfTone::Five => "5",
            DtmfTone::Six => "6",
            DtmfTone::Seven => "7",
            DtmfTone::Eight => "8",
            DtmfTone::Nine => "9",
            DtmfTone::Asterisk => "*",
            DtmfTone::Pound => "#",
            DtmfTone::A => "A",
            DtmfTone::B => "B",
            DtmfTone::C => "C",
            DtmfTone::D => "D",
        }
    }

    /// Returns the spelled-out name used on the wire (`"one"`, `"pound"`, ...).
    pub fn as_name(&self) -> &'static str {
        match self {
            DtmfTone::Zero => "zero",
            DtmfTone::One => "one",
            DtmfTone::Two => "two",
            DtmfTone::Three => "three",
            DtmfTone::Four => "four",
            DtmfTone::Five => "five",
            DtmfTone::Six => "six",
            DtmfTone::Seven => "seven",
            DtmfTone::Eight => "eight",
            DtmfTone::Nine => "nine",
            DtmfTone::Asterisk => "asterisk",
            DtmfTone::Pound => "pound",
            DtmfTone::A => "a",
            DtmfTone::B => "b",
            DtmfTone::C => "c",
            DtmfTone::D => "d",
        }
    }
}

impl fmt::Display for DtmfTone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_symbol())
    }
}

/// Returned when a string names no DTMF tone.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown dtmf tone: {0:?}")]
pub struct UnknownTone(pub String);

impl FromStr for DtmfTone {
    type Err = UnknownTone;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tone = match s.trim().to_ascii_lowercase().as_str() {
            "0" | "zero" => DtmfTone::Zero,
            "1" | "one" => DtmfTone::One,
            "2" | "two" => DtmfTone::Two,
            "3" | "three" => DtmfTone::Three,
            "4" | "four" => DtmfTone::Four,
            "5" | "five" => DtmfTone::Five,
            "6" | "six" => DtmfTone::Six,
            "7" | "seven" => DtmfTone::Seven,
            "8" | "eight" => DtmfTone::Eight,
            "9" | "nine" => DtmfTone::Nine,
            "*" | "asterisk" | "star" => DtmfTone::Asterisk,
            "#" | "pound" | "hash" => DtmfTone::Pound,
            "a" => DtmfTone::A,
            "b" => DtmfTone::B,
            "c" => DtmfTone::C,
            "d" => DtmfTone::D,
            _ => return Err(UnknownTone(s.to_string())),
        };
        Ok(tone)
    }
}
