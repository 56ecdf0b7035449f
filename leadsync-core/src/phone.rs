//! Phone canonicalization.
//!
//! Canonical form is 11 ASCII digits starting with `7`: the country code
//! followed by the 10-digit national number. Anything that cannot be brought
//! into that shape is invalid and yields `None`.

use std::fmt;

use serde::Serialize;

/// An 11-digit canonical phone number beginning with `7`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct NormalizedPhone(String);

impl NormalizedPhone {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for NormalizedPhone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl AsRef<str> for NormalizedPhone {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Canonicalize a free-form phone string.
///
/// Non-digits are stripped first. Then:
/// - 11 digits starting with `7` are kept as-is;
/// - 11 digits starting with `8` get the leading `8` replaced by `7`;
/// - 10 digits starting with `9` get a `7` prefix;
/// - everything else is invalid.
///
/// Idempotent: a canonical value normalizes to itself.
pub fn normalize_phone(raw: &str) -> Option<NormalizedPhone> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    let canonical = match (digits.len(), digits.as_bytes().first()) {
        (11, Some(b'7')) => digits,
        (11, Some(b'8')) => format!("7{}", &digits[1..]),
        (10, Some(b'9')) => format!("7{digits}"),
        _ => return None,
    };
    Some(NormalizedPhone(canonical))
}
