//! Amateur radio call signs
//!
//! FCC call signs are stored upper-case with surrounding whitespace removed.
//! [`normalize`] is the lenient form used while ingesting bulk data, where
//! the only requirement is presence; [`CallSign::parse`] is the strict form
//! used for user-supplied input such as lookups.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{NetlogError, Result};

/// Longest call sign the ULS issues (including club/vanity formats)
pub const MAX_CALL_SIGN_LEN: usize = 10;

/// Trim and upper-case a raw call sign. Returns `None` when nothing is left.
pub fn normalize(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_ascii_uppercase())
    }
}

/// A validated, normalised call sign
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CallSign(String);

impl CallSign {
    /// Parse user input: alphanumeric, at least one digit, 3 to 10 characters.
    pub fn parse(raw: &str) -> Result<Self> {
        let normalized = normalize(raw).ok_or_else(|| NetlogError::InvalidCallSign(raw.to_string()))?;

        let valid_len = (3..=MAX_CALL_SIGN_LEN).contains(&normalized.len());
        let alphanumeric = normalized.chars().all(|c| c.is_ascii_alphanumeric());
        let has_digit = normalized.chars().any(|c| c.is_ascii_digit());

        if valid_len && alphanumeric && has_digit {
            Ok(Self(normalized))
        } else {
            Err(NetlogError::InvalidCallSign(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallSign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for CallSign {
    type Error = NetlogError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<CallSign> for String {
    fn from(value: CallSign) -> Self {
        value.0
    }
}
