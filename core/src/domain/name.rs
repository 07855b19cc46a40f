//! Resource name validation.
//!
//! One rule set applies to every kind of resource: lowercase alphanumerics,
//! optionally hyphen-separated, starting with a letter and ending with an
//! alphanumeric, between 2 and 63 characters after trimming.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Maximum length of a resource name.
pub const MAX_NAME_LENGTH: usize = 63;

/// Minimum length of a resource name accepted interactively.
pub const MIN_NAME_LENGTH: usize = 2;

/// Result of validating a proposed name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NameValidity {
    Valid,
    InvalidCharacters,
    TooLong,
    TooShort,
    Empty,
}

impl NameValidity {
    pub fn is_valid(&self) -> bool {
        matches!(self, NameValidity::Valid)
    }

    /// Whether the failure concerns the name's length.
    pub fn is_length_error(&self) -> bool {
        matches!(self, NameValidity::TooLong | NameValidity::TooShort)
    }

    /// User-facing message for a name of the given kind, `None` when valid.
    pub fn message(&self, kind: &str) -> Option<String> {
        match self {
            NameValidity::Valid => None,
            NameValidity::Empty => Some(format!("Empty {} name", kind)),
            NameValidity::InvalidCharacters => Some(format!("Not a valid {} name", kind)),
            NameValidity::TooLong | NameValidity::TooShort => Some(format!(
                "{} name should be between {}-{} characters",
                kind, MIN_NAME_LENGTH, MAX_NAME_LENGTH
            )),
        }
    }
}

impl std::fmt::Display for NameValidity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            NameValidity::Valid => "valid",
            NameValidity::InvalidCharacters => "invalid characters",
            NameValidity::TooLong => "too long",
            NameValidity::TooShort => "too short",
            NameValidity::Empty => "empty",
        };
        f.write_str(text)
    }
}

fn name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[a-z]([-a-z0-9]*[a-z0-9])?$").expect("name pattern is a valid regex")
    })
}

/// Validate a proposed resource name.
///
/// Checks run in order: emptiness, character shape, then length.
pub fn validate_name(value: &str) -> NameValidity {
    let name = value.trim();

    if name.is_empty() {
        return NameValidity::Empty;
    }
    if !name_pattern().is_match(name) {
        return NameValidity::InvalidCharacters;
    }

    let length = name.chars().count();
    if length > MAX_NAME_LENGTH {
        NameValidity::TooLong
    } else if length < MIN_NAME_LENGTH {
        NameValidity::TooShort
    } else {
        NameValidity::Valid
    }
}
