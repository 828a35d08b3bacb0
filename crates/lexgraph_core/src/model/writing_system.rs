//! Writing system tags for localized text alternatives.
//!
//! # Invariants
//! - A tag is a lowercase 2-3 letter language code followed by optional
//!   `-`-separated subtags (`en`, `seh`, `qaa-x-kal`).
//! - Tags are compared and ordered by their normalized string form.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

static WRITING_SYSTEM_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z]{2,3}(-[A-Za-z0-9]{1,8})*$").expect("valid writing system regex")
});

/// Language/script/variant tag under which a text alternative is stored.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WritingSystem(String);

impl WritingSystem {
    /// Parses and validates one writing system tag.
    pub fn parse(value: &str) -> Result<Self, WritingSystemError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(WritingSystemError::Empty);
        }
        if !WRITING_SYSTEM_RE.is_match(trimmed) {
            return Err(WritingSystemError::Invalid(trimmed.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for WritingSystem {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for WritingSystem {
    type Error = WritingSystemError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<WritingSystem> for String {
    fn from(value: WritingSystem) -> Self {
        value.0
    }
}

/// Writing system tag parse errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WritingSystemError {
    Empty,
    Invalid(String),
}

impl Display for WritingSystemError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "writing system tag must not be empty"),
            Self::Invalid(value) => write!(f, "invalid writing system tag: `{value}`"),
        }
    }
}

impl Error for WritingSystemError {}
