//! Remote authorization identifier
//!
//! A `remote_id_tag` is the token a charge point is told to use when a
//! transaction is started remotely (no RFID tap). A [`RemoteIdTag`] can only
//! be obtained through [`normalize`] or [`generate`], so holding one means
//! the value is non-empty, at most 32 characters and within the tag
//! character set.

pub mod generator;
pub mod validator;

use std::fmt;

use serde::Serialize;

pub use generator::{generate, generate_with, GENERATED_TAG_LENGTH, TAG_ALPHABET};
pub use validator::{
    is_tag_char, normalize, NormalizeWarning, Normalized, MAX_REMOTE_ID_TAG_LENGTH,
};

/// A normalized remote authorization identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RemoteIdTag(String);

impl RemoteIdTag {
    /// Callers must have checked length and character set already.
    pub(crate) fn new_unchecked(value: String) -> Self {
        Self(value)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always `false`; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for RemoteIdTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RemoteIdTag {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for RemoteIdTag {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for RemoteIdTag {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl From<RemoteIdTag> for String {
    fn from(tag: RemoteIdTag) -> Self {
        tag.0
    }
}
