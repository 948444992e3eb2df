//! Validation and normalization of candidate tag strings

use std::fmt;

use super::RemoteIdTag;
use crate::domain::{DomainError, DomainResult};

/// Hard cap on the backend side. Longer input is truncated, never rejected.
pub const MAX_REMOTE_ID_TAG_LENGTH: usize = 32;

/// Non-fatal findings produced while normalizing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizeWarning {
    /// Input exceeded [`MAX_REMOTE_ID_TAG_LENGTH`] and was truncated.
    TooLong { original_len: usize },
}

impl fmt::Display for NormalizeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooLong { original_len } => write!(
                f,
                "remote_id_tag too long ({} characters), truncated to {}",
                original_len, MAX_REMOTE_ID_TAG_LENGTH
            ),
        }
    }
}

/// Outcome of a successful [`normalize`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    pub tag: RemoteIdTag,
    pub warnings: Vec<NormalizeWarning>,
}

impl Normalized {
    pub fn was_truncated(&self) -> bool {
        self.warnings
            .iter()
            .any(|w| matches!(w, NormalizeWarning::TooLong { .. }))
    }
}

/// Characters allowed in a backend tag: `A-Z`, `0-9` and `_`.
pub fn is_tag_char(c: char) -> bool {
    c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_'
}

/// Normalize a raw tag string.
///
/// Surrounding whitespace is trimmed, input longer than 32 characters is
/// truncated (with a [`NormalizeWarning::TooLong`]), and what remains must be
/// non-empty and inside the tag character set. Case is never changed.
pub fn normalize(raw: &str) -> DomainResult<Normalized> {
    let trimmed = raw.trim();
    let original_len = trimmed.chars().count();

    let mut warnings = Vec::new();
    let candidate: String = if original_len > MAX_REMOTE_ID_TAG_LENGTH {
        warnings.push(NormalizeWarning::TooLong { original_len });
        trimmed.chars().take(MAX_REMOTE_ID_TAG_LENGTH).collect()
    } else {
        trimmed.to_string()
    };

    if candidate.is_empty() {
        return Err(DomainError::Validation(
            "remote_id_tag must not be empty".to_string(),
        ));
    }

    if let Some(bad) = candidate.chars().find(|c| !is_tag_char(*c)) {
        return Err(DomainError::Validation(format!(
            "remote_id_tag contains invalid character {:?} (allowed: A-Z, 0-9, _)",
            bad
        )));
    }

    Ok(Normalized {
        tag: RemoteIdTag::new_unchecked(candidate),
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_tags_are_unchanged() {
        let longest = "Z".repeat(32);
        for raw in ["A", "ABC123", "0000", "CUSTOM_REMOTE_TAG_12345", longest.as_str()] {
            let normalized = normalize(raw).unwrap();
            assert_eq!(normalized.tag.as_str(), raw);
            assert!(normalized.warnings.is_empty());
        }
    }

    #[test]
    fn test_overlong_tag_is_truncated_with_warning() {
        let normalized = normalize(&"A".repeat(33)).unwrap();

        assert_eq!(normalized.tag.as_str(), "A".repeat(32));
        assert!(normalized.was_truncated());
        assert_eq!(
            normalized.warnings,
            vec![NormalizeWarning::TooLong { original_len: 33 }]
        );
        assert!(normalized.warnings[0]
            .to_string()
            .contains("remote_id_tag too long"));
    }

    #[test]
    fn test_surrounding_whitespace_is_trimmed() {
        let normalized = normalize("  ABC123\n").unwrap();
        assert_eq!(normalized.tag.as_str(), "ABC123");
    }

    #[test]
    fn test_empty_input_is_rejected() {
        assert!(matches!(normalize(""), Err(DomainError::Validation(_))));
        assert!(matches!(normalize("   "), Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_lowercase_is_not_uppercased() {
        assert!(matches!(normalize("abc123"), Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_invalid_characters_are_rejected() {
        for raw in ["ABC-123", "ABC 123", "TAG!", "ÄBC"] {
            assert!(
                matches!(normalize(raw), Err(DomainError::Validation(_))),
                "{raw} should be rejected"
            );
        }
    }

    #[test]
    fn test_truncation_applies_before_charset_check() {
        // The offending character sits past the 32-character cap.
        let raw = format!("{}-", "B".repeat(32));
        let normalized = normalize(&raw).unwrap();
        assert_eq!(normalized.tag.as_str(), "B".repeat(32));
        assert!(normalized.was_truncated());
    }
}
