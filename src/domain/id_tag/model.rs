//! IdTag authorization status

use serde::{Deserialize, Serialize};

/// IdTag authorization status (OCPP 1.6)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IdTagStatus {
    Accepted,
    Blocked,
    Expired,
    Invalid,
    ConcurrentTx,
}

impl IdTagStatus {
    pub fn is_accepted(self) -> bool {
        self == Self::Accepted
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Accepted => "Accepted",
            Self::Blocked => "Blocked",
            Self::Expired => "Expired",
            Self::Invalid => "Invalid",
            Self::ConcurrentTx => "ConcurrentTx",
        }
    }
}

impl Default for IdTagStatus {
    fn default() -> Self {
        Self::Invalid
    }
}

impl std::fmt::Display for IdTagStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for IdTagStatus {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "accepted" => Self::Accepted,
            "blocked" => Self::Blocked,
            "expired" => Self::Expired,
            "invalid" => Self::Invalid,
            "concurrenttx" => Self::ConcurrentTx,
            _ => Self::Invalid,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!(IdTagStatus::from("accepted"), IdTagStatus::Accepted);
        assert_eq!(IdTagStatus::from("CONCURRENTTX"), IdTagStatus::ConcurrentTx);
        assert_eq!(IdTagStatus::from("nonsense"), IdTagStatus::Invalid);
    }

    #[test]
    fn test_serde_uses_ocpp_spelling() {
        let json = serde_json::to_string(&IdTagStatus::ConcurrentTx).unwrap();
        assert_eq!(json, "\"ConcurrentTx\"");
        let parsed: IdTagStatus = serde_json::from_str("\"Blocked\"").unwrap();
        assert_eq!(parsed, IdTagStatus::Blocked);
    }
}
