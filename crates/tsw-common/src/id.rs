//! Push identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier attached to every log event emitted during one push call.
///
/// Format: `push-YYYYMMDD-HHMMSS-xxxxxxxx` where the suffix is the first
/// eight hex digits of a random UUID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PushId(pub String);

impl PushId {
    /// Generate a new push ID.
    pub fn new() -> Self {
        let now = chrono::Utc::now();
        let uuid = uuid::Uuid::new_v4().simple().to_string();
        PushId(format!(
            "push-{}-{}-{}",
            now.format("%Y%m%d"),
            now.format("%H%M%S"),
            &uuid[..8]
        ))
    }

    /// Parse an existing push ID string.
    pub fn parse(s: &str) -> Option<Self> {
        let rest = s.strip_prefix("push-")?;
        let mut parts = rest.split('-');
        let date = parts.next()?;
        let time = parts.next()?;
        let suffix = parts.next()?;
        if parts.next().is_some() {
            return None;
        }
        if date.len() != 8 || !date.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        if time.len() != 6 || !time.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        if suffix.len() != 8 || !suffix.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }
        Some(PushId(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for PushId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PushId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_id_parses() {
        let id = PushId::new();
        assert_eq!(PushId::parse(id.as_str()), Some(id.clone()));
        assert_eq!(id.as_str().len(), "push-20260101-120000-abcdef01".len());
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(PushId::parse("push-2026010-120000-abcdef01").is_none());
        assert!(PushId::parse("pull-20260101-120000-abcdef01").is_none());
        assert!(PushId::parse("push-20260101-120000-abcdefzz").is_none());
        assert!(PushId::parse("push-20260101-120000-abcdef01-x").is_none());
    }
}
