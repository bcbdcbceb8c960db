//! Session identifier format rules.
//!
//! A session id is a random (version 4) UUID rendered in its canonical lowercase,
//! hyphenated form. Anything else is treated as malformed and never reaches the
//! identity store.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use uuid::Uuid;

static CANONICAL_SESSION_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9a-f]{8}-[0-9a-f]{4}-4[0-9a-f]{3}-[89ab][0-9a-f]{3}-[0-9a-f]{12}$")
        .expect("session id pattern is valid")
});

/// Opaque per-visitor token that namespaces uploads and downstream records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for SessionId {
    type Err = MalformedSessionId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_session_id(s)
    }
}

impl TryFrom<String> for SessionId {
    type Error = MalformedSessionId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        parse_session_id(&value)
    }
}

impl From<SessionId> for String {
    fn from(id: SessionId) -> Self {
        id.to_string()
    }
}

impl From<SessionId> for Uuid {
    fn from(id: SessionId) -> Self {
        id.0
    }
}

/// The presented string is not a canonical session id.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed session id: {0:?}")]
pub struct MalformedSessionId(pub String);

/// Generate a fresh random session id.
pub fn new_session_id() -> SessionId {
    SessionId(Uuid::new_v4())
}

/// Cheap local format check: lowercase, hyphenated, version 4, RFC-4122 variant.
pub fn is_canonical_session_id(candidate: &str) -> bool {
    CANONICAL_SESSION_ID.is_match(candidate)
}

/// Parse a canonical session id. Uppercase, braced, URN or simple forms are rejected.
pub fn parse_session_id(candidate: &str) -> Result<SessionId, MalformedSessionId> {
    if !is_canonical_session_id(candidate) {
        return Err(MalformedSessionId(candidate.to_string()));
    }
    Uuid::parse_str(candidate)
        .map(SessionId)
        .map_err(|_| MalformedSessionId(candidate.to_string()))
}

impl TryFrom<Uuid> for SessionId {
    type Error = MalformedSessionId;

    fn try_from(value: Uuid) -> Result<Self, Self::Error> {
        parse_session_id(&value.hyphenated().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_canonical() {
        for _ in 0..100 {
            let id = new_session_id();
            assert!(is_canonical_session_id(&id.to_string()));
        }
    }

    #[test]
    fn rejects_non_canonical_forms() {
        assert!(!is_canonical_session_id("not-a-uuid"));
        assert!(!is_canonical_session_id(""));
        // uppercase
        assert!(!is_canonical_session_id(
            "3F2504E0-4F89-41D3-9A0C-0305E82C3301"
        ));
        // simple form
        assert!(!is_canonical_session_id("3f2504e04f8941d39a0c0305e82c3301"));
        // braced
        assert!(!is_canonical_session_id(
            "{3f2504e0-4f89-41d3-9a0c-0305e82c3301}"
        ));
        // version 1
        assert!(!is_canonical_session_id(
            "3f2504e0-4f89-11d3-9a0c-0305e82c3301"
        ));
        // wrong variant
        assert!(!is_canonical_session_id(
            "3f2504e0-4f89-41d3-1a0c-0305e82c3301"
        ));
    }

    #[test]
    fn parses_canonical_form() {
        let raw = "3f2504e0-4f89-41d3-9a0c-0305e82c3301";
        let id = parse_session_id(raw).unwrap();
        assert_eq!(id.to_string(), raw);
    }

    #[test]
    fn serde_rejects_malformed_ids() {
        let ok: Result<SessionId, _> =
            serde_json::from_str("\"3f2504e0-4f89-41d3-9a0c-0305e82c3301\"");
        assert!(ok.is_ok());

        let bad: Result<SessionId, _> = serde_json::from_str("\"not-a-uuid\"");
        assert!(bad.is_err());
    }
}
