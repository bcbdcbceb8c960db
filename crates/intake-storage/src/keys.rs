//! Shared key layout for storage backends.
//!
//! Key format: `uploads/{sessionId}/{fileName}`. The file name is expected to be
//! sanitized by the caller.

use intake_core::SessionId;

pub const UPLOADS_ROOT: &str = "uploads";

/// Namespace prefix of a session, with trailing slash.
pub fn session_prefix(session_id: &SessionId) -> String {
    format!("{}/{}/", UPLOADS_ROOT, session_id)
}

/// Object key for a file inside a session namespace.
pub fn object_key(session_id: &SessionId, file_name: &str) -> String {
    format!("{}{}", session_prefix(session_id), file_name)
}

/// True when `key` names an object directly inside the session namespace.
pub fn key_belongs_to_session(key: &str, session_id: &SessionId) -> bool {
    match key.strip_prefix(&session_prefix(session_id)) {
        Some(rest) => !rest.is_empty() && !rest.contains('/') && !rest.contains(".."),
        None => false,
    }
}

/// Last path segment of a key.
pub fn file_name_of(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

/// Re-home a key from one session namespace to another, keeping the file name.
pub fn rebase_key(key: &str, to: &SessionId) -> String {
    object_key(to, file_name_of(key))
}

/// Recover the key from a public URL built as `{base}/{key}`.
pub fn key_from_url(base_url: &str, url: &str) -> Option<String> {
    let base = base_url.trim_end_matches('/');
    let rest = url.strip_prefix(base)?.strip_prefix('/')?;
    let rest = rest.split(|c: char| c == '?' || c == '#').next().unwrap_or(rest);
    let decoded = urlencoding::decode(rest).ok()?;
    if decoded.is_empty() {
        return None;
    }
    Some(decoded.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use intake_core::parse_session_id;

    fn sid() -> SessionId {
        parse_session_id("3f2504e0-4f89-41d3-9a0c-0305e82c3301").unwrap()
    }

    #[test]
    fn keys_are_namespaced_by_session() {
        assert_eq!(
            object_key(&sid(), "cv.pdf"),
            "uploads/3f2504e0-4f89-41d3-9a0c-0305e82c3301/cv.pdf"
        );
    }

    #[test]
    fn ownership_check_rejects_foreign_and_nested_keys() {
        let id = sid();
        assert!(key_belongs_to_session(&object_key(&id, "a.pdf"), &id));
        assert!(!key_belongs_to_session(
            "uploads/00000000-0000-4000-8000-000000000000/a.pdf",
            &id
        ));
        assert!(!key_belongs_to_session(&session_prefix(&id), &id));
        assert!(!key_belongs_to_session(
            &format!("{}x/../../other.pdf", session_prefix(&id)),
            &id
        ));
    }

    #[test]
    fn url_round_trip_strips_query() {
        let key = key_from_url(
            "http://localhost:3000/files/",
            "http://localhost:3000/files/uploads/abc/my%20cv.pdf?x=1",
        );
        assert_eq!(key.as_deref(), Some("uploads/abc/my cv.pdf"));
        assert_eq!(key_from_url("http://a", "http://b/uploads/x"), None);
    }

    #[test]
    fn rebase_keeps_file_name() {
        let to = parse_session_id("9b2c1c1e-7a53-4d6e-8f0a-1d2e3f4a5b6c").unwrap();
        assert_eq!(
            rebase_key("uploads/3f2504e0-4f89-41d3-9a0c-0305e82c3301/cv.pdf", &to),
            "uploads/9b2c1c1e-7a53-4d6e-8f0a-1d2e3f4a5b6c/cv.pdf"
        );
    }
}
