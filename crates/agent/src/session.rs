//! Session binding: where (and whether) a conversation is persisted.
//!
//! A session id may carry a namespace before its first hyphen:
//! `alice-2024abc` is session `2024abc` under `alice/`. Ids without a hyphen
//! land in the `default/` namespace.

use rand::Rng;
use rand::distr::Alphanumeric;

/// Namespace for session ids that do not carry one.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Length of generated session ids.
pub const SESSION_ID_LEN: usize = 33;

const MAX_PREFIX_LEN: usize = 20;

/// Split a session id on its first hyphen into `(namespace, local id)`.
pub fn split_session_id(session_id: &str) -> (&str, &str) {
    match session_id.split_once('-') {
        Some((namespace, local)) => (namespace, local),
        None => (DEFAULT_NAMESPACE, session_id),
    }
}

/// A resolved persistent-storage location for one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionBinding {
    pub bucket: String,
    /// `"<namespace>/"`
    pub prefix: String,
    /// The session id with its namespace removed
    pub session_id: String,
}

impl SessionBinding {
    /// Bind `session_id` to `bucket`.
    ///
    /// Returns `None` (no persistence) unless the bucket, the derived prefix
    /// and the effective session id are all non-empty.
    pub fn resolve(session_id: &str, bucket: &str) -> Option<Self> {
        let bucket = bucket.trim();
        if session_id.is_empty() || bucket.is_empty() {
            return None;
        }

        let (namespace, local) = split_session_id(session_id);
        if namespace.is_empty() || local.is_empty() {
            return None;
        }

        Some(Self {
            bucket: bucket.to_string(),
            prefix: format!("{namespace}/"),
            session_id: local.to_string(),
        })
    }
}

/// Generate a fresh session id of [`SESSION_ID_LEN`] characters.
///
/// The first hyphen-free, at most 20-character run of `prefix` becomes the
/// namespace; the rest is random alphanumerics. An empty prefix yields a
/// fully random id in the default namespace.
pub fn generate_session_id(prefix: &str) -> String {
    let prefix: String = prefix
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '.')
        .take(MAX_PREFIX_LEN)
        .collect();

    let mut id = if prefix.is_empty() {
        String::new()
    } else {
        format!("{prefix}-")
    };
    let remaining = SESSION_ID_LEN - id.len();
    id.extend(
        rand::rng()
            .sample_iter(Alphanumeric)
            .take(remaining)
            .map(char::from),
    );
    id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_on_first_hyphen_only() {
        assert_eq!(split_session_id("alice-2024abc"), ("alice", "2024abc"));
        assert_eq!(split_session_id("a-b-c"), ("a", "b-c"));
        assert_eq!(split_session_id("noHyphenHere"), ("default", "noHyphenHere"));
    }

    #[test]
    fn bind_with_namespace() {
        let binding = SessionBinding::resolve("alice-2024abc", "mybucket").unwrap();
        assert_eq!(binding.prefix, "alice/");
        assert_eq!(binding.session_id, "2024abc");
        assert_eq!(binding.bucket, "mybucket");
    }

    #[test]
    fn bind_without_namespace() {
        let binding = SessionBinding::resolve("noHyphenHere", "mybucket").unwrap();
        assert_eq!(binding.prefix, "default/");
        assert_eq!(binding.session_id, "noHyphenHere");
    }

    #[test]
    fn no_bucket_no_binding() {
        assert!(SessionBinding::resolve("alice-2024abc", "").is_none());
        assert!(SessionBinding::resolve("alice-2024abc", "   ").is_none());
        assert!(SessionBinding::resolve("", "mybucket").is_none());
    }

    #[test]
    fn empty_halves_disable_persistence() {
        assert!(SessionBinding::resolve("-2024abc", "mybucket").is_none());
        assert!(SessionBinding::resolve("alice-", "mybucket").is_none());
    }

    #[test]
    fn default_session_binds_to_its_own_namespace() {
        let binding = SessionBinding::resolve("default-session", "mybucket").unwrap();
        assert_eq!(binding.prefix, "default/");
        assert_eq!(binding.session_id, "session");
    }

    #[test]
    fn generated_ids() {
        let id = generate_session_id("alice");
        assert_eq!(id.len(), SESSION_ID_LEN);
        assert!(id.starts_with("alice-"));
        let (namespace, local) = split_session_id(&id);
        assert_eq!(namespace, "alice");
        assert!(local.chars().all(|c| c.is_ascii_alphanumeric()));

        let id = generate_session_id("a-very-long-user-name-that-goes-on");
        assert_eq!(id.len(), SESSION_ID_LEN);
        assert_eq!(split_session_id(&id).0, "averylongusernametha");

        let id = generate_session_id("");
        assert_eq!(id.len(), SESSION_ID_LEN);
        assert!(!id.contains('-'));

        assert_ne!(generate_session_id("bob"), generate_session_id("bob"));
    }
}
