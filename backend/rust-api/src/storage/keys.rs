/// Default prefix shared by every session key
pub const DEFAULT_NAMESPACE: &str = "quiz-session";

/// `<namespace>-<video_id>`. Injective for a fixed namespace.
pub fn session_key(namespace: &str, video_id: &str) -> String {
    format!("{}-{}", namespace, video_id)
}

/// Prefix every key produced by [`session_key`] starts with
pub fn namespace_prefix(namespace: &str) -> String {
    format!("{}-", namespace)
}

/// Inverse of [`session_key`]; `None` for keys outside the namespace
pub fn video_id_from_key<'a>(namespace: &str, key: &'a str) -> Option<&'a str> {
    key.strip_prefix(namespace)?.strip_prefix('-')
}
