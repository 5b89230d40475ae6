//! Header containers for both directions of the wire.
//!
//! Request headers behave like a case-insensitive map where the first value
//! wins on duplicates. Response headers are an ordered list, not a map:
//! insertion order is wire order and duplicate names (multiple `Set-Cookie`)
//! are preserved.

use std::collections::HashMap;

/// Parsed request headers. Names are stored lower-cased; lookups are
/// case-insensitive; the first value seen for a name wins.
#[derive(Debug, Clone, Default)]
pub struct RequestHeaders {
    entries: HashMap<String, String>,
}

impl RequestHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a header parsed off the wire. The name must already be
    /// lower-cased. Keeps the existing value if the name was seen before.
    pub(crate) fn insert_first(&mut self, name: String, value: String) {
        self.entries.entry(name).or_insert(value);
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&name.to_ascii_lowercase())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Ordered response header list, used both as the per-response "header sink"
/// handlers write into and as the server's global header set.
#[derive(Debug, Clone, Default)]
pub struct ResponseHeaders {
    entries: Vec<(String, String)>,
}

impl ResponseHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a header. Never replaces: add the same name twice and both
    /// entries go out on the wire.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.entries.push((name.into(), value.into()));
        self
    }

    /// Replaces the first entry with this name, or appends if absent.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| n.eq_ignore_ascii_case(&name)) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
        self
    }

    /// First value for this name, compared case-insensitively.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Appends all of `other`, preserving its order.
    pub fn merge(&mut self, other: ResponseHeaders) -> &mut Self {
        self.entries.extend(other.entries);
        self
    }

    /// Emits a `Cache-Control` header for the given lifetime.
    pub fn set_client_cache(&mut self, cache: CacheTime) -> &mut Self {
        let value = match cache {
            CacheTime::NoCache => "no-cache".to_string(),
            other => format!("max-age={}", other.as_seconds()),
        };
        self.add("Cache-Control", value)
    }

    /// Emits a `Set-Cookie` header, optionally with a `Max-Age` lifetime.
    pub fn set_cookie(
        &mut self,
        name: &str,
        value: &str,
        path: &str,
        cache: Option<CacheTime>,
    ) -> &mut Self {
        let max_age = match cache {
            Some(cache) => format!(" Max-Age={};", cache.as_seconds()),
            None => String::new(),
        };
        self.add("Set-Cookie", format!("{name}={value};{max_age} Path={path}"))
    }

    /// Emits a `Set-Cookie` header that expires the cookie immediately.
    pub fn unset_cookie(&mut self, name: &str, path: &str) -> &mut Self {
        self.add("Set-Cookie", format!("{name}=; Max-Age=-99999999; Path={path}"))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for ResponseHeaders {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().map(|(n, v)| (n.into(), v.into())).collect(),
        }
    }
}

/// Client cache lifetimes for the `Cache-Control` and `Set-Cookie` sugar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheTime {
    NoCache,
    Seconds(u64),
    Minutes(u64),
    Hours(u64),
    Days(u64),
}

impl CacheTime {
    pub fn as_seconds(&self) -> u64 {
        match self {
            Self::NoCache => 0,
            Self::Seconds(value) => *value,
            Self::Minutes(value) => value * 60,
            Self::Hours(value) => value * 3600,
            Self::Days(value) => value * 86400,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_headers_first_value_wins() {
        let mut headers = RequestHeaders::new();
        headers.insert_first("accept".to_string(), "text/html".to_string());
        headers.insert_first("accept".to_string(), "application/json".to_string());
        assert_eq!(headers.get("accept"), Some("text/html"));
        assert_eq!(headers.get("Accept"), Some("text/html"));
        assert_eq!(headers.len(), 1);
    }

    #[test]
    fn response_headers_preserve_order_and_duplicates() {
        let mut headers = ResponseHeaders::new();
        headers.add("Set-Cookie", "a=1").add("X-One", "1").add("Set-Cookie", "b=2");
        let collected: Vec<_> = headers.iter().collect();
        assert_eq!(
            collected,
            vec![("Set-Cookie", "a=1"), ("X-One", "1"), ("Set-Cookie", "b=2")]
        );
        assert_eq!(headers.get("set-cookie"), Some("a=1"));
    }

    #[test]
    fn set_replaces_first_match_only() {
        let mut headers = ResponseHeaders::new();
        headers.add("Server", "old").add("X-One", "1");
        headers.set("server", "new");
        assert_eq!(headers.get("Server"), Some("new"));
        assert_eq!(headers.len(), 2);
        headers.set("X-Two", "2");
        assert_eq!(headers.len(), 3);
    }

    #[test]
    fn cookie_sugar_formats() {
        let mut headers = ResponseHeaders::new();
        headers.set_cookie("session", "abc", "/", None);
        assert_eq!(headers.get("Set-Cookie"), Some("session=abc; Path=/"));

        let mut headers = ResponseHeaders::new();
        headers.set_cookie("session", "abc", "/app", Some(CacheTime::Minutes(2)));
        assert_eq!(headers.get("Set-Cookie"), Some("session=abc; Max-Age=120; Path=/app"));

        let mut headers = ResponseHeaders::new();
        headers.unset_cookie("session", "/");
        assert_eq!(headers.get("Set-Cookie"), Some("session=; Max-Age=-99999999; Path=/"));
    }

    #[test]
    fn client_cache_formats() {
        let mut headers = ResponseHeaders::new();
        headers.set_client_cache(CacheTime::NoCache);
        assert_eq!(headers.get("Cache-Control"), Some("no-cache"));

        let mut headers = ResponseHeaders::new();
        headers.set_client_cache(CacheTime::Days(1));
        assert_eq!(headers.get("Cache-Control"), Some("max-age=86400"));
    }
}
