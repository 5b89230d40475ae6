//! Route table and path matching.
//!
//! Patterns compile to segment matcher sequences at registration time.
//! Matching is a linear scan in registration order; the first entry whose
//! pattern matches structurally and whose method filter accepts the request
//! wins. There is no specificity scoring, so overlapping registrations
//! resolve purely by the order the application registered them in.
//!
//! Matcher kinds, against the `/`-split request path:
//!
//! - a literal segment matches exactly, compared percent-decoded
//! - `:name` matches one non-empty segment and binds it
//! - `*` matches one arbitrary segment
//! - `**` matches a run of segments: any run (zero included) at the tail
//!   of a pattern, at least one segment when interior, taking the shortest
//!   run that lets the rest of the pattern match

use std::fmt;
use std::sync::Arc;

use crate::handler::HttpHandler;
use crate::protocol::{Method, PathParams};
use crate::util::percent_decoded;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Variable(String),
    Wildcard,
    MultiWildcard,
}

struct RouteEntry {
    method: Option<Method>,
    pattern: Vec<Segment>,
    handler: Arc<dyn HttpHandler>,
}

/// The append-only route table.
#[derive(Default)]
pub struct Router {
    entries: Vec<RouteEntry>,
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("routes", &self.routes())
            .finish()
    }
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores an entry. `method: None` accepts any request method.
    pub fn register(
        &mut self,
        method: Option<Method>,
        pattern: &str,
        handler: Arc<dyn HttpHandler>,
    ) {
        self.entries.push(RouteEntry {
            method,
            pattern: compile_pattern(pattern),
            handler,
        });
    }

    /// Registered patterns, in registration order.
    pub fn routes(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|entry| format_pattern(&entry.pattern))
            .collect()
    }

    /// Finds the first matching entry and its variable bindings.
    pub fn route(&self, method: Method, path: &str) -> Option<(PathParams, Arc<dyn HttpHandler>)> {
        let segments: Vec<String> = split_segments(path)
            .into_iter()
            .map(percent_decoded)
            .collect();
        for entry in &self.entries {
            if entry.method.is_some_and(|filter| filter != method) {
                continue;
            }
            let mut params = PathParams::empty();
            if match_segments(&entry.pattern, &segments, &mut params) {
                return Some((params, Arc::clone(&entry.handler)));
            }
        }
        None
    }
}

fn split_segments(path: &str) -> Vec<&str> {
    path.strip_prefix('/').unwrap_or(path).split('/').collect()
}

fn compile_pattern(pattern: &str) -> Vec<Segment> {
    split_segments(pattern)
        .into_iter()
        .map(|token| match token {
            "*" => Segment::Wildcard,
            "**" => Segment::MultiWildcard,
            _ => match token.strip_prefix(':') {
                Some(name) => Segment::Variable(name.to_string()),
                None => Segment::Literal(token.to_string()),
            },
        })
        .collect()
}

fn format_pattern(pattern: &[Segment]) -> String {
    let parts: Vec<String> = pattern
        .iter()
        .map(|segment| match segment {
            Segment::Literal(text) => text.clone(),
            Segment::Variable(name) => format!(":{name}"),
            Segment::Wildcard => "*".to_string(),
            Segment::MultiWildcard => "**".to_string(),
        })
        .collect();
    format!("/{}", parts.join("/"))
}

fn match_segments(pattern: &[Segment], path: &[String], params: &mut PathParams) -> bool {
    let Some((head, rest)) = pattern.split_first() else {
        return path.is_empty();
    };
    match head {
        Segment::MultiWildcard if rest.is_empty() => true,
        Segment::MultiWildcard => {
            // Interior run: at least one segment, shortest expansion first.
            // Bindings made on a failed expansion are rolled back.
            for taken in 1..=path.len() {
                let checkpoint = params.len();
                if match_segments(rest, &path[taken..], params) {
                    return true;
                }
                params.truncate(checkpoint);
            }
            false
        }
        Segment::Literal(expected) => match path.split_first() {
            Some((first, remaining)) => {
                expected == first && match_segments(rest, remaining, params)
            }
            None => false,
        },
        Segment::Variable(name) => match path.split_first() {
            Some((first, remaining)) if !first.is_empty() => {
                params.push(name.clone(), first.clone());
                match_segments(rest, remaining, params)
            }
            _ => false,
        },
        Segment::Wildcard => match path.split_first() {
            Some((_, remaining)) => match_segments(rest, remaining, params),
            None => false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::handler::{HandlerResult, HttpHandler};
    use crate::protocol::{HttpResponse, Request, ResponseHeaders};

    struct Coded(u16);

    #[async_trait]
    impl HttpHandler for Coded {
        async fn handle(
            &self,
            _request: &Request,
            _headers: &mut ResponseHeaders,
        ) -> HandlerResult {
            Ok(HttpResponse::Raw(self.0, "Test".to_string(), None))
        }
    }

    fn handler(code: u16) -> Arc<dyn HttpHandler> {
        Arc::new(Coded(code))
    }

    async fn code_of(handler: &Arc<dyn HttpHandler>) -> u16 {
        handler
            .handle(&Request::new(), &mut ResponseHeaders::new())
            .await
            .unwrap()
            .status_code()
    }

    #[test]
    fn slash_root_matches_itself() {
        let mut router = Router::new();
        router.register(None, "/", handler(200));

        assert!(router.route(Method::Get, "/").is_some());
    }

    #[test]
    fn static_pattern_requires_every_segment() {
        let mut router = Router::new();
        router.register(None, "/a/b/c/d", handler(200));

        assert!(router.route(Method::Get, "/").is_none());
        assert!(router.route(Method::Get, "/a").is_none());
        assert!(router.route(Method::Get, "/a/b").is_none());
        assert!(router.route(Method::Get, "/a/b/c").is_none());
        assert!(router.route(Method::Get, "/a/b/c/d").is_some());
    }

    #[test]
    fn single_wildcard_spans_exactly_one_segment() {
        let mut router = Router::new();
        router.register(None, "/a/*/c/d", handler(200));

        assert!(router.route(Method::Get, "/").is_none());
        assert!(router.route(Method::Get, "/a").is_none());
        assert!(router.route(Method::Get, "/a/foo/c/d").is_some());
        assert!(router.route(Method::Get, "/a/b/c/d").is_some());
        assert!(router.route(Method::Get, "/a/b").is_none());
        assert!(router.route(Method::Get, "/a/b/foo/d").is_none());
    }

    #[test]
    fn variables_bind_in_pattern_positions() {
        let mut router = Router::new();
        router.register(None, "/a/:x/:y/b/c/d/:z", handler(200));

        assert!(router.route(Method::Get, "/").is_none());
        assert!(router.route(Method::Get, "/a").is_none());
        assert!(router.route(Method::Get, "/a/b/c/d").is_none());

        let (params, _) = router.route(Method::Get, "/a/v1/v2/b/c/d/v3").unwrap();
        assert_eq!(params.get("x"), Some("v1"));
        assert_eq!(params.get("y"), Some("v2"));
        assert_eq!(params.get("z"), Some("v3"));
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn interior_multi_wildcard_needs_at_least_one_segment() {
        let mut router = Router::new();
        router.register(None, "/a/**/e/f/g", handler(200));

        assert!(router.route(Method::Get, "/").is_none());
        assert!(router.route(Method::Get, "/a").is_none());
        assert!(router.route(Method::Get, "/a/b/c/d/e/f/g").is_some());
        assert!(router.route(Method::Get, "/a/e/f/g").is_none());
    }

    #[test]
    fn interior_multi_wildcard_takes_the_shortest_run() {
        let mut router = Router::new();
        router.register(None, "/a/**/:x", handler(200));

        let (params, _) = router.route(Method::Get, "/a/b/c/d").unwrap();
        assert_eq!(params.get("x"), Some("d"));
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn tail_multi_wildcard_spans_any_run_including_empty() {
        let mut router = Router::new();
        router.register(None, "/a/b/**", handler(200));

        assert!(router.route(Method::Get, "/").is_none());
        assert!(router.route(Method::Get, "/a").is_none());
        assert!(router.route(Method::Get, "/a/b/c/d/e/f/g").is_some());
        assert!(router.route(Method::Get, "/a/e/f/g").is_none());
        assert!(router.route(Method::Get, "/a/b").is_some());
    }

    #[test]
    fn trailing_slash_and_variable_patterns_stay_distinct() {
        let mut router = Router::new();
        router.register(None, "/a/b/", handler(200));
        router.register(None, "/a/b/:var", handler(201));

        assert!(router.route(Method::Get, "/").is_none());
        assert!(router.route(Method::Get, "/a").is_none());
        assert!(router.route(Method::Get, "/a/e/f/g").is_none());

        let (params, _) = router.route(Method::Get, "/a/b/value1").unwrap();
        assert_eq!(params.get("var"), Some("value1"));

        let (params, _) = router.route(Method::Get, "/a/b/").unwrap();
        assert_eq!(params.get("var"), None);
        assert!(params.is_empty());
    }

    #[test]
    fn literal_segments_match_percent_encoded_requests() {
        let mut router = Router::new();
        router.register(None, "/a/<>/^", handler(200));

        assert!(router.route(Method::Get, "/").is_none());
        assert!(router.route(Method::Get, "/a").is_none());
        assert!(router.route(Method::Get, "/a/%3C%3E/%5E").is_some());
    }

    #[tokio::test]
    async fn overlapping_entries_resolve_by_registration_order() {
        let mut first_static = Router::new();
        first_static.register(Some(Method::Get), "/a/b", handler(201));
        first_static.register(Some(Method::Get), "/a/:id", handler(202));

        let (params, chosen) = first_static.route(Method::Get, "/a/b").unwrap();
        assert!(params.is_empty());
        assert_eq!(code_of(&chosen).await, 201);

        let mut first_variable = Router::new();
        first_variable.register(Some(Method::Get), "/a/:id", handler(202));
        first_variable.register(Some(Method::Get), "/a/b", handler(201));

        let (params, chosen) = first_variable.route(Method::Get, "/a/b").unwrap();
        assert_eq!(params.get("id"), Some("b"));
        assert_eq!(code_of(&chosen).await, 202);
    }

    #[test]
    fn overlapping_dynamic_routes_pick_by_structure() {
        let mut router = Router::new();
        router.register(Some(Method::Get), "a/:id", handler(200));
        router.register(Some(Method::Get), "a/:id/c", handler(201));

        assert!(router.route(Method::Get, "a/b").is_some());
        let (params, _) = router.route(Method::Get, "a/b/c").unwrap();
        assert_eq!(params.get("id"), Some("b"));
    }

    #[test]
    fn shorter_patterns_can_register_after_longer_ones() {
        let mut router = Router::new();
        router.register(Some(Method::Get), "/a/:id", handler(200));
        router.register(Some(Method::Get), "/a", handler(201));
        router.register(Some(Method::Get), "/a/:id/b", handler(202));

        assert!(router.route(Method::Get, "/a").is_some());
        assert!(router.route(Method::Get, "/a/b").is_some());
        assert!(router.route(Method::Get, "/a/b/b").is_some());
    }

    #[test]
    fn literal_run_and_variable_pattern_coexist_mid_path() {
        let mut router = Router::new();
        router.register(Some(Method::Get), "/a/b/c/d/e", handler(200));
        router.register(Some(Method::Get), "/a/:id/f/g", handler(201));

        assert!(router.route(Method::Get, "/a/b/c/d/e").is_some());
        let (params, _) = router.route(Method::Get, "/a/b/f/g").unwrap();
        assert_eq!(params.get("id"), Some("b"));
    }

    #[test]
    fn method_filter_is_equality_or_absence() {
        let mut router = Router::new();
        router.register(Some(Method::Get), "/only-get", handler(200));
        router.register(None, "/any", handler(201));

        assert!(router.route(Method::Get, "/only-get").is_some());
        assert!(router.route(Method::Post, "/only-get").is_none());
        assert!(router.route(Method::Post, "/any").is_some());
        assert!(router.route(Method::Delete, "/any").is_some());
    }

    #[test]
    fn leading_slash_is_optional_in_patterns_and_paths() {
        let mut router = Router::new();
        router.register(None, "a/b", handler(200));

        assert!(router.route(Method::Get, "a/b").is_some());
        assert!(router.route(Method::Get, "/a/b").is_some());
    }

    #[test]
    fn routes_lists_patterns_in_registration_order() {
        let mut router = Router::new();
        router.register(None, "/a/:id", handler(200));
        router.register(None, "b/**", handler(201));

        assert_eq!(router.routes(), vec!["/a/:id".to_string(), "/b/**".to_string()]);
    }
}
