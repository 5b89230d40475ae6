//! The parsed request and its accessors.
//!
//! A [`Request`] is built by the wire parser, enriched by the connection
//! driver (peer address, path variables, status bookkeeping), and handed to
//! middleware and handlers by shared reference. The only field handlers may
//! touch is the force-close flag, which is why it is atomic.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::form::{FormDecoder, FormError};
use crate::protocol::headers::RequestHeaders;
use crate::protocol::method::Method;
use crate::protocol::multipart::{parse_multipart, MultiPart};
use crate::util::camel_case;

/// A single parsed HTTP request.
#[derive(Debug)]
pub struct Request {
    pub(crate) id: Uuid,
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) query_params: Vec<(String, String)>,
    pub(crate) headers: RequestHeaders,
    pub(crate) cookies: Vec<(String, String)>,
    pub(crate) body: Bytes,
    pub(crate) path_params: PathParams,
    pub(crate) peer_addr: Option<SocketAddr>,
    pub(crate) force_close: AtomicBool,
    pub(crate) response_code: Option<u16>,
}

impl Request {
    pub(crate) fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            method: Method::Unknown,
            path: String::new(),
            query_params: Vec::new(),
            headers: RequestHeaders::new(),
            cookies: Vec::new(),
            body: Bytes::new(),
            path_params: PathParams::empty(),
            peer_addr: None,
            force_close: AtomicBool::new(false),
            response_code: None,
        }
    }

    #[inline]
    pub fn id(&self) -> Uuid {
        self.id
    }

    #[inline]
    pub fn method(&self) -> Method {
        self.method
    }

    #[inline]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Query parameters in wire order, duplicates preserved.
    #[inline]
    pub fn query_params(&self) -> &[(String, String)] {
        &self.query_params
    }

    /// First query parameter with this name.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query_params
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    #[inline]
    pub fn headers(&self) -> &RequestHeaders {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    #[inline]
    pub fn cookies(&self) -> &[(String, String)] {
        &self.cookies
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    #[inline]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Variables bound by `:name` pattern segments, injected after routing.
    #[inline]
    pub fn path_params(&self) -> &PathParams {
        &self.path_params
    }

    #[inline]
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    /// Status code of the response written for this request, once known.
    #[inline]
    pub fn response_code(&self) -> Option<u16> {
        self.response_code
    }

    /// Forces `Connection: close` after this request, regardless of what the
    /// client asked for. Callable from handlers and middleware.
    pub fn disable_keep_alive(&self) {
        self.force_close.store(true, Ordering::Relaxed);
    }

    pub(crate) fn keep_alive_disabled(&self) -> bool {
        self.force_close.load(Ordering::Relaxed)
    }

    /// True when the client sent `Connection: keep-alive` (exact token,
    /// trimmed, case-insensitive).
    pub fn keep_alive_requested(&self) -> bool {
        match self.headers.get("connection") {
            Some(value) => value.trim().eq_ignore_ascii_case("keep-alive"),
            None => false,
        }
    }

    /// True when the comma-separated header value contains the given token.
    pub fn has_header_token(&self, name: &str, token: &str) -> bool {
        match self.headers.get(name) {
            Some(value) => value
                .split(',')
                .any(|t| t.trim().eq_ignore_ascii_case(token)),
            None => false,
        }
    }

    /// Splits a `multipart/form-data` body into its parts.
    ///
    /// Returns an empty list unless the content type matches and carries a
    /// usable `boundary` parameter. Parsing happens on demand, not during
    /// the initial request parse.
    pub fn multipart_form_data(&self) -> Vec<MultiPart> {
        let Some(content_type) = self.headers.get("content-type") else {
            return Vec::new();
        };
        let tokens: Vec<&str> = content_type.split(';').map(str::trim).collect();
        if tokens.first() != Some(&"multipart/form-data") {
            return Vec::new();
        }
        let mut boundary = None;
        for token in &tokens {
            let pieces: Vec<&str> = token.split('=').collect();
            if pieces.len() == 2 && pieces[0] == "boundary" {
                boundary = Some(pieces[1]);
            }
        }
        match boundary {
            Some(boundary) if !boundary.is_empty() => {
                parse_multipart(&self.body, &format!("--{boundary}"))
            }
            _ => Vec::new(),
        }
    }

    /// Decodes an `application/x-www-form-urlencoded` body into a flat pair
    /// list, wire order preserved. Tokens without exactly one `=` are
    /// dropped; percent-decoding happens before `+` becomes a space.
    pub fn urlencoded_form(&self) -> Vec<(String, String)> {
        let Some(content_type) = self.headers.get("content-type") else {
            return Vec::new();
        };
        let first = content_type.split(';').next().map(str::trim);
        if first != Some("application/x-www-form-urlencoded") {
            return Vec::new();
        }
        let Ok(text) = std::str::from_utf8(&self.body) else {
            return Vec::new();
        };
        text.split('&')
            .filter_map(|param| {
                let tokens: Vec<&str> = param.split('=').collect();
                if tokens.len() != 2 {
                    return None;
                }
                let name = urlencoding::decode(tokens[0]).ok()?;
                let value = urlencoding::decode(tokens[1]).ok()?;
                Some((name.replace('+', " "), value.replace('+', " ")))
            })
            .collect()
    }

    /// [`Self::urlencoded_form`] collapsed into a map; the last value wins
    /// for duplicate names.
    pub fn flat_form_data(&self) -> std::collections::HashMap<String, String> {
        self.urlencoded_form().into_iter().collect()
    }

    /// Decodes the urlencoded body into a typed value, including nested
    /// `key[sub]` / `key[]` bracket syntax.
    pub fn decode_form<T: DeserializeOwned>(&self) -> Result<T, FormError> {
        let text = String::from_utf8_lossy(&self.body);
        FormDecoder::new().decode(&text)
    }

    /// Decodes the query parameters into a typed value.
    pub fn decode_query_params<T: DeserializeOwned>(&self) -> Result<T, FormError> {
        FormDecoder::new().decode(&join_pairs(self.query_params.iter().map(|(n, v)| (n.as_str(), v.as_str()))))
    }

    /// Decodes the `:name` path variables into a typed value.
    pub fn decode_path_params<T: DeserializeOwned>(&self) -> Result<T, FormError> {
        FormDecoder::new().decode(&join_pairs(self.path_params.iter()))
    }

    /// Decodes the request headers into a typed value. Hyphenated names are
    /// camel-cased first, so `user-agent` decodes into a `userAgent` field.
    pub fn decode_headers<T: DeserializeOwned>(&self) -> Result<T, FormError> {
        FormDecoder::new().decode(&join_pairs(
            self.headers.iter().map(|(n, v)| (camel_case(n), v)),
        ))
    }

    /// Decodes a JSON body into a typed value.
    pub fn decode_body<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

fn join_pairs<N: AsRef<str>, V: AsRef<str>>(pairs: impl Iterator<Item = (N, V)>) -> String {
    pairs
        .map(|(n, v)| format!("{}={}", n.as_ref(), v.as_ref()))
        .collect::<Vec<_>>()
        .join("&")
}

/// Path-variable bindings produced by the router from `:name` segments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams {
    params: Vec<(String, String)>,
}

impl PathParams {
    /// An empty binding set, for requests that matched no variables.
    pub fn empty() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.params.push((name.into(), value.into()));
    }

    pub(crate) fn truncate(&mut self, len: usize) {
        self.params.truncate(len);
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}
