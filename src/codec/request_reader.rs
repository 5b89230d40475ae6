//! Wire-to-request parsing.
//!
//! One request per call, reading lines off the connection until the blank
//! line and then a `Content-Length` counted body if one is announced. Any
//! failure here means there is no well-formed request to answer, so errors
//! end the connection's request loop instead of producing a 4xx.

use std::borrow::Cow;
use std::fmt::Write;

use url::Url;

use crate::connection::Connection;
use crate::protocol::{Method, ParseError, Request, RequestHeaders};
use crate::util::{ensure, percent_decoded};

pub(crate) async fn read_request(conn: &mut Connection) -> Result<Request, ParseError> {
    let status_line = conn.read_line().await?;
    let tokens: Vec<&str> = status_line.split(' ').collect();
    ensure!(
        tokens.len() >= 3,
        ParseError::invalid_status_line(&status_line)
    );

    let mut request = Request::new();
    request.method = Method::parse(tokens[0]);
    (request.path, request.query_params) = parse_target(tokens[1]);
    request.headers = read_headers(conn).await?;
    request.cookies = request
        .headers
        .get("cookie")
        .map(parse_cookies)
        .unwrap_or_default();

    if let Some(value) = request.headers.get("content-length") {
        if let Ok(length) = value.parse::<i64>() {
            ensure!(length >= 0, ParseError::NegativeContentLength);
            request.body = conn.read_exact(length as usize).await?;
        }
    }
    Ok(request)
}

async fn read_headers(conn: &mut Connection) -> Result<RequestHeaders, ParseError> {
    let mut headers = RequestHeaders::new();
    loop {
        let line = conn.read_line().await?;
        if line.is_empty() {
            return Ok(headers);
        }
        // Lines without a colon are not headers; skip rather than abort.
        if let Some((name, value)) = line.split_once(':') {
            headers.insert_first(name.to_ascii_lowercase(), value.trim().to_string());
        }
    }
}

fn parse_cookies(header: &str) -> Vec<(String, String)> {
    header
        .split(';')
        .map(str::trim)
        .filter_map(|pair| pair.split_once('='))
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect()
}

/// Splits the request target into a decoded path and its raw query pairs.
///
/// Clients routinely send bytes that are not legal in a URL, so the target
/// is percent-escaped first (existing escapes pass through untouched) and
/// then resolved against a dummy base. A target that still refuses to parse
/// yields an empty path and no query.
fn parse_target(target: &str) -> (String, Vec<(String, String)>) {
    let escaped = escape_target(target);
    if escaped.is_empty() {
        return (String::new(), Vec::new());
    }
    let base = Url::parse("http://localhost/").ok();
    let Some(url) = base.and_then(|base| base.join(&escaped).ok()) else {
        return (String::new(), Vec::new());
    };

    let path = urlencoding::decode(url.path())
        .map(Cow::into_owned)
        .unwrap_or_default();
    let query_params = match url.query() {
        None | Some("") => Vec::new(),
        Some(query) => query
            .split('&')
            .map(|token| {
                let (name, value) = token.split_once('=').unwrap_or((token, ""));
                (percent_decoded(name), percent_decoded(value))
            })
            .collect(),
    };
    (path, query_params)
}

/// Percent-escapes every byte outside the RFC 3986 query-allowed set. `%`
/// itself stays, so targets that already arrive encoded are not encoded
/// twice.
fn escape_target(target: &str) -> String {
    const EXTRA_ALLOWED: &str = "-._~!$&'()*+,;=:@/?%";
    let mut escaped = String::with_capacity(target.len());
    for ch in target.chars() {
        if ch.is_ascii_alphanumeric() || EXTRA_ALLOWED.contains(ch) {
            escaped.push(ch);
        } else {
            let mut utf8 = [0u8; 4];
            for byte in ch.encode_utf8(&mut utf8).bytes() {
                let _ = write!(escaped, "%{byte:02X}");
            }
        }
    }
    escaped
}
