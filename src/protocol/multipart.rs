//! `multipart/form-data` body splitting.
//!
//! The scanner walks the body byte by byte. Header lines inside a part drop
//! every byte at or below CR, so both CRLF and bare LF captures parse; part
//! bodies keep their payload bytes untouched apart from one trailing line
//! break before the next boundary marker.

use std::collections::HashMap;

use crate::util::unquote;

const CR: u8 = 13;
const NL: u8 = 10;

/// One part of a `multipart/form-data` body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultiPart {
    headers: HashMap<String, String>,
    body: Vec<u8>,
}

impl MultiPart {
    /// Part headers, names lowercased.
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Raw payload bytes of this part.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// The `name` parameter of the part's `Content-Disposition` header.
    pub fn name(&self) -> Option<&str> {
        self.parameter("content-disposition", "name").map(unquote)
    }

    /// The `filename` parameter of the part's `Content-Disposition` header.
    pub fn file_name(&self) -> Option<&str> {
        self.parameter("content-disposition", "filename").map(unquote)
    }

    fn parameter(&self, header: &str, name: &str) -> Option<&str> {
        let value = self.headers.get(header)?;
        value
            .split(';')
            .map(str::trim)
            .filter_map(|token| {
                let pieces: Vec<&str> = token.split('=').collect();
                if pieces.first() == Some(&name) {
                    pieces.last().copied()
                } else {
                    None
                }
            })
            .next()
    }
}

/// Splits `data` into parts delimited by the given `--boundary` marker.
///
/// The body must open with the marker; anything before it makes the whole
/// parse come back empty.
pub(crate) fn parse_multipart(data: &[u8], boundary: &str) -> Vec<MultiPart> {
    let mut bytes = data.iter().copied();
    let mut parts = Vec::new();
    while let Some(part) = next_part(&mut bytes, boundary, parts.is_empty()) {
        parts.push(part);
    }
    parts
}

fn next_part(
    bytes: &mut impl Iterator<Item = u8>,
    boundary: &str,
    is_first: bool,
) -> Option<MultiPart> {
    if is_first {
        if next_line(bytes)? != boundary {
            return None;
        }
    } else {
        let _ = next_line(bytes);
    }
    let mut headers = HashMap::new();
    while let Some(line) = next_line(bytes) {
        if line.is_empty() {
            break;
        }
        let tokens: Vec<&str> = line.split(':').collect();
        if tokens.len() == 2 {
            headers.insert(tokens[0].to_lowercase(), tokens[1].trim().to_string());
        }
    }
    let body = next_body(bytes, boundary.as_bytes())?;
    Some(MultiPart { headers, body })
}

/// Reads up to the next LF, dropping CR and lower control bytes. Yields an
/// empty line at end of input and `None` only for invalid UTF-8.
fn next_line(bytes: &mut impl Iterator<Item = u8>) -> Option<String> {
    let mut line = Vec::new();
    for value in bytes.by_ref() {
        if value > CR {
            line.push(value);
        }
        if value == NL {
            break;
        }
    }
    String::from_utf8(line).ok()
}

fn next_body(bytes: &mut impl Iterator<Item = u8>, boundary: &[u8]) -> Option<Vec<u8>> {
    let mut body = Vec::new();
    let mut match_offset = 0;
    for value in bytes.by_ref() {
        match_offset = if value == boundary[match_offset] {
            match_offset + 1
        } else {
            0
        };
        body.push(value);
        if match_offset == boundary.len() {
            body.truncate(body.len() - match_offset);
            if body.last() == Some(&NL) {
                body.pop();
                if body.last() == Some(&CR) {
                    body.pop();
                }
            }
            return Some(body);
        }
    }
    None
}
