//! Urlencoded form decoding, bracket syntax included.
//!
//! `a=1&b[c]=2&d[]=3` parses into a [`FormValue`] tree: strings at the
//! leaves, maps for `key[sub]`, arrays for `key[]`. [`FormDecoder`] then
//! deserializes the tree into any `serde` type, coercing string leaves
//! into numbers and booleans on demand, which is how query parameters,
//! path variables, and form bodies all decode through one code path.

mod value;

pub use value::FormValue;

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use thiserror::Error;

use value::FormDeserializer;

#[derive(Debug, Error)]
pub enum FormError {
    #[error("could not percent decode {token:?}")]
    PercentDecoding { token: String },
    #[error("malformed form key {key:?}")]
    MalformedKey { key: String },
    /// The parsed tree did not fit the requested type.
    #[error("{message}")]
    Decode { message: String },
}

/// Decodes urlencoded forms into typed values.
///
/// `omit_empty_values` drops `key=` pairs; `omit_flags` drops bare `key`
/// tokens, which otherwise decode as the string `"true"`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormDecoder {
    pub omit_empty_values: bool,
    pub omit_flags: bool,
}

impl FormDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decode<T: DeserializeOwned>(&self, form: &str) -> Result<T, FormError> {
        let parsed = parse(form, self.omit_empty_values, self.omit_flags)?;
        let tree = FormValue::Map(parsed);
        T::deserialize(FormDeserializer::new(&tree))
    }
}

enum SubKey {
    Array,
    Dict(String),
}

/// Parses a percent-encoded form into the root key map. `+` decodes as
/// space before anything else, so `%2B` survives as a literal plus.
fn parse(
    percent_encoded: &str,
    omit_empty_values: bool,
    omit_flags: bool,
) -> Result<HashMap<String, FormValue>, FormError> {
    let partially_decoded = percent_encoded.replace('+', " ");
    let mut encoded: HashMap<String, FormValue> = HashMap::new();

    for pair in partially_decoded.split('&').filter(|p| !p.is_empty()) {
        let (key, data) = match pair.split_once('=') {
            Some((key, value)) => {
                if omit_empty_values && value.is_empty() {
                    continue;
                }
                (key, FormValue::Str(percent_decode(value)?))
            }
            None => {
                if omit_flags {
                    continue;
                }
                (pair, FormValue::Str("true".to_string()))
            }
        };

        let (root, sub_keys) = parse_key(&percent_decode(key)?)?;
        if sub_keys.is_empty() {
            encoded.insert(root, data);
        } else {
            let mut current = encoded
                .remove(&root)
                .unwrap_or_else(|| FormValue::Map(HashMap::new()));
            set(&mut current, data, &sub_keys);
            encoded.insert(root, current);
        }
    }

    Ok(encoded)
}

fn percent_decode(token: &str) -> Result<String, FormError> {
    match urlencoding::decode(token) {
        Ok(decoded) => Ok(decoded.into_owned()),
        Err(_) => Err(FormError::PercentDecoding {
            token: token.to_string(),
        }),
    }
}

/// Splits `a[b][]` into the root `a` and its sub-keys. A key without both
/// brackets is all root, brackets included.
fn parse_key(key: &str) -> Result<(String, Vec<SubKey>), FormError> {
    if !(key.contains('[') && key.contains(']')) {
        return Ok((key.to_string(), Vec::new()));
    }

    let mut pieces = key.split('[').filter(|piece| !piece.is_empty());
    let Some(root) = pieces.next() else {
        return Err(FormError::MalformedKey {
            key: key.to_string(),
        });
    };
    let sub_keys = pieces
        .map(|piece| {
            if piece.starts_with(']') {
                SubKey::Array
            } else {
                // Everything up to the closing bracket names a map key.
                let mut chars = piece.chars();
                chars.next_back();
                SubKey::Dict(chars.as_str().to_string())
            }
        })
        .collect();

    Ok((root.to_string(), sub_keys))
}

/// Writes `data` into the tree at `path`, materialising maps and arrays
/// along the way. An `[]` step always appends; when more path follows it
/// appends a modified copy of the last element.
fn set(base: &mut FormValue, data: FormValue, path: &[SubKey]) {
    let Some((first, rest)) = path.split_first() else {
        *base = data;
        return;
    };

    let child = if rest.is_empty() {
        data
    } else {
        let mut child = match first {
            SubKey::Array => match base {
                FormValue::Arr(items) => items
                    .last()
                    .cloned()
                    .unwrap_or_else(|| FormValue::Arr(Vec::new())),
                _ => FormValue::Arr(Vec::new()),
            },
            SubKey::Dict(key) => match base {
                FormValue::Map(map) => map
                    .get(key)
                    .cloned()
                    .unwrap_or_else(|| FormValue::Map(HashMap::new())),
                _ => FormValue::Map(HashMap::new()),
            },
        };
        set(&mut child, data, rest);
        child
    };

    match first {
        SubKey::Array => match base {
            FormValue::Arr(items) => items.push(child),
            _ => *base = FormValue::Arr(vec![child]),
        },
        SubKey::Dict(key) => match base {
            FormValue::Map(map) => {
                map.insert(key.clone(), child);
            }
            _ => {
                let mut map = HashMap::new();
                map.insert(key.clone(), child);
                *base = FormValue::Map(map);
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn str_value(text: &str) -> FormValue {
        FormValue::Str(text.to_string())
    }

    #[test]
    fn flat_pairs_parse_to_string_leaves() {
        let parsed = parse("name=John&age=21", false, false).unwrap();
        assert_eq!(parsed.get("name"), Some(&str_value("John")));
        assert_eq!(parsed.get("age"), Some(&str_value("21")));
    }

    #[test]
    fn plus_and_percent_escapes_decode() {
        let parsed = parse("note=a+b%21&sum=1%2B2", false, false).unwrap();
        assert_eq!(parsed.get("note"), Some(&str_value("a b!")));
        assert_eq!(parsed.get("sum"), Some(&str_value("1+2")));
    }

    #[test]
    fn flag_without_equals_parses_as_true() {
        let parsed = parse("name=John&isAdmin", false, false).unwrap();
        assert_eq!(parsed.get("isAdmin"), Some(&str_value("true")));
    }

    #[test]
    fn omit_flags_drops_bare_keys() {
        let parsed = parse("name=John&isAdmin", false, true).unwrap();
        assert_eq!(parsed.get("isAdmin"), None);
        assert_eq!(parsed.get("name"), Some(&str_value("John")));
    }

    #[test]
    fn omit_empty_values_drops_key_equals_nothing() {
        let parsed = parse("name=John&age=", true, false).unwrap();
        assert_eq!(parsed.get("age"), None);
        assert_eq!(parsed.get("name"), Some(&str_value("John")));
    }

    #[test]
    fn empty_value_kept_by_default() {
        let parsed = parse("age=", false, false).unwrap();
        assert_eq!(parsed.get("age"), Some(&str_value("")));
    }

    #[test]
    fn value_may_contain_equals() {
        let parsed = parse("expr=a=b", false, false).unwrap();
        assert_eq!(parsed.get("expr"), Some(&str_value("a=b")));
    }

    #[test]
    fn bracket_keys_nest_into_maps() {
        let parsed = parse("user[name]=John&user[address][city]=Oslo", false, false).unwrap();
        let Some(FormValue::Map(user)) = parsed.get("user") else {
            panic!("expected map");
        };
        assert_eq!(user.get("name"), Some(&str_value("John")));
        let Some(FormValue::Map(address)) = user.get("address") else {
            panic!("expected nested map");
        };
        assert_eq!(address.get("city"), Some(&str_value("Oslo")));
    }

    #[test]
    fn empty_brackets_append_to_an_array() {
        let parsed = parse("tag[]=a&tag[]=b", false, false).unwrap();
        assert_eq!(
            parsed.get("tag"),
            Some(&FormValue::Arr(vec![str_value("a"), str_value("b")]))
        );
    }

    #[test]
    fn repeated_plain_key_keeps_the_last_value() {
        let parsed = parse("a=1&a=2", false, false).unwrap();
        assert_eq!(parsed.get("a"), Some(&str_value("2")));
    }

    #[test]
    fn array_of_maps_appends_a_copy_of_the_last_element() {
        let parsed = parse("item[][a]=1&item[][b]=2", false, false).unwrap();
        let Some(FormValue::Arr(items)) = parsed.get("item") else {
            panic!("expected array");
        };
        // The second pair extends a copy of the first element, so the
        // array ends up with both the original and the extended copy.
        assert_eq!(items.len(), 2);
        let Some(FormValue::Map(last)) = items.last() else {
            panic!("expected map element");
        };
        assert_eq!(last.get("a"), Some(&str_value("1")));
        assert_eq!(last.get("b"), Some(&str_value("2")));
    }
}
