//! Internal helper macros and small string utilities.

/// A macro for early returns with an error if a condition is not met.
///
/// This is similar to the `assert!` macro, but returns an error instead of
/// panicking. Useful for validation checks in parsing code.
macro_rules! ensure {
    ($predicate:expr, $error:expr) => {
        if !$predicate {
            return Err($error);
        }
    };
}

pub(crate) use ensure;

/// Strips one pair of surrounding double quotes, if present.
///
/// Used for `content-disposition` parameter values, which arrive quoted.
pub(crate) fn unquote(value: &str) -> &str {
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        &value[1..value.len() - 1]
    } else {
        value
    }
}

/// Percent-decodes a token, handing it back untouched when the escapes do
/// not form valid UTF-8.
pub(crate) fn percent_decoded(token: &str) -> String {
    urlencoding::decode(token)
        .map(std::borrow::Cow::into_owned)
        .unwrap_or_else(|_| token.to_string())
}

/// Converts a hyphenated header name to camel case, so `user-agent`
/// becomes `userAgent` and maps onto a struct field when decoding headers.
pub(crate) fn camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = false;
    for ch in name.chars() {
        if ch == '-' {
            upper_next = true;
        } else if upper_next {
            out.extend(ch.to_uppercase());
            upper_next = false;
        } else {
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unquote_strips_one_quote_pair() {
        assert_eq!(unquote("\"file.txt\""), "file.txt");
        assert_eq!(unquote("\"\""), "");
        assert_eq!(unquote("plain"), "plain");
        assert_eq!(unquote("\"unbalanced"), "\"unbalanced");
        assert_eq!(unquote("\""), "\"");
    }

    #[test]
    fn camel_case_joins_hyphenated_names() {
        assert_eq!(camel_case("user-agent"), "userAgent");
        assert_eq!(camel_case("content-length"), "contentLength");
        assert_eq!(camel_case("host"), "host");
        assert_eq!(camel_case("x-forwarded-for"), "xForwardedFor");
    }
}
