//! HTTP Basic authentication.

use base64::{engine::general_purpose, Engine as _};

use crate::protocol::Request;

type CredentialsProviderFn = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Checks `Authorization: Basic` credentials against a password lookup.
///
/// The provider maps a username to its expected password, or `None` for
/// unknown users. Whitespace around the username is ignored; the password
/// is compared exactly.
pub struct BasicAuthentication {
    credentials_provider: CredentialsProviderFn,
}

impl BasicAuthentication {
    pub fn new(
        credentials_provider: impl Fn(&str) -> Option<String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            credentials_provider: Box::new(credentials_provider),
        }
    }

    /// The authenticated username, or `None` when the header is missing,
    /// malformed, or the password does not match.
    pub fn authorized_user(&self, request: &Request) -> Option<String> {
        let header = request.headers().get("authorization")?;
        let token = header.strip_prefix("Basic ")?;
        let decoded = general_purpose::STANDARD.decode(token).ok()?;
        let credentials = String::from_utf8(decoded).ok()?;
        let (username, password) = credentials.split_once(':')?;
        let username = username.trim();
        ((self.credentials_provider)(username).as_deref() == Some(password))
            .then(|| username.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(username: &str) -> Option<String> {
        (username == "admin").then(|| "s3cret".to_string())
    }

    fn request_with_authorization(value: &str) -> Request {
        let mut request = Request::new();
        request
            .headers
            .insert_first("authorization".to_string(), value.to_string());
        request
    }

    fn encode(credentials: &str) -> String {
        format!("Basic {}", general_purpose::STANDARD.encode(credentials))
    }

    #[test]
    fn valid_credentials_yield_the_username() {
        let auth = BasicAuthentication::new(provider);
        let request = request_with_authorization(&encode("admin:s3cret"));
        assert_eq!(auth.authorized_user(&request), Some("admin".to_string()));
    }

    #[test]
    fn wrong_password_is_rejected() {
        let auth = BasicAuthentication::new(provider);
        let request = request_with_authorization(&encode("admin:guess"));
        assert_eq!(auth.authorized_user(&request), None);
    }

    #[test]
    fn unknown_user_is_rejected() {
        let auth = BasicAuthentication::new(provider);
        let request = request_with_authorization(&encode("root:s3cret"));
        assert_eq!(auth.authorized_user(&request), None);
    }

    #[test]
    fn missing_header_is_rejected() {
        let auth = BasicAuthentication::new(provider);
        assert_eq!(auth.authorized_user(&Request::new()), None);
    }

    #[test]
    fn non_basic_scheme_is_rejected() {
        let auth = BasicAuthentication::new(provider);
        let request = request_with_authorization("Bearer abc.def.ghi");
        assert_eq!(auth.authorized_user(&request), None);
    }

    #[test]
    fn invalid_base64_is_rejected() {
        let auth = BasicAuthentication::new(provider);
        let request = request_with_authorization("Basic !!not-base64!!");
        assert_eq!(auth.authorized_user(&request), None);
    }

    #[test]
    fn username_whitespace_is_trimmed() {
        let auth = BasicAuthentication::new(provider);
        let request = request_with_authorization(&encode("  admin :s3cret"));
        assert_eq!(auth.authorized_user(&request), Some("admin".to_string()));
    }

    #[test]
    fn password_keeps_its_colons() {
        let auth = BasicAuthentication::new(|username: &str| {
            (username == "svc").then(|| "a:b:c".to_string())
        });
        let request = request_with_authorization(&encode("svc:a:b:c"));
        assert_eq!(auth.authorized_user(&request), Some("svc".to_string()));
    }
}
