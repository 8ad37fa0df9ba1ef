use std::fmt;

use secrecy::{ExposeSecret, SecretString};

/// Source of the bearer token attached to every request.
///
/// Consulted per request so that a refreshed token is picked up without
/// rebuilding clients. Implementations live outside this crate; the
/// dashboard wires its credential collaborator in here.
pub trait TokenProvider: Send + Sync {
    /// The current token, or `None` if the session has no credential.
    fn bearer_token(&self) -> Option<SecretString>;
}

/// A fixed token, for one-shot CLI calls and tests.
#[derive(Clone)]
pub struct StaticToken(Option<SecretString>);

impl StaticToken {
    pub fn new(token: SecretString) -> Self {
        Self(Some(token))
    }

    /// A provider that never yields a token.
    pub fn anonymous() -> Self {
        Self(None)
    }
}

impl fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("StaticToken")
            .field(&self.0.as_ref().map(|_| "****"))
            .finish()
    }
}

impl TokenProvider for StaticToken {
    fn bearer_token(&self) -> Option<SecretString> {
        self.0.clone()
    }
}

/// Format the `Authorization` header value for a token.
pub(crate) fn bearer_header(token: &SecretString) -> String {
    format!("Bearer {}", token.expose_secret())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_token_yields_its_secret() {
        let provider = StaticToken::new(SecretString::from("abc".to_string()));
        let token = provider.bearer_token();
        assert_eq!(token.as_ref().map(ExposeSecret::expose_secret), Some("abc"));
        assert_eq!(
            bearer_header(&SecretString::from("abc".to_string())),
            "Bearer abc"
        );
    }

    #[test]
    fn debug_never_prints_the_token() {
        let provider = StaticToken::new(SecretString::from("hunter2".to_string()));
        assert!(!format!("{provider:?}").contains("hunter2"));
        assert!(StaticToken::anonymous().bearer_token().is_none());
    }
}
