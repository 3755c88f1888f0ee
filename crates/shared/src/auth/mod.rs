use std::fmt;

use thiserror::Error;

mod google;

pub use google::{GoogleOAuthClient, generate_state_token};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid oauth configuration: {0}")]
    InvalidConfiguration(String),
    #[error("oauth provider unavailable: {0}")]
    ProviderUnavailable(String),
    #[error("oauth token exchange failed: status={status} error={}", .oauth_error.as_deref().unwrap_or("unknown"))]
    TokenExchangeFailed {
        status: u16,
        oauth_error: Option<String>,
    },
    #[error("oauth provider returned an invalid response: {0}")]
    InvalidProviderResponse(String),
    #[error("oauth callback state did not match the pending sign-in")]
    StateMismatch,
    #[error("oauth consent was not granted: {0}")]
    ConsentDenied(String),
    #[error("oauth callback is missing the authorization code")]
    MissingCode,
    #[error("oauth callback listener failed: {0}")]
    CallbackListener(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionUser {
    pub name: Option<String>,
    pub email: Option<String>,
    pub image: Option<String>,
}

/// Provider tokens exposed to the chat client as-is; the backend accepts the
/// Google access token as its bearer credential.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub user: SessionUser,
}

impl Session {
    pub fn from_access_token(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: None,
            user: SessionUser::default(),
        }
    }

    pub fn display_name(&self) -> &str {
        self.user
            .name
            .as_deref()
            .or(self.user.email.as_deref())
            .unwrap_or("Signed in")
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"<redacted>")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "<redacted>"),
            )
            .field("user", &self.user)
            .finish()
    }
}

/// Holds the signed-in session, if any. Callers read the bearer token from
/// here and hand it to each conversation operation explicitly.
#[derive(Debug, Default)]
pub struct SessionProvider {
    session: Option<Session>,
}

impl SessionProvider {
    pub fn new(session: Option<Session>) -> Self {
        Self { session }
    }

    pub fn current(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn access_token(&self) -> Option<&str> {
        self.session
            .as_ref()
            .map(|session| session.access_token.as_str())
    }

    pub fn is_signed_in(&self) -> bool {
        self.session.is_some()
    }

    pub fn sign_in(&mut self, session: Session) {
        self.session = Some(session);
    }

    pub fn sign_out(&mut self) -> Option<Session> {
        self.session.take()
    }
}

#[cfg(test)]
mod tests {
    use super::{Session, SessionProvider, SessionUser};

    #[test]
    fn debug_output_redacts_tokens() {
        let session = Session {
            access_token: "ya29.secret-access".to_string(),
            refresh_token: Some("1//secret-refresh".to_string()),
            user: SessionUser {
                name: Some("Ada".to_string()),
                email: None,
                image: None,
            },
        };

        let rendered = format!("{session:?}");
        assert!(!rendered.contains("secret-access"));
        assert!(!rendered.contains("secret-refresh"));
        assert!(rendered.contains("Ada"));
    }

    #[test]
    fn provider_exposes_token_until_sign_out() {
        let mut provider = SessionProvider::default();
        assert_eq!(provider.access_token(), None);

        provider.sign_in(Session::from_access_token("token-1"));
        assert!(provider.is_signed_in());
        assert_eq!(provider.access_token(), Some("token-1"));

        let previous = provider.sign_out().expect("session should be returned");
        assert_eq!(previous.access_token, "token-1");
        assert_eq!(provider.access_token(), None);
    }

    #[test]
    fn display_name_falls_back_to_email() {
        let mut session = Session::from_access_token("token");
        assert_eq!(session.display_name(), "Signed in");

        session.user.email = Some("ada@example.com".to_string());
        assert_eq!(session.display_name(), "ada@example.com");

        session.user.name = Some("Ada Lovelace".to_string());
        assert_eq!(session.display_name(), "Ada Lovelace");
    }
}
