use serde::Deserialize;
use tracing::{info, warn};
use url::Url;
use uuid::Uuid;

use super::{AuthError, Session, SessionUser};
use crate::config::GoogleOAuthConfig;

#[derive(Clone)]
pub struct GoogleOAuthClient {
    config: GoogleOAuthConfig,
    http_client: reqwest::Client,
}

impl GoogleOAuthClient {
    pub fn new(config: GoogleOAuthConfig, http_client: reqwest::Client) -> Self {
        Self {
            config,
            http_client,
        }
    }

    pub fn config(&self) -> &GoogleOAuthConfig {
        &self.config
    }

    /// Consent URL asking for offline access so Google also issues a refresh
    /// token.
    pub fn authorization_url(&self, state_token: &str) -> Result<String, AuthError> {
        let mut url = Url::parse(&self.config.auth_url)
            .map_err(|err| AuthError::InvalidConfiguration(err.to_string()))?;
        url.query_pairs_mut()
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", &self.config.redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", &self.config.scopes.join(" "))
            .append_pair("access_type", "offline")
            .append_pair("prompt", "consent")
            .append_pair("state", state_token);

        Ok(url.to_string())
    }

    pub async fn exchange_code(&self, code: &str) -> Result<Session, AuthError> {
        let response = self
            .http_client
            .post(&self.config.token_url)
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("redirect_uri", self.config.redirect_uri.as_str()),
            ])
            .send()
            .await
            .map_err(|err| AuthError::ProviderUnavailable(err.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::TokenExchangeFailed {
                status: status.as_u16(),
                oauth_error: parse_google_oauth_error(&body),
            });
        }

        let payload = response
            .json::<GoogleCodeExchangeResponse>()
            .await
            .map_err(|err| AuthError::InvalidProviderResponse(err.to_string()))?;

        if payload.access_token.trim().is_empty() {
            return Err(AuthError::InvalidProviderResponse(
                "missing access_token".to_string(),
            ));
        }

        if payload.refresh_token.is_none() {
            warn!("google token response did not include a refresh token");
        }

        let user = match self.fetch_user_profile(&payload.access_token).await {
            Ok(user) => user,
            Err(err) => {
                warn!(error = %err, "failed to fetch google profile; continuing without it");
                SessionUser::default()
            }
        };

        info!(
            scope = payload.scope.as_deref().unwrap_or(""),
            "google sign-in completed"
        );

        Ok(Session {
            access_token: payload.access_token,
            refresh_token: payload.refresh_token,
            user,
        })
    }

    pub async fn fetch_user_profile(&self, access_token: &str) -> Result<SessionUser, AuthError> {
        let response = self
            .http_client
            .get(&self.config.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|err| AuthError::ProviderUnavailable(err.to_string()))?;

        if !response.status().is_success() {
            return Err(AuthError::InvalidProviderResponse(format!(
                "userinfo status={}",
                response.status().as_u16()
            )));
        }

        let profile = response
            .json::<GoogleUserInfoResponse>()
            .await
            .map_err(|err| AuthError::InvalidProviderResponse(err.to_string()))?;

        Ok(SessionUser {
            name: profile.name,
            email: profile.email,
            image: profile.picture,
        })
    }
}

pub fn generate_state_token() -> String {
    format!(
        "st_{}_{}",
        Uuid::new_v4().as_simple(),
        Uuid::new_v4().as_simple()
    )
}

#[derive(Debug, Deserialize)]
struct GoogleCodeExchangeResponse {
    access_token: String,
    refresh_token: Option<String>,
    scope: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleUserInfoResponse {
    name: Option<String>,
    email: Option<String>,
    picture: Option<String>,
}

fn parse_google_oauth_error(body: &str) -> Option<String> {
    #[derive(Deserialize)]
    struct GoogleOAuthErrorEnvelope {
        error: Option<String>,
    }

    serde_json::from_str::<GoogleOAuthErrorEnvelope>(body)
        .ok()
        .and_then(|envelope| envelope.error)
}
