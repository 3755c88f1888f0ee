use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use axum::Router;
use axum::extract::{Query, State};
use axum::response::Html;
use axum::routing::get;
use serde::Deserialize;
use shared::auth::{AuthError, GoogleOAuthClient, Session, generate_state_token};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{debug, info};
use url::Url;

pub const CALLBACK_TIMEOUT: Duration = Duration::from_secs(300);

const SIGNED_IN_PAGE: &str =
    "<html><body><h3>Signed in to Aegis LifeOS.</h3><p>You can close this tab.</p></body></html>";
const SIGN_IN_FAILED_PAGE: &str =
    "<html><body><h3>Sign-in did not complete.</h3><p>Return to the terminal.</p></body></html>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackTarget {
    pub bind_addr: SocketAddr,
    pub path: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

#[derive(Clone)]
struct CallbackState {
    sender: Arc<Mutex<Option<oneshot::Sender<CallbackParams>>>>,
}

/// A sign-in waiting for the browser. The loopback listener is already bound,
/// so the consent URL can be shown before [`PendingSignIn::finish`] blocks.
pub struct PendingSignIn {
    listener: TcpListener,
    path: String,
    state_token: String,
    authorization_url: String,
}

pub async fn begin_sign_in(client: &GoogleOAuthClient) -> Result<PendingSignIn, AuthError> {
    let target = callback_target(&client.config().redirect_uri)?;
    let state_token = generate_state_token();
    let authorization_url = client.authorization_url(&state_token)?;

    let listener = TcpListener::bind(target.bind_addr)
        .await
        .map_err(|err| AuthError::CallbackListener(err.to_string()))?;

    Ok(PendingSignIn {
        listener,
        path: target.path,
        state_token,
        authorization_url,
    })
}

impl PendingSignIn {
    pub fn authorization_url(&self) -> &str {
        &self.authorization_url
    }

    pub fn local_addr(&self) -> Result<SocketAddr, AuthError> {
        self.listener
            .local_addr()
            .map_err(|err| AuthError::CallbackListener(err.to_string()))
    }

    /// Waits for Google to redirect back, then exchanges the code.
    pub async fn finish(
        self,
        client: &GoogleOAuthClient,
        timeout: Duration,
    ) -> Result<Session, AuthError> {
        info!(redirect_uri = %client.config().redirect_uri, "waiting for google sign-in callback");

        let params = tokio::select! {
            params = wait_for_callback(self.listener, &self.path, timeout) => params?,
            _ = tokio::signal::ctrl_c() => {
                return Err(AuthError::CallbackListener("sign-in cancelled".to_string()));
            }
        };

        let code = validate_callback(&self.state_token, params)?;
        client.exchange_code(&code).await
    }
}

pub fn callback_target(redirect_uri: &str) -> Result<CallbackTarget, AuthError> {
    let url = Url::parse(redirect_uri)
        .map_err(|err| AuthError::InvalidConfiguration(format!("redirect uri: {err}")))?;
    if url.scheme() != "http" {
        return Err(AuthError::InvalidConfiguration(
            "redirect uri must use http on a loopback address".to_string(),
        ));
    }

    let host = match url.host_str() {
        Some("localhost") => "127.0.0.1",
        Some(host) => host,
        None => {
            return Err(AuthError::InvalidConfiguration(
                "redirect uri has no host".to_string(),
            ));
        }
    };
    let port = url.port_or_known_default().unwrap_or(80);
    let bind_addr = format!("{host}:{port}")
        .parse::<SocketAddr>()
        .map_err(|err| AuthError::InvalidConfiguration(format!("redirect uri host: {err}")))?;
    if !bind_addr.ip().is_loopback() {
        return Err(AuthError::InvalidConfiguration(
            "redirect uri must point at a loopback address".to_string(),
        ));
    }

    Ok(CallbackTarget {
        bind_addr,
        path: url.path().to_string(),
    })
}

/// Serves `path` on `listener` until the first request arrives or the
/// timeout elapses. The listener is shut down either way.
pub async fn wait_for_callback(
    listener: TcpListener,
    path: &str,
    timeout: Duration,
) -> Result<CallbackParams, AuthError> {
    let (callback_tx, callback_rx) = oneshot::channel::<CallbackParams>();
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let app = Router::new()
        .route(path, get(oauth_callback_handler))
        .with_state(CallbackState {
            sender: Arc::new(Mutex::new(Some(callback_tx))),
        });

    let server_task = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await
    });

    let outcome = match tokio::time::timeout(timeout, callback_rx).await {
        Ok(Ok(params)) => Ok(params),
        Ok(Err(_)) => Err(AuthError::CallbackListener(
            "callback channel closed".to_string(),
        )),
        Err(_) => Err(AuthError::CallbackListener(
            "timed out waiting for the sign-in callback".to_string(),
        )),
    };

    let _ = shutdown_tx.send(());
    match server_task.await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => debug!(error = %err, "callback listener stopped with an error"),
        Err(err) => debug!(error = %err, "callback listener task failed"),
    }

    outcome
}

/// The state token is checked before anything else the provider sent back.
pub fn validate_callback(expected_state: &str, params: CallbackParams) -> Result<String, AuthError> {
    if params.state.as_deref() != Some(expected_state) {
        return Err(AuthError::StateMismatch);
    }

    if let Some(error) = params.error {
        return Err(AuthError::ConsentDenied(
            params.error_description.unwrap_or(error),
        ));
    }

    params
        .code
        .filter(|code| !code.trim().is_empty())
        .ok_or(AuthError::MissingCode)
}

async fn oauth_callback_handler(
    State(state): State<CallbackState>,
    Query(params): Query<CallbackParams>,
) -> Html<&'static str> {
    let page = if params.code.is_some() && params.error.is_none() {
        SIGNED_IN_PAGE
    } else {
        SIGN_IN_FAILED_PAGE
    };

    let sender = state
        .sender
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .take();
    if let Some(sender) = sender {
        let _ = sender.send(params);
    }

    Html(page)
}
