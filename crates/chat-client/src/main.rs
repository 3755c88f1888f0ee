mod app;
mod cli;
mod input;
mod login;
mod render;

use std::sync::Arc;

use app::ChatApp;
use cli::{CliError, CliOptions};
use shared::agent::{AgentApi, AgentHttpClient};
use shared::auth::{GoogleOAuthClient, Session, SessionProvider};
use shared::config::{ClientConfig, ConfigError, GoogleOAuthConfig, load_dotenv};
use tokio::io::BufReader;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "aegis=info,shared=info";

#[tokio::main]
async fn main() {
    let dotenv_result = load_dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_writer(std::io::stderr)
        .init();

    match dotenv_result {
        Ok(Some(path)) => debug!(path = %path.display(), "loaded .env"),
        Ok(None) => {}
        Err(err) => warn!("{err}"),
    }

    let options = match CliOptions::parse(std::env::args().skip(1)) {
        Ok(options) => options,
        Err(CliError::HelpRequested) => {
            print_usage();
            std::process::exit(0);
        }
        Err(err) => {
            eprintln!("error: {err}");
            eprintln!();
            print_usage();
            std::process::exit(2);
        }
    };

    let config = match client_config(&options) {
        Ok(config) => config,
        Err(err) => {
            error!("failed to read client config: {err}");
            std::process::exit(1);
        }
    };

    let http_client = reqwest::Client::new();
    let api: Arc<dyn AgentApi> = Arc::new(AgentHttpClient::from_config(
        &config,
        http_client.clone(),
    ));
    let oauth = google_oauth_client(http_client);
    let sessions = SessionProvider::new(options.access_token.map(Session::from_access_token));

    info!(api_url = %config.api_url, signed_in = sessions.is_signed_in(), "aegis chat starting");

    let mut app = ChatApp::new(api, sessions, oauth, tokio::io::stdout());
    if let Err(err) = app.run(BufReader::new(tokio::io::stdin())).await {
        error!("chat session failed: {err}");
        std::process::exit(1);
    }
}

fn client_config(options: &CliOptions) -> Result<ClientConfig, ConfigError> {
    let config = ClientConfig::from_env()?;
    match options.api_url.as_deref() {
        Some(api_url) => config.with_api_url(api_url),
        None => Ok(config),
    }
}

fn google_oauth_client(http_client: reqwest::Client) -> Option<GoogleOAuthClient> {
    match GoogleOAuthConfig::from_env() {
        Ok(config) => Some(GoogleOAuthClient::new(config, http_client)),
        Err(ConfigError::MissingVar(var)) => {
            info!("google sign-in disabled: {var} is not set");
            None
        }
        Err(err) => {
            warn!("google sign-in disabled: {err}");
            None
        }
    }
}

fn print_usage() {
    eprintln!(
        "Usage: aegis [--api-url <url>] [--access-token <token>]\n\
         \n\
         Chat with the Aegis LifeOS planning agent.\n\
         \n\
         Options:\n\
         - --api-url <url>         Backend base URL (overrides AEGIS_API_URL)\n\
         - --access-token <token>  Start signed in with an existing Google access token\n\
         - --help                  Show this help text"
    );
}
