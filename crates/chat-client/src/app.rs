use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use shared::agent::AgentApi;
use shared::auth::{GoogleOAuthClient, SessionProvider};
use shared::conversation::ConversationStore;
use shared::models::{ProposalAction, UploadFile};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, Lines};
use tracing::{error, info, warn};

use crate::input::{Command, InputBuffer, parse_submission};
use crate::login::{CALLBACK_TIMEOUT, begin_sign_in};
use crate::render;

const INDICATOR_INTERVAL: Duration = Duration::from_millis(400);
const PROMPT: &str = "> ";
const CONTINUATION_PROMPT: &str = "… ";

#[derive(Debug, Error)]
pub enum AppError {
    #[error("terminal io failed: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

/// The interactive chat loop. Reads submissions from `input`, drives the
/// conversation store and writes the transcript to `output`.
pub struct ChatApp<W> {
    api: Arc<dyn AgentApi>,
    store: Arc<ConversationStore>,
    sessions: SessionProvider,
    oauth: Option<GoogleOAuthClient>,
    output: W,
    width: usize,
    rendered: usize,
    sign_in_timeout: Duration,
}

impl<W> ChatApp<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(
        api: Arc<dyn AgentApi>,
        sessions: SessionProvider,
        oauth: Option<GoogleOAuthClient>,
        output: W,
    ) -> Self {
        let store = Arc::new(ConversationStore::new(Arc::clone(&api)));
        Self {
            api,
            store,
            sessions,
            oauth,
            output,
            width: render::DEFAULT_WIDTH,
            rendered: 0,
            sign_in_timeout: CALLBACK_TIMEOUT,
        }
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    pub fn into_output(self) -> W {
        self.output
    }

    pub async fn run<R>(&mut self, input: R) -> Result<(), AppError>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();
        let mut buffer = InputBuffer::default();

        self.write(&render::render_header(self.width)).await?;
        self.write(&render::render_sidebar(self.sessions.current()))
            .await?;
        self.write("Type /help for commands.\n\n").await?;

        loop {
            let prompt = if buffer.is_continuing() {
                CONTINUATION_PROMPT
            } else {
                PROMPT
            };
            self.write(prompt).await?;

            let Some(line) = lines.next_line().await? else {
                break;
            };
            let Some(submission) = buffer.push_line(&line) else {
                continue;
            };

            let command = match parse_submission(&submission) {
                Ok(Some(command)) => command,
                Ok(None) => continue,
                Err(err) => {
                    self.write(&format!("{err}\n")).await?;
                    continue;
                }
            };

            if self.dispatch(command, &mut lines).await? == Flow::Quit {
                break;
            }
        }

        info!("chat session ended");
        Ok(())
    }

    async fn dispatch<R>(&mut self, command: Command, lines: &mut Lines<R>) -> Result<Flow, AppError>
    where
        R: AsyncBufRead + Unpin,
    {
        match command {
            Command::Send(text) => {
                let store = Arc::clone(&self.store);
                let token = self.access_token();
                self.with_indicator(store.send(&text, token.as_deref()))
                    .await?;
                self.flush_transcript().await?;
            }
            Command::Approve => self.act(Some(ProposalAction::Commit)).await?,
            Command::Modify(Some(feedback)) => {
                self.act(ProposalAction::update(feedback)).await?;
            }
            Command::Modify(None) => {
                if self.store.latest_actionable_proposal().is_none() {
                    self.write("There is no plan waiting for approval.\n")
                        .await?;
                    return Ok(Flow::Continue);
                }
                self.write("What should change? ").await?;
                let feedback = lines.next_line().await?.unwrap_or_default();
                self.act(ProposalAction::update(feedback)).await?;
            }
            Command::Attach(path) => self.attach(&path).await?,
            Command::SignIn => self.sign_in().await?,
            Command::SignOut => {
                if self.sessions.sign_out().is_some() {
                    info!("signed out");
                    self.write("Signed out.\n").await?;
                } else {
                    self.write("Not signed in.\n").await?;
                }
            }
            Command::Sidebar => {
                self.write(&render::render_sidebar(self.sessions.current()))
                    .await?;
            }
            Command::Help => self.write(&render::render_help()).await?,
            Command::Quit => return Ok(Flow::Quit),
        }

        Ok(Flow::Continue)
    }

    /// `None` means the user gave blank feedback; nothing is sent.
    async fn act(&mut self, action: Option<ProposalAction>) -> Result<(), AppError> {
        let Some(action) = action else {
            self.write("No feedback given; the plan is unchanged.\n")
                .await?;
            return Ok(());
        };
        let Some(proposal) = self.store.latest_actionable_proposal() else {
            self.write("There is no plan waiting for approval.\n")
                .await?;
            return Ok(());
        };
        let Some(thread_id) = proposal.actionable_thread().map(ToString::to_string) else {
            return Ok(());
        };

        let store = Arc::clone(&self.store);
        let token = self.access_token();
        self.with_indicator(store.act(&thread_id, &action, token.as_deref()))
            .await?;
        self.flush_transcript().await
    }

    async fn attach(&mut self, path: &Path) -> Result<(), AppError> {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to read attachment");
                self.write(&format!("Could not read {}: {err}\n", path.display()))
                    .await?;
                return Ok(());
            }
        };

        let api = Arc::clone(&self.api);
        let token = self.access_token();
        self.write(&format!("Uploading {file_name}...\n")).await?;
        match api
            .upload_file(UploadFile::pdf(file_name.clone(), bytes), token.as_deref())
            .await
        {
            Ok(_) => info!(file_name = %file_name, "document uploaded"),
            Err(err) => error!(file_name = %file_name, error = %err, "document upload failed"),
        }
        Ok(())
    }

    async fn sign_in(&mut self) -> Result<(), AppError> {
        let Some(oauth) = self.oauth.clone() else {
            self.write(
                "Google sign-in is not configured. Set GOOGLE_CLIENT_ID and GOOGLE_CLIENT_SECRET.\n",
            )
            .await?;
            return Ok(());
        };

        let pending = match begin_sign_in(&oauth).await {
            Ok(pending) => pending,
            Err(err) => {
                error!(error = %err, "google sign-in could not start");
                self.write("Sign-in failed. You are still signed out.\n")
                    .await?;
                return Ok(());
            }
        };

        self.write(&format!(
            "Open this link in your browser to sign in with Google:\n\n  {}\n\n",
            pending.authorization_url()
        ))
        .await?;
        if let Ok(addr) = pending.local_addr() {
            self.write(&format!("Waiting for the sign-in callback on {addr}...\n"))
                .await?;
        }

        match pending.finish(&oauth, self.sign_in_timeout).await {
            Ok(session) => {
                let greeting = format!("Signed in as {}.\n", session.display_name());
                self.sessions.sign_in(session);
                self.write(&greeting).await?;
            }
            Err(err) => {
                error!(error = %err, "google sign-in failed");
                self.write("Sign-in failed. You are still signed out.\n")
                    .await?;
            }
        }
        Ok(())
    }

    /// Polls `operation` to completion, printing new transcript entries and a
    /// thinking indicator while the store reports loading.
    async fn with_indicator<F>(&mut self, operation: F) -> Result<F::Output, AppError>
    where
        F: Future,
    {
        tokio::pin!(operation);
        let mut ticker = tokio::time::interval(INDICATOR_INTERVAL);
        let mut frame = 0usize;
        let mut indicator_shown = false;

        let output = loop {
            tokio::select! {
                biased;
                output = &mut operation => break output,
                _ = ticker.tick() => {
                    let loading = self.store.is_loading();
                    if indicator_shown {
                        if loading {
                            let indicator = render::render_thinking_indicator(frame);
                            self.write(&format!("\r{indicator}")).await?;
                        }
                    } else {
                        self.flush_messages(loading.then_some(frame)).await?;
                        indicator_shown = loading;
                    }
                    if loading {
                        frame += 1;
                    }
                }
            }
        };

        if indicator_shown {
            self.write(&format!("\r{:width$}\r", "", width = 12)).await?;
        }
        Ok(output)
    }

    async fn flush_transcript(&mut self) -> Result<(), AppError> {
        self.flush_messages(None).await
    }

    async fn flush_messages(&mut self, thinking: Option<usize>) -> Result<(), AppError> {
        let fresh = self.store.messages_since(self.rendered);
        self.rendered += fresh.len();
        if fresh.is_empty() && thinking.is_none() {
            return Ok(());
        }
        self.write(&render::render_message_list(&fresh, thinking, self.width))
            .await
    }

    fn access_token(&self) -> Option<String> {
        self.sessions.access_token().map(ToString::to_string)
    }

    async fn write(&mut self, text: &str) -> Result<(), AppError> {
        self.output.write_all(text.as_bytes()).await?;
        self.output.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Arc;
    use std::time::Duration;

    use shared::agent::{AgentApi, AgentApiError, AgentFuture};
    use shared::auth::{GoogleOAuthClient, Session, SessionProvider};
    use shared::config::{GOOGLE_SIGN_IN_SCOPES, GoogleOAuthConfig};
    use shared::conversation::Message;
    use shared::models::{
        AgentFeedbackResponse, AgentRunResponse, AgentStatus, PlanItem, ProposalAction,
        UploadFile, UploadResponse,
    };
    use tokio::sync::Mutex;

    use super::ChatApp;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Run {
            query: String,
            token: Option<String>,
        },
        Feedback {
            thread_id: String,
            action: ProposalAction,
        },
        Upload {
            file_name: String,
            token: Option<String>,
        },
    }

    #[derive(Default)]
    struct FakeAgent {
        runs: Mutex<VecDeque<Result<AgentRunResponse, AgentApiError>>>,
        feedback: Mutex<VecDeque<Result<AgentFeedbackResponse, AgentApiError>>>,
        calls: Mutex<Vec<Call>>,
    }

    impl AgentApi for FakeAgent {
        fn run_agent<'a>(
            &'a self,
            query: &'a str,
            access_token: Option<&'a str>,
        ) -> AgentFuture<'a, AgentRunResponse> {
            Box::pin(async move {
                self.calls.lock().await.push(Call::Run {
                    query: query.to_string(),
                    token: access_token.map(ToString::to_string),
                });
                self.runs
                    .lock()
                    .await
                    .pop_front()
                    .unwrap_or(Err(AgentApiError::Status(500)))
            })
        }

        fn send_feedback<'a>(
            &'a self,
            thread_id: &'a str,
            action: &'a ProposalAction,
            _access_token: Option<&'a str>,
        ) -> AgentFuture<'a, AgentFeedbackResponse> {
            Box::pin(async move {
                self.calls.lock().await.push(Call::Feedback {
                    thread_id: thread_id.to_string(),
                    action: action.clone(),
                });
                self.feedback
                    .lock()
                    .await
                    .pop_front()
                    .unwrap_or(Err(AgentApiError::Status(500)))
            })
        }

        fn upload_file<'a>(
            &'a self,
            file: UploadFile,
            access_token: Option<&'a str>,
        ) -> AgentFuture<'a, UploadResponse> {
            Box::pin(async move {
                self.calls.lock().await.push(Call::Upload {
                    file_name: file.file_name,
                    token: access_token.map(ToString::to_string),
                });
                Ok(serde_json::json!({ "status": "ok" }))
            })
        }
    }

    fn paused_plan() -> AgentRunResponse {
        AgentRunResponse {
            message: Some("Here's a plan".to_string()),
            status: Some(AgentStatus::Paused),
            roadmap: Some(vec![PlanItem::new("Cell Biology", 3.0)]),
            thread_id: Some("t1".to_string()),
            ..AgentRunResponse::default()
        }
    }

    async fn run_session(
        agent: Arc<FakeAgent>,
        sessions: SessionProvider,
        script: &str,
    ) -> (Vec<Message>, String) {
        let mut app = ChatApp::new(agent, sessions, None, Vec::new());
        app.run(script.as_bytes()).await.expect("session should run");
        let messages = app.store().snapshot().messages;
        let output = String::from_utf8(app.into_output()).expect("output should be utf-8");
        (messages, output)
    }

    #[tokio::test]
    async fn message_then_approve_commits_the_proposed_plan() {
        let agent = Arc::new(FakeAgent::default());
        agent.runs.lock().await.push_back(Ok(paused_plan()));
        agent
            .feedback
            .lock()
            .await
            .push_back(Ok(AgentFeedbackResponse {
                message: Some("Scheduled!".to_string()),
                status: Some(AgentStatus::Completed),
                ..AgentFeedbackResponse::default()
            }));

        let (messages, output) = run_session(
            Arc::clone(&agent),
            SessionProvider::new(Some(Session::from_access_token("ya29.token"))),
            "plan my biology exam study\n/approve\n/quit\n",
        )
        .await;

        assert_eq!(messages.len(), 3);
        assert!(messages[1].as_proposal().is_some());
        assert_eq!(messages[2].content(), "Scheduled!");
        assert!(output.contains("Proposed Study Plan"));
        assert!(output.contains("Scheduled!"));

        let calls = agent.calls.lock().await.clone();
        assert_eq!(
            calls,
            vec![
                Call::Run {
                    query: "plan my biology exam study".to_string(),
                    token: Some("ya29.token".to_string()),
                },
                Call::Feedback {
                    thread_id: "t1".to_string(),
                    action: ProposalAction::Commit,
                },
            ]
        );
    }

    #[tokio::test]
    async fn modify_prompts_for_feedback_and_skips_blank_answers() {
        let agent = Arc::new(FakeAgent::default());
        agent.runs.lock().await.push_back(Ok(paused_plan()));
        agent
            .feedback
            .lock()
            .await
            .push_back(Ok(AgentFeedbackResponse {
                message: Some("Updated plan".to_string()),
                status: Some(AgentStatus::Paused),
                roadmap: Some(vec![PlanItem::new("Cell Biology", 2.0)]),
                ..AgentFeedbackResponse::default()
            }));

        let (messages, output) = run_session(
            Arc::clone(&agent),
            SessionProvider::default(),
            "plan my week\n/modify\n   \n/modify\n  fewer hours \n",
        )
        .await;

        assert!(output.contains("No feedback given"));
        assert_eq!(messages.len(), 3);
        assert_eq!(
            messages[2]
                .as_proposal()
                .and_then(|proposal| proposal.actionable_thread()),
            Some("t1")
        );

        let calls = agent.calls.lock().await.clone();
        assert_eq!(calls.len(), 2);
        assert_eq!(
            calls[1],
            Call::Feedback {
                thread_id: "t1".to_string(),
                action: ProposalAction::update("  fewer hours ").expect("feedback is non-empty"),
            }
        );
    }

    #[tokio::test]
    async fn approve_without_a_proposal_sends_nothing() {
        let agent = Arc::new(FakeAgent::default());

        let (messages, output) =
            run_session(Arc::clone(&agent), SessionProvider::default(), "/approve\n").await;

        assert!(messages.is_empty());
        assert!(output.contains("There is no plan waiting for approval."));
        assert!(agent.calls.lock().await.is_empty());
    }

    #[tokio::test]
    async fn failed_run_shows_the_apology() {
        let agent = Arc::new(FakeAgent::default());

        let (messages, output) =
            run_session(Arc::clone(&agent), SessionProvider::default(), "hello\n").await;

        assert_eq!(messages.len(), 2);
        assert!(output.contains("Sorry, something went wrong."));
    }

    #[tokio::test]
    async fn continued_lines_are_sent_as_one_message() {
        let agent = Arc::new(FakeAgent::default());
        agent.runs.lock().await.push_back(Ok(AgentRunResponse {
            message: Some("ok".to_string()),
            ..AgentRunResponse::default()
        }));

        let (messages, _) = run_session(
            Arc::clone(&agent),
            SessionProvider::default(),
            "first line\\\nsecond line\n",
        )
        .await;

        assert_eq!(messages[0].content(), "first line\nsecond line");
    }

    #[tokio::test]
    async fn attach_uploads_pdf_with_bearer_token_and_leaves_transcript_alone() {
        let dir = std::env::temp_dir().join(format!("aegis-attach-{}", uuid_suffix()));
        tokio::fs::create_dir_all(&dir)
            .await
            .expect("temp dir should be created");
        let path = dir.join("notes.pdf");
        tokio::fs::write(&path, b"%PDF-1.4 test")
            .await
            .expect("pdf should be written");

        let agent = Arc::new(FakeAgent::default());
        let (messages, _) = run_session(
            Arc::clone(&agent),
            SessionProvider::new(Some(Session::from_access_token("ya29.token"))),
            &format!("/attach {}\n", path.display()),
        )
        .await;

        let _ = tokio::fs::remove_dir_all(&dir).await;

        assert!(messages.is_empty());
        assert_eq!(
            agent.calls.lock().await.clone(),
            vec![Call::Upload {
                file_name: "notes.pdf".to_string(),
                token: Some("ya29.token".to_string()),
            }]
        );
    }

    #[tokio::test]
    async fn sign_in_without_configuration_and_sign_out_report_state() {
        let agent = Arc::new(FakeAgent::default());

        let (_, output) = run_session(
            agent,
            SessionProvider::new(Some(Session::from_access_token("ya29.token"))),
            "/login\n/logout\n/logout\n/sidebar\n",
        )
        .await;

        assert!(output.contains("Google sign-in is not configured"));
        assert!(output.contains("Signed out."));
        assert!(output.contains("Not signed in.\n"));
        assert!(output.contains("Not signed in  (/login)"));
    }

    fn uuid_suffix() -> String {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|elapsed| elapsed.as_nanos().to_string())
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn sign_in_writes_the_consent_url_to_the_transcript_output() {
        let oauth = GoogleOAuthClient::new(
            GoogleOAuthConfig {
                client_id: "client-id".to_string(),
                client_secret: "client-secret".to_string(),
                redirect_uri: "http://127.0.0.1:0/callback".to_string(),
                auth_url: "https://accounts.example.com/o/oauth2/v2/auth".to_string(),
                token_url: "http://127.0.0.1:9/token".to_string(),
                userinfo_url: "http://127.0.0.1:9/userinfo".to_string(),
                scopes: GOOGLE_SIGN_IN_SCOPES
                    .iter()
                    .map(|scope| (*scope).to_string())
                    .collect(),
            },
            reqwest::Client::new(),
        );
        let mut app = ChatApp::new(
            Arc::new(FakeAgent::default()),
            SessionProvider::default(),
            Some(oauth),
            Vec::new(),
        );
        app.sign_in_timeout = Duration::from_millis(50);

        app.run("/login\n".as_bytes())
            .await
            .expect("session should run");
        let output = String::from_utf8(app.into_output()).expect("output should be utf-8");

        assert!(
            output.contains("https://accounts.example.com/o/oauth2/v2/auth?client_id=client-id"),
            "{output}"
        );
        assert!(output.contains("state=st_"));
        assert!(output.contains("Sign-in failed. You are still signed out."));
    }
}
