use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{error, warn};
use uuid::Uuid;

use crate::agent::AgentApi;
use crate::models::{AgentStatus, PlanItem, ProposalAction};


pub const APOLOGY_MESSAGE: &str = "Sorry, something went wrong.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserMessage {
    pub id: Uuid,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssistantTextMessage {
    pub id: Uuid,
    pub content: String,
    pub status: Option<AgentStatus>,
    pub thread_id: Option<String>,
    pub plan: Vec<PlanItem>,
}

/// The backend paused on this thread and is waiting for approval.
#[derive(Debug, Clone, PartialEq)]
pub struct AssistantProposalMessage {
    pub id: Uuid,
    pub content: String,
    pub thread_id: Option<String>,
    pub plan: Vec<PlanItem>,
}

impl AssistantProposalMessage {
    pub fn actionable_thread(&self) -> Option<&str> {
        self.thread_id.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    User(UserMessage),
    AssistantText(AssistantTextMessage),
    AssistantProposal(AssistantProposalMessage),
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self::User(UserMessage {
            id: Uuid::new_v4(),
            content: content.into(),
        })
    }

    pub fn apology() -> Self {
        Self::AssistantText(AssistantTextMessage {
            id: Uuid::new_v4(),
            content: APOLOGY_MESSAGE.to_string(),
            status: None,
            thread_id: None,
            plan: Vec::new(),
        })
    }

    /// A paused status turns the reply into a proposal; anything else is text.
    pub fn assistant(
        content: String,
        status: Option<AgentStatus>,
        thread_id: Option<String>,
        plan: Vec<PlanItem>,
    ) -> Self {
        let id = Uuid::new_v4();
        let thread_id = thread_id.filter(|thread_id| !thread_id.trim().is_empty());

        match status {
            Some(AgentStatus::Paused) => Self::AssistantProposal(AssistantProposalMessage {
                id,
                content,
                thread_id,
                plan,
            }),
            status => Self::AssistantText(AssistantTextMessage {
                id,
                content,
                status,
                thread_id,
                plan,
            }),
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            Self::User(message) => message.id,
            Self::AssistantText(message) => message.id,
            Self::AssistantProposal(message) => message.id,
        }
    }

    pub fn role(&self) -> Role {
        match self {
            Self::User(_) => Role::User,
            Self::AssistantText(_) | Self::AssistantProposal(_) => Role::Assistant,
        }
    }

    pub fn content(&self) -> &str {
        match self {
            Self::User(message) => &message.content,
            Self::AssistantText(message) => &message.content,
            Self::AssistantProposal(message) => &message.content,
        }
    }

    pub fn thread_id(&self) -> Option<&str> {
        match self {
            Self::User(_) => None,
            Self::AssistantText(message) => message.thread_id.as_deref(),
            Self::AssistantProposal(message) => message.thread_id.as_deref(),
        }
    }

    pub fn status(&self) -> Option<AgentStatus> {
        match self {
            Self::User(_) => None,
            Self::AssistantText(message) => message.status,
            Self::AssistantProposal(_) => Some(AgentStatus::Paused),
        }
    }

    pub fn as_proposal(&self) -> Option<&AssistantProposalMessage> {
        match self {
            Self::AssistantProposal(message) => Some(message),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversationSnapshot {
    pub messages: Vec<Message>,
    pub loading: bool,
}

#[derive(Debug, Default)]
struct ConversationState {
    messages: Vec<Message>,
    in_flight: usize,
}

/// Ordered transcript plus the loading flag. Every operation takes the
/// caller's bearer token explicitly; the store never reads session state.
///
/// Concurrent calls are not serialised. Loading stays raised while any call
/// is outstanding.
pub struct ConversationStore {
    api: Arc<dyn AgentApi>,
    state: Mutex<ConversationState>,
}

impl ConversationStore {
    pub fn new(api: Arc<dyn AgentApi>) -> Self {
        Self {
            api,
            state: Mutex::new(ConversationState::default()),
        }
    }

    pub async fn send(&self, text: &str, access_token: Option<&str>) -> Option<Message> {
        if text.trim().is_empty() {
            return None;
        }

        self.append(Message::user(text));
        let _loading = LoadingGuard::enter(self);

        let reply = match self.api.run_agent(text, access_token).await {
            Ok(response) => {
                let content = response.content();
                Message::assistant(
                    content,
                    response.status,
                    response.thread_id,
                    response.roadmap.unwrap_or_default(),
                )
            }
            Err(err) => {
                error!(error = %err, "agent run failed");
                Message::apology()
            }
        };

        self.append(reply.clone());
        Some(reply)
    }

    /// Appends the backend's answer as a new message; the proposal that was
    /// acted on is left as it was. Failures are logged only.
    pub async fn act(
        &self,
        thread_id: &str,
        action: &ProposalAction,
        access_token: Option<&str>,
    ) -> Option<Message> {
        if thread_id.trim().is_empty() {
            warn!(action = action.as_str(), "ignoring proposal action without a thread id");
            return None;
        }

        let _loading = LoadingGuard::enter(self);

        match self.api.send_feedback(thread_id, action, access_token).await {
            Ok(response) => {
                let reply = Message::assistant(
                    response.content(),
                    response.status,
                    Some(thread_id.to_string()),
                    response.plan(),
                );
                self.append(reply.clone());
                Some(reply)
            }
            Err(err) => {
                error!(
                    error = %err,
                    thread_id,
                    action = action.as_str(),
                    "agent feedback failed"
                );
                None
            }
        }
    }

    pub fn snapshot(&self) -> ConversationSnapshot {
        let state = self.lock_state();
        ConversationSnapshot {
            messages: state.messages.clone(),
            loading: state.in_flight > 0,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.lock_state().in_flight > 0
    }

    pub fn message_count(&self) -> usize {
        self.lock_state().messages.len()
    }

    pub fn messages_since(&self, index: usize) -> Vec<Message> {
        let state = self.lock_state();
        state.messages.iter().skip(index).cloned().collect()
    }

    pub fn latest_actionable_proposal(&self) -> Option<AssistantProposalMessage> {
        let state = self.lock_state();
        state
            .messages
            .iter()
            .rev()
            .filter_map(Message::as_proposal)
            .find(|proposal| proposal.actionable_thread().is_some())
            .cloned()
    }

    fn append(&self, message: Message) {
        self.lock_state().messages.push(message);
    }

    fn lock_state(&self) -> MutexGuard<'_, ConversationState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Raises the loading flag for its lifetime, so the flag drops on every exit
/// path including a cancelled future.
struct LoadingGuard<'a> {
    store: &'a ConversationStore,
}

impl<'a> LoadingGuard<'a> {
    fn enter(store: &'a ConversationStore) -> Self {
        store.lock_state().in_flight += 1;
        Self { store }
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.store.lock_state();
        state.in_flight = state.in_flight.saturating_sub(1);
    }
}
