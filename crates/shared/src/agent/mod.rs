use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

use crate::models::{
    AgentFeedbackResponse, AgentRunResponse, ProposalAction, UploadFile, UploadResponse,
};

mod client;

pub use client::AgentHttpClient;

pub const AGENT_PATH_RUN: &str = "/agent/run";
pub const AGENT_PATH_FEEDBACK: &str = "/agent/feedback";
pub const AGENT_PATH_UPLOAD: &str = "/upload";

pub type AgentFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, AgentApiError>> + Send + 'a>>;

/// Every failure collapses to "the request failed"; the variants only carry
/// detail for logs.
#[derive(Debug, Error)]
pub enum AgentApiError {
    #[error("agent request failed: transport unavailable: {0}")]
    Transport(String),
    #[error("agent request failed: status={0}")]
    Status(u16),
    #[error("agent request failed: invalid response body: {0}")]
    InvalidResponse(String),
    #[error("agent request failed: could not build request: {0}")]
    InvalidRequest(String),
}

/// The three operations the backend agent service exposes to the chat client.
pub trait AgentApi: Send + Sync {
    fn run_agent<'a>(
        &'a self,
        query: &'a str,
        access_token: Option<&'a str>,
    ) -> AgentFuture<'a, AgentRunResponse>;

    fn send_feedback<'a>(
        &'a self,
        thread_id: &'a str,
        action: &'a ProposalAction,
        access_token: Option<&'a str>,
    ) -> AgentFuture<'a, AgentFeedbackResponse>;

    fn upload_file<'a>(
        &'a self,
        file: UploadFile,
        access_token: Option<&'a str>,
    ) -> AgentFuture<'a, UploadResponse>;
}
