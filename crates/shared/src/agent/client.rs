use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::{
    AGENT_PATH_FEEDBACK, AGENT_PATH_RUN, AGENT_PATH_UPLOAD, AgentApi, AgentApiError, AgentFuture,
};
use crate::config::ClientConfig;
use crate::models::{
    AgentFeedbackResponse, AgentRunResponse, ProposalAction, UploadFile, UploadResponse,
};

#[derive(Clone)]
pub struct AgentHttpClient {
    base_url: String,
    http_client: reqwest::Client,
}

impl AgentHttpClient {
    pub fn new(base_url: String, http_client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client,
        }
    }

    pub fn from_config(config: &ClientConfig, http_client: reqwest::Client) -> Self {
        Self::new(config.api_url.clone(), http_client)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn post(&self, path: &str, access_token: Option<&str>) -> reqwest::RequestBuilder {
        let request = self.http_client.post(format!("{}{path}", self.base_url));
        match access_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send_and_decode<T>(
        &self,
        path: &'static str,
        request: reqwest::RequestBuilder,
    ) -> Result<T, AgentApiError>
    where
        T: DeserializeOwned,
    {
        let response = request
            .send()
            .await
            .map_err(|err| AgentApiError::Transport(err.to_string()))?;

        let status = response.status();
        debug!(path, status = status.as_u16(), "agent request settled");

        if !status.is_success() {
            return Err(AgentApiError::Status(status.as_u16()));
        }

        response
            .json::<T>()
            .await
            .map_err(|err| AgentApiError::InvalidResponse(err.to_string()))
    }
}

impl AgentApi for AgentHttpClient {
    fn run_agent<'a>(
        &'a self,
        query: &'a str,
        access_token: Option<&'a str>,
    ) -> AgentFuture<'a, AgentRunResponse> {
        Box::pin(async move {
            let request = self
                .post(AGENT_PATH_RUN, access_token)
                .query(&[("query", query)]);
            self.send_and_decode(AGENT_PATH_RUN, request).await
        })
    }

    fn send_feedback<'a>(
        &'a self,
        thread_id: &'a str,
        action: &'a ProposalAction,
        access_token: Option<&'a str>,
    ) -> AgentFuture<'a, AgentFeedbackResponse> {
        Box::pin(async move {
            let mut params = vec![("thread_id", thread_id), ("action", action.as_str())];
            if let Some(feedback) = action.feedback() {
                params.push(("feedback", feedback));
            }

            let request = self
                .post(AGENT_PATH_FEEDBACK, access_token)
                .query(&params);
            self.send_and_decode(AGENT_PATH_FEEDBACK, request).await
        })
    }

    fn upload_file<'a>(
        &'a self,
        file: UploadFile,
        access_token: Option<&'a str>,
    ) -> AgentFuture<'a, UploadResponse> {
        Box::pin(async move {
            let part = Part::bytes(file.bytes)
                .file_name(file.file_name)
                .mime_str(&file.content_type)
                .map_err(|err| AgentApiError::InvalidRequest(err.to_string()))?;
            let form = Form::new().part("file", part);

            let request = self.post(AGENT_PATH_UPLOAD, access_token).multipart(form);
            self.send_and_decode(AGENT_PATH_UPLOAD, request).await
        })
    }
}
