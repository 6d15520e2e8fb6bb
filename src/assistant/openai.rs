//! `OpenAI` Assistants v2 HTTP client.
//!
//! Implements [`AssistantService`] against `/v1/assistants`, `/v1/threads`
//! and streamed `/v1/threads/{id}/runs`.

use futures::StreamExt;
use reqwest::Method;
use serde::Deserialize;
use tracing::debug;

use super::sse::{RunSignal, SseDecoder, parse_run_event};
use super::{
    AssistantError, AssistantInfo, AssistantService, RunRequest, RunStream, ThreadId,
};
use crate::config::ChatSettings;
use crate::session::Role;

/// Driver for the `OpenAI` Assistants API.
#[derive(Clone)]
pub struct OpenAiAssistants {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl std::fmt::Debug for OpenAiAssistants {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiAssistants")
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[derive(Deserialize)]
struct ThreadObject {
    id: String,
}

impl OpenAiAssistants {
    #[must_use]
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    #[must_use]
    pub fn from_settings(settings: &ChatSettings) -> Self {
        Self::new(settings.base_url.clone(), settings.api_key.clone())
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/v1/{path}", self.base_url.trim_end_matches('/'));
        self.http
            .request(method, url)
            .bearer_auth(&self.api_key)
            .header("OpenAI-Beta", "assistants=v2")
    }
}

/// Turn a non-2xx response into [`AssistantError::Api`].
async fn check(resp: reqwest::Response) -> Result<reqwest::Response, AssistantError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(ToString::to_string))
        .unwrap_or(body);

    Err(AssistantError::Api {
        status: status.as_u16(),
        message,
    })
}

#[async_trait::async_trait]
impl AssistantService for OpenAiAssistants {
    async fn describe(&self, assistant_id: &str) -> Result<AssistantInfo, AssistantError> {
        let resp = self
            .request(Method::GET, &format!("assistants/{assistant_id}"))
            .send()
            .await?;
        Ok(check(resp).await?.json().await?)
    }

    async fn create_thread(&self) -> Result<ThreadId, AssistantError> {
        let resp = self
            .request(Method::POST, "threads")
            .json(&serde_json::json!({}))
            .send()
            .await?;
        let thread: ThreadObject = check(resp).await?.json().await?;
        debug!(thread_id = %thread.id, "Thread created");
        Ok(ThreadId::from(thread.id))
    }

    async fn post_message(
        &self,
        thread_id: &ThreadId,
        role: Role,
        content: &str,
    ) -> Result<(), AssistantError> {
        let resp = self
            .request(Method::POST, &format!("threads/{thread_id}/messages"))
            .json(&serde_json::json!({
                "role": role,
                "content": content,
            }))
            .send()
            .await?;
        check(resp).await?;
        Ok(())
    }

    async fn stream_run(&self, run: RunRequest) -> Result<RunStream, AssistantError> {
        let mut body = serde_json::json!({
            "assistant_id": run.assistant_id,
            "model": run.model,
            "stream": true,
        });
        if let Some(instructions) = &run.instructions {
            body["instructions"] = serde_json::Value::String(instructions.clone());
        }

        let resp = self
            .request(Method::POST, &format!("threads/{}/runs", run.thread_id))
            .json(&body)
            .send()
            .await?;
        let byte_stream = check(resp).await?.bytes_stream();

        let out = async_stream::try_stream! {
            let mut decoder = SseDecoder::default();

            futures::pin_mut!(byte_stream);
            'read: while let Some(chunk) = byte_stream.next().await {
                let chunk = chunk.map_err(AssistantError::from)?;
                for frame in decoder.push(&chunk) {
                    match parse_run_event(&frame)? {
                        RunSignal::Event(event) => yield event,
                        RunSignal::Ignore => {}
                        RunSignal::End => break 'read,
                    }
                }
            }
        };

        Ok(Box::pin(out))
    }
}
