//! OpenAI Chat Completions backend (also serves Azure deployments and
//! OpenAI-compatible local servers).

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::error::ColloquyError;

use super::http::{azure_headers, bearer_headers, shared_client, status_to_error};
use super::{ChatBackend, ChatRequest, ChatResponse, Usage};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub struct OpenAiChatBackend {
    model: String,
    api_key: String,
    url: String,
    azure: bool,
    timeout: Option<Duration>,
}

impl OpenAiChatBackend {
    pub fn new(model: String, api_key: String, base_url: Option<String>) -> Self {
        let base_url = base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self {
            url: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            model,
            api_key,
            azure: false,
            timeout: None,
        }
    }

    /// Azure OpenAI deployment.
    /// `endpoint`: e.g., "https://myresource.openai.azure.com"
    /// `deployment`: e.g., "gpt-4"
    /// `api_version`: e.g., "2023-05-15"
    pub fn azure(endpoint: String, deployment: String, api_key: String, api_version: String) -> Self {
        let url = format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            endpoint.trim_end_matches('/'),
            deployment,
            api_version
        );
        Self {
            model: deployment,
            api_key,
            url,
            azure: true,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Full request URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    fn build_request_body(&self, request: &ChatRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "messages": request.messages,
        });

        if let Some(obj) = body.as_object_mut() {
            // Azure routes by deployment in the URL.
            if !self.azure {
                obj.insert("model".into(), self.model.clone().into());
            }
            if let Some(max) = request.max_tokens {
                obj.insert("max_tokens".into(), max.into());
            }
            if let Some(temp) = request.temperature {
                obj.insert("temperature".into(), temp.into());
            }
            if let Some(seed) = request.seed {
                obj.insert("seed".into(), seed.into());
            }
            if let Some(ref stops) = request.stop {
                obj.insert("stop".into(), serde_json::json!(stops));
            }
        }

        body
    }
}

#[async_trait]
impl ChatBackend for OpenAiChatBackend {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, ColloquyError> {
        let body = self.build_request_body(request);
        let headers = if self.azure {
            azure_headers(&self.api_key)
        } else {
            bearer_headers(&self.api_key)
        };

        debug!(model = %self.model, messages = request.messages.len(), "chat completion");

        let mut builder = shared_client().post(&self.url).headers(headers).json(&body);
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        let resp = builder.send().await?;

        let status = resp.status().as_u16();
        if !(200..300).contains(&status) {
            let body_text = resp.text().await.unwrap_or_default();
            return Err(status_to_error(status, &body_text));
        }

        let data: OpenAiChatResponse = resp.json().await?;
        let choice = data
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ColloquyError::api(status, "No choices in chat completion response"))?;

        Ok(ChatResponse {
            content: choice.message.content.unwrap_or_default(),
            usage: data.usage.map(Usage::from).unwrap_or_default(),
            finish_reason: choice.finish_reason,
        })
    }
}

// Chat Completions response types (internal)

#[derive(Deserialize)]
struct OpenAiChatResponse {
    choices: Vec<OpenAiChoice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct OpenAiMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
pub(super) struct OpenAiUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

impl From<OpenAiUsage> for Usage {
    fn from(u: OpenAiUsage) -> Self {
        Usage {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        }
    }
}
