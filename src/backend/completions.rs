//! Raw completions backend for local servers (LM Studio, web UIs).
//!
//! Chat messages are flattened into a single prompt using a [`PromptWrapper`].

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::config::PromptWrapper;
use crate::error::ColloquyError;

use super::http::{shared_client, status_to_error};
use super::openai::OpenAiUsage;
use super::{ChatBackend, ChatMessage, ChatRequest, ChatResponse, ChatRole, Usage};

const CHATML_END: &str = "<|im_end|>";

pub struct CompletionsBackend {
    model: String,
    endpoint: String,
    wrapper: PromptWrapper,
    timeout: Option<Duration>,
}

impl CompletionsBackend {
    pub fn new(model: String, endpoint: String, wrapper: PromptWrapper) -> Self {
        Self {
            model,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            wrapper,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn stop_sequences(&self) -> Vec<String> {
        match self.wrapper {
            PromptWrapper::ChatMl => vec![CHATML_END.to_string()],
        }
    }
}

/// Render chat messages as a single prompt ending with an open assistant turn.
pub fn render_prompt(wrapper: PromptWrapper, messages: &[ChatMessage]) -> String {
    match wrapper {
        PromptWrapper::ChatMl => {
            let mut prompt = String::new();
            for message in messages {
                let role = match message.role {
                    ChatRole::System => "system",
                    ChatRole::User => "user",
                    ChatRole::Assistant => "assistant",
                };
                prompt.push_str("<|im_start|>");
                prompt.push_str(role);
                if let Some(ref name) = message.name {
                    prompt.push(' ');
                    prompt.push_str(name);
                }
                prompt.push('\n');
                prompt.push_str(&message.content);
                prompt.push_str(CHATML_END);
                prompt.push('\n');
            }
            prompt.push_str("<|im_start|>assistant\n");
            prompt
        }
    }
}

#[async_trait]
impl ChatBackend for CompletionsBackend {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, ColloquyError> {
        let mut stop = self.stop_sequences();
        stop.extend(request.stop.iter().flatten().cloned());

        let mut body = serde_json::json!({
            "prompt": render_prompt(self.wrapper, &request.messages),
            "stop": stop,
        });
        if let Some(obj) = body.as_object_mut() {
            if let Some(max) = request.max_tokens {
                obj.insert("max_tokens".into(), max.into());
            }
            if let Some(temp) = request.temperature {
                obj.insert("temperature".into(), temp.into());
            }
            if let Some(seed) = request.seed {
                obj.insert("seed".into(), seed.into());
            }
        }

        let url = format!("{}/v1/completions", self.endpoint);
        debug!(%url, wrapper = %self.wrapper, "local completion");

        let mut builder = shared_client().post(&url).json(&body);
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        let resp = builder.send().await?;

        let status = resp.status().as_u16();
        if !(200..300).contains(&status) {
            let body_text = resp.text().await.unwrap_or_default();
            return Err(status_to_error(status, &body_text));
        }

        let data: CompletionResponse = resp.json().await?;
        let choice = data
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ColloquyError::api(status, "No choices in completion response"))?;

        Ok(ChatResponse {
            content: choice.text.trim().to_string(),
            usage: data.usage.map(Usage::from).unwrap_or_default(),
            finish_reason: choice.finish_reason,
        })
    }
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    text: String,
    finish_reason: Option<String>,
}
