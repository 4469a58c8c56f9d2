//! LLM backends used by assistant-style participants.

pub mod completions;
pub mod http;
pub mod openai;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::{ApiType, EndpointType, LlmConfig, MemoryLlmConfig};
use crate::error::ColloquyError;

/// Role of a chat message on the wire.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// A single chat message sent to a backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
            name: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
            name: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// A completion request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    pub seed: Option<u64>,
    pub stop: Option<Vec<String>>,
}

impl ChatRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }
}

/// Token accounting reported by a backend.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
}

/// A completion result.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatResponse {
    pub content: String,
    pub usage: Usage,
    pub finish_reason: Option<String>,
}

/// Core trait implemented by every LLM backend.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Model identifier this backend serves.
    fn model_id(&self) -> &str;

    /// Generate one completion (non-streaming).
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, ColloquyError>;
}

/// Create a backend for a conventional participant.
pub fn create_backend(config: &LlmConfig) -> Result<Box<dyn ChatBackend>, ColloquyError> {
    let api_key = config
        .api_key
        .clone()
        .ok_or_else(|| ColloquyError::missing(["OAI_OPENAI_KEY_VAR", "OPENAI_API_KEY"]))?;
    let timeout = config.timeout_secs.map(Duration::from_secs);
    let backend = match config.api_type {
        ApiType::OpenAi => {
            openai::OpenAiChatBackend::new(config.model.clone(), api_key, config.base_url.clone())
        }
        ApiType::Azure => {
            let endpoint = config.base_url.clone().ok_or_else(|| {
                ColloquyError::missing(["AZURE_OPENAI_ENDPOINT"])
            })?;
            let version = config
                .api_version
                .clone()
                .ok_or_else(|| ColloquyError::missing(["AZURE_OPENAI_VERSION"]))?;
            openai::OpenAiChatBackend::azure(endpoint, config.model.clone(), api_key, version)
        }
    };
    Ok(Box::new(backend.with_timeout(timeout)))
}

/// Create a backend for a memory-augmented participant.
pub fn create_memory_backend(
    config: &MemoryLlmConfig,
) -> Result<Box<dyn ChatBackend>, ColloquyError> {
    let timeout = config.timeout_secs.map(Duration::from_secs);
    let model = config.model.clone().unwrap_or_else(|| "local".to_string());
    match config.endpoint_type {
        EndpointType::OpenAi => {
            let api_key = config
                .api_key
                .clone()
                .ok_or_else(|| ColloquyError::missing(["OAI_OPENAI_KEY_VAR", "OPENAI_API_KEY"]))?;
            Ok(Box::new(
                openai::OpenAiChatBackend::new(model, api_key, Some(config.endpoint.clone()))
                    .with_timeout(timeout),
            ))
        }
        EndpointType::Azure => {
            let api_key = config
                .api_key
                .clone()
                .ok_or_else(|| ColloquyError::missing(["AZURE_OPENAI_KEY"]))?;
            let version = config
                .api_version
                .clone()
                .ok_or_else(|| ColloquyError::missing(["AZURE_OPENAI_VERSION"]))?;
            Ok(Box::new(
                openai::OpenAiChatBackend::azure(config.endpoint.clone(), model, api_key, version)
                    .with_timeout(timeout),
            ))
        }
        EndpointType::LmStudio => match config.model_wrapper {
            Some(wrapper) => Ok(Box::new(
                completions::CompletionsBackend::new(model, config.endpoint.clone(), wrapper)
                    .with_timeout(timeout),
            )),
            None => Ok(Box::new(
                openai::OpenAiChatBackend::new(
                    model,
                    "NULL".to_string(),
                    Some(format!("{}/v1", config.endpoint.trim_end_matches('/'))),
                )
                .with_timeout(timeout),
            )),
        },
    }
}
