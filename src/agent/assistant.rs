//! Conventional LLM-backed assistant.

use async_trait::async_trait;
use tracing::debug;

use crate::backend::{create_backend, ChatBackend, ChatMessage, ChatRequest};
use crate::config::LlmConfig;
use crate::error::ColloquyError;
use crate::types::Message;

use super::{Replier, ReplyContext};

/// Render a conversation from `speaker`'s point of view.
///
/// The system prompt comes first; the speaker's own messages become
/// `assistant` turns and everyone else's become named `user` turns.
pub fn render_messages<'a, I>(speaker: &str, system_prompt: &str, messages: I) -> Vec<ChatMessage>
where
    I: IntoIterator<Item = &'a Message>,
{
    let mut rendered = Vec::new();
    if !system_prompt.is_empty() {
        rendered.push(ChatMessage::system(system_prompt));
    }
    for message in messages {
        if message.speaker == speaker {
            rendered.push(ChatMessage::assistant(message.content.clone()));
        } else {
            rendered.push(ChatMessage::user(message.content.clone()).with_name(message.speaker.clone()));
        }
    }
    rendered
}

/// Assistant that answers by calling a [`ChatBackend`].
pub struct ConventionalReplier {
    backend: Box<dyn ChatBackend>,
    temperature: Option<f64>,
    max_tokens: Option<u32>,
    seed: Option<u64>,
    default_auto_reply: Option<String>,
}

impl ConventionalReplier {
    pub fn new(backend: Box<dyn ChatBackend>) -> Self {
        Self {
            backend,
            temperature: None,
            max_tokens: None,
            seed: None,
            default_auto_reply: None,
        }
    }

    /// Build the backend from connection parameters.
    pub fn from_config(config: &LlmConfig) -> Result<Self, ColloquyError> {
        let mut replier = Self::new(create_backend(config)?);
        replier.temperature = config.temperature;
        replier.max_tokens = config.max_tokens;
        replier.seed = config.seed;
        Ok(replier)
    }

    /// Reply used when the backend returns an empty completion.
    pub fn with_default_auto_reply(mut self, reply: impl Into<String>) -> Self {
        self.default_auto_reply = Some(reply.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub(crate) async fn generate(&self, ctx: &ReplyContext<'_>) -> Result<String, ColloquyError> {
        let mut request = ChatRequest::new(render_messages(
            &ctx.profile.name,
            &ctx.profile.system_prompt,
            ctx.transcript,
        ));
        request.temperature = self.temperature;
        request.max_tokens = self.max_tokens;
        request.seed = self.seed;

        debug!(
            speaker = %ctx.profile.name,
            model = self.backend.model_id(),
            "generating reply"
        );
        let response = self.backend.complete(&request).await?;

        match &self.default_auto_reply {
            Some(fallback) if response.content.trim().is_empty() => Ok(fallback.clone()),
            _ => Ok(response.content),
        }
    }
}

#[async_trait]
impl Replier for ConventionalReplier {
    async fn reply(&mut self, ctx: &ReplyContext<'_>) -> Result<String, ColloquyError> {
        self.generate(ctx).await
    }
}
