//! Memory-augmented participant.
//!
//! The replier keeps its own view of the conversation instead of re-reading
//! the whole transcript every turn:
//!
//! - *core memory*: the `persona` and `human` blocks, always in the prompt
//! - *recall*: messages seen so far, oldest first
//! - *archival*: recall entries evicted to keep the prompt inside the
//!   model's context window
//!
//! State can be persisted through a [`MemoryStore`] and survives across runs.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::backend::{create_memory_backend, ChatBackend, ChatMessage, ChatRequest};
use crate::config::{MemoryLlmConfig, MemoryPreset};
use crate::error::ColloquyError;
use crate::models::estimate_tokens;

use super::store::MemoryStore;
use super::{Replier, ReplyContext};

/// Share of the context window the prompt may occupy.
const PROMPT_BUDGET_NUMERATOR: usize = 3;
const PROMPT_BUDGET_DENOMINATOR: usize = 4;

const MEMGPT_CHAT_INSTRUCTIONS: &str = "\
You are a conversational agent with a long-term memory.
Your core memory holds two blocks: <persona> describes who you are and \
<human> describes the people you are talking with. Stay in character.
Older messages may have been moved out of your context into archival \
memory; their count is shown below. Never mention that you are an AI.
Reply with your next message only.";

const MINIMAL_INSTRUCTIONS: &str = "Reply with your next message only.";

/// One remembered message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemoryRecord {
    pub speaker: String,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl MemoryRecord {
    pub fn new(speaker: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            speaker: speaker.into(),
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Persistent state of a memory-augmented participant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemoryState {
    pub agent_name: String,
    pub persona: String,
    pub human: String,
    pub recall: Vec<MemoryRecord>,
    pub archival: Vec<MemoryRecord>,
    /// Context window of the backing model, in tokens.
    pub context_window: usize,
    pub preset: MemoryPreset,
}

impl MemoryState {
    pub fn new(
        agent_name: impl Into<String>,
        persona: impl Into<String>,
        context_window: usize,
        preset: MemoryPreset,
    ) -> Self {
        Self {
            agent_name: agent_name.into(),
            persona: persona.into(),
            human: String::new(),
            recall: Vec::new(),
            archival: Vec::new(),
            context_window,
            preset,
        }
    }

    fn system_prompt(&self) -> String {
        let instructions = match self.preset {
            MemoryPreset::MemgptChat => MEMGPT_CHAT_INSTRUCTIONS,
            MemoryPreset::Minimal => MINIMAL_INSTRUCTIONS,
        };
        format!(
            "{instructions}\n\n<persona>\n{}\n</persona>\n<human>\n{}\n</human>\n\n\
             Archival memory: {} messages stored.",
            self.persona,
            self.human,
            self.archival.len()
        )
    }

    /// Prompt messages: system prompt with core memory, then recall.
    fn render(&self) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(self.recall.len() + 1);
        messages.push(ChatMessage::system(self.system_prompt()));
        for record in &self.recall {
            if record.speaker == self.agent_name {
                messages.push(ChatMessage::assistant(record.content.clone()));
            } else {
                messages.push(
                    ChatMessage::user(record.content.clone()).with_name(record.speaker.clone()),
                );
            }
        }
        messages
    }

    /// Estimated prompt size in tokens.
    pub fn prompt_tokens(&self) -> usize {
        estimate_tokens(&self.system_prompt())
            + self
                .recall
                .iter()
                .map(|r| estimate_tokens(&r.content))
                .sum::<usize>()
    }

    fn prompt_budget(&self) -> usize {
        self.context_window * PROMPT_BUDGET_NUMERATOR / PROMPT_BUDGET_DENOMINATOR
    }

    /// Move the oldest recall entries to archival until the prompt fits.
    /// The newest entry always stays. Returns how many were moved.
    pub fn evict(&mut self) -> usize {
        let budget = self.prompt_budget();
        let mut moved = 0;
        while self.recall.len() > 1 && self.prompt_tokens() > budget {
            let record = self.recall.remove(0);
            self.archival.push(record);
            moved += 1;
        }
        moved
    }
}

/// Replier for the memory-augmented role.
pub struct MemoryAugmentedReplier {
    state: MemoryState,
    backend: Box<dyn ChatBackend>,
    store: Option<Arc<dyn MemoryStore>>,
    auto_save: bool,
    seed: Option<u64>,
    default_auto_reply: Option<String>,
    /// Run being followed and the next transcript turn to ingest.
    cursor: Option<(Uuid, u64)>,
}

impl MemoryAugmentedReplier {
    pub fn new(state: MemoryState, backend: Box<dyn ChatBackend>) -> Self {
        Self {
            state,
            backend,
            store: None,
            auto_save: false,
            seed: None,
            default_auto_reply: None,
            cursor: None,
        }
    }

    pub fn from_config(
        agent_name: impl Into<String>,
        persona: impl Into<String>,
        config: &MemoryLlmConfig,
    ) -> Result<Self, ColloquyError> {
        let state = MemoryState::new(agent_name, persona, config.context_window, config.preset);
        let mut replier = Self::new(state, create_memory_backend(config)?);
        replier.seed = config.seed;
        Ok(replier)
    }

    pub fn with_store(mut self, store: Arc<dyn MemoryStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Persist state after every reply. Needs a store.
    pub fn with_auto_save(mut self, auto_save: bool) -> Self {
        self.auto_save = auto_save;
        self
    }

    pub fn with_default_auto_reply(mut self, reply: impl Into<String>) -> Self {
        self.default_auto_reply = Some(reply.into());
        self
    }

    pub fn state(&self) -> &MemoryState {
        &self.state
    }

    fn require_store(&self) -> Result<&Arc<dyn MemoryStore>, ColloquyError> {
        self.store
            .as_ref()
            .ok_or_else(|| ColloquyError::Memory("no memory store configured".into()))
    }

    /// Replace the state with the stored one for this agent, if any.
    ///
    /// Returns whether a stored state was found. The configured context
    /// window and preset are kept. Stored state recorded under a different
    /// agent name is rejected.
    pub fn load(&mut self) -> Result<bool, ColloquyError> {
        let Some(stored) = self.require_store()?.load(&self.state.agent_name)? else {
            return Ok(false);
        };
        if stored.agent_name != self.state.agent_name {
            return Err(ColloquyError::Memory(format!(
                "stored memory for {} belongs to {}",
                self.state.agent_name, stored.agent_name
            )));
        }
        info!(
            agent = %stored.agent_name,
            recall = stored.recall.len(),
            archival = stored.archival.len(),
            "memory loaded"
        );
        self.state = MemoryState {
            context_window: self.state.context_window,
            preset: self.state.preset,
            ..stored
        };
        Ok(true)
    }

    pub fn save(&self) -> Result<(), ColloquyError> {
        self.require_store()?.save(&self.state)
    }

    /// Case-insensitive substring search over archival memory.
    pub fn search_archival(&self, query: &str) -> Vec<&MemoryRecord> {
        let needle = query.to_lowercase();
        self.state
            .archival
            .iter()
            .filter(|r| r.content.to_lowercase().contains(&needle))
            .collect()
    }

    fn ingest(&mut self, ctx: &ReplyContext<'_>) {
        let start = match self.cursor {
            Some((run_id, next)) if run_id == ctx.run_id => next,
            _ => 0,
        };
        for message in ctx.transcript.messages() {
            if message.turn_index < start {
                continue;
            }
            self.state
                .recall
                .push(MemoryRecord::new(message.speaker.clone(), message.content.clone()));
        }
        self.cursor = Some((ctx.run_id, ctx.transcript.next_turn_index()));

        self.state.human = ctx
            .participants
            .iter()
            .filter(|p| p.name != self.state.agent_name)
            .map(|p| format!("{} ({})", p.name, p.role))
            .collect::<Vec<_>>()
            .join("\n");
    }
}

#[async_trait]
impl Replier for MemoryAugmentedReplier {
    async fn reply(&mut self, ctx: &ReplyContext<'_>) -> Result<String, ColloquyError> {
        self.ingest(ctx);
        let evicted = self.state.evict();
        if evicted > 0 {
            debug!(agent = %self.state.agent_name, evicted, "recall moved to archival");
        }

        let mut request = ChatRequest::new(self.state.render());
        request.seed = self.seed;
        debug!(
            agent = %self.state.agent_name,
            model = self.backend.model_id(),
            tokens = self.state.prompt_tokens(),
            "memory reply"
        );
        let response = self.backend.complete(&request).await?;
        let content = match &self.default_auto_reply {
            Some(fallback) if response.content.trim().is_empty() => fallback.clone(),
            _ => response.content,
        };

        // Our own reply lands at the next turn; skip it when ingesting.
        self.state
            .recall
            .push(MemoryRecord::new(self.state.agent_name.clone(), content.clone()));
        self.cursor = Some((ctx.run_id, ctx.transcript.next_turn_index() + 1));

        if self.auto_save {
            self.save()?;
        }
        Ok(content)
    }

    fn reset(&mut self) {
        self.cursor = None;
    }
}
