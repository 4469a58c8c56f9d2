//! Participants and the reply capability they expose to the dispatcher.

pub mod assistant;
pub mod executor;
pub mod human;
pub mod memory;
pub mod store;

pub use assistant::{render_messages, ConventionalReplier};
pub use executor::{CodeBlock, CodeExecution, CodeExecutor, ExecutionResult, LocalExecutor};
pub use human::{HumanInput, HumanInputMode, HumanProxyReplier, ScriptedInput, StdinInput};
pub use memory::{MemoryAugmentedReplier, MemoryRecord, MemoryState};
pub use store::{FileMemoryStore, MemoryStore};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::error::ColloquyError;
use crate::types::Transcript;

/// Kind of participant.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Role {
    HumanProxy,
    Assistant,
    MemoryAugmented,
}

/// Immutable description of a participant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    pub name: String,
    pub role: Role,
    pub system_prompt: String,
}

impl Profile {
    pub fn new(name: impl Into<String>, role: Role, system_prompt: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role,
            system_prompt: system_prompt.into(),
        }
    }
}

/// Everything a replier may look at when asked to speak.
#[derive(Debug, Clone, Copy)]
pub struct ReplyContext<'a> {
    pub run_id: Uuid,
    /// The participant being asked to reply.
    pub profile: &'a Profile,
    /// All participants, in dispatch order.
    pub participants: &'a [Profile],
    pub transcript: &'a Transcript,
}

/// The reply operation of a participant.
///
/// Calls may be slow (network) and may fail; the dispatcher awaits one call at
/// a time and never retries unless its policy says so.
#[async_trait]
pub trait Replier: Send {
    async fn reply(&mut self, ctx: &ReplyContext<'_>) -> Result<String, ColloquyError>;

    /// Drop per-run state. Persistent memory survives.
    fn reset(&mut self) {}
}

/// A named participant: profile plus reply capability.
pub struct Participant {
    profile: Profile,
    replier: Box<dyn Replier>,
}

impl Participant {
    pub fn new(profile: Profile, replier: Box<dyn Replier>) -> Self {
        Self { profile, replier }
    }

    pub fn assistant(
        name: impl Into<String>,
        system_prompt: impl Into<String>,
        replier: ConventionalReplier,
    ) -> Self {
        Self::new(
            Profile::new(name, Role::Assistant, system_prompt),
            Box::new(replier),
        )
    }

    pub fn human_proxy(
        name: impl Into<String>,
        system_prompt: impl Into<String>,
        replier: HumanProxyReplier,
    ) -> Self {
        Self::new(
            Profile::new(name, Role::HumanProxy, system_prompt),
            Box::new(replier),
        )
    }

    /// The persona of a memory-augmented participant is its system prompt.
    pub fn memory_augmented(replier: MemoryAugmentedReplier) -> Self {
        let state = replier.state();
        let profile = Profile::new(
            state.agent_name.clone(),
            Role::MemoryAugmented,
            state.persona.clone(),
        );
        Self::new(profile, Box::new(replier))
    }

    pub fn name(&self) -> &str {
        &self.profile.name
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub(crate) fn into_parts(self) -> (Profile, Box<dyn Replier>) {
        (self.profile, self.replier)
    }
}

impl std::fmt::Debug for Participant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Participant")
            .field("profile", &self.profile)
            .field("replier", &"..")
            .finish()
    }
}
