//! Convenience re-exports for common use.

pub use crate::agent::{
    ConventionalReplier, HumanInputMode, HumanProxyReplier, MemoryAugmentedReplier, Participant,
    Profile, Replier, ReplyContext, Role,
};
pub use crate::backend::ChatBackend;
pub use crate::config::{ColloquyConfig, LlmConfig};
pub use crate::error::{ColloquyError, Result};
pub use crate::groupchat::{GroupChat, RunConfig, RunOutcome, RunState};
pub use crate::scenario::{BuildOptions, Scenario};
pub use crate::termination::{EndsWith, TerminationCondition};
pub use crate::types::{Message, Transcript};
pub use crate::util::retry::RetryPolicy;
