//! Speaker selection strategies.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::{debug, warn};

use crate::agent::{render_messages, Profile};
use crate::backend::{ChatBackend, ChatMessage, ChatRequest};
use crate::error::ColloquyError;
use crate::types::Transcript;

/// Input to a [`SpeakerSelector`].
#[derive(Debug, Clone, Copy)]
pub struct SelectionContext<'a> {
    /// Participants in dispatch order.
    pub profiles: &'a [Profile],
    pub transcript: &'a Transcript,
    /// Turn about to be produced (1 for the first reply).
    pub turn_index: u64,
}

impl SelectionContext<'_> {
    /// `turn_index mod n`.
    pub fn round_robin_index(&self) -> usize {
        if self.profiles.is_empty() {
            return 0;
        }
        (self.turn_index % self.profiles.len() as u64) as usize
    }
}

/// Picks the index of the participant who speaks next.
#[async_trait]
pub trait SpeakerSelector: Send + Sync {
    async fn select(&self, ctx: &SelectionContext<'_>) -> Result<usize, ColloquyError>;
}

/// Participants speak in registration order, starting after the initiator's
/// slot.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoundRobin;

#[async_trait]
impl SpeakerSelector for RoundRobin {
    async fn select(&self, ctx: &SelectionContext<'_>) -> Result<usize, ColloquyError> {
        Ok(ctx.round_robin_index())
    }
}

/// Caller-supplied selection function.
pub struct FnSelector<F>
where
    F: Fn(&SelectionContext<'_>) -> usize + Send + Sync,
{
    select: F,
}

impl<F> FnSelector<F>
where
    F: Fn(&SelectionContext<'_>) -> usize + Send + Sync,
{
    pub fn new(select: F) -> Self {
        Self { select }
    }
}

#[async_trait]
impl<F> SpeakerSelector for FnSelector<F>
where
    F: Fn(&SelectionContext<'_>) -> usize + Send + Sync,
{
    async fn select(&self, ctx: &SelectionContext<'_>) -> Result<usize, ColloquyError> {
        Ok((self.select)(ctx))
    }
}

/// Lets an LLM pick the next speaker by name.
///
/// The model sees every participant's name and system prompt plus the
/// conversation so far. An answer that names no participant falls back to
/// round-robin.
pub struct ModelSelector {
    backend: Box<dyn ChatBackend>,
    seed: Option<u64>,
}

impl ModelSelector {
    pub fn new(backend: Box<dyn ChatBackend>) -> Self {
        Self {
            backend,
            seed: None,
        }
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    fn selection_prompt(profiles: &[Profile]) -> String {
        let roles = profiles
            .iter()
            .map(|p| format!("{}: {}", p.name, p.system_prompt))
            .collect::<Vec<_>>()
            .join("\n");
        let names = profiles
            .iter()
            .map(|p| p.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "You are in a role play game. The following roles are available:\n{roles}\n\n\
             Read the following conversation. Then select the next role from [{names}] \
             to play. Only return the role."
        )
    }
}

/// Index of the participant named in `answer`.
///
/// An exact (trimmed, case-insensitive) match wins; otherwise the longest
/// name contained in the answer.
pub fn match_speaker(profiles: &[Profile], answer: &str) -> Option<usize> {
    let answer = answer.trim().trim_matches(|c: char| c == '"' || c == '\'' || c == '.');
    if let Some(index) = profiles
        .iter()
        .position(|p| p.name.eq_ignore_ascii_case(answer))
    {
        return Some(index);
    }
    let lowered = answer.to_lowercase();
    profiles
        .iter()
        .enumerate()
        .filter(|(_, p)| lowered.contains(&p.name.to_lowercase()))
        .max_by_key(|(_, p)| p.name.len())
        .map(|(index, _)| index)
}

#[async_trait]
impl SpeakerSelector for ModelSelector {
    async fn select(&self, ctx: &SelectionContext<'_>) -> Result<usize, ColloquyError> {
        let mut messages = render_messages("", &Self::selection_prompt(ctx.profiles), ctx.transcript);
        messages.push(ChatMessage::system(format!(
            "Select the next role from [{}]. Only return the role.",
            ctx.profiles
                .iter()
                .map(|p| p.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        )));
        let mut request = ChatRequest::new(messages);
        request.seed = self.seed;

        let response = self.backend.complete(&request).await?;
        match match_speaker(ctx.profiles, &response.content) {
            Some(index) => {
                debug!(turn = ctx.turn_index, answer = %response.content.trim(), "model selected speaker");
                Ok(index)
            }
            None => {
                warn!(
                    turn = ctx.turn_index,
                    answer = %response.content.trim(),
                    "no participant matched, falling back to round robin"
                );
                Ok(ctx.round_robin_index())
            }
        }
    }
}

/// Selection method named in configuration.
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SelectionMethod {
    #[default]
    RoundRobin,
    Auto,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::Role;

    fn profiles(names: &[&str]) -> Vec<Profile> {
        names
            .iter()
            .map(|n| Profile::new(*n, Role::Assistant, ""))
            .collect()
    }

    #[tokio::test]
    async fn round_robin_wraps() {
        let profiles = profiles(&["Admin", "Engineer", "Executor"]);
        let transcript = Transcript::new();
        let mut picked = Vec::new();
        for turn_index in 1..=4 {
            let ctx = SelectionContext {
                profiles: &profiles,
                transcript: &transcript,
                turn_index,
            };
            picked.push(RoundRobin.select(&ctx).await.unwrap());
        }
        assert_eq!(picked, vec![1, 2, 0, 1]);
    }

    #[tokio::test]
    async fn fn_selector_delegates() {
        let profiles = profiles(&["a", "b"]);
        let transcript = Transcript::new();
        let selector = FnSelector::new(|_: &SelectionContext<'_>| 1);
        let ctx = SelectionContext {
            profiles: &profiles,
            transcript: &transcript,
            turn_index: 7,
        };
        assert_eq!(selector.select(&ctx).await.unwrap(), 1);
    }

    #[test]
    fn match_prefers_exact_then_longest() {
        let profiles = profiles(&["Engineer", "Scientist", "Executor", "Admin"]);
        assert_eq!(match_speaker(&profiles, " scientist\n"), Some(1));
        assert_eq!(match_speaker(&profiles, "\"Executor\"."), Some(2));
        assert_eq!(match_speaker(&profiles, "I think Admin should speak"), Some(3));
        assert_eq!(match_speaker(&profiles, "nobody"), None);

        let overlapping = self::profiles(&["Coder", "Senior Coder"]);
        assert_eq!(match_speaker(&overlapping, "The Senior Coder"), Some(1));
    }

    #[test]
    fn method_parses_from_config_strings() {
        assert_eq!("round_robin".parse::<SelectionMethod>().unwrap(), SelectionMethod::RoundRobin);
        assert_eq!("auto".parse::<SelectionMethod>().unwrap(), SelectionMethod::Auto);
        assert!("random".parse::<SelectionMethod>().is_err());
    }
}
