//! Group dispatcher: drives a multi-participant conversation turn by turn.
//!
//! A run starts with an opening message from the initiator (turn 0). Each
//! following turn the selector picks a speaker, the speaker's replier
//! produces content, and the message is appended to the transcript. The run
//! ends when the termination condition accepts the newest message or when
//! `max_rounds` replies have been appended.
//!
//! ```no_run
//! use colloquy::prelude::*;
//!
//! # async fn example(participants: Vec<Participant>) -> colloquy::error::Result<()> {
//! let config = RunConfig::new(12).with_termination(Box::new(EndsWith::terminate()));
//! let mut chat = GroupChat::new(participants, config)?;
//! let outcome = chat.run("User_proxy", "Design a todo app.").await?;
//! println!("{} messages, {}", outcome.transcript.len(), outcome.status);
//! # Ok(())
//! # }
//! ```

pub mod events;
pub mod selection;

pub use events::{ChatEvent, EventSink, RunId, RunOutcome, RunState};
pub use selection::{
    match_speaker, FnSelector, ModelSelector, RoundRobin, SelectionContext, SelectionMethod,
    SpeakerSelector,
};

use std::collections::HashSet;
use std::time::Duration;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::agent::{Participant, Profile, Replier, ReplyContext};
use crate::error::ColloquyError;
use crate::termination::{Never, TerminationCondition};
use crate::types::{Message, Transcript};
use crate::util::retry::RetryPolicy;
use crate::util::timeout::maybe_timeout;

const DEFAULT_MAX_ROUNDS: u64 = 10;

/// Settings of a run.
pub struct RunConfig {
    /// Maximum number of replies appended after the opening message.
    pub max_rounds: u64,
    pub selector: Box<dyn SpeakerSelector>,
    pub termination: Box<dyn TerminationCondition>,
    /// Applied to each reply. Defaults to a single attempt.
    pub retry: RetryPolicy,
    pub reply_timeout: Option<Duration>,
}

impl RunConfig {
    /// Round robin, no termination predicate, no retries.
    pub fn new(max_rounds: u64) -> Self {
        Self {
            max_rounds,
            selector: Box::new(RoundRobin),
            termination: Box::new(Never),
            retry: RetryPolicy::none(),
            reply_timeout: None,
        }
    }

    pub fn with_selector(mut self, selector: Box<dyn SpeakerSelector>) -> Self {
        self.selector = selector;
        self
    }

    pub fn with_termination(mut self, termination: Box<dyn TerminationCondition>) -> Self {
        self.termination = termination;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = Some(timeout);
        self
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ROUNDS)
    }
}

impl std::fmt::Debug for RunConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunConfig")
            .field("max_rounds", &self.max_rounds)
            .field("retry", &self.retry)
            .field("reply_timeout", &self.reply_timeout)
            .finish_non_exhaustive()
    }
}

/// The group dispatcher.
pub struct GroupChat {
    profiles: Vec<Profile>,
    repliers: Vec<Box<dyn Replier>>,
    config: RunConfig,
    transcript: Transcript,
    state: RunState,
    last_run_id: Option<RunId>,
    event_sink: Option<EventSink>,
}

impl GroupChat {
    /// Validate participants: at least one, names unique.
    pub fn new(participants: Vec<Participant>, config: RunConfig) -> Result<Self, ColloquyError> {
        if participants.is_empty() {
            return Err(ColloquyError::Configuration(
                "a group chat needs at least one participant".into(),
            ));
        }

        let mut seen = HashSet::new();
        for participant in &participants {
            if !seen.insert(participant.name()) {
                return Err(ColloquyError::Configuration(format!(
                    "duplicate participant name '{}'",
                    participant.name()
                )));
            }
        }

        let (profiles, repliers) = participants.into_iter().map(Participant::into_parts).unzip();
        Ok(Self {
            profiles,
            repliers,
            config,
            transcript: Transcript::new(),
            state: RunState::Idle,
            last_run_id: None,
            event_sink: None,
        })
    }

    pub fn with_event_sink(mut self, sink: EventSink) -> Self {
        self.event_sink = Some(sink);
        self
    }

    pub fn set_event_sink(&mut self, sink: Option<EventSink>) {
        self.event_sink = sink;
    }

    pub fn participants(&self) -> &[Profile] {
        &self.profiles
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut RunConfig {
        &mut self.config
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Transcript of the current or last run, partial after a failure.
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn last_run_id(&self) -> Option<RunId> {
        self.last_run_id
    }

    /// Clear the transcript and every replier's per-run state.
    pub fn reset(&mut self) {
        self.transcript.clear();
        for replier in &mut self.repliers {
            replier.reset();
        }
        self.state = RunState::Idle;
    }

    fn emit(&self, event: ChatEvent) {
        if let Some(sink) = &self.event_sink {
            sink(event);
        }
    }

    /// Run a conversation opened by `initiator` with `content`.
    pub async fn run(
        &mut self,
        initiator: &str,
        content: impl Into<String>,
    ) -> Result<RunOutcome, ColloquyError> {
        if !self.profiles.iter().any(|p| p.name == initiator) {
            return Err(ColloquyError::Configuration(format!(
                "initiator '{initiator}' is not a participant"
            )));
        }

        self.reset();
        let run_id = Uuid::new_v4();
        self.last_run_id = Some(run_id);
        self.state = RunState::Running;

        let initial = Message::new(initiator, content, 0);
        self.transcript.push(initial.clone())?;
        info!(
            %run_id,
            initiator,
            participants = self.profiles.len(),
            max_rounds = self.config.max_rounds,
            "group chat started"
        );
        self.emit(ChatEvent::RunStarted { run_id, initial });

        match self.drive(run_id).await {
            Ok(status) => {
                self.state = status;
                info!(%run_id, %status, messages = self.transcript.len(), "group chat finished");
                self.emit(ChatEvent::RunFinished {
                    run_id,
                    status,
                    messages: self.transcript.len(),
                });
                Ok(RunOutcome {
                    run_id,
                    status,
                    transcript: self.transcript.clone(),
                })
            }
            Err(error) => {
                self.state = RunState::Failed;
                warn!(%run_id, %error, messages = self.transcript.len(), "group chat failed");
                self.emit(ChatEvent::RunFailed {
                    run_id,
                    error: error.to_string(),
                });
                Err(error)
            }
        }
    }

    async fn drive(&mut self, run_id: RunId) -> Result<RunState, ColloquyError> {
        loop {
            if self.transcript.appended().len() as u64 >= self.config.max_rounds {
                return Ok(RunState::TerminatedByRoundLimit);
            }

            let turn_index = self.transcript.next_turn_index();
            let index = self
                .config
                .selector
                .select(&SelectionContext {
                    profiles: &self.profiles,
                    transcript: &self.transcript,
                    turn_index,
                })
                .await?;
            let Some(profile) = self.profiles.get(index) else {
                return Err(ColloquyError::InvalidState(format!(
                    "selector returned index {index} for {} participants",
                    self.profiles.len()
                )));
            };
            let speaker = profile.name.clone();
            debug!(%run_id, turn_index, %speaker, "speaker selected");
            self.emit(ChatEvent::SpeakerSelected {
                run_id,
                turn_index,
                speaker: speaker.clone(),
            });

            let content = self
                .reply(run_id, index)
                .await
                .map_err(|source| ColloquyError::Reply {
                    speaker: speaker.clone(),
                    turn_index,
                    source: Box::new(source),
                })?;

            let message = Message::new(speaker, content, turn_index);
            self.transcript.push(message.clone())?;
            self.emit(ChatEvent::MessageAppended {
                run_id,
                message: message.clone(),
            });

            let terminated = self
                .config
                .termination
                .is_termination(&message)
                .await
                .map_err(|e| match e {
                    ColloquyError::Termination(_) => e,
                    other => ColloquyError::Termination(other.to_string()),
                })?;
            if terminated {
                return Ok(RunState::TerminatedByPredicate);
            }
        }
    }

    /// One reply from participant `index`, under the retry policy and timeout.
    async fn reply(&mut self, run_id: RunId, index: usize) -> Result<String, ColloquyError> {
        let ctx = ReplyContext {
            run_id,
            profile: &self.profiles[index],
            participants: &self.profiles,
            transcript: &self.transcript,
        };
        let replier = &mut self.repliers[index];
        let policy = &self.config.retry;

        let mut backoff = policy.initial_backoff;
        let mut attempt = 1;
        loop {
            match maybe_timeout(self.config.reply_timeout, replier.reply(&ctx)).await {
                Ok(content) => return Ok(content),
                Err(e) if policy.should_retry(&e, attempt) => {
                    warn!(
                        speaker = %ctx.profile.name,
                        attempt,
                        max_attempts = policy.max_attempts,
                        error = %e,
                        "Retrying reply after error"
                    );
                    backoff = policy.wait(backoff).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl std::fmt::Debug for GroupChat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupChat")
            .field("participants", &self.profiles)
            .field("config", &self.config)
            .field("state", &self.state)
            .field("messages", &self.transcript.len())
            .finish()
    }
}
