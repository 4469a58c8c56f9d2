//! Declarative conversation setups.
//!
//! A [`Scenario`] names the participants, the selection method, the stop
//! rules and the opening message. It is loaded from TOML or taken from
//! [`presets`], then built against a [`ColloquyConfig`] into a runnable
//! [`GroupChat`].
//!
//! ```toml
//! name = "pair"
//! max_rounds = 6
//! selection = "round_robin"
//! termination = { ends_with = "TERMINATE" }
//! initiator = "user"
//! message = "Write a haiku about Rust."
//!
//! [[participants]]
//! name = "user"
//! kind = "human_proxy"
//! human_input_mode = "never"
//!
//! [[participants]]
//! name = "poet"
//! kind = "assistant"
//! system_prompt = "You write short poems."
//! ```

pub mod presets;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::{debug, info};

use crate::agent::{
    CodeExecution, ConventionalReplier, FileMemoryStore, HumanInput, HumanInputMode,
    HumanProxyReplier, LocalExecutor, MemoryAugmentedReplier, MemoryStore, Participant,
    ScriptedInput, StdinInput,
};
use crate::backend::create_backend;
use crate::config::{ColloquyConfig, LlmConfig};
use crate::error::ColloquyError;
use crate::groupchat::{
    EventSink, GroupChat, ModelSelector, RoundRobin, RunConfig, SelectionMethod, SpeakerSelector,
};
use crate::termination::{Contains, EndsWith, Never, RegexTermination, TerminationCondition};

const DEFAULT_MAX_ROUNDS: u64 = 10;
const DEFAULT_LAST_N_MESSAGES: usize = 1;

/// A complete conversation setup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Scenario {
    pub name: String,
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u64,
    #[serde(default)]
    pub selection: SelectionMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub termination: Option<TerminationSpec>,
    pub initiator: String,
    pub message: String,
    /// Overrides the configured sampling temperature for every LLM call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    pub participants: Vec<ParticipantSpec>,
}

fn default_max_rounds() -> u64 {
    DEFAULT_MAX_ROUNDS
}

/// Termination rule as written in a scenario file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TerminationSpec {
    EndsWith(String),
    Contains(String),
    Regex(String),
}

impl TerminationSpec {
    pub fn build(&self) -> Result<Box<dyn TerminationCondition>, ColloquyError> {
        Ok(match self {
            TerminationSpec::EndsWith(suffix) => Box::new(EndsWith::new(suffix.clone())),
            TerminationSpec::Contains(pattern) => Box::new(Contains::new(pattern.clone())),
            TerminationSpec::Regex(pattern) => Box::new(RegexTermination::new(pattern)?),
        })
    }
}

/// Kind of participant in a scenario file.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ParticipantKind {
    HumanProxy,
    Assistant,
    Memory,
}

/// Code execution settings of a human proxy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CodeExecutionSpec {
    pub work_dir: PathBuf,
    #[serde(default = "default_last_n_messages")]
    pub last_n_messages: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

fn default_last_n_messages() -> usize {
    DEFAULT_LAST_N_MESSAGES
}

/// One participant of a scenario.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParticipantSpec {
    pub name: String,
    pub kind: ParticipantKind,
    #[serde(default)]
    pub system_prompt: String,
    /// Human proxies only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub human_input_mode: Option<HumanInputMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_auto_reply: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_consecutive_auto_reply: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_execution: Option<CodeExecutionSpec>,
    /// Human proxies only: generate auto-replies with the LLM.
    #[serde(default)]
    pub use_llm: bool,
    /// Memory participants only: persist state after every reply.
    #[serde(default)]
    pub auto_save: bool,
}

impl ParticipantSpec {
    pub fn new(name: impl Into<String>, kind: ParticipantKind, system_prompt: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            system_prompt: system_prompt.into(),
            human_input_mode: None,
            default_auto_reply: None,
            max_consecutive_auto_reply: None,
            code_execution: None,
            use_llm: false,
            auto_save: false,
        }
    }

    fn needs_llm(&self) -> bool {
        match self.kind {
            ParticipantKind::HumanProxy => self.use_llm,
            ParticipantKind::Assistant => true,
            ParticipantKind::Memory => false,
        }
    }
}

/// Who opens the conversation, and with what.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Kickoff {
    pub initiator: String,
    pub message: String,
}

/// Creates the [`HumanInput`] for a human proxy, by participant name.
pub type HumanInputFactory = Arc<dyn Fn(&str) -> Box<dyn HumanInput> + Send + Sync>;

/// Runtime hooks used while building a scenario.
#[derive(Clone)]
pub struct BuildOptions {
    pub human_input: HumanInputFactory,
    /// Defaults to a [`FileMemoryStore`] in the configured memory dir.
    pub memory_store: Option<Arc<dyn MemoryStore>>,
    pub event_sink: Option<EventSink>,
    /// Relative code execution directories resolve against this.
    pub base_dir: Option<PathBuf>,
}

impl BuildOptions {
    /// Human proxies read from stdin.
    pub fn interactive() -> Self {
        Self {
            human_input: Arc::new(|_| Box::new(StdinInput)),
            memory_store: None,
            event_sink: None,
            base_dir: None,
        }
    }

    /// Human proxies always fall back to their auto-reply.
    pub fn non_interactive() -> Self {
        Self {
            human_input: Arc::new(|_| Box::new(ScriptedInput::default())),
            ..Self::interactive()
        }
    }

    pub fn with_human_input(mut self, factory: HumanInputFactory) -> Self {
        self.human_input = factory;
        self
    }

    pub fn with_memory_store(mut self, store: Arc<dyn MemoryStore>) -> Self {
        self.memory_store = Some(store);
        self
    }

    pub fn with_event_sink(mut self, sink: EventSink) -> Self {
        self.event_sink = Some(sink);
        self
    }

    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self::interactive()
    }
}

impl std::fmt::Debug for BuildOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildOptions")
            .field("memory_store", &self.memory_store.is_some())
            .field("event_sink", &self.event_sink.is_some())
            .field("base_dir", &self.base_dir)
            .finish_non_exhaustive()
    }
}

impl Scenario {
    pub fn from_toml(raw: &str) -> Result<Self, ColloquyError> {
        let scenario: Scenario = toml::from_str(raw)?;
        scenario.validate()?;
        Ok(scenario)
    }

    pub fn load(path: &Path) -> Result<Self, ColloquyError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml(&raw)
    }

    /// Checks that need no backend: participants, initiator, termination.
    pub fn validate(&self) -> Result<(), ColloquyError> {
        if self.participants.is_empty() {
            return Err(ColloquyError::Configuration(format!(
                "scenario '{}' has no participants",
                self.name
            )));
        }
        if !self.participants.iter().any(|p| p.name == self.initiator) {
            return Err(ColloquyError::Configuration(format!(
                "scenario '{}': initiator '{}' is not a participant",
                self.name, self.initiator
            )));
        }
        if let Some(termination) = &self.termination {
            termination.build()?;
        }
        Ok(())
    }

    /// Persist every memory-augmented participant after each of its replies.
    pub fn save_all_memory(&mut self) {
        for participant in &mut self.participants {
            if participant.kind == ParticipantKind::Memory {
                participant.auto_save = true;
            }
        }
    }

    pub fn kickoff(&self) -> Kickoff {
        Kickoff {
            initiator: self.initiator.clone(),
            message: self.message.clone(),
        }
    }

    fn needs_llm(&self) -> bool {
        self.selection == SelectionMethod::Auto || self.participants.iter().any(|p| p.needs_llm())
    }

    fn llm_config(&self, config: &ColloquyConfig) -> Result<LlmConfig, ColloquyError> {
        let mut llm = config.llm_config()?;
        if self.temperature.is_some() {
            llm.temperature = self.temperature;
        }
        if self.timeout_secs.is_some() {
            llm.timeout_secs = self.timeout_secs;
        }
        Ok(llm)
    }

    /// Build the participants and dispatcher.
    pub fn build(
        &self,
        config: &ColloquyConfig,
        options: &BuildOptions,
    ) -> Result<(GroupChat, Kickoff), ColloquyError> {
        self.validate()?;
        let llm = if self.needs_llm() {
            Some(self.llm_config(config)?)
        } else {
            None
        };

        let mut participants = Vec::with_capacity(self.participants.len());
        for spec in &self.participants {
            debug!(scenario = %self.name, participant = %spec.name, kind = %spec.kind, "building participant");
            let participant = match spec.kind {
                ParticipantKind::Assistant => {
                    self.build_assistant(spec, llm.as_ref())?
                }
                ParticipantKind::HumanProxy => {
                    self.build_human_proxy(spec, llm.as_ref(), options)?
                }
                ParticipantKind::Memory => self.build_memory(spec, config, options)?,
            };
            participants.push(participant);
        }

        let selector: Box<dyn SpeakerSelector> = match self.selection {
            SelectionMethod::RoundRobin => Box::new(RoundRobin),
            SelectionMethod::Auto => {
                let llm = llm.as_ref().ok_or_else(|| {
                    ColloquyError::Configuration("auto selection needs an LLM".into())
                })?;
                Box::new(ModelSelector::new(create_backend(llm)?).with_seed(llm.seed))
            }
        };
        let termination: Box<dyn TerminationCondition> = match &self.termination {
            Some(spec) => spec.build()?,
            None => Box::new(Never),
        };
        let run_config = RunConfig::new(self.max_rounds)
            .with_selector(selector)
            .with_termination(termination);

        let mut chat = GroupChat::new(participants, run_config)?;
        chat.set_event_sink(options.event_sink.clone());
        info!(scenario = %self.name, participants = self.participants.len(), "scenario built");
        Ok((chat, self.kickoff()))
    }

    fn build_assistant(
        &self,
        spec: &ParticipantSpec,
        llm: Option<&LlmConfig>,
    ) -> Result<Participant, ColloquyError> {
        let llm = llm.ok_or_else(|| {
            ColloquyError::Configuration(format!("assistant '{}' needs an LLM", spec.name))
        })?;
        let mut replier = ConventionalReplier::from_config(llm)?;
        if let Some(reply) = &spec.default_auto_reply {
            replier = replier.with_default_auto_reply(reply.clone());
        }
        Ok(Participant::assistant(
            spec.name.clone(),
            spec.system_prompt.clone(),
            replier,
        ))
    }

    fn build_human_proxy(
        &self,
        spec: &ParticipantSpec,
        llm: Option<&LlmConfig>,
        options: &BuildOptions,
    ) -> Result<Participant, ColloquyError> {
        let mode = spec.human_input_mode.unwrap_or_default();
        let mut replier = HumanProxyReplier::new(mode, (options.human_input)(&spec.name));
        if let Some(reply) = &spec.default_auto_reply {
            replier = replier.with_default_auto_reply(reply.clone());
        }
        if let Some(max) = spec.max_consecutive_auto_reply {
            replier = replier.with_max_consecutive_auto_reply(max);
        }
        if let Some(termination) = &self.termination {
            replier = replier.with_termination(termination.build()?);
        }
        if let Some(execution) = &spec.code_execution {
            let work_dir = match &options.base_dir {
                Some(base) if execution.work_dir.is_relative() => base.join(&execution.work_dir),
                _ => execution.work_dir.clone(),
            };
            let mut executor = LocalExecutor::new(work_dir);
            if let Some(secs) = execution.timeout_secs {
                executor = executor.with_timeout(Duration::from_secs(secs));
            }
            replier = replier.with_code_execution(CodeExecution::new(
                execution.last_n_messages,
                Box::new(executor),
            ));
        }
        if spec.use_llm {
            if let Some(llm) = llm {
                replier = replier.with_llm(ConventionalReplier::from_config(llm)?);
            }
        }
        Ok(Participant::human_proxy(
            spec.name.clone(),
            spec.system_prompt.clone(),
            replier,
        ))
    }

    fn build_memory(
        &self,
        spec: &ParticipantSpec,
        config: &ColloquyConfig,
        options: &BuildOptions,
    ) -> Result<Participant, ColloquyError> {
        let memory_config = config.memory_llm_config()?;
        let store: Arc<dyn MemoryStore> = match &options.memory_store {
            Some(store) => Arc::clone(store),
            None => Arc::new(FileMemoryStore::new(config.memory_dir())),
        };

        let mut replier =
            MemoryAugmentedReplier::from_config(spec.name.clone(), spec.system_prompt.clone(), &memory_config)?
                .with_store(store)
                .with_auto_save(spec.auto_save);
        if let Some(reply) = &spec.default_auto_reply {
            replier = replier.with_default_auto_reply(reply.clone());
        }
        if replier.load()? {
            info!(participant = %spec.name, "restored saved memory");
        }
        Ok(Participant::memory_augmented(replier))
    }
}
