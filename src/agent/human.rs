//! Human-proxy participant.
//!
//! A proxy stands in for a person. Depending on its [`HumanInputMode`] it
//! either asks a [`HumanInput`] for the reply or answers automatically by
//! running code, calling an LLM, or sending a canned reply.

use std::collections::VecDeque;
use std::io::{BufRead, Write};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::{debug, info};

use crate::error::ColloquyError;
use crate::termination::{EndsWith, TerminationCondition};

use super::assistant::ConventionalReplier;
use super::executor::CodeExecution;
use super::{Replier, ReplyContext};

/// Reply that ends the conversation.
pub const TERMINATE: &str = "TERMINATE";

/// Typed by a human to end the conversation.
const EXIT: &str = "exit";

/// When a human-proxy asks for human input.
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum HumanInputMode {
    /// Ask on every turn.
    #[default]
    Always,
    /// Ask only when the latest message looks like a termination message.
    Terminate,
    /// Never ask; always auto-reply.
    Never,
}

/// Source of human answers.
#[async_trait]
pub trait HumanInput: Send {
    /// Ask for an answer. An empty string means "use the auto-reply".
    async fn ask(&mut self, prompt: &str) -> Result<String, ColloquyError>;
}

/// Reads answers from standard input.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdinInput;

#[async_trait]
impl HumanInput for StdinInput {
    async fn ask(&mut self, prompt: &str) -> Result<String, ColloquyError> {
        let prompt = prompt.to_string();
        tokio::task::spawn_blocking(move || -> Result<String, ColloquyError> {
            let mut stdout = std::io::stdout();
            write!(stdout, "{prompt}")?;
            stdout.flush()?;

            let mut line = String::new();
            let read = std::io::stdin().lock().read_line(&mut line)?;
            // Closed stdin ends the conversation.
            if read == 0 {
                return Ok(EXIT.to_string());
            }
            Ok(line.trim_end_matches(['\r', '\n']).to_string())
        })
        .await
        .map_err(|e| ColloquyError::HumanInput(e.to_string()))?
    }
}

/// Answers from a fixed queue. Once drained every answer is empty.
///
/// Clones share the queue.
#[derive(Debug, Default, Clone)]
pub struct ScriptedInput {
    answers: Arc<Mutex<VecDeque<String>>>,
}

impl ScriptedInput {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: Arc::new(Mutex::new(answers.into_iter().map(Into::into).collect())),
        }
    }

    /// Answers not yet consumed.
    pub fn remaining(&self) -> usize {
        self.answers.lock().map(|q| q.len()).unwrap_or(0)
    }
}

#[async_trait]
impl HumanInput for ScriptedInput {
    async fn ask(&mut self, _prompt: &str) -> Result<String, ColloquyError> {
        let mut answers = self
            .answers
            .lock()
            .map_err(|_| ColloquyError::HumanInput("scripted input poisoned".into()))?;
        Ok(answers.pop_front().unwrap_or_default())
    }
}

/// Replier for the human-proxy role.
pub struct HumanProxyReplier {
    mode: HumanInputMode,
    input: Box<dyn HumanInput>,
    termination: Box<dyn TerminationCondition>,
    default_auto_reply: String,
    max_consecutive_auto_reply: Option<u32>,
    consecutive_auto_replies: u32,
    code_execution: Option<CodeExecution>,
    llm: Option<ConventionalReplier>,
}

impl HumanProxyReplier {
    pub fn new(mode: HumanInputMode, input: Box<dyn HumanInput>) -> Self {
        Self {
            mode,
            input,
            termination: Box::new(EndsWith::terminate()),
            default_auto_reply: String::new(),
            max_consecutive_auto_reply: None,
            consecutive_auto_replies: 0,
            code_execution: None,
            llm: None,
        }
    }

    /// Proxy that never consults a human.
    pub fn automatic() -> Self {
        Self::new(HumanInputMode::Never, Box::new(ScriptedInput::default()))
    }

    /// Predicate deciding whether an incoming message ends the conversation.
    pub fn with_termination(mut self, termination: Box<dyn TerminationCondition>) -> Self {
        self.termination = termination;
        self
    }

    pub fn with_default_auto_reply(mut self, reply: impl Into<String>) -> Self {
        self.default_auto_reply = reply.into();
        self
    }

    pub fn with_max_consecutive_auto_reply(mut self, max: u32) -> Self {
        self.max_consecutive_auto_reply = Some(max);
        self
    }

    pub fn with_code_execution(mut self, execution: CodeExecution) -> Self {
        self.code_execution = Some(execution);
        self
    }

    /// Generate auto-replies with an LLM when no code was run.
    pub fn with_llm(mut self, llm: ConventionalReplier) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn mode(&self) -> HumanInputMode {
        self.mode
    }

    pub fn consecutive_auto_replies(&self) -> u32 {
        self.consecutive_auto_replies
    }

    fn auto_reply_exhausted(&self) -> bool {
        self.max_consecutive_auto_reply
            .is_some_and(|max| self.consecutive_auto_replies >= max)
    }

    async fn auto_reply(&mut self, ctx: &ReplyContext<'_>) -> Result<String, ColloquyError> {
        if self.auto_reply_exhausted() {
            info!(
                speaker = %ctx.profile.name,
                count = self.consecutive_auto_replies,
                "auto-reply limit reached"
            );
            return Ok(TERMINATE.to_string());
        }
        self.consecutive_auto_replies += 1;

        if let Some(execution) = &self.code_execution {
            if let Some(result) = execution.run_latest(ctx.transcript.messages()).await? {
                return Ok(result.to_reply());
            }
        }
        if let Some(llm) = &self.llm {
            return llm.generate(ctx).await;
        }
        Ok(self.default_auto_reply.clone())
    }
}

#[async_trait]
impl Replier for HumanProxyReplier {
    async fn reply(&mut self, ctx: &ReplyContext<'_>) -> Result<String, ColloquyError> {
        let last = ctx.transcript.last();
        let sender = last.map_or("the group", |m| m.speaker.as_str());
        let terminating = match last {
            Some(message) => self.termination.is_termination(message).await?,
            None => false,
        };

        let prompt = match self.mode {
            HumanInputMode::Always => Some(format!(
                "Provide feedback to {sender}. Press enter to skip and use auto-reply, \
                 or type '{EXIT}' to end the conversation: "
            )),
            HumanInputMode::Terminate if terminating || self.auto_reply_exhausted() => {
                Some(format!(
                    "Please give feedback to {sender}. Press enter or type '{EXIT}' \
                     to stop the conversation: "
                ))
            }
            HumanInputMode::Terminate => None,
            HumanInputMode::Never if terminating => return Ok(TERMINATE.to_string()),
            HumanInputMode::Never => None,
        };

        if let Some(prompt) = prompt {
            let answer = self.input.ask(&prompt).await?;
            let answer = answer.trim();
            if answer.eq_ignore_ascii_case(EXIT) {
                return Ok(TERMINATE.to_string());
            }
            if !answer.is_empty() {
                debug!(speaker = %ctx.profile.name, "human answered");
                self.consecutive_auto_replies = 0;
                return Ok(answer.to_string());
            }
            if terminating {
                return Ok(TERMINATE.to_string());
            }
        }

        self.auto_reply(ctx).await
    }

    fn reset(&mut self) {
        self.consecutive_auto_replies = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{Profile, Role};
    use crate::types::{Message, Transcript};
    use uuid::Uuid;

    fn transcript(last: &str) -> Transcript {
        let mut t = Transcript::new();
        t.push(Message::new("assistant", last, 0)).unwrap();
        t
    }

    async fn reply_to(replier: &mut HumanProxyReplier, transcript: &Transcript) -> String {
        let profile = Profile::new("user_proxy", Role::HumanProxy, "");
        let participants = vec![profile.clone()];
        let ctx = ReplyContext {
            run_id: Uuid::nil(),
            profile: &profile,
            participants: &participants,
            transcript,
        };
        replier.reply(&ctx).await.unwrap()
    }

    #[test]
    fn mode_parses_from_config_strings() {
        assert_eq!("always".parse::<HumanInputMode>().unwrap(), HumanInputMode::Always);
        assert_eq!("TERMINATE".parse::<HumanInputMode>().unwrap(), HumanInputMode::Terminate);
        assert_eq!(HumanInputMode::Never.to_string(), "never");
    }

    #[tokio::test]
    async fn always_mode_uses_human_answer() {
        let input = ScriptedInput::new(["looks good"]);
        let mut proxy = HumanProxyReplier::new(HumanInputMode::Always, Box::new(input.clone()));
        assert_eq!(reply_to(&mut proxy, &transcript("plan")).await, "looks good");
        assert_eq!(input.remaining(), 0);
    }

    #[tokio::test]
    async fn empty_answer_falls_back_to_default_auto_reply() {
        let mut proxy =
            HumanProxyReplier::new(HumanInputMode::Always, Box::new(ScriptedInput::new([""])))
                .with_default_auto_reply("continue");
        assert_eq!(reply_to(&mut proxy, &transcript("plan")).await, "continue");
        assert_eq!(proxy.consecutive_auto_replies(), 1);
    }

    #[tokio::test]
    async fn exit_answer_terminates() {
        let mut proxy =
            HumanProxyReplier::new(HumanInputMode::Always, Box::new(ScriptedInput::new(["exit"])));
        assert_eq!(reply_to(&mut proxy, &transcript("plan")).await, TERMINATE);
    }

    #[tokio::test]
    async fn terminate_mode_only_asks_on_termination_message() {
        let input = ScriptedInput::new(["one more thing"]);
        let mut proxy =
            HumanProxyReplier::new(HumanInputMode::Terminate, Box::new(input.clone()))
                .with_default_auto_reply("ok");

        assert_eq!(reply_to(&mut proxy, &transcript("working on it")).await, "ok");
        assert_eq!(input.remaining(), 1);

        assert_eq!(
            reply_to(&mut proxy, &transcript("done. TERMINATE")).await,
            "one more thing"
        );
        assert_eq!(input.remaining(), 0);
    }

    #[tokio::test]
    async fn never_mode_stops_after_max_consecutive_auto_replies() {
        let mut proxy = HumanProxyReplier::automatic()
            .with_default_auto_reply("go on")
            .with_max_consecutive_auto_reply(2);
        let t = transcript("step");

        assert_eq!(reply_to(&mut proxy, &t).await, "go on");
        assert_eq!(reply_to(&mut proxy, &t).await, "go on");
        assert_eq!(reply_to(&mut proxy, &t).await, TERMINATE);

        proxy.reset();
        assert_eq!(reply_to(&mut proxy, &t).await, "go on");
    }

    #[tokio::test]
    async fn never_mode_answers_termination_with_terminate() {
        let mut proxy = HumanProxyReplier::automatic().with_default_auto_reply("go on");
        assert_eq!(reply_to(&mut proxy, &transcript("all done TERMINATE\n")).await, TERMINATE);
    }
}
