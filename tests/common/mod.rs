//! Shared test helpers: scripted repliers and a mock backend.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use colloquy::agent::{Participant, Profile, Replier, ReplyContext, Role};
use colloquy::backend::{ChatBackend, ChatRequest, ChatResponse, Usage};
use colloquy::error::ColloquyError;

/// Replies from a queue; once drained, replies `"<name> says <turn>"`.
pub struct ScriptedReplier {
    replies: VecDeque<String>,
    calls: Arc<Mutex<u32>>,
}

impl ScriptedReplier {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: replies.into_iter().map(Into::into).collect(),
            calls: Arc::new(Mutex::new(0)),
        }
    }

    pub fn silent() -> Self {
        Self::new(Vec::<String>::new())
    }

    /// Shared call counter.
    pub fn calls(&self) -> Arc<Mutex<u32>> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl Replier for ScriptedReplier {
    async fn reply(&mut self, ctx: &ReplyContext<'_>) -> Result<String, ColloquyError> {
        *self.calls.lock().unwrap() += 1;
        Ok(self.replies.pop_front().unwrap_or_else(|| {
            format!(
                "{} says {}",
                ctx.profile.name,
                ctx.transcript.next_turn_index()
            )
        }))
    }
}

/// Fails with a rate-limit error for the first `failures` calls, then
/// replies `"recovered"`.
pub struct FlakyReplier {
    failures: u32,
    calls: Arc<Mutex<u32>>,
}

impl FlakyReplier {
    pub fn new(failures: u32) -> Self {
        Self {
            failures,
            calls: Arc::new(Mutex::new(0)),
        }
    }

    pub fn calls(&self) -> Arc<Mutex<u32>> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl Replier for FlakyReplier {
    async fn reply(&mut self, _ctx: &ReplyContext<'_>) -> Result<String, ColloquyError> {
        let mut calls = self.calls.lock().unwrap();
        *calls += 1;
        if *calls <= self.failures {
            return Err(ColloquyError::RateLimited {
                retry_after_ms: None,
            });
        }
        Ok("recovered".to_string())
    }
}

/// Always fails with an API error.
pub struct FailingReplier;

#[async_trait]
impl Replier for FailingReplier {
    async fn reply(&mut self, _ctx: &ReplyContext<'_>) -> Result<String, ColloquyError> {
        Err(ColloquyError::api(500, "backend exploded"))
    }
}

/// Always fails with an authentication error, counting calls.
#[derive(Default)]
pub struct RejectedReplier {
    calls: Arc<Mutex<u32>>,
}

impl RejectedReplier {
    pub fn calls(&self) -> Arc<Mutex<u32>> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl Replier for RejectedReplier {
    async fn reply(&mut self, _ctx: &ReplyContext<'_>) -> Result<String, ColloquyError> {
        *self.calls.lock().unwrap() += 1;
        Err(ColloquyError::Authentication("bad-key".to_string()))
    }
}

/// Never answers.
pub struct HangingReplier;

#[async_trait]
impl Replier for HangingReplier {
    async fn reply(&mut self, _ctx: &ReplyContext<'_>) -> Result<String, ColloquyError> {
        std::future::pending::<()>().await;
        Ok(String::new())
    }
}

pub fn assistant(name: &str, replier: impl Replier + 'static) -> Participant {
    Participant::new(Profile::new(name, Role::Assistant, ""), Box::new(replier))
}

pub fn scripted(name: &str) -> Participant {
    assistant(name, ScriptedReplier::silent())
}

/// A backend returning canned completions and recording requests.
#[derive(Clone, Default)]
pub struct ScriptedBackend {
    responses: Arc<Mutex<VecDeque<String>>>,
    requests: Arc<Mutex<Vec<ChatRequest>>>,
}

impl ScriptedBackend {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: Arc::new(Mutex::new(responses.into_iter().map(Into::into).collect())),
            requests: Arc::default(),
        }
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    fn model_id(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, ColloquyError> {
        self.requests.lock().unwrap().push(request.clone());
        let content = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| "Mock response".to_string());
        Ok(ChatResponse {
            content,
            usage: Usage::default(),
            finish_reason: Some("stop".to_string()),
        })
    }
}
