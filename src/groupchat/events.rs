//! Run state and event types for the group dispatcher.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strum::Display;
use uuid::Uuid;

use crate::types::{Message, Transcript};

/// Unique run identifier.
pub type RunId = Uuid;

/// Dispatcher lifecycle state.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RunState {
    /// No run has started yet.
    #[default]
    Idle,
    Running,
    TerminatedByPredicate,
    TerminatedByRoundLimit,
    Failed,
}

impl RunState {
    /// Whether the run ended normally.
    pub fn is_terminated(self) -> bool {
        matches!(
            self,
            RunState::TerminatedByPredicate | RunState::TerminatedByRoundLimit
        )
    }
}

/// Result of a completed run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunOutcome {
    pub run_id: RunId,
    pub status: RunState,
    pub transcript: Transcript,
}

/// Events emitted while a run progresses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    RunStarted {
        run_id: RunId,
        initial: Message,
    },
    SpeakerSelected {
        run_id: RunId,
        turn_index: u64,
        speaker: String,
    },
    MessageAppended {
        run_id: RunId,
        message: Message,
    },
    RunFinished {
        run_id: RunId,
        status: RunState,
        messages: usize,
    },
    RunFailed {
        run_id: RunId,
        error: String,
    },
}

/// Callback receiving [`ChatEvent`]s.
pub type EventSink = Arc<dyn Fn(ChatEvent) + Send + Sync>;
