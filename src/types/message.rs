//! Conversation messages and the append-only transcript.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ColloquyError;

/// One message in a group conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    /// Name of the participant who authored the message.
    pub speaker: String,
    pub content: String,
    /// Position in the transcript; the opening message is turn 0.
    pub turn_index: u64,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(speaker: impl Into<String>, content: impl Into<String>, turn_index: u64) -> Self {
        Self {
            speaker: speaker.into(),
            content: content.into(),
            turn_index,
            timestamp: Utc::now(),
        }
    }
}

/// Ordered, append-only history of a single run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message. Its `turn_index` must follow the last one by exactly 1
    /// (or be 0 on an empty transcript).
    pub fn push(&mut self, message: Message) -> Result<(), ColloquyError> {
        let expected = self.next_turn_index();
        if message.turn_index != expected {
            return Err(ColloquyError::InvalidState(format!(
                "turn_index {} out of sequence, expected {expected}",
                message.turn_index
            )));
        }
        self.messages.push(message);
        Ok(())
    }

    /// Turn index the next appended message must carry.
    pub fn next_turn_index(&self) -> u64 {
        self.messages.last().map_or(0, |m| m.turn_index + 1)
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn first(&self) -> Option<&Message> {
        self.messages.first()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Messages produced by replies, i.e. everything after the opening message.
    pub fn appended(&self) -> &[Message] {
        self.messages.get(1..).unwrap_or(&[])
    }

    /// The trailing `n` messages (fewer if the transcript is shorter).
    pub fn last_n(&self, n: usize) -> &[Message] {
        let start = self.messages.len().saturating_sub(n);
        &self.messages[start..]
    }

    /// Speaker names in transcript order.
    pub fn speakers(&self) -> Vec<&str> {
        self.messages.iter().map(|m| m.speaker.as_str()).collect()
    }

    pub(crate) fn clear(&mut self) {
        self.messages.clear();
    }
}

impl<'a> IntoIterator for &'a Transcript {
    type Item = &'a Message;
    type IntoIter = std::slice::Iter<'a, Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_enforces_consecutive_turns() {
        let mut transcript = Transcript::new();
        transcript.push(Message::new("Admin", "hi", 0)).unwrap();
        transcript.push(Message::new("Engineer", "hello", 1)).unwrap();

        let err = transcript
            .push(Message::new("Executor", "skipped", 3))
            .unwrap_err();
        assert!(matches!(err, ColloquyError::InvalidState(_)));
        assert_eq!(transcript.len(), 2);
    }

    #[test]
    fn first_message_must_be_turn_zero() {
        let mut transcript = Transcript::new();
        assert!(transcript.push(Message::new("Admin", "hi", 1)).is_err());
        assert!(transcript.is_empty());
    }

    #[test]
    fn appended_and_last_n() {
        let mut transcript = Transcript::new();
        assert!(transcript.appended().is_empty());
        for (i, speaker) in ["a", "b", "c", "d"].iter().enumerate() {
            transcript
                .push(Message::new(*speaker, "x", i as u64))
                .unwrap();
        }
        assert_eq!(transcript.appended().len(), 3);
        assert_eq!(transcript.last_n(2)[0].speaker, "c");
        assert_eq!(transcript.last_n(10).len(), 4);
        assert_eq!(transcript.speakers(), vec!["a", "b", "c", "d"]);
    }
}
