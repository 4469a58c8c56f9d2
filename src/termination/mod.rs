//! Termination predicates evaluated on the latest message of a run.

use async_trait::async_trait;

use crate::error::ColloquyError;
use crate::types::Message;

/// A check that ends a group conversation early.
///
/// Returning `Err` marks the message as malformed for this condition; the
/// dispatcher propagates it and the run fails.
#[async_trait]
pub trait TerminationCondition: Send + Sync {
    async fn is_termination(&self, message: &Message) -> Result<bool, ColloquyError>;
}

/// Never terminates; the round limit decides.
pub struct Never;

#[async_trait]
impl TerminationCondition for Never {
    async fn is_termination(&self, _message: &Message) -> Result<bool, ColloquyError> {
        Ok(false)
    }
}

/// Terminate when the content, with trailing whitespace removed, ends with a suffix.
pub struct EndsWith {
    suffix: String,
}

impl EndsWith {
    pub fn new(suffix: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
        }
    }

    /// The conventional `TERMINATE` keyword.
    pub fn terminate() -> Self {
        Self::new("TERMINATE")
    }
}

#[async_trait]
impl TerminationCondition for EndsWith {
    async fn is_termination(&self, message: &Message) -> Result<bool, ColloquyError> {
        Ok(message.content.trim_end().ends_with(&self.suffix))
    }
}

/// Terminate when a specific string is found in the content.
pub struct Contains {
    pattern: String,
}

impl Contains {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
        }
    }
}

#[async_trait]
impl TerminationCondition for Contains {
    async fn is_termination(&self, message: &Message) -> Result<bool, ColloquyError> {
        Ok(message.content.contains(&self.pattern))
    }
}

/// Terminate when a regex pattern matches the content.
pub struct RegexTermination {
    regex: regex::Regex,
}

impl RegexTermination {
    pub fn new(pattern: &str) -> Result<Self, ColloquyError> {
        let regex = regex::Regex::new(pattern)
            .map_err(|e| ColloquyError::InvalidArgument(format!("bad termination regex: {e}")))?;
        Ok(Self { regex })
    }
}

#[async_trait]
impl TerminationCondition for RegexTermination {
    async fn is_termination(&self, message: &Message) -> Result<bool, ColloquyError> {
        Ok(self.regex.is_match(&message.content))
    }
}

/// Terminate when a caller-supplied predicate says so.
pub struct PredicateTermination<F>
where
    F: Fn(&Message) -> Result<bool, ColloquyError> + Send + Sync,
{
    predicate: F,
}

impl<F> PredicateTermination<F>
where
    F: Fn(&Message) -> Result<bool, ColloquyError> + Send + Sync,
{
    pub fn new(predicate: F) -> Self {
        Self { predicate }
    }
}

#[async_trait]
impl<F> TerminationCondition for PredicateTermination<F>
where
    F: Fn(&Message) -> Result<bool, ColloquyError> + Send + Sync,
{
    async fn is_termination(&self, message: &Message) -> Result<bool, ColloquyError> {
        (self.predicate)(message)
    }
}

/// Terminate when any inner condition holds. Conditions run in order and the
/// first error wins.
pub struct AnyOf {
    conditions: Vec<Box<dyn TerminationCondition>>,
}

impl AnyOf {
    pub fn new(conditions: Vec<Box<dyn TerminationCondition>>) -> Self {
        Self { conditions }
    }
}

#[async_trait]
impl TerminationCondition for AnyOf {
    async fn is_termination(&self, message: &Message) -> Result<bool, ColloquyError> {
        for condition in &self.conditions {
            if condition.is_termination(message).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
