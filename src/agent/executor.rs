//! Code execution for human-proxy participants.
//!
//! Fenced code blocks are pulled out of recent messages and run locally with
//! `sh` or `python3` inside a working directory. There is no sandbox.

use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, info};

use crate::error::ColloquyError;
use crate::types::Message;

const OUTPUT_MAX_BYTES: usize = 32_768;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// A fenced code block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock {
    /// Language tag; empty when the fence had none.
    pub language: String,
    pub code: String,
}

/// Outcome of running one or more code blocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub exit_code: i32,
    pub output: String,
}

impl ExecutionResult {
    /// Reply text posted back into the conversation.
    pub fn to_reply(&self) -> String {
        let status = if self.exit_code == 0 {
            "execution succeeded"
        } else {
            "execution failed"
        };
        format!(
            "exitcode: {} ({status})\nCode output: {}",
            self.exit_code, self.output
        )
    }
}

fn code_block_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)```[ \t]*([\w+-]*)[ \t]*\r?\n(.*?)\r?\n?```")
            .unwrap_or_else(|e| panic!("code block regex is valid: {e}"))
    })
}

/// Extract fenced code blocks in order of appearance.
pub fn extract_code_blocks(text: &str) -> Vec<CodeBlock> {
    code_block_regex()
        .captures_iter(text)
        .map(|caps| CodeBlock {
            language: caps
                .get(1)
                .map(|m| m.as_str().to_ascii_lowercase())
                .unwrap_or_default(),
            code: caps
                .get(2)
                .map(|m| m.as_str().to_string())
                .unwrap_or_default(),
        })
        .filter(|block| !block.code.trim().is_empty())
        .collect()
}

/// Runs code blocks on behalf of a participant.
#[async_trait]
pub trait CodeExecutor: Send + Sync {
    async fn execute(&self, blocks: &[CodeBlock]) -> Result<ExecutionResult, ColloquyError>;
}

/// Executes blocks as local processes in `work_dir`.
#[derive(Debug, Clone)]
pub struct LocalExecutor {
    work_dir: PathBuf,
    timeout: Duration,
}

impl LocalExecutor {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn work_dir(&self) -> &std::path::Path {
        &self.work_dir
    }

    fn command_for(language: &str) -> Option<(&'static str, &'static str)> {
        match language {
            "sh" | "bash" | "shell" | "console" => Some(("sh", "-c")),
            "" | "python" | "python3" | "py" => Some(("python3", "-c")),
            _ => None,
        }
    }

    async fn run_block(&self, block: &CodeBlock) -> Result<ExecutionResult, ColloquyError> {
        let Some((program, flag)) = Self::command_for(&block.language) else {
            return Ok(ExecutionResult {
                exit_code: 1,
                output: format!("unknown language {}", block.language),
            });
        };

        debug!(language = %block.language, work_dir = %self.work_dir.display(), "running code block");

        let result = tokio::time::timeout(
            self.timeout,
            tokio::process::Command::new(program)
                .arg(flag)
                .arg(&block.code)
                .current_dir(&self.work_dir)
                .kill_on_drop(true)
                .output(),
        )
        .await;

        let output = match result {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(ColloquyError::CodeExecution(format!("{program}: {e}")));
            }
            Err(_) => {
                return Ok(ExecutionResult {
                    exit_code: 1,
                    output: format!("Timeout after {}s", self.timeout.as_secs()),
                });
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        Ok(ExecutionResult {
            exit_code: output.status.code().unwrap_or(1),
            output: truncate_utf8(&format!("{stdout}{stderr}"), OUTPUT_MAX_BYTES),
        })
    }
}

#[async_trait]
impl CodeExecutor for LocalExecutor {
    /// Blocks run in order; the first failure stops the sequence.
    async fn execute(&self, blocks: &[CodeBlock]) -> Result<ExecutionResult, ColloquyError> {
        tokio::fs::create_dir_all(&self.work_dir).await?;

        let mut combined = String::new();
        for block in blocks {
            let result = self.run_block(block).await?;
            combined.push_str(&result.output);
            if result.exit_code != 0 {
                return Ok(ExecutionResult {
                    exit_code: result.exit_code,
                    output: combined,
                });
            }
        }
        Ok(ExecutionResult {
            exit_code: 0,
            output: combined,
        })
    }
}

/// Code execution settings of a human proxy.
pub struct CodeExecution {
    /// How many trailing messages are scanned for code.
    pub last_n_messages: usize,
    pub executor: Box<dyn CodeExecutor>,
}

impl CodeExecution {
    pub fn new(last_n_messages: usize, executor: Box<dyn CodeExecutor>) -> Self {
        Self {
            last_n_messages,
            executor,
        }
    }

    /// Run the code of the most recent message (within the window) that has
    /// any. `None` when no code block was found.
    pub async fn run_latest(
        &self,
        messages: &[Message],
    ) -> Result<Option<ExecutionResult>, ColloquyError> {
        let start = messages.len().saturating_sub(self.last_n_messages);
        for message in messages[start..].iter().rev() {
            let blocks = extract_code_blocks(&message.content);
            if blocks.is_empty() {
                continue;
            }
            info!(
                author = %message.speaker,
                blocks = blocks.len(),
                "executing code"
            );
            return self.executor.execute(&blocks).await.map(Some);
        }
        Ok(None)
    }
}

fn truncate_utf8(s: &str, max_bytes: usize) -> String {
    if s.len() <= max_bytes {
        return s.to_string();
    }

    let mut cutoff = max_bytes;
    while cutoff > 0 && !s.is_char_boundary(cutoff) {
        cutoff -= 1;
    }
    format!("{}\n... (truncated)", &s[..cutoff])
}
