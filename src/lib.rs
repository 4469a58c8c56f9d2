//! colloquy: group conversations between LLM agents
//!
//! A [`groupchat::GroupChat`] drives a turn-based conversation between
//! named participants: LLM assistants, human proxies that can run code, and
//! memory-augmented assistants that keep their own long-term memory.
//! Speakers are picked round-robin or by a model, and the run stops on a
//! termination predicate or a round limit.
//!
//! # Quick Start
//!
//! ```no_run
//! use colloquy::prelude::*;
//!
//! # async fn example() -> colloquy::error::Result<()> {
//! let config = ColloquyConfig::from_env()?;
//! let scenario = colloquy::scenario::presets::product_team();
//! let (mut chat, kickoff) = scenario.build(&config, &BuildOptions::non_interactive())?;
//! let outcome = chat.run(&kickoff.initiator, kickoff.message).await?;
//! for message in &outcome.transcript {
//!     println!("{}: {}", message.speaker, message.content);
//! }
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod backend;
pub mod config;
pub mod error;
pub mod groupchat;
pub mod models;
pub mod prelude;
pub mod scenario;
pub mod termination;
pub mod types;
pub mod util;

#[cfg(feature = "cli")]
pub mod cli;
