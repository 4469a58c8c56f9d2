//! CLI command handlers.

use std::path::Path;
use std::sync::Arc;

use crate::agent::{FileMemoryStore, MemoryStore};
use crate::config::ColloquyConfig;
use crate::error::ColloquyError;
use crate::groupchat::{ChatEvent, EventSink};
use crate::scenario::{presets, BuildOptions, Scenario};

use super::{MemoryCommands, RunArgs};

/// Load configuration from `path`, or discover it.
pub fn load_config(path: Option<&Path>) -> Result<ColloquyConfig, ColloquyError> {
    match path {
        Some(path) => ColloquyConfig::load(path),
        None => ColloquyConfig::discover(),
    }
}

/// Prints each message as `speaker (turn N): content`.
pub fn print_sink() -> EventSink {
    Arc::new(|event: ChatEvent| match event {
        ChatEvent::RunStarted { initial, .. } => {
            println!("{} (turn {}): {}", initial.speaker, initial.turn_index, initial.content);
        }
        ChatEvent::MessageAppended { message, .. } => {
            println!("{} (turn {}): {}", message.speaker, message.turn_index, message.content);
        }
        ChatEvent::RunFinished {
            status, messages, ..
        } => {
            eprintln!("-- {status} after {messages} messages");
        }
        ChatEvent::RunFailed { error, .. } => {
            eprintln!("-- failed: {error}");
        }
        ChatEvent::SpeakerSelected { .. } => {}
    })
}

/// Handle `colloquy run`.
pub async fn handle_run(args: RunArgs, config: &ColloquyConfig) -> Result<(), ColloquyError> {
    let mut scenario = match (&args.preset, &args.scenario) {
        (Some(name), _) => presets::preset(name).ok_or_else(|| {
            ColloquyError::InvalidArgument(format!(
                "unknown preset '{name}' (available: {})",
                presets::names().collect::<Vec<_>>().join(", ")
            ))
        })?,
        (None, Some(path)) => Scenario::load(path)?,
        (None, None) => {
            return Err(ColloquyError::InvalidArgument(
                "pass --preset or --scenario".into(),
            ))
        }
    };
    if let Some(message) = args.message {
        scenario.message = message;
    }
    if let Some(max_rounds) = args.max_rounds {
        scenario.max_rounds = max_rounds;
    }
    if args.save_memory {
        scenario.save_all_memory();
    }

    let options = if args.non_interactive {
        BuildOptions::non_interactive()
    } else {
        BuildOptions::interactive()
    }
    .with_event_sink(print_sink());

    let (mut chat, kickoff) = scenario.build(config, &options)?;
    chat.run(&kickoff.initiator, kickoff.message).await?;
    Ok(())
}

/// Handle `colloquy presets`.
pub fn handle_presets() {
    for (name, description) in presets::PRESETS {
        println!("{name:<16}{description}");
    }
}

/// Handle `colloquy memory ...`.
pub fn handle_memory(command: MemoryCommands, config: &ColloquyConfig) -> Result<(), ColloquyError> {
    let store = FileMemoryStore::new(config.memory_dir());
    match command {
        MemoryCommands::Show { name } => match store.load(&name)? {
            Some(state) => {
                println!("{}", serde_json::to_string_pretty(&state)?);
                Ok(())
            }
            None => Err(ColloquyError::Memory(format!(
                "no stored memory for '{name}' in {}",
                store.base_dir().display()
            ))),
        },
        MemoryCommands::Clear { name } => {
            store.clear(&name)?;
            println!("cleared memory for {name}");
            Ok(())
        }
        MemoryCommands::List => {
            for name in store.list()? {
                println!("{name}");
            }
            Ok(())
        }
    }
}
