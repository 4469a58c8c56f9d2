//! colloquy CLI binary entry point.

use colloquy::cli::commands::{handle_memory, handle_presets, handle_run, load_config};
use colloquy::cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse_args();

    let result = match load_config(cli.config.as_deref()) {
        Ok(config) => match cli.command {
            Commands::Run(args) => handle_run(args, &config).await,
            Commands::Presets => {
                handle_presets();
                Ok(())
            }
            Commands::Memory(memory) => handle_memory(memory.command, &config),
        },
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
