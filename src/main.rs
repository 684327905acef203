// src/main.rs — timeslip entry point

use clap::Parser;

use timeslip::cli::{self, Cli, Commands};
use timeslip::infra::config::Config;
use timeslip::infra::logger;

#[tokio::main]
async fn main() {
    // Respects RUST_LOG / TIMESLIP_LOG; logs go to stderr
    logger::init_logging("info");

    if let Err(e) = run().await {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Falls back to defaults if no config.toml
    let config = if let Some(ref path) = cli.config {
        Config::load_from(std::path::Path::new(path))?
    } else {
        Config::load()?
    };

    match cli.command {
        Commands::Serve { port } => cli::serve::run_serve(&config, port).await,
        Commands::Summarize {
            file,
            elapsed_ms,
            tone,
        } => cli::summarize::run_summarize(&config, &file, elapsed_ms, tone.as_deref()).await,
        Commands::Track {
            server,
            to,
            subject,
            matter,
        } => cli::track::run_track(&config, &server, &to, &subject, matter).await,
        Commands::Config => {
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}
