// src/cli/mod.rs — CLI definition (clap derive)

pub mod serve;
pub mod summarize;
pub mod track;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "timeslip",
    about = "Composition time tracking and billing narratives for email",
    version
)]
pub struct Cli {
    /// Config file path
    #[arg(long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the tracking API server
    Serve {
        /// Port to listen on (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Preview the billing summary for a draft without a server
    Summarize {
        /// File holding the draft text ("-" for stdin)
        #[arg(short, long)]
        file: String,
        /// Composing time to bill, in milliseconds
        #[arg(long)]
        elapsed_ms: u64,
        /// Narrative tone (defaults to billing.default_tone)
        #[arg(long)]
        tone: Option<String>,
    },
    /// Track a draft typed on stdin against a running server
    Track {
        /// Server base URL
        #[arg(long, default_value = "http://127.0.0.1:7878")]
        server: String,
        #[arg(long)]
        to: String,
        #[arg(long)]
        subject: String,
        /// Matter reference for the time entry
        #[arg(long)]
        matter: Option<String>,
    },
    /// Print the effective configuration
    Config,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_serve_with_port() {
        let cli = Cli::parse_from(["timeslip", "serve", "--port", "9000"]);
        assert!(matches!(cli.command, Commands::Serve { port: Some(9000) }));
    }

    #[test]
    fn test_parse_summarize() {
        let cli = Cli::parse_from([
            "timeslip",
            "--config",
            "/tmp/t.toml",
            "summarize",
            "--file",
            "draft.txt",
            "--elapsed-ms",
            "180000",
        ]);
        assert_eq!(cli.config.as_deref(), Some("/tmp/t.toml"));
        match cli.command {
            Commands::Summarize {
                file,
                elapsed_ms,
                tone,
            } => {
                assert_eq!(file, "draft.txt");
                assert_eq!(elapsed_ms, 180_000);
                assert!(tone.is_none());
            }
            _ => panic!("expected summarize"),
        }
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Cli::try_parse_from(["timeslip"]).is_err());
    }
}
