//! CLI module for Glimpse.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};

/// Glimpse - ask questions about a video
///
/// Index a video's transcript, get a summary and quiz questions, and ask
/// follow-up questions answered from the most relevant transcript passages
/// and the paused frame.
#[derive(Parser, Debug)]
#[command(name = "glimpse")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true, env = "GLIMPSE_CONFIG")]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch a video's transcript (or load a transcript file), summarize and index it
    Process {
        /// YouTube URL/ID, or a local .txt/.vtt transcript
        input: String,

        /// Write the full result as JSON instead of a summary
        #[arg(long)]
        json: bool,
    },

    /// Ask a question about the indexed video
    Ask {
        /// The question to ask
        question: String,

        /// Number of transcript chunks to retrieve
        #[arg(short, long)]
        k: Option<usize>,

        /// Video summary to include as context
        #[arg(short, long, default_value = "")]
        summary: String,

        /// JPEG of the current video frame
        #[arg(long)]
        screenshot: String,
    },

    /// Show the transcript chunks closest to a query
    Search {
        /// Search query
        query: String,

        /// Maximum number of results
        #[arg(short, long)]
        k: Option<usize>,
    },

    /// Get feedback on an answer to a quiz question
    Evaluate {
        /// The quiz question
        question: String,

        /// The learner's answer
        answer: String,

        /// Extra context, such as the video summary
        #[arg(long, default_value = "")]
        context: String,
    },

    /// Start the HTTP API server
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "5000")]
        port: u16,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,

    /// Write the default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ask() {
        let cli = Cli::parse_from([
            "glimpse",
            "-vv",
            "ask",
            "What is on the slide?",
            "-k",
            "5",
            "--screenshot",
            "frame.jpg",
        ]);

        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Ask {
                question,
                k,
                summary,
                screenshot,
            } => {
                assert_eq!(question, "What is on the slide?");
                assert_eq!(k, Some(5));
                assert!(summary.is_empty());
                assert_eq!(screenshot, "frame.jpg");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_serve_defaults() {
        let cli = Cli::parse_from(["glimpse", "serve"]);
        match cli.command {
            Commands::Serve { host, port } => {
                assert_eq!(host, "127.0.0.1");
                assert_eq!(port, 5000);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
