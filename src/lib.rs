//! Glimpse - ask questions about the video you are watching
//!
//! Glimpse fetches a video's transcript, writes a summary and quiz questions,
//! and answers follow-up questions from the transcript passages closest to
//! the question together with the paused video frame.
//!
//! # Architecture
//!
//! - `transcript` - YouTube captions and local transcript files
//! - `chunking` - Overlapping word windows over a transcript
//! - `embedding` - Embedding providers and batched dispatch
//! - `vector_store` - Nearest-neighbour indexes (in memory, SQLite)
//! - `retrieval` - The active index and its build-then-swap replacement
//! - `tutor` - Study guides, answers and answer feedback from a chat model
//! - `orchestrator` - Ties the pieces together for one session
//! - `cli` - Command line and HTTP front ends
//!
//! # Example
//!
//! ```rust,no_run
//! use glimpse::config::Settings;
//! use glimpse::orchestrator::Orchestrator;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let orchestrator = Orchestrator::new(settings).await?;
//!
//!     let result = orchestrator.process_video("dQw4w9WgXcQ").await?;
//!     println!("Indexed {} chunks", result.chunks_indexed);
//!     println!("{}", result.summary);
//!
//!     Ok(())
//! }
//! ```

pub mod chunking;
pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod openai;
pub mod orchestrator;
pub mod retrieval;
pub mod transcript;
pub mod tutor;
pub mod vector_store;

pub use error::{GlimpseError, Result};
