//! Ask command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::error::GlimpseError;
use crate::orchestrator::Orchestrator;
use crate::tutor::AskRequest;
use anyhow::{Context, Result};
use base64::Engine;
use std::path::Path;

/// Run the ask command.
pub async fn run_ask(
    question: &str,
    k: Option<usize>,
    summary: &str,
    screenshot: &Path,
    settings: Settings,
) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Generate) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let image = tokio::fs::read(screenshot)
        .await
        .with_context(|| format!("Failed to read screenshot {}", screenshot.display()))?;

    let request = AskRequest {
        summary: summary.to_string(),
        current_screenshot: Some(base64::engine::general_purpose::STANDARD.encode(image)),
        k,
        ..AskRequest::new(question)
    };

    let orchestrator = Orchestrator::new(settings).await?;

    let spinner = Output::spinner("Looking through the transcript...");
    let answer = orchestrator.ask(&request).await;
    spinner.finish_and_clear();

    match answer {
        Ok(answer) => println!("\n{}\n", answer),
        Err(GlimpseError::NotInitialized) => {
            Output::error("No video has been processed yet.");
            Output::info("Run 'glimpse process <url>' first.");
            return Err(GlimpseError::NotInitialized.into());
        }
        Err(e) => {
            Output::error(&format!("Failed to generate answer: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
