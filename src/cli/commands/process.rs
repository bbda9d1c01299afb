//! Process command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::{Orchestrator, ProcessResult};
use crate::transcript::{format_timestamp, LocalSource, TranscriptSource};
use anyhow::Result;

/// Run the process command.
pub async fn run_process(input: &str, json: bool, settings: Settings) -> Result<()> {
    let operation = if LocalSource::new().extract_id(input).is_some() {
        Operation::ProcessFile
    } else {
        Operation::ProcessVideo
    };

    if let Err(e) = preflight::check(operation) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let orchestrator = Orchestrator::new(settings).await?;

    let spinner = Output::spinner("Fetching transcript and building the index...");
    let result = orchestrator.process_video(input).await;
    spinner.finish_and_clear();

    let result = match result {
        Ok(result) => result,
        Err(e) => {
            Output::error(&format!("Processing failed: {}", e));
            return Err(e.into());
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    print_result(&result);
    Ok(())
}

fn print_result(result: &ProcessResult) {
    Output::success(&format!(
        "Indexed {} ({} chunks)",
        result.video_id, result.chunks_indexed
    ));
    if let Some(duration) = result.duration_seconds {
        Output::kv("Duration", &format_timestamp(duration));
    }

    Output::header("Summary");
    println!("{}", result.summary);

    if !result.quiz_questions.is_empty() {
        Output::header("Quiz");
        for q in &result.quiz_questions {
            Output::list_item(&format!(
                "[{}] {}",
                quiz_position(q.timestamp, result.duration_seconds),
                q.question
            ));
        }
    }
}

/// Where in the video a quiz question belongs, as a clock time when known.
fn quiz_position(percent: f64, duration: Option<f64>) -> String {
    match duration {
        Some(d) => format_timestamp(d * percent / 100.0),
        None => format!("{:.0}%", percent),
    }
}
