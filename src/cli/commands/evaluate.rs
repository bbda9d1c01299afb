//! Evaluate command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::Result;

/// Run the evaluate command.
pub async fn run_evaluate(
    question: &str,
    answer: &str,
    context: &str,
    settings: Settings,
) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Generate) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let orchestrator = Orchestrator::new(settings).await?;

    let spinner = Output::spinner("Reviewing your answer...");
    let feedback = orchestrator.evaluate(question, answer, context).await;
    spinner.finish_and_clear();

    match feedback {
        Ok(feedback) => {
            Output::header("Feedback");
            println!("{}\n", feedback);
        }
        Err(e) => {
            Output::error(&format!("Evaluation failed: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
