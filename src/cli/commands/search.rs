//! Search command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::Result;

/// Run the search command.
pub async fn run_search(query: &str, k: Option<usize>, settings: Settings) -> Result<()> {
    let orchestrator = Orchestrator::new(settings).await?;

    let spinner = Output::spinner("Searching...");
    let results = orchestrator.search(query, k).await;
    spinner.finish_and_clear();

    match results {
        Ok(neighbors) if neighbors.is_empty() => {
            Output::warning("The index is empty.");
        }
        Ok(neighbors) => {
            Output::success(&format!("Found {} results", neighbors.len()));
            for (rank, n) in neighbors.iter().enumerate() {
                Output::search_result(rank + 1, n.distance, &n.text);
            }
        }
        Err(e) => {
            Output::error(&format!("Search failed: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
