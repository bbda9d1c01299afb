//! CLI command implementations.

mod ask;
mod config;
mod evaluate;
mod process;
mod search;
mod serve;

pub use ask::run_ask;
pub use config::run_config;
pub use evaluate::run_evaluate;
pub use process::run_process;
pub use search::run_search;
pub use serve::run_serve;
