//! Command-line interface definitions and argument parsing

use crate::score::ScoreMethod;
use clap::Parser;

/// Churn-risk scoring CLI: rank the riskiest accounts in a billing CSV and
/// optionally publish one account's result to a webhook
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the input CSV file; the repo sample is used by default
    #[arg(short, long, default_value = "sample_data.csv")]
    pub input: String,

    /// Scoring strategy; `trained` degrades to `heuristic` with a warning
    /// when the churn_30d label is missing or too sparse
    #[arg(short, long, value_enum, default_value_t = ScoreMethod::Heuristic)]
    pub method: ScoreMethod,

    /// How many top-risk accounts to show, between 1 and 100
    #[arg(short = 'n', long, default_value_t = 10)]
    pub top: usize,

    /// Webhook endpoint for publishing one account's result
    #[arg(long)]
    pub webhook_url: Option<String>,

    /// user_id (within the top-N set) to publish
    #[arg(long)]
    pub publish: Option<String>,

    /// Timeout for the webhook POST, in seconds
    #[arg(long, default_value_t = 10)]
    pub timeout_secs: u64,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Validate cross-argument constraints before the pipeline runs
    pub fn validate(&self) -> crate::Result<()> {
        if !(1..=100).contains(&self.top) {
            anyhow::bail!("top N must be between 1 and 100, got {}", self.top);
        }
        if self.publish.is_some() != self.webhook_url.is_some() {
            anyhow::bail!("publishing requires both --webhook-url and --publish");
        }
        Ok(())
    }
}
