//! ChurnRadar: a Rust CLI for scoring customers' 30-day churn risk from
//! billing attributes.
//!
//! The pipeline is strictly linear: load and validate a billing CSV, impute
//! missing features, score every account (fixed heuristic or an on-the-fly
//! trained gradient-boosted classifier), rank the riskiest accounts with
//! per-account driver explanations and retention recommendations, and
//! optionally publish one account's result to a webhook.

pub mod boost;
pub mod cli;
pub mod data;
pub mod publish;
pub mod rank;
pub mod score;

// Re-export public items for easier access
pub use cli::Args;
pub use data::{load_accounts, AccountRecord, AccountTable, DataError};
pub use publish::{build_payload, publish, DeliveryOutcome, PublishReport, WebhookPayload};
pub use rank::{rank_top_accounts, RankedAccount, RecommendedAction};
pub use score::{score_accounts, FallbackReason, ScoreMethod, ScoreOutcome};

/// Common result type used throughout the application
pub type Result<T> = anyhow::Result<T>;
