//! ChurnRadar entrypoint: one invocation is one stateless pass over the
//! input table — load, score, rank, recommend, optionally publish.

use anyhow::Result;
use churnradar::{
    build_payload, load_accounts, publish, rank_top_accounts, score_accounts, Args,
    DeliveryOutcome, RankedAccount,
};
use clap::Parser;
use std::time::{Duration, Instant};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();
    args.validate()?;

    if args.verbose {
        println!("ChurnRadar - 30-day churn risk scoring");
        println!("======================================\n");
    }

    let start_time = Instant::now();

    // Step 1: Load and validate the billing table
    if args.verbose {
        println!("Step 1: Loading input table");
        println!("  Input file: {}", args.input);
    }
    let table = load_accounts(&args.input)?;
    println!("✓ Data loaded: {} accounts", table.len());
    if args.verbose && table.has_churn_labels {
        println!("  Labeled rows (churn_30d): {}", table.labeled_count());
    }

    // Step 2: Score every account
    if args.verbose {
        println!("\nStep 2: Scoring ({} requested)", args.method);
    }
    let outcome = score_accounts(&table, args.method)?;
    if let Some(reason) = &outcome.fallback {
        println!("! Requested trained scoring unavailable: {}", reason);
    }
    println!("✓ Scored with the {} strategy", outcome.applied);

    // Step 3: Rank, explain, recommend
    let top = rank_top_accounts(&table.records, &outcome.scores, args.top);
    print_top_accounts(&top);

    // Step 4: Publish one account, when requested
    if let (Some(user_id), Some(url)) = (&args.publish, &args.webhook_url) {
        publish_account(&top, user_id, url, Duration::from_secs(args.timeout_secs))?;
    }

    if args.verbose {
        println!(
            "\nTotal processing time: {:.2}s",
            start_time.elapsed().as_secs_f64()
        );
    }

    Ok(())
}

fn print_top_accounts(top: &[RankedAccount]) {
    println!("\n=== Top-risk accounts ===");
    println!(
        "{:<16} {:>8} {:<24} {:>10}  drivers",
        "user_id", "score", "action", "est_saved"
    );
    for account in top {
        println!(
            "{:<16} {:>8.3} {:<24} {:>10.2}  {}",
            account.account.user_id,
            account.score_30d,
            account.recommended_action.to_string(),
            account.estimated_saved_revenue,
            account.top_drivers.join("; "),
        );
    }
}

fn publish_account(
    top: &[RankedAccount],
    user_id: &str,
    url: &str,
    timeout: Duration,
) -> Result<()> {
    let account = top
        .iter()
        .find(|a| a.account.user_id == user_id)
        .ok_or_else(|| {
            anyhow::anyhow!("user '{}' is not in the top-{} set", user_id, top.len())
        })?;

    println!("\n=== Publishing {} to {} ===", user_id, url);
    let report = publish(build_payload(account), url, timeout);
    match &report.outcome {
        DeliveryOutcome::Delivered(status) => {
            println!("✓ Published. Webhook status: {}", status);
        }
        DeliveryOutcome::Failed(message) => {
            println!("✗ Publish failed: {}", message);
            println!("  Payload shown below for manual replay.");
        }
    }
    println!("{}", serde_json::to_string_pretty(&report.payload)?);

    Ok(())
}
