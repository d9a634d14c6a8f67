//! Ranking, top-driver explanation, and retention recommendations

use crate::data::AccountRecord;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Hard cap on the driver explanation list
const MAX_DRIVERS: usize = 3;

/// Retention intervention chosen for one at-risk account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendedAction {
    TriggerPaymentRetry,
    OfferDiscount,
    NotifyCsTeam,
}

impl fmt::Display for RecommendedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecommendedAction::TriggerPaymentRetry => write!(f, "trigger_payment_retry"),
            RecommendedAction::OfferDiscount => write!(f, "offer_discount"),
            RecommendedAction::NotifyCsTeam => write!(f, "notify_cs_team"),
        }
    }
}

/// One top-N account with its score, explanation, and recommendation
#[derive(Debug, Clone)]
pub struct RankedAccount {
    pub account: AccountRecord,
    pub score_30d: f64,
    pub top_drivers: Vec<String>,
    pub recommended_action: RecommendedAction,
    pub estimated_saved_revenue: f64,
}

/// Rank accounts by score descending and keep the top `top_n`, enriching
/// each kept row with drivers, a recommended action, and a saved-revenue
/// estimate.
///
/// The sort is stable: rows with equal scores keep their input order.
/// `scores` must align index-for-index with `records`.
pub fn rank_top_accounts(
    records: &[AccountRecord],
    scores: &[f64],
    top_n: usize,
) -> Vec<RankedAccount> {
    let mut order: Vec<usize> = (0..records.len().min(scores.len())).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));
    order.truncate(top_n);

    order
        .into_iter()
        .map(|i| {
            let account = records[i].clone();
            let score_30d = scores[i];
            let top_drivers = top_drivers(&account);
            let recommended_action = choose_action(&account, score_30d);
            let estimated_saved_revenue = estimated_saved_revenue(account.arpu);
            RankedAccount {
                account,
                score_30d,
                top_drivers,
                recommended_action,
                estimated_saved_revenue,
            }
        })
        .collect()
}

/// Short human-readable justifications for a risk score. Three fixed
/// conditions are always evaluated in order; the list is capped at three
/// entries and only mentions drivers whose condition holds.
fn top_drivers(account: &AccountRecord) -> Vec<String> {
    let mut drivers = Vec::new();
    if account.failed_payment_count_90d > 0 {
        drivers.push(format!(
            "{} failed payments in 90d",
            account.failed_payment_count_90d
        ));
    }
    if account.days_since_last_payment < 30 {
        drivers.push(format!(
            "last payment {} days ago",
            account.days_since_last_payment
        ));
    }
    if account.tenure_months < 3.0 {
        drivers.push(format!("low tenure {} months", account.tenure_months as i64));
    }
    drivers.truncate(MAX_DRIVERS);
    drivers
}

/// Ordered decision rule, first match wins
fn choose_action(account: &AccountRecord, score_30d: f64) -> RecommendedAction {
    if account.failed_payment_count_90d >= 2 {
        RecommendedAction::TriggerPaymentRetry
    } else if score_30d > 0.7 {
        RecommendedAction::OfferDiscount
    } else {
        RecommendedAction::NotifyCsTeam
    }
}

/// Illustrative estimate: 25% retention uplift over 3 months of ARPU minus
/// a flat $5 intervention cost. Negative for low-ARPU accounts.
fn estimated_saved_revenue(arpu: f64) -> f64 {
    0.25 * arpu * 3.0 - 5.0
}
