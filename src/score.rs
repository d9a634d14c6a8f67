//! Churn-risk scoring: a closed-form heuristic plus an on-the-fly trained
//! gradient-boosted classifier, with an explicit degraded-mode contract.

use crate::boost::{self, BoosterParams};
use crate::data::{AccountRecord, AccountTable};
use clap::ValueEnum;
use ndarray::{Array1, Array2};
use std::fmt;

/// Minimum labeled rows for the trained strategy to be usable
pub const MIN_LABELED_ROWS: usize = 50;

/// Feature order fed to the trained classifier
const FEATURE_COUNT: usize = 5;

/// Caller-selected scoring strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ScoreMethod {
    /// Fixed-formula score requiring no historical labels
    Heuristic,
    /// Gradient-boosted classifier trained on the `churn_30d` label
    Trained,
}

impl fmt::Display for ScoreMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScoreMethod::Heuristic => write!(f, "heuristic"),
            ScoreMethod::Trained => write!(f, "trained"),
        }
    }
}

/// Why a requested trained run degraded to the heuristic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    /// The input carries no `churn_30d` column at all
    MissingLabelColumn,
    /// Fewer labeled rows than `MIN_LABELED_ROWS` after dropping unlabeled ones
    TooFewLabeledRows(usize),
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FallbackReason::MissingLabelColumn => {
                write!(f, "historical label column 'churn_30d' is missing")
            }
            FallbackReason::TooFewLabeledRows(n) => write!(
                f,
                "only {} labeled rows, need at least {}",
                n, MIN_LABELED_ROWS
            ),
        }
    }
}

/// Result of one scoring pass: per-row scores aligned with the input order,
/// the strategy actually applied, and the fallback reason when the request
/// degraded.
#[derive(Debug, Clone)]
pub struct ScoreOutcome {
    pub scores: Vec<f64>,
    pub applied: ScoreMethod,
    pub fallback: Option<FallbackReason>,
}

/// Score every account with the requested strategy.
///
/// The trained strategy degrades to the heuristic when its preconditions
/// fail (no label column, or fewer than `MIN_LABELED_ROWS` labeled rows);
/// the degradation is reported both as a warning and in the returned
/// outcome — it is part of the contract, never silent.
pub fn score_accounts(table: &AccountTable, method: ScoreMethod) -> crate::Result<ScoreOutcome> {
    match method {
        ScoreMethod::Heuristic => Ok(ScoreOutcome {
            scores: heuristic_scores(&table.records),
            applied: ScoreMethod::Heuristic,
            fallback: None,
        }),
        ScoreMethod::Trained => score_trained(table),
    }
}

fn score_trained(table: &AccountTable) -> crate::Result<ScoreOutcome> {
    if !table.has_churn_labels {
        return Ok(degrade(table, FallbackReason::MissingLabelColumn));
    }

    let labeled: Vec<&AccountRecord> = table
        .records
        .iter()
        .filter(|r| r.churn_30d.is_some())
        .collect();
    if labeled.len() < MIN_LABELED_ROWS {
        return Ok(degrade(table, FallbackReason::TooFewLabeledRows(labeled.len())));
    }

    let train_features = feature_matrix(labeled.iter().copied())?;
    let train_labels = Array1::from_iter(labeled.iter().filter_map(|r| r.churn_30d));
    let model = boost::train(&train_features, &train_labels, &BoosterParams::default())?;

    // Every row is scored, labeled or not; no held-out split. The model's
    // probabilities are not clamped — sigmoid output cannot leave (0, 1).
    let all_features = feature_matrix(table.records.iter())?;
    Ok(ScoreOutcome {
        scores: model.predict_proba(&all_features).to_vec(),
        applied: ScoreMethod::Trained,
        fallback: None,
    })
}

fn degrade(table: &AccountTable, reason: FallbackReason) -> ScoreOutcome {
    log::warn!("trained scoring unavailable ({}), falling back to heuristic", reason);
    ScoreOutcome {
        scores: heuristic_scores(&table.records),
        applied: ScoreMethod::Heuristic,
        fallback: Some(reason),
    }
}

/// Closed-form risk score, clamped to [0, 1].
///
/// A whole-table function: the failed-count term is normalized by the
/// column max plus one (the +1 guards division by zero when every count
/// is zero).
fn heuristic_scores(records: &[AccountRecord]) -> Vec<f64> {
    let mx = records
        .iter()
        .map(|r| r.failed_payment_count_90d)
        .max()
        .unwrap_or(0) as f64
        + 1.0;
    records
        .iter()
        .map(|r| {
            let score = 0.5 * (r.failed_payment_count_90d as f64 / mx)
                + 0.4 * r.recent_failed as f64
                + 0.1 * (1.0 / (1.0 + r.days_since_last_payment as f64));
            score.clamp(0.0, 1.0)
        })
        .collect()
}

/// Build the (n_rows, 5) classifier feature matrix in fixed column order:
/// failed count, days since payment, tenure, ARPU, recent-failed flag.
fn feature_matrix<'a, I>(records: I) -> crate::Result<Array2<f64>>
where
    I: Iterator<Item = &'a AccountRecord>,
{
    let mut data = Vec::new();
    let mut n_rows = 0;
    for r in records {
        data.extend_from_slice(&[
            r.failed_payment_count_90d as f64,
            r.days_since_last_payment as f64,
            r.tenure_months,
            r.arpu,
            r.recent_failed as f64,
        ]);
        n_rows += 1;
    }
    Ok(Array2::from_shape_vec((n_rows, FEATURE_COUNT), data)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(user_id: &str, failed: u32, days: u32, tenure: f64, arpu: f64) -> AccountRecord {
        AccountRecord {
            user_id: user_id.to_string(),
            event_date: "2024-01-01".to_string(),
            last_payment_status: "ok".to_string(),
            failed_payment_count_90d: failed,
            days_since_last_payment: days,
            tenure_months: tenure,
            arpu,
            email_token: format!("email-{}", user_id),
            phone_token: format!("phone-{}", user_id),
            recent_failed: u8::from(failed > 0),
            churn_30d: None,
        }
    }

    fn labeled_table(n: usize) -> AccountTable {
        let records = (0..n)
            .map(|i| {
                let mut r = if i % 2 == 0 {
                    record(&format!("u{}", i), 3 + (i % 3) as u32, 2, 1.0, 10.0)
                } else {
                    record(&format!("u{}", i), 0, 120 + i as u32, 36.0, 50.0)
                };
                r.churn_30d = Some(if i % 2 == 0 { 1.0 } else { 0.0 });
                r
            })
            .collect();
        AccountTable {
            records,
            has_churn_labels: true,
        }
    }

    #[test]
    fn test_heuristic_scores_stay_in_unit_interval() {
        let records: Vec<AccountRecord> = (0..50)
            .map(|i| record(&format!("u{}", i), i * 7, i % 40, i as f64, 5.0))
            .collect();
        for score in heuristic_scores(&records) {
            assert!((0.0..=1.0).contains(&score), "score out of range: {}", score);
        }
    }

    #[test]
    fn test_heuristic_zero_counts_zero_first_term() {
        // With every count zero, mx = 1 and the first term contributes
        // nothing; recent_failed is also zero, so only the recency term
        // remains.
        let records = vec![record("a", 0, 9, 12.0, 5.0), record("b", 0, 999, 6.0, 5.0)];
        let scores = heuristic_scores(&records);
        assert!((scores[0] - 0.1 * (1.0 / 10.0)).abs() < 1e-12);
        assert!((scores[1] - 0.1 * (1.0 / 1000.0)).abs() < 1e-12);
    }

    #[test]
    fn test_heuristic_clamps_at_one() {
        // Max count row: 0.5 * (5/6) + 0.4 + 0.1 * (1/1) = 0.9166..
        // stays under 1; a synthetic row cannot exceed the clamp anyway.
        let records = vec![record("a", 5, 0, 1.0, 5.0)];
        let scores = heuristic_scores(&records);
        assert!(scores[0] <= 1.0);
        assert!((scores[0] - (0.5 * (5.0 / 6.0) + 0.4 + 0.1)).abs() < 1e-12);
    }

    #[test]
    fn test_trained_without_label_column_falls_back() {
        let table = AccountTable {
            records: vec![record("a", 1, 5, 2.0, 8.0)],
            has_churn_labels: false,
        };
        let outcome = score_accounts(&table, ScoreMethod::Trained).unwrap();
        assert_eq!(outcome.applied, ScoreMethod::Heuristic);
        assert_eq!(outcome.fallback, Some(FallbackReason::MissingLabelColumn));
        assert_eq!(outcome.scores.len(), 1);
    }

    #[test]
    fn test_trained_with_49_labeled_rows_falls_back() {
        let mut table = labeled_table(49);
        // an extra unlabeled row must not count toward the threshold
        table.records.push(record("extra", 0, 10, 5.0, 20.0));
        let outcome = score_accounts(&table, ScoreMethod::Trained).unwrap();
        assert_eq!(outcome.applied, ScoreMethod::Heuristic);
        assert_eq!(outcome.fallback, Some(FallbackReason::TooFewLabeledRows(49)));
        assert_eq!(outcome.scores.len(), 50);
    }

    #[test]
    fn test_trained_with_50_labeled_rows_trains() {
        let table = labeled_table(50);
        let outcome = score_accounts(&table, ScoreMethod::Trained).unwrap();
        assert_eq!(outcome.applied, ScoreMethod::Trained);
        assert_eq!(outcome.fallback, None);
        assert_eq!(outcome.scores.len(), 50);
        // labeled churners (even indices) should score above non-churners
        let churner_mean: f64 = outcome.scores.iter().step_by(2).sum::<f64>() / 25.0;
        let keeper_mean: f64 = outcome.scores.iter().skip(1).step_by(2).sum::<f64>() / 25.0;
        assert!(churner_mean > keeper_mean);
    }

    #[test]
    fn test_heuristic_request_never_reports_fallback() {
        let table = labeled_table(60);
        let outcome = score_accounts(&table, ScoreMethod::Heuristic).unwrap();
        assert_eq!(outcome.applied, ScoreMethod::Heuristic);
        assert_eq!(outcome.fallback, None);
    }
}
