//! Integration tests for ChurnRadar

use churnradar::{
    build_payload, load_accounts, rank_top_accounts, score_accounts, DataError, FallbackReason,
    ScoreMethod,
};
use std::io::Write;
use tempfile::NamedTempFile;

const HEADER: &str = "user_id,event_date,last_payment_status,failed_payment_count_90d,days_since_last_payment,tenure_months,ARPU,email_token,phone_token";

/// Small unlabeled table: one clear churner, one swing account, one healthy
fn create_unlabeled_csv() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "{}", HEADER).unwrap();
    writeln!(file, "risky,2024-06-01,failed,4,2,1.5,20.0,em_r,ph_r").unwrap();
    writeln!(file, "swing,2024-06-02,retrying,1,10,2.0,8.0,em_s,ph_s").unwrap();
    writeln!(file, "healthy,2024-06-03,ok,0,90,48.0,55.0,em_h,ph_h").unwrap();
    file
}

/// Labeled table with `labeled` labeled rows plus one unlabeled row.
/// Even rows are churners with heavy failure signals.
fn create_labeled_csv(labeled: usize) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "{},churn_30d", HEADER).unwrap();
    for i in 0..labeled {
        if i % 2 == 0 {
            writeln!(
                file,
                "churn{i},2024-06-01,failed,{},3,1.0,12.0,em_{i},ph_{i},1",
                2 + i % 4
            )
            .unwrap();
        } else {
            writeln!(
                file,
                "keep{i},2024-06-01,ok,0,{},36.0,45.0,em_{i},ph_{i},0",
                80 + i
            )
            .unwrap();
        }
    }
    writeln!(file, "fresh,2024-06-02,ok,0,40,12.0,30.0,em_f,ph_f,").unwrap();
    file
}

#[test]
fn test_heuristic_end_to_end() {
    let file = create_unlabeled_csv();
    let table = load_accounts(file.path().to_str().unwrap()).unwrap();
    assert_eq!(table.len(), 3);
    assert!(!table.has_churn_labels);

    let outcome = score_accounts(&table, ScoreMethod::Heuristic).unwrap();
    assert_eq!(outcome.applied, ScoreMethod::Heuristic);
    assert!(outcome.fallback.is_none());
    assert!(outcome.scores.iter().all(|s| (0.0..=1.0).contains(s)));

    let top = rank_top_accounts(&table.records, &outcome.scores, 10);
    assert_eq!(top.len(), 3);
    assert_eq!(top[0].account.user_id, "risky");
    assert_eq!(top[2].account.user_id, "healthy");

    // the riskiest row has >= 2 failures, so the retry rule fires first
    assert_eq!(top[0].recommended_action.to_string(), "trigger_payment_retry");
    assert!(top[0].top_drivers.len() <= 3);
    // ARPU 20 -> 0.25 * 20 * 3 - 5
    assert_eq!(top[0].estimated_saved_revenue, 10.0);
    // ARPU 8 -> estimate goes negative, by design
    let swing = top.iter().find(|a| a.account.user_id == "swing").unwrap();
    assert!(swing.estimated_saved_revenue < 0.0);
}

#[test]
fn test_trained_end_to_end_with_enough_labels() {
    let file = create_labeled_csv(50);
    let table = load_accounts(file.path().to_str().unwrap()).unwrap();
    assert_eq!(table.labeled_count(), 50);

    let outcome = score_accounts(&table, ScoreMethod::Trained).unwrap();
    assert_eq!(outcome.applied, ScoreMethod::Trained);
    assert!(outcome.fallback.is_none());
    // every row is scored, including the unlabeled one
    assert_eq!(outcome.scores.len(), 51);

    // labeled churners should outrank labeled keepers
    let top = rank_top_accounts(&table.records, &outcome.scores, 5);
    assert!(top
        .iter()
        .all(|a| a.account.user_id.starts_with("churn")));
}

#[test]
fn test_trained_falls_back_below_threshold() {
    let file = create_labeled_csv(49);
    let table = load_accounts(file.path().to_str().unwrap()).unwrap();

    let outcome = score_accounts(&table, ScoreMethod::Trained).unwrap();
    assert_eq!(outcome.applied, ScoreMethod::Heuristic);
    assert_eq!(outcome.fallback, Some(FallbackReason::TooFewLabeledRows(49)));
    assert_eq!(outcome.scores.len(), 50);
}

#[test]
fn test_trained_falls_back_without_label_column() {
    let file = create_unlabeled_csv();
    let table = load_accounts(file.path().to_str().unwrap()).unwrap();

    let outcome = score_accounts(&table, ScoreMethod::Trained).unwrap();
    assert_eq!(outcome.applied, ScoreMethod::Heuristic);
    assert_eq!(outcome.fallback, Some(FallbackReason::MissingLabelColumn));
}

#[test]
fn test_missing_columns_abort_before_any_computation() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "user_id,event_date,last_payment_status,email_token").unwrap();
    writeln!(file, "u1,2024-06-01,ok,em_1").unwrap();

    let err = load_accounts(file.path().to_str().unwrap()).unwrap_err();
    let missing = match err.downcast_ref::<DataError>() {
        Some(DataError::MissingColumns(cols)) => cols.clone(),
        other => panic!("expected MissingColumns, got {:?}", other),
    };
    assert_eq!(
        missing,
        vec![
            "failed_payment_count_90d",
            "days_since_last_payment",
            "tenure_months",
            "ARPU",
            "phone_token",
        ]
    );
}

#[test]
fn test_payload_matches_documented_shape() {
    let file = create_unlabeled_csv();
    let table = load_accounts(file.path().to_str().unwrap()).unwrap();
    let outcome = score_accounts(&table, ScoreMethod::Heuristic).unwrap();
    let top = rank_top_accounts(&table.records, &outcome.scores, 1);

    let payload = build_payload(&top[0]);
    let json = serde_json::to_value(&payload).unwrap();
    assert_eq!(json["user_id"], "risky");
    assert_eq!(json["email_token"], "em_r");
    assert_eq!(json["meta"]["model"], "demo_v1");
    assert!(json["top_drivers"].as_array().unwrap().len() <= 3);
}

#[test]
fn test_repo_sample_data_loads_and_supports_trained_scoring() {
    let table = load_accounts(concat!(env!("CARGO_MANIFEST_DIR"), "/sample_data.csv")).unwrap();
    assert_eq!(table.len(), 60);
    assert!(table.has_churn_labels);
    assert!(table.labeled_count() >= 50);

    let outcome = score_accounts(&table, ScoreMethod::Trained).unwrap();
    assert_eq!(outcome.applied, ScoreMethod::Trained);
    assert_eq!(outcome.scores.len(), 60);
}
