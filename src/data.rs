//! Billing CSV loading, schema validation, and feature imputation using Polars

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Columns every input file must carry. `event_date`, `last_payment_status`
/// and `phone_token` are validated but never computed on.
pub const REQUIRED_COLUMNS: [&str; 9] = [
    "user_id",
    "event_date",
    "last_payment_status",
    "failed_payment_count_90d",
    "days_since_last_payment",
    "tenure_months",
    "ARPU",
    "email_token",
    "phone_token",
];

/// Optional historical label column; its presence gates the trained
/// scoring strategy.
pub const LABEL_COLUMN: &str = "churn_30d";

/// Sentinel for a missing `days_since_last_payment`, meaning "unknown/long ago"
pub const MISSING_DAYS_SENTINEL: u32 = 999;

#[derive(Error, Debug)]
pub enum DataError {
    #[error("missing required columns: {0:?}")]
    MissingColumns(Vec<String>),
}

/// One account row after validation and imputation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountRecord {
    pub user_id: String,
    pub event_date: String,
    pub last_payment_status: String,
    pub failed_payment_count_90d: u32,
    pub days_since_last_payment: u32,
    pub tenure_months: f64,
    pub arpu: f64,
    pub email_token: String,
    /// Required by the input schema but not read downstream (future-reserved)
    pub phone_token: String,
    /// 1 iff `failed_payment_count_90d > 0`
    pub recent_failed: u8,
    /// Historical label, when the input carries one
    pub churn_30d: Option<f64>,
}

/// The working table for one run: imputed records plus whether the input
/// carried the historical label column at all.
#[derive(Debug, Clone)]
pub struct AccountTable {
    pub records: Vec<AccountRecord>,
    pub has_churn_labels: bool,
}

impl AccountTable {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Rows with a non-missing `churn_30d` label
    pub fn labeled_count(&self) -> usize {
        self.records.iter().filter(|r| r.churn_30d.is_some()).count()
    }
}

/// Load a billing CSV, validate the required schema, and impute missing
/// feature values.
///
/// # Arguments
/// * `path` - Path to the CSV file
///
/// # Returns
/// * `AccountTable` with one fully-imputed record per input row
///
/// # Errors
/// * `DataError::MissingColumns` enumerating every absent required column;
///   nothing is computed when the schema is incomplete.
pub fn load_accounts(path: &str) -> crate::Result<AccountTable> {
    let df = CsvReader::from_path(path)?.finish()?;
    validate_columns(&df)?;
    extract_records(&df)
}

/// Check the nine required columns, collecting every missing name before
/// failing so the operator sees the full list at once.
fn validate_columns(df: &DataFrame) -> Result<(), DataError> {
    let present = df.get_column_names();
    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|c| !present.contains(c))
        .map(|c| c.to_string())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(DataError::MissingColumns(missing))
    }
}

/// Convert the validated DataFrame into imputed records.
///
/// Imputation rules:
/// * `failed_payment_count_90d`: missing -> 0
/// * `days_since_last_payment`: missing -> 999
/// * `tenure_months`: missing -> 0.0
/// * `ARPU`: missing -> median of the present values
fn extract_records(df: &DataFrame) -> crate::Result<AccountTable> {
    let user_id = string_column(df, "user_id")?;
    let event_date = string_column(df, "event_date")?;
    let last_payment_status = string_column(df, "last_payment_status")?;
    let email_token = string_column(df, "email_token")?;
    let phone_token = string_column(df, "phone_token")?;

    let failed_counts = float_column(df, "failed_payment_count_90d")?;
    let days_since = float_column(df, "days_since_last_payment")?;
    let tenure = float_column(df, "tenure_months")?;
    let arpu_raw = float_column(df, "ARPU")?;

    let has_churn_labels = df.get_column_names().contains(&LABEL_COLUMN);
    let churn = if has_churn_labels {
        float_column(df, LABEL_COLUMN)?
    } else {
        vec![None; df.height()]
    };

    // ARPU median over present values only, computed before imputation
    let present_arpu: Vec<f64> = arpu_raw.iter().flatten().copied().collect();
    let arpu_median = median(&present_arpu);

    let records = (0..df.height())
        .map(|i| {
            let failed = failed_counts[i].unwrap_or(0.0).max(0.0) as u32;
            AccountRecord {
                user_id: user_id[i].clone(),
                event_date: event_date[i].clone(),
                last_payment_status: last_payment_status[i].clone(),
                failed_payment_count_90d: failed,
                days_since_last_payment: days_since[i]
                    .map(|d| d.max(0.0) as u32)
                    .unwrap_or(MISSING_DAYS_SENTINEL),
                tenure_months: tenure[i].unwrap_or(0.0),
                arpu: arpu_raw[i].unwrap_or(arpu_median),
                email_token: email_token[i].clone(),
                phone_token: phone_token[i].clone(),
                recent_failed: u8::from(failed > 0),
                churn_30d: churn[i],
            }
        })
        .collect();

    Ok(AccountTable {
        records,
        has_churn_labels,
    })
}

fn float_column(df: &DataFrame, name: &str) -> crate::Result<Vec<Option<f64>>> {
    let series = df.column(name)?.cast(&DataType::Float64)?;
    Ok(series.f64()?.into_iter().collect())
}

fn string_column(df: &DataFrame, name: &str) -> crate::Result<Vec<String>> {
    let series = df.column(name)?.cast(&DataType::Utf8)?;
    Ok(series
        .utf8()?
        .into_iter()
        .map(|v| v.unwrap_or("").to_string())
        .collect())
}

/// Median with the usual even-length average; 0.0 for an empty slice
fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        sorted[mid]
    } else {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    }
}
