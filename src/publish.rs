//! Webhook payload construction and one-shot HTTP delivery

use crate::rank::{RankedAccount, RecommendedAction};
use serde::Serialize;
use std::time::Duration;

/// Identifier stamped into every payload's `meta.model`
pub const MODEL_TAG: &str = "demo_v1";

/// One-record JSON notification for an operator-specified endpoint
#[derive(Debug, Clone, Serialize)]
pub struct WebhookPayload {
    pub user_id: String,
    pub score_30d: f64,
    pub top_drivers: Vec<String>,
    pub recommended_action: RecommendedAction,
    pub estimated_saved_revenue: f64,
    pub email_token: String,
    pub meta: PayloadMeta,
}

#[derive(Debug, Clone, Serialize)]
pub struct PayloadMeta {
    pub model: String,
}

/// What happened to one delivery attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The endpoint answered; carries the HTTP status code
    Delivered(u16),
    /// Transport failure (timeout, connection refused, DNS); carries the
    /// underlying error text
    Failed(String),
}

/// Delivery result plus the payload itself, kept around so a failed send
/// can still be inspected and replayed manually.
#[derive(Debug, Clone)]
pub struct PublishReport {
    pub payload: WebhookPayload,
    pub outcome: DeliveryOutcome,
}

impl PublishReport {
    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, DeliveryOutcome::Delivered(_))
    }
}

/// Serialize one ranked account into the webhook payload shape
pub fn build_payload(account: &RankedAccount) -> WebhookPayload {
    WebhookPayload {
        user_id: account.account.user_id.clone(),
        score_30d: account.score_30d,
        top_drivers: account.top_drivers.clone(),
        recommended_action: account.recommended_action,
        estimated_saved_revenue: account.estimated_saved_revenue,
        email_token: account.account.email_token.clone(),
        meta: PayloadMeta {
            model: MODEL_TAG.to_string(),
        },
    }
}

/// POST the payload to `url` once, blocking, with no retry.
///
/// Never returns an error: any transport failure is folded into the report
/// so the caller can show both the failure and the payload that would have
/// been sent.
pub fn publish(payload: WebhookPayload, url: &str, timeout: Duration) -> PublishReport {
    let outcome = match send(&payload, url, timeout) {
        Ok(status) => DeliveryOutcome::Delivered(status),
        Err(err) => {
            log::error!("webhook delivery to {} failed: {}", url, err);
            DeliveryOutcome::Failed(err.to_string())
        }
    };
    PublishReport { payload, outcome }
}

fn send(payload: &WebhookPayload, url: &str, timeout: Duration) -> reqwest::Result<u16> {
    let client = reqwest::blocking::Client::builder()
        .timeout(timeout)
        .build()?;
    let response = client.post(url).json(payload).send()?;
    Ok(response.status().as_u16())
}
