//! Row models for the gateway's tables

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_postgres::Row;
use uuid::Uuid;

/// Billing model attached to a profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BillingModel {
    Free,
    PayAsYouGo,
    Other(String),
}

impl BillingModel {
    pub fn from_str(s: &str) -> Self {
        match s {
            "free" => BillingModel::Free,
            "pay_as_you_go" => BillingModel::PayAsYouGo,
            other => BillingModel::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            BillingModel::Free => "free",
            BillingModel::PayAsYouGo => "pay_as_you_go",
            BillingModel::Other(s) => s,
        }
    }
}

/// Which credit pool a processed image was charged to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CreditKind {
    Free,
    Bulk,
    Payg,
}

impl CreditKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CreditKind::Free => "free",
            CreditKind::Bulk => "bulk",
            CreditKind::Payg => "payg",
        }
    }
}

/// A row of the `profiles` table.
#[derive(Debug, Clone)]
pub struct Profile {
    pub id: Uuid,
    pub current_billing_model: String,
    pub free_images_remaining: i32,
    pub free_images_reset_at: DateTime<Utc>,
    pub bulk_images_remaining: i32,
    pub payg_usage_this_period: i32,
    pub stripe_customer_id: Option<String>,
    pub stripe_subscription_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    pub fn from_row(row: &Row) -> Self {
        Profile {
            id: row.get("id"),
            current_billing_model: row.get("current_billing_model"),
            free_images_remaining: row.get("free_images_remaining"),
            free_images_reset_at: row.get("free_images_reset_at"),
            bulk_images_remaining: row.get("bulk_images_remaining"),
            payg_usage_this_period: row.get("payg_usage_this_period"),
            stripe_customer_id: row.get("stripe_customer_id"),
            stripe_subscription_id: row.get("stripe_subscription_id"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }
}

/// A row of the `api_keys` table. The raw key never touches storage;
/// `key_hash` is its SHA-256 fingerprint and `key_prefix` the display
/// form shown in the dashboard.
#[derive(Debug, Clone)]
pub struct DbApiKey {
    pub id: Uuid,
    pub user_id: Uuid,
    pub key_name: String,
    pub key_hash: String,
    pub key_prefix: String,
    pub last_used_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DbApiKey {
    pub fn from_row(row: &Row) -> Self {
        DbApiKey {
            id: row.get("id"),
            user_id: row.get("user_id"),
            key_name: row.get("key_name"),
            key_hash: row.get("key_hash"),
            key_prefix: row.get("key_prefix"),
            last_used_at: row.get("last_used_at"),
            is_active: row.get("is_active"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }
}

/// A row of the `usage_logs` table.
#[derive(Debug, Clone)]
pub struct UsageLog {
    pub id: i64,
    pub user_id: Uuid,
    pub api_key_id: Option<Uuid>,
    pub source: String,
    pub was_successful: bool,
    pub error_message: Option<String>,
    pub processing_time_ms: Option<i32>,
    pub credit_type_used: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl UsageLog {
    pub fn from_row(row: &Row) -> Self {
        UsageLog {
            id: row.get("id"),
            user_id: row.get("user_id"),
            api_key_id: row.get("api_key_id"),
            source: row.get("source"),
            was_successful: row.get("was_successful"),
            error_message: row.get("error_message"),
            processing_time_ms: row.get("processing_time_ms"),
            credit_type_used: row.get("credit_type_used"),
            created_at: row.get("created_at"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn billing_model_round_trips_known_values() {
        assert_eq!(BillingModel::from_str("free"), BillingModel::Free);
        assert_eq!(
            BillingModel::from_str("pay_as_you_go"),
            BillingModel::PayAsYouGo
        );
        assert_eq!(BillingModel::Free.as_str(), "free");
        assert_eq!(BillingModel::PayAsYouGo.as_str(), "pay_as_you_go");
    }

    #[test]
    fn billing_model_preserves_unknown_values() {
        let other = BillingModel::from_str("enterprise");
        assert_eq!(other, BillingModel::Other("enterprise".to_string()));
        assert_eq!(other.as_str(), "enterprise");
    }

    #[test]
    fn credit_kind_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&CreditKind::Payg).unwrap(), "\"payg\"");
        assert_eq!(CreditKind::Bulk.as_str(), "bulk");
    }
}
