//! Usage recorder
//!
//! Writes one row per processing attempt, success or failure. Recording
//! is best effort: callers spawn it off the response path and a failed
//! insert only produces a log line, never a failed request.

use serde::Serialize;
use uuid::Uuid;

use super::models::{CreditKind, UsageLog};
use super::pool::{DbError, DbPool};

/// Where a request came in through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestSource {
    /// The versioned JSON API used by the SDKs.
    Sdk,
    /// The legacy multipart upload endpoint.
    Legacy,
    /// Session-token traffic from the web dashboard.
    Dashboard,
}

impl RequestSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestSource::Sdk => "sdk",
            RequestSource::Legacy => "legacy",
            RequestSource::Dashboard => "dashboard",
        }
    }
}

/// One usage event, ready to insert.
#[derive(Debug, Clone)]
pub struct NewUsageLog {
    pub user_id: Uuid,
    pub api_key_id: Option<Uuid>,
    pub source: RequestSource,
    pub was_successful: bool,
    pub error_message: Option<String>,
    pub processing_time_ms: Option<i32>,
    pub credit_type_used: Option<CreditKind>,
}

/// Aggregate usage counters for the stats endpoint.
#[derive(Debug, Clone, Copy)]
pub struct UsageCounts {
    pub total_images: i64,
    pub images_this_month: i64,
}

#[derive(Clone)]
pub struct UsageRepository {
    pool: DbPool,
}

impl UsageRepository {
    pub fn new(pool: DbPool) -> Self {
        UsageRepository { pool }
    }

    pub async fn record(&self, entry: &NewUsageLog) -> Result<(), DbError> {
        let client = self.pool.get().await?;
        client
            .execute(
                "INSERT INTO usage_logs \
                 (user_id, api_key_id, source, was_successful, error_message, \
                  processing_time_ms, credit_type_used, created_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())",
                &[
                    &entry.user_id,
                    &entry.api_key_id,
                    &entry.source.as_str(),
                    &entry.was_successful,
                    &entry.error_message,
                    &entry.processing_time_ms,
                    &entry.credit_type_used.map(|k| k.as_str()),
                ],
            )
            .await?;
        Ok(())
    }

    /// Lifetime and current-month successful image counts.
    pub async fn counts(&self, user_id: Uuid) -> Result<UsageCounts, DbError> {
        let client = self.pool.get().await?;
        let row = client
            .query_one(
                "SELECT COUNT(*) AS total, \
                        COUNT(*) FILTER (WHERE created_at >= date_trunc('month', NOW())) AS monthly \
                 FROM usage_logs WHERE user_id = $1 AND was_successful = true",
                &[&user_id],
            )
            .await?;
        Ok(UsageCounts {
            total_images: row.get("total"),
            images_this_month: row.get("monthly"),
        })
    }

    /// Most recent usage entries, newest first.
    pub async fn recent_activity(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<UsageLog>, DbError> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                "SELECT id, user_id, api_key_id, source, was_successful, error_message, \
                        processing_time_ms, credit_type_used, created_at \
                 FROM usage_logs WHERE user_id = $1 \
                 ORDER BY created_at DESC LIMIT $2 OFFSET $3",
                &[&user_id, &limit, &offset],
            )
            .await?;
        Ok(rows.iter().map(UsageLog::from_row).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_labels_are_stable() {
        assert_eq!(RequestSource::Sdk.as_str(), "sdk");
        assert_eq!(RequestSource::Legacy.as_str(), "legacy");
        assert_eq!(RequestSource::Dashboard.as_str(), "dashboard");
    }

    #[test]
    fn source_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&RequestSource::Dashboard).unwrap(),
            "\"dashboard\""
        );
    }
}
