//! API key record store
//!
//! Keys are provisioned by the dashboard service; this gateway only
//! looks them up by fingerprint, stamps usage, and revokes. Revocation
//! flips `is_active` rather than deleting the row so the usage history
//! keeps its foreign keys.

use tracing::warn;
use uuid::Uuid;

use super::models::DbApiKey;
use super::pool::{DbError, DbPool};

const KEY_COLUMNS: &str =
    "id, user_id, key_name, key_hash, key_prefix, last_used_at, is_active, created_at, updated_at";

#[derive(Clone)]
pub struct ApiKeyRepository {
    pool: DbPool,
}

impl ApiKeyRepository {
    pub fn new(pool: DbPool) -> Self {
        ApiKeyRepository { pool }
    }

    /// Look up an active key by its SHA-256 fingerprint.
    pub async fn find_by_fingerprint(
        &self,
        key_hash: &str,
    ) -> Result<Option<DbApiKey>, DbError> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                &format!(
                    "SELECT {KEY_COLUMNS} FROM api_keys \
                     WHERE key_hash = $1 AND is_active = true"
                ),
                &[&key_hash],
            )
            .await?;
        Ok(row.map(|r| DbApiKey::from_row(&r)))
    }

    /// Stamp `last_used_at`. Called off the request path; failures are
    /// logged by the caller and never fail a request.
    pub async fn touch(&self, key_id: Uuid) -> Result<(), DbError> {
        let client = self.pool.get().await?;
        client
            .execute(
                "UPDATE api_keys SET last_used_at = NOW(), updated_at = NOW() WHERE id = $1",
                &[&key_id],
            )
            .await?;
        Ok(())
    }

    /// Deactivate a key owned by `user_id`. Returns false when no
    /// active key matched, either because it does not exist or belongs
    /// to someone else.
    pub async fn deactivate(&self, key_id: Uuid, user_id: Uuid) -> Result<bool, DbError> {
        let client = self.pool.get().await?;
        let updated = client
            .execute(
                "UPDATE api_keys SET is_active = false, updated_at = NOW() \
                 WHERE id = $1 AND user_id = $2 AND is_active = true",
                &[&key_id, &user_id],
            )
            .await?;
        if updated > 0 {
            warn!(key_id = %key_id, user_id = %user_id, "API key deactivated");
        }
        Ok(updated > 0)
    }

    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<DbApiKey>, DbError> {
        let client = self.pool.get().await?;
        let rows = client
            .query(
                &format!(
                    "SELECT {KEY_COLUMNS} FROM api_keys \
                     WHERE user_id = $1 ORDER BY created_at DESC"
                ),
                &[&user_id],
            )
            .await?;
        Ok(rows.iter().map(DbApiKey::from_row).collect())
    }
}
