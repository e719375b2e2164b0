//! Credit ledger
//!
//! Every processed image consumes exactly one credit from one of three
//! pools, in priority order: free allowance first, then purchased bulk
//! credits, then pay-as-you-go metering. The read-decide-write sequence
//! runs inside a single transaction with the profile row locked, so
//! concurrent requests for one user serialize and the pools never go
//! negative.

use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use super::models::{BillingModel, CreditKind};
use super::pool::{DbError, DbPool};

#[derive(Debug, Error)]
pub enum CreditError {
    #[error("No credits available")]
    NoCreditsAvailable,

    #[error("No profile found for user {0}")]
    ProfileNotFound(Uuid),

    #[error(transparent)]
    Db(#[from] DbError),
}

impl From<tokio_postgres::Error> for CreditError {
    fn from(err: tokio_postgres::Error) -> Self {
        CreditError::Db(DbError::Query(err))
    }
}

/// The locked view of a profile's balances that the pool decision is
/// made from.
#[derive(Debug, Clone)]
pub struct CreditSnapshot {
    pub billing_model: BillingModel,
    pub free_remaining: i32,
    pub bulk_remaining: i32,
    pub payg_usage: i32,
}

/// Pick the pool one credit comes out of, or `None` when the request
/// must be refused. Pure so the priority rules are unit testable.
pub fn choose_pool(snapshot: &CreditSnapshot) -> Option<CreditKind> {
    if snapshot.free_remaining > 0 {
        return Some(CreditKind::Free);
    }
    if snapshot.bulk_remaining > 0 {
        return Some(CreditKind::Bulk);
    }
    if snapshot.billing_model == BillingModel::PayAsYouGo {
        return Some(CreditKind::Payg);
    }
    None
}

#[derive(Clone)]
pub struct CreditLedger {
    pool: DbPool,
}

impl CreditLedger {
    pub fn new(pool: DbPool) -> Self {
        CreditLedger { pool }
    }

    /// Consume one credit for `user_id` and report which pool paid.
    ///
    /// Returns `NoCreditsAvailable` without writing anything when all
    /// pools are exhausted; the dropped transaction rolls the row lock
    /// back.
    pub async fn consume(&self, user_id: Uuid) -> Result<CreditKind, CreditError> {
        let mut client = self.pool.get().await?;
        let tx = client.transaction().await?;

        let row = tx
            .query_opt(
                "SELECT current_billing_model, free_images_remaining, \
                        bulk_images_remaining, payg_usage_this_period \
                 FROM profiles WHERE id = $1 FOR UPDATE",
                &[&user_id],
            )
            .await?;

        let Some(row) = row else {
            return Err(CreditError::ProfileNotFound(user_id));
        };

        let snapshot = CreditSnapshot {
            billing_model: BillingModel::from_str(row.get("current_billing_model")),
            free_remaining: row.get("free_images_remaining"),
            bulk_remaining: row.get("bulk_images_remaining"),
            payg_usage: row.get("payg_usage_this_period"),
        };

        let Some(kind) = choose_pool(&snapshot) else {
            return Err(CreditError::NoCreditsAvailable);
        };

        let statement = match kind {
            CreditKind::Free => {
                "UPDATE profiles SET free_images_remaining = free_images_remaining - 1, \
                 updated_at = NOW() WHERE id = $1"
            }
            CreditKind::Bulk => {
                "UPDATE profiles SET bulk_images_remaining = bulk_images_remaining - 1, \
                 updated_at = NOW() WHERE id = $1"
            }
            CreditKind::Payg => {
                "UPDATE profiles SET payg_usage_this_period = payg_usage_this_period + 1, \
                 updated_at = NOW() WHERE id = $1"
            }
        };

        tx.execute(statement, &[&user_id]).await?;
        tx.commit().await?;

        info!(user_id = %user_id, credit_type = kind.as_str(), "Credit consumed");
        Ok(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(model: BillingModel, free: i32, bulk: i32) -> CreditSnapshot {
        CreditSnapshot {
            billing_model: model,
            free_remaining: free,
            bulk_remaining: bulk,
            payg_usage: 0,
        }
    }

    #[test]
    fn free_pool_wins_when_available() {
        let s = snapshot(BillingModel::PayAsYouGo, 3, 10);
        assert_eq!(choose_pool(&s), Some(CreditKind::Free));
    }

    #[test]
    fn bulk_pool_used_after_free_exhausted() {
        let s = snapshot(BillingModel::PayAsYouGo, 0, 10);
        assert_eq!(choose_pool(&s), Some(CreditKind::Bulk));
    }

    #[test]
    fn payg_is_the_last_resort_for_metered_accounts() {
        let s = snapshot(BillingModel::PayAsYouGo, 0, 0);
        assert_eq!(choose_pool(&s), Some(CreditKind::Payg));
    }

    #[test]
    fn free_accounts_are_refused_when_exhausted() {
        let s = snapshot(BillingModel::Free, 0, 0);
        assert_eq!(choose_pool(&s), None);
    }

    #[test]
    fn unknown_billing_models_never_meter() {
        let s = snapshot(BillingModel::Other("enterprise".to_string()), 0, 0);
        assert_eq!(choose_pool(&s), None);
    }

    #[test]
    fn negative_balances_do_not_spend() {
        let s = snapshot(BillingModel::Free, -1, -5);
        assert_eq!(choose_pool(&s), None);
    }

    #[test]
    fn free_account_with_bulk_credits_spends_them() {
        let s = snapshot(BillingModel::Free, 0, 2);
        assert_eq!(choose_pool(&s), Some(CreditKind::Bulk));
    }
}
