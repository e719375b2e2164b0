//! Profile store
//!
//! Updates go through the typed [`ProfileChange`] enum, so only the
//! columns listed there can ever be written and every value travels as
//! a bound parameter.

use chrono::{DateTime, Utc};
use tokio_postgres::types::ToSql;
use uuid::Uuid;

use super::credits::CreditError;
use super::models::{BillingModel, Profile};
use super::pool::DbPool;

/// One permitted mutation of a profile row.
#[derive(Debug, Clone)]
pub enum ProfileChange {
    BillingModel(BillingModel),
    FreeRemaining(i32),
    FreeResetAt(DateTime<Utc>),
    BulkRemaining(i32),
    PaygUsage(i32),
    StripeCustomer(Option<String>),
    StripeSubscription(Option<String>),
}

impl ProfileChange {
    fn column(&self) -> &'static str {
        match self {
            ProfileChange::BillingModel(_) => "current_billing_model",
            ProfileChange::FreeRemaining(_) => "free_images_remaining",
            ProfileChange::FreeResetAt(_) => "free_images_reset_at",
            ProfileChange::BulkRemaining(_) => "bulk_images_remaining",
            ProfileChange::PaygUsage(_) => "payg_usage_this_period",
            ProfileChange::StripeCustomer(_) => "stripe_customer_id",
            ProfileChange::StripeSubscription(_) => "stripe_subscription_id",
        }
    }

    fn value(&self) -> Box<dyn ToSql + Sync + Send> {
        match self {
            ProfileChange::BillingModel(m) => Box::new(m.as_str().to_string()),
            ProfileChange::FreeRemaining(v) => Box::new(*v),
            ProfileChange::FreeResetAt(v) => Box::new(*v),
            ProfileChange::BulkRemaining(v) => Box::new(*v),
            ProfileChange::PaygUsage(v) => Box::new(*v),
            ProfileChange::StripeCustomer(v) => Box::new(v.clone()),
            ProfileChange::StripeSubscription(v) => Box::new(v.clone()),
        }
    }
}

/// Assemble the UPDATE statement for a change set. Placeholders start
/// at $2; $1 is always the profile id.
fn update_statement(changes: &[ProfileChange]) -> String {
    let mut sql = String::from("UPDATE profiles SET updated_at = NOW()");
    for (i, change) in changes.iter().enumerate() {
        sql.push_str(&format!(", {} = ${}", change.column(), i + 2));
    }
    sql.push_str(" WHERE id = $1");
    sql
}

#[derive(Clone)]
pub struct ProfileRepository {
    pool: DbPool,
}

impl ProfileRepository {
    pub fn new(pool: DbPool) -> Self {
        ProfileRepository { pool }
    }

    pub async fn get(&self, user_id: Uuid) -> Result<Profile, CreditError> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                "SELECT id, current_billing_model, free_images_remaining, \
                        free_images_reset_at, bulk_images_remaining, \
                        payg_usage_this_period, stripe_customer_id, \
                        stripe_subscription_id, created_at, updated_at \
                 FROM profiles WHERE id = $1",
                &[&user_id],
            )
            .await?;
        row.map(|r| Profile::from_row(&r))
            .ok_or(CreditError::ProfileNotFound(user_id))
    }

    /// Apply a set of changes to one profile. An empty change set is a
    /// no-op rather than a bare `updated_at` touch.
    pub async fn update(
        &self,
        user_id: Uuid,
        changes: &[ProfileChange],
    ) -> Result<(), CreditError> {
        if changes.is_empty() {
            return Ok(());
        }

        let sql = update_statement(changes);
        let values: Vec<Box<dyn ToSql + Sync + Send>> =
            changes.iter().map(ProfileChange::value).collect();

        let mut params: Vec<&(dyn ToSql + Sync)> = Vec::with_capacity(changes.len() + 1);
        params.push(&user_id);
        for value in &values {
            params.push(value.as_ref());
        }

        let client = self.pool.get().await?;
        let updated = client.execute(&sql, &params).await?;
        if updated == 0 {
            return Err(CreditError::ProfileNotFound(user_id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statement_for_single_change() {
        let sql = update_statement(&[ProfileChange::FreeRemaining(50)]);
        assert_eq!(
            sql,
            "UPDATE profiles SET updated_at = NOW(), free_images_remaining = $2 WHERE id = $1"
        );
    }

    #[test]
    fn statement_numbers_placeholders_in_order() {
        let sql = update_statement(&[
            ProfileChange::BillingModel(BillingModel::PayAsYouGo),
            ProfileChange::BulkRemaining(100),
            ProfileChange::StripeCustomer(Some("cus_123".to_string())),
        ]);
        assert_eq!(
            sql,
            "UPDATE profiles SET updated_at = NOW(), current_billing_model = $2, \
             bulk_images_remaining = $3, stripe_customer_id = $4 WHERE id = $1"
        );
    }

    #[test]
    fn every_change_maps_to_a_known_column() {
        let all = [
            ProfileChange::BillingModel(BillingModel::Free),
            ProfileChange::FreeRemaining(0),
            ProfileChange::FreeResetAt(Utc::now()),
            ProfileChange::BulkRemaining(0),
            ProfileChange::PaygUsage(0),
            ProfileChange::StripeCustomer(None),
            ProfileChange::StripeSubscription(None),
        ];
        let columns: Vec<&str> = all.iter().map(ProfileChange::column).collect();
        assert_eq!(
            columns,
            vec![
                "current_billing_model",
                "free_images_remaining",
                "free_images_reset_at",
                "bulk_images_remaining",
                "payg_usage_this_period",
                "stripe_customer_id",
                "stripe_subscription_id",
            ]
        );
    }
}
