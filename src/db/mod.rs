//! Database layer: connection pool and repositories

pub mod api_keys;
pub mod credits;
pub mod models;
pub mod pool;
pub mod profiles;
pub mod usage;

pub use api_keys::ApiKeyRepository;
pub use credits::{CreditError, CreditLedger};
pub use models::{BillingModel, CreditKind, DbApiKey, Profile, UsageLog};
pub use pool::{DbError, DbPool};
pub use profiles::{ProfileChange, ProfileRepository};
pub use usage::{NewUsageLog, RequestSource, UsageRepository};
