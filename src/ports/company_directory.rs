//! Company directory port - company lookups and subscription columns.

use async_trait::async_trait;

use crate::domain::billing::{CompanyProfile, CompanySubscription};
use crate::domain::foundation::{CompanyId, DomainError};

#[async_trait]
pub trait CompanyDirectory: Send + Sync {
    async fn company_exists(&self, id: CompanyId) -> Result<bool, DomainError>;

    /// Company whose stored gateway subscription id equals `subscription_id`.
    async fn find_by_subscription_id(
        &self,
        subscription_id: &str,
    ) -> Result<Option<CompanyId>, DomainError>;

    /// Company whose stored gateway customer id equals `customer_id`.
    async fn find_by_customer_id(&self, customer_id: &str)
        -> Result<Option<CompanyId>, DomainError>;

    /// Subscription snapshot of a company. `None` if the company is unknown.
    async fn load_subscription(
        &self,
        id: CompanyId,
    ) -> Result<Option<CompanySubscription>, DomainError>;

    /// Overwrites the subscription columns of the company row.
    ///
    /// # Errors
    ///
    /// - `CompanyNotFound` if the row does not exist
    async fn save_subscription(&self, subscription: &CompanySubscription)
        -> Result<(), DomainError>;

    async fn find_profile(&self, id: CompanyId) -> Result<Option<CompanyProfile>, DomainError>;

    /// Drops any cached schema knowledge so it is rediscovered on next use.
    fn reset_caches(&self) {}
}
