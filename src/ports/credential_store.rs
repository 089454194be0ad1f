//! Credential store port - read-only access to gateway credentials.

use async_trait::async_trait;

use crate::domain::billing::{GatewayCredential, GatewayEnvironment, ScopeFilter};
use crate::domain::foundation::{CredentialId, DomainError};

/// Read access to stored gateway credentials.
///
/// The engine never mutates credentials; they are managed elsewhere.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Active credentials for the gateway provider admitted by `scope`,
    /// optionally restricted to one environment.
    ///
    /// Ordering: credentials owned by the scope's company first, then most
    /// recently updated first.
    async fn find_active(
        &self,
        scope: ScopeFilter,
        environment: Option<GatewayEnvironment>,
    ) -> Result<Vec<GatewayCredential>, DomainError>;

    /// Finds a credential by id, active or not.
    async fn find_by_id(&self, id: CredentialId) -> Result<Option<GatewayCredential>, DomainError>;
}
