//! PostgreSQL implementation of CredentialStore.
//!
//! Reads `integration_credentials`; the engine never writes credentials.

use async_trait::async_trait;
use secrecy::SecretString;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::billing::{GatewayCredential, GatewayEnvironment, ScopeFilter, PROVIDER};
use crate::domain::foundation::{CompanyId, CredentialId, DomainError};
use crate::ports::CredentialStore;

pub struct PostgresCredentialStore {
    pool: PgPool,
}

impl PostgresCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CredentialRow {
    id: Uuid,
    api_url: Option<String>,
    access_token: String,
    webhook_secret: Option<String>,
    environment: Option<String>,
    company_id: Option<i64>,
    is_global: Option<bool>,
    active: Option<bool>,
}

impl From<CredentialRow> for GatewayCredential {
    fn from(row: CredentialRow) -> Self {
        let environment = match row.environment.as_deref().map(str::parse::<GatewayEnvironment>) {
            Some(Ok(environment)) => environment,
            Some(Err(e)) => {
                tracing::warn!(credential_id = %row.id, error = %e, "Unknown credential environment, assuming sandbox");
                GatewayEnvironment::default()
            }
            None => GatewayEnvironment::default(),
        };

        GatewayCredential {
            id: CredentialId::from_uuid(row.id),
            api_url: row.api_url,
            access_token: SecretString::new(row.access_token),
            webhook_secret: row
                .webhook_secret
                .filter(|s| !s.trim().is_empty())
                .map(SecretString::new),
            environment,
            company_id: row.company_id.and_then(|id| CompanyId::new(id).ok()),
            is_global: row.is_global.unwrap_or(false),
            active: row.active.unwrap_or(false),
        }
    }
}

const CREDENTIAL_COLUMNS: &str = r#"
    id, api_url, access_token, webhook_secret, environment,
    company_id::bigint AS company_id, is_global, active
"#;

#[async_trait]
impl CredentialStore for PostgresCredentialStore {
    async fn find_active(
        &self,
        scope: ScopeFilter,
        environment: Option<GatewayEnvironment>,
    ) -> Result<Vec<GatewayCredential>, DomainError> {
        let sql = format!(
            r#"
            SELECT {CREDENTIAL_COLUMNS}
            FROM integration_credentials
            WHERE provider = $1
              AND active
              AND ($2::text IS NULL OR environment = $2)
              AND ($3::bool OR is_global OR ($4::bigint IS NOT NULL AND company_id = $4))
            ORDER BY (company_id IS NOT DISTINCT FROM $4) DESC, updated_at DESC NULLS LAST
            "#
        );

        let rows: Vec<CredentialRow> = sqlx::query_as(&sql)
            .bind(PROVIDER)
            .bind(environment.map(|e| e.as_str()))
            .bind(matches!(scope, ScopeFilter::Any))
            .bind(scope.preferred_company().map(|c| c.as_i64()))
            .fetch_all(&self.pool)
            .await
            .map_err(|e| DomainError::database("Failed to query gateway credentials", e))?;

        Ok(rows
            .into_iter()
            .map(GatewayCredential::from)
            .filter(|credential| scope.admits(credential))
            .collect())
    }

    async fn find_by_id(&self, id: CredentialId) -> Result<Option<GatewayCredential>, DomainError> {
        let sql = format!(
            "SELECT {CREDENTIAL_COLUMNS} FROM integration_credentials WHERE id = $1 AND provider = $2"
        );
        let row: Option<CredentialRow> = sqlx::query_as(&sql)
            .bind(id.as_uuid())
            .bind(PROVIDER)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::database("Failed to load gateway credential", e))?;

        Ok(row.map(GatewayCredential::from))
    }
}
