//! Cached schema knowledge about tables the engine does not own.
//!
//! `fluxo_caixa` and `clientes` carry their owning company in either an
//! `empresa_id` or a `company_id` column depending on the deployment. The
//! column is discovered once from `information_schema` and remembered
//! until `reset` is called.

use std::collections::HashMap;
use std::sync::RwLock;

use sqlx::PgPool;

use crate::domain::foundation::DomainError;

/// Candidate company columns, in order of preference.
const COMPANY_COLUMNS: [&str; 2] = ["empresa_id", "company_id"];

#[derive(Debug, Default)]
pub struct SchemaCache {
    company_columns: RwLock<HashMap<String, &'static str>>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cached_company_column(&self, table: &str) -> Option<&'static str> {
        self.company_columns
            .read()
            .ok()
            .and_then(|columns| columns.get(table).copied())
    }

    pub fn remember(&self, table: &str, column: &'static str) {
        if let Ok(mut columns) = self.company_columns.write() {
            columns.insert(table.to_string(), column);
        }
    }

    /// Forgets everything; the next lookup hits `information_schema` again.
    pub fn reset(&self) {
        if let Ok(mut columns) = self.company_columns.write() {
            columns.clear();
        }
    }

    /// Company column of `table`. The returned name is always one of a fixed
    /// set, so it is safe to splice into SQL.
    pub async fn company_column(&self, pool: &PgPool, table: &str) -> Result<&'static str, DomainError> {
        if let Some(column) = self.cached_company_column(table) {
            return Ok(column);
        }

        let found: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT column_name::text
            FROM information_schema.columns
            WHERE table_schema = current_schema()
              AND table_name = $1
              AND column_name = ANY($2)
            "#,
        )
        .bind(table)
        .bind(COMPANY_COLUMNS.to_vec())
        .fetch_all(pool)
        .await
        .map_err(|e| DomainError::database("Failed to inspect table columns", e))?;

        let column = pick_company_column(&found).ok_or_else(|| {
            DomainError::database(
                "Missing company column",
                format!("table {} has neither empresa_id nor company_id", table),
            )
        })?;

        tracing::debug!(table = %table, column = %column, "Discovered company column");
        self.remember(table, column);
        Ok(column)
    }
}

fn pick_company_column(found: &[String]) -> Option<&'static str> {
    COMPANY_COLUMNS
        .iter()
        .copied()
        .find(|candidate| found.iter().any(|name| name == candidate))
}
