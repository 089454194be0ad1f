//! PostgreSQL implementation of the billing storage ports.
//!
//! Backs `ChargeRepository`, `CompanyDirectory` and `ReconciliationStore`
//! over the `asaas_charges`, `fluxo_caixa`, `clientes` and `empresas`
//! tables. Flow ids are compared as text because `fluxo_caixa.id` is an
//! integer in some deployments and a UUID in others.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use super::schema_cache::SchemaCache;
use crate::domain::billing::{
    BillingType, Cadence, CompanyProfile, CompanySubscription, FinancialFlow, FlowStatus,
    LocalCharge, PaymentArtifacts, PROVIDER,
};
use crate::domain::foundation::{
    ChargeId, ClienteId, CompanyId, CredentialId, DomainError, ErrorCode, FinancialFlowId,
    Timestamp,
};
use crate::ports::{
    AppliedChanges, ChargeRepository, CompanyDirectory, ReconciliationPlan, ReconciliationStore,
    SaveResult,
};

const FLOW_TABLE: &str = "fluxo_caixa";
const CLIENT_TABLE: &str = "clientes";

pub struct PostgresBillingStore {
    pool: PgPool,
    schema: Arc<SchemaCache>,
}

impl PostgresBillingStore {
    pub fn new(pool: PgPool, schema: Arc<SchemaCache>) -> Self {
        Self { pool, schema }
    }

    async fn flow_query(&self, filter: &str) -> Result<String, DomainError> {
        let flow_company = self.schema.company_column(&self.pool, FLOW_TABLE).await?;
        let client_company = self.schema.company_column(&self.pool, CLIENT_TABLE).await?;
        Ok(format!(
            r#"
            SELECT f.id::text AS id,
                   COALESCE(f.{flow_company}, c.{client_company})::bigint AS company_id,
                   f.cliente_id::bigint AS cliente_id,
                   c.asaas_customer_id AS gateway_customer_id,
                   f.description,
                   f.due_date::date AS due_date,
                   f.value::float8 AS value,
                   f.status,
                   f.external_provider,
                   f.external_reference_id
            FROM fluxo_caixa f
            LEFT JOIN clientes c ON c.id = f.cliente_id
            WHERE {filter}
            LIMIT 1
            "#
        ))
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Rows
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, sqlx::FromRow)]
struct FlowRow {
    id: String,
    company_id: Option<i64>,
    cliente_id: Option<i64>,
    gateway_customer_id: Option<String>,
    description: Option<String>,
    due_date: Option<NaiveDate>,
    value: Option<f64>,
    status: Option<String>,
    external_provider: Option<String>,
    external_reference_id: Option<String>,
}

impl TryFrom<FlowRow> for FinancialFlow {
    type Error = DomainError;

    fn try_from(row: FlowRow) -> Result<Self, Self::Error> {
        Ok(FinancialFlow {
            id: parse_flow_id(&row.id)?,
            company_id: row.company_id.and_then(|id| CompanyId::new(id).ok()),
            cliente_id: row.cliente_id.map(ClienteId::from_i64),
            gateway_customer_id: row.gateway_customer_id,
            description: row.description,
            due_date: row.due_date,
            value: row.value,
            status: FlowStatus::from_column(row.status.as_deref().unwrap_or_default()),
            external_provider: row.external_provider,
            external_reference_id: row.external_reference_id,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ChargeRow {
    id: Uuid,
    financial_flow_id: String,
    credential_id: Option<Uuid>,
    asaas_charge_id: String,
    billing_type: String,
    status: String,
    due_date: NaiveDate,
    value: f64,
    pix_payload: Option<String>,
    pix_qr_code: Option<String>,
    boleto_url: Option<String>,
    card_last4: Option<String>,
    card_brand: Option<String>,
    last_event: Option<String>,
    raw_payload: Option<Value>,
    paid_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ChargeRow> for LocalCharge {
    type Error = DomainError;

    fn try_from(row: ChargeRow) -> Result<Self, Self::Error> {
        let billing_type = BillingType::from_str(&row.billing_type).map_err(|e| {
            DomainError::new(
                ErrorCode::DatabaseError,
                format!("Invalid billing_type value: {}", e),
            )
        })?;

        Ok(LocalCharge {
            id: ChargeId::from_uuid(row.id),
            financial_flow_id: parse_flow_id(&row.financial_flow_id)?,
            credential_id: row.credential_id.map(CredentialId::from_uuid),
            gateway_charge_id: row.asaas_charge_id,
            billing_type,
            status: row.status,
            due_date: row.due_date,
            value: row.value,
            artifacts: PaymentArtifacts {
                pix_payload: row.pix_payload,
                pix_qr_code: row.pix_qr_code,
                boleto_url: row.boleto_url,
                card_last4: row.card_last4,
                card_brand: row.card_brand,
            },
            last_event: row.last_event,
            raw_payload: row.raw_payload.unwrap_or(Value::Null),
            paid_at: row.paid_at.map(Timestamp::from_datetime),
            created_at: Timestamp::from_datetime(row.created_at),
            updated_at: Timestamp::from_datetime(row.updated_at),
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SubscriptionRow {
    id: i64,
    plan_id: Option<i64>,
    plan_active: Option<bool>,
    billing_cadence: Option<String>,
    trial_started_at: Option<DateTime<Utc>>,
    trial_ends_at: Option<DateTime<Utc>>,
    current_period_start: Option<DateTime<Utc>>,
    current_period_end: Option<DateTime<Utc>>,
    grace_expires_at: Option<DateTime<Utc>>,
    asaas_subscription_id: Option<String>,
    asaas_customer_id: Option<String>,
}

impl TryFrom<SubscriptionRow> for CompanySubscription {
    type Error = DomainError;

    fn try_from(row: SubscriptionRow) -> Result<Self, Self::Error> {
        let company_id = CompanyId::new(row.id).map_err(|e| {
            DomainError::new(ErrorCode::DatabaseError, format!("Invalid company id: {}", e))
        })?;
        let cadence = row
            .billing_cadence
            .as_deref()
            .and_then(|raw| Cadence::from_str(raw).ok())
            .unwrap_or_default();

        Ok(CompanySubscription {
            company_id,
            plan_id: row.plan_id,
            active: row.plan_active.unwrap_or(false),
            cadence,
            trial_started_at: row.trial_started_at.map(Timestamp::from_datetime),
            trial_ends_at: row.trial_ends_at.map(Timestamp::from_datetime),
            current_period_start: row.current_period_start.map(Timestamp::from_datetime),
            current_period_end: row.current_period_end.map(Timestamp::from_datetime),
            grace_expires_at: row.grace_expires_at.map(Timestamp::from_datetime),
            gateway_subscription_id: row.asaas_subscription_id,
            gateway_customer_id: row.asaas_customer_id,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProfileRow {
    id: i64,
    name: Option<String>,
    email: Option<String>,
    document: Option<String>,
}

fn parse_flow_id(raw: &str) -> Result<FinancialFlowId, DomainError> {
    FinancialFlowId::from_str(raw).map_err(|e| {
        DomainError::new(
            ErrorCode::DatabaseError,
            format!("Invalid financial flow id '{}': {}", raw, e),
        )
    })
}

const CHARGE_COLUMNS: &str = r#"
    id, financial_flow_id, credential_id, asaas_charge_id, billing_type, status,
    due_date, value::float8 AS value, pix_payload, pix_qr_code, boleto_url,
    card_last4, card_brand, last_event, raw_payload, paid_at, created_at, updated_at
"#;

const SUBSCRIPTION_COLUMNS: &str = r#"
    id::bigint AS id, plan_id::bigint AS plan_id, plan_active, billing_cadence,
    trial_started_at, trial_ends_at, current_period_start, current_period_end,
    grace_expires_at, asaas_subscription_id, asaas_customer_id
"#;

async fn load_subscription_row<'e, E: PgExecutor<'e>>(
    executor: E,
    id: CompanyId,
    for_update: bool,
) -> Result<Option<CompanySubscription>, DomainError> {
    let sql = format!(
        "SELECT {} FROM empresas WHERE id = $1{}",
        SUBSCRIPTION_COLUMNS,
        if for_update { " FOR UPDATE" } else { "" }
    );
    let row: Option<SubscriptionRow> = sqlx::query_as(&sql)
        .bind(id.as_i64())
        .fetch_optional(executor)
        .await
        .map_err(|e| DomainError::database("Failed to load company subscription", e))?;

    row.map(CompanySubscription::try_from).transpose()
}

async fn write_subscription<'e, E: PgExecutor<'e>>(
    executor: E,
    subscription: &CompanySubscription,
) -> Result<u64, DomainError> {
    let result = sqlx::query(
        r#"
        UPDATE empresas SET
            plan_id = $2,
            plan_active = $3,
            billing_cadence = $4,
            trial_started_at = $5,
            trial_ends_at = $6,
            current_period_start = $7,
            current_period_end = $8,
            grace_expires_at = $9,
            asaas_subscription_id = $10,
            asaas_customer_id = $11
        WHERE id = $1
        "#,
    )
    .bind(subscription.company_id.as_i64())
    .bind(subscription.plan_id)
    .bind(subscription.active)
    .bind(subscription.cadence.as_str())
    .bind(subscription.trial_started_at.map(|t| *t.as_datetime()))
    .bind(subscription.trial_ends_at.map(|t| *t.as_datetime()))
    .bind(subscription.current_period_start.map(|t| *t.as_datetime()))
    .bind(subscription.current_period_end.map(|t| *t.as_datetime()))
    .bind(subscription.grace_expires_at.map(|t| *t.as_datetime()))
    .bind(&subscription.gateway_subscription_id)
    .bind(&subscription.gateway_customer_id)
    .execute(executor)
    .await
    .map_err(|e| DomainError::database("Failed to save company subscription", e))?;

    Ok(result.rows_affected())
}

// ════════════════════════════════════════════════════════════════════════════
// ChargeRepository
// ════════════════════════════════════════════════════════════════════════════

#[async_trait]
impl ChargeRepository for PostgresBillingStore {
    async fn find_flow(&self, id: &FinancialFlowId) -> Result<Option<FinancialFlow>, DomainError> {
        let sql = self.flow_query("f.id::text = $1").await?;
        let row: Option<FlowRow> = sqlx::query_as(&sql)
            .bind(id.as_key())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::database("Failed to find financial flow", e))?;

        row.map(FinancialFlow::try_from).transpose()
    }

    async fn find_flow_by_external_reference(
        &self,
        gateway_charge_id: &str,
    ) -> Result<Option<FinancialFlow>, DomainError> {
        let sql = self.flow_query("f.external_reference_id = $1").await?;
        let row: Option<FlowRow> = sqlx::query_as(&sql)
            .bind(gateway_charge_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::database("Failed to find financial flow by reference", e))?;

        row.map(FinancialFlow::try_from).transpose()
    }

    async fn find_by_flow_id(
        &self,
        id: &FinancialFlowId,
    ) -> Result<Option<LocalCharge>, DomainError> {
        let sql = format!(
            "SELECT {} FROM asaas_charges WHERE financial_flow_id = $1",
            CHARGE_COLUMNS
        );
        let row: Option<ChargeRow> = sqlx::query_as(&sql)
            .bind(id.as_key())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::database("Failed to find charge by flow", e))?;

        row.map(LocalCharge::try_from).transpose()
    }

    async fn find_by_gateway_id(
        &self,
        gateway_charge_id: &str,
    ) -> Result<Option<LocalCharge>, DomainError> {
        let sql = format!(
            "SELECT {} FROM asaas_charges WHERE asaas_charge_id = $1",
            CHARGE_COLUMNS
        );
        let row: Option<ChargeRow> = sqlx::query_as(&sql)
            .bind(gateway_charge_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::database("Failed to find charge", e))?;

        row.map(LocalCharge::try_from).transpose()
    }

    async fn insert_with_flow_status(
        &self,
        charge: &LocalCharge,
        flow_status: FlowStatus,
    ) -> Result<SaveResult, DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DomainError::database("Failed to begin transaction", e))?;

        let inserted: Option<Uuid> = sqlx::query_scalar(
            r#"
            INSERT INTO asaas_charges (
                id, financial_flow_id, credential_id, asaas_charge_id, billing_type, status,
                due_date, value, pix_payload, pix_qr_code, boleto_url, card_last4, card_brand,
                last_event, raw_payload, paid_at, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            ON CONFLICT (financial_flow_id) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(charge.id.as_uuid())
        .bind(charge.financial_flow_id.as_key())
        .bind(charge.credential_id.map(|id| *id.as_uuid()))
        .bind(&charge.gateway_charge_id)
        .bind(charge.billing_type.as_str())
        .bind(&charge.status)
        .bind(charge.due_date)
        .bind(charge.value)
        .bind(&charge.artifacts.pix_payload)
        .bind(&charge.artifacts.pix_qr_code)
        .bind(&charge.artifacts.boleto_url)
        .bind(&charge.artifacts.card_last4)
        .bind(&charge.artifacts.card_brand)
        .bind(&charge.last_event)
        .bind(&charge.raw_payload)
        .bind(charge.paid_at.map(|t| *t.as_datetime()))
        .bind(charge.created_at.as_datetime())
        .bind(charge.updated_at.as_datetime())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| DomainError::database("Failed to insert charge", e))?;

        if inserted.is_none() {
            tx.rollback()
                .await
                .map_err(|e| DomainError::database("Failed to roll back transaction", e))?;
            return Ok(SaveResult::AlreadyExists);
        }

        sqlx::query(
            r#"
            UPDATE fluxo_caixa SET
                status = $2,
                external_provider = $3,
                external_reference_id = $4
            WHERE id::text = $1
            "#,
        )
        .bind(charge.financial_flow_id.as_key())
        .bind(flow_status.as_str())
        .bind(PROVIDER)
        .bind(&charge.gateway_charge_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| DomainError::database("Failed to update financial flow", e))?;

        tx.commit()
            .await
            .map_err(|e| DomainError::database("Failed to commit charge", e))?;

        Ok(SaveResult::Inserted)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// CompanyDirectory
// ════════════════════════════════════════════════════════════════════════════

#[async_trait]
impl CompanyDirectory for PostgresBillingStore {
    async fn company_exists(&self, id: CompanyId) -> Result<bool, DomainError> {
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM empresas WHERE id = $1)")
            .bind(id.as_i64())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| DomainError::database("Failed to check company", e))
    }

    async fn find_by_subscription_id(
        &self,
        subscription_id: &str,
    ) -> Result<Option<CompanyId>, DomainError> {
        let id: Option<i64> = sqlx::query_scalar(
            "SELECT id::bigint FROM empresas WHERE asaas_subscription_id = $1 LIMIT 1",
        )
        .bind(subscription_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to find company by subscription", e))?;

        Ok(id.and_then(|id| CompanyId::new(id).ok()))
    }

    async fn find_by_customer_id(
        &self,
        customer_id: &str,
    ) -> Result<Option<CompanyId>, DomainError> {
        let id: Option<i64> = sqlx::query_scalar(
            "SELECT id::bigint FROM empresas WHERE asaas_customer_id = $1 LIMIT 1",
        )
        .bind(customer_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to find company by customer", e))?;

        Ok(id.and_then(|id| CompanyId::new(id).ok()))
    }

    async fn load_subscription(
        &self,
        id: CompanyId,
    ) -> Result<Option<CompanySubscription>, DomainError> {
        load_subscription_row(&self.pool, id, false).await
    }

    async fn save_subscription(
        &self,
        subscription: &CompanySubscription,
    ) -> Result<(), DomainError> {
        if write_subscription(&self.pool, subscription).await? == 0 {
            return Err(DomainError::new(
                ErrorCode::CompanyNotFound,
                format!("Company {} not found", subscription.company_id),
            ));
        }
        Ok(())
    }

    async fn find_profile(&self, id: CompanyId) -> Result<Option<CompanyProfile>, DomainError> {
        let row: Option<ProfileRow> = sqlx::query_as(
            "SELECT id::bigint AS id, name, email, document FROM empresas WHERE id = $1",
        )
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to load company profile", e))?;

        Ok(row.map(|row| CompanyProfile {
            id,
            name: row
                .name
                .unwrap_or_else(|| format!("Empresa {}", row.id)),
            email: row.email,
            document: row.document,
        }))
    }

    fn reset_caches(&self) {
        self.schema.reset();
    }
}

// ════════════════════════════════════════════════════════════════════════════
// ReconciliationStore
// ════════════════════════════════════════════════════════════════════════════

#[async_trait]
impl ReconciliationStore for PostgresBillingStore {
    async fn apply(&self, plan: &ReconciliationPlan) -> Result<AppliedChanges, DomainError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DomainError::database("Failed to begin transaction", e))?;

        // Serializes concurrent deliveries for the same gateway charge.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(&plan.gateway_charge_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| DomainError::database("Failed to lock charge", e))?;

        let mut applied = AppliedChanges::default();

        if let Some(update) = &plan.charge {
            let result = sqlx::query(
                r#"
                UPDATE asaas_charges SET
                    status = $2,
                    last_event = $3,
                    raw_payload = $4,
                    paid_at = COALESCE($5, paid_at),
                    updated_at = now()
                WHERE asaas_charge_id = $1
                "#,
            )
            .bind(&plan.gateway_charge_id)
            .bind(&update.status)
            .bind(&update.last_event)
            .bind(&update.raw_payload)
            .bind(update.paid_at.map(|t| *t.as_datetime()))
            .execute(&mut *tx)
            .await
            .map_err(|e| DomainError::database("Failed to update charge", e))?;
            applied.charge_updated = result.rows_affected() > 0;
        }

        if let Some(update) = &plan.flow {
            let result = sqlx::query("UPDATE fluxo_caixa SET status = $2 WHERE id::text = $1")
                .bind(update.flow_id.as_key())
                .bind(update.status.as_str())
                .execute(&mut *tx)
                .await
                .map_err(|e| DomainError::database("Failed to update financial flow", e))?;
            applied.flow_updated = result.rows_affected() > 0;
        }

        if let Some(update) = &plan.company {
            if let Some(mut subscription) =
                load_subscription_row(&mut *tx, update.company_id, true).await?
            {
                subscription.apply(update.change);
                applied.company_updated = write_subscription(&mut *tx, &subscription).await? > 0;
            }
        }

        tx.commit()
            .await
            .map_err(|e| DomainError::database("Failed to commit reconciliation", e))?;

        Ok(applied)
    }
}
