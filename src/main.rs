//! Practice billing service entry point.

use std::error::Error;
use std::sync::Arc;

use axum::Router;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use practice_billing::adapters::asaas::AsaasClientFactory;
use practice_billing::adapters::http::billing::{billing_router, BillingAppState, BillingDependencies};
use practice_billing::adapters::http::middleware::IpAllowlist;
use practice_billing::adapters::postgres::{
    PostgresBillingStore, PostgresCredentialStore, SchemaCache,
};
use practice_billing::application::handlers::billing::CredentialPolicy;
use practice_billing::config::AppConfig;

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.server.log_level.clone()));

    let registry = tracing_subscriber::registry().with(filter);
    if config.is_production() {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config = AppConfig::load()?;
    config.validate()?;
    init_tracing(&config);

    let pool = config.database.connect().await?;
    config.database.migrate(&pool).await?;
    tracing::info!(
        max_connections = config.database.max_connections,
        run_migrations = config.database.run_migrations,
        "Database ready"
    );

    let gateway = &config.gateway;
    let billing_store = Arc::new(PostgresBillingStore::new(
        pool.clone(),
        Arc::new(SchemaCache::new()),
    ));
    let credential_store = Arc::new(PostgresCredentialStore::new(pool));
    let gateways = Arc::new(AsaasClientFactory::new(gateway.http_timeout())?);

    let fallback = gateway.fallback_credential();
    if fallback.is_none() {
        tracing::warn!("No fallback gateway credential configured");
    }
    if gateway.webhook_secret.is_none() {
        tracing::warn!("ASAAS_WEBHOOK_SECRET not set; webhooks rely on stored credential secrets");
    }

    let state = BillingAppState::new(BillingDependencies {
        charges: billing_store.clone(),
        companies: billing_store.clone(),
        credentials: credential_store,
        reconciliation: billing_store,
        gateways,
        policy: CredentialPolicy {
            allow_legacy_fallback: gateway.allow_legacy_fallback,
            fallback,
        },
        fallback_webhook_secret: gateway.webhook_secret.clone(),
        plan_account: gateway.plan_account_id,
    });
    let allowlist = Arc::new(
        IpAllowlist::new(gateway.webhook_allowed_ips.clone())
            .trust_forwarded_headers(gateway.webhook_trust_forwarded),
    );

    let app: Router = billing_router(allowlist)
        .with_state(state)
        .layer(TimeoutLayer::new(config.server.request_timeout()))
        .layer(TraceLayer::new_for_http());

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(
        %addr,
        environment = %gateway.environment,
        "Practice billing listening"
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, stopping server");
}
