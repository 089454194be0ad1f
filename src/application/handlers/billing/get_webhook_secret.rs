//! GetWebhookSecretHandler - operator view of a credential's webhook setup.

use std::sync::Arc;

use secrecy::SecretString;

use crate::domain::billing::{BillingError, GatewayEnvironment};
use crate::domain::foundation::CredentialId;
use crate::ports::CredentialStore;

/// Public path the gateway must post webhooks to.
pub const WEBHOOK_PATH: &str = "/integrations/asaas/webhook";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookSecretSource {
    Credential,
    Environment,
    Missing,
}

impl WebhookSecretSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookSecretSource::Credential => "credential",
            WebhookSecretSource::Environment => "environment",
            WebhookSecretSource::Missing => "missing",
        }
    }
}

#[derive(Debug, Clone)]
pub struct WebhookSecretView {
    pub credential_id: CredentialId,
    pub environment: GatewayEnvironment,
    pub secret: Option<SecretString>,
    pub source: WebhookSecretSource,
    pub configuration_url: String,
    pub instructions: Vec<String>,
}

pub struct GetWebhookSecretHandler {
    credentials: Arc<dyn CredentialStore>,
    fallback_secret: Option<SecretString>,
}

impl GetWebhookSecretHandler {
    pub fn new(credentials: Arc<dyn CredentialStore>, fallback_secret: Option<SecretString>) -> Self {
        Self {
            credentials,
            fallback_secret,
        }
    }

    pub async fn handle(&self, credential_id: CredentialId) -> Result<WebhookSecretView, BillingError> {
        let credential = self
            .credentials
            .find_by_id(credential_id)
            .await?
            .ok_or_else(|| BillingError::NotFound(format!("credential {}", credential_id)))?;

        let (secret, source) = match (&credential.webhook_secret, &self.fallback_secret) {
            (Some(own), _) => (Some(own.clone()), WebhookSecretSource::Credential),
            (None, Some(env)) => (Some(env.clone()), WebhookSecretSource::Environment),
            (None, None) => (None, WebhookSecretSource::Missing),
        };

        let configuration_url = format!(
            "{}/customerConfigIntegrations/webhooks",
            credential.environment.web_url()
        );
        let instructions = vec![
            format!("Open {} and add a webhook.", configuration_url),
            format!("Set the URL to https://<your-domain>{}.", WEBHOOK_PATH),
            "Paste the secret above into the authentication token field.".to_string(),
            "Enable the PAYMENT_RECEIVED, PAYMENT_CONFIRMED, PAYMENT_OVERDUE and PAYMENT_REFUNDED events."
                .to_string(),
        ];

        Ok(WebhookSecretView {
            credential_id,
            environment: credential.environment,
            secret,
            source,
            configuration_url,
            instructions,
        })
    }
}
