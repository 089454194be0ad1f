//! HandleGatewayWebhookHandler - reconciles gateway payment webhooks.
//!
//! The handler never fails towards the sender. Every outcome, including
//! bad signatures and storage failures, is logged and reported as a
//! `WebhookOutcome`; the HTTP layer acknowledges all of them with 202 so
//! the gateway does not retry deliveries that cannot be acted on.

use std::sync::Arc;

use secrecy::SecretString;
use tracing::{debug, error, info, warn};

use super::company_resolution::{ChargeContext, CompanyHints, CompanyResolutionChain};
use super::credential_resolver::CredentialResolver;
use crate::domain::billing::{
    EventEffect, GatewayEvent, TimelineChange, WebhookDelivery, WebhookEnvelope,
    WebhookSignatureVerifier,
};
use crate::domain::foundation::Timestamp;
use crate::ports::{
    AppliedChanges, ChargeStatusUpdate, CompanyTimelineUpdate, CredentialStore,
    FlowStatusUpdate, ReconciliationPlan, ReconciliationStore,
};

/// How a delivery was disposed of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// Not a payment event we act on, or not interpretable.
    Ignored { reason: String },
    /// Signature missing, malformed or wrong, or no secret to check it with.
    Unauthenticated { reason: String },
    /// Authenticated, but nothing known to update.
    NothingToApply { charge_id: String },
    /// Lookup or write failed; nothing was committed.
    Failed { charge_id: String, reason: String },
    /// Changes committed.
    Applied {
        charge_id: String,
        event: GatewayEvent,
        changes: AppliedChanges,
    },
}

pub struct HandleGatewayWebhookHandler {
    chain: Arc<CompanyResolutionChain>,
    resolver: Arc<CredentialResolver>,
    credentials: Arc<dyn CredentialStore>,
    reconciliation: Arc<dyn ReconciliationStore>,
    fallback_secret: Option<SecretString>,
}

impl HandleGatewayWebhookHandler {
    pub fn new(
        chain: Arc<CompanyResolutionChain>,
        resolver: Arc<CredentialResolver>,
        credentials: Arc<dyn CredentialStore>,
        reconciliation: Arc<dyn ReconciliationStore>,
        fallback_secret: Option<SecretString>,
    ) -> Self {
        Self {
            chain,
            resolver,
            credentials,
            reconciliation,
            fallback_secret,
        }
    }

    pub async fn handle(&self, delivery: WebhookDelivery) -> WebhookOutcome {
        self.handle_at(delivery, Timestamp::now()).await
    }

    /// Processes a delivery as if received at `now`.
    pub async fn handle_at(&self, delivery: WebhookDelivery, now: Timestamp) -> WebhookOutcome {
        // 1. Event filter
        let envelope = match WebhookEnvelope::from_slice(&delivery.raw_body) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(error = %e, "Webhook body is not valid JSON");
                return WebhookOutcome::Ignored {
                    reason: "unparseable body".to_string(),
                };
            }
        };
        let event = match envelope.gateway_event() {
            Some(event) => event,
            None => {
                debug!(event = %envelope.event, "Webhook event ignored");
                return WebhookOutcome::Ignored {
                    reason: format!("unhandled event '{}'", envelope.event),
                };
            }
        };

        // 2. Charge id
        let payment = envelope.payment();
        let charge_id = match payment.charge_id() {
            Some(id) => id,
            None => {
                warn!(event = %event, "Webhook payment has no charge id");
                return WebhookOutcome::Ignored {
                    reason: "missing charge id".to_string(),
                };
            }
        };

        // 3. Context
        let hints = CompanyHints::from_payment(&payment);
        let context = match self.chain.resolve_context(&charge_id, &hints).await {
            Ok(context) => context,
            Err(e) => {
                error!(charge_id = %charge_id, error = %e, "Webhook context resolution failed");
                return WebhookOutcome::Failed {
                    charge_id,
                    reason: e.to_string(),
                };
            }
        };

        // 4. Secret, 5. Signature
        let secret = match self.signing_secret(&context).await {
            Some(secret) => secret,
            None => {
                warn!(charge_id = %charge_id, "No webhook secret configured, delivery dropped");
                return WebhookOutcome::Unauthenticated {
                    reason: "no signing secret".to_string(),
                };
            }
        };
        if let Err(e) = WebhookSignatureVerifier::new(secret)
            .verify(&delivery.raw_body, delivery.signature.as_deref())
        {
            warn!(charge_id = %charge_id, event = %event, reason = %e, "Webhook signature rejected");
            return WebhookOutcome::Unauthenticated {
                reason: e.to_string(),
            };
        }

        // 6. State application
        let status = payment.effective_status(event);
        let effect = EventEffect::classify(event, &status);
        let paid_at = payment.payment_date().unwrap_or(now);

        let company_id = match context.company_id {
            Some(id) => Some(id),
            None if context.financial_flow_id.is_some() => {
                match self.chain.resolve_from_payload(&hints).await {
                    Ok(found) => found,
                    Err(e) => {
                        error!(charge_id = %charge_id, error = %e, "Company re-resolution failed");
                        return WebhookOutcome::Failed {
                            charge_id,
                            reason: e.to_string(),
                        };
                    }
                }
            }
            None => None,
        };

        let plan = ReconciliationPlan {
            gateway_charge_id: charge_id.clone(),
            charge: context.charge.as_ref().map(|_| ChargeStatusUpdate {
                status: status.clone(),
                last_event: event.as_str().to_string(),
                raw_payload: envelope.payment.clone(),
                paid_at: (effect == EventEffect::Paid).then_some(paid_at),
            }),
            flow: context
                .financial_flow_id
                .zip(effect.flow_status())
                .map(|(flow_id, status)| FlowStatusUpdate { flow_id, status }),
            company: company_id.and_then(|company_id| {
                let change = match effect {
                    EventEffect::Paid => TimelineChange::PaymentConfirmed { paid_at },
                    EventEffect::Overdue => TimelineChange::PaymentOverdue { observed_at: now },
                    EventEffect::Reversed | EventEffect::None => return None,
                };
                Some(CompanyTimelineUpdate { company_id, change })
            }),
        };

        if plan.is_empty() {
            info!(charge_id = %charge_id, event = %event, "Webhook authenticated, nothing to update");
            return WebhookOutcome::NothingToApply { charge_id };
        }

        match self.reconciliation.apply(&plan).await {
            Ok(changes) => {
                info!(
                    charge_id = %charge_id,
                    event = %event,
                    status = %status,
                    company_id = ?company_id.map(|c| c.as_i64()),
                    charge_updated = changes.charge_updated,
                    flow_updated = changes.flow_updated,
                    company_updated = changes.company_updated,
                    "Webhook reconciled"
                );
                WebhookOutcome::Applied {
                    charge_id,
                    event,
                    changes,
                }
            }
            Err(e) => {
                error!(charge_id = %charge_id, event = %event, error = %e, "Webhook reconciliation failed");
                WebhookOutcome::Failed {
                    charge_id,
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Secret of the charge's credential, else of the company's own or the
    /// global credential, else the process-wide secret. Another tenant's
    /// credential is never consulted, whatever the legacy policy says.
    async fn signing_secret(&self, context: &ChargeContext) -> Option<SecretString> {
        let stored = match context.credential_id {
            Some(id) => self.credentials.find_by_id(id).await.map_err(|e| e.to_string()),
            None => match context.company_id {
                Some(company) => self
                    .resolver
                    .find_scoped(Some(company), None)
                    .await
                    .map_err(|e| e.to_string()),
                None => Ok(None),
            },
        };

        match stored {
            Ok(Some(credential)) if credential.webhook_secret.is_some() => {
                credential.webhook_secret
            }
            Ok(_) => self.fallback_secret.clone(),
            Err(e) => {
                warn!(error = %e, "Credential lookup for webhook secret failed, using fallback");
                self.fallback_secret.clone()
            }
        }
    }
}
