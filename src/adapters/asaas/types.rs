//! Asaas wire types.
//!
//! Request bodies are camelCase JSON. Responses are only partially typed;
//! charge and subscription bodies are kept as raw JSON because their shape
//! varies by billing type.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::billing::GatewayApiError;
use crate::ports::{CreateChargeRequest, CustomerRequest, SubscriptionRequest};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AsaasCustomerBody<'a> {
    pub name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpf_cnpj: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_reference: Option<&'a str>,
}

impl<'a> From<&'a CustomerRequest> for AsaasCustomerBody<'a> {
    fn from(request: &'a CustomerRequest) -> Self {
        Self {
            name: &request.name,
            email: request.email.as_deref(),
            cpf_cnpj: request.cpf_cnpj.as_deref(),
            external_reference: request.external_reference.as_deref(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AsaasChargeBody<'a> {
    pub customer: &'a str,
    pub billing_type: &'static str,
    pub value: f64,
    pub due_date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<&'a str>,
    pub external_reference: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credit_card_token: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_ip: Option<&'a str>,
}

impl<'a> From<&'a CreateChargeRequest> for AsaasChargeBody<'a> {
    fn from(request: &'a CreateChargeRequest) -> Self {
        Self {
            customer: &request.customer,
            billing_type: request.billing_type.as_str(),
            value: request.value,
            due_date: request.due_date,
            description: request.description.as_deref(),
            external_reference: &request.external_reference,
            credit_card_token: request.credit_card_token.as_deref(),
            remote_ip: request.remote_ip.as_deref(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AsaasSubscriptionBody<'a> {
    pub customer: &'a str,
    pub billing_type: &'static str,
    pub value: f64,
    pub next_due_date: NaiveDate,
    pub cycle: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<&'a str>,
    pub external_reference: &'a str,
}

impl<'a> From<&'a SubscriptionRequest> for AsaasSubscriptionBody<'a> {
    fn from(request: &'a SubscriptionRequest) -> Self {
        Self {
            customer: &request.customer,
            billing_type: request.billing_type.as_str(),
            value: request.value,
            next_due_date: request.next_due_date,
            cycle: request.cadence.gateway_cycle(),
            description: request.description.as_deref(),
            external_reference: &request.external_reference,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AsaasIdResponse {
    pub id: String,
}

/// Paginated list envelope.
#[derive(Debug, Deserialize)]
pub struct AsaasList<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct AsaasErrorItem {
    code: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AsaasErrorBody {
    #[serde(default)]
    errors: Vec<AsaasErrorItem>,
}

/// Builds the error for a non-2xx response, reading the first entry of
/// `{"errors": [{"code", "description"}]}` when present.
pub fn api_error(status: u16, body: String) -> GatewayApiError {
    let first = serde_json::from_str::<AsaasErrorBody>(&body)
        .ok()
        .and_then(|parsed| parsed.errors.into_iter().next());

    let (code, message) = match first {
        Some(item) => (
            item.code,
            item.description
                .unwrap_or_else(|| format!("request failed with status {}", status)),
        ),
        None => (None, format!("request failed with status {}", status)),
    };

    GatewayApiError {
        status: Some(status),
        code,
        message,
        body: (!body.is_empty()).then_some(body),
    }
}

/// Reads a string field from a raw response body.
pub fn raw_str(raw: &Value, field: &str) -> Option<String> {
    raw.get(field).and_then(Value::as_str).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::billing::{BillingType, Cadence};
    use serde_json::json;

    #[test]
    fn parses_first_error_entry() {
        let err = api_error(
            400,
            r#"{"errors":[{"code":"invalid_customer","description":"Cliente inválido"}]}"#
                .to_string(),
        );
        assert_eq!(err.status, Some(400));
        assert_eq!(err.code.as_deref(), Some("invalid_customer"));
        assert_eq!(err.message, "Cliente inválido");
        assert!(err.body.is_some());
    }

    #[test]
    fn unparseable_error_body_keeps_raw_text() {
        let err = api_error(502, "<html>bad gateway</html>".to_string());
        assert!(err.code.is_none());
        assert_eq!(err.message, "request failed with status 502");
        assert_eq!(err.body.as_deref(), Some("<html>bad gateway</html>"));
    }

    #[test]
    fn charge_body_is_camel_case_and_skips_empty_fields() {
        let request = CreateChargeRequest {
            customer: "cus_1".to_string(),
            billing_type: BillingType::Boleto,
            value: 250.0,
            due_date: NaiveDate::from_ymd_opt(2026, 7, 10).unwrap(),
            description: None,
            external_reference: "42".to_string(),
            credit_card_token: None,
            remote_ip: None,
        };
        let body = serde_json::to_value(AsaasChargeBody::from(&request)).unwrap();
        assert_eq!(
            body,
            json!({
                "customer": "cus_1",
                "billingType": "BOLETO",
                "value": 250.0,
                "dueDate": "2026-07-10",
                "externalReference": "42"
            })
        );
    }

    #[test]
    fn subscription_body_carries_cycle() {
        let request = SubscriptionRequest {
            customer: "cus_1".to_string(),
            billing_type: BillingType::Pix,
            value: 1200.0,
            next_due_date: NaiveDate::from_ymd_opt(2026, 1, 15).unwrap(),
            cadence: Cadence::Annual,
            description: None,
            external_reference: "empresa-9".to_string(),
        };
        let body = serde_json::to_value(AsaasSubscriptionBody::from(&request)).unwrap();
        assert_eq!(body["cycle"], "YEARLY");
        assert_eq!(body["nextDueDate"], "2026-01-15");
    }
}
