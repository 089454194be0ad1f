//! Ordered-candidate field extraction from gateway JSON.
//!
//! The gateway reports the same datum under different names depending on
//! the payment method and API version. Each field has a fixed candidate
//! list, tried in order; the first non-empty string wins.

use serde_json::Value;

use super::charge::PaymentArtifacts;

pub const PIX_PAYLOAD_CANDIDATES: &[&str] = &[
    "pixTransaction.payload",
    "pixQrCode.payload",
    "pix.payload",
    "payload",
    "pixCopiaECola",
];

pub const PIX_QR_CODE_CANDIDATES: &[&str] = &[
    "pixTransaction.encodedImage",
    "pixQrCode.encodedImage",
    "pix.encodedImage",
    "encodedImage",
    "pixQrCode",
];

pub const BOLETO_URL_CANDIDATES: &[&str] = &["bankSlipUrl", "boletoUrl", "invoiceUrl"];

pub const CARD_LAST4_CANDIDATES: &[&str] = &[
    "creditCard.creditCardNumber",
    "creditCard.last4",
    "creditCardNumber",
    "card.last4",
];

pub const CARD_BRAND_CANDIDATES: &[&str] = &[
    "creditCard.creditCardBrand",
    "creditCard.brand",
    "creditCardBrand",
    "card.brand",
];

/// Looks up a dotted path (`a.b.c`) in a JSON value.
pub fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(value, |current, key| current.as_object()?.get(key))
}

/// Renders a scalar as a trimmed non-empty string.
pub fn scalar_string(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// First candidate path that resolves to a non-empty scalar.
pub fn first_string(value: &Value, candidates: &[&str]) -> Option<String> {
    candidates
        .iter()
        .find_map(|path| lookup(value, path).and_then(scalar_string))
}

/// Collects payment artifacts from a create-charge response.
pub fn extract_artifacts(response: &Value) -> PaymentArtifacts {
    PaymentArtifacts {
        pix_payload: first_string(response, PIX_PAYLOAD_CANDIDATES),
        pix_qr_code: first_string(response, PIX_QR_CODE_CANDIDATES),
        boleto_url: first_string(response, BOLETO_URL_CANDIDATES),
        card_last4: first_string(response, CARD_LAST4_CANDIDATES).map(|n| last_four(&n)),
        card_brand: first_string(response, CARD_BRAND_CANDIDATES),
    }
}

/// Fills PIX fields missing from `artifacts` using a QR-code response.
pub fn merge_pix_qr_code(artifacts: &mut PaymentArtifacts, qr_response: &Value) {
    if artifacts.pix_payload.is_none() {
        artifacts.pix_payload = first_string(qr_response, PIX_PAYLOAD_CANDIDATES);
    }
    if artifacts.pix_qr_code.is_none() {
        artifacts.pix_qr_code = first_string(qr_response, PIX_QR_CODE_CANDIDATES);
    }
}

// Card numbers may come back masked (`**** 1234`) or as the last digits only.
fn last_four(raw: &str) -> String {
    let digits: Vec<char> = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() <= 4 {
        return digits.into_iter().collect();
    }
    digits[digits.len() - 4..].iter().collect()
}
