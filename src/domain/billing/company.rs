//! Company profile data sent to the gateway when registering a customer.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::CompanyId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyProfile {
    pub id: CompanyId,
    pub name: String,
    pub email: Option<String>,
    /// CPF or CNPJ, digits only.
    pub document: Option<String>,
}

impl CompanyProfile {
    /// Document with punctuation stripped, `None` when nothing is left.
    pub fn document_digits(&self) -> Option<String> {
        let digits: String = self
            .document
            .as_deref()?
            .chars()
            .filter(|c| c.is_ascii_digit())
            .collect();
        (!digits.is_empty()).then_some(digits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_digits_strips_mask() {
        let profile = CompanyProfile {
            id: CompanyId::new(1).unwrap(),
            name: "Silva Advogados".to_string(),
            email: None,
            document: Some("12.345.678/0001-90".to_string()),
        };
        assert_eq!(profile.document_digits().as_deref(), Some("12345678000190"));
    }

    #[test]
    fn document_digits_none_when_empty() {
        let profile = CompanyProfile {
            id: CompanyId::new(1).unwrap(),
            name: "X".to_string(),
            email: None,
            document: Some("--".to_string()),
        };
        assert!(profile.document_digits().is_none());
    }
}
