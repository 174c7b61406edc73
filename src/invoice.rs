// src/invoice.rs

use crate::ledger::{lenient_number, Ledger, LineItem, RowFloor};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

#[derive(Debug, Error, PartialEq)]
pub enum DraftError {
    #[error("customer name is required")]
    MissingCustomerName,

    #[error("discount must be a finite number")]
    InvalidDiscount,
}

/// An invoice as stored by the backend.
///
/// Money fields travel as text (`"26.00"`) and are parsed on read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedInvoice {
    pub id: i64,
    #[serde(default)]
    pub invoice_number: String,
    #[serde(default)]
    pub customer_name: String,
    #[serde(default)]
    pub customer_phone: String,
    #[serde(default)]
    pub customer_address: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub invoice_date: String,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub subtotal: f64,
    #[serde(default, deserialize_with = "lenient_number")]
    pub discount: f64,
    #[serde(default, deserialize_with = "lenient_number")]
    pub total_amount: f64,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub notes: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty_vec")]
    pub items: Vec<LineItem>,
}

impl PersistedInvoice {
    /// A read-only ledger over the stored items.
    pub fn ledger(&self) -> Ledger {
        Ledger::from_items(self.items.clone(), RowFloor::None)
    }

    /// `created_at` rendered as local-looking `YYYY-MM-DD HH:MM`, or the raw text
    /// when it is not RFC 3339.
    pub fn created_at_display(&self) -> String {
        let Some(raw) = self.created_at.as_deref() else {
            return String::new();
        };
        let format = time::macros::format_description!("[year]-[month]-[day] [hour]:[minute]");
        OffsetDateTime::parse(raw, &Rfc3339)
            .ok()
            .and_then(|ts| ts.format(&format).ok())
            .unwrap_or_else(|| raw.to_string())
    }
}

/// Request body for `POST /invoices` and `PUT /invoices/:id`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvoicePayload {
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount: Option<f64>,
    pub notes: String,
    pub items: Vec<LineItem>,
}

/// The state of one create or edit form session.
#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceDraft {
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_address: String,
    pub notes: String,
    pub discount: Option<f64>,
    pub ledger: Ledger,
}

impl Default for InvoiceDraft {
    fn default() -> Self {
        Self::new()
    }
}

impl InvoiceDraft {
    pub fn new() -> Self {
        Self {
            customer_name: String::new(),
            customer_phone: String::new(),
            customer_address: String::new(),
            notes: String::new(),
            discount: None,
            ledger: Ledger::for_form(),
        }
    }

    /// Seed an edit session from a stored invoice.
    pub fn from_persisted(invoice: &PersistedInvoice) -> Self {
        Self {
            customer_name: invoice.customer_name.clone(),
            customer_phone: invoice.customer_phone.clone(),
            customer_address: invoice.customer_address.clone(),
            notes: invoice.notes.clone(),
            discount: (invoice.discount != 0.0).then_some(invoice.discount),
            ledger: Ledger::from_items(invoice.items.clone(), RowFloor::AtLeastOne),
        }
    }

    pub fn subtotal(&self) -> f64 {
        self.ledger.subtotal()
    }

    pub fn total(&self) -> f64 {
        self.ledger.total(self.discount)
    }

    pub fn validate(&self) -> Result<(), DraftError> {
        if self.customer_name.trim().is_empty() {
            return Err(DraftError::MissingCustomerName);
        }
        if self.discount.is_some_and(|d| !d.is_finite()) {
            return Err(DraftError::InvalidDiscount);
        }
        Ok(())
    }

    /// Validate and build the request body.
    pub fn to_payload(&self) -> Result<InvoicePayload, DraftError> {
        self.validate()?;
        Ok(InvoicePayload {
            customer_name: self.customer_name.trim().to_string(),
            customer_phone: self.customer_phone.clone(),
            customer_address: self.customer_address.clone(),
            discount: self.discount,
            notes: self.notes.clone(),
            items: self.ledger.items().to_vec(),
        })
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn null_as_empty_vec<'de, D>(deserializer: D) -> Result<Vec<LineItem>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<LineItem>>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{ItemField, LedgerError};

    const STORED: &str = r#"{
        "id": 7,
        "invoice_number": "INV-0007",
        "customer_name": "Ada Lovelace",
        "customer_phone": "555-0101",
        "customer_address": "12 Analytical St",
        "status": "unpaid",
        "invoice_date": "2025-03-01",
        "due_date": null,
        "subtotal": "26.00",
        "discount": "6.00",
        "total_amount": "20.00",
        "notes": null,
        "created_at": "2025-03-01T09:30:00Z",
        "items": [
            {"item_name": "Bolts", "unit": "box", "quantity": 2, "unit_price": "10.50"},
            {"item_name": "Nuts", "quantity": "1", "unit_price": 5}
        ]
    }"#;

    #[test]
    fn test_parse_stored_invoice() {
        let invoice: PersistedInvoice = serde_json::from_str(STORED).unwrap();
        assert_eq!(invoice.id, 7);
        assert_eq!(invoice.subtotal, 26.0);
        assert_eq!(invoice.discount, 6.0);
        assert_eq!(invoice.total_amount, 20.0);
        assert_eq!(invoice.notes, "");
        assert_eq!(invoice.due_date, None);
        assert_eq!(invoice.items.len(), 2);
        assert_eq!(invoice.ledger().subtotal(), 26.0);
        assert_eq!(invoice.created_at_display(), "2025-03-01 09:30");
    }

    #[test]
    fn test_missing_items_read_as_empty() {
        let invoice: PersistedInvoice =
            serde_json::from_str(r#"{"id": 1, "invoice_number": "A", "total_amount": null}"#)
                .unwrap();
        assert!(invoice.items.is_empty());
        assert_eq!(invoice.total_amount, 0.0);
    }

    #[test]
    fn test_edit_session_of_itemless_invoice_keeps_one_row() {
        let invoice: PersistedInvoice =
            serde_json::from_str(r#"{"id": 1, "invoice_number": "A", "customer_name": "X"}"#)
                .unwrap();
        let mut draft = InvoiceDraft::from_persisted(&invoice);
        assert_eq!(draft.ledger.len(), 1);
        assert_eq!(draft.to_payload().unwrap().items.len(), 1);
        assert_eq!(draft.ledger.remove_item(0), Err(LedgerError::LastItem));
    }

    #[test]
    fn test_bad_money_text_is_rejected() {
        let result: Result<PersistedInvoice, _> =
            serde_json::from_str(r#"{"id": 1, "total_amount": "twelve"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_draft_requires_customer_name() {
        let draft = InvoiceDraft::new();
        assert_eq!(draft.to_payload(), Err(DraftError::MissingCustomerName));
    }

    #[test]
    fn test_draft_totals_and_payload() {
        let mut draft = InvoiceDraft::new();
        draft.customer_name = "  Grace  ".into();
        draft.discount = Some(6.0);
        draft.ledger.update_item(0, ItemField::Name, "Bolts").unwrap();
        draft.ledger.update_item(0, ItemField::Quantity, "2").unwrap();
        draft.ledger.update_item(0, ItemField::UnitPrice, "10.5").unwrap();
        let idx = draft.ledger.add_item();
        draft.ledger.update_item(idx, ItemField::UnitPrice, "5").unwrap();

        assert_eq!(draft.subtotal(), 26.0);
        assert_eq!(draft.total(), 20.0);

        let payload = draft.to_payload().unwrap();
        let body = serde_json::to_value(&payload).unwrap();
        assert_eq!(body["customer_name"], "Grace");
        assert_eq!(body["discount"], 6.0);
        assert_eq!(body["items"][0]["item_name"], "Bolts");
        assert_eq!(body["items"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_payload_omits_absent_discount() {
        let mut draft = InvoiceDraft::new();
        draft.customer_name = "Grace".into();
        let body = serde_json::to_value(draft.to_payload().unwrap()).unwrap();
        assert!(body.get("discount").is_none());
    }

    #[test]
    fn test_edit_session_keeps_floor() {
        let invoice: PersistedInvoice = serde_json::from_str(STORED).unwrap();
        let mut draft = InvoiceDraft::from_persisted(&invoice);
        assert_eq!(draft.discount, Some(6.0));
        assert_eq!(draft.total(), 20.0);

        draft.ledger.remove_item(0).unwrap();
        assert!(draft.ledger.remove_item(0).is_err());
        assert_eq!(draft.ledger.len(), 1);
    }
}
