/// Document rendering
///
/// Turns a document payload plus a template context into a paginated
/// PDF byte stream. Split into the pure pieces (totals arithmetic,
/// money formatting, template context) and the layout engine.

pub mod context;
pub mod layout;
pub mod money;

pub use layout::{document_number, render_document, DocumentKind};

use serde::{Deserialize, Serialize};

/// Defensive cap on caller-controlled line items; validated before
/// rendering starts so the byte stream never aborts midway.
pub const MAX_LINE_ITEMS: usize = 500;

/// One row of the line-item table
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct LineItem {
    #[serde(alias = "desc")]
    pub description: String,
    #[serde(alias = "qty")]
    pub quantity: f64,
    #[serde(alias = "price")]
    pub unit_price: f64,
}

/// Caller-supplied document body for quotes and invoices
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct DocumentPayload {
    #[serde(alias = "items", alias = "line_items")]
    pub line_items: Vec<LineItem>,
    #[serde(alias = "vatRate")]
    pub tax_rate: f64,
    pub currency: String,
    pub discount: f64,
    pub notes: Option<String>,
    pub convert_to: Option<String>,
    pub rate_override: Option<f64>,
    /// Optional base64 data-URI logo
    pub logo: Option<String>,
    /// Counterparty display fields for ad-hoc quote exports
    pub client: Option<String>,
    pub client_address: Option<String>,
}

/// Computed money figures for the totals box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Totals {
    pub subtotal: f64,
    pub discount: f64,
    pub tax: f64,
    pub total: f64,
}

/// Accumulate the subtotal unrounded; rounding happens only at the
/// money-formatting boundary. The discount is an absolute pre-tax
/// amount, clamped so the taxed base never goes negative.
pub fn compute_totals(items: &[LineItem], discount: f64, tax_rate: f64) -> Totals {
    let subtotal: f64 = items.iter().map(|i| i.quantity * i.unit_price).sum();
    let discount = discount.max(0.0);
    let discounted = (subtotal - discount).max(0.0);
    let tax = discounted * tax_rate / 100.0;
    Totals {
        subtotal,
        discount,
        tax,
        total: discounted + tax,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(rows: &[(f64, f64)]) -> Vec<LineItem> {
        rows.iter()
            .map(|&(quantity, unit_price)| LineItem {
                description: "Voce".into(),
                quantity,
                unit_price,
            })
            .collect()
    }

    #[test]
    fn totals_match_reference_arithmetic() {
        let totals = compute_totals(&items(&[(2.0, 50.0), (1.0, 30.0)]), 0.0, 22.0);
        assert!((totals.subtotal - 130.0).abs() < 0.01);
        assert!((totals.tax - 28.6).abs() < 0.01);
        assert!((totals.total - 158.6).abs() < 0.01);
    }

    #[test]
    fn discount_is_pre_tax() {
        let totals = compute_totals(&items(&[(1.0, 100.0)]), 20.0, 10.0);
        assert!((totals.tax - 8.0).abs() < 0.01);
        assert!((totals.total - 88.0).abs() < 0.01);
    }

    #[test]
    fn discount_never_drives_the_base_negative() {
        let totals = compute_totals(&items(&[(1.0, 50.0)]), 80.0, 22.0);
        assert!((totals.tax - 0.0).abs() < 0.01);
        assert!((totals.total - 0.0).abs() < 0.01);
    }

    #[test]
    fn payload_accepts_short_field_aliases() {
        let payload: DocumentPayload = serde_json::from_str(
            r#"{"items":[{"desc":"Consulenza","qty":2,"price":50}],"vatRate":22}"#,
        )
        .unwrap();
        assert_eq!(payload.line_items.len(), 1);
        assert_eq!(payload.line_items[0].description, "Consulenza");
        assert!((payload.tax_rate - 22.0).abs() < f64::EPSILON);
    }
}
