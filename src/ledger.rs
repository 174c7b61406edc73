// src/ledger.rs

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error, PartialEq)]
pub enum LedgerError {
    #[error("line item {index} does not exist (ledger has {len} items)")]
    OutOfRange { index: usize, len: usize },

    #[error("cannot remove the last line item")]
    LastItem,

    #[error("{field} must be a number, got {value:?}")]
    InvalidNumber { field: ItemField, value: String },
}

/// A single priced entry on an invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    #[serde(rename = "item_name", default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub quantity: f64,
    #[serde(default, deserialize_with = "lenient_number")]
    pub unit_price: f64,
}

impl Default for LineItem {
    fn default() -> Self {
        Self {
            name: String::new(),
            unit: Some(String::new()),
            description: None,
            quantity: 1.0,
            unit_price: 0.0,
        }
    }
}

impl LineItem {
    pub fn new(name: impl Into<String>, quantity: f64, unit_price: f64) -> Self {
        Self {
            name: name.into(),
            quantity: quantity.max(0.0),
            unit_price: unit_price.max(0.0),
            ..Self::default()
        }
    }

    /// Extended price of this line. Non-finite results count as zero.
    pub fn amount(&self) -> f64 {
        let amount = self.quantity * self.unit_price;
        if amount.is_finite() { amount } else { 0.0 }
    }
}

/// Editable fields of a line item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemField {
    Name,
    Unit,
    Description,
    Quantity,
    UnitPrice,
}

impl std::fmt::Display for ItemField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ItemField::Name => "item_name",
            ItemField::Unit => "unit",
            ItemField::Description => "description",
            ItemField::Quantity => "quantity",
            ItemField::UnitPrice => "unit_price",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for ItemField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "name" | "item_name" => Ok(ItemField::Name),
            "unit" => Ok(ItemField::Unit),
            "description" | "desc" => Ok(ItemField::Description),
            "quantity" | "qty" => Ok(ItemField::Quantity),
            "unit_price" | "price" => Ok(ItemField::UnitPrice),
            other => Err(format!("unknown line item field '{other}'")),
        }
    }
}

/// Whether removals may empty the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowFloor {
    /// Create and edit forms always keep at least one row.
    AtLeastOne,
    /// View-only contexts.
    None,
}

/// The ordered line items of one invoice, with derived totals.
///
/// All mutation goes through [`Ledger::add_item`], [`Ledger::update_item`]
/// and [`Ledger::remove_item`]; quantities and prices are kept finite and
/// non-negative by those operations.
#[derive(Debug, Clone, PartialEq)]
pub struct Ledger {
    items: Vec<LineItem>,
    floor: RowFloor,
}

impl Ledger {
    /// A fresh form ledger holding one default row.
    pub fn for_form() -> Self {
        Self {
            items: vec![LineItem::default()],
            floor: RowFloor::AtLeastOne,
        }
    }

    /// Wrap existing rows. A floor-enforcing ledger given no rows starts with
    /// one default row, like a fresh form.
    pub fn from_items(items: Vec<LineItem>, floor: RowFloor) -> Self {
        let mut items: Vec<LineItem> = items
            .into_iter()
            .map(|mut item| {
                item.quantity = sanitize(item.quantity);
                item.unit_price = sanitize(item.unit_price);
                item
            })
            .collect();
        if items.is_empty() && floor == RowFloor::AtLeastOne {
            items.push(LineItem::default());
        }
        Self { items, floor }
    }

    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn add_item(&mut self) -> usize {
        self.items.push(LineItem::default());
        debug!(
            items = self.items.len(),
            subtotal = self.subtotal(),
            "Line item added"
        );
        self.items.len() - 1
    }

    pub fn update_item(
        &mut self,
        index: usize,
        field: ItemField,
        value: &str,
    ) -> Result<(), LedgerError> {
        let len = self.items.len();
        let item = self
            .items
            .get_mut(index)
            .ok_or(LedgerError::OutOfRange { index, len })?;

        match field {
            ItemField::Name => item.name = value.to_string(),
            ItemField::Unit => item.unit = Some(value.to_string()),
            ItemField::Description => {
                item.description = (!value.is_empty()).then(|| value.to_string())
            }
            ItemField::Quantity => item.quantity = coerce_number(field, value)?,
            ItemField::UnitPrice => item.unit_price = coerce_number(field, value)?,
        }

        debug!(
            index,
            field = %field,
            subtotal = self.subtotal(),
            "Line item updated"
        );
        Ok(())
    }

    pub fn remove_item(&mut self, index: usize) -> Result<LineItem, LedgerError> {
        let len = self.items.len();
        if index >= len {
            return Err(LedgerError::OutOfRange { index, len });
        }
        if self.floor == RowFloor::AtLeastOne && len == 1 {
            warn!("Cannot remove the last item");
            return Err(LedgerError::LastItem);
        }

        let removed = self.items.remove(index);
        debug!(
            index,
            items = self.items.len(),
            subtotal = self.subtotal(),
            "Line item removed"
        );
        Ok(removed)
    }

    pub fn subtotal(&self) -> f64 {
        self.items.iter().map(LineItem::amount).sum()
    }

    pub fn total(&self, discount: Option<f64>) -> f64 {
        self.subtotal() - discount.unwrap_or(0.0)
    }
}

/// Parse a numeric form field. Blank input reads as zero, negative values
/// are clamped to zero, anything else that is not a finite number is
/// rejected.
fn coerce_number(field: ItemField, value: &str) -> Result<f64, LedgerError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(0.0);
    }

    let parsed = trimmed
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| LedgerError::InvalidNumber {
            field,
            value: value.to_string(),
        })?;

    if parsed < 0.0 {
        warn!(field = %field, value = parsed, "Negative value clamped to 0");
        return Ok(0.0);
    }
    Ok(parsed)
}

fn sanitize(v: f64) -> f64 {
    if v.is_finite() && v > 0.0 { v } else { 0.0 }
}

/// Format a money value with exactly two decimals.
pub fn format_money(value: f64) -> String {
    if !value.is_finite() {
        return "0.00".to_string();
    }
    let formatted = format!("{value:.2}");
    if formatted == "-0.00" {
        "0.00".to_string()
    } else {
        formatted
    }
}

/// Format a money value with two decimals and thousands separators: 1234.5 → "1,234.50"
pub fn format_money_grouped(value: f64) -> String {
    let plain = format_money(value);
    let (sign, digits) = match plain.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", plain.as_str()),
    };
    let (whole, fraction) = digits.split_once('.').unwrap_or((digits, "00"));

    let grouped = whole
        .as_bytes()
        .rchunks(3)
        .rev()
        .map(|c| String::from_utf8_lossy(c).into_owned())
        .collect::<Vec<_>>()
        .join(",");

    format!("{sign}{grouped}.{fraction}")
}

/// Accepts a JSON number, numeric text, or null (read as 0).
pub(crate) fn lenient_number<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrText {
        Number(f64),
        Text(String),
        Null(()),
    }

    match NumberOrText::deserialize(deserializer)? {
        NumberOrText::Number(v) => Ok(v),
        NumberOrText::Null(()) => Ok(0.0),
        NumberOrText::Text(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return Ok(0.0);
            }
            trimmed
                .parse::<f64>()
                .map_err(|_| serde::de::Error::custom(format!("invalid number {text:?}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger_with(items: &[(f64, f64)]) -> Ledger {
        Ledger::from_items(
            items
                .iter()
                .map(|&(qty, price)| LineItem::new("item", qty, price))
                .collect(),
            RowFloor::AtLeastOne,
        )
    }

    #[test]
    fn test_reference_totals() {
        let ledger = ledger_with(&[(2.0, 10.5), (1.0, 5.0)]);
        assert_eq!(ledger.subtotal(), 26.0);
        assert_eq!(ledger.total(Some(6.0)), 20.0);
        assert_eq!(ledger.total(None), 26.0);
    }

    #[test]
    fn test_total_is_not_clamped() {
        let ledger = ledger_with(&[(1.0, 10.0)]);
        assert_eq!(ledger.total(Some(0.0)), 10.0);
        assert_eq!(ledger.total(Some(-5.0)), 15.0);
        assert_eq!(ledger.total(Some(25.0)), -15.0);
    }

    #[test]
    fn test_form_ledger_starts_with_default_row() {
        let ledger = Ledger::for_form();
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.items()[0].quantity, 1.0);
        assert_eq!(ledger.items()[0].unit_price, 0.0);
        assert_eq!(ledger.subtotal(), 0.0);
    }

    #[test]
    fn test_subtotal_tracks_mutations() {
        let mut ledger = Ledger::for_form();
        ledger.update_item(0, ItemField::Quantity, "3").unwrap();
        ledger.update_item(0, ItemField::UnitPrice, "2.5").unwrap();
        assert_eq!(ledger.subtotal(), 7.5);

        let idx = ledger.add_item();
        assert_eq!(idx, 1);
        ledger.update_item(idx, ItemField::UnitPrice, "4").unwrap();
        assert_eq!(ledger.subtotal(), 11.5);

        ledger.add_item();
        ledger.update_item(2, ItemField::Quantity, "10").unwrap();
        ledger.update_item(2, ItemField::UnitPrice, "1").unwrap();
        ledger.remove_item(0).unwrap();

        let expected: f64 = ledger
            .items()
            .iter()
            .map(|i| i.quantity * i.unit_price)
            .sum();
        assert_eq!(ledger.subtotal(), expected);
        assert_eq!(ledger.subtotal(), 14.0);
    }

    #[test]
    fn test_remove_last_row_is_rejected() {
        let mut ledger = Ledger::for_form();
        ledger.update_item(0, ItemField::Name, "Widget").unwrap();
        let before = ledger.clone();

        assert_eq!(ledger.remove_item(0), Err(LedgerError::LastItem));
        assert_eq!(ledger, before);
    }

    #[test]
    fn test_view_ledger_may_become_empty() {
        let mut ledger = Ledger::from_items(vec![LineItem::new("a", 1.0, 1.0)], RowFloor::None);
        ledger.remove_item(0).unwrap();
        assert!(ledger.is_empty());
        assert_eq!(ledger.subtotal(), 0.0);
    }

    #[test]
    fn test_floor_ledger_from_no_items_gets_default_row() {
        let ledger = Ledger::from_items(vec![], RowFloor::AtLeastOne);
        assert_eq!(ledger.items(), &[LineItem::default()]);
        assert_eq!(ledger.subtotal(), 0.0);

        assert!(Ledger::from_items(vec![], RowFloor::None).is_empty());
    }

    #[test]
    fn test_out_of_range() {
        let mut ledger = Ledger::for_form();
        assert_eq!(
            ledger.update_item(3, ItemField::Name, "x"),
            Err(LedgerError::OutOfRange { index: 3, len: 1 })
        );
        assert_eq!(
            ledger.remove_item(1),
            Err(LedgerError::OutOfRange { index: 1, len: 1 })
        );
    }

    #[test]
    fn test_numeric_coercion() {
        let mut ledger = Ledger::for_form();

        ledger.update_item(0, ItemField::Quantity, "").unwrap();
        assert_eq!(ledger.items()[0].quantity, 0.0);

        ledger.update_item(0, ItemField::Quantity, "-4").unwrap();
        assert_eq!(ledger.items()[0].quantity, 0.0);

        ledger.update_item(0, ItemField::UnitPrice, " 12.25 ").unwrap();
        assert_eq!(ledger.items()[0].unit_price, 12.25);

        let err = ledger.update_item(0, ItemField::UnitPrice, "abc").unwrap_err();
        assert!(matches!(err, LedgerError::InvalidNumber { field: ItemField::UnitPrice, .. }));
        assert_eq!(ledger.items()[0].unit_price, 12.25);

        assert!(ledger.update_item(0, ItemField::Quantity, "NaN").is_err());
        assert!(ledger.update_item(0, ItemField::Quantity, "inf").is_err());
    }

    #[test]
    fn test_non_finite_contribution_counts_as_zero() {
        let ledger = ledger_with(&[(f64::MAX, 10.0), (2.0, 3.0)]);
        assert_eq!(ledger.subtotal(), 6.0);
    }

    #[test]
    fn test_format_money() {
        assert_eq!(format_money(26.0), "26.00");
        assert_eq!(format_money(10.5), "10.50");
        assert_eq!(format_money(2.0 / 3.0), "0.67");
        assert_eq!(format_money(1.005e3), "1005.00");
        assert_eq!(format_money(f64::NAN), "0.00");
        assert_eq!(format_money(-0.001), "0.00");
        assert_eq!(format_money(-15.0), "-15.00");
    }

    #[test]
    fn test_format_money_grouped() {
        assert_eq!(format_money_grouped(1234.5), "1,234.50");
        assert_eq!(format_money_grouped(999.0), "999.00");
        assert_eq!(format_money_grouped(1_000_000.0), "1,000,000.00");
        assert_eq!(format_money_grouped(-2500.0), "-2,500.00");
    }

    #[test]
    fn test_line_item_wire_format() {
        let json = r#"{"item_name":"Paint","unit":"l","quantity":"2","unit_price":"7.50"}"#;
        let item: LineItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.name, "Paint");
        assert_eq!(item.quantity, 2.0);
        assert_eq!(item.unit_price, 7.5);

        let out = serde_json::to_value(&item).unwrap();
        assert_eq!(out["item_name"], "Paint");
        assert_eq!(out["unit_price"], 7.5);
        assert!(out.get("description").is_none());
    }
}
