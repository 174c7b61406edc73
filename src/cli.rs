// src/cli.rs

use crate::config::{DEFAULT_CONFIG_PATH, ExportStrategy};
use crate::invoice::InvoiceDraft;
use crate::ledger::{ItemField, Ledger, LedgerError};
use clap::{Args, Parser, Subcommand};
use regex::Regex;
use std::io::{BufRead, Write};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "invoice_desk", about = "Manage invoices against the billing API")]
pub struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List invoices
    List {
        #[arg(long)]
        page: Option<u32>,
        #[arg(long)]
        limit: Option<u32>,
        /// Show the line items under each invoice
        #[arg(long)]
        expand: bool,
    },
    /// Show one invoice in full
    Show { id: i64 },
    /// Create a new invoice
    Create {
        #[command(flatten)]
        customer: CustomerArgs,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
        /// Line item as name:qty:price[:unit], repeatable
        #[arg(long = "item", value_parser = parse_item_spec)]
        items: Vec<ItemSpec>,
    },
    /// Edit an existing invoice
    Edit {
        id: i64,
        #[command(flatten)]
        customer: CustomerArgs,
        /// Change one field of a row: IDX:field=value, repeatable
        #[arg(long = "set-item", value_parser = parse_set_item)]
        set_items: Vec<SetItem>,
        /// Append a row: name:qty:price[:unit], repeatable
        #[arg(long = "add-item", value_parser = parse_item_spec)]
        add_items: Vec<ItemSpec>,
        /// Remove the row at IDX, repeatable
        #[arg(long = "remove-item")]
        remove_items: Vec<usize>,
    },
    /// Delete an invoice
    Delete {
        id: i64,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Export an invoice to PDF
    Export {
        id: i64,
        #[arg(long, value_enum)]
        strategy: Option<ExportStrategy>,
        /// Output directory (defaults to export.output_dir)
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(Args)]
pub struct CustomerArgs {
    #[arg(long)]
    pub customer_name: Option<String>,
    #[arg(long)]
    pub phone: Option<String>,
    #[arg(long)]
    pub address: Option<String>,
    #[arg(long)]
    pub notes: Option<String>,
    #[arg(long, allow_negative_numbers = true)]
    pub discount: Option<f64>,
}

impl CustomerArgs {
    /// Overwrite the draft fields that were given on the command line.
    pub fn apply(self, draft: &mut InvoiceDraft) {
        if let Some(name) = self.customer_name {
            draft.customer_name = name;
        }
        if let Some(phone) = self.phone {
            draft.customer_phone = phone;
        }
        if let Some(address) = self.address {
            draft.customer_address = address;
        }
        if let Some(notes) = self.notes {
            draft.notes = notes;
        }
        if let Some(discount) = self.discount {
            draft.discount = Some(discount);
        }
    }
}

/// A row given as `name:qty:price[:unit]`. Numbers stay text until the ledger
/// coerces them.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemSpec {
    pub name: String,
    pub quantity: String,
    pub unit_price: String,
    pub unit: Option<String>,
}

impl ItemSpec {
    /// Write this spec into the row at `index`.
    pub fn apply(&self, ledger: &mut Ledger, index: usize) -> Result<(), LedgerError> {
        ledger.update_item(index, ItemField::Name, &self.name)?;
        ledger.update_item(index, ItemField::Quantity, &self.quantity)?;
        ledger.update_item(index, ItemField::UnitPrice, &self.unit_price)?;
        if let Some(unit) = &self.unit {
            ledger.update_item(index, ItemField::Unit, unit)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SetItem {
    pub index: usize,
    pub field: ItemField,
    pub value: String,
}

pub fn parse_item_spec(s: &str) -> Result<ItemSpec, String> {
    let parts: Vec<&str> = s.split(':').collect();
    match parts.as_slice() {
        [name, qty, price] | [name, qty, price, _] if !name.trim().is_empty() => Ok(ItemSpec {
            name: name.trim().to_string(),
            quantity: qty.trim().to_string(),
            unit_price: price.trim().to_string(),
            unit: parts.get(3).map(|u| u.trim().to_string()),
        }),
        _ => Err(format!("expected name:qty:price[:unit], got {s:?}")),
    }
}

pub fn parse_set_item(s: &str) -> Result<SetItem, String> {
    let re = Regex::new(r"^(\d+):([A-Za-z_]+)=(.*)$").map_err(|e| e.to_string())?;
    let caps = re
        .captures(s)
        .ok_or_else(|| format!("expected IDX:field=value, got {s:?}"))?;
    Ok(SetItem {
        index: caps[1].parse().map_err(|e| format!("bad row index: {e}"))?,
        field: caps[2].parse()?,
        value: caps[3].to_string(),
    })
}

/// Ask a yes/no question; anything but `y` or `yes` means no.
pub fn confirm(question: &str, input: &mut impl BufRead, output: &mut impl Write) -> std::io::Result<bool> {
    write!(output, "{question} [y/N] ")?;
    output.flush()?;
    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

/// Fill a fresh form from `--item` specs. The form's initial blank row takes
/// the first spec.
pub fn fill_new_items(draft: &mut InvoiceDraft, specs: &[ItemSpec]) -> Result<(), LedgerError> {
    for (i, spec) in specs.iter().enumerate() {
        let index = if i == 0 && !draft.ledger.is_empty() {
            0
        } else {
            draft.ledger.add_item()
        };
        spec.apply(&mut draft.ledger, index)?;
    }
    Ok(())
}

/// Apply edit operations in order: field updates, appended rows, then removals
/// from the highest index down so earlier indexes keep their meaning.
pub fn apply_item_edits(
    draft: &mut InvoiceDraft,
    set_items: &[SetItem],
    add_items: &[ItemSpec],
    remove_items: &[usize],
) -> Result<(), LedgerError> {
    for edit in set_items {
        draft.ledger.update_item(edit.index, edit.field, &edit.value)?;
    }
    for spec in add_items {
        let index = draft.ledger.add_item();
        spec.apply(&mut draft.ledger, index)?;
    }
    let mut removals = remove_items.to_vec();
    removals.sort_unstable_by(|a, b| b.cmp(a));
    removals.dedup();
    for index in removals {
        draft.ledger.remove_item(index)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{LineItem, RowFloor};

    #[test]
    fn test_parse_item_spec() {
        let spec = parse_item_spec("Bolts:2:10.5:box").unwrap();
        assert_eq!(spec.name, "Bolts");
        assert_eq!(spec.quantity, "2");
        assert_eq!(spec.unit_price, "10.5");
        assert_eq!(spec.unit.as_deref(), Some("box"));

        assert_eq!(parse_item_spec("Nuts:1:5").unwrap().unit, None);
        assert!(parse_item_spec("Nuts:1").is_err());
        assert!(parse_item_spec(":1:5").is_err());
    }

    #[test]
    fn test_parse_set_item() {
        let edit = parse_set_item("0:qty=3").unwrap();
        assert_eq!(edit, SetItem { index: 0, field: ItemField::Quantity, value: "3".into() });

        let edit = parse_set_item("2:item_name=Hex: M8").unwrap();
        assert_eq!(edit.field, ItemField::Name);
        assert_eq!(edit.value, "Hex: M8");

        assert!(parse_set_item("x:qty=3").is_err());
        assert!(parse_set_item("0:colour=red").is_err());
    }

    #[test]
    fn test_confirm() {
        let ask = |answer: &str| {
            let mut out = Vec::new();
            let yes = confirm("Create Invoice?", &mut answer.as_bytes(), &mut out).unwrap();
            assert_eq!(out, b"Create Invoice? [y/N] ");
            yes
        };
        assert!(ask("y\n"));
        assert!(ask("YES\n"));
        assert!(!ask("\n"));
        assert!(!ask("nope\n"));
        assert!(!ask(""));
    }

    #[test]
    fn test_fill_new_items_uses_blank_row() {
        let mut draft = InvoiceDraft::new();
        let specs = [
            parse_item_spec("Bolts:2:10.5").unwrap(),
            parse_item_spec("Nuts:1:5").unwrap(),
        ];
        fill_new_items(&mut draft, &specs).unwrap();

        assert_eq!(draft.ledger.len(), 2);
        assert_eq!(draft.subtotal(), 26.0);
        draft.discount = Some(6.0);
        assert_eq!(draft.total(), 20.0);
    }

    #[test]
    fn test_bad_number_in_spec_is_rejected() {
        let mut draft = InvoiceDraft::new();
        let specs = [parse_item_spec("Bolts:two:10").unwrap()];
        assert!(matches!(
            fill_new_items(&mut draft, &specs),
            Err(LedgerError::InvalidNumber { .. })
        ));
    }

    #[test]
    fn test_apply_item_edits() {
        let mut draft = InvoiceDraft::new();
        draft.ledger = Ledger::from_items(
            vec![
                LineItem::new("A", 1.0, 1.0),
                LineItem::new("B", 1.0, 2.0),
                LineItem::new("C", 1.0, 3.0),
            ],
            RowFloor::AtLeastOne,
        );

        apply_item_edits(
            &mut draft,
            &[parse_set_item("0:qty=4").unwrap()],
            &[parse_item_spec("D:1:10").unwrap()],
            &[1, 2],
        )
        .unwrap();

        let names: Vec<&str> = draft.ledger.items().iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["A", "D"]);
        assert_eq!(draft.subtotal(), 14.0);
    }

    #[test]
    fn test_cannot_remove_every_row() {
        let mut draft = InvoiceDraft::new();
        draft.ledger = Ledger::from_items(vec![LineItem::new("A", 1.0, 1.0)], RowFloor::AtLeastOne);
        assert_eq!(apply_item_edits(&mut draft, &[], &[], &[0]), Err(LedgerError::LastItem));
    }
}
