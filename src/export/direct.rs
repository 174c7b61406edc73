// src/export/direct.rs

use super::pdf::{PdfBuilder, helvetica_width, line_ops, text_ops};
use super::sheet::{trim_number, wrap};
use super::{DocumentExporter, ExportError, ExportedDocument, document_file_name};
use crate::config::PageFormat;
use crate::invoice::PersistedInvoice;
use crate::ledger::format_money;
use lopdf::content::Operation;
use tracing::warn;

const MARGIN: f32 = 50.0;
const BODY: f32 = 11.0;
const LEADING: f32 = 16.0;
const REGULAR: &str = "F1";
const BOLD: &str = "F2";

/// Draws the invoice fields and item table straight onto a single page.
pub struct DirectExporter {
    format: PageFormat,
}

impl DirectExporter {
    pub fn new(format: PageFormat) -> Self {
        Self { format }
    }
}

/// Running cursor over one page. Anything below the bottom margin is dropped.
struct PageWriter {
    ops: Vec<Operation>,
    y: f32,
    width: f32,
    clipped: usize,
}

impl PageWriter {
    fn advance(&mut self, by: f32) -> bool {
        self.y -= by;
        if self.y < MARGIN {
            self.clipped += 1;
            false
        } else {
            true
        }
    }

    fn text(&mut self, font: &str, size: f32, x: f32, text: &str) {
        if !text.is_empty() {
            self.ops.extend(text_ops(font, size, x, self.y, text));
        }
    }

    fn text_right(&mut self, font: &str, size: f32, right: f32, text: &str) {
        let x = right - helvetica_width(text, size);
        self.text(font, size, x, text);
    }

    fn rule(&mut self) {
        let y = self.y;
        self.ops.extend(line_ops(MARGIN, self.width - MARGIN, y, 0.5));
    }

    /// Start a new line and draw `text` on it, if the line is still on the page.
    fn line(&mut self, font: &str, size: f32, text: &str) {
        if self.advance(LEADING) {
            self.text(font, size, MARGIN, text);
        }
    }
}

impl DocumentExporter for DirectExporter {
    fn name(&self) -> &'static str {
        "direct"
    }

    fn export(&self, invoice: &PersistedInvoice) -> Result<ExportedDocument, ExportError> {
        let mut pdf = PdfBuilder::new(self.format);
        pdf.add_standard_font(REGULAR, "Helvetica");
        pdf.add_standard_font(BOLD, "Helvetica-Bold");
        let (width, height) = pdf.page_size();
        let right = width - MARGIN;

        let mut page = PageWriter {
            ops: Vec::new(),
            y: height - MARGIN - 22.0,
            width,
            clipped: 0,
        };
        page.text(BOLD, 22.0, MARGIN, "INVOICE");
        page.advance(10.0);

        let due = invoice.due_date.as_deref().filter(|d| !d.is_empty()).unwrap_or("N/A");
        for line in [
            format!("Invoice No: {}", invoice.invoice_number),
            format!("Date: {}", invoice.invoice_date),
            format!("Due Date: {due}"),
            format!("Status: {}", invoice.status),
        ] {
            page.line(REGULAR, BODY, &line);
        }

        page.advance(12.0);
        page.line(BOLD, 12.0, "Billed to:");
        for field in [&invoice.customer_name, &invoice.customer_phone, &invoice.customer_address] {
            if !field.is_empty() {
                page.line(REGULAR, BODY, field);
            }
        }

        // Item table
        let columns = [MARGIN, MARGIN + 230.0, MARGIN + 290.0];
        let price_right = right - 90.0;
        page.advance(14.0);
        if page.advance(LEADING) {
            for (x, heading) in columns.iter().zip(["Item", "Unit", "Qty"]) {
                page.text(BOLD, BODY, *x, heading);
            }
            page.text_right(BOLD, BODY, price_right, "Unit Price");
            page.text_right(BOLD, BODY, right, "Total");
            page.advance(6.0);
            page.rule();
        }
        let name_width = columns[1] - columns[0] - 10.0;
        for item in &invoice.items {
            let names = wrap(&item.name, |s| helvetica_width(s, BODY) <= name_width);
            if !page.advance(LEADING) {
                continue;
            }
            page.text(REGULAR, BODY, columns[0], &names[0]);
            page.text(REGULAR, BODY, columns[1], item.unit.as_deref().unwrap_or(""));
            page.text(REGULAR, BODY, columns[2], &trim_number(item.quantity));
            page.text_right(REGULAR, BODY, price_right, &format_money(item.unit_price));
            page.text_right(REGULAR, BODY, right, &format_money(item.amount()));
            for name in &names[1..] {
                page.line(REGULAR, BODY, name);
            }
        }
        page.advance(8.0);
        page.rule();

        // Summary
        let label_x = price_right - 60.0;
        for (label, value, font) in [
            ("Subtotal:", invoice.subtotal, REGULAR),
            ("Discount:", invoice.discount, REGULAR),
            ("Total:", invoice.total_amount, BOLD),
        ] {
            if page.advance(LEADING) {
                page.text(font, BODY, label_x, label);
                page.text_right(font, BODY, right, &format_money(value));
            }
        }

        if !invoice.notes.trim().is_empty() {
            page.advance(12.0);
            page.line(BOLD, BODY, "Notes:");
            let max = width - 2.0 * MARGIN;
            for line in wrap(&invoice.notes, |s| helvetica_width(s, BODY) <= max) {
                page.line(REGULAR, BODY, &line);
            }
        }

        if page.clipped > 0 {
            warn!(
                invoice_no = %invoice.invoice_number,
                clipped_lines = page.clipped,
                "Invoice does not fit on one page, content clipped"
            );
        }

        pdf.add_page(page.ops)?;
        let (bytes, pages) = pdf.finish()?;
        Ok(ExportedDocument {
            file_name: document_file_name(&invoice.invoice_number),
            bytes,
            pages,
        })
    }
}
