// src/export/sheet.rs
//
// Layout of the rendered invoice sheet, in logical pixels from the top-left
// corner. The rasterizer paints these marks; nothing here touches pixels.

use crate::config::Branding;
use crate::invoice::PersistedInvoice;
use crate::ledger::format_money;
use image::Rgb;

pub(crate) const SHEET_WIDTH: f32 = 768.0;
const PADDING: f32 = 32.0;
const LINE: f32 = 24.0;

pub(crate) const INK: Rgb<u8> = Rgb([31, 41, 55]);
pub(crate) const DARK: Rgb<u8> = Rgb([17, 24, 39]);
pub(crate) const MUTED: Rgb<u8> = Rgb([75, 85, 99]);
pub(crate) const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const RULE: Rgb<u8> = Rgb([209, 213, 219]);
const RULE_LIGHT: Rgb<u8> = Rgb([243, 244, 246]);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Weight {
    Regular,
    Bold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Align {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Mark {
    Text {
        x: f32,
        baseline: f32,
        size: f32,
        weight: Weight,
        align: Align,
        color: Rgb<u8>,
        text: String,
    },
    Rect {
        x: f32,
        y: f32,
        w: f32,
        h: f32,
        color: Rgb<u8>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Sheet {
    pub width: f32,
    pub height: f32,
    pub marks: Vec<Mark>,
    pub item_rows: usize,
}

impl Sheet {
    #[cfg(test)]
    pub fn texts(&self) -> Vec<&str> {
        self.marks
            .iter()
            .filter_map(|m| match m {
                Mark::Text { text, .. } => Some(text.as_str()),
                Mark::Rect { .. } => None,
            })
            .collect()
    }
}

pub(crate) trait TextMeasure {
    fn width(&self, text: &str, size: f32, weight: Weight) -> f32;
}

/// Greedy word wrap. Explicit newlines always break; a single word wider than
/// the line is left on its own line.
pub(crate) fn wrap(text: &str, fits: impl Fn(&str) -> bool) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.lines() {
        let mut current = String::new();
        for word in paragraph.split_whitespace() {
            let candidate = if current.is_empty() {
                word.to_string()
            } else {
                format!("{current} {word}")
            };
            if current.is_empty() || fits(&candidate) {
                current = candidate;
            } else {
                lines.push(std::mem::replace(&mut current, word.to_string()));
            }
        }
        lines.push(current);
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

struct Composer<'a> {
    measure: &'a dyn TextMeasure,
    marks: Vec<Mark>,
    y: f32,
}

impl Composer<'_> {
    #[allow(clippy::too_many_arguments)]
    fn text(&mut self, x: f32, baseline: f32, size: f32, weight: Weight, align: Align, color: Rgb<u8>, text: impl Into<String>) {
        self.marks.push(Mark::Text {
            x,
            baseline,
            size,
            weight,
            align,
            color,
            text: text.into(),
        });
    }

    fn rect(&mut self, x: f32, y: f32, w: f32, h: f32, color: Rgb<u8>) {
        self.marks.push(Mark::Rect { x, y, w, h, color });
    }

    fn wrapped(&self, text: &str, size: f32, weight: Weight, max_width: f32) -> Vec<String> {
        wrap(text, |line| self.measure.width(line, size, weight) <= max_width)
    }
}

/// Lay out the full invoice sheet.
pub(crate) fn compose(
    invoice: &PersistedInvoice,
    branding: &Branding,
    measure: &dyn TextMeasure,
) -> Sheet {
    let left = PADDING;
    let right = SHEET_WIDTH - PADDING;
    let content = right - left;
    let mut c = Composer {
        measure,
        marks: Vec::new(),
        y: PADDING,
    };

    // Header: logo badge and title
    c.rect(left, c.y, 40.0, 40.0, DARK);
    c.text(left + 20.0, c.y + 26.0, 16.0, Weight::Bold, Align::Center, WHITE, &branding.logo_text);
    c.text(right, c.y + 32.0, 30.0, Weight::Bold, Align::Right, INK, "Invoice");
    c.y += 80.0;

    // Customer and invoice info
    let top = c.y;
    c.text(left, top + 16.0, 16.0, Weight::Bold, Align::Left, INK, "Billed to:");
    let mut line_y = top + 16.0;
    for field in [&invoice.customer_name, &invoice.customer_phone, &invoice.customer_address] {
        line_y += LINE;
        c.text(left, line_y, 16.0, Weight::Regular, Align::Left, INK, field.as_str());
    }
    c.text(right, top + 16.0, 16.0, Weight::Regular, Align::Right, INK, format!("Invoice No. {}", invoice.invoice_number));
    c.text(right, top + 16.0 + LINE, 16.0, Weight::Regular, Align::Right, INK, format!("Date: {}", invoice.invoice_date));
    c.y = line_y + 8.0 + 40.0;

    // Item table
    let columns = [left, left + content * 0.45, left + content * 0.62, left + content * 0.82];
    for (x, heading) in columns.iter().zip(["Item", "Quantity", "Unit Price", "Total"]) {
        c.text(*x, c.y + 16.0, 16.0, Weight::Bold, Align::Left, INK, heading);
    }
    c.rect(left, c.y + 28.0, content, 1.0, RULE);
    c.y += 29.0;

    let name_width = columns[1] - columns[0] - 12.0;
    for item in &invoice.items {
        let names = c.wrapped(&item.name, 16.0, Weight::Regular, name_width);
        let first = c.y + 28.0;
        for (i, name) in names.iter().enumerate() {
            c.text(columns[0], first + i as f32 * LINE, 16.0, Weight::Regular, Align::Left, INK, name.as_str());
        }
        c.text(columns[1], first, 16.0, Weight::Regular, Align::Left, INK, trim_number(item.quantity));
        c.text(columns[2], first, 16.0, Weight::Regular, Align::Left, INK, format_money(item.unit_price));
        c.text(columns[3], first, 16.0, Weight::Bold, Align::Left, INK, format_money(item.amount()));
        c.y = first + (names.len() - 1) as f32 * LINE + 12.0;
        c.rect(left, c.y, content, 1.0, RULE_LIGHT);
        c.y += 1.0;
    }
    c.y += 32.0;

    // Summary badge
    let total = format_money(invoice.total_amount);
    c.text(right, c.y + 16.0, 16.0, Weight::Bold, Align::Right, INK, "Total");
    let badge_w = measure.width(&total, 18.0, Weight::Bold) + 32.0;
    c.rect(right - badge_w, c.y + 24.0, badge_w, 44.0, DARK);
    c.text(right - 16.0, c.y + 24.0 + 29.0, 18.0, Weight::Bold, Align::Right, WHITE, total);
    c.y += 24.0 + 44.0 + 40.0;

    // Notes
    if !invoice.notes.trim().is_empty() {
        c.text(left, c.y + 16.0, 16.0, Weight::Bold, Align::Left, INK, "Notes:");
        c.y += 16.0 + 4.0;
        for line in c.wrapped(&invoice.notes, 16.0, Weight::Regular, content) {
            c.y += LINE;
            c.text(left, c.y, 16.0, Weight::Regular, Align::Left, MUTED, line);
        }
        c.y += 8.0;
    }

    // Footer
    let center = SHEET_WIDTH / 2.0;
    c.y += 48.0;
    c.text(center, c.y + 20.0, 20.0, Weight::Regular, Align::Center, MUTED, "Thank You!");
    c.y += 20.0 + 16.0;
    let due = invoice.due_date.as_deref().filter(|d| !d.is_empty()).unwrap_or("N/A");
    let mut footer = vec!["Payment Information:".to_string()];
    footer.extend(branding.payment_lines.iter().cloned());
    footer.push(format!("Pay by: {due}"));
    for line in footer {
        c.y += 20.0;
        c.text(center, c.y, 14.0, Weight::Regular, Align::Center, MUTED, line);
    }
    c.y += PADDING;

    Sheet {
        width: SHEET_WIDTH,
        height: c.y.ceil(),
        marks: c.marks,
        item_rows: invoice.items.len(),
    }
}

/// Quantities print without a fractional part when they are whole.
pub(crate) fn trim_number(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{v}")
    }
}
