// src/export/snapshot.rs

use super::fonts::FontSet;
use super::pdf::PdfBuilder;
use super::raster::{Canvas, fit_scale};
use super::sheet::{self, Align, Mark, Sheet};
use super::{DocumentExporter, ExportError, ExportedDocument, document_file_name};
use crate::config::{Branding, ExportConfig, PageFormat};
use crate::invoice::PersistedInvoice;
use image::RgbImage;
use lopdf::content::Operation;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Leftover image height (in points) below which no further page is started.
const SLICE_EPSILON: f32 = 0.01;

/// Renders the invoice sheet to a bitmap and spreads that bitmap over as many
/// pages as its height needs.
pub struct SnapshotExporter {
    format: PageFormat,
    pixel_ratio: f32,
    font_path: Option<PathBuf>,
    bold_font_path: Option<PathBuf>,
    branding: Branding,
}

impl SnapshotExporter {
    pub fn new(cfg: &ExportConfig, branding: Branding) -> Self {
        Self {
            format: cfg.page_format,
            pixel_ratio: cfg.pixel_ratio,
            font_path: cfg.font_path.clone(),
            bold_font_path: cfg.bold_font_path.clone(),
            branding,
        }
    }
}

impl DocumentExporter for SnapshotExporter {
    fn name(&self) -> &'static str {
        "snapshot"
    }

    fn export(&self, invoice: &PersistedInvoice) -> Result<ExportedDocument, ExportError> {
        let fonts = FontSet::resolve(self.font_path.as_deref(), self.bold_font_path.as_deref())?;
        let sheet = sheet::compose(invoice, &self.branding, &fonts);
        debug!(height = sheet.height, rows = sheet.item_rows, "Composed invoice sheet");

        let image = rasterize(&sheet, &fonts, self.pixel_ratio)?;
        let (bytes, pages) = paginate(&image, self.format)?;
        Ok(ExportedDocument {
            file_name: document_file_name(&invoice.invoice_number),
            bytes,
            pages,
        })
    }
}

/// Canvas for the whole sheet. Sheets too tall for the bitmap limit at the
/// configured pixel ratio are rendered at a lower one.
fn sheet_canvas(sheet: &Sheet, pixel_ratio: f32) -> Result<Canvas, ExportError> {
    let scale = fit_scale(sheet.width, sheet.height, pixel_ratio);
    if scale < pixel_ratio {
        warn!(
            height = sheet.height,
            requested = pixel_ratio,
            used = scale,
            "Sheet too tall for the pixel ratio, rendering at lower resolution"
        );
    }
    Canvas::new(sheet.width, sheet.height, scale)
}

fn rasterize(sheet: &Sheet, fonts: &FontSet, pixel_ratio: f32) -> Result<RgbImage, ExportError> {
    let mut canvas = sheet_canvas(sheet, pixel_ratio)?;
    for mark in &sheet.marks {
        match mark {
            Mark::Rect { x, y, w, h, color } => canvas.fill_rect(*x, *y, *w, *h, *color),
            Mark::Text {
                x,
                baseline,
                size,
                weight,
                align,
                color,
                text,
            } => {
                let face = fonts.face(*weight);
                let left = match align {
                    Align::Left => *x,
                    Align::Center => x - face.advance(text, *size) / 2.0,
                    Align::Right => x - face.advance(text, *size),
                };
                canvas.draw_text(face, text, left, *baseline, *size, *color)?;
            }
        }
    }
    Ok(canvas.into_image())
}

/// Upward shift of the image on each page, in points. The first page shows
/// the image from its top; every further page moves it up one page height.
pub(crate) fn slice_offsets(image_height: f32, page_height: f32) -> Vec<f32> {
    let mut offsets = vec![0.0];
    let mut remaining = image_height - page_height;
    while remaining > SLICE_EPSILON {
        offsets.push(image_height - remaining);
        remaining -= page_height;
    }
    offsets
}

/// Place `image` at full page width and slice it across pages.
pub(crate) fn paginate(image: &RgbImage, format: PageFormat) -> Result<(Vec<u8>, usize), ExportError> {
    let (width_px, height_px) = image.dimensions();
    if width_px == 0 || height_px == 0 {
        return Err(ExportError::Render("empty sheet bitmap".into()));
    }

    let mut pdf = PdfBuilder::new(format);
    let (page_w, page_h) = pdf.page_size();
    let image_h = height_px as f32 * page_w / width_px as f32;
    pdf.add_rgb_image("Im1", image);

    for offset in slice_offsets(image_h, page_h) {
        let bottom = page_h - image_h + offset;
        pdf.add_page(vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![page_w.into(), 0.into(), 0.into(), image_h.into(), 0.into(), bottom.into()],
            ),
            Operation::new("Do", vec!["Im1".into()]),
            Operation::new("Q", vec![]),
        ])?;
    }
    pdf.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::pdf::tests::drawn_text;
    use crate::export::sheet::tests::{FixedMeasure, sample_invoice};
    use crate::ledger::LineItem;
    use lopdf::content::Content;
    use lopdf::{Document, Object};

    const A4_H: f32 = 841.89;

    #[test]
    fn test_slice_offsets() {
        assert_eq!(slice_offsets(500.0, A4_H), vec![0.0]);
        assert_eq!(slice_offsets(A4_H, A4_H), vec![0.0]);
        assert_eq!(slice_offsets(A4_H * 2.5, A4_H).len(), 3);
        assert_eq!(slice_offsets(A4_H * 3.0, A4_H).len(), 3);
        assert_eq!(slice_offsets(A4_H * 3.0 + 1.0, A4_H).len(), 4);

        let offsets = slice_offsets(2000.0, 800.0);
        assert_eq!(offsets, vec![0.0, 800.0, 1600.0]);
    }

    fn image_offsets(doc: &Document) -> Vec<f32> {
        doc.get_pages()
            .values()
            .map(|id| {
                let content = Content::decode(&doc.get_page_content(*id).unwrap()).unwrap();
                let cm = content.operations.iter().find(|op| op.operator == "cm").unwrap();
                cm.operands[5].as_float().unwrap()
            })
            .collect()
    }

    fn image_objects(doc: &Document) -> usize {
        doc.objects
            .values()
            .filter(|obj| match obj {
                Object::Stream(stream) => stream
                    .dict
                    .get(b"Subtype")
                    .and_then(Object::as_name)
                    .is_ok_and(|name| name == b"Image"),
                _ => false,
            })
            .count()
    }

    #[test]
    fn test_tall_image_spans_pages() {
        // 100x400 px at A4 width is 2381 pt tall: three pages.
        let image = RgbImage::from_pixel(100, 400, image::Rgb([40, 40, 40]));
        let (bytes, pages) = paginate(&image, PageFormat::A4).unwrap();
        assert_eq!(pages, 3);

        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 3);
        assert_eq!(image_objects(&doc), 1);

        let offsets = image_offsets(&doc);
        let image_h = 400.0 * 595.28 / 100.0;
        for (page, bottom) in offsets.iter().enumerate() {
            let expected = A4_H - image_h + page as f32 * A4_H;
            assert!((bottom - expected).abs() < 0.05, "page {page}: {bottom} vs {expected}");
        }
        assert!(offsets.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_short_image_fits_one_page() {
        let image = RgbImage::from_pixel(200, 100, image::Rgb([255, 255, 255]));
        let (bytes, pages) = paginate(&image, PageFormat::Letter).unwrap();
        assert_eq!(pages, 1);
        assert!(drawn_text(&bytes)[0].is_empty());
    }

    #[test]
    fn test_snapshot_export_with_system_fonts() {
        if FontSet::resolve(None, None).is_err() {
            eprintln!("no system fonts available, skipping");
            return;
        }
        let invoice = sample_invoice(vec![
            LineItem::new("Bolts", 2.0, 10.5),
            LineItem::new("Nuts", 1.0, 5.0),
        ]);
        let exporter = SnapshotExporter::new(&ExportConfig::default(), Branding::default());

        let doc = exporter.export(&invoice).unwrap();
        assert_eq!(doc.file_name, "Invoice-INV-0012.pdf");
        assert!(doc.pages >= 1);

        let parsed = Document::load_mem(&doc.bytes).unwrap();
        assert_eq!(parsed.get_pages().len(), doc.pages);
        assert_eq!(image_objects(&parsed), 1);
    }

    fn many_items(count: usize) -> Vec<LineItem> {
        (0..count).map(|i| LineItem::new(format!("Part {i}"), 1.0, 2.5)).collect()
    }

    #[test]
    fn test_long_sheet_renders_at_reduced_ratio_across_pages() {
        let invoice = sample_invoice(many_items(250));
        let sheet = sheet::compose(&invoice, &Branding::default(), &FixedMeasure);
        assert!(sheet.height * 2.0 > 16_384.0);

        let mut canvas = sheet_canvas(&sheet, 2.0).unwrap();
        for mark in &sheet.marks {
            if let Mark::Rect { x, y, w, h, color } = mark {
                canvas.fill_rect(*x, *y, *w, *h, *color);
            }
        }
        let image = canvas.into_image();
        assert!(image.height() <= 16_384);

        let (bytes, pages) = paginate(&image, PageFormat::A4).unwrap();
        let image_h = image.height() as f32 * 595.28 / image.width() as f32;
        assert_eq!(pages, slice_offsets(image_h, A4_H).len());
        assert!(pages > 5);

        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), pages);
        assert_eq!(image_objects(&doc), 1);
    }

    #[test]
    fn test_long_snapshot_export_with_system_fonts() {
        if FontSet::resolve(None, None).is_err() {
            eprintln!("no system fonts available, skipping");
            return;
        }
        let exporter = SnapshotExporter::new(&ExportConfig::default(), Branding::default());
        let doc = exporter.export(&sample_invoice(many_items(250))).unwrap();
        assert!(doc.pages > 5);
    }

    #[test]
    fn test_missing_font_file_is_an_error() {
        let cfg = ExportConfig {
            font_path: Some(PathBuf::from("/nonexistent/font.ttf")),
            ..ExportConfig::default()
        };
        let exporter = SnapshotExporter::new(&cfg, Branding::default());
        let err = exporter.export(&sample_invoice(vec![])).unwrap_err();
        assert!(matches!(err, ExportError::Font(_)));
    }
}
