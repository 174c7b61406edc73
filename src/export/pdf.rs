// src/export/pdf.rs

use super::ExportError;
use crate::config::PageFormat;
use image::RgbImage;
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};

/// Incrementally assembled PDF whose pages share one resources dictionary.
pub(crate) struct PdfBuilder {
    doc: Document,
    pages_id: ObjectId,
    resources_id: ObjectId,
    fonts: Dictionary,
    images: Dictionary,
    page_ids: Vec<ObjectId>,
    page_size: (f32, f32),
}

impl PdfBuilder {
    pub fn new(format: PageFormat) -> Self {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        let resources_id = doc.new_object_id();
        Self {
            doc,
            pages_id,
            resources_id,
            fonts: Dictionary::new(),
            images: Dictionary::new(),
            page_ids: Vec::new(),
            page_size: format.size_pt(),
        }
    }

    pub fn page_size(&self) -> (f32, f32) {
        self.page_size
    }

    /// Register one of the standard 14 fonts under `key` (e.g. `F1`).
    pub fn add_standard_font(&mut self, key: &str, base_font: &str) {
        let font_id = self.doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => base_font,
            "Encoding" => "WinAnsiEncoding",
        });
        self.fonts.set(key, font_id);
    }

    /// Embed an RGB bitmap once as an image XObject available to every page.
    pub fn add_rgb_image(&mut self, key: &str, image: &RgbImage) {
        let stream = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => i64::from(image.width()),
                "Height" => i64::from(image.height()),
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
            },
            image.as_raw().clone(),
        );
        let image_id = self.doc.add_object(stream);
        self.images.set(key, image_id);
    }

    pub fn add_page(&mut self, operations: Vec<Operation>) -> Result<(), ExportError> {
        let content = Content { operations };
        let content_id = self.doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        let (width, height) = self.page_size;
        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![0.into(), 0.into(), width.into(), height.into()],
            "Contents" => content_id,
            "Resources" => self.resources_id,
        });
        self.page_ids.push(page_id);
        Ok(())
    }

    /// Serialize the document, returning the bytes and the page count.
    pub fn finish(mut self) -> Result<(Vec<u8>, usize), ExportError> {
        let resources = dictionary! {
            "Font" => Object::Dictionary(self.fonts),
            "XObject" => Object::Dictionary(self.images),
        };
        self.doc.objects.insert(self.resources_id, Object::Dictionary(resources));

        let count = self.page_ids.len();
        let kids: Vec<Object> = self.page_ids.iter().map(|id| Object::from(*id)).collect();
        self.doc.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count as i64,
            }),
        );
        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);
        self.doc.compress();

        let mut bytes = Vec::new();
        self.doc.save_to(&mut bytes)?;
        Ok((bytes, count))
    }
}

/// Operations drawing one line of text with its baseline at (`x`, `y`),
/// PDF coordinates (origin bottom-left).
pub(crate) fn text_ops(font: &str, size: f32, x: f32, y: f32, text: &str) -> Vec<Operation> {
    vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec![font.into(), size.into()]),
        Operation::new("Td", vec![x.into(), y.into()]),
        Operation::new("Tj", vec![Object::string_literal(encode_win_ansi(text))]),
        Operation::new("ET", vec![]),
    ]
}

/// Horizontal rule from `x1` to `x2` at height `y`.
pub(crate) fn line_ops(x1: f32, x2: f32, y: f32, width: f32) -> Vec<Operation> {
    vec![
        Operation::new("w", vec![width.into()]),
        Operation::new("m", vec![x1.into(), y.into()]),
        Operation::new("l", vec![x2.into(), y.into()]),
        Operation::new("S", vec![]),
    ]
}

/// The standard fonts are WinAnsi encoded; anything outside Latin-1 prints as `?`.
pub(crate) fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match u32::from(c) {
            code @ 0x20..=0x7e | code @ 0xa0..=0xff => code as u8,
            _ => b'?',
        })
        .collect()
}

/// Approximate Helvetica advance, used to right-align numbers.
pub(crate) fn helvetica_width(text: &str, size: f32) -> f32 {
    text.chars()
        .map(|c| match c {
            '0'..='9' => 0.556,
            '.' | ',' | ' ' => 0.278,
            '-' => 0.333,
            'i' | 'l' | 'j' | 'I' => 0.25,
            'm' | 'w' | 'M' | 'W' => 0.85,
            c if c.is_uppercase() => 0.68,
            _ => 0.52,
        })
        .sum::<f32>()
        * size
}
