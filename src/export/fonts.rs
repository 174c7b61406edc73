// src/export/fonts.rs

use super::ExportError;
use super::sheet::{TextMeasure, Weight};
use std::path::Path;
use tracing::info;
use ttf_parser::{Face, GlyphId, OutlineBuilder};

/// Families tried, in order, when no font file is configured.
const SANS_FAMILIES: [&str; 5] = [
    "Helvetica",
    "Arial",
    "Liberation Sans",
    "DejaVu Sans",
    "Noto Sans",
];

/// Raw TrueType/OpenType data for one face.
pub(crate) struct FontFace {
    data: Vec<u8>,
    index: u32,
}

impl FontFace {
    pub fn from_data(data: Vec<u8>, index: u32) -> Result<Self, ExportError> {
        Face::parse(&data, index).map_err(|e| ExportError::Font(format!("unreadable font: {e}")))?;
        Ok(Self { data, index })
    }

    pub fn load(path: &Path) -> Result<Self, ExportError> {
        let data = std::fs::read(path)
            .map_err(|e| ExportError::Font(format!("{}: {e}", path.display())))?;
        Self::from_data(data, 0)
    }

    fn face(&self) -> Result<Face<'_>, ExportError> {
        Face::parse(&self.data, self.index).map_err(|e| ExportError::Font(e.to_string()))
    }

    /// Horizontal advance of `text` at `size`, in the caller's units.
    pub fn advance(&self, text: &str, size: f32) -> f32 {
        let Ok(face) = self.face() else {
            return 0.0;
        };
        let scale = size / face.units_per_em() as f32;
        text.chars()
            .map(|c| {
                let glyph = face.glyph_index(c).unwrap_or(GlyphId(0));
                face.glyph_hor_advance(glyph).unwrap_or(0) as f32 * scale
            })
            .sum()
    }

    /// Feed the outlines of `text` to `sink`, placed with its baseline origin at
    /// (`x`, `baseline`) in a y-down coordinate space.
    pub fn outline_text(
        &self,
        text: &str,
        size: f32,
        x: f32,
        baseline: f32,
        sink: &mut dyn PathSink,
    ) -> Result<(), ExportError> {
        let face = self.face()?;
        let scale = size / face.units_per_em() as f32;
        let mut pen = x;
        for c in text.chars() {
            let glyph = face.glyph_index(c).unwrap_or(GlyphId(0));
            let mut placed = PlacedGlyph {
                sink: &mut *sink,
                scale,
                origin: (pen, baseline),
            };
            // Glyphs without an outline (spaces) still advance the pen.
            let _ = face.outline_glyph(glyph, &mut placed);
            pen += face.glyph_hor_advance(glyph).unwrap_or(0) as f32 * scale;
        }
        Ok(())
    }
}

/// Receives glyph outlines already transformed to sheet coordinates.
pub(crate) trait PathSink {
    fn move_to(&mut self, x: f32, y: f32);
    fn line_to(&mut self, x: f32, y: f32);
    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32);
    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32);
    fn close(&mut self);
}

/// Font units (y-up) to sheet units (y-down) for one glyph.
struct PlacedGlyph<'a> {
    sink: &'a mut dyn PathSink,
    scale: f32,
    origin: (f32, f32),
}

impl PlacedGlyph<'_> {
    fn map(&self, x: f32, y: f32) -> (f32, f32) {
        (self.origin.0 + x * self.scale, self.origin.1 - y * self.scale)
    }
}

impl OutlineBuilder for PlacedGlyph<'_> {
    fn move_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.map(x, y);
        self.sink.move_to(x, y);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.map(x, y);
        self.sink.line_to(x, y);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let (x1, y1) = self.map(x1, y1);
        let (x, y) = self.map(x, y);
        self.sink.quad_to(x1, y1, x, y);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let (x1, y1) = self.map(x1, y1);
        let (x2, y2) = self.map(x2, y2);
        let (x, y) = self.map(x, y);
        self.sink.curve_to(x1, y1, x2, y2, x, y);
    }

    fn close(&mut self) {
        self.sink.close();
    }
}

/// Regular and bold faces used to paint the sheet.
pub(crate) struct FontSet {
    regular: FontFace,
    bold: Option<FontFace>,
}

impl FontSet {
    /// Use the configured font files when given, otherwise look up a sans-serif
    /// face among the system fonts.
    pub fn resolve(regular: Option<&Path>, bold: Option<&Path>) -> Result<Self, ExportError> {
        let mut db = None;

        let regular = match regular {
            Some(path) => FontFace::load(path)?,
            None => system_face(db.get_or_insert_with(system_db), fontdb::Weight::NORMAL)?,
        };
        let bold = match bold {
            Some(path) => Some(FontFace::load(path)?),
            None => system_face(db.get_or_insert_with(system_db), fontdb::Weight::BOLD).ok(),
        };
        Ok(Self { regular, bold })
    }

    pub fn face(&self, weight: Weight) -> &FontFace {
        match (weight, &self.bold) {
            (Weight::Bold, Some(bold)) => bold,
            _ => &self.regular,
        }
    }
}

impl TextMeasure for FontSet {
    fn width(&self, text: &str, size: f32, weight: Weight) -> f32 {
        self.face(weight).advance(text, size)
    }
}

fn system_db() -> fontdb::Database {
    let mut db = fontdb::Database::new();
    db.load_system_fonts();
    info!(faces = db.len(), "Loaded system fonts");
    db
}

fn system_face(db: &fontdb::Database, weight: fontdb::Weight) -> Result<FontFace, ExportError> {
    let families: Vec<fontdb::Family<'_>> = SANS_FAMILIES
        .iter()
        .map(|name| fontdb::Family::Name(*name))
        .chain(std::iter::once(fontdb::Family::SansSerif))
        .collect();
    let query = fontdb::Query {
        families: &families,
        weight,
        stretch: fontdb::Stretch::Normal,
        style: fontdb::Style::Normal,
    };

    let id = db
        .query(&query)
        .or_else(|| db.faces().next().map(|face| face.id))
        .ok_or_else(|| ExportError::Font("no system fonts found; set export.font_path".into()))?;

    db.with_face_data(id, |data, index| FontFace::from_data(data.to_vec(), index))
        .ok_or_else(|| ExportError::Font("system font could not be read".into()))?
}
