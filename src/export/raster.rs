// src/export/raster.rs
//
// A small anti-aliased rasterizer: rectangles and glyph outlines filled with
// the non-zero winding rule onto an RGB bitmap.

use super::ExportError;
use super::fonts::{FontFace, PathSink};
use image::{Rgb, RgbImage};

/// Largest bitmap side we agree to allocate, in device pixels.
const MAX_SIDE: u32 = 16_384;
/// Vertical samples per pixel row.
const SUBSAMPLES: usize = 4;
/// Line segments per flattened curve.
const CURVE_STEPS: usize = 8;

/// The requested scale, lowered just enough for a `width` x `height` sheet to
/// fit within the bitmap size limit.
pub(crate) fn fit_scale(width: f32, height: f32, requested: f32) -> f32 {
    let longest = width.max(height);
    if !(requested.is_finite() && requested > 0.0 && longest > 0.0) {
        return requested;
    }
    requested.min((MAX_SIDE - 1) as f32 / longest)
}

/// Drawing surface addressed in logical units, backed by a bitmap of
/// `scale` device pixels per unit.
pub(crate) struct Canvas {
    image: RgbImage,
    scale: f32,
}

impl Canvas {
    pub fn new(width: f32, height: f32, scale: f32) -> Result<Self, ExportError> {
        if !(scale.is_finite() && scale > 0.0) {
            return Err(ExportError::Render(format!("invalid pixel ratio {scale}")));
        }
        let w = (width * scale).ceil();
        let h = (height * scale).ceil();
        if !(w >= 1.0 && h >= 1.0 && w <= MAX_SIDE as f32 && h <= MAX_SIDE as f32) {
            return Err(ExportError::Render(format!("sheet of {w}x{h} px cannot be rendered")));
        }
        Ok(Self {
            image: RgbImage::from_pixel(w as u32, h as u32, Rgb([255, 255, 255])),
            scale,
        })
    }

    pub fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, color: Rgb<u8>) {
        let mut path = EdgeCollector::new(self.scale);
        path.move_to(x, y);
        path.line_to(x + w, y);
        path.line_to(x + w, y + h);
        path.line_to(x, y + h);
        path.close();
        self.fill(&path.edges, color);
    }

    pub fn draw_text(
        &mut self,
        font: &FontFace,
        text: &str,
        x: f32,
        baseline: f32,
        size: f32,
        color: Rgb<u8>,
    ) -> Result<(), ExportError> {
        let mut path = EdgeCollector::new(self.scale);
        font.outline_text(text, size, x, baseline, &mut path)?;
        self.fill(&path.edges, color);
        Ok(())
    }

    pub fn into_image(self) -> RgbImage {
        self.image
    }

    fn fill(&mut self, edges: &[Edge], color: Rgb<u8>) {
        if edges.is_empty() {
            return;
        }
        let (width, height) = self.image.dimensions();
        let top = edges.iter().map(|e| e.y0.min(e.y1)).fold(f32::INFINITY, f32::min);
        let bottom = edges.iter().map(|e| e.y0.max(e.y1)).fold(f32::NEG_INFINITY, f32::max);
        let first_row = top.floor().max(0.0) as u32;
        let last_row = (bottom.ceil().max(0.0) as u32).min(height);

        let mut coverage = vec![0.0f32; width as usize];
        let mut crossings: Vec<(f32, i32)> = Vec::new();
        for row in first_row..last_row {
            coverage.iter_mut().for_each(|c| *c = 0.0);
            for sample in 0..SUBSAMPLES {
                let sy = row as f32 + (sample as f32 + 0.5) / SUBSAMPLES as f32;
                crossings.clear();
                crossings.extend(edges.iter().filter_map(|e| e.crossing(sy)));
                crossings.sort_by(|a, b| a.0.total_cmp(&b.0));

                let mut winding = 0;
                for pair in crossings.windows(2) {
                    winding += pair[0].1;
                    if winding != 0 {
                        add_span(&mut coverage, pair[0].0, pair[1].0, 1.0 / SUBSAMPLES as f32);
                    }
                }
            }
            for (x, &alpha) in coverage.iter().enumerate() {
                if alpha > 0.0 {
                    blend(self.image.get_pixel_mut(x as u32, row), color, alpha.min(1.0));
                }
            }
        }
    }
}

fn add_span(coverage: &mut [f32], from: f32, to: f32, weight: f32) {
    let from = from.max(0.0);
    let to = to.min(coverage.len() as f32);
    if to <= from {
        return;
    }
    let first = from.floor() as usize;
    let last = (to.ceil() as usize).min(coverage.len());
    for (i, cell) in coverage.iter_mut().enumerate().take(last).skip(first) {
        let overlap = to.min(i as f32 + 1.0) - from.max(i as f32);
        if overlap > 0.0 {
            *cell += overlap * weight;
        }
    }
}

fn blend(pixel: &mut Rgb<u8>, color: Rgb<u8>, alpha: f32) {
    for (dst, src) in pixel.0.iter_mut().zip(color.0) {
        let mixed = *dst as f32 * (1.0 - alpha) + src as f32 * alpha;
        *dst = mixed.round().clamp(0.0, 255.0) as u8;
    }
}

#[derive(Debug, Clone, Copy)]
struct Edge {
    x0: f32,
    y0: f32,
    x1: f32,
    y1: f32,
}

impl Edge {
    /// Where a horizontal line at `y` crosses this edge, with the winding
    /// direction of the crossing.
    fn crossing(&self, y: f32) -> Option<(f32, i32)> {
        let (lo, hi, dir) = if self.y0 < self.y1 {
            (self.y0, self.y1, 1)
        } else {
            (self.y1, self.y0, -1)
        };
        if lo == hi || y < lo || y >= hi {
            return None;
        }
        let t = (y - self.y0) / (self.y1 - self.y0);
        Some((self.x0 + t * (self.x1 - self.x0), dir))
    }
}

/// Flattens a path into device-space edges.
struct EdgeCollector {
    scale: f32,
    edges: Vec<Edge>,
    start: (f32, f32),
    current: (f32, f32),
}

impl EdgeCollector {
    fn new(scale: f32) -> Self {
        Self {
            scale,
            edges: Vec::new(),
            start: (0.0, 0.0),
            current: (0.0, 0.0),
        }
    }

    fn push_to(&mut self, x: f32, y: f32) {
        let (x0, y0) = self.current;
        if (x0, y0) != (x, y) {
            self.edges.push(Edge { x0, y0, x1: x, y1: y });
        }
        self.current = (x, y);
    }
}

impl PathSink for EdgeCollector {
    fn move_to(&mut self, x: f32, y: f32) {
        let p = (x * self.scale, y * self.scale);
        self.start = p;
        self.current = p;
    }

    fn line_to(&mut self, x: f32, y: f32) {
        self.push_to(x * self.scale, y * self.scale);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let (x0, y0) = self.current;
        let (cx, cy) = (x1 * self.scale, y1 * self.scale);
        let (ex, ey) = (x * self.scale, y * self.scale);
        for step in 1..=CURVE_STEPS {
            let t = step as f32 / CURVE_STEPS as f32;
            let u = 1.0 - t;
            self.push_to(
                u * u * x0 + 2.0 * u * t * cx + t * t * ex,
                u * u * y0 + 2.0 * u * t * cy + t * t * ey,
            );
        }
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let (x0, y0) = self.current;
        let s = self.scale;
        let (ax, ay, bx, by, ex, ey) = (x1 * s, y1 * s, x2 * s, y2 * s, x * s, y * s);
        for step in 1..=CURVE_STEPS {
            let t = step as f32 / CURVE_STEPS as f32;
            let u = 1.0 - t;
            self.push_to(
                u * u * u * x0 + 3.0 * u * u * t * ax + 3.0 * u * t * t * bx + t * t * t * ex,
                u * u * u * y0 + 3.0 * u * u * t * ay + 3.0 * u * t * t * by + t * t * t * ey,
            );
        }
    }

    fn close(&mut self) {
        let (x, y) = self.start;
        self.push_to(x, y);
    }
}
