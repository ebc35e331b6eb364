//! The rendering-target contract and the CPU implementation.
//!
//! The renderer assumes nothing about a target beyond [`Canvas`]: a state
//! stack, affine transform concatenation, alpha/blend-scoped paint, and a
//! small set of primitives. [`Pixmap`] is the in-process software target,
//! used for offscreen merge and thumbnail rendering.

use scrawl_core::bitmap::Bitmap;
use scrawl_core::blend::BlendMode;
use scrawl_core::color::Color;
use scrawl_core::geometry::{Rect, EPS};
use scrawl_core::transform::Matrix;

use crate::blender;

/// Fraction of an em one placeholder glyph cell advances.
const ADVANCE_EM: f32 = 0.55;
/// Placeholder glyph rise above the baseline, in em.
const GLYPH_ASCENT_EM: f32 = 0.7;

/// One polyline vertex in user space, with its effective stroke width.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct StrokeVertex {
    pub pos: [f32; 2],
    pub width: f32,
}

/// An opaque 2-D rendering target.
///
/// Positions passed to the draw calls are in user space; the current
/// transform (set up via [`Canvas::concat`]) maps them to the device.
pub trait Canvas {
    /// Drawable device-space area.
    fn bounds(&self) -> Rect;
    /// Push the current transform/paint state.
    fn save(&mut self);
    /// Pop back to the most recently saved state.
    fn restore(&mut self);
    /// Concatenate an affine transform onto the current one.
    fn concat(&mut self, transform: &Matrix);
    /// Scope subsequent draws to an alpha modulate and blend mode.
    fn set_paint(&mut self, alpha: f32, mode: BlendMode);
    /// Stroke a variable-width polyline with round joins and caps.
    fn stroke_polyline(&mut self, vertices: &[StrokeVertex], color: Color);
    /// Fill an axis-aligned user-space rectangle.
    fn fill_rect(&mut self, rect: Rect, color: Color);
    /// Blit a bitmap through an additional transform (bitmap pixel space to
    /// user space).
    fn draw_bitmap(&mut self, bitmap: &Bitmap, transform: &Matrix);
    /// Draw one line of text with its baseline-left origin at `origin`.
    fn draw_text_line(&mut self, text: &str, origin: [f32; 2], px_per_em: f32, color: Color);
    /// Advance width of one line of text.
    fn measure_text(&self, text: &str, px_per_em: f32) -> f32;
}

#[derive(Copy, Clone)]
struct DrawState {
    ctm: Matrix,
    alpha: f32,
    mode: BlendMode,
}

impl Default for DrawState {
    fn default() -> Self {
        Self {
            ctm: Matrix::IDENTITY,
            alpha: 1.0,
            mode: BlendMode::Normal,
        }
    }
}

/// Owned premultiplied-RGBA software raster target.
pub struct Pixmap {
    width: u32,
    height: u32,
    /// Premultiplied RGBA, row-major.
    pixels: Vec<[f32; 4]>,
    state: DrawState,
    stack: Vec<DrawState>,
}

impl Pixmap {
    /// Allocate a transparent pixmap. `None` for empty or overflowing
    /// dimensions, or when the allocation itself fails - raster allocation
    /// is the engine's one recoverable resource acquisition.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Option<Self> {
        if width == 0 || height == 0 {
            log::warn!("refusing zero-sized pixmap {width}x{height}");
            return None;
        }
        let count = (width as usize).checked_mul(height as usize)?;
        let mut pixels = Vec::new();
        if pixels.try_reserve_exact(count).is_err() {
            log::error!("pixmap allocation failed for {width}x{height}");
            return None;
        }
        pixels.resize(count, [0.0; 4]);
        Some(Self {
            width,
            height,
            pixels,
            state: DrawState::default(),
            stack: Vec::new(),
        })
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Premultiplied pixel fetch. `None` out of bounds.
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<[f32; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(self.pixels[y as usize * self.width as usize + x as usize])
    }

    /// Export as a straight-alpha RGBA8 buffer handle.
    #[must_use]
    pub fn to_bitmap(&self) -> Option<Bitmap> {
        let mut bytes = Vec::new();
        bytes
            .try_reserve_exact(self.pixels.len().checked_mul(4)?)
            .ok()?;
        for [r, g, b, a] in &self.pixels {
            let unpremul = |c: f32| {
                if *a <= f32::EPSILON {
                    0u8
                } else {
                    ((c / a).clamp(0.0, 1.0) * 255.0).round() as u8
                }
            };
            bytes.extend_from_slice(&[
                unpremul(*r),
                unpremul(*g),
                unpremul(*b),
                (a.clamp(0.0, 1.0) * 255.0).round() as u8,
            ]);
        }
        Bitmap::new(self.width, self.height, bytes)
    }

    /// Blend one straight-alpha color into a pixel at the given coverage,
    /// honoring the current paint.
    fn blend_pixel(&mut self, x: i64, y: i64, color: [f32; 4], coverage: f32) {
        if x < 0 || y < 0 || x >= i64::from(self.width) || y >= i64::from(self.height) {
            return;
        }
        let alpha = color[3] * self.state.alpha * coverage;
        if alpha <= 0.0 {
            return;
        }
        let src = [color[0] * alpha, color[1] * alpha, color[2] * alpha, alpha];
        let idx = y as usize * self.width as usize + x as usize;
        self.pixels[idx] = blender::composite(self.state.mode, src, self.pixels[idx]);
    }

    /// Rasterize one thick segment as a capsule with antialiased edges.
    fn fill_capsule(&mut self, a: [f32; 2], b: [f32; 2], wa: f32, wb: f32, color: [f32; 4]) {
        let radius = (wa.max(wb) / 2.0) + 1.0;
        let x0 = (a[0].min(b[0]) - radius).floor() as i64;
        let x1 = (a[0].max(b[0]) + radius).ceil() as i64;
        let y0 = (a[1].min(b[1]) - radius).floor() as i64;
        let y1 = (a[1].max(b[1]) + radius).ceil() as i64;

        let dx = b[0] - a[0];
        let dy = b[1] - a[1];
        let len_sq = dx * dx + dy * dy;

        for y in y0..=y1 {
            for x in x0..=x1 {
                let px = x as f32 + 0.5;
                let py = y as f32 + 0.5;
                let t = if len_sq < EPS {
                    0.0
                } else {
                    (((px - a[0]) * dx + (py - a[1]) * dy) / len_sq).clamp(0.0, 1.0)
                };
                let cx = a[0] + dx * t;
                let cy = a[1] + dy * t;
                let dist = ((px - cx).powi(2) + (py - cy).powi(2)).sqrt();
                let half = (wa + (wb - wa) * t) / 2.0;
                let coverage = (half + 0.5 - dist).clamp(0.0, 1.0);
                if coverage > 0.0 {
                    self.blend_pixel(x, y, color, coverage);
                }
            }
        }
    }

    /// Binary-coverage fill of a convex quad given in device space.
    fn fill_quad(&mut self, quad: [[f32; 2]; 4], color: [f32; 4]) {
        let xs = quad.iter().map(|p| p[0]);
        let ys = quad.iter().map(|p| p[1]);
        let x0 = xs.clone().fold(f32::MAX, f32::min).floor() as i64;
        let x1 = xs.fold(f32::MIN, f32::max).ceil() as i64;
        let y0 = ys.clone().fold(f32::MAX, f32::min).floor() as i64;
        let y1 = ys.fold(f32::MIN, f32::max).ceil() as i64;

        for y in y0..y1 {
            for x in x0..x1 {
                let px = x as f32 + 0.5;
                let py = y as f32 + 0.5;
                if point_in_convex_quad([px, py], &quad) {
                    self.blend_pixel(x, y, color, 1.0);
                }
            }
        }
    }

    /// Uniform scale factor of the current transform, for width mapping.
    fn ctm_scale(&self) -> f32 {
        self.state.ctm.determinant().abs().sqrt()
    }
}

/// Inside test tolerant of either winding.
fn point_in_convex_quad(p: [f32; 2], quad: &[[f32; 2]; 4]) -> bool {
    let mut sign = 0.0f32;
    for i in 0..4 {
        let a = quad[i];
        let b = quad[(i + 1) % 4];
        let cross = (b[0] - a[0]) * (p[1] - a[1]) - (b[1] - a[1]) * (p[0] - a[0]);
        if cross.abs() < EPS {
            continue;
        }
        if sign == 0.0 {
            sign = cross.signum();
        } else if cross.signum() != sign {
            return false;
        }
    }
    true
}

impl Canvas for Pixmap {
    fn bounds(&self) -> Rect {
        Rect::new(0.0, 0.0, self.width as f32, self.height as f32)
    }

    fn save(&mut self) {
        self.stack.push(self.state);
    }

    fn restore(&mut self) {
        match self.stack.pop() {
            Some(state) => self.state = state,
            None => log::warn!("restore without matching save"),
        }
    }

    fn concat(&mut self, transform: &Matrix) {
        self.state.ctm = self.state.ctm.concat(transform);
    }

    fn set_paint(&mut self, alpha: f32, mode: BlendMode) {
        self.state.alpha = alpha.clamp(0.0, 1.0);
        self.state.mode = mode;
    }

    fn stroke_polyline(&mut self, vertices: &[StrokeVertex], color: Color) {
        if vertices.is_empty() {
            return;
        }
        let scale = self.ctm_scale();
        let color = color.as_f32();
        let device: Vec<([f32; 2], f32)> = vertices
            .iter()
            .map(|v| (self.state.ctm.apply(v.pos), v.width * scale))
            .collect();
        if let [(pos, width)] = device[..] {
            // Single sample: a dot.
            self.fill_capsule(pos, pos, width, width, color);
            return;
        }
        for pair in device.windows(2) {
            let (a, wa) = pair[0];
            let (b, wb) = pair[1];
            self.fill_capsule(a, b, wa, wb, color);
        }
    }

    fn fill_rect(&mut self, rect: Rect, color: Color) {
        let quad = [
            self.state.ctm.apply([rect.left, rect.top]),
            self.state.ctm.apply([rect.right, rect.top]),
            self.state.ctm.apply([rect.right, rect.bottom]),
            self.state.ctm.apply([rect.left, rect.bottom]),
        ];
        self.fill_quad(quad, color.as_f32());
    }

    fn draw_bitmap(&mut self, bitmap: &Bitmap, transform: &Matrix) {
        let full = self.state.ctm.concat(transform);
        let Some(inverse) = full.inverse() else {
            log::debug!("skipping bitmap draw through a degenerate transform");
            return;
        };
        let w = bitmap.width() as f32;
        let h = bitmap.height() as f32;
        let corners = [
            full.apply([0.0, 0.0]),
            full.apply([w, 0.0]),
            full.apply([w, h]),
            full.apply([0.0, h]),
        ];
        let x0 = corners.iter().map(|c| c[0]).fold(f32::MAX, f32::min).floor() as i64;
        let x1 = corners.iter().map(|c| c[0]).fold(f32::MIN, f32::max).ceil() as i64;
        let y0 = corners.iter().map(|c| c[1]).fold(f32::MAX, f32::min).floor() as i64;
        let y1 = corners.iter().map(|c| c[1]).fold(f32::MIN, f32::max).ceil() as i64;

        for y in y0..y1 {
            for x in x0..x1 {
                let [sx, sy] = inverse.apply([x as f32 + 0.5, y as f32 + 0.5]);
                if sx < 0.0 || sy < 0.0 || sx >= w || sy >= h {
                    continue;
                }
                if let Some([r, g, b, a]) = bitmap.pixel(sx as u32, sy as u32) {
                    let color = [
                        f32::from(r) / 255.0,
                        f32::from(g) / 255.0,
                        f32::from(b) / 255.0,
                        f32::from(a) / 255.0,
                    ];
                    self.blend_pixel(x, y, color, 1.0);
                }
            }
        }
    }

    fn draw_text_line(&mut self, text: &str, origin: [f32; 2], px_per_em: f32, color: Color) {
        // Fixed-advance placeholder glyphs: real shaping is the host
        // toolkit's job, the engine only promises stable metrics.
        let advance = ADVANCE_EM * px_per_em;
        let mut x = origin[0];
        for ch in text.chars() {
            if !ch.is_whitespace() {
                self.fill_rect(
                    Rect::new(
                        x + advance * 0.1,
                        origin[1] - GLYPH_ASCENT_EM * px_per_em,
                        x + advance * 0.9,
                        origin[1],
                    ),
                    color,
                );
            }
            x += advance;
        }
    }

    fn measure_text(&self, text: &str, px_per_em: f32) -> f32 {
        text.chars().count() as f32 * ADVANCE_EM * px_per_em
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn allocation_guards() {
        assert!(Pixmap::new(0, 10).is_none());
        assert!(Pixmap::new(10, 0).is_none());
        assert!(Pixmap::new(4, 4).is_some());
    }

    #[test]
    fn starts_transparent() {
        let pixmap = Pixmap::new(2, 2).unwrap();
        assert_eq!(pixmap.pixel(1, 1), Some([0.0; 4]));
        assert_eq!(pixmap.pixel(2, 0), None);
    }

    #[test]
    fn fill_rect_covers_pixels() {
        let mut pixmap = Pixmap::new(4, 4).unwrap();
        pixmap.fill_rect(Rect::new(0.0, 0.0, 4.0, 2.0), Color::new(255, 0, 0, 255));
        assert_eq!(pixmap.pixel(1, 1), Some([1.0, 0.0, 0.0, 1.0]));
        assert_eq!(pixmap.pixel(1, 3), Some([0.0; 4]));
    }

    #[test]
    fn transform_scopes_with_save_restore() {
        let mut pixmap = Pixmap::new(8, 8).unwrap();
        pixmap.save();
        pixmap.concat(&Matrix::translation(4.0, 0.0));
        pixmap.fill_rect(Rect::new(0.0, 0.0, 2.0, 2.0), Color::WHITE);
        pixmap.restore();
        // Drawn at the translated position only.
        assert_eq!(pixmap.pixel(5, 1), Some([1.0, 1.0, 1.0, 1.0]));
        assert_eq!(pixmap.pixel(1, 1), Some([0.0; 4]));
        // Post-restore draws land untranslated.
        pixmap.fill_rect(Rect::new(0.0, 4.0, 1.0, 5.0), Color::WHITE);
        assert_eq!(pixmap.pixel(0, 4), Some([1.0, 1.0, 1.0, 1.0]));
    }

    #[test]
    fn paint_alpha_modulates() {
        let mut pixmap = Pixmap::new(2, 2).unwrap();
        pixmap.set_paint(0.5, BlendMode::Normal);
        pixmap.fill_rect(Rect::new(0.0, 0.0, 2.0, 2.0), Color::new(255, 255, 255, 255));
        let px = pixmap.pixel(0, 0).unwrap();
        assert!((px[3] - 0.5).abs() < 1e-4);
    }

    #[test]
    fn polyline_marks_along_segment() {
        let mut pixmap = Pixmap::new(16, 8).unwrap();
        pixmap.stroke_polyline(
            &[
                StrokeVertex {
                    pos: [2.0, 4.0],
                    width: 2.0,
                },
                StrokeVertex {
                    pos: [14.0, 4.0],
                    width: 2.0,
                },
            ],
            Color::BLACK,
        );
        for x in [3, 8, 13] {
            let px = pixmap.pixel(x, 4).unwrap();
            assert!(px[3] > 0.5, "no ink at x={x}");
        }
        assert_eq!(pixmap.pixel(8, 0), Some([0.0; 4]));
    }

    #[test]
    fn bitmap_blit_nearest() {
        let mut bytes = vec![0u8; 16];
        bytes[0..4].copy_from_slice(&[255, 0, 0, 255]);
        bytes[4..8].copy_from_slice(&[0, 255, 0, 255]);
        let bitmap = Bitmap::new(2, 2, bytes).unwrap();
        let mut pixmap = Pixmap::new(4, 4).unwrap();
        pixmap.draw_bitmap(&bitmap, &Matrix::scale(2.0, 2.0));
        assert_eq!(pixmap.pixel(0, 0), Some([1.0, 0.0, 0.0, 1.0]));
        assert_eq!(pixmap.pixel(2, 0), Some([0.0, 1.0, 0.0, 1.0]));
    }

    #[test]
    fn text_metrics_are_stable() {
        let pixmap = Pixmap::new(4, 4).unwrap();
        let w = pixmap.measure_text("hello", 16.0);
        assert!((w - 5.0 * ADVANCE_EM * 16.0).abs() < 1e-4);
        assert_eq!(pixmap.measure_text("", 16.0), 0.0);
    }

    #[test]
    fn to_bitmap_round_trips_channels() {
        let mut pixmap = Pixmap::new(2, 1).unwrap();
        pixmap.fill_rect(Rect::new(0.0, 0.0, 1.0, 1.0), Color::new(255, 0, 0, 255));
        let bitmap = pixmap.to_bitmap().unwrap();
        assert_eq!(bitmap.pixel(0, 0), Some([255, 0, 0, 255]));
        assert_eq!(bitmap.pixel(1, 0), Some([0, 0, 0, 0]));
    }
}
