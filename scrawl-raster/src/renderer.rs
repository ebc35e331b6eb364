//! Deterministic layer compositing.
//!
//! Layers paint in ascending z order; each visible layer gets a saved
//! canvas state, the shared view transform, a paint scope derived from its
//! blend settings, and a kind-specific draw routine. Invisible layers cost
//! nothing. Offscreen merge and thumbnail rendering reuse the same per-layer
//! routine against a [`Pixmap`].

use scrawl_core::geometry::{Point, Rect, EPS};
use scrawl_core::layer::{Layer, LayerContent};
use scrawl_core::stroke::Stroke;
use scrawl_core::transform::Matrix;

use crate::canvas::{Canvas, Pixmap, StrokeVertex};

/// Document-space margin text layers wrap within.
const TEXT_MARGIN: f32 = 8.0;
/// Line advance in em for wrapped text.
const LINE_HEIGHT_EM: f32 = 1.4;

/// Composite `layers` onto `canvas` under the shared view `transform`.
///
/// Paint order is strictly non-decreasing z (ties keep slice order); layers
/// with `visible == false` are skipped before any canvas work.
pub fn render_layers(layers: &[Layer], canvas: &mut dyn Canvas, transform: &Matrix) {
    let mut order: Vec<&Layer> = layers.iter().collect();
    order.sort_by_key(|l| l.z_order());

    let doc_rect = document_rect(canvas, transform);
    for layer in order {
        if !layer.visible {
            continue;
        }
        canvas.save();
        canvas.concat(transform);
        let blend = layer.blend();
        canvas.set_paint(blend.opacity, blend.mode);
        draw_layer(layer, canvas, doc_rect);
        canvas.restore();
    }
}

/// Render the given layers into a fresh offscreen pixmap.
///
/// `None` when the raster cannot be allocated; a partially drawn buffer is
/// never returned as success.
#[must_use]
pub fn merge_to_pixmap(
    layers: &[Layer],
    width: u32,
    height: u32,
    transform: &Matrix,
) -> Option<Pixmap> {
    let mut pixmap = Pixmap::new(width, height)?;
    render_layers(layers, &mut pixmap, transform);
    Some(pixmap)
}

/// Render one layer, scaled to fit `max_dim`, into a fresh pixmap.
///
/// Draws through the same per-layer routine as [`render_layers`], but
/// ignores the visibility flag so hidden layers still preview. `None` on
/// allocation failure or a degenerate document rectangle.
#[must_use]
pub fn layer_thumbnail(layer: &Layer, doc_bounds: Rect, max_dim: u32) -> Option<Pixmap> {
    let w = doc_bounds.width();
    let h = doc_bounds.height();
    if max_dim == 0 || w < EPS || h < EPS {
        log::warn!("degenerate thumbnail request {w}x{h} at {max_dim}");
        return None;
    }
    let scale = max_dim as f32 / w.max(h);
    let tw = ((w * scale).round() as u32).clamp(1, max_dim);
    let th = ((h * scale).round() as u32).clamp(1, max_dim);
    let transform = Matrix::scale(scale, scale)
        .concat(&Matrix::translation(-doc_bounds.left, -doc_bounds.top));

    let mut pixmap = Pixmap::new(tw, th)?;
    let doc_rect = document_rect(&pixmap, &transform);
    pixmap.save();
    pixmap.concat(&transform);
    let blend = layer.blend();
    pixmap.set_paint(blend.opacity, blend.mode);
    draw_layer(layer, &mut pixmap, doc_rect);
    pixmap.restore();
    Some(pixmap)
}

/// The device bounds mapped back into document space, where background
/// fills and text wrapping are computed. Falls back to the device bounds
/// under a degenerate view transform.
fn document_rect(canvas: &dyn Canvas, transform: &Matrix) -> Rect {
    let device = canvas.bounds();
    let Some(inverse) = transform.inverse() else {
        return device;
    };
    let corners = [
        inverse.apply([device.left, device.top]),
        inverse.apply([device.right, device.top]),
        inverse.apply([device.right, device.bottom]),
        inverse.apply([device.left, device.bottom]),
    ];
    let xs = corners.map(|c| c[0]);
    let ys = corners.map(|c| c[1]);
    Rect::new(
        xs.iter().copied().fold(f32::MAX, f32::min),
        ys.iter().copied().fold(f32::MAX, f32::min),
        xs.iter().copied().fold(f32::MIN, f32::max),
        ys.iter().copied().fold(f32::MIN, f32::max),
    )
}

/// Kind dispatch. The canvas state (transform + paint) is already scoped.
fn draw_layer(layer: &Layer, canvas: &mut dyn Canvas, doc_rect: Rect) {
    match &layer.content {
        LayerContent::Drawing { strokes } => {
            for stroke in strokes {
                draw_stroke(stroke, canvas);
            }
        }
        LayerContent::Text {
            text,
            px_per_em,
            color,
        } => {
            let wrap_width = (doc_rect.width() - 2.0 * TEXT_MARGIN).max(*px_per_em);
            let mut baseline = doc_rect.top + TEXT_MARGIN + px_per_em;
            for line in wrap_lines(canvas, text, *px_per_em, wrap_width) {
                canvas.draw_text_line(&line, [doc_rect.left + TEXT_MARGIN, baseline], *px_per_em, *color);
                baseline += LINE_HEIGHT_EM * px_per_em;
            }
        }
        LayerContent::Image {
            source,
            bitmap,
            transform,
        } => match bitmap {
            Some(bitmap) => canvas.draw_bitmap(bitmap, transform),
            // Non-resident pixels are a silent degrade, not an error.
            None => log::debug!("image layer {source:?} has no resident bitmap, skipped"),
        },
        LayerContent::Background { color, image } => {
            canvas.fill_rect(doc_rect, *color);
            if let Some(bitmap) = image {
                let fit = Matrix::translation(doc_rect.left, doc_rect.top).concat(&Matrix::scale(
                    doc_rect.width() / bitmap.width() as f32,
                    doc_rect.height() / bitmap.height() as f32,
                ));
                canvas.draw_bitmap(bitmap, &fit);
            }
        }
    }
}

/// Play one stroke back: flatten its path, apply pressure widths, split
/// into dash runs, and hand polylines to the canvas.
fn draw_stroke(stroke: &Stroke, canvas: &mut dyn Canvas) {
    let flat = stroke.path().flatten();
    if flat.is_empty() {
        return;
    }
    let vertices: Vec<StrokeVertex> = flat
        .iter()
        .map(|p: &Point| StrokeVertex {
            pos: [p.x, p.y],
            width: stroke.width_at(p),
        })
        .collect();
    let color = stroke.color().with_alpha_scaled(stroke.opacity());

    let pattern = stroke.style().dash_pattern();
    if pattern.is_empty() {
        canvas.stroke_polyline(&vertices, color);
        return;
    }
    // Dash runs are cut in document space, in multiples of the width.
    let scaled: Vec<f32> = pattern.iter().map(|len| len * stroke.width()).collect();
    if scaled.iter().sum::<f32>() < EPS {
        canvas.stroke_polyline(&vertices, color);
        return;
    }
    for run in dash_runs(&vertices, &scaled) {
        canvas.stroke_polyline(&run, color);
    }
}

/// Split a polyline into its "on" runs per an on/off dash pattern given in
/// absolute lengths (first entry is an "on" run).
fn dash_runs(vertices: &[StrokeVertex], pattern: &[f32]) -> Vec<Vec<StrokeVertex>> {
    let mut runs = Vec::new();
    let mut run: Vec<StrokeVertex> = Vec::new();
    let mut idx = 0;
    let mut remaining = pattern[0];
    let mut on = true;
    run.push(vertices[0]);

    for pair in vertices.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        let dx = b.pos[0] - a.pos[0];
        let dy = b.pos[1] - a.pos[1];
        let seg_len = (dx * dx + dy * dy).sqrt();
        let mut consumed = 0.0f32;
        while seg_len - consumed > remaining {
            consumed += remaining;
            let t = consumed / seg_len;
            let cut = StrokeVertex {
                pos: [a.pos[0] + dx * t, a.pos[1] + dy * t],
                width: a.width + (b.width - a.width) * t,
            };
            if on {
                run.push(cut);
                runs.push(std::mem::take(&mut run));
            } else {
                run = vec![cut];
            }
            on = !on;
            idx = (idx + 1) % pattern.len();
            remaining = pattern[idx];
        }
        remaining -= seg_len - consumed;
        if on {
            run.push(b);
        }
    }
    if on && !run.is_empty() {
        runs.push(run);
    }
    runs
}

/// Greedy word wrap against the canvas's text metrics. Words longer than
/// the width get a line of their own rather than being split.
fn wrap_lines(canvas: &dyn Canvas, text: &str, px_per_em: f32, width: f32) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.lines() {
        let mut line = String::new();
        for word in paragraph.split_whitespace() {
            let candidate = if line.is_empty() {
                word.to_owned()
            } else {
                format!("{line} {word}")
            };
            if canvas.measure_text(&candidate, px_per_em) <= width || line.is_empty() {
                line = candidate;
            } else {
                lines.push(std::mem::take(&mut line));
                line = word.to_owned();
            }
        }
        lines.push(line);
    }
    lines
}
