//! Cubic-Bézier path construction from simplified point sequences.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::geometry::{CubicBezier, Point, EPS};
use crate::simplify::simplify;

/// Chord fractions for the control points of a straight two-point segment.
const LINEAR_CTRL1_T: f32 = 0.33;
const LINEAR_CTRL2_T: f32 = 0.67;

/// Flattening resolution when converting segments back to a polyline.
const FLATTEN_STEPS: usize = 16;

/// A smoothed vector path: the simplified input points plus the cubic
/// segment chain derived from them.
///
/// Segments are derived at construction and the point list is not publicly
/// mutable, so a consumer can never observe a stale segment chain. To change
/// the geometry, generate a new path.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Path {
    points: Vec<Point>,
    segments: SmallVec<[CubicBezier; 4]>,
}

impl Path {
    /// Build a path from raw input points.
    ///
    /// Runs the simplifier at `simplification_tolerance` first, then derives
    /// the segment chain: no segments below two points, a single cubic
    /// expressing the straight chord for exactly two, and a C¹-ish chain of
    /// per-pair cubics otherwise, with control distances scaled by
    /// `smoothing_factor` and the local inter-point distance.
    #[must_use]
    pub fn generate(points: &[Point], smoothing_factor: f32, simplification_tolerance: f32) -> Self {
        let points = simplify(points, simplification_tolerance);
        let segments = build_segments(&points, smoothing_factor);
        Self { points, segments }
    }

    /// The simplified input history.
    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// The derived display form.
    #[must_use]
    pub fn segments(&self) -> &[CubicBezier] {
        &self.segments
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Flatten the segment chain into a drawable polyline.
    ///
    /// Falls back to the raw points when no segments exist (fewer than two
    /// input points survived simplification).
    #[must_use]
    pub fn flatten(&self) -> Vec<Point> {
        if self.segments.is_empty() {
            return self.points.clone();
        }
        let mut out = Vec::with_capacity(self.segments.len() * FLATTEN_STEPS + 1);
        out.push(self.segments[0].start);
        for segment in &self.segments {
            for i in 1..=FLATTEN_STEPS {
                out.push(segment.eval(i as f32 / FLATTEN_STEPS as f32));
            }
        }
        out
    }

    /// Re-sample every segment at `max(2, round(length * density))` steps,
    /// for hit-testing or thumbnailing.
    #[must_use]
    pub fn sample(&self, density: f32) -> Vec<Point> {
        if self.segments.is_empty() {
            return self.points.clone();
        }
        let mut out = Vec::new();
        out.push(self.segments[0].start);
        for segment in &self.segments {
            let length = segment.arc_length(8);
            let steps = ((length * density).round() as usize).max(2);
            for i in 1..=steps {
                out.push(segment.eval(i as f32 / steps as f32));
            }
        }
        out
    }

    /// Total chord-approximated length of the segment chain.
    #[must_use]
    pub fn length(&self) -> f32 {
        self.segments.iter().map(|s| s.arc_length(8)).sum()
    }
}

fn build_segments(points: &[Point], smoothing_factor: f32) -> SmallVec<[CubicBezier; 4]> {
    let mut segments = SmallVec::new();
    match points {
        [] | [_] => {}
        [a, b] => segments.push(linear_segment(a, b)),
        _ => {
            let n = points.len();
            for i in 0..n - 1 {
                // Virtual neighbors clamped at the sequence ends.
                let p0 = &points[i.saturating_sub(1)];
                let p1 = &points[i];
                let p2 = &points[i + 1];
                let p3 = &points[(i + 2).min(n - 1)];
                segments.push(chain_segment(p0, p1, p2, p3, smoothing_factor));
            }
        }
    }
    segments
}

/// A straight chord expressed as a cubic, controls at fixed fractions.
fn linear_segment(a: &Point, b: &Point) -> CubicBezier {
    CubicBezier {
        start: *a,
        ctrl1: Point::lerp(a, b, LINEAR_CTRL1_T),
        ctrl2: Point::lerp(a, b, LINEAR_CTRL2_T),
        end: *b,
    }
}

/// Segment `p1 -> p2` with tangents taken from the neighbor chords
/// `p0 -> p2` and `p1 -> p3`, scaled by the smoothing factor and the local
/// inter-point distance.
fn chain_segment(p0: &Point, p1: &Point, p2: &Point, p3: &Point, smoothing_factor: f32) -> CubicBezier {
    let span = p1.distance(p2);
    let reach = smoothing_factor.clamp(0.0, 1.0) * span;

    let ctrl1 = offset_along(p1, p0, p2, reach).unwrap_or_else(|| Point::lerp(p1, p2, LINEAR_CTRL1_T));
    let ctrl2 = offset_along(p2, p3, p1, reach).unwrap_or_else(|| Point::lerp(p1, p2, LINEAR_CTRL2_T));

    CubicBezier {
        start: *p1,
        ctrl1,
        ctrl2,
        end: *p2,
    }
}

/// Offset `anchor` by `reach` along the normalized chord `from -> toward`.
/// `None` when the chord is degenerate.
fn offset_along(anchor: &Point, from: &Point, toward: &Point, reach: f32) -> Option<Point> {
    let dx = toward.x - from.x;
    let dy = toward.y - from.y;
    let len_sq = dx * dx + dy * dy;
    if len_sq < EPS {
        return None;
    }
    let len = len_sq.sqrt();
    Some(Point::new(
        anchor.x + dx / len * reach,
        anchor.y + dy / len * reach,
        anchor.pressure,
        anchor.timestamp,
    ))
}
