//! Geometry primitives shared by every stage of the pipeline.
//!
//! All types here are plain immutable values. Anything derived (bounds,
//! distances, curve samples) is recomputed from its sources rather than
//! cached, so a stale value can never be observed.

use serde::{Deserialize, Serialize};

/// Tolerance band for float-zero comparisons, crate-wide.
///
/// Used wherever a squared length or determinant is tested for degeneracy.
/// Exact `== 0.0` comparisons are not used anywhere in the crate.
pub const EPS: f32 = 1e-6;

/// One pressure-sampled input point.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
    /// Normalized stylus pressure. Invariant: within `[0, 1]`.
    pub pressure: f32,
    /// Sample time in milliseconds, as reported by the input source.
    pub timestamp: i64,
}

impl Point {
    /// Build a point, clamping pressure into its valid interval.
    #[must_use]
    pub fn new(x: f32, y: f32, pressure: f32, timestamp: i64) -> Self {
        Self {
            x,
            y,
            pressure: pressure.clamp(0.0, 1.0),
            timestamp,
        }
    }

    #[must_use]
    pub fn position(&self) -> [f32; 2] {
        [self.x, self.y]
    }

    #[must_use]
    pub fn distance_sq(&self, other: &Point) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        dx * dx + dy * dy
    }

    #[must_use]
    pub fn distance(&self, other: &Point) -> f32 {
        self.distance_sq(other).sqrt()
    }

    /// Linear interpolation between two points at `t`.
    ///
    /// Pressure is clamped back into `[0, 1]`, timestamps interpolate on the
    /// integer millisecond grid.
    #[must_use]
    pub fn lerp(a: &Point, b: &Point, t: f32) -> Point {
        Point::new(
            a.x + (b.x - a.x) * t,
            a.y + (b.y - a.y) * t,
            a.pressure + (b.pressure - a.pressure) * t,
            a.timestamp + ((b.timestamp - a.timestamp) as f64 * f64::from(t)).round() as i64,
        )
    }
}

/// Perpendicular distance from `p` to the chord `a -> b`.
///
/// Coincident endpoints (`len_sq` within [`EPS`]) fall back to the straight
/// distance from `p` to `a`.
#[must_use]
pub fn perpendicular_distance(p: &Point, a: &Point, b: &Point) -> f32 {
    let abx = b.x - a.x;
    let aby = b.y - a.y;
    let apx = p.x - a.x;
    let apy = p.y - a.y;
    let len_sq = abx * abx + aby * aby;
    if len_sq < EPS {
        return (apx * apx + apy * apy).sqrt();
    }
    (abx * apy - aby * apx).abs() / len_sq.sqrt()
}

/// Axis-aligned bounds. Always derived from a point set, never hand-edited.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl Rect {
    pub const ZERO: Rect = Rect {
        left: 0.0,
        top: 0.0,
        right: 0.0,
        bottom: 0.0,
    };

    #[must_use]
    pub fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Tight bounds around a point set. [`Rect::ZERO`] for an empty set.
    #[must_use]
    pub fn around(points: &[Point]) -> Rect {
        let Some(first) = points.first() else {
            return Rect::ZERO;
        };
        let mut rect = Rect::new(first.x, first.y, first.x, first.y);
        for p in &points[1..] {
            rect.left = rect.left.min(p.x);
            rect.top = rect.top.min(p.y);
            rect.right = rect.right.max(p.x);
            rect.bottom = rect.bottom.max(p.y);
        }
        rect
    }

    #[must_use]
    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    #[must_use]
    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    #[must_use]
    pub fn center(&self) -> [f32; 2] {
        [
            (self.left + self.right) / 2.0,
            (self.top + self.bottom) / 2.0,
        ]
    }

    /// Inclusive containment on all four edges.
    #[must_use]
    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.left && x <= self.right && y >= self.top && y <= self.bottom
    }

    #[must_use]
    pub fn union(&self, other: &Rect) -> Rect {
        Rect {
            left: self.left.min(other.left),
            top: self.top.min(other.top),
            right: self.right.max(other.right),
            bottom: self.bottom.max(other.bottom),
        }
    }

    #[must_use]
    pub fn expanded(&self, margin: f32) -> Rect {
        Rect {
            left: self.left - margin,
            top: self.top - margin,
            right: self.right + margin,
            bottom: self.bottom + margin,
        }
    }
}

/// One cubic Bézier arc. Purely derived from neighboring points by the path
/// builder.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CubicBezier {
    pub start: Point,
    pub ctrl1: Point,
    pub ctrl2: Point,
    pub end: Point,
}

impl CubicBezier {
    /// Evaluate the curve at `t` in `[0, 1]`.
    ///
    /// Position follows the cubic Bernstein basis; pressure does too (then
    /// clamps), timestamps interpolate linearly between the endpoints.
    #[must_use]
    pub fn eval(&self, t: f32) -> Point {
        let u = 1.0 - t;
        let b0 = u * u * u;
        let b1 = 3.0 * u * u * t;
        let b2 = 3.0 * u * t * t;
        let b3 = t * t * t;
        Point::new(
            b0 * self.start.x + b1 * self.ctrl1.x + b2 * self.ctrl2.x + b3 * self.end.x,
            b0 * self.start.y + b1 * self.ctrl1.y + b2 * self.ctrl2.y + b3 * self.end.y,
            b0 * self.start.pressure
                + b1 * self.ctrl1.pressure
                + b2 * self.ctrl2.pressure
                + b3 * self.end.pressure,
            Point::lerp(&self.start, &self.end, t).timestamp,
        )
    }

    /// Tangent (derivative) direction at `t`. Not normalized.
    #[must_use]
    pub fn tangent(&self, t: f32) -> [f32; 2] {
        let u = 1.0 - t;
        let d0 = 3.0 * u * u;
        let d1 = 6.0 * u * t;
        let d2 = 3.0 * t * t;
        [
            d0 * (self.ctrl1.x - self.start.x)
                + d1 * (self.ctrl2.x - self.ctrl1.x)
                + d2 * (self.end.x - self.ctrl2.x),
            d0 * (self.ctrl1.y - self.start.y)
                + d1 * (self.ctrl2.y - self.ctrl1.y)
                + d2 * (self.end.y - self.ctrl2.y),
        ]
    }

    /// Approximate arclength by summing `samples` chords.
    #[must_use]
    pub fn arc_length(&self, samples: usize) -> f32 {
        let samples = samples.max(1);
        let mut length = 0.0;
        let mut prev = self.start;
        for i in 1..=samples {
            let next = self.eval(i as f32 / samples as f32);
            length += prev.distance(&next);
            prev = next;
        }
        length
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn pressure_clamped_on_construction() {
        assert_eq!(Point::new(0.0, 0.0, 2.0, 0).pressure, 1.0);
        assert_eq!(Point::new(0.0, 0.0, -0.5, 0).pressure, 0.0);
    }

    #[test]
    fn lerp_midpoint() {
        let a = Point::new(0.0, 0.0, 0.0, 0);
        let b = Point::new(10.0, 20.0, 1.0, 100);
        let mid = Point::lerp(&a, &b, 0.5);
        assert_eq!(mid.x, 5.0);
        assert_eq!(mid.y, 10.0);
        assert_eq!(mid.pressure, 0.5);
        assert_eq!(mid.timestamp, 50);
    }

    #[test]
    fn perpendicular_distance_degenerate_chord() {
        let a = Point::new(1.0, 1.0, 1.0, 0);
        let p = Point::new(4.0, 5.0, 1.0, 0);
        // Chord endpoints coincide: falls back to distance-to-endpoint.
        assert!((perpendicular_distance(&p, &a, &a) - 5.0).abs() < 1e-5);
    }

    #[test]
    fn perpendicular_distance_straight() {
        let a = Point::new(0.0, 0.0, 1.0, 0);
        let b = Point::new(10.0, 0.0, 1.0, 0);
        let p = Point::new(5.0, 3.0, 1.0, 0);
        assert!((perpendicular_distance(&p, &a, &b) - 3.0).abs() < 1e-5);
    }

    #[test]
    fn bounds_derive_from_points() {
        let pts = [
            Point::new(3.0, -1.0, 1.0, 0),
            Point::new(-2.0, 4.0, 1.0, 1),
            Point::new(0.0, 0.0, 1.0, 2),
        ];
        let r = Rect::around(&pts);
        assert_eq!(r, Rect::new(-2.0, -1.0, 3.0, 4.0));
        assert_eq!(Rect::around(&[]), Rect::ZERO);
    }

    #[test]
    fn bezier_endpoints_exact() {
        let seg = CubicBezier {
            start: Point::new(0.0, 0.0, 0.2, 0),
            ctrl1: Point::new(1.0, 2.0, 0.4, 0),
            ctrl2: Point::new(3.0, 2.0, 0.6, 10),
            end: Point::new(4.0, 0.0, 0.8, 10),
        };
        assert_eq!(seg.eval(0.0), seg.start);
        let end = seg.eval(1.0);
        assert!((end.x - seg.end.x).abs() < 1e-5);
        assert!((end.y - seg.end.y).abs() < 1e-5);
    }

    #[test]
    fn straight_segment_arc_length() {
        let seg = CubicBezier {
            start: Point::new(0.0, 0.0, 1.0, 0),
            ctrl1: Point::new(3.3, 0.0, 1.0, 0),
            ctrl2: Point::new(6.7, 0.0, 1.0, 0),
            end: Point::new(10.0, 0.0, 1.0, 0),
        };
        assert!((seg.arc_length(16) - 10.0).abs() < 1e-3);
    }
}
