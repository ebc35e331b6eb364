//! Point-sequence smoothing strategies.
//!
//! Every strategy is a pure `&[Point] -> Vec<Point>` transform behind the
//! [`Smoothing`] tag. Inputs too short for a given strategy are returned
//! unchanged, and every interpolated pressure is clamped back into `[0, 1]`
//! by [`Point::new`].

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::geometry::{Point, EPS};

/// A smoothing strategy plus its parameters.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize, strum::AsRefStr, strum::EnumDiscriminants)]
#[strum_discriminants(derive(strum::EnumIter, strum::AsRefStr, Hash))]
#[strum_discriminants(name(SmoothingKind))]
pub enum Smoothing {
    /// Interpolating cardinal spline. Passes through every input point.
    ///
    /// `tension` 0 is the classic centripetal-free form, 1 degenerates to
    /// the input polyline.
    CatmullRom { segments: usize, tension: f32 },
    /// Approximating clamped uniform B-spline of the given degree.
    BSpline { degree: usize },
    /// Discrete convolution with a normalized Gaussian kernel.
    Gaussian { sigma: f32, kernel_size: usize },
    /// Symmetric window average; the window shrinks near the boundaries.
    MovingAverage { window: usize },
    /// Smooths only where the local turn angle exceeds the threshold.
    AdaptiveCurvature { strength: f32, curvature_threshold: f32 },
    /// Smoothing strength fades with stylus pressure, so firm strokes keep
    /// their sharpness.
    PressureAware { base_factor: f32 },
}

impl Default for Smoothing {
    fn default() -> Self {
        Self::CatmullRom {
            segments: 8,
            tension: 0.0,
        }
    }
}

impl Smoothing {
    /// Run the strategy. Side-effect free.
    #[must_use]
    pub fn apply(&self, points: &[Point]) -> Vec<Point> {
        match *self {
            Self::CatmullRom { segments, tension } => catmull_rom(points, segments, tension),
            Self::BSpline { degree } => b_spline(points, degree),
            Self::Gaussian { sigma, kernel_size } => gaussian(points, sigma, kernel_size),
            Self::MovingAverage { window } => moving_average(points, window),
            Self::AdaptiveCurvature {
                strength,
                curvature_threshold,
            } => adaptive(points, strength, curvature_threshold),
            Self::PressureAware { base_factor } => pressure_aware(points, base_factor),
        }
    }
}

/// Cardinal-spline interpolation with duplicated virtual endpoints.
///
/// Emits `segments` sub-points per consecutive pair plus the final point, so
/// the output length is `(n - 1) * segments + 1`.
fn catmull_rom(points: &[Point], segments: usize, tension: f32) -> Vec<Point> {
    if points.len() < 2 || segments == 0 {
        return points.to_vec();
    }
    let n = points.len();
    let scale = (1.0 - tension.clamp(0.0, 1.0)) / 2.0;
    let mut out = Vec::with_capacity((n - 1) * segments + 1);

    for i in 0..n - 1 {
        // Duplicate the first/last point as virtual neighbors.
        let p0 = &points[i.saturating_sub(1)];
        let p1 = &points[i];
        let p2 = &points[i + 1];
        let p3 = &points[(i + 2).min(n - 1)];

        // Hermite form: tangents from the neighbor chords.
        let m1 = [scale * (p2.x - p0.x), scale * (p2.y - p0.y)];
        let m2 = [scale * (p3.x - p1.x), scale * (p3.y - p1.y)];
        let mp1 = scale * (p2.pressure - p0.pressure);
        let mp2 = scale * (p3.pressure - p1.pressure);

        for j in 0..segments {
            let t = j as f32 / segments as f32;
            let t2 = t * t;
            let t3 = t2 * t;
            let h00 = 2.0 * t3 - 3.0 * t2 + 1.0;
            let h10 = t3 - 2.0 * t2 + t;
            let h01 = -2.0 * t3 + 3.0 * t2;
            let h11 = t3 - t2;
            out.push(Point::new(
                h00 * p1.x + h10 * m1[0] + h01 * p2.x + h11 * m2[0],
                h00 * p1.y + h10 * m1[1] + h01 * p2.y + h11 * m2[1],
                h00 * p1.pressure + h10 * mp1 + h01 * p2.pressure + h11 * mp2,
                Point::lerp(p1, p2, t).timestamp,
            ));
        }
    }
    out.push(points[n - 1]);
    out
}

/// Clamped uniform B-spline evaluated with the Cox–de Boor recursion.
///
/// Needs at least `degree + 1` control points; evaluates one output point
/// per input point at uniform parameter spacing. Approximating: the curve
/// only touches the first and last input point.
fn b_spline(points: &[Point], degree: usize) -> Vec<Point> {
    let n = points.len();
    let p = degree.max(1);
    if n < p + 1 {
        return points.to_vec();
    }

    // Clamped uniform knot vector: p+1 zeros, uniform interior, p+1 ones.
    let spans = n - p;
    let mut knots = Vec::with_capacity(n + p + 1);
    knots.extend(std::iter::repeat(0.0f32).take(p + 1));
    for i in 1..spans {
        knots.push(i as f32 / spans as f32);
    }
    knots.extend(std::iter::repeat(1.0f32).take(p + 1));

    let mut out = Vec::with_capacity(n);
    for k in 0..n {
        let u = k as f32 / (n - 1) as f32;
        if u >= 1.0 {
            // The half-open basis support never covers the final knot.
            out.push(points[n - 1]);
            continue;
        }
        let mut x = 0.0f32;
        let mut y = 0.0f32;
        let mut pressure = 0.0f32;
        let mut timestamp = 0.0f64;
        for (i, ctrl) in points.iter().enumerate() {
            let w = cox_de_boor(i, p, u, &knots);
            if w > 0.0 {
                x += w * ctrl.x;
                y += w * ctrl.y;
                pressure += w * ctrl.pressure;
                timestamp += f64::from(w) * ctrl.timestamp as f64;
            }
        }
        out.push(Point::new(x, y, pressure, timestamp.round() as i64));
    }
    out
}

/// Cox–de Boor basis function `N_{i,p}(u)` over a half-open knot span.
fn cox_de_boor(i: usize, p: usize, u: f32, knots: &[f32]) -> f32 {
    if p == 0 {
        return if knots[i] <= u && u < knots[i + 1] {
            1.0
        } else {
            0.0
        };
    }
    let mut value = 0.0;
    let left_den = knots[i + p] - knots[i];
    if left_den > EPS {
        value += (u - knots[i]) / left_den * cox_de_boor(i, p - 1, u, knots);
    }
    let right_den = knots[i + p + 1] - knots[i + 1];
    if right_den > EPS {
        value += (knots[i + p + 1] - u) / right_den * cox_de_boor(i + 1, p - 1, u, knots);
    }
    value
}

/// Normalized 1-D Gaussian convolution with replicate-edge boundaries.
///
/// The kernel is widened to the next odd size. Inputs shorter than the
/// kernel are returned unchanged.
fn gaussian(points: &[Point], sigma: f32, kernel_size: usize) -> Vec<Point> {
    let half = kernel_size / 2;
    let size = half * 2 + 1;
    if kernel_size == 0 || points.len() < size {
        return points.to_vec();
    }
    let sigma = sigma.max(1e-3);

    let mut kernel: SmallVec<[f32; 16]> = SmallVec::with_capacity(size);
    let mut sum = 0.0f32;
    for k in 0..size {
        let d = k as f32 - half as f32;
        let w = (-d * d / (2.0 * sigma * sigma)).exp();
        kernel.push(w);
        sum += w;
    }
    for w in &mut kernel {
        *w /= sum;
    }

    let n = points.len() as isize;
    points
        .iter()
        .enumerate()
        .map(|(i, original)| {
            let mut x = 0.0f32;
            let mut y = 0.0f32;
            let mut pressure = 0.0f32;
            for (k, w) in kernel.iter().enumerate() {
                // Clamp the window index into range: replicate-edge.
                let j = (i as isize + k as isize - half as isize).clamp(0, n - 1) as usize;
                x += w * points[j].x;
                y += w * points[j].y;
                pressure += w * points[j].pressure;
            }
            Point::new(x, y, pressure, original.timestamp)
        })
        .collect()
}

/// Symmetric moving average. Only in-range neighbors are counted, so the
/// divisor shrinks toward the boundaries.
fn moving_average(points: &[Point], window: usize) -> Vec<Point> {
    if points.len() < 2 || window < 2 {
        return points.to_vec();
    }
    let half = window / 2;
    points
        .iter()
        .enumerate()
        .map(|(i, original)| {
            let lo = i.saturating_sub(half);
            let hi = (i + half).min(points.len() - 1);
            let count = (hi - lo + 1) as f32;
            let mut x = 0.0f32;
            let mut y = 0.0f32;
            let mut pressure = 0.0f32;
            for p in &points[lo..=hi] {
                x += p.x;
                y += p.y;
                pressure += p.pressure;
            }
            Point::new(x / count, y / count, pressure / count, original.timestamp)
        })
        .collect()
}

/// Curvature-gated smoothing. First and last point are untouched; interior
/// points move toward their neighbor midpoint only where the turn angle
/// exceeds `curvature_threshold` radians, by the saturating amount
/// `strength / (strength + threshold)`.
fn adaptive(points: &[Point], strength: f32, curvature_threshold: f32) -> Vec<Point> {
    if points.len() < 3 {
        return points.to_vec();
    }
    let strength = strength.max(0.0);
    let denominator = strength + curvature_threshold.max(0.0);
    let amount = if denominator < EPS {
        0.0
    } else {
        strength / denominator
    };

    let mut out = points.to_vec();
    for i in 1..points.len() - 1 {
        let prev = &points[i - 1];
        let here = &points[i];
        let next = &points[i + 1];
        let vin = [here.x - prev.x, here.y - prev.y];
        let vout = [next.x - here.x, next.y - here.y];
        let len_in = (vin[0] * vin[0] + vin[1] * vin[1]).sqrt();
        let len_out = (vout[0] * vout[0] + vout[1] * vout[1]).sqrt();
        if len_in < EPS || len_out < EPS {
            continue;
        }
        let cos = ((vin[0] * vout[0] + vin[1] * vout[1]) / (len_in * len_out)).clamp(-1.0, 1.0);
        let angle = cos.acos();
        if angle <= curvature_threshold {
            continue;
        }
        let mid = Point::lerp(prev, next, 0.5);
        out[i] = Point::new(
            here.x + (mid.x - here.x) * amount,
            here.y + (mid.y - here.y) * amount,
            here.pressure,
            here.timestamp,
        );
    }
    out
}

/// Pressure-gated smoothing: per interior point the strength is
/// `base_factor * (1 - pressure)`, so firm input keeps its shape.
fn pressure_aware(points: &[Point], base_factor: f32) -> Vec<Point> {
    if points.len() < 3 {
        return points.to_vec();
    }
    let mut out = points.to_vec();
    for i in 1..points.len() - 1 {
        let here = &points[i];
        let amount = (base_factor * (1.0 - here.pressure)).clamp(0.0, 1.0);
        if amount <= 0.0 {
            continue;
        }
        let mid = Point::lerp(&points[i - 1], &points[i + 1], 0.5);
        out[i] = Point::new(
            here.x + (mid.x - here.x) * amount,
            here.y + (mid.y - here.y) * amount,
            here.pressure,
            here.timestamp,
        );
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::geometry::Rect;

    fn pt(x: f32, y: f32) -> Point {
        Point::new(x, y, 0.5, 0)
    }

    fn zigzag(n: usize) -> Vec<Point> {
        (0..n)
            .map(|i| Point::new(i as f32, if i % 2 == 0 { 0.0 } else { 2.0 }, 0.5, i as i64))
            .collect()
    }

    #[test]
    fn catmull_rom_passes_through_inputs() {
        let pts = zigzag(5);
        let smoothing = Smoothing::CatmullRom {
            segments: 4,
            tension: 0.0,
        };
        let out = smoothing.apply(&pts);
        assert_eq!(out.len(), (pts.len() - 1) * 4 + 1);
        for original in &pts {
            let hit = out
                .iter()
                .any(|p| (p.x - original.x).abs() < 1e-4 && (p.y - original.y).abs() < 1e-4);
            assert!(hit, "lost pass-through at ({}, {})", original.x, original.y);
        }
    }

    #[test]
    fn catmull_rom_short_input_unchanged() {
        let one = [pt(1.0, 1.0)];
        let smoothing = Smoothing::default();
        assert_eq!(smoothing.apply(&one), one.to_vec());
    }

    #[test]
    fn b_spline_needs_degree_plus_one() {
        let pts = zigzag(3);
        let out = Smoothing::BSpline { degree: 3 }.apply(&pts);
        assert_eq!(out, pts);
    }

    #[test]
    fn b_spline_clamps_to_endpoints() {
        let pts = zigzag(6);
        let out = Smoothing::BSpline { degree: 3 }.apply(&pts);
        assert_eq!(out.len(), pts.len());
        assert!((out[0].x - pts[0].x).abs() < 1e-4);
        assert!((out[0].y - pts[0].y).abs() < 1e-4);
        assert!((out.last().unwrap().x - pts.last().unwrap().x).abs() < 1e-4);
        assert!((out.last().unwrap().y - pts.last().unwrap().y).abs() < 1e-4);
    }

    #[test]
    fn gaussian_shorter_than_kernel_unchanged() {
        let pts = zigzag(3);
        let out = Smoothing::Gaussian {
            sigma: 1.0,
            kernel_size: 5,
        }
        .apply(&pts);
        assert_eq!(out, pts);
    }

    #[test]
    fn gaussian_flattens_zigzag() {
        let pts = zigzag(9);
        let out = Smoothing::Gaussian {
            sigma: 1.0,
            kernel_size: 5,
        }
        .apply(&pts);
        assert_eq!(out.len(), pts.len());
        // The interior spread shrinks toward the mean height.
        let spread = |ps: &[Point]| {
            ps[2..7]
                .iter()
                .map(|p| (p.y - 1.0).abs())
                .fold(0.0f32, f32::max)
        };
        assert!(spread(&out) < spread(&pts));
    }

    #[test]
    fn moving_average_twice_never_grows_bounds() {
        let pts = zigzag(11);
        let smoothing = Smoothing::MovingAverage { window: 4 };
        let once = smoothing.apply(&pts);
        let twice = smoothing.apply(&once);
        let b0 = Rect::around(&pts);
        let b1 = Rect::around(&once);
        let b2 = Rect::around(&twice);
        assert!(b1.width() <= b0.width() + 1e-5 && b1.height() <= b0.height() + 1e-5);
        assert!(b2.width() <= b1.width() + 1e-5 && b2.height() <= b1.height() + 1e-5);
    }

    #[test]
    fn adaptive_keeps_straight_runs() {
        let pts: Vec<Point> = (0..6).map(|i| pt(i as f32, 0.0)).collect();
        let out = Smoothing::AdaptiveCurvature {
            strength: 1.0,
            curvature_threshold: 0.3,
        }
        .apply(&pts);
        assert_eq!(out, pts);
    }

    #[test]
    fn adaptive_endpoints_fixed() {
        let pts = zigzag(7);
        let out = Smoothing::AdaptiveCurvature {
            strength: 1.0,
            curvature_threshold: 0.1,
        }
        .apply(&pts);
        assert_eq!(out[0], pts[0]);
        assert_eq!(out[6], pts[6]);
        assert_ne!(out[3], pts[3]);
    }

    #[test]
    fn pressure_aware_firm_points_stay() {
        let mut pts = zigzag(5);
        for p in &mut pts {
            *p = Point::new(p.x, p.y, 1.0, p.timestamp);
        }
        let out = Smoothing::PressureAware { base_factor: 0.8 }.apply(&pts);
        assert_eq!(out, pts);
    }

    #[test]
    fn pressure_aware_light_points_move() {
        let mut pts = zigzag(5);
        for p in &mut pts {
            *p = Point::new(p.x, p.y, 0.0, p.timestamp);
        }
        let out = Smoothing::PressureAware { base_factor: 0.8 }.apply(&pts);
        assert_eq!(out[0], pts[0]);
        assert_eq!(out[4], pts[4]);
        assert_ne!(out[2], pts[2]);
    }
}
