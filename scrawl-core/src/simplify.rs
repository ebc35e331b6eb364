//! Douglas–Peucker point-sequence reduction.

use crate::geometry::{perpendicular_distance, Point};

/// Reduce `points` to the minimal subsequence that deviates from the
/// original polyline by less than `tolerance`.
///
/// The output is always an order-preserving subsequence of the input keeping
/// the first and last point; raising the tolerance never increases the
/// output count. Sequences of two or fewer points are returned unchanged, as
/// is any input when `tolerance` is negative (invalid, noted at debug level).
#[must_use]
pub fn simplify(points: &[Point], tolerance: f32) -> Vec<Point> {
    if tolerance < 0.0 {
        log::debug!("negative simplification tolerance {tolerance}, keeping all points");
        return points.to_vec();
    }
    if points.len() <= 2 {
        return points.to_vec();
    }

    let mut keep = vec![false; points.len()];
    keep[0] = true;
    keep[points.len() - 1] = true;
    mark_kept(points, 0, points.len() - 1, tolerance, &mut keep);

    points
        .iter()
        .zip(&keep)
        .filter_map(|(p, keep)| keep.then_some(*p))
        .collect()
}

/// Mark the points to keep between `lo` and `hi` (both already kept).
fn mark_kept(points: &[Point], lo: usize, hi: usize, tolerance: f32, keep: &mut [bool]) {
    if hi - lo < 2 {
        return;
    }

    let mut farthest = lo + 1;
    let mut max_dist = 0.0f32;
    for i in lo + 1..hi {
        let dist = perpendicular_distance(&points[i], &points[lo], &points[hi]);
        if dist > max_dist {
            max_dist = dist;
            farthest = i;
        }
    }

    // Whole range within tolerance: collapse to the chord endpoints.
    if max_dist < tolerance {
        return;
    }

    keep[farthest] = true;
    mark_kept(points, lo, farthest, tolerance, keep);
    mark_kept(points, farthest, hi, tolerance, keep);
}
