//! Structural path transforms: densification and simplification.
//!
//! Both transforms preserve the endpoints, the lock flag, and the elevation
//! source handle, and neither moves an original point.

use crate::path::{Path, Point};

/// Add interpolated points to reach `target_count` total points.
///
/// Points are apportioned to segments proportionally to segment length using
/// largest-remainder reconciliation, so the output count equals the target
/// exactly. Returns `None` when the target does not exceed the current count
/// or the path has no usable segments.
pub fn resegment(path: &Path, target_count: usize) -> Option<Path> {
    let current = path.len();
    if target_count <= current {
        return None;
    }

    let segments = path.segments();
    if segments.is_empty() {
        return None;
    }

    let total_length: f64 = segments.iter().map(|seg| seg.distance).sum();
    if !(total_length > 0.0) {
        return None;
    }

    let to_add = target_count - current;
    let shares: Vec<f64> = segments
        .iter()
        .map(|seg| seg.distance / total_length * to_add as f64)
        .collect();

    let mut allocation: Vec<i64> = shares.iter().map(|share| share.round() as i64).collect();
    let mut remainder = to_add as i64 - allocation.iter().sum::<i64>();

    // Reconcile rounding drift against the fractional remainders so the total
    // matches exactly: under-allocation tops up the largest remainders,
    // over-allocation drains the smallest.
    if remainder != 0 {
        let fractions: Vec<f64> = shares.iter().map(|share| share - share.floor()).collect();
        let mut order: Vec<usize> = (0..shares.len()).collect();
        if remainder > 0 {
            order.sort_by(|&a, &b| fractions[b].total_cmp(&fractions[a]));
            let mut cursor = 0;
            while remainder > 0 {
                allocation[order[cursor % order.len()]] += 1;
                remainder -= 1;
                cursor += 1;
            }
        } else {
            order.sort_by(|&a, &b| fractions[a].total_cmp(&fractions[b]));
            let mut cursor = 0;
            while remainder < 0 {
                let idx = order[cursor % order.len()];
                if allocation[idx] > 0 {
                    allocation[idx] -= 1;
                    remainder += 1;
                }
                cursor += 1;
            }
        }
    }

    let points = path.points();
    let mut resegmented: Vec<Point> = Vec::with_capacity(target_count);
    for (seg_idx, &count) in allocation.iter().enumerate() {
        let p1 = points[seg_idx];
        let p2 = points[seg_idx + 1];
        resegmented.push(p1);
        for i in 1..=count {
            let t = i as f64 / (count + 1) as f64;
            resegmented.push(Point::new(
                p1.x + t * (p2.x - p1.x),
                p1.y + t * (p2.y - p1.y),
                p1.z + t * (p2.z - p1.z),
            ));
        }
    }
    resegmented.push(points[points.len() - 1]);

    Some(Path::from_points(
        path.source().cloned(),
        resegmented,
        path.locked,
    ))
}

/// Remove near-collinear interior points.
///
/// Each interior point is judged once against the original point list: the
/// incoming and outgoing displacement vectors are normalized and the point is
/// dropped when the magnitude of their cross product is within `tolerance`.
/// Vectors shorter than the tolerance keep the point (degenerate geometry).
/// The first and last point are always retained.
pub fn simplify(path: &Path, tolerance: f64) -> Path {
    let points = path.points();
    if points.len() <= 2 {
        return path.clone();
    }

    let mut kept: Vec<Point> = Vec::with_capacity(points.len());
    kept.push(points[0]);

    for i in 1..points.len() - 1 {
        let prev = points[i - 1];
        let curr = points[i];
        let next = points[i + 1];

        let v1 = (curr.x - prev.x, curr.y - prev.y, curr.z - prev.z);
        let v2 = (next.x - curr.x, next.y - curr.y, next.z - curr.z);
        let len1 = (v1.0 * v1.0 + v1.1 * v1.1 + v1.2 * v1.2).sqrt();
        let len2 = (v2.0 * v2.0 + v2.1 * v2.1 + v2.2 * v2.2).sqrt();

        if len1 < tolerance || len2 < tolerance {
            kept.push(curr);
            continue;
        }

        let u1 = (v1.0 / len1, v1.1 / len1, v1.2 / len1);
        let u2 = (v2.0 / len2, v2.1 / len2, v2.2 / len2);
        let cross = (
            u1.1 * u2.2 - u1.2 * u2.1,
            u1.2 * u2.0 - u1.0 * u2.2,
            u1.0 * u2.1 - u1.1 * u2.0,
        );
        let cross_magnitude =
            (cross.0 * cross.0 + cross.1 * cross.1 + cross.2 * cross.2).sqrt();

        if cross_magnitude > tolerance {
            kept.push(curr);
        }
    }

    kept.push(points[points.len() - 1]);
    Path::from_points(path.source().cloned(), kept, path.locked)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path_from(coords: &[(f64, f64, f64)]) -> Path {
        let mut path = Path::new();
        for &(x, y, z) in coords {
            path.add_point_with_z(x, y, z);
        }
        path
    }

    #[test]
    fn resegment_hits_target_exactly_and_preserves_originals() {
        let original = path_from(&[(0.0, 0.0, 0.0), (100.0, 0.0, 0.0), (100.0, 50.0, 0.0)]);
        let result = resegment(&original, 12).expect("target above current count");

        assert_eq!(result.len(), 12);
        for point in original.points() {
            assert!(
                result.points().iter().any(|p| p == point),
                "original point {point:?} missing from resegmented path"
            );
        }
        assert_eq!(result.points()[0], original.points()[0]);
        assert_eq!(result.points()[11], original.points()[2]);
    }

    #[test]
    fn resegment_allocates_proportionally_to_length() {
        // 90-unit segment vs 10-unit segment: the long one gets the points.
        let original = path_from(&[(0.0, 0.0, 0.0), (90.0, 0.0, 0.0), (100.0, 0.0, 0.0)]);
        let result = resegment(&original, 13).unwrap();

        let long_side = result
            .points()
            .iter()
            .filter(|p| p.x < 90.0 && p.x > 0.0)
            .count();
        let short_side = result
            .points()
            .iter()
            .filter(|p| p.x > 90.0 && p.x < 100.0)
            .count();
        assert_eq!(long_side + short_side, 10);
        assert_eq!(long_side, 9);
        assert_eq!(short_side, 1);
    }

    #[test]
    fn resegment_interpolates_evenly_within_a_segment() {
        let original = path_from(&[(0.0, 0.0, 0.0), (30.0, 0.0, 60.0)]);
        let result = resegment(&original, 4).unwrap();

        let xs: Vec<f64> = result.points().iter().map(|p| p.x).collect();
        let zs: Vec<f64> = result.points().iter().map(|p| p.z).collect();
        assert_eq!(xs, vec![0.0, 10.0, 20.0, 30.0]);
        assert_eq!(zs, vec![0.0, 20.0, 40.0, 60.0]);
    }

    #[test]
    fn resegment_is_noop_at_or_below_current_count() {
        let original = path_from(&[(0.0, 0.0, 0.0), (10.0, 0.0, 0.0), (20.0, 0.0, 0.0)]);
        assert!(resegment(&original, 3).is_none());
        assert!(resegment(&original, 2).is_none());
    }

    #[test]
    fn resegment_carries_lock_flag() {
        let mut original = path_from(&[(0.0, 0.0, 0.0), (10.0, 0.0, 0.0)]);
        original.locked = true;
        let result = resegment(&original, 5).unwrap();
        assert!(result.locked);
        assert_eq!(result.len(), 5);
    }

    #[test]
    fn simplify_removes_exactly_collinear_middle_point() {
        let original = path_from(&[(0.0, 0.0, 0.0), (5.0, 0.0, 0.0), (10.0, 0.0, 0.0)]);
        let result = simplify(&original, 1e-3);

        assert_eq!(result.len(), 2);
        assert_eq!(result.points()[0], original.points()[0]);
        assert_eq!(result.points()[1], original.points()[2]);
    }

    #[test]
    fn simplify_keeps_corner_points() {
        let original = path_from(&[
            (0.0, 0.0, 0.0),
            (10.0, 0.0, 0.0),
            (10.0, 10.0, 0.0),
            (20.0, 10.0, 0.0),
        ]);
        let result = simplify(&original, 1e-3);
        assert_eq!(result.len(), 4);
    }

    #[test]
    fn simplify_always_retains_endpoints() {
        let original = path_from(&[(1.0, 2.0, 3.0), (4.0, 5.0, 6.0)]);
        let result = simplify(&original, 1e-3);
        assert_eq!(result.points(), original.points());

        let collinear = path_from(&[
            (0.0, 0.0, 0.0),
            (1.0, 0.0, 0.0),
            (2.0, 0.0, 0.0),
            (3.0, 0.0, 0.0),
            (4.0, 0.0, 0.0),
        ]);
        let collapsed = simplify(&collinear, 1e-3);
        assert_eq!(collapsed.len(), 2);
        assert_eq!(collapsed.points()[0], collinear.points()[0]);
        assert_eq!(collapsed.points()[1], collinear.points()[4]);
    }

    #[test]
    fn simplify_keeps_points_with_degenerate_vectors() {
        // Repeated point: the zero-length outgoing vector trips the
        // degenerate guard and the point survives.
        let original = path_from(&[(0.0, 0.0, 0.0), (5.0, 0.0, 0.0), (5.0, 0.0, 0.0)]);
        let result = simplify(&original, 1e-3);
        assert_eq!(result.len(), 3);
    }
}
