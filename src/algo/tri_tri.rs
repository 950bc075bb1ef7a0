//! Exact triangle-triangle intersection testing.
//!
//! Separating-axis test after Möller's interval method: two non-coplanar
//! triangles intersect iff each straddles the other's supporting plane and
//! their crossing intervals along the common plane-intersection line
//! overlap. The overlap interval is returned as the intersection segment.
//!
//! Coplanar pairs are detected and reported with a flag; the overlap region
//! is not resolved into a polygon (callers treat any reported hit, coplanar
//! or not, as an intersection). Degenerate (zero-area) triangles may report
//! false negatives; this is accepted behavior.

use nalgebra::{Point3, Vector3};

/// Tolerance for "on the plane" classification, in mesh length units.
const PLANE_EPS: f64 = 1e-12;

/// Result of a triangle-triangle intersection test.
#[derive(Debug, Clone, Copy)]
pub struct TriTriIntersection {
    /// True if the triangles lie in a common plane. The segment endpoints
    /// are then only a witness point, not an overlap description.
    pub coplanar: bool,

    /// Start of the intersection segment.
    pub start: Point3<f64>,

    /// End of the intersection segment.
    pub end: Point3<f64>,
}

/// Test two triangles for intersection.
///
/// Returns `None` if the triangles are disjoint, otherwise the intersection
/// segment and a coplanarity flag. The test is symmetric: swapping the
/// arguments never changes whether a hit is reported.
pub fn tri_tri_intersection(
    t1: &[Point3<f64>; 3],
    t2: &[Point3<f64>; 3],
) -> Option<TriTriIntersection> {
    // Signed distances of t1's vertices to t2's plane and vice versa.
    let n2 = unit_normal(t2)?;
    let d1 = [
        (t1[0] - t2[0]).dot(&n2),
        (t1[1] - t2[0]).dot(&n2),
        (t1[2] - t2[0]).dot(&n2),
    ];
    if same_strict_side(&d1) {
        return None;
    }

    let n1 = unit_normal(t1)?;
    let d2 = [
        (t2[0] - t1[0]).dot(&n1),
        (t2[1] - t1[0]).dot(&n1),
        (t2[2] - t1[0]).dot(&n1),
    ];
    if same_strict_side(&d2) {
        return None;
    }

    // All of t1 on t2's plane: coplanar pair.
    if d1.iter().all(|d| d.abs() <= PLANE_EPS) {
        return coplanar_overlap(t1, t2, &n2).then_some(TriTriIntersection {
            coplanar: true,
            start: t1[0],
            end: t1[0],
        });
    }

    // Both triangles cross the intersection line of the two planes.
    let dir = n1.cross(&n2);
    let (a_min, a_max) = crossing_interval(t1, &d1, &dir)?;
    let (b_min, b_max) = crossing_interval(t2, &d2, &dir)?;

    // Overlap of the two parameter intervals.
    let (start_t, start_p) = if a_min.0 >= b_min.0 { a_min } else { b_min };
    let (end_t, end_p) = if a_max.0 <= b_max.0 { a_max } else { b_max };
    if start_t > end_t + PLANE_EPS {
        return None;
    }

    Some(TriTriIntersection {
        coplanar: false,
        start: start_p,
        end: end_p,
    })
}

fn unit_normal(t: &[Point3<f64>; 3]) -> Option<Vector3<f64>> {
    let n = (t[1] - t[0]).cross(&(t[2] - t[0]));
    let len = n.norm();
    // Zero-area triangles cannot report a reliable result.
    (len > 1e-20).then(|| n / len)
}

fn same_strict_side(d: &[f64; 3]) -> bool {
    d.iter().all(|&x| x > PLANE_EPS) || d.iter().all(|&x| x < -PLANE_EPS)
}

type TimedPoint = (f64, Point3<f64>);

/// The interval along `dir` where a triangle crosses the other plane.
///
/// `d` holds the triangle's signed plane distances. Crossing points come
/// from vertices lying on the plane and from edges whose endpoints straddle
/// it; the extremes of their `dir`-parameters bound the interval.
fn crossing_interval(
    t: &[Point3<f64>; 3],
    d: &[f64; 3],
    dir: &Vector3<f64>,
) -> Option<(TimedPoint, TimedPoint)> {
    let mut points: Vec<TimedPoint> = Vec::with_capacity(4);

    for i in 0..3 {
        if d[i].abs() <= PLANE_EPS {
            points.push((t[i].coords.dot(dir), t[i]));
        }
        let j = (i + 1) % 3;
        if (d[i] > PLANE_EPS && d[j] < -PLANE_EPS) || (d[i] < -PLANE_EPS && d[j] > PLANE_EPS) {
            let s = d[i] / (d[i] - d[j]);
            let p = t[i] + s * (t[j] - t[i]);
            points.push((p.coords.dot(dir), p));
        }
    }

    let first = *points.first()?;
    let (mut min, mut max) = (first, first);
    for &tp in &points[1..] {
        if tp.0 < min.0 {
            min = tp;
        }
        if tp.0 > max.0 {
            max = tp;
        }
    }
    Some((min, max))
}

/// 2D separating-axis overlap test for coplanar triangles.
fn coplanar_overlap(t1: &[Point3<f64>; 3], t2: &[Point3<f64>; 3], n: &Vector3<f64>) -> bool {
    // Project onto the plane's two dominant axes.
    let (ax, ay) = dominant_axes(n);
    let a: Vec<(f64, f64)> = t1.iter().map(|p| (p[ax], p[ay])).collect();
    let b: Vec<(f64, f64)> = t2.iter().map(|p| (p[ax], p[ay])).collect();

    // Separating axis among the edge normals of both triangles.
    for tri in [&a, &b] {
        for i in 0..3 {
            let (x0, y0) = tri[i];
            let (x1, y1) = tri[(i + 1) % 3];
            let axis = (y0 - y1, x1 - x0);

            let project = |pts: &[(f64, f64)]| {
                let vals = pts.iter().map(|&(x, y)| x * axis.0 + y * axis.1);
                let mut min = f64::INFINITY;
                let mut max = f64::NEG_INFINITY;
                for v in vals {
                    min = min.min(v);
                    max = max.max(v);
                }
                (min, max)
            };

            let (amin, amax) = project(&a);
            let (bmin, bmax) = project(&b);
            if amax < bmin - PLANE_EPS || bmax < amin - PLANE_EPS {
                return false;
            }
        }
    }
    true
}

fn dominant_axes(n: &Vector3<f64>) -> (usize, usize) {
    let abs = n.abs();
    if abs.x >= abs.y && abs.x >= abs.z {
        (1, 2)
    } else if abs.y >= abs.z {
        (0, 2)
    } else {
        (0, 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tri(
        a: (f64, f64, f64),
        b: (f64, f64, f64),
        c: (f64, f64, f64),
    ) -> [Point3<f64>; 3] {
        [
            Point3::new(a.0, a.1, a.2),
            Point3::new(b.0, b.1, b.2),
            Point3::new(c.0, c.1, c.2),
        ]
    }

    #[test]
    fn test_disjoint_triangles() {
        let t1 = tri((0.0, 0.0, 0.0), (1.0, 0.0, 0.0), (0.0, 1.0, 0.0));
        let t2 = tri((0.0, 0.0, 5.0), (1.0, 0.0, 5.0), (0.0, 1.0, 5.0));
        assert!(tri_tri_intersection(&t1, &t2).is_none());
    }

    #[test]
    fn test_crossing_triangles() {
        // t2 pierces t1's interior vertically.
        let t1 = tri((0.0, 0.0, 0.0), (2.0, 0.0, 0.0), (0.0, 2.0, 0.0));
        let t2 = tri((0.5, 0.5, -1.0), (0.5, 0.5, 1.0), (0.5, 1.5, 1.0));

        let hit = tri_tri_intersection(&t1, &t2).expect("must intersect");
        assert!(!hit.coplanar);

        // Both segment endpoints lie in t1's plane (z = 0).
        assert!(hit.start.z.abs() < 1e-9);
        assert!(hit.end.z.abs() < 1e-9);
        // And the segment is non-degenerate.
        assert!((hit.end - hit.start).norm() > 1e-9);
    }

    #[test]
    fn test_symmetry_under_swap() {
        let t1 = tri((0.0, 0.0, 0.0), (2.0, 0.0, 0.0), (0.0, 2.0, 0.0));
        let t2 = tri((0.5, 0.5, -1.0), (0.5, 0.5, 1.0), (0.5, 1.5, 1.0));
        let t3 = tri((5.0, 5.0, 5.0), (6.0, 5.0, 5.0), (5.0, 6.0, 5.0));

        assert_eq!(
            tri_tri_intersection(&t1, &t2).is_some(),
            tri_tri_intersection(&t2, &t1).is_some()
        );
        assert_eq!(
            tri_tri_intersection(&t1, &t3).is_some(),
            tri_tri_intersection(&t3, &t1).is_some()
        );
    }

    #[test]
    fn test_coplanar_overlapping() {
        let t1 = tri((0.0, 0.0, 0.0), (2.0, 0.0, 0.0), (0.0, 2.0, 0.0));
        let t2 = tri((0.5, 0.5, 0.0), (2.5, 0.5, 0.0), (0.5, 2.5, 0.0));

        let hit = tri_tri_intersection(&t1, &t2).expect("coplanar overlap is a hit");
        assert!(hit.coplanar);
    }

    #[test]
    fn test_coplanar_disjoint() {
        let t1 = tri((0.0, 0.0, 0.0), (1.0, 0.0, 0.0), (0.0, 1.0, 0.0));
        let t2 = tri((5.0, 5.0, 0.0), (6.0, 5.0, 0.0), (5.0, 6.0, 0.0));
        assert!(tri_tri_intersection(&t1, &t2).is_none());
    }

    #[test]
    fn test_touching_at_vertex() {
        // t2 touches t1's plane exactly at one vertex inside t1.
        let t1 = tri((0.0, 0.0, 0.0), (2.0, 0.0, 0.0), (0.0, 2.0, 0.0));
        let t2 = tri((0.5, 0.5, 0.0), (1.0, 0.5, 1.0), (0.5, 1.0, 1.0));

        let hit = tri_tri_intersection(&t1, &t2).expect("vertex contact is a hit");
        assert!((hit.end - hit.start).norm() < 1e-9);
    }

    #[test]
    fn test_degenerate_triangle_reports_no_hit() {
        // Zero-area triangle: accepted false negative.
        let t1 = tri((0.0, 0.0, 0.0), (1.0, 0.0, 0.0), (2.0, 0.0, 0.0));
        let t2 = tri((0.5, -1.0, -1.0), (0.5, 1.0, -1.0), (0.5, 0.0, 1.0));
        assert!(tri_tri_intersection(&t1, &t2).is_none());
    }

    #[test]
    fn test_segment_lies_on_both_planes() {
        let t1 = tri((-1.0, -1.0, 0.0), (3.0, -1.0, 0.0), (0.0, 3.0, 0.0));
        let t2 = tri((0.0, 0.5, -1.0), (2.0, 0.5, -1.0), (1.0, 0.5, 2.0));

        let hit = tri_tri_intersection(&t1, &t2).unwrap();
        for p in [hit.start, hit.end] {
            assert!(p.z.abs() < 1e-9, "on t1's plane");
            assert!((p.y - 0.5).abs() < 1e-9, "on t2's plane");
        }
    }
}
