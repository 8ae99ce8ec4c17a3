//! Polygon triangulation for OBJ faces
//!
//! Triangles pass through, quads are split along the 1-3 diagonal, and larger
//! polygons go through ear clipping. Corners are tracked by their position in
//! the face, so duplicate positions inside one face cannot be confused.

use crate::foundation::math::Vec3;

/// Relative tolerance; every comparison is normalized so it holds at any model scale
const EPSILON: f32 = 1e-6;

/// Triangulate one face, returning indices local to `positions`
///
/// Fewer than three corners produce nothing. A degenerate polygon (zero area, or
/// no clippable ear) stops early and keeps whatever triangles were emitted.
pub fn triangulate(positions: &[Vec3]) -> Vec<u32> {
    match positions.len() {
        0..=2 => Vec::new(),
        3 => vec![0, 1, 2],
        4 => vec![0, 1, 3, 1, 2, 3],
        _ => clip_ears(positions),
    }
}

/// Newell normal of a (possibly non-planar) polygon
fn polygon_normal(positions: &[Vec3]) -> Vec3 {
    let mut normal = Vec3::zeros();
    for (i, current) in positions.iter().enumerate() {
        let next = &positions[(i + 1) % positions.len()];
        normal.x += (current.y - next.y) * (current.z + next.z);
        normal.y += (current.z - next.z) * (current.x + next.x);
        normal.z += (current.x - next.x) * (current.y + next.y);
    }
    normal
}

/// `normal` must be unit length; the turn is compared as a sine of the corner angle
fn is_convex(prev: &Vec3, cur: &Vec3, next: &Vec3, normal: &Vec3) -> bool {
    let incoming = cur - prev;
    let outgoing = next - cur;
    incoming.cross(&outgoing).dot(normal) > EPSILON * incoming.norm() * outgoing.norm()
}

/// Barycentric test; points on the triangle boundary are outside
fn strictly_inside(point: &Vec3, a: &Vec3, b: &Vec3, c: &Vec3) -> bool {
    let v0 = c - a;
    let v1 = b - a;
    let v2 = point - a;

    let dot00 = v0.dot(&v0);
    let dot01 = v0.dot(&v1);
    let dot02 = v0.dot(&v2);
    let dot11 = v1.dot(&v1);
    let dot12 = v1.dot(&v2);

    let denom = dot00 * dot11 - dot01 * dot01;
    if denom.abs() <= EPSILON * dot00 * dot11 {
        return false;
    }
    let u = (dot11 * dot02 - dot01 * dot12) / denom;
    let v = (dot00 * dot12 - dot01 * dot02) / denom;
    u > EPSILON && v > EPSILON && u + v < 1.0 - EPSILON
}

fn clip_ears(positions: &[Vec3]) -> Vec<u32> {
    let normal = polygon_normal(positions);
    let perimeter_sq: f32 = positions
        .iter()
        .zip(positions.iter().cycle().skip(1))
        .map(|(a, b)| (b - a).norm_squared())
        .sum();
    if normal.norm() <= EPSILON * perimeter_sq {
        log::debug!("Skipping degenerate {}-gon", positions.len());
        return Vec::new();
    }

    let normal = normal.normalize();

    let mut remaining: Vec<usize> = (0..positions.len()).collect();
    let mut indices = Vec::with_capacity((positions.len() - 2) * 3);

    while remaining.len() > 3 {
        let count = remaining.len();
        let ear = (0..count).find(|&i| {
            let prev = remaining[(i + count - 1) % count];
            let cur = remaining[i];
            let next = remaining[(i + 1) % count];

            if !is_convex(&positions[prev], &positions[cur], &positions[next], &normal) {
                return false;
            }

            !remaining.iter().any(|&other| {
                other != prev
                    && other != cur
                    && other != next
                    && strictly_inside(&positions[other], &positions[prev], &positions[cur], &positions[next])
            })
        });

        let Some(i) = ear else {
            log::debug!("No ear left with {} corners remaining, stopping", count);
            return indices;
        };

        let prev = remaining[(i + count - 1) % count];
        let next = remaining[(i + 1) % count];
        indices.extend([prev as u32, remaining[i] as u32, next as u32]);
        remaining.remove(i);
    }

    indices.extend(remaining.iter().map(|&i| i as u32));
    indices
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn triangle_area(a: &Vec3, b: &Vec3, c: &Vec3) -> f32 {
        (b - a).cross(&(c - a)).norm() * 0.5
    }

    fn total_area(positions: &[Vec3], indices: &[u32]) -> f32 {
        indices
            .chunks(3)
            .map(|t| triangle_area(&positions[t[0] as usize], &positions[t[1] as usize], &positions[t[2] as usize]))
            .sum()
    }

    fn regular_polygon(n: usize, radius: f32) -> Vec<Vec3> {
        (0..n)
            .map(|i| {
                let angle = i as f32 / n as f32 * std::f32::consts::TAU;
                Vec3::new(radius * angle.cos(), radius * angle.sin(), 0.0)
            })
            .collect()
    }

    #[test]
    fn test_small_faces() {
        let p = regular_polygon(3, 1.0);
        assert!(triangulate(&p[..2]).is_empty());
        assert_eq!(triangulate(&p), vec![0, 1, 2]);
    }

    #[test]
    fn test_quad_split() {
        let quad = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(2.0, 0.0, 0.0),
            Vec3::new(2.0, 1.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        ];
        let indices = triangulate(&quad);
        assert_eq!(indices, vec![0, 1, 3, 1, 2, 3]);
        assert_relative_eq!(total_area(&quad, &indices), 2.0, epsilon = 1e-5);
    }

    #[test]
    fn test_convex_polygons_area_preserved() {
        for n in 5..12 {
            let polygon = regular_polygon(n, 2.0);
            let indices = triangulate(&polygon);
            assert_eq!(indices.len(), (n - 2) * 3, "{}-gon", n);

            let expected = 0.5 * n as f32 * 4.0 * (std::f32::consts::TAU / n as f32).sin();
            assert_relative_eq!(total_area(&polygon, &indices), expected, epsilon = 1e-3);
        }
    }

    #[test]
    fn test_pentagon_at_any_scale() {
        for radius in [1000.0, 1.0, 0.1, 0.01, 0.001] {
            let polygon = regular_polygon(5, radius);
            let indices = triangulate(&polygon);
            assert_eq!(indices.len(), 9, "radius {}", radius);

            let expected = 2.5 * radius * radius * (std::f32::consts::TAU / 5.0).sin();
            assert_relative_eq!(total_area(&polygon, &indices), expected, max_relative = 1e-3);
        }
    }

    #[test]
    fn test_concave_polygon() {
        // Arrow head with a reflex corner at index 3
        let polygon = vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(4.0, 0.0, 0.0),
            Vec3::new(4.0, 4.0, 0.0),
            Vec3::new(2.0, 1.0, 0.0),
            Vec3::new(0.0, 4.0, 0.0),
        ];
        let indices = triangulate(&polygon);
        assert_eq!(indices.len(), 9);
        // 4x4 square minus the notch (0,4)-(2,1)-(4,4)
        assert_relative_eq!(total_area(&polygon, &indices), 10.0, epsilon = 1e-4);
        // The reflex corner is never the tip of a clipped ear
        for tri in indices.chunks(3).take(2) {
            assert_ne!(tri[1], 3);
        }
    }

    #[test]
    fn test_degenerate_polygon() {
        let line: Vec<Vec3> = (0..5).map(|i| Vec3::new(i as f32, 0.0, 0.0)).collect();
        assert!(triangulate(&line).is_empty());
    }
}
