//! Minimal CPU triangle rasterizer.
//!
//! Pixel-space coordinates, top-left origin, samples at pixel centers.
//! Accepts both windings; shared edges may shade twice.

pub(crate) struct Vertex {
    pub x: f32,
    pub y: f32,
    pub u: f32,
    pub v: f32,
}

fn edge(ax: f32, ay: f32, bx: f32, by: f32, px: f32, py: f32) -> f32 {
    (bx - ax) * (py - ay) - (by - ay) * (px - ax)
}

/// Shades every covered pixel of `tri`, passing interpolated texture
/// coordinates to `shade`. Degenerate triangles cover nothing.
pub(crate) fn fill_triangle<F>(width: u32, height: u32, tri: &[Vertex; 3], mut shade: F)
where
    F: FnMut(u32, u32, f32, f32),
{
    let [a, b, c] = tri;
    let area = edge(a.x, a.y, b.x, b.y, c.x, c.y);
    if area == 0.0 {
        return;
    }

    let min_x = a.x.min(b.x).min(c.x).floor().max(0.0) as u32;
    let min_y = a.y.min(b.y).min(c.y).floor().max(0.0) as u32;
    let max_x = (a.x.max(b.x).max(c.x).ceil() as u32).min(width);
    let max_y = (a.y.max(b.y).max(c.y).ceil() as u32).min(height);

    for py in min_y..max_y {
        for px in min_x..max_x {
            let cx = px as f32 + 0.5;
            let cy = py as f32 + 0.5;

            // dividing by the signed area normalizes either winding
            let w0 = edge(b.x, b.y, c.x, c.y, cx, cy) / area;
            let w1 = edge(c.x, c.y, a.x, a.y, cx, cy) / area;
            let w2 = edge(a.x, a.y, b.x, b.y, cx, cy) / area;
            if w0 < 0.0 || w1 < 0.0 || w2 < 0.0 {
                continue;
            }

            let u = w0 * a.u + w1 * b.u + w2 * c.u;
            let v = w0 * a.v + w1 * b.v + w2 * c.v;
            shade(px, py, u, v);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coverage(width: u32, height: u32, tri: &[Vertex; 3]) -> Vec<(u32, u32)> {
        let mut hits = Vec::new();
        fill_triangle(width, height, tri, |x, y, _, _| hits.push((x, y)));
        hits
    }

    #[test]
    fn covers_half_the_frame() {
        // lower-left half of a 4x4 frame
        let tri = [
            Vertex { x: 0.0, y: 0.0, u: 0.0, v: 0.0 },
            Vertex { x: 0.0, y: 4.0, u: 0.0, v: 1.0 },
            Vertex { x: 4.0, y: 4.0, u: 1.0, v: 1.0 },
        ];
        let hits = coverage(4, 4, &tri);
        // centers on the hypotenuse are covered, so 4+3+2+1
        assert_eq!(hits.len(), 10);
        assert!(hits.contains(&(0, 0)));
        assert!(hits.contains(&(2, 3)));
        assert!(!hits.contains(&(3, 0)));
    }

    #[test]
    fn winding_does_not_matter() {
        let cw = [
            Vertex { x: 0.0, y: 0.0, u: 0.0, v: 0.0 },
            Vertex { x: 4.0, y: 4.0, u: 1.0, v: 1.0 },
            Vertex { x: 0.0, y: 4.0, u: 0.0, v: 1.0 },
        ];
        let ccw = [
            Vertex { x: 0.0, y: 0.0, u: 0.0, v: 0.0 },
            Vertex { x: 0.0, y: 4.0, u: 0.0, v: 1.0 },
            Vertex { x: 4.0, y: 4.0, u: 1.0, v: 1.0 },
        ];
        let mut a = coverage(4, 4, &cw);
        let mut b = coverage(4, 4, &ccw);
        a.sort_unstable();
        b.sort_unstable();
        assert_eq!(a, b);
    }

    #[test]
    fn degenerate_triangle_covers_nothing() {
        let tri = [
            Vertex { x: 1.0, y: 1.0, u: 0.0, v: 0.0 },
            Vertex { x: 3.0, y: 3.0, u: 1.0, v: 1.0 },
            Vertex { x: 2.0, y: 2.0, u: 0.5, v: 0.5 },
        ];
        assert!(coverage(4, 4, &tri).is_empty());
    }

    #[test]
    fn interpolates_texture_coordinates() {
        // right triangle whose uv equals pixel-center position over 2
        let tri = [
            Vertex { x: 0.0, y: 0.0, u: 0.0, v: 0.0 },
            Vertex { x: 2.0, y: 0.0, u: 1.0, v: 0.0 },
            Vertex { x: 0.0, y: 2.0, u: 0.0, v: 1.0 },
        ];
        let mut sampled = None;
        fill_triangle(2, 2, &tri, |x, y, u, v| {
            if (x, y) == (0, 0) {
                sampled = Some((u, v));
            }
        });
        let (u, v) = sampled.unwrap();
        assert!((u - 0.25).abs() < 1e-6);
        assert!((v - 0.25).abs() < 1e-6);
    }

    #[test]
    fn clips_to_frame_bounds() {
        let tri = [
            Vertex { x: -4.0, y: -4.0, u: 0.0, v: 0.0 },
            Vertex { x: 8.0, y: -4.0, u: 1.0, v: 0.0 },
            Vertex { x: 2.0, y: 8.0, u: 0.5, v: 1.0 },
        ];
        for (x, y) in coverage(4, 4, &tri) {
            assert!(x < 4 && y < 4);
        }
    }
}
