//! CPU implementation of the picking target.
//!
//! [`SoftwarePickingBuffer`] rasterizes triangles the same way the GPU picking
//! pipeline does: clip space → perspective divide → viewport, with pixel-center
//! sampling, back-face culling (counter-clockwise front faces) and a
//! less-or-equal depth test over the `[0, 1]` depth range.
//!
//! Rows are stored bottom-up, so `pick(x, y)` indexes the buffer directly with
//! the bottom-left-origin coordinates of [`PickingTarget`].

use glam::{Mat4, Vec2, Vec3, Vec4};

use super::{PickId, PickingTarget, clamp_to_target};
use crate::geometry::RawGeometry;

/// Vertices this close to (or behind) the eye plane discard the whole triangle.
const W_EPSILON: f32 = 1e-6;

/// A picking target held in CPU memory.
///
/// # Example
///
/// ```
/// use scenepick::{Mat4, PickId, PickingTarget, RawGeometry, SoftwarePickingBuffer};
///
/// let mut buffer = SoftwarePickingBuffer::new(64, 64);
/// let id = PickId::new(7).unwrap();
///
/// // A unit plane rotated to face +Z, scaled to fill clip space.
/// let quad = RawGeometry::plane(2.0);
/// let mvp = Mat4::from_translation(scenepick::Vec3::new(0.0, 0.0, 0.5))
///     * Mat4::from_rotation_x(std::f32::consts::FRAC_PI_2);
/// buffer.draw_geometry(&quad, mvp, id);
///
/// assert_eq!(buffer.pick(32, 32), Some(id));
/// ```
#[derive(Debug)]
pub struct SoftwarePickingBuffer {
    width: u32,
    height: u32,
    ids: Vec<u32>,
    depth: Vec<f32>,
    finalized: bool,
}

impl SoftwarePickingBuffer {
    /// Allocates a cleared target. Zero dimensions are raised to 1.
    pub fn new(width: u32, height: u32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let len = width as usize * height as usize;
        Self {
            width,
            height,
            ids: vec![0; len],
            depth: vec![1.0; len],
            finalized: false,
        }
    }

    /// Resets every pixel to background and depth to 1.0.
    pub fn clear(&mut self) {
        self.ids.fill(0);
        self.depth.fill(1.0);
    }

    /// Rasterizes every triangle of `geometry` transformed by `mvp`.
    ///
    /// `mvp` maps model-space positions to clip space (projection * view * model).
    pub fn draw_geometry(&mut self, geometry: &RawGeometry, mvp: Mat4, id: PickId) {
        let clip = |i: u32| {
            let v = geometry.vertices.get(i as usize)?;
            Some(mvp * Vec3::from(v.position).extend(1.0))
        };
        for tri in geometry.indices.chunks_exact(3) {
            // Indices past the vertex list draw nothing, as on the GPU.
            if let (Some(a), Some(b), Some(c)) = (clip(tri[0]), clip(tri[1]), clip(tri[2])) {
                self.draw_triangle([a, b, c], id);
            }
        }
    }

    /// Rasterizes a single clip-space triangle.
    pub fn draw_triangle(&mut self, clip: [Vec4; 3], id: PickId) {
        if self.finalized || clip.iter().any(|v| v.w <= W_EPSILON) {
            return;
        }

        let (w, h) = (self.width as f32, self.height as f32);
        let screen = clip.map(|v| {
            let ndc = v.truncate() / v.w;
            Vec3::new((ndc.x * 0.5 + 0.5) * w, (ndc.y * 0.5 + 0.5) * h, ndc.z)
        });
        let [s0, s1, s2] = screen;

        let area = edge(s0.truncate(), s1.truncate(), s2.truncate());
        if area <= 0.0 {
            // Back-facing or degenerate.
            return;
        }

        let min = s0.min(s1).min(s2);
        let max = s0.max(s1).max(s2);
        let x0 = min.x.floor().clamp(0.0, w) as u32;
        let x1 = max.x.ceil().clamp(0.0, w) as u32;
        let y0 = min.y.floor().clamp(0.0, h) as u32;
        let y1 = max.y.ceil().clamp(0.0, h) as u32;

        for py in y0..y1 {
            for px in x0..x1 {
                let p = Vec2::new(px as f32 + 0.5, py as f32 + 0.5);
                let b0 = edge(s1.truncate(), s2.truncate(), p);
                let b1 = edge(s2.truncate(), s0.truncate(), p);
                let b2 = edge(s0.truncate(), s1.truncate(), p);
                if b0 < 0.0 || b1 < 0.0 || b2 < 0.0 {
                    continue;
                }

                let depth = (b0 * s0.z + b1 * s1.z + b2 * s2.z) / area;
                if !(0.0..=1.0).contains(&depth) {
                    continue;
                }

                let index = pixel_index(px, py, self.width);
                if depth <= self.depth[index] {
                    self.depth[index] = depth;
                    self.ids[index] = id.get();
                }
            }
        }
    }

    /// Depth stored at `(x, y)`, or `None` outside the target.
    pub fn depth_at(&self, x: u32, y: u32) -> Option<f32> {
        if x >= self.width || y >= self.height || self.finalized {
            return None;
        }
        Some(self.depth[pixel_index(x, y, self.width)])
    }
}

/// Row-major offset of `(x, y)`, computed in `usize` so large targets do not
/// overflow.
fn pixel_index(x: u32, y: u32, width: u32) -> usize {
    y as usize * width as usize + x as usize
}

/// Twice the signed area of `(a, b, p)`; positive when counter-clockwise.
fn edge(a: Vec2, b: Vec2, p: Vec2) -> f32 {
    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x)
}

impl PickingTarget for SoftwarePickingBuffer {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Reallocates the buffer. This also revives a finalized buffer.
    fn resize(&mut self, width: u32, height: u32) {
        *self = Self::new(width, height);
    }

    fn pick(&self, x: u32, y: u32) -> Option<PickId> {
        if self.finalized {
            return None;
        }
        let (x, y) = clamp_to_target(x, y, self.width, self.height)?;
        PickId::new(self.ids[pixel_index(x, y, self.width)])
    }

    fn finalize(&mut self) {
        if self.finalized {
            return;
        }
        self.ids = Vec::new();
        self.depth = Vec::new();
        self.finalized = true;
    }

    fn is_finalized(&self) -> bool {
        self.finalized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: u32) -> PickId {
        PickId::new(raw).unwrap()
    }

    /// Counter-clockwise quad over the clip-space rectangle `[x0, x1] × [y0, y1]`.
    fn quad(buffer: &mut SoftwarePickingBuffer, x0: f32, y0: f32, x1: f32, y1: f32, z: f32, pick: PickId) {
        let a = Vec4::new(x0, y0, z, 1.0);
        let b = Vec4::new(x1, y0, z, 1.0);
        let c = Vec4::new(x1, y1, z, 1.0);
        let d = Vec4::new(x0, y1, z, 1.0);
        buffer.draw_triangle([a, b, c], pick);
        buffer.draw_triangle([a, c, d], pick);
    }

    #[test]
    fn uncovered_pixels_pick_nothing() {
        let mut buffer = SoftwarePickingBuffer::new(16, 16);
        quad(&mut buffer, -1.0, -1.0, 0.0, 0.0, 0.5, id(3));

        assert_eq!(buffer.pick(4, 4), Some(id(3)));
        assert_eq!(buffer.pick(12, 12), None);
        assert_eq!(buffer.pick(12, 4), None);
    }

    #[test]
    fn y_axis_points_up() {
        let mut buffer = SoftwarePickingBuffer::new(8, 8);
        // Top half of clip space.
        quad(&mut buffer, -1.0, 0.0, 1.0, 1.0, 0.5, id(1));

        assert_eq!(buffer.pick(3, 7), Some(id(1)));
        assert_eq!(buffer.pick(3, 0), None);
    }

    #[test]
    fn every_byte_sized_id_reads_back() {
        let mut buffer = SoftwarePickingBuffer::new(4, 4);
        for raw in 1..=255 {
            buffer.clear();
            quad(&mut buffer, -1.0, -1.0, 1.0, 1.0, 0.5, id(raw));
            assert_eq!(buffer.pick(2, 2), Some(id(raw)));
        }
    }

    #[test]
    fn nearer_triangle_wins() {
        let mut buffer = SoftwarePickingBuffer::new(8, 8);
        quad(&mut buffer, -1.0, -1.0, 1.0, 1.0, 0.2, id(1));
        quad(&mut buffer, -1.0, -1.0, 1.0, 1.0, 0.8, id(2));
        assert_eq!(buffer.pick(4, 4), Some(id(1)));

        buffer.clear();
        quad(&mut buffer, -1.0, -1.0, 1.0, 1.0, 0.8, id(2));
        quad(&mut buffer, -1.0, -1.0, 1.0, 1.0, 0.2, id(1));
        assert_eq!(buffer.pick(4, 4), Some(id(1)));
        assert!((buffer.depth_at(4, 4).unwrap() - 0.2).abs() < 1e-6);
    }

    #[test]
    fn back_faces_are_culled() {
        let mut buffer = SoftwarePickingBuffer::new(8, 8);
        let a = Vec4::new(-1.0, -1.0, 0.5, 1.0);
        let b = Vec4::new(1.0, -1.0, 0.5, 1.0);
        let c = Vec4::new(1.0, 1.0, 0.5, 1.0);
        buffer.draw_triangle([a, c, b], id(9));

        assert_eq!(buffer.pick(6, 1), None);
    }

    #[test]
    fn geometry_outside_depth_range_is_discarded() {
        let mut buffer = SoftwarePickingBuffer::new(8, 8);
        quad(&mut buffer, -1.0, -1.0, 1.0, 1.0, 1.5, id(1));
        quad(&mut buffer, -1.0, -1.0, 1.0, 1.0, -0.5, id(2));

        assert_eq!(buffer.pick(4, 4), None);
    }

    #[test]
    fn triangles_behind_the_eye_are_skipped() {
        let mut buffer = SoftwarePickingBuffer::new(8, 8);
        let behind = Vec4::new(0.0, 0.0, 0.5, -1.0);
        buffer.draw_triangle(
            [Vec4::new(-1.0, -1.0, 0.5, 1.0), Vec4::new(1.0, -1.0, 0.5, 1.0), behind],
            id(1),
        );

        assert!((0..8).all(|y| (0..8).all(|x| buffer.pick(x, y).is_none())));
    }

    #[test]
    fn out_of_bounds_coordinates_clamp() {
        let mut buffer = SoftwarePickingBuffer::new(8, 8);
        quad(&mut buffer, 0.0, 0.0, 1.0, 1.0, 0.5, id(5));

        assert_eq!(buffer.pick(100, 100), Some(id(5)));
        assert_eq!(buffer.pick(100, 0), None);
    }

    #[test]
    fn finalize_twice_is_harmless() {
        let mut buffer = SoftwarePickingBuffer::new(8, 8);
        quad(&mut buffer, -1.0, -1.0, 1.0, 1.0, 0.5, id(1));

        buffer.finalize();
        buffer.finalize();

        assert!(buffer.is_finalized());
        assert_eq!(buffer.pick(4, 4), None);
        quad(&mut buffer, -1.0, -1.0, 1.0, 1.0, 0.5, id(1));
        assert_eq!(buffer.depth_at(4, 4), None);
    }

    #[test]
    fn resize_reallocates_cleared() {
        let mut buffer = SoftwarePickingBuffer::new(8, 8);
        quad(&mut buffer, -1.0, -1.0, 1.0, 1.0, 0.5, id(1));
        buffer.finalize();

        buffer.resize(20, 10);

        assert_eq!(buffer.size(), (20, 10));
        assert!(!buffer.is_finalized());
        assert_eq!(buffer.pick(10, 5), None);
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn pixel_offsets_do_not_overflow_u32() {
        assert_eq!(pixel_index(69_999, 69_999, 70_000), 4_899_999_999);
        assert_eq!(pixel_index(3, 2, 8), 19);
    }

    #[test]
    fn out_of_range_indices_draw_nothing() {
        let mut buffer = SoftwarePickingBuffer::new(8, 8);
        let mut geometry = RawGeometry::plane(2.0);
        geometry.indices = vec![0, 1, 99];
        buffer.draw_geometry(&geometry, Mat4::IDENTITY, id(1));
        assert!((0..8).all(|y| (0..8).all(|x| buffer.pick(x, y).is_none())));
    }
}
