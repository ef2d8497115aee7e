//! CPU-side 2D canvas.
//!
//! The particle and terrain layers draw immediate-mode shapes in pixel
//! coordinates. [`DrawList`] tessellates those shapes into colored triangles,
//! grouped into batches that share a [`BlendMode`]. The GPU backend uploads
//! the vertices once per frame and issues one draw per batch.
//!
//! Like a browser 2D context the list carries paint state (translation,
//! global alpha, blend mode) with a `save`/`restore` stack. Layers are
//! expected to leave that state as they found it.

use std::ops::Range;

use bytemuck::{Pod, Zeroable};
use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Straight (non-premultiplied) RGBA color, components in `[0, 1]`.
pub type Rgba = [f32; 4];

/// Build a color from 8-bit channels and a float alpha.
#[inline]
pub const fn rgba8(r: u8, g: u8, b: u8, a: f32) -> Rgba {
    [r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0, a]
}

/// Build an opaque color from a `0xRRGGBB` literal.
#[inline]
pub const fn hex(rgb: u32) -> Rgba {
    rgba8((rgb >> 16) as u8, (rgb >> 8) as u8, rgb as u8, 1.0)
}

/// How new shapes combine with what is already drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlendMode {
    /// Source-over alpha blending.
    #[default]
    Normal,
    /// Additive blending.
    Lighter,
}

/// Vertex format shared with the canvas pipeline.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct CanvasVertex {
    /// Position in pixels, origin top-left.
    pub position: [f32; 2],
    pub color: [f32; 4],
}

/// A run of vertices drawn with the same blend mode.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub blend: BlendMode,
    pub vertices: Range<u32>,
}

#[derive(Debug, Clone, Copy)]
struct PaintState {
    translation: Vec2,
    global_alpha: f32,
    blend: BlendMode,
}

impl Default for PaintState {
    fn default() -> Self {
        Self {
            translation: Vec2::ZERO,
            global_alpha: 1.0,
            blend: BlendMode::Normal,
        }
    }
}

/// Immediate-mode triangle list with browser-canvas style paint state.
#[derive(Debug, Default, Clone)]
pub struct DrawList {
    vertices: Vec<CanvasVertex>,
    batches: Vec<Batch>,
    state: PaintState,
    stack: Vec<PaintState>,
}

impl DrawList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop all geometry and reset paint state.
    pub fn clear(&mut self) {
        self.vertices.clear();
        self.batches.clear();
        self.state = PaintState::default();
        self.stack.clear();
    }

    pub fn vertices(&self) -> &[CanvasVertex] {
        &self.vertices
    }

    pub fn batches(&self) -> &[Batch] {
        &self.batches
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn triangle_count(&self) -> usize {
        self.vertices.len() / 3
    }

    // ========== Paint state ==========

    pub fn save(&mut self) {
        self.stack.push(self.state);
    }

    /// Pop the last saved state. Unbalanced restores are ignored.
    pub fn restore(&mut self) {
        if let Some(state) = self.stack.pop() {
            self.state = state;
        }
    }

    pub fn translate(&mut self, offset: Vec2) {
        self.state.translation += offset;
    }

    pub fn translation(&self) -> Vec2 {
        self.state.translation
    }

    pub fn set_global_alpha(&mut self, alpha: f32) {
        self.state.global_alpha = alpha.clamp(0.0, 1.0);
    }

    pub fn global_alpha(&self) -> f32 {
        self.state.global_alpha
    }

    pub fn set_blend(&mut self, blend: BlendMode) {
        self.state.blend = blend;
    }

    pub fn blend(&self) -> BlendMode {
        self.state.blend
    }

    // ========== Shapes ==========

    pub fn fill_rect(&mut self, min: Vec2, size: Vec2, color: Rgba) {
        let max = min + size;
        let (a, b) = (min, Vec2::new(max.x, min.y));
        let (c, d) = (max, Vec2::new(min.x, max.y));
        self.quad([a, b, c, d], [color; 4]);
    }

    /// Fill a rectangle with a top-to-bottom gradient.
    ///
    /// `stops` are `(offset, color)` pairs with offsets in `[0, 1]`, sorted.
    pub fn fill_vertical_gradient(&mut self, min: Vec2, size: Vec2, stops: &[(f32, Rgba)]) {
        match stops {
            [] => {}
            [(_, color)] => self.fill_rect(min, size, *color),
            _ => {
                for pair in stops.windows(2) {
                    let (t0, c0) = pair[0];
                    let (t1, c1) = pair[1];
                    let y0 = min.y + size.y * t0;
                    let y1 = min.y + size.y * t1;
                    self.quad(
                        [
                            Vec2::new(min.x, y0),
                            Vec2::new(min.x + size.x, y0),
                            Vec2::new(min.x + size.x, y1),
                            Vec2::new(min.x, y1),
                        ],
                        [c0, c0, c1, c1],
                    );
                }
            }
        }
    }

    /// Fill a circle as a triangle fan.
    pub fn fill_circle(&mut self, center: Vec2, radius: f32, color: Rgba) {
        if radius <= 0.0 {
            return;
        }
        // Particles are a few pixels wide; keep the fan coarse for them.
        let segments = (radius * 4.0).ceil().clamp(8.0, 32.0) as usize;
        let step = std::f32::consts::TAU / segments as f32;
        let mut prev = center + Vec2::new(radius, 0.0);
        for i in 1..=segments {
            let angle = step * i as f32;
            let next = center + Vec2::new(angle.cos(), angle.sin()) * radius;
            self.triangle([center, prev, next], [color; 3]);
            prev = next;
        }
    }

    /// Stroke connected line segments.
    pub fn stroke_polyline(&mut self, points: &[Vec2], width: f32, color: Rgba) {
        let half = width * 0.5;
        for segment in points.windows(2) {
            let (a, b) = (segment[0], segment[1]);
            let Some(dir) = (b - a).try_normalize() else {
                continue;
            };
            let n = dir.perp() * half;
            self.quad([a + n, b + n, b - n, a - n], [color; 4]);
        }
    }

    /// Fill the region between an x-monotone polyline and a horizontal
    /// baseline below it.
    pub fn fill_under(&mut self, points: &[Vec2], baseline: f32, color: Rgba) {
        for segment in points.windows(2) {
            let (a, b) = (segment[0], segment[1]);
            self.quad(
                [a, b, Vec2::new(b.x, baseline), Vec2::new(a.x, baseline)],
                [color; 4],
            );
        }
    }

    // ========== Tessellation ==========

    fn quad(&mut self, p: [Vec2; 4], c: [Rgba; 4]) {
        self.triangle([p[0], p[1], p[2]], [c[0], c[1], c[2]]);
        self.triangle([p[0], p[2], p[3]], [c[0], c[2], c[3]]);
    }

    fn triangle(&mut self, p: [Vec2; 3], c: [Rgba; 3]) {
        let alpha = self.state.global_alpha;
        if alpha <= 0.0 {
            return;
        }
        self.begin_batch();
        let t = self.state.translation;
        for (pos, mut color) in p.into_iter().zip(c) {
            color[3] *= alpha;
            self.vertices.push(CanvasVertex {
                position: (pos + t).to_array(),
                color,
            });
        }
        if let Some(batch) = self.batches.last_mut() {
            batch.vertices.end = self.vertices.len() as u32;
        }
    }

    fn begin_batch(&mut self) {
        let start = self.vertices.len() as u32;
        match self.batches.last() {
            Some(batch) if batch.blend == self.state.blend => {}
            _ => self.batches.push(Batch {
                blend: self.state.blend,
                vertices: start..start,
            }),
        }
    }
}

/// A path of straight and quadratic segments, flattened for drawing.
#[derive(Debug, Default, Clone)]
pub struct Path {
    points: Vec<Vec2>,
}

impl Path {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start the path at `p`, discarding anything before.
    pub fn move_to(&mut self, p: Vec2) {
        self.points.clear();
        self.points.push(p);
    }

    pub fn line_to(&mut self, p: Vec2) {
        self.points.push(p);
    }

    /// Quadratic Bézier from the current point through `control` to `end`.
    pub fn quad_to(&mut self, control: Vec2, end: Vec2) {
        let Some(&start) = self.points.last() else {
            self.points.push(end);
            return;
        };
        let length = start.distance(control) + control.distance(end);
        let steps = (length / 6.0).ceil().clamp(1.0, 24.0) as usize;
        for i in 1..=steps {
            let t = i as f32 / steps as f32;
            let u = 1.0 - t;
            self.points.push(start * (u * u) + control * (2.0 * u * t) + end * (t * t));
        }
    }

    pub fn points(&self) -> &[Vec2] {
        &self.points
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHITE: Rgba = [1.0, 1.0, 1.0, 1.0];

    #[test]
    fn test_hex_colors() {
        assert_eq!(hex(0xffffff), WHITE);
        let c = hex(0x64ffda);
        assert!((c[0] - 100.0 / 255.0).abs() < 1e-6);
        assert_eq!(c[1], 1.0);
    }

    #[test]
    fn test_rect_is_two_triangles() {
        let mut list = DrawList::new();
        list.fill_rect(Vec2::ZERO, Vec2::new(10.0, 10.0), WHITE);
        assert_eq!(list.triangle_count(), 2);
        assert_eq!(list.batches().len(), 1);
        assert_eq!(list.batches()[0].vertices, 0..6);
    }

    #[test]
    fn test_save_restore_translation() {
        let mut list = DrawList::new();
        list.save();
        list.translate(Vec2::new(5.0, -2.0));
        list.fill_rect(Vec2::ZERO, Vec2::ONE, WHITE);
        list.restore();
        list.fill_rect(Vec2::ZERO, Vec2::ONE, WHITE);

        assert_eq!(list.vertices()[0].position, [5.0, -2.0]);
        assert_eq!(list.vertices()[6].position, [0.0, 0.0]);
        assert_eq!(list.translation(), Vec2::ZERO);
    }

    #[test]
    fn test_global_alpha_scales_color() {
        let mut list = DrawList::new();
        list.set_global_alpha(0.5);
        list.fill_circle(Vec2::new(10.0, 10.0), 2.0, [1.0, 0.0, 0.0, 0.8]);
        assert!(list.vertices().iter().all(|v| (v.color[3] - 0.4).abs() < 1e-6));

        // Fully transparent shapes are skipped
        list.set_global_alpha(0.0);
        let before = list.vertices().len();
        list.fill_circle(Vec2::ZERO, 2.0, WHITE);
        assert_eq!(list.vertices().len(), before);
    }

    #[test]
    fn test_blend_changes_split_batches() {
        let mut list = DrawList::new();
        list.fill_rect(Vec2::ZERO, Vec2::ONE, WHITE);
        list.set_blend(BlendMode::Lighter);
        list.stroke_polyline(&[Vec2::ZERO, Vec2::new(10.0, 0.0)], 2.0, WHITE);
        list.stroke_polyline(&[Vec2::ZERO, Vec2::new(0.0, 10.0)], 2.0, WHITE);
        list.set_blend(BlendMode::Normal);
        list.fill_rect(Vec2::ZERO, Vec2::ONE, WHITE);

        let blends: Vec<_> = list.batches().iter().map(|b| b.blend).collect();
        assert_eq!(
            blends,
            vec![BlendMode::Normal, BlendMode::Lighter, BlendMode::Normal]
        );
        assert_eq!(list.batches()[1].vertices, 6..18);
        let total: u32 = list.batches().iter().map(|b| b.vertices.len() as u32).sum();
        assert_eq!(total as usize, list.vertices().len());
    }

    #[test]
    fn test_gradient_stops() {
        let mut list = DrawList::new();
        let top = hex(0x020203);
        let bottom = hex(0x151530);
        list.fill_vertical_gradient(
            Vec2::ZERO,
            Vec2::new(100.0, 200.0),
            &[(0.0, top), (0.5, hex(0x0a0a20)), (1.0, bottom)],
        );
        assert_eq!(list.triangle_count(), 4);
        assert_eq!(list.vertices()[0].color, top);
        let last = list.vertices().last().map(|v| v.position);
        assert_eq!(last, Some([0.0, 200.0]));
    }

    #[test]
    fn test_quad_curve_ends_at_endpoint() {
        let mut path = Path::new();
        path.move_to(Vec2::ZERO);
        path.quad_to(Vec2::new(50.0, 0.0), Vec2::new(100.0, 50.0));
        let points = path.points();
        assert!(points.len() > 2);
        assert_eq!(points.last().copied(), Some(Vec2::new(100.0, 50.0)));
        assert!(points.windows(2).all(|w| w[1].x >= w[0].x));
    }

    #[test]
    fn test_degenerate_stroke_segments_skipped() {
        let mut list = DrawList::new();
        list.stroke_polyline(&[Vec2::ONE, Vec2::ONE], 2.0, WHITE);
        assert!(list.is_empty());
    }
}
