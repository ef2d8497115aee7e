//! Foreground terrain.
//!
//! A [`TerrainProfile`] is a row of control points walked left to right at a
//! fixed step, each height the previous one plus a bounded noise-driven
//! delta, clamped to a band in the lower part of the viewport. The profile is
//! rebuilt only when the viewport changes size; every frame merely redraws it
//! with a tilt-scaled offset.

use glam::Vec2;
use rand::Rng;

use crate::canvas::{BlendMode, DrawList, Path, Rgba, rgba8};
use crate::config::{TerrainConfig, TerrainStyle};
use crate::noise;

/// Wave strokes of the `Waves` style: color, amplitude factor, phase.
const WAVES: [(Rgba, f32, f32); 4] = [
    (rgba8(100, 255, 218, 0.9), 0.8, 0.0),
    (rgba8(179, 100, 255, 0.7), 0.7, 0.5),
    (rgba8(100, 205, 255, 0.5), 0.9, 1.0),
    (rgba8(255, 100, 227, 0.4), 0.6, 1.5),
];

/// Smallest horizontal step in pixels for both walks.
const MIN_STEP: f32 = 1.0;

/// Horizon control points for one viewport size.
#[derive(Debug, Clone, PartialEq)]
pub struct TerrainProfile {
    points: Vec<Vec2>,
    viewport: Vec2,
}

impl TerrainProfile {
    /// Control points, x strictly increasing.
    pub fn points(&self) -> &[Vec2] {
        &self.points
    }

    /// Viewport size the profile was generated for.
    pub fn viewport(&self) -> Vec2 {
        self.viewport
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Builds and draws terrain profiles.
#[derive(Debug, Clone)]
pub struct TerrainGenerator {
    config: TerrainConfig,
    /// Offset into the noise field so every session gets its own horizon.
    seed: Vec2,
}

impl TerrainGenerator {
    /// Steps below one pixel and negative margins are raised so an
    /// unvalidated config still produces a finite profile.
    pub fn new(config: &TerrainConfig, rng: &mut impl Rng) -> Self {
        let mut config = config.clone();
        config.step = config.step.max(MIN_STEP);
        config.wave_step = config.wave_step.max(MIN_STEP);
        config.margin = config.margin.max(0.0);
        Self {
            config,
            seed: Vec2::new(rng.gen_range(0.0..1000.0), rng.gen_range(0.0..1000.0)),
        }
    }

    pub fn style(&self) -> TerrainStyle {
        self.config.style
    }

    /// Walk from `-margin` to `width + margin` and build the control points.
    pub fn regenerate(&self, width: f32, height: f32) -> TerrainProfile {
        let c = &self.config;
        let (low, high) = (height * c.band.0, height * c.band.1);
        let end = width + c.margin;

        let mut points = Vec::with_capacity(((end + c.margin) / c.step) as usize + 2);
        let mut x = -c.margin;
        let mut y = (height * c.start).clamp(low, high);
        loop {
            points.push(Vec2::new(x, y));
            if x >= end {
                break;
            }
            let sample = self.seed + Vec2::new(points.len() as f32 * c.roughness, 0.0);
            y = (y + noise::noise2(sample) * c.max_delta).clamp(low, high);
            x += c.step;
        }

        log::debug!(
            "Terrain regenerated: {} points for {}x{}",
            points.len(),
            width,
            height
        );
        TerrainProfile {
            points,
            viewport: Vec2::new(width, height),
        }
    }

    /// Draw the terrain for this frame. `time` only matters for waves.
    pub fn render(&self, canvas: &mut DrawList, tilt: Vec2, profile: &TerrainProfile, time: f32) {
        match self.config.style {
            TerrainStyle::Silhouette => self.render_silhouette(canvas, tilt, profile),
            TerrainStyle::Waves => self.render_waves(canvas, tilt, profile.viewport(), time),
        }
    }

    fn render_silhouette(&self, canvas: &mut DrawList, tilt: Vec2, profile: &TerrainProfile) {
        let points = profile.points();
        let Some((&first, rest)) = points.split_first() else {
            return;
        };
        let c = &self.config;
        let offset = Vec2::new(-tilt.x * c.parallax.0, -tilt.y * c.parallax.1);

        // Curves run through the midpoints so control points never show as corners
        let mut path = Path::new();
        path.move_to(first);
        let mut prev = first;
        for &p in rest {
            path.quad_to(prev, (prev + p) * 0.5);
            prev = p;
        }
        path.line_to(prev);

        // Reach below the bottom edge so upward parallax never uncovers a gap
        let baseline = profile.viewport().y + c.parallax.1.abs();

        canvas.save();
        canvas.translate(offset);
        canvas.fill_under(path.points(), baseline, c.fill_color);
        canvas.stroke_polyline(path.points(), c.rim_width, c.rim_color);
        canvas.restore();
    }

    fn render_waves(&self, canvas: &mut DrawList, tilt: Vec2, viewport: Vec2, time: f32) {
        let c = &self.config;
        let base = viewport.y * c.wave_base;
        let height = viewport.y * c.wave_height;
        let amplitude_factor = (tilt.x + 1.0) * 0.5 + 0.5;
        let frequency_factor = tilt.y * 0.2 + 1.0;

        let samples = (viewport.x / c.wave_step).floor() as usize + 1;
        let mut points = Vec::with_capacity(samples + 1);

        canvas.set_blend(BlendMode::Lighter);
        for (color, amplitude, phase) in WAVES {
            points.clear();
            for i in 0..samples {
                let x = i as f32 * c.wave_step;
                let jitter = noise::noise2(Vec2::new(x * 0.01, time * 0.1)) * 4.0;
                let wave = (x * frequency_factor * 0.01 + time * c.wave_speed + phase).sin();
                points.push(Vec2::new(x, base + wave * height * amplitude * amplitude_factor + jitter));
            }
            points.push(Vec2::new(viewport.x, base));
            canvas.stroke_polyline(&points, 2.0, color);
        }
        canvas.set_blend(BlendMode::Normal);
    }
}
