//! Renderer configuration.
//!
//! Everything tunable lives in [`RendererConfig`], serializable to JSON.
//! Missing fields fall back to their defaults, so a config file only needs to
//! name what it changes:
//!
//! ```json
//! {
//!     "chrome": true,
//!     "tilt": { "initial_mode": "orientation", "smoothing": 0.1 },
//!     "terrain": { "style": "waves" }
//! }
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::canvas::{rgba8, Rgba};
use crate::error::ConfigError;
use crate::tilt::InputMode;

/// NOAA planetary K-index feed.
pub const DEFAULT_KP_URL: &str = "https://services.swpc.noaa.gov/products/noaa-planetary-k-index.json";

/// Complete renderer configuration.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RendererConfig {
    pub window_title: String,
    /// Initial window size in logical pixels.
    pub initial_size: (u32, u32),
    /// Full-page mode with overlay controls (requires the `egui` feature).
    /// When false only the background layers are drawn.
    pub chrome: bool,
    /// Fixed per-frame delta in seconds; measured when `None`.
    pub fixed_timestep: Option<f32>,
    /// Seed for particle and terrain randomness; entropy when `None`.
    pub seed: Option<u64>,
    pub tilt: TiltConfig,
    pub particles: ParticleConfig,
    pub terrain: TerrainConfig,
    pub aurora: AuroraConfig,
    pub intensity: IntensityConfig,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            window_title: "Borealis".into(),
            initial_size: (1280, 720),
            chrome: false,
            fixed_timestep: None,
            seed: None,
            tilt: TiltConfig::default(),
            particles: ParticleConfig::default(),
            terrain: TerrainConfig::default(),
            aurora: AuroraConfig::default(),
            intensity: IntensityConfig::default(),
        }
    }
}

impl RendererConfig {
    /// Load and validate a configuration from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Parse and validate a configuration from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Save the configuration to a JSON file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Reject values the renderer cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn check(ok: bool, msg: &str) -> Result<(), ConfigError> {
            if ok {
                Ok(())
            } else {
                Err(ConfigError::Invalid(msg.to_string()))
            }
        }

        check(
            self.initial_size.0 > 0 && self.initial_size.1 > 0,
            "initial_size must be non-zero",
        )?;
        if let Some(step) = self.fixed_timestep {
            check(step > 0.0 && step.is_finite(), "fixed_timestep must be positive")?;
        }

        let t = &self.tilt;
        check(
            t.smoothing > 0.0 && t.smoothing < 1.0,
            "tilt.smoothing must be in (0, 1)",
        )?;
        check(
            (0.0..=1.0).contains(&t.idle_amplitude),
            "tilt.idle_amplitude must be in [0, 1]",
        )?;

        let p = &self.particles;
        check(
            p.stars + p.embers <= p.max_particles,
            "particles.max_particles must hold all stars and embers",
        )?;
        check(
            (0.0..=1.0).contains(&p.meteor_spawn_chance),
            "particles.meteor_spawn_chance must be in [0, 1]",
        )?;
        check(
            p.meteor_floor > 0.0 && p.meteor_floor <= 1.0,
            "particles.meteor_floor must be in (0, 1]",
        )?;

        let tr = &self.terrain;
        check(tr.step > 0.0, "terrain.step must be positive")?;
        check(tr.margin >= 0.0, "terrain.margin must not be negative")?;
        check(
            0.0 <= tr.band.0 && tr.band.0 < tr.band.1 && tr.band.1 <= 1.0,
            "terrain.band must be an increasing range inside [0, 1]",
        )?;
        check(
            tr.band.0 <= tr.start && tr.start <= tr.band.1,
            "terrain.start must lie inside terrain.band",
        )?;
        check(tr.max_delta >= 0.0, "terrain.max_delta must not be negative")?;
        check(tr.wave_step > 0.0, "terrain.wave_step must be positive")?;

        let a = &self.aurora;
        check(
            (1..=8).contains(&a.octaves),
            "aurora.octaves must be between 1 and 8",
        )?;
        check(
            (0.0..=1.0).contains(&a.opacity),
            "aurora.opacity must be in [0, 1]",
        )?;
        check(a.frequency > 0.0, "aurora.frequency must be positive")?;

        let i = &self.intensity;
        check(
            i.poll_interval_secs > 0.0 && i.poll_interval_secs.is_finite(),
            "intensity.poll_interval_secs must be positive",
        )?;
        check(i.timeout_secs > 0, "intensity.timeout_secs must be positive")?;
        check(i.initial <= 9, "intensity.initial must be in [0, 9]")?;

        Ok(())
    }
}

/// Tilt input settings.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TiltConfig {
    pub initial_mode: InputMode,
    /// Low-pass factor applied each frame, in `(0, 1)`.
    pub smoothing: f32,
    /// Amplitude of the idle drift added to the target.
    pub idle_amplitude: f32,
    /// Flip the pointer y axis (pointer up tilts down).
    pub invert_pointer_y: bool,
}

impl Default for TiltConfig {
    fn default() -> Self {
        Self {
            initial_mode: InputMode::Pointer,
            smoothing: 0.05,
            idle_amplitude: 0.1,
            invert_pointer_y: false,
        }
    }
}

/// Particle population and parallax settings. Speeds are per second.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ParticleConfig {
    /// Twinkling background stars, seeded at start.
    pub stars: u32,
    /// Drifting embers, seeded at start.
    pub embers: u32,
    /// Upper bound on live falling meteors.
    pub max_meteors: u32,
    /// Hard cap on the whole population.
    pub max_particles: u32,
    /// Chance per frame of spawning one meteor while under the caps.
    pub meteor_spawn_chance: f32,
    /// Meteors despawn below this fraction of the viewport height.
    pub meteor_floor: f32,
    /// Parallax offset in pixels per unit of tilt, per family.
    pub star_depth: f32,
    pub ember_depth: f32,
    pub meteor_depth: f32,
    pub star_color: Rgba,
    pub ember_color: Rgba,
    pub meteor_color: Rgba,
}

impl Default for ParticleConfig {
    fn default() -> Self {
        Self {
            stars: 400,
            embers: 50,
            max_meteors: 100,
            max_particles: 550,
            meteor_spawn_chance: 0.2,
            meteor_floor: 0.8,
            star_depth: 25.0,
            ember_depth: 60.0,
            meteor_depth: 80.0,
            star_color: [1.0, 1.0, 1.0, 0.8],
            ember_color: rgba8(100, 255, 218, 0.3),
            meteor_color: rgba8(100, 255, 218, 0.6),
        }
    }
}

/// Foreground terrain variant.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TerrainStyle {
    /// Filled horizon silhouette with a rim light.
    #[default]
    Silhouette,
    /// Stacked additive sine waves.
    Waves,
}

/// Terrain generation and drawing settings.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TerrainConfig {
    pub style: TerrainStyle,
    /// Horizontal distance between control points, pixels.
    pub step: f32,
    /// Extra width generated past each side of the viewport, pixels.
    pub margin: f32,
    /// Allowed vertical band as fractions of the viewport height.
    pub band: (f32, f32),
    /// Height of the first control point as a fraction of the viewport.
    pub start: f32,
    /// Largest change in height between neighbouring points, pixels.
    pub max_delta: f32,
    /// Noise frequency per control point.
    pub roughness: f32,
    /// Parallax offset in pixels per unit of tilt.
    pub parallax: (f32, f32),
    pub fill_color: Rgba,
    pub rim_color: Rgba,
    pub rim_width: f32,
    /// Wave crest band as fractions of the viewport height.
    pub wave_base: f32,
    pub wave_height: f32,
    /// Phase speed of the waves, radians per second.
    pub wave_speed: f32,
    /// Horizontal sample spacing of each wave, pixels.
    pub wave_step: f32,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            style: TerrainStyle::Silhouette,
            step: 30.0,
            margin: 200.0,
            band: (0.7, 0.9),
            start: 0.8,
            max_delta: 15.0,
            roughness: 0.35,
            parallax: (100.0, 50.0),
            fill_color: rgba8(1, 2, 3, 1.0),
            rim_color: rgba8(100, 255, 218, 0.1),
            rim_width: 2.0,
            wave_base: 0.75,
            wave_height: 0.15,
            wave_speed: 0.6,
            wave_step: 15.0,
        }
    }
}

/// Aurora shader settings.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AuroraConfig {
    pub enabled: bool,
    /// Noise octaves summed per pixel.
    pub octaves: u32,
    /// Base spatial frequency of the first octave.
    pub frequency: f32,
    /// How far the curtains shift per unit of tilt, in uv units.
    pub parallax: f32,
    /// Drift speed of the noise field.
    pub speed: f32,
    /// Layer opacity when composited over the background.
    pub opacity: f32,
}

impl Default for AuroraConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            octaves: 4,
            frequency: 2.0,
            parallax: 0.2,
            speed: 0.05,
            opacity: 0.8,
        }
    }
}

/// Kp index polling settings.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IntensityConfig {
    pub enabled: bool,
    pub url: String,
    /// Seconds between fetches.
    pub poll_interval_secs: f64,
    pub timeout_secs: u64,
    /// Value used until the first successful fetch.
    pub initial: u8,
}

impl Default for IntensityConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            url: DEFAULT_KP_URL.into(),
            poll_interval_secs: 300.0,
            timeout_secs: 10,
            initial: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(RendererConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = RendererConfig::from_json(
            r#"{ "chrome": true, "tilt": { "smoothing": 0.1 }, "terrain": { "style": "waves" } }"#,
        )
        .unwrap();
        assert!(config.chrome);
        assert_eq!(config.tilt.smoothing, 0.1);
        assert_eq!(config.tilt.idle_amplitude, 0.1);
        assert_eq!(config.terrain.style, TerrainStyle::Waves);
        assert_eq!(config.particles.stars, 400);
        assert_eq!(config.intensity.poll_interval_secs, 300.0);
    }

    #[test]
    fn test_input_mode_names() {
        let config = RendererConfig::from_json(r#"{ "tilt": { "initial_mode": "orientation" } }"#)
            .unwrap();
        assert_eq!(config.tilt.initial_mode, InputMode::Orientation);
    }

    #[test]
    fn test_rejects_bad_smoothing() {
        for smoothing in [0.0, 1.0, -0.5, 2.0] {
            let mut config = RendererConfig::default();
            config.tilt.smoothing = smoothing;
            assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
        }
    }

    #[test]
    fn test_rejects_inverted_band() {
        let mut config = RendererConfig::default();
        config.terrain.band = (0.9, 0.7);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_step() {
        let mut config = RendererConfig::default();
        config.terrain.step = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_undersized_cap() {
        let mut config = RendererConfig::default();
        config.particles.max_particles = 10;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_json_is_json_error() {
        assert!(matches!(
            RendererConfig::from_json("{ not json"),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn test_save_load_file() {
        let path = std::env::temp_dir().join(format!("borealis-config-{}.json", std::process::id()));
        let mut config = RendererConfig::default();
        config.seed = Some(7);
        config.save(&path).unwrap();
        let loaded = RendererConfig::load(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(loaded.seed, Some(7));
        assert_eq!(loaded.particles.stars, config.particles.stars);
        assert_eq!(loaded.intensity.url, DEFAULT_KP_URL);
    }
}
