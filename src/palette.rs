//! Intensity to color ramp mapping.
//!
//! All thresholds on the Kp scale live here; nothing else in the crate
//! compares intensity against magic numbers.

use glam::Vec3;

/// Aurora color ramp, chosen from the geomagnetic intensity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorRamp {
    /// Kp 0-3: quiet, green fading into blue.
    Low,
    /// Kp 4-6: active, teal fading into violet.
    Medium,
    /// Kp 7-9: storm, magenta fading into deep purple.
    High,
}

impl ColorRamp {
    /// Select the ramp for an intensity. Values above 9 count as 9.
    pub const fn from_intensity(kp: u8) -> Self {
        match kp {
            0..=3 => ColorRamp::Low,
            4..=6 => ColorRamp::Medium,
            _ => ColorRamp::High,
        }
    }

    /// The two endpoint colors of the ramp, linear RGB.
    pub fn colors(self) -> (Vec3, Vec3) {
        match self {
            ColorRamp::Low => (Vec3::new(0.1, 0.8, 0.4), Vec3::new(0.2, 0.4, 0.8)),
            ColorRamp::Medium => (Vec3::new(0.0, 1.0, 0.6), Vec3::new(0.6, 0.0, 1.0)),
            ColorRamp::High => (Vec3::new(1.0, 0.3, 0.7), Vec3::new(0.5, 0.1, 0.9)),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ColorRamp::Low => "low",
            ColorRamp::Medium => "medium",
            ColorRamp::High => "high",
        }
    }
}
