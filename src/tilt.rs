//! Tilt input adapter.
//!
//! Raw input arrives from two mutually exclusive sources: an orientation
//! sensor reporting Euler angles, or the pointer position inside the window.
//! Both are normalized into a target vector in `[-1, 1]²`. Once per frame the
//! current tilt is low-pass filtered toward that target, with a small idle
//! oscillation mixed in so the scene keeps breathing when nobody touches it.
//!
//! ```ignore
//! let mut tilt = TiltAdapter::new(&TiltConfig::default());
//! tilt.on_pointer(Vec2::new(300.0, 200.0), Vec2::new(400.0, 400.0));
//! let current = tilt.step(clock.elapsed());
//! ```

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::config::TiltConfig;
use crate::sensor::OrientationReading;

/// Which raw source drives the tilt target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputMode {
    /// Device orientation angles (gyroscope).
    Orientation,
    /// Pointer position within the viewport.
    #[default]
    Pointer,
}

impl std::fmt::Display for InputMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InputMode::Orientation => write!(f, "gyroscope"),
            InputMode::Pointer => write!(f, "pointer"),
        }
    }
}

/// Smoothed tilt plus the value it is chasing.
///
/// Both vectors always lie in `[-1, 1]²`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TiltState {
    pub current: Vec2,
    pub target: Vec2,
}

/// Degrees of tilt that map to a full deflection.
const ORIENTATION_RANGE_DEG: f32 = 45.0;

/// Resting front-back angle of a phone held in the hand.
const ORIENTATION_BETA_REST_DEG: f32 = 45.0;

#[inline]
fn clamp_unit(v: Vec2) -> Vec2 {
    v.clamp(Vec2::NEG_ONE, Vec2::ONE)
}

/// Map device orientation to a tilt vector.
///
/// `gamma` (left-right) maps directly, `beta` (front-back) is measured from a
/// 45° resting angle. Out-of-range angles clamp; non-finite angles count as 0.
pub fn map_orientation(reading: OrientationReading) -> Vec2 {
    let finite = |v: f32| if v.is_finite() { v } else { 0.0 };
    let gamma = finite(reading.gamma);
    let beta = finite(reading.beta);
    clamp_unit(Vec2::new(
        gamma / ORIENTATION_RANGE_DEG,
        (beta - ORIENTATION_BETA_REST_DEG) / ORIENTATION_RANGE_DEG,
    ))
}

/// Map a pointer position in pixels to a tilt vector.
///
/// The viewport center is `(0, 0)`; moving down gives positive `y` unless
/// `invert_y` is set. Returns `None` for a degenerate viewport.
pub fn map_pointer(position: Vec2, viewport: Vec2, invert_y: bool) -> Option<Vec2> {
    if viewport.x <= 0.0 || viewport.y <= 0.0 || !position.is_finite() {
        return None;
    }
    let mut v = (position / viewport - Vec2::splat(0.5)) * 2.0;
    if invert_y {
        v.y = -v.y;
    }
    Some(clamp_unit(v))
}

/// One step of the first-order low-pass filter.
///
/// With `factor` in `(0, 1)` the result moves strictly closer to `target`
/// without overshooting it.
#[inline]
pub fn smooth(current: Vec2, target: Vec2, factor: f32) -> Vec2 {
    current + (target - current) * factor
}

/// Idle drift added to the target, `time` in seconds.
#[inline]
pub fn idle_offset(time: f32, amplitude: f32) -> Vec2 {
    Vec2::new((time * 0.5).sin(), (time * 0.3).cos()) * amplitude
}

/// Normalizes raw input into a smoothed tilt vector.
#[derive(Debug, Clone)]
pub struct TiltAdapter {
    state: TiltState,
    /// Target written by input events, before idle drift.
    raw_target: Vec2,
    mode: InputMode,
    locked: bool,
    smoothing: f32,
    idle_amplitude: f32,
    invert_pointer_y: bool,
}

impl TiltAdapter {
    pub fn new(config: &TiltConfig) -> Self {
        Self {
            state: TiltState::default(),
            raw_target: Vec2::ZERO,
            mode: config.initial_mode,
            locked: false,
            smoothing: config.smoothing,
            idle_amplitude: config.idle_amplitude,
            invert_pointer_y: config.invert_pointer_y,
        }
    }

    /// Write a new target directly. Ignored while locked.
    pub fn set_target(&mut self, x: f32, y: f32) {
        if self.locked {
            return;
        }
        let v = Vec2::new(x, y);
        if v.is_finite() {
            self.raw_target = clamp_unit(v);
        }
    }

    /// Feed an orientation reading. Ignored unless in orientation mode.
    pub fn on_orientation(&mut self, reading: OrientationReading) {
        if self.mode == InputMode::Orientation {
            let v = map_orientation(reading);
            self.set_target(v.x, v.y);
        }
    }

    /// Feed a pointer position. Ignored unless in pointer mode.
    pub fn on_pointer(&mut self, position: Vec2, viewport: Vec2) {
        if self.mode != InputMode::Pointer {
            return;
        }
        if let Some(v) = map_pointer(position, viewport, self.invert_pointer_y) {
            self.set_target(v.x, v.y);
        }
    }

    /// Advance the filter by one frame and return the new current tilt.
    pub fn step(&mut self, time: f32) -> Vec2 {
        self.state.target = clamp_unit(self.raw_target + idle_offset(time, self.idle_amplitude));
        self.state.current = clamp_unit(smooth(self.state.current, self.state.target, self.smoothing));
        self.state.current
    }

    #[inline]
    pub fn current(&self) -> Vec2 {
        self.state.current
    }

    #[inline]
    pub fn target(&self) -> Vec2 {
        self.state.target
    }

    #[inline]
    pub fn state(&self) -> TiltState {
        self.state
    }

    #[inline]
    pub fn mode(&self) -> InputMode {
        self.mode
    }

    /// Switch input source. Does not touch the current target.
    pub fn set_mode(&mut self, mode: InputMode) {
        self.mode = mode;
    }

    #[inline]
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Freeze or release the target.
    pub fn set_locked(&mut self, locked: bool) {
        self.locked = locked;
    }
}
