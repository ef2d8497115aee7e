//! Frame clock for the render loop.
//!
//! The clock owns the monotonically increasing `elapsed` accumulator that every
//! layer animates against. Elapsed time is the running sum of per-frame deltas,
//! so a fixed timestep produces exactly `frames * step` seconds regardless of
//! how long the host actually took between frames.
//!
//! # Example
//!
//! ```ignore
//! use borealis::time::FrameClock;
//!
//! let mut clock = FrameClock::new();
//! clock.set_fixed_delta(Some(1.0 / 60.0));
//!
//! // Once per frame:
//! let (elapsed, delta) = clock.tick();
//! ```

use std::time::{Duration, Instant};

/// Largest delta a single frame may contribute, in seconds.
///
/// Frames after a stall (window dragged, laptop lid closed) are clamped so the
/// particles do not teleport across the screen.
pub const MAX_FRAME_DELTA: f32 = 0.1;

/// Time tracking for the render loop.
#[derive(Debug)]
pub struct FrameClock {
    /// When the last frame occurred.
    last_frame: Instant,
    /// Accumulated elapsed time in seconds.
    elapsed_secs: f32,
    /// Time since last frame in seconds.
    delta_secs: f32,
    /// Total frames since start.
    frame_count: u64,
    /// Calculated FPS (updated periodically).
    fps: f32,
    /// Frame count at last FPS update.
    fps_frame_count: u64,
    /// Time of last FPS calculation.
    fps_update_time: Instant,
    /// How often to update FPS calculation.
    fps_update_interval: Duration,
    /// Fixed delta time, replacing the measured one when set.
    fixed_delta: Option<f32>,
}

impl FrameClock {
    /// Create a new clock starting from now.
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            last_frame: now,
            elapsed_secs: 0.0,
            delta_secs: 0.0,
            frame_count: 0,
            fps: 0.0,
            fps_frame_count: 0,
            fps_update_time: now,
            fps_update_interval: Duration::from_secs(1),
            fixed_delta: None,
        }
    }

    /// Advance the clock by one frame.
    ///
    /// Returns `(elapsed_time, delta_time)` for convenience.
    pub fn tick(&mut self) -> (f32, f32) {
        let now = Instant::now();

        let measured = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;

        self.delta_secs = self
            .fixed_delta
            .unwrap_or(measured)
            .clamp(0.0, MAX_FRAME_DELTA);
        self.elapsed_secs += self.delta_secs;
        self.frame_count += 1;

        let fps_elapsed = now.duration_since(self.fps_update_time);
        if fps_elapsed >= self.fps_update_interval {
            let frames_since = self.frame_count - self.fps_frame_count;
            self.fps = frames_since as f32 / fps_elapsed.as_secs_f32();
            self.fps_frame_count = self.frame_count;
            self.fps_update_time = now;
            log::debug!("{:.1} fps", self.fps);
        }

        (self.elapsed_secs, self.delta_secs)
    }

    /// Total elapsed time in seconds since start.
    #[inline]
    pub fn elapsed(&self) -> f32 {
        self.elapsed_secs
    }

    /// Time since last frame in seconds (delta time).
    #[inline]
    pub fn delta(&self) -> f32 {
        self.delta_secs
    }

    /// Total frames since start.
    #[inline]
    pub fn frame(&self) -> u64 {
        self.frame_count
    }

    /// Calculated frames per second.
    #[inline]
    pub fn fps(&self) -> f32 {
        self.fps
    }

    /// Set a fixed delta time.
    ///
    /// Pass `None` to use real frame timing.
    pub fn set_fixed_delta(&mut self, delta: Option<f32>) {
        self.fixed_delta = delta.map(|d| d.max(0.0));
    }

    /// Reset the clock to its initial state, keeping the fixed delta.
    pub fn reset(&mut self) {
        let fixed = self.fixed_delta;
        *self = Self::new();
        self.fixed_delta = fixed;
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}
