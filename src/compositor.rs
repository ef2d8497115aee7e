//! Compositor and render loop.
//!
//! The [`Compositor`] owns every per-session resource: frame clock, tilt
//! filter, particle population, terrain profile, aurora program and the
//! Kp poller. It moves between two states:
//!
//! - **Stopped**: nothing allocated, every input is ignored.
//! - **Running**: [`start`](Compositor::start) built a session; each call to
//!   [`frame`](Compositor::frame) advances and draws it once.
//!
//! [`stop`](Compositor::stop) drops the session and is safe to call any number
//! of times; dropping the compositor stops it too. All frame production is
//! CPU-side. The finished [`Frame`] goes to a [`RenderBackend`], which is the
//! only thing that talks to a GPU.
//!
//! Each frame is composited in three layers, back to front: the raster
//! background (gradient and particles), the aurora, and the raster
//! foreground (terrain).

use std::sync::Arc;
use std::time::Duration;

use glam::Vec2;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::aurora::{AuroraDraw, AuroraEngine};
use crate::canvas::{hex, DrawList, Rgba};
use crate::config::{IntensityConfig, RendererConfig};
use crate::error::{ConfigError, RenderError, ShaderError};
use crate::intensity::{IntensityPoller, IntensitySignal, KpSource};
use crate::particles::ParticleSystem;
use crate::sensor::{NoOrientationSensor, OrientationSensor, Permission};
use crate::terrain::{TerrainGenerator, TerrainProfile};
use crate::tilt::{InputMode, TiltAdapter, TiltState};
use crate::time::FrameClock;

/// Sky gradient behind everything, top to bottom.
pub const BACKGROUND_GRADIENT: [(f32, Rgba); 3] = [
    (0.0, hex(0x020203)),
    (0.5, hex(0x0a0a20)),
    (1.0, hex(0x151530)),
];

/// Clear color of the swapchain before any layer is drawn.
pub const CLEAR_COLOR: Rgba = hex(0x020203);

/// Per-frame decay of the surge color shift at 60 fps.
const COLOR_SHIFT_DECAY: f32 = 0.95;

/// Size of the drawing surface in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn size(self) -> Vec2 {
        Vec2::new(self.width as f32, self.height as f32)
    }

    /// A minimized window reports a zero-sized surface.
    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl std::fmt::Display for Viewport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Opaque handle to a compiled shader program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramHandle(usize);

impl ProgramHandle {
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    pub const fn index(self) -> usize {
        self.0
    }
}

/// Everything needed to present one composited frame.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    pub viewport: Viewport,
    pub clear_color: Rgba,
    /// Gradient and particles.
    pub background: &'a DrawList,
    /// Screen-blended over the background when present.
    pub aurora: Option<AuroraDraw>,
    /// Terrain, drawn last.
    pub foreground: &'a DrawList,
}

/// Presentation backend.
pub trait RenderBackend {
    /// Resize every drawing surface.
    fn resize(&mut self, viewport: Viewport);

    /// Compile and link a full-screen program from WGSL sources.
    ///
    /// Backends keep a single live program; a successful compile replaces
    /// the previous one.
    fn compile_program(&mut self, vertex: &str, fragment: &str) -> Result<ProgramHandle, ShaderError>;

    /// Draw the layers of `frame` in order and present them.
    fn present(&mut self, frame: &Frame<'_>) -> Result<(), RenderError>;
}

/// Lifecycle state of a [`Compositor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RendererState {
    Stopped,
    Running,
}

/// Everything that lives between `start` and `stop`.
struct Session {
    viewport: Viewport,
    pending_viewport: Option<Viewport>,
    clock: FrameClock,
    tilt: TiltAdapter,
    particles: ParticleSystem,
    terrain: TerrainGenerator,
    profile: TerrainProfile,
    aurora: AuroraEngine,
    background: DrawList,
    foreground: DrawList,
    color_shift: f32,
    poller: Option<IntensityPoller>,
}

/// Multi-layer render loop.
pub struct Compositor<B: RenderBackend> {
    config: RendererConfig,
    backend: B,
    sensor: Box<dyn OrientationSensor>,
    kp_source: Option<Arc<dyn KpSource>>,
    signal: IntensitySignal,
    session: Option<Session>,
}

impl<B: RenderBackend> Compositor<B> {
    /// Like [`new`](Self::new), but rejects a config that fails
    /// [`RendererConfig::validate`].
    pub fn try_new(config: RendererConfig, backend: B) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::new(config, backend))
    }

    /// Create a stopped compositor with no orientation sensor and no Kp feed.
    ///
    /// The config is not validated; out-of-range values that would stall or
    /// panic a session are replaced with defaults when it starts.
    pub fn new(config: RendererConfig, backend: B) -> Self {
        let signal = IntensitySignal::new(config.intensity.initial);
        Self {
            config,
            backend,
            sensor: Box::new(NoOrientationSensor),
            kp_source: None,
            signal,
            session: None,
        }
    }

    /// Use `sensor` for orientation mode.
    pub fn with_sensor(mut self, sensor: impl OrientationSensor + 'static) -> Self {
        self.sensor = Box::new(sensor);
        self
    }

    /// Poll `source` for the Kp index while running.
    pub fn with_kp_source(mut self, source: Arc<dyn KpSource>) -> Self {
        self.kp_source = Some(source);
        self
    }

    // ========== Lifecycle ==========

    /// Stopped → Running. Does nothing if already running.
    ///
    /// Nothing here can fail the start: a shader that does not compile only
    /// disables the aurora layer, a poller that cannot spawn leaves the
    /// intensity at its current value.
    pub fn start(&mut self, viewport: Viewport) {
        if self.session.is_some() {
            log::debug!("start() while running; ignored");
            return;
        }

        self.backend.resize(viewport);

        let mut rng = match self.config.seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => SmallRng::from_entropy(),
        };

        let mut clock = FrameClock::new();
        clock.set_fixed_delta(self.config.fixed_timestep);

        let mut aurora = AuroraEngine::new(&self.config.aurora);
        // Already logged; the layer stays off
        let _ = aurora.compile(&mut self.backend);

        let size = viewport.size();
        let particle_rng = SmallRng::seed_from_u64(rng.gen());
        let particles = ParticleSystem::new(&self.config.particles, size, particle_rng);
        let terrain = TerrainGenerator::new(&self.config.terrain, &mut rng);
        let profile = terrain.regenerate(size.x, size.y);

        let poller = self.kp_source.as_ref().and_then(|source| {
            let interval = poll_interval(self.config.intensity.poll_interval_secs);
            match IntensityPoller::spawn(Arc::clone(source), self.signal.clone(), interval) {
                Ok(poller) => Some(poller),
                Err(e) => {
                    log::error!("Failed to start Kp poller: {}", e);
                    None
                }
            }
        });

        self.session = Some(Session {
            viewport,
            pending_viewport: None,
            clock,
            tilt: TiltAdapter::new(&self.config.tilt),
            particles,
            terrain,
            profile,
            aurora,
            background: DrawList::new(),
            foreground: DrawList::new(),
            color_shift: 0.0,
            poller,
        });
        log::info!("Renderer started at {}", viewport);

        if self.config.tilt.initial_mode == InputMode::Orientation {
            self.set_input_mode(InputMode::Orientation);
        }
    }

    /// Running → Stopped. Releases the session and stops the poller.
    ///
    /// Idempotent; also runs when the compositor is dropped.
    pub fn stop(&mut self) {
        if let Some(mut session) = self.session.take() {
            if let Some(poller) = session.poller.as_mut() {
                poller.stop();
            }
            log::info!("Renderer stopped after {} frames", session.clock.frame());
        }
    }

    pub fn state(&self) -> RendererState {
        if self.session.is_some() {
            RendererState::Running
        } else {
            RendererState::Stopped
        }
    }

    pub fn is_running(&self) -> bool {
        self.session.is_some()
    }

    // ========== Frame ==========

    /// Advance every layer once and present the composite.
    ///
    /// Returns [`RenderError::NotRunning`] without side effects when stopped.
    /// Backend errors are returned for the host to handle; the session
    /// survives them and the next frame proceeds normally.
    pub fn frame(&mut self) -> Result<(), RenderError> {
        let Some(s) = self.session.as_mut() else {
            return Err(RenderError::NotRunning);
        };

        if let Some(viewport) = s.pending_viewport.take() {
            if viewport != s.viewport {
                s.viewport = viewport;
                self.backend.resize(viewport);
                let size = viewport.size();
                s.profile = s.terrain.regenerate(size.x, size.y);
                log::info!("Viewport resized to {}", viewport);
            }
        }

        let (time, dt) = s.clock.tick();
        let size = s.viewport.size();

        if s.tilt.mode() == InputMode::Orientation {
            while let Some(reading) = self.sensor.poll() {
                s.tilt.on_orientation(reading);
            }
        }
        let tilt = s.tilt.step(time);
        s.color_shift *= COLOR_SHIFT_DECAY.powf(dt * 60.0);

        s.background.clear();
        s.background
            .fill_vertical_gradient(Vec2::ZERO, size, &BACKGROUND_GRADIENT);
        s.particles.step(dt, time, size);
        s.particles.render(&mut s.background, tilt);

        s.aurora
            .set_uniforms(time, size, tilt, self.signal.get(), s.color_shift);

        s.foreground.clear();
        s.terrain.render(&mut s.foreground, tilt, &s.profile, time);

        let frame = Frame {
            viewport: s.viewport,
            clear_color: CLEAR_COLOR,
            background: &s.background,
            aurora: s.aurora.draw(),
            foreground: &s.foreground,
        };
        self.backend.present(&frame)
    }

    // ========== Events ==========

    /// Record a new surface size; applied before the next frame.
    ///
    /// Zero-sized surfaces (minimized windows) are ignored.
    pub fn on_resize(&mut self, viewport: Viewport) {
        if viewport.is_empty() {
            return;
        }
        if let Some(s) = self.session.as_mut() {
            s.pending_viewport = Some(viewport);
        }
    }

    /// Pointer position in physical pixels.
    pub fn on_pointer_moved(&mut self, position: Vec2) {
        if let Some(s) = self.session.as_mut() {
            let size = s.viewport.size();
            s.tilt.on_pointer(position, size);
        }
    }

    /// Switch input source.
    ///
    /// Selecting orientation runs the permission handshake; anything but a
    /// grant falls back to pointer input. Returns the mode now in effect.
    pub fn set_input_mode(&mut self, mode: InputMode) -> InputMode {
        let Some(s) = self.session.as_mut() else {
            return mode;
        };
        let effective = match mode {
            InputMode::Pointer => InputMode::Pointer,
            InputMode::Orientation => match self.sensor.request_permission() {
                Permission::Granted => InputMode::Orientation,
                Permission::Denied => {
                    log::warn!("Orientation permission denied; falling back to pointer input");
                    InputMode::Pointer
                }
                Permission::Unavailable => {
                    log::warn!("No orientation sensor available; falling back to pointer input");
                    InputMode::Pointer
                }
            },
        };
        if effective != s.tilt.mode() {
            log::info!("Input source: {}", effective);
        }
        s.tilt.set_mode(effective);
        effective
    }

    /// Freeze or release the tilt target.
    pub fn set_locked(&mut self, locked: bool) {
        if let Some(s) = self.session.as_mut() {
            s.tilt.set_locked(locked);
            log::info!("Input {}", if locked { "locked" } else { "unlocked" });
        }
    }

    pub fn toggle_lock(&mut self) {
        let locked = self.is_locked();
        self.set_locked(!locked);
    }

    /// Push the aurora color toward the ramp's far end; decays over ~1 s.
    pub fn surge(&mut self) {
        if let Some(s) = self.session.as_mut() {
            s.color_shift = 1.0;
        }
    }

    // ========== Queries ==========

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Handle to the shared Kp value.
    pub fn intensity_signal(&self) -> IntensitySignal {
        self.signal.clone()
    }

    pub fn intensity(&self) -> u8 {
        self.signal.get()
    }

    pub fn viewport(&self) -> Option<Viewport> {
        self.session.as_ref().map(|s| s.viewport)
    }

    pub fn tilt(&self) -> Option<TiltState> {
        self.session.as_ref().map(|s| s.tilt.state())
    }

    pub fn input_mode(&self) -> Option<InputMode> {
        self.session.as_ref().map(|s| s.tilt.mode())
    }

    pub fn is_locked(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.tilt.is_locked())
    }

    pub fn color_shift(&self) -> f32 {
        self.session.as_ref().map_or(0.0, |s| s.color_shift)
    }

    pub fn particles(&self) -> Option<&ParticleSystem> {
        self.session.as_ref().map(|s| &s.particles)
    }

    pub fn terrain_profile(&self) -> Option<&TerrainProfile> {
        self.session.as_ref().map(|s| &s.profile)
    }

    pub fn aurora_active(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.aurora.is_active())
    }

    pub fn frame_count(&self) -> u64 {
        self.session.as_ref().map_or(0, |s| s.clock.frame())
    }

    pub fn elapsed(&self) -> f32 {
        self.session.as_ref().map_or(0.0, |s| s.clock.elapsed())
    }

    pub fn fps(&self) -> f32 {
        self.session.as_ref().map_or(0.0, |s| s.clock.fps())
    }
}

impl<B: RenderBackend> Drop for Compositor<B> {
    fn drop(&mut self) {
        self.stop();
    }
}

fn poll_interval(secs: f64) -> Duration {
    match Duration::try_from_secs_f64(secs) {
        Ok(interval) if !interval.is_zero() => interval,
        _ => {
            let fallback = IntensityConfig::default().poll_interval_secs;
            log::warn!(
                "Invalid Kp poll interval {}s; using {}s",
                secs,
                fallback
            );
            Duration::from_secs_f64(fallback)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::HeadlessBackend;
    use crate::sensor::{OrientationReading, ScriptedSensor};

    fn config() -> RendererConfig {
        RendererConfig {
            seed: Some(1),
            fixed_timestep: Some(1.0 / 60.0),
            ..RendererConfig::default()
        }
    }

    fn running() -> Compositor<HeadlessBackend> {
        let mut compositor = Compositor::new(config(), HeadlessBackend::new());
        compositor.start(Viewport::new(800, 600));
        compositor
    }

    #[test]
    fn test_lifecycle() {
        let mut compositor = Compositor::new(config(), HeadlessBackend::new());
        assert_eq!(compositor.state(), RendererState::Stopped);
        assert!(matches!(compositor.frame(), Err(RenderError::NotRunning)));

        compositor.start(Viewport::new(800, 600));
        assert_eq!(compositor.state(), RendererState::Running);
        compositor.start(Viewport::new(10, 10));
        assert_eq!(compositor.viewport(), Some(Viewport::new(800, 600)));
        assert_eq!(compositor.backend().programs_compiled(), 1);

        compositor.frame().unwrap();
        compositor.stop();
        compositor.stop();
        assert_eq!(compositor.state(), RendererState::Stopped);
        assert!(compositor.frame().is_err());
        assert_eq!(compositor.backend().frames_presented(), 1);
    }

    #[test]
    fn test_layers_in_order() {
        let mut compositor = running();
        compositor.frame().unwrap();
        let record = compositor.backend().last_frame().unwrap();
        assert!(record.background_triangles > 0);
        assert!(record.aurora.is_some());
        assert!(record.foreground_triangles > 0);
    }

    #[test]
    fn test_surge_decays() {
        let mut compositor = running();
        compositor.surge();
        assert_eq!(compositor.color_shift(), 1.0);
        compositor.frame().unwrap();
        assert!((compositor.color_shift() - 0.95).abs() < 1e-4);
        for _ in 0..120 {
            compositor.frame().unwrap();
        }
        assert!(compositor.color_shift() < 0.01);
    }

    #[test]
    fn test_lock_toggle() {
        let mut compositor = running();
        compositor.toggle_lock();
        assert!(compositor.is_locked());
        compositor.on_pointer_moved(Vec2::new(800.0, 600.0));
        compositor.frame().unwrap();
        let target = compositor.tilt().unwrap().target;
        assert!(target.x.abs() <= 0.1 + 1e-6);
        compositor.toggle_lock();
        assert!(!compositor.is_locked());
    }

    #[test]
    fn test_orientation_granted_drives_tilt() {
        let reading = OrientationReading {
            alpha: 0.0,
            beta: 90.0,
            gamma: 45.0,
        };
        let mut config = config();
        config.tilt.idle_amplitude = 0.0;
        let mut compositor = Compositor::new(config, HeadlessBackend::new())
            .with_sensor(ScriptedSensor::new([reading]));
        compositor.start(Viewport::new(400, 400));
        assert_eq!(
            compositor.set_input_mode(InputMode::Orientation),
            InputMode::Orientation
        );
        compositor.frame().unwrap();
        assert_eq!(compositor.tilt().unwrap().target, Vec2::ONE);
    }

    #[test]
    fn test_no_sensor_falls_back() {
        let mut compositor = running();
        assert_eq!(
            compositor.set_input_mode(InputMode::Orientation),
            InputMode::Pointer
        );
        assert_eq!(compositor.input_mode(), Some(InputMode::Pointer));
    }

    #[test]
    fn test_zero_resize_ignored() {
        let mut compositor = running();
        compositor.on_resize(Viewport::new(0, 0));
        compositor.frame().unwrap();
        assert_eq!(compositor.viewport(), Some(Viewport::new(800, 600)));
    }

    #[test]
    fn test_inputs_ignored_when_stopped() {
        let mut compositor = Compositor::new(config(), HeadlessBackend::new());
        compositor.on_pointer_moved(Vec2::ZERO);
        compositor.on_resize(Viewport::new(100, 100));
        compositor.surge();
        compositor.toggle_lock();
        assert!(compositor.tilt().is_none());
        assert!(!compositor.is_locked());
        assert_eq!(compositor.color_shift(), 0.0);
    }

    #[test]
    fn test_restart_reuses_program_slot() {
        let mut compositor = running();
        for _ in 0..3 {
            compositor.stop();
            compositor.start(Viewport::new(800, 600));
        }
        compositor.frame().unwrap();
        assert_eq!(compositor.backend().programs_compiled(), 4);
        let record = compositor.backend().last_frame().unwrap();
        assert_eq!(record.aurora.unwrap().program.index(), 0);
        assert!(compositor.backend().program_source().is_some());
    }

    #[test]
    fn test_try_new_rejects_invalid_config() {
        let mut bad = config();
        bad.intensity.poll_interval_secs = -1.0;
        assert!(matches!(
            Compositor::try_new(bad, HeadlessBackend::new()),
            Err(ConfigError::Invalid(_))
        ));
        assert!(Compositor::try_new(config(), HeadlessBackend::new()).is_ok());
    }

    #[test]
    fn test_unvalidated_config_still_starts() {
        use crate::intensity::StaticKpSource;

        let mut bad = config();
        bad.intensity.poll_interval_secs = -1.0;
        bad.terrain.step = 0.0;
        assert!(bad.validate().is_err());

        let mut compositor = Compositor::new(bad, HeadlessBackend::new())
            .with_kp_source(Arc::new(StaticKpSource(3.0)));
        compositor.start(Viewport::new(400, 300));
        compositor.frame().unwrap();
        assert!(compositor.terrain_profile().unwrap().len() > 1);
        compositor.stop();
    }

    #[test]
    fn test_poll_interval_fallback() {
        assert_eq!(poll_interval(60.0), Duration::from_secs(60));
        for secs in [-1.0, 0.0, f64::NAN, f64::INFINITY] {
            assert_eq!(poll_interval(secs), Duration::from_secs(300));
        }
    }
}
