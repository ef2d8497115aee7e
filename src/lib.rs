//! # Borealis
//!
//! An animated aurora background: a starfield with drifting embers and
//! meteors, a procedurally shaded aurora whose color follows the live
//! geomagnetic Kp index, and a parallax mountain silhouette, all tilting
//! with the device orientation or the pointer.
//!
//! ## Quick Start
//!
//! ```ignore
//! use borealis::prelude::*;
//!
//! fn main() -> Result<(), AppError> {
//!     env_logger::init();
//!     Borealis::new()
//!         .with_config(RendererConfig {
//!             chrome: true,
//!             ..Default::default()
//!         })
//!         .run()
//! }
//! ```
//!
//! ## Layers
//!
//! Each frame is composited back to front:
//!
//! 1. **Background**: sky gradient plus [`particles`] (stars, embers,
//!    meteors), drawn into a [`canvas::DrawList`].
//! 2. **Aurora**: a full-screen fragment program built by [`aurora`] from
//!    simplex [`noise`], screen-blended over the background.
//! 3. **Foreground**: the [`terrain`] silhouette or wave bands.
//!
//! Every layer is offset by the smoothed tilt from [`tilt`], scaled by its
//! depth, so nearer layers move further.
//!
//! ## Running Without a Window
//!
//! The [`compositor::Compositor`] is generic over its
//! [`RenderBackend`](compositor::RenderBackend). The wgpu backend lives in
//! [`gpu`]; [`backend::HeadlessBackend`] records frames instead of drawing
//! them, which is what the tests and benchmarks use:
//!
//! ```ignore
//! use borealis::prelude::*;
//!
//! let mut compositor = Compositor::new(RendererConfig::default(), HeadlessBackend::new());
//! compositor.start(Viewport::new(1280, 720));
//! compositor.frame()?;
//! ```
//!
//! ## Intensity
//!
//! [`intensity`] polls NOAA's planetary K-index feed on a background thread
//! and publishes the rounded value through a shared
//! [`IntensitySignal`](intensity::IntensitySignal). Any fetch failure reads as
//! Kp 0; the aurora keeps running on the calm palette.

pub mod app;
pub mod aurora;
pub mod backend;
pub mod canvas;
#[cfg(feature = "egui")]
pub mod chrome;
pub mod compositor;
pub mod config;
pub mod error;
pub mod gpu;
pub mod input;
pub mod intensity;
pub mod noise;
pub mod palette;
pub mod particles;
pub mod sensor;
pub mod terrain;
pub mod tilt;
pub mod time;

pub use glam::{Vec2, Vec3, Vec4};

pub use app::Borealis;
pub use compositor::{Compositor, RenderBackend, RendererState, Viewport};
pub use config::RendererConfig;
pub use error::{AppError, ConfigError, FetchError, GpuError, RenderError, ShaderError};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::app::Borealis;
    pub use crate::backend::HeadlessBackend;
    pub use crate::compositor::{Compositor, RenderBackend, RendererState, Viewport};
    pub use crate::config::{
        AuroraConfig, IntensityConfig, ParticleConfig, RendererConfig, TerrainConfig,
        TerrainStyle, TiltConfig,
    };
    pub use crate::error::{AppError, RenderError};
    pub use crate::intensity::{IntensitySignal, KpSource, NoaaKpSource, StaticKpSource};
    pub use crate::palette::ColorRamp;
    pub use crate::sensor::{OrientationReading, OrientationSensor, Permission};
    pub use crate::tilt::InputMode;
    pub use glam::{Vec2, Vec3, Vec4};
}
