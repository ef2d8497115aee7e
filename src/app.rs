//! Desktop host: a winit window presenting a [`Compositor`] through wgpu.
//!
//! ```ignore
//! use borealis::prelude::*;
//!
//! fn main() -> Result<(), AppError> {
//!     Borealis::new()
//!         .with_config(RendererConfig::load("borealis.json")?)
//!         .run()
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use winit::{
    application::ApplicationHandler,
    dpi::LogicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Window, WindowId},
};

#[cfg(feature = "egui")]
use crate::chrome::{Chrome, ChromeAction, ChromeStatus};
use crate::compositor::{Compositor, Viewport};
use crate::config::RendererConfig;
use crate::error::{AppError, RenderError};
use crate::gpu::GpuState;
use crate::input::{Input, InputEvent, Shortcut};
use crate::intensity::{KpSource, NoaaKpSource};
use crate::sensor::OrientationSensor;
use crate::tilt::InputMode;

/// Application builder.
pub struct Borealis {
    config: RendererConfig,
    kp_source: Option<Arc<dyn KpSource>>,
    sensor: Option<Box<dyn OrientationSensor>>,
}

impl Default for Borealis {
    fn default() -> Self {
        Self::new()
    }
}

impl Borealis {
    pub fn new() -> Self {
        Self {
            config: RendererConfig::default(),
            kp_source: None,
            sensor: None,
        }
    }

    pub fn with_config(mut self, config: RendererConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the NOAA feed with another Kp source.
    pub fn with_kp_source(mut self, source: Arc<dyn KpSource>) -> Self {
        self.kp_source = Some(source);
        self
    }

    /// Orientation sensor for gyroscope mode. Without one, selecting
    /// gyroscope mode falls back to the pointer.
    pub fn with_sensor(mut self, sensor: impl OrientationSensor + 'static) -> Self {
        self.sensor = Some(Box::new(sensor));
        self
    }

    /// Open the window and run until it is closed.
    ///
    /// An invalid config is rejected before any window is created.
    pub fn run(self) -> Result<(), AppError> {
        self.config.validate()?;
        if self.config.chrome && !cfg!(feature = "egui") {
            log::warn!("chrome requested but the `egui` feature is disabled; drawing layers only");
        }

        let kp_source = match self.kp_source {
            Some(source) => Some(source),
            None if self.config.intensity.enabled => {
                let timeout = Duration::from_secs(self.config.intensity.timeout_secs);
                match NoaaKpSource::new(self.config.intensity.url.clone(), timeout) {
                    Ok(source) => Some(Arc::new(source) as Arc<dyn KpSource>),
                    Err(e) => {
                        log::error!("Kp feed unavailable: {}", e);
                        None
                    }
                }
            }
            None => None,
        };

        let event_loop = EventLoop::new()?;
        event_loop.set_control_flow(ControlFlow::Poll);

        let mut app = App {
            config: self.config,
            kp_source,
            sensor: self.sensor,
            window: None,
            compositor: None,
            input: Input::new(),
            #[cfg(feature = "egui")]
            chrome: Chrome::new(),
            error: None,
        };
        event_loop.run_app(&mut app)?;

        match app.error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

struct App {
    config: RendererConfig,
    kp_source: Option<Arc<dyn KpSource>>,
    sensor: Option<Box<dyn OrientationSensor>>,
    window: Option<Arc<Window>>,
    compositor: Option<Compositor<GpuState>>,
    input: Input,
    #[cfg(feature = "egui")]
    chrome: Chrome,
    /// First fatal error; returned from `run` once the loop exits.
    error: Option<AppError>,
}

impl App {
    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<(), AppError> {
        let (width, height) = self.config.initial_size;
        let window_attrs = Window::default_attributes()
            .with_title(self.config.window_title.clone())
            .with_inner_size(LogicalSize::new(width, height));
        let window = Arc::new(event_loop.create_window(window_attrs)?);

        let size = window.inner_size();
        let viewport = Viewport::new(size.width, size.height);
        let gpu = pollster::block_on(GpuState::new(Arc::clone(&window), viewport))?;

        let mut compositor = Compositor::new(self.config.clone(), gpu);
        if let Some(sensor) = self.sensor.take() {
            compositor = compositor.with_sensor(sensor);
        }
        if let Some(source) = self.kp_source.take() {
            compositor = compositor.with_kp_source(source);
        }
        compositor.start(viewport);

        window.request_redraw();
        self.window = Some(window);
        self.compositor = Some(compositor);
        Ok(())
    }

    fn apply_shortcut(&mut self, event_loop: &ActiveEventLoop, shortcut: Shortcut) {
        let Some(compositor) = self.compositor.as_mut() else {
            return;
        };
        match shortcut {
            Shortcut::OrientationMode => {
                compositor.set_input_mode(InputMode::Orientation);
            }
            Shortcut::PointerMode => {
                compositor.set_input_mode(InputMode::Pointer);
            }
            Shortcut::ToggleLock => compositor.toggle_lock(),
            Shortcut::Surge => compositor.surge(),
            Shortcut::Quit => {
                compositor.stop();
                event_loop.exit();
            }
        }
    }

    #[cfg(feature = "egui")]
    fn run_chrome(&mut self, window: &Window) {
        let Some(compositor) = self.compositor.as_mut() else {
            return;
        };
        let status = ChromeStatus {
            mode: compositor.input_mode().unwrap_or_default(),
            locked: compositor.is_locked(),
            intensity: compositor.intensity(),
            fps: compositor.fps(),
        };

        let chrome = &mut self.chrome;
        let mut actions = Vec::new();
        let output = compositor
            .backend_mut()
            .egui_mut()
            .run(window, |ctx| actions = chrome.show(ctx, &status));
        compositor.backend_mut().set_overlay(output);

        for action in actions {
            match action {
                ChromeAction::SetMode(mode) => {
                    compositor.set_input_mode(mode);
                }
                ChromeAction::SetLocked(locked) => compositor.set_locked(locked),
                ChromeAction::Surge => compositor.surge(),
            }
        }
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(window) = self.window.clone() else {
            return;
        };

        #[cfg(feature = "egui")]
        if self.config.chrome {
            self.run_chrome(&window);
        }

        let Some(compositor) = self.compositor.as_mut() else {
            return;
        };
        match compositor.frame() {
            Ok(()) => {}
            Err(RenderError::Surface(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated)) => {
                compositor.backend_mut().reconfigure();
            }
            Err(RenderError::Surface(wgpu::SurfaceError::OutOfMemory)) => {
                log::error!("GPU out of memory; exiting");
                compositor.stop();
                event_loop.exit();
                return;
            }
            Err(RenderError::NotRunning) => return,
            Err(e) => log::warn!("Frame skipped: {}", e),
        }
        window.request_redraw();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(e) = self.init(event_loop) {
            log::error!("{}", e);
            self.error = Some(e);
            event_loop.exit();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        #[cfg(feature = "egui")]
        if self.config.chrome {
            if let (Some(window), Some(compositor)) = (&self.window, self.compositor.as_mut()) {
                let consumed = compositor
                    .backend_mut()
                    .egui_mut()
                    .on_window_event(window, &event);
                if consumed {
                    return;
                }
            }
        }

        match event {
            WindowEvent::CloseRequested => {
                if let Some(compositor) = self.compositor.as_mut() {
                    compositor.stop();
                }
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if let Some(compositor) = self.compositor.as_mut() {
                    compositor.on_resize(Viewport::new(size.width, size.height));
                }
            }
            WindowEvent::RedrawRequested => self.redraw(event_loop),
            other => match self.input.handle_event(&other) {
                Some(InputEvent::Pointer(position)) => {
                    if let Some(compositor) = self.compositor.as_mut() {
                        #[cfg(feature = "egui")]
                        if self.config.chrome && compositor.backend_mut().egui_mut().wants_pointer() {
                            return;
                        }
                        compositor.on_pointer_moved(position);
                    }
                }
                Some(InputEvent::Shortcut(shortcut)) => self.apply_shortcut(event_loop, shortcut),
                None => {}
            },
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(compositor) = self.compositor.as_mut() {
            compositor.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;

    #[test]
    fn test_run_rejects_invalid_config() {
        let mut config = RendererConfig::default();
        config.intensity.poll_interval_secs = -1.0;
        let result = Borealis::new().with_config(config).run();
        assert!(matches!(result, Err(AppError::Config(ConfigError::Invalid(_)))));
    }
}
