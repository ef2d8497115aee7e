//! wgpu presentation backend.
//!
//! [`GpuState`] owns the surface and device and implements
//! [`RenderBackend`]: every frame is one render pass that clears, draws the
//! background canvas, screen-blends the aurora over it and draws the
//! foreground canvas on top. With the `egui` feature an optional UI overlay
//! is drawn last.

mod aurora_pipeline;
mod canvas_pipeline;
#[cfg(feature = "egui")]
mod egui_integration;

use std::sync::Arc;

use winit::window::Window;

pub use aurora_pipeline::AuroraPrograms;
pub use canvas_pipeline::{CanvasLayer, CanvasPipeline, CANVAS_WGSL};
#[cfg(feature = "egui")]
pub use egui_integration::{EguiFrameOutput, EguiIntegration};

use crate::compositor::{Frame, ProgramHandle, RenderBackend, Viewport};
use crate::error::{GpuError, RenderError, ShaderError};

pub struct GpuState {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    canvas: CanvasPipeline,
    background: CanvasLayer,
    foreground: CanvasLayer,
    aurora: AuroraPrograms,
    #[cfg(feature = "egui")]
    egui: EguiIntegration,
    #[cfg(feature = "egui")]
    overlay: Option<EguiFrameOutput>,
}

impl GpuState {
    pub async fn new(window: Arc<Window>, viewport: Viewport) -> Result<Self, GpuError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });

        #[cfg(feature = "egui")]
        let egui_window = Arc::clone(&window);

        let surface = instance.create_surface(window)?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::LowPower,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or(GpuError::NoAdapter)?;
        log::info!("Using adapter: {}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Borealis Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await?;

        // Blending happens in the same space the colors were authored in
        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| !f.is_srgb())
            .copied()
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or(GpuError::NoSurfaceFormat)?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: viewport.width.max(1),
            height: viewport.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let canvas = CanvasPipeline::new(&device, surface_format, viewport);
        let background = CanvasLayer::new(&device, "Background Layer");
        let foreground = CanvasLayer::new(&device, "Foreground Layer");
        let aurora = AuroraPrograms::new(&device, surface_format);

        #[cfg(feature = "egui")]
        let egui = EguiIntegration::new(&device, surface_format, &egui_window);

        Ok(Self {
            surface,
            device,
            queue,
            config,
            canvas,
            background,
            foreground,
            aurora,
            #[cfg(feature = "egui")]
            egui,
            #[cfg(feature = "egui")]
            overlay: None,
        })
    }

    /// Re-apply the current configuration, after a lost or outdated surface.
    pub fn reconfigure(&mut self) {
        self.surface.configure(&self.device, &self.config);
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.config.format
    }

    #[cfg(feature = "egui")]
    pub fn egui_mut(&mut self) -> &mut EguiIntegration {
        &mut self.egui
    }

    /// UI to draw over the next presented frame.
    #[cfg(feature = "egui")]
    pub fn set_overlay(&mut self, output: EguiFrameOutput) {
        self.overlay = Some(output);
    }
}

impl RenderBackend for GpuState {
    fn resize(&mut self, viewport: Viewport) {
        if viewport.is_empty() {
            return;
        }
        self.config.width = viewport.width;
        self.config.height = viewport.height;
        self.surface.configure(&self.device, &self.config);
        self.canvas.resize(&self.queue, viewport);
    }

    fn compile_program(&mut self, vertex: &str, fragment: &str) -> Result<ProgramHandle, ShaderError> {
        self.aurora.compile(&self.device, vertex, fragment)
    }

    fn present(&mut self, frame: &Frame<'_>) -> Result<(), RenderError> {
        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        self.background
            .upload(&self.device, &self.queue, frame.background);
        self.foreground
            .upload(&self.device, &self.queue, frame.foreground);
        if let Some(draw) = &frame.aurora {
            self.aurora.prepare(&self.queue, draw);
        }

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        #[cfg(feature = "egui")]
        let overlay = self.overlay.take();
        #[cfg(feature = "egui")]
        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [self.config.width, self.config.height],
            pixels_per_point: overlay.as_ref().map_or(1.0, |o| o.pixels_per_point),
        };
        #[cfg(feature = "egui")]
        if let Some(overlay) = &overlay {
            self.egui.prepare(
                &self.device,
                &self.queue,
                &mut encoder,
                overlay,
                &screen_descriptor,
            );
        }

        {
            let [r, g, b, a] = frame.clear_color;
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Composite Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: r as f64,
                            g: g as f64,
                            b: b as f64,
                            a: a as f64,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            self.canvas
                .draw(&mut render_pass, &self.background, frame.background);
            if frame.aurora.is_some() {
                self.aurora.draw(&mut render_pass);
            }
            self.canvas
                .draw(&mut render_pass, &self.foreground, frame.foreground);

            #[cfg(feature = "egui")]
            if let Some(overlay) = &overlay {
                let mut render_pass = render_pass.forget_lifetime();
                self.egui.renderer().render(
                    &mut render_pass,
                    &overlay.paint_jobs,
                    &screen_descriptor,
                );
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        #[cfg(feature = "egui")]
        if let Some(overlay) = &overlay {
            self.egui.cleanup(overlay);
        }

        Ok(())
    }
}
