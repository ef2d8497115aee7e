//! GPU programs for the aurora layer.
//!
//! Only one program is live at a time: a successful compile replaces the
//! previous pipeline and reuses handle 0. The full-screen quad, the uniform
//! buffer and its bind group outlive recompiles. Shader modules are created
//! inside validation error scopes, so a bad source comes back as a
//! [`ShaderError`] instead of tripping the device's uncaptured error handler.

use wgpu::util::DeviceExt;

use crate::aurora::{AuroraDraw, AuroraUniforms, FULLSCREEN_QUAD};
use crate::compositor::ProgramHandle;
use crate::error::{ShaderError, ShaderStage};

/// Screen blend: `src * (1 - dst) + dst`. Destination alpha is kept.
const SCREEN_BLENDING: wgpu::BlendState = wgpu::BlendState {
    color: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::OneMinusDst,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
    alpha: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::Zero,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
};

pub struct AuroraPrograms {
    format: wgpu::TextureFormat,
    layout: wgpu::PipelineLayout,
    quad_buffer: wgpu::Buffer,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    pipeline: Option<wgpu::RenderPipeline>,
}

impl AuroraPrograms {
    pub fn new(device: &wgpu::Device, format: wgpu::TextureFormat) -> Self {
        let quad_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Aurora Quad Buffer"),
            contents: bytemuck::cast_slice(&FULLSCREEN_QUAD),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Aurora Uniform Buffer"),
            contents: bytemuck::bytes_of(&AuroraUniforms::default()),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Aurora Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Aurora Bind Group"),
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Aurora Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        Self {
            format,
            layout,
            quad_buffer,
            uniform_buffer,
            bind_group,
            pipeline: None,
        }
    }

    /// Compile both stages and link them into a pipeline.
    pub fn compile(
        &mut self,
        device: &wgpu::Device,
        vertex: &str,
        fragment: &str,
    ) -> Result<ProgramHandle, ShaderError> {
        let vertex_module = create_module(device, vertex, ShaderStage::Vertex)?;
        let fragment_module = create_module(device, fragment, ShaderStage::Fragment)?;

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Aurora Pipeline"),
            layout: Some(&self.layout),
            vertex: wgpu::VertexState {
                module: &vertex_module,
                entry_point: Some("vs_main"),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<[f32; 2]>() as wgpu::BufferAddress,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &wgpu::vertex_attr_array![0 => Float32x2],
                }],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &fragment_module,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: self.format,
                    blend: Some(SCREEN_BLENDING),
                    write_mask: wgpu::ColorWrites::COLOR,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });
        if let Some(e) = pollster::block_on(device.pop_error_scope()) {
            return Err(ShaderError::new(ShaderStage::Link, e.to_string()));
        }

        self.pipeline = Some(pipeline);
        Ok(ProgramHandle::new(0))
    }

    /// Upload this frame's uniforms. Call before the render pass starts.
    pub fn prepare(&self, queue: &wgpu::Queue, draw: &AuroraDraw) {
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&draw.uniforms));
    }

    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        let Some(pipeline) = &self.pipeline else {
            return;
        };
        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, &self.bind_group, &[]);
        pass.set_vertex_buffer(0, self.quad_buffer.slice(..));
        pass.draw(0..FULLSCREEN_QUAD.len() as u32, 0..1);
    }
}

fn create_module(
    device: &wgpu::Device,
    source: &str,
    stage: ShaderStage,
) -> Result<wgpu::ShaderModule, ShaderError> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(match stage {
            ShaderStage::Vertex => "Aurora Vertex Shader",
            _ => "Aurora Fragment Shader",
        }),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });
    match pollster::block_on(device.pop_error_scope()) {
        Some(e) => Err(ShaderError::new(stage, e.to_string())),
        None => Ok(module),
    }
}
