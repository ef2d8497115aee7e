//! GPU side of the 2D canvas layers.
//!
//! Both raster layers share one pair of pipelines (normal and additive
//! blending) and a screen-size uniform that maps pixel coordinates to clip
//! space. Each layer owns a vertex buffer that grows to fit its draw list.

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use crate::canvas::{BlendMode, CanvasVertex, DrawList};
use crate::compositor::Viewport;

/// Pixel-space vertex colors.
pub const CANVAS_WGSL: &str = r#"
struct Screen {
    size: vec2<f32>,
    _pad: vec2<f32>,
};

@group(0) @binding(0)
var<uniform> screen: Screen;

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) color: vec4<f32>,
};

@vertex
fn vs_main(@location(0) position: vec2<f32>, @location(1) color: vec4<f32>) -> VertexOutput {
    var out: VertexOutput;
    let ndc = vec2<f32>(
        position.x / screen.size.x * 2.0 - 1.0,
        1.0 - position.y / screen.size.y * 2.0,
    );
    out.clip_position = vec4<f32>(ndc, 0.0, 1.0);
    out.color = color;
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return in.color;
}
"#;

/// Additive blending, the `lighter` composite operation.
const LIGHTER_BLENDING: wgpu::BlendState = wgpu::BlendState {
    color: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::SrcAlpha,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
    alpha: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
};

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct ScreenUniform {
    size: [f32; 2],
    _pad: [f32; 2],
}

/// Pipelines and shared bindings for canvas layers.
pub struct CanvasPipeline {
    normal: wgpu::RenderPipeline,
    lighter: wgpu::RenderPipeline,
    screen_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

impl CanvasPipeline {
    pub fn new(device: &wgpu::Device, format: wgpu::TextureFormat, viewport: Viewport) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Canvas Shader"),
            source: wgpu::ShaderSource::Wgsl(CANVAS_WGSL.into()),
        });

        let screen_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Canvas Screen Buffer"),
            contents: bytemuck::bytes_of(&screen_uniform(viewport)),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Canvas Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Canvas Bind Group"),
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: screen_buffer.as_entire_binding(),
            }],
        });

        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Canvas Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let normal = create_pipeline(
            device,
            &layout,
            &shader,
            format,
            wgpu::BlendState::ALPHA_BLENDING,
            "Canvas Pipeline (normal)",
        );
        let lighter = create_pipeline(
            device,
            &layout,
            &shader,
            format,
            LIGHTER_BLENDING,
            "Canvas Pipeline (lighter)",
        );

        Self {
            normal,
            lighter,
            screen_buffer,
            bind_group,
        }
    }

    pub fn resize(&self, queue: &wgpu::Queue, viewport: Viewport) {
        queue.write_buffer(
            &self.screen_buffer,
            0,
            bytemuck::bytes_of(&screen_uniform(viewport)),
        );
    }

    /// Draw an uploaded layer, one draw call per blend batch.
    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>, layer: &CanvasLayer, list: &DrawList) {
        if list.is_empty() {
            return;
        }
        pass.set_bind_group(0, &self.bind_group, &[]);
        pass.set_vertex_buffer(0, layer.buffer.slice(..));
        for batch in list.batches() {
            let pipeline = match batch.blend {
                BlendMode::Normal => &self.normal,
                BlendMode::Lighter => &self.lighter,
            };
            pass.set_pipeline(pipeline);
            pass.draw(batch.vertices.clone(), 0..1);
        }
    }
}

fn screen_uniform(viewport: Viewport) -> ScreenUniform {
    ScreenUniform {
        size: [viewport.width.max(1) as f32, viewport.height.max(1) as f32],
        _pad: [0.0; 2],
    }
}

fn create_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    format: wgpu::TextureFormat,
    blend: wgpu::BlendState,
    label: &str,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some("vs_main"),
            buffers: &[wgpu::VertexBufferLayout {
                array_stride: std::mem::size_of::<CanvasVertex>() as wgpu::BufferAddress,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x4],
            }],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(blend),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            cull_mode: None,
            ..Default::default()
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

/// Vertex storage for one canvas layer.
pub struct CanvasLayer {
    label: &'static str,
    buffer: wgpu::Buffer,
    /// Capacity in vertices.
    capacity: usize,
}

impl CanvasLayer {
    const INITIAL_CAPACITY: usize = 16 * 1024;

    pub fn new(device: &wgpu::Device, label: &'static str) -> Self {
        Self {
            label,
            buffer: create_vertex_buffer(device, label, Self::INITIAL_CAPACITY),
            capacity: Self::INITIAL_CAPACITY,
        }
    }

    /// Copy the list's vertices to the GPU, growing the buffer if needed.
    pub fn upload(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, list: &DrawList) {
        let vertices = list.vertices();
        if vertices.is_empty() {
            return;
        }
        if vertices.len() > self.capacity {
            self.capacity = vertices.len().next_power_of_two();
            self.buffer = create_vertex_buffer(device, self.label, self.capacity);
            log::debug!("{} grown to {} vertices", self.label, self.capacity);
        }
        queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(vertices));
    }
}

fn create_vertex_buffer(device: &wgpu::Device, label: &str, capacity: usize) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: (capacity * std::mem::size_of::<CanvasVertex>()) as wgpu::BufferAddress,
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}
