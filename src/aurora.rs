//! Aurora shader engine.
//!
//! The aurora is a single full-screen quad whose fragment shader sums a few
//! octaves of 3D simplex noise, each octave squeezed through a `smoothstep`
//! band so the result reads as hanging curtains rather than clouds. The band
//! field is shaped by a vertical envelope, colored by a two-stop ramp picked
//! from the Kp intensity, and composited over the background with a screen
//! blend.
//!
//! This module owns the WGSL sources and the per-frame uniform block. It does
//! not touch the GPU itself; programs are compiled through a
//! [`RenderBackend`], and a failed compile merely switches the layer off.

use bytemuck::{Pod, Zeroable};
use glam::Vec2;

use crate::compositor::{ProgramHandle, RenderBackend};
use crate::config::AuroraConfig;
use crate::error::ShaderError;
use crate::noise::NOISE_WGSL;
use crate::palette::ColorRamp;

/// Two triangles covering clip space.
pub const FULLSCREEN_QUAD: [[f32; 2]; 6] = [
    [-1.0, -1.0],
    [1.0, -1.0],
    [-1.0, 1.0],
    [-1.0, 1.0],
    [1.0, -1.0],
    [1.0, 1.0],
];

/// Position-only vertex stage.
pub const VERTEX_WGSL: &str = r#"
struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
};

@vertex
fn vs_main(@location(0) position: vec2<f32>) -> VertexOutput {
    var out: VertexOutput;
    out.clip_position = vec4<f32>(position, 0.0, 1.0);
    return out;
}
"#;

/// Uniform block shared by both stages, 16-byte aligned.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct AuroraUniforms {
    /// Viewport size in physical pixels.
    pub resolution: [f32; 2],
    /// Smoothed tilt in `[-1, 1]²`.
    pub tilt: [f32; 2],
    /// Ramp start color, alpha unused.
    pub color_a: [f32; 4],
    /// Ramp end color, alpha unused.
    pub color_b: [f32; 4],
    /// Elapsed seconds.
    pub time: f32,
    /// Kp index normalized to `[0, 1]`.
    pub intensity: f32,
    /// Decaying surge value in `[0, 1]`.
    pub color_shift: f32,
    /// Layer opacity, premultiplied into the output.
    pub opacity: f32,
}

impl Default for AuroraUniforms {
    fn default() -> Self {
        Self::zeroed()
    }
}

/// Generate the fragment stage for the given settings.
pub fn fragment_source(config: &AuroraConfig) -> String {
    format!(
        r#"
struct Uniforms {{
    resolution: vec2<f32>,
    tilt: vec2<f32>,
    color_a: vec4<f32>,
    color_b: vec4<f32>,
    time: f32,
    intensity: f32,
    color_shift: f32,
    opacity: f32,
}};

@group(0) @binding(0)
var<uniform> uniforms: Uniforms;
{noise}
const OCTAVES: i32 = {octaves};
const FREQUENCY: f32 = {frequency:.4};
const PARALLAX: f32 = {parallax:.4};
const SPEED: f32 = {speed:.4};

// Sum of banded noise octaves, roughly [0, 2)
fn aurora_field(pos: vec3<f32>) -> f32 {{
    var total = 0.0;
    var scale = 1.0;
    for (var i = 0; i < OCTAVES; i++) {{
        let p = vec3<f32>(pos.x * scale, pos.y * scale * 0.25, pos.z * scale);
        let n = noise3(p);
        let band = smoothstep(0.35, 0.65, n * 0.5 + 0.5);
        total += band / scale;
        scale *= 2.0;
    }}
    return total;
}}

@fragment
fn fs_main(@builtin(position) frag_coord: vec4<f32>) -> @location(0) vec4<f32> {{
    let resolution = max(uniforms.resolution, vec2<f32>(1.0));
    var uv = frag_coord.xy / resolution;
    uv.y = 1.0 - uv.y;
    uv += uniforms.tilt * PARALLAX;

    let aspect = resolution.x / resolution.y;
    let pos = vec3<f32>(uv.x * aspect * FREQUENCY, uv.y * FREQUENCY, uniforms.time * SPEED);
    var aurora = aurora_field(pos);

    // Curtain envelope: bright band in the upper sky, rippling sideways
    let wave = noise2(vec2<f32>(uv.x * 1.5, uniforms.time * 0.1));
    let curtain = 1.0 - smoothstep(0.0, 0.4, abs(uv.y - 0.65 + wave * 0.2 + uniforms.tilt.y * 0.1));
    aurora *= curtain;

    let ramp = clamp(uniforms.color_shift + uv.y * 0.5 + wave * 0.3 + uniforms.intensity * 0.3, 0.0, 1.0);
    let color = mix(uniforms.color_a.rgb, uniforms.color_b.rgb, smoothstep(0.0, 1.0, ramp));

    let brightness = aurora * (0.8 + uniforms.intensity * 0.7);
    let rgb = clamp(color * brightness, vec3<f32>(0.0), vec3<f32>(1.0)) * uniforms.opacity;
    return vec4<f32>(rgb, uniforms.opacity);
}}
"#,
        noise = NOISE_WGSL,
        octaves = config.octaves,
        frequency = config.frequency,
        parallax = config.parallax,
        speed = config.speed,
    )
}

/// What the backend needs to draw the aurora this frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AuroraDraw {
    pub program: ProgramHandle,
    pub uniforms: AuroraUniforms,
}

/// Owns the aurora program handle and uniform state.
#[derive(Debug)]
pub struct AuroraEngine {
    config: AuroraConfig,
    program: Option<ProgramHandle>,
    uniforms: AuroraUniforms,
    failure: Option<ShaderError>,
}

impl AuroraEngine {
    pub fn new(config: &AuroraConfig) -> Self {
        Self {
            config: config.clone(),
            program: None,
            uniforms: AuroraUniforms {
                opacity: config.opacity,
                ..AuroraUniforms::default()
            },
            failure: None,
        }
    }

    /// Compile the generated program.
    ///
    /// Does nothing if the layer is disabled in the config. On failure the
    /// error is logged and kept, and the layer stays off for the session.
    pub fn compile<B: RenderBackend>(&mut self, backend: &mut B) -> Result<(), ShaderError> {
        if !self.config.enabled {
            log::info!("Aurora layer disabled by configuration");
            return Ok(());
        }
        let fragment = fragment_source(&self.config);
        self.compile_with(backend, VERTEX_WGSL, &fragment)
    }

    /// Compile caller-supplied sources instead of the generated ones.
    pub fn compile_with<B: RenderBackend>(
        &mut self,
        backend: &mut B,
        vertex: &str,
        fragment: &str,
    ) -> Result<(), ShaderError> {
        match backend.compile_program(vertex, fragment) {
            Ok(handle) => {
                log::info!("Aurora shader compiled ({} octaves)", self.config.octaves);
                self.program = Some(handle);
                self.failure = None;
                Ok(())
            }
            Err(e) => {
                log::error!("{}", e);
                log::warn!("Aurora layer disabled; particles and terrain continue");
                self.program = None;
                self.failure = Some(e.clone());
                Err(e)
            }
        }
    }

    /// Refresh the uniform block for this frame.
    pub fn set_uniforms(
        &mut self,
        time: f32,
        resolution: Vec2,
        tilt: Vec2,
        intensity: u8,
        color_shift: f32,
    ) {
        let (color_a, color_b) = ColorRamp::from_intensity(intensity).colors();
        self.uniforms = AuroraUniforms {
            resolution: resolution.to_array(),
            tilt: tilt.to_array(),
            color_a: color_a.extend(1.0).to_array(),
            color_b: color_b.extend(1.0).to_array(),
            time,
            intensity: f32::from(intensity.min(9)) / 9.0,
            color_shift: color_shift.clamp(0.0, 1.0),
            opacity: self.config.opacity,
        };
    }

    /// The draw for this frame, or `None` while the layer is off.
    pub fn draw(&self) -> Option<AuroraDraw> {
        self.program.map(|program| AuroraDraw {
            program,
            uniforms: self.uniforms,
        })
    }

    pub fn uniforms(&self) -> &AuroraUniforms {
        &self.uniforms
    }

    pub fn is_active(&self) -> bool {
        self.program.is_some()
    }

    /// The compile error that switched the layer off, if any.
    pub fn failure(&self) -> Option<&ShaderError> {
        self.failure.as_ref()
    }
}
