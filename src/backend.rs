//! Headless render backend.
//!
//! Records what would have been drawn instead of drawing it. Used by the
//! integration tests and benchmarks, and anywhere the render loop has to run
//! without a window.

use std::collections::VecDeque;

use crate::aurora::AuroraDraw;
use crate::canvas::{BlendMode, DrawList};
use crate::compositor::{Frame, ProgramHandle, RenderBackend, Viewport};
use crate::error::{RenderError, ShaderError, ShaderStage};

/// How many presented frames are kept.
const FRAME_HISTORY: usize = 240;

/// Summary of one layer of a presented frame.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerRecord {
    pub triangles: usize,
    pub blends: Vec<BlendMode>,
}

impl LayerRecord {
    fn of(list: &DrawList) -> Self {
        Self {
            triangles: list.triangle_count(),
            blends: list.batches().iter().map(|b| b.blend).collect(),
        }
    }
}

/// Summary of one presented frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameRecord {
    pub viewport: Viewport,
    pub background_triangles: usize,
    pub background: LayerRecord,
    pub aurora: Option<AuroraDraw>,
    pub foreground_triangles: usize,
    pub foreground: LayerRecord,
}

/// A [`RenderBackend`] without a GPU.
#[derive(Debug, Default)]
pub struct HeadlessBackend {
    viewport: Option<Viewport>,
    resizes: usize,
    /// Fragment source of the live program; a compile replaces it.
    program: Option<String>,
    compiles: usize,
    fail_shaders: bool,
    presented: u64,
    history: VecDeque<FrameRecord>,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every shader compilation fail, as a driver without WGSL
    /// support would.
    pub fn failing_shaders(mut self) -> Self {
        self.fail_shaders = true;
        self
    }

    /// Size of the last resize, i.e. the current surface size.
    pub fn viewport(&self) -> Option<Viewport> {
        self.viewport
    }

    pub fn resize_count(&self) -> usize {
        self.resizes
    }

    /// Successful compiles since creation.
    pub fn programs_compiled(&self) -> usize {
        self.compiles
    }

    /// Fragment source of the program frames are drawn with.
    pub fn program_source(&self) -> Option<&str> {
        self.program.as_deref()
    }

    pub fn frames_presented(&self) -> u64 {
        self.presented
    }

    pub fn last_frame(&self) -> Option<&FrameRecord> {
        self.history.back()
    }

    /// The most recent frames, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &FrameRecord> {
        self.history.iter()
    }
}

impl RenderBackend for HeadlessBackend {
    fn resize(&mut self, viewport: Viewport) {
        self.viewport = Some(viewport);
        self.resizes += 1;
    }

    fn compile_program(&mut self, vertex: &str, fragment: &str) -> Result<ProgramHandle, ShaderError> {
        if self.fail_shaders {
            return Err(ShaderError::new(
                ShaderStage::Fragment,
                "shader compilation unavailable on this backend",
            ));
        }
        if !vertex.contains("@vertex") {
            return Err(ShaderError::new(ShaderStage::Vertex, "no @vertex entry point"));
        }
        if !fragment.contains("@fragment") {
            return Err(ShaderError::new(ShaderStage::Fragment, "no @fragment entry point"));
        }
        self.program = Some(fragment.to_string());
        self.compiles += 1;
        Ok(ProgramHandle::new(0))
    }

    fn present(&mut self, frame: &Frame<'_>) -> Result<(), RenderError> {
        let background = LayerRecord::of(frame.background);
        let foreground = LayerRecord::of(frame.foreground);
        if self.history.len() == FRAME_HISTORY {
            self.history.pop_front();
        }
        self.history.push_back(FrameRecord {
            viewport: frame.viewport,
            background_triangles: background.triangles,
            background,
            aurora: frame.aurora,
            foreground_triangles: foreground.triangles,
            foreground,
        });
        self.presented += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aurora::VERTEX_WGSL;

    #[test]
    fn test_compile_checks_entry_points() {
        let mut backend = HeadlessBackend::new();
        let err = backend.compile_program("", "@fragment fn fs_main() {}").unwrap_err();
        assert_eq!(err.stage, ShaderStage::Vertex);
        let handle = backend
            .compile_program(VERTEX_WGSL, "@fragment fn fs_main() {}")
            .unwrap();
        assert_eq!(handle.index(), 0);
    }

    #[test]
    fn test_recompile_replaces_program() {
        let mut backend = HeadlessBackend::new();
        backend
            .compile_program(VERTEX_WGSL, "@fragment fn fs_main() {}")
            .unwrap();
        let handle = backend
            .compile_program(VERTEX_WGSL, "@fragment fn fs_main() { let x = 1; }")
            .unwrap();
        assert_eq!(handle.index(), 0);
        assert_eq!(backend.programs_compiled(), 2);
        assert_eq!(backend.program_source(), Some("@fragment fn fs_main() { let x = 1; }"));
    }

    #[test]
    fn test_history_is_bounded() {
        let mut backend = HeadlessBackend::new();
        let list = DrawList::new();
        let frame = Frame {
            viewport: Viewport::new(4, 4),
            clear_color: [0.0; 4],
            background: &list,
            aurora: None,
            foreground: &list,
        };
        for _ in 0..FRAME_HISTORY + 10 {
            backend.present(&frame).unwrap();
        }
        assert_eq!(backend.history().count(), FRAME_HISTORY);
        assert_eq!(backend.frames_presented(), (FRAME_HISTORY + 10) as u64);
    }
}
