//! The GPU port the engine drives.
//!
//! The engine owns every lifecycle decision (which object to release, when to
//! give up); a backend only executes the commands it is handed. Two backends
//! ship with the crate: [`crate::gpu::WgpuBackend`] for real surfaces and
//! [`crate::headless::HeadlessBackend`] for validation and tests.

use crate::context::{CapabilityTier, SurfaceSize};
use crate::error::ShaderStage;

/// Resolved handle to a uniform inside a linked program.
///
/// Both bundled backends use the member's byte offset inside the program's
/// uniform block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UniformLocation(u32);

impl UniformLocation {
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u32 {
        self.0
    }
}

/// How vertex data is laid out in a bound buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexLayout {
    pub components: u32,
    pub normalized: bool,
}

impl VertexLayout {
    /// Two packed, non-normalized floats per vertex.
    pub const PACKED_VEC2: Self = Self {
        components: 2,
        normalized: false,
    };
}

pub trait GpuBackend {
    type Shader;
    type Program;
    type Buffer;

    /// Reconfigures the drawing surface. Must be idempotent.
    fn resize(&mut self, width: u32, height: u32);

    /// Compiles one stage, returning the diagnostic log on failure. A failed
    /// compile leaves nothing allocated.
    fn compile_shader(&mut self, stage: ShaderStage, source: &str) -> Result<Self::Shader, String>;
    fn delete_shader(&mut self, shader: Self::Shader);

    fn create_program(&mut self) -> Result<Self::Program, String>;
    /// Links both stages into `program`, returning the link log on failure.
    fn link_program(
        &mut self,
        program: &mut Self::Program,
        vertex: &Self::Shader,
        fragment: &Self::Shader,
    ) -> Result<(), String>;
    fn delete_program(&mut self, program: Self::Program);

    fn attribute_location(&self, program: &Self::Program, name: &str) -> Option<u32>;
    fn uniform_location(&self, program: &Self::Program, name: &str) -> Option<UniformLocation>;

    /// Allocates a static vertex buffer initialised with `data`.
    fn create_vertex_buffer(&mut self, data: &[f32]) -> Result<Self::Buffer, String>;
    fn delete_buffer(&mut self, buffer: Self::Buffer);

    fn viewport(&mut self, width: u32, height: u32);
    fn use_program(&mut self, program: &Self::Program);
    fn bind_vertex_attribute(&mut self, buffer: &Self::Buffer, location: u32, layout: VertexLayout);
    fn uniform1f(&mut self, location: UniformLocation, value: f32);
    fn uniform2f(&mut self, location: UniformLocation, x: f32, y: f32);
    fn draw_triangle_strip(&mut self, first: u32, count: u32);
}

/// Creates backends bound to one drawing surface at a requested tier.
pub trait ContextProvider {
    type Backend: GpuBackend;

    fn try_acquire(
        &mut self,
        tier: CapabilityTier,
        surface: SurfaceSize,
    ) -> anyhow::Result<Self::Backend>;
}
