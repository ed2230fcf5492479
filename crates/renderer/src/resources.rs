use crate::backend::GpuBackend;
use crate::context::GraphicsContext;
use crate::error::EngineError;

/// Triangle strip covering clip space: top-left, bottom-left, top-right,
/// bottom-right.
pub const FULLSCREEN_QUAD: [f32; 8] = [-1.0, 1.0, -1.0, -1.0, 1.0, 1.0, 1.0, -1.0];

/// Vertices drawn per frame.
pub const QUAD_VERTEX_COUNT: u32 = 4;

/// Immutable vertex buffer holding [`FULLSCREEN_QUAD`].
pub struct GeometryBuffer<B: GpuBackend> {
    buffer: B::Buffer,
}

impl<B: GpuBackend> GeometryBuffer<B> {
    pub fn buffer(&self) -> &B::Buffer {
        &self.buffer
    }
}

/// Owns the static geometry for one engine.
pub struct FrameResources<B: GpuBackend> {
    geometry: Option<GeometryBuffer<B>>,
}

impl<B: GpuBackend> FrameResources<B> {
    pub fn new() -> Self {
        Self { geometry: None }
    }

    /// Uploads the quad, releasing any buffer from an earlier upload first.
    pub fn upload(&mut self, context: &mut GraphicsContext<B>) -> Result<(), EngineError> {
        self.release(context);
        let buffer = context
            .backend_mut()
            .create_vertex_buffer(&FULLSCREEN_QUAD)
            .map_err(|reason| EngineError::ResourceAllocation { reason })?;
        tracing::debug!(vertices = QUAD_VERTEX_COUNT, "uploaded fullscreen quad");
        self.geometry = Some(GeometryBuffer { buffer });
        Ok(())
    }

    pub fn geometry(&self) -> Option<&GeometryBuffer<B>> {
        self.geometry.as_ref()
    }

    pub fn release(&mut self, context: &mut GraphicsContext<B>) {
        if let Some(geometry) = self.geometry.take() {
            context.backend_mut().delete_buffer(geometry.buffer);
        }
    }
}

impl<B: GpuBackend> Default for FrameResources<B> {
    fn default() -> Self {
        Self::new()
    }
}
