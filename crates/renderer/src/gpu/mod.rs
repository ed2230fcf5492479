//! wgpu implementation of the GPU port.
//!
//! - `context` negotiates instance, adapter, device and surface for a tier.
//! - `backend` turns the engine's GL-style command stream into render
//!   pipelines, a uniform block buffer and one render pass per draw.

mod backend;
mod context;

pub use backend::{WgpuBackend, WgpuBuffer, WgpuProgram, WgpuShader};
pub use context::WgpuProvider;
