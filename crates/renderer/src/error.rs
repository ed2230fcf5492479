use std::fmt;

/// Shader stage a compile diagnostic belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    pub(crate) fn as_naga(self) -> wgpu::naga::ShaderStage {
        match self {
            ShaderStage::Vertex => wgpu::naga::ShaderStage::Vertex,
            ShaderStage::Fragment => wgpu::naga::ShaderStage::Fragment,
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

/// Failures raised while bringing the background pipeline up.
///
/// Every variant is terminal for the attempt that produced it. The engine
/// logs the error once and stays inert instead of propagating it to the host.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("no usable GPU context at any capability tier ({details})")]
    ContextUnavailable { details: String },
    #[error("{stage} shader failed to compile:\n{log}")]
    ShaderCompile { stage: ShaderStage, log: String },
    #[error("shader program failed to link:\n{log}")]
    ProgramLink { log: String },
    #[error("failed to allocate GPU resource: {reason}")]
    ResourceAllocation { reason: String },
}

impl EngineError {
    /// Short machine-friendly name used in structured log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::ContextUnavailable { .. } => "context_unavailable",
            EngineError::ShaderCompile { .. } => "shader_compile",
            EngineError::ProgramLink { .. } => "program_link",
            EngineError::ResourceAllocation { .. } => "resource_allocation",
        }
    }
}
