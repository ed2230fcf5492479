use std::borrow::Cow;

use crate::backend::{GpuBackend, UniformLocation};
use crate::context::{CapabilityTier, GraphicsContext};
use crate::error::{EngineError, ShaderStage};
use crate::shader::numbered_source;

/// Pass-through vertex stage feeding clip-space corners from `a_position`.
pub const BUILTIN_VERTEX_SHADER: &str = include_str!("../shaders/fullscreen.vert");

/// Blueprint/construction themed fragment stage.
pub const BUILTIN_FRAGMENT_SHADER: &str = include_str!("../shaders/construction.frag");

pub const ATTRIBUTE_POSITION: &str = "a_position";
pub const UNIFORM_TIME: &str = "u_time";
pub const UNIFORM_RESOLUTION: &str = "u_resolution";
pub const UNIFORM_MOUSE: &str = "u_mouse";
pub const UNIFORM_INTENSITY: &str = "u_intensity";
pub const UNIFORM_SPEED: &str = "u_speed";

/// Vertex/fragment source pair. The engine treats the contents as opaque.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisualProgram {
    pub vertex: Cow<'static, str>,
    pub fragment: Cow<'static, str>,
}

impl VisualProgram {
    pub fn new(
        vertex: impl Into<Cow<'static, str>>,
        fragment: impl Into<Cow<'static, str>>,
    ) -> Self {
        Self {
            vertex: vertex.into(),
            fragment: fragment.into(),
        }
    }

    /// Pairs a custom fragment stage with the bundled pass-through vertex stage.
    pub fn with_fragment(fragment: impl Into<Cow<'static, str>>) -> Self {
        Self::new(BUILTIN_VERTEX_SHADER, fragment)
    }

    pub fn construction() -> Self {
        Self::new(BUILTIN_VERTEX_SHADER, BUILTIN_FRAGMENT_SHADER)
    }
}

impl Default for VisualProgram {
    fn default() -> Self {
        Self::construction()
    }
}

/// Binding handles resolved after linking. `None` means the program does not
/// use that name and writes to it are skipped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgramBindings {
    pub position: Option<u32>,
    pub time: Option<UniformLocation>,
    pub resolution: Option<UniformLocation>,
    pub mouse: Option<UniformLocation>,
    pub intensity: Option<UniformLocation>,
    pub speed: Option<UniformLocation>,
}

impl ProgramBindings {
    fn resolve<B: GpuBackend>(backend: &B, program: &B::Program) -> Self {
        Self {
            position: backend.attribute_location(program, ATTRIBUTE_POSITION),
            time: backend.uniform_location(program, UNIFORM_TIME),
            resolution: backend.uniform_location(program, UNIFORM_RESOLUTION),
            mouse: backend.uniform_location(program, UNIFORM_MOUSE),
            intensity: backend.uniform_location(program, UNIFORM_INTENSITY),
            speed: backend.uniform_location(program, UNIFORM_SPEED),
        }
    }

    /// Names the program does not expose.
    pub fn missing(&self) -> Vec<&'static str> {
        let uniforms = [
            (UNIFORM_TIME, self.time),
            (UNIFORM_RESOLUTION, self.resolution),
            (UNIFORM_MOUSE, self.mouse),
            (UNIFORM_INTENSITY, self.intensity),
            (UNIFORM_SPEED, self.speed),
        ];
        self.position
            .is_none()
            .then_some(ATTRIBUTE_POSITION)
            .into_iter()
            .chain(
                uniforms
                    .into_iter()
                    .filter(|(_, location)| location.is_none())
                    .map(|(name, _)| name),
            )
            .collect()
    }
}

/// A linked program plus its resolved bindings.
pub struct CompiledProgram<B: GpuBackend> {
    program: B::Program,
    bindings: ProgramBindings,
}

impl<B: GpuBackend> CompiledProgram<B> {
    pub fn bindings(&self) -> &ProgramBindings {
        &self.bindings
    }

    pub fn program(&self) -> &B::Program {
        &self.program
    }

    pub(crate) fn release(self, backend: &mut B) {
        backend.delete_program(self.program);
    }
}

/// Compiles and links visual programs.
pub struct ProgramBuilder;

impl ProgramBuilder {
    /// Builds `source` for the context's tier. No shader or program object
    /// survives a failed build.
    pub fn build<B: GpuBackend>(
        context: &mut GraphicsContext<B>,
        source: &VisualProgram,
    ) -> Result<CompiledProgram<B>, EngineError> {
        let tier = context.tier();
        let vertex_source = prepare_source(tier, &source.vertex);
        let fragment_source = prepare_source(tier, &source.fragment);
        let backend = context.backend_mut();

        let vertex = compile(backend, ShaderStage::Vertex, &vertex_source)?;
        let fragment = match compile(backend, ShaderStage::Fragment, &fragment_source) {
            Ok(fragment) => fragment,
            Err(err) => {
                backend.delete_shader(vertex);
                return Err(err);
            }
        };

        let linked = link(backend, &vertex, &fragment);
        backend.delete_shader(vertex);
        backend.delete_shader(fragment);
        let program = linked?;

        let bindings = ProgramBindings::resolve(backend, &program);
        let missing = bindings.missing();
        if !missing.is_empty() {
            tracing::debug!(?missing, "program does not use every engine binding");
        }
        tracing::debug!(%tier, "visual program linked");

        Ok(CompiledProgram { program, bindings })
    }
}

fn compile<B: GpuBackend>(
    backend: &mut B,
    stage: ShaderStage,
    source: &str,
) -> Result<B::Shader, EngineError> {
    backend.compile_shader(stage, source).map_err(|log| {
        tracing::error!(%stage, "shader compile error:\n{log}");
        tracing::error!(%stage, "shader source:\n{}", numbered_source(source));
        EngineError::ShaderCompile { stage, log }
    })
}

fn link<B: GpuBackend>(
    backend: &mut B,
    vertex: &B::Shader,
    fragment: &B::Shader,
) -> Result<B::Program, EngineError> {
    let mut program = backend
        .create_program()
        .map_err(|reason| EngineError::ResourceAllocation { reason })?;
    match backend.link_program(&mut program, vertex, fragment) {
        Ok(()) => Ok(program),
        Err(log) => {
            tracing::error!("program link error:\n{log}");
            backend.delete_program(program);
            Err(EngineError::ProgramLink { log })
        }
    }
}

/// Adds the tier define after the `#version` line, inserting `#version 450`
/// when the source has none.
pub fn prepare_source(tier: CapabilityTier, source: &str) -> String {
    let define = format!("#define {} 1\n", tier.shader_define());
    let mut lines = source.split_inclusive('\n');
    let mut head = String::new();

    while let Some(line) = lines.next() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            head.push_str(line);
            continue;
        }
        if trimmed.starts_with("#version") {
            head.push_str(line);
            if !line.ends_with('\n') {
                head.push('\n');
            }
            head.push_str(&define);
        } else {
            head = format!("#version 450\n{define}{head}{line}");
        }
        head.extend(lines.by_ref());
        return head;
    }

    format!("#version 450\n{define}{head}")
}
