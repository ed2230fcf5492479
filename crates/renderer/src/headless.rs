//! Surface-less backend.
//!
//! Shaders go through the same naga front end as the wgpu backend, so compile
//! and link diagnostics match what a real surface would report. Nothing is
//! rasterized: draw commands are recorded into a log that a [`HeadlessProbe`]
//! can inspect. `backdrop check` and the test suites run on this backend.

use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;

use crate::backend::{ContextProvider, GpuBackend, UniformLocation, VertexLayout};
use crate::context::{CapabilityTier, SurfaceSize};
use crate::error::ShaderStage;
use crate::shader::{compile_stage, ProgramInterface, StageInterface};

/// A uniform write as seen by the device.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Vec2([f32; 2]),
}

/// One recorded per-frame command.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Viewport { width: u32, height: u32 },
    UseProgram { program: u64 },
    BindAttribute { buffer: u64, location: u32, components: u32 },
    Uniform { name: String, value: UniformValue },
    Draw { first: u32, count: u32 },
}

#[derive(Debug, Default)]
struct DeviceLog {
    next_id: u64,
    live_shaders: BTreeSet<u64>,
    live_programs: BTreeSet<u64>,
    live_buffers: BTreeSet<u64>,
    commands: Vec<Command>,
    acquisitions: Vec<CapabilityTier>,
    surface: Option<(u32, u32)>,
    refuse_buffers: bool,
    refuse_programs: bool,
}

impl DeviceLog {
    fn allocate(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

pub struct HeadlessShader {
    id: u64,
    stage: ShaderStage,
    interface: StageInterface,
}

pub struct HeadlessProgram {
    id: u64,
    interface: Option<ProgramInterface>,
}

impl HeadlessProgram {
    /// Attribute name to location, sorted by name. Empty until linked.
    pub fn attributes(&self) -> Vec<(String, u32)> {
        let mut attributes: Vec<_> = self
            .interface
            .iter()
            .flat_map(|interface| interface.attributes.iter())
            .map(|(name, location)| (name.clone(), *location))
            .collect();
        attributes.sort();
        attributes
    }

    /// Uniform name to block offset, sorted by offset.
    pub fn uniforms(&self) -> Vec<(String, u32)> {
        let mut uniforms: Vec<_> = self
            .interface
            .iter()
            .flat_map(|interface| interface.uniforms.iter())
            .map(|(name, offset)| (name.clone(), *offset))
            .collect();
        uniforms.sort_by_key(|(name, offset)| (*offset, name.clone()));
        uniforms
    }
}

pub struct HeadlessBuffer {
    id: u64,
}

/// Records every command instead of drawing it.
pub struct HeadlessBackend {
    log: Rc<RefCell<DeviceLog>>,
    active_uniforms: HashMap<u32, String>,
}

impl HeadlessBackend {
    fn uniform(&mut self, location: UniformLocation, value: UniformValue) {
        let name = self
            .active_uniforms
            .get(&location.raw())
            .cloned()
            .unwrap_or_else(|| format!("@{}", location.raw()));
        self.log
            .borrow_mut()
            .commands
            .push(Command::Uniform { name, value });
    }
}

impl GpuBackend for HeadlessBackend {
    type Shader = HeadlessShader;
    type Program = HeadlessProgram;
    type Buffer = HeadlessBuffer;

    fn resize(&mut self, width: u32, height: u32) {
        self.log.borrow_mut().surface = Some((width, height));
    }

    fn compile_shader(&mut self, stage: ShaderStage, source: &str) -> Result<Self::Shader, String> {
        let interface = compile_stage(stage, source)?;
        let mut log = self.log.borrow_mut();
        let id = log.allocate();
        log.live_shaders.insert(id);
        Ok(HeadlessShader {
            id,
            stage,
            interface,
        })
    }

    fn delete_shader(&mut self, shader: Self::Shader) {
        self.log.borrow_mut().live_shaders.remove(&shader.id);
    }

    fn create_program(&mut self) -> Result<Self::Program, String> {
        let mut log = self.log.borrow_mut();
        if log.refuse_programs {
            return Err("program object limit reached".to_string());
        }
        let id = log.allocate();
        log.live_programs.insert(id);
        Ok(HeadlessProgram {
            id,
            interface: None,
        })
    }

    fn link_program(
        &mut self,
        program: &mut Self::Program,
        vertex: &Self::Shader,
        fragment: &Self::Shader,
    ) -> Result<(), String> {
        if vertex.stage != ShaderStage::Vertex || fragment.stage != ShaderStage::Fragment {
            return Err("program needs one vertex and one fragment shader".to_string());
        }
        program.interface = Some(ProgramInterface::link(
            &vertex.interface,
            &fragment.interface,
        )?);
        Ok(())
    }

    fn delete_program(&mut self, program: Self::Program) {
        self.log.borrow_mut().live_programs.remove(&program.id);
    }

    fn attribute_location(&self, program: &Self::Program, name: &str) -> Option<u32> {
        program.interface.as_ref()?.attributes.get(name).copied()
    }

    fn uniform_location(&self, program: &Self::Program, name: &str) -> Option<UniformLocation> {
        program
            .interface
            .as_ref()?
            .uniforms
            .get(name)
            .copied()
            .map(UniformLocation::new)
    }

    fn create_vertex_buffer(&mut self, _data: &[f32]) -> Result<Self::Buffer, String> {
        let mut log = self.log.borrow_mut();
        if log.refuse_buffers {
            return Err("out of device memory".to_string());
        }
        let id = log.allocate();
        log.live_buffers.insert(id);
        Ok(HeadlessBuffer { id })
    }

    fn delete_buffer(&mut self, buffer: Self::Buffer) {
        self.log.borrow_mut().live_buffers.remove(&buffer.id);
    }

    fn viewport(&mut self, width: u32, height: u32) {
        self.log
            .borrow_mut()
            .commands
            .push(Command::Viewport { width, height });
    }

    fn use_program(&mut self, program: &Self::Program) {
        self.active_uniforms = program
            .interface
            .iter()
            .flat_map(|interface| interface.uniforms.iter())
            .map(|(name, offset)| (*offset, name.clone()))
            .collect();
        self.log
            .borrow_mut()
            .commands
            .push(Command::UseProgram {
                program: program.id,
            });
    }

    fn bind_vertex_attribute(&mut self, buffer: &Self::Buffer, location: u32, layout: VertexLayout) {
        self.log.borrow_mut().commands.push(Command::BindAttribute {
            buffer: buffer.id,
            location,
            components: layout.components,
        });
    }

    fn uniform1f(&mut self, location: UniformLocation, value: f32) {
        self.uniform(location, UniformValue::Float(value));
    }

    fn uniform2f(&mut self, location: UniformLocation, x: f32, y: f32) {
        self.uniform(location, UniformValue::Vec2([x, y]));
    }

    fn draw_triangle_strip(&mut self, first: u32, count: u32) {
        self.log
            .borrow_mut()
            .commands
            .push(Command::Draw { first, count });
    }
}

/// Hands out [`HeadlessBackend`]s for a configurable set of tiers.
pub struct HeadlessProvider {
    tiers: Vec<CapabilityTier>,
    log: Rc<RefCell<DeviceLog>>,
}

impl HeadlessProvider {
    /// Offers every tier.
    pub fn new() -> Self {
        Self::with_tiers(&CapabilityTier::PREFERENCE)
    }

    pub fn with_tiers(tiers: &[CapabilityTier]) -> Self {
        Self {
            tiers: tiers.to_vec(),
            log: Rc::default(),
        }
    }

    /// A device with no usable context at all.
    pub fn unavailable() -> Self {
        Self::with_tiers(&[])
    }

    pub fn probe(&self) -> HeadlessProbe {
        HeadlessProbe {
            log: self.log.clone(),
        }
    }
}

impl Default for HeadlessProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextProvider for HeadlessProvider {
    type Backend = HeadlessBackend;

    fn try_acquire(
        &mut self,
        tier: CapabilityTier,
        surface: SurfaceSize,
    ) -> anyhow::Result<HeadlessBackend> {
        self.log.borrow_mut().acquisitions.push(tier);
        if !self.tiers.contains(&tier) {
            anyhow::bail!("headless device does not offer a {tier} context");
        }
        self.log.borrow_mut().surface = Some((surface.width, surface.height));
        Ok(HeadlessBackend {
            log: self.log.clone(),
            active_uniforms: HashMap::new(),
        })
    }
}

/// Read side of a headless device, shared with every backend it created.
#[derive(Clone)]
pub struct HeadlessProbe {
    log: Rc<RefCell<DeviceLog>>,
}

impl HeadlessProbe {
    pub fn live_shaders(&self) -> usize {
        self.log.borrow().live_shaders.len()
    }

    pub fn live_programs(&self) -> usize {
        self.log.borrow().live_programs.len()
    }

    pub fn live_buffers(&self) -> usize {
        self.log.borrow().live_buffers.len()
    }

    /// Tiers requested so far, in order.
    pub fn acquisitions(&self) -> Vec<CapabilityTier> {
        self.log.borrow().acquisitions.clone()
    }

    /// Last size the surface was configured with.
    pub fn surface(&self) -> Option<(u32, u32)> {
        self.log.borrow().surface
    }

    pub fn commands(&self) -> Vec<Command> {
        self.log.borrow().commands.clone()
    }

    pub fn clear_commands(&self) {
        self.log.borrow_mut().commands.clear();
    }

    pub fn draws(&self) -> usize {
        self.log
            .borrow()
            .commands
            .iter()
            .filter(|command| matches!(command, Command::Draw { .. }))
            .count()
    }

    /// Most recent value written to `name`.
    pub fn last_uniform(&self, name: &str) -> Option<UniformValue> {
        self.log
            .borrow()
            .commands
            .iter()
            .rev()
            .find_map(|command| match command {
                Command::Uniform { name: written, value } if written == name => Some(*value),
                _ => None,
            })
    }

    /// Makes every later vertex buffer allocation fail.
    pub fn refuse_buffers(&self, refuse: bool) {
        self.log.borrow_mut().refuse_buffers = refuse;
    }

    /// Makes every later program object allocation fail.
    pub fn refuse_programs(&self, refuse: bool) {
        self.log.borrow_mut().refuse_programs = refuse;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::{BUILTIN_FRAGMENT_SHADER, BUILTIN_VERTEX_SHADER};

    fn backend() -> (HeadlessBackend, HeadlessProbe) {
        let mut provider = HeadlessProvider::new();
        let probe = provider.probe();
        let backend = provider
            .try_acquire(CapabilityTier::Full, SurfaceSize::new(64, 32))
            .unwrap();
        (backend, probe)
    }

    #[test]
    fn shader_objects_are_tracked() {
        let (mut backend, probe) = backend();
        let vertex = backend
            .compile_shader(ShaderStage::Vertex, BUILTIN_VERTEX_SHADER)
            .unwrap();
        assert_eq!(probe.live_shaders(), 1);
        backend.delete_shader(vertex);
        assert_eq!(probe.live_shaders(), 0);
    }

    #[test]
    fn failed_compile_allocates_nothing() {
        let (mut backend, probe) = backend();
        assert!(backend
            .compile_shader(ShaderStage::Fragment, "#version 450\nvoid main() { oops }\n")
            .is_err());
        assert_eq!(probe.live_shaders(), 0);
    }

    #[test]
    fn uniform_writes_are_named_by_the_active_program() {
        let (mut backend, probe) = backend();
        let vertex = backend
            .compile_shader(ShaderStage::Vertex, BUILTIN_VERTEX_SHADER)
            .unwrap();
        let fragment = backend
            .compile_shader(ShaderStage::Fragment, BUILTIN_FRAGMENT_SHADER)
            .unwrap();
        let mut program = backend.create_program().unwrap();
        backend.link_program(&mut program, &vertex, &fragment).unwrap();

        let location = backend.uniform_location(&program, "u_speed").unwrap();
        backend.use_program(&program);
        backend.uniform1f(location, 1.5);

        assert_eq!(probe.last_uniform("u_speed"), Some(UniformValue::Float(1.5)));
        assert_eq!(
            program.attributes(),
            vec![("a_position".to_string(), 0)]
        );
        // std140: vec2 members align to 8 bytes.
        assert_eq!(
            program.uniforms(),
            vec![
                ("u_time".to_string(), 0),
                ("u_resolution".to_string(), 8),
                ("u_mouse".to_string(), 16),
                ("u_intensity".to_string(), 24),
                ("u_speed".to_string(), 28),
            ]
        );
    }

    #[test]
    fn missing_tier_is_refused() {
        let mut provider = HeadlessProvider::with_tiers(&[CapabilityTier::Reduced]);
        assert!(provider
            .try_acquire(CapabilityTier::Full, SurfaceSize::new(1, 1))
            .is_err());
        assert!(provider
            .try_acquire(CapabilityTier::Reduced, SurfaceSize::new(1, 1))
            .is_ok());
        assert_eq!(
            provider.probe().acquisitions(),
            vec![CapabilityTier::Full, CapabilityTier::Reduced]
        );
    }
}
