use std::borrow::Cow;
use std::rc::Rc;

use wgpu::util::DeviceExt;

use crate::backend::{GpuBackend, UniformLocation, VertexLayout};
use crate::error::ShaderStage;
use crate::shader::{compile_stage, ProgramInterface, StageInterface, UNIFORM_BLOCK_BINDING};

use super::context::DeviceContext;

/// Bytes per `vec2` vertex in the packed quad.
const VEC2_STRIDE: u64 = 8;

pub struct WgpuShader {
    stage: ShaderStage,
    module: wgpu::ShaderModule,
    interface: StageInterface,
}

/// Program object. Holds a render pipeline once linked.
pub struct WgpuProgram {
    linked: Option<Rc<LinkedProgram>>,
}

struct LinkedProgram {
    pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    uniform_size: usize,
    consumes_vertices: bool,
    interface: ProgramInterface,
}

pub struct WgpuBuffer {
    buffer: Rc<wgpu::Buffer>,
}

/// State accumulated between `viewport` and `draw_triangle_strip`.
#[derive(Default)]
struct PendingDraw {
    program: Option<Rc<LinkedProgram>>,
    staging: Vec<u8>,
    vertices: Option<Rc<wgpu::Buffer>>,
    viewport: (u32, u32),
}

/// Executes engine commands against a wgpu device and window surface.
pub struct WgpuBackend {
    context: DeviceContext,
    uniform_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    pending: PendingDraw,
}

impl WgpuBackend {
    pub(crate) fn new(context: DeviceContext) -> Self {
        let uniform_layout =
            context
                .device
                .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                    label: Some("uniform block layout"),
                    entries: &[wgpu::BindGroupLayoutEntry {
                        binding: UNIFORM_BLOCK_BINDING.1,
                        visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: None,
                        },
                        count: None,
                    }],
                });
        let pipeline_layout =
            context
                .device
                .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                    label: Some("visual program layout"),
                    bind_group_layouts: &[&uniform_layout],
                    push_constant_ranges: &[],
                });
        let viewport = (context.config.width, context.config.height);
        Self {
            context,
            uniform_layout,
            pipeline_layout,
            pending: PendingDraw {
                viewport,
                ..PendingDraw::default()
            },
        }
    }

    /// Runs `f` inside an error scope and turns a captured error into its
    /// message.
    fn scoped<T>(&self, filter: wgpu::ErrorFilter, f: impl FnOnce(&wgpu::Device) -> T) -> Result<T, String> {
        let device = &self.context.device;
        device.push_error_scope(filter);
        let value = f(device);
        match pollster::block_on(device.pop_error_scope()) {
            Some(err) => Err(err.to_string()),
            None => Ok(value),
        }
    }

    fn write_uniform(&mut self, location: UniformLocation, bytes: &[u8]) {
        let offset = location.raw() as usize;
        match self
            .pending
            .staging
            .get_mut(offset..offset + bytes.len())
        {
            Some(slot) => slot.copy_from_slice(bytes),
            None => tracing::debug!(offset, "uniform write outside the active block"),
        }
    }
}

impl GpuBackend for WgpuBackend {
    type Shader = WgpuShader;
    type Program = WgpuProgram;
    type Buffer = WgpuBuffer;

    fn resize(&mut self, width: u32, height: u32) {
        self.context.resize(width, height);
    }

    fn compile_shader(&mut self, stage: ShaderStage, source: &str) -> Result<Self::Shader, String> {
        let interface = compile_stage(stage, source)?;
        let module = self.scoped(wgpu::ErrorFilter::Validation, |device| {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(match stage {
                    ShaderStage::Vertex => "visual program vertex",
                    ShaderStage::Fragment => "visual program fragment",
                }),
                source: wgpu::ShaderSource::Glsl {
                    shader: Cow::Owned(source.to_owned()),
                    stage: stage.as_naga(),
                    defines: &[],
                },
            })
        })?;
        Ok(WgpuShader {
            stage,
            module,
            interface,
        })
    }

    fn delete_shader(&mut self, shader: Self::Shader) {
        drop(shader);
    }

    fn create_program(&mut self) -> Result<Self::Program, String> {
        Ok(WgpuProgram { linked: None })
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
        let interface = ProgramInterface::link(&vertex.interface, &fragment.interface)?;

        let attributes: Vec<wgpu::VertexAttribute> = vertex
            .interface
            .inputs
            .iter()
            .map(|(_, location)| wgpu::VertexAttribute {
                format: wgpu::VertexFormat::Float32x2,
                offset: 0,
                shader_location: *location,
            })
            .collect();
        if attributes.len() > 1 {
            return Err(format!(
                "vertex stage consumes {} attributes; only one vec2 position stream is bound",
                attributes.len()
            ));
        }
        let vertex_layouts: Vec<wgpu::VertexBufferLayout> = if attributes.is_empty() {
            Vec::new()
        } else {
            vec![wgpu::VertexBufferLayout {
                array_stride: VEC2_STRIDE,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &attributes,
            }]
        };

        let format = self.context.config.format;
        let layout = &self.pipeline_layout;
        let pipeline = self.scoped(wgpu::ErrorFilter::Validation, |device| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("visual program pipeline"),
                layout: Some(layout),
                vertex: wgpu::VertexState {
                    module: &vertex.module,
                    entry_point: Some("main"),
                    buffers: &vertex_layouts,
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleStrip,
                    strip_index_format: None,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    unclipped_depth: false,
                    conservative: false,
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                fragment: Some(wgpu::FragmentState {
                    module: &fragment.module,
                    entry_point: Some("main"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format,
                        blend: Some(wgpu::BlendState::REPLACE),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                multiview: None,
                cache: None,
            })
        })?;

        // Uniform buffers must be at least 16 bytes and a multiple of 16.
        let uniform_size = (interface.block_size.max(16) as usize).next_multiple_of(16);
        let uniform_buffer = self.context.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("uniform block"),
            size: uniform_size as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = self
            .context
            .device
            .create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("uniform block bind group"),
                layout: &self.uniform_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: UNIFORM_BLOCK_BINDING.1,
                    resource: uniform_buffer.as_entire_binding(),
                }],
            });

        program.linked = Some(Rc::new(LinkedProgram {
            pipeline,
            uniform_buffer,
            bind_group,
            uniform_size,
            consumes_vertices: !attributes.is_empty(),
            interface,
        }));
        Ok(())
    }

    fn delete_program(&mut self, program: Self::Program) {
        let Some(linked) = program.linked else {
            return;
        };
        let active = self
            .pending
            .program
            .as_ref()
            .is_some_and(|current| Rc::ptr_eq(current, &linked));
        if active {
            self.pending.program = None;
        }
        linked.uniform_buffer.destroy();
    }

    fn attribute_location(&self, program: &Self::Program, name: &str) -> Option<u32> {
        program
            .linked
            .as_ref()?
            .interface
            .attributes
            .get(name)
            .copied()
    }

    fn uniform_location(&self, program: &Self::Program, name: &str) -> Option<UniformLocation> {
        program
            .linked
            .as_ref()?
            .interface
            .uniforms
            .get(name)
            .copied()
            .map(UniformLocation::new)
    }

    fn create_vertex_buffer(&mut self, data: &[f32]) -> Result<Self::Buffer, String> {
        let buffer = self.scoped(wgpu::ErrorFilter::OutOfMemory, |device| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("fullscreen quad"),
                contents: bytemuck::cast_slice(data),
                usage: wgpu::BufferUsages::VERTEX,
            })
        })?;
        Ok(WgpuBuffer {
            buffer: Rc::new(buffer),
        })
    }

    fn delete_buffer(&mut self, buffer: Self::Buffer) {
        let bound = self
            .pending
            .vertices
            .as_ref()
            .is_some_and(|current| Rc::ptr_eq(current, &buffer.buffer));
        if bound {
            self.pending.vertices = None;
        }
        buffer.buffer.destroy();
    }

    fn viewport(&mut self, width: u32, height: u32) {
        self.context.resize(width, height);
        self.pending.viewport = (width, height);
    }

    fn use_program(&mut self, program: &Self::Program) {
        match &program.linked {
            Some(linked) => {
                self.pending.staging.clear();
                self.pending.staging.resize(linked.uniform_size, 0);
                self.pending.program = Some(linked.clone());
            }
            None => {
                tracing::warn!("use_program called with an unlinked program");
                self.pending.program = None;
            }
        }
    }

    fn bind_vertex_attribute(&mut self, buffer: &Self::Buffer, _location: u32, layout: VertexLayout) {
        if layout.components != 2 || layout.normalized {
            tracing::warn!(?layout, "only packed vec2 float attributes are supported");
            return;
        }
        self.pending.vertices = Some(buffer.buffer.clone());
    }

    fn uniform1f(&mut self, location: UniformLocation, value: f32) {
        self.write_uniform(location, bytemuck::bytes_of(&value));
    }

    fn uniform2f(&mut self, location: UniformLocation, x: f32, y: f32) {
        self.write_uniform(location, bytemuck::cast_slice(&[x, y]));
    }

    fn draw_triangle_strip(&mut self, first: u32, count: u32) {
        let Some(program) = self.pending.program.clone() else {
            tracing::warn!("draw skipped: no program in use");
            return;
        };
        if program.consumes_vertices && self.pending.vertices.is_none() {
            tracing::warn!("draw skipped: no vertex buffer bound");
            return;
        }
        if self.pending.viewport.0 == 0 || self.pending.viewport.1 == 0 {
            return;
        }

        self.context
            .queue
            .write_buffer(&program.uniform_buffer, 0, &self.pending.staging);

        let frame = match self.context.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                tracing::warn!("surface lost or outdated; reconfiguring");
                self.context.reconfigure();
                return;
            }
            Err(wgpu::SurfaceError::Timeout) => {
                tracing::debug!("surface frame acquisition timed out");
                return;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to acquire surface frame");
                return;
            }
        };
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("background frame"),
            });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("background pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            let width = self.pending.viewport.0.min(self.context.config.width);
            let height = self.pending.viewport.1.min(self.context.config.height);
            render_pass.set_viewport(0.0, 0.0, width as f32, height as f32, 0.0, 1.0);
            render_pass.set_pipeline(&program.pipeline);
            render_pass.set_bind_group(UNIFORM_BLOCK_BINDING.0, &program.bind_group, &[]);
            if let Some(vertices) = &self.pending.vertices {
                render_pass.set_vertex_buffer(0, vertices.slice(..));
            }
            render_pass.draw(first..first + count, 0..1);
        }
        self.context.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
    }
}
