//! Full-viewport procedural shader backgrounds.
//!
//! The crate drives a single full-screen quad through a user-supplied GLSL
//! program, feeding it elapsed time, resolution, a normalized pointer and two
//! tunable parameters every frame. The flow is:
//!
//! ```text
//!   ContextProvider ──▶ GraphicsContext ──▶ ProgramBuilder ──▶ FrameResources
//!                                                   │
//!   FrameScheduler ◀──── RenderLoop::tick ◀─────────┘
//!          │                    ▲
//!          └── on_frame ────────┘   ControlSurface ─▶ ParameterState
//! ```
//!
//! [`RenderEngine`] owns the whole pipeline. Bring-up failures are logged and
//! leave the engine inert rather than bubbling up to the host. GPU access
//! goes through the [`GpuBackend`] port so the same engine runs against
//! [`gpu::WgpuBackend`] in a window and [`headless::HeadlessBackend`] in
//! validation and tests.

pub mod backend;
pub mod context;
pub mod control;
pub mod engine;
pub mod error;
pub mod gpu;
pub mod headless;
pub mod params;
pub mod program;
pub mod render_loop;
pub mod resources;
pub mod scheduler;
mod shader;
pub mod window;

pub use backend::{ContextProvider, GpuBackend, UniformLocation, VertexLayout};
pub use context::{CapabilityTier, GraphicsContext, SurfaceSize};
pub use control::{ControlSurface, ParameterUpdate, Preset, UnknownPreset};
pub use engine::{EngineConfig, RenderEngine};
pub use error::{EngineError, ShaderStage};
pub use params::{ParameterDefaults, ParameterSnapshot, ParameterState, PointerTracker};
pub use program::{CompiledProgram, ProgramBindings, ProgramBuilder, VisualProgram};
pub use render_loop::{LoopState, RenderLoop, TickOutcome};
pub use resources::{FrameResources, GeometryBuffer};
pub use scheduler::{FrameHandle, FrameScheduler, ManualFrameClock};
pub use window::{BackgroundWindow, ControlProxy, HostCommand, WindowOptions};
