use std::time::Instant;

use crate::backend::{GpuBackend, VertexLayout};
use crate::context::GraphicsContext;
use crate::params::ParameterState;
use crate::program::CompiledProgram;
use crate::resources::{GeometryBuffer, QUAD_VERTEX_COUNT};
use crate::scheduler::{FrameHandle, FrameScheduler};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Stopped,
    Running,
}

/// What a frame callback ended up doing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    /// One draw was issued and the next frame was requested.
    Rendered { elapsed: f32 },
    /// The callback was stale or arrived while stopped; nothing ran.
    Ignored,
    /// The program was gone, so the loop stopped itself.
    Halted,
}

/// Drives the per-frame body and owns the single live frame request.
#[derive(Debug)]
pub struct RenderLoop {
    state: LoopState,
    baseline: Instant,
    pending: Option<FrameHandle>,
    last_elapsed: f32,
    frames: u64,
}

impl RenderLoop {
    pub fn new() -> Self {
        Self {
            state: LoopState::Stopped,
            baseline: Instant::now(),
            pending: None,
            last_elapsed: 0.0,
            frames: 0,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == LoopState::Running
    }

    /// Frames drawn since construction.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn pending(&self) -> Option<FrameHandle> {
        self.pending
    }

    /// Records `now` as time zero and requests the first frame. Returns false
    /// when the loop was already running.
    pub fn start<S: FrameScheduler>(&mut self, scheduler: &mut S, now: Instant) -> bool {
        if self.is_running() {
            return false;
        }
        self.state = LoopState::Running;
        self.baseline = now;
        self.last_elapsed = 0.0;
        self.pending = Some(scheduler.request_frame());
        true
    }

    /// Cancels the pending frame. Safe to call in any state.
    pub fn stop<S: FrameScheduler>(&mut self, scheduler: &mut S) {
        if let Some(handle) = self.pending.take() {
            scheduler.cancel_frame(handle);
        }
        self.state = LoopState::Stopped;
    }

    #[allow(clippy::too_many_arguments)]
    pub fn tick<B, S>(
        &mut self,
        handle: FrameHandle,
        now: Instant,
        scheduler: &mut S,
        context: &mut GraphicsContext<B>,
        program: Option<&CompiledProgram<B>>,
        geometry: Option<&GeometryBuffer<B>>,
        parameters: &ParameterState,
    ) -> TickOutcome
    where
        B: GpuBackend,
        S: FrameScheduler,
    {
        if !self.is_running() || self.pending != Some(handle) {
            return TickOutcome::Ignored;
        }
        self.pending = None;

        let (Some(program), Some(geometry)) = (program, geometry) else {
            tracing::warn!("visual program is no longer valid; render loop stopped");
            self.stop(scheduler);
            return TickOutcome::Halted;
        };

        // Instants never run backwards, but a host may hand us a stale one.
        let elapsed = now
            .saturating_duration_since(self.baseline)
            .as_secs_f32()
            .max(self.last_elapsed);
        self.last_elapsed = elapsed;

        let surface = context.surface();
        let bindings = *program.bindings();
        let values = parameters.snapshot();
        let backend = context.backend_mut();

        backend.viewport(surface.width, surface.height);
        backend.use_program(program.program());
        if let Some(location) = bindings.position {
            backend.bind_vertex_attribute(geometry.buffer(), location, VertexLayout::PACKED_VEC2);
        }

        if let Some(location) = bindings.time {
            backend.uniform1f(location, elapsed);
        }
        if let Some(location) = bindings.resolution {
            backend.uniform2f(location, surface.width as f32, surface.height as f32);
        }
        if let Some(location) = bindings.mouse {
            backend.uniform2f(location, values.pointer[0], values.pointer[1]);
        }
        if let Some(location) = bindings.intensity {
            backend.uniform1f(location, values.intensity);
        }
        if let Some(location) = bindings.speed {
            backend.uniform1f(location, values.speed);
        }

        backend.draw_triangle_strip(0, QUAD_VERTEX_COUNT);
        self.frames += 1;

        self.pending = Some(scheduler.request_frame());
        TickOutcome::Rendered { elapsed }
    }
}

impl Default for RenderLoop {
    fn default() -> Self {
        Self::new()
    }
}
