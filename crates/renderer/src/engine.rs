use std::rc::Rc;
use std::time::Instant;

use crate::backend::{ContextProvider, GpuBackend};
use crate::context::{CapabilityTier, GraphicsContext, SurfaceSize};
use crate::control::ControlSurface;
use crate::error::EngineError;
use crate::params::{ParameterDefaults, ParameterState, PointerTracker};
use crate::program::{CompiledProgram, ProgramBindings, ProgramBuilder, VisualProgram};
use crate::render_loop::{RenderLoop, TickOutcome};
use crate::resources::FrameResources;
use crate::scheduler::{FrameHandle, FrameScheduler};

/// Everything that varies between background variants.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub program: VisualProgram,
    pub defaults: ParameterDefaults,
}

impl EngineConfig {
    pub fn new(program: VisualProgram, defaults: ParameterDefaults) -> Self {
        Self { program, defaults }
    }

    pub fn construction() -> Self {
        Self::new(VisualProgram::construction(), ParameterDefaults::CONSTRUCTION)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::construction()
    }
}

struct Pipeline<B: GpuBackend> {
    context: GraphicsContext<B>,
    program: Option<CompiledProgram<B>>,
    resources: FrameResources<B>,
}

impl<B: GpuBackend> Pipeline<B> {
    fn release(&mut self) {
        if let Some(program) = self.program.take() {
            program.release(self.context.backend_mut());
        }
        self.resources.release(&mut self.context);
    }
}

/// One full-screen shader background.
///
/// Initialization never fails outward: a broken stage is logged once and the
/// engine stays inert, while [`ControlSurface`] keeps accepting updates.
pub struct RenderEngine<B: GpuBackend, S: FrameScheduler> {
    parameters: Rc<ParameterState>,
    scheduler: S,
    render_loop: RenderLoop,
    pipeline: Option<Pipeline<B>>,
    failure: Option<EngineError>,
}

impl<B: GpuBackend, S: FrameScheduler> RenderEngine<B, S> {
    /// Runs acquire, build and upload in order, stopping at the first failure.
    pub fn initialize<P>(
        provider: &mut P,
        surface: SurfaceSize,
        scheduler: S,
        config: EngineConfig,
    ) -> Self
    where
        P: ContextProvider<Backend = B>,
    {
        let parameters = ParameterState::new(config.defaults);
        let mut engine = Self {
            parameters,
            scheduler,
            render_loop: RenderLoop::new(),
            pipeline: None,
            failure: None,
        };

        let mut context = match GraphicsContext::acquire(provider, surface) {
            Ok(context) => context,
            Err(err) => {
                engine.record_failure(err);
                return engine;
            }
        };

        let program = match ProgramBuilder::build(&mut context, &config.program) {
            Ok(program) => program,
            Err(err) => {
                engine.pipeline = Some(Pipeline {
                    context,
                    program: None,
                    resources: FrameResources::new(),
                });
                engine.record_failure(err);
                return engine;
            }
        };

        let mut pipeline = Pipeline {
            context,
            program: Some(program),
            resources: FrameResources::new(),
        };
        if let Err(err) = pipeline.resources.upload(&mut pipeline.context) {
            pipeline.release();
            engine.pipeline = Some(pipeline);
            engine.record_failure(err);
            return engine;
        }

        tracing::info!(
            tier = %pipeline.context.tier(),
            width = surface.width,
            height = surface.height,
            "background renderer ready"
        );
        engine.pipeline = Some(pipeline);
        engine
    }

    fn record_failure(&mut self, err: EngineError) {
        tracing::error!(kind = err.kind(), "background renderer disabled: {err}");
        self.failure = Some(err);
    }

    /// Handle for runtime parameter updates.
    pub fn controls(&self) -> ControlSurface {
        ControlSurface::new(self.parameters.clone())
    }

    /// Writer for the pointer position.
    pub fn pointer(&self) -> PointerTracker {
        PointerTracker::new(self.parameters.clone())
    }

    pub fn parameters(&self) -> &ParameterState {
        &self.parameters
    }

    /// Why the engine is inert, if it is.
    pub fn failure(&self) -> Option<&EngineError> {
        self.failure.as_ref()
    }

    pub fn tier(&self) -> Option<CapabilityTier> {
        self.pipeline.as_ref().map(|pipeline| pipeline.context.tier())
    }

    pub fn surface(&self) -> Option<SurfaceSize> {
        self.pipeline.as_ref().map(|pipeline| pipeline.context.surface())
    }

    pub fn backend(&self) -> Option<&B> {
        self.pipeline.as_ref().map(|pipeline| pipeline.context.backend())
    }

    pub fn has_program(&self) -> bool {
        self.pipeline
            .as_ref()
            .is_some_and(|pipeline| pipeline.program.is_some())
    }

    /// Bindings of the installed program.
    pub fn bindings(&self) -> Option<ProgramBindings> {
        let program = self.pipeline.as_ref()?.program.as_ref()?;
        Some(*program.bindings())
    }

    pub fn is_running(&self) -> bool {
        self.render_loop.is_running()
    }

    pub fn frames(&self) -> u64 {
        self.render_loop.frames()
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    /// Starts the loop with `now` as time zero. Returns false when there is
    /// nothing to draw or the loop already runs.
    pub fn start(&mut self, now: Instant) -> bool {
        let ready = self.pipeline.as_ref().is_some_and(|pipeline| {
            pipeline.program.is_some() && pipeline.resources.geometry().is_some()
        });
        if !ready {
            tracing::debug!("render loop not started: no program or geometry");
            return false;
        }
        let started = self.render_loop.start(&mut self.scheduler, now);
        if started {
            tracing::info!("render loop started");
        }
        started
    }

    /// Stops the loop. Any frame already requested will not draw.
    pub fn stop(&mut self) {
        if self.render_loop.is_running() {
            tracing::info!("render loop stopped");
        }
        self.render_loop.stop(&mut self.scheduler);
    }

    /// Frame callback entry point for the host.
    pub fn on_frame(&mut self, handle: FrameHandle, now: Instant) -> TickOutcome {
        let Some(pipeline) = self.pipeline.as_mut() else {
            return TickOutcome::Ignored;
        };
        self.render_loop.tick(
            handle,
            now,
            &mut self.scheduler,
            &mut pipeline.context,
            pipeline.program.as_ref(),
            pipeline.resources.geometry(),
            &self.parameters,
        )
    }

    /// Updates the surface size used from the next frame on.
    pub fn resize(&mut self, width: u32, height: u32) {
        if let Some(pipeline) = self.pipeline.as_mut() {
            pipeline.context.resize(width, height);
        }
    }

    /// Builds `source` and swaps it in. On failure the installed program, if
    /// any, keeps rendering.
    pub fn swap_program(&mut self, source: &VisualProgram) -> Result<(), EngineError> {
        let Some(pipeline) = self.pipeline.as_mut() else {
            return Err(EngineError::ContextUnavailable {
                details: "no rendering context was acquired".to_string(),
            });
        };

        let candidate = match ProgramBuilder::build(&mut pipeline.context, source) {
            Ok(candidate) => candidate,
            Err(err) => {
                tracing::error!(
                    kind = err.kind(),
                    retained = pipeline.program.is_some(),
                    "visual program rebuild failed"
                );
                return Err(err);
            }
        };

        // Geometry is missing when the first build failed.
        if pipeline.resources.geometry().is_none() {
            if let Err(err) = pipeline.resources.upload(&mut pipeline.context) {
                candidate.release(pipeline.context.backend_mut());
                tracing::error!(kind = err.kind(), "visual program swap failed: {err}");
                return Err(err);
            }
        }

        if let Some(previous) = pipeline.program.take() {
            previous.release(pipeline.context.backend_mut());
        }
        pipeline.program = Some(candidate);
        self.failure = None;
        tracing::info!("visual program replaced");
        Ok(())
    }

    /// Releases the installed program. A running loop halts on its next tick.
    pub fn invalidate_program(&mut self) {
        if let Some(pipeline) = self.pipeline.as_mut() {
            if let Some(program) = pipeline.program.take() {
                program.release(pipeline.context.backend_mut());
                tracing::warn!("visual program invalidated");
            }
        }
    }

    /// Stops the loop and releases every GPU object the engine owns.
    pub fn shutdown(&mut self) {
        self.render_loop.stop(&mut self.scheduler);
        if let Some(pipeline) = self.pipeline.as_mut() {
            pipeline.release();
        }
    }
}

impl<B: GpuBackend, S: FrameScheduler> Drop for RenderEngine<B, S> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
