use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Result};
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, Event, KeyEvent, WindowEvent};
use winit::event_loop::{EventLoop, EventLoopBuilder, EventLoopProxy};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Window, WindowBuilder};

use tracing::{error, info, warn};

use crate::context::SurfaceSize;
use crate::control::{ParameterUpdate, Preset};
use crate::engine::{EngineConfig, RenderEngine};
use crate::gpu::{WgpuBackend, WgpuProvider};
use crate::program::VisualProgram;
use crate::scheduler::{FrameHandle, FrameScheduler, PendingFrame};

/// Requests delivered to the window thread from elsewhere in the process.
#[derive(Debug, Clone)]
pub enum HostCommand {
    SetParameters(ParameterUpdate),
    ApplyPreset(Preset),
    Stop,
    Start,
    Reload(VisualProgram),
    Shutdown,
}

/// Cloneable sender for [`HostCommand`]s.
#[derive(Clone)]
pub struct ControlProxy {
    proxy: EventLoopProxy<HostCommand>,
}

impl ControlProxy {
    pub fn send(&self, command: HostCommand) -> Result<()> {
        self.proxy
            .send_event(command)
            .map_err(|_| anyhow!("window event loop has already exited"))
    }
}

#[derive(Debug, Clone)]
pub struct WindowOptions {
    pub title: String,
    pub size: (u32, u32),
    pub config: EngineConfig,
}

impl Default for WindowOptions {
    fn default() -> Self {
        Self {
            title: "Backdrop".to_string(),
            size: (1280, 720),
            config: EngineConfig::default(),
        }
    }
}

/// Frame scheduler backed by winit redraw requests.
struct RedrawScheduler {
    window: Arc<Window>,
    frames: PendingFrame,
}

impl RedrawScheduler {
    fn new(window: Arc<Window>) -> Self {
        Self {
            window,
            frames: PendingFrame::default(),
        }
    }

    fn take_due(&mut self) -> Option<FrameHandle> {
        self.frames.take()
    }
}

impl FrameScheduler for RedrawScheduler {
    fn request_frame(&mut self) -> FrameHandle {
        let handle = self.frames.request();
        self.window.request_redraw();
        handle
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        self.frames.cancel(handle);
    }
}

type WindowEngine = RenderEngine<WgpuBackend, RedrawScheduler>;

/// A desktop window hosting one background engine.
pub struct BackgroundWindow {
    event_loop: EventLoop<HostCommand>,
    window: Arc<Window>,
    config: EngineConfig,
}

impl BackgroundWindow {
    pub fn new(options: WindowOptions) -> Result<Self> {
        let event_loop = EventLoopBuilder::<HostCommand>::with_user_event()
            .build()
            .map_err(|err| anyhow!("failed to create event loop: {err}"))?;

        let (width, height) = options.size;
        let window = WindowBuilder::new()
            .with_title(options.title)
            .with_inner_size(PhysicalSize::new(width, height))
            .build(&event_loop)
            .map_err(|err| anyhow!("failed to create window: {err}"))?;

        Ok(Self {
            event_loop,
            window: Arc::new(window),
            config: options.config,
        })
    }

    pub fn proxy(&self) -> ControlProxy {
        ControlProxy {
            proxy: self.event_loop.create_proxy(),
        }
    }

    /// Runs until the window closes or [`HostCommand::Shutdown`] arrives. A
    /// background that fails to come up leaves the window open and blank.
    pub fn run(self) -> Result<()> {
        let Self {
            event_loop,
            window,
            config,
        } = self;

        let size = window.inner_size();
        let surface = SurfaceSize::new(size.width, size.height);
        let mut provider = WgpuProvider::new(window.clone());
        let mut engine = RenderEngine::initialize(
            &mut provider,
            surface,
            RedrawScheduler::new(window.clone()),
            config,
        );
        let mut host = HostState {
            window,
            paused: false,
        };
        host.resume(&mut engine);

        event_loop
            .run(move |event, elwt| match event {
                Event::UserEvent(command) => {
                    if host.handle_command(&mut engine, command) {
                        elwt.exit();
                    }
                }
                Event::WindowEvent { window_id, event } if window_id == host.window.id() => {
                    match event {
                        WindowEvent::CloseRequested | WindowEvent::Destroyed => elwt.exit(),
                        WindowEvent::Resized(new_size) => {
                            engine.resize(new_size.width, new_size.height);
                        }
                        WindowEvent::CursorMoved { position, .. } => {
                            let size = host.window.inner_size();
                            engine
                                .pointer()
                                .track(position.x, position.y, size.width, size.height);
                        }
                        WindowEvent::CursorLeft { .. } => engine.pointer().reset(),
                        WindowEvent::KeyboardInput { event, .. } => {
                            if host.handle_key(&mut engine, &event) {
                                elwt.exit();
                            }
                        }
                        WindowEvent::RedrawRequested => {
                            if let Some(handle) = engine.scheduler_mut().take_due() {
                                engine.on_frame(handle, Instant::now());
                            }
                        }
                        _ => {}
                    }
                }
                Event::LoopExiting => engine.shutdown(),
                _ => {}
            })
            .map_err(|err| anyhow!("window event loop error: {err}"))
    }
}

struct HostState {
    window: Arc<Window>,
    /// Set while the user has the loop stopped.
    paused: bool,
}

impl HostState {
    fn resume(&mut self, engine: &mut WindowEngine) {
        self.paused = false;
        if !engine.is_running() && !engine.start(Instant::now()) {
            if let Some(err) = engine.failure() {
                warn!(kind = err.kind(), "background is not rendering");
            }
        }
    }

    fn pause(&mut self, engine: &mut WindowEngine) {
        self.paused = true;
        engine.stop();
    }

    /// Returns true when the host should exit.
    fn handle_command(&mut self, engine: &mut WindowEngine, command: HostCommand) -> bool {
        match command {
            HostCommand::SetParameters(update) => engine.controls().set(update),
            HostCommand::ApplyPreset(preset) => {
                info!(%preset, "applying preset");
                engine.controls().apply_preset(preset);
            }
            HostCommand::Stop => self.pause(engine),
            HostCommand::Start => self.resume(engine),
            HostCommand::Reload(program) => match engine.swap_program(&program) {
                Ok(()) => {
                    if !self.paused {
                        self.resume(engine);
                    }
                }
                Err(err) => error!("failed to reload visual program: {err}"),
            },
            HostCommand::Shutdown => return true,
        }
        false
    }

    /// Returns true when the host should exit.
    fn handle_key(&mut self, engine: &mut WindowEngine, event: &KeyEvent) -> bool {
        if event.state != ElementState::Pressed || event.repeat {
            return false;
        }
        match &event.logical_key {
            Key::Named(NamedKey::Escape) => return true,
            Key::Named(NamedKey::Space) => {
                if engine.is_running() {
                    self.pause(engine);
                } else {
                    self.resume(engine);
                }
            }
            Key::Character(value) => {
                if let Some(preset) = preset_for_key(value.as_str()) {
                    info!(%preset, "applying preset");
                    engine.controls().apply_preset(preset);
                }
            }
            _ => {}
        }
        false
    }
}

/// Number keys select presets in [`Preset::ALL`] order.
fn preset_for_key(key: &str) -> Option<Preset> {
    let index = key.parse::<usize>().ok()?.checked_sub(1)?;
    Preset::ALL.get(index).copied()
}
