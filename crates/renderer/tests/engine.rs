use std::time::{Duration, Instant};

use renderer::headless::{Command, HeadlessBackend, HeadlessProbe, HeadlessProvider, UniformValue};
use renderer::{
    CapabilityTier, EngineConfig, FrameResources, GraphicsContext, ManualFrameClock, ParameterDefaults, ParameterUpdate, Preset,
    RenderEngine, SurfaceSize, TickOutcome, VisualProgram,
};

type Engine = RenderEngine<HeadlessBackend, ManualFrameClock>;

const BROKEN_FRAGMENT: &str = "#version 450\n\
layout(location = 0) out vec4 outColor;\n\
void main() { outColor = vec4(1.0) + ; }\n";

const UNMATCHED_FRAGMENT: &str = "#version 450\n\
layout(location = 0) in vec2 v_uv;\n\
layout(location = 0) out vec4 outColor;\n\
void main() { outColor = vec4(v_uv, 0.0, 1.0); }\n";

const SOLID_FRAGMENT: &str = "#version 450\n\
layout(set = 0, binding = 0) uniform Params { float u_time; vec2 u_resolution; };\n\
layout(location = 0) out vec4 outColor;\n\
void main() { outColor = vec4(fract(u_time), gl_FragCoord.xy / u_resolution, 1.0); }\n";

fn engine_with(provider: &mut HeadlessProvider, config: EngineConfig) -> (Engine, ManualFrameClock) {
    let clock = ManualFrameClock::new();
    let engine = RenderEngine::initialize(
        provider,
        SurfaceSize::new(800, 600),
        clock.clone(),
        config,
    );
    (engine, clock)
}

fn construction() -> (Engine, ManualFrameClock, HeadlessProbe) {
    let mut provider = HeadlessProvider::new();
    let probe = provider.probe();
    let (engine, clock) = engine_with(&mut provider, EngineConfig::construction());
    (engine, clock, probe)
}

fn fire(engine: &mut Engine, clock: &ManualFrameClock, now: Instant) -> TickOutcome {
    let handle = clock.take_due().expect("a frame should be pending");
    engine.on_frame(handle, now)
}

fn assert_no_gpu_objects(probe: &HeadlessProbe) {
    assert_eq!(probe.live_shaders(), 0);
    assert_eq!(probe.live_programs(), 0);
    assert_eq!(probe.live_buffers(), 0);
}

#[test]
fn frame_feeds_every_binding_in_order() {
    let (mut engine, clock, probe) = construction();
    assert!(engine.failure().is_none());
    assert_eq!(engine.tier(), Some(CapabilityTier::Full));

    let t0 = Instant::now();
    assert!(engine.start(t0));
    assert_eq!(fire(&mut engine, &clock, t0), TickOutcome::Rendered { elapsed: 0.0 });

    let commands = probe.commands();
    assert_eq!(commands[0], Command::Viewport { width: 800, height: 600 });
    assert!(matches!(commands[1], Command::UseProgram { .. }));
    assert!(matches!(
        commands[2],
        Command::BindAttribute { location: 0, components: 2, .. }
    ));
    let uniforms: Vec<&str> = commands
        .iter()
        .filter_map(|command| match command {
            Command::Uniform { name, .. } => Some(name.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(
        uniforms,
        ["u_time", "u_resolution", "u_mouse", "u_intensity", "u_speed"]
    );
    assert_eq!(commands.last(), Some(&Command::Draw { first: 0, count: 4 }));

    assert_eq!(probe.last_uniform("u_mouse"), Some(UniformValue::Vec2([0.5, 0.5])));
    assert_eq!(probe.last_uniform("u_intensity"), Some(UniformValue::Float(0.8)));
    assert_eq!(probe.last_uniform("u_speed"), Some(UniformValue::Float(1.2)));
    assert!(clock.pending().is_some(), "next frame should be requested");
}

#[test]
fn compile_error_leaves_nothing_allocated() {
    let mut provider = HeadlessProvider::new();
    let probe = provider.probe();
    let config = EngineConfig::new(
        VisualProgram::with_fragment(BROKEN_FRAGMENT),
        ParameterDefaults::default(),
    );
    let (mut engine, clock) = engine_with(&mut provider, config);

    assert_eq!(engine.failure().map(|err| err.kind()), Some("shader_compile"));
    assert_no_gpu_objects(&probe);
    assert!(!engine.start(Instant::now()));
    assert_eq!(clock.requested(), 0);
    assert_eq!(probe.draws(), 0);
}

#[test]
fn link_error_leaves_nothing_allocated() {
    let mut provider = HeadlessProvider::new();
    let probe = provider.probe();
    let config = EngineConfig::new(
        VisualProgram::with_fragment(UNMATCHED_FRAGMENT),
        ParameterDefaults::default(),
    );
    let (engine, _clock) = engine_with(&mut provider, config);

    let err = engine.failure().expect("link should fail");
    assert_eq!(err.kind(), "program_link");
    assert!(err.to_string().contains("v_uv"));
    assert_no_gpu_objects(&probe);
}

#[test]
fn buffer_allocation_failure_disables_engine() {
    let mut provider = HeadlessProvider::new();
    let probe = provider.probe();
    probe.refuse_buffers(true);
    let (mut engine, _clock) = engine_with(&mut provider, EngineConfig::construction());

    assert_eq!(
        engine.failure().map(|err| err.kind()),
        Some("resource_allocation")
    );
    assert_no_gpu_objects(&probe);
    assert!(!engine.start(Instant::now()));
}

#[test]
fn falls_back_to_reduced_tier() {
    let mut provider = HeadlessProvider::with_tiers(&[CapabilityTier::Reduced]);
    let probe = provider.probe();
    let (engine, _clock) = engine_with(&mut provider, EngineConfig::construction());

    assert!(engine.failure().is_none());
    assert_eq!(engine.tier(), Some(CapabilityTier::Reduced));
    assert_eq!(
        probe.acquisitions(),
        vec![CapabilityTier::Full, CapabilityTier::Reduced]
    );
}

#[test]
fn missing_context_keeps_controls_working() {
    let mut provider = HeadlessProvider::unavailable();
    let (mut engine, clock) = engine_with(&mut provider, EngineConfig::construction());

    assert_eq!(
        engine.failure().map(|err| err.kind()),
        Some("context_unavailable")
    );
    assert_eq!(engine.tier(), None);
    assert!(!engine.start(Instant::now()));
    assert_eq!(clock.requested(), 0);

    engine.controls().set(ParameterUpdate::intensity(1.5));
    assert_eq!(engine.parameters().intensity(), 1.5);
}

#[test]
fn stop_halts_drawing_and_start_resumes() {
    let (mut engine, clock, probe) = construction();
    let t0 = Instant::now();
    engine.start(t0);
    for frame in 1..=3 {
        fire(&mut engine, &clock, t0 + Duration::from_millis(16 * frame));
    }
    assert_eq!(probe.draws(), 3);

    let stale = clock.pending().expect("frame pending while running");
    engine.stop();
    assert!(!engine.is_running());
    assert_eq!(clock.pending(), None);
    assert_eq!(engine.on_frame(stale, t0 + Duration::from_secs(1)), TickOutcome::Ignored);
    assert_eq!(probe.draws(), 3);

    assert!(engine.start(t0 + Duration::from_secs(2)));
    fire(&mut engine, &clock, t0 + Duration::from_secs(2));
    assert_eq!(probe.draws(), 4);
}

#[test]
fn elapsed_time_never_decreases() {
    let (mut engine, clock, _probe) = construction();
    let t0 = Instant::now();
    engine.start(t0);

    let later = fire(&mut engine, &clock, t0 + Duration::from_millis(1500));
    let earlier = fire(&mut engine, &clock, t0 + Duration::from_millis(500));
    let (TickOutcome::Rendered { elapsed: a }, TickOutcome::Rendered { elapsed: b }) =
        (later, earlier)
    else {
        panic!("both frames should render");
    };
    assert!((a - 1.5).abs() < 1e-4);
    assert!(b >= a);
}

#[test]
fn resize_reaches_the_next_frame() {
    let (mut engine, clock, probe) = construction();
    let t0 = Instant::now();
    engine.start(t0);
    fire(&mut engine, &clock, t0);
    assert_eq!(
        probe.last_uniform("u_resolution"),
        Some(UniformValue::Vec2([800.0, 600.0]))
    );

    engine.resize(1024, 768);
    fire(&mut engine, &clock, t0 + Duration::from_millis(16));
    assert_eq!(
        probe.last_uniform("u_resolution"),
        Some(UniformValue::Vec2([1024.0, 768.0]))
    );
    assert_eq!(probe.surface(), Some((1024, 768)));
}

#[test]
fn control_updates_land_on_the_next_frame() {
    let (mut engine, clock, probe) = construction();
    let t0 = Instant::now();
    engine.start(t0);

    engine.controls().set(ParameterUpdate {
        intensity: Some(3.5),
        speed: Some(-1.0),
    });
    engine.pointer().track(200.0, 150.0, 800, 600);
    fire(&mut engine, &clock, t0);

    assert_eq!(probe.last_uniform("u_intensity"), Some(UniformValue::Float(2.0)));
    assert_eq!(probe.last_uniform("u_speed"), Some(UniformValue::Float(0.0)));
    assert_eq!(probe.last_uniform("u_mouse"), Some(UniformValue::Vec2([0.25, 0.75])));

    engine.controls().apply_preset(Preset::Emergency);
    engine.pointer().reset();
    fire(&mut engine, &clock, t0 + Duration::from_millis(16));
    assert_eq!(probe.last_uniform("u_intensity"), Some(UniformValue::Float(1.8)));
    assert_eq!(probe.last_uniform("u_speed"), Some(UniformValue::Float(2.5)));
    assert_eq!(probe.last_uniform("u_mouse"), Some(UniformValue::Vec2([0.5, 0.5])));
}

#[test]
fn failed_swap_keeps_the_current_program() {
    let (mut engine, clock, probe) = construction();
    let t0 = Instant::now();
    engine.start(t0);

    let err = engine
        .swap_program(&VisualProgram::with_fragment(BROKEN_FRAGMENT))
        .unwrap_err();
    assert_eq!(err.kind(), "shader_compile");
    assert!(engine.has_program());
    assert_eq!(probe.live_programs(), 1);
    assert_eq!(probe.live_shaders(), 0);

    assert!(matches!(
        fire(&mut engine, &clock, t0),
        TickOutcome::Rendered { .. }
    ));
}

#[test]
fn successful_swap_replaces_the_program() {
    let (mut engine, clock, probe) = construction();
    let t0 = Instant::now();
    engine.start(t0);

    engine
        .swap_program(&VisualProgram::with_fragment(SOLID_FRAGMENT))
        .unwrap();
    assert_eq!(probe.live_programs(), 1);

    probe.clear_commands();
    fire(&mut engine, &clock, t0);
    // The new program only declares time and resolution.
    assert_eq!(probe.last_uniform("u_intensity"), None);
    assert!(probe.last_uniform("u_resolution").is_some());
}

#[test]
fn swap_recovers_from_a_failed_first_build() {
    let mut provider = HeadlessProvider::new();
    let probe = provider.probe();
    let config = EngineConfig::new(
        VisualProgram::with_fragment(BROKEN_FRAGMENT),
        ParameterDefaults::default(),
    );
    let (mut engine, clock) = engine_with(&mut provider, config);
    assert!(engine.failure().is_some());
    assert_eq!(probe.live_buffers(), 0);

    engine.swap_program(&VisualProgram::construction()).unwrap();
    assert!(engine.failure().is_none());
    assert_eq!(probe.live_programs(), 1);
    assert_eq!(probe.live_buffers(), 1);

    let t0 = Instant::now();
    assert!(engine.start(t0));
    assert!(matches!(
        fire(&mut engine, &clock, t0),
        TickOutcome::Rendered { .. }
    ));
    assert_eq!(probe.draws(), 1);
}

#[test]
fn swap_without_geometry_reports_allocation_failure() {
    let mut provider = HeadlessProvider::new();
    let probe = provider.probe();
    let config = EngineConfig::new(
        VisualProgram::with_fragment(BROKEN_FRAGMENT),
        ParameterDefaults::default(),
    );
    let (mut engine, _clock) = engine_with(&mut provider, config);
    probe.refuse_buffers(true);

    let err = engine
        .swap_program(&VisualProgram::construction())
        .unwrap_err();
    assert_eq!(err.kind(), "resource_allocation");
    assert!(!engine.has_program());
    assert_no_gpu_objects(&probe);
    assert!(!engine.start(Instant::now()));
}

#[test]
fn upload_replaces_the_previous_buffer() {
    let mut provider = HeadlessProvider::new();
    let probe = provider.probe();
    let mut context = GraphicsContext::acquire(&mut provider, SurfaceSize::new(64, 64)).unwrap();
    let mut resources = FrameResources::new();

    resources.upload(&mut context).unwrap();
    resources.upload(&mut context).unwrap();
    assert_eq!(probe.live_buffers(), 1);

    probe.refuse_buffers(true);
    let err = resources.upload(&mut context).unwrap_err();
    assert_eq!(err.kind(), "resource_allocation");
    assert!(resources.geometry().is_none());
    assert_eq!(probe.live_buffers(), 0);
}

#[test]
fn invalidated_program_halts_the_loop() {
    let (mut engine, clock, probe) = construction();
    let t0 = Instant::now();
    engine.start(t0);
    fire(&mut engine, &clock, t0);

    engine.invalidate_program();
    assert_eq!(probe.live_programs(), 0);
    assert_eq!(fire(&mut engine, &clock, t0), TickOutcome::Halted);
    assert!(!engine.is_running());
    assert_eq!(clock.pending(), None);
    assert_eq!(probe.draws(), 1);
}

#[test]
fn dropping_the_engine_releases_resources() {
    let (mut engine, clock, probe) = construction();
    engine.start(Instant::now());
    assert_eq!(probe.live_programs(), 1);
    assert_eq!(probe.live_buffers(), 1);

    drop(engine);
    assert_no_gpu_objects(&probe);
    assert_eq!(clock.pending(), None);
}
