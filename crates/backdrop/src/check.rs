use anyhow::{Context, Result};
use renderer::headless::HeadlessProvider;
use renderer::program::{
    ATTRIBUTE_POSITION, UNIFORM_INTENSITY, UNIFORM_MOUSE, UNIFORM_RESOLUTION, UNIFORM_SPEED,
    UNIFORM_TIME,
};
use renderer::{
    CapabilityTier, EngineConfig, ManualFrameClock, ParameterDefaults, RenderEngine, SurfaceSize,
    UniformLocation,
};

use crate::cli::CheckArgs;
use crate::files::ProgramFiles;

/// Surface size used for validation; nothing is rasterized.
const CHECK_SURFACE: (u32, u32) = (1280, 720);

pub fn run_check(args: CheckArgs) -> Result<()> {
    let files = ProgramFiles {
        vertex: args.vertex,
        fragment: args.fragment,
    };
    let program = files.load()?;

    let mut provider = match args.tier {
        Some(tier) => HeadlessProvider::with_tiers(&[tier]),
        None => HeadlessProvider::new(),
    };
    let engine = RenderEngine::initialize(
        &mut provider,
        SurfaceSize::new(CHECK_SURFACE.0, CHECK_SURFACE.1),
        ManualFrameClock::new(),
        EngineConfig::new(program, ParameterDefaults::default()),
    );
    if let Some(err) = engine.failure() {
        anyhow::bail!("visual program check failed: {err}");
    }

    let tier = engine.tier().unwrap_or(CapabilityTier::Full);
    let bindings = engine
        .bindings()
        .context("engine reported success without a program")?;

    println!("Visual program OK (tier: {tier})");
    println!("  attribute {ATTRIBUTE_POSITION:<13} {}", location(bindings.position));
    for (name, binding) in [
        (UNIFORM_TIME, bindings.time),
        (UNIFORM_RESOLUTION, bindings.resolution),
        (UNIFORM_MOUSE, bindings.mouse),
        (UNIFORM_INTENSITY, bindings.intensity),
        (UNIFORM_SPEED, bindings.speed),
    ] {
        println!("  uniform   {name:<13} {}", offset(binding));
    }
    Ok(())
}

fn location(value: Option<u32>) -> String {
    value
        .map(|location| format!("location {location}"))
        .unwrap_or_else(|| "unused".to_string())
}

fn offset(value: Option<UniformLocation>) -> String {
    value
        .map(|location| format!("offset {}", location.raw()))
        .unwrap_or_else(|| "unused".to_string())
}
