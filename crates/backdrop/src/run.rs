use std::path::Path;

use anyhow::{Context, Result};
use renderer::{BackgroundWindow, EngineConfig, ParameterDefaults, WindowOptions};
use settings::Settings;
use tracing_subscriber::EnvFilter;

use crate::cli::RunArgs;
use crate::control::spawn_stdin_reader;
use crate::files::ProgramFiles;
use crate::paths::AppPaths;

pub fn run(args: RunArgs) -> Result<()> {
    let paths = AppPaths::discover()?;
    let settings = load_settings(&paths, args.config.as_deref())?;

    let files = ProgramFiles {
        vertex: args.vertex.clone().or_else(|| settings.vertex_path()),
        fragment: args.fragment.clone().or_else(|| settings.fragment_path()),
    };
    let program = files.load()?;
    let defaults = resolve_defaults(&args, &settings);
    let size = args
        .size
        .unwrap_or((settings.window.width, settings.window.height));
    tracing::debug!(
        config = %paths.config_dir().display(),
        vertex = ?files.vertex,
        fragment = ?files.fragment,
        intensity = defaults.intensity,
        speed = defaults.speed,
        width = size.0,
        height = size.1,
        "resolved backdrop settings"
    );

    let window = BackgroundWindow::new(WindowOptions {
        title: settings.window.title.clone(),
        size,
        config: EngineConfig::new(program, defaults),
    })?;
    if args.no_stdin {
        tracing::info!("stdin control disabled (--no-stdin)");
    } else {
        spawn_stdin_reader(window.proxy(), files)?;
    }
    window.run()
}

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// An explicit `--config` must exist; the default location is optional.
fn load_settings(paths: &AppPaths, explicit: Option<&Path>) -> Result<Settings> {
    if let Some(path) = explicit {
        return Settings::load(path)
            .with_context(|| format!("failed to load settings from {}", path.display()));
    }
    let path = paths.config_file();
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no settings file; using defaults");
        return Ok(Settings::default());
    }
    Settings::load(&path).with_context(|| format!("failed to load settings from {}", path.display()))
}

/// File values first, then command-line values. A preset wins over explicit
/// numbers from the same source.
fn resolve_defaults(args: &RunArgs, settings: &Settings) -> ParameterDefaults {
    let mut defaults = settings.defaults();
    if let Some(intensity) = args.intensity {
        defaults.intensity = intensity;
    }
    if let Some(speed) = args.speed {
        defaults.speed = speed;
    }
    if let Some(preset) = args.preset {
        let (intensity, speed) = preset.values();
        defaults = ParameterDefaults { intensity, speed };
    }
    defaults
}
