use std::path::PathBuf;

use clap::{Parser, Subcommand};
use renderer::{CapabilityTier, Preset};

#[derive(Parser, Debug)]
#[command(
    name = "backdrop",
    author,
    version,
    about = "Full-window procedural shader background",
    arg_required_else_help = false
)]
pub struct Cli {
    #[command(flatten)]
    pub run: RunArgs,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Settings file to use instead of `config.toml` in the config directory.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// GLSL vertex stage replacing the bundled pass-through shader.
    #[arg(long, value_name = "FILE")]
    pub vertex: Option<PathBuf>,

    /// GLSL fragment stage replacing the bundled construction shader.
    #[arg(long, value_name = "FILE")]
    pub fragment: Option<PathBuf>,

    /// Starting intensity (0-2).
    #[arg(long, value_name = "VALUE", allow_negative_numbers = true)]
    pub intensity: Option<f32>,

    /// Starting animation speed (0-5).
    #[arg(long, value_name = "VALUE", allow_negative_numbers = true)]
    pub speed: Option<f32>,

    /// Starting preset: blueprint, active, maintenance, or emergency.
    #[arg(long, value_name = "NAME", value_parser = parse_preset)]
    pub preset: Option<Preset>,

    /// Initial window size (e.g. `1280x720`).
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_size)]
    pub size: Option<(u32, u32)>,

    /// Do not read control commands from standard input.
    #[arg(long)]
    pub no_stdin: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compile and link a visual program without opening a window.
    Check(CheckArgs),
    /// List the parameter presets.
    Presets,
}

#[derive(Parser, Debug)]
pub struct CheckArgs {
    /// GLSL vertex stage; defaults to the bundled pass-through shader.
    #[arg(long, value_name = "FILE")]
    pub vertex: Option<PathBuf>,

    /// GLSL fragment stage; defaults to the bundled construction shader.
    #[arg(long, value_name = "FILE")]
    pub fragment: Option<PathBuf>,

    /// Only try this capability tier: `full` or `reduced`.
    #[arg(long, value_name = "TIER", value_parser = parse_tier)]
    pub tier: Option<CapabilityTier>,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_preset(value: &str) -> Result<Preset, String> {
    value.trim().parse().map_err(|err| format!("{err}"))
}

pub fn parse_tier(value: &str) -> Result<CapabilityTier, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "full" => Ok(CapabilityTier::Full),
        "reduced" => Ok(CapabilityTier::Reduced),
        other => Err(format!("unknown tier '{other}'; expected full or reduced")),
    }
}

pub fn parse_size(value: &str) -> Result<(u32, u32), String> {
    let (w, h) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| "expected WIDTHxHEIGHT".to_string())?;
    let width = w
        .trim()
        .parse::<u32>()
        .map_err(|_| "invalid width".to_string())?;
    let height = h
        .trim()
        .parse::<u32>()
        .map_err(|_| "invalid height".to_string())?;
    if width == 0 || height == 0 {
        return Err("window dimensions must be greater than zero".into());
    }
    Ok((width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sizes() {
        assert_eq!(parse_size("1920x1080").unwrap(), (1920, 1080));
        assert_eq!(parse_size(" 800 X 600 ").unwrap(), (800, 600));
        assert!(parse_size("800").is_err());
        assert!(parse_size("0x600").is_err());
    }

    #[test]
    fn parses_tiers_and_presets() {
        assert_eq!(parse_tier("Reduced").unwrap(), CapabilityTier::Reduced);
        assert!(parse_tier("ultra").is_err());
        assert_eq!(parse_preset("active").unwrap(), Preset::Active);
        assert!(parse_preset("lunch").is_err());
    }

    #[test]
    fn run_flags_parse_alongside_no_subcommand() {
        let cli = Cli::try_parse_from([
            "backdrop",
            "--intensity",
            "1.4",
            "--preset",
            "emergency",
            "--size",
            "640x480",
            "--no-stdin",
        ])
        .unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.run.intensity, Some(1.4));
        assert_eq!(cli.run.preset, Some(Preset::Emergency));
        assert_eq!(cli.run.size, Some((640, 480)));
        assert!(cli.run.no_stdin);
    }
}
