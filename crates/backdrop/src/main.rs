mod check;
mod cli;
mod control;
mod files;
mod paths;
mod run;

use anyhow::Result;
use cli::Command;
use renderer::Preset;

fn main() -> Result<()> {
    let cli = cli::parse();
    run::initialise_tracing();

    match cli.command {
        Some(Command::Check(args)) => check::run_check(args),
        Some(Command::Presets) => {
            print_presets();
            Ok(())
        }
        None => run::run(cli.run),
    }
}

fn print_presets() {
    println!("Presets (window key, name, intensity, speed):");
    for (index, preset) in Preset::ALL.iter().enumerate() {
        let (intensity, speed) = preset.values();
        println!(
            "  {key}  {name:<12} intensity={intensity:.2} speed={speed:.2}",
            key = index + 1,
            name = preset.name()
        );
    }
}
