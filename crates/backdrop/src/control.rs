//! Line-oriented control channel on standard input.
//!
//! One command per line:
//!
//! ```text
//! intensity 1.4
//! speed 0.5
//! set intensity=1.2 speed=2
//! {"intensity": 0.9, "speed": 1.1}
//! preset emergency
//! stop | start | reload | quit
//! ```

use std::io::{self, BufRead};
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result};
use renderer::{ControlProxy, HostCommand, ParameterUpdate, Preset};

use crate::files::ProgramFiles;

#[derive(Debug, Clone, PartialEq)]
pub enum ControlCommand {
    Set(ParameterUpdate),
    Preset(Preset),
    Stop,
    Start,
    Reload,
    Quit,
}

/// Parses one line. Blank lines and `#` comments yield `None`.
pub fn parse_command(line: &str) -> Result<Option<ControlCommand>, String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    if line.starts_with('{') {
        let update: ParameterUpdate =
            serde_json::from_str(line).map_err(|err| format!("invalid JSON update: {err}"))?;
        return Ok(Some(ControlCommand::Set(update)));
    }

    let mut words = line.split_whitespace();
    let verb = words.next().unwrap_or_default().to_ascii_lowercase();
    let args: Vec<&str> = words.collect();

    let command = match (verb.as_str(), args.as_slice()) {
        ("intensity", [value]) => {
            ControlCommand::Set(ParameterUpdate::intensity(parse_value("intensity", value)?))
        }
        ("speed", [value]) => ControlCommand::Set(ParameterUpdate::speed(parse_value("speed", value)?)),
        ("set", pairs) if !pairs.is_empty() => ControlCommand::Set(parse_pairs(pairs)?),
        ("preset", [name]) => ControlCommand::Preset(name.parse().map_err(|err| format!("{err}"))?),
        ("stop", []) => ControlCommand::Stop,
        ("start", []) => ControlCommand::Start,
        ("reload", []) => ControlCommand::Reload,
        ("quit" | "exit", []) => ControlCommand::Quit,
        (verb, _) => return Err(format!("unrecognised command '{verb}'")),
    };
    Ok(Some(command))
}

fn parse_value(name: &str, raw: &str) -> Result<f32, String> {
    let value: f32 = raw
        .parse()
        .map_err(|_| format!("{name} expects a number, got '{raw}'"))?;
    // Out-of-range values, infinities included, are clamped downstream.
    if value.is_nan() {
        return Err(format!("{name} must be a number"));
    }
    Ok(value)
}

fn parse_pairs(pairs: &[&str]) -> Result<ParameterUpdate, String> {
    let mut update = ParameterUpdate::default();
    for pair in pairs {
        let (key, raw) = pair
            .split_once('=')
            .ok_or_else(|| format!("expected key=value, got '{pair}'"))?;
        match key.to_ascii_lowercase().as_str() {
            "intensity" => update.intensity = Some(parse_value("intensity", raw)?),
            "speed" => update.speed = Some(parse_value("speed", raw)?),
            other => return Err(format!("unknown parameter '{other}'")),
        }
    }
    Ok(update)
}

/// Reads commands until stdin closes or the window goes away. `reload`
/// re-reads `files` on this thread so the window only receives source text.
pub fn spawn_stdin_reader(proxy: ControlProxy, files: ProgramFiles) -> Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("stdin-control".into())
        .spawn(move || {
            let stdin = io::stdin();
            for line in stdin.lock().lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(err) => {
                        tracing::warn!(error = %err, "failed to read control input");
                        break;
                    }
                };
                let command = match parse_command(&line) {
                    Ok(Some(command)) => command,
                    Ok(None) => continue,
                    Err(message) => {
                        tracing::warn!(%line, "ignoring control line: {message}");
                        continue;
                    }
                };
                let host = match command {
                    ControlCommand::Set(update) => HostCommand::SetParameters(update),
                    ControlCommand::Preset(preset) => HostCommand::ApplyPreset(preset),
                    ControlCommand::Stop => HostCommand::Stop,
                    ControlCommand::Start => HostCommand::Start,
                    ControlCommand::Reload => match files.load() {
                        Ok(program) => HostCommand::Reload(program),
                        Err(err) => {
                            tracing::error!("reload failed: {err:#}");
                            continue;
                        }
                    },
                    ControlCommand::Quit => HostCommand::Shutdown,
                };
                if proxy.send(host).is_err() {
                    break;
                }
            }
            tracing::debug!("control input closed");
        })
        .context("failed to spawn stdin control thread")
}
