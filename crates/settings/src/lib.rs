use std::fs;
use std::path::{Path, PathBuf};

use renderer::{ParameterDefaults, Preset};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub parameters: ParameterSettings,
    #[serde(default)]
    pub program: ProgramSettings,
    #[serde(default)]
    pub window: WindowSettings,
    /// Directory relative program paths resolve against.
    #[serde(skip)]
    base_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ParameterSettings {
    pub intensity: Option<f32>,
    pub speed: Option<f32>,
    pub preset: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ProgramSettings {
    pub vertex: Option<PathBuf>,
    pub fragment: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WindowSettings {
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            title: default_title(),
            width: default_width(),
            height: default_height(),
        }
    }
}

fn default_title() -> String {
    "Backdrop".to_string()
}

fn default_width() -> u32 {
    1280
}

fn default_height() -> u32 {
    720
}

impl Settings {
    pub fn from_toml_str(input: &str) -> Result<Self, SettingsError> {
        let raw: Settings = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    /// Reads and validates `path`. Program paths in the file resolve against
    /// the file's directory.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let input = fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut settings = Self::from_toml_str(&input)?;
        settings.base_dir = path.parent().map(Path::to_path_buf);
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        for (name, value) in [
            ("intensity", self.parameters.intensity),
            ("speed", self.parameters.speed),
        ] {
            if let Some(value) = value {
                if !value.is_finite() {
                    return Err(SettingsError::Invalid(format!(
                        "parameters.{name} must be a finite number"
                    )));
                }
            }
        }

        if let Some(raw) = &self.parameters.preset {
            raw.parse::<Preset>()
                .map_err(|err| SettingsError::Invalid(format!("parameters.preset: {err}")))?;
        }

        if self.window.width == 0 || self.window.height == 0 {
            return Err(SettingsError::Invalid(format!(
                "window size must be non-zero (got {}x{})",
                self.window.width, self.window.height
            )));
        }

        for (name, path) in [
            ("vertex", &self.program.vertex),
            ("fragment", &self.program.fragment),
        ] {
            if path.as_ref().is_some_and(|path| path.as_os_str().is_empty()) {
                return Err(SettingsError::Invalid(format!(
                    "program.{name} may not be empty"
                )));
            }
        }

        Ok(())
    }

    pub fn preset(&self) -> Option<Preset> {
        self.parameters
            .preset
            .as_deref()
            .and_then(|raw| raw.parse().ok())
    }

    /// Starting parameters: the construction defaults, then explicit values,
    /// then the preset if one is named.
    pub fn defaults(&self) -> ParameterDefaults {
        let mut defaults = ParameterDefaults::CONSTRUCTION;
        if let Some(intensity) = self.parameters.intensity {
            defaults.intensity = intensity;
        }
        if let Some(speed) = self.parameters.speed {
            defaults.speed = speed;
        }
        if let Some(preset) = self.preset() {
            let (intensity, speed) = preset.values();
            defaults = ParameterDefaults { intensity, speed };
        }
        defaults
    }

    pub fn vertex_path(&self) -> Option<PathBuf> {
        self.program.vertex.as_deref().map(|path| self.resolve(path))
    }

    pub fn fragment_path(&self) -> Option<PathBuf> {
        self.program.fragment.as_deref().map(|path| self.resolve(path))
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }
}
