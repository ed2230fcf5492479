use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::params::ParameterState;

/// Partial parameter write. Absent fields leave the live value untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ParameterUpdate {
    pub intensity: Option<f32>,
    pub speed: Option<f32>,
}

impl ParameterUpdate {
    pub fn intensity(value: f32) -> Self {
        Self {
            intensity: Some(value),
            speed: None,
        }
    }

    pub fn speed(value: f32) -> Self {
        Self {
            intensity: None,
            speed: Some(value),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.intensity.is_none() && self.speed.is_none()
    }
}

/// Named parameter pairs from the construction control panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    Blueprint,
    Active,
    Maintenance,
    Emergency,
}

impl Preset {
    pub const ALL: [Preset; 4] = [
        Preset::Blueprint,
        Preset::Active,
        Preset::Maintenance,
        Preset::Emergency,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Preset::Blueprint => "blueprint",
            Preset::Active => "active",
            Preset::Maintenance => "maintenance",
            Preset::Emergency => "emergency",
        }
    }

    /// The `(intensity, speed)` pair the preset writes.
    pub fn values(self) -> (f32, f32) {
        match self {
            Preset::Blueprint => (0.6, 0.8),
            Preset::Active => (1.2, 1.5),
            Preset::Maintenance => (0.4, 0.5),
            Preset::Emergency => (1.8, 2.5),
        }
    }

    pub fn update(self) -> ParameterUpdate {
        let (intensity, speed) = self.values();
        ParameterUpdate {
            intensity: Some(intensity),
            speed: Some(speed),
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown preset '{0}' (expected one of: blueprint, active, maintenance, emergency)")]
pub struct UnknownPreset(pub String);

impl FromStr for Preset {
    type Err = UnknownPreset;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let needle = value.trim();
        Preset::ALL
            .into_iter()
            .find(|preset| preset.name().eq_ignore_ascii_case(needle))
            .ok_or_else(|| UnknownPreset(needle.to_string()))
    }
}

/// Public handle through which a host tunes the background at runtime.
///
/// It works whether or not the GPU program built successfully; values are
/// clamped into range, never rejected.
#[derive(Debug, Clone)]
pub struct ControlSurface {
    parameters: Rc<ParameterState>,
}

impl ControlSurface {
    pub(crate) fn new(parameters: Rc<ParameterState>) -> Self {
        Self { parameters }
    }

    pub fn set(&self, update: ParameterUpdate) {
        let mut touched = false;
        if let Some(intensity) = update.intensity.filter(|value| !value.is_nan()) {
            self.parameters.write_intensity(intensity);
            touched = true;
        }
        if let Some(speed) = update.speed.filter(|value| !value.is_nan()) {
            self.parameters.write_speed(speed);
            touched = true;
        }
        if touched {
            tracing::info!(
                intensity = self.parameters.intensity(),
                speed = self.parameters.speed(),
                "shader parameters updated"
            );
        }
    }

    pub fn apply_preset(&self, preset: Preset) {
        tracing::debug!(%preset, "applying preset");
        self.set(preset.update());
    }

    pub fn intensity(&self) -> f32 {
        self.parameters.intensity()
    }

    pub fn speed(&self) -> f32 {
        self.parameters.speed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::ParameterDefaults;

    fn surface() -> (ControlSurface, Rc<ParameterState>) {
        let state = ParameterState::new(ParameterDefaults::CONSTRUCTION);
        (ControlSurface::new(state.clone()), state)
    }

    #[test]
    fn intensity_is_clamped_to_nearest_bound() {
        let (controls, _) = surface();
        controls.set(ParameterUpdate::intensity(-1.0));
        assert_eq!(controls.intensity(), 0.0);
        controls.set(ParameterUpdate::intensity(3.5));
        assert_eq!(controls.intensity(), 2.0);
        controls.set(ParameterUpdate::intensity(1.25));
        assert_eq!(controls.intensity(), 1.25);
    }

    #[test]
    fn speed_is_clamped_to_nearest_bound() {
        let (controls, _) = surface();
        controls.set(ParameterUpdate::speed(-0.2));
        assert_eq!(controls.speed(), 0.0);
        controls.set(ParameterUpdate::speed(9.0));
        assert_eq!(controls.speed(), 5.0);
    }

    #[test]
    fn empty_update_changes_nothing() {
        let (controls, state) = surface();
        let before = state.snapshot();
        controls.set(ParameterUpdate::default());
        assert_eq!(state.snapshot(), before);
    }

    #[test]
    fn absent_fields_are_left_alone() {
        let (controls, _) = surface();
        controls.set(ParameterUpdate::speed(3.0));
        assert_eq!(controls.intensity(), 0.8);
        assert_eq!(controls.speed(), 3.0);
    }

    #[test]
    fn nan_is_treated_as_absent() {
        let (controls, _) = surface();
        controls.set(ParameterUpdate {
            intensity: Some(f32::NAN),
            speed: Some(2.0),
        });
        assert_eq!(controls.intensity(), 0.8);
        assert_eq!(controls.speed(), 2.0);
    }

    #[test]
    fn presets_write_their_literal_pairs() {
        let (controls, _) = surface();
        for preset in Preset::ALL {
            controls.apply_preset(preset);
            assert_eq!((controls.intensity(), controls.speed()), preset.values());
        }
    }

    #[test]
    fn presets_parse_case_insensitively() {
        assert_eq!("Emergency".parse::<Preset>(), Ok(Preset::Emergency));
        assert_eq!(" blueprint ".parse::<Preset>(), Ok(Preset::Blueprint));
        assert!("turbo".parse::<Preset>().is_err());
    }

    #[test]
    fn update_deserializes_from_partial_json() {
        let update: ParameterUpdate = serde_json::from_str(r#"{"speed": 2.0}"#).unwrap();
        assert_eq!(update, ParameterUpdate::speed(2.0));
        let empty: ParameterUpdate = serde_json::from_str("{}").unwrap();
        assert!(empty.is_empty());
    }
}
