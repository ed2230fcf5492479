//! Live visual parameters shared between the control surface and the render
//! loop.
//!
//! All access happens on the thread that owns the engine, so the state is a
//! plain `Rc` of `Cell`s. The render loop reads it once per tick through
//! [`ParameterState::snapshot`], which is what keeps a write from being
//! observed halfway through a frame.

use std::cell::Cell;
use std::ops::RangeInclusive;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

pub const INTENSITY_RANGE: RangeInclusive<f32> = 0.0..=2.0;
pub const SPEED_RANGE: RangeInclusive<f32> = 0.0..=5.0;
pub const POINTER_RANGE: RangeInclusive<f32> = 0.0..=1.0;

/// Pointer position used until the pointer collaborator reports one.
pub const POINTER_CENTER: [f32; 2] = [0.5, 0.5];

pub(crate) fn clamp_to(range: &RangeInclusive<f32>, value: f32) -> f32 {
    value.clamp(*range.start(), *range.end())
}

/// Starting values for intensity and speed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterDefaults {
    pub intensity: f32,
    pub speed: f32,
}

impl ParameterDefaults {
    /// Defaults tuned for the bundled construction program.
    pub const CONSTRUCTION: Self = Self {
        intensity: 0.8,
        speed: 1.2,
    };

    /// Returns a copy with both fields clamped into their ranges.
    pub fn clamped(self) -> Self {
        Self {
            intensity: if self.intensity.is_nan() {
                1.0
            } else {
                clamp_to(&INTENSITY_RANGE, self.intensity)
            },
            speed: if self.speed.is_nan() {
                1.0
            } else {
                clamp_to(&SPEED_RANGE, self.speed)
            },
        }
    }
}

impl Default for ParameterDefaults {
    fn default() -> Self {
        Self {
            intensity: 1.0,
            speed: 1.0,
        }
    }
}

/// Values read by one render tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterSnapshot {
    pub intensity: f32,
    pub speed: f32,
    pub pointer: [f32; 2],
}

/// Process-wide parameter record. Every stored value is inside its range.
#[derive(Debug)]
pub struct ParameterState {
    intensity: Cell<f32>,
    speed: Cell<f32>,
    pointer: Cell<[f32; 2]>,
}

impl ParameterState {
    pub fn new(defaults: ParameterDefaults) -> Rc<Self> {
        let defaults = defaults.clamped();
        Rc::new(Self {
            intensity: Cell::new(defaults.intensity),
            speed: Cell::new(defaults.speed),
            pointer: Cell::new(POINTER_CENTER),
        })
    }

    pub fn intensity(&self) -> f32 {
        self.intensity.get()
    }

    pub fn speed(&self) -> f32 {
        self.speed.get()
    }

    pub fn pointer(&self) -> [f32; 2] {
        self.pointer.get()
    }

    pub fn snapshot(&self) -> ParameterSnapshot {
        ParameterSnapshot {
            intensity: self.intensity.get(),
            speed: self.speed.get(),
            pointer: self.pointer.get(),
        }
    }

    pub(crate) fn write_intensity(&self, value: f32) {
        self.intensity.set(clamp_to(&INTENSITY_RANGE, value));
    }

    pub(crate) fn write_speed(&self, value: f32) {
        self.speed.set(clamp_to(&SPEED_RANGE, value));
    }

    pub(crate) fn write_pointer(&self, x: f32, y: f32) {
        self.pointer
            .set([clamp_to(&POINTER_RANGE, x), clamp_to(&POINTER_RANGE, y)]);
    }
}

/// Writer for the pointer field, owned by whatever tracks the cursor.
///
/// Positions arrive in surface pixels with a top-left origin and are stored
/// normalized with the vertical axis flipped, so `y = 0` is the bottom edge.
#[derive(Debug, Clone)]
pub struct PointerTracker {
    parameters: Rc<ParameterState>,
}

impl PointerTracker {
    pub(crate) fn new(parameters: Rc<ParameterState>) -> Self {
        Self { parameters }
    }

    pub fn track(&self, x: f64, y: f64, width: u32, height: u32) {
        if width == 0 || height == 0 || x.is_nan() || y.is_nan() {
            return;
        }
        let nx = x / f64::from(width);
        let ny = 1.0 - y / f64::from(height);
        self.parameters.write_pointer(nx as f32, ny as f32);
    }

    pub fn reset(&self) {
        self.parameters
            .write_pointer(POINTER_CENTER[0], POINTER_CENTER[1]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_clamped_on_construction() {
        let state = ParameterState::new(ParameterDefaults {
            intensity: 7.0,
            speed: -3.0,
        });
        assert_eq!(state.intensity(), 2.0);
        assert_eq!(state.speed(), 0.0);
        assert_eq!(state.pointer(), POINTER_CENTER);
    }

    #[test]
    fn nan_defaults_fall_back_to_neutral() {
        let defaults = ParameterDefaults {
            intensity: f32::NAN,
            speed: f32::NAN,
        }
        .clamped();
        assert_eq!(defaults, ParameterDefaults::default());
    }

    #[test]
    fn pointer_flips_vertical_axis() {
        let state = ParameterState::new(ParameterDefaults::default());
        let tracker = PointerTracker::new(state.clone());
        tracker.track(200.0, 25.0, 800, 100);
        let [x, y] = state.pointer();
        assert!((x - 0.25).abs() < 1e-6);
        assert!((y - 0.75).abs() < 1e-6);
    }

    #[test]
    fn pointer_outside_surface_is_clamped() {
        let state = ParameterState::new(ParameterDefaults::default());
        let tracker = PointerTracker::new(state.clone());
        tracker.track(-40.0, 900.0, 800, 600);
        assert_eq!(state.pointer(), [0.0, 0.0]);
        tracker.reset();
        assert_eq!(state.pointer(), POINTER_CENTER);
    }

    #[test]
    fn zero_sized_surface_is_ignored() {
        let state = ParameterState::new(ParameterDefaults::default());
        let tracker = PointerTracker::new(state.clone());
        tracker.track(10.0, 10.0, 0, 600);
        assert_eq!(state.pointer(), POINTER_CENTER);
    }
}
