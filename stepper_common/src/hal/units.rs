//! Engineering unit ↔ step conversion.

use crate::consts::MAX_AXES;
use crate::motion::config::StepperConfig;
use crate::types::{Axis, Position};

/// Converts engineering units (mm, degrees, ...) to step counts and back.
pub trait UnitConversion {
    /// Convert a value in engineering units to steps (rounded to nearest).
    fn to_steps(&self, axis: Axis, value: f64) -> i64;

    /// Convert a step count to engineering units.
    fn to_units(&self, axis: Axis, steps: i64) -> f64;

    /// Convert an absolute position in units, clamping at zero.
    fn to_position(&self, axis: Axis, value: f64) -> Position {
        self.to_steps(axis, value).clamp(0, i64::from(Position::MAX)) as Position
    }
}

/// Linear scale per axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearUnits {
    steps_per_unit: [f64; MAX_AXES],
}

impl Default for LinearUnits {
    fn default() -> Self {
        Self {
            steps_per_unit: [1.0; MAX_AXES],
        }
    }
}

impl LinearUnits {
    /// Scales taken from the axis configuration.
    pub fn from_config(config: &StepperConfig) -> Self {
        let mut units = Self::default();
        for (scale, axis) in units.steps_per_unit.iter_mut().zip(&config.axes) {
            *scale = axis.steps_per_unit;
        }
        units
    }

    /// Steps per unit of an axis.
    #[inline]
    pub fn steps_per_unit(&self, axis: Axis) -> f64 {
        self.steps_per_unit.get(axis).copied().unwrap_or(1.0)
    }
}

impl UnitConversion for LinearUnits {
    fn to_steps(&self, axis: Axis, value: f64) -> i64 {
        (value * self.steps_per_unit(axis)).round() as i64
    }

    fn to_units(&self, axis: Axis, steps: i64) -> f64 {
        steps as f64 / self.steps_per_unit(axis)
    }
}
