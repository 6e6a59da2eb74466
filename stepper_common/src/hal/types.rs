//! Output types passed across the HAL boundary.

use serde::{Deserialize, Serialize};

use crate::consts::MAX_AXES;

/// Pulses per axis for one `StepOutput::step` call.
pub type StepPulses = [u8; MAX_AXES];

/// Axis travel direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum Direction {
    /// Position increases.
    #[default]
    Positive = 0,
    /// Position decreases.
    Negative = 1,
}

impl Direction {
    /// Direction of a signed distance (zero counts as positive).
    #[inline]
    pub const fn of(distance: i64) -> Self {
        if distance < 0 { Self::Negative } else { Self::Positive }
    }

    /// Direction with the output inverted when `invert` is set.
    #[inline]
    pub const fn inverted_if(self, invert: bool) -> Self {
        match (self, invert) {
            (d, false) => d,
            (Self::Positive, true) => Self::Negative,
            (Self::Negative, true) => Self::Positive,
        }
    }

    /// Returns the sign multiplier.
    #[inline]
    pub const fn sign(&self) -> i64 {
        match self {
            Self::Positive => 1,
            Self::Negative => -1,
        }
    }

    /// True for `Positive`.
    #[inline]
    pub const fn is_positive(&self) -> bool {
        matches!(self, Self::Positive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_of_distance() {
        assert_eq!(Direction::of(5), Direction::Positive);
        assert_eq!(Direction::of(0), Direction::Positive);
        assert_eq!(Direction::of(-1), Direction::Negative);
        assert_eq!(Direction::Negative.sign(), -1);
    }

    #[test]
    fn test_direction_inversion() {
        assert_eq!(Direction::Positive.inverted_if(true), Direction::Negative);
        assert_eq!(Direction::Negative.inverted_if(true), Direction::Positive);
        assert_eq!(Direction::Negative.inverted_if(false), Direction::Negative);
    }
}
