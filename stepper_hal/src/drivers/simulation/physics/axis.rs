//! Axis physics simulator.
//!
//! The `AxisSimulator` follows the step and direction outputs of one
//! axis and tracks the resulting physical position in steps.

use stepper_common::hal::types::Direction;
use tracing::trace;

/// Axis simulator driven by step/dir outputs.
#[derive(Debug, Clone)]
pub struct AxisSimulator {
    /// Physical position [steps], signed so travel beyond zero is visible
    position: i64,
    /// Level of the direction output
    direction: Direction,
    /// Driver enable level
    enable_level: u8,
    /// Total pulses received
    pulses: u64,
    /// Number of direction output changes
    direction_changes: u32,
    /// Lowest position seen
    min_position: i64,
    /// Highest position seen
    max_position: i64,
}

impl AxisSimulator {
    /// Create an axis standing at `position`.
    pub fn new(position: i64) -> Self {
        Self {
            position,
            direction: Direction::Positive,
            enable_level: 0,
            pulses: 0,
            direction_changes: 0,
            min_position: position,
            max_position: position,
        }
    }

    /// Latch a new direction output level.
    pub fn set_direction(&mut self, direction: Direction) {
        if direction != self.direction {
            self.direction_changes += 1;
            self.direction = direction;
        }
    }

    /// Apply `count` step pulses in the latched direction.
    pub fn apply_pulses(&mut self, count: u8) {
        if count == 0 {
            return;
        }
        self.pulses += u64::from(count);
        self.position += self.direction.sign() * i64::from(count);
        self.min_position = self.min_position.min(self.position);
        self.max_position = self.max_position.max(self.position);
    }

    /// Set the driver enable level.
    pub fn set_enable_level(&mut self, level: u8) {
        if level != self.enable_level {
            trace!(from = self.enable_level, to = level, "Axis enable level changed");
        }
        self.enable_level = level;
    }

    /// Move the axis by hand (e.g. to place it before a reference test).
    pub fn set_position(&mut self, position: i64) {
        self.position = position;
        self.min_position = position;
        self.max_position = position;
    }

    /// Physical position [steps].
    #[inline]
    pub fn position(&self) -> i64 {
        self.position
    }

    /// Latched direction output.
    #[inline]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Driver enable level.
    #[inline]
    pub fn enable_level(&self) -> u8 {
        self.enable_level
    }

    /// Total pulses received.
    #[inline]
    pub fn pulses(&self) -> u64 {
        self.pulses
    }

    /// Number of direction output changes.
    #[inline]
    pub fn direction_changes(&self) -> u32 {
        self.direction_changes
    }

    /// Lowest and highest position seen since the last `set_position`.
    #[inline]
    pub fn travel_range(&self) -> (i64, i64) {
        (self.min_position, self.max_position)
    }
}
