//! Reference switch model.
//!
//! A switch sits at a fixed physical position. A min-end switch reads
//! "hit" at or below that position, a max-end switch at or above it.

use stepper_common::motion::reference::ReferenceEnd;

/// Simulated reference switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceSwitch {
    /// End of travel the switch guards
    end: ReferenceEnd,
    /// Physical trigger position [steps]
    trigger_at: i64,
    /// Input value while the switch is hit
    hit_value: u8,
}

impl ReferenceSwitch {
    /// Create a switch at `trigger_at` reading `hit_value` when hit.
    pub fn new(end: ReferenceEnd, trigger_at: i64, hit_value: u8) -> Self {
        Self {
            end,
            trigger_at,
            hit_value,
        }
    }

    /// True if the switch is hit at the given physical position.
    #[inline]
    pub fn is_hit(&self, position: i64) -> bool {
        match self.end {
            ReferenceEnd::Min => position <= self.trigger_at,
            ReferenceEnd::Max => position >= self.trigger_at,
        }
    }

    /// Raw input value at the given physical position.
    #[inline]
    pub fn value(&self, position: i64) -> u8 {
        if self.is_hit(position) {
            self.hit_value
        } else {
            self.idle_value()
        }
    }

    /// Input value while the switch is not hit.
    #[inline]
    pub fn idle_value(&self) -> u8 {
        if self.hit_value == 0 { 1 } else { 0 }
    }

    /// End of travel the switch guards.
    #[inline]
    pub fn end(&self) -> ReferenceEnd {
        self.end
    }

    /// Physical trigger position.
    #[inline]
    pub fn trigger_at(&self) -> i64 {
        self.trigger_at
    }
}
