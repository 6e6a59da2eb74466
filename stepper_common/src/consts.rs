//! System-wide constants for the stepper workspace.
//!
//! Single source of truth for buffer capacities, fixed-point scales and
//! configuration bounds shared by all crates.

use static_assertions::const_assert;

/// Maximum number of axes driven by one stepper instance.
pub const MAX_AXES: usize = 6;

/// Capacity of the movement ring buffer.
pub const MOVEMENT_BUFFER_SIZE: usize = 16;

/// Largest reference-axis distance of a single queued movement.
/// Longer requests are split into equal parts.
pub const MAX_MOVEMENT_STEPS: u32 = u16::MAX as u32;

/// Largest number of reference steps processed in one interrupt.
pub const MAX_STEP_MULTIPLIER: u8 = 8;

/// Number of reference inputs (a min and a max sensor per axis).
pub const MAX_REFERENCES: usize = MAX_AXES * 2;

/// Reference hit value meaning "sensor not used".
pub const REFERENCE_NOT_USED: u8 = 255;

// ─── Speed Override ─────────────────────────────────────────────────

/// Speed override value for 100%.
pub const SPEED_OVERRIDE_100P: u8 = 128;

/// Smallest speed override value.
pub const SPEED_OVERRIDE_MIN: u8 = 1;

/// Largest speed override value (~200%).
pub const SPEED_OVERRIDE_MAX: u8 = 255;

// ─── Enable Levels ──────────────────────────────────────────────────

/// Driver enable level: fully enabled.
pub const LEVEL_MAX: u8 = 255;

/// Driver enable level: off.
pub const LEVEL_OFF: u8 = 0;

// ─── Timer ──────────────────────────────────────────────────────────

/// Default step timer frequency [ticks/s].
pub const TIMER_FREQUENCY_DEFAULT: u32 = 2_000_000;
/// Lower bound for the step timer frequency [ticks/s].
pub const TIMER_FREQUENCY_MIN: u32 = 100_000;
/// Upper bound for the step timer frequency [ticks/s].
pub const TIMER_FREQUENCY_MAX: u32 = 100_000_000;

/// Default shortest interrupt interval the handler can sustain [ticks].
pub const MIN_INTERRUPT_INTERVAL_DEFAULT: u32 = 50;

/// Delay before the first interrupt of a newly started queue [ticks].
pub const TIMER_START_DELAY: u32 = 20;

/// Number of wait ticks per second (a wait is counted in 1/100 s).
pub const WAIT_TICKS_PER_SECOND: u32 = 100;

// ─── Axis Bounds ────────────────────────────────────────────────────

/// Default maximum speed for moves without explicit speed [steps/s].
pub const DEFAULT_MAX_SPEED_DEFAULT: u32 = 10_000;

/// Default backlash compensation speed [steps/s].
pub const BACKLASH_SPEED_DEFAULT: u32 = 2_000;

/// Smallest accepted acceleration or deceleration [steps/s²].
pub const ACCELERATION_MIN: u32 = 10;
/// Largest accepted acceleration or deceleration [steps/s²].
pub const ACCELERATION_MAX: u32 = 10_000_000;

/// Default acceleration and deceleration [steps/s²].
pub const ACCELERATION_DEFAULT: u32 = 50_000;

/// Smallest accepted axis speed [steps/s].
pub const SPEED_MIN: u32 = 1;
/// Largest accepted axis speed [steps/s].
pub const SPEED_MAX: u32 = 1_000_000;

/// Default speed change allowed without ramp at a junction [steps/s].
pub const JERK_SPEED_DEFAULT: u32 = 1_000;

/// Largest axis enable timeout [s]. Zero keeps the axis enabled.
pub const ENABLE_TIMEOUT_MAX: u8 = 240;

/// Largest reference debounce time [ms].
pub const REFERENCE_STABLE_TIME_MAX_MS: u32 = 1_000;

/// Default reference retract distance [steps].
pub const REFERENCE_RETRACT_DEFAULT: u32 = 100;

const_assert!(MAX_AXES > 0 && MAX_AXES <= 16);
const_assert!(MOVEMENT_BUFFER_SIZE >= 2 && MOVEMENT_BUFFER_SIZE <= 255);
const_assert!(MAX_STEP_MULTIPLIER >= 1);
const_assert!(TIMER_START_DELAY > 0);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants_are_consistent() {
        assert!(TIMER_FREQUENCY_MIN <= TIMER_FREQUENCY_DEFAULT);
        assert!(TIMER_FREQUENCY_DEFAULT <= TIMER_FREQUENCY_MAX);
        assert!(ACCELERATION_MIN < ACCELERATION_MAX);
        assert!(SPEED_OVERRIDE_MIN < SPEED_OVERRIDE_100P);
        assert!(SPEED_OVERRIDE_100P < SPEED_OVERRIDE_MAX);
    }

    #[test]
    fn reference_ids_fit_in_u8() {
        assert!(MAX_REFERENCES < REFERENCE_NOT_USED as usize);
    }
}
