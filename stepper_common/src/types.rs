//! Primitive unit types shared by planner, scheduler and HAL.
//!
//! All motion math is done in integer step and timer units.

/// Axis index (0-based, `< MAX_AXES`).
pub type Axis = usize;

/// Timer value: ticks of the step timer per step. Smaller is faster.
pub type Timer = u32;

/// Step count within one movement.
pub type Steps = u32;

/// Absolute axis position [steps].
pub type Position = u32;

/// Signed relative distance [steps].
pub type Distance = i64;

/// Speed [steps/s].
pub type StepRate = u32;

/// Timer value standing for zero speed (standstill).
pub const TIMER_STOP: Timer = Timer::MAX;

/// Convert a speed to a timer value for the given timer frequency.
///
/// A speed of zero maps to [`TIMER_STOP`].
#[inline]
pub const fn speed_to_timer(frequency: u32, speed: StepRate) -> Timer {
    if speed == 0 {
        TIMER_STOP
    } else {
        let timer = frequency / speed;
        if timer == 0 { 1 } else { timer }
    }
}

/// Convert a timer value back to a speed for the given timer frequency.
#[inline]
pub const fn timer_to_speed(frequency: u32, timer: Timer) -> StepRate {
    if timer == 0 || timer == TIMER_STOP {
        0
    } else {
        frequency / timer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_speed_is_stop() {
        assert_eq!(speed_to_timer(2_000_000, 0), TIMER_STOP);
        assert_eq!(timer_to_speed(2_000_000, TIMER_STOP), 0);
    }

    #[test]
    fn speed_timer_conversion() {
        assert_eq!(speed_to_timer(2_000_000, 1000), 2000);
        assert_eq!(timer_to_speed(2_000_000, 2000), 1000);
        // Faster than one tick per step clamps to one tick.
        assert_eq!(speed_to_timer(1000, 5000), 1);
    }
}
