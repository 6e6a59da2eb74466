//! Integer ramp math.
//!
//! A constant-acceleration curve is described by `c0² = 2F²/a`, the
//! square of the first step timer from standstill (`F` timer frequency,
//! `a` acceleration in steps/s²). With `k = c0²/4`:
//!
//! - the ramp level of timer `t` is `L(t) = k / t²`, the number of steps
//!   needed to reach `t` from standstill;
//! - the elapsed ticks after `L` steps from standstill are
//!   `T(L) = sqrt(c0² · L)`;
//! - the step from level `L` to `L + 1` lasts `T(L + 1) - T(L)`.
//!
//! Step durations telescope, so any run of steps on one curve lasts
//! exactly `T(L_end) - T(L_start)` ticks and costs one square root per
//! interrupt no matter how many steps it covers.

use serde::Serialize;
use stepper_common::types::{TIMER_STOP, Timer};

/// Floor square root of a `u64`.
pub fn isqrt_u64(x0: u64) -> u64 {
    let mut x = x0;
    let mut xr = 0u64; // result register
    let mut q2 = 0x4000_0000_0000_0000u64; // highest possible result bit
    while q2 != 0 {
        if xr + q2 <= x {
            x -= xr + q2;
            xr >>= 1;
            xr += q2;
        } else {
            xr >>= 1;
        }
        q2 >>= 2;
    }
    xr
}

/// Floor square root of a `u128`, saturated to `u64`.
pub fn isqrt_u128(x0: u128) -> u64 {
    if x0 <= u128::from(u64::MAX) {
        return isqrt_u64(x0 as u64);
    }
    let mut x = x0;
    let mut xr = 0u128;
    let mut q2 = 1u128 << 126;
    while q2 != 0 {
        if xr + q2 <= x {
            x -= xr + q2;
            xr >>= 1;
            xr += q2;
        } else {
            xr >>= 1;
        }
        q2 >>= 2;
    }
    u64::try_from(xr).unwrap_or(u64::MAX)
}

/// Constant-acceleration curve in timer units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RampCurve {
    /// Square of the first step timer from standstill.
    c0_sq: u64,
}

impl RampCurve {
    /// Curve for `acceleration` [steps/s²] at timer `frequency` [ticks/s].
    pub fn new(frequency: u32, acceleration: u32) -> Self {
        let f = u128::from(frequency);
        let a = u128::from(acceleration.max(1));
        let c0_sq = (2 * f * f / a).max(1);
        Self {
            c0_sq: u64::try_from(c0_sq).unwrap_or(u64::MAX),
        }
    }

    /// Curve on which `timer` is reached after exactly `level` steps
    /// from standstill.
    pub fn reaching(timer: Timer, level: u64) -> Self {
        let t = u128::from(timer);
        let c0_sq = (4 * u128::from(level) * t * t).max(1);
        Self {
            c0_sq: u64::try_from(c0_sq).unwrap_or(u64::MAX),
        }
    }

    /// First step timer from standstill.
    #[inline]
    pub fn c0(&self) -> Timer {
        clamp_timer(isqrt_u64(self.c0_sq))
    }

    /// Level constant `k = c0² / 4`.
    #[inline]
    pub fn k(&self) -> u64 {
        (self.c0_sq / 4).max(1)
    }

    /// Steps from standstill to `timer`. Zero for [`TIMER_STOP`].
    #[inline]
    pub fn level(&self, timer: Timer) -> u64 {
        if timer == TIMER_STOP || timer == 0 {
            return 0;
        }
        let t = u128::from(timer);
        u64::try_from(u128::from(self.k()) / (t * t)).unwrap_or(u64::MAX)
    }

    /// Timer reached after `level` steps from standstill.
    #[inline]
    pub fn timer_at(&self, level: u64) -> Timer {
        if level == 0 {
            return TIMER_STOP;
        }
        clamp_timer(isqrt_u64(self.k() / level))
    }

    /// [`timer_at`](Self::timer_at), rounded up so its level does not
    /// exceed `level`.
    #[inline]
    pub fn timer_at_most(&self, level: u64) -> Timer {
        let timer = self.timer_at(level);
        if timer != TIMER_STOP && self.level(timer) > level {
            timer.saturating_add(1)
        } else {
            timer
        }
    }

    /// Elapsed ticks after `level` steps from standstill.
    #[inline]
    pub fn elapsed(&self, level: u64) -> u64 {
        isqrt_u128(u128::from(self.c0_sq) * u128::from(level))
    }

    /// Ticks spent moving between two levels on this curve.
    #[inline]
    pub fn duration(&self, from_level: u64, to_level: u64) -> u64 {
        self.elapsed(from_level).abs_diff(self.elapsed(to_level))
    }

    /// Steps needed to change speed between two timers on this curve.
    #[inline]
    pub fn steps_between(&self, from: Timer, to: Timer) -> u64 {
        self.level(from).abs_diff(self.level(to))
    }

    /// Fastest timer reachable from `timer` within `steps` steps.
    #[inline]
    pub fn timer_after(&self, timer: Timer, steps: u64) -> Timer {
        self.timer_at(self.level(timer).saturating_add(steps))
    }
}

/// Clamp a tick count into the timer range, never below one tick.
#[inline]
pub fn clamp_timer(ticks: u64) -> Timer {
    u32::try_from(ticks).unwrap_or(TIMER_STOP).max(1)
}

/// Apply a speed override (128 = 100%) to a timer interval.
#[inline]
pub fn scale_interval(interval: u64, speed_override: u8) -> Timer {
    let factor = u64::from(speed_override.max(1));
    clamp_timer(interval.saturating_mul(128) / factor)
}
