//! Trapezoidal and triangular speed profiles.
//!
//! A profile has three phases over the reference-axis steps of a
//! segment: `[0, up_steps)` ramps from the start timer toward the run
//! timer, `[up_steps, down_start_at)` runs at constant speed and
//! `[down_start_at, steps)` ramps toward the stop timer.

use serde::Serialize;
use stepper_common::types::{Steps, TIMER_STOP, Timer};

use super::math::RampCurve;
use crate::movement::MovementState;

/// Speed profile of one segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Ramp {
    /// Timer at the first step (entry speed).
    pub timer_start: Timer,
    /// Timer of the constant phase (peak for triangular profiles).
    pub timer_run: Timer,
    /// Timer at the last step (exit speed).
    pub timer_stop: Timer,
    /// Steps of the first ramp phase.
    pub up_steps: Steps,
    /// Steps of the last ramp phase.
    pub down_steps: Steps,
    /// Step index at which the last ramp phase begins.
    pub down_start_at: Steps,
    /// `UpAcc` or `UpDec`.
    pub up_state: MovementState,
    /// `DownDec` or `DownAcc`.
    pub down_state: MovementState,
    /// Curve level at the start of the first phase.
    pub up_level: u64,
    /// Curve level at the start of the last phase.
    pub down_level: u64,
}

impl Ramp {
    /// Constant-speed profile without ramps.
    pub fn flat(steps: Steps, timer: Timer) -> Self {
        Self {
            timer_start: timer,
            timer_run: timer,
            timer_stop: timer,
            up_steps: 0,
            down_steps: 0,
            down_start_at: steps,
            up_state: MovementState::UpAcc,
            down_state: MovementState::DownDec,
            up_level: 0,
            down_level: 0,
        }
    }

    /// True when the run timer could not be reached.
    #[inline]
    pub fn is_triangular(&self) -> bool {
        self.up_steps + self.down_steps > 0 && self.down_start_at == self.up_steps
    }

    /// Shape the profile of a segment.
    ///
    /// `timer_start` and `timer_stop` are the entry and exit junction
    /// timers (use [`TIMER_STOP`] for a standstill), `timer_run` the
    /// requested run timer. If the ramps do not fit into `steps`, the
    /// profile becomes triangular with a peak strictly slower than
    /// `timer_run`.
    pub fn shape(
        steps: Steps,
        timer_start: Timer,
        timer_run: Timer,
        timer_stop: Timer,
        acc: &RampCurve,
        dec: &RampCurve,
    ) -> Self {
        let timer_run = timer_run.max(1);
        let total = u64::from(steps);

        let (up_state, up, up_level) = if timer_start > timer_run {
            let from = acc.level(timer_start);
            (MovementState::UpAcc, acc.level(timer_run).saturating_sub(from), from)
        } else if timer_start < timer_run {
            let from = dec.level(timer_start);
            (MovementState::UpDec, from.saturating_sub(dec.level(timer_run)), from)
        } else {
            (MovementState::UpAcc, 0, acc.level(timer_start))
        };

        let (down_state, down, down_level) = if timer_stop > timer_run {
            let from = dec.level(timer_run);
            (MovementState::DownDec, from.saturating_sub(dec.level(timer_stop)), from)
        } else if timer_stop < timer_run {
            let from = acc.level(timer_run);
            (MovementState::DownAcc, acc.level(timer_stop).saturating_sub(from), from)
        } else {
            (MovementState::DownDec, 0, dec.level(timer_run))
        };

        let mut ramp = Self {
            timer_start,
            timer_run,
            timer_stop,
            up_steps: 0,
            down_steps: 0,
            down_start_at: steps,
            up_state,
            down_state,
            up_level,
            down_level,
        };

        if up + down <= total {
            // Trapezoid (or flat when both ramps are empty).
            ramp.up_steps = up as Steps;
            ramp.down_steps = down as Steps;
            ramp.down_start_at = steps - ramp.down_steps;
            return ramp;
        }

        if up_state == MovementState::UpAcc && down_state == MovementState::DownDec {
            ramp.shape_triangle(steps, acc, dec);
        } else {
            // Entry or exit faster than the run timer and no room for
            // both ramps. The planner never asks for this; keep the
            // first phase and give the rest to the last one.
            let up = up.min(total) as Steps;
            ramp.up_steps = up;
            ramp.down_steps = steps - up;
            ramp.down_start_at = up;
            ramp.down_level = match down_state {
                MovementState::DownDec => dec.level(timer_stop) + u64::from(ramp.down_steps),
                _ => acc.level(timer_stop).saturating_sub(u64::from(ramp.down_steps)),
            };
        }
        ramp
    }

    fn shape_triangle(&mut self, steps: Steps, acc: &RampCurve, dec: &RampCurve) {
        let total = u64::from(steps);
        let ka = u128::from(acc.k());
        let kd = u128::from(dec.k());
        let na = acc.level(self.timer_start);
        let nd = dec.level(self.timer_stop);

        // Peak level on the acceleration curve where both ramps meet:
        // (na + up) / ka == (nd + down) / kd with up + down == steps.
        let peak = (u128::from(total + na + nd) * ka / (ka + kd)) as u64;
        let mut up = peak.saturating_sub(na).min(total);
        if up == total && total > 0 {
            up = total - 1;
        }
        let down = total - up;

        let peak_level = na + up;
        let peak_timer = if peak_level > 0 {
            acc.timer_at(peak_level)
        } else {
            dec.timer_at(nd + down)
        };

        self.up_steps = up as Steps;
        self.down_steps = down as Steps;
        self.down_start_at = self.up_steps;
        self.timer_run = peak_timer.max(self.timer_run.saturating_add(1));
        self.up_level = na;
        self.down_level = nd + down;
    }

    /// Reference-axis steps of the first, constant and last phase.
    pub fn phase_steps(&self, steps: Steps) -> (Steps, Steps, Steps) {
        let run = self.down_start_at.saturating_sub(self.up_steps);
        (self.up_steps, run, steps.saturating_sub(self.down_start_at))
    }

    /// Ticks the profile takes at 100% override, from the first pulse
    /// to the expiry after the last one.
    pub fn duration(&self, steps: Steps, acc: &RampCurve, dec: &RampCurve) -> u64 {
        let (up, run, down) = self.phase_steps(steps);
        let up_curve = if self.up_state.uses_acc_curve() { acc } else { dec };
        let down_curve = if self.down_state.uses_acc_curve() { acc } else { dec };
        let up_end = if self.up_state.uses_acc_curve() {
            self.up_level + u64::from(up)
        } else {
            self.up_level.saturating_sub(u64::from(up))
        };
        let down_end = if self.down_state.uses_acc_curve() {
            self.down_level + u64::from(down)
        } else {
            self.down_level.saturating_sub(u64::from(down))
        };
        up_curve.duration(self.up_level, up_end)
            + u64::from(run) * u64::from(self.timer_run)
            + down_curve.duration(self.down_level, down_end)
    }
}

impl Default for Ramp {
    fn default() -> Self {
        Self::flat(0, TIMER_STOP)
    }
}
