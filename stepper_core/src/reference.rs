//! Reference (homing) search.
//!
//! A search moves one axis across its full travel toward the requested
//! sensor at constant speed, one step per interrupt. The interrupt
//! handler watches the sensor before every step and ends the segment as
//! soon as it has read "hit" for the debounce time. The axis is then
//! set to the limit at that end and retracted off the sensor.

use stepper_common::consts::{MAX_AXES, REFERENCE_STABLE_TIME_MAX_MS};
use stepper_common::hal::driver::StepperHal;
use stepper_common::motion::error::ErrorCode;
use stepper_common::motion::event::WaitReason;
use stepper_common::motion::reference::{ReferenceEnd, reference_id};
use stepper_common::types::{Axis, Distance, StepRate, Timer};
use tracing::{info, warn};

use crate::controller::Stepper;
use crate::critical::critical;
use crate::error::{StepperError, StepperResult};
use crate::movement::MoveKind;

impl<H: StepperHal> Stepper<H> {
    /// Search the reference sensor of `axis` at the min (`toward_min`)
    /// or max end and define the axis position there.
    ///
    /// Blocks until the search and the retract are done.
    ///
    /// # Errors
    ///
    /// - `ReferenceNotConfigured` if no sensor is fitted at that end
    /// - `ReferenceStillActive` if the sensor stays asserted after
    ///   moving off it
    /// - `ReferenceNotFound` if the full travel passed without a hit
    /// - `Paused` while paused; nothing is queued
    pub fn go_to_reference(
        &mut self,
        axis: Axis,
        speed: Option<StepRate>,
        toward_min: bool,
    ) -> StepperResult<()> {
        self.check_accepting()?;
        self.check_axis(axis)?;
        if self.pause {
            warn!("Axis {axis}: reference search rejected while paused");
            return Err(StepperError::Paused);
        }
        let end = ReferenceEnd::from_toward_min(toward_min);
        let limits = self.planner.limits()[axis];
        let Some(hit_value) = limits.reference_hit(end) else {
            warn!("Axis {axis}: no reference sensor at the {end:?} end");
            self.latch_error(ErrorCode::ReferenceNotConfigured);
            return Err(StepperError::ReferenceNotConfigured { axis, end });
        };
        let timer = self.timer_for(speed)?;
        self.wait_busy();

        let id = reference_id(axis, end);
        if self.hal.reference_value(id) == hit_value {
            self.retract(axis, end, timer)?;
            if self.hal.reference_value(id) == hit_value {
                warn!("Axis {axis}: reference sensor still active after retract");
                self.latch_error(ErrorCode::ReferenceStillActive);
                return Err(StepperError::ReferenceStillActive(axis));
            }
        }

        // Preset the far end so the search may cover the whole travel.
        let travel = Distance::from(limits.travel());
        let (preset, delta) = match end {
            ReferenceEnd::Min => (limits.limit_max, -travel),
            ReferenceEnd::Max => (limits.limit_min, travel),
        };
        self.set_position(axis, preset)?;
        critical(&self.hal, || self.exec.reference_hit = false);

        let kind = MoveKind::Reference {
            id,
            hit_value,
            stable_ticks: limits.stable_ticks,
        };
        self.queue_axis(axis, delta, timer, kind)?;
        self.wait_idle(WaitReason::WaitReference);
        self.check_accepting()?;

        if !critical(&self.hal, || self.exec.reference_hit) {
            warn!("Axis {axis}: reference not found within {travel} steps");
            self.latch_error(ErrorCode::ReferenceNotFound);
            return Err(StepperError::ReferenceNotFound(axis));
        }

        let position = match end {
            ReferenceEnd::Min => limits.limit_min,
            ReferenceEnd::Max => limits.limit_max,
        };
        self.set_position(axis, position)?;
        info!("Axis {axis}: reference found at the {end:?} end, position {position}");
        self.retract(axis, end, timer)
    }

    /// Move by `deltas` until reference input `id` has read `hit_value`
    /// for `stable_ms` milliseconds (capped at
    /// `REFERENCE_STABLE_TIME_MAX_MS`), then stop.
    ///
    /// Returns `true` if the input stopped the move. See
    /// [`Stepper::move_until`].
    ///
    /// # Errors
    ///
    /// Same as [`Stepper::move_until`].
    pub fn move_until_reference(
        &mut self,
        deltas: &[Distance],
        speed: Option<StepRate>,
        id: u8,
        hit_value: u8,
        stable_ms: u32,
    ) -> StepperResult<bool> {
        let stable_ms = stable_ms.min(REFERENCE_STABLE_TIME_MAX_MS);
        let mut hit_since = None;
        let triggered = self.move_until(deltas, speed, |stepper| {
            if stepper.hal.reference_value(id) != hit_value {
                hit_since = None;
                return false;
            }
            let now = stepper.hal.millis();
            now.wrapping_sub(*hit_since.get_or_insert(now)) >= stable_ms
        })?;
        if triggered {
            info!("Reference input {id} stopped the move at {:?}", self.current_positions());
        }
        Ok(triggered)
    }

    /// Move off the sensor at `end` by the configured retract distance.
    fn retract(&mut self, axis: Axis, end: ReferenceEnd, timer: Timer) -> StepperResult<()> {
        let distance = Distance::from(self.planner.limits()[axis].retract);
        let delta = if end.is_min() { distance } else { -distance };
        self.queue_axis(axis, delta, timer, MoveKind::Retract)?;
        self.wait_idle(WaitReason::WaitReference);
        self.check_accepting()
    }

    fn queue_axis(
        &mut self,
        axis: Axis,
        delta: Distance,
        timer: Timer,
        kind: MoveKind,
    ) -> StepperResult<()> {
        let mut deltas = [0; MAX_AXES];
        deltas[axis] = delta;
        self.queue_linear(&deltas, timer, kind)
    }
}
