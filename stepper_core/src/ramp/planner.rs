//! Segment construction and look-ahead speed optimization.
//!
//! A new request becomes one or more [`MoveSegment`]s with limits taken
//! from the tightest participating axis. After every append the queue is
//! re-planned: a backward pass bounds each entry speed so the segment can
//! still slow down to its exit, a forward pass bounds each exit by what
//! acceleration reaches from the entry, then the ramps are reshaped.
//!
//! Only `Ready` entries are changed. A processing head move pins the
//! entry of the first ready move to its own exit timer. Waits and barrier
//! segments split the queue into independent standstill-bounded runs;
//! I/O entries are looked through.

use stepper_common::consts::{
    MAX_AXES, MAX_MOVEMENT_STEPS, MAX_STEP_MULTIPLIER, MOVEMENT_BUFFER_SIZE,
};
use stepper_common::hal::driver::InterruptControl;
use stepper_common::hal::types::Direction;
use stepper_common::motion::config::StepperConfig;
use stepper_common::types::{Distance, StepRate, Steps, TIMER_STOP, Timer, speed_to_timer};
use tracing::trace;

use super::junction::{junction_speed, standstill_speed};
use super::math::RampCurve;
use super::profile::Ramp;
use crate::config::{AxisLimits, MotionSettings, build_limits};
use crate::critical::CriticalRegion;
use crate::movement::{AxisStep, MoveKind, MoveSegment, Payload};
use crate::queue::MovementQueue;

/// How much of the queue a re-plan must revisit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanScope {
    /// Only the tail changed; stop the backward pass at a fixed point.
    Appended,
    /// Boundary flags changed somewhere; revisit every ready segment.
    All,
}

/// Ready segment copied out of the queue for planning.
#[derive(Debug, Clone, Copy)]
struct PlanSlot {
    offset: usize,
    segment: MoveSegment,
    standstill_before: bool,
    exit_limit: Timer,
}

/// Builds segments and optimizes junction speeds.
#[derive(Debug, Clone)]
pub struct RampPlanner {
    limits: [AxisLimits; MAX_AXES],
    num_axes: usize,
    jerk: [StepRate; MAX_AXES],
    frequency: u32,
    min_interrupt_interval: u32,
}

impl RampPlanner {
    /// Planner over the first `num_axes` entries of `limits`.
    pub fn new(limits: [AxisLimits; MAX_AXES], num_axes: usize, settings: &MotionSettings) -> Self {
        let mut jerk = [0; MAX_AXES];
        for (jerk, limits) in jerk.iter_mut().zip(&limits).take(num_axes) {
            *jerk = limits.jerk_speed;
        }
        Self {
            limits,
            num_axes: num_axes.min(MAX_AXES),
            jerk,
            frequency: settings.frequency,
            min_interrupt_interval: settings.min_interrupt_interval,
        }
    }

    /// Planner for a validated configuration.
    pub fn from_config(config: &StepperConfig) -> Self {
        Self::new(
            build_limits(config),
            config.num_axes(),
            &MotionSettings::from_config(config),
        )
    }

    /// Limits of the configured axes.
    #[inline]
    pub fn limits(&self) -> &[AxisLimits] {
        &self.limits[..self.num_axes]
    }

    /// Number of configured axes.
    #[inline]
    pub fn num_axes(&self) -> usize {
        self.num_axes
    }

    /// Timer frequency [ticks/s].
    #[inline]
    pub fn frequency(&self) -> u32 {
        self.frequency
    }

    // ─── Segment Construction ───────────────────────────────────────

    /// Build one segment. `distances` must fit into `MAX_MOVEMENT_STEPS`
    /// (see [`split_count`]). Returns `None` for a zero move.
    ///
    /// `timer_request` is the requested run timer of the reference axis;
    /// it is slowed down to what every participating axis allows.
    pub fn build_segment(
        &self,
        distances: &[Distance],
        timer_request: Timer,
        kind: MoveKind,
    ) -> Option<MoveSegment> {
        let longest = distances
            .iter()
            .take(self.num_axes)
            .map(|d| d.unsigned_abs())
            .max()
            .unwrap_or(0);
        if longest == 0 {
            return None;
        }
        let steps = Steps::try_from(longest.min(u64::from(MAX_MOVEMENT_STEPS))).ok()?;
        let total = u64::from(steps);

        let mut axes = [AxisStep::default(); MAX_AXES];
        let mut signed = [0; MAX_AXES];
        let mut timer_max = u64::from(timer_request.max(1));
        let mut acceleration = u64::from(u32::MAX);
        let mut deceleration = u64::from(u32::MAX);

        for (axis, (&d, limits)) in distances
            .iter()
            .zip(&self.limits)
            .take(self.num_axes)
            .enumerate()
        {
            if d == 0 {
                continue;
            }
            let distance = d.unsigned_abs().min(total);
            axes[axis].distance = distance as Steps;
            axes[axis].direction = Direction::of(d);
            signed[axis] = Direction::of(d).sign() * distance as Distance;

            // Axis speed = reference speed * distance / steps.
            timer_max = timer_max.max((u64::from(limits.timer_max) * distance).div_ceil(total));
            acceleration = acceleration.min(u64::from(limits.acceleration) * total / distance);
            deceleration = deceleration.min(u64::from(limits.deceleration) * total / distance);
        }

        let min_interval = u64::from(self.min_interrupt_interval);
        let multiplier = if matches!(kind, MoveKind::Reference { .. }) {
            1
        } else {
            (1..=MAX_STEP_MULTIPLIER)
                .find(|&m| timer_max * u64::from(m) >= min_interval)
                .unwrap_or(MAX_STEP_MULTIPLIER)
        };
        let timer_max = timer_max.max(min_interval.div_ceil(u64::from(multiplier)));
        let timer_max = Timer::try_from(timer_max).unwrap_or(TIMER_STOP - 1);

        for step in axes.iter_mut().filter(|a| a.distance > 0) {
            let share = (u64::from(multiplier) * u64::from(step.distance)).div_ceil(total);
            step.multiplier = share.clamp(1, u64::from(multiplier)) as u8;
        }

        let acc = RampCurve::new(self.frequency, acceleration.min(u64::from(u32::MAX)) as u32);
        let dec = RampCurve::new(self.frequency, deceleration.min(u64::from(u32::MAX)) as u32);
        let standstill = standstill_speed(&signed[..self.num_axes], steps, &self.jerk);
        let timer_standstill = speed_to_timer(self.frequency, standstill).max(timer_max);

        let ramp = match kind {
            MoveKind::Reference { .. } => Ramp::flat(steps, timer_max),
            _ => Ramp::shape(steps, timer_standstill, timer_max, timer_standstill, &acc, &dec),
        };

        Some(MoveSegment {
            axes,
            steps,
            end_at: steps,
            multiplier,
            timer_max,
            timer_standstill,
            timer_junction: timer_standstill,
            entry_limit: TIMER_STOP,
            acc,
            dec,
            ramp,
            kind,
            stop_at_end: false,
            pause_stop: false,
        })
    }

    /// Jerk-limited junction timer between two consecutive segments.
    pub fn junction_timer(&self, prev: &MoveSegment, next: &MoveSegment) -> Timer {
        let a = signed_distances(prev);
        let b = signed_distances(next);
        let speed = junction_speed(
            &a[..self.num_axes],
            prev.steps,
            &b[..self.num_axes],
            next.steps,
            &self.jerk,
        );
        speed_to_timer(self.frequency, speed)
            .max(prev.timer_max)
            .max(next.timer_max)
    }

    // ─── Optimization ───────────────────────────────────────────────

    /// Re-plan every ready segment of `queue`.
    ///
    /// Returns the number of reshaped segments.
    pub fn replan<H>(&self, queue: &mut MovementQueue, hal: &H, scope: PlanScope) -> usize
    where
        H: InterruptControl + ?Sized,
    {
        let mut slots = heapless::Vec::<PlanSlot, MOVEMENT_BUFFER_SIZE>::new();
        let mut anchor: Option<MoveSegment> = None;

        {
            let _region = CriticalRegion::enter(hal);
            let mut standstill = true;
            for (offset, movement) in queue.iter().enumerate() {
                match &movement.payload {
                    Payload::Io { .. } => {}
                    Payload::Wait { .. } => standstill = true,
                    Payload::Move(segment) if movement.state.is_processing() => {
                        standstill = segment.ends_at_standstill();
                        anchor = (!standstill).then_some(*segment);
                    }
                    Payload::Move(segment) => {
                        let slot = PlanSlot {
                            offset,
                            segment: *segment,
                            standstill_before: standstill || segment.is_barrier(),
                            exit_limit: TIMER_STOP,
                        };
                        if slots.push(slot).is_err() {
                            break;
                        }
                        standstill = segment.ends_at_standstill();
                    }
                }
            }
        }

        let n = slots.len();
        if n == 0 {
            return 0;
        }

        // Junction timers with the predecessor.
        for i in 0..n {
            let prev = match (slots[i].standstill_before, i) {
                (true, _) => None,
                (false, 0) => anchor,
                (false, _) => Some(slots[i - 1].segment),
            };
            let junction = match prev {
                Some(prev) => self.junction_timer(&prev, &slots[i].segment),
                None => slots[i].segment.timer_standstill,
            };
            slots[i].segment.timer_junction = junction;
        }

        // Backward: fastest entry that still decelerates to the exit.
        let mut start = 0;
        let mut next_entry = TIMER_STOP;
        for i in (0..n).rev() {
            let standstill_after = i + 1 == n || slots[i + 1].standstill_before;
            let slot = &mut slots[i];
            let segment = &slot.segment;
            let exit_limit = if standstill_after {
                segment.timer_standstill
            } else {
                next_entry
            };
            let entry_limit = match segment.kind {
                MoveKind::Reference { .. } => segment.timer_max,
                _ => {
                    let level = segment.dec.level(exit_limit) + u64::from(segment.steps);
                    segment.timer_junction.max(segment.dec.timer_at_most(level))
                }
            };
            slot.exit_limit = exit_limit;
            if scope == PlanScope::Appended && i + 1 < n && entry_limit == segment.entry_limit {
                start = i;
                break;
            }
            slot.segment.entry_limit = entry_limit;
            next_entry = entry_limit;
        }

        // Forward: exits bounded by acceleration, then reshape.
        let mut prev_exit = TIMER_STOP;
        for i in start..n {
            let slot = &mut slots[i];
            let segment = &mut slot.segment;
            if let MoveKind::Reference { .. } = segment.kind {
                segment.ramp = Ramp::flat(segment.steps, segment.timer_max);
                prev_exit = segment.timer_max;
                continue;
            }

            let entry = if i == start && start > 0 {
                segment.ramp.timer_start
            } else if slot.standstill_before {
                segment.entry_limit
            } else if i == 0 {
                anchor.map_or(segment.entry_limit, |a| a.ramp.timer_stop)
            } else {
                prev_exit
            };

            let steps = u64::from(segment.steps);
            let mut exit = slot
                .exit_limit
                .max(segment.acc.timer_after(entry, steps));
            let needed = segment.dec.level(entry);
            if needed > segment.dec.level(exit) + steps {
                // Pinned entry too fast to reach the planned exit.
                exit = segment.dec.timer_at(needed - steps);
            }

            segment.ramp = Ramp::shape(
                segment.steps,
                entry,
                segment.timer_max,
                exit,
                &segment.acc,
                &segment.dec,
            );
            prev_exit = exit;
        }

        {
            let _region = CriticalRegion::enter(hal);
            for slot in &slots[start..] {
                let Some(movement) = queue.peek_mut(slot.offset) else {
                    continue;
                };
                if !movement.state.is_ready() {
                    continue;
                }
                if let Some(segment) = movement.segment_mut() {
                    *segment = slot.segment;
                }
            }
        }

        trace!("replanned {} of {} ready segments", n - start, n);
        n - start
    }
}

/// Signed per-axis distances of a segment.
#[inline]
pub fn signed_distances(segment: &MoveSegment) -> [Distance; MAX_AXES] {
    let mut out = [0; MAX_AXES];
    for (out, axis) in out.iter_mut().zip(&segment.axes) {
        *out = axis.signed();
    }
    out
}

// ─── Splitting ──────────────────────────────────────────────────────

/// Number of segments a request needs so that none exceeds
/// `MAX_MOVEMENT_STEPS`.
pub fn split_count(distances: &[Distance]) -> u32 {
    let longest = distances
        .iter()
        .map(|d| d.unsigned_abs())
        .max()
        .unwrap_or(0);
    let parts = longest.div_ceil(u64::from(MAX_MOVEMENT_STEPS));
    u32::try_from(parts).unwrap_or(u32::MAX).max(1)
}

/// Distances of part `part` of `parts`. The parts sum exactly to
/// `distances`.
pub fn split_part(distances: &[Distance], part: u32, parts: u32) -> [Distance; MAX_AXES] {
    let parts = u128::from(parts.max(1));
    let mut out = [0; MAX_AXES];
    for (out, &d) in out.iter_mut().zip(distances) {
        let total = u128::from(d.unsigned_abs());
        let upto = |p: u32| (total * u128::from(p) / parts) as i64;
        *out = d.signum() * (upto(part + 1) - upto(part));
    }
    out
}
