//! Step scheduler: the timer interrupt handler.
//!
//! Each expiry advances the head of the movement queue by one tick:
//! up to `multiplier` reference steps of a move, one 1/100 s tick of a
//! wait, or a whole I/O entry. The handler arms the next one-shot expiry
//! itself, never shorter than the minimum interrupt interval, and goes
//! idle when the queue runs empty.
//!
//! Only integer math runs here: one square root per ramp tick (the
//! elapsed time of the new ramp level), Bresenham accumulators for the
//! secondary axes. Nothing is logged from this path; problems are
//! reported through latched codes and events.

use stepper_common::consts::{LEVEL_MAX, MAX_AXES, WAIT_TICKS_PER_SECOND};
use stepper_common::hal::driver::StepperHal;
use stepper_common::hal::types::{Direction, StepPulses};
use stepper_common::motion::error::ErrorCode;
use stepper_common::motion::event::StepperEvent;
use stepper_common::motion::reference::{ReferenceEnd, reference_id};
use stepper_common::types::{Steps, TIMER_STOP, Timer};

use crate::controller::{Stepper, offset_position};
use crate::movement::{MoveKind, MoveSegment, Movement, MovementState, Payload};
use crate::ramp::math::scale_interval;

// ─── Interrupt-Owned State ──────────────────────────────────────────

/// Execution state of the head movement. Written by the interrupt
/// handler; foreground code touches it only with interrupts masked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecState {
    /// Ramp level of the current phase.
    pub level: u64,
    /// Elapsed ticks of `level` on the current phase's curve.
    pub elapsed: u64,
    /// Bresenham accumulators per axis.
    pub accumulators: [u64; MAX_AXES],
    /// Last interval emitted, before speed override.
    pub last_interval: u64,
    /// Reference steps covered by the last interval.
    pub last_count: Steps,
    /// Ticks the watched reference sensor has read "hit".
    pub stable: u64,
    /// The last retired entry ended at standstill.
    pub prev_exit_standstill: bool,
    /// The last reference search saw its sensor.
    pub reference_hit: bool,
    /// Directions of the most recently started segment per axis.
    pub directions: [Direction; MAX_AXES],
}

impl Default for ExecState {
    fn default() -> Self {
        Self {
            level: 0,
            elapsed: 0,
            accumulators: [0; MAX_AXES],
            last_interval: 0,
            last_count: 0,
            stable: 0,
            prev_exit_standstill: true,
            reference_hit: false,
            directions: [Direction::Positive; MAX_AXES],
        }
    }
}

impl ExecState {
    /// Timer of the most recent step, `TIMER_STOP` before the first one.
    #[inline]
    pub fn current_timer(&self) -> Timer {
        if self.last_count == 0 {
            return TIMER_STOP;
        }
        let timer = self.last_interval / u64::from(self.last_count);
        Timer::try_from(timer).unwrap_or(TIMER_STOP).max(1)
    }
}

/// Phase the segment is in after `done` reference steps.
#[inline]
pub fn phase_at(segment: &MoveSegment, done: Steps) -> MovementState {
    let ramp = &segment.ramp;
    if done >= segment.end_at {
        MovementState::Done
    } else if done < ramp.up_steps {
        ramp.up_state
    } else if done < ramp.down_start_at {
        MovementState::Run
    } else {
        ramp.down_state
    }
}

// ─── Handler ────────────────────────────────────────────────────────

impl<H: StepperHal> Stepper<H> {
    /// Step timer expiry.
    ///
    /// Call from the timer interrupt (or from `dispatch` on polled
    /// targets). A nested call is counted and ignored.
    pub fn on_timer_interrupt(&mut self) {
        if self.isr_busy {
            self.counters.reentered = self.counters.reentered.wrapping_add(1);
            return;
        }
        self.isr_busy = true;
        self.service_queue();
        self.isr_busy = false;
    }

    fn service_queue(&mut self) {
        loop {
            let Some(head) = self.queue.peek(0).copied() else {
                self.go_idle();
                return;
            };

            if head.state.is_ready() && self.pause && self.exec.prev_exit_standstill {
                self.go_idle();
                return;
            }

            let armed = match head.state {
                MovementState::Done => {
                    self.retire_head(&head);
                    false
                }
                MovementState::ReadyIo => {
                    if let Payload::Io { tool, level } = head.payload {
                        self.events.emit(&StepperEvent::Io { tool, level });
                    }
                    self.queue.dequeue();
                    false
                }
                MovementState::ReadyWait | MovementState::Wait => self.service_wait(&head),
                _ => self.service_move(&head),
            };
            if armed {
                return;
            }
        }
    }

    fn retire_head(&mut self, head: &Movement) {
        let standstill = match &head.payload {
            Payload::Move(segment) => {
                segment.ends_at_standstill() || segment.ramp.timer_stop >= segment.timer_standstill
            }
            Payload::Wait { .. } => true,
            Payload::Io { .. } => self.exec.prev_exit_standstill,
        };
        self.queue.dequeue();
        self.exec.prev_exit_standstill = standstill;
    }

    pub(crate) fn go_idle(&mut self) {
        self.hal.stop_timer();
        self.exec.prev_exit_standstill = true;
        if self.timer_running {
            self.timer_running = false;
            self.counters.time_start_or_idle = self.hal.millis();
            self.events.emit(&StepperEvent::Idle);
        }
    }

    // ─── Waits ──────────────────────────────────────────────────────

    fn service_wait(&mut self, head: &Movement) -> bool {
        let Payload::Wait {
            duration,
            conditional,
        } = head.payload
        else {
            return false;
        };
        let cancelled =
            conditional && (!self.settings.wait_conditional || self.hal.wait_cancel_requested());
        let done = match head.state {
            MovementState::ReadyWait => 0,
            _ => head.done.saturating_add(1),
        };

        let Some(entry) = self.queue.peek_mut(0) else {
            return false;
        };
        entry.done = done;
        if cancelled || done >= duration {
            entry.state = MovementState::Done;
            return false;
        }
        entry.state = MovementState::Wait;
        self.hal
            .start_timer(self.settings.frequency / WAIT_TICKS_PER_SECOND);
        true
    }

    // ─── Moves ──────────────────────────────────────────────────────

    fn service_move(&mut self, head: &Movement) -> bool {
        let Some(mut segment) = head.segment().copied() else {
            return false;
        };
        let mut done = head.done;
        let mut state = head.state;

        if state == MovementState::ReadyMove {
            self.begin_segment(&segment);
            state = MovementState::Run;
        }

        // Stop and pause may have moved the phase boundaries.
        let phase = phase_at(&segment, done);
        if phase != state {
            self.enter_phase(&segment, phase);
            state = phase;
        }
        if state == MovementState::Done {
            self.set_head(state, done, None);
            return false;
        }

        match segment.kind {
            MoveKind::Reference {
                id,
                hit_value,
                stable_ticks,
            } => {
                if self.hal.reference_value(id) == hit_value {
                    if done > 0 {
                        self.exec.stable += self.exec.last_interval;
                    }
                    if self.exec.stable >= u64::from(stable_ticks) {
                        self.exec.reference_hit = true;
                        segment.end_at = done;
                        self.set_head(MovementState::Done, done, Some(segment));
                        self.queue.truncate_after_head();
                        return false;
                    }
                } else {
                    self.exec.stable = 0;
                }
            }
            MoveKind::Normal if self.settings.check_reference => {
                if self.reference_tripped(&segment) {
                    self.fatal = Some(ErrorCode::ReferenceHitDuringMove);
                    self.events
                        .emit(&StepperEvent::Error(ErrorCode::ReferenceHitDuringMove));
                    self.abort_queue();
                    return true;
                }
            }
            _ => {}
        }

        // A full multiplier per interrupt, across phase boundaries; only
        // the segment's last interrupt may cover fewer steps.
        let count = Steps::from(segment.multiplier)
            .min(segment.end_at.saturating_sub(done))
            .max(1);
        let mut interval = 0;
        let mut left = count;
        while left > 0 && state != MovementState::Done {
            let phase_end = match state {
                MovementState::UpAcc | MovementState::UpDec => segment.ramp.up_steps,
                MovementState::Run => segment.ramp.down_start_at,
                _ => segment.end_at,
            };
            let part = left.min(phase_end.saturating_sub(done)).max(1);
            interval += self.next_interval(&segment, state, part);
            done += part;
            left -= part;
            let next = phase_at(&segment, done);
            if next != state {
                self.enter_phase(&segment, next);
                state = next;
            }
        }
        self.emit_pulses(&segment, count);

        self.exec.last_interval = interval;
        self.exec.last_count = count;
        self.counters.total_steps += u64::from(count);

        self.set_head(state, done, None);
        let interval = scale_interval(interval, self.speed_override)
            .max(self.settings.min_interrupt_interval);
        self.hal.start_timer(interval);
        true
    }

    fn set_head(&mut self, state: MovementState, done: Steps, segment: Option<MoveSegment>) {
        if let Some(head) = self.queue.peek_mut(0) {
            head.state = state;
            head.done = done;
            if let (Some(segment), Some(slot)) = (segment, head.segment_mut()) {
                *slot = segment;
            }
        }
    }

    fn begin_segment(&mut self, segment: &MoveSegment) {
        let half = u64::from(segment.steps / 2);
        for (axis, limits) in self.planner.limits().iter().enumerate() {
            self.exec.accumulators[axis] = half;
            let step = segment.axes[axis];
            if step.distance == 0 {
                continue;
            }
            self.hal
                .set_direction(axis, step.direction.inverted_if(limits.invert_direction));
            self.hal.set_enable(axis, LEVEL_MAX, false);
            self.exec.directions[axis] = step.direction;
        }
        self.exec.stable = 0;
        self.exec.last_interval = 0;
        self.exec.last_count = 0;
    }

    fn enter_phase(&mut self, segment: &MoveSegment, state: MovementState) {
        let level = match state {
            MovementState::UpAcc | MovementState::UpDec => segment.ramp.up_level,
            MovementState::DownDec | MovementState::DownAcc => segment.ramp.down_level,
            _ => return,
        };
        let curve = if state.uses_acc_curve() {
            &segment.acc
        } else {
            &segment.dec
        };
        self.exec.level = level;
        self.exec.elapsed = curve.elapsed(level);
    }

    /// Ticks the next `count` steps take; advances the ramp level.
    fn next_interval(&mut self, segment: &MoveSegment, state: MovementState, count: Steps) -> u64 {
        let count = u64::from(count);
        match state {
            MovementState::UpAcc | MovementState::DownAcc => {
                let level = self.exec.level + count;
                let elapsed = segment.acc.elapsed(level);
                let interval = elapsed.saturating_sub(self.exec.elapsed);
                self.exec.level = level;
                self.exec.elapsed = elapsed;
                interval
            }
            MovementState::UpDec | MovementState::DownDec => {
                let level = self.exec.level.saturating_sub(count);
                let elapsed = segment.dec.elapsed(level);
                let interval = self.exec.elapsed.saturating_sub(elapsed);
                self.exec.level = level;
                self.exec.elapsed = elapsed;
                interval
            }
            _ => u64::from(segment.ramp.timer_run) * count,
        }
    }

    fn emit_pulses(&mut self, segment: &MoveSegment, count: Steps) {
        let steps = u64::from(segment.steps.max(1));
        let track = segment.kind.updates_position();
        let mut pulses: StepPulses = [0; MAX_AXES];

        for axis in 0..self.planner.num_axes() {
            let step = segment.axes[axis];
            if step.distance == 0 {
                continue;
            }
            let acc = self.exec.accumulators[axis] + u64::from(step.distance) * u64::from(count);
            let fired = acc / steps;
            self.exec.accumulators[axis] = acc % steps;
            pulses[axis] = fired as u8;
            if track {
                self.current[axis] =
                    offset_position(self.current[axis], step.direction.sign() * fired as i64);
            }
        }
        self.hal.step(&pulses);
    }

    /// True if a moving axis reads its sensor in the direction of travel.
    fn reference_tripped(&self, segment: &MoveSegment) -> bool {
        self.planner
            .limits()
            .iter()
            .enumerate()
            .filter(|(axis, _)| segment.axes[*axis].distance > 0)
            .any(|(axis, limits)| {
                let end = match segment.axes[axis].direction {
                    Direction::Negative => ReferenceEnd::Min,
                    Direction::Positive => ReferenceEnd::Max,
                };
                limits
                    .reference_hit(end)
                    .is_some_and(|hit| self.hal.reference_value(reference_id(axis, end)) == hit)
            })
    }
}
