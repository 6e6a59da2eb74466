//! Foreground stepper API.
//!
//! [`Stepper`] owns the HAL, the movement queue and the planner. Move,
//! wait and I/O requests are validated, split, converted into segments
//! and appended; the queue is re-planned after every append and the
//! step timer is started if it is idle. Requests block while the queue
//! is full, dispatching timer events in the meantime.
//!
//! State shared with the interrupt handler (queue slots, positions,
//! execution state) is only touched with interrupts masked.

use stepper_common::consts::{
    ENABLE_TIMEOUT_MAX, MAX_AXES, SPEED_OVERRIDE_100P, SPEED_OVERRIDE_MIN, TIMER_START_DELAY,
};
use stepper_common::hal::driver::StepperHal;
use stepper_common::hal::types::Direction;
use stepper_common::motion::config::StepperConfig;
use stepper_common::motion::error::ErrorCode;
use stepper_common::motion::event::{EventKind, StepperEvent, WaitReason};
use stepper_common::types::{Axis, Distance, Position, StepRate, Steps, TIMER_STOP, Timer};
use tracing::{debug, info, trace, warn};

use crate::config::{AxisLimits, MotionSettings};
use crate::critical::critical;
use crate::error::{StepperError, StepperResult};
use crate::events::{EventHandler, EventHandlers};
use crate::movement::{MoveKind, MoveSegment, Movement, MovementState};
use crate::queue::MovementQueue;
use crate::ramp::math::RampCurve;
use crate::ramp::planner::{PlanScope, RampPlanner, signed_distances, split_count, split_part};
use crate::scheduler::ExecState;

/// Apply a signed distance to a position (wrapping).
#[inline]
pub(crate) fn offset_position(position: Position, delta: Distance) -> Position {
    (i64::from(position) + delta) as Position
}

/// Runtime counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    /// Reference-axis steps executed since start.
    pub total_steps: u64,
    /// Nested timer interrupts ignored.
    pub reentered: u32,
    /// Clock [ms] of the last start or idle transition.
    pub time_start_or_idle: u32,
}

/// Multi-axis stepper controller.
pub struct Stepper<H: StepperHal> {
    pub(crate) hal: H,
    pub(crate) planner: RampPlanner,
    pub(crate) settings: MotionSettings,
    pub(crate) queue: MovementQueue,
    pub(crate) exec: ExecState,
    /// Live position, advanced by the interrupt handler.
    pub(crate) current: [Position; MAX_AXES],
    /// Position at the end of everything queued.
    pub(crate) calculated: [Position; MAX_AXES],
    /// Direction of the last queued move per axis (backlash tracking).
    pub(crate) last_direction: [Direction; MAX_AXES],
    pub(crate) error: Option<ErrorCode>,
    pub(crate) fatal: Option<ErrorCode>,
    pub(crate) emergency_stop: bool,
    pub(crate) pause: bool,
    pub(crate) timer_running: bool,
    pub(crate) speed_override: u8,
    pub(crate) enable_timeout: [u8; MAX_AXES],
    pub(crate) events: EventHandlers,
    pub(crate) counters: Counters,
    pub(crate) isr_busy: bool,
}

impl<H: StepperHal> Stepper<H> {
    /// Create a controller for a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns `StepperError::Config` if the configuration is invalid.
    pub fn new(hal: H, config: &StepperConfig) -> StepperResult<Self> {
        config.validate()?;
        let settings = MotionSettings::from_config(config);
        let planner = RampPlanner::from_config(config);

        let mut enable_timeout = [0; MAX_AXES];
        for (timeout, limits) in enable_timeout.iter_mut().zip(planner.limits()) {
            *timeout = limits.enable_timeout;
        }
        let counters = Counters {
            time_start_or_idle: hal.millis(),
            ..Counters::default()
        };

        info!(
            "Stepper ready: {} axes, timer {} Hz, queue {} entries",
            planner.num_axes(),
            settings.frequency,
            MovementQueue::CAPACITY
        );

        Ok(Self {
            hal,
            planner,
            settings,
            queue: MovementQueue::new(),
            exec: ExecState::default(),
            current: [0; MAX_AXES],
            calculated: [0; MAX_AXES],
            last_direction: [Direction::Positive; MAX_AXES],
            error: None,
            fatal: None,
            emergency_stop: false,
            pause: false,
            timer_running: false,
            speed_override: settings.speed_override.max(SPEED_OVERRIDE_MIN),
            enable_timeout,
            events: EventHandlers::default(),
            counters,
            isr_busy: false,
        })
    }

    // ─── Accessors ──────────────────────────────────────────────────

    /// Hardware driver.
    #[inline]
    pub fn hal(&self) -> &H {
        &self.hal
    }

    /// Mutable hardware driver.
    #[inline]
    pub fn hal_mut(&mut self) -> &mut H {
        &mut self.hal
    }

    /// Segment planner.
    #[inline]
    pub fn planner(&self) -> &RampPlanner {
        &self.planner
    }

    /// Active settings.
    #[inline]
    pub fn settings(&self) -> &MotionSettings {
        &self.settings
    }

    /// Number of configured axes.
    #[inline]
    pub fn num_axes(&self) -> usize {
        self.planner.num_axes()
    }

    /// Register an event handler, returning the previous one.
    pub fn subscribe(&mut self, kind: EventKind, handler: EventHandler) -> Option<EventHandler> {
        self.events.subscribe(kind, handler)
    }

    /// Remove an event handler.
    pub fn unsubscribe(&mut self, kind: EventKind) -> Option<EventHandler> {
        self.events.unsubscribe(kind)
    }

    // ─── Move Requests ──────────────────────────────────────────────

    /// Queue a linear move by `deltas` (one entry per axis, missing
    /// axes stay). `speed` is the speed of the longest axis; `None`
    /// uses the configured default.
    ///
    /// # Errors
    ///
    /// Rejected during an emergency stop or with a latched fatal error,
    /// for too many axes, a zero speed, or a target outside the limits.
    pub fn move_relative(&mut self, deltas: &[Distance], speed: Option<StepRate>) -> StepperResult<()> {
        self.check_accepting()?;
        self.check_axis_count(deltas.len())?;
        let timer = self.timer_for(speed)?;

        let mut targets = [0i64; MAX_AXES];
        for (axis, target) in targets.iter_mut().enumerate().take(self.num_axes()) {
            *target = i64::from(self.calculated[axis]) + deltas.get(axis).copied().unwrap_or(0);
        }
        self.move_to(&targets, timer)
    }

    /// Queue a linear move to absolute `targets` (missing axes stay).
    ///
    /// # Errors
    ///
    /// Same as [`Stepper::move_relative`].
    pub fn move_absolute(&mut self, targets: &[Position], speed: Option<StepRate>) -> StepperResult<()> {
        self.check_accepting()?;
        self.check_axis_count(targets.len())?;
        let timer = self.timer_for(speed)?;

        let mut absolute = [0i64; MAX_AXES];
        for (axis, target) in absolute.iter_mut().enumerate().take(self.num_axes()) {
            let position = targets.get(axis).copied().unwrap_or(self.calculated[axis]);
            *target = i64::from(position);
        }
        self.move_to(&absolute, timer)
    }

    /// Queue a single-axis relative move.
    ///
    /// # Errors
    ///
    /// Same as [`Stepper::move_relative`].
    pub fn move_relative_axis(
        &mut self,
        axis: Axis,
        delta: Distance,
        speed: Option<StepRate>,
    ) -> StepperResult<()> {
        self.check_axis(axis)?;
        let mut deltas = [0; MAX_AXES];
        deltas[axis] = delta;
        self.move_relative(&deltas[..self.num_axes()], speed)
    }

    /// Queue a single-axis absolute move.
    ///
    /// # Errors
    ///
    /// Same as [`Stepper::move_relative`].
    pub fn move_absolute_axis(
        &mut self,
        axis: Axis,
        target: Position,
        speed: Option<StepRate>,
    ) -> StepperResult<()> {
        self.check_axis(axis)?;
        let delta = i64::from(target) - i64::from(self.calculated[axis]);
        self.move_relative_axis(axis, delta, speed)
    }

    /// Queue a wait of `hundredths` 1/100 s.
    ///
    /// # Errors
    ///
    /// Rejected during an emergency stop, with a latched fatal error or
    /// while paused with a full queue.
    pub fn wait(&mut self, hundredths: u32) -> StepperResult<()> {
        self.check_accepting()?;
        self.enqueue(Movement::new_wait(hundredths, false))
    }

    /// Queue a wait that ends early when conditional waits are switched
    /// off or the cancel input is asserted.
    ///
    /// # Errors
    ///
    /// Same as [`Stepper::wait`].
    pub fn wait_conditional(&mut self, hundredths: u32) -> StepperResult<()> {
        self.check_accepting()?;
        self.enqueue(Movement::new_wait(hundredths, true))
    }

    /// Queue an I/O request, fired in order with the moves around it.
    ///
    /// # Errors
    ///
    /// Same as [`Stepper::wait`].
    pub fn io_control(&mut self, tool: u8, level: u16) -> StepperResult<()> {
        self.check_accepting()?;
        self.enqueue(Movement::new_io(tool, level))
    }

    fn move_to(&mut self, targets: &[i64; MAX_AXES], timer: Timer) -> StepperResult<()> {
        for (axis, &target) in targets.iter().enumerate().take(self.num_axes()) {
            if target != i64::from(self.calculated[axis]) {
                self.check_target(axis, target)?;
            }
        }
        if self.settings.wait_finish_move {
            self.wait_busy();
        }

        let mut deltas = [0; MAX_AXES];
        for (axis, delta) in deltas.iter_mut().enumerate().take(self.num_axes()) {
            *delta = targets[axis] - i64::from(self.calculated[axis]);
        }
        self.queue_linear(&deltas, timer, MoveKind::Normal)
    }

    /// Split, build and queue one linear request of `kind`.
    ///
    /// A paused queue without room for every part (and the backlash
    /// compensation) rejects the request before anything is queued.
    pub(crate) fn queue_linear(
        &mut self,
        deltas: &[Distance; MAX_AXES],
        timer: Timer,
        kind: MoveKind,
    ) -> StepperResult<()> {
        let n = self.num_axes();
        let backlash = match kind {
            MoveKind::Normal | MoveKind::Retract => self.backlash_segment(deltas),
            _ => None,
        };
        let moving = deltas[..n].iter().any(|&d| d != 0);
        let parts = if moving { split_count(&deltas[..n]) } else { 0 };
        self.reserve(parts as usize + usize::from(backlash.is_some()))?;

        if kind != MoveKind::Backlash {
            self.track_directions(deltas);
        }
        if let Some(segment) = backlash {
            trace!("Backlash compensation {:?}", &signed_distances(&segment)[..n]);
            self.enqueue(Movement::new_move(segment))?;
        }

        for part in 0..parts {
            let piece = split_part(&deltas[..n], part, parts);
            let Some(segment) = self.planner.build_segment(&piece[..n], timer, kind) else {
                continue;
            };
            self.enqueue(Movement::new_move(segment))?;
            if kind.updates_position() {
                for (position, &delta) in self.calculated.iter_mut().zip(&piece).take(n) {
                    *position = offset_position(*position, delta);
                }
            }
        }
        debug!(
            kind = kind.name(),
            parts,
            queued = self.queue.count(),
            "Queued {:?}",
            &deltas[..n]
        );
        Ok(())
    }

    /// Record the new direction of every moving axis.
    fn track_directions(&mut self, deltas: &[Distance; MAX_AXES]) {
        let n = self.num_axes();
        for (last, &delta) in self.last_direction.iter_mut().zip(deltas).take(n) {
            if delta != 0 {
                *last = Direction::of(delta);
            }
        }
    }

    /// Compensation move for every axis that reverses, if any does.
    fn backlash_segment(&self, deltas: &[Distance; MAX_AXES]) -> Option<MoveSegment> {
        let mut compensation = [0; MAX_AXES];
        for (axis, limits) in self.planner.limits().iter().enumerate() {
            let delta = deltas[axis];
            if delta == 0 || Direction::of(delta) == self.last_direction[axis] {
                continue;
            }
            compensation[axis] = Direction::of(delta).sign() * Distance::from(limits.backlash);
        }
        self.planner.build_segment(
            &compensation[..self.num_axes()],
            self.settings.timer_backlash,
            MoveKind::Backlash,
        )
    }

    /// Reject a request needing `slots` entries that a paused queue
    /// cannot take.
    fn reserve(&self, slots: usize) -> StepperResult<()> {
        if self.pause && slots > self.queue.free() {
            warn!(
                "Movement queue has {} free entries while paused, {slots} needed",
                self.queue.free()
            );
            return Err(StepperError::Paused);
        }
        Ok(())
    }

    fn enqueue(&mut self, movement: Movement) -> StepperResult<()> {
        self.wait_until_can_queue()?;
        let queued = critical(&self.hal, || self.queue.try_enqueue(movement));
        if !queued {
            return Err(StepperError::Paused);
        }
        if movement.segment().is_some() {
            self.planner
                .replan(&mut self.queue, &self.hal, PlanScope::Appended);
        }
        trace!(
            kind = movement.kind_name(),
            queued = self.queue.count(),
            "Movement queued"
        );
        self.start_movement();
        Ok(())
    }

    /// Block until the queue has a free slot, dispatching timer events.
    fn wait_until_can_queue(&mut self) -> StepperResult<()> {
        while self.queue.is_full() {
            if self.pause {
                warn!("Movement queue full while paused");
                return Err(StepperError::Paused);
            }
            self.check_accepting()?;
            self.events
                .emit(&StepperEvent::Wait(WaitReason::MovementQueueFull));
            self.start_movement();
            self.dispatch();
        }
        Ok(())
    }

    /// Start the step timer if it is idle and there is work.
    pub(crate) fn start_movement(&mut self) {
        if self.timer_running || self.pause || self.emergency_stop || self.queue.is_empty() {
            return;
        }
        self.timer_running = true;
        self.counters.time_start_or_idle = self.hal.millis();
        self.events.emit(&StepperEvent::Start);
        self.hal.start_timer(TIMER_START_DELAY);
    }

    // ─── Validation ─────────────────────────────────────────────────

    pub(crate) fn check_accepting(&self) -> StepperResult<()> {
        if self.emergency_stop {
            warn!("Request rejected: emergency stop active");
            return Err(StepperError::EmergencyStop);
        }
        match self.fatal {
            Some(code) => Err(StepperError::Fatal(code)),
            None => Ok(()),
        }
    }

    pub(crate) fn check_axis(&self, axis: Axis) -> StepperResult<()> {
        if axis < self.num_axes() {
            Ok(())
        } else {
            Err(StepperError::InvalidAxis(axis))
        }
    }

    fn check_axis_count(&self, count: usize) -> StepperResult<()> {
        if count > self.num_axes() {
            return Err(StepperError::InvalidAxis(count - 1));
        }
        Ok(())
    }

    pub(crate) fn timer_for(&self, speed: Option<StepRate>) -> StepperResult<Timer> {
        let timer = self.settings.timer_for(speed);
        if timer == TIMER_STOP {
            return Err(StepperError::SpeedTooLow);
        }
        Ok(timer)
    }

    fn check_target(&mut self, axis: Axis, target: i64) -> StepperResult<()> {
        let (min, max) = if self.settings.limit_check {
            let limits = &self.planner.limits()[axis];
            (limits.limit_min, limits.limit_max)
        } else {
            (0, Position::MAX)
        };
        if (i64::from(min)..=i64::from(max)).contains(&target) {
            return Ok(());
        }
        warn!("Axis {axis}: target {target} outside [{min}, {max}]");
        self.latch_error(ErrorCode::PositionOutOfRange);
        Err(StepperError::OutOfRange {
            axis,
            target,
            min,
            max,
        })
    }

    /// Latch a recoverable error and report it.
    pub(crate) fn latch_error(&mut self, code: ErrorCode) {
        self.error = Some(code);
        self.events.emit(&StepperEvent::Error(code));
    }

    // ─── Stop / Abort / Pause ───────────────────────────────────────

    /// Decelerate to a standstill and drop everything queued.
    ///
    /// `deceleration` [steps/s²] replaces the segment's own deceleration;
    /// zero keeps it. The stop follows the current line and ends at the
    /// segment's jerk speed. A normal move only runs past its end when
    /// the deceleration needs the room, and never past the travel
    /// limits; without enough room it brakes harder. Backlash
    /// compensation runs to completion. Other barrier moves stop within
    /// their own distance.
    pub fn stop_move(&mut self, deceleration: u32) {
        let custom = (deceleration > 0).then(|| RampCurve::new(self.settings.frequency, deceleration));
        let limit_check = self.settings.limit_check;
        critical(&self.hal, || {
            self.queue.truncate_after_head();
            let timer = self.exec.current_timer();
            if let Some(head) = self.queue.peek_mut(0) {
                let state = head.state;
                let done = head.done;
                match state {
                    _ if state.is_ready() => self.queue.clear(),
                    MovementState::Wait => head.state = MovementState::Done,
                    MovementState::Done => {}
                    _ => {
                        if let Some(segment) = head
                            .segment_mut()
                            .filter(|segment| segment.kind != MoveKind::Backlash)
                        {
                            let room =
                                stop_room(segment, done, &self.current, self.planner.limits(), limit_check);
                            let needed = plan_stop(segment, done, timer, custom, room);
                            self.exec.level = segment.ramp.down_level;
                            self.exec.elapsed = segment.dec.elapsed(segment.ramp.down_level);
                            head.state = if needed == 0 {
                                MovementState::Done
                            } else {
                                MovementState::DownDec
                            };
                        }
                    }
                }
            }

            self.calculated = self.current;
            let head = self.queue.peek(0).and_then(|m| Some((m.done, *m.segment()?)));
            if let Some((done, segment)) = head.filter(|(_, seg)| seg.kind.updates_position()) {
                for (axis, position) in self.calculated.iter_mut().enumerate() {
                    let rest = segment.pulses_at(axis, segment.end_at) as i64
                        - segment.pulses_at(axis, done.min(segment.end_at)) as i64;
                    *position = offset_position(*position, segment.axes[axis].direction.sign() * rest);
                }
            }
            self.last_direction = self.exec.directions;
        });
        debug!("Stop requested, decelerating to {:?}", self.positions());
    }

    /// Halt immediately and drop everything queued. Idempotent.
    pub fn abort_move(&mut self) {
        self.abort_queue();
        debug!("Movement aborted at {:?}", self.current_positions());
    }

    /// Stop the timer and clear the queue; positions snap to the live one.
    pub(crate) fn abort_queue(&mut self) {
        self.hal.stop_timer();
        critical(&self.hal, || {
            self.queue.clear();
            self.calculated = self.current;
            self.last_direction = self.exec.directions;
            self.exec.prev_exit_standstill = true;
        });
        if self.timer_running {
            self.timer_running = false;
            self.counters.time_start_or_idle = self.hal.millis();
            self.events.emit(&StepperEvent::Idle);
        }
    }

    /// Stop at the next point where the motion can come to a standstill
    /// without exceeding the deceleration. The queue is kept.
    pub fn pause_move(&mut self) {
        if self.pause {
            return;
        }
        self.pause = true;
        if !critical(&self.hal, || pause_head(&mut self.queue)) {
            self.pause_next_ready();
        }
        debug!("Pause requested");
    }

    /// Put the pause boundary after the first ready move that can end
    /// at a standstill.
    fn pause_next_ready(&mut self) {
        let mut offset = 1;
        while let Some(movement) = self.queue.peek(offset).copied() {
            if movement.is_barrier() {
                break;
            }
            if movement.segment().is_some() && movement.state.is_ready() {
                self.set_pause_stop(offset, true);
                self.planner.replan(&mut self.queue, &self.hal, PlanScope::All);
                let stops = self
                    .queue
                    .peek(offset)
                    .and_then(Movement::segment)
                    .is_some_and(|s| s.ramp.timer_stop >= s.timer_standstill);
                if stops {
                    return;
                }
                self.set_pause_stop(offset, false);
            }
            offset += 1;
        }
        self.planner.replan(&mut self.queue, &self.hal, PlanScope::All);
    }

    fn set_pause_stop(&mut self, offset: usize, value: bool) {
        critical(&self.hal, || {
            if let Some(segment) = self.queue.peek_mut(offset).and_then(Movement::segment_mut) {
                segment.pause_stop = value;
            }
        });
    }

    /// Resume after [`Stepper::pause_move`].
    pub fn continue_move(&mut self) {
        if !self.pause {
            return;
        }
        self.pause = false;
        critical(&self.hal, || {
            for offset in 0..self.queue.count() {
                let Some(movement) = self.queue.peek_mut(offset) else {
                    continue;
                };
                if !movement.state.is_ready() {
                    continue;
                }
                if let Some(segment) = movement.segment_mut() {
                    segment.pause_stop = false;
                }
            }
        });
        self.planner.replan(&mut self.queue, &self.hal, PlanScope::All);
        self.start_movement();
        debug!("Continue");
    }

    /// True while paused.
    #[inline]
    pub fn is_paused(&self) -> bool {
        self.pause
    }

    // ─── Emergency Stop ─────────────────────────────────────────────

    /// Abort everything and reject requests until
    /// [`Stepper::emergency_stop_resurrect`].
    pub fn emergency_stop(&mut self) {
        let first = !self.emergency_stop;
        self.emergency_stop = true;
        self.abort_move();
        self.fatal = Some(ErrorCode::EmergencyStop);
        if first {
            warn!("Emergency stop");
            self.events
                .emit(&StepperEvent::Error(ErrorCode::EmergencyStop));
        }
    }

    /// Leave the emergency stop state.
    pub fn emergency_stop_resurrect(&mut self) {
        if !self.emergency_stop {
            return;
        }
        self.emergency_stop = false;
        if self.fatal == Some(ErrorCode::EmergencyStop) {
            self.fatal = None;
        }
        info!("Emergency stop released");
    }

    /// True while the emergency stop is latched.
    #[inline]
    pub fn is_emergency_stop(&self) -> bool {
        self.emergency_stop
    }

    // ─── Conditional Moves ──────────────────────────────────────────

    /// Drain the queue, then move by `deltas` until `stop_when` holds.
    ///
    /// The condition is polled between timer events; once it holds the
    /// move is stopped as by [`Stepper::stop_move`] with the segment's
    /// own deceleration. Returns `true` if the condition ended the move,
    /// `false` if the move completed first. A condition that already
    /// holds ends the request without moving.
    ///
    /// # Errors
    ///
    /// Same as [`Stepper::move_relative`], plus `StepperError::Paused`
    /// while paused.
    pub fn move_until(
        &mut self,
        deltas: &[Distance],
        speed: Option<StepRate>,
        mut stop_when: impl FnMut(&Self) -> bool,
    ) -> StepperResult<bool> {
        self.check_accepting()?;
        if self.pause {
            warn!("Conditional move rejected while paused");
            return Err(StepperError::Paused);
        }
        self.wait_busy();
        self.check_accepting()?;
        if stop_when(self) {
            return Ok(true);
        }
        self.move_relative(deltas, speed)?;

        loop {
            if stop_when(self) {
                self.stop_move(0);
                self.wait_busy();
                self.check_accepting()?;
                debug!("Conditional move ended at {:?}", self.current_positions());
                return Ok(true);
            }
            self.check_accepting()?;
            if !self.is_busy() {
                return Ok(false);
            }
            self.events
                .emit(&StepperEvent::Wait(WaitReason::WaitBusy));
            self.start_movement();
            self.dispatch();
        }
    }

    // ─── Status ─────────────────────────────────────────────────────

    /// True while the timer runs or entries are queued.
    #[inline]
    pub fn is_busy(&self) -> bool {
        self.timer_running || !self.queue.is_empty()
    }

    /// Block until all queued work is done (or cannot proceed because
    /// of a pause or an emergency stop).
    pub fn wait_busy(&mut self) {
        self.wait_idle(WaitReason::WaitBusy);
    }

    /// [`Stepper::wait_busy`] reporting `reason` while blocked.
    pub(crate) fn wait_idle(&mut self, reason: WaitReason) {
        loop {
            if !self.timer_running
                && (self.queue.is_empty() || self.pause || self.emergency_stop)
            {
                return;
            }
            self.events.emit(&StepperEvent::Wait(reason));
            self.start_movement();
            self.dispatch();
        }
    }

    /// Wait for one timer event, run the handler if it expired, then do
    /// background work.
    pub fn dispatch(&mut self) {
        if self.hal.wait_for_timer() {
            self.on_timer_interrupt();
        }
        self.background();
    }

    /// True if a request would be queued without blocking.
    #[inline]
    pub fn can_queue_movement(&self) -> bool {
        !self.queue.is_full()
    }

    /// Entries currently queued, including the executing one.
    #[inline]
    pub fn queued_movements(&self) -> usize {
        self.queue.count()
    }

    /// Step index within the executing entry, 0 when idle.
    pub fn running_step_index(&self) -> Steps {
        critical(&self.hal, || self.queue.peek(0).map_or(0, |m| m.done))
    }

    /// Reference-axis steps executed since start.
    #[inline]
    pub fn total_steps(&self) -> u64 {
        self.counters.total_steps
    }

    /// Nested timer interrupts ignored.
    #[inline]
    pub fn reentered_interrupts(&self) -> u32 {
        self.counters.reentered
    }

    /// Milliseconds since the controller went idle, `None` while running.
    pub fn idle_millis(&self) -> Option<u32> {
        (!self.timer_running).then(|| {
            self.hal
                .millis()
                .wrapping_sub(self.counters.time_start_or_idle)
        })
    }

    // ─── Positions ──────────────────────────────────────────────────

    /// Position at the end of everything queued.
    #[inline]
    pub fn position(&self, axis: Axis) -> Position {
        self.calculated[axis]
    }

    /// Positions at the end of everything queued.
    #[inline]
    pub fn positions(&self) -> &[Position] {
        &self.calculated[..self.num_axes()]
    }

    /// Live position of one axis.
    pub fn current_position(&self, axis: Axis) -> Position {
        critical(&self.hal, || self.current[axis])
    }

    /// Live positions.
    pub fn current_positions(&self) -> heapless::Vec<Position, MAX_AXES> {
        let n = self.num_axes();
        critical(&self.hal, || self.current[..n].iter().copied().collect())
    }

    /// Redefine the position of an axis once the queue has drained.
    ///
    /// # Errors
    ///
    /// Returns `StepperError::InvalidAxis` for an unknown axis and
    /// `StepperError::Paused` if a pause keeps the queue from draining.
    pub fn set_position(&mut self, axis: Axis, position: Position) -> StepperResult<()> {
        self.check_axis(axis)?;
        self.wait_busy();
        if self.is_busy() {
            warn!("Axis {axis}: position not set, queue paused");
            return Err(StepperError::Paused);
        }
        critical(&self.hal, || {
            self.current[axis] = position;
            self.calculated[axis] = position;
        });
        debug!("Axis {axis}: position set to {position}");
        Ok(())
    }

    // ─── Speed Override ─────────────────────────────────────────────

    /// Speed override, 128 = 100%.
    #[inline]
    pub fn speed_override(&self) -> u8 {
        self.speed_override
    }

    /// Set the speed override (128 = 100%). Applies from the next
    /// interrupt; planned ramps are not changed.
    pub fn set_speed_override(&mut self, value: u8) {
        self.speed_override = value.max(SPEED_OVERRIDE_MIN);
    }

    /// Speed override in percent.
    pub fn speed_override_percent(&self) -> u16 {
        let value = u32::from(self.speed_override) * 100;
        let base = u32::from(SPEED_OVERRIDE_100P);
        ((value + base / 2) / base) as u16
    }

    /// Set the speed override in percent (clamped to the valid range).
    pub fn set_speed_override_percent(&mut self, percent: u16) {
        let value = (u32::from(percent) * u32::from(SPEED_OVERRIDE_100P) + 50) / 100;
        self.set_speed_override(value.min(u32::from(u8::MAX)) as u8);
    }

    // ─── Settings ───────────────────────────────────────────────────

    /// Set the driver enable level of every axis.
    pub fn set_enable_all(&mut self, level: u8) {
        for axis in 0..self.num_axes() {
            self.hal.set_enable(axis, level, true);
        }
    }

    /// Disable an axis driver after `seconds` idle; zero keeps it enabled.
    ///
    /// # Errors
    ///
    /// Returns `StepperError::InvalidAxis` for an unknown axis.
    pub fn set_enable_timeout(&mut self, axis: Axis, seconds: u8) -> StepperResult<()> {
        self.check_axis(axis)?;
        self.enable_timeout[axis] = seconds.min(ENABLE_TIMEOUT_MAX);
        Ok(())
    }

    /// Abort with a fatal error when a normal move hits a reference sensor.
    pub fn set_check_for_reference(&mut self, enabled: bool) {
        self.settings.check_reference = enabled;
    }

    /// Execute (`true`) or skip conditional waits.
    pub fn set_wait_conditional(&mut self, enabled: bool) {
        self.settings.wait_conditional = enabled;
    }

    /// Block move requests until the queue drained.
    pub fn set_wait_finish_move(&mut self, enabled: bool) {
        self.settings.wait_finish_move = enabled;
    }

    // ─── Errors ─────────────────────────────────────────────────────

    /// Latched recoverable error.
    #[inline]
    pub fn error(&self) -> Option<ErrorCode> {
        self.error
    }

    /// Clear the recoverable error.
    pub fn clear_error(&mut self) {
        self.error = None;
    }

    /// Latched fatal error.
    #[inline]
    pub fn fatal_error(&self) -> Option<ErrorCode> {
        self.fatal
    }

    /// Clear the fatal error. An emergency stop stays latched until
    /// resurrected.
    pub fn clear_fatal_error(&mut self) {
        if !self.emergency_stop {
            self.fatal = None;
        }
    }
}

/// Reference steps a stopping segment may still cover from `done`.
///
/// Normal moves may overrun their end along the same line as far as
/// the travel limits allow; every other kind stays within its distance.
fn stop_room(
    segment: &MoveSegment,
    done: Steps,
    current: &[Position; MAX_AXES],
    limits: &[AxisLimits],
    limit_check: bool,
) -> Steps {
    let reach = if segment.kind == MoveKind::Normal {
        let steps = u64::from(segment.steps.max(1));
        let mut extra = u64::from(Steps::MAX - segment.steps);
        for (axis, limits) in limits.iter().enumerate() {
            let step = segment.axes[axis];
            if step.distance == 0 {
                continue;
            }
            let ahead = segment.pulses_at(axis, segment.steps) as i64
                - segment.pulses_at(axis, done.min(segment.steps)) as i64;
            let end = i64::from(current[axis]) + step.direction.sign() * ahead;
            let (min, max) = if limit_check {
                (i64::from(limits.limit_min), i64::from(limits.limit_max))
            } else {
                (0, i64::from(Position::MAX))
            };
            let free = match step.direction {
                Direction::Positive => max - end,
                Direction::Negative => end - min,
            };
            let free = u64::try_from(free).unwrap_or(0);
            extra = extra.min(free.saturating_mul(steps) / u64::from(step.distance));
        }
        u64::from(segment.steps) + extra
    } else {
        u64::from(segment.steps)
    };
    let room = reach.saturating_sub(u64::from(done));
    Steps::try_from(room).unwrap_or(Steps::MAX)
}

/// Reshape `segment` to decelerate from `timer` after `done` steps down
/// to its jerk speed within `room` steps. Returns the steps needed.
///
/// `custom` is tried first, then the segment's own deceleration; if
/// neither fits, a curve braking exactly within `room` is used.
fn plan_stop(
    segment: &mut MoveSegment,
    done: Steps,
    timer: Timer,
    custom: Option<RampCurve>,
    room: Steps,
) -> Steps {
    let standstill = segment.timer_standstill;
    let fits = |curve: &RampCurve| {
        curve.level(timer).saturating_sub(curve.level(standstill)) <= u64::from(room)
    };
    let curve = custom
        .filter(fits)
        .or_else(|| Some(segment.dec).filter(fits))
        .unwrap_or_else(|| RampCurve::reaching(timer, u64::from(room)));
    let from = curve.level(timer);
    let needed = from.saturating_sub(curve.level(standstill)).min(u64::from(room));
    let needed = Steps::try_from(needed).unwrap_or(room);

    let ramp = &mut segment.ramp;
    ramp.up_steps = ramp.up_steps.min(done);
    ramp.down_start_at = done;
    ramp.down_steps = needed;
    ramp.down_state = MovementState::DownDec;
    ramp.down_level = from;
    ramp.timer_stop = standstill;
    segment.dec = curve;
    segment.end_at = done.saturating_add(needed);
    segment.stop_at_end = true;
    needed
}

/// Try to end the head movement at a standstill.
fn pause_head(queue: &mut MovementQueue) -> bool {
    let Some(head) = queue.peek_mut(0) else {
        return true;
    };
    let state = head.state;
    let done = head.done;
    let Some(segment) = head.segment_mut() else {
        return true;
    };
    if state.is_ready()
        || segment.ends_at_standstill()
        || segment.ramp.timer_stop >= segment.timer_standstill
    {
        segment.pause_stop = segment.pause_stop || !state.is_ready();
        return true;
    }
    if !matches!(
        state,
        MovementState::UpAcc | MovementState::UpDec | MovementState::Run
    ) {
        return false;
    }

    let from = segment.dec.level(segment.ramp.timer_run);
    let required = from.saturating_sub(segment.dec.level(segment.timer_standstill));
    let Ok(required) = Steps::try_from(required) else {
        return false;
    };
    let Some(start) = segment.steps.checked_sub(required) else {
        return false;
    };
    if start < done.max(segment.ramp.up_steps) {
        return false;
    }

    let ramp = &mut segment.ramp;
    ramp.down_start_at = start;
    ramp.down_steps = required;
    ramp.down_state = MovementState::DownDec;
    ramp.down_level = from;
    ramp.timer_stop = segment.timer_standstill;
    segment.pause_stop = true;
    true
}
