//! Queued movement model.
//!
//! A [`Movement`] is one queue entry: a linear move segment, a timed
//! wait or an ordered I/O request. Its [`MovementState`] only moves
//! forward. `Ready*` entries may be re-planned in place; once an entry
//! is processing, only its running step index changes (stop and pause
//! may shorten the deceleration tail of the executing segment).

use serde::Serialize;
use stepper_common::consts::MAX_AXES;
use stepper_common::hal::types::Direction;
use stepper_common::types::{Axis, Distance, Steps, Timer};

use crate::ramp::math::RampCurve;
use crate::ramp::profile::Ramp;

// ─── State ──────────────────────────────────────────────────────────

/// Lifecycle state of a queue entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MovementState {
    /// Move segment waiting to start.
    ReadyMove,
    /// Wait waiting to start.
    ReadyWait,
    /// I/O request waiting to start.
    ReadyIo,
    /// Speeding up toward the run timer.
    UpAcc,
    /// Slowing down toward the run timer (entry faster than run).
    UpDec,
    /// Constant speed.
    Run,
    /// Slowing down toward the stop timer.
    DownDec,
    /// Speeding up toward the stop timer (exit faster than run).
    DownAcc,
    /// Executing wait.
    Wait,
    /// Finished, retired on the next interrupt.
    Done,
}

impl MovementState {
    /// True for entries that have not started.
    #[inline]
    pub const fn is_ready(&self) -> bool {
        matches!(self, Self::ReadyMove | Self::ReadyWait | Self::ReadyIo)
    }

    /// True for entries the interrupt has started.
    #[inline]
    pub const fn is_processing(&self) -> bool {
        !self.is_ready()
    }

    /// True while the level of the acceleration curve grows.
    #[inline]
    pub const fn uses_acc_curve(&self) -> bool {
        matches!(self, Self::UpAcc | Self::DownAcc)
    }

    /// True for the phases that step along a ramp curve.
    #[inline]
    pub const fn is_ramp_phase(&self) -> bool {
        matches!(self, Self::UpAcc | Self::UpDec | Self::DownDec | Self::DownAcc)
    }
}

// ─── Move Segment ───────────────────────────────────────────────────

/// Per-axis share of a move segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct AxisStep {
    /// Unsigned step count.
    pub distance: Steps,
    /// Travel direction (before output inversion).
    pub direction: Direction,
    /// Most pulses this axis receives in one interrupt.
    pub multiplier: u8,
}

impl AxisStep {
    /// Signed distance.
    #[inline]
    pub fn signed(&self) -> Distance {
        self.direction.sign() * Distance::from(self.distance)
    }
}

/// What a move segment is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MoveKind {
    /// Requested move.
    Normal,
    /// Backlash compensation; pulses are emitted but positions stay.
    Backlash,
    /// Move off a reference sensor.
    Retract,
    /// Reference search watching one sensor.
    Reference {
        /// Reference input id.
        id: u8,
        /// Input value meaning "hit".
        hit_value: u8,
        /// Ticks the sensor must read "hit" before stopping.
        stable_ticks: u32,
    },
}

impl MoveKind {
    /// Segments of this kind force standstill on both sides.
    #[inline]
    pub const fn is_barrier(&self) -> bool {
        !matches!(self, Self::Normal)
    }

    /// Pulses of this kind update the live position.
    #[inline]
    pub const fn updates_position(&self) -> bool {
        !matches!(self, Self::Backlash)
    }

    /// Label for diagnostics.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Normal => "move",
            Self::Backlash => "backlash",
            Self::Retract => "retract",
            Self::Reference { .. } => "reference",
        }
    }
}

/// Linear move segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveSegment {
    /// Per-axis distances and directions.
    pub axes: [AxisStep; MAX_AXES],
    /// Reference-axis distance (largest axis distance).
    pub steps: Steps,
    /// Step index at which the segment ends (differs from `steps` after a stop).
    pub end_at: Steps,
    /// Reference steps processed per interrupt.
    pub multiplier: u8,
    /// Requested run timer after per-axis limits.
    pub timer_max: Timer,
    /// Junction timer to a standstill neighbour.
    pub timer_standstill: Timer,
    /// Jerk-limited junction timer with the previous segment.
    pub timer_junction: Timer,
    /// Fastest entry timer found by the last backward planning pass.
    pub entry_limit: Timer,
    /// Acceleration curve in reference-axis steps.
    pub acc: RampCurve,
    /// Deceleration curve in reference-axis steps.
    pub dec: RampCurve,
    /// Planned speed profile.
    pub ramp: Ramp,
    /// Purpose of the segment.
    pub kind: MoveKind,
    /// Planned to end at a standstill junction.
    pub stop_at_end: bool,
    /// Standstill boundary inserted by `pause_move`.
    pub pause_stop: bool,
}

impl MoveSegment {
    /// Pulses emitted on `axis` after `k` reference steps.
    ///
    /// The Bresenham accumulator starts at `steps / 2`, so this is the
    /// closed form of the interrupt's running sum.
    #[inline]
    pub fn pulses_at(&self, axis: Axis, k: Steps) -> u64 {
        let steps = u64::from(self.steps.max(1));
        (steps / 2 + u64::from(self.axes[axis].distance) * u64::from(k)) / steps
    }

    /// True if this segment is an optimization barrier.
    #[inline]
    pub fn is_barrier(&self) -> bool {
        self.kind.is_barrier()
    }

    /// True if the neighbour after this segment sees a standstill.
    #[inline]
    pub fn ends_at_standstill(&self) -> bool {
        self.is_barrier() || self.stop_at_end || self.pause_stop
    }
}

// ─── Movement ───────────────────────────────────────────────────────

/// Queue entry payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload {
    /// Linear move.
    Move(MoveSegment),
    /// Timed wait in 1/100 s.
    Wait {
        /// Duration [1/100 s].
        duration: u32,
        /// Ends early when conditional waits are disabled or cancelled.
        conditional: bool,
    },
    /// Ordered I/O request.
    Io {
        /// Tool or output id.
        tool: u8,
        /// Requested level.
        level: u16,
    },
}

/// One queue entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Movement {
    /// Lifecycle state.
    pub state: MovementState,
    /// Running step index (reference steps done, or wait ticks elapsed).
    pub done: Steps,
    /// What to execute.
    pub payload: Payload,
}

impl Movement {
    /// Ready move entry.
    pub fn new_move(segment: MoveSegment) -> Self {
        Self {
            state: MovementState::ReadyMove,
            done: 0,
            payload: Payload::Move(segment),
        }
    }

    /// Ready wait entry.
    pub fn new_wait(duration: u32, conditional: bool) -> Self {
        Self {
            state: MovementState::ReadyWait,
            done: 0,
            payload: Payload::Wait {
                duration,
                conditional,
            },
        }
    }

    /// Ready I/O entry.
    pub fn new_io(tool: u8, level: u16) -> Self {
        Self {
            state: MovementState::ReadyIo,
            done: 0,
            payload: Payload::Io { tool, level },
        }
    }

    /// Move segment, if this is a move.
    #[inline]
    pub fn segment(&self) -> Option<&MoveSegment> {
        match &self.payload {
            Payload::Move(segment) => Some(segment),
            _ => None,
        }
    }

    /// Mutable move segment, if this is a move.
    #[inline]
    pub fn segment_mut(&mut self) -> Option<&mut MoveSegment> {
        match &mut self.payload {
            Payload::Move(segment) => Some(segment),
            _ => None,
        }
    }

    /// Entries that force a standstill junction on both sides.
    #[inline]
    pub fn is_barrier(&self) -> bool {
        match &self.payload {
            Payload::Move(segment) => segment.is_barrier(),
            Payload::Wait { .. } => true,
            Payload::Io { .. } => false,
        }
    }

    /// Label for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match &self.payload {
            Payload::Move(segment) => segment.kind.name(),
            Payload::Wait { conditional: true, .. } => "wait-conditional",
            Payload::Wait { .. } => "wait",
            Payload::Io { .. } => "io",
        }
    }
}
