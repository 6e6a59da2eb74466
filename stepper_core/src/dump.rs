//! Diagnostic snapshots.
//!
//! [`Stepper::dump`] copies the requested parts of the controller state
//! (with interrupts masked) into a serializable [`StepperSnapshot`].
//! The simulator prints it as text or JSON.

use std::fmt;

use bitflags::bitflags;
use serde::Serialize;
use stepper_common::consts::MOVEMENT_BUFFER_SIZE;
use stepper_common::hal::driver::StepperHal;
use stepper_common::motion::error::ErrorCode;
use stepper_common::types::{Distance, Position, Steps, Timer};

use crate::controller::Stepper;
use crate::critical::CriticalRegion;
use crate::movement::{Movement, MovementState, Payload};

bitflags! {
    /// Parts of the state included in a dump.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DumpOptions: u8 {
        /// Calculated and live positions
        const POS = 0x01;
        /// Flags, errors and counters
        const STATE = 0x02;
        /// Queued movements
        const MOVEMENTS = 0x08;
        /// Ramp details of queued moves
        const DETAILS = 0x80;
        /// Everything
        const ALL = 0xff;
    }
}

/// Axis positions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PositionDump {
    /// End of everything queued.
    pub calculated: Vec<Position>,
    /// Live position.
    pub current: Vec<Position>,
}

/// Controller flags and counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateDump {
    pub busy: bool,
    pub timer_running: bool,
    pub paused: bool,
    pub emergency_stop: bool,
    pub error: Option<ErrorCode>,
    pub fatal: Option<ErrorCode>,
    pub speed_override: u8,
    pub queued: usize,
    pub running_step_index: Steps,
    pub total_steps: u64,
    pub reentered: u32,
}

/// Ramp of a queued move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RampDump {
    pub timer_start: Timer,
    pub timer_run: Timer,
    pub timer_stop: Timer,
    pub up_steps: Steps,
    pub down_start_at: Steps,
    pub end_at: Steps,
    pub multiplier: u8,
}

/// One queue entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MovementDump {
    pub kind: &'static str,
    pub state: MovementState,
    pub done: Steps,
    /// Reference-axis steps (moves) or duration [1/100 s] (waits).
    pub length: Steps,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distances: Option<Vec<Distance>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ramp: Option<RampDump>,
}

/// Snapshot returned by [`Stepper::dump`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepperSnapshot {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub positions: Option<PositionDump>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<StateDump>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub movements: Option<heapless::Vec<MovementDump, MOVEMENT_BUFFER_SIZE>>,
}

fn movement_dump(movement: &Movement, num_axes: usize, details: bool) -> MovementDump {
    let (length, distances, ramp) = match &movement.payload {
        Payload::Move(segment) => {
            let distances = segment.axes[..num_axes]
                .iter()
                .map(|axis| axis.signed())
                .collect();
            let ramp = RampDump {
                timer_start: segment.ramp.timer_start,
                timer_run: segment.ramp.timer_run,
                timer_stop: segment.ramp.timer_stop,
                up_steps: segment.ramp.up_steps,
                down_start_at: segment.ramp.down_start_at,
                end_at: segment.end_at,
                multiplier: segment.multiplier,
            };
            (segment.steps, Some(distances), Some(ramp))
        }
        Payload::Wait { duration, .. } => (*duration, None, None),
        Payload::Io { level, .. } => (Steps::from(*level), None, None),
    };
    MovementDump {
        kind: movement.kind_name(),
        state: movement.state,
        done: movement.done,
        length,
        distances: distances.filter(|_| details),
        ramp: ramp.filter(|_| details),
    }
}

impl<H: StepperHal> Stepper<H> {
    /// Snapshot of the parts selected by `options`.
    pub fn dump(&self, options: DumpOptions) -> StepperSnapshot {
        let _region = CriticalRegion::enter(&self.hal);
        let n = self.num_axes();

        let positions = options.contains(DumpOptions::POS).then(|| PositionDump {
            calculated: self.calculated[..n].to_vec(),
            current: self.current[..n].to_vec(),
        });

        let state = options.contains(DumpOptions::STATE).then(|| StateDump {
            busy: self.is_busy(),
            timer_running: self.timer_running,
            paused: self.pause,
            emergency_stop: self.emergency_stop,
            error: self.error,
            fatal: self.fatal,
            speed_override: self.speed_override,
            queued: self.queue.count(),
            running_step_index: self.queue.peek(0).map_or(0, |m| m.done),
            total_steps: self.counters.total_steps,
            reentered: self.counters.reentered,
        });

        let details = options.contains(DumpOptions::DETAILS);
        let movements = options.contains(DumpOptions::MOVEMENTS).then(|| {
            let mut out = heapless::Vec::<MovementDump, MOVEMENT_BUFFER_SIZE>::new();
            for movement in self.queue.iter() {
                if out.push(movement_dump(movement, n, details)).is_err() {
                    break;
                }
            }
            out
        });

        StepperSnapshot {
            positions,
            state,
            movements,
        }
    }
}

impl fmt::Display for StepperSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(pos) = &self.positions {
            writeln!(f, "position   {:?}", pos.calculated)?;
            writeln!(f, "current    {:?}", pos.current)?;
        }
        if let Some(state) = &self.state {
            writeln!(
                f,
                "state      busy={} running={} paused={} estop={} override={} queued={} step={} total={}",
                state.busy,
                state.timer_running,
                state.paused,
                state.emergency_stop,
                state.speed_override,
                state.queued,
                state.running_step_index,
                state.total_steps
            )?;
            if let Some(code) = state.error {
                writeln!(f, "error      {code}")?;
            }
            if let Some(code) = state.fatal {
                writeln!(f, "fatal      {code}")?;
            }
        }
        if let Some(movements) = &self.movements {
            for (i, m) in movements.iter().enumerate() {
                write!(f, "[{i:2}] {:<16} {:?} {}/{}", m.kind, m.state, m.done, m.length)?;
                if let Some(d) = &m.distances {
                    write!(f, " {d:?}")?;
                }
                if let Some(r) = &m.ramp {
                    write!(
                        f,
                        " t={}/{}/{} up={} down@{} end={} x{}",
                        r.timer_start,
                        r.timer_run,
                        r.timer_stop,
                        r.up_steps,
                        r.down_start_at,
                        r.end_at,
                        r.multiplier
                    )?;
                }
                writeln!(f)?;
            }
        }
        Ok(())
    }
}
