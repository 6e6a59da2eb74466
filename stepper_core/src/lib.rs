//! # Stepper Core Library
//!
//! Multi-axis stepper motion core: look-ahead ramp planning and an
//! interrupt-driven step scheduler for CNC-style machines.
//!
//! ## Module Structure
//!
//! - [`controller`] - `Stepper`: the foreground API (moves, waits, I/O,
//!   stop / abort / pause, status)
//! - [`scheduler`] - Timer interrupt handler executing the queue
//! - [`ramp`] - Ramp curves, profiles, junction speeds and the planner
//! - [`movement`] / [`queue`] - Queue entries and the fixed ring buffer
//! - [`reference`] - Reference (homing) search
//! - [`background`] - Foreground housekeeping (restart, enable timeout)
//! - [`dump`] - Diagnostic snapshots
//! - [`job`] - Scripted jobs for the simulator
//!
//! ## Contexts
//!
//! The timer interrupt owns the live positions, the head of the queue
//! and the execution state; the foreground owns the tail and the ramps
//! of entries that have not started. Shared words are exchanged inside
//! short critical sections ([`critical`]). No allocation happens after
//! construction on the motion path.

#![deny(clippy::disallowed_types)]

pub mod background;
pub mod config;
pub mod controller;
pub mod critical;
pub mod dump;
pub mod error;
pub mod events;
pub mod job;
pub mod movement;
pub mod queue;
pub mod ramp;
pub mod reference;
pub mod scheduler;

pub use controller::Stepper;
pub use dump::{DumpOptions, StepperSnapshot};
pub use error::{StepperError, StepperResult};
pub use ramp::{PlanScope, Ramp, RampCurve, RampPlanner};
