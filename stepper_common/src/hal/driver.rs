//! HAL capability traits and error types.
//!
//! This module defines:
//! - `StepTimer` - One-shot step timer and millisecond clock
//! - `InterruptControl` - Nestable interrupt masking
//! - `StepOutput` - Direction, step and enable outputs
//! - `ReferenceInput` - Reference sensors and the wait-cancel input
//! - `StepperHal` - Everything the stepper core needs, blanket-implemented
//! - `HalError` enum - Error types for driver construction
//!
//! The planner and scheduler depend only on these traits. A target
//! implements them once for its registers; the simulation driver
//! implements them in software.

use thiserror::Error;

use super::types::{Direction, StepPulses};
use crate::types::{Axis, Timer};

/// Error types for HAL operations.
#[derive(Debug, Clone, Error)]
pub enum HalError {
    /// Driver initialization failed
    #[error("Initialization failed: {0}")]
    InitFailed(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Axis index outside the driver's range
    #[error("Invalid axis: {0}")]
    InvalidAxis(Axis),

    /// Reference input id outside the driver's range
    #[error("Invalid reference input: {0}")]
    InvalidReference(u8),
}

/// One-shot step timer.
///
/// # Timing Contracts
///
/// | Operation | Context | Constraint |
/// |-----------|---------|------------|
/// | `start_timer()` | ISR + foreground | O(1), no blocking |
/// | `stop_timer()` | ISR + foreground | O(1), no blocking |
/// | `wait_for_timer()` | foreground only | may block until expiry |
/// | `millis()` | foreground only | O(1) |
pub trait StepTimer {
    /// Arm the timer to expire once after `ticks` timer ticks.
    ///
    /// Re-arming a running timer replaces the pending expiry.
    fn start_timer(&mut self, ticks: Timer);

    /// Cancel a pending expiry.
    fn stop_timer(&mut self);

    /// Block until the next event the foreground may care about.
    ///
    /// Returns `true` if the timer expired and the caller must run the
    /// timer interrupt handler itself. Targets with a real interrupt
    /// return `false` after a short idle period.
    fn wait_for_timer(&mut self) -> bool;

    /// Free-running millisecond clock (wraps).
    fn millis(&self) -> u32;
}

/// Nestable interrupt masking.
///
/// Takes `&self` so a guard can hold it while the rest of the driver
/// is borrowed mutably.
pub trait InterruptControl {
    /// Disable interrupts, returning whether they were enabled before.
    fn disable_interrupts(&self) -> bool;

    /// Restore the state returned by the matching `disable_interrupts`.
    fn restore_interrupts(&self, was_enabled: bool);
}

/// Step, direction and enable outputs.
pub trait StepOutput {
    /// Set the direction output of one axis.
    fn set_direction(&mut self, axis: Axis, direction: Direction);

    /// Emit step pulses; `steps[axis]` is the number of pulses for that axis.
    fn step(&mut self, steps: &StepPulses);

    /// Set the driver enable level of an axis.
    ///
    /// `force` writes the output even if the level did not change.
    fn set_enable(&mut self, axis: Axis, level: u8, force: bool);

    /// Current driver enable level of an axis.
    fn enable_level(&self, axis: Axis) -> u8;
}

/// Reference sensor inputs.
pub trait ReferenceInput {
    /// Raw value of reference input `id` (`axis * 2 + end`).
    fn reference_value(&self, id: u8) -> u8;

    /// True while the external "cancel conditional wait" input is asserted.
    fn wait_cancel_requested(&self) -> bool {
        false
    }
}

/// Full set of capabilities consumed by the stepper core.
pub trait StepperHal: StepTimer + InterruptControl + StepOutput + ReferenceInput {}

impl<T: StepTimer + InterruptControl + StepOutput + ReferenceInput> StepperHal for T {}
