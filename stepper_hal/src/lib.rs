//! # Stepper HAL Library
//!
//! Hardware drivers for the stepper core.
//!
//! Drivers implement the capability traits defined in
//! `stepper_common::hal::driver` (`StepTimer`, `InterruptControl`,
//! `StepOutput`, `ReferenceInput`); the blanket `StepperHal` trait then
//! makes them usable by `stepper_core`.
//!
//! # Module Structure
//!
//! - [`drivers`] - HAL driver implementations
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   stepper_core::Stepper                     │
//! │      on_timer_interrupt ◄── wait_for_timer (foreground)     │
//! └──────────────────────────────┬──────────────────────────────┘
//!                                │  StepperHal
//!                                ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         SimHal                              │
//! │  VirtualTimer │ AxisSimulator[] │ ReferenceSwitch[] │ mask  │
//! └─────────────────────────────────────────────────────────────┘
//! ```

#![deny(missing_docs)]

pub mod drivers;

// Re-export key types for convenience
pub use crate::drivers::simulation::{SimAxisConfig, SimHal, SimulationConfig};
