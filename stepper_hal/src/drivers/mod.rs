//! HAL driver implementations.
//!
//! This module contains all HAL driver implementations:
//!
//! - [`simulation`] - Software simulation driver for development and testing
//!
//! # Adding New Drivers
//!
//! 1. Create a new submodule under `drivers/`
//! 2. Implement the capability traits from `stepper_common::hal::driver`
//! 3. Add export and documentation

pub mod simulation;
