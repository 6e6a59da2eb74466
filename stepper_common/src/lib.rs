//! Stepper Common Library
//!
//! Shared constants, configuration loading, latched error codes, event
//! payloads and HAL capability traits for the stepper workspace crates.
//!
//! # Module Structure
//!
//! - [`consts`] - Capacities, timer defaults and configuration bounds
//! - [`types`] - Step, position and timer unit types
//! - [`config`] - Configuration loading traits and types
//! - [`motion`] - Stepper configuration, error codes and events
//! - [`hal`] - Hardware capability traits and unit conversion
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use stepper_common::prelude::*;
//!
//! let config = StepperConfig::with_axes(3, AxisConfig::default());
//! assert!(config.validate().is_ok());
//! ```

pub mod config;
pub mod consts;
pub mod hal;
pub mod motion;
pub mod prelude;
pub mod types;
