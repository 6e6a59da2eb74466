//! Motion core shared types.
//!
//! Configuration, latched error codes, event payloads and reference
//! sensor addressing used by the stepper core and the simulation driver.

pub mod config;
pub mod error;
pub mod event;
pub mod reference;
