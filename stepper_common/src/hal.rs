//! Hardware abstraction layer seam.
//!
//! The stepper core consumes hardware only through the capability
//! traits in [`driver`]. Unit conversion lives in [`units`].

pub mod driver;
pub mod types;
pub mod units;
