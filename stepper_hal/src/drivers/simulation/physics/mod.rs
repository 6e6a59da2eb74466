//! Physics simulation module.
//!
//! Step/dir driven axis positions and position-triggered reference
//! switches.

mod axis;
mod referencing;

pub use axis::AxisSimulator;
pub use referencing::ReferenceSwitch;
