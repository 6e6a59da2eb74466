//! Simulation driver module.
//!
//! Software implementation of the stepper HAL capabilities for
//! development and testing without physical hardware.

mod config;
mod driver;
mod physics;
mod timer;

pub use config::{SimAxisConfig, SimulationConfig};
pub use driver::SimHal;
pub use physics::{AxisSimulator, ReferenceSwitch};
pub use timer::VirtualTimer;
