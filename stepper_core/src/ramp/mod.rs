//! Speed profiles and look-ahead planning.
//!
//! - [`math`] - Fixed-point ramp curves and integer square roots
//! - [`profile`] - Trapezoidal / triangular profile of one segment
//! - [`junction`] - Jerk-limited junction speeds
//! - [`planner`] - Segment construction and queue re-optimization

pub mod junction;
pub mod math;
pub mod planner;
pub mod profile;

pub use math::RampCurve;
pub use planner::{PlanScope, RampPlanner};
pub use profile::Ramp;
