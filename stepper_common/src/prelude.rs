//! Prelude module for common re-exports.
//!
//! ```rust
//! use stepper_common::prelude::*;
//! ```

// ─── Logging ────────────────────────────────────────────────────────
pub use crate::config::LogLevel;

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{ConfigError, ConfigLoader, SharedConfig};
pub use crate::motion::config::{AxisConfig, ReferenceConfig, StepperConfig};

// ─── System Constants ───────────────────────────────────────────────
pub use crate::consts::{MAX_AXES, MOVEMENT_BUFFER_SIZE, SPEED_OVERRIDE_100P};

// ─── Units ──────────────────────────────────────────────────────────
pub use crate::types::{Axis, Distance, Position, StepRate, Steps, TIMER_STOP, Timer};

// ─── Motion ─────────────────────────────────────────────────────────
pub use crate::motion::error::ErrorCode;
pub use crate::motion::event::{EventKind, StepperEvent, WaitReason};
pub use crate::motion::reference::{ReferenceEnd, reference_id};

// ─── HAL ────────────────────────────────────────────────────────────
pub use crate::hal::driver::{
    HalError, InterruptControl, ReferenceInput, StepOutput, StepTimer, StepperHal,
};
pub use crate::hal::types::{Direction, StepPulses};
pub use crate::hal::units::{LinearUnits, UnitConversion};
