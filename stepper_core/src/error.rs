//! Errors returned by foreground stepper operations.
//!
//! The interrupt path never returns these; it latches an [`ErrorCode`]
//! and raises an error event instead.

use stepper_common::config::ConfigError;
use stepper_common::motion::error::ErrorCode;
use stepper_common::motion::reference::ReferenceEnd;
use stepper_common::types::Axis;
use thiserror::Error;

/// Error returned by `Stepper` operations.
#[derive(Debug, Clone, Error)]
pub enum StepperError {
    /// Target outside the axis travel limits.
    #[error("axis {axis}: target {target} outside [{min}, {max}]")]
    OutOfRange {
        /// Offending axis.
        axis: Axis,
        /// Requested target [steps].
        target: i64,
        /// Lower limit [steps].
        min: u32,
        /// Upper limit [steps].
        max: u32,
    },

    /// Axis index beyond the configured axes.
    #[error("invalid axis {0}")]
    InvalidAxis(Axis),

    /// Emergency stop latched; resurrect first.
    #[error("emergency stop active")]
    EmergencyStop,

    /// A fatal error is latched; clear it first.
    #[error("fatal error latched: {0}")]
    Fatal(ErrorCode),

    /// Paused with a full queue; the request cannot be queued.
    #[error("paused with a full movement queue")]
    Paused,

    /// No sensor configured at the requested end.
    #[error("axis {axis}: no reference sensor at the {end:?} end")]
    ReferenceNotConfigured {
        /// Axis searched.
        axis: Axis,
        /// End searched.
        end: ReferenceEnd,
    },

    /// Search travelled the full axis length without a hit.
    #[error("axis {0}: reference not found")]
    ReferenceNotFound(Axis),

    /// Sensor still asserted after moving off it.
    #[error("axis {0}: reference sensor still active after retract")]
    ReferenceStillActive(Axis),

    /// Requested speed converts to zero.
    #[error("speed too low")]
    SpeedTooLow,

    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl StepperError {
    /// Latched code matching this error, if any.
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::OutOfRange { .. } => Some(ErrorCode::PositionOutOfRange),
            Self::InvalidAxis(_) => Some(ErrorCode::InvalidAxis),
            Self::EmergencyStop => Some(ErrorCode::EmergencyStop),
            Self::Fatal(code) => Some(*code),
            Self::ReferenceNotConfigured { .. } => Some(ErrorCode::ReferenceNotConfigured),
            Self::ReferenceNotFound(_) => Some(ErrorCode::ReferenceNotFound),
            Self::ReferenceStillActive(_) => Some(ErrorCode::ReferenceStillActive),
            Self::SpeedTooLow => Some(ErrorCode::SpeedTooLow),
            Self::Paused | Self::Config(_) => None,
        }
    }
}

/// Result alias for stepper operations.
pub type StepperResult<T> = Result<T, StepperError>;
