//! Latched error codes of the stepper core.
//!
//! The interrupt path never returns errors. It stores one of these codes
//! in the recoverable or fatal error slot and raises an error event.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error code stored in the recoverable or fatal error slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Error)]
#[repr(u8)]
pub enum ErrorCode {
    /// Requested target lies outside the axis travel limits.
    #[error("position out of range")]
    PositionOutOfRange = 1,
    /// Axis index beyond the configured axis count.
    #[error("invalid axis")]
    InvalidAxis = 2,
    /// Reference sensor not configured for the requested end.
    #[error("reference sensor not configured")]
    ReferenceNotConfigured = 3,
    /// Reference search travelled the full axis length without a hit.
    #[error("reference not found")]
    ReferenceNotFound = 4,
    /// Reference sensor still asserted after retracting.
    #[error("reference sensor still active after retract")]
    ReferenceStillActive = 5,
    /// A reference sensor triggered during a normal move.
    #[error("reference sensor hit during move")]
    ReferenceHitDuringMove = 6,
    /// Emergency stop latched.
    #[error("emergency stop")]
    EmergencyStop = 7,
    /// Requested speed is zero after conversion.
    #[error("speed too low")]
    SpeedTooLow = 8,
}

impl ErrorCode {
    /// Decode a stored code.
    #[inline]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::PositionOutOfRange),
            2 => Some(Self::InvalidAxis),
            3 => Some(Self::ReferenceNotConfigured),
            4 => Some(Self::ReferenceNotFound),
            5 => Some(Self::ReferenceStillActive),
            6 => Some(Self::ReferenceHitDuringMove),
            7 => Some(Self::EmergencyStop),
            8 => Some(Self::SpeedTooLow),
            _ => None,
        }
    }

    /// Returns true for codes that are always latched as fatal.
    #[inline]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::ReferenceHitDuringMove | Self::EmergencyStop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_roundtrip() {
        for code in 1..=8u8 {
            let decoded = ErrorCode::from_u8(code).unwrap();
            assert_eq!(decoded as u8, code);
        }
        assert_eq!(ErrorCode::from_u8(0), None);
        assert_eq!(ErrorCode::from_u8(9), None);
    }

    #[test]
    fn test_error_code_display() {
        assert_eq!(ErrorCode::ReferenceNotFound.to_string(), "reference not found");
        assert!(ErrorCode::ReferenceHitDuringMove.is_fatal());
        assert!(!ErrorCode::ReferenceNotFound.is_fatal());
    }
}
