//! Reference (homing) sensor addressing.
//!
//! Every axis owns two reference inputs, one at each end of travel.
//! The flat input id is `axis * 2` for the min end and `axis * 2 + 1`
//! for the max end.

use serde::{Deserialize, Serialize};
use static_assertions::const_assert_eq;

use crate::consts::{MAX_AXES, MAX_REFERENCES};
use crate::types::Axis;

/// End of travel a reference sensor sits at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum ReferenceEnd {
    /// Sensor at the lower travel limit.
    Min = 0,
    /// Sensor at the upper travel limit.
    Max = 1,
}

impl ReferenceEnd {
    /// Reference end for a search direction.
    #[inline]
    pub const fn from_toward_min(toward_min: bool) -> Self {
        if toward_min { Self::Min } else { Self::Max }
    }

    /// True when travelling toward this end decreases the position.
    #[inline]
    pub const fn is_min(&self) -> bool {
        matches!(self, Self::Min)
    }

    /// The opposite end.
    #[inline]
    pub const fn opposite(&self) -> Self {
        match self {
            Self::Min => Self::Max,
            Self::Max => Self::Min,
        }
    }
}

/// Flat reference input id of an axis end.
#[inline]
pub const fn reference_id(axis: Axis, end: ReferenceEnd) -> u8 {
    (axis * 2 + end as usize) as u8
}

/// Split a flat reference input id into axis and end.
///
/// Returns `None` for ids beyond the configured axis range.
#[inline]
pub const fn split_reference_id(id: u8) -> Option<(Axis, ReferenceEnd)> {
    let id = id as usize;
    if id >= MAX_REFERENCES {
        return None;
    }
    let end = if id % 2 == 0 { ReferenceEnd::Min } else { ReferenceEnd::Max };
    Some((id / 2, end))
}

const_assert_eq!(MAX_REFERENCES, MAX_AXES * 2);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_id_layout() {
        assert_eq!(reference_id(0, ReferenceEnd::Min), 0);
        assert_eq!(reference_id(0, ReferenceEnd::Max), 1);
        assert_eq!(reference_id(2, ReferenceEnd::Min), 4);
        assert_eq!(reference_id(2, ReferenceEnd::Max), 5);
    }

    #[test]
    fn test_split_reference_id() {
        assert_eq!(split_reference_id(5), Some((2, ReferenceEnd::Max)));
        assert_eq!(split_reference_id(MAX_REFERENCES as u8), None);
        for axis in 0..MAX_AXES {
            for end in [ReferenceEnd::Min, ReferenceEnd::Max] {
                assert_eq!(split_reference_id(reference_id(axis, end)), Some((axis, end)));
            }
        }
    }

    #[test]
    fn test_direction_helpers() {
        assert_eq!(ReferenceEnd::from_toward_min(true), ReferenceEnd::Min);
        assert_eq!(ReferenceEnd::Min.opposite(), ReferenceEnd::Max);
        assert!(!ReferenceEnd::Max.is_min());
    }
}
