//! Event notifications raised by the stepper core.
//!
//! One handler can be registered per [`EventKind`]. Handlers run
//! synchronously, partly from interrupt context, and must not block.

use serde::Serialize;

use super::error::ErrorCode;
use crate::types::Axis;

/// Event category, one handler slot each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u8)]
pub enum EventKind {
    /// Timer started on an idle queue.
    Start = 0,
    /// Queue drained, timer stopped.
    Idle = 1,
    /// Axis driver disabled after the enable timeout.
    Disable = 2,
    /// Foreground is waiting (back-pressure or busy wait).
    Wait = 3,
    /// An error code was latched.
    Error = 4,
    /// Non-fatal warning.
    Warning = 5,
    /// Informational message.
    Info = 6,
    /// An I/O entry reached the head of the queue.
    Io = 7,
}

impl EventKind {
    /// Number of event categories.
    pub const COUNT: usize = 8;

    /// All categories in handler-table order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::Start,
        Self::Idle,
        Self::Disable,
        Self::Wait,
        Self::Error,
        Self::Warning,
        Self::Info,
        Self::Io,
    ];

    /// Handler-table index.
    #[inline]
    pub const fn index(&self) -> usize {
        *self as usize
    }
}

/// Why the foreground is waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WaitReason {
    /// Movement queue is full.
    MovementQueueFull,
    /// Waiting for all queued movements to finish.
    WaitBusy,
    /// Waiting for a reference search movement.
    WaitReference,
}

/// Event payload passed to the registered handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StepperEvent {
    /// Timer started.
    Start,
    /// Queue drained.
    Idle,
    /// Axis disabled after being idle for its enable timeout.
    Disable {
        /// Disabled axis.
        axis: Axis,
    },
    /// Foreground wait iteration.
    Wait(WaitReason),
    /// Error code latched (recoverable or fatal).
    Error(ErrorCode),
    /// Warning message.
    Warning(&'static str),
    /// Info message.
    Info(&'static str),
    /// I/O entry executed in queue order.
    Io {
        /// Tool or output id.
        tool: u8,
        /// Requested level.
        level: u16,
    },
}

impl StepperEvent {
    /// Category of this event.
    #[inline]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::Start => EventKind::Start,
            Self::Idle => EventKind::Idle,
            Self::Disable { .. } => EventKind::Disable,
            Self::Wait(_) => EventKind::Wait,
            Self::Error(_) => EventKind::Error,
            Self::Warning(_) => EventKind::Warning,
            Self::Info(_) => EventKind::Info,
            Self::Io { .. } => EventKind::Io,
        }
    }
}
