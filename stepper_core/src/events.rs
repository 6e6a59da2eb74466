//! Event handler table.
//!
//! One handler per [`EventKind`]. Handlers are called synchronously,
//! partly from the interrupt handler, and must not block.

use std::fmt;

use stepper_common::motion::event::{EventKind, StepperEvent};

/// Registered event callback.
pub type EventHandler = Box<dyn FnMut(&StepperEvent)>;

/// Handlers indexed by event kind.
#[derive(Default)]
pub struct EventHandlers {
    handlers: [Option<EventHandler>; EventKind::COUNT],
}

impl EventHandlers {
    /// Register `handler` for `kind`, returning the previous one.
    pub fn subscribe(&mut self, kind: EventKind, handler: EventHandler) -> Option<EventHandler> {
        self.handlers[kind.index()].replace(handler)
    }

    /// Remove the handler for `kind`.
    pub fn unsubscribe(&mut self, kind: EventKind) -> Option<EventHandler> {
        self.handlers[kind.index()].take()
    }

    /// True if a handler is registered for `kind`.
    #[inline]
    pub fn is_subscribed(&self, kind: EventKind) -> bool {
        self.handlers[kind.index()].is_some()
    }

    /// Call the handler of the event's kind, if any.
    #[inline]
    pub fn emit(&mut self, event: &StepperEvent) {
        if let Some(handler) = &mut self.handlers[event.kind().index()] {
            handler(event);
        }
    }
}

impl fmt::Debug for EventHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(
                EventKind::ALL
                    .iter()
                    .filter(|kind| self.is_subscribed(**kind)),
            )
            .finish()
    }
}
