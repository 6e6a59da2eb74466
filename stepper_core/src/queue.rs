//! Fixed-capacity movement ring buffer.
//!
//! Single producer (foreground API, advances the tail by enqueueing)
//! and single consumer (timer interrupt, advances the head). The caller
//! publishes index changes inside a critical section. Full is
//! back-pressure, not an error.

use stepper_common::consts::MOVEMENT_BUFFER_SIZE;

use crate::movement::Movement;

/// Ring buffer of queued movements.
#[derive(Debug, Clone)]
pub struct MovementQueue {
    /// Slots, reused once consumed
    slots: [Option<Movement>; MOVEMENT_BUFFER_SIZE],
    /// Index of the oldest entry
    head: usize,
    /// Number of queued entries
    count: usize,
}

impl Default for MovementQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl MovementQueue {
    /// Queue capacity.
    pub const CAPACITY: usize = MOVEMENT_BUFFER_SIZE;

    /// Empty queue.
    pub const fn new() -> Self {
        Self {
            slots: [None; MOVEMENT_BUFFER_SIZE],
            head: 0,
            count: 0,
        }
    }

    /// Append an entry at the tail. Returns `false` if the queue is full.
    pub fn try_enqueue(&mut self, movement: Movement) -> bool {
        if self.is_full() {
            return false;
        }
        let tail = self.tail();
        self.slots[tail] = Some(movement);
        self.count += 1;
        true
    }

    /// Remove the head entry (consumer only).
    pub fn dequeue(&mut self) -> Option<Movement> {
        if self.count == 0 {
            return None;
        }
        let movement = self.slots[self.head].take();
        self.head = Self::wrap(self.head + 1);
        self.count -= 1;
        movement
    }

    /// Entry `offset` positions behind the head.
    #[inline]
    pub fn peek(&self, offset: usize) -> Option<&Movement> {
        if offset >= self.count {
            return None;
        }
        self.slots[Self::wrap(self.head + offset)].as_ref()
    }

    /// Mutable entry `offset` positions behind the head.
    #[inline]
    pub fn peek_mut(&mut self, offset: usize) -> Option<&mut Movement> {
        if offset >= self.count {
            return None;
        }
        self.slots[Self::wrap(self.head + offset)].as_mut()
    }

    /// Drop every entry behind the head.
    pub fn truncate_after_head(&mut self) {
        while self.count > 1 {
            let last = Self::wrap(self.head + self.count - 1);
            self.slots[last] = None;
            self.count -= 1;
        }
    }

    /// Drop everything.
    pub fn clear(&mut self) {
        self.slots = [None; MOVEMENT_BUFFER_SIZE];
        self.head = 0;
        self.count = 0;
    }

    /// Iterate from head to tail.
    pub fn iter(&self) -> impl Iterator<Item = &Movement> + '_ {
        (0..self.count).filter_map(move |offset| self.peek(offset))
    }

    /// Slot index of the head.
    #[inline]
    pub fn head(&self) -> usize {
        self.head
    }

    /// Slot index the next entry is written to.
    #[inline]
    pub fn tail(&self) -> usize {
        Self::wrap(self.head + self.count)
    }

    /// Number of queued entries.
    #[inline]
    pub fn count(&self) -> usize {
        self.count
    }

    /// True if nothing is queued.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// True if no more entries fit.
    #[inline]
    pub fn is_full(&self) -> bool {
        self.count == MOVEMENT_BUFFER_SIZE
    }

    /// Free slots.
    #[inline]
    pub fn free(&self) -> usize {
        MOVEMENT_BUFFER_SIZE - self.count
    }

    #[inline]
    const fn wrap(index: usize) -> usize {
        index % MOVEMENT_BUFFER_SIZE
    }
}
