//! Scoped critical sections.
//!
//! Foreground code publishes queue indices and un-started ramp data
//! with the step interrupt masked. Regions nest: the guard restores
//! exactly the state it found.

use stepper_common::hal::driver::InterruptControl;

/// Interrupts stay masked while this guard lives.
#[must_use = "the region ends when the guard is dropped"]
pub struct CriticalRegion<'a, H: InterruptControl + ?Sized> {
    hal: &'a H,
    was_enabled: bool,
}

impl<'a, H: InterruptControl + ?Sized> CriticalRegion<'a, H> {
    /// Mask interrupts until the guard is dropped.
    #[inline]
    pub fn enter(hal: &'a H) -> Self {
        let was_enabled = hal.disable_interrupts();
        Self { hal, was_enabled }
    }

    /// True if this is the outermost region.
    #[inline]
    pub fn is_outermost(&self) -> bool {
        self.was_enabled
    }
}

impl<H: InterruptControl + ?Sized> Drop for CriticalRegion<'_, H> {
    #[inline]
    fn drop(&mut self) {
        self.hal.restore_interrupts(self.was_enabled);
    }
}

/// Run `f` with interrupts masked.
#[inline]
pub fn critical<H, R>(hal: &H, f: impl FnOnce() -> R) -> R
where
    H: InterruptControl + ?Sized,
{
    let _region = CriticalRegion::enter(hal);
    f()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct Mask {
        enabled: Cell<bool>,
        depth: Cell<u32>,
    }

    impl Mask {
        fn new() -> Self {
            Self {
                enabled: Cell::new(true),
                depth: Cell::new(0),
            }
        }
    }

    impl InterruptControl for Mask {
        fn disable_interrupts(&self) -> bool {
            self.depth.set(self.depth.get() + 1);
            self.enabled.replace(false)
        }
        fn restore_interrupts(&self, was_enabled: bool) {
            self.depth.set(self.depth.get() - 1);
            self.enabled.set(was_enabled);
        }
    }

    #[test]
    fn test_guard_restores_on_drop() {
        let mask = Mask::new();
        {
            let region = CriticalRegion::enter(&mask);
            assert!(region.is_outermost());
            assert!(!mask.enabled.get());
        }
        assert!(mask.enabled.get());
        assert_eq!(mask.depth.get(), 0);
    }

    #[test]
    fn test_nested_regions() {
        let mask = Mask::new();
        let outer = CriticalRegion::enter(&mask);
        {
            let inner = CriticalRegion::enter(&mask);
            assert!(!inner.is_outermost());
        }
        // Inner region must not re-enable interrupts.
        assert!(!mask.enabled.get());
        drop(outer);
        assert!(mask.enabled.get());
    }

    #[test]
    fn test_critical_returns_value() {
        let mask = Mask::new();
        let value = critical(&mask, || {
            assert!(!mask.enabled.get());
            42
        });
        assert_eq!(value, 42);
        assert!(mask.enabled.get());
    }
}
