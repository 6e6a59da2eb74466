//! Virtual one-shot step timer.
//!
//! Time only advances when the foreground waits: an armed timer jumps
//! the clock to its expiry, an idle wait advances one millisecond.

use stepper_common::types::Timer;

/// Simulated one-shot timer and clock.
#[derive(Debug, Clone)]
pub struct VirtualTimer {
    /// Tick frequency [ticks/s]
    frequency: u32,
    /// Ticks elapsed since creation
    now: u64,
    /// Armed interval, if any
    pending: Option<Timer>,
    /// Number of expiries delivered
    expiries: u64,
    /// Log of expired intervals (only if recording)
    intervals: Option<Vec<Timer>>,
}

impl VirtualTimer {
    /// Create a stopped timer.
    pub fn new(frequency: u32, record: bool) -> Self {
        Self {
            frequency,
            now: 0,
            pending: None,
            expiries: 0,
            intervals: record.then(Vec::new),
        }
    }

    /// Arm the timer, replacing any pending expiry.
    #[inline]
    pub fn start(&mut self, ticks: Timer) {
        self.pending = Some(ticks);
    }

    /// Disarm the timer.
    #[inline]
    pub fn stop(&mut self) {
        self.pending = None;
    }

    /// True while an expiry is pending.
    #[inline]
    pub fn is_running(&self) -> bool {
        self.pending.is_some()
    }

    /// Deliver the pending expiry, or idle for one millisecond.
    ///
    /// Returns `true` if an expiry was delivered.
    pub fn wait(&mut self) -> bool {
        match self.pending.take() {
            Some(ticks) => {
                self.now += u64::from(ticks);
                self.expiries += 1;
                if let Some(log) = &mut self.intervals {
                    log.push(ticks);
                }
                true
            }
            None => {
                self.now += u64::from(self.ticks_per_milli());
                false
            }
        }
    }

    /// Advance the clock without delivering an expiry.
    pub fn advance_millis(&mut self, millis: u32) {
        self.now += u64::from(millis) * u64::from(self.ticks_per_milli());
    }

    /// Wrapping millisecond clock.
    #[inline]
    pub fn millis(&self) -> u32 {
        (self.now * 1000 / u64::from(self.frequency)) as u32
    }

    /// Ticks elapsed since creation.
    #[inline]
    pub fn now(&self) -> u64 {
        self.now
    }

    /// Tick frequency.
    #[inline]
    pub fn frequency(&self) -> u32 {
        self.frequency
    }

    /// Number of expiries delivered.
    #[inline]
    pub fn expiries(&self) -> u64 {
        self.expiries
    }

    /// Expired intervals, if recording is on.
    pub fn intervals(&self) -> Option<&[Timer]> {
        self.intervals.as_deref()
    }

    /// Drop recorded intervals.
    pub fn clear_intervals(&mut self) {
        if let Some(log) = &mut self.intervals {
            log.clear();
        }
    }

    #[inline]
    fn ticks_per_milli(&self) -> u32 {
        (self.frequency / 1000).max(1)
    }
}
