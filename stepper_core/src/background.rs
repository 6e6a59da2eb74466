//! Foreground housekeeping.
//!
//! Called from every wait loop (and by applications from their main
//! loop): reacts to an emergency stop, restarts an idle timer when work
//! is queued, and disables drivers that stayed idle past their timeout.

use stepper_common::hal::driver::StepperHal;
use stepper_common::motion::event::StepperEvent;
use tracing::debug;

use crate::controller::Stepper;

impl<H: StepperHal> Stepper<H> {
    /// Run background work once.
    pub fn background(&mut self) {
        if self.emergency_stop {
            if !self.queue.is_empty() {
                self.abort_move();
            }
            return;
        }

        if !self.timer_running && !self.queue.is_empty() && !self.pause {
            self.start_movement();
        }

        if !self.timer_running {
            self.check_enable_timeout();
        }
    }

    fn check_enable_timeout(&mut self) {
        let idle = self
            .hal
            .millis()
            .wrapping_sub(self.counters.time_start_or_idle);
        let idle_level = self.settings.idle_level;

        for axis in 0..self.num_axes() {
            let timeout = self.enable_timeout[axis];
            if timeout == 0 || idle < u32::from(timeout) * 1000 {
                continue;
            }
            if self.hal.enable_level(axis) == idle_level {
                continue;
            }
            self.hal.set_enable(axis, idle_level, false);
            debug!("Axis {axis}: driver idle for {idle} ms, level {idle_level}");
            self.events.emit(&StepperEvent::Disable { axis });
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use stepper_common::consts::{LEVEL_MAX, LEVEL_OFF};
    use stepper_common::hal::driver::StepOutput;
    use stepper_common::motion::config::{AxisConfig, StepperConfig};
    use stepper_common::motion::event::EventKind;
    use stepper_hal::SimHal;

    use super::*;

    fn stepper(timeout: u8) -> Stepper<SimHal> {
        let axis = AxisConfig {
            enable_timeout: timeout,
            ..AxisConfig::default()
        };
        let config = StepperConfig::with_axes(2, axis);
        Stepper::new(SimHal::with_frequency(config.timer_frequency), &config).unwrap()
    }

    #[test]
    fn test_enable_timeout_disables_once() {
        let mut stepper = stepper(2);
        let disabled = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&disabled);
        stepper.subscribe(
            EventKind::Disable,
            Box::new(move |event| log.borrow_mut().push(*event)),
        );

        stepper.move_relative(&[100, 0], None).unwrap();
        stepper.wait_busy();
        assert_eq!(stepper.hal().enable_level(0), LEVEL_MAX);

        stepper.hal_mut().advance_millis(1_999);
        stepper.background();
        assert!(disabled.borrow().is_empty());

        stepper.hal_mut().advance_millis(1);
        stepper.background();
        stepper.background();
        assert_eq!(stepper.hal().enable_level(0), LEVEL_OFF);
        // Axis 1 never moved and is already at the idle level.
        assert_eq!(
            *disabled.borrow(),
            vec![StepperEvent::Disable { axis: 0 }]
        );
    }

    #[test]
    fn test_zero_timeout_keeps_driver_enabled() {
        let mut stepper = stepper(0);
        stepper.move_relative(&[100, 0], None).unwrap();
        stepper.wait_busy();
        stepper.hal_mut().advance_millis(600_000);
        stepper.background();
        assert_eq!(stepper.hal().enable_level(0), LEVEL_MAX);
    }

    #[test]
    fn test_background_restarts_idle_queue() {
        let mut stepper = stepper(0);
        stepper.pause_move();
        stepper.move_relative(&[100, 0], None).unwrap();
        assert!(!stepper.hal().timer_running());
        stepper.pause = false;
        stepper.background();
        assert!(stepper.hal().timer_running());
    }
}
