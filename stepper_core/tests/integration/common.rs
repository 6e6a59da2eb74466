//! Shared fixtures: machine configs, simulated steppers and an event log.

use std::cell::RefCell;
use std::rc::Rc;

use stepper_common::motion::config::{AxisConfig, StepperConfig};
use stepper_common::motion::event::{EventKind, StepperEvent};
use stepper_core::Stepper;
use stepper_core::dump::{DumpOptions, RampDump};
use stepper_hal::{SimAxisConfig, SimHal, SimulationConfig};

/// Run speed used by most tests [steps/s]; 100 ticks at 2 MHz.
pub const SPEED: u32 = 20_000;

/// Axis with 20k steps/s, 200k steps/s² and 1k steps/s jerk speed.
pub fn axis() -> AxisConfig {
    AxisConfig {
        max_speed: SPEED,
        acceleration: 200_000,
        deceleration: 200_000,
        jerk_speed: 1_000,
        limit_max: 1_000_000,
        ..AxisConfig::default()
    }
}

pub fn config(num_axes: usize) -> StepperConfig {
    let mut config = StepperConfig::with_axes(num_axes, axis());
    config.default_max_speed = SPEED;
    config
}

/// Stepper recording every timer interval.
pub fn stepper_with(config: &StepperConfig, axes: Vec<SimAxisConfig>) -> Stepper<SimHal> {
    let sim = SimulationConfig {
        record_intervals: true,
        axes,
    };
    let hal = SimHal::new(config, &sim).unwrap();
    Stepper::new(hal, config).unwrap()
}

pub fn stepper(num_axes: usize) -> Stepper<SimHal> {
    stepper_with(&config(num_axes), Vec::new())
}

/// Ramps of the queued moves, in queue order.
pub fn queued_ramps(stepper: &Stepper<SimHal>) -> Vec<RampDump> {
    let snapshot = stepper.dump(DumpOptions::MOVEMENTS | DumpOptions::DETAILS);
    snapshot
        .movements
        .unwrap()
        .iter()
        .filter_map(|m| m.ramp)
        .collect()
}

/// Dispatch until `done` holds, failing after `limit` iterations.
pub fn run_until(stepper: &mut Stepper<SimHal>, limit: usize, done: impl Fn(&Stepper<SimHal>) -> bool) {
    for _ in 0..limit {
        if done(stepper) {
            return;
        }
        stepper.dispatch();
    }
    panic!("condition not reached after {limit} dispatches");
}

/// Shared log of the events of the subscribed kinds.
#[derive(Clone, Default)]
pub struct EventLog(Rc<RefCell<Vec<StepperEvent>>>);

impl EventLog {
    pub fn attach(stepper: &mut Stepper<SimHal>, kinds: &[EventKind]) -> Self {
        let log = Self::default();
        for &kind in kinds {
            let sink = Rc::clone(&log.0);
            stepper.subscribe(kind, Box::new(move |event| sink.borrow_mut().push(*event)));
        }
        log
    }

    pub fn events(&self) -> Vec<StepperEvent> {
        self.0.borrow().clone()
    }

    pub fn count(&self, event: StepperEvent) -> usize {
        self.0.borrow().iter().filter(|&&e| e == event).count()
    }
}
