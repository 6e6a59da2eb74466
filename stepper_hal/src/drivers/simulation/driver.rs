//! Simulation driver implementation.
//!
//! `SimHal` implements every stepper HAL capability in software: a
//! virtual one-shot timer, step/dir outputs feeding axis simulators,
//! position-triggered reference switches and interrupt-mask
//! bookkeeping. The foreground dispatches timer expiries itself through
//! `wait_for_timer`, which makes runs deterministic.

use std::cell::Cell;

use stepper_common::consts::{MAX_AXES, MAX_REFERENCES, REFERENCE_NOT_USED};
use stepper_common::hal::driver::{
    HalError, InterruptControl, ReferenceInput, StepOutput, StepTimer,
};
use stepper_common::hal::types::{Direction, StepPulses};
use stepper_common::motion::config::StepperConfig;
use stepper_common::motion::reference::{ReferenceEnd, reference_id, split_reference_id};
use stepper_common::types::{Axis, Timer};
use tracing::debug;

use super::config::SimulationConfig;
use super::physics::{AxisSimulator, ReferenceSwitch};
use super::timer::VirtualTimer;

/// Software HAL for host builds and tests.
pub struct SimHal {
    /// Virtual step timer
    timer: VirtualTimer,
    /// One simulator per axis slot
    axes: [AxisSimulator; MAX_AXES],
    /// Reference switches by input id
    switches: [Option<ReferenceSwitch>; MAX_REFERENCES],
    /// Forced input values overriding the switch model
    forced: [Option<u8>; MAX_REFERENCES],
    /// Wait-cancel input level
    wait_cancel: bool,
    /// Interrupt enable flag
    interrupts_enabled: Cell<bool>,
    /// Current critical section nesting depth
    mask_depth: Cell<u32>,
    /// Deepest nesting seen
    max_mask_depth: Cell<u32>,
    /// Number of outermost critical sections entered
    critical_sections: Cell<u64>,
    /// Number of `step` calls
    step_calls: u64,
    /// Largest pulse count of a single axis in one `step` call
    max_pulses_per_call: u8,
}

impl SimHal {
    /// Create a driver with all axes at zero and no reference switches.
    pub fn with_frequency(frequency: u32) -> Self {
        Self {
            timer: VirtualTimer::new(frequency.max(1), false),
            axes: std::array::from_fn(|_| AxisSimulator::new(0)),
            switches: [None; MAX_REFERENCES],
            forced: [None; MAX_REFERENCES],
            wait_cancel: false,
            interrupts_enabled: Cell::new(true),
            mask_depth: Cell::new(0),
            max_mask_depth: Cell::new(0),
            critical_sections: Cell::new(0),
            step_calls: 0,
            max_pulses_per_call: 0,
        }
    }

    /// Create a driver matching a stepper configuration.
    ///
    /// Every configured reference sensor gets a switch at the axis
    /// travel limit unless the simulation config places it elsewhere.
    ///
    /// # Errors
    ///
    /// Returns `HalError::ConfigError` if the simulation describes more
    /// axes than the stepper configuration.
    pub fn new(config: &StepperConfig, sim: &SimulationConfig) -> Result<Self, HalError> {
        if config.timer_frequency == 0 {
            return Err(HalError::InitFailed("timer frequency is zero".to_string()));
        }
        if config.axes.len() > MAX_AXES {
            return Err(HalError::ConfigError(format!(
                "{} axes configured, driver supports {}",
                config.axes.len(),
                MAX_AXES
            )));
        }
        if sim.axes.len() > config.axes.len() {
            return Err(HalError::ConfigError(format!(
                "simulation describes {} axes, stepper has {}",
                sim.axes.len(),
                config.axes.len()
            )));
        }

        let mut hal = Self::with_frequency(config.timer_frequency);
        hal.timer = VirtualTimer::new(config.timer_frequency, sim.record_intervals);

        for (axis, axis_config) in config.axes.iter().enumerate() {
            let setup = sim.axes.get(axis).cloned().unwrap_or_default();
            hal.axes[axis].set_position(setup.start_position);

            let reference = &axis_config.reference;
            if let Some(hit) = reference.min_hit {
                let at = setup.min_switch.unwrap_or(i64::from(axis_config.limit_min));
                hal.add_reference_switch(axis, ReferenceSwitch::new(ReferenceEnd::Min, at, hit))?;
            }
            if let Some(hit) = reference.max_hit {
                let at = setup.max_switch.unwrap_or(i64::from(axis_config.limit_max));
                hal.add_reference_switch(axis, ReferenceSwitch::new(ReferenceEnd::Max, at, hit))?;
            }
            debug!(
                axis,
                name = %axis_config.name,
                start = setup.start_position,
                "Simulated axis ready"
            );
        }
        Ok(hal)
    }

    /// Fit a reference switch on an axis.
    ///
    /// # Errors
    ///
    /// Returns `HalError::InvalidAxis` for an axis beyond the driver range.
    pub fn add_reference_switch(
        &mut self,
        axis: Axis,
        switch: ReferenceSwitch,
    ) -> Result<(), HalError> {
        if axis >= MAX_AXES {
            return Err(HalError::InvalidAxis(axis));
        }
        self.switches[usize::from(reference_id(axis, switch.end()))] = Some(switch);
        Ok(())
    }

    /// Override a reference input with a fixed value, or release it with `None`.
    ///
    /// # Errors
    ///
    /// Returns `HalError::InvalidReference` for an id beyond the driver range.
    pub fn force_reference(&mut self, id: u8, value: Option<u8>) -> Result<(), HalError> {
        let slot = self
            .forced
            .get_mut(usize::from(id))
            .ok_or(HalError::InvalidReference(id))?;
        *slot = value;
        Ok(())
    }

    /// Drive the wait-cancel input.
    pub fn set_wait_cancel(&mut self, asserted: bool) {
        self.wait_cancel = asserted;
    }

    /// Place an axis physically.
    pub fn set_physical_position(&mut self, axis: Axis, position: i64) {
        if let Some(sim) = self.axes.get_mut(axis) {
            sim.set_position(position);
        }
    }

    /// Advance the clock without a timer expiry.
    pub fn advance_millis(&mut self, millis: u32) {
        self.timer.advance_millis(millis);
    }

    /// Axis simulator of an axis.
    ///
    /// # Panics
    ///
    /// Panics if `axis >= MAX_AXES`.
    pub fn axis(&self, axis: Axis) -> &AxisSimulator {
        &self.axes[axis]
    }

    /// Physical position of an axis.
    pub fn physical_position(&self, axis: Axis) -> i64 {
        self.axes.get(axis).map_or(0, AxisSimulator::position)
    }

    /// Total pulses emitted on an axis.
    pub fn pulses(&self, axis: Axis) -> u64 {
        self.axes.get(axis).map_or(0, AxisSimulator::pulses)
    }

    /// Virtual timer state.
    pub fn timer(&self) -> &VirtualTimer {
        &self.timer
    }

    /// Drop recorded intervals.
    pub fn clear_intervals(&mut self) {
        self.timer.clear_intervals();
    }

    /// Ticks elapsed on the virtual clock.
    pub fn now_ticks(&self) -> u64 {
        self.timer.now()
    }

    /// True while the step timer is armed.
    pub fn timer_running(&self) -> bool {
        self.timer.is_running()
    }

    /// True unless inside a critical section.
    pub fn interrupts_enabled(&self) -> bool {
        self.interrupts_enabled.get()
    }

    /// Deepest critical section nesting seen.
    pub fn max_mask_depth(&self) -> u32 {
        self.max_mask_depth.get()
    }

    /// Number of outermost critical sections entered.
    pub fn critical_sections(&self) -> u64 {
        self.critical_sections.get()
    }

    /// Number of `step` calls.
    pub fn step_calls(&self) -> u64 {
        self.step_calls
    }

    /// Largest pulse count of a single axis in one `step` call.
    pub fn max_pulses_per_call(&self) -> u8 {
        self.max_pulses_per_call
    }
}

impl StepTimer for SimHal {
    fn start_timer(&mut self, ticks: Timer) {
        self.timer.start(ticks);
    }

    fn stop_timer(&mut self) {
        self.timer.stop();
    }

    fn wait_for_timer(&mut self) -> bool {
        self.timer.wait()
    }

    fn millis(&self) -> u32 {
        self.timer.millis()
    }
}

impl InterruptControl for SimHal {
    fn disable_interrupts(&self) -> bool {
        let was_enabled = self.interrupts_enabled.replace(false);
        let depth = self.mask_depth.get() + 1;
        self.mask_depth.set(depth);
        self.max_mask_depth.set(self.max_mask_depth.get().max(depth));
        if was_enabled {
            self.critical_sections.set(self.critical_sections.get() + 1);
        }
        was_enabled
    }

    fn restore_interrupts(&self, was_enabled: bool) {
        self.mask_depth.set(self.mask_depth.get().saturating_sub(1));
        self.interrupts_enabled.set(was_enabled);
    }
}

impl StepOutput for SimHal {
    fn set_direction(&mut self, axis: Axis, direction: Direction) {
        if let Some(sim) = self.axes.get_mut(axis) {
            sim.set_direction(direction);
        }
    }

    fn step(&mut self, steps: &StepPulses) {
        self.step_calls += 1;
        for (sim, &count) in self.axes.iter_mut().zip(steps.iter()) {
            sim.apply_pulses(count);
            self.max_pulses_per_call = self.max_pulses_per_call.max(count);
        }
    }

    fn set_enable(&mut self, axis: Axis, level: u8, force: bool) {
        if let Some(sim) = self.axes.get_mut(axis) {
            if force || sim.enable_level() != level {
                sim.set_enable_level(level);
            }
        }
    }

    fn enable_level(&self, axis: Axis) -> u8 {
        self.axes.get(axis).map_or(0, AxisSimulator::enable_level)
    }
}

impl ReferenceInput for SimHal {
    fn reference_value(&self, id: u8) -> u8 {
        let slot = usize::from(id);
        if let Some(Some(value)) = self.forced.get(slot) {
            return *value;
        }
        let Some((axis, _)) = split_reference_id(id) else {
            return REFERENCE_NOT_USED;
        };
        match self.switches[slot] {
            Some(switch) => switch.value(self.axes[axis].position()),
            None => REFERENCE_NOT_USED,
        }
    }

    fn wait_cancel_requested(&self) -> bool {
        self.wait_cancel
    }
}
