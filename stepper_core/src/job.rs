//! Scripted jobs for the simulator.
//!
//! A job file lists operations in engineering units:
//!
//! ```toml
//! [simulation]
//! record_intervals = true
//!
//! [[step]]
//! op = "reference"
//! axis = 0
//!
//! [[step]]
//! op = "move_relative"
//! distance = [10.0, -2.5]
//! speed = 50.0
//!
//! [[step]]
//! op = "io"
//! tool = 1
//! level = 255
//! ```
//!
//! Distances and speeds are converted with the axis `steps_per_unit`.

use serde::Deserialize;
use stepper_common::hal::driver::{StepTimer, StepperHal};
use stepper_common::hal::units::{LinearUnits, UnitConversion};
use stepper_common::types::{Axis, Distance, Position, StepRate};
use tracing::{debug, info};

use stepper_hal::SimulationConfig;

use crate::controller::Stepper;
use crate::dump::{DumpOptions, StepperSnapshot};
use crate::error::StepperResult;

/// Job file contents.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Job {
    /// Physical setup of the simulated machine.
    #[serde(default)]
    pub simulation: SimulationConfig,

    /// Operations in order.
    #[serde(default, rename = "step")]
    pub steps: Vec<JobStep>,
}

fn default_true() -> bool {
    true
}

/// One job operation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum JobStep {
    /// Relative linear move [units].
    MoveRelative {
        distance: Vec<f64>,
        #[serde(default)]
        speed: Option<f64>,
    },
    /// Absolute linear move [units].
    MoveAbsolute {
        position: Vec<f64>,
        #[serde(default)]
        speed: Option<f64>,
    },
    /// Timed wait [1/100 s].
    Wait { duration: u32 },
    /// Conditional wait [1/100 s].
    WaitConditional { duration: u32 },
    /// Ordered I/O request.
    Io { tool: u8, level: u16 },
    /// Reference search.
    Reference {
        axis: Axis,
        #[serde(default = "default_true")]
        toward_min: bool,
        #[serde(default)]
        speed: Option<f64>,
    },
    /// Redefine an axis position [units].
    SetPosition { axis: Axis, position: f64 },
    /// Block until the queue drained.
    WaitBusy,
    /// Let the simulated clock run while motion continues [ms].
    Run { millis: u32 },
    /// Decelerated stop; zero keeps each segment's deceleration.
    Stop {
        #[serde(default)]
        deceleration: u32,
    },
    /// Immediate halt.
    Abort,
    /// Pause at the next standstill point.
    Pause,
    /// Resume after a pause.
    Continue,
    /// Speed override [%].
    SpeedOverride { percent: u16 },
    /// Snapshot of the controller state.
    Dump,
}

/// Executes job steps against a controller.
#[derive(Debug, Clone)]
pub struct JobRunner {
    units: LinearUnits,
    dump: DumpOptions,
}

impl JobRunner {
    /// Runner converting with `units` and dumping `dump` parts.
    pub fn new(units: LinearUnits, dump: DumpOptions) -> Self {
        Self { units, dump }
    }

    /// Run every step, then wait until the motion finished.
    ///
    /// Returns the snapshots taken by `dump` steps followed by a final one.
    ///
    /// # Errors
    ///
    /// Stops at the first step the controller rejects.
    pub fn run<H: StepperHal>(
        &self,
        stepper: &mut Stepper<H>,
        steps: &[JobStep],
    ) -> StepperResult<Vec<StepperSnapshot>> {
        let mut snapshots = Vec::new();
        for (index, step) in steps.iter().enumerate() {
            debug!("Job step {index}: {step:?}");
            if let Some(snapshot) = self.execute(stepper, step)? {
                snapshots.push(snapshot);
            }
        }
        stepper.wait_busy();
        snapshots.push(stepper.dump(self.dump));
        info!(
            "Job finished: {} steps, {} reference steps executed",
            steps.len(),
            stepper.total_steps()
        );
        Ok(snapshots)
    }

    fn execute<H: StepperHal>(
        &self,
        stepper: &mut Stepper<H>,
        step: &JobStep,
    ) -> StepperResult<Option<StepperSnapshot>> {
        match step {
            JobStep::MoveRelative { distance, speed } => {
                let deltas: Vec<Distance> = distance
                    .iter()
                    .enumerate()
                    .map(|(axis, &d)| self.units.to_steps(axis, d))
                    .collect();
                let speed = self.speed(&deltas, *speed);
                stepper.move_relative(&deltas, speed)?;
            }
            JobStep::MoveAbsolute { position, speed } => {
                let targets: Vec<Position> = position
                    .iter()
                    .enumerate()
                    .map(|(axis, &p)| self.units.to_position(axis, p))
                    .collect();
                let deltas: Vec<Distance> = targets
                    .iter()
                    .take(stepper.num_axes())
                    .enumerate()
                    .map(|(axis, &t)| i64::from(t) - i64::from(stepper.position(axis)))
                    .collect();
                let speed = self.speed(&deltas, *speed);
                stepper.move_absolute(&targets, speed)?;
            }
            JobStep::Wait { duration } => stepper.wait(*duration)?,
            JobStep::WaitConditional { duration } => stepper.wait_conditional(*duration)?,
            JobStep::Io { tool, level } => stepper.io_control(*tool, *level)?,
            JobStep::Reference {
                axis,
                toward_min,
                speed,
            } => {
                let speed = speed.map(|s| self.rate(*axis, s));
                stepper.go_to_reference(*axis, speed, *toward_min)?;
            }
            JobStep::SetPosition { axis, position } => {
                stepper.set_position(*axis, self.units.to_position(*axis, *position))?;
            }
            JobStep::WaitBusy => stepper.wait_busy(),
            JobStep::Run { millis } => {
                let start = stepper.hal().millis();
                while stepper.hal().millis().wrapping_sub(start) < *millis {
                    stepper.dispatch();
                }
            }
            JobStep::Stop { deceleration } => stepper.stop_move(*deceleration),
            JobStep::Abort => stepper.abort_move(),
            JobStep::Pause => stepper.pause_move(),
            JobStep::Continue => stepper.continue_move(),
            JobStep::SpeedOverride { percent } => stepper.set_speed_override_percent(*percent),
            JobStep::Dump => return Ok(Some(stepper.dump(self.dump))),
        }
        Ok(None)
    }

    /// Speed of the longest axis in steps/s.
    fn speed(&self, deltas: &[Distance], speed: Option<f64>) -> Option<StepRate> {
        let speed = speed?;
        let axis = deltas
            .iter()
            .enumerate()
            .max_by_key(|(_, d)| d.unsigned_abs())
            .map_or(0, |(axis, _)| axis);
        Some(self.rate(axis, speed))
    }

    fn rate(&self, axis: Axis, speed: f64) -> StepRate {
        self.units
            .to_steps(axis, speed)
            .clamp(0, i64::from(StepRate::MAX)) as StepRate
    }
}
