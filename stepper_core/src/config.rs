//! Configuration loading and conversion into timer units.
//!
//! The TOML file is parsed into [`StepperConfig`] once at startup,
//! validated, and converted into the per-axis [`AxisLimits`] table and
//! the global [`MotionSettings`] the planner and interrupt handler read.

use std::path::Path;

use stepper_common::config::{ConfigError, ConfigLoader};
use stepper_common::consts::{MAX_AXES, REFERENCE_NOT_USED};
use stepper_common::motion::config::{AxisConfig, StepperConfig};
use stepper_common::motion::reference::ReferenceEnd;
use stepper_common::types::{Position, StepRate, Steps, Timer, speed_to_timer};
use tracing::info;

// ─── Loading ────────────────────────────────────────────────────────

/// Load and validate a stepper configuration file.
///
/// # Errors
///
/// Returns `ConfigError` if the file is missing, malformed or out of bounds.
pub fn load_config(path: &Path) -> Result<StepperConfig, ConfigError> {
    let config = StepperConfig::load(path)?;
    config.validate()?;
    info!(
        "Loaded config from {}: {} axes, timer {} Hz",
        path.display(),
        config.num_axes(),
        config.timer_frequency
    );
    Ok(config)
}

// ─── Axis Limits ────────────────────────────────────────────────────

/// Per-axis limits in step and timer units.
///
/// Immutable while the stepper runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisLimits {
    /// Maximum speed [steps/s].
    pub max_speed: StepRate,
    /// Timer of the maximum speed.
    pub timer_max: Timer,
    /// Acceleration [steps/s²].
    pub acceleration: u32,
    /// Deceleration [steps/s²].
    pub deceleration: u32,
    /// Speed change allowed at a junction without ramping [steps/s].
    pub jerk_speed: StepRate,
    /// Backlash compensation distance [steps].
    pub backlash: Steps,
    /// Lower travel limit [steps].
    pub limit_min: Position,
    /// Upper travel limit [steps].
    pub limit_max: Position,
    /// Enable timeout [s]. Zero keeps the driver enabled.
    pub enable_timeout: u8,
    /// Invert the direction output.
    pub invert_direction: bool,
    /// Hit value of the min and max reference sensor
    /// (`REFERENCE_NOT_USED` if absent).
    pub reference_hit: [u8; 2],
    /// Retract distance after a reference hit [steps].
    pub retract: Steps,
    /// Sensor debounce time [ticks].
    pub stable_ticks: u32,
}

impl Default for AxisLimits {
    fn default() -> Self {
        Self::from_config(
            stepper_common::consts::TIMER_FREQUENCY_DEFAULT,
            &AxisConfig::default(),
        )
    }
}

impl AxisLimits {
    /// Convert one axis configuration for timer `frequency`.
    pub fn from_config(frequency: u32, axis: &AxisConfig) -> Self {
        let hit = |end| {
            axis.reference
                .hit_value(end)
                .unwrap_or(REFERENCE_NOT_USED)
        };
        let stable_ticks =
            u64::from(axis.reference.stable_time_ms) * u64::from(frequency) / 1000;
        Self {
            max_speed: axis.max_speed,
            timer_max: speed_to_timer(frequency, axis.max_speed),
            acceleration: axis.acceleration,
            deceleration: axis.deceleration,
            jerk_speed: axis.jerk_speed,
            backlash: axis.backlash,
            limit_min: axis.limit_min,
            limit_max: axis.limit_max,
            enable_timeout: axis.enable_timeout,
            invert_direction: axis.invert_direction,
            reference_hit: [hit(ReferenceEnd::Min), hit(ReferenceEnd::Max)],
            retract: axis.reference.retract,
            stable_ticks: u32::try_from(stable_ticks).unwrap_or(u32::MAX),
        }
    }

    /// Hit value of a reference sensor, `None` if it is not fitted.
    #[inline]
    pub fn reference_hit(&self, end: ReferenceEnd) -> Option<u8> {
        let value = self.reference_hit[end as usize];
        (value != REFERENCE_NOT_USED).then_some(value)
    }

    /// Travel between the limits [steps].
    #[inline]
    pub fn travel(&self) -> u32 {
        self.limit_max - self.limit_min
    }
}

/// Convert every configured axis. Unused slots keep defaults.
pub fn build_limits(config: &StepperConfig) -> [AxisLimits; MAX_AXES] {
    let mut limits = [AxisLimits::default(); MAX_AXES];
    for (slot, axis) in limits.iter_mut().zip(&config.axes) {
        *slot = AxisLimits::from_config(config.timer_frequency, axis);
    }
    limits
}

// ─── Motion Settings ────────────────────────────────────────────────

/// Global settings in timer units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotionSettings {
    /// Step timer frequency [ticks/s].
    pub frequency: u32,
    /// Shortest interrupt interval [ticks].
    pub min_interrupt_interval: u32,
    /// Timer used when a move gives no speed.
    pub timer_max_default: Timer,
    /// Timer of backlash compensation moves.
    pub timer_backlash: Timer,
    /// Abort on a reference hit during a normal move.
    pub check_reference: bool,
    /// Block move requests until the queue drained.
    pub wait_finish_move: bool,
    /// Execute conditional waits.
    pub wait_conditional: bool,
    /// Reject targets outside the travel limits.
    pub limit_check: bool,
    /// Enable level applied after an enable timeout.
    pub idle_level: u8,
    /// Initial speed override (128 = 100%).
    pub speed_override: u8,
}

impl MotionSettings {
    /// Convert the global part of a configuration.
    pub fn from_config(config: &StepperConfig) -> Self {
        let frequency = config.timer_frequency;
        Self {
            frequency,
            min_interrupt_interval: config.min_interrupt_interval,
            timer_max_default: speed_to_timer(frequency, config.default_max_speed),
            timer_backlash: speed_to_timer(frequency, config.backlash_speed),
            check_reference: config.check_reference,
            wait_finish_move: config.wait_finish_move,
            wait_conditional: config.wait_conditional,
            limit_check: config.limit_check,
            idle_level: config.idle_level,
            speed_override: config.speed_override,
        }
    }

    /// Timer of a requested speed, or of the default speed.
    #[inline]
    pub fn timer_for(&self, speed: Option<StepRate>) -> Timer {
        match speed {
            Some(speed) => speed_to_timer(self.frequency, speed),
            None => self.timer_max_default,
        }
    }
}
