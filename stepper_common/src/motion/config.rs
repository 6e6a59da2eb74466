//! Stepper configuration loaded from TOML.
//!
//! All speeds are in steps/s and accelerations in steps/s². The core
//! converts them once at init into timer units.
//!
//! ```toml
//! timer_frequency = 2000000
//! check_reference = true
//!
//! [shared]
//! service_name = "mill"
//!
//! [[axes]]
//! name = "X"
//! max_speed = 20000
//! acceleration = 60000
//! deceleration = 60000
//! jerk_speed = 1500
//! backlash = 12
//! limit_max = 80000
//!
//! [axes.reference]
//! min_hit = 0
//! retract = 200
//! ```

use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, SharedConfig};
use crate::consts::{
    ACCELERATION_DEFAULT, ACCELERATION_MAX, ACCELERATION_MIN, BACKLASH_SPEED_DEFAULT,
    DEFAULT_MAX_SPEED_DEFAULT, ENABLE_TIMEOUT_MAX, JERK_SPEED_DEFAULT, LEVEL_OFF, MAX_AXES,
    MAX_MOVEMENT_STEPS, MIN_INTERRUPT_INTERVAL_DEFAULT, REFERENCE_RETRACT_DEFAULT,
    REFERENCE_STABLE_TIME_MAX_MS, SPEED_MAX, SPEED_MIN, SPEED_OVERRIDE_100P, SPEED_OVERRIDE_MIN,
    TIMER_FREQUENCY_DEFAULT, TIMER_FREQUENCY_MAX, TIMER_FREQUENCY_MIN,
};

use super::reference::ReferenceEnd;

// ─── Top-Level Config ───────────────────────────────────────────────

/// Top-level stepper configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepperConfig {
    /// Common service fields.
    #[serde(default)]
    pub shared: SharedConfig,

    /// Step timer frequency [ticks/s].
    #[serde(default = "default_timer_frequency")]
    pub timer_frequency: u32,

    /// Shortest interrupt interval the handler can sustain [ticks].
    #[serde(default = "default_min_interrupt_interval")]
    pub min_interrupt_interval: u32,

    /// Speed used when a move gives none [steps/s].
    #[serde(default = "default_max_speed")]
    pub default_max_speed: u32,

    /// Speed of backlash compensation moves [steps/s].
    #[serde(default = "default_backlash_speed")]
    pub backlash_speed: u32,

    /// Initial speed override (128 = 100%).
    #[serde(default = "default_speed_override")]
    pub speed_override: u8,

    /// Abort with a fatal error if a reference sensor triggers during a normal move.
    #[serde(default)]
    pub check_reference: bool,

    /// Block every move request until the queue has drained.
    #[serde(default)]
    pub wait_finish_move: bool,

    /// Execute conditional waits (otherwise they are skipped).
    #[serde(default = "default_true")]
    pub wait_conditional: bool,

    /// Reject targets outside the axis travel limits.
    #[serde(default = "default_true")]
    pub limit_check: bool,

    /// Enable level applied when an axis is disabled after its timeout.
    #[serde(default)]
    pub idle_level: u8,

    /// Per-axis configuration, index = axis.
    pub axes: Vec<AxisConfig>,
}

fn default_timer_frequency() -> u32 {
    TIMER_FREQUENCY_DEFAULT
}
fn default_min_interrupt_interval() -> u32 {
    MIN_INTERRUPT_INTERVAL_DEFAULT
}
fn default_max_speed() -> u32 {
    DEFAULT_MAX_SPEED_DEFAULT
}
fn default_backlash_speed() -> u32 {
    BACKLASH_SPEED_DEFAULT
}
fn default_speed_override() -> u8 {
    SPEED_OVERRIDE_100P
}
fn default_true() -> bool {
    true
}

impl Default for StepperConfig {
    fn default() -> Self {
        Self {
            shared: SharedConfig::default(),
            timer_frequency: TIMER_FREQUENCY_DEFAULT,
            min_interrupt_interval: MIN_INTERRUPT_INTERVAL_DEFAULT,
            default_max_speed: DEFAULT_MAX_SPEED_DEFAULT,
            backlash_speed: BACKLASH_SPEED_DEFAULT,
            speed_override: SPEED_OVERRIDE_100P,
            check_reference: false,
            wait_finish_move: false,
            wait_conditional: true,
            limit_check: true,
            idle_level: LEVEL_OFF,
            axes: Vec::new(),
        }
    }
}

impl StepperConfig {
    /// Configuration with `count` identical axes, handy for tests and tools.
    pub fn with_axes(count: usize, axis: AxisConfig) -> Self {
        let axes = (0..count)
            .map(|i| AxisConfig {
                name: axis_name(i).to_string(),
                ..axis.clone()
            })
            .collect();
        Self {
            axes,
            ..Self::default()
        }
    }

    /// Number of configured axes.
    #[inline]
    pub fn num_axes(&self) -> usize {
        self.axes.len()
    }

    /// Validate parameter bounds.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;

        if self.axes.is_empty() || self.axes.len() > MAX_AXES {
            return Err(ConfigError::ValidationError(format!(
                "axis count {} out of range [1, {}]",
                self.axes.len(),
                MAX_AXES
            )));
        }
        if self.timer_frequency < TIMER_FREQUENCY_MIN || self.timer_frequency > TIMER_FREQUENCY_MAX
        {
            return Err(ConfigError::ValidationError(format!(
                "timer_frequency {} out of range [{}, {}]",
                self.timer_frequency, TIMER_FREQUENCY_MIN, TIMER_FREQUENCY_MAX
            )));
        }
        if self.min_interrupt_interval == 0 {
            return Err(ConfigError::ValidationError(
                "min_interrupt_interval must be > 0".to_string(),
            ));
        }
        check_speed("default_max_speed", self.default_max_speed)?;
        check_speed("backlash_speed", self.backlash_speed)?;
        if self.speed_override < SPEED_OVERRIDE_MIN {
            return Err(ConfigError::ValidationError(format!(
                "speed_override must be >= {SPEED_OVERRIDE_MIN}"
            )));
        }

        for (i, axis) in self.axes.iter().enumerate() {
            axis.validate().map_err(|e| match e {
                ConfigError::ValidationError(msg) => {
                    ConfigError::ValidationError(format!("axis {i} ({}): {msg}", axis.name))
                }
                other => other,
            })?;
        }
        Ok(())
    }
}

fn check_speed(field: &str, value: u32) -> Result<(), ConfigError> {
    if !(SPEED_MIN..=SPEED_MAX).contains(&value) {
        return Err(ConfigError::ValidationError(format!(
            "{field} {value} out of range [{SPEED_MIN}, {SPEED_MAX}]"
        )));
    }
    Ok(())
}

fn check_acceleration(field: &str, value: u32) -> Result<(), ConfigError> {
    if !(ACCELERATION_MIN..=ACCELERATION_MAX).contains(&value) {
        return Err(ConfigError::ValidationError(format!(
            "{field} {value} out of range [{ACCELERATION_MIN}, {ACCELERATION_MAX}]"
        )));
    }
    Ok(())
}

/// Conventional axis letter for an index.
pub fn axis_name(axis: usize) -> &'static str {
    const NAMES: [&str; MAX_AXES] = ["X", "Y", "Z", "A", "B", "C"];
    NAMES.get(axis).copied().unwrap_or("?")
}

// ─── Axis Config ────────────────────────────────────────────────────

/// Per-axis limits and wiring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AxisConfig {
    /// Human-readable name (e.g., "X").
    #[serde(default)]
    pub name: String,

    /// Maximum speed [steps/s].
    #[serde(default = "default_max_speed")]
    pub max_speed: u32,

    /// Acceleration [steps/s²].
    #[serde(default = "default_acceleration")]
    pub acceleration: u32,

    /// Deceleration [steps/s²].
    #[serde(default = "default_acceleration")]
    pub deceleration: u32,

    /// Speed change allowed at a junction without ramping [steps/s].
    #[serde(default = "default_jerk_speed")]
    pub jerk_speed: u32,

    /// Backlash compensation distance [steps]. Zero disables it.
    #[serde(default)]
    pub backlash: u32,

    /// Lower travel limit [steps].
    #[serde(default)]
    pub limit_min: u32,

    /// Upper travel limit [steps].
    pub limit_max: u32,

    /// Seconds without steps before the driver is disabled. Zero keeps it enabled.
    #[serde(default)]
    pub enable_timeout: u8,

    /// Invert the direction output.
    #[serde(default)]
    pub invert_direction: bool,

    /// Steps per engineering unit (e.g., steps/mm).
    #[serde(default = "default_steps_per_unit")]
    pub steps_per_unit: f64,

    /// Reference sensor wiring.
    #[serde(default)]
    pub reference: ReferenceConfig,
}

fn default_acceleration() -> u32 {
    ACCELERATION_DEFAULT
}
fn default_jerk_speed() -> u32 {
    JERK_SPEED_DEFAULT
}
fn default_steps_per_unit() -> f64 {
    1.0
}

impl Default for AxisConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            max_speed: DEFAULT_MAX_SPEED_DEFAULT,
            acceleration: ACCELERATION_DEFAULT,
            deceleration: ACCELERATION_DEFAULT,
            jerk_speed: JERK_SPEED_DEFAULT,
            backlash: 0,
            limit_min: 0,
            limit_max: 100_000,
            enable_timeout: 0,
            invert_direction: false,
            steps_per_unit: 1.0,
            reference: ReferenceConfig::default(),
        }
    }
}

impl AxisConfig {
    /// Validate parameter bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_speed("max_speed", self.max_speed)?;
        check_acceleration("acceleration", self.acceleration)?;
        check_acceleration("deceleration", self.deceleration)?;
        if self.jerk_speed > self.max_speed {
            return Err(ConfigError::ValidationError(format!(
                "jerk_speed {} exceeds max_speed {}",
                self.jerk_speed, self.max_speed
            )));
        }
        if self.limit_max <= self.limit_min {
            return Err(ConfigError::ValidationError(format!(
                "limit_max {} must be greater than limit_min {}",
                self.limit_max, self.limit_min
            )));
        }
        if self.backlash >= MAX_MOVEMENT_STEPS {
            return Err(ConfigError::ValidationError(format!(
                "backlash {} out of range [0, {}]",
                self.backlash,
                MAX_MOVEMENT_STEPS - 1
            )));
        }
        if self.enable_timeout > ENABLE_TIMEOUT_MAX {
            return Err(ConfigError::ValidationError(format!(
                "enable_timeout {} out of range [0, {}]",
                self.enable_timeout, ENABLE_TIMEOUT_MAX
            )));
        }
        if !(self.steps_per_unit.is_finite() && self.steps_per_unit > 0.0) {
            return Err(ConfigError::ValidationError(format!(
                "steps_per_unit {} must be a positive number",
                self.steps_per_unit
            )));
        }
        self.reference.validate(self.limit_max - self.limit_min)
    }
}

// ─── Reference Config ───────────────────────────────────────────────

/// Reference sensor wiring of one axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceConfig {
    /// Input value meaning "hit" for the min sensor. `None` = not fitted.
    #[serde(default)]
    pub min_hit: Option<u8>,

    /// Input value meaning "hit" for the max sensor. `None` = not fitted.
    #[serde(default)]
    pub max_hit: Option<u8>,

    /// Distance to move off the sensor after a hit [steps].
    #[serde(default = "default_retract")]
    pub retract: u32,

    /// Time the sensor must read "hit" before the search stops [ms].
    #[serde(default)]
    pub stable_time_ms: u32,
}

fn default_retract() -> u32 {
    REFERENCE_RETRACT_DEFAULT
}

impl Default for ReferenceConfig {
    fn default() -> Self {
        Self {
            min_hit: None,
            max_hit: None,
            retract: REFERENCE_RETRACT_DEFAULT,
            stable_time_ms: 0,
        }
    }
}

impl ReferenceConfig {
    /// Hit value of a sensor end.
    #[inline]
    pub fn hit_value(&self, end: ReferenceEnd) -> Option<u8> {
        match end {
            ReferenceEnd::Min => self.min_hit,
            ReferenceEnd::Max => self.max_hit,
        }
    }

    fn validate(&self, travel: u32) -> Result<(), ConfigError> {
        if self.retract >= travel {
            return Err(ConfigError::ValidationError(format!(
                "reference retract {} must be shorter than the travel {}",
                self.retract, travel
            )));
        }
        if self.stable_time_ms > REFERENCE_STABLE_TIME_MAX_MS {
            return Err(ConfigError::ValidationError(format!(
                "reference stable_time_ms {} out of range [0, {}]",
                self.stable_time_ms, REFERENCE_STABLE_TIME_MAX_MS
            )));
        }
        Ok(())
    }
}
