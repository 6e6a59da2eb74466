//! Simulation driver configuration.
//!
//! ```toml
//! record_intervals = true
//!
//! [[axes]]
//! start_position = 1500
//! min_switch = 0
//! ```

use serde::{Deserialize, Serialize};

/// Simulation-only settings layered on top of the stepper configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Keep a log of every expired timer interval.
    #[serde(default)]
    pub record_intervals: bool,

    /// Per-axis physical setup, index = axis. Missing axes use defaults.
    #[serde(default)]
    pub axes: Vec<SimAxisConfig>,
}

/// Physical setup of one simulated axis.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimAxisConfig {
    /// Physical position at power-up [steps].
    #[serde(default)]
    pub start_position: i64,

    /// Physical trigger position of the min reference switch.
    /// Defaults to the axis `limit_min` when the sensor is configured.
    #[serde(default)]
    pub min_switch: Option<i64>,

    /// Physical trigger position of the max reference switch.
    /// Defaults to the axis `limit_max` when the sensor is configured.
    #[serde(default)]
    pub max_switch: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simulation_config_from_toml() {
        let config: SimulationConfig = toml::from_str(
            r#"
record_intervals = true

[[axes]]
start_position = 1500
min_switch = -20

[[axes]]
"#,
        )
        .unwrap();
        assert!(config.record_intervals);
        assert_eq!(config.axes.len(), 2);
        assert_eq!(config.axes[0].start_position, 1500);
        assert_eq!(config.axes[0].min_switch, Some(-20));
        assert_eq!(config.axes[1].max_switch, None);
    }

    #[test]
    fn test_simulation_config_empty() {
        let config: SimulationConfig = toml::from_str("").unwrap();
        assert!(!config.record_intervals);
        assert!(config.axes.is_empty());
    }
}
