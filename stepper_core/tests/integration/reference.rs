//! Integration test: reference searches on the simulated machine.

use stepper_common::motion::config::{ReferenceConfig, StepperConfig};
use stepper_common::motion::error::ErrorCode;
use stepper_common::motion::event::{EventKind, StepperEvent};
use stepper_core::StepperError;
use stepper_hal::SimAxisConfig;

use super::common::{EventLog, config, stepper_with};

fn referenced_config(num_axes: usize, reference: ReferenceConfig) -> StepperConfig {
    let mut config = config(num_axes);
    for axis in &mut config.axes {
        axis.limit_max = 10_000;
        axis.reference = reference.clone();
    }
    config
}

fn min_switch() -> ReferenceConfig {
    ReferenceConfig {
        min_hit: Some(0),
        retract: 100,
        ..ReferenceConfig::default()
    }
}

#[test]
fn reference_defines_position_for_later_moves() {
    let config = referenced_config(2, min_switch());
    let axes = vec![
        SimAxisConfig {
            start_position: 1_000,
            min_switch: Some(-300),
            ..SimAxisConfig::default()
        },
        SimAxisConfig {
            start_position: 2_500,
            ..SimAxisConfig::default()
        },
    ];
    let mut stepper = stepper_with(&config, axes);

    stepper.go_to_reference(0, Some(5_000), true).unwrap();
    stepper.go_to_reference(1, Some(5_000), true).unwrap();
    assert_eq!(stepper.positions(), &[100, 100]);
    assert_eq!(stepper.hal().physical_position(0), -200);
    assert_eq!(stepper.hal().physical_position(1), 100);

    stepper.move_absolute(&[5_000, 600], None).unwrap();
    stepper.wait_busy();
    assert_eq!(stepper.hal().physical_position(0), 4_700);
    assert_eq!(stepper.hal().physical_position(1), 600);
}

#[test]
fn reference_at_max_end_with_debounce() {
    let reference = ReferenceConfig {
        max_hit: Some(1),
        retract: 100,
        // 4000 ticks at 2 MHz: ten steps at 5k steps/s.
        stable_time_ms: 2,
        ..ReferenceConfig::default()
    };
    let config = referenced_config(1, reference);
    let sim = SimAxisConfig {
        start_position: 500,
        max_switch: Some(7_000),
        ..SimAxisConfig::default()
    };
    let mut stepper = stepper_with(&config, vec![sim]);

    stepper.go_to_reference(0, Some(5_000), false).unwrap();
    assert_eq!(stepper.position(0), 9_900);
    assert_eq!(stepper.current_position(0), 9_900);
    // Hit first read at 7000, stable after ten reads at 7009.
    assert_eq!(stepper.hal().physical_position(0), 7_009 - 100);
    assert_eq!(stepper.hal().pulses(0), 6_509 + 100);
}

#[test]
fn reference_not_found_leaves_axis_idle() {
    let config = referenced_config(1, min_switch());
    let sim = SimAxisConfig {
        start_position: 1_500,
        min_switch: Some(-50_000),
        ..SimAxisConfig::default()
    };
    let mut stepper = stepper_with(&config, vec![sim]);
    let log = EventLog::attach(&mut stepper, &[EventKind::Error]);

    let err = stepper.go_to_reference(0, Some(10_000), true).unwrap_err();
    assert!(matches!(err, StepperError::ReferenceNotFound(0)));
    assert_eq!(err.code(), Some(ErrorCode::ReferenceNotFound));
    assert_eq!(stepper.error(), Some(ErrorCode::ReferenceNotFound));
    assert_eq!(
        log.events(),
        vec![StepperEvent::Error(ErrorCode::ReferenceNotFound)]
    );

    // Exactly the full travel, then nothing more.
    assert_eq!(stepper.hal().pulses(0), 10_000);
    for _ in 0..100 {
        stepper.dispatch();
    }
    assert_eq!(stepper.hal().pulses(0), 10_000);
    assert!(!stepper.is_busy());
}

#[test]
fn reference_is_rejected_during_emergency_stop() {
    let config = referenced_config(1, min_switch());
    let mut stepper = stepper_with(&config, Vec::new());
    stepper.emergency_stop();
    assert!(matches!(
        stepper.go_to_reference(0, None, true),
        Err(StepperError::EmergencyStop)
    ));
    assert_eq!(stepper.hal().pulses(0), 0);
}
