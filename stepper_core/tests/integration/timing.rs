//! Integration test: executed timer intervals against the ramp math.

use stepper_common::consts::{TIMER_START_DELAY, WAIT_TICKS_PER_SECOND};
use stepper_common::types::speed_to_timer;
use stepper_core::movement::MoveKind;

use super::common::{SPEED, config, run_until, stepper, stepper_with};

const FREQUENCY: u32 = 2_000_000;

fn recorded_ticks(intervals: &[u32]) -> u64 {
    intervals.iter().map(|&t| u64::from(t)).sum()
}

#[test]
fn single_move_matches_ramp_integral() {
    let mut stepper = stepper(1);
    let timer = speed_to_timer(FREQUENCY, SPEED);
    let segment = stepper
        .planner()
        .build_segment(&[20_000], timer, MoveKind::Normal)
        .unwrap();
    let expected = segment
        .ramp
        .duration(segment.steps, &segment.acc, &segment.dec);

    stepper.move_relative(&[20_000], Some(SPEED)).unwrap();
    stepper.wait_busy();

    let intervals = stepper.hal().timer().intervals().unwrap();
    assert_eq!(intervals[0], TIMER_START_DELAY);
    let executed = recorded_ticks(intervals) - u64::from(TIMER_START_DELAY);
    assert!(executed.abs_diff(expected) <= 1, "{executed} vs {expected}");
    assert_eq!(stepper.hal().pulses(0), 20_000);
}

#[test]
fn triangular_move_matches_ramp_integral() {
    let mut stepper = stepper(1);
    let timer = speed_to_timer(FREQUENCY, SPEED);
    let segment = stepper
        .planner()
        .build_segment(&[300], timer, MoveKind::Normal)
        .unwrap();
    assert!(segment.ramp.is_triangular());
    let expected = segment
        .ramp
        .duration(segment.steps, &segment.acc, &segment.dec);

    stepper.move_relative(&[300], Some(SPEED)).unwrap();
    stepper.wait_busy();

    let intervals = stepper.hal().timer().intervals().unwrap();
    let executed = recorded_ticks(intervals) - u64::from(TIMER_START_DELAY);
    assert!(executed.abs_diff(expected) <= 1, "{executed} vs {expected}");
}

#[test]
fn multiplied_steps_keep_the_same_duration() {
    let mut config = config(1);
    config.min_interrupt_interval = 250;
    let mut stepper = stepper_with(&config, Vec::new());
    let timer = speed_to_timer(FREQUENCY, SPEED);
    let segment = stepper
        .planner()
        .build_segment(&[30_000], timer, MoveKind::Normal)
        .unwrap();
    assert_eq!(segment.multiplier, 3);
    let expected = segment
        .ramp
        .duration(segment.steps, &segment.acc, &segment.dec);

    stepper.move_relative(&[30_000], Some(SPEED)).unwrap();
    stepper.wait_busy();

    let intervals = stepper.hal().timer().intervals().unwrap();
    let executed = recorded_ticks(intervals) - u64::from(TIMER_START_DELAY);
    assert!(executed.abs_diff(expected) <= 1, "{executed} vs {expected}");
    assert_eq!(stepper.hal().pulses(0), 30_000);
    assert_eq!(stepper.hal().max_pulses_per_call(), 3);
    // Three steps per interrupt, phase boundaries included.
    assert_eq!(stepper.hal().step_calls(), 10_000);
    assert!(intervals[1..].iter().all(|&t| t >= 250));
}

#[test]
fn multiplied_interrupts_respect_minimum_interval() {
    let mut config = config(2);
    config.min_interrupt_interval = 250;
    let mut stepper = stepper_with(&config, Vec::new());
    stepper.move_relative(&[10_001, 3_000], None).unwrap();
    stepper.move_relative(&[2_000, 7_999], None).unwrap();
    stepper.move_relative(&[-6_000, 1], None).unwrap();
    run_until(&mut stepper, 100_000, |s| s.current_position(1) >= 10_000);
    stepper.stop_move(0);
    stepper.wait_busy();

    let intervals = stepper.hal().timer().intervals().unwrap();
    assert!(intervals[1..].iter().all(|&t| t >= 250));
    assert!(stepper.hal().max_pulses_per_call() <= 3);
    let stopped = stepper.current_positions();
    assert_eq!(stepper.positions(), stopped.as_slice());
    assert_eq!(stepper.hal().physical_position(1), i64::from(stopped[1]));
}

#[test]
fn interrupts_respect_minimum_interval() {
    let mut stepper = stepper(2);
    stepper.move_relative(&[10_000, 3_000], None).unwrap();
    stepper.move_relative(&[2_000, 8_000], None).unwrap();
    stepper.move_relative(&[-6_000, 1], None).unwrap();
    stepper.wait_busy();

    let intervals = stepper.hal().timer().intervals().unwrap();
    let min = stepper.settings().min_interrupt_interval;
    assert!(intervals[1..].iter().all(|&t| t >= min));
    assert_eq!(stepper.current_positions().as_slice(), &[6_000, 11_001]);
}

#[test]
fn wait_ticks_are_hundredths() {
    let mut stepper = stepper(1);
    stepper.wait(25).unwrap();
    stepper.wait_busy();

    let intervals = stepper.hal().timer().intervals().unwrap();
    let tick = FREQUENCY / WAIT_TICKS_PER_SECOND;
    assert_eq!(intervals.len(), 1 + 25);
    assert!(intervals[1..].iter().all(|&t| t == tick));
}
