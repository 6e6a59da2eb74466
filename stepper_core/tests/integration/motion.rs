//! Integration test: queueing, planning and execution of linear moves.

use stepper_common::consts::{MAX_MOVEMENT_STEPS, MAX_STEP_MULTIPLIER};
use stepper_common::motion::event::{EventKind, StepperEvent};
use stepper_common::types::speed_to_timer;
use stepper_core::RampCurve;
use stepper_core::movement::MoveKind;

use super::common::{EventLog, SPEED, config, queued_ramps, stepper, stepper_with};

const FREQUENCY: u32 = 2_000_000;

// ── Position bookkeeping ────────────────────────────────────────────

#[test]
fn relative_moves_sum_to_calculated_position() {
    let mut stepper = stepper(2);
    let moves = [[5_000, 3_000], [-1_200, 700], [333, -2_000]];
    for deltas in &moves {
        stepper.move_relative(deltas, None).unwrap();
    }
    assert_eq!(stepper.positions(), &[4_133, 1_700]);

    stepper.wait_busy();
    assert!(!stepper.is_busy());
    assert_eq!(stepper.current_positions().as_slice(), &[4_133, 1_700]);
    assert_eq!(stepper.hal().physical_position(0), 4_133);
    assert_eq!(stepper.hal().physical_position(1), 1_700);
    assert_eq!(stepper.hal().pulses(0), 5_000 + 1_200 + 333);
    assert_eq!(stepper.hal().pulses(1), 3_000 + 700 + 2_000);
}

#[test]
fn absolute_moves_skip_unchanged_axes() {
    let mut stepper = stepper(3);
    stepper.move_absolute(&[1_000, 2_000, 3_000], None).unwrap();
    stepper.move_absolute(&[1_000], None).unwrap();
    assert_eq!(stepper.queued_movements(), 1);

    stepper.move_absolute(&[0, 2_000], None).unwrap();
    stepper.wait_busy();
    assert_eq!(stepper.current_positions().as_slice(), &[0, 2_000, 3_000]);
    assert_eq!(stepper.hal().pulses(2), 3_000);
}

#[test]
fn long_move_is_split_and_executed_exactly() {
    let mut stepper = stepper(2);
    stepper.move_relative(&[150_000, 1], None).unwrap();
    let parts = 150_000u32.div_ceil(MAX_MOVEMENT_STEPS) as usize;
    assert_eq!(stepper.queued_movements(), parts);

    stepper.wait_busy();
    assert_eq!(stepper.hal().physical_position(0), 150_000);
    assert_eq!(stepper.hal().physical_position(1), 1);
    assert_eq!(stepper.hal().pulses(0), 150_000);
    assert!(stepper.hal().max_pulses_per_call() <= MAX_STEP_MULTIPLIER);
}

#[test]
fn interrupts_never_nest_critical_sections_deeply() {
    let mut stepper = stepper(2);
    stepper.move_relative(&[2_000, 500], None).unwrap();
    stepper.move_relative(&[0, 2_000], None).unwrap();
    stepper.wait_busy();
    assert!(stepper.hal().interrupts_enabled());
    assert!(stepper.hal().max_mask_depth() <= 2);
    assert_eq!(stepper.reentered_interrupts(), 0);
}

// ── Profiles ────────────────────────────────────────────────────────

#[test]
fn long_segment_is_trapezoidal() {
    let stepper = stepper(1);
    let timer = speed_to_timer(FREQUENCY, SPEED);
    let segment = stepper
        .planner()
        .build_segment(&[20_000], timer, MoveKind::Normal)
        .unwrap();
    let ramp = segment.ramp;

    assert!(!ramp.is_triangular());
    assert!(ramp.up_steps + ramp.down_steps <= segment.steps);
    assert_eq!(ramp.down_start_at, segment.steps - ramp.down_steps);
    assert_eq!(ramp.timer_run, timer);
    // 20k steps/s at 200k steps/s² takes 1000 steps from standstill.
    assert!((990..=1_000).contains(&ramp.up_steps));
}

#[test]
fn short_segment_is_triangular() {
    let stepper = stepper(1);
    let timer = speed_to_timer(FREQUENCY, SPEED);
    let segment = stepper
        .planner()
        .build_segment(&[200], timer, MoveKind::Normal)
        .unwrap();
    let ramp = segment.ramp;

    assert!(ramp.is_triangular());
    assert!(ramp.down_start_at < segment.steps);
    assert_eq!(ramp.up_steps + ramp.down_steps, segment.steps);
    // Peak strictly slower than requested.
    assert!(ramp.timer_run > segment.timer_max);
}

// ── Junctions ───────────────────────────────────────────────────────

#[test]
fn straight_junction_runs_through_at_full_speed() {
    let mut stepper = stepper(2);
    stepper.move_relative(&[10_000, 0], None).unwrap();
    stepper.io_control(1, 1).unwrap();
    stepper.move_relative(&[10_000, 0], None).unwrap();

    let ramps = queued_ramps(&stepper);
    assert_eq!(ramps.len(), 2);
    let timer = speed_to_timer(FREQUENCY, SPEED);
    assert_eq!(ramps[0].timer_stop, timer);
    assert_eq!(ramps[1].timer_start, timer);
    assert_eq!(ramps[0].down_start_at, ramps[0].end_at);

    stepper.wait_busy();
    assert_eq!(stepper.hal().physical_position(0), 20_000);
}

#[test]
fn corner_junction_is_jerk_limited() {
    let mut stepper = stepper(2);
    stepper.move_relative(&[10_000, 0], None).unwrap();
    stepper.move_relative(&[0, 10_000], None).unwrap();

    // Each axis jumps by the full speed at a right angle: 1000 steps/s.
    let jerk_timer = speed_to_timer(FREQUENCY, 1_000);
    let ramps = queued_ramps(&stepper);
    assert_eq!(ramps[0].timer_stop, jerk_timer);
    assert_eq!(ramps[1].timer_start, jerk_timer);

    stepper.wait_busy();
    assert_eq!(stepper.current_positions().as_slice(), &[10_000, 10_000]);
}

#[test]
fn junction_respects_deceleration_of_short_successor() {
    let mut stepper = stepper(1);
    stepper.move_relative(&[10_000], None).unwrap();
    stepper.move_relative(&[50], None).unwrap();

    let ramps = queued_ramps(&stepper);
    let junction = ramps[0].timer_stop;
    assert_eq!(ramps[1].timer_start, junction);
    assert_eq!(ramps[1].timer_stop, speed_to_timer(FREQUENCY, 1_000));

    // The 50-step tail must be able to stop from the junction speed.
    let dec = RampCurve::new(FREQUENCY, 200_000);
    assert!(dec.level(junction) <= 50 + dec.level(ramps[1].timer_stop));
    assert!(junction > speed_to_timer(FREQUENCY, SPEED));

    stepper.wait_busy();
    assert_eq!(stepper.hal().physical_position(0), 10_050);
}

#[test]
fn wait_separates_planning_runs() {
    let mut stepper = stepper(1);
    stepper.move_relative(&[10_000], None).unwrap();
    stepper.wait(1).unwrap();
    stepper.move_relative(&[10_000], None).unwrap();

    let ramps = queued_ramps(&stepper);
    let standstill = speed_to_timer(FREQUENCY, 1_000);
    assert_eq!(ramps[0].timer_stop, standstill);
    assert_eq!(ramps[1].timer_start, standstill);
}

// ── Backlash ────────────────────────────────────────────────────────

#[test]
fn reversal_emits_backlash_without_moving_position() {
    let mut config = config(1);
    config.axes[0].backlash = 10;
    let mut stepper = stepper_with(&config, Vec::new());

    stepper.move_relative(&[1_000], None).unwrap();
    stepper.move_relative(&[-400], None).unwrap();
    stepper.wait_busy();
    assert_eq!(stepper.positions(), &[600]);
    assert_eq!(stepper.current_position(0), 600);
    assert_eq!(stepper.hal().physical_position(0), 590);
    assert_eq!(stepper.hal().pulses(0), 1_410);

    stepper.move_relative(&[100], None).unwrap();
    stepper.wait_busy();
    assert_eq!(stepper.current_position(0), 700);
    assert_eq!(stepper.hal().physical_position(0), 700);
}

// ── I/O ordering ────────────────────────────────────────────────────

#[test]
fn io_events_fire_in_queue_order() {
    let mut stepper = stepper(1);
    let log = EventLog::attach(&mut stepper, &[EventKind::Io]);

    stepper.move_relative(&[1_000], None).unwrap();
    stepper.io_control(1, 10).unwrap();
    stepper.move_relative(&[1_000], None).unwrap();
    stepper.io_control(2, 20).unwrap();
    stepper.wait(1).unwrap();
    stepper.io_control(3, 30).unwrap();
    assert!(log.events().is_empty());

    stepper.wait_busy();
    assert_eq!(
        log.events(),
        vec![
            StepperEvent::Io { tool: 1, level: 10 },
            StepperEvent::Io { tool: 2, level: 20 },
            StepperEvent::Io { tool: 3, level: 30 },
        ]
    );
    assert_eq!(stepper.current_position(0), 2_000);
}

#[test]
fn start_and_idle_events_bracket_a_run() {
    let mut stepper = stepper(1);
    let log = EventLog::attach(&mut stepper, &[EventKind::Start, EventKind::Idle]);

    stepper.move_relative(&[500], None).unwrap();
    stepper.move_relative(&[500], None).unwrap();
    stepper.wait_busy();
    assert_eq!(log.events(), vec![StepperEvent::Start, StepperEvent::Idle]);
    assert!(stepper.idle_millis().is_some());
}
