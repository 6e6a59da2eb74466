//! Integration test: stop, abort, pause, emergency stop, waits and
//! runtime settings while the interrupt handler is executing.

use stepper_common::consts::LEVEL_OFF;
use stepper_common::hal::driver::{StepOutput, StepTimer};
use stepper_common::motion::config::ReferenceConfig;
use stepper_common::motion::error::ErrorCode;
use stepper_common::motion::event::{EventKind, StepperEvent};
use stepper_core::StepperError;
use stepper_hal::SimAxisConfig;

use super::common::{EventLog, config, run_until, stepper, stepper_with};

// ── Abort ───────────────────────────────────────────────────────────

#[test]
fn abort_empties_queue_and_is_idempotent() {
    let mut stepper = stepper(2);
    let log = EventLog::attach(&mut stepper, &[EventKind::Idle]);
    stepper.move_relative(&[50_000, 20_000], None).unwrap();
    stepper.move_relative(&[1_000, 0], None).unwrap();
    run_until(&mut stepper, 10_000, |s| s.current_position(0) >= 5_000);

    stepper.abort_move();
    assert_eq!(stepper.queued_movements(), 0);
    assert_eq!(stepper.running_step_index(), 0);
    assert!(!stepper.is_busy());
    assert!(!stepper.hal().timer_running());
    let stopped = stepper.current_positions();
    assert_eq!(stepper.positions(), stopped.as_slice());
    assert_eq!(stepper.hal().physical_position(0), i64::from(stopped[0]));
    assert_eq!(stepper.hal().physical_position(1), i64::from(stopped[1]));

    stepper.abort_move();
    assert_eq!(stepper.positions(), stopped.as_slice());
    assert_eq!(log.count(StepperEvent::Idle), 1);

    // The queue accepts work again from the aborted position.
    stepper.move_relative(&[100, 0], None).unwrap();
    stepper.wait_busy();
    assert_eq!(stepper.current_position(0), stopped[0] + 100);
}

// ── Stop ────────────────────────────────────────────────────────────

#[test]
fn stop_decelerates_along_the_line() {
    let mut stepper = stepper(1);
    stepper.move_relative(&[50_000], None).unwrap();
    stepper.move_relative(&[10_000], None).unwrap();
    run_until(&mut stepper, 100_000, |s| s.current_position(0) >= 20_000);

    let at = stepper.current_position(0);
    stepper.stop_move(0);
    assert_eq!(stepper.queued_movements(), 1);
    // 20k steps/s down to the 1k steps/s jerk speed at 200k steps/s²:
    // 1000 levels minus the 2 below jerk speed.
    assert_eq!(stepper.position(0), at + 998);

    stepper.wait_busy();
    assert!(!stepper.is_busy());
    assert_eq!(stepper.current_position(0), at + 998);
    assert_eq!(stepper.hal().physical_position(0), i64::from(at) + 998);
}

#[test]
fn stop_with_harder_deceleration_is_shorter() {
    let mut stepper = stepper(1);
    stepper.move_relative(&[50_000], None).unwrap();
    run_until(&mut stepper, 100_000, |s| s.current_position(0) >= 20_000);

    let at = stepper.current_position(0);
    stepper.stop_move(800_000);
    stepper.wait_busy();
    assert_eq!(stepper.current_position(0), at + 250);
}

#[test]
fn stop_near_the_limit_stays_within_travel() {
    let mut config = config(1);
    config.axes[0].limit_max = 10_000;
    let mut stepper = stepper_with(&config, Vec::new());
    stepper.move_absolute(&[10_000], None).unwrap();
    run_until(&mut stepper, 100_000, |s| s.current_position(0) >= 9_000);

    // 20k steps/s² would need 10k steps; the segment's own curve fits.
    stepper.stop_move(20_000);
    assert!(stepper.position(0) <= 10_000);
    stepper.wait_busy();
    let at = stepper.current_position(0);
    assert!(at <= 10_000, "{at}");
    assert_eq!(stepper.position(0), at);
    assert_eq!(stepper.hal().physical_position(0), i64::from(at));
}

#[test]
fn stop_ahead_of_a_junction_brakes_within_the_limit() {
    let mut config = config(1);
    config.axes[0].limit_max = 10_000;
    let mut stepper = stepper_with(&config, Vec::new());
    stepper.move_absolute(&[9_700], None).unwrap();
    stepper.move_absolute(&[10_000], None).unwrap();
    run_until(&mut stepper, 100_000, |s| s.current_position(0) >= 9_300);

    stepper.stop_move(50_000);
    assert_eq!(stepper.queued_movements(), 1);
    stepper.wait_busy();
    let at = stepper.current_position(0);
    assert!((9_300..=10_000).contains(&at), "{at}");
    assert_eq!(stepper.positions(), &[at]);
    assert_eq!(stepper.hal().physical_position(0), i64::from(at));
}

#[test]
fn stop_during_backlash_completes_the_compensation() {
    let mut config = config(1);
    config.axes[0].backlash = 2_000;
    let mut stepper = stepper_with(&config, Vec::new());
    stepper.move_relative(&[20_000], None).unwrap();
    stepper.move_relative(&[-5_000], None).unwrap();
    run_until(&mut stepper, 100_000, |s| s.hal().pulses(0) >= 21_500);

    stepper.stop_move(0);
    assert_eq!(stepper.positions(), &[20_000]);
    stepper.wait_busy();
    assert_eq!(stepper.hal().pulses(0), 22_000);
    assert_eq!(stepper.current_position(0), 20_000);
    assert_eq!(stepper.hal().physical_position(0), 18_000);

    // The slack is taken up: the next move down needs no compensation.
    stepper.move_relative(&[-100], None).unwrap();
    stepper.wait_busy();
    assert_eq!(stepper.hal().pulses(0), 22_100);
    assert_eq!(stepper.current_position(0), 19_900);
    assert_eq!(stepper.hal().physical_position(0), 17_900);
}

#[test]
fn stop_during_split_move_ends_on_the_executing_part() {
    let mut stepper = stepper(2);
    stepper.move_relative(&[150_000, 50_000], None).unwrap();
    assert_eq!(stepper.queued_movements(), 3);
    run_until(&mut stepper, 200_000, |s| s.current_position(0) >= 60_000);

    stepper.stop_move(0);
    assert_eq!(stepper.queued_movements(), 1);
    stepper.wait_busy();
    let stopped = stepper.current_positions();
    assert!((60_000..=61_000).contains(&stopped[0]), "{stopped:?}");
    assert_eq!(stepper.positions(), stopped.as_slice());
    assert_eq!(stepper.hal().physical_position(0), i64::from(stopped[0]));
    assert_eq!(stepper.hal().physical_position(1), i64::from(stopped[1]));
}

#[test]
fn stop_before_start_drops_everything() {
    let mut stepper = stepper(1);
    stepper.move_relative(&[5_000], None).unwrap();
    stepper.wait(10).unwrap();
    stepper.stop_move(0);
    assert_eq!(stepper.queued_movements(), 0);
    stepper.wait_busy();
    assert_eq!(stepper.positions(), &[0]);
    assert_eq!(stepper.hal().pulses(0), 0);
}

// ── Pause ───────────────────────────────────────────────────────────

#[test]
fn pause_stops_at_segment_end_and_continue_resumes() {
    let mut stepper = stepper(1);
    for _ in 0..3 {
        stepper.move_relative(&[5_000], None).unwrap();
    }
    run_until(&mut stepper, 10_000, |s| s.current_position(0) >= 100);

    stepper.pause_move();
    assert!(stepper.is_paused());
    stepper.wait_busy();
    assert!(!stepper.hal().timer_running());
    assert_eq!(stepper.current_position(0), 5_000);
    assert_eq!(stepper.queued_movements(), 2);
    assert_eq!(stepper.positions(), &[15_000]);

    stepper.continue_move();
    assert!(!stepper.is_paused());
    stepper.wait_busy();
    assert_eq!(stepper.current_position(0), 15_000);
    assert_eq!(stepper.hal().physical_position(0), 15_000);
}

#[test]
fn paused_full_queue_is_rejected() {
    let mut stepper = stepper(1);
    stepper.pause_move();
    let mut result = Ok(());
    for _ in 0..=stepper_core::queue::MovementQueue::CAPACITY {
        result = stepper.move_relative(&[10], None);
        if result.is_err() {
            break;
        }
    }
    assert!(matches!(result, Err(StepperError::Paused)));
    assert_eq!(stepper.hal().pulses(0), 0);
    assert!(!stepper.can_queue_movement());
}

#[test]
fn paused_request_without_room_queues_nothing() {
    let mut config = config(1);
    config.axes[0].backlash = 10;
    let mut stepper = stepper_with(&config, Vec::new());
    stepper.move_relative(&[100], None).unwrap();
    stepper.pause_move();
    let capacity = stepper_core::queue::MovementQueue::CAPACITY;
    while stepper.queued_movements() < capacity - 1 {
        stepper.move_relative(&[10], None).unwrap();
    }
    let before = stepper.positions().to_vec();

    // A reversal needs a compensation entry plus the move itself.
    assert!(matches!(
        stepper.move_relative(&[-50], None),
        Err(StepperError::Paused)
    ));
    // Split into four parts.
    assert!(matches!(
        stepper.move_relative(&[200_000], None),
        Err(StepperError::Paused)
    ));
    assert_eq!(stepper.queued_movements(), capacity - 1);
    assert_eq!(stepper.positions(), before.as_slice());

    // The rejected reversal left the backlash direction alone.
    stepper.continue_move();
    stepper.wait_busy();
    stepper.move_relative(&[-50], None).unwrap();
    stepper.wait_busy();
    let at = stepper.current_position(0);
    assert_eq!(stepper.hal().physical_position(0), i64::from(at) - 10);
}

// ── Emergency stop ──────────────────────────────────────────────────

#[test]
fn emergency_stop_rejects_until_resurrect() {
    let mut stepper = stepper(1);
    let log = EventLog::attach(&mut stepper, &[EventKind::Error]);
    stepper.move_relative(&[30_000], None).unwrap();
    run_until(&mut stepper, 10_000, |s| s.current_position(0) >= 1_000);

    stepper.emergency_stop();
    stepper.emergency_stop();
    assert!(stepper.is_emergency_stop());
    assert!(!stepper.is_busy());
    let at = stepper.current_position(0);
    assert_eq!(stepper.hal().physical_position(0), i64::from(at));

    assert!(matches!(
        stepper.move_relative(&[10], None),
        Err(StepperError::EmergencyStop)
    ));
    assert!(matches!(stepper.wait(1), Err(StepperError::EmergencyStop)));
    assert!(matches!(
        stepper.io_control(1, 1),
        Err(StepperError::EmergencyStop)
    ));
    assert_eq!(
        log.events(),
        vec![StepperEvent::Error(ErrorCode::EmergencyStop)]
    );

    stepper.emergency_stop_resurrect();
    assert_eq!(stepper.fatal_error(), None);
    stepper.move_relative(&[10], None).unwrap();
    stepper.wait_busy();
    assert_eq!(stepper.current_position(0), at + 10);
}

// ── Reference check during normal moves ─────────────────────────────

#[test]
fn sensor_hit_during_move_is_fatal() {
    let mut config = config(1);
    config.check_reference = true;
    config.axes[0].limit_max = 10_000;
    config.axes[0].reference = ReferenceConfig {
        max_hit: Some(0),
        ..ReferenceConfig::default()
    };
    let sim = SimAxisConfig {
        max_switch: Some(5_000),
        ..SimAxisConfig::default()
    };
    let mut stepper = stepper_with(&config, vec![sim]);
    let log = EventLog::attach(&mut stepper, &[EventKind::Error]);

    stepper.move_absolute(&[8_000], None).unwrap();
    stepper.move_absolute(&[9_000], None).unwrap();
    stepper.wait_busy();

    assert_eq!(stepper.fatal_error(), Some(ErrorCode::ReferenceHitDuringMove));
    assert_eq!(
        log.events(),
        vec![StepperEvent::Error(ErrorCode::ReferenceHitDuringMove)]
    );
    assert_eq!(stepper.queued_movements(), 0);
    assert_eq!(stepper.hal().physical_position(0), 5_000);
    assert_eq!(stepper.positions(), &[5_000]);
    assert!(matches!(
        stepper.move_relative(&[-10], None),
        Err(StepperError::Fatal(ErrorCode::ReferenceHitDuringMove))
    ));

    stepper.clear_fatal_error();
    stepper.move_absolute(&[4_000], None).unwrap();
    stepper.wait_busy();
    assert_eq!(stepper.hal().physical_position(0), 4_000);
}

#[test]
fn sensor_behind_the_move_is_ignored() {
    let mut config = config(1);
    config.check_reference = true;
    config.axes[0].reference = ReferenceConfig {
        min_hit: Some(0),
        ..ReferenceConfig::default()
    };
    // Starts on the min switch and moves away from it.
    let mut stepper = stepper_with(&config, Vec::new());
    stepper.move_relative(&[1_000], None).unwrap();
    stepper.wait_busy();
    assert_eq!(stepper.fatal_error(), None);
    assert_eq!(stepper.current_position(0), 1_000);
}

// ── Waits ───────────────────────────────────────────────────────────

#[test]
fn timed_wait_holds_the_queue() {
    let mut stepper = stepper(1);
    stepper.wait(50).unwrap();
    stepper.move_relative(&[10], None).unwrap();
    run_until(&mut stepper, 10_000, |s| s.running_step_index() >= 10);
    assert_eq!(stepper.hal().pulses(0), 0);

    stepper.wait_busy();
    assert!(stepper.hal().millis() >= 500);
    assert_eq!(stepper.current_position(0), 10);
}

#[test]
fn conditional_wait_ends_on_cancel_input() {
    let mut stepper = stepper(1);
    let log = EventLog::attach(&mut stepper, &[EventKind::Io]);
    stepper.wait_conditional(100).unwrap();
    stepper.io_control(7, 1).unwrap();
    run_until(&mut stepper, 10_000, |s| s.running_step_index() >= 3);
    assert!(log.events().is_empty());

    stepper.hal_mut().set_wait_cancel(true);
    stepper.wait_busy();
    assert!(stepper.hal().millis() < 100);
    assert_eq!(log.events(), vec![StepperEvent::Io { tool: 7, level: 1 }]);
}

#[test]
fn conditional_wait_is_skipped_when_switched_off() {
    let mut stepper = stepper(1);
    stepper.set_wait_conditional(false);
    stepper.wait_conditional(100).unwrap();
    stepper.wait_busy();
    assert!(stepper.hal().millis() < 10);

    stepper.wait(1).unwrap();
    stepper.wait_busy();
    assert!(stepper.hal().millis() >= 10);
}

// ── Settings ────────────────────────────────────────────────────────

#[test]
fn speed_override_scales_execution_time() {
    let mut stepper = stepper(1);
    let t0 = stepper.hal().now_ticks();
    stepper.move_relative(&[20_000], None).unwrap();
    stepper.wait_busy();
    let full = stepper.hal().now_ticks() - t0;

    stepper.set_speed_override_percent(50);
    let t1 = stepper.hal().now_ticks();
    stepper.move_relative(&[20_000], None).unwrap();
    stepper.wait_busy();
    let half = stepper.hal().now_ticks() - t1;

    assert_eq!(stepper.current_position(0), 40_000);
    assert!(half * 10 >= full * 19, "{half} vs {full}");
    assert!(half * 10 <= full * 21, "{half} vs {full}");
}

#[test]
fn enable_timeout_disables_idle_driver() {
    let mut stepper = stepper(1);
    let log = EventLog::attach(&mut stepper, &[EventKind::Disable]);
    stepper.set_enable_timeout(0, 1).unwrap();
    stepper.move_relative(&[100], None).unwrap();
    stepper.wait_busy();
    assert_ne!(stepper.hal().enable_level(0), LEVEL_OFF);

    run_until(&mut stepper, 3_000, |s| s.hal().enable_level(0) == LEVEL_OFF);
    assert!(stepper.idle_millis().unwrap() >= 1_000);
    assert_eq!(log.events(), vec![StepperEvent::Disable { axis: 0 }]);

    // Moving enables the driver again.
    stepper.move_relative(&[100], None).unwrap();
    run_until(&mut stepper, 100, |s| s.current_position(0) > 100);
    assert_ne!(stepper.hal().enable_level(0), LEVEL_OFF);
}

#[test]
fn wait_finish_move_blocks_until_drained() {
    let mut stepper = stepper(1);
    stepper.set_wait_finish_move(true);
    stepper.move_relative(&[1_000], None).unwrap();
    stepper.move_relative(&[1_000], None).unwrap();
    // The second request waited for the first move to finish.
    assert_eq!(stepper.queued_movements(), 1);
    assert_eq!(stepper.current_position(0), 1_000);
    stepper.wait_busy();
    assert_eq!(stepper.current_position(0), 2_000);
}
