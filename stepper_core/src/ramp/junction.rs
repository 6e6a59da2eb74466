//! Junction speed between consecutive segments.
//!
//! At a junction both segments share one reference speed `v`. Axis `i`
//! moves at `v·dA_i/SA` before and `v·dB_i/SB` after the junction, so
//! its speed jumps by `v·|dA_i·SB − dB_i·SA| / (SA·SB)`. The junction
//! speed is the largest `v` keeping every jump within the axis jerk
//! speed. A standstill neighbour is a segment with zero distances.

use stepper_common::types::{Distance, StepRate, Steps};

/// Largest reference speed at a junction [steps/s].
///
/// `a` and `b` are the signed per-axis distances of the segments before
/// and after the junction, `a_steps` and `b_steps` their reference
/// distances. Returns `StepRate::MAX` when no axis changes speed.
pub fn junction_speed(
    a: &[Distance],
    a_steps: Steps,
    b: &[Distance],
    b_steps: Steps,
    jerk: &[StepRate],
) -> StepRate {
    let sa = i128::from(a_steps.max(1));
    let sb = i128::from(b_steps.max(1));
    let mut speed = u128::from(StepRate::MAX);

    for ((&da, &db), &jerk) in a.iter().zip(b.iter()).zip(jerk.iter()) {
        let jump = (i128::from(da) * sb - i128::from(db) * sa).unsigned_abs();
        if jump == 0 {
            continue;
        }
        let limit = u128::from(jerk) * (sa as u128) * (sb as u128) / jump;
        speed = speed.min(limit);
    }
    speed as StepRate
}

/// Largest reference speed for starting from or stopping to standstill.
pub fn standstill_speed(a: &[Distance], a_steps: Steps, jerk: &[StepRate]) -> StepRate {
    let zero = [0; stepper_common::consts::MAX_AXES];
    let len = a.len().min(zero.len());
    junction_speed(&a[..len], a_steps, &zero[..len], 1, jerk)
}
