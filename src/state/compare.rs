//! Change comparators with deadzone and threshold suppression. Each one takes
//! the stored value and the incoming value and returns whether the value
//! changed, along with the value to store. Suppression happens before change
//! detection, so jitter inside a deadzone neither moves the stored value nor
//! counts as a change.
use serde::{Deserialize, Serialize};

use super::value::{Accelerometer, Gyroscope, JoyStick, Orientation};

/// Where a joystick sample inside the deadzone is snapped to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoystickDeadzoneSnap {
    /// The raw center of both axes
    #[default]
    Center,
    /// The previously stored value. Falls back to the center when nothing is
    /// stored yet.
    Previous,
}

pub fn compare_joystick(
    before: Option<&JoyStick>,
    after: &JoyStick,
    deadzone: f64,
    snap: JoystickDeadzoneSnap,
) -> (bool, JoyStick) {
    let mut after = *after;
    if deadzone > 0.0 && after.distance_from_center() <= deadzone {
        after = match (snap, before) {
            (JoystickDeadzoneSnap::Previous, Some(before)) => *before,
            _ => JoyStick::center(),
        };
    }
    match before {
        None => (true, after),
        Some(before) => (after != *before, after),
    }
}

/// Trigger values at or below the deadzone snap to the resting position
pub fn compare_trigger(before: Option<&f64>, after: &f64, deadzone: f64) -> (bool, f64) {
    let mut after = *after;
    if deadzone > 0.0 && after <= deadzone {
        after = 0.0;
    }
    match before {
        None => (true, after),
        Some(before) => (after != *before, after),
    }
}

fn within(before: f64, after: f64, threshold: f64) -> bool {
    (after - before).abs() < threshold
}

pub fn compare_gyroscope(
    before: Option<&Gyroscope>,
    after: &Gyroscope,
    threshold: f64,
) -> (bool, Gyroscope) {
    let Some(before) = before else {
        return (true, *after);
    };
    let mut after = *after;
    if threshold > 0.0
        && within(before.x as f64, after.x as f64, threshold)
        && within(before.y as f64, after.y as f64, threshold)
        && within(before.z as f64, after.z as f64, threshold)
    {
        after = *before;
    }
    (after != *before, after)
}

pub fn compare_accelerometer(
    before: Option<&Accelerometer>,
    after: &Accelerometer,
    threshold: f64,
) -> (bool, Accelerometer) {
    let Some(before) = before else {
        return (true, *after);
    };
    let mut after = *after;
    if threshold > 0.0
        && within(before.x as f64, after.x as f64, threshold)
        && within(before.y as f64, after.y as f64, threshold)
        && within(before.z as f64, after.z as f64, threshold)
    {
        after = *before;
    }
    (after != *before, after)
}

pub fn compare_orientation(
    before: Option<&Orientation>,
    after: &Orientation,
    threshold: f64,
) -> (bool, Orientation) {
    let Some(before) = before else {
        return (true, *after);
    };
    let mut after = *after;
    if threshold > 0.0
        && within(before.pitch, after.pitch, threshold)
        && within(before.roll, after.roll, threshold)
        && within(before.yaw, after.yaw, threshold)
    {
        after = *before;
    }
    (after != *before, after)
}
