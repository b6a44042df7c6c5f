use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use super::value::{Accelerometer, Gyroscope, Orientation};

/// Strategy fusing gyroscope and accelerometer samples into an orientation.
/// Called once per recomputation of the orientation state with the latest
/// raw sensor values.
pub trait OrientationFilter: Send {
    fn update(&mut self, gyroscope: &Gyroscope, accelerometer: &Accelerometer) -> Orientation;
}

/// Reports a constant zero orientation
#[derive(Debug, Default, Clone, Copy)]
pub struct ZeroOrientation;

impl OrientationFilter for ZeroOrientation {
    fn update(&mut self, _: &Gyroscope, _: &Accelerometer) -> Orientation {
        Orientation::default()
    }
}

/// Pitch and roll from the direction of gravity. Yaw cannot be observed
/// from the accelerometer and stays at zero.
#[derive(Debug, Default, Clone, Copy)]
pub struct TiltOrientation;

impl OrientationFilter for TiltOrientation {
    fn update(&mut self, _: &Gyroscope, accelerometer: &Accelerometer) -> Orientation {
        let x = accelerometer.x as f64;
        let y = accelerometer.y as f64;
        let z = accelerometer.z as f64;
        Orientation {
            pitch: (-y).atan2(-z) + PI,
            roll: (-x).atan2(-z) + PI,
            yaw: 0.0,
        }
    }
}

/// Orientation filters selectable from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrientationKind {
    #[default]
    Zero,
    Tilt,
}

impl OrientationKind {
    pub fn filter(&self) -> Box<dyn OrientationFilter> {
        match self {
            OrientationKind::Zero => Box::new(ZeroOrientation),
            OrientationKind::Tilt => Box::new(TiltOrientation),
        }
    }
}
