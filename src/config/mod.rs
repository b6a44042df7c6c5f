use std::io;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::drivers::dualsense::driver::DEFAULT_READ_TIMEOUT_MS;
use crate::state::compare::JoystickDeadzoneSnap;
use crate::state::mapping::{Mapping, Tolerances};
use crate::state::orientation::OrientationKind;


/// Represents all possible errors loading a [ControllerConfig]
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Could not read: {0}")]
    IoError(#[from] io::Error),
    #[error("Unable to deserialize: {0}")]
    DeserializeError(#[from] serde_yaml::Error),
}

/// Settings of a controller session. Every field is optional in YAML.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "snake_case", default)]
pub struct ControllerConfig {
    /// Index into the list of detected controllers
    pub device_index: usize,
    pub mapping: Mapping,
    /// Deadzones in the units of the selected mapping
    pub left_joystick_deadzone: f64,
    pub right_joystick_deadzone: f64,
    pub left_trigger_deadzone: f64,
    pub right_trigger_deadzone: f64,
    /// Raw sensor units
    pub gyroscope_threshold: f64,
    pub accelerometer_threshold: f64,
    /// Degrees
    pub orientation_threshold: f64,
    pub joystick_deadzone_snap: JoystickDeadzoneSnap,
    pub orientation: OrientationKind,
    pub enforce_update: bool,
    pub can_update_itself: bool,
    pub microphone_initially_muted: bool,
    pub microphone_invert_led: bool,
    pub read_timeout_ms: i32,
    pub update_benchmark: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            device_index: 0,
            mapping: Mapping::default(),
            left_joystick_deadzone: 0.0,
            right_joystick_deadzone: 0.0,
            left_trigger_deadzone: 0.0,
            right_trigger_deadzone: 0.0,
            gyroscope_threshold: 0.0,
            accelerometer_threshold: 0.0,
            orientation_threshold: 0.0,
            joystick_deadzone_snap: JoystickDeadzoneSnap::default(),
            orientation: OrientationKind::default(),
            enforce_update: false,
            can_update_itself: true,
            microphone_initially_muted: true,
            microphone_invert_led: false,
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            update_benchmark: false,
        }
    }
}

impl ControllerConfig {
    /// Load a [ControllerConfig] from the given YAML string
    pub fn from_yaml(content: String) -> Result<ControllerConfig, LoadError> {
        let config: ControllerConfig = serde_yaml::from_str(content.as_str())?;
        Ok(config)
    }

    /// Load a [ControllerConfig] from the given YAML file
    pub fn from_yaml_file(path: String) -> Result<ControllerConfig, LoadError> {
        let file = std::fs::File::open(path)?;
        let config: ControllerConfig = serde_yaml::from_reader(file)?;
        Ok(config)
    }

    pub fn tolerances(&self) -> Tolerances {
        Tolerances {
            left_joystick_deadzone: self.left_joystick_deadzone,
            right_joystick_deadzone: self.right_joystick_deadzone,
            left_trigger_deadzone: self.left_trigger_deadzone,
            right_trigger_deadzone: self.right_trigger_deadzone,
            gyroscope_threshold: self.gyroscope_threshold,
            accelerometer_threshold: self.accelerometer_threshold,
            orientation_threshold: self.orientation_threshold,
        }
    }
}
