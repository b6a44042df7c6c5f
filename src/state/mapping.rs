//! Linear range mapping between raw device units and application units.
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::cell::MapFn;
use super::value::{JoyStick, Orientation};

#[derive(Debug, Error, PartialEq)]
pub enum MappingError {
    #[error("{name} must not be negative, got {value}")]
    NegativeValue { name: &'static str, value: f64 },
}

/// Linear interpolation of `value` from one range into another
pub fn number_map(value: f64, in_min: f64, in_max: f64, out_min: f64, out_max: f64) -> f64 {
    if in_min == out_min && in_max == out_max {
        return value;
    }
    (value - in_min) * (out_max - out_min) / (in_max - in_min) + out_min
}

fn round_to(value: f64, digits: i32) -> f64 {
    let factor = 10f64.powi(digits);
    (value * factor).round() / factor
}

/// Numeric type of a mapped range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberType {
    /// Results are truncated toward zero
    Integer,
    /// Results are rounded to the given number of digits
    Float { round_digits: i32 },
}

impl NumberType {
    pub const FLOAT: Self = Self::Float { round_digits: 2 };

    fn convert(&self, value: f64) -> f64 {
        match self {
            NumberType::Integer => value.trunc(),
            NumberType::Float { round_digits } => round_to(value, *round_digits),
        }
    }
}

/// Raw range and the application range it maps onto
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FromTo {
    pub from_min: f64,
    pub from_max: f64,
    pub to_min: f64,
    pub to_max: f64,
    pub to_type: NumberType,
}

impl FromTo {
    pub const fn new(from_min: f64, from_max: f64, to_min: f64, to_max: f64) -> Self {
        Self {
            from_min,
            from_max,
            to_min,
            to_max,
            to_type: NumberType::Integer,
        }
    }

    pub const fn float(from_min: f64, from_max: f64, to_min: f64, to_max: f64) -> Self {
        Self {
            from_min,
            from_max,
            to_min,
            to_max,
            to_type: NumberType::FLOAT,
        }
    }

    /// The reverse mapping. Raw values are always integers.
    pub fn swapped(&self) -> Self {
        Self::new(self.to_min, self.to_max, self.from_min, self.from_max)
    }

    pub fn raw_to_mapped(&self, value: f64) -> f64 {
        let mapped = number_map(value, self.from_min, self.from_max, self.to_min, self.to_max);
        self.to_type.convert(mapped)
    }

    pub fn mapped_to_raw(&self, value: f64) -> f64 {
        let swapped = self.swapped();
        let raw = number_map(
            value,
            swapped.from_min,
            swapped.from_max,
            swapped.to_min,
            swapped.to_max,
        );
        raw.trunc()
    }
}

/// Controls whose values can be remapped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    LeftStickX,
    LeftStickY,
    LeftStickDeadzone,
    RightStickX,
    RightStickY,
    RightStickDeadzone,
    LeftTrigger,
    LeftTriggerDeadzone,
    RightTrigger,
    RightTriggerDeadzone,
    MotorLeft,
    MotorRight,
}

/// Per control ranges of a [Mapping]. Controls without a range are left raw.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MappingData {
    pub left_stick_x: Option<FromTo>,
    pub left_stick_y: Option<FromTo>,
    pub left_stick_deadzone: Option<FromTo>,
    pub right_stick_x: Option<FromTo>,
    pub right_stick_y: Option<FromTo>,
    pub right_stick_deadzone: Option<FromTo>,
    pub left_trigger: Option<FromTo>,
    pub left_trigger_deadzone: Option<FromTo>,
    pub right_trigger: Option<FromTo>,
    pub right_trigger_deadzone: Option<FromTo>,
    pub motor_left: Option<FromTo>,
    pub motor_right: Option<FromTo>,
}

impl MappingData {
    pub fn get(&self, control: Control) -> Option<FromTo> {
        match control {
            Control::LeftStickX => self.left_stick_x,
            Control::LeftStickY => self.left_stick_y,
            Control::LeftStickDeadzone => self.left_stick_deadzone,
            Control::RightStickX => self.right_stick_x,
            Control::RightStickY => self.right_stick_y,
            Control::RightStickDeadzone => self.right_stick_deadzone,
            Control::LeftTrigger => self.left_trigger,
            Control::LeftTriggerDeadzone => self.left_trigger_deadzone,
            Control::RightTrigger => self.right_trigger,
            Control::RightTriggerDeadzone => self.right_trigger_deadzone,
            Control::MotorLeft => self.motor_left,
            Control::MotorRight => self.motor_right,
        }
    }

    fn sticks(x: FromTo, y: FromTo) -> Self {
        Self {
            left_stick_x: Some(x),
            left_stick_y: Some(y),
            right_stick_x: Some(x),
            right_stick_y: Some(y),
            ..Default::default()
        }
    }

    fn full(x: FromTo, y: FromTo, stick_deadzone: FromTo, trigger: FromTo) -> Self {
        Self {
            left_stick_deadzone: Some(stick_deadzone),
            right_stick_deadzone: Some(stick_deadzone),
            left_trigger: Some(trigger),
            left_trigger_deadzone: Some(trigger),
            right_trigger: Some(trigger),
            right_trigger_deadzone: Some(trigger),
            motor_left: Some(trigger),
            motor_right: Some(trigger),
            ..Self::sticks(x, y)
        }
    }
}

/// Unit systems values can be reported in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mapping {
    /// Sticks and triggers 0 to 255
    #[default]
    Raw,
    /// Like [Mapping::Raw] with stick y axes running 255 to 0
    RawInverted,
    /// Sticks -100 to 100 with y up, triggers and motors 0 to 100
    Hundred,
    /// Sticks -128 to 127 with y up
    Default,
    /// Sticks -128 to 127 with y down
    DefaultInverted,
    /// Sticks -1.0 to 1.0 with y up, triggers and motors 0.0 to 1.0
    Normalized,
    /// Like [Mapping::Normalized] with y down
    NormalizedInverted,
}

impl Mapping {
    pub fn data(&self) -> MappingData {
        match self {
            Mapping::Raw => MappingData::default(),
            Mapping::RawInverted => MappingData::sticks(
                FromTo::new(0.0, 255.0, 0.0, 255.0),
                FromTo::new(0.0, 255.0, 255.0, 0.0),
            ),
            Mapping::Hundred => MappingData::full(
                FromTo::new(0.0, 255.0, -100.0, 100.0),
                FromTo::new(0.0, 255.0, 100.0, -100.0),
                FromTo::new(0.0, 255.0, 0.0, 100.0),
                FromTo::new(0.0, 255.0, 0.0, 100.0),
            ),
            Mapping::Default => MappingData::sticks(
                FromTo::new(0.0, 255.0, -128.0, 127.0),
                FromTo::new(0.0, 255.0, 127.0, -128.0),
            ),
            Mapping::DefaultInverted => MappingData::sticks(
                FromTo::new(0.0, 255.0, -128.0, 127.0),
                FromTo::new(0.0, 255.0, -128.0, 127.0),
            ),
            Mapping::Normalized => MappingData::full(
                FromTo::float(0.0, 255.0, -1.0, 1.0),
                FromTo::float(0.0, 255.0, 1.0, -1.0),
                FromTo::float(0.0, 127.0, 0.0, 1.0),
                FromTo::float(0.0, 255.0, 0.0, 1.0),
            ),
            Mapping::NormalizedInverted => MappingData::full(
                FromTo::float(0.0, 255.0, -1.0, 1.0),
                FromTo::float(0.0, 255.0, -1.0, 1.0),
                FromTo::float(0.0, 127.0, 0.0, 1.0),
                FromTo::float(0.0, 255.0, 0.0, 1.0),
            ),
        }
    }
}

/// Deadzones and thresholds as configured by the application. Deadzones are
/// given in mapped units, sensor thresholds in raw units and the orientation
/// threshold in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Tolerances {
    pub left_joystick_deadzone: f64,
    pub right_joystick_deadzone: f64,
    pub left_trigger_deadzone: f64,
    pub right_trigger_deadzone: f64,
    pub gyroscope_threshold: f64,
    pub accelerometer_threshold: f64,
    pub orientation_threshold: f64,
}

const STICK_DEADZONE_LIMIT: f64 = 127.5;
const TRIGGER_DEADZONE_LIMIT: f64 = 255.0;
const SENSOR_THRESHOLD_LIMIT: f64 = 65535.0;
const ORIENTATION_THRESHOLD_LIMIT: f64 = std::f64::consts::TAU;

/// Builds mapping functions for every control of one [Mapping] and holds the
/// configured tolerances converted to raw units.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueMapper {
    mapping: Mapping,
    data: MappingData,
    pub left_stick_deadzone_raw: f64,
    pub right_stick_deadzone_raw: f64,
    pub left_trigger_deadzone_raw: f64,
    pub right_trigger_deadzone_raw: f64,
    pub gyroscope_threshold_raw: f64,
    pub accelerometer_threshold_raw: f64,
    /// Radians
    pub orientation_threshold_raw: f64,
}

impl ValueMapper {
    pub fn new(mapping: Mapping, tolerances: &Tolerances) -> Result<Self, MappingError> {
        let checks = [
            ("left joystick deadzone", tolerances.left_joystick_deadzone),
            ("right joystick deadzone", tolerances.right_joystick_deadzone),
            ("left trigger deadzone", tolerances.left_trigger_deadzone),
            ("right trigger deadzone", tolerances.right_trigger_deadzone),
            ("gyroscope threshold", tolerances.gyroscope_threshold),
            ("accelerometer threshold", tolerances.accelerometer_threshold),
            ("orientation threshold", tolerances.orientation_threshold),
        ];
        for (name, value) in checks {
            if value < 0.0 {
                return Err(MappingError::NegativeValue { name, value });
            }
        }

        let data = mapping.data();
        let to_raw = |control: Control, value: f64| match data.get(control) {
            Some(from_to) => from_to.mapped_to_raw(value),
            None => value,
        };
        let mapper = Self {
            mapping,
            data,
            left_stick_deadzone_raw: to_raw(
                Control::LeftStickDeadzone,
                tolerances.left_joystick_deadzone,
            ),
            right_stick_deadzone_raw: to_raw(
                Control::RightStickDeadzone,
                tolerances.right_joystick_deadzone,
            ),
            left_trigger_deadzone_raw: to_raw(
                Control::LeftTriggerDeadzone,
                tolerances.left_trigger_deadzone,
            ),
            right_trigger_deadzone_raw: to_raw(
                Control::RightTriggerDeadzone,
                tolerances.right_trigger_deadzone,
            ),
            gyroscope_threshold_raw: tolerances.gyroscope_threshold,
            accelerometer_threshold_raw: tolerances.accelerometer_threshold,
            orientation_threshold_raw: tolerances.orientation_threshold.to_radians(),
        };
        mapper.warn_on_oversized_tolerances();

        Ok(mapper)
    }

    /// Names of the tolerances spanning the whole range of their value. They
    /// are accepted but leave almost every change undetected.
    pub fn oversized_tolerances(&self) -> Vec<&'static str> {
        [
            ("left joystick deadzone", self.left_stick_deadzone_raw, STICK_DEADZONE_LIMIT),
            ("right joystick deadzone", self.right_stick_deadzone_raw, STICK_DEADZONE_LIMIT),
            ("left trigger deadzone", self.left_trigger_deadzone_raw, TRIGGER_DEADZONE_LIMIT),
            ("right trigger deadzone", self.right_trigger_deadzone_raw, TRIGGER_DEADZONE_LIMIT),
            ("gyroscope threshold", self.gyroscope_threshold_raw, SENSOR_THRESHOLD_LIMIT),
            ("accelerometer threshold", self.accelerometer_threshold_raw, SENSOR_THRESHOLD_LIMIT),
            ("orientation threshold", self.orientation_threshold_raw, ORIENTATION_THRESHOLD_LIMIT),
        ]
        .into_iter()
        .filter(|(_, raw, limit)| raw >= limit)
        .map(|(name, _, _)| name)
        .collect()
    }

    fn warn_on_oversized_tolerances(&self) {
        for name in self.oversized_tolerances() {
            log::warn!("The {name} covers the whole value range, changes will hardly be detected");
        }
    }

    pub fn mapping(&self) -> Mapping {
        self.mapping
    }

    pub fn from_to(&self, control: Control) -> Option<FromTo> {
        self.data.get(control)
    }

    pub fn raw_to_mapped(&self, control: Control, value: f64) -> f64 {
        match self.data.get(control) {
            Some(from_to) => from_to.raw_to_mapped(value),
            None => value,
        }
    }

    pub fn mapped_to_raw(&self, control: Control, value: f64) -> f64 {
        match self.data.get(control) {
            Some(from_to) => from_to.mapped_to_raw(value),
            None => value,
        }
    }

    /// Mapping functions for a single numeric control. Unmapped controls get
    /// no functions at all.
    pub fn number_fns(&self, control: Control) -> (Option<MapFn<f64>>, Option<MapFn<f64>>) {
        let Some(from_to) = self.data.get(control) else {
            return (None, None);
        };
        (
            Some(Box::new(move |v: &f64| from_to.raw_to_mapped(*v))),
            Some(Box::new(move |v: &f64| from_to.mapped_to_raw(*v))),
        )
    }

    /// Mapping functions for a stick built from two axis controls
    pub fn joystick_fns(
        &self,
        x: Control,
        y: Control,
    ) -> (Option<MapFn<JoyStick>>, Option<MapFn<JoyStick>>) {
        let (from_to_x, from_to_y) = (self.data.get(x), self.data.get(y));
        if from_to_x.is_none() && from_to_y.is_none() {
            return (None, None);
        }
        let map = |from_to: Option<FromTo>, value: f64, raw_to_mapped: bool| match from_to {
            Some(f) if raw_to_mapped => f.raw_to_mapped(value),
            Some(f) => f.mapped_to_raw(value),
            None => value,
        };
        (
            Some(Box::new(move |v: &JoyStick| {
                JoyStick::new(map(from_to_x, v.x, true), map(from_to_y, v.y, true))
            })),
            Some(Box::new(move |v: &JoyStick| {
                JoyStick::new(map(from_to_x, v.x, false), map(from_to_y, v.y, false))
            })),
        )
    }

    /// Orientation is stored in radians and reported in degrees
    pub fn orientation_fns(&self) -> (Option<MapFn<Orientation>>, Option<MapFn<Orientation>>) {
        (
            Some(Box::new(|v: &Orientation| Orientation {
                pitch: round_to(v.pitch.to_degrees(), 2),
                roll: round_to(v.roll.to_degrees(), 2),
                yaw: round_to(v.yaw.to_degrees(), 2),
            })),
            Some(Box::new(|v: &Orientation| Orientation {
                pitch: v.pitch.to_radians(),
                roll: v.roll.to_radians(),
                yaw: v.yaw.to_radians(),
            })),
        )
    }
}
