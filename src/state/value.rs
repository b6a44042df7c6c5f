//! Immutable value objects carried by read and write state cells.
use std::fmt::Display;

use packed_struct::prelude::*;
use serde::{Deserialize, Serialize};

use crate::drivers::dualsense::hid_report::ConnectionType;

/// Raw midpoint of an 8-bit stick axis
pub const STICK_CENTER: f64 = 127.5;

/// Position of an analog stick. Raw values range from 0 to 255 on both axes.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct JoyStick {
    pub x: f64,
    pub y: f64,
}

impl JoyStick {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Stick resting at the raw midpoint
    pub fn center() -> Self {
        Self::new(STICK_CENTER, STICK_CENTER)
    }

    /// Euclidean distance from the raw midpoint
    pub fn distance_from_center(&self) -> f64 {
        (self.x - STICK_CENTER).hypot(self.y - STICK_CENTER)
    }
}

impl Display for JoyStick {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "JoyStick(x: {}, y: {})", self.x, self.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Gyroscope {
    pub x: i16,
    pub y: i16,
    pub z: i16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Accelerometer {
    pub x: i16,
    pub y: i16,
    pub z: i16,
}

/// Orientation in radians as produced by an
/// [OrientationFilter](crate::state::orientation::OrientationFilter).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Orientation {
    pub pitch: f64,
    pub roll: f64,
    pub yaw: f64,
}

/// A single touch point on the touchpad
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct TouchFinger {
    pub active: bool,
    pub id: u8,
    pub x: u16,
    pub y: u16,
}

/// Adaptive trigger feedback reported by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct TriggerFeedback {
    pub active: bool,
    pub value: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Battery {
    pub level_percentage: f64,
    pub full: bool,
    pub charging: bool,
}

impl Display for Battery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}%", self.level_percentage)?;
        if self.full {
            write!(f, " (full)")?;
        } else if self.charging {
            write!(f, " (charging)")?;
        }
        Ok(())
    }
}

/// Session connection state published on activate and deactivate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Connection {
    pub connected: bool,
    pub connection_type: Option<ConnectionType>,
}

// Write side

#[derive(PrimitiveEnum_u8, Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PulseOptions {
    #[default]
    Off = 0,
    FadeInBlue = 1,
    FadeOutBlue = 2,
}

#[derive(PrimitiveEnum_u8, Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum LightbarMode {
    #[default]
    On = 1,
    Off = 2,
}

#[derive(PrimitiveEnum_u8, Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerLedsBrightness {
    #[default]
    High = 0,
    Medium = 1,
    Low = 2,
}

/// Bitmask of the five player indicator LEDs, leftmost LED in the lowest bit.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct PlayerLedsEnable(pub u8);

impl PlayerLedsEnable {
    pub const OFF: Self = Self(0);
    /// The single, center LED
    pub const CENTER: Self = Self(0b00100);
    /// The two LEDs directly surrounding the center LED
    pub const INNER: Self = Self(0b01010);
    /// The two outermost LEDs
    pub const OUTER: Self = Self(0b10001);
    pub const ALL: Self = Self(0b11111);

    /// Classic "player N" pattern for players 1 through 4
    pub fn player(number: u8) -> Self {
        match number {
            1 => Self::CENTER,
            2 => Self::INNER,
            3 => Self(Self::CENTER.0 | Self::OUTER.0),
            4 => Self(Self::INNER.0 | Self::OUTER.0),
            _ => Self::OFF,
        }
    }
}

impl std::ops::BitOr for PlayerLedsEnable {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lightbar {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    pub is_on: bool,
    pub pulse_options: PulseOptions,
}

impl Default for Lightbar {
    fn default() -> Self {
        Self {
            red: 0,
            green: 255,
            blue: 0,
            is_on: true,
            pulse_options: PulseOptions::Off,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlayerLeds {
    pub enable: PlayerLedsEnable,
    pub brightness: PlayerLedsBrightness,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Microphone {
    pub mute: bool,
    pub led: bool,
}

/// Known adaptive trigger effect modes
pub mod trigger_effect_mode {
    pub const NO_RESISTANCE: u8 = 0x00;
    pub const CONTINUOUS_RESISTANCE: u8 = 0x01;
    pub const SECTION_RESISTANCE: u8 = 0x02;
    pub const VIBRATING: u8 = 0x06;
    pub const BOW: u8 = 0x22;
    pub const GALLOPING: u8 = 0x23;
    pub const SEMI_AUTOMATIC_GUN: u8 = 0x25;
    pub const EFFECT_EXTENDED: u8 = 0x26;
    pub const CALIBRATE: u8 = 0xFC;
}

/// Adaptive trigger effect: a mode byte followed by seven mode-specific
/// parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerEffect {
    pub mode: u8,
    pub param1: u8,
    pub param2: u8,
    pub param3: u8,
    pub param4: u8,
    pub param5: u8,
    pub param6: u8,
    pub param7: u8,
}

impl Default for TriggerEffect {
    fn default() -> Self {
        Self::custom(trigger_effect_mode::EFFECT_EXTENDED, [0x90, 0xA0, 0xFF, 0, 0, 0, 0])
    }
}

impl TriggerEffect {
    pub fn custom(mode: u8, params: [u8; 7]) -> Self {
        Self {
            mode,
            param1: params[0],
            param2: params[1],
            param3: params[2],
            param4: params[3],
            param5: params[4],
            param6: params[5],
            param7: params[6],
        }
    }

    pub fn no_resistance() -> Self {
        Self::custom(trigger_effect_mode::NO_RESISTANCE, [0; 7])
    }

    /// Resistance from `start` (0-255) to the end of travel with the given
    /// `force` (0-255).
    pub fn continuous_resistance(start: u8, force: u8) -> Self {
        Self::custom(
            trigger_effect_mode::CONTINUOUS_RESISTANCE,
            [start, force, 0, 0, 0, 0, 0],
        )
    }

    /// Resistance only between `start` and `end` (0-255).
    pub fn section_resistance(start: u8, end: u8, force: u8) -> Self {
        Self::custom(
            trigger_effect_mode::SECTION_RESISTANCE,
            [start, end, force, 0, 0, 0, 0],
        )
    }

    /// Extended effect, also used for automatic guns. `keep` holds the
    /// effect while the trigger stays pressed.
    pub fn effect_extended(
        start: u8,
        keep: bool,
        begin_force: u8,
        middle_force: u8,
        end_force: u8,
        frequency: u8,
    ) -> Self {
        Self::custom(
            trigger_effect_mode::EFFECT_EXTENDED,
            [
                0xFF - start,
                if keep { 0x02 } else { 0x00 },
                begin_force,
                middle_force,
                end_force,
                frequency,
                0,
            ],
        )
    }

    pub fn params(&self) -> [u8; 7] {
        [
            self.param1,
            self.param2,
            self.param3,
            self.param4,
            self.param5,
            self.param6,
            self.param7,
        ]
    }
}
