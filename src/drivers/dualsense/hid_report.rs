//! Structures derived from the great work of the community of the Game Controller
//! Collective Wiki.
//! Source: https://controllers.fandom.com/wiki/Sony_DualSense
use std::fmt::Display;

use packed_struct::prelude::*;
use thiserror::Error;

use crate::state::value::{Accelerometer, Battery, Gyroscope, TouchFinger, TriggerFeedback};

use super::driver::*;

/// Errors produced while decoding or encoding reports
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Invalid report size for {connection_type}: Expected {expected}, Got {actual}")]
    InvalidReportLength {
        connection_type: ConnectionType,
        expected: usize,
        actual: usize,
    },
    #[error("Unable to detect connection type from a report of {0} bytes")]
    InvalidConnectionType(usize),
    #[error("Unable to pack report: {0}")]
    Pack(#[from] PackingError),
}

/// Wire variant of the connected controller. Decided once per connection from
/// the length of the first report read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionType {
    /// USB, 64 byte input reports
    Usb,
    /// Bluetooth with the full 78 byte input report
    Bluetooth,
    /// Bluetooth before the full report mode is enabled, 10 byte input reports
    BluetoothMinimal,
}

impl ConnectionType {
    /// Select the wire variant from the length of an input report
    pub fn from_report_len(len: usize) -> Result<Self, ReportError> {
        match len {
            INPUT_REPORT_USB_SIZE => Ok(Self::Usb),
            INPUT_REPORT_BT_SIZE => Ok(Self::Bluetooth),
            INPUT_REPORT_BT_MINIMAL_SIZE => Ok(Self::BluetoothMinimal),
            _ => Err(ReportError::InvalidConnectionType(len)),
        }
    }

    pub fn input_report_size(&self) -> usize {
        match self {
            Self::Usb => INPUT_REPORT_USB_SIZE,
            Self::Bluetooth => INPUT_REPORT_BT_SIZE,
            Self::BluetoothMinimal => INPUT_REPORT_BT_MINIMAL_SIZE,
        }
    }

    pub fn output_report_size(&self) -> usize {
        match self {
            Self::Usb => OUTPUT_REPORT_USB_SHORT_SIZE,
            Self::Bluetooth => OUTPUT_REPORT_BT_SIZE,
            Self::BluetoothMinimal => OUTPUT_REPORT_BT_MINIMAL_SIZE,
        }
    }

    /// Whether output reports for this variant carry a trailing CRC32
    pub fn has_checksum(&self) -> bool {
        matches!(self, Self::Bluetooth)
    }

    /// Whether the device accepts output reports in this variant
    pub fn accepts_output(&self) -> bool {
        !matches!(self, Self::BluetoothMinimal)
    }

    /// Whether input reports carry more than the sticks and buttons
    pub fn is_full_report(&self) -> bool {
        !matches!(self, Self::BluetoothMinimal)
    }

    pub fn layout(&self) -> &'static ReportLayout {
        match self {
            Self::Usb => &USB_LAYOUT,
            Self::Bluetooth => &BT_LAYOUT,
            Self::BluetoothMinimal => &BT_MINIMAL_LAYOUT,
        }
    }
}

impl Display for ConnectionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionType::Usb => write!(f, "USB"),
            ConnectionType::Bluetooth => write!(f, "Bluetooth"),
            ConnectionType::BluetoothMinimal => write!(f, "Bluetooth (minimum features)"),
        }
    }
}

/// Every named index is relative to the byte that follows the report id.
pub const BASE_OFFSET: usize = 1;

/// Named field indexes of one input report variant. Multi-byte groups store
/// the index of their first byte. Sensor groups are laid out as x, y, z with
/// the low byte first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportLayout {
    /// Left x, left y, right x, right y, L2, R2
    pub axes: [usize; 6],
    pub buttons: [usize; 3],
    pub seq_number: Option<usize>,
    pub timestamp: Option<usize>,
    pub gyroscope: Option<usize>,
    pub accelerometer: Option<usize>,
    pub sensor_timestamp: Option<usize>,
    pub touch: Option<[usize; 2]>,
    /// Right, left
    pub trigger_feedback: Option<[usize; 2]>,
    pub battery: Option<usize>,
}

pub const USB_LAYOUT: ReportLayout = ReportLayout {
    axes: [0, 1, 2, 3, 4, 5],
    buttons: [7, 8, 9],
    seq_number: Some(6),
    timestamp: Some(11),
    gyroscope: Some(15),
    accelerometer: Some(21),
    sensor_timestamp: Some(27),
    touch: Some([32, 36]),
    trigger_feedback: Some([41, 42]),
    battery: Some(52),
};

pub const BT_LAYOUT: ReportLayout = ReportLayout {
    axes: [1, 2, 3, 4, 5, 6],
    buttons: [8, 9, 10],
    seq_number: Some(7),
    timestamp: Some(12),
    gyroscope: Some(16),
    accelerometer: Some(22),
    sensor_timestamp: Some(28),
    touch: Some([33, 37]),
    trigger_feedback: Some([42, 43]),
    battery: Some(53),
};

pub const BT_MINIMAL_LAYOUT: ReportLayout = ReportLayout {
    axes: [0, 1, 2, 3, 7, 8],
    buttons: [4, 5, 6],
    seq_number: None,
    timestamp: None,
    gyroscope: None,
    accelerometer: None,
    sensor_timestamp: None,
    touch: None,
    trigger_feedback: None,
    battery: None,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    LeftStickX = 0,
    LeftStickY = 1,
    RightStickX = 2,
    RightStickY = 3,
    L2 = 4,
    R2 = 5,
}

/// Digital buttons, described by their button byte and bit mask
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    Square,
    Cross,
    Circle,
    Triangle,
    L1,
    R1,
    L2,
    R2,
    Create,
    Options,
    L3,
    R3,
    Ps,
    Touchpad,
    Mute,
}

impl Button {
    pub fn location(&self) -> (usize, u8) {
        match self {
            Button::Square => (0, 0x10),
            Button::Cross => (0, 0x20),
            Button::Circle => (0, 0x40),
            Button::Triangle => (0, 0x80),
            Button::L1 => (1, 0x01),
            Button::R1 => (1, 0x02),
            Button::L2 => (1, 0x04),
            Button::R2 => (1, 0x08),
            Button::Create => (1, 0x10),
            Button::Options => (1, 0x20),
            Button::L3 => (1, 0x40),
            Button::R3 => (1, 0x80),
            Button::Ps => (2, 0x01),
            Button::Touchpad => (2, 0x02),
            Button::Mute => (2, 0x04),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerSide {
    Right = 0,
    Left = 1,
}

/// D-pad hat value stored in the low nibble of the first button byte
#[derive(PrimitiveEnum_u8, Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum Direction {
    North = 0,
    NorthEast = 1,
    East = 2,
    SouthEast = 3,
    South = 4,
    SouthWest = 5,
    West = 6,
    NorthWest = 7,
    #[default]
    None = 8,
}

impl Direction {
    pub fn from_nibble(value: u8) -> Self {
        Self::from_primitive(value & 0x0F).unwrap_or_default()
    }

    pub fn is_up(&self) -> bool {
        matches!(self, Self::North | Self::NorthEast | Self::NorthWest)
    }

    pub fn is_right(&self) -> bool {
        matches!(self, Self::NorthEast | Self::East | Self::SouthEast)
    }

    pub fn is_down(&self) -> bool {
        matches!(self, Self::SouthEast | Self::South | Self::SouthWest)
    }

    pub fn is_left(&self) -> bool {
        matches!(self, Self::SouthWest | Self::West | Self::NorthWest)
    }
}

/// Combine a sensor register pair into its signed value
pub fn decode_sensor_axis(high: u8, low: u8) -> i16 {
    let raw = ((high as i32) << 8) | low as i32;
    let signed = if raw > 0x7FFF { raw - 0x10000 } else { raw };
    signed as i16
}

/// Battery state from the two status bytes. The level nibble counts in
/// eighths and saturates at 8.
pub fn decode_battery(byte0: u8, byte1: u8) -> Battery {
    let level = (byte0 & 0x0F).min(8);
    Battery {
        level_percentage: level as f64 / 8.0 * 100.0,
        full: byte0 & 0x20 != 0,
        charging: byte1 & 0x08 != 0,
    }
}

pub fn decode_trigger_feedback(byte: u8) -> TriggerFeedback {
    TriggerFeedback {
        active: byte & 0x10 != 0,
        value: byte,
    }
}

#[derive(PackedStruct, Debug, Copy, Clone, PartialEq)]
#[packed_struct(bit_numbering = "msb0", size_bytes = "4")]
pub struct TouchFingerData {
    // byte 0
    // High bit is set when the finger is not touching. The rest is the touch id.
    #[packed_field(bytes = "0")]
    pub context: u8,
    // byte 1
    #[packed_field(bytes = "1")]
    pub x_lo: u8,
    // byte 2
    #[packed_field(bits = "16..=19")]
    pub y_lo: Integer<u8, packed_bits::Bits<4>>,
    #[packed_field(bits = "20..=23")]
    pub x_hi: Integer<u8, packed_bits::Bits<4>>,
    // byte 3
    #[packed_field(bytes = "3")]
    pub y_hi: u8,
}

impl Default for TouchFingerData {
    fn default() -> Self {
        Self {
            context: 0x80,
            x_lo: Default::default(),
            y_lo: Default::default(),
            x_hi: Default::default(),
            y_hi: Default::default(),
        }
    }
}

impl TouchFingerData {
    pub fn from_bytes(bytes: [u8; 4]) -> Self {
        Self {
            context: bytes[0],
            x_lo: bytes[1],
            y_lo: Integer::from_primitive((bytes[2] & 0xF0) >> 4),
            x_hi: Integer::from_primitive(bytes[2] & 0x0F),
            y_hi: bytes[3],
        }
    }

    pub fn is_active(&self) -> bool {
        self.context & 0x80 == 0
    }

    pub fn id(&self) -> u8 {
        self.context & 0x7F
    }

    pub fn get_x(&self) -> u16 {
        let x_hi = self.x_hi.to_primitive() as u16;
        (x_hi << 8) | self.x_lo as u16
    }

    pub fn get_y(&self) -> u16 {
        let y_lo = self.y_lo.to_primitive() as u16;
        ((self.y_hi as u16) << 4) | y_lo
    }

    pub fn set_x(&mut self, x_raw: u16) {
        self.x_lo = (x_raw & 0x00FF) as u8;
        self.x_hi = Integer::from_primitive(((x_raw & 0x0F00) >> 8) as u8);
    }

    pub fn set_y(&mut self, y_raw: u16) {
        self.y_lo = Integer::from_primitive((y_raw & 0x000F) as u8);
        self.y_hi = ((y_raw & 0x0FF0) >> 4) as u8;
    }

    pub fn to_touch_finger(&self) -> TouchFinger {
        TouchFinger {
            active: self.is_active(),
            id: self.id(),
            x: self.get_x(),
            y: self.get_y(),
        }
    }
}

/// DualSense input report of any wire variant. The buffer is sized for the
/// largest variant and only the first `connection_type.input_report_size()`
/// bytes are meaningful.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct InputReport {
    connection_type: ConnectionType,
    data: [u8; INPUT_REPORT_BT_SIZE],
}

impl InputReport {
    /// Copy the given bytes into a new report. The length must match the
    /// connection type exactly.
    pub fn new(connection_type: ConnectionType, buf: &[u8]) -> Result<Self, ReportError> {
        let expected = connection_type.input_report_size();
        if buf.len() != expected {
            return Err(ReportError::InvalidReportLength {
                connection_type,
                expected,
                actual: buf.len(),
            });
        }
        let mut data = [0; INPUT_REPORT_BT_SIZE];
        data[..expected].copy_from_slice(buf);
        Ok(Self {
            connection_type,
            data,
        })
    }

    /// A report with every field zeroed, for a given variant
    pub fn empty(connection_type: ConnectionType) -> Self {
        Self {
            connection_type,
            data: [0; INPUT_REPORT_BT_SIZE],
        }
    }

    pub fn connection_type(&self) -> ConnectionType {
        self.connection_type
    }

    pub fn layout(&self) -> &'static ReportLayout {
        self.connection_type.layout()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.connection_type.input_report_size()]
    }

    /// Read the byte at the given named index.
    ///
    /// Panics if the index lies outside of the report. Layout tables are
    /// constant, so this only happens on a programming error.
    pub fn get(&self, index: usize) -> u8 {
        let offset = BASE_OFFSET + index;
        let size = self.connection_type.input_report_size();
        assert!(
            offset < size,
            "offset {offset} is out of range for a {size} byte {} report",
            self.connection_type
        );
        self.data[offset]
    }

    /// Write the byte at the given named index
    pub fn set(&mut self, index: usize, value: u8) {
        let offset = BASE_OFFSET + index;
        let size = self.connection_type.input_report_size();
        assert!(
            offset < size,
            "offset {offset} is out of range for a {size} byte {} report",
            self.connection_type
        );
        self.data[offset] = value;
    }

    fn require(&self, index: Option<usize>, field: &str) -> usize {
        match index {
            Some(index) => index,
            None => panic!("{} reports do not carry {field}", self.connection_type),
        }
    }

    pub fn axis(&self, axis: Axis) -> u8 {
        self.get(self.layout().axes[axis as usize])
    }

    pub fn buttons(&self, number: usize) -> u8 {
        self.get(self.layout().buttons[number])
    }

    pub fn button(&self, button: Button) -> bool {
        let (number, mask) = button.location();
        self.buttons(number) & mask != 0
    }

    /// Raw d-pad nibble
    pub fn dpad(&self) -> u8 {
        self.buttons(0) & 0x0F
    }

    pub fn direction(&self) -> Direction {
        Direction::from_nibble(self.dpad())
    }

    pub fn seq_number(&self) -> u8 {
        let index = self.require(self.layout().seq_number, "a sequence number");
        self.get(index)
    }

    pub fn timestamp(&self) -> u32 {
        let index = self.require(self.layout().timestamp, "a timestamp");
        self.read_u32(index)
    }

    pub fn sensor_timestamp(&self) -> u32 {
        let index = self.require(self.layout().sensor_timestamp, "a sensor timestamp");
        self.read_u32(index)
    }

    fn read_u32(&self, index: usize) -> u32 {
        u32::from_le_bytes([
            self.get(index),
            self.get(index + 1),
            self.get(index + 2),
            self.get(index + 3),
        ])
    }

    /// Signed sensor value of the axis group starting at `index`. Axis 0 is x,
    /// 1 is y and 2 is z.
    fn sensor_axis(&self, index: usize, axis: usize) -> i16 {
        let low = self.get(index + axis * 2);
        let high = self.get(index + axis * 2 + 1);
        decode_sensor_axis(high, low)
    }

    pub fn gyroscope(&self) -> Gyroscope {
        let index = self.require(self.layout().gyroscope, "gyroscope data");
        Gyroscope {
            x: self.sensor_axis(index, 0),
            y: self.sensor_axis(index, 1),
            z: self.sensor_axis(index, 2),
        }
    }

    pub fn accelerometer(&self) -> Accelerometer {
        let index = self.require(self.layout().accelerometer, "accelerometer data");
        Accelerometer {
            x: self.sensor_axis(index, 0),
            y: self.sensor_axis(index, 1),
            z: self.sensor_axis(index, 2),
        }
    }

    /// Touch slot 0 or 1
    pub fn touch_finger_data(&self, slot: usize) -> TouchFingerData {
        let touch = self.require(self.layout().touch.map(|t| t[slot]), "touch data");
        TouchFingerData::from_bytes([
            self.get(touch),
            self.get(touch + 1),
            self.get(touch + 2),
            self.get(touch + 3),
        ])
    }

    pub fn touch_finger(&self, slot: usize) -> TouchFinger {
        self.touch_finger_data(slot).to_touch_finger()
    }

    pub fn trigger_feedback(&self, side: TriggerSide) -> TriggerFeedback {
        let index = self.require(
            self.layout().trigger_feedback.map(|f| f[side as usize]),
            "trigger feedback",
        );
        decode_trigger_feedback(self.get(index))
    }

    pub fn battery(&self) -> Battery {
        let index = self.require(self.layout().battery, "battery data");
        decode_battery(self.get(index), self.get(index + 1))
    }
}

impl Display for InputReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} report: {:02x?}", self.connection_type, self.as_bytes())
    }
}

/// Adaptive trigger effect block, one per trigger
#[derive(PackedStruct, Debug, Copy, Clone, PartialEq, Default)]
#[packed_struct(bit_numbering = "msb0", size_bytes = "11")]
pub struct TriggerEffectData {
    #[packed_field(bytes = "0")]
    pub mode: u8,
    #[packed_field(bytes = "1..=6")]
    pub params: [u8; 6],
    #[packed_field(bytes = "7..=8")]
    pub _unkn: [u8; 2],
    #[packed_field(bytes = "9")]
    pub param7: u8,
    #[packed_field(bytes = "10")]
    pub _unkn_2: u8,
}

/// Output state shared by the USB and Bluetooth output reports
#[derive(PackedStruct, Debug, Copy, Clone, PartialEq, Default)]
#[packed_struct(bit_numbering = "msb0", size_bytes = "47")]
pub struct SetStatePackedOutputData {
    // byte 0-1
    #[packed_field(bytes = "0")]
    pub flags_physics: u8,
    #[packed_field(bytes = "1")]
    pub flags_controls: u8,

    // byte 2-3
    #[packed_field(bytes = "2")]
    pub motor_right: u8,
    #[packed_field(bytes = "3")]
    pub motor_left: u8,

    // byte 4-7
    #[packed_field(bytes = "4")]
    pub volume_headphones: u8,
    #[packed_field(bytes = "5")]
    pub volume_speakers: u8,
    #[packed_field(bytes = "6")]
    pub volume_mic: u8,
    #[packed_field(bytes = "7")]
    pub audio_control: u8,

    // byte 8-9
    #[packed_field(bytes = "8")]
    pub mic_led: u8,
    #[packed_field(bytes = "9")]
    pub power_save_control: u8, // 0x10 mutes the microphone

    // byte 10-31
    #[packed_field(bytes = "10..=20")]
    pub right_trigger_effect: TriggerEffectData,
    #[packed_field(bytes = "21..=31")]
    pub left_trigger_effect: TriggerEffectData,

    // byte 32-37
    #[packed_field(bytes = "32..=35")]
    pub host_timestamp: [u8; 4],
    #[packed_field(bytes = "36")]
    pub motor_power_reduction: u8,
    #[packed_field(bytes = "37")]
    pub audio_control_2: u8,

    // byte 38-39
    #[packed_field(bytes = "38")]
    pub led_options: u8,
    #[packed_field(bytes = "39")]
    pub _unkn_1: u8,

    // byte 40-43
    #[packed_field(bytes = "40")]
    pub lightbar_mode: u8,
    #[packed_field(bytes = "41")]
    pub pulse_options: u8,
    #[packed_field(bytes = "42")]
    pub player_leds_brightness: u8,
    #[packed_field(bytes = "43")]
    pub player_leds_enable: u8,

    // byte 44-46
    #[packed_field(bytes = "44")]
    pub led_red: u8,
    #[packed_field(bytes = "45")]
    pub led_green: u8,
    #[packed_field(bytes = "46")]
    pub led_blue: u8,
}

#[derive(PackedStruct, Debug, Copy, Clone, PartialEq)]
#[packed_struct(bit_numbering = "msb0", size_bytes = "48")]
pub struct UsbPackedOutputReportShort {
    // byte 0
    #[packed_field(bytes = "0")]
    pub report_id: u8, // Report ID (always 0x02)

    // byte 1-47
    #[packed_field(bytes = "1..=47")]
    pub state: SetStatePackedOutputData,
}

impl Default for UsbPackedOutputReportShort {
    fn default() -> Self {
        Self {
            report_id: OUTPUT_REPORT_USB,
            state: Default::default(),
        }
    }
}

#[derive(PackedStruct, Debug, Copy, Clone, PartialEq)]
#[packed_struct(bit_numbering = "msb0", size_bytes = "78")]
pub struct BluetoothPackedOutputReport {
    // byte 0
    #[packed_field(bytes = "0")]
    pub report_id: u8, // Report ID (always 0x31)
    #[packed_field(bytes = "1")]
    pub tag: u8, // Always 0x02

    // byte 2-48
    #[packed_field(bytes = "2..=48")]
    pub state: SetStatePackedOutputData,

    // byte 49-73
    #[packed_field(bytes = "49..=73")]
    pub _padding: [u8; 25],

    // byte 74-77
    #[packed_field(bytes = "74..=77", endian = "lsb")]
    pub crc: Integer<u32, packed_bits::Bits<32>>,
}

impl Default for BluetoothPackedOutputReport {
    fn default() -> Self {
        Self {
            report_id: OUTPUT_REPORT_BT,
            tag: OUTPUT_REPORT_BT_TAG,
            state: Default::default(),
            _padding: Default::default(),
            crc: Default::default(),
        }
    }
}

/// CRC32 over a Bluetooth output report without its trailing checksum. The
/// device seeds the checksum with the HID output transaction header.
pub fn output_report_crc(data: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&[BT_OUTPUT_CRC_SEED]);
    hasher.update(data);
    hasher.finalize()
}

/// Serialize the given output state into the wire format of the connection
pub fn encode_output_report(
    connection_type: ConnectionType,
    state: &SetStatePackedOutputData,
) -> Result<Vec<u8>, ReportError> {
    match connection_type {
        ConnectionType::Usb => {
            let report = UsbPackedOutputReportShort {
                state: *state,
                ..Default::default()
            };
            Ok(report.pack()?.to_vec())
        }
        ConnectionType::Bluetooth => {
            let report = BluetoothPackedOutputReport {
                state: *state,
                ..Default::default()
            };
            let mut buf = report.pack()?;
            let crc_start = OUTPUT_REPORT_BT_SIZE - 4;
            let crc = output_report_crc(&buf[..crc_start]);
            buf[crc_start..].copy_from_slice(&crc.to_le_bytes());
            Ok(buf.to_vec())
        }
        ConnectionType::BluetoothMinimal => Ok(vec![0; OUTPUT_REPORT_BT_MINIMAL_SIZE]),
    }
}
