use std::error::Error;

use packed_struct::PackedStructSlice;

use crate::drivers::dualsense::driver::{
    INPUT_REPORT_BT, INPUT_REPORT_USB, OUTPUT_REPORT_BT, OUTPUT_REPORT_USB,
};
use crate::drivers::dualsense::hid_report::{
    decode_battery, decode_sensor_axis, decode_trigger_feedback, encode_output_report, Axis,
    Button, ConnectionType, Direction, InputReport, ReportError, SetStatePackedOutputData,
    TouchFingerData, TriggerEffectData, TriggerSide, BASE_OFFSET,
};

#[test]
fn test_sensor_axis_decode() -> Result<(), Box<dyn Error>> {
    assert_eq!(decode_sensor_axis(0xFF, 0xFF), -1);
    assert_eq!(decode_sensor_axis(0x80, 0x00), -32768);
    assert_eq!(decode_sensor_axis(0x7F, 0xFF), 32767);
    assert_eq!(decode_sensor_axis(0x00, 0x00), 0);

    for value in [i16::MIN, -1234, -1, 0, 1, 4321, i16::MAX] {
        let [high, low] = value.to_be_bytes();
        assert_eq!(
            decode_sensor_axis(high, low),
            value,
            "Sensor value {value} should survive decoding"
        );
    }

    Ok(())
}

#[test]
fn test_touch_finger_data() -> Result<(), Box<dyn Error>> {
    let mut finger = TouchFingerData::default();
    assert!(!finger.is_active(), "Default finger should not be touching");
    finger.set_y(1068);
    finger.set_x(1919);
    assert_eq!(finger.get_y(), 1068);
    assert_eq!(finger.get_x(), 1919);
    assert_eq!(finger.pack_to_vec()?, vec![0x80, 0x7F, 0xC7, 0x42]);

    let decoded = TouchFingerData::from_bytes([0x80, 0x7F, 0xC7, 0x42]);
    assert_eq!(decoded, finger, "Decoding should match the packed bytes");

    Ok(())
}

#[test]
fn test_touch_finger_boundaries() -> Result<(), Box<dyn Error>> {
    let finger = TouchFingerData::from_bytes([0x80, 0, 0, 0]).to_touch_finger();
    assert!(!finger.active, "High bit set means no touch");

    let finger = TouchFingerData::from_bytes([0x00, 0, 0, 0]).to_touch_finger();
    assert!(finger.active, "High bit clear means touch");
    assert_eq!(finger.id, 0);

    let finger = TouchFingerData::from_bytes([0x7F, 0, 0, 0]).to_touch_finger();
    assert!(finger.active);
    assert_eq!(finger.id, 127);

    Ok(())
}

#[test]
fn test_battery_decode() -> Result<(), Box<dyn Error>> {
    assert_eq!(decode_battery(0x08, 0x00).level_percentage, 100.0);
    assert_eq!(
        decode_battery(0x09, 0x00).level_percentage,
        100.0,
        "Level nibbles above 8 should clamp"
    );
    assert_eq!(decode_battery(0x0F, 0x00).level_percentage, 100.0);
    assert_eq!(decode_battery(0x04, 0x00).level_percentage, 50.0);
    assert_eq!(decode_battery(0x00, 0x00).level_percentage, 0.0);

    let battery = decode_battery(0x28, 0x08);
    assert!(battery.full, "Bit 5 of the first byte marks a full battery");
    assert!(battery.charging, "Bit 3 of the second byte marks charging");

    let battery = decode_battery(0x05, 0x00);
    assert!(!battery.full);
    assert!(!battery.charging);

    Ok(())
}

#[test]
fn test_trigger_feedback_decode() -> Result<(), Box<dyn Error>> {
    let feedback = decode_trigger_feedback(0x19);
    assert!(feedback.active);
    assert_eq!(feedback.value, 0x19);
    assert!(!decode_trigger_feedback(0x09).active);

    Ok(())
}

#[test]
fn test_direction() -> Result<(), Box<dyn Error>> {
    let expected = [
        // up, right, down, left
        (0, [true, false, false, false]),
        (1, [true, true, false, false]),
        (2, [false, true, false, false]),
        (3, [false, true, true, false]),
        (4, [false, false, true, false]),
        (5, [false, false, true, true]),
        (6, [false, false, false, true]),
        (7, [true, false, false, true]),
        (8, [false, false, false, false]),
    ];
    for (nibble, flags) in expected {
        let d = Direction::from_nibble(nibble);
        assert_eq!(
            [d.is_up(), d.is_right(), d.is_down(), d.is_left()],
            flags,
            "Unexpected directions for d-pad value {nibble}"
        );
    }
    // Only the low nibble carries the d-pad
    assert_eq!(Direction::from_nibble(0xF2), Direction::East);
    assert_eq!(Direction::from_nibble(0x0C), Direction::None);

    Ok(())
}

#[test]
fn test_connection_type_detection() -> Result<(), Box<dyn Error>> {
    assert_eq!(ConnectionType::from_report_len(64)?, ConnectionType::Usb);
    assert_eq!(ConnectionType::from_report_len(78)?, ConnectionType::Bluetooth);
    assert_eq!(
        ConnectionType::from_report_len(10)?,
        ConnectionType::BluetoothMinimal
    );
    for len in [0, 9, 11, 63, 65, 77, 79, 100] {
        let result = ConnectionType::from_report_len(len);
        assert!(
            matches!(result, Err(ReportError::InvalidConnectionType(l)) if l == len),
            "Length {len} should not select a connection type"
        );
    }
    assert!(ConnectionType::Bluetooth.has_checksum());
    assert!(!ConnectionType::Usb.has_checksum());
    assert!(!ConnectionType::BluetoothMinimal.accepts_output());

    Ok(())
}

#[test]
fn test_usb_input_report() -> Result<(), Box<dyn Error>> {
    let mut buf = [0u8; 64];
    buf[0] = INPUT_REPORT_USB;
    // Axes
    buf[1..=6].copy_from_slice(&[10, 20, 30, 40, 50, 60]);
    // Buttons: d-pad south-west with cross, then L1 and options, then mute
    buf[8] = 0x25;
    buf[9] = 0x21;
    buf[10] = 0x04;
    // Gyroscope x = -2, little endian pairs
    buf[16] = 0xFE;
    buf[17] = 0xFF;
    // Accelerometer z = 8192
    buf[26] = 0x00;
    buf[27] = 0x20;
    // Touch slot 1
    buf[37..=40].copy_from_slice(&[0x05, 0x7F, 0xC7, 0x42]);
    // Trigger feedback right, left
    buf[42] = 0x10;
    buf[43] = 0x00;
    // Battery
    buf[53] = 0x24;
    buf[54] = 0x08;

    let report = InputReport::new(ConnectionType::Usb, &buf)?;
    assert_eq!(report.as_bytes(), &buf[..]);
    assert_eq!(report.axis(Axis::LeftStickX), 10);
    assert_eq!(report.axis(Axis::RightStickY), 40);
    assert_eq!(report.axis(Axis::R2), 60);
    assert_eq!(report.direction(), Direction::SouthWest);
    assert!(report.button(Button::Cross));
    assert!(!report.button(Button::Square));
    assert!(report.button(Button::L1));
    assert!(report.button(Button::Options));
    assert!(report.button(Button::Mute));
    assert!(!report.button(Button::Ps));
    assert_eq!(report.gyroscope().x, -2);
    assert_eq!(report.accelerometer().z, 8192);

    let finger = report.touch_finger(1);
    assert!(finger.active);
    assert_eq!(finger.id, 5);
    assert_eq!((finger.x, finger.y), (1919, 1068));

    assert!(report.trigger_feedback(TriggerSide::Right).active);
    assert!(!report.trigger_feedback(TriggerSide::Left).active);

    let battery = report.battery();
    assert_eq!(battery.level_percentage, 50.0);
    assert!(battery.full);
    assert!(battery.charging);

    Ok(())
}

#[test]
fn test_bluetooth_input_report() -> Result<(), Box<dyn Error>> {
    let mut buf = [0u8; 78];
    buf[0] = INPUT_REPORT_BT;
    buf[2..=7].copy_from_slice(&[1, 2, 3, 4, 5, 6]);
    buf[9] = 0x88; // d-pad none, triangle
    buf[11] = 0x01; // PS
    buf[17] = 0x01; // gyroscope x = 1
    buf[54] = 0x08; // battery full level

    let report = InputReport::new(ConnectionType::Bluetooth, &buf)?;
    assert_eq!(report.axis(Axis::LeftStickX), 1);
    assert_eq!(report.axis(Axis::R2), 6);
    assert_eq!(report.direction(), Direction::None);
    assert!(report.button(Button::Triangle));
    assert!(report.button(Button::Ps));
    assert_eq!(report.gyroscope().x, 1);
    assert_eq!(report.battery().level_percentage, 100.0);

    Ok(())
}

#[test]
fn test_bluetooth_minimal_input_report() -> Result<(), Box<dyn Error>> {
    let buf = [0x01, 11, 22, 33, 44, 0x13, 0x02, 0x01, 55, 66];
    let report = InputReport::new(ConnectionType::BluetoothMinimal, &buf)?;
    assert_eq!(report.axis(Axis::LeftStickX), 11);
    assert_eq!(report.axis(Axis::RightStickY), 44);
    assert_eq!(report.axis(Axis::L2), 55);
    assert_eq!(report.axis(Axis::R2), 66);
    assert_eq!(report.direction(), Direction::SouthEast);
    assert!(report.button(Button::Square));
    assert!(report.button(Button::R1));
    assert!(report.button(Button::Ps));
    assert!(report.layout().gyroscope.is_none());
    assert!(report.layout().battery.is_none());

    Ok(())
}

#[test]
fn test_input_report_length_mismatch() -> Result<(), Box<dyn Error>> {
    let buf = [0u8; 78];
    let result = InputReport::new(ConnectionType::Usb, &buf);
    assert!(
        matches!(
            result,
            Err(ReportError::InvalidReportLength {
                expected: 64,
                actual: 78,
                ..
            })
        ),
        "A Bluetooth sized report must not decode as USB"
    );

    Ok(())
}

#[test]
#[should_panic]
fn test_input_report_out_of_range() {
    let report = InputReport::empty(ConnectionType::BluetoothMinimal);
    report.get(10 - BASE_OFFSET);
}

fn sample_state() -> SetStatePackedOutputData {
    SetStatePackedOutputData {
        flags_physics: 0xFF,
        flags_controls: 0x56,
        lightbar_mode: 1,
        led_red: 0x10,
        led_green: 0x20,
        led_blue: 0x30,
        ..Default::default()
    }
}

#[test]
fn test_usb_output_report() -> Result<(), Box<dyn Error>> {
    let state = SetStatePackedOutputData {
        motor_right: 0x11,
        motor_left: 0x22,
        mic_led: 1,
        power_save_control: 0x10,
        right_trigger_effect: TriggerEffectData {
            mode: 0x26,
            params: [1, 2, 3, 4, 5, 6],
            param7: 7,
            ..Default::default()
        },
        player_leds_enable: 0b00100,
        ..sample_state()
    };
    let buf = encode_output_report(ConnectionType::Usb, &state)?;
    assert_eq!(buf.len(), 48);
    assert_eq!(buf[0], OUTPUT_REPORT_USB);
    assert_eq!(buf[1], 0xFF, "Physics flags");
    assert_eq!(buf[2], 0x56, "Control flags");
    assert_eq!(buf[3], 0x11, "Right motor");
    assert_eq!(buf[4], 0x22, "Left motor");
    assert_eq!(buf[9], 1, "Microphone LED");
    assert_eq!(buf[10], 0x10, "Microphone mute");
    assert_eq!(buf[11..=17], [0x26, 1, 2, 3, 4, 5, 6], "Right trigger effect");
    assert_eq!(buf[20], 7, "Right trigger effect param 7");
    assert_eq!(buf[41], 1, "Lightbar on");
    assert_eq!(buf[44], 0b00100, "Player LEDs");
    assert_eq!(buf[45..=47], [0x10, 0x20, 0x30], "Lightbar color");

    Ok(())
}

#[test]
fn test_bluetooth_output_report_crc() -> Result<(), Box<dyn Error>> {
    let empty = encode_output_report(ConnectionType::Bluetooth, &Default::default())?;
    assert_eq!(empty.len(), 78);
    assert_eq!(empty[0], OUTPUT_REPORT_BT);
    assert_eq!(empty[1], 0x02);
    assert_eq!(empty[74..], 0xF7E7A126u32.to_le_bytes());

    let buf = encode_output_report(ConnectionType::Bluetooth, &sample_state())?;
    assert_eq!(buf[2], 0xFF, "State block starts after the tag");
    assert_eq!(buf[42], 1, "Lightbar on");
    assert_eq!(buf[46..=48], [0x10, 0x20, 0x30], "Lightbar color");
    assert_eq!(buf[74..], 0x5AD01CF8u32.to_le_bytes());

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&[0xA2]);
    hasher.update(&buf[..74]);
    assert_eq!(
        buf[74..],
        hasher.finalize().to_le_bytes(),
        "Checksum should cover every preceding byte"
    );

    Ok(())
}

#[test]
fn test_bluetooth_minimal_output_report() -> Result<(), Box<dyn Error>> {
    let buf = encode_output_report(ConnectionType::BluetoothMinimal, &sample_state())?;
    assert_eq!(buf, vec![0; 10]);

    Ok(())
}
