use std::error::Error;

use crate::state::mapping::{
    number_map, Control, FromTo, Mapping, MappingError, NumberType, Tolerances, ValueMapper,
};
use crate::state::value::{JoyStick, Orientation};

#[test]
fn test_number_map() -> Result<(), Box<dyn Error>> {
    assert_eq!(number_map(0.0, 0.0, 255.0, -128.0, 127.0), -128.0);
    assert_eq!(number_map(255.0, 0.0, 255.0, -128.0, 127.0), 127.0);
    assert_eq!(number_map(255.0, 0.0, 255.0, 255.0, 0.0), 0.0);
    assert_eq!(
        number_map(42.0, 0.0, 255.0, 0.0, 255.0),
        42.0,
        "Identical ranges should pass values through"
    );

    Ok(())
}

#[test]
fn test_default_mapping_boundaries() -> Result<(), Box<dyn Error>> {
    let mapper = ValueMapper::new(Mapping::Default, &Tolerances::default())?;

    let expected = [(0.0, -128.0), (127.0, -1.0), (128.0, 0.0), (255.0, 127.0)];
    for (raw, mapped) in expected {
        assert_eq!(
            mapper.raw_to_mapped(Control::LeftStickX, raw),
            mapped,
            "Raw {raw} should map to {mapped}"
        );
        assert_eq!(
            mapper.mapped_to_raw(Control::LeftStickX, mapped),
            raw,
            "Mapped {mapped} should map back to raw {raw}"
        );
    }

    // The y axis points up
    assert_eq!(mapper.raw_to_mapped(Control::LeftStickY, 0.0), 127.0);
    assert_eq!(mapper.raw_to_mapped(Control::LeftStickY, 255.0), -128.0);
    for raw in [0.0, 127.0, 128.0, 255.0] {
        let mapped = mapper.raw_to_mapped(Control::RightStickY, raw);
        assert_eq!(mapper.mapped_to_raw(Control::RightStickY, mapped), raw);
    }

    // Triggers are not remapped under this mapping
    assert_eq!(mapper.raw_to_mapped(Control::LeftTrigger, 200.0), 200.0);
    assert!(mapper.from_to(Control::MotorLeft).is_none());

    Ok(())
}

/// Largest raw error a round trip through the range may introduce: the
/// precision lost in mapped units, scaled back to raw, plus raw truncation
fn round_trip_tolerance(from_to: Option<FromTo>) -> f64 {
    let Some(from_to) = from_to else {
        return 0.0;
    };
    let scale = ((from_to.from_max - from_to.from_min) / (from_to.to_max - from_to.to_min)).abs();
    let mapped_precision = match from_to.to_type {
        NumberType::Integer => 1.0,
        NumberType::Float { round_digits } => 0.5 * 10f64.powi(-round_digits),
    };
    scale * mapped_precision + 1.0
}

#[test]
fn test_round_trips_within_tolerance() -> Result<(), Box<dyn Error>> {
    let mappings = [
        Mapping::Raw,
        Mapping::RawInverted,
        Mapping::Hundred,
        Mapping::Default,
        Mapping::DefaultInverted,
        Mapping::Normalized,
        Mapping::NormalizedInverted,
    ];
    let controls = [
        Control::LeftStickX,
        Control::LeftStickY,
        Control::RightStickX,
        Control::RightStickY,
        Control::LeftTrigger,
        Control::RightTrigger,
        Control::MotorLeft,
        Control::MotorRight,
    ];
    for mapping in mappings {
        let mapper = ValueMapper::new(mapping, &Tolerances::default())?;
        for control in controls {
            let tolerance = round_trip_tolerance(mapper.from_to(control));
            for raw in [0.0, 127.0, 128.0, 255.0] {
                let mapped = mapper.raw_to_mapped(control, raw);
                let back = mapper.mapped_to_raw(control, mapped);
                assert!(
                    (back - raw).abs() <= tolerance,
                    "{mapping:?} {control:?}: raw {raw} came back as {back}"
                );
            }
        }
    }

    Ok(())
}

#[test]
fn test_float_mapping_rounds() -> Result<(), Box<dyn Error>> {
    let from_to = FromTo::float(0.0, 255.0, 0.0, 1.0);
    assert_eq!(from_to.raw_to_mapped(128.0), 0.5);
    assert_eq!(from_to.raw_to_mapped(255.0), 1.0);
    assert_eq!(from_to.mapped_to_raw(1.0), 255.0);
    assert_eq!(from_to.mapped_to_raw(0.5), 127.0, "Raw values are truncated");

    let integer = FromTo::new(0.0, 255.0, 0.0, 100.0);
    assert_eq!(integer.raw_to_mapped(128.0), 50.0);
    assert_eq!(integer.swapped(), FromTo::new(0.0, 100.0, 0.0, 255.0));

    Ok(())
}

#[test]
fn test_tolerances_to_raw() -> Result<(), Box<dyn Error>> {
    let tolerances = Tolerances {
        left_joystick_deadzone: 10.0,
        right_joystick_deadzone: 20.0,
        left_trigger_deadzone: 50.0,
        right_trigger_deadzone: 0.0,
        gyroscope_threshold: 300.0,
        accelerometer_threshold: 40.0,
        orientation_threshold: 180.0,
    };

    let mapper = ValueMapper::new(Mapping::Hundred, &tolerances)?;
    assert_eq!(mapper.left_stick_deadzone_raw, 25.0);
    assert_eq!(mapper.right_stick_deadzone_raw, 51.0);
    assert_eq!(mapper.left_trigger_deadzone_raw, 127.0);
    assert_eq!(mapper.right_trigger_deadzone_raw, 0.0);
    assert_eq!(mapper.gyroscope_threshold_raw, 300.0, "Sensor thresholds are raw");
    assert_eq!(mapper.accelerometer_threshold_raw, 40.0);
    assert!((mapper.orientation_threshold_raw - std::f64::consts::PI).abs() < 1e-9);

    let mapper = ValueMapper::new(Mapping::Raw, &tolerances)?;
    assert_eq!(mapper.left_stick_deadzone_raw, 10.0);
    assert_eq!(mapper.left_trigger_deadzone_raw, 50.0);

    let mapper = ValueMapper::new(
        Mapping::Normalized,
        &Tolerances {
            left_joystick_deadzone: 0.1,
            ..Default::default()
        },
    )?;
    assert_eq!(mapper.left_stick_deadzone_raw, 12.0);

    Ok(())
}

#[test]
fn test_negative_tolerance_rejected() -> Result<(), Box<dyn Error>> {
    let result = ValueMapper::new(
        Mapping::Raw,
        &Tolerances {
            left_trigger_deadzone: -1.0,
            ..Default::default()
        },
    );
    assert_eq!(
        result,
        Err(MappingError::NegativeValue {
            name: "left trigger deadzone",
            value: -1.0
        })
    );

    let result = ValueMapper::new(
        Mapping::Raw,
        &Tolerances {
            orientation_threshold: -0.5,
            ..Default::default()
        },
    );
    assert!(result.is_err());

    Ok(())
}

#[test]
fn test_full_range_tolerances_accepted() -> Result<(), Box<dyn Error>> {
    let mapper = ValueMapper::new(Mapping::Raw, &Tolerances::default())?;
    assert!(mapper.oversized_tolerances().is_empty());

    let mapper = ValueMapper::new(
        Mapping::Raw,
        &Tolerances {
            left_joystick_deadzone: 127.5,
            right_trigger_deadzone: 300.0,
            ..Default::default()
        },
    )?;
    assert_eq!(mapper.left_stick_deadzone_raw, 127.5);
    assert_eq!(mapper.right_trigger_deadzone_raw, 300.0);
    assert_eq!(
        mapper.oversized_tolerances(),
        vec!["left joystick deadzone", "right trigger deadzone"]
    );

    // A full scale deadzone under a mapped range lands on the raw limit
    let mapper = ValueMapper::new(
        Mapping::Hundred,
        &Tolerances {
            left_trigger_deadzone: 100.0,
            ..Default::default()
        },
    )?;
    assert_eq!(mapper.left_trigger_deadzone_raw, 255.0);
    assert_eq!(mapper.oversized_tolerances(), vec!["left trigger deadzone"]);

    Ok(())
}

#[test]
fn test_joystick_fns() -> Result<(), Box<dyn Error>> {
    let mapper = ValueMapper::new(Mapping::Raw, &Tolerances::default())?;
    let (to_mapped, to_raw) = mapper.joystick_fns(Control::LeftStickX, Control::LeftStickY);
    assert!(to_mapped.is_none() && to_raw.is_none());

    let mapper = ValueMapper::new(Mapping::Default, &Tolerances::default())?;
    let (Some(to_mapped), Some(to_raw)) =
        mapper.joystick_fns(Control::LeftStickX, Control::LeftStickY)
    else {
        return Err("Default mapping should map sticks".into());
    };
    let mapped = to_mapped(&JoyStick::new(255.0, 0.0));
    assert_eq!(mapped, JoyStick::new(127.0, 127.0));
    assert_eq!(to_raw(&mapped), JoyStick::new(255.0, 0.0));

    Ok(())
}

#[test]
fn test_orientation_fns() -> Result<(), Box<dyn Error>> {
    let mapper = ValueMapper::new(Mapping::Raw, &Tolerances::default())?;
    let (Some(to_degrees), Some(to_radians)) = mapper.orientation_fns() else {
        return Err("Orientation should always be mapped".into());
    };
    let radians = Orientation {
        pitch: std::f64::consts::PI,
        roll: std::f64::consts::FRAC_PI_2,
        yaw: 0.0,
    };
    let degrees = to_degrees(&radians);
    assert_eq!(
        degrees,
        Orientation {
            pitch: 180.0,
            roll: 90.0,
            yaw: 0.0
        }
    );
    let back = to_radians(&degrees);
    assert!((back.pitch - radians.pitch).abs() < 1e-9);
    assert!((back.roll - radians.roll).abs() < 1e-9);

    Ok(())
}
