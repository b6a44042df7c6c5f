use std::fmt::Display;
use std::sync::{Arc, Mutex};

use crate::drivers::dualsense::hid_report::{
    Axis, Button, ConnectionType, Direction, InputReport, TriggerSide,
};

use super::cell::{lock, timestamp, ListenerId, Listeners, StateCell};
use super::compare::{
    compare_accelerometer, compare_gyroscope, compare_joystick, compare_orientation,
    compare_trigger, JoystickDeadzoneSnap,
};
use super::graph::{CellId, DependencyGraph, GraphBuilder, Node, ReadState, ReportSlot};
use super::mapping::{Control, ValueMapper};
use super::orientation::{OrientationFilter, ZeroOrientation};
use super::value::{
    Accelerometer, Battery, Gyroscope, JoyStick, Orientation, TouchFinger, TriggerFeedback,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadStateName {
    LeftStickX,
    LeftStickY,
    LeftStick,
    RightStickX,
    RightStickY,
    RightStick,
    L2,
    R2,
    Dpad,
    BtnUp,
    BtnRight,
    BtnDown,
    BtnLeft,
    BtnSquare,
    BtnCross,
    BtnCircle,
    BtnTriangle,
    BtnL1,
    BtnR1,
    BtnL2,
    BtnR2,
    BtnCreate,
    BtnOptions,
    BtnL3,
    BtnR3,
    BtnPs,
    BtnTouchpad,
    BtnMute,
    GyroscopeX,
    GyroscopeY,
    GyroscopeZ,
    Gyroscope,
    AccelerometerX,
    AccelerometerY,
    AccelerometerZ,
    Accelerometer,
    Orientation,
    Touch0Active,
    Touch0Id,
    Touch0X,
    Touch0Y,
    TouchFinger1,
    Touch1Active,
    Touch1Id,
    Touch1X,
    Touch1Y,
    TouchFinger2,
    LeftTriggerFeedback,
    RightTriggerFeedback,
    Battery,
}

impl ReadStateName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LeftStickX => "LEFT_STICK_X",
            Self::LeftStickY => "LEFT_STICK_Y",
            Self::LeftStick => "LEFT_STICK",
            Self::RightStickX => "RIGHT_STICK_X",
            Self::RightStickY => "RIGHT_STICK_Y",
            Self::RightStick => "RIGHT_STICK",
            Self::L2 => "L2",
            Self::R2 => "R2",
            Self::Dpad => "DPAD",
            Self::BtnUp => "BTN_UP",
            Self::BtnRight => "BTN_RIGHT",
            Self::BtnDown => "BTN_DOWN",
            Self::BtnLeft => "BTN_LEFT",
            Self::BtnSquare => "BTN_SQUARE",
            Self::BtnCross => "BTN_CROSS",
            Self::BtnCircle => "BTN_CIRCLE",
            Self::BtnTriangle => "BTN_TRIANGLE",
            Self::BtnL1 => "BTN_L1",
            Self::BtnR1 => "BTN_R1",
            Self::BtnL2 => "BTN_L2",
            Self::BtnR2 => "BTN_R2",
            Self::BtnCreate => "BTN_CREATE",
            Self::BtnOptions => "BTN_OPTIONS",
            Self::BtnL3 => "BTN_L3",
            Self::BtnR3 => "BTN_R3",
            Self::BtnPs => "BTN_PS",
            Self::BtnTouchpad => "BTN_TOUCHPAD",
            Self::BtnMute => "BTN_MUTE",
            Self::GyroscopeX => "GYROSCOPE_X",
            Self::GyroscopeY => "GYROSCOPE_Y",
            Self::GyroscopeZ => "GYROSCOPE_Z",
            Self::Gyroscope => "GYROSCOPE",
            Self::AccelerometerX => "ACCELEROMETER_X",
            Self::AccelerometerY => "ACCELEROMETER_Y",
            Self::AccelerometerZ => "ACCELEROMETER_Z",
            Self::Accelerometer => "ACCELEROMETER",
            Self::Orientation => "ORIENTATION",
            Self::Touch0Active => "TOUCH_0_ACTIVE",
            Self::Touch0Id => "TOUCH_0_ID",
            Self::Touch0X => "TOUCH_0_X",
            Self::Touch0Y => "TOUCH_0_Y",
            Self::TouchFinger1 => "TOUCH_FINGER_1",
            Self::Touch1Active => "TOUCH_1_ACTIVE",
            Self::Touch1Id => "TOUCH_1_ID",
            Self::Touch1X => "TOUCH_1_X",
            Self::Touch1Y => "TOUCH_1_Y",
            Self::TouchFinger2 => "TOUCH_FINGER_2",
            Self::LeftTriggerFeedback => "LEFT_TRIGGER_FEEDBACK",
            Self::RightTriggerFeedback => "RIGHT_TRIGGER_FEEDBACK",
            Self::Battery => "BATTERY",
        }
    }
}

impl Display for ReadStateName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Shared handle to a read state
pub type Read<T> = Arc<ReadState<ReadStateName, T>>;

fn cell<T: super::cell::StateValue>(name: ReadStateName) -> StateCell<ReadStateName, T> {
    StateCell::new(name)
}

/// Options controlling how the read graph recomputes its states
pub struct ReadStatesOptions {
    /// Recompute every state on every cycle, listened or not
    pub enforce_update: bool,
    /// Let skipped states recompute themselves when read
    pub can_update_itself: bool,
    pub joystick_deadzone_snap: JoystickDeadzoneSnap,
    pub orientation_filter: Box<dyn OrientationFilter>,
}

impl Default for ReadStatesOptions {
    fn default() -> Self {
        Self {
            enforce_update: false,
            can_update_itself: true,
            joystick_deadzone_snap: JoystickDeadzoneSnap::default(),
            orientation_filter: Box::new(ZeroOrientation),
        }
    }
}

/// Handle for a listener registered with [ReadStates::on_any_change]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnyChangeHandle(Vec<(CellId, ListenerId)>);

/// Every state decoded from the input reports, updated once per input cycle.
///
/// States are recomputed lazily: only states that are listened to, feed a
/// listened state, or depend on a state that just changed are recomputed.
/// Change notifications are deferred until every state of the cycle has been
/// updated, so composite listeners always see consistent constituents.
pub struct ReadStates {
    report: Arc<ReportSlot>,
    graph: DependencyGraph<ReadStateName>,
    enforce_update: bool,
    /// States updated for every connection type. Everything after is only
    /// present in full reports.
    basic_count: usize,
    updated: Listeners<()>,
    update_lock: Mutex<()>,

    pub left_stick_x: Read<f64>,
    pub left_stick_y: Read<f64>,
    pub left_stick: Read<JoyStick>,
    pub right_stick_x: Read<f64>,
    pub right_stick_y: Read<f64>,
    pub right_stick: Read<JoyStick>,
    pub l2: Read<f64>,
    pub r2: Read<f64>,

    pub dpad: Read<u8>,
    pub btn_up: Read<bool>,
    pub btn_right: Read<bool>,
    pub btn_down: Read<bool>,
    pub btn_left: Read<bool>,
    pub btn_square: Read<bool>,
    pub btn_cross: Read<bool>,
    pub btn_circle: Read<bool>,
    pub btn_triangle: Read<bool>,
    pub btn_l1: Read<bool>,
    pub btn_r1: Read<bool>,
    pub btn_l2: Read<bool>,
    pub btn_r2: Read<bool>,
    pub btn_create: Read<bool>,
    pub btn_options: Read<bool>,
    pub btn_l3: Read<bool>,
    pub btn_r3: Read<bool>,
    pub btn_ps: Read<bool>,
    pub btn_touchpad: Read<bool>,
    pub btn_mute: Read<bool>,

    pub gyroscope_x: Read<i16>,
    pub gyroscope_y: Read<i16>,
    pub gyroscope_z: Read<i16>,
    pub gyroscope: Read<Gyroscope>,
    pub accelerometer_x: Read<i16>,
    pub accelerometer_y: Read<i16>,
    pub accelerometer_z: Read<i16>,
    pub accelerometer: Read<Accelerometer>,
    pub orientation: Read<Orientation>,

    pub touch_0_active: Read<bool>,
    pub touch_0_id: Read<u8>,
    pub touch_0_x: Read<u16>,
    pub touch_0_y: Read<u16>,
    pub touch_finger_1: Read<TouchFinger>,
    pub touch_1_active: Read<bool>,
    pub touch_1_id: Read<u8>,
    pub touch_1_x: Read<u16>,
    pub touch_1_y: Read<u16>,
    pub touch_finger_2: Read<TouchFinger>,

    pub left_trigger_feedback: Read<TriggerFeedback>,
    pub right_trigger_feedback: Read<TriggerFeedback>,
    pub battery: Read<Battery>,
}

fn axis(
    builder: &mut GraphBuilder<ReadStateName>,
    name: ReadStateName,
    axis: Axis,
    mapper: &ValueMapper,
    control: Control,
) -> Read<f64> {
    let (raw_to_mapped, mapped_to_raw) = mapper.number_fns(control);
    builder.add(
        cell(name).with_mapping(raw_to_mapped, mapped_to_raw),
        move |r: &InputReport| r.axis(axis) as f64,
    )
}

fn trigger(
    builder: &mut GraphBuilder<ReadStateName>,
    name: ReadStateName,
    axis: Axis,
    mapper: &ValueMapper,
    control: Control,
    deadzone: f64,
) -> Read<f64> {
    let (raw_to_mapped, mapped_to_raw) = mapper.number_fns(control);
    builder.add(
        cell(name)
            .with_mapping(raw_to_mapped, mapped_to_raw)
            .with_compare(move |before, after| compare_trigger(before, after, deadzone)),
        move |r: &InputReport| r.axis(axis) as f64,
    )
}

#[allow(clippy::too_many_arguments)]
fn stick(
    builder: &mut GraphBuilder<ReadStateName>,
    name: ReadStateName,
    x: &Read<f64>,
    y: &Read<f64>,
    (control_x, control_y): (Control, Control),
    mapper: &ValueMapper,
    deadzone: f64,
    snap: JoystickDeadzoneSnap,
) -> Read<JoyStick> {
    let (raw_to_mapped, mapped_to_raw) = mapper.joystick_fns(control_x, control_y);
    let (x, y) = (x.clone(), y.clone());
    builder.add(
        cell(name)
            .with_ignore_none(false)
            .with_mapping(raw_to_mapped, mapped_to_raw)
            .with_compare(move |before, after| compare_joystick(before, after, deadzone, snap)),
        move |_: &InputReport| {
            JoyStick::new(
                x.value_raw().unwrap_or(super::value::STICK_CENTER),
                y.value_raw().unwrap_or(super::value::STICK_CENTER),
            )
        },
    )
}

fn button(
    builder: &mut GraphBuilder<ReadStateName>,
    name: ReadStateName,
    button: Button,
) -> Read<bool> {
    builder.add(cell(name), move |r: &InputReport| r.button(button))
}

fn direction(
    builder: &mut GraphBuilder<ReadStateName>,
    name: ReadStateName,
    dpad: &Read<u8>,
    pressed: fn(&Direction) -> bool,
) -> Read<bool> {
    let dpad = dpad.clone();
    builder.add(cell(name), move |_: &InputReport| {
        let nibble = dpad.value_raw().unwrap_or(Direction::None as u8);
        pressed(&Direction::from_nibble(nibble))
    })
}

impl ReadStates {
    pub fn new(mapper: &ValueMapper, options: ReadStatesOptions) -> Self {
        let report = Arc::new(ReportSlot::default());
        let mut b = GraphBuilder::new(report.clone(), options.can_update_itself);
        let snap = options.joystick_deadzone_snap;

        // First pass: allocate every state in update order

        // Sticks and triggers
        let left_stick_x = axis(
            &mut b,
            ReadStateName::LeftStickX,
            Axis::LeftStickX,
            mapper,
            Control::LeftStickX,
        );
        let left_stick_y = axis(
            &mut b,
            ReadStateName::LeftStickY,
            Axis::LeftStickY,
            mapper,
            Control::LeftStickY,
        );
        let left_stick = stick(
            &mut b,
            ReadStateName::LeftStick,
            &left_stick_x,
            &left_stick_y,
            (Control::LeftStickX, Control::LeftStickY),
            mapper,
            mapper.left_stick_deadzone_raw,
            snap,
        );
        let right_stick_x = axis(
            &mut b,
            ReadStateName::RightStickX,
            Axis::RightStickX,
            mapper,
            Control::RightStickX,
        );
        let right_stick_y = axis(
            &mut b,
            ReadStateName::RightStickY,
            Axis::RightStickY,
            mapper,
            Control::RightStickY,
        );
        let right_stick = stick(
            &mut b,
            ReadStateName::RightStick,
            &right_stick_x,
            &right_stick_y,
            (Control::RightStickX, Control::RightStickY),
            mapper,
            mapper.right_stick_deadzone_raw,
            snap,
        );
        let l2 = trigger(
            &mut b,
            ReadStateName::L2,
            Axis::L2,
            mapper,
            Control::LeftTrigger,
            mapper.left_trigger_deadzone_raw,
        );
        let r2 = trigger(
            &mut b,
            ReadStateName::R2,
            Axis::R2,
            mapper,
            Control::RightTrigger,
            mapper.right_trigger_deadzone_raw,
        );

        // D-pad and buttons
        let dpad = b.add(cell(ReadStateName::Dpad), |r: &InputReport| r.dpad());
        let btn_up = direction(&mut b, ReadStateName::BtnUp, &dpad, Direction::is_up);
        let btn_right = direction(&mut b, ReadStateName::BtnRight, &dpad, Direction::is_right);
        let btn_down = direction(&mut b, ReadStateName::BtnDown, &dpad, Direction::is_down);
        let btn_left = direction(&mut b, ReadStateName::BtnLeft, &dpad, Direction::is_left);
        let btn_square = button(&mut b, ReadStateName::BtnSquare, Button::Square);
        let btn_cross = button(&mut b, ReadStateName::BtnCross, Button::Cross);
        let btn_circle = button(&mut b, ReadStateName::BtnCircle, Button::Circle);
        let btn_triangle = button(&mut b, ReadStateName::BtnTriangle, Button::Triangle);
        let btn_l1 = button(&mut b, ReadStateName::BtnL1, Button::L1);
        let btn_r1 = button(&mut b, ReadStateName::BtnR1, Button::R1);
        let btn_l2 = button(&mut b, ReadStateName::BtnL2, Button::L2);
        let btn_r2 = button(&mut b, ReadStateName::BtnR2, Button::R2);
        let btn_create = button(&mut b, ReadStateName::BtnCreate, Button::Create);
        let btn_options = button(&mut b, ReadStateName::BtnOptions, Button::Options);
        let btn_l3 = button(&mut b, ReadStateName::BtnL3, Button::L3);
        let btn_r3 = button(&mut b, ReadStateName::BtnR3, Button::R3);
        let btn_ps = button(&mut b, ReadStateName::BtnPs, Button::Ps);
        let btn_touchpad = button(&mut b, ReadStateName::BtnTouchpad, Button::Touchpad);
        let btn_mute = button(&mut b, ReadStateName::BtnMute, Button::Mute);

        let basic_count = btn_mute.id() + 1;
        b.requiring(|r: &InputReport| r.connection_type().is_full_report());

        // Motion sensors
        let gyroscope_x = b.add(cell(ReadStateName::GyroscopeX), |r: &InputReport| r.gyroscope().x);
        let gyroscope_y = b.add(cell(ReadStateName::GyroscopeY), |r: &InputReport| r.gyroscope().y);
        let gyroscope_z = b.add(cell(ReadStateName::GyroscopeZ), |r: &InputReport| r.gyroscope().z);
        let gyroscope = {
            let (x, y, z) = (gyroscope_x.clone(), gyroscope_y.clone(), gyroscope_z.clone());
            let threshold = mapper.gyroscope_threshold_raw;
            b.add(
                cell(ReadStateName::Gyroscope)
                    .with_compare(move |before, after| compare_gyroscope(before, after, threshold)),
                move |_: &InputReport| Gyroscope {
                    x: x.value_raw().unwrap_or_default(),
                    y: y.value_raw().unwrap_or_default(),
                    z: z.value_raw().unwrap_or_default(),
                },
            )
        };
        let accelerometer_x = b.add(cell(ReadStateName::AccelerometerX), |r: &InputReport| {
            r.accelerometer().x
        });
        let accelerometer_y = b.add(cell(ReadStateName::AccelerometerY), |r: &InputReport| {
            r.accelerometer().y
        });
        let accelerometer_z = b.add(cell(ReadStateName::AccelerometerZ), |r: &InputReport| {
            r.accelerometer().z
        });
        let accelerometer = {
            let (x, y, z) = (
                accelerometer_x.clone(),
                accelerometer_y.clone(),
                accelerometer_z.clone(),
            );
            let threshold = mapper.accelerometer_threshold_raw;
            b.add(
                cell(ReadStateName::Accelerometer)
                    .with_compare(move |before, after| {
                        compare_accelerometer(before, after, threshold)
                    }),
                move |_: &InputReport| Accelerometer {
                    x: x.value_raw().unwrap_or_default(),
                    y: y.value_raw().unwrap_or_default(),
                    z: z.value_raw().unwrap_or_default(),
                },
            )
        };
        let orientation = {
            let (gyro, accel) = (gyroscope.clone(), accelerometer.clone());
            let filter = Mutex::new(options.orientation_filter);
            let threshold = mapper.orientation_threshold_raw;
            let (raw_to_mapped, mapped_to_raw) = mapper.orientation_fns();
            b.add(
                cell(ReadStateName::Orientation)
                    .with_mapping(raw_to_mapped, mapped_to_raw)
                    .with_compare(move |before, after| {
                        compare_orientation(before, after, threshold)
                    }),
                move |_: &InputReport| {
                    let gyroscope = gyro.value_raw().unwrap_or_default();
                    let accelerometer = accel.value_raw().unwrap_or_default();
                    lock(&filter).update(&gyroscope, &accelerometer)
                },
            )
        };

        // Touchpad
        let touch_0_active = b.add(cell(ReadStateName::Touch0Active), |r: &InputReport| {
            r.touch_finger(0).active
        });
        let touch_0_id = b.add(cell(ReadStateName::Touch0Id), |r: &InputReport| {
            r.touch_finger(0).id
        });
        let touch_0_x = b.add(cell(ReadStateName::Touch0X), |r: &InputReport| r.touch_finger(0).x);
        let touch_0_y = b.add(cell(ReadStateName::Touch0Y), |r: &InputReport| r.touch_finger(0).y);
        let touch_finger_1 = touch_finger(
            &mut b,
            ReadStateName::TouchFinger1,
            (&touch_0_active, &touch_0_id, &touch_0_x, &touch_0_y),
        );
        let touch_1_active = b.add(cell(ReadStateName::Touch1Active), |r: &InputReport| {
            r.touch_finger(1).active
        });
        let touch_1_id = b.add(cell(ReadStateName::Touch1Id), |r: &InputReport| {
            r.touch_finger(1).id
        });
        let touch_1_x = b.add(cell(ReadStateName::Touch1X), |r: &InputReport| r.touch_finger(1).x);
        let touch_1_y = b.add(cell(ReadStateName::Touch1Y), |r: &InputReport| r.touch_finger(1).y);
        let touch_finger_2 = touch_finger(
            &mut b,
            ReadStateName::TouchFinger2,
            (&touch_1_active, &touch_1_id, &touch_1_x, &touch_1_y),
        );

        // Trigger feedback and battery
        let left_trigger_feedback = b.add(
            cell(ReadStateName::LeftTriggerFeedback),
            |r: &InputReport| r.trigger_feedback(TriggerSide::Left),
        );
        let right_trigger_feedback = b.add(
            cell(ReadStateName::RightTriggerFeedback),
            |r: &InputReport| r.trigger_feedback(TriggerSide::Right),
        );
        let battery = b.add(
            cell(ReadStateName::Battery).with_ignore_none(false),
            |r: &InputReport| r.battery(),
        );

        // Second pass: wire dependency edges by index
        b.depend(left_stick.id(), &[left_stick_x.id(), left_stick_y.id()]);
        b.depend(right_stick.id(), &[right_stick_x.id(), right_stick_y.id()]);
        for direction in [&btn_up, &btn_right, &btn_down, &btn_left] {
            b.depend(direction.id(), &[dpad.id()]);
        }
        b.depend(gyroscope.id(), &[gyroscope_x.id(), gyroscope_y.id(), gyroscope_z.id()]);
        b.depend(
            accelerometer.id(),
            &[accelerometer_x.id(), accelerometer_y.id(), accelerometer_z.id()],
        );
        b.depend(orientation.id(), &[gyroscope.id(), accelerometer.id()]);
        b.depend(
            touch_finger_1.id(),
            &[touch_0_active.id(), touch_0_id.id(), touch_0_x.id(), touch_0_y.id()],
        );
        b.depend(
            touch_finger_2.id(),
            &[touch_1_active.id(), touch_1_id.id(), touch_1_x.id(), touch_1_y.id()],
        );

        Self {
            report,
            graph: b.build(),
            enforce_update: options.enforce_update,
            basic_count,
            updated: Listeners::new(),
            update_lock: Mutex::new(()),
            left_stick_x,
            left_stick_y,
            left_stick,
            right_stick_x,
            right_stick_y,
            right_stick,
            l2,
            r2,
            dpad,
            btn_up,
            btn_right,
            btn_down,
            btn_left,
            btn_square,
            btn_cross,
            btn_circle,
            btn_triangle,
            btn_l1,
            btn_r1,
            btn_l2,
            btn_r2,
            btn_create,
            btn_options,
            btn_l3,
            btn_r3,
            btn_ps,
            btn_touchpad,
            btn_mute,
            gyroscope_x,
            gyroscope_y,
            gyroscope_z,
            gyroscope,
            accelerometer_x,
            accelerometer_y,
            accelerometer_z,
            accelerometer,
            orientation,
            touch_0_active,
            touch_0_id,
            touch_0_x,
            touch_0_y,
            touch_finger_1,
            touch_1_active,
            touch_1_id,
            touch_1_x,
            touch_1_y,
            touch_finger_2,
            left_trigger_feedback,
            right_trigger_feedback,
            battery,
        }
    }

    pub fn graph(&self) -> &DependencyGraph<ReadStateName> {
        &self.graph
    }

    /// Look up a state by name
    pub fn state(&self, name: ReadStateName) -> Option<&Arc<dyn Node<ReadStateName>>> {
        self.graph.find(name)
    }

    /// Timestamp of the most recent update cycle, 0 before the first one
    pub fn cycle_timestamp(&self) -> u64 {
        self.report.cycle_timestamp()
    }

    /// The most recently processed input report
    pub fn report(&self) -> Option<InputReport> {
        self.report.snapshot().map(|(report, _)| report)
    }

    /// Run one input cycle. Every state that passes the update gate is
    /// recomputed without notifying listeners, then listeners of the states
    /// that changed are notified in update order.
    pub fn update(&self, report: InputReport) {
        let _cycle = lock(&self.update_lock);
        let cycle_timestamp = timestamp();
        self.report.store(report, cycle_timestamp);

        let count = match report.connection_type() {
            ConnectionType::BluetoothMinimal => self.basic_count,
            ConnectionType::Usb | ConnectionType::Bluetooth => self.graph.len(),
        };
        let mut pending: Vec<CellId> = Vec::with_capacity(count);
        for id in 0..count {
            if !self.graph.is_updatable(id, self.enforce_update, cycle_timestamp) {
                continue;
            }
            self.graph.node(id).stage();
            pending.push(id);
        }
        log::trace!("Recomputed {} of {count} states", pending.len());

        self.post_update(&pending);
    }

    fn post_update(&self, pending: &[CellId]) {
        for id in pending {
            self.graph.node(*id).trigger_change_if_changed();
        }
        self.updated.emit(&());
    }

    /// Called after every completed input cycle
    pub fn on_updated<F>(&self, callback: F) -> ListenerId
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.updated.add(move |_: &()| callback())
    }

    pub fn remove_updated_listener(&self, id: ListenerId) -> bool {
        self.updated.remove(id)
    }

    /// Called with the name and timestamp of every state change. Listening to
    /// everything forces every state to be recomputed on every cycle.
    pub fn on_any_change<F>(&self, callback: F) -> AnyChangeHandle
    where
        F: Fn(ReadStateName, u64) + Send + Sync + 'static,
    {
        let callback: Arc<dyn Fn(ReadStateName, u64) + Send + Sync> = Arc::new(callback);
        let ids = self
            .graph
            .nodes()
            .enumerate()
            .map(|(id, node)| (id, node.on_any_change(callback.clone())))
            .collect();
        AnyChangeHandle(ids)
    }

    pub fn remove_any_change_listener(&self, handle: &AnyChangeHandle) {
        for (id, listener) in handle.0.iter() {
            self.graph.node(*id).remove_listener(*listener);
        }
    }
}

fn touch_finger(
    builder: &mut GraphBuilder<ReadStateName>,
    name: ReadStateName,
    (active, id, x, y): (&Read<bool>, &Read<u8>, &Read<u16>, &Read<u16>),
) -> Read<TouchFinger> {
    let (active, id, x, y) = (active.clone(), id.clone(), x.clone(), y.clone());
    builder.add(cell(name), move |_: &InputReport| TouchFinger {
        active: active.value_raw().unwrap_or_default(),
        id: id.value_raw().unwrap_or_default(),
        x: x.value_raw().unwrap_or_default(),
        y: y.value_raw().unwrap_or_default(),
    })
}
