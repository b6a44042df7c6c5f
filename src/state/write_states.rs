use std::fmt::Display;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::drivers::dualsense::hid_report::{SetStatePackedOutputData, TriggerEffectData};

use super::cell::{lock, AnyState, ChangeEvent, ListenerId, StateCell, StateValue};
use super::mapping::{Control, ValueMapper};
use super::value::{
    Lightbar, LightbarMode, Microphone, PlayerLeds, PlayerLedsBrightness, PlayerLedsEnable,
    PulseOptions, TriggerEffect,
};

/// Enables haptics and both trigger effects
pub const FLAGS_PHYSICS_ALL: u8 = 0xFF;
/// Every control flag including the microphone LED
pub const FLAGS_CONTROLS_ALL: u8 = 0x57;
/// Every control flag except the microphone LED, which the device then
/// manages itself
pub const FLAGS_CONTROLS_ALL_BUT_MUTE_LED: u8 = 0x56;
pub const LED_OPTIONS_ALL: u8 = 0x03;
/// Power save bit muting the microphone
pub const POWER_SAVE_MIC_MUTE: u8 = 0x10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteStateName {
    MotorLeft,
    MotorRight,
    LightbarRed,
    LightbarGreen,
    LightbarBlue,
    LightbarOnOff,
    LightbarPulseOptions,
    Lightbar,
    PlayerLedsEnable,
    PlayerLedsBrightness,
    PlayerLeds,
    MicrophoneMute,
    MicrophoneLed,
    Microphone,
    LeftTriggerEffectMode,
    LeftTriggerEffectParam(u8),
    LeftTriggerEffect,
    RightTriggerEffectMode,
    RightTriggerEffectParam(u8),
    RightTriggerEffect,
    FlagsPhysics,
    FlagsControls,
    LedOptions,
}

impl Display for WriteStateName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MotorLeft => write!(f, "MOTOR_LEFT"),
            Self::MotorRight => write!(f, "MOTOR_RIGHT"),
            Self::LightbarRed => write!(f, "LIGHTBAR_RED"),
            Self::LightbarGreen => write!(f, "LIGHTBAR_GREEN"),
            Self::LightbarBlue => write!(f, "LIGHTBAR_BLUE"),
            Self::LightbarOnOff => write!(f, "LIGHTBAR_ON_OFF"),
            Self::LightbarPulseOptions => write!(f, "LIGHTBAR_PULSE_OPTIONS"),
            Self::Lightbar => write!(f, "LIGHTBAR"),
            Self::PlayerLedsEnable => write!(f, "PLAYER_LEDS_ENABLE"),
            Self::PlayerLedsBrightness => write!(f, "PLAYER_LEDS_BRIGHTNESS"),
            Self::PlayerLeds => write!(f, "PLAYER_LEDS"),
            Self::MicrophoneMute => write!(f, "MICROPHONE_MUTE"),
            Self::MicrophoneLed => write!(f, "MICROPHONE_LED"),
            Self::Microphone => write!(f, "MICROPHONE"),
            Self::LeftTriggerEffectMode => write!(f, "LEFT_TRIGGER_EFFECT_MODE"),
            Self::LeftTriggerEffectParam(n) => write!(f, "LEFT_TRIGGER_EFFECT_PARAM{n}"),
            Self::LeftTriggerEffect => write!(f, "LEFT_TRIGGER_EFFECT"),
            Self::RightTriggerEffectMode => write!(f, "RIGHT_TRIGGER_EFFECT_MODE"),
            Self::RightTriggerEffectParam(n) => write!(f, "RIGHT_TRIGGER_EFFECT_PARAM{n}"),
            Self::RightTriggerEffect => write!(f, "RIGHT_TRIGGER_EFFECT"),
            Self::FlagsPhysics => write!(f, "FLAGS_PHYSICS"),
            Self::FlagsControls => write!(f, "FLAGS_CONTROLS"),
            Self::LedOptions => write!(f, "LED_OPTIONS"),
        }
    }
}

/// Read-only handle on a write state. Values change only through the
/// [WriteStates] setters, which keep composites, constituents and the dirty
/// flag in step.
pub struct Write<T>(StateCell<WriteStateName, T>);

impl<T: StateValue> Write<T> {
    pub fn name(&self) -> WriteStateName {
        self.0.name()
    }

    pub fn value(&self) -> Option<T> {
        self.0.value()
    }

    pub fn value_raw(&self) -> Option<T> {
        self.0.value_raw()
    }

    pub fn last_value(&self) -> Option<T> {
        self.0.last_value()
    }

    pub fn has_listeners(&self) -> bool {
        self.0.has_listeners()
    }

    pub fn on_change<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.0.on_change(callback)
    }

    pub fn on_change_with_old<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(Option<&T>, &T) + Send + Sync + 'static,
    {
        self.0.on_change_with_old(callback)
    }

    pub fn on_change_full<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(&ChangeEvent<WriteStateName, T>) + Send + Sync + 'static,
    {
        self.0.on_change_full(callback)
    }

    pub fn once_change<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.0.once_change(callback)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.0.remove_listener(id)
    }

    pub fn remove_all_listeners(&self) {
        self.0.remove_all_listeners()
    }

    fn stage(&self, value: T) -> bool {
        self.0.set_value_without_triggering_change(value)
    }
}

fn cell<T: StateValue>(name: WriteStateName, value: T) -> Write<T> {
    Write(StateCell::new(name).with_value(value))
}

/// Flat cells backing one trigger effect
pub struct TriggerEffectCells {
    pub mode: Write<u8>,
    pub params: [Write<u8>; 7],
    pub effect: Write<TriggerEffect>,
}

impl TriggerEffectCells {
    fn new(
        composite: WriteStateName,
        mode: WriteStateName,
        param: fn(u8) -> WriteStateName,
    ) -> Self {
        let effect = TriggerEffect::default();
        let params = effect.params();
        Self {
            mode: cell(mode, effect.mode),
            params: std::array::from_fn(|i| cell(param(i as u8 + 1), params[i])),
            effect: cell(composite, effect),
        }
    }

    fn fan_out(&self, effect: &TriggerEffect) -> bool {
        let mut changed = self.mode.stage(effect.mode);
        for (cell, value) in self.params.iter().zip(effect.params()) {
            changed |= cell.stage(value);
        }
        changed
    }

    fn constituents(&self) -> Vec<&dyn AnyState<WriteStateName>> {
        let mut cells: Vec<&dyn AnyState<WriteStateName>> = vec![&self.mode.0];
        cells.extend(self.params.iter().map(|c| &c.0 as &dyn AnyState<WriteStateName>));
        cells
    }

    fn packed(&self) -> TriggerEffectData {
        let param = |i: usize| self.params[i].value_raw().unwrap_or_default();
        TriggerEffectData {
            mode: self.mode.value_raw().unwrap_or_default(),
            params: [param(0), param(1), param(2), param(3), param(4), param(5)],
            param7: param(6),
            ..Default::default()
        }
    }
}

/// Every writable control of the controller. Changes mark the whole write
/// state dirty until the next output report has been sent. The cells are
/// public for reading and listening, writes go through the setters.
pub struct WriteStates {
    dirty: AtomicBool,
    /// Serializes composite updates against output report snapshots
    write_lock: Mutex<()>,
    microphone_invert_led: bool,

    pub motor_left: Write<f64>,
    pub motor_right: Write<f64>,

    pub lightbar_red: Write<u8>,
    pub lightbar_green: Write<u8>,
    pub lightbar_blue: Write<u8>,
    pub lightbar_on_off: Write<bool>,
    pub lightbar_pulse_options: Write<PulseOptions>,
    pub lightbar: Write<Lightbar>,

    pub player_leds_enable: Write<PlayerLedsEnable>,
    pub player_leds_brightness: Write<PlayerLedsBrightness>,
    pub player_leds: Write<PlayerLeds>,

    pub microphone_mute: Write<bool>,
    pub microphone_led: Write<bool>,
    pub microphone: Write<Microphone>,

    pub left_trigger_effect: TriggerEffectCells,
    pub right_trigger_effect: TriggerEffectCells,

    pub flags_physics: Write<u8>,
    pub flags_controls: Write<u8>,
    pub led_options: Write<u8>,
}

impl WriteStates {
    pub fn new(mapper: &ValueMapper, microphone_invert_led: bool) -> Self {
        let (left_to_mapped, left_to_raw) = mapper.number_fns(Control::MotorLeft);
        let (right_to_mapped, right_to_raw) = mapper.number_fns(Control::MotorRight);
        let lightbar = Lightbar::default();
        let player_leds = PlayerLeds::default();
        let microphone = Microphone::default();

        Self {
            dirty: AtomicBool::new(false),
            write_lock: Mutex::new(()),
            microphone_invert_led,
            motor_left: Write(
                cell(WriteStateName::MotorLeft, 0.0)
                    .0
                    .with_mapping(left_to_mapped, left_to_raw),
            ),
            motor_right: Write(
                cell(WriteStateName::MotorRight, 0.0)
                    .0
                    .with_mapping(right_to_mapped, right_to_raw),
            ),
            lightbar_red: cell(WriteStateName::LightbarRed, lightbar.red),
            lightbar_green: cell(WriteStateName::LightbarGreen, lightbar.green),
            lightbar_blue: cell(WriteStateName::LightbarBlue, lightbar.blue),
            lightbar_on_off: cell(WriteStateName::LightbarOnOff, lightbar.is_on),
            lightbar_pulse_options: cell(
                WriteStateName::LightbarPulseOptions,
                lightbar.pulse_options,
            ),
            lightbar: cell(WriteStateName::Lightbar, lightbar),
            player_leds_enable: cell(WriteStateName::PlayerLedsEnable, player_leds.enable),
            player_leds_brightness: cell(
                WriteStateName::PlayerLedsBrightness,
                player_leds.brightness,
            ),
            player_leds: cell(WriteStateName::PlayerLeds, player_leds),
            microphone_mute: cell(WriteStateName::MicrophoneMute, microphone.mute),
            microphone_led: cell(WriteStateName::MicrophoneLed, microphone.led),
            microphone: cell(WriteStateName::Microphone, microphone),
            left_trigger_effect: TriggerEffectCells::new(
                WriteStateName::LeftTriggerEffect,
                WriteStateName::LeftTriggerEffectMode,
                WriteStateName::LeftTriggerEffectParam,
            ),
            right_trigger_effect: TriggerEffectCells::new(
                WriteStateName::RightTriggerEffect,
                WriteStateName::RightTriggerEffectMode,
                WriteStateName::RightTriggerEffectParam,
            ),
            flags_physics: cell(WriteStateName::FlagsPhysics, FLAGS_PHYSICS_ALL),
            flags_controls: cell(WriteStateName::FlagsControls, FLAGS_CONTROLS_ALL_BUT_MUTE_LED),
            led_options: cell(WriteStateName::LedOptions, LED_OPTIONS_ALL),
        }
    }

    /// Whether there are changes not yet sent to the device
    pub fn has_changed(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Mark the current state as sent
    pub fn set_unchanged(&self) {
        let _guard = lock(&self.write_lock);
        self.flags_controls.stage(FLAGS_CONTROLS_ALL_BUT_MUTE_LED);
        self.dirty.store(false, Ordering::Release);
    }

    fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    /// Store a composite value and spread it over its constituent cells. The
    /// dirty flag is set at most once, after every constituent is updated.
    /// Listeners run after the whole group has been written.
    fn apply_composite<T, F>(
        &self,
        composite: &Write<T>,
        constituents: &[&dyn AnyState<WriteStateName>],
        value: T,
        fan_out: F,
    ) -> bool
    where
        T: StateValue,
        F: FnOnce(&T) -> bool,
    {
        let changed = {
            let _guard = lock(&self.write_lock);
            let constituents_changed = fan_out(&value);
            let composite_changed = composite.stage(value);
            constituents_changed || composite_changed
        };
        if !changed {
            return false;
        }
        self.mark_dirty();
        for constituent in constituents {
            constituent.trigger_change_if_changed();
        }
        composite.0.trigger_change_if_changed();
        true
    }

    /// Store a value of a state without constituents
    fn apply<T: StateValue>(&self, cell: &Write<T>, value: T) -> bool {
        let changed = {
            let _guard = lock(&self.write_lock);
            cell.stage(value)
        };
        if !changed {
            return false;
        }
        self.mark_dirty();
        cell.0.trigger_change_if_changed();
        true
    }

    /// Set the left motor in mapped units
    pub fn set_motor_left(&self, value: f64) -> bool {
        self.set_motor(&self.motor_left, value)
    }

    /// Set the right motor in mapped units
    pub fn set_motor_right(&self, value: f64) -> bool {
        self.set_motor(&self.motor_right, value)
    }

    fn set_motor(&self, motor: &Write<f64>, value: f64) -> bool {
        self.apply(motor, motor.0.to_raw(value))
    }

    pub fn set_lightbar(&self, lightbar: Lightbar) -> bool {
        let constituents: [&dyn AnyState<WriteStateName>; 5] = [
            &self.lightbar_red.0,
            &self.lightbar_green.0,
            &self.lightbar_blue.0,
            &self.lightbar_on_off.0,
            &self.lightbar_pulse_options.0,
        ];
        self.apply_composite(&self.lightbar, &constituents, lightbar, |l| {
            let mut changed = self.lightbar_red.stage(l.red);
            changed |= self.lightbar_green.stage(l.green);
            changed |= self.lightbar_blue.stage(l.blue);
            changed |= self.lightbar_on_off.stage(l.is_on);
            changed |= self.lightbar_pulse_options.stage(l.pulse_options);
            changed
        })
    }

    fn current_lightbar(&self) -> Lightbar {
        self.lightbar.value_raw().unwrap_or_default()
    }

    pub fn set_lightbar_color(&self, red: u8, green: u8, blue: u8) -> bool {
        self.set_lightbar(Lightbar {
            red,
            green,
            blue,
            ..self.current_lightbar()
        })
    }

    pub fn set_lightbar_on(&self, is_on: bool) -> bool {
        self.set_lightbar(Lightbar {
            is_on,
            ..self.current_lightbar()
        })
    }

    pub fn set_lightbar_pulse_options(&self, pulse_options: PulseOptions) -> bool {
        self.set_lightbar(Lightbar {
            pulse_options,
            ..self.current_lightbar()
        })
    }

    pub fn set_player_leds(&self, player_leds: PlayerLeds) -> bool {
        let constituents: [&dyn AnyState<WriteStateName>; 2] =
            [&self.player_leds_enable.0, &self.player_leds_brightness.0];
        self.apply_composite(&self.player_leds, &constituents, player_leds, |p| {
            let changed = self.player_leds_enable.stage(p.enable);
            self.player_leds_brightness.stage(p.brightness) || changed
        })
    }

    pub fn set_player_leds_enable(&self, enable: PlayerLedsEnable) -> bool {
        self.set_player_leds(PlayerLeds {
            enable,
            ..self.player_leds.value_raw().unwrap_or_default()
        })
    }

    pub fn set_player_leds_brightness(&self, brightness: PlayerLedsBrightness) -> bool {
        self.set_player_leds(PlayerLeds {
            brightness,
            ..self.player_leds.value_raw().unwrap_or_default()
        })
    }

    pub fn set_microphone(&self, microphone: Microphone) -> bool {
        let constituents: [&dyn AnyState<WriteStateName>; 2] =
            [&self.microphone_mute.0, &self.microphone_led.0];
        self.apply_composite(&self.microphone, &constituents, microphone, |m| {
            let mute_changed = self.microphone_mute.stage(m.mute);
            let led_changed = self.microphone_led.stage(m.led);
            if led_changed {
                self.flags_controls.stage(FLAGS_CONTROLS_ALL);
            }
            mute_changed || led_changed
        })
    }

    /// Mute or unmute the microphone. The LED follows the mute state, or its
    /// inverse when configured so.
    pub fn set_microphone_muted(&self, mute: bool) -> bool {
        self.set_microphone(Microphone {
            mute,
            led: mute ^ self.microphone_invert_led,
        })
    }

    pub fn toggle_microphone_muted(&self) -> bool {
        let muted = self.microphone_mute.value_raw().unwrap_or_default();
        self.set_microphone_muted(!muted)
    }

    pub fn set_left_trigger_effect(&self, effect: TriggerEffect) -> bool {
        let cells = &self.left_trigger_effect;
        self.apply_composite(&cells.effect, &cells.constituents(), effect, |e| cells.fan_out(e))
    }

    pub fn set_right_trigger_effect(&self, effect: TriggerEffect) -> bool {
        let cells = &self.right_trigger_effect;
        self.apply_composite(&cells.effect, &cells.constituents(), effect, |e| cells.fan_out(e))
    }

    /// Enable bits for haptics and the trigger effects
    pub fn set_flags_physics(&self, flags: u8) -> bool {
        self.apply(&self.flags_physics, flags)
    }

    pub fn set_led_options(&self, options: u8) -> bool {
        self.apply(&self.led_options, options)
    }

    /// Snapshot of the current write state as the shared output block
    pub fn update_out_report(&self) -> SetStatePackedOutputData {
        let _guard = lock(&self.write_lock);
        self.snapshot()
    }

    /// Snapshot the current write state for sending and mark it as sent.
    /// Changes made while the report is in flight mark the state dirty again.
    pub fn take_out_report(&self) -> SetStatePackedOutputData {
        let _guard = lock(&self.write_lock);
        self.dirty.store(false, Ordering::Release);
        let state = self.snapshot();
        self.flags_controls.stage(FLAGS_CONTROLS_ALL_BUT_MUTE_LED);
        state
    }

    fn snapshot(&self) -> SetStatePackedOutputData {
        let byte = |cell: &Write<u8>| cell.value_raw().unwrap_or_default();
        let motor = |cell: &Write<f64>| {
            cell.value_raw().unwrap_or_default().clamp(0.0, 255.0) as u8
        };
        let mute = self.microphone_mute.value_raw().unwrap_or_default();
        let lightbar_mode = if self.lightbar_on_off.value_raw().unwrap_or_default() {
            LightbarMode::On
        } else {
            LightbarMode::Off
        };

        SetStatePackedOutputData {
            flags_physics: byte(&self.flags_physics),
            flags_controls: byte(&self.flags_controls),
            motor_right: motor(&self.motor_right),
            motor_left: motor(&self.motor_left),
            mic_led: self.microphone_led.value_raw().unwrap_or_default() as u8,
            power_save_control: if mute { POWER_SAVE_MIC_MUTE } else { 0 },
            right_trigger_effect: self.right_trigger_effect.packed(),
            left_trigger_effect: self.left_trigger_effect.packed(),
            led_options: byte(&self.led_options),
            lightbar_mode: lightbar_mode as u8,
            pulse_options: self.lightbar_pulse_options.value_raw().unwrap_or_default() as u8,
            player_leds_brightness: self
                .player_leds_brightness
                .value_raw()
                .unwrap_or_default() as u8,
            player_leds_enable: self.player_leds_enable.value_raw().unwrap_or_default().0,
            led_red: byte(&self.lightbar_red),
            led_green: byte(&self.lightbar_green),
            led_blue: byte(&self.lightbar_blue),
            ..Default::default()
        }
    }
}
