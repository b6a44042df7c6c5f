use std::error::Error;
use std::io::{self, BufRead};
use std::thread;
use std::time::Duration;

use tabled::settings::{Panel, Style};
use tabled::{Table, Tabled};

use crate::config::ControllerConfig;
use crate::controller::DualSenseController;
use crate::drivers::dualsense::driver::{DS5_EDGE_NAME, DS5_EDGE_PID, DS5_NAME};

use super::Args;

/// Battery level below which the monitor warns
const BATTERY_LOW_PERCENTAGE: f64 = 20.0;

#[derive(Tabled)]
struct ControllerRow {
    #[tabled(rename = "Index")]
    index: usize,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Serial")]
    serial: String,
    #[tabled(rename = "Path")]
    path: String,
}

fn load_config(args: &Args) -> Result<ControllerConfig, Box<dyn Error>> {
    let mut config = match args.config.as_ref() {
        Some(path) => ControllerConfig::from_yaml_file(path.clone())?,
        None => ControllerConfig::default(),
    };
    if let Some(index) = args.index {
        config.device_index = index;
    }
    Ok(config)
}

pub fn handle_list() -> Result<(), Box<dyn Error>> {
    let devices = DualSenseController::enumerate_devices()?;
    let count = devices.len();
    let rows: Vec<ControllerRow> = devices
        .into_iter()
        .enumerate()
        .map(|(index, device)| {
            let name = match device.product_id {
                DS5_EDGE_PID => DS5_EDGE_NAME.to_string(),
                _ => DS5_NAME.to_string(),
            };
            ControllerRow {
                index,
                name: device.product_string.unwrap_or(name),
                serial: device.serial_number.unwrap_or_default(),
                path: device.path,
            }
        })
        .collect();

    let mut table = Table::new(rows);
    table
        .with(Style::modern_rounded())
        .with(Panel::header("DualSense Controllers"));
    println!("{table}");
    println!("Found {count} controller(s)");

    Ok(())
}

pub fn handle_monitor(args: &Args) -> Result<(), Box<dyn Error>> {
    let config = load_config(args)?;
    let mut controller = DualSenseController::new(config)?;
    let states = controller.read_states().clone();

    controller.on_exception(|e| log::error!("Controller stopped: {e}"));
    controller.on_connection_change(|connection| log::info!("Connection: {:?}", connection));
    controller.on_battery_low(BATTERY_LOW_PERCENTAGE, |battery| {
        log::warn!("Battery low: {battery}")
    });

    states.left_stick.on_change(|stick| log::info!("Left stick: {stick}"));
    states.right_stick.on_change(|stick| log::info!("Right stick: {stick}"));
    states.l2.on_change(|value| log::info!("L2: {value}"));
    states.r2.on_change(|value| log::info!("R2: {value}"));
    states.battery.on_change(|battery| log::info!("Battery: {battery}"));
    let buttons = [
        &states.btn_up,
        &states.btn_right,
        &states.btn_down,
        &states.btn_left,
        &states.btn_square,
        &states.btn_cross,
        &states.btn_circle,
        &states.btn_triangle,
        &states.btn_l1,
        &states.btn_r1,
        &states.btn_l2,
        &states.btn_r2,
        &states.btn_create,
        &states.btn_options,
        &states.btn_l3,
        &states.btn_r3,
        &states.btn_ps,
        &states.btn_touchpad,
        &states.btn_mute,
    ];
    for button in buttons {
        let name = button.name();
        button.on_change(move |pressed| log::info!("{name}: {pressed}"));
    }

    controller.activate()?;
    println!("Monitoring controller, press Ctrl+D to stop");
    for line in io::stdin().lock().lines() {
        line?;
    }
    controller.deactivate()?;

    Ok(())
}

pub fn handle_lightbar(
    args: &Args,
    red: u8,
    green: u8,
    blue: u8,
    duration_ms: u64,
) -> Result<(), Box<dyn Error>> {
    let config = load_config(args)?;
    let mut controller = DualSenseController::new(config)?;
    controller.activate()?;
    log::debug!("Setting lightbar color to: {red}, {green}, {blue}");
    controller.write_states().set_lightbar_color(red, green, blue);
    thread::sleep(Duration::from_millis(duration_ms));
    controller.deactivate()?;

    Ok(())
}

pub fn handle_rumble(
    args: &Args,
    left: f64,
    right: f64,
    duration_ms: u64,
) -> Result<(), Box<dyn Error>> {
    let config = load_config(args)?;
    let mut controller = DualSenseController::new(config)?;
    controller.activate()?;
    let write_states = controller.write_states().clone();
    write_states.set_motor_left(left);
    write_states.set_motor_right(right);
    thread::sleep(Duration::from_millis(duration_ms));
    write_states.set_motor_left(0.0);
    write_states.set_motor_right(0.0);
    // Give the driver a cycle to send the stop
    thread::sleep(Duration::from_millis(100));
    controller.deactivate()?;

    Ok(())
}
