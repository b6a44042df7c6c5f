//! Userspace driver for the Sony DualSense controller over USB and Bluetooth.
//!
//! Input reports are decoded into a graph of observable read states, writable
//! states (lightbar, rumble, trigger effects, ...) are encoded back into
//! output reports by a background driver thread.
pub mod cli;
pub mod config;
pub mod controller;
pub mod drivers;
pub mod state;

pub use config::ControllerConfig;
pub use controller::{ControllerError, DualSenseController};
