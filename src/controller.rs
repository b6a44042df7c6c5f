//! Session façade tying a transport, the driver thread and the state graphs
//! together.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use thiserror::Error;

use crate::config::ControllerConfig;
use crate::drivers::dualsense::driver::{
    detect_connection_type, Driver, DriverError, UpdateBenchmark,
};
use crate::drivers::dualsense::hid_report::{ConnectionType, ReportError};
use crate::drivers::dualsense::transport::{
    enumerate_devices, DeviceDescriptor, HidTransport, Transport, TransportError,
};
use crate::state::cell::{lock, ListenerId, Listeners, StateCell};
use crate::state::mapping::{MappingError, ValueMapper};
use crate::state::read_states::{AnyChangeHandle, ReadStateName, ReadStates, ReadStatesOptions};
use crate::state::value::{Battery, Connection};
use crate::state::write_states::WriteStates;

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("No DualSense controller detected")]
    NoDeviceDetected,
    #[error("Invalid device index {index}, {count} controller(s) detected")]
    InvalidDeviceIndex { index: usize, count: usize },
    #[error("Controller is already active")]
    AlreadyActive,
    #[error("Controller is not active")]
    NotActive,
    #[error("Driver thread panicked")]
    DriverPanicked,
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Report(#[from] ReportError),
    #[error(transparent)]
    Mapping(#[from] MappingError),
    #[error(transparent)]
    Driver(#[from] DriverError),
}

/// Opens the transport of a session. Called on every activation.
pub type OpenFn = Box<dyn FnMut() -> Result<Box<dyn Transport>, ControllerError> + Send>;

/// Name of the connection cell
pub const CONNECTION: &str = "CONNECTION";

struct Session {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<Box<dyn Transport>>,
    connection_type: ConnectionType,
}

/// A DualSense controller session.
///
/// The controller starts out inactive. [DualSenseController::activate] opens
/// the device, detects its connection type and starts the driver thread,
/// [DualSenseController::deactivate] stops the thread and closes the device.
/// Listeners can be registered at any time and are called from the driver
/// thread.
pub struct DualSenseController {
    config: ControllerConfig,
    read_states: Arc<ReadStates>,
    write_states: Arc<WriteStates>,
    connection: StateCell<&'static str, Connection>,
    exceptions: Arc<Listeners<Arc<ControllerError>>>,
    last_error: Arc<Mutex<Option<Arc<ControllerError>>>>,
    benchmark: Option<Arc<UpdateBenchmark>>,
    open: OpenFn,
    session: Option<Session>,
}

impl DualSenseController {
    /// List every connected DualSense controller
    pub fn enumerate_devices() -> Result<Vec<DeviceDescriptor>, ControllerError> {
        Ok(enumerate_devices()?)
    }

    /// Create a controller for the device at `config.device_index`
    pub fn new(config: ControllerConfig) -> Result<Self, ControllerError> {
        let index = config.device_index;
        Self::with_opener(config, Box::new(move || open_device(index)))
    }

    /// Create a controller that obtains its transport from `open`
    pub fn with_opener(config: ControllerConfig, open: OpenFn) -> Result<Self, ControllerError> {
        let mapper = ValueMapper::new(config.mapping, &config.tolerances())?;
        let options = ReadStatesOptions {
            enforce_update: config.enforce_update,
            can_update_itself: config.can_update_itself,
            joystick_deadzone_snap: config.joystick_deadzone_snap,
            orientation_filter: config.orientation.filter(),
        };
        let read_states = Arc::new(ReadStates::new(&mapper, options));
        let write_states = Arc::new(WriteStates::new(&mapper, config.microphone_invert_led));
        let benchmark = config
            .update_benchmark
            .then(|| Arc::new(UpdateBenchmark::new()));

        Ok(Self {
            config,
            read_states,
            write_states,
            connection: StateCell::new(CONNECTION).with_ignore_none(false),
            exceptions: Arc::new(Listeners::new()),
            last_error: Arc::new(Mutex::new(None)),
            benchmark,
            open,
            session: None,
        })
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn read_states(&self) -> &Arc<ReadStates> {
        &self.read_states
    }

    pub fn write_states(&self) -> &Arc<WriteStates> {
        &self.write_states
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    /// Connection type of the active session
    pub fn connection_type(&self) -> Option<ConnectionType> {
        self.session.as_ref().map(|s| s.connection_type)
    }

    pub fn connection(&self) -> Connection {
        self.connection.value().unwrap_or_default()
    }

    /// The error that ended the most recent driver loop
    pub fn last_error(&self) -> Option<Arc<ControllerError>> {
        lock(&self.last_error).clone()
    }

    /// Mean duration of the recent update cycles, if benchmarking is enabled
    pub fn benchmark(&self) -> Option<Duration> {
        self.benchmark.as_ref().and_then(|b| b.mean())
    }

    /// Open the device and start the driver thread
    pub fn activate(&mut self) -> Result<(), ControllerError> {
        if self.session.is_some() {
            return Err(ControllerError::AlreadyActive);
        }

        let mut transport = (self.open)()?;
        let connection_type = detect_connection_type(transport.as_mut())?;
        log::info!("Activating DualSense controller over {connection_type}");

        self.write_states
            .set_microphone_muted(self.config.microphone_initially_muted);

        let mut driver = Driver::new(
            transport,
            connection_type,
            self.read_states.clone(),
            self.write_states.clone(),
        )
        .with_read_timeout(self.config.read_timeout_ms);
        if let Some(benchmark) = self.benchmark.as_ref() {
            driver = driver.with_benchmark(benchmark.clone());
        }

        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = stop.clone();
        let exceptions = self.exceptions.clone();
        let last_error = self.last_error.clone();
        let handle = thread::spawn(move || {
            let (transport, result) = driver.run(thread_stop);
            if let Err(e) = result {
                let error = Arc::new(ControllerError::from(e));
                *lock(&last_error) = Some(error.clone());
                exceptions.emit(&error);
            }
            transport
        });

        self.session = Some(Session {
            stop,
            handle,
            connection_type,
        });
        self.connection.set_value(Connection {
            connected: true,
            connection_type: Some(connection_type),
        });

        Ok(())
    }

    /// Stop the driver thread and close the device
    pub fn deactivate(&mut self) -> Result<(), ControllerError> {
        let Some(session) = self.session.take() else {
            return Err(ControllerError::NotActive);
        };
        log::info!("Deactivating DualSense controller");

        let result = stop_session(session.stop, session.handle);
        self.connection.set_value(Connection {
            connected: false,
            connection_type: Some(session.connection_type),
        });

        result
    }

    /// Called once with the error that ended the driver loop
    pub fn on_exception<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(&ControllerError) + Send + Sync + 'static,
    {
        self.exceptions
            .add(move |error: &Arc<ControllerError>| callback(error))
    }

    pub fn on_connection_change<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(&Connection) + Send + Sync + 'static,
    {
        self.connection.on_change(callback)
    }

    /// Called whenever the battery level falls to or below
    /// `level_percentage`. Stays quiet until the level rose above it again.
    pub fn on_battery_low<F>(&self, level_percentage: f64, callback: F) -> ListenerId
    where
        F: Fn(&Battery) + Send + Sync + 'static,
    {
        self.read_states
            .battery
            .on_change_with_old(move |old, new| {
                let was_low = old.is_some_and(|b| b.level_percentage <= level_percentage);
                if new.level_percentage <= level_percentage && !was_low {
                    callback(new);
                }
            })
    }

    /// Called after every input cycle
    pub fn on_updated<F>(&self, callback: F) -> ListenerId
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.read_states.on_updated(callback)
    }

    pub fn on_any_change<F>(&self, callback: F) -> AnyChangeHandle
    where
        F: Fn(ReadStateName, u64) + Send + Sync + 'static,
    {
        self.read_states.on_any_change(callback)
    }
}

impl Drop for DualSenseController {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            if let Err(e) = stop_session(session.stop, session.handle) {
                log::warn!("Unable to stop DualSense driver: {e}");
            }
        }
    }
}

fn stop_session(
    stop: Arc<AtomicBool>,
    handle: JoinHandle<Box<dyn Transport>>,
) -> Result<(), ControllerError> {
    stop.store(true, Ordering::Release);
    let transport = handle
        .join()
        .map_err(|_| ControllerError::DriverPanicked)?;
    // The device is closed once the driver has returned it
    drop(transport);
    Ok(())
}

fn open_device(index: usize) -> Result<Box<dyn Transport>, ControllerError> {
    let devices = enumerate_devices()?;
    if devices.is_empty() {
        return Err(ControllerError::NoDeviceDetected);
    }
    let Some(descriptor) = devices.get(index) else {
        return Err(ControllerError::InvalidDeviceIndex {
            index,
            count: devices.len(),
        });
    };
    log::debug!("Opening DualSense controller {index}: {}", descriptor.path);

    Ok(Box::new(HidTransport::open(descriptor)?))
}
