use std::any::Any;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::state::cell::lock;
use crate::state::read_states::ReadStates;
use crate::state::write_states::WriteStates;

use super::hid_report::{encode_output_report, ConnectionType, InputReport, ReportError};
use super::transport::{Transport, TransportError};

// Source: https://github.com/torvalds/linux/blob/master/drivers/hid/hid-playstation.c
pub const DS5_EDGE_NAME: &str = "Sony Interactive Entertainment DualSense Edge Wireless Controller";
pub const DS5_EDGE_VID: u16 = 0x054c;
pub const DS5_EDGE_PID: u16 = 0x0df2;

pub const DS5_NAME: &str = "Sony Interactive Entertainment DualSense Wireless Controller";
pub const DS5_VID: u16 = 0x054c;
pub const DS5_PID: u16 = 0x0ce6;

pub const IDS: [(u16, u16); 2] = [(DS5_EDGE_VID, DS5_EDGE_PID), (DS5_VID, DS5_PID)];

/// Whether the vendor and product id belong to a supported controller
pub fn is_dualsense(vendor_id: u16, product_id: u16) -> bool {
    IDS.contains(&(vendor_id, product_id))
}

pub const INPUT_REPORT_USB: u8 = 0x01;
pub const INPUT_REPORT_USB_SIZE: usize = 64;
pub const INPUT_REPORT_BT: u8 = 0x31;
pub const INPUT_REPORT_BT_SIZE: usize = 78;
/// Simple report sent over Bluetooth until the full report mode is enabled
pub const INPUT_REPORT_BT_MINIMAL_SIZE: usize = 10;
pub const OUTPUT_REPORT_USB: u8 = 0x02;
pub const OUTPUT_REPORT_USB_SHORT_SIZE: usize = 48;
pub const OUTPUT_REPORT_BT: u8 = 0x31;
pub const OUTPUT_REPORT_BT_SIZE: usize = 78;
pub const OUTPUT_REPORT_BT_TAG: u8 = 0x02;
pub const OUTPUT_REPORT_BT_MINIMAL_SIZE: usize = 10;
/// HID output transaction header the device prepends when checking the CRC
pub const BT_OUTPUT_CRC_SEED: u8 = 0xA2;

/// Larger than any known input report, so an unexpected variant shows up as
/// an unknown length instead of a truncated read
pub const DETECTION_BUFFER_SIZE: usize = 100;
pub const DEFAULT_READ_TIMEOUT_MS: i32 = 100;

/// Number of cycles the update benchmark averages over
pub const BENCHMARK_WINDOW: usize = 50;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
    #[error("Report error: {0}")]
    Report(#[from] ReportError),
    #[error("Driver loop panicked: {0}")]
    Panicked(String),
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Read one report, blocking until it arrives, and select the wire variant
/// from its length
pub fn detect_connection_type(
    transport: &mut dyn Transport,
) -> Result<ConnectionType, DriverError> {
    let mut buf = [0; DETECTION_BUFFER_SIZE];
    let bytes_read = transport.read_timeout(&mut buf, -1)?;
    let connection_type = ConnectionType::from_report_len(bytes_read)?;
    log::debug!("Detected {connection_type} connection from a {bytes_read} byte report");

    Ok(connection_type)
}

/// Rolling mean of the time spent processing input cycles
#[derive(Debug, Default)]
pub struct UpdateBenchmark {
    samples: Mutex<VecDeque<Duration>>,
}

impl UpdateBenchmark {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one cycle and return the new mean
    pub fn record(&self, duration: Duration) -> Duration {
        let mut samples = lock(&self.samples);
        if samples.len() == BENCHMARK_WINDOW {
            samples.pop_front();
        }
        samples.push_back(duration);
        mean(&samples)
    }

    /// Mean cycle duration, `None` before the first cycle
    pub fn mean(&self) -> Option<Duration> {
        let samples = lock(&self.samples);
        if samples.is_empty() {
            return None;
        }
        Some(mean(&samples))
    }
}

fn mean(samples: &VecDeque<Duration>) -> Duration {
    let total: Duration = samples.iter().sum();
    total / samples.len().max(1) as u32
}

/// PS5 DualSense controller driver. Reads input reports into the read states
/// and sends the write states whenever they changed.
pub struct Driver {
    transport: Box<dyn Transport>,
    connection_type: ConnectionType,
    read_states: Arc<ReadStates>,
    write_states: Arc<WriteStates>,
    read_timeout_ms: i32,
    benchmark: Option<Arc<UpdateBenchmark>>,
}

impl Driver {
    pub fn new(
        transport: Box<dyn Transport>,
        connection_type: ConnectionType,
        read_states: Arc<ReadStates>,
        write_states: Arc<WriteStates>,
    ) -> Self {
        Self {
            transport,
            connection_type,
            read_states,
            write_states,
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            benchmark: None,
        }
    }

    pub fn with_read_timeout(mut self, timeout_ms: i32) -> Self {
        self.read_timeout_ms = timeout_ms;
        self
    }

    pub fn with_benchmark(mut self, benchmark: Arc<UpdateBenchmark>) -> Self {
        self.benchmark = Some(benchmark);
        self
    }

    pub fn connection_type(&self) -> ConnectionType {
        self.connection_type
    }

    /// Read one input report and run an update cycle with it. Returns false
    /// when the read timed out.
    pub fn poll(&mut self) -> Result<bool, DriverError> {
        // Read data from the device into a buffer
        let mut buf = [0; DETECTION_BUFFER_SIZE];
        let bytes_read = self.transport.read_timeout(&mut buf, self.read_timeout_ms)?;
        if bytes_read == 0 {
            return Ok(false);
        }

        let start = Instant::now();
        let report = InputReport::new(self.connection_type, &buf[..bytes_read])?;
        log::trace!("{report}");
        self.read_states.update(report);

        if let Some(benchmark) = self.benchmark.as_ref() {
            let mean = benchmark.record(start.elapsed());
            log::debug!("Update cycle took {:?} on average", mean);
        }

        Ok(true)
    }

    /// Send the write states to the device if they changed since the last
    /// write. Returns whether a report was written.
    pub fn flush(&mut self) -> Result<bool, DriverError> {
        if !self.write_states.has_changed() {
            return Ok(false);
        }
        if !self.connection_type.accepts_output() {
            log::debug!("Dropping output state, {} accepts no output", self.connection_type);
            self.write_states.set_unchanged();
            return Ok(false);
        }

        let state = self.write_states.take_out_report();
        let buf = encode_output_report(self.connection_type, &state)?;
        log::debug!("Writing output report: {:02x?}", buf);
        self.transport.write(&buf)?;

        Ok(true)
    }

    /// Poll and flush until `stop` is set or an error occurs. The transport is
    /// handed back so it is only closed once the loop has ended.
    pub fn run(mut self, stop: Arc<AtomicBool>) -> (Box<dyn Transport>, Result<(), DriverError>) {
        log::debug!("Starting DualSense driver ({})", self.connection_type);
        // A panicking listener ends the loop like any other error and the
        // transport is still handed back
        let result = match panic::catch_unwind(AssertUnwindSafe(|| self.run_loop(&stop))) {
            Ok(result) => result,
            Err(payload) => Err(DriverError::Panicked(panic_message(payload.as_ref()))),
        };
        match &result {
            Ok(_) => log::debug!("DualSense driver stopped"),
            Err(e) => log::error!("DualSense driver failed: {e}"),
        }
        (self.transport, result)
    }

    fn run_loop(&mut self, stop: &AtomicBool) -> Result<(), DriverError> {
        while !stop.load(Ordering::Acquire) {
            self.poll()?;
            self.flush()?;
        }
        Ok(())
    }
}
