use std::ffi::{CString, NulError};

use hidapi::{HidApi, HidDevice, HidError};
use thiserror::Error;

use super::driver::is_dualsense;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HID error: {0}")]
    Hid(#[from] HidError),
    #[error("Invalid device path: {0}")]
    Path(#[from] NulError),
    #[error("Device '{path}' is not a DualSense Controller: {vid:04x}:{pid:04x}")]
    NotADualSense { path: String, vid: u16, pid: u16 },
}

/// Byte level access to a connected controller
pub trait Transport: Send {
    /// Read a single input report into `buf`, waiting at most `timeout_ms`
    /// milliseconds (-1 blocks). Returns 0 when the timeout elapsed.
    fn read_timeout(&mut self, buf: &mut [u8], timeout_ms: i32) -> Result<usize, TransportError>;

    /// Write a single output report
    fn write(&mut self, data: &[u8]) -> Result<usize, TransportError>;
}

/// A controller found during enumeration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    pub path: String,
    pub serial_number: Option<String>,
    pub product_id: u16,
    pub product_string: Option<String>,
}

/// List every connected DualSense and DualSense Edge controller
pub fn enumerate_devices() -> Result<Vec<DeviceDescriptor>, TransportError> {
    let api = HidApi::new()?;
    let mut devices: Vec<DeviceDescriptor> = Vec::new();
    for info in api.device_list() {
        if !is_dualsense(info.vendor_id(), info.product_id()) {
            continue;
        }
        let path = info.path().to_string_lossy().to_string();
        // Some platforms report one entry per usage of the same device
        if devices.iter().any(|d| d.path == path) {
            continue;
        }
        devices.push(DeviceDescriptor {
            path,
            serial_number: info.serial_number().map(|s| s.to_string()),
            product_id: info.product_id(),
            product_string: info.product_string().map(|s| s.to_string()),
        });
    }
    log::debug!("Found {} DualSense controller(s)", devices.len());

    Ok(devices)
}

/// [Transport] backed by a hidapi device handle. The handle is closed when
/// this is dropped.
pub struct HidTransport {
    device: HidDevice,
}

impl HidTransport {
    pub fn open(descriptor: &DeviceDescriptor) -> Result<Self, TransportError> {
        Self::open_path(descriptor.path.clone())
    }

    pub fn open_path(path: String) -> Result<Self, TransportError> {
        let c_path = CString::new(path.clone())?;
        let api = HidApi::new()?;
        let device = api.open_path(&c_path)?;
        let info = device.get_device_info()?;
        let vid = info.vendor_id();
        let pid = info.product_id();
        if !is_dualsense(vid, pid) {
            return Err(TransportError::NotADualSense { path, vid, pid });
        }
        log::debug!("Opened DualSense at {path}");

        Ok(Self { device })
    }
}

impl Transport for HidTransport {
    fn read_timeout(&mut self, buf: &mut [u8], timeout_ms: i32) -> Result<usize, TransportError> {
        Ok(self.device.read_timeout(buf, timeout_ms)?)
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        Ok(self.device.write(data)?)
    }
}
