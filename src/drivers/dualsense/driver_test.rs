use std::collections::VecDeque;
use std::error::Error;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::drivers::dualsense::driver::{
    detect_connection_type, is_dualsense, Driver, DriverError, UpdateBenchmark, BENCHMARK_WINDOW,
    DS5_EDGE_PID, DS5_EDGE_VID, DS5_PID, DS5_VID,
};
use crate::drivers::dualsense::hid_report::{ConnectionType, InputReport, ReportError};
use crate::drivers::dualsense::transport::{Transport, TransportError};
use crate::state::mapping::{Mapping, Tolerances, ValueMapper};
use crate::state::read_states::{ReadStates, ReadStatesOptions};
use crate::state::write_states::WriteStates;

/// In-memory transport replaying queued input reports and recording every
/// output report. An empty queue behaves like a read timeout.
#[derive(Clone, Default)]
pub struct MockTransport {
    reads: Arc<Mutex<VecDeque<Vec<u8>>>>,
    writes: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_read(&self, report: Vec<u8>) {
        self.reads.lock().unwrap().push_back(report);
    }

    pub fn pending_reads(&self) -> usize {
        self.reads.lock().unwrap().len()
    }

    pub fn written(&self) -> Vec<Vec<u8>> {
        self.writes.lock().unwrap().clone()
    }
}

impl Transport for MockTransport {
    fn read_timeout(&mut self, buf: &mut [u8], _timeout_ms: i32) -> Result<usize, TransportError> {
        let next = self.reads.lock().unwrap().pop_front();
        match next {
            Some(report) => {
                let len = report.len().min(buf.len());
                buf[..len].copy_from_slice(&report[..len]);
                Ok(len)
            }
            None => {
                thread::sleep(Duration::from_millis(1));
                Ok(0)
            }
        }
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, TransportError> {
        self.writes.lock().unwrap().push(data.to_vec());
        Ok(data.len())
    }
}

/// USB report with centered sticks and nothing pressed
pub fn neutral_usb_report() -> Vec<u8> {
    let mut buf = vec![0; 64];
    buf[0] = 0x01;
    buf[1..=4].copy_from_slice(&[128, 128, 128, 128]);
    buf[8] = 0x08;
    buf
}

fn states() -> (Arc<ReadStates>, Arc<WriteStates>) {
    let mapper = ValueMapper::new(Mapping::Raw, &Tolerances::default()).unwrap();
    (
        Arc::new(ReadStates::new(&mapper, ReadStatesOptions::default())),
        Arc::new(WriteStates::new(&mapper, false)),
    )
}

#[test]
fn test_detect_connection_type() -> Result<(), Box<dyn Error>> {
    let expected = [
        (64, ConnectionType::Usb),
        (78, ConnectionType::Bluetooth),
        (10, ConnectionType::BluetoothMinimal),
    ];
    for (len, connection_type) in expected {
        let mut transport = MockTransport::new();
        transport.push_read(vec![0; len]);
        assert_eq!(
            detect_connection_type(&mut transport)?,
            connection_type,
            "A {len} byte report should select {connection_type}"
        );
    }

    let mut transport = MockTransport::new();
    transport.push_read(vec![0; 50]);
    let result = detect_connection_type(&mut transport);
    assert!(
        matches!(
            result,
            Err(DriverError::Report(ReportError::InvalidConnectionType(50)))
        ),
        "Unknown report lengths must fail detection"
    );

    Ok(())
}

#[test]
fn test_poll_updates_read_states() -> Result<(), Box<dyn Error>> {
    let transport = MockTransport::new();
    let (read_states, write_states) = states();
    let presses = Arc::new(Mutex::new(Vec::new()));
    let recorded = presses.clone();
    read_states
        .btn_cross
        .on_change(move |pressed| recorded.lock().unwrap().push(*pressed));

    let mut pressed = neutral_usb_report();
    pressed[8] |= 0x20;
    transport.push_read(neutral_usb_report());
    transport.push_read(pressed);
    transport.push_read(neutral_usb_report());

    let mut driver = Driver::new(
        Box::new(transport.clone()),
        ConnectionType::Usb,
        read_states.clone(),
        write_states,
    );
    assert!(driver.poll()?);
    assert!(driver.poll()?);
    assert!(driver.poll()?);
    assert!(!driver.poll()?, "An empty queue should time out");

    assert_eq!(*presses.lock().unwrap(), vec![true, false]);
    assert_eq!(read_states.btn_cross.value(), Some(false));

    Ok(())
}

#[test]
fn test_poll_rejects_wrong_report_length() -> Result<(), Box<dyn Error>> {
    let transport = MockTransport::new();
    transport.push_read(vec![0; 78]);
    let (read_states, write_states) = states();
    let mut driver = Driver::new(
        Box::new(transport),
        ConnectionType::Usb,
        read_states,
        write_states,
    );

    let result = driver.poll();
    assert!(
        matches!(
            result,
            Err(DriverError::Report(ReportError::InvalidReportLength {
                expected: 64,
                actual: 78,
                ..
            }))
        ),
        "Reports of another variant must end the session"
    );

    Ok(())
}

#[test]
fn test_flush_writes_when_changed() -> Result<(), Box<dyn Error>> {
    let transport = MockTransport::new();
    let (read_states, write_states) = states();
    let mut driver = Driver::new(
        Box::new(transport.clone()),
        ConnectionType::Usb,
        read_states,
        write_states.clone(),
    );

    assert!(!driver.flush()?, "Nothing should be written before a change");
    write_states.set_lightbar_color(1, 2, 3);
    assert!(driver.flush()?);
    assert!(!write_states.has_changed());
    assert!(!driver.flush()?, "Unchanged state should not be written again");

    let written = transport.written();
    assert_eq!(written.len(), 1);
    assert_eq!(written[0].len(), 48);
    assert_eq!(written[0][0], 0x02);
    assert_eq!(written[0][45..=47], [1, 2, 3]);

    Ok(())
}

#[test]
fn test_flush_bluetooth_minimal() -> Result<(), Box<dyn Error>> {
    let transport = MockTransport::new();
    let (read_states, write_states) = states();
    let mut driver = Driver::new(
        Box::new(transport.clone()),
        ConnectionType::BluetoothMinimal,
        read_states,
        write_states.clone(),
    );

    write_states.set_motor_left(200.0);
    assert!(!driver.flush()?);
    assert!(!write_states.has_changed(), "Dropped output should not stay pending");
    assert!(transport.written().is_empty());

    Ok(())
}

#[test]
fn test_run_until_stopped() -> Result<(), Box<dyn Error>> {
    let transport = MockTransport::new();
    transport.push_read(neutral_usb_report());
    let (read_states, write_states) = states();
    write_states.set_motor_right(10.0);
    let driver = Driver::new(
        Box::new(transport.clone()),
        ConnectionType::Usb,
        read_states,
        write_states,
    );

    let stop = Arc::new(AtomicBool::new(false));
    let thread_stop = stop.clone();
    let handle = thread::spawn(move || driver.run(thread_stop));
    while transport.written().is_empty() {
        thread::sleep(Duration::from_millis(1));
    }
    stop.store(true, std::sync::atomic::Ordering::Release);
    let (_transport, result) = handle.join().unwrap();
    assert!(result.is_ok());
    assert_eq!(transport.pending_reads(), 0);
    assert_eq!(transport.written().len(), 1);

    Ok(())
}

#[test]
fn test_run_ends_on_error() -> Result<(), Box<dyn Error>> {
    let transport = MockTransport::new();
    transport.push_read(neutral_usb_report());
    transport.push_read(vec![0; 10]);
    let (read_states, write_states) = states();
    let driver = Driver::new(
        Box::new(transport),
        ConnectionType::Usb,
        read_states,
        write_states,
    );

    let (_transport, result) = driver.run(Arc::new(AtomicBool::new(false)));
    assert!(matches!(
        result,
        Err(DriverError::Report(ReportError::InvalidReportLength { actual: 10, .. }))
    ));

    Ok(())
}

#[test]
fn test_run_ends_on_listener_panic() -> Result<(), Box<dyn Error>> {
    let transport = MockTransport::new();
    transport.push_read(neutral_usb_report());
    let mut pressed = neutral_usb_report();
    pressed[8] = 0x08 | 0x20;
    transport.push_read(pressed);
    let (read_states, write_states) = states();
    let listener = read_states
        .btn_cross
        .on_change(|_| panic!("cross listener failed"));
    let driver = Driver::new(
        Box::new(transport.clone()),
        ConnectionType::Usb,
        read_states.clone(),
        write_states,
    );

    let (_transport, result) = driver.run(Arc::new(AtomicBool::new(false)));
    match result {
        Err(DriverError::Panicked(message)) => assert_eq!(message, "cross listener failed"),
        other => return Err(format!("Expected a panic error, got {other:?}").into()),
    }

    // States stay usable after the listener panicked
    assert_eq!(read_states.btn_cross.value(), Some(true));
    read_states.btn_cross.remove_listener(listener);
    read_states.update(InputReport::empty(ConnectionType::Usb));
    assert_eq!(read_states.btn_cross.value(), Some(false));

    Ok(())
}

#[test]
fn test_supported_devices() -> Result<(), Box<dyn Error>> {
    assert!(is_dualsense(DS5_VID, DS5_PID));
    assert!(is_dualsense(DS5_EDGE_VID, DS5_EDGE_PID));
    assert!(!is_dualsense(DS5_VID, 0x05c4), "DualShock 4 is not supported");
    assert!(!is_dualsense(0x28de, DS5_PID));

    Ok(())
}

#[test]
fn test_update_benchmark() -> Result<(), Box<dyn Error>> {
    let benchmark = UpdateBenchmark::new();
    assert_eq!(benchmark.mean(), None);
    assert_eq!(benchmark.record(Duration::from_micros(10)), Duration::from_micros(10));
    assert_eq!(benchmark.record(Duration::from_micros(30)), Duration::from_micros(20));

    for _ in 0..BENCHMARK_WINDOW {
        benchmark.record(Duration::from_micros(100));
    }
    assert_eq!(
        benchmark.mean(),
        Some(Duration::from_micros(100)),
        "Old samples should leave the window"
    );

    Ok(())
}
