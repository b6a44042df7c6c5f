pub mod driver;
pub mod hid_report;
pub mod transport;

#[cfg(test)]
pub mod driver_test;
#[cfg(test)]
pub mod hid_report_test;
