//! Reactive state of the controller. Read states are decoded from input
//! reports, write states are encoded into output reports.
pub mod cell;
pub mod compare;
pub mod graph;
pub mod mapping;
pub mod orientation;
pub mod read_states;
pub mod value;
pub mod write_states;

#[cfg(test)]
pub mod mapping_test;
