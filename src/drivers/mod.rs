pub mod dualsense;
