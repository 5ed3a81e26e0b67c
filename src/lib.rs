//! Signal conditioning for a two-axis analog joystick with a press button.
//!
//! Raw ADC samples are turned into calibrated, deadzone-filtered directions
//! (`up`, `down`, `left`, `right` with 0-100 % magnitude) and a button state. The
//! per-device calibration is persisted in a small text file so it survives reboots.

pub mod calibration;
pub mod config;
pub mod controller;
pub mod hardware;

pub use calibration::{CalibrationError, CalibrationRecord, Direction, Pose};
pub use config::JoystickSettings;
pub use controller::{ControllerError, JoystickController, JoystickInput, ReadMode};

// This module is only compiled during testing.
#[cfg(test)]
pub(crate) mod mocks;
