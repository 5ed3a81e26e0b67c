//! Controller subsystem for the analog joystick
//!
//! Implements the runtime side of the signal-conditioning pipeline:
//!
//! 1. [`axis_reader`] - Oversampled raw acquisition per axis
//! 2. [`direction_engine`] - Deadzone, normalisation and direction arbitration
//! 3. [`joystick`] - Button handling, queries and the polling API
//!
//! # Architecture
//!
//! ```text
//! ADC ──► AxisReader ──► DirectionEngine ──► JoystickInput
//!         (averaged)     (0-100 % per dir)      ▲
//! GPIO ─────────────────────────────────────────┘ (button wins)
//! ```

pub mod axis_reader;
pub mod direction_engine;
pub mod joystick;

pub use axis_reader::AxisReader;
pub use direction_engine::{
    DeadzoneBand, DirectionEngine, DirectionReadings, DirectionResult, ReadMode,
    THRESHOLD_PERCENT,
};
pub use joystick::{ControllerError, JoystickController, JoystickInput, Snapshot, SnapshotValue};
