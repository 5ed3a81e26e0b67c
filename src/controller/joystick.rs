//! Joystick Controller - public query surface for stick and button
//!
//! Ties together calibration storage, oversampled axis reads, the direction engine and
//! the press button. Construction is where everything can fail; once a controller exists
//! its queries always produce a value.
//!
//! # Initialization
//!
//! ```text
//! locate file ──► load line 2 ──┬─ usable record ────────────────────► DirectionEngine
//!                               └─ [] or degenerate ──► Calibrator ──► save ──┘
//! ```
//!
//! # Polling
//!
//! [`JoystickController::await_input`] polls [`JoystickController::query`] and sleeps
//! for the configured interval between polls. It only returns early when the caller's
//! [`CancellationToken`] fires.

use super::axis_reader::AxisReader;
use super::direction_engine::{DirectionEngine, DirectionReadings, DirectionResult, ReadMode};
use crate::calibration::{
    CalibrationError, CalibrationFile, CalibrationRecord, CalibrationStore, Calibrator,
    Direction, OperatorPrompt, StoredCalibration,
};
use crate::config::{JoystickSettings, SettingsError};
use crate::hardware::{AnalogChannel, ButtonInput};
use std::fmt;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Result of a single query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoystickInput {
    /// The press button is held; it overrides any stick deflection.
    Button,
    Stick(DirectionResult),
}

impl fmt::Display for JoystickInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoystickInput::Button => f.write_str("button"),
            JoystickInput::Stick(result) => write!(f, "{result}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotValue {
    Pressed(bool),
    Percent(u8),
}

impl fmt::Display for SnapshotValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapshotValue::Pressed(pressed) => write!(f, "{pressed}"),
            SnapshotValue::Percent(percent) => write!(f, "{percent}"),
        }
    }
}

/// Button state followed by `up, down, right, left`.
pub type Snapshot = [(&'static str, SnapshotValue); 5];

#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error("Calibration error: {0}")]
    Calibration(#[from] CalibrationError),

    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),
}

pub struct JoystickController<A: AnalogChannel, B: ButtonInput> {
    reader: AxisReader<A>,
    button: B,
    engine: DirectionEngine,
    store: CalibrationStore,
    file: CalibrationFile,
    deadzone: f64,
    poll_interval: Duration,
}

impl<A: AnalogChannel, B: ButtonInput> JoystickController<A, B> {
    /// Locates and loads the calibration, running `prompt` through a calibration first
    /// if the file is still empty or its record has an extreme on a deadzone edge.
    ///
    /// A missing or corrupted calibration file aborts construction. A failed save after a
    /// fresh calibration is only logged; the new record is used for this session.
    pub fn initialize<P: OperatorPrompt>(
        settings: &JoystickSettings,
        axis_one: A,
        axis_two: A,
        button: B,
        prompt: &mut P,
    ) -> Result<Self, ControllerError> {
        info!("Initializing joystick with settings: {:?}", settings);
        settings.validate()?;

        let store = CalibrationStore::new(&settings.calibration);
        let file = store.locate()?;
        let mut reader = AxisReader::new(axis_one, axis_two, settings.samples);

        let stored = match store.load(&file)? {
            StoredCalibration::Calibrated(record) => {
                match DirectionEngine::load(record, settings.deadzone) {
                    Ok(engine) => Some(engine),
                    Err(e) => {
                        warn!("Stored calibration is unusable ({}), starting calibration", e);
                        None
                    }
                }
            }
            StoredCalibration::Empty => {
                warn!("Joystick is not calibrated yet, starting calibration");
                None
            }
        };

        let engine = match stored {
            Some(engine) => engine,
            None => {
                let record = Calibrator::run(prompt, &mut reader)?;
                let engine = DirectionEngine::load(record, settings.deadzone)?;
                if let Err(e) = store.save(&file, &record) {
                    error!("{}", e);
                }
                engine
            }
        };

        info!("Joystick ready");
        Ok(Self {
            reader,
            button,
            engine,
            store,
            file,
            deadzone: settings.deadzone,
            poll_interval: Duration::from_millis(settings.poll_interval_ms),
        })
    }

    pub fn record(&self) -> &CalibrationRecord {
        self.engine.record()
    }

    pub fn calibration_file(&self) -> &CalibrationFile {
        &self.file
    }

    pub fn is_pressed(&self) -> bool {
        self.button.level() == self.button.active_level()
    }

    /// Current percentages of all four directions.
    pub fn readings(&mut self) -> DirectionReadings {
        self.engine.evaluate(&mut self.reader)
    }

    /// Always five entries, independent of any threshold.
    pub fn snapshot(&mut self) -> Snapshot {
        let pressed = self.is_pressed();
        let readings = self.readings();
        let [up, down, right, left] = Direction::EVALUATION_ORDER
            .map(|direction| (direction.name(), SnapshotValue::Percent(readings.get(direction))));
        [("button", SnapshotValue::Pressed(pressed)), up, down, right, left]
    }

    /// The button if pressed, otherwise the dominant stick direction.
    pub fn query(&mut self, mode: ReadMode) -> Option<JoystickInput> {
        if self.is_pressed() {
            return Some(JoystickInput::Button);
        }
        self.engine
            .dominant(&mut self.reader, mode)
            .map(JoystickInput::Stick)
    }

    /// Polls until [`Self::query`] yields something. Returns `None` only when `cancel`
    /// fires first.
    pub async fn await_input(
        &mut self,
        mode: ReadMode,
        cancel: &CancellationToken,
    ) -> Option<JoystickInput> {
        loop {
            if let Some(input) = self.query(mode) {
                debug!("Input detected: {}", input);
                return Some(input);
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Waiting for input cancelled");
                    return None;
                }
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
    }

    /// Waits until the button is no longer pressed. Returns `false` if cancelled first.
    pub async fn await_button_release(&self, cancel: &CancellationToken) -> bool {
        while self.is_pressed() {
            tokio::select! {
                _ = cancel.cancelled() => return false,
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
        true
    }

    /// Runs a fresh calibration and swaps it in as a whole.
    ///
    /// The running engine is only replaced once the new record passed validation. If the
    /// record cannot be written afterwards it stays active for this session and the write
    /// error, which carries the literal, is returned.
    pub fn recalibrate<P: OperatorPrompt>(&mut self, prompt: &mut P) -> Result<(), ControllerError> {
        info!("Recalibrating joystick");
        let record = Calibrator::run(prompt, &mut self.reader)?;
        self.engine = DirectionEngine::load(record, self.deadzone)?;
        self.store.save(&self.file, &record)?;
        Ok(())
    }
}
