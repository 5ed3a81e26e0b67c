//! Interactive five-pose calibration.
//!
//! The procedure is a strictly linear statum machine, one state per pose:
//!
//! ```text
//! AwaitMiddle ──► AwaitLeft ──► AwaitRight ──► AwaitUp ──► AwaitDown ──► Complete
//! ```
//!
//! Every step asks the operator to hold the stick in a pose and then takes one raw
//! read per axis. Nothing is persisted here; [`Calibrator::run`] hands back a complete
//! [`CalibrationRecord`] and the caller decides where it goes.

use super::{
    Axis, CalibrationError, CalibrationRecord, DirectionalCalibration, Pose, NATIVE_MIDPOINT,
};
use crate::controller::AxisReader;
use crate::hardware::AnalogChannel;
use statum::{machine, state};
use std::io::{self, BufRead, Write};
use tracing::{debug, info};

/// Tells the operator which pose to hold and blocks until they confirm.
pub trait OperatorPrompt {
    fn hold(&mut self, pose: Pose) -> io::Result<()>;
}

/// Prompts on stdout and waits for ENTER on stdin.
#[derive(Debug, Default)]
pub struct ConsolePrompt;

impl OperatorPrompt for ConsolePrompt {
    fn hold(&mut self, pose: Pose) -> io::Result<()> {
        print!("Push the joystick to the {pose} and hold it there, then press ENTER");
        io::stdout().flush()?;
        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line)? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "stdin closed during calibration",
            ));
        }
        Ok(())
    }
}

#[state]
#[derive(Debug, Clone)]
pub enum CalibrationStep {
    AwaitMiddle,
    AwaitLeft,
    AwaitRight,
    AwaitUp,
    AwaitDown,
    Complete,
}

#[machine]
#[derive(Debug)]
pub struct Calibrator<S: CalibrationStep> {
    center: [u16; 2],
    // LEFT, RIGHT, UP, DOWN as they are captured
    extremes: Vec<DirectionalCalibration>,
}

/// Axis that moved furthest from the native midpoint. Axis 1 only wins a strict
/// comparison, equal deviations go to axis 2.
pub fn dominant_axis(raw_one: u16, raw_two: u16) -> DirectionalCalibration {
    let diff_one = (NATIVE_MIDPOINT - f64::from(raw_one)).abs();
    let diff_two = (NATIVE_MIDPOINT - f64::from(raw_two)).abs();
    if diff_one > diff_two {
        DirectionalCalibration {
            axis: Axis::One,
            extreme_raw: raw_one,
        }
    } else {
        DirectionalCalibration {
            axis: Axis::Two,
            extreme_raw: raw_two,
        }
    }
}

impl<S: CalibrationStep> Calibrator<S> {
    fn sample_pose<P: OperatorPrompt, A: AnalogChannel>(
        pose: Pose,
        prompt: &mut P,
        reader: &mut AxisReader<A>,
    ) -> Result<(u16, u16), CalibrationError> {
        prompt
            .hold(pose)
            .map_err(|source| CalibrationError::Prompt { pose, source })?;
        let raw_one = reader.read_once(Axis::One);
        let raw_two = reader.read_once(Axis::Two);
        debug!("{} pose sampled: axis 1 = {}, axis 2 = {}", pose, raw_one, raw_two);
        Ok((raw_one, raw_two))
    }

    fn capture_extreme<P: OperatorPrompt, A: AnalogChannel>(
        &mut self,
        pose: Pose,
        prompt: &mut P,
        reader: &mut AxisReader<A>,
    ) -> Result<(), CalibrationError> {
        let (raw_one, raw_two) = Self::sample_pose(pose, prompt, reader)?;
        let extreme = dominant_axis(raw_one, raw_two);
        info!(
            "{} calibrated on axis {} at {}",
            pose, extreme.axis, extreme.extreme_raw
        );
        self.extremes.push(extreme);
        Ok(())
    }
}

impl Calibrator<AwaitMiddle> {
    pub fn start() -> Self {
        info!("Calibration started");
        Self::new([0, 0], Vec::with_capacity(4))
    }

    /// Runs all five steps and returns the finished record.
    pub fn run<P: OperatorPrompt, A: AnalogChannel>(
        prompt: &mut P,
        reader: &mut AxisReader<A>,
    ) -> Result<CalibrationRecord, CalibrationError> {
        let record = Self::start()
            .capture(prompt, reader)?
            .capture(prompt, reader)?
            .capture(prompt, reader)?
            .capture(prompt, reader)?
            .capture(prompt, reader)?
            .finish();
        info!("Calibration finished: {}", record);
        Ok(record)
    }

    pub fn capture<P: OperatorPrompt, A: AnalogChannel>(
        mut self,
        prompt: &mut P,
        reader: &mut AxisReader<A>,
    ) -> Result<Calibrator<AwaitLeft>, CalibrationError> {
        let (raw_one, raw_two) = Self::sample_pose(Pose::Middle, prompt, reader)?;
        self.center = [raw_one, raw_two];
        info!("Center calibrated at ({}, {})", raw_one, raw_two);
        Ok(self.transition())
    }
}

impl Calibrator<AwaitLeft> {
    pub fn capture<P: OperatorPrompt, A: AnalogChannel>(
        mut self,
        prompt: &mut P,
        reader: &mut AxisReader<A>,
    ) -> Result<Calibrator<AwaitRight>, CalibrationError> {
        self.capture_extreme(Pose::Left, prompt, reader)?;
        Ok(self.transition())
    }
}

impl Calibrator<AwaitRight> {
    pub fn capture<P: OperatorPrompt, A: AnalogChannel>(
        mut self,
        prompt: &mut P,
        reader: &mut AxisReader<A>,
    ) -> Result<Calibrator<AwaitUp>, CalibrationError> {
        self.capture_extreme(Pose::Right, prompt, reader)?;
        Ok(self.transition())
    }
}

impl Calibrator<AwaitUp> {
    pub fn capture<P: OperatorPrompt, A: AnalogChannel>(
        mut self,
        prompt: &mut P,
        reader: &mut AxisReader<A>,
    ) -> Result<Calibrator<AwaitDown>, CalibrationError> {
        self.capture_extreme(Pose::Up, prompt, reader)?;
        Ok(self.transition())
    }
}

impl Calibrator<AwaitDown> {
    pub fn capture<P: OperatorPrompt, A: AnalogChannel>(
        mut self,
        prompt: &mut P,
        reader: &mut AxisReader<A>,
    ) -> Result<Calibrator<Complete>, CalibrationError> {
        self.capture_extreme(Pose::Down, prompt, reader)?;
        Ok(self.transition())
    }
}

impl Calibrator<Complete> {
    pub fn finish(self) -> CalibrationRecord {
        let [left, right, up, down] = [0, 1, 2, 3].map(|i| self.extremes[i]);
        CalibrationRecord::new(self.center, left, right, up, down)
    }
}
