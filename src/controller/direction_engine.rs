//! Deadzone filtering, axis normalisation and direction arbitration.
//!
//! ```text
//! raw sample ──► DeadzoneBand ──► percent (0-100) per direction ──► dominant direction
//! ```
//!
//! Each axis gets a band `[low, center, high]` around its measured center. A sample inside
//! the band reads as 0 %, outside it is scaled linearly towards the direction's
//! calibrated extreme and clamped to 100 %.

use super::axis_reader::AxisReader;
use crate::calibration::{Axis, CalibrationError, CalibrationRecord, Direction, DirectionalCalibration};
use crate::hardware::AnalogChannel;
use std::fmt;
use tracing::{debug, info};

/// Percentage a direction must exceed to count in [`ReadMode::Threshold`].
pub const THRESHOLD_PERCENT: u8 = 50;

/// How a directional query reports its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadMode {
    /// Direction only, and only when deflected more than [`THRESHOLD_PERCENT`].
    #[default]
    Threshold,
    /// Strongest direction with its percentage, whatever its size.
    Percent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectionResult {
    Active(Direction),
    Deflection { direction: Direction, percent: u8 },
}

impl DirectionResult {
    pub fn direction(&self) -> Direction {
        match self {
            DirectionResult::Active(direction) => *direction,
            DirectionResult::Deflection { direction, .. } => *direction,
        }
    }
}

impl fmt::Display for DirectionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DirectionResult::Active(direction) => write!(f, "{direction}"),
            DirectionResult::Deflection { direction, percent } => {
                write!(f, "{direction} {percent}%")
            }
        }
    }
}

/// Neutral band around one axis' measured center.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeadzoneBand {
    pub low: u32,
    pub center: u32,
    pub high: u32,
}

impl DeadzoneBand {
    /// `deadzone` is in percent of the center value.
    pub fn new(center: u16, deadzone: f64) -> Self {
        let center_f = f64::from(center);
        Self {
            low: (center_f * (1.0 - deadzone / 100.0)).round_ties_even() as u32,
            center: u32::from(center),
            high: (center_f * (1.0 + deadzone / 100.0)).round_ties_even() as u32,
        }
    }

    pub fn contains(&self, raw: u16) -> bool {
        (self.low..=self.high).contains(&u32::from(raw))
    }

    /// Maps `raw` to 0-100 % of the way from the band edge to `extreme_raw`.
    ///
    /// A zero span (extreme sitting exactly on the band edge) saturates to 100 instead of
    /// dividing by zero. [`DirectionEngine::load`] rejects such records up front.
    pub fn percent_for(&self, raw: u16, extreme_raw: u16) -> u8 {
        let raw = f64::from(raw);
        let extreme = f64::from(extreme_raw);
        let low = f64::from(self.low);
        let high = f64::from(self.high);

        let percent = if raw > high {
            let span = extreme - high;
            if span == 0.0 {
                100.0
            } else {
                (raw - high) / span * 100.0
            }
        } else if raw < low {
            let span = low - extreme;
            if span == 0.0 {
                100.0
            } else {
                (low - raw) / span * 100.0
            }
        } else {
            return 0;
        };

        percent.clamp(0.0, 100.0).round_ties_even() as u8
    }

    fn is_boundary(&self, raw: u16) -> bool {
        let raw = u32::from(raw);
        raw == self.low || raw == self.high
    }
}

/// Percentages of all four directions from one pair of axis samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DirectionReadings {
    percents: [u8; 4],
}

impl DirectionReadings {
    pub fn get(&self, direction: Direction) -> u8 {
        self.percents[direction.index()]
    }

    /// `(direction, percent)` pairs in evaluation order.
    pub fn iter(&self) -> impl Iterator<Item = (Direction, u8)> + '_ {
        Direction::EVALUATION_ORDER
            .into_iter()
            .map(|direction| (direction, self.get(direction)))
    }

    /// Strongest direction; the first in evaluation order wins a tie.
    pub fn dominant(&self, mode: ReadMode) -> Option<DirectionResult> {
        let mut best: Option<(Direction, u8)> = None;
        for (direction, percent) in self.iter() {
            match best {
                Some((_, best_percent)) if best_percent >= percent => {}
                _ => best = Some((direction, percent)),
            }
        }

        let (direction, percent) = best?;
        if percent == 0 {
            return None;
        }
        match mode {
            ReadMode::Threshold if percent > THRESHOLD_PERCENT => {
                Some(DirectionResult::Active(direction))
            }
            ReadMode::Threshold => None,
            ReadMode::Percent => Some(DirectionResult::Deflection { direction, percent }),
        }
    }
}

/// Calibrated conversion from live samples to directions.
///
/// Holds the record it was built from; loading a new record means building a new engine.
#[derive(Debug, Clone)]
pub struct DirectionEngine {
    record: CalibrationRecord,
    bands: [DeadzoneBand; 2],
}

impl DirectionEngine {
    /// Derives the deadzone bands and checks that no direction divides by zero.
    pub fn load(record: CalibrationRecord, deadzone: f64) -> Result<Self, CalibrationError> {
        let bands = Axis::ALL.map(|axis| DeadzoneBand::new(record.center(axis), deadzone));

        for direction in Direction::EVALUATION_ORDER {
            let DirectionalCalibration { axis, extreme_raw } = record.direction(direction);
            if bands[axis.index()].is_boundary(extreme_raw) {
                return Err(CalibrationError::Degenerate {
                    direction,
                    axis,
                    extreme_raw,
                });
            }
        }

        for axis in Axis::ALL {
            let band = bands[axis.index()];
            info!(
                "Axis {} deadzone band: [{}, {}, {}]",
                axis, band.low, band.center, band.high
            );
        }
        Ok(Self { record, bands })
    }

    pub fn record(&self) -> &CalibrationRecord {
        &self.record
    }

    pub fn band(&self, axis: Axis) -> DeadzoneBand {
        self.bands[axis.index()]
    }

    pub fn percent_for(&self, raw: u16, calibration: DirectionalCalibration) -> u8 {
        self.band(calibration.axis)
            .percent_for(raw, calibration.extreme_raw)
    }

    /// Converts one sample per axis into all four direction percentages.
    pub fn readings(&self, samples: [u16; 2]) -> DirectionReadings {
        let mut readings = DirectionReadings::default();
        for direction in Direction::EVALUATION_ORDER {
            let calibration = self.record.direction(direction);
            let raw = samples[calibration.axis.index()];
            readings.percents[direction.index()] = self.percent_for(raw, calibration);
        }
        readings
    }

    /// Reads both axes once (oversampled) and evaluates every direction.
    pub fn evaluate<A: AnalogChannel>(&self, reader: &mut AxisReader<A>) -> DirectionReadings {
        let samples = Axis::ALL.map(|axis| reader.read(axis));
        let readings = self.readings(samples);
        debug!("Samples {:?} -> {:?}", samples, readings);
        readings
    }

    pub fn dominant<A: AnalogChannel>(
        &self,
        reader: &mut AxisReader<A>,
        mode: ReadMode,
    ) -> Option<DirectionResult> {
        self.evaluate(reader).dominant(mode)
    }
}
