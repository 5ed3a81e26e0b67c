//! # Calibration Model
//!
//! Data types for the persisted joystick calibration and its text encoding.
//!
//! A calibration record always holds five pose entries in the fixed order
//! `MIDDLE, LEFT, RIGHT, UP, DOWN`. The middle entry stores the raw center of both
//! axes, every directional entry stores the axis that moved most and its raw value at
//! full deflection.
//!
//! ## File Encoding
//!
//! The record lives on the second line of the calibration file as a nested list literal:
//!
//! ```text
//! # Calibration (will be automatically written)
//! [['MIDDLE', 1, 32768, 2, 32768], ['LEFT', 1, 10000], ['RIGHT', 1, 55000], ['UP', 2, 10000], ['DOWN', 2, 55000]]
//! ```
//!
//! An uncalibrated file carries `[]` on that line. Parsing goes through `toml`, whose
//! inline array grammar accepts this literal as-is (single-quoted strings are TOML
//! literal strings), so no hand-written tokenizer is needed.
//!
//! ## Submodules
//!
//! - [`store`] - locating, loading and rewriting the calibration file
//! - [`calibrator`] - the interactive five-pose procedure producing a record

pub mod calibrator;
pub mod store;

use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

pub use calibrator::{Calibrator, ConsolePrompt, OperatorPrompt};
pub use store::{CalibrationFile, CalibrationStore};

/// Raw midpoint of the ADC's native 16-bit range.
pub const NATIVE_MIDPOINT: f64 = 32767.5;

/// The five calibration postures, in the order they are sampled and stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pose {
    Middle,
    Left,
    Right,
    Up,
    Down,
}

impl Pose {
    pub const SEQUENCE: [Pose; 5] = [Pose::Middle, Pose::Left, Pose::Right, Pose::Up, Pose::Down];

    pub fn label(self) -> &'static str {
        match self {
            Pose::Middle => "MIDDLE",
            Pose::Left => "LEFT",
            Pose::Right => "RIGHT",
            Pose::Up => "UP",
            Pose::Down => "DOWN",
        }
    }
}

impl fmt::Display for Pose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Stick directions in evaluation order.
///
/// Ties between equal deflections are resolved by this order, so `EVALUATION_ORDER`
/// is part of the query contract and must not be reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
    Right,
    Left,
}

impl Direction {
    pub const EVALUATION_ORDER: [Direction; 4] =
        [Direction::Up, Direction::Down, Direction::Right, Direction::Left];

    pub fn name(self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Right => "right",
            Direction::Left => "left",
        }
    }

    /// Calibration pose that captures this direction's extreme.
    pub fn pose(self) -> Pose {
        match self {
            Direction::Up => Pose::Up,
            Direction::Down => Pose::Down,
            Direction::Right => Pose::Right,
            Direction::Left => Pose::Left,
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One of the two analog axes, numbered 1 and 2 as in the file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    One,
    Two,
}

impl Axis {
    pub const ALL: [Axis; 2] = [Axis::One, Axis::Two];

    pub fn number(self) -> u8 {
        match self {
            Axis::One => 1,
            Axis::Two => 2,
        }
    }

    pub fn from_number(number: u8) -> Option<Self> {
        match number {
            1 => Some(Axis::One),
            2 => Some(Axis::Two),
            _ => None,
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Axis::One => 0,
            Axis::Two => 1,
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// Raw extreme of one direction together with the axis it was measured on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectionalCalibration {
    pub axis: Axis,
    pub extreme_raw: u16,
}

/// A single entry of the persisted record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoseEntry {
    Middle { axis_a_raw: u16, axis_b_raw: u16 },
    Directional { pose: Pose, calibration: DirectionalCalibration },
}

impl PoseEntry {
    pub fn pose(&self) -> Pose {
        match self {
            PoseEntry::Middle { .. } => Pose::Middle,
            PoseEntry::Directional { pose, .. } => *pose,
        }
    }
}

impl fmt::Display for PoseEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoseEntry::Middle {
                axis_a_raw,
                axis_b_raw,
            } => write!(
                f,
                "['{}', {}, {}, {}, {}]",
                Pose::Middle,
                Axis::One,
                axis_a_raw,
                Axis::Two,
                axis_b_raw
            ),
            PoseEntry::Directional { pose, calibration } => write!(
                f,
                "['{}', {}, {}]",
                pose, calibration.axis, calibration.extreme_raw
            ),
        }
    }
}

/// Complete five-pose calibration.
///
/// The fixed pose order and entry count are carried by the struct layout, so a value of
/// this type is always a well-formed record. It is never mutated after construction;
/// recalibration builds a fresh record and replaces the old one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalibrationRecord {
    center: [u16; 2],
    directions: [DirectionalCalibration; 4],
}

impl CalibrationRecord {
    pub fn new(
        center: [u16; 2],
        left: DirectionalCalibration,
        right: DirectionalCalibration,
        up: DirectionalCalibration,
        down: DirectionalCalibration,
    ) -> Self {
        let mut directions = [left; 4];
        directions[Direction::Right.index()] = right;
        directions[Direction::Up.index()] = up;
        directions[Direction::Down.index()] = down;
        directions[Direction::Left.index()] = left;
        Self { center, directions }
    }

    /// Raw center reading of `axis` from the MIDDLE pose.
    pub fn center(&self, axis: Axis) -> u16 {
        self.center[axis.index()]
    }

    pub fn direction(&self, direction: Direction) -> DirectionalCalibration {
        self.directions[direction.index()]
    }

    /// Entries in persisted order `[MIDDLE, LEFT, RIGHT, UP, DOWN]`.
    pub fn pose_entries(&self) -> [PoseEntry; 5] {
        let directional = |direction: Direction| PoseEntry::Directional {
            pose: direction.pose(),
            calibration: self.direction(direction),
        };
        [
            PoseEntry::Middle {
                axis_a_raw: self.center(Axis::One),
                axis_b_raw: self.center(Axis::Two),
            },
            directional(Direction::Left),
            directional(Direction::Right),
            directional(Direction::Up),
            directional(Direction::Down),
        ]
    }

    /// Text written to line 2 of the calibration file.
    pub fn to_literal(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for CalibrationRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, entry) in self.pose_entries().iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{entry}")?;
        }
        f.write_str("]")
    }
}

/// Content of line 2 of a calibration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoredCalibration {
    /// `[]`: the device has not been calibrated yet.
    Empty,
    Calibrated(CalibrationRecord),
}

/// Why a line-2 literal could not be turned into a record.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("not a valid list literal: {0}")]
    Syntax(#[from] toml::de::Error),

    #[error("expected 5 pose entries, found {0}")]
    EntryCount(usize),

    #[error("entry {index} should be {expected}, found '{found}'")]
    PoseOrder {
        index: usize,
        expected: Pose,
        found: String,
    },

    #[error("entry {index} ({pose}) has the wrong shape")]
    EntryShape { index: usize, pose: Pose },

    #[error("{pose} references unknown axis {axis}")]
    UnknownAxis { pose: Pose, axis: u8 },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawEntry {
    Middle(String, u8, u16, u8, u16),
    Directional(String, u8, u16),
}

impl RawEntry {
    fn label(&self) -> &str {
        match self {
            RawEntry::Middle(label, ..) | RawEntry::Directional(label, ..) => label,
        }
    }
}

#[derive(Deserialize)]
struct CalibrationLine {
    entries: Vec<RawEntry>,
}

impl FromStr for StoredCalibration {
    type Err = RecordError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let parsed: CalibrationLine = toml::from_str(&format!("entries = {}", line.trim()))?;
        let entries = parsed.entries;

        if entries.is_empty() {
            return Ok(StoredCalibration::Empty);
        }
        if entries.len() != Pose::SEQUENCE.len() {
            return Err(RecordError::EntryCount(entries.len()));
        }

        for (index, (entry, expected)) in entries.iter().zip(Pose::SEQUENCE).enumerate() {
            if entry.label() != expected.label() {
                return Err(RecordError::PoseOrder {
                    index,
                    expected,
                    found: entry.label().to_string(),
                });
            }
        }

        let center = match &entries[0] {
            RawEntry::Middle(_, 1, a, 2, b) => [*a, *b],
            RawEntry::Middle(_, 1, _, axis, _) | RawEntry::Middle(_, axis, ..) => {
                return Err(RecordError::UnknownAxis {
                    pose: Pose::Middle,
                    axis: *axis,
                })
            }
            RawEntry::Directional(..) => {
                return Err(RecordError::EntryShape {
                    index: 0,
                    pose: Pose::Middle,
                })
            }
        };

        let mut directional = Vec::with_capacity(4);
        for (index, entry) in entries.iter().enumerate().skip(1) {
            let pose = Pose::SEQUENCE[index];
            match entry {
                RawEntry::Directional(_, axis, extreme_raw) => {
                    let axis = Axis::from_number(*axis)
                        .ok_or(RecordError::UnknownAxis { pose, axis: *axis })?;
                    directional.push(DirectionalCalibration {
                        axis,
                        extreme_raw: *extreme_raw,
                    });
                }
                RawEntry::Middle(..) => return Err(RecordError::EntryShape { index, pose }),
            }
        }

        Ok(StoredCalibration::Calibrated(CalibrationRecord::new(
            center,
            directional[0],
            directional[1],
            directional[2],
            directional[3],
        )))
    }
}

/// Errors raised while locating, reading, writing or applying a calibration.
#[derive(Debug, thiserror::Error)]
pub enum CalibrationError {
    #[error(
        "no calibration file ending in '{extension}' with header '{header}' found under {}",
        root.display()
    )]
    NotFound {
        root: PathBuf,
        extension: String,
        header: String,
    },

    #[error(
        "calibration data in {} is corrupted ({source}). Replace the second line with '[]' to reset.",
        path.display()
    )]
    Corrupted {
        path: PathBuf,
        #[source]
        source: RecordError,
    },

    #[error(
        "couldn't write calibration to {} ({source}), please insert this manually on the second line: '{literal}'",
        path.display()
    )]
    WriteFailed {
        path: PathBuf,
        literal: String,
        #[source]
        source: std::io::Error,
    },

    #[error("calibration aborted while waiting for the {pose} pose: {source}")]
    Prompt {
        pose: Pose,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(
        "{direction} extreme {extreme_raw} on axis {axis} sits on the deadzone boundary; recalibrate the joystick"
    )]
    Degenerate {
        direction: Direction,
        axis: Axis,
        extreme_raw: u16,
    },
}

#[cfg(test)]
pub(crate) fn sample_record() -> CalibrationRecord {
    CalibrationRecord::new(
        [32768, 32768],
        DirectionalCalibration {
            axis: Axis::One,
            extreme_raw: 10000,
        },
        DirectionalCalibration {
            axis: Axis::One,
            extreme_raw: 55000,
        },
        DirectionalCalibration {
            axis: Axis::Two,
            extreme_raw: 10000,
        },
        DirectionalCalibration {
            axis: Axis::Two,
            extreme_raw: 55000,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const LITERAL: &str = "[['MIDDLE', 1, 32768, 2, 32768], ['LEFT', 1, 10000], ['RIGHT', 1, 55000], ['UP', 2, 10000], ['DOWN', 2, 55000]]";

    #[test]
    fn test_literal_matches_file_format() {
        assert_eq!(sample_record().to_literal(), LITERAL);
    }

    #[test]
    fn test_literal_round_trip() {
        let record = sample_record();
        let parsed: StoredCalibration = record.to_literal().parse().unwrap();
        assert_eq!(parsed, StoredCalibration::Calibrated(record));
    }

    #[test]
    fn test_empty_literal() {
        assert_eq!(
            "[]".parse::<StoredCalibration>().unwrap(),
            StoredCalibration::Empty
        );
        assert_eq!(
            "  []  ".parse::<StoredCalibration>().unwrap(),
            StoredCalibration::Empty
        );
    }

    #[test]
    fn test_double_quoted_labels_accepted() {
        let literal = LITERAL.replace('\'', "\"");
        let parsed: StoredCalibration = literal.parse().unwrap();
        assert_eq!(parsed, StoredCalibration::Calibrated(sample_record()));
    }

    #[test]
    fn test_garbage_is_syntax_error() {
        assert!(matches!(
            "[['MIDDLE', 1, 3".parse::<StoredCalibration>(),
            Err(RecordError::Syntax(_))
        ));
        assert!(matches!(
            "hello".parse::<StoredCalibration>(),
            Err(RecordError::Syntax(_))
        ));
    }

    #[test]
    fn test_wrong_entry_count() {
        let literal = "[['MIDDLE', 1, 32768, 2, 32768], ['LEFT', 1, 10000]]";
        assert!(matches!(
            literal.parse::<StoredCalibration>(),
            Err(RecordError::EntryCount(2))
        ));
    }

    #[test]
    fn test_wrong_pose_order() {
        let literal = LITERAL.replace("'LEFT'", "'SIDEWAYS'");
        match literal.parse::<StoredCalibration>() {
            Err(RecordError::PoseOrder {
                index,
                expected,
                found,
            }) => {
                assert_eq!(index, 1);
                assert_eq!(expected, Pose::Left);
                assert_eq!(found, "SIDEWAYS");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_axis_rejected() {
        let literal = LITERAL.replace("['UP', 2, 10000]", "['UP', 3, 10000]");
        assert!(matches!(
            literal.parse::<StoredCalibration>(),
            Err(RecordError::UnknownAxis {
                pose: Pose::Up,
                axis: 3
            })
        ));
    }

    #[test]
    fn test_out_of_range_raw_rejected() {
        let literal = LITERAL.replace("55000]", "70000]");
        assert!(literal.parse::<StoredCalibration>().is_err());
    }

    #[test]
    fn test_pose_entries_in_persisted_order() {
        let poses: Vec<Pose> = sample_record()
            .pose_entries()
            .iter()
            .map(PoseEntry::pose)
            .collect();
        assert_eq!(poses, Pose::SEQUENCE);
    }

    #[test]
    fn test_direction_lookup() {
        let record = sample_record();
        assert_eq!(record.center(Axis::Two), 32768);
        assert_eq!(
            record.direction(Direction::Down),
            DirectionalCalibration {
                axis: Axis::Two,
                extreme_raw: 55000
            }
        );
        assert_eq!(record.direction(Direction::Left).extreme_raw, 10000);
    }
}
