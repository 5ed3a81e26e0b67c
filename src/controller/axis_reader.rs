use crate::calibration::Axis;
use crate::hardware::AnalogChannel;
use tracing::trace;

/// Oversampled acquisition for the two joystick axes.
#[derive(Debug)]
pub struct AxisReader<A: AnalogChannel> {
    channels: [A; 2],
    samples: usize,
}

impl<A: AnalogChannel> AxisReader<A> {
    /// `samples` is clamped to at least one read.
    pub fn new(axis_one: A, axis_two: A, samples: usize) -> Self {
        Self {
            channels: [axis_one, axis_two],
            samples: samples.max(1),
        }
    }

    pub fn samples(&self) -> usize {
        self.samples
    }

    /// Rounded mean of `samples` consecutive reads.
    pub fn read(&mut self, axis: Axis) -> u16 {
        let channel = &mut self.channels[axis.index()];
        let sum: u64 = (0..self.samples)
            .map(|_| u64::from(channel.read_raw()))
            .sum();
        let mean = (sum as f64 / self.samples as f64).round_ties_even() as u16;
        trace!("Axis {} averaged {} samples to {}", axis, self.samples, mean);
        mean
    }

    /// A single unfiltered read, as used during calibration.
    pub fn read_once(&mut self, axis: Axis) -> u16 {
        self.channels[axis.index()].read_raw()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::MockAnalog;

    #[test]
    fn test_mean_of_samples() {
        let one = MockAnalog::scripted(&[100, 200, 300]);
        let two = MockAnalog::constant(40000);
        let mut reader = AxisReader::new(one, two, 3);

        assert_eq!(reader.read(Axis::One), 200);
        assert_eq!(reader.read(Axis::Two), 40000);
    }

    #[test]
    fn test_mean_rounds_half_to_even() {
        // 3 / 2 = 1.5 -> 2, 5 / 2 = 2.5 -> 2
        let mut reader = AxisReader::new(
            MockAnalog::scripted(&[1, 2, 2, 3]),
            MockAnalog::constant(0),
            2,
        );
        assert_eq!(reader.read(Axis::One), 2);
        assert_eq!(reader.read(Axis::One), 2);
    }

    #[test]
    fn test_full_scale_does_not_overflow() {
        let mut reader = AxisReader::new(
            MockAnalog::constant(u16::MAX),
            MockAnalog::constant(0),
            8,
        );
        assert_eq!(reader.read(Axis::One), u16::MAX);
    }

    #[test]
    fn test_read_once_takes_single_sample() {
        let one = MockAnalog::scripted(&[10, 20, 30]);
        let handle = one.clone();
        let mut reader = AxisReader::new(one, MockAnalog::constant(0), 3);

        assert_eq!(reader.read_once(Axis::One), 10);
        assert_eq!(handle.reads(), 1);
    }

    #[test]
    fn test_zero_samples_clamped() {
        let reader = AxisReader::new(MockAnalog::constant(0), MockAnalog::constant(0), 0);
        assert_eq!(reader.samples(), 1);
    }
}
