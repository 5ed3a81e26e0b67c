// This module is only compiled during tests

use crate::calibration::{OperatorPrompt, Pose};
use crate::hardware::{AnalogChannel, ButtonInput};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct AnalogState {
    queued: VecDeque<u16>,
    current: u16,
    reads: usize,
}

/// Analog channel whose samples are set from the test. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MockAnalog {
    state: Arc<Mutex<AnalogState>>,
}

impl MockAnalog {
    pub fn constant(value: u16) -> Self {
        let mock = Self::default();
        mock.set(value);
        mock
    }

    /// Returns `values` in order, then keeps repeating the last one.
    pub fn scripted(values: &[u16]) -> Self {
        let mock = Self::default();
        mock.state.lock().unwrap().queued.extend(values);
        mock
    }

    pub fn set(&self, value: u16) {
        let mut state = self.state.lock().unwrap();
        state.queued.clear();
        state.current = value;
    }

    pub fn reads(&self) -> usize {
        self.state.lock().unwrap().reads
    }
}

impl AnalogChannel for MockAnalog {
    fn read_raw(&mut self) -> u16 {
        let mut state = self.state.lock().unwrap();
        state.reads += 1;
        if let Some(value) = state.queued.pop_front() {
            state.current = value;
        }
        state.current
    }
}

/// Pulled-up button; released reads high.
#[derive(Debug, Clone)]
pub struct MockButton {
    high: Arc<AtomicBool>,
}

impl Default for MockButton {
    fn default() -> Self {
        Self {
            high: Arc::new(AtomicBool::new(true)),
        }
    }
}

impl MockButton {
    pub fn press(&self) {
        self.high.store(false, Ordering::SeqCst);
    }

    pub fn release(&self) {
        self.high.store(true, Ordering::SeqCst);
    }
}

impl ButtonInput for MockButton {
    fn level(&self) -> bool {
        self.high.load(Ordering::SeqCst)
    }
}

/// Operator stand-in that moves the mock stick into each requested pose.
#[derive(Debug)]
pub struct ScriptedOperator {
    axis_one: MockAnalog,
    axis_two: MockAnalog,
    poses: HashMap<Pose, (u16, u16)>,
    pub prompted: Vec<Pose>,
}

impl ScriptedOperator {
    pub fn new(axis_one: MockAnalog, axis_two: MockAnalog) -> Self {
        let poses = HashMap::from([
            (Pose::Middle, (32768, 32768)),
            (Pose::Left, (10000, 33000)),
            (Pose::Right, (55000, 32000)),
            (Pose::Up, (33500, 10000)),
            (Pose::Down, (32100, 55000)),
        ]);
        Self {
            axis_one,
            axis_two,
            poses,
            prompted: Vec::new(),
        }
    }

    pub fn with_pose(mut self, pose: Pose, raw: (u16, u16)) -> Self {
        self.poses.insert(pose, raw);
        self
    }
}

impl OperatorPrompt for ScriptedOperator {
    fn hold(&mut self, pose: Pose) -> std::io::Result<()> {
        let (one, two) = self.poses[&pose];
        self.axis_one.set(one);
        self.axis_two.set(two);
        self.prompted.push(pose);
        Ok(())
    }
}
