use std::collections::HashMap;

use crate::rig::Rig;

/// Deterministic in-memory rig for tests and dry runs. Analog inputs
/// replay scripted per-tick traces; every output the controller makes
/// is recorded for inspection.
#[derive(Debug, Default)]
pub struct SimRig {
    traces: HashMap<u32, Vec<f64>>,
    cursors: HashMap<u32, usize>,
    /// Resting level returned once a trace runs out (and for channels
    /// with no trace at all).
    pub resting_level: f64,
    pub mask_history: Vec<u32>,
    pub analog_writes: Vec<(u32, f64)>,
    pub cues: Vec<(u8, u8)>,
    pub transitions: Vec<(u32, u32)>,
    pub telemetry: Vec<(String, f64)>,
    pub abort: bool,
}

impl SimRig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the scripted trace for a channel; samples are consumed
    /// one per `read_analog` call.
    pub fn set_trace(&mut self, channel: u32, samples: Vec<f64>) {
        self.cursors.insert(channel, 0);
        self.traces.insert(channel, samples);
    }

    pub fn request_abort(&mut self) {
        self.abort = true;
    }

    /// Level of one line over the recorded mask history.
    pub fn line_history(&self, line: u32) -> Vec<bool> {
        self.mask_history.iter().map(|m| m & line != 0).collect()
    }

    pub fn last_mask(&self) -> u32 {
        self.mask_history.last().copied().unwrap_or(0)
    }
}

impl Rig for SimRig {
    fn read_analog(&mut self, channel: u32) -> f64 {
        let cursor = self.cursors.entry(channel).or_insert(0);
        let sample = self
            .traces
            .get(&channel)
            .and_then(|t| t.get(*cursor))
            .copied()
            .unwrap_or(self.resting_level);
        *cursor += 1;
        sample
    }

    fn write_digital_mask(&mut self, mask: u32) {
        self.mask_history.push(mask);
    }

    fn write_analog(&mut self, channel: u32, volts: f64) {
        self.analog_writes.push((channel, volts));
    }

    fn trigger_audio_cue(&mut self, bank: u8, cue: u8) {
        self.cues.push((bank, cue));
    }

    fn force_transition(&mut self, state_code: u32, event_id: u32) {
        self.transitions.push((state_code, event_id));
    }

    fn log_telemetry(&mut self, name: &str, value: f64) {
        self.telemetry.push((name.to_owned(), value));
    }

    fn abort_requested(&mut self) -> bool {
        self.abort
    }
}
