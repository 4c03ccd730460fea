use serde::{Deserialize, Serialize};

use crate::filter::median_filtered_mean;
use crate::ring::RingBuffer;

/// How a channel's comparison value is derived from the filtered mean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectMode {
    /// Compare the filtered mean against the band directly.
    Absolute,
    /// Compare |Δ filtered mean| between consecutive ticks, for sensors
    /// where the interesting signal is a deflection, not a level.
    Differential,
}

/// Rising/falling activation thresholds. A channel activates only when
/// its comparison value exceeds `rising` (strict) and deactivates only
/// when it drops back to `falling` or below, so a value chattering
/// inside the band cannot toggle the state. `rising == falling` is the
/// degenerate single-threshold case.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HysteresisBand {
    pub rising: f64,
    pub falling: f64,
}

impl HysteresisBand {
    pub fn new(rising: f64, falling: f64) -> Self {
        Self { rising, falling }
    }

    pub fn single(threshold: f64) -> Self {
        Self {
            rising: threshold,
            falling: threshold,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.falling <= self.rising && self.rising.is_finite() && self.falling.is_finite()
    }
}

/// One tick's conditioned output for a channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelReading {
    pub filtered_mean: f64,
    pub active: bool,
    pub onset: bool,
    pub offset: bool,
    /// The raw sample failed the plausibility check this tick.
    pub fault: bool,
    /// Three consecutive faults; the trial should abort.
    pub fault_escalated: bool,
}

/// Consecutive implausible samples before a channel is declared failed.
pub const FAULT_ESCALATION: u32 = 3;

/// Default plausible input range, volts.
pub const DEFAULT_VOLTAGE_RANGE: (f64, f64) = (-10.0, 10.0);

/// One analog input channel and its conditioning state: circular sample
/// buffer, median/mean filter, hysteresis debounce, edge latches.
#[derive(Debug, Clone)]
pub struct SensorChannel {
    name: &'static str,
    buffer: RingBuffer,
    median_window: usize,
    mode: DetectMode,
    band: HysteresisBand,
    voltage_range: (f64, f64),
    last_mean: f64,
    active: bool,
    first_crossing: Option<u64>,
    fault_streak: u32,
    // reused across ticks so conditioning never allocates
    window: Vec<f64>,
    scratch: Vec<f64>,
}

impl SensorChannel {
    pub fn new(
        name: &'static str,
        mean_window: usize,
        median_window: usize,
        mode: DetectMode,
        band: HysteresisBand,
    ) -> Self {
        Self {
            name,
            buffer: RingBuffer::new(mean_window),
            median_window,
            mode,
            band,
            voltage_range: DEFAULT_VOLTAGE_RANGE,
            last_mean: 0.0,
            active: false,
            first_crossing: None,
            fault_streak: 0,
            window: Vec::with_capacity(mean_window),
            scratch: Vec::with_capacity(median_window),
        }
    }

    pub fn with_voltage_range(mut self, min: f64, max: f64) -> Self {
        self.voltage_range = (min, max);
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn first_crossing(&self) -> Option<u64> {
        self.first_crossing
    }

    /// Conditions one raw sample: buffer push, median-filtered mean,
    /// hysteresis thresholding, edge detection. Run once per tick.
    pub fn condition(&mut self, raw: f64, cycle: u64) -> ChannelReading {
        if !raw.is_finite() || raw < self.voltage_range.0 || raw > self.voltage_range.1 {
            self.fault_streak += 1;
            log::warn!(
                "{}: implausible sample {raw} ({} fault(s) in a row)",
                self.name,
                self.fault_streak
            );
            let offset = self.active;
            self.active = false;
            return ChannelReading {
                filtered_mean: self.last_mean,
                active: false,
                onset: false,
                offset,
                fault: true,
                fault_escalated: self.fault_streak >= FAULT_ESCALATION,
            };
        }
        self.fault_streak = 0;

        self.buffer.push(raw);
        self.window.clear();
        self.window.extend(self.buffer.iter());
        let filtered_mean = median_filtered_mean(&self.window, self.median_window, &mut self.scratch);

        let value = match self.mode {
            DetectMode::Absolute => filtered_mean,
            DetectMode::Differential => (filtered_mean - self.last_mean).abs(),
        };

        let was_active = self.active;
        let active = if was_active {
            value > self.band.falling
        } else {
            value > self.band.rising
        };
        let onset = active && !was_active;
        let offset = !active && was_active;
        if onset && self.first_crossing.is_none() {
            self.first_crossing = Some(cycle);
        }

        self.active = active;
        self.last_mean = filtered_mean;
        ChannelReading {
            filtered_mean,
            active,
            onset,
            offset,
            fault: false,
            fault_escalated: false,
        }
    }

    /// Back to the state a trial starts from. Configuration (windows,
    /// band, mode) survives; samples, latches and counters do not.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.last_mean = 0.0;
        self.active = false;
        self.first_crossing = None;
        self.fault_streak = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lick_channel(rising: f64, falling: f64) -> SensorChannel {
        SensorChannel::new(
            "lick",
            4,
            3,
            DetectMode::Absolute,
            HysteresisBand::new(rising, falling),
        )
    }

    fn feed(ch: &mut SensorChannel, samples: &[f64]) -> Vec<ChannelReading> {
        samples
            .iter()
            .enumerate()
            .map(|(i, &s)| ch.condition(s, i as u64))
            .collect()
    }

    #[test]
    fn value_exactly_at_threshold_stays_inactive() {
        let mut ch = lick_channel(2.0, 2.0);
        let readings = feed(&mut ch, &[2.0, 2.0, 2.0, 2.0, 2.0, 2.0]);
        assert!(readings.iter().all(|r| !r.active), "strict > on activation");
    }

    #[test]
    fn onset_offset_mutually_exclusive_and_latched_once() {
        let mut ch = lick_channel(2.0, 1.0);
        let trace = [0.0, 0.0, 5.0, 5.0, 5.0, 5.0, 0.0, 0.0, 0.0, 0.0];
        let readings = feed(&mut ch, &trace);
        for r in &readings {
            assert!(!(r.onset && r.offset));
        }
        assert_eq!(readings.iter().filter(|r| r.onset).count(), 1);
        assert_eq!(readings.iter().filter(|r| r.offset).count(), 1);
        let onset_at = readings.iter().position(|r| r.onset).unwrap() as u64;
        assert_eq!(ch.first_crossing(), Some(onset_at));
    }

    #[test]
    fn band_suppresses_chatter() {
        // hovers between falling and rising after activation: stays active
        let mut ch = lick_channel(3.0, 1.0);
        feed(&mut ch, &[4.0, 4.0, 4.0, 4.0]);
        let readings = feed(&mut ch, &[2.0, 2.0, 2.0, 2.0]);
        assert!(readings.iter().all(|r| r.active));
        // a single-threshold band would have dropped out immediately
        let mut single = lick_channel(3.0, 3.0);
        feed(&mut single, &[4.0, 4.0, 4.0, 4.0]);
        let readings = feed(&mut single, &[2.0, 2.0, 2.0, 2.0]);
        assert!(readings.iter().any(|r| !r.active));
    }

    #[test]
    fn differential_mode_sees_steps_not_levels() {
        let mut ch = SensorChannel::new(
            "touch",
            3,
            1,
            DetectMode::Differential,
            HysteresisBand::single(0.5),
        );
        // constant high level: no deflection, never active
        let readings = feed(&mut ch, &[5.0, 5.0, 5.0, 5.0, 5.0]);
        assert!(readings[2..].iter().all(|r| !r.active));
        // sharp step: |Δmean| crosses
        let r = ch.condition(10.0, 6);
        assert!(r.active && r.onset);
    }

    #[test]
    fn faults_escalate_after_three_and_recover_on_clean_sample() {
        let mut ch = lick_channel(2.0, 1.0);
        let r1 = ch.condition(99.0, 0);
        assert!(r1.fault && !r1.fault_escalated);
        let r2 = ch.condition(f64::NAN, 1);
        assert!(r2.fault && !r2.fault_escalated);
        // clean sample resets the streak
        ch.condition(0.0, 2);
        let r3 = ch.condition(99.0, 3);
        assert!(r3.fault && !r3.fault_escalated);
        let r4 = ch.condition(99.0, 4);
        let r5 = ch.condition(99.0, 5);
        assert!(!r4.fault_escalated);
        assert!(r5.fault_escalated);
    }

    #[test]
    fn fault_tick_reads_inactive() {
        let mut ch = lick_channel(2.0, 1.0);
        feed(&mut ch, &[5.0, 5.0, 5.0, 5.0]);
        let r = ch.condition(99.0, 4);
        assert!(!r.active && r.offset);
    }

    #[test]
    fn reset_clears_samples_and_latches() {
        let mut ch = lick_channel(2.0, 1.0);
        feed(&mut ch, &[5.0, 5.0, 5.0, 5.0]);
        assert!(ch.first_crossing().is_some());
        ch.reset();
        assert_eq!(ch.first_crossing(), None);
        let r = ch.condition(0.0, 0);
        assert!(!r.active);
        assert_eq!(r.filtered_mean, 0.0);
    }
}
