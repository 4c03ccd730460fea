use gonogo_core::{FailureClass, FailurePolicy, Modality, SampleEndMode, TrialType};
use gonogo_signal::HysteresisBand;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Audio cue ids within one sound bank.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CueSet {
    pub bank: u8,
    pub stimulus: u8,
    pub go: u8,
    pub fail: u8,
    pub reward: u8,
}

impl Default for CueSet {
    fn default() -> Self {
        Self {
            bank: 0,
            stimulus: 1,
            go: 2,
            fail: 3,
            reward: 4,
        }
    }
}

/// Punishment policy per failure class, keyed by the phase the
/// violation occurred in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FailurePolicies {
    pub delay: FailurePolicy,
    pub response: FailurePolicy,
    pub answer_delay: FailurePolicy,
    pub answer: FailurePolicy,
}

impl Default for FailurePolicies {
    fn default() -> Self {
        Self {
            delay: FailurePolicy::None,
            response: FailurePolicy::None,
            answer_delay: FailurePolicy::None,
            answer: FailurePolicy::None,
        }
    }
}

impl FailurePolicies {
    pub fn for_class(&self, class: FailureClass) -> FailurePolicy {
        match class {
            FailureClass::DelayViolation => self.delay,
            FailureClass::ResponseViolation => self.response,
            FailureClass::EarlyAnswer => self.answer_delay,
            FailureClass::AnswerViolation => self.answer,
        }
    }
}

/// Analog input channel assignment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnalogChannels {
    pub lick: u32,
    pub whisker: u32,
    pub touch: u32,
}

impl Default for AnalogChannels {
    fn default() -> Self {
        Self {
            lick: 5,
            whisker: 6,
            touch: 7,
        }
    }
}

/// Everything one trial needs, supplied by the protocol layer and
/// immutable for the trial's duration. All durations are in cycles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrialConfig {
    pub trial_type: TrialType,
    pub response_mode: Modality,
    pub answer_mode: Modality,
    pub sample_end_mode: SampleEndMode,

    /// Touch is thresholded on |Δmean| (a deflection sensor); lick and
    /// whisker velocity on the level itself.
    pub touch_band: HysteresisBand,
    pub lick_band: HysteresisBand,
    pub whisk_band: HysteresisBand,

    pub mean_window: usize,
    pub median_window: usize,

    pub pre_stimulus_delay: u64,
    /// Hard settle after the stimulus actuator perturbs the sensor.
    pub resonance_delay: u64,
    /// Total delay from stimulus cue to go cue; widened to
    /// `pre_stimulus_delay + resonance_delay` when shorter.
    pub delay_period: u64,
    pub response_window: u64,
    pub answer_delay: u64,
    pub answer_window: u64,
    pub valve_open: u64,
    pub drink_period: u64,
    pub punish_duration: u64,
    /// Terminal hold while the outcome pattern is pulsed out.
    pub outcome_settle: u64,

    pub reward_multiplier: f64,
    /// Tick rate: cycles per millisecond.
    pub cycles_per_ms: u64,
    /// Extra cycles a phase may overstay its nominal duration before
    /// the trial is declared starved and force-aborted.
    pub guard_slack: u64,

    pub channels: AnalogChannels,
    pub policies: FailurePolicies,
    pub cues: CueSet,
}

impl Default for TrialConfig {
    fn default() -> Self {
        Self {
            trial_type: TrialType::Go,
            response_mode: Modality::Touch,
            answer_mode: Modality::Lick,
            sample_end_mode: SampleEndMode::OnAction,
            touch_band: HysteresisBand::new(0.08, 0.05),
            lick_band: HysteresisBand::new(2.5, 2.0),
            whisk_band: HysteresisBand::new(0.5, 0.4),
            mean_window: 12,
            median_window: 3,
            pre_stimulus_delay: 1_200,
            resonance_delay: 3_360,
            delay_period: 5_000,
            response_window: 3_000,
            answer_delay: 500,
            answer_window: 2_000,
            valve_open: 600,
            drink_period: 1_500,
            punish_duration: 2_000,
            outcome_settle: 3_000,
            reward_multiplier: 1.0,
            cycles_per_ms: 6,
            guard_slack: 600,
            channels: AnalogChannels::default(),
            policies: FailurePolicies::default(),
            cues: CueSet::default(),
        }
    }
}

impl TrialConfig {
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }

    /// Checks every field a trial depends on and returns the corrected
    /// configuration. The only permitted correction is the documented
    /// delay widening; everything else is rejected outright.
    pub fn validate(&self) -> Result<TrialConfig, ConfigError> {
        if self.mean_window == 0 {
            return Err(ConfigError::MeanWindowZero);
        }
        if self.median_window == 0 {
            return Err(ConfigError::MedianWindowZero);
        }
        if self.median_window > self.mean_window {
            return Err(ConfigError::MedianExceedsMean {
                median: self.median_window,
                mean: self.mean_window,
            });
        }
        for (channel, band) in [
            ("touch", self.touch_band),
            ("lick", self.lick_band),
            ("whisk", self.whisk_band),
        ] {
            if !band.is_valid() {
                return Err(ConfigError::InvertedBand {
                    channel,
                    rising: band.rising,
                    falling: band.falling,
                });
            }
        }
        for (name, value) in [
            ("response_window", self.response_window),
            ("answer_window", self.answer_window),
            ("outcome_settle", self.outcome_settle),
        ] {
            if value == 0 {
                return Err(ConfigError::ZeroDuration { name });
            }
        }
        if self.cycles_per_ms == 0 {
            return Err(ConfigError::ZeroTickRate);
        }
        if !(self.reward_multiplier > 0.0) || !self.reward_multiplier.is_finite() {
            return Err(ConfigError::NonPositiveRewardMultiplier(self.reward_multiplier));
        }

        let mut cfg = self.clone();
        let floor = cfg.pre_stimulus_delay + cfg.resonance_delay;
        if floor > cfg.delay_period {
            log::warn!(
                "delay period {} shorter than pre-stimulus {} + settle {}; widening to {floor}",
                cfg.delay_period,
                cfg.pre_stimulus_delay,
                cfg.resonance_delay
            );
            cfg.delay_period = floor;
        }
        Ok(cfg)
    }

    /// Settle phase length: at least the resonance delay, stretched so
    /// the whole delay period comes out to `delay_period`.
    pub(crate) fn settle_cycles(&self) -> u64 {
        self.resonance_delay
            .max(self.delay_period.saturating_sub(self.pre_stimulus_delay))
    }

    pub(crate) fn valve_cycles(&self) -> u64 {
        (self.valve_open as f64 * self.reward_multiplier).round() as u64
    }

    /// Lick vacuum pulse after the drink period.
    pub(crate) fn vacuum_cycles(&self) -> u64 {
        (self.valve_open / 40).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(TrialConfig::default().validate().is_ok());
    }

    #[test]
    fn median_wider_than_mean_rejected() {
        let cfg = TrialConfig {
            mean_window: 4,
            median_window: 5,
            ..Default::default()
        };
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::MedianExceedsMean { median: 5, mean: 4 })
        );
    }

    #[test]
    fn inverted_band_rejected() {
        let cfg = TrialConfig {
            lick_band: HysteresisBand::new(1.0, 2.0),
            ..Default::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvertedBand { channel: "lick", .. })
        ));
    }

    #[test]
    fn short_delay_period_widens_instead_of_underflowing() {
        let cfg = TrialConfig {
            pre_stimulus_delay: 1_000,
            resonance_delay: 2_000,
            delay_period: 500,
            ..Default::default()
        };
        let validated = cfg.validate().unwrap();
        assert_eq!(validated.delay_period, 3_000);
        assert_eq!(validated.settle_cycles(), 2_000);
    }

    #[test]
    fn reward_multiplier_scales_valve_time() {
        let cfg = TrialConfig {
            valve_open: 100,
            reward_multiplier: 1.5,
            ..Default::default()
        };
        assert_eq!(cfg.validate().unwrap().valve_cycles(), 150);
    }

    #[test]
    fn json_round_trip() {
        let cfg = TrialConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let back = TrialConfig::from_json(&json).unwrap();
        assert_eq!(back.response_window, cfg.response_window);
        assert_eq!(back.trial_type, cfg.trial_type);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let cfg = TrialConfig::from_json(r#"{"trial_type":"nogo","answer_window":800}"#).unwrap();
        assert_eq!(cfg.trial_type, TrialType::NoGo);
        assert_eq!(cfg.answer_window, 800);
        assert_eq!(cfg.mean_window, TrialConfig::default().mean_window);
    }
}
