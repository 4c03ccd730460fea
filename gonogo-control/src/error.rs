use gonogo_core::TrialPhase;
use thiserror::Error;

/// Rejected before a trial starts; nothing is ever silently clamped
/// except the documented delay-widening rule.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("mean window must be at least 1")]
    MeanWindowZero,
    #[error("median window must be at least 1")]
    MedianWindowZero,
    #[error("median window {median} exceeds mean window {mean}")]
    MedianExceedsMean { median: usize, mean: usize },
    #[error("{channel} hysteresis band falling {falling} above rising {rising}")]
    InvertedBand {
        channel: &'static str,
        rising: f64,
        falling: f64,
    },
    #[error("{name} duration must be nonzero")]
    ZeroDuration { name: &'static str },
    #[error("cycles_per_ms must be nonzero")]
    ZeroTickRate,
    #[error("reward multiplier must be positive, got {0}")]
    NonPositiveRewardMultiplier(f64),
}

/// Faults that force-abort a running trial and surface to the
/// supervisor as a structured report.
#[derive(Debug, Error, PartialEq)]
pub enum ControlError {
    #[error("no transition out of {phase:?} after {waited} cycles (limit {limit})")]
    GuardStarvation {
        phase: TrialPhase,
        waited: u64,
        limit: u64,
    },
    #[error("sensor '{channel}' failed {streak} consecutive plausibility checks")]
    SensorFailure { channel: &'static str, streak: u32 },
}
