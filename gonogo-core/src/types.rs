use serde::{Deserialize, Serialize};

/// Which sensor a subject action is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Lick,
    Touch,
    Whisk,
    /// No action required; the window end itself counts as the response.
    None,
}

/// Trial contingency: whether an answer is rewarded or punished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrialType {
    Go,
    NoGo,
}

impl TrialType {
    pub fn is_go(&self) -> bool {
        matches!(self, TrialType::Go)
    }
}

/// What the rig does when a trial rule is violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Classify and move on without holding the trial.
    None,
    /// Charge the violation to the next trial's start instead of
    /// holding this one.
    InterTrialInterval,
    /// Fire the aversive actuator once and hold for the punish period.
    AversiveStimulus,
    /// Fire the failure cue once and hold for the punish period.
    NoiseCue,
}

/// Which rule was violated, keyed by the phase it happened in. Each
/// class carries its own [`FailurePolicy`] in the trial configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    /// Qualifying action during the delay, before the go cue.
    DelayViolation,
    /// Action on a non-expected channel during the response window.
    /// Punished only when its policy asks for it; otherwise logged.
    ResponseViolation,
    /// A new answer-modality action during the answer delay.
    EarlyAnswer,
    /// An answer on a no-go trial.
    AnswerViolation,
}

/// When a qualifying action ends the response window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleEndMode {
    /// Advance as soon as the action lands.
    OnAction,
    /// Hold the window open to its full duration regardless.
    WindowEnd,
}
