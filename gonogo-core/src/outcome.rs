use serde::{Deserialize, Serialize};

/// Signal-detection classification of one go/no-go trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Hit,
    Miss,
    FalseAlarm,
    CorrectReject,
    Aborted,
}

impl Outcome {
    /// Four-bit code pulsed out to the acquisition system, first bit
    /// first. The leading bit marks the trial as having reached a
    /// classification at all, so it is set in every code.
    pub fn bit_pattern(&self) -> [bool; 4] {
        match self {
            Outcome::Hit => [true, false, false, false],
            Outcome::Miss => [true, false, true, false],
            Outcome::CorrectReject => [true, false, false, true],
            Outcome::FalseAlarm => [true, true, false, false],
            Outcome::Aborted => [true, true, true, true],
        }
    }

    /// Inverse of [`bit_pattern`](Self::bit_pattern), for host-side
    /// decoding of the pulse train.
    pub fn from_bit_pattern(bits: [bool; 4]) -> Option<Outcome> {
        match bits {
            [true, false, false, false] => Some(Outcome::Hit),
            [true, false, true, false] => Some(Outcome::Miss),
            [true, false, false, true] => Some(Outcome::CorrectReject),
            [true, true, false, false] => Some(Outcome::FalseAlarm),
            [true, true, true, true] => Some(Outcome::Aborted),
            _ => None,
        }
    }

    /// Transition-history code for the terminal hold on this outcome.
    pub fn state_code(&self) -> u32 {
        match self {
            Outcome::Hit => 52,
            Outcome::Miss => 53,
            Outcome::CorrectReject => 54,
            Outcome::FalseAlarm => 55,
            Outcome::Aborted => 59,
        }
    }

    /// Whether the subject's behavior matched the trial contingency.
    /// `None` for aborted trials, which carry no judgment.
    pub fn correct(&self) -> Option<bool> {
        match self {
            Outcome::Hit | Outcome::CorrectReject => Some(true),
            Outcome::Miss | Outcome::FalseAlarm => Some(false),
            Outcome::Aborted => None,
        }
    }
}

/// Sticky outcome flags. The first classification set during a trial
/// wins; later attempts are ignored, which keeps the set one-hot on
/// every path to the terminal phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutcomeFlags {
    resolved: Option<Outcome>,
}

impl OutcomeFlags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latches `outcome` unless a classification already stuck.
    pub fn set(&mut self, outcome: Outcome) {
        if self.resolved.is_none() {
            self.resolved = Some(outcome);
        }
    }

    pub fn resolved(&self) -> Option<Outcome> {
        self.resolved
    }

    pub fn is_set(&self) -> bool {
        self.resolved.is_some()
    }

    /// Cleared only at trial start.
    pub fn clear(&mut self) {
        self.resolved = None;
    }
}
