use serde::{Deserialize, Serialize};

/// Phases of one behavioral trial, in canonical order for a completed
/// go trial. `Punishment` is reached only from violation branches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrialPhase {
    Idle,
    PreStimulusDelay,
    StimulusPresent,
    SensorSettleDelay,
    ResponseWindow,
    AnswerDelay,
    AnswerWindow,
    RewardValveOpen,
    DrinkPeriod,
    Punishment,
    OutcomeHold,
    TrialComplete,
}

impl Default for TrialPhase {
    fn default() -> Self {
        TrialPhase::Idle
    }
}

impl TrialPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TrialPhase::OutcomeHold | TrialPhase::TrialComplete)
    }

    /// Sensor readings are ignored until the stimulus actuator has had a
    /// chance to stop ringing the sensor. The settle phase itself trusts
    /// readings only after its resonance portion has elapsed, which the
    /// state machine tracks.
    pub fn senses_trusted(&self) -> bool {
        !matches!(
            self,
            TrialPhase::Idle | TrialPhase::PreStimulusDelay | TrialPhase::StimulusPresent
        )
    }

    /// Phases during which the state-trigger output line is held high so
    /// the acquisition system can segment the trial.
    pub fn state_trigger_high(&self) -> bool {
        matches!(
            self,
            TrialPhase::ResponseWindow | TrialPhase::AnswerWindow | TrialPhase::DrinkPeriod
        )
    }

    /// Numeric code committed to the supervisor's transition history.
    /// The numbering follows the rig protocol's state matrix; outcome
    /// states carry their own codes (see [`crate::Outcome::state_code`]).
    pub fn state_code(&self) -> u32 {
        match self {
            TrialPhase::Idle => 40,
            TrialPhase::PreStimulusDelay => 41,
            TrialPhase::StimulusPresent => 42,
            TrialPhase::SensorSettleDelay => 43,
            TrialPhase::ResponseWindow => 45,
            TrialPhase::AnswerDelay => 46,
            TrialPhase::AnswerWindow => 47,
            TrialPhase::RewardValveOpen => 48,
            TrialPhase::DrinkPeriod => 49,
            TrialPhase::Punishment => 56,
            TrialPhase::OutcomeHold => 52,
            TrialPhase::TrialComplete => 57,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn senses_untrusted_before_settle() {
        assert!(!TrialPhase::Idle.senses_trusted());
        assert!(!TrialPhase::PreStimulusDelay.senses_trusted());
        assert!(!TrialPhase::StimulusPresent.senses_trusted());
        assert!(TrialPhase::SensorSettleDelay.senses_trusted());
        assert!(TrialPhase::ResponseWindow.senses_trusted());
    }

    #[test]
    fn state_codes_are_distinct() {
        let phases = [
            TrialPhase::Idle,
            TrialPhase::PreStimulusDelay,
            TrialPhase::StimulusPresent,
            TrialPhase::SensorSettleDelay,
            TrialPhase::ResponseWindow,
            TrialPhase::AnswerDelay,
            TrialPhase::AnswerWindow,
            TrialPhase::RewardValveOpen,
            TrialPhase::DrinkPeriod,
            TrialPhase::Punishment,
            TrialPhase::OutcomeHold,
            TrialPhase::TrialComplete,
        ];
        for (i, a) in phases.iter().enumerate() {
            for b in &phases[i + 1..] {
                assert_ne!(a.state_code(), b.state_code());
            }
        }
    }
}
