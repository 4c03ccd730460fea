use gonogo_core::{FailureClass, OutcomeFlags, TrialPhase};

/// Mutable per-trial bookkeeping. Owned and mutated only by the state
/// machine; nothing here survives into the next trial.
#[derive(Debug, Clone, Default)]
pub struct TrialState {
    pub phase: TrialPhase,
    /// Some branches punish differently depending on where they came
    /// from; the predecessor phase is kept for them.
    pub prev_phase: TrialPhase,
    /// Cycle the current phase was entered.
    pub entered_at: u64,
    /// Cycle the trial was armed; anchors the record's relative times.
    pub started_at: u64,
    pub flags: OutcomeFlags,
    /// Cycle the qualifying response was registered, latched once.
    pub first_response: Option<u64>,
    /// Which rule was broken, when the trial went through punishment.
    pub failure: Option<FailureClass>,
    pub incorrect_response_action: bool,
    pub incorrect_answer_action: bool,
    /// Punishment deferred to the next trial's start.
    pub iti_debt: u64,
}

impl TrialState {
    pub fn reset(&mut self, cycle: u64) {
        *self = TrialState {
            entered_at: cycle,
            started_at: cycle,
            ..TrialState::default()
        };
    }

    /// Cycles spent in the current phase.
    pub fn elapsed(&self, cycle: u64) -> u64 {
        cycle.saturating_sub(self.entered_at)
    }
}
