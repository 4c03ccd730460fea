use serde::{Deserialize, Serialize};

use crate::{Outcome, TrialType};

/// Everything worth keeping from one finished trial.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialRecord {
    pub trial_id: usize,
    pub trial_type: TrialType,
    pub outcome: Outcome,
    /// Cycle of the first debounced onset per sensor, relative to trial
    /// start. Latched once; absent if the sensor never crossed.
    pub first_touch_cycle: Option<u64>,
    pub first_lick_cycle: Option<u64>,
    pub first_whisk_cycle: Option<u64>,
    /// Cycle at which the qualifying response was registered.
    pub first_response_cycle: Option<u64>,
    /// The subject acted on a non-expected channel during the response
    /// window. Logged, never acted on.
    pub incorrect_response_action: bool,
    /// Same, during the answer delay or answer window.
    pub incorrect_answer_action: bool,
    pub total_cycles: u64,
    /// Cycles of punishment deferred to the next trial's start under
    /// the inter-trial-interval policy.
    pub iti_debt_cycles: u64,
}
