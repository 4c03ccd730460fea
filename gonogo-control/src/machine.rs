use gonogo_core::{FailureClass, FailurePolicy, Modality, Outcome, SampleEndMode, TrialPhase};

use crate::config::TrialConfig;
use crate::encoder::OutcomeEncoder;
use crate::error::ControlError;
use crate::trial::TrialState;

/// Debounced state of one modality for one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SensorEdge {
    pub active: bool,
    pub onset: bool,
}

/// Conditioned sensor states handed to the machine each tick. The
/// caller zeroes the whole snapshot while readings are untrusted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SensorSnapshot {
    pub lick: SensorEdge,
    pub touch: SensorEdge,
    pub whisk: SensorEdge,
}

impl SensorSnapshot {
    pub fn get(&self, modality: Modality) -> SensorEdge {
        match modality {
            Modality::Lick => self.lick,
            Modality::Touch => self.touch,
            Modality::Whisk => self.whisk,
            Modality::None => SensorEdge::default(),
        }
    }

    /// Any channel other than `expected` currently active.
    fn off_channel_active(&self, expected: Modality) -> bool {
        self.off_channel(expected, |e| e.active)
    }

    /// Any channel other than `expected` with a fresh onset this tick.
    /// Used where a level carried over from an earlier phase must not
    /// count as a new action.
    fn off_channel_onset(&self, expected: Modality) -> bool {
        self.off_channel(expected, |e| e.onset)
    }

    fn off_channel(&self, expected: Modality, pred: impl Fn(&SensorEdge) -> bool) -> bool {
        let mut hit = false;
        for (modality, edge) in [
            (Modality::Lick, self.lick),
            (Modality::Touch, self.touch),
            (Modality::Whisk, self.whisk),
        ] {
            if modality != expected && pred(&edge) {
                hit = true;
            }
        }
        hit
    }
}

/// Side effects the machine wants performed, drained by the controller
/// after each tick. Levels are latched until countermanded; pulses
/// carry their own duration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Effect {
    Cue(u8),
    TriggerLine(bool),
    StimulusLine(bool),
    ValveLine(bool),
    /// Open the lick vacuum for this many cycles.
    VacuumPulse(u64),
    BitcodeLine(bool),
    /// Fire the aversive actuator for this many cycles.
    AversivePulse(u64),
    Commit { code: u32, event: u32 },
    Log(&'static str, f64),
}

/// The trial state machine. Transitions are gated by elapsed-cycle
/// comparisons and debounced sensor edges; entry and exit actions are
/// expressed as [`Effect`]s.
pub struct TrialMachine {
    config: TrialConfig,
    pub state: TrialState,
    encoder: Option<OutcomeEncoder>,
}

impl TrialMachine {
    /// Expects a configuration that already passed
    /// [`TrialConfig::validate`].
    pub fn new(config: TrialConfig) -> Self {
        Self {
            config,
            state: TrialState::default(),
            encoder: None,
        }
    }

    pub fn config(&self) -> &TrialConfig {
        &self.config
    }

    /// Swaps in the next trial's configuration. Only meaningful between
    /// trials; the running trial keeps the config it started with.
    pub fn set_config(&mut self, config: TrialConfig) {
        debug_assert!(matches!(
            self.state.phase,
            TrialPhase::Idle | TrialPhase::TrialComplete
        ));
        self.config = config;
    }

    pub fn phase(&self) -> TrialPhase {
        self.state.phase
    }

    pub fn is_complete(&self) -> bool {
        self.state.phase == TrialPhase::TrialComplete
    }

    /// Arms a new trial: counters rebased, sticky flags cleared, sync
    /// trigger raised, stimulus cue fired.
    pub fn start(&mut self, cycle: u64, effects: &mut Vec<Effect>) {
        self.state.reset(cycle);
        self.encoder = None;
        effects.push(Effect::TriggerLine(true));
        effects.push(Effect::Cue(self.config.cues.stimulus));
        self.transition(TrialPhase::PreStimulusDelay, cycle, effects);
        log::info!("trial armed at cycle {cycle} ({:?})", self.config.trial_type);
    }

    /// External abort. Before the terminal hold the aborted code still
    /// gets pulsed out; once encoding has begun the partial pattern is
    /// discarded and the line drops, never left asserted.
    pub fn abort(&mut self, cycle: u64, effects: &mut Vec<Effect>) {
        if self.is_complete() {
            return;
        }
        log::warn!("trial aborted in {:?} at cycle {cycle}", self.state.phase);
        self.state.flags.set(Outcome::Aborted);
        match self.state.phase {
            TrialPhase::OutcomeHold => {
                self.encoder = None;
                effects.push(Effect::BitcodeLine(false));
                self.transition(TrialPhase::TrialComplete, cycle, effects);
            }
            TrialPhase::Idle => self.transition(TrialPhase::TrialComplete, cycle, effects),
            _ => self.transition(TrialPhase::OutcomeHold, cycle, effects),
        }
    }

    /// One control tick. Aside from the guard check, each phase is a
    /// single elapsed-or-edge decision.
    pub fn tick(
        &mut self,
        sensors: &SensorSnapshot,
        cycle: u64,
        effects: &mut Vec<Effect>,
    ) -> Result<(), ControlError> {
        self.check_guard(cycle, effects)?;
        let elapsed = self.state.elapsed(cycle);
        match self.state.phase {
            TrialPhase::Idle | TrialPhase::TrialComplete => {}
            TrialPhase::PreStimulusDelay => {
                if elapsed >= self.config.pre_stimulus_delay {
                    self.transition(TrialPhase::StimulusPresent, cycle, effects);
                    // the hard settle starts the same tick the stimulus rises
                    self.transition(TrialPhase::SensorSettleDelay, cycle, effects);
                }
            }
            TrialPhase::StimulusPresent => {
                self.transition(TrialPhase::SensorSettleDelay, cycle, effects);
            }
            TrialPhase::SensorSettleDelay => {
                if elapsed >= self.config.settle_cycles() {
                    self.transition(TrialPhase::ResponseWindow, cycle, effects);
                } else if elapsed >= self.config.resonance_delay
                    && sensors.get(self.config.response_mode).onset
                {
                    // responding before the go cue
                    let outcome = self.failure_outcome();
                    self.fail(FailureClass::DelayViolation, outcome, cycle, effects);
                }
            }
            TrialPhase::ResponseWindow => {
                self.tick_response_window(sensors, cycle, elapsed, effects);
            }
            TrialPhase::AnswerDelay => {
                self.note_incorrect_answer_action(sensors, self.config.answer_mode, effects);
                let base = self.state.first_response.unwrap_or(self.state.entered_at);
                if sensors.get(self.config.answer_mode).onset {
                    let outcome = self.failure_outcome();
                    self.fail(FailureClass::EarlyAnswer, outcome, cycle, effects);
                } else if cycle.saturating_sub(base) >= self.config.answer_delay {
                    self.transition(TrialPhase::AnswerWindow, cycle, effects);
                }
            }
            TrialPhase::AnswerWindow => {
                self.note_incorrect_answer_action(sensors, self.config.answer_mode, effects);
                if elapsed >= self.config.answer_window {
                    // no answer: correct on a no-go trial, a miss on go
                    if self.config.trial_type.is_go() {
                        self.state.flags.set(Outcome::Miss);
                    } else {
                        self.state.flags.set(Outcome::CorrectReject);
                    }
                    self.transition(TrialPhase::OutcomeHold, cycle, effects);
                } else if sensors.get(self.config.answer_mode).onset {
                    if self.config.trial_type.is_go() {
                        self.state.flags.set(Outcome::Hit);
                        self.transition(TrialPhase::RewardValveOpen, cycle, effects);
                    } else {
                        self.fail(
                            FailureClass::AnswerViolation,
                            Outcome::FalseAlarm,
                            cycle,
                            effects,
                        );
                    }
                }
            }
            TrialPhase::RewardValveOpen => {
                if elapsed >= self.config.valve_cycles() {
                    self.transition(TrialPhase::DrinkPeriod, cycle, effects);
                }
            }
            TrialPhase::DrinkPeriod => {
                if elapsed >= self.config.drink_period {
                    self.transition(TrialPhase::OutcomeHold, cycle, effects);
                }
            }
            TrialPhase::Punishment => {
                if elapsed >= self.punish_hold_cycles() {
                    self.transition(TrialPhase::OutcomeHold, cycle, effects);
                }
            }
            TrialPhase::OutcomeHold => {
                match self.encoder.as_mut().map(|e| e.step()) {
                    Some(Some(level)) => effects.push(Effect::BitcodeLine(level)),
                    Some(None) => effects.push(Effect::BitcodeLine(false)),
                    None => {}
                }
                let encoded = self.encoder.as_ref().is_some_and(|e| e.finished());
                if encoded && elapsed >= self.config.outcome_settle {
                    self.transition(TrialPhase::TrialComplete, cycle, effects);
                }
            }
        }
        Ok(())
    }

    fn tick_response_window(
        &mut self,
        sensors: &SensorSnapshot,
        cycle: u64,
        elapsed: u64,
        effects: &mut Vec<Effect>,
    ) {
        let mode = self.config.response_mode;
        if mode != Modality::None
            && sensors.get(mode).onset
            && self.state.first_response.is_none()
        {
            self.state.first_response = Some(cycle);
            effects.push(Effect::Log("first_response", cycle as f64));
        }

        // off-channel activity is flagged and logged, nothing more,
        // unless this class's policy explicitly punishes it
        if sensors.off_channel_active(mode) {
            if !self.state.incorrect_response_action {
                self.state.incorrect_response_action = true;
                effects.push(Effect::Log("incorrect_response_action", 1.0));
            }
            if self.config.policies.response != FailurePolicy::None {
                let outcome = self.failure_outcome();
                self.fail(FailureClass::ResponseViolation, outcome, cycle, effects);
                return;
            }
        }

        let window_over = elapsed >= self.config.response_window;
        if mode == Modality::None {
            // nothing required of the subject; the window end responds
            if window_over {
                self.state.first_response = Some(cycle);
                self.transition(TrialPhase::AnswerDelay, cycle, effects);
            }
            return;
        }

        let responded = self.state.first_response.is_some();
        if responded
            && (self.config.sample_end_mode == SampleEndMode::OnAction || window_over)
        {
            self.transition(TrialPhase::AnswerDelay, cycle, effects);
        } else if window_over {
            if self.config.trial_type.is_go() {
                self.state.flags.set(Outcome::Miss);
            } else {
                self.state.flags.set(Outcome::CorrectReject);
            }
            self.transition(TrialPhase::OutcomeHold, cycle, effects);
        }
    }

    fn note_incorrect_answer_action(
        &mut self,
        sensors: &SensorSnapshot,
        expected: Modality,
        effects: &mut Vec<Effect>,
    ) {
        if sensors.off_channel_onset(expected) && !self.state.incorrect_answer_action {
            self.state.incorrect_answer_action = true;
            effects.push(Effect::Log("incorrect_answer_action", 1.0));
        }
    }

    /// Outcome a rule violation resolves to: forfeits the reward on a
    /// go trial, counts as a false alarm on no-go.
    fn failure_outcome(&self) -> Outcome {
        if self.config.trial_type.is_go() {
            Outcome::Miss
        } else {
            Outcome::FalseAlarm
        }
    }

    /// Classifies a violation and heads into the punishment branch.
    fn fail(
        &mut self,
        class: FailureClass,
        outcome: Outcome,
        cycle: u64,
        effects: &mut Vec<Effect>,
    ) {
        self.state.failure = Some(class);
        self.state.flags.set(outcome);
        effects.push(Effect::Log(class_label(class), 1.0));
        self.transition(TrialPhase::Punishment, cycle, effects);
    }

    /// How long the punishment phase holds the trial. Silent and
    /// deferred (ITI) policies classify and move on; cue and aversive
    /// policies serve the full punish duration in-trial.
    fn punish_hold_cycles(&self) -> u64 {
        let class = self.state.failure.unwrap_or(FailureClass::ResponseViolation);
        match self.config.policies.for_class(class) {
            FailurePolicy::None | FailurePolicy::InterTrialInterval => 0,
            FailurePolicy::NoiseCue | FailurePolicy::AversiveStimulus => {
                self.config.punish_duration
            }
        }
    }

    fn transition(&mut self, next: TrialPhase, cycle: u64, effects: &mut Vec<Effect>) {
        self.exit(self.state.phase, effects);
        self.state.prev_phase = self.state.phase;
        self.state.phase = next;
        self.state.entered_at = cycle;
        let code = if next == TrialPhase::OutcomeHold {
            self.state
                .flags
                .resolved()
                .map(|o| o.state_code())
                .unwrap_or_else(|| next.state_code())
        } else {
            next.state_code()
        };
        effects.push(Effect::Commit {
            code,
            event: code - 40,
        });
        self.enter(next, effects);
        log::debug!("cycle {cycle}: -> {next:?}");
    }

    fn exit(&mut self, phase: TrialPhase, effects: &mut Vec<Effect>) {
        match phase {
            TrialPhase::RewardValveOpen => effects.push(Effect::ValveLine(false)),
            TrialPhase::DrinkPeriod => {
                effects.push(Effect::VacuumPulse(self.config.vacuum_cycles()));
            }
            _ => {}
        }
    }

    fn enter(&mut self, phase: TrialPhase, effects: &mut Vec<Effect>) {
        match phase {
            TrialPhase::StimulusPresent => effects.push(Effect::StimulusLine(true)),
            TrialPhase::ResponseWindow => effects.push(Effect::Cue(self.config.cues.go)),
            TrialPhase::AnswerDelay => effects.push(Effect::StimulusLine(false)),
            TrialPhase::AnswerWindow => effects.push(Effect::Cue(self.config.cues.reward)),
            TrialPhase::RewardValveOpen => effects.push(Effect::ValveLine(true)),
            TrialPhase::Punishment => self.enter_punishment(effects),
            TrialPhase::OutcomeHold => {
                let outcome = match self.state.flags.resolved() {
                    Some(outcome) => outcome,
                    None => {
                        // unreachable on intended paths; classify as
                        // aborted rather than encode garbage
                        self.state.flags.set(Outcome::Aborted);
                        Outcome::Aborted
                    }
                };
                self.encoder = Some(OutcomeEncoder::new(outcome, self.config.cycles_per_ms));
                effects.push(Effect::Log("outcome", outcome.state_code() as f64));
            }
            TrialPhase::TrialComplete => {
                effects.push(Effect::TriggerLine(false));
                effects.push(Effect::BitcodeLine(false));
                effects.push(Effect::StimulusLine(false));
                effects.push(Effect::ValveLine(false));
            }
            _ => {}
        }
    }

    fn enter_punishment(&mut self, effects: &mut Vec<Effect>) {
        let class = self.state.failure.unwrap_or(FailureClass::ResponseViolation);
        match self.config.policies.for_class(class) {
            FailurePolicy::None => {}
            FailurePolicy::NoiseCue => effects.push(Effect::Cue(self.config.cues.fail)),
            FailurePolicy::AversiveStimulus => {
                effects.push(Effect::AversivePulse(self.config.punish_duration));
            }
            FailurePolicy::InterTrialInterval => {
                self.state.iti_debt += self.config.punish_duration;
            }
        }
    }

    /// A phase overstaying its nominal duration by more than the
    /// configured slack means no guard can ever fire; the controller
    /// must not spin there forever.
    fn check_guard(&mut self, cycle: u64, effects: &mut Vec<Effect>) -> Result<(), ControlError> {
        let phase = self.state.phase;
        if matches!(phase, TrialPhase::Idle | TrialPhase::TrialComplete) {
            return Ok(());
        }
        let limit = self.nominal_duration(phase) + self.config.guard_slack;
        let waited = self.state.elapsed(cycle);
        if waited > limit {
            log::error!("guard starvation in {phase:?}: {waited} > {limit}");
            self.state.flags.set(Outcome::Aborted);
            self.encoder = None;
            self.transition(TrialPhase::TrialComplete, cycle, effects);
            return Err(ControlError::GuardStarvation {
                phase,
                waited,
                limit,
            });
        }
        Ok(())
    }

    fn nominal_duration(&self, phase: TrialPhase) -> u64 {
        match phase {
            TrialPhase::Idle | TrialPhase::TrialComplete | TrialPhase::StimulusPresent => 0,
            TrialPhase::PreStimulusDelay => self.config.pre_stimulus_delay,
            TrialPhase::SensorSettleDelay => self.config.settle_cycles(),
            TrialPhase::ResponseWindow => self.config.response_window,
            TrialPhase::AnswerDelay => self.config.answer_delay,
            TrialPhase::AnswerWindow => self.config.answer_window,
            TrialPhase::RewardValveOpen => self.config.valve_cycles(),
            TrialPhase::DrinkPeriod => self.config.drink_period,
            TrialPhase::Punishment => self.punish_hold_cycles(),
            TrialPhase::OutcomeHold => self
                .config
                .outcome_settle
                .max(OutcomeEncoder::total_cycles(self.config.cycles_per_ms)),
        }
    }
}

fn class_label(class: FailureClass) -> &'static str {
    match class {
        FailureClass::DelayViolation => "delay_violation",
        FailureClass::ResponseViolation => "response_violation",
        FailureClass::EarlyAnswer => "early_answer",
        FailureClass::AnswerViolation => "answer_violation",
    }
}
