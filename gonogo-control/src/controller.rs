use gonogo_core::{Outcome, TrialPhase, TrialRecord};
use gonogo_hal::{DigitalLines, LineState, Rig};
use gonogo_signal::{DetectMode, SensorChannel, FAULT_ESCALATION};

use crate::config::TrialConfig;
use crate::error::ControlError;
use crate::machine::{Effect, SensorEdge, SensorSnapshot, TrialMachine};

/// What one controller tick amounted to, for the supervising loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub cycle: u64,
    pub phase: TrialPhase,
    pub complete: bool,
}

/// Owns the per-tick pipeline: read the rig's analog inputs, condition
/// them, feed the state machine, realize its effects on the rig's
/// output lines. One instance runs many trials back to back.
pub struct TrialController<R: Rig> {
    rig: R,
    machine: TrialMachine,
    lick: SensorChannel,
    touch: SensorChannel,
    whisk: SensorChannel,
    lines: DigitalLines,
    line_state: LineState,
    effects: Vec<Effect>,
    cycle: u64,
    trial_id: usize,
    /// Vacuum and aversive actuators are pulsed, not latched; these
    /// hold the cycle each pulse ends at.
    vacuum_until: Option<u64>,
    aversive_until: Option<u64>,
    abort_handled: bool,
}

impl<R: Rig> TrialController<R> {
    /// Expects a configuration that already passed
    /// [`TrialConfig::validate`].
    pub fn new(rig: R, config: TrialConfig) -> Self {
        let (lick, touch, whisk) = build_channels(&config);
        Self {
            rig,
            machine: TrialMachine::new(config),
            lick,
            touch,
            whisk,
            lines: DigitalLines::default(),
            line_state: LineState::default(),
            effects: Vec::new(),
            cycle: 0,
            trial_id: 0,
            vacuum_until: None,
            aversive_until: None,
            abort_handled: false,
        }
    }

    pub fn rig(&self) -> &R {
        &self.rig
    }

    pub fn rig_mut(&mut self) -> &mut R {
        &mut self.rig
    }

    pub fn machine(&self) -> &TrialMachine {
        &self.machine
    }

    /// Reconfigures for the next trial. Detection windows and bands may
    /// change between trials, so the conditioning channels are rebuilt;
    /// `start_trial` resets them anyway.
    pub fn set_config(&mut self, config: TrialConfig) {
        let (lick, touch, whisk) = build_channels(&config);
        self.lick = lick;
        self.touch = touch;
        self.whisk = whisk;
        self.machine.set_config(config);
    }

    pub fn phase(&self) -> TrialPhase {
        self.machine.phase()
    }

    pub fn trial_complete(&self) -> bool {
        self.machine.is_complete()
    }

    /// Arms the next trial. Conditioning state from the previous trial
    /// is dropped so its samples and latches cannot leak across.
    pub fn start_trial(&mut self) {
        self.trial_id += 1;
        self.lick.reset();
        self.touch.reset();
        self.whisk.reset();
        self.vacuum_until = None;
        self.aversive_until = None;
        self.abort_handled = false;
        let mut effects = std::mem::take(&mut self.effects);
        self.machine.start(self.cycle, &mut effects);
        self.apply_effects(&mut effects);
        self.effects = effects;
        self.write_lines();
    }

    /// One control cycle. On a fault the trial is already force-aborted
    /// when the error comes back; the caller only decides what to do
    /// between trials.
    pub fn run_tick(&mut self) -> Result<TickReport, ControlError> {
        self.cycle += 1;
        let cycle = self.cycle;
        let mut effects = std::mem::take(&mut self.effects);

        if self.rig.abort_requested() && !self.abort_handled {
            self.abort_handled = true;
            self.machine.abort(cycle, &mut effects);
        }

        // conditioning runs every tick so buffers stay warm even while
        // readings are not yet trusted
        let lick_raw = self.rig.read_analog(self.machine.config().channels.lick);
        let whisk_raw = self.rig.read_analog(self.machine.config().channels.whisker);
        let touch_raw = self.rig.read_analog(self.machine.config().channels.touch);
        let lick = self.lick.condition(lick_raw, cycle);
        let whisk = self.whisk.condition(whisk_raw, cycle);
        let touch = self.touch.condition(touch_raw, cycle);

        for (reading, channel) in [(&lick, "lick"), (&whisk, "whisk"), (&touch, "touch")] {
            if reading.fault_escalated {
                self.machine.abort(cycle, &mut effects);
                self.apply_effects(&mut effects);
                self.effects = effects;
                self.write_lines();
                return Err(ControlError::SensorFailure {
                    channel,
                    streak: FAULT_ESCALATION,
                });
            }
        }

        let snapshot = if self.machine.phase().senses_trusted() {
            SensorSnapshot {
                lick: SensorEdge {
                    active: lick.active,
                    onset: lick.onset,
                },
                touch: SensorEdge {
                    active: touch.active,
                    onset: touch.onset,
                },
                whisk: SensorEdge {
                    active: whisk.active,
                    onset: whisk.onset,
                },
            }
        } else {
            SensorSnapshot::default()
        };

        let phase_before = self.machine.phase();
        let tick_result = self.machine.tick(&snapshot, cycle, &mut effects);
        self.apply_effects(&mut effects);
        self.effects = effects;

        // lines derived from state rather than effects; the mirror is
        // judged against the phase this tick's sample was taken in
        let phase = self.machine.phase();
        self.line_state.state_trigger = phase.state_trigger_high();
        let mirror_touch = matches!(
            phase_before,
            TrialPhase::SensorSettleDelay | TrialPhase::ResponseWindow
        ) && touch.active;
        self.line_state.touch_trigger = mirror_touch;
        self.line_state.touch_trigger_behavior = mirror_touch;
        self.line_state.lick_vacuum = self.vacuum_until.is_some_and(|until| cycle < until);
        self.line_state.aversive = self.aversive_until.is_some_and(|until| cycle < until);

        self.write_lines();
        tick_result?;
        Ok(TickReport {
            cycle,
            phase,
            complete: self.machine.is_complete(),
        })
    }

    /// Drives the armed trial to completion.
    pub fn run_trial(&mut self) -> Result<TrialRecord, ControlError> {
        self.start_trial();
        loop {
            if self.run_tick()?.complete {
                return Ok(self.finish());
            }
        }
    }

    /// Summarizes the finished trial. All cycle counts are relative to
    /// the trial's start.
    pub fn finish(&self) -> TrialRecord {
        let state = &self.machine.state;
        let started = state.started_at;
        let rel = |cycle: Option<u64>| cycle.map(|c| c.saturating_sub(started));
        TrialRecord {
            trial_id: self.trial_id,
            trial_type: self.machine.config().trial_type,
            outcome: state.flags.resolved().unwrap_or(Outcome::Aborted),
            first_touch_cycle: rel(self.touch.first_crossing()),
            first_lick_cycle: rel(self.lick.first_crossing()),
            first_whisk_cycle: rel(self.whisk.first_crossing()),
            first_response_cycle: rel(state.first_response),
            incorrect_response_action: state.incorrect_response_action,
            incorrect_answer_action: state.incorrect_answer_action,
            total_cycles: self.cycle.saturating_sub(started),
            iti_debt_cycles: state.iti_debt,
        }
    }

    fn apply_effects(&mut self, effects: &mut Vec<Effect>) {
        let bank = self.machine.config().cues.bank;
        for effect in effects.drain(..) {
            match effect {
                Effect::Cue(cue) => self.rig.trigger_audio_cue(bank, cue),
                Effect::TriggerLine(level) => self.line_state.trigger = level,
                Effect::StimulusLine(level) => self.line_state.stimulus = level,
                Effect::ValveLine(level) => self.line_state.reward_valve = level,
                Effect::BitcodeLine(level) => self.line_state.bitcode = level,
                Effect::VacuumPulse(cycles) => {
                    self.vacuum_until = Some(self.cycle + cycles);
                    self.line_state.lick_vacuum = true;
                }
                Effect::AversivePulse(cycles) => {
                    self.aversive_until = Some(self.cycle + cycles);
                    self.line_state.aversive = true;
                }
                Effect::Commit { code, event } => self.rig.force_transition(code, event),
                Effect::Log(name, value) => self.rig.log_telemetry(name, value),
            }
        }
    }

    fn write_lines(&mut self) {
        self.rig.write_digital_mask(self.line_state.mask(&self.lines));
    }
}

/// Touch is a deflection sensor; lick and whisker velocity are
/// thresholded on the level directly.
fn build_channels(config: &TrialConfig) -> (SensorChannel, SensorChannel, SensorChannel) {
    let mean = config.mean_window;
    let median = config.median_window;
    let lick = SensorChannel::new("lick", mean, median, DetectMode::Absolute, config.lick_band);
    let touch = SensorChannel::new(
        "touch",
        mean,
        median,
        DetectMode::Differential,
        config.touch_band,
    );
    let whisk = SensorChannel::new(
        "whisk",
        mean,
        median,
        DetectMode::Absolute,
        config.whisk_band,
    );
    (lick, touch, whisk)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode_pulse_train;
    use gonogo_hal::SimRig;

    fn test_config() -> TrialConfig {
        TrialConfig {
            mean_window: 2,
            median_window: 1,
            pre_stimulus_delay: 10,
            resonance_delay: 5,
            delay_period: 20,
            response_window: 30,
            answer_delay: 10,
            answer_window: 20,
            valve_open: 8,
            drink_period: 6,
            punish_duration: 12,
            outcome_settle: 50,
            cycles_per_ms: 1,
            guard_slack: 100,
            ..TrialConfig::default()
        }
        .validate()
        .unwrap()
    }

    /// Trace of `lead` resting ticks, then `level` held for `hold`.
    fn step_trace(lead: usize, level: f64, hold: usize) -> Vec<f64> {
        let mut t = vec![0.0; lead];
        t.extend(std::iter::repeat(level).take(hold));
        t
    }

    #[test]
    fn scripted_go_trial_resolves_to_hit() {
        let cfg = test_config();
        let mut rig = SimRig::new();
        // touch at cycle 25 (response window), lick at cycle 40
        rig.set_trace(cfg.channels.touch, step_trace(24, 5.0, 120));
        rig.set_trace(cfg.channels.lick, step_trace(39, 5.0, 120));
        let mut ctl = TrialController::new(rig, cfg);

        let record = ctl.run_trial().unwrap();
        assert_eq!(record.outcome, Outcome::Hit);
        assert_eq!(record.first_response_cycle, Some(25));
        assert_eq!(record.first_touch_cycle, Some(25));
        assert_eq!(record.first_lick_cycle, Some(41));
        assert!(!record.incorrect_answer_action);

        let rig = ctl.rig();
        // cues: stimulus, go, reward
        assert_eq!(rig.cues, vec![(0, 1), (0, 2), (0, 4)]);
        // valve opened, then everything ends low
        assert!(rig.line_history(0x100).iter().any(|&v| v));
        assert_eq!(rig.last_mask(), 0);
        // vacuum pulsed after the drink period
        assert!(rig.line_history(0x400).iter().any(|&v| v));
        // committed history walks the canonical path and lands on the
        // hit hold
        let codes: Vec<u32> = rig.transitions.iter().map(|(c, _)| *c).collect();
        assert_eq!(codes, vec![41, 42, 43, 45, 46, 47, 48, 49, 52, 57]);
        // the bitcode line decodes back to the outcome
        let bits = decode_pulse_train(&rig.line_history(0x4), 1).unwrap();
        assert_eq!(Outcome::from_bit_pattern(bits), Some(Outcome::Hit));
    }

    #[test]
    fn untrusted_phases_ignore_a_hot_sensor() {
        let cfg = test_config();
        let mut rig = SimRig::new();
        // lick saturated from the very first tick
        rig.set_trace(cfg.channels.lick, vec![5.0; 400]);
        let mut ctl = TrialController::new(rig, cfg);
        let record = ctl.run_trial().unwrap();
        // lick is the answer mode: first trusted onset lands in the
        // response window as an off-channel action, then the early
        // answer rule fires in the answer delay only if touch responds;
        // with no touch the window times out
        assert_eq!(record.outcome, Outcome::Miss);
        assert!(record.incorrect_response_action);
    }

    #[test]
    fn sensor_failure_aborts_the_trial() {
        let cfg = test_config();
        let mut rig = SimRig::new();
        rig.set_trace(cfg.channels.whisker, vec![99.0; 10]);
        let mut ctl = TrialController::new(rig, cfg);
        ctl.start_trial();
        let mut result = Ok(());
        for _ in 0..10 {
            if let Err(e) = ctl.run_tick() {
                result = Err(e);
                break;
            }
        }
        assert_eq!(
            result,
            Err(ControlError::SensorFailure {
                channel: "whisk",
                streak: 3,
            })
        );
        // force-abort already classified the trial
        assert_eq!(ctl.machine().state.flags.resolved(), Some(Outcome::Aborted));
    }

    #[test]
    fn operator_abort_is_encoded_and_lines_end_low() {
        let cfg = test_config();
        let mut ctl = TrialController::new(SimRig::new(), cfg);
        ctl.start_trial();
        for _ in 0..15 {
            ctl.run_tick().unwrap();
        }
        ctl.rig_mut().request_abort();
        while !ctl.run_tick().unwrap().complete {}
        let record = ctl.finish();
        assert_eq!(record.outcome, Outcome::Aborted);
        let bits = decode_pulse_train(&ctl.rig().line_history(0x4), 1).unwrap();
        assert_eq!(Outcome::from_bit_pattern(bits), Some(Outcome::Aborted));
        assert_eq!(ctl.rig().last_mask(), 0);
    }

    #[test]
    fn touch_trigger_mirrors_the_sensor_during_sampling() {
        let cfg = test_config();
        let mut rig = SimRig::new();
        rig.set_trace(cfg.channels.touch, step_trace(24, 5.0, 2));
        rig.set_trace(cfg.channels.lick, step_trace(39, 5.0, 5));
        let mut ctl = TrialController::new(rig, cfg);
        ctl.run_trial().unwrap();
        let history = ctl.rig().line_history(0x40);
        // high exactly while the debounced touch was active in the
        // response window
        assert!(history.iter().any(|&v| v));
        let behav = ctl.rig().line_history(0x10000);
        assert_eq!(history, behav);
    }

    #[test]
    fn back_to_back_trials_do_not_leak_state() {
        let cfg = test_config();
        let mut rig = SimRig::new();
        rig.set_trace(cfg.channels.touch, step_trace(24, 5.0, 120));
        rig.set_trace(cfg.channels.lick, step_trace(39, 5.0, 120));
        let mut ctl = TrialController::new(rig, cfg);
        let first = ctl.run_trial().unwrap();
        assert_eq!(first.outcome, Outcome::Hit);
        // traces exhausted: the second trial sees a quiet rig
        let second = ctl.run_trial().unwrap();
        assert_eq!(second.trial_id, first.trial_id + 1);
        assert_eq!(second.outcome, Outcome::Miss);
        assert_eq!(second.first_touch_cycle, None);
        assert_eq!(second.first_response_cycle, None);
    }
}
