use std::time::Duration;

use anyhow::{Context, Result};
use gonogo_control::{TrialConfig, TrialController};
use gonogo_core::{Outcome, TrialType};
use gonogo_hal::{SimRig, TickPacer};
use rand::rngs::ThreadRng;
use rand::Rng;

/// Headless session runner: drives the trial controller against the
/// simulated rig with a scripted subject, one JSON record per trial on
/// stdout. Stands in for the acquisition host during protocol work.
pub struct App {
    controller: TrialController<SimRig>,
    base: TrialConfig,
    trials: usize,
    paced: bool,
    rng: ThreadRng,
}

impl App {
    /// Usage: `gonogo-app [config.json] [--trials N] [--paced]`.
    pub fn new() -> Result<Self> {
        let mut config_path = None;
        let mut trials = 20usize;
        let mut paced = false;

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--trials" => {
                    let n = args.next().context("--trials needs a count")?;
                    trials = n.parse().context("--trials count must be a number")?;
                }
                "--paced" => paced = true,
                path => config_path = Some(path.to_owned()),
            }
        }

        let base = match config_path {
            Some(path) => {
                let text = std::fs::read_to_string(&path)
                    .with_context(|| format!("reading config {path}"))?;
                TrialConfig::from_json(&text).with_context(|| format!("parsing config {path}"))?
            }
            None => TrialConfig::default(),
        };
        let base = base.validate().context("invalid configuration")?;

        Ok(Self {
            controller: TrialController::new(SimRig::new(), base.clone()),
            base,
            trials,
            paced,
            rng: rand::rng(),
        })
    }

    pub fn run(mut self) -> Result<()> {
        println!("=== GO/NO-GO SESSION ({} trials) ===", self.trials);
        let mut pacer = self.paced.then(|| {
            TickPacer::new(Duration::from_nanos(1_000_000 / self.base.cycles_per_ms))
        });

        let mut tally = [0usize; 5];
        for _ in 0..self.trials {
            let trial_type = if self.rng.random_bool(0.5) {
                TrialType::Go
            } else {
                TrialType::NoGo
            };
            let config = TrialConfig {
                trial_type,
                ..self.base.clone()
            }
            .validate()
            .context("invalid trial configuration")?;

            script_subject(&config, &mut self.rng, self.controller.rig_mut());
            self.controller.set_config(config);
            self.controller.start_trial();
            loop {
                if let Some(pacer) = pacer.as_mut() {
                    pacer.wait();
                }
                match self.controller.run_tick() {
                    Ok(report) if report.complete => break,
                    Ok(_) => {}
                    Err(e) => {
                        log::error!("trial fault: {e}");
                        break;
                    }
                }
            }

            let record = self.controller.finish();
            tally[outcome_index(record.outcome)] += 1;
            println!("{}", serde_json::to_string(&record)?);

            if record.iti_debt_cycles > 0 {
                log::info!("serving {} cycles of deferred punishment", record.iti_debt_cycles);
                if let Some(pacer) = pacer.as_mut() {
                    for _ in 0..record.iti_debt_cycles {
                        pacer.wait();
                    }
                }
            }
        }

        println!(
            "hits {} misses {} false alarms {} correct rejects {} aborted {}",
            tally[0], tally[1], tally[2], tally[3], tally[4],
        );
        Ok(())
    }
}

fn outcome_index(outcome: Outcome) -> usize {
    match outcome {
        Outcome::Hit => 0,
        Outcome::Miss => 1,
        Outcome::FalseAlarm => 2,
        Outcome::CorrectReject => 3,
        Outcome::Aborted => 4,
    }
}

/// Scripts one trial's worth of analog traces: a moderately trained
/// subject that usually touches on go trials and sometimes licks when
/// it should not.
fn script_subject(config: &TrialConfig, rng: &mut ThreadRng, rig: &mut SimRig) {
    let span = (config.delay_period
        + config.response_window
        + config.answer_delay
        + config.answer_window
        + config.valve_open * 2
        + config.drink_period
        + config.punish_duration
        + config.outcome_settle
        + 40 * config.cycles_per_ms
        + config.guard_slack) as usize;

    let mut touch = noise_floor(rng, span, 0.02);
    let mut lick = noise_floor(rng, span, 0.1);
    let whisk = noise_floor(rng, span, 0.1);

    let touches = match config.trial_type {
        TrialType::Go => rng.random_bool(0.85),
        TrialType::NoGo => rng.random_bool(0.4),
    };
    if touches {
        let window_half = (config.response_window / 2).max(2);
        let touch_at = config.delay_period + rng.random_range(1..window_half);
        hold_high(&mut touch, touch_at as usize, window_half as usize, 5.0);

        let licks = match config.trial_type {
            TrialType::Go => rng.random_bool(0.9),
            TrialType::NoGo => rng.random_bool(0.4),
        };
        if licks {
            let answer_half = (config.answer_window / 2).max(2);
            let lick_at = touch_at + config.answer_delay + rng.random_range(1..answer_half);
            hold_high(&mut lick, lick_at as usize, span, 5.0);
        }
    }

    rig.set_trace(config.channels.touch, touch);
    rig.set_trace(config.channels.lick, lick);
    rig.set_trace(config.channels.whisker, whisk);
}

fn noise_floor(rng: &mut ThreadRng, span: usize, amplitude: f64) -> Vec<f64> {
    (0..span)
        .map(|_| rng.random_range(-amplitude..amplitude))
        .collect()
}

fn hold_high(trace: &mut Vec<f64>, from: usize, hold: usize, level: f64) {
    for i in from..(from + hold).min(trace.len()) {
        trace[i] = level;
    }
}
