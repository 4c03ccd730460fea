use gonogo_core::Outcome;

/// Bit period, milliseconds.
pub const BIT_MS: u64 = 3;
/// Inter-bit gap, milliseconds.
pub const GAP_MS: u64 = 7;

const BITS: usize = 4;

/// Pulses a trial's classification out over the bitcode line: four
/// bits, each held for the bit period and followed by a low gap.
/// Driven one step per controller tick; lazy, finite, and
/// non-restartable. A fresh encoder is built for every trial.
#[derive(Debug)]
pub struct OutcomeEncoder {
    pattern: [bool; 4],
    segment: usize,
    remaining: u64,
    bit_cycles: u64,
    gap_cycles: u64,
}

impl OutcomeEncoder {
    pub fn new(outcome: Outcome, cycles_per_ms: u64) -> Self {
        let bit_cycles = BIT_MS * cycles_per_ms;
        Self {
            pattern: outcome.bit_pattern(),
            segment: 0,
            remaining: bit_cycles,
            bit_cycles,
            gap_cycles: GAP_MS * cycles_per_ms,
        }
    }

    /// Cycles from the first bit to the end of the final gap.
    pub fn total_cycles(cycles_per_ms: u64) -> u64 {
        BITS as u64 * (BIT_MS + GAP_MS) * cycles_per_ms
    }

    /// Line level for this tick; `None` once the final gap has drained.
    pub fn step(&mut self) -> Option<bool> {
        if self.finished() {
            return None;
        }
        let level = if self.segment % 2 == 0 {
            self.pattern[self.segment / 2]
        } else {
            false
        };
        self.remaining -= 1;
        if self.remaining == 0 {
            self.segment += 1;
            self.remaining = if self.segment % 2 == 0 {
                self.bit_cycles
            } else {
                self.gap_cycles
            };
        }
        Some(level)
    }

    pub fn finished(&self) -> bool {
        self.segment >= 2 * BITS
    }
}

/// Recovers the 4-bit pattern from a recorded bitcode line trace by
/// sampling the middle of each bit period. Alignment comes from the
/// first high tick; the leading valid bit is high in every code.
pub fn decode_pulse_train(levels: &[bool], cycles_per_ms: u64) -> Option<[bool; 4]> {
    let start = levels.iter().position(|&l| l)?;
    let bit = (BIT_MS * cycles_per_ms) as usize;
    let gap = (GAP_MS * cycles_per_ms) as usize;
    let mut bits = [false; 4];
    for (i, b) in bits.iter_mut().enumerate() {
        *b = *levels.get(start + i * (bit + gap) + bit / 2)?;
    }
    Some(bits)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(encoder: &mut OutcomeEncoder) -> Vec<bool> {
        let mut levels = Vec::new();
        while let Some(level) = encoder.step() {
            levels.push(level);
        }
        levels
    }

    #[test]
    fn emits_exactly_the_budgeted_cycles_then_stays_done() {
        let mut enc = OutcomeEncoder::new(Outcome::Hit, 6);
        let levels = drain(&mut enc);
        assert_eq!(levels.len() as u64, OutcomeEncoder::total_cycles(6));
        assert!(enc.finished());
        assert_eq!(enc.step(), None);
    }

    #[test]
    fn segment_timing_at_unit_tick_rate() {
        // cycles_per_ms = 1: bit segments of 3, gaps of 7
        let mut enc = OutcomeEncoder::new(Outcome::Miss, 1);
        let levels = drain(&mut enc);
        // Miss = 1,0,1,0
        assert_eq!(&levels[0..3], &[true; 3]);
        assert_eq!(&levels[3..10], &[false; 7]);
        assert_eq!(&levels[10..13], &[false; 3]);
        assert_eq!(&levels[20..23], &[true; 3]);
        assert_eq!(&levels[30..40], &[false; 10]);
    }

    #[test]
    fn final_segment_is_a_gap() {
        for outcome in [Outcome::Hit, Outcome::Aborted] {
            let mut enc = OutcomeEncoder::new(outcome, 2);
            let levels = drain(&mut enc);
            assert!(!levels.last().unwrap(), "line must end low");
        }
    }

    #[test]
    fn pulse_train_decodes_back_to_the_outcome() {
        for outcome in [
            Outcome::Hit,
            Outcome::Miss,
            Outcome::FalseAlarm,
            Outcome::CorrectReject,
            Outcome::Aborted,
        ] {
            let mut enc = OutcomeEncoder::new(outcome, 6);
            // leading idle ticks must not confuse alignment
            let mut levels = vec![false; 17];
            levels.extend(drain(&mut enc));
            let bits = decode_pulse_train(&levels, 6).unwrap();
            assert_eq!(Outcome::from_bit_pattern(bits), Some(outcome));
        }
    }

    #[test]
    fn truncated_trace_fails_to_decode() {
        let mut enc = OutcomeEncoder::new(Outcome::Hit, 6);
        let mut levels = drain(&mut enc);
        levels.truncate(levels.len() / 2);
        assert_eq!(decode_pulse_train(&levels, 6), None);
    }
}
