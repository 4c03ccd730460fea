/// Digital output line assignment: one mask bit per rig function. The
/// defaults match the rig's historical wiring.
#[derive(Debug, Clone)]
pub struct DigitalLines {
    /// Acquisition/camera sync, high for the whole trial.
    pub trigger: u32,
    /// Outcome bit-pattern output.
    pub bitcode: u32,
    /// Stimulus actuator (pneumatic pole lift).
    pub stimulus: u32,
    /// High during the phases the acquisition system segments on.
    pub state_trigger: u32,
    /// Mirrors the touch sensor's debounced state.
    pub touch_trigger: u32,
    /// Behavioral copy of the touch trigger, separate acquisition bank.
    pub touch_trigger_behavior: u32,
    pub reward_valve: u32,
    pub lick_vacuum: u32,
    pub aversive: u32,
}

impl Default for DigitalLines {
    fn default() -> Self {
        Self {
            trigger: 0x2,
            bitcode: 0x4,
            stimulus: 0x10,
            state_trigger: 0x20,
            touch_trigger: 0x40,
            touch_trigger_behavior: 0x10000,
            reward_valve: 0x100,
            lick_vacuum: 0x400,
            aversive: 0x800,
        }
    }
}

/// Desired level of every output line for one tick, composed into a
/// single mask right before the write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LineState {
    pub trigger: bool,
    pub bitcode: bool,
    pub stimulus: bool,
    pub state_trigger: bool,
    pub touch_trigger: bool,
    pub touch_trigger_behavior: bool,
    pub reward_valve: bool,
    pub lick_vacuum: bool,
    pub aversive: bool,
}

impl LineState {
    pub fn mask(&self, lines: &DigitalLines) -> u32 {
        let mut mask = 0;
        if self.trigger {
            mask |= lines.trigger;
        }
        if self.bitcode {
            mask |= lines.bitcode;
        }
        if self.stimulus {
            mask |= lines.stimulus;
        }
        if self.state_trigger {
            mask |= lines.state_trigger;
        }
        if self.touch_trigger {
            mask |= lines.touch_trigger;
        }
        if self.touch_trigger_behavior {
            mask |= lines.touch_trigger_behavior;
        }
        if self.reward_valve {
            mask |= lines.reward_valve;
        }
        if self.lick_vacuum {
            mask |= lines.lick_vacuum;
        }
        if self.aversive {
            mask |= lines.aversive;
        }
        mask
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_composes_only_raised_lines() {
        let lines = DigitalLines::default();
        let state = LineState {
            trigger: true,
            reward_valve: true,
            ..Default::default()
        };
        assert_eq!(state.mask(&lines), 0x102);
        assert_eq!(LineState::default().mask(&lines), 0);
    }

    #[test]
    fn default_line_bits_do_not_overlap() {
        let l = DigitalLines::default();
        let bits = [
            l.trigger,
            l.bitcode,
            l.stimulus,
            l.state_trigger,
            l.touch_trigger,
            l.touch_trigger_behavior,
            l.reward_valve,
            l.lick_vacuum,
            l.aversive,
        ];
        let mut seen = 0u32;
        for b in bits {
            assert_eq!(seen & b, 0);
            seen |= b;
        }
    }
}
