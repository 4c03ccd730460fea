/// The hardware/runtime boundary the controller drives once per tick.
/// Every call is synchronous and expected to return well within one
/// tick's time budget; nothing here blocks or suspends.
pub trait Rig {
    /// Raw analog sample, volts.
    fn read_analog(&mut self, channel: u32) -> f64;

    /// Drives every digital output line at once from a composed mask.
    fn write_digital_mask(&mut self, mask: u32);

    fn write_analog(&mut self, channel: u32, volts: f64);

    /// Fire-and-forget cue playback.
    fn trigger_audio_cue(&mut self, bank: u8, cue: u8);

    /// Commits a computed state transition to the supervisor's history.
    fn force_transition(&mut self, state_code: u32, event_id: u32);

    /// Best-effort log sink; implementations must never fail the
    /// control loop over a dropped value.
    fn log_telemetry(&mut self, name: &str, value: f64);

    /// External abort signal, checked once per tick.
    fn abort_requested(&mut self) -> bool;
}
