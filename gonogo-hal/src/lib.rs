pub mod lines;
pub mod pacer;
pub mod rig;
pub mod sim;

pub use lines::{DigitalLines, LineState};
pub use pacer::TickPacer;
pub use rig::Rig;
pub use sim::SimRig;
