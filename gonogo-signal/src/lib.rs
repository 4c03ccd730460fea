pub mod channel;
pub mod filter;
pub mod ring;

pub use channel::{ChannelReading, DetectMode, HysteresisBand, SensorChannel, FAULT_ESCALATION};
pub use filter::median_filtered_mean;
pub use ring::RingBuffer;
