pub mod config;
pub mod controller;
pub mod encoder;
pub mod error;
pub mod machine;
pub mod trial;

pub use config::{AnalogChannels, CueSet, FailurePolicies, TrialConfig};
pub use controller::{TickReport, TrialController};
pub use encoder::{OutcomeEncoder, decode_pulse_train};
pub use error::{ConfigError, ControlError};
pub use machine::{Effect, SensorEdge, SensorSnapshot, TrialMachine};
pub use trial::TrialState;
