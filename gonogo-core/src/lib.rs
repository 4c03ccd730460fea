pub mod outcome;
pub mod phase;
pub mod record;
pub mod types;

pub use outcome::{Outcome, OutcomeFlags};
pub use phase::TrialPhase;
pub use record::TrialRecord;
pub use types::{FailureClass, FailurePolicy, Modality, SampleEndMode, TrialType};
