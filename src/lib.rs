pub mod audio;
pub mod batch;
pub mod cli;
pub mod config;
pub mod error;
pub mod extract;
pub mod formant;
pub mod logging;
pub mod phones;
pub mod pitch;
pub mod reference;
pub mod types;

pub use error::{ExtractionError, Result};
pub use extract::{FormantAnalysis, FormantDiffExtractor, MeasuredSegment};
pub use pitch::PitchIntonationExtractor;
pub use types::{FormantDiffs, PhoneOnset, PhoneSegment, PitchIntonation, Waveform};
