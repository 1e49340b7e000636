use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

/// Convenient alias for results returned by the extraction pipeline.
pub type Result<T> = std::result::Result<T, ExtractionError>;

/// Per-file extraction failure. Every variant is recoverable at file
/// granularity: the batch driver records null features and moves on.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionError {
    /// The waveform could not be opened, decoded or resampled.
    DecodeFailure { path: PathBuf, reason: String },
    /// Pitch filtering removed every frame.
    InsufficientSignal,
    /// Formant sampling produced no finite values for a segment.
    NoFormantSignal,
    /// No vowel segment survived the validity filter.
    InsufficientVowelData,
    /// The recognizer produced no usable phone sequence.
    AlignmentFailure(String),
}

impl ExtractionError {
    pub fn decode(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::DecodeFailure {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn alignment(message: impl Into<String>) -> Self {
        Self::AlignmentFailure(message.into())
    }

    /// Stable label used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DecodeFailure { .. } => "decode_failure",
            Self::InsufficientSignal => "insufficient_signal",
            Self::NoFormantSignal => "no_formant_signal",
            Self::InsufficientVowelData => "insufficient_vowel_data",
            Self::AlignmentFailure(_) => "alignment_failure",
        }
    }
}

impl Display for ExtractionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DecodeFailure { path, reason } => {
                write!(f, "failed to decode {}: {}", path.display(), reason)
            }
            Self::InsufficientSignal => write!(f, "no plausible voiced pitch frames"),
            Self::NoFormantSignal => write!(f, "formant tracker produced no finite values"),
            Self::InsufficientVowelData => write!(f, "no valid vowel segments to aggregate"),
            Self::AlignmentFailure(message) => write!(f, "phone alignment failed: {}", message),
        }
    }
}

impl Error for ExtractionError {}
