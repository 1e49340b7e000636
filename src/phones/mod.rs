//! Phone alignment: recognizer output to timed phone segments.

mod recognizer;
mod segments;

use std::path::Path;
use std::sync::Arc;

use tracing::debug;

pub use recognizer::{
    recognizer_from_settings, CommandRecognizer, ExclusiveRecognizer, PhoneRecognizer,
    SerializedRecognizer, SidecarRecognizer,
};
pub use segments::{
    derive_segments, FINAL_SEGMENT_SECONDS, MAX_SEGMENT_SECONDS, MIN_SEGMENT_SECONDS,
};

use crate::error::{ExtractionError, Result};
use crate::types::{PhoneOnset, PhoneSegment};

/// Obtains the phone sequence of a recording from a shared recognizer.
#[derive(Clone)]
pub struct PhoneAligner {
    recognizer: Arc<dyn PhoneRecognizer>,
}

impl PhoneAligner {
    pub fn new(recognizer: Arc<dyn PhoneRecognizer>) -> Self {
        Self { recognizer }
    }

    pub fn align(&self, audio: &Path) -> Result<Vec<PhoneOnset>> {
        let raw = self.recognizer.recognize(audio)?;
        let onsets = parse_recognizer_output(&raw)?;
        debug!(file = %audio.display(), phones = onsets.len(), "recognizer output parsed");
        Ok(onsets)
    }

    pub fn segments(&self, audio: &Path) -> Result<Vec<PhoneSegment>> {
        Ok(derive_segments(&self.align(audio)?))
    }
}

/// Parse `<time> <score> <phone>` lines. Blank lines are skipped; anything
/// else that does not have exactly three fields, a finite non-negative time,
/// or keeps onsets in order is an alignment failure.
pub fn parse_recognizer_output(raw: &str) -> Result<Vec<PhoneOnset>> {
    let mut onsets: Vec<PhoneOnset> = Vec::new();
    for (idx, line) in raw.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let fields: Vec<&str> = trimmed.split_whitespace().collect();
        let [time, _score, phone] = fields[..] else {
            return Err(ExtractionError::alignment(format!(
                "line {} has {} fields, expected 3: {trimmed}",
                idx + 1,
                fields.len()
            )));
        };
        let onset: f64 = time
            .parse()
            .ok()
            .filter(|t: &f64| t.is_finite() && *t >= 0.0)
            .ok_or_else(|| {
                ExtractionError::alignment(format!("line {} has invalid time {time:?}", idx + 1))
            })?;
        if let Some(previous) = onsets.last() {
            if onset < previous.onset {
                return Err(ExtractionError::alignment(format!(
                    "line {} onset {onset} precedes previous onset {}",
                    idx + 1,
                    previous.onset
                )));
            }
        }
        onsets.push(PhoneOnset::new(phone, onset));
    }
    if onsets.is_empty() {
        return Err(ExtractionError::alignment("recognizer produced no phones"));
    }
    Ok(onsets)
}
