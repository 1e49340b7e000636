use crate::types::{PhoneOnset, PhoneSegment};

pub const MIN_SEGMENT_SECONDS: f64 = 0.025;
pub const MAX_SEGMENT_SECONDS: f64 = 0.2;
/// Assigned to the final phone, which has no following onset to bound it.
pub const FINAL_SEGMENT_SECONDS: f64 = 0.2;

/// Turn recognizer onsets into segments with bounded durations.
///
/// Each duration is the gap to the next onset, rounded to 0.1 ms and clamped
/// to `[MIN_SEGMENT_SECONDS, MAX_SEGMENT_SECONDS]`. The final segment always
/// gets `FINAL_SEGMENT_SECONDS`, including when it is the only one.
pub fn derive_segments(onsets: &[PhoneOnset]) -> Vec<PhoneSegment> {
    let gaps = onsets
        .windows(2)
        .map(|pair| clamp_duration(round_to_tenth_ms(pair[1].onset - pair[0].onset)));
    let durations = gaps.chain((!onsets.is_empty()).then_some(FINAL_SEGMENT_SECONDS));

    onsets
        .iter()
        .zip(durations)
        .map(|(onset, duration)| PhoneSegment {
            start: onset.onset,
            duration,
            phone: onset.phone.clone(),
            formant1: None,
            formant2: None,
        })
        .collect()
}

fn round_to_tenth_ms(seconds: f64) -> f64 {
    (seconds * 10_000.0).round() / 10_000.0
}

fn clamp_duration(seconds: f64) -> f64 {
    seconds.clamp(MIN_SEGMENT_SECONDS, MAX_SEGMENT_SECONDS)
}
