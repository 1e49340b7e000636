use crate::types::Waveform;

/// Borrow the samples covering `[start, start + duration]` seconds.
///
/// Both ends are rounded to the nearest sample and the end sample is
/// included, so the slice holds one sample more than the nominal span.
/// Indices past the end of the buffer are clamped.
pub fn slice_span(waveform: &Waveform, start: f64, duration: f64) -> &[f32] {
    let sr = waveform.sample_rate as f64;
    let len = waveform.samples.len();

    let start_sample = (sr * start).round().max(0.0) as usize;
    let end_sample = (sr * (start + duration)).round().max(0.0) as usize + 1;

    let start_sample = start_sample.min(len);
    let end_sample = end_sample.clamp(start_sample, len);

    &waveform.samples[start_sample..end_sample]
}
