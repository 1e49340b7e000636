use std::f32::consts::PI;
use std::path::Path;

use approx::assert_relative_eq;
use vocalyzer::pitch::{PitchIntonationExtractor, PitchTracker};
use vocalyzer::{ExtractionError, Waveform};

const SAMPLE_RATE: u32 = 16_000;

struct FixedContour(Vec<f64>);

impl PitchTracker for FixedContour {
    fn contour(&self, _waveform: &Waveform) -> vocalyzer::Result<Vec<f64>> {
        Ok(self.0.clone())
    }
}

#[test]
fn steady_tone_has_its_frequency_as_pitch() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("tone.wav");
    write_wav(&path, &sine(150.0, 1.0), SAMPLE_RATE);

    let stats = PitchIntonationExtractor::default()
        .extract(&path, SAMPLE_RATE)
        .expect("pitch of a steady tone");
    assert_relative_eq!(stats.pitch, 150.0, max_relative = 0.03);
    assert!(
        stats.intonation < 1.0,
        "steady tone should barely vary, got {}",
        stats.intonation
    );
}

#[test]
fn octave_errors_and_unvoiced_frames_are_dropped() {
    let extractor = PitchIntonationExtractor::with_tracker(
        Box::new(FixedContour(vec![0.0, 100.0, 700.0, 110.0, 0.0, 120.0])),
        350.0,
    );
    let waveform = Waveform::new(vec![0.0; 1600], SAMPLE_RATE);
    let stats = extractor.extract_waveform(&waveform).unwrap();
    assert_relative_eq!(stats.pitch, 110.0, epsilon = 1e-9);
    assert_relative_eq!(stats.intonation, (200.0f64 / 3.0).sqrt(), epsilon = 1e-9);
}

#[test]
fn contour_without_plausible_frames_is_insufficient() {
    let extractor = PitchIntonationExtractor::with_tracker(
        Box::new(FixedContour(vec![0.0, 400.0, 0.0])),
        350.0,
    );
    let waveform = Waveform::new(vec![0.0; 1600], SAMPLE_RATE);
    assert_eq!(
        extractor.extract_waveform(&waveform).unwrap_err(),
        ExtractionError::InsufficientSignal
    );
}

#[test]
fn missing_file_is_a_decode_failure() {
    let err = PitchIntonationExtractor::default()
        .extract(Path::new("does/not/exist.wav"), SAMPLE_RATE)
        .unwrap_err();
    assert_eq!(err.kind(), "decode_failure");
}

fn sine(freq: f32, seconds: f32) -> Vec<f32> {
    let count = (SAMPLE_RATE as f32 * seconds) as usize;
    (0..count)
        .map(|i| 0.5 * (2.0 * PI * freq * i as f32 / SAMPLE_RATE as f32).sin())
        .collect()
}

fn write_wav(path: &Path, samples: &[f32], rate: u32) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).expect("create wav");
    for &sample in samples {
        writer
            .write_sample((sample * i16::MAX as f32) as i16)
            .expect("write sample");
    }
    writer.finalize().expect("finalize wav");
}
