use std::path::Path;

use anyhow::{Context, Result};
use symphonia::core::audio::{AudioBuffer, AudioBufferRef, Signal};
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::conv::IntoSample;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::sample::Sample;
use tracing::debug;

use super::resample;
use crate::error::{ExtractionError, Result as ExtractionResult};
use crate::types::Waveform;

/// Decode `path` and resample it to `sample_rate`, mixing down to mono.
///
/// Any failure (missing file, unknown container, corrupt packet) is reported
/// as [`ExtractionError::DecodeFailure`].
pub fn load_waveform<P: AsRef<Path>>(path: P, sample_rate: u32) -> ExtractionResult<Waveform> {
    let path = path.as_ref();
    let decoded = decode_audio(path)
        .map_err(|err| ExtractionError::decode(path, format!("{err:#}")))?;
    if decoded.sample_rate == sample_rate {
        return Ok(decoded);
    }
    debug!(
        file = %path.display(),
        from = decoded.sample_rate,
        to = sample_rate,
        "resampling decoded audio"
    );
    let samples = resample::linear_resample(&decoded.samples, decoded.sample_rate, sample_rate)
        .map_err(|err| ExtractionError::decode(path, format!("{err:#}")))?;
    Ok(Waveform::new(samples, sample_rate))
}

/// Decode an audio file to raw PCM samples (mono, f32) at its native rate.
pub fn decode_audio<P: AsRef<Path>>(path: P) -> Result<Waveform> {
    let path = path.as_ref();

    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open audio file: {}", path.display()))?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(extension);
    }

    let probe_result = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .context("Failed to probe audio format")?;

    let mut format = probe_result.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .context("No audio tracks found in file")?;

    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .context("Sample rate not specified in audio file")?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .context("Failed to create decoder")?;

    let mut all_samples = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(err))
                if err.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(err) => return Err(err).context("Failed to read packet"),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = decoder
            .decode(&packet)
            .context("Failed to decode audio packet")?;
        all_samples.extend(convert_to_mono_f32(&decoded));
    }

    Ok(Waveform::new(all_samples, sample_rate))
}

/// Convert any decoded buffer to mono f32 samples in [-1.0, 1.0].
fn convert_to_mono_f32(buffer: &AudioBufferRef) -> Vec<f32> {
    match buffer {
        AudioBufferRef::U8(buf) => mix_to_mono(&**buf),
        AudioBufferRef::U16(buf) => mix_to_mono(&**buf),
        AudioBufferRef::U24(buf) => mix_to_mono(&**buf),
        AudioBufferRef::U32(buf) => mix_to_mono(&**buf),
        AudioBufferRef::S8(buf) => mix_to_mono(&**buf),
        AudioBufferRef::S16(buf) => mix_to_mono(&**buf),
        AudioBufferRef::S24(buf) => mix_to_mono(&**buf),
        AudioBufferRef::S32(buf) => mix_to_mono(&**buf),
        AudioBufferRef::F32(buf) => mix_to_mono(&**buf),
        AudioBufferRef::F64(buf) => mix_to_mono(&**buf),
    }
}

/// Average all channels of `buffer` into one, converting to f32.
fn mix_to_mono<S>(buffer: &AudioBuffer<S>) -> Vec<f32>
where
    S: Sample + IntoSample<f32>,
{
    let channels = buffer.spec().channels.count();
    let frames = buffer.frames();
    if channels == 0 {
        return Vec::new();
    }
    if channels == 1 {
        return buffer.chan(0).iter().map(|&s| s.into_sample()).collect();
    }
    (0..frames)
        .map(|i| {
            let sum: f32 = (0..channels)
                .map(|ch| {
                    let sample: f32 = buffer.chan(ch)[i].into_sample();
                    sample
                })
                .sum();
            sum / channels as f32
        })
        .collect()
}
