use anyhow::{ensure, Result};
use rustfft::num_complex::Complex;
use rustfft::FftPlanner;

/// Linearly resample `samples` from `source_rate` to `target_rate`.
pub fn linear_resample(samples: &[f32], source_rate: u32, target_rate: u32) -> Result<Vec<f32>> {
    ensure!(source_rate > 0, "source sample rate must be positive");
    ensure!(target_rate > 0, "target sample rate must be positive");
    if samples.is_empty() || source_rate == target_rate {
        return Ok(samples.to_vec());
    }
    let ratio = target_rate as f64 / source_rate as f64;
    let output_len = ((samples.len() as f64) * ratio).ceil().max(1.0) as usize;
    let mut output = Vec::with_capacity(output_len);
    let last_index = samples.len() - 1;
    for i in 0..output_len {
        let position = i as f64 / ratio;
        let left = (position.floor() as usize).min(last_index);
        let right = (left + 1).min(last_index);
        let t = (position - left as f64).clamp(0.0, 1.0) as f32;
        output.push(samples[left] * (1.0 - t) + samples[right] * t);
    }
    Ok(output)
}

/// Band-limited resampling through the frequency domain.
///
/// The spectrum is truncated (downsampling) or zero-padded (upsampling) to the
/// new length; the Nyquist bin is split between both halves when both lengths
/// are even. Used ahead of LPC analysis, where aliasing from linear
/// interpolation would show up as spurious resonances.
pub fn spectral_resample(samples: &[f64], source_rate: f64, target_rate: f64) -> Vec<f64> {
    if (source_rate - target_rate).abs() < 1e-6 || samples.is_empty() {
        return samples.to_vec();
    }
    let n = samples.len();
    let new_len = (n as f64 * target_rate / source_rate).round() as usize;
    if new_len == 0 {
        return Vec::new();
    }

    let mut planner = FftPlanner::<f64>::new();
    let mut spectrum: Vec<Complex<f64>> = samples.iter().map(|&x| Complex::new(x, 0.0)).collect();
    planner.plan_fft_forward(n).process(&mut spectrum);

    let mut resized = vec![Complex::new(0.0, 0.0); new_len];
    let half_n = n / 2;
    let half_new = new_len / 2;
    let keep = half_new.min(half_n);
    for i in 0..=keep.min(new_len - 1) {
        resized[i] = spectrum[i];
    }
    for i in 1..keep {
        resized[new_len - i] = spectrum[n - i];
    }
    if new_len < n && new_len % 2 == 0 && n % 2 == 0 {
        resized[half_new] = (spectrum[half_new] + spectrum[n - half_new]) * 0.5;
    }

    planner.plan_fft_inverse(new_len).process(&mut resized);
    let scale = 1.0 / n as f64;
    resized.iter().map(|c| c.re * scale).collect()
}
