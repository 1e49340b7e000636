//! Burg-LPC formant tracking.
//!
//! The signal is resampled to twice the formant ceiling, pre-emphasized and
//! cut into Gaussian-windowed frames. Each frame gets LPC coefficients from
//! Burg's method; the roots of the prediction polynomial (companion-matrix
//! eigenvalues, Newton-polished, reflected into the unit circle) become
//! formant frequencies and bandwidths.

use std::f64::consts::PI;

use nalgebra::DMatrix;
use num_complex::Complex64;

use crate::audio::resample;
use crate::config::FormantSettings;

/// Formants closer than this to 0 Hz or to the Nyquist frequency are dropped.
const SAFETY_MARGIN_HZ: f64 = 50.0;
const POLISH_ITERATIONS: usize = 10;
const SCHUR_EPS: f64 = 1e-12;
const SCHUR_MAX_ITERATIONS: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FormantPoint {
    pub frequency: f64,
    pub bandwidth: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormantFrame {
    /// Frame centre, in seconds from the start of the analysed samples.
    pub time: f64,
    /// Formants sorted by frequency, at most `max_formants` of them.
    pub formants: Vec<FormantPoint>,
}

/// Formant frames at a constant time step.
#[derive(Debug, Clone, PartialEq)]
pub struct FormantTrack {
    frames: Vec<FormantFrame>,
    time_step: f64,
}

impl FormantTrack {
    pub fn frames(&self) -> &[FormantFrame] {
        &self.frames
    }

    pub fn time_step(&self) -> f64 {
        self.time_step
    }

    /// Frequency of formant `number` (1-based) at `time`, linearly
    /// interpolated between the two closest frames. NaN when `time` lies
    /// outside the analysed range or the nearest frame lacks that formant;
    /// when only the farther frame lacks it, the nearest value is returned.
    pub fn value_at_time(&self, number: usize, time: f64) -> f64 {
        let Some(first) = self.frames.first() else {
            return f64::NAN;
        };
        let count = self.frames.len() as f64;
        let position = (time - first.time) / self.time_step;
        if !(-0.5..=count - 0.5).contains(&position) {
            return f64::NAN;
        }

        let left = position.floor();
        let mut phase = position - left;
        let (near, far) = if phase < 0.5 {
            (left, left + 1.0)
        } else {
            phase = 1.0 - phase;
            (left + 1.0, left)
        };
        let Some(near_value) = self.frequency_at(near, number) else {
            return f64::NAN;
        };
        match self.frequency_at(far, number) {
            Some(far_value) => near_value + phase * (far_value - near_value),
            None => near_value,
        }
    }

    fn frequency_at(&self, index: f64, number: usize) -> Option<f64> {
        if index < 0.0 || number == 0 {
            return None;
        }
        self.frames
            .get(index as usize)?
            .formants
            .get(number - 1)
            .map(|point| point.frequency)
    }
}

/// Short-term Burg formant analysis with fixed settings.
#[derive(Debug, Clone)]
pub struct BurgTracker {
    settings: FormantSettings,
}

impl BurgTracker {
    pub fn new(settings: FormantSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &FormantSettings {
        &self.settings
    }

    pub fn track(&self, samples: &[f32], sample_rate: u32) -> FormantTrack {
        let time_step = if self.settings.time_step > 0.0 {
            self.settings.time_step
        } else {
            self.settings.window_length / 4.0
        };
        if samples.is_empty() || sample_rate == 0 {
            return FormantTrack {
                frames: Vec::new(),
                time_step,
            };
        }

        let source_rate = sample_rate as f64;
        let duration = samples.len() as f64 / source_rate;
        let ceiling_rate = 2.0 * self.settings.max_formant_hz;
        let signal: Vec<f64> = samples.iter().map(|&s| s as f64).collect();
        let (signal, rate) = if ceiling_rate < source_rate {
            (
                resample::spectral_resample(&signal, source_rate, ceiling_rate),
                ceiling_rate,
            )
        } else {
            (signal, source_rate)
        };
        let emphasized = pre_emphasize(&signal, self.settings.pre_emphasis_hz, rate);

        let window_duration = 2.0 * self.settings.window_length;
        let mut window_len = (window_duration * rate).round() as usize;
        if window_len % 2 == 0 {
            window_len += 1;
        }
        let window = gaussian_window(window_len);
        let half_window = (window_len / 2) as isize;

        let frame_count = if duration > window_duration {
            ((duration - window_duration) / time_step).floor() as usize + 1
        } else {
            1
        };
        let first_time = (duration - (frame_count - 1) as f64 * time_step) / 2.0;
        let order = 2 * self.settings.max_formants;
        let nyquist = rate / 2.0;

        let frames = (0..frame_count)
            .map(|i| {
                let time = first_time + i as f64 * time_step;
                let centre = (time * rate).round() as isize;
                let frame = windowed_frame(&emphasized, centre - half_window, &window);
                let mut formants = burg_coefficients(&frame, order)
                    .map(|coefficients| {
                        polynomial_roots(&coefficients)
                            .into_iter()
                            .filter_map(|root| root_to_formant(root, rate, nyquist))
                            .collect::<Vec<_>>()
                    })
                    .unwrap_or_default();
                formants.sort_by(|a, b| a.frequency.total_cmp(&b.frequency));
                formants.truncate(self.settings.max_formants);
                FormantFrame { time, formants }
            })
            .collect();

        FormantTrack { frames, time_step }
    }
}

impl Default for BurgTracker {
    fn default() -> Self {
        Self::new(FormantSettings::default())
    }
}

fn pre_emphasize(signal: &[f64], from_hz: f64, rate: f64) -> Vec<f64> {
    let alpha = (-2.0 * PI * from_hz / rate).exp();
    let mut out = Vec::with_capacity(signal.len());
    let mut previous = 0.0;
    for &x in signal {
        out.push(x - alpha * previous);
        previous = x;
    }
    out
}

/// Gaussian window with its edges pulled down to zero.
fn gaussian_window(len: usize) -> Vec<f64> {
    let edge = (-12.0_f64).exp();
    let mid = 0.5 * (len as f64 + 1.0);
    let denom = (len as f64 + 1.0).powi(2);
    (1..=len)
        .map(|i| {
            let x = i as f64 - mid;
            ((-48.0 * x * x / denom).exp() - edge) / (1.0 - edge)
        })
        .collect()
}

/// Copy `window.len()` samples starting at `start` (zero outside the
/// signal) and apply the window.
fn windowed_frame(signal: &[f64], start: isize, window: &[f64]) -> Vec<f64> {
    window
        .iter()
        .enumerate()
        .map(|(offset, w)| {
            let index = start + offset as isize;
            if index < 0 {
                return 0.0;
            }
            signal.get(index as usize).map_or(0.0, |s| s * w)
        })
        .collect()
}

/// Burg's maximum-entropy estimate of `order` prediction coefficients,
/// `x[n] ≈ Σ d[k] x[n-1-k]`. `None` for silent or too-short frames.
fn burg_coefficients(x: &[f64], order: usize) -> Option<Vec<f64>> {
    let n = x.len();
    if n <= order + 1 || order == 0 {
        return None;
    }
    let energy: f64 = x.iter().map(|v| v * v).sum();
    if energy <= f64::MIN_POSITIVE {
        return None;
    }

    let mut forward: Vec<f64> = x[..n - 1].to_vec();
    let mut backward: Vec<f64> = x[1..].to_vec();
    let mut d = vec![0.0; order];
    let mut previous = vec![0.0; order];

    for k in 0..order {
        let span = n - k - 1;
        let mut num = 0.0;
        let mut den = 0.0;
        for j in 0..span {
            num += forward[j] * backward[j];
            den += forward[j] * forward[j] + backward[j] * backward[j];
        }
        if den <= f64::MIN_POSITIVE {
            return None;
        }
        d[k] = 2.0 * num / den;
        for i in 0..k {
            d[i] = previous[i] - d[k] * previous[k - 1 - i];
        }
        if k + 1 == order {
            break;
        }
        previous[..=k].copy_from_slice(&d[..=k]);
        for j in 0..span - 1 {
            forward[j] -= previous[k] * backward[j];
            backward[j] = backward[j + 1] - previous[k] * forward[j + 1];
        }
    }
    d.iter().all(|c| c.is_finite()).then_some(d)
}

/// Roots of `z^m - d[0] z^(m-1) - ... - d[m-1]`.
fn polynomial_roots(d: &[f64]) -> Vec<Complex64> {
    let order = d.len();
    if order == 0 {
        return Vec::new();
    }
    let mut companion = DMatrix::<f64>::zeros(order, order);
    for (i, &coefficient) in d.iter().enumerate() {
        companion[(0, i)] = coefficient;
    }
    for i in 1..order {
        companion[(i, i - 1)] = 1.0;
    }
    let Some(schur) = companion.try_schur(SCHUR_EPS, SCHUR_MAX_ITERATIONS) else {
        return Vec::new();
    };
    schur
        .complex_eigenvalues()
        .iter()
        .map(|e| polish_root(d, Complex64::new(e.re, e.im)))
        .map(fix_into_unit_circle)
        .collect()
}

fn evaluate(d: &[f64], z: Complex64) -> (Complex64, Complex64) {
    let mut value = Complex64::new(1.0, 0.0);
    let mut derivative = Complex64::new(0.0, 0.0);
    for &coefficient in d {
        derivative = derivative * z + value;
        value = value * z - coefficient;
    }
    (value, derivative)
}

fn polish_root(d: &[f64], mut z: Complex64) -> Complex64 {
    for _ in 0..POLISH_ITERATIONS {
        let (value, derivative) = evaluate(d, z);
        if derivative.norm() < 1e-30 {
            break;
        }
        let step = value / derivative;
        z -= step;
        if step.norm() <= 1e-12 * z.norm() {
            break;
        }
    }
    z
}

fn fix_into_unit_circle(z: Complex64) -> Complex64 {
    let r = z.norm();
    if r > 1.0 {
        z / (r * r)
    } else {
        z
    }
}

fn root_to_formant(root: Complex64, rate: f64, nyquist: f64) -> Option<FormantPoint> {
    if root.im <= 0.0 {
        return None;
    }
    let frequency = root.arg().abs() * rate / (2.0 * PI);
    if frequency < SAFETY_MARGIN_HZ || frequency > nyquist - SAFETY_MARGIN_HZ {
        return None;
    }
    let r = root.norm();
    let bandwidth = if r > 0.0 {
        -r.ln() * rate / PI
    } else {
        f64::INFINITY
    };
    Some(FormantPoint {
        frequency,
        bandwidth,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track_with(frames: Vec<Vec<f64>>) -> FormantTrack {
        FormantTrack {
            frames: frames
                .into_iter()
                .enumerate()
                .map(|(i, freqs)| FormantFrame {
                    time: 0.01 + i as f64 * 0.01,
                    formants: freqs
                        .into_iter()
                        .map(|frequency| FormantPoint {
                            frequency,
                            bandwidth: 50.0,
                        })
                        .collect(),
                })
                .collect(),
            time_step: 0.01,
        }
    }

    #[test]
    fn interpolates_between_frames() {
        let track = track_with(vec![vec![500.0, 1500.0], vec![600.0, 1700.0]]);
        assert!((track.value_at_time(1, 0.0125) - 525.0).abs() < 1e-9);
        assert!((track.value_at_time(2, 0.0175) - 1650.0).abs() < 1e-9);
    }

    #[test]
    fn undefined_outside_frame_range() {
        let track = track_with(vec![vec![500.0], vec![600.0]]);
        assert!(track.value_at_time(1, 0.0).is_nan());
        assert!(track.value_at_time(1, 0.03).is_nan());
        assert!((track.value_at_time(1, 0.006) - 500.0).abs() < 1e-9);
    }

    #[test]
    fn missing_formant_in_nearest_frame_is_undefined() {
        let track = track_with(vec![vec![500.0, 1500.0], vec![600.0]]);
        assert!(track.value_at_time(2, 0.019).is_nan());
        assert!((track.value_at_time(2, 0.012) - 1500.0).abs() < 1e-9);
    }

    #[test]
    fn burg_recovers_second_order_predictor() {
        // x[n] = 1.6 x[n-1] - 0.8 x[n-2] + e[n], e uniform from a fixed xorshift seed.
        let mut state: u64 = 0x9E37_79B9_7F4A_7C15;
        let mut noise = || {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            (state >> 11) as f64 / (1u64 << 53) as f64 - 0.5
        };
        let mut x = vec![0.0; 20_000];
        for n in 0..x.len() {
            let past1 = if n >= 1 { x[n - 1] } else { 0.0 };
            let past2 = if n >= 2 { x[n - 2] } else { 0.0 };
            x[n] = 1.6 * past1 - 0.8 * past2 + noise();
        }
        let d = burg_coefficients(&x, 2).unwrap();
        assert!((d[0] - 1.6).abs() < 0.02, "d = {d:?}");
        assert!((d[1] + 0.8).abs() < 0.02, "d = {d:?}");
    }

    #[test]
    fn silent_frame_has_no_coefficients() {
        assert!(burg_coefficients(&[0.0; 256], 10).is_none());
    }

    #[test]
    fn roots_map_to_resonance_frequency() {
        let rate = 10_000.0;
        let (freq, bw) = (1000.0_f64, 100.0_f64);
        let r = (-PI * bw / rate).exp();
        let theta = 2.0 * PI * freq / rate;
        let d = [2.0 * r * theta.cos(), -r * r];
        let formants: Vec<FormantPoint> = polynomial_roots(&d)
            .into_iter()
            .filter_map(|root| root_to_formant(root, rate, rate / 2.0))
            .collect();
        assert_eq!(formants.len(), 1);
        assert!((formants[0].frequency - freq).abs() < 1e-6);
        assert!((formants[0].bandwidth - bw).abs() < 1e-6);
    }

    #[test]
    fn unstable_roots_are_reflected() {
        let z = fix_into_unit_circle(Complex64::new(0.0, 2.0));
        assert!((z.norm() - 0.5).abs() < 1e-12);
        assert!(z.im > 0.0);

        // Reflection keeps the angle, so the resonance frequency survives.
        let outside = Complex64::from_polar(1.25, 0.3);
        let inside = fix_into_unit_circle(outside);
        assert!((inside.norm() - 0.8).abs() < 1e-12);
        assert!((inside.arg() - 0.3).abs() < 1e-12);

        let stable = Complex64::from_polar(0.9, -1.0);
        assert_eq!(fix_into_unit_circle(stable), stable);
    }

    #[test]
    fn empty_input_gives_empty_track() {
        let track = BurgTracker::default().track(&[], 16_000);
        assert!(track.frames().is_empty());
        assert!(track.value_at_time(1, 0.0).is_nan());
    }
}
