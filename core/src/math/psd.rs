use crate::math::fft::FftHelper;
use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// One-sided power spectral density averaged over rows.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Spectrum {
    pub freqs: Vec<f64>,
    pub power: Vec<f64>,
}

impl Spectrum {
    /// Power at the bin closest to `freq`.
    pub fn power_at(&self, freq: f64) -> Option<f64> {
        let idx = self
            .freqs
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| (*a - freq).abs().total_cmp(&(*b - freq).abs()))
            .map(|(idx, _)| idx)?;
        self.power.get(idx).copied()
    }

    /// Element-wise mean of spectra sharing one frequency axis.
    pub fn average(spectra: &[Spectrum]) -> Option<Spectrum> {
        let first = spectra.first()?;
        let mut power = vec![0.0; first.power.len()];
        for spectrum in spectra {
            for (acc, value) in power.iter_mut().zip(spectrum.power.iter()) {
                *acc += value;
            }
        }
        let count = spectra.len() as f64;
        power.iter_mut().for_each(|value| *value /= count);
        Some(Spectrum {
            freqs: first.freqs.clone(),
            power,
        })
    }
}

/// Welch estimate with Hann windows of two seconds (or the whole signal when
/// shorter) and 50% overlap.
pub fn welch(data: ArrayView2<f32>, sfreq: f64) -> Option<Spectrum> {
    let n_times = data.ncols();
    if data.nrows() == 0 || n_times < 2 {
        return None;
    }
    let nperseg = ((2.0 * sfreq).round() as usize).clamp(2, n_times);
    let step = (nperseg / 2).max(1);
    let window: Vec<f64> = (0..nperseg)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f64 / nperseg as f64).cos())
        .collect();
    let window_power: f64 = window.iter().map(|w| w * w).sum();
    let scale = 1.0 / (sfreq * window_power);
    let n_bins = nperseg / 2 + 1;
    let fft = FftHelper::new(nperseg);

    let mut power = vec![0.0; n_bins];
    let mut segments = 0usize;
    for row in data.rows() {
        let samples: Vec<f64> = row.iter().map(|&v| v as f64).collect();
        let mut start = 0;
        while start + nperseg <= n_times {
            let tapered: Vec<f64> = samples[start..start + nperseg]
                .iter()
                .zip(window.iter())
                .map(|(s, w)| s * w)
                .collect();
            let spectrum = fft.forward(&tapered);
            for (bin, acc) in power.iter_mut().enumerate() {
                let mut density = spectrum[bin].norm_sqr() * scale;
                let is_edge = bin == 0 || (nperseg % 2 == 0 && bin == nperseg / 2);
                if !is_edge {
                    density *= 2.0;
                }
                *acc += density;
            }
            segments += 1;
            start += step;
        }
    }

    power.iter_mut().for_each(|value| *value /= segments as f64);
    let freqs = (0..n_bins)
        .map(|bin| bin as f64 * sfreq / nperseg as f64)
        .collect();
    Some(Spectrum { freqs, power })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn welch_peaks_at_sine_frequency() {
        let sfreq = 200.0;
        let data = Array2::from_shape_fn((2, 2000), |(_, t)| {
            (2.0 * PI * 20.0 * t as f64 / sfreq).sin() as f32
        });
        let spectrum = welch(data.view(), sfreq).unwrap();
        let (peak_idx, _) = spectrum
            .power
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .unwrap();
        assert!((spectrum.freqs[peak_idx] - 20.0).abs() < 1.0);
        assert!(spectrum.power_at(20.0).unwrap() > spectrum.power_at(60.0).unwrap() * 100.0);
    }

    #[test]
    fn welch_requires_samples() {
        let data = Array2::<f32>::zeros((1, 1));
        assert!(welch(data.view(), 100.0).is_none());
    }
}
