use num_complex::Complex64;
use rustfft::{num_traits::Zero, Fft, FftPlanner};
use std::sync::Arc;

/// Helper that wraps a forward/inverse `rustfft` plan pair of one length.
pub struct FftHelper {
    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,
    len: usize,
}

impl FftHelper {
    pub fn new(len: usize) -> Self {
        let mut planner = FftPlanner::new();
        let forward = planner.plan_fft_forward(len);
        let inverse = planner.plan_fft_inverse(len);
        Self {
            forward,
            inverse,
            len,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Spectrum of a real sequence, zero-padded or truncated to the plan length.
    pub fn forward(&self, input: &[f64]) -> Vec<Complex64> {
        let mut buffer: Vec<Complex64> = input
            .iter()
            .take(self.len)
            .map(|&value| Complex64::new(value, 0.0))
            .collect();
        buffer.resize(self.len, Complex64::zero());
        self.forward.process(&mut buffer);
        buffer
    }

    /// Real part of the normalized inverse transform.
    pub fn inverse_real(&self, mut spectrum: Vec<Complex64>) -> Vec<f64> {
        spectrum.resize(self.len, Complex64::zero());
        self.inverse.process(&mut spectrum);
        let scale = if self.len > 0 {
            1.0 / self.len as f64
        } else {
            0.0
        };
        spectrum.iter().map(|value| value.re * scale).collect()
    }

    /// Absolute frequency of every bin of the full (two-sided) spectrum.
    pub fn bin_frequencies(&self, sfreq: f64) -> Vec<f64> {
        let len = self.len;
        (0..len)
            .map(|bin| {
                let folded = if bin <= len / 2 { bin } else { len - bin };
                folded as f64 * sfreq / len as f64
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fft_helper_returns_same_length() {
        let helper = FftHelper::new(4);
        let output = helper.forward(&[1.0, 0.0, -1.0, 0.0]);
        assert_eq!(output.len(), 4);
    }

    #[test]
    fn inverse_recovers_real_signal() {
        let helper = FftHelper::new(6);
        let signal = [0.5, -1.0, 2.0, 0.0, 3.5, 1.0];
        let restored = helper.inverse_real(helper.forward(&signal));
        for (expected, actual) in signal.iter().zip(restored.iter()) {
            assert!((expected - actual).abs() < 1e-9);
        }
    }

    #[test]
    fn bin_frequencies_fold_at_nyquist() {
        let helper = FftHelper::new(4);
        assert_eq!(helper.bin_frequencies(100.0), vec![0.0, 25.0, 50.0, 25.0]);
    }
}
