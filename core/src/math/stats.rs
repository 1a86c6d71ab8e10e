use ndarray::ArrayView2;

pub struct StatsHelper;

impl StatsHelper {
    pub fn rms(samples: &[f32]) -> f32 {
        if samples.is_empty() {
            return 0.0;
        }
        let sum_sq: f32 = samples.iter().map(|&v| v * v).sum();
        (sum_sq / samples.len() as f32).sqrt()
    }

    pub fn mean(values: &[f64]) -> Option<f64> {
        if values.is_empty() {
            return None;
        }
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }

    /// Standard error of the mean with one degree of freedom removed.
    pub fn std_error(values: &[f64]) -> Option<f64> {
        if values.len() < 2 {
            return None;
        }
        let mean = Self::mean(values)?;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
        Some(var.sqrt() / (values.len() as f64).sqrt())
    }

    /// Mean over channels and samples of consecutive `window`-sample blocks.
    /// A trailing partial block is dropped.
    pub fn window_means(data: ArrayView2<f32>, window: usize) -> Vec<f64> {
        if window == 0 {
            return Vec::new();
        }
        let blocks = data.ncols() / window;
        (0..blocks)
            .filter_map(|block| {
                let view = data.slice(ndarray::s![.., block * window..(block + 1) * window]);
                Self::mean_of(view)
            })
            .collect()
    }

    pub fn mean_of(data: ArrayView2<f32>) -> Option<f64> {
        if data.is_empty() {
            return None;
        }
        let total: f64 = data.iter().map(|&v| v as f64).sum();
        Some(total / data.len() as f64)
    }

    /// Ratio of the grand mean of per-window means to its standard error.
    pub fn snr(window_means: &[f64]) -> Option<f64> {
        let mean = Self::mean(window_means)?;
        let std_error = Self::std_error(window_means)?;
        if std_error == 0.0 {
            return None;
        }
        Some(mean / std_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn rms_zero_sequence_yields_zero() {
        assert_eq!(StatsHelper::rms(&[]), 0.0);
        assert_eq!(StatsHelper::rms(&[0.0, 0.0]), 0.0);
    }

    #[test]
    fn rms_handles_single_value() {
        assert_eq!(StatsHelper::rms(&[4.0]), 4.0);
    }

    #[test]
    fn window_means_drop_partial_block() {
        let data = array![[1.0f32, 1.0, 3.0, 3.0, 9.0], [1.0, 1.0, 3.0, 3.0, 9.0]];
        assert_eq!(StatsHelper::window_means(data.view(), 2), vec![1.0, 3.0]);
    }

    #[test]
    fn snr_uses_sample_standard_error() {
        // mean 2, sample std 1, n = 3 -> stderr 1/sqrt(3)
        let snr = StatsHelper::snr(&[1.0, 2.0, 3.0]).unwrap();
        assert!((snr - 2.0 * 3f64.sqrt()).abs() < 1e-12);
        assert!(StatsHelper::snr(&[1.0]).is_none());
        assert!(StatsHelper::snr(&[2.0, 2.0]).is_none());
    }
}
