use crate::config::{
    FilterBand, FilterConfig, FilterMethod, FirWindow, IirFamily, IirParams, NotchConfig,
    NotchMethod, Phase, ResampleConfig, ResampleWindow, Tunable,
};
use crate::engine::{DspEngine, EngineDiagnostics, EngineError, EngineOutput, EngineResult};
use crate::math::fft::FftHelper;
use crate::math::grid::rescale_sample;
use crate::math::pad::{pad_row, PadMode};
use crate::math::psd::welch;
use crate::telemetry::LogManager;
use ndarray::{Array2, ArrayView1};
use num_complex::Complex64;
use std::f64::consts::PI;

const DEFAULT_IIR_ORDER: u32 = 4;
const SPECTRUM_FIT_SECONDS: f64 = 10.0;
const LINE_FREQUENCIES: [f64; 2] = [50.0, 60.0];

/// Reference engine that realizes every stage in the frequency domain:
/// zero-phase magnitude responses applied to padded FFTs, and FFT-based
/// resampling. Phase options other than the magnitude shape are recorded but
/// not emulated.
pub struct FftEngine {
    logger: LogManager,
}

impl FftEngine {
    pub fn new() -> Self {
        Self {
            logger: LogManager::new("fft-engine"),
        }
    }
}

impl Default for FftEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl DspEngine for FftEngine {
    fn filter(&self, data: Array2<f32>, sfreq: f64, config: &FilterConfig) -> EngineResult {
        let mut diagnostics = EngineDiagnostics::default();
        if config.band.is_identity() {
            diagnostics.notes.push("identity response".into());
            return Ok(EngineOutput { data, diagnostics });
        }

        let nyquist = sfreq / 2.0;
        let n_times = data.ncols();
        let band = config.band;

        let data = match config.method {
            FilterMethod::Fir => {
                let (l_tb, h_tb) = transition_bandwidths(config, nyquist);
                check_fir_edges(band, l_tb, h_tb, nyquist)?;
                diagnostics.l_trans_bandwidth = l_tb;
                diagnostics.h_trans_bandwidth = h_tb;

                let min_tb = l_tb.into_iter().chain(h_tb).fold(f64::INFINITY, f64::min);
                let length = match config.filter_length.explicit() {
                    Some(length) => length.samples(sfreq),
                    None => auto_filter_length(min_tb, sfreq, config.fir_window),
                };
                diagnostics.filter_length = Some(length);
                if length > n_times {
                    diagnostics.warnings.push(format!(
                        "filter length {} exceeds signal length {}",
                        length, n_times
                    ));
                }

                let passes = if config.phase == Phase::ZeroDouble { 2 } else { 1 };
                let pad = length.min(n_times).saturating_sub(1);
                apply_spectral(data, sfreq, pad, config.pad, |f| {
                    fir_response(band, l_tb, h_tb, f).powi(passes)
                })?
            }
            FilterMethod::Iir => {
                let params = config.iir_params.explicit();
                match params {
                    Some(params) if params.has_coefficients() => {
                        diagnostics.notes.push("iir coefficients supplied".into());
                        apply_coefficients(data, params, config.phase, config.pad)?
                    }
                    _ => {
                        let order = butterworth_order(params)?;
                        diagnostics
                            .notes
                            .push(format!("butterworth order {}", order));
                        let fallback = iir_pad_fallback(band, sfreq, nyquist);
                        let pad = params
                            .and_then(|p| p.padlen)
                            .unwrap_or(fallback)
                            .min(n_times)
                            .saturating_sub(1);
                        let squared = !matches!(config.phase, Phase::Forward | Phase::Minimum);
                        apply_spectral(data, sfreq, pad, config.pad, |f| {
                            let gain = butterworth_response(band, order, f);
                            if squared {
                                gain * gain
                            } else {
                                gain
                            }
                        })?
                    }
                }
            }
        };

        self.logger.detail(&format!(
            "filtered {} rows x {} samples ({:?})",
            data.nrows(),
            n_times,
            band
        ));
        Ok(EngineOutput { data, diagnostics })
    }

    fn notch(&self, data: Array2<f32>, sfreq: f64, config: &NotchConfig) -> EngineResult {
        let mut diagnostics = EngineDiagnostics::default();
        let nyquist = sfreq / 2.0;
        let n_times = data.ncols();

        let freqs = match &config.freqs {
            Tunable::Explicit(freqs) => freqs.clone(),
            Tunable::DeferToEngine => detect_line_frequencies(&data, sfreq, config.p_value),
        };
        if freqs.is_empty() {
            diagnostics
                .notes
                .push("no line frequencies detected".into());
            return Ok(EngineOutput { data, diagnostics });
        }

        let spectrum_fit = config.method == NotchMethod::SpectrumFit;
        let trans = if spectrum_fit {
            0.0
        } else {
            config.trans_bandwidth
        };
        let mut bands = Vec::with_capacity(freqs.len());
        for (index, &freq) in freqs.iter().enumerate() {
            let width = match (&config.widths, spectrum_fit) {
                (Tunable::Explicit(widths), _) => widths.width_at(index).unwrap_or(freq / 200.0),
                (Tunable::DeferToEngine, true) => config.mt_bandwidth.unwrap_or_else(|| 1.0),
                (Tunable::DeferToEngine, false) => freq / 200.0,
            };
            let half = width / 2.0 + trans / 2.0;
            if freq - half <= 0.0 || freq + half >= nyquist {
                return Err(EngineError::FilterDesign(format!(
                    "notch band around {}Hz ({}Hz wide incl. transition) does not fit between 0 and {}Hz",
                    freq,
                    2.0 * half,
                    nyquist
                )));
            }
            bands.push((freq, width / 2.0, trans / 2.0));
        }

        let length = match config.filter_length.explicit() {
            Some(length) => length.samples(sfreq),
            None if spectrum_fit => (SPECTRUM_FIT_SECONDS * sfreq).ceil() as usize,
            None => auto_filter_length(config.trans_bandwidth, sfreq, config.fir_window),
        };
        if config.method != NotchMethod::Iir {
            diagnostics.filter_length = Some(length);
        }
        let pad = length.min(n_times).saturating_sub(1);
        let squared = config.method == NotchMethod::Iir && config.phase != Phase::Forward;

        let data = apply_spectral(data, sfreq, pad, config.pad, |f| {
            let gain: f64 = bands
                .iter()
                .map(|&(center, half_width, half_trans)| {
                    1.0 - bump(f, center, half_width, half_trans)
                })
                .product();
            if squared {
                gain * gain
            } else {
                gain
            }
        })?;

        diagnostics.rejected_frequencies = freqs;
        diagnostics
            .notes
            .push(format!("notch method {:?}", config.method));
        Ok(EngineOutput { data, diagnostics })
    }

    fn resample(
        &self,
        data: Array2<f32>,
        sfreq: f64,
        config: &ResampleConfig,
        stim_rows: &[usize],
    ) -> EngineResult {
        let ratio = config.target_sfreq / sfreq;
        let (rows, n_times) = data.dim();
        let n_new = rescale_sample(n_times, ratio);
        if n_times > 0 && n_new == 0 {
            return Err(EngineError::FilterDesign(format!(
                "resampling {} samples by {} leaves no samples",
                n_times, ratio
            )));
        }

        let npad = config.npad.unwrap_or_else(|| auto_npad(n_times));
        let total = n_times + 2 * npad;
        let total_new = rescale_sample(total, ratio).max(n_new).max(1);
        let offset = rescale_sample(npad, ratio).min(total_new - n_new);

        let forward = FftHelper::new(total.max(1));
        let inverse = FftHelper::new(total_new);
        let keep = total.min(total_new);
        let taper = spectral_window(config.window, keep);
        let scale = total_new as f64 / total.max(1) as f64;

        let mut out = Array2::zeros((rows, n_new));
        for (row_idx, (source, mut target)) in data.rows().into_iter().zip(out.rows_mut()).enumerate() {
            let samples: Vec<f64> = source.iter().map(|&v| v as f64).collect();
            let resampled = if stim_rows.contains(&row_idx) {
                resample_stim(&samples, n_new, ratio)
            } else if n_times == 0 {
                Vec::new()
            } else {
                let padded = pad_row(&samples, npad, npad, config.pad);
                let spectrum = forward.forward(&padded);
                let moved = move_spectrum(&spectrum, total_new, keep, &taper);
                let signal = inverse.inverse_real(moved);
                signal[offset..offset + n_new]
                    .iter()
                    .map(|v| v * scale)
                    .collect()
            };
            for (dst, src) in target.iter_mut().zip(resampled.iter()) {
                *dst = *src as f32;
            }
        }
        ensure_finite(&out)?;

        let mut diagnostics = EngineDiagnostics {
            resample_ratio: Some(ratio),
            ..Default::default()
        };
        diagnostics.notes.push(format!("npad {}", npad));
        if !stim_rows.is_empty() {
            diagnostics
                .notes
                .push(format!("{} stim rows resampled by sample-and-hold", stim_rows.len()));
        }
        self.logger.detail(&format!(
            "resampled {} rows from {} to {} samples",
            rows, n_times, n_new
        ));
        Ok(EngineOutput {
            data: out,
            diagnostics,
        })
    }
}

fn auto_l_trans(l_freq: f64) -> f64 {
    (0.25 * l_freq).max(2.0).min(l_freq)
}

fn auto_h_trans(h_freq: f64, nyquist: f64) -> f64 {
    (0.25 * h_freq).max(2.0).min(nyquist - h_freq)
}

fn transition_bandwidths(config: &FilterConfig, nyquist: f64) -> (Option<f64>, Option<f64>) {
    let stop_cap = match config.band {
        FilterBand::Bandstop { l_freq, h_freq } => (l_freq - h_freq) / 2.0,
        _ => f64::INFINITY,
    };
    let l_tb = config.band.l_freq().map(|l_freq| {
        config
            .l_trans_bandwidth
            .unwrap_or_else(|| auto_l_trans(l_freq).min(stop_cap))
    });
    let h_tb = config.band.h_freq().map(|h_freq| {
        config
            .h_trans_bandwidth
            .unwrap_or_else(|| auto_h_trans(h_freq, nyquist).min(stop_cap))
    });
    (l_tb, h_tb)
}

fn check_fir_edges(
    band: FilterBand,
    l_tb: Option<f64>,
    h_tb: Option<f64>,
    nyquist: f64,
) -> Result<(), EngineError> {
    const EPS: f64 = 1e-9;
    match band {
        FilterBand::Bandstop { l_freq, h_freq } => {
            let (l_tb, h_tb) = (l_tb.unwrap_or(0.0), h_tb.unwrap_or(0.0));
            if h_freq + h_tb > l_freq - l_tb + EPS {
                return Err(EngineError::FilterDesign(format!(
                    "transition bands ({}Hz, {}Hz) do not fit inside the {}-{}Hz stop band",
                    h_tb, l_tb, h_freq, l_freq
                )));
            }
        }
        _ => {
            if let (Some(l_freq), Some(l_tb)) = (band.l_freq(), l_tb) {
                if l_freq - l_tb < -EPS {
                    return Err(EngineError::FilterDesign(format!(
                        "lower transition bandwidth {}Hz extends below 0Hz for l_freq {}Hz",
                        l_tb, l_freq
                    )));
                }
            }
            if let (Some(h_freq), Some(h_tb)) = (band.h_freq(), h_tb) {
                if h_freq + h_tb > nyquist + EPS {
                    return Err(EngineError::FilterDesign(format!(
                        "upper transition bandwidth {}Hz extends past Nyquist ({}Hz) for h_freq {}Hz",
                        h_tb, nyquist, h_freq
                    )));
                }
            }
        }
    }
    Ok(())
}

fn auto_filter_length(trans_bandwidth: f64, sfreq: f64, window: FirWindow) -> usize {
    let length = (window.length_factor() * sfreq / trans_bandwidth).ceil().max(1.0) as usize;
    if length % 2 == 0 {
        length + 1
    } else {
        length
    }
}

/// 0 below `lo`, 1 above `hi`, raised cosine in between.
fn rising(f: f64, lo: f64, hi: f64) -> f64 {
    if f >= hi {
        1.0
    } else if f <= lo {
        0.0
    } else {
        0.5 - 0.5 * (PI * (f - lo) / (hi - lo)).cos()
    }
}

fn fir_response(band: FilterBand, l_tb: Option<f64>, h_tb: Option<f64>, f: f64) -> f64 {
    let highpass = |l_freq: f64| rising(f, l_freq - l_tb.unwrap_or(0.0), l_freq);
    let lowpass = |h_freq: f64| 1.0 - rising(f, h_freq, h_freq + h_tb.unwrap_or(0.0));
    match band {
        FilterBand::Identity => 1.0,
        FilterBand::Highpass { l_freq } => highpass(l_freq),
        FilterBand::Lowpass { h_freq } => lowpass(h_freq),
        FilterBand::Bandpass { l_freq, h_freq } => highpass(l_freq) * lowpass(h_freq),
        FilterBand::Bandstop { l_freq, h_freq } => (lowpass(h_freq) + highpass(l_freq)).min(1.0),
    }
}

fn butterworth_order(params: Option<&IirParams>) -> Result<u32, EngineError> {
    if let Some(family) = params.and_then(|p| p.ftype) {
        if family != IirFamily::Butter {
            return Err(EngineError::FilterDesign(format!(
                "the FFT engine only designs Butterworth responses, got {:?}",
                family
            )));
        }
    }
    Ok(params.and_then(|p| p.order).unwrap_or(DEFAULT_IIR_ORDER))
}

/// Single-pass Butterworth magnitude.
fn butterworth_response(band: FilterBand, order: u32, f: f64) -> f64 {
    let n = 2 * order as i32;
    let highpass = |l_freq: f64| 1.0 / (1.0 + (l_freq / f).powi(n)).sqrt();
    let lowpass = |h_freq: f64| 1.0 / (1.0 + (f / h_freq).powi(n)).sqrt();
    match band {
        FilterBand::Identity => 1.0,
        FilterBand::Highpass { l_freq } => highpass(l_freq),
        FilterBand::Lowpass { h_freq } => lowpass(h_freq),
        FilterBand::Bandpass { l_freq, h_freq } => highpass(l_freq) * lowpass(h_freq),
        FilterBand::Bandstop { l_freq, h_freq } => (lowpass(h_freq) + highpass(l_freq)).min(1.0),
    }
}

fn iir_pad_fallback(band: FilterBand, sfreq: f64, nyquist: f64) -> usize {
    let l_tb = band.l_freq().map(auto_l_trans);
    let h_tb = band.h_freq().map(|h_freq| auto_h_trans(h_freq, nyquist));
    let min_tb = l_tb
        .into_iter()
        .chain(h_tb)
        .filter(|tb| *tb > 0.0)
        .fold(f64::INFINITY, f64::min);
    if min_tb.is_finite() {
        auto_filter_length(min_tb, sfreq, FirWindow::Hamming)
    } else {
        0
    }
}

/// Raised-cosine rejection bump: 1 within `half_width` of `center`, falling
/// to 0 over a further `half_trans`.
fn bump(f: f64, center: f64, half_width: f64, half_trans: f64) -> f64 {
    let distance = (f - center).abs();
    if distance <= half_width {
        1.0
    } else if distance >= half_width + half_trans {
        0.0
    } else {
        0.5 + 0.5 * (PI * (distance - half_width) / half_trans).cos()
    }
}

/// Pads every row, multiplies its spectrum by `response(|f|)`, and crops the
/// padding off again.
fn apply_spectral(
    data: Array2<f32>,
    sfreq: f64,
    pad: usize,
    mode: PadMode,
    response: impl Fn(f64) -> f64,
) -> Result<Array2<f32>, EngineError> {
    let (rows, n_times) = data.dim();
    if rows == 0 || n_times == 0 {
        return Ok(data);
    }
    let total = n_times + 2 * pad;
    let fft = FftHelper::new(total);
    let gains: Vec<f64> = fft
        .bin_frequencies(sfreq)
        .into_iter()
        .map(&response)
        .collect();

    let mut out = Array2::zeros((rows, n_times));
    for (source, mut target) in data.rows().into_iter().zip(out.rows_mut()) {
        let samples = row_to_f64(source);
        let padded = pad_row(&samples, pad, pad, mode);
        let mut spectrum = fft.forward(&padded);
        for (bin, gain) in spectrum.iter_mut().zip(gains.iter()) {
            *bin *= *gain;
        }
        let filtered = fft.inverse_real(spectrum);
        for (dst, src) in target.iter_mut().zip(filtered[pad..pad + n_times].iter()) {
            *dst = *src as f32;
        }
    }
    ensure_finite(&out)?;
    Ok(out)
}

/// Time-domain application of user-supplied `b`/`a` or second-order sections.
fn apply_coefficients(
    data: Array2<f32>,
    params: &IirParams,
    phase: Phase,
    mode: PadMode,
) -> Result<Array2<f32>, EngineError> {
    let sections: Vec<(Vec<f64>, Vec<f64>)> = match (&params.b, &params.a, &params.sos) {
        (Some(b), Some(a), _) => vec![(b.clone(), a.clone())],
        (_, _, Some(sos)) => sos
            .iter()
            .map(|section| (section[..3].to_vec(), section[3..].to_vec()))
            .collect(),
        _ => {
            return Err(EngineError::FilterDesign(
                "iir_params carry neither b/a nor sos coefficients".into(),
            ))
        }
    };
    for (_, a) in &sections {
        if a.first().copied().unwrap_or(0.0) == 0.0 || !is_stable(a) {
            return Err(EngineError::NumericalInstability(format!(
                "denominator {:?} has poles on or outside the unit circle",
                a
            )));
        }
    }

    let (rows, n_times) = data.dim();
    let order = sections
        .iter()
        .map(|(b, a)| b.len().max(a.len()))
        .max()
        .unwrap_or(1);
    let pad = params
        .padlen
        .unwrap_or(3 * order)
        .min(n_times.saturating_sub(1));
    let two_pass = !matches!(phase, Phase::Forward);

    let mut out = Array2::zeros((rows, n_times));
    for (source, mut target) in data.rows().into_iter().zip(out.rows_mut()) {
        let mut signal = pad_row(&row_to_f64(source), pad, pad, mode);
        for (b, a) in &sections {
            signal = lfilter(b, a, &signal);
        }
        if two_pass {
            signal.reverse();
            for (b, a) in &sections {
                signal = lfilter(b, a, &signal);
            }
            signal.reverse();
        }
        for (dst, src) in target.iter_mut().zip(signal[pad..pad + n_times].iter()) {
            *dst = *src as f32;
        }
    }
    ensure_finite(&out)?;
    Ok(out)
}

fn lfilter(b: &[f64], a: &[f64], x: &[f64]) -> Vec<f64> {
    let a0 = a[0];
    let mut y = vec![0.0; x.len()];
    for n in 0..x.len() {
        let mut acc = 0.0;
        for (k, coef) in b.iter().enumerate().take(n + 1) {
            acc += coef * x[n - k];
        }
        for (k, coef) in a.iter().enumerate().skip(1).take(n) {
            acc -= coef * y[n - k];
        }
        y[n] = acc / a0;
    }
    y
}

/// Impulse response of `1/A(z)` must not grow.
fn is_stable(a: &[f64]) -> bool {
    const SPAN: usize = 4096;
    let mut impulse = vec![0.0; SPAN];
    impulse[0] = 1.0;
    let response = lfilter(&[1.0], a, &impulse);
    if response.iter().any(|v| !v.is_finite()) {
        return false;
    }
    let peak = |values: &[f64]| values.iter().fold(0.0f64, |acc, v| acc.max(v.abs()));
    peak(&response[SPAN - 512..]) <= peak(&response[..512]).max(1.0)
}

fn detect_line_frequencies(data: &Array2<f32>, sfreq: f64, p_value: f64) -> Vec<f64> {
    let nyquist = sfreq / 2.0;
    let spectrum = match welch(data.view(), sfreq) {
        Some(spectrum) => spectrum,
        None => return Vec::new(),
    };

    let mut best: Option<(f64, Vec<f64>)> = None;
    for base in LINE_FREQUENCIES {
        let harmonics: Vec<f64> = (1..)
            .map(|k| base * k as f64)
            .take_while(|freq| *freq < nyquist - 1.0)
            .collect();
        if harmonics.is_empty() {
            continue;
        }
        let score = harmonics
            .iter()
            .filter_map(|&freq| {
                let peak = spectrum.power_at(freq)?;
                let mut neighbours: Vec<f64> = spectrum
                    .freqs
                    .iter()
                    .zip(spectrum.power.iter())
                    .filter(|(f, _)| (**f - freq).abs() > 1.0 && (**f - freq).abs() <= 5.0)
                    .map(|(_, p)| *p)
                    .collect();
                if neighbours.is_empty() {
                    return None;
                }
                neighbours.sort_by(|a, b| a.total_cmp(b));
                let median = neighbours[neighbours.len() / 2];
                (median > 0.0).then(|| peak / median)
            })
            .fold(0.0, f64::max);
        if best.as_ref().map_or(true, |(best_score, _)| score > *best_score) {
            best = Some((score, harmonics));
        }
    }

    match best {
        Some((score, harmonics)) if score > 1.0 / p_value => harmonics,
        _ => Vec::new(),
    }
}

/// Per-side padding: room for at least 1/8 of the signal (capped at 100
/// samples per side), rounded up to a power-of-two total.
fn auto_npad(n_times: usize) -> usize {
    let min_add = (n_times / 8).min(100) * 2;
    let total = (n_times + min_add).max(1).next_power_of_two();
    (total - n_times) / 2
}

fn spectral_window(window: ResampleWindow, keep: usize) -> Vec<f64> {
    let half = keep / 2 + 1;
    (0..half)
        .map(|k| {
            let x = PI * k as f64 / half as f64;
            match window {
                ResampleWindow::Boxcar => 1.0,
                ResampleWindow::Hann => 0.5 + 0.5 * x.cos(),
                ResampleWindow::Hamming => 0.54 + 0.46 * x.cos(),
                ResampleWindow::Blackman => 0.42 + 0.5 * x.cos() + 0.08 * (2.0 * x).cos(),
            }
        })
        .collect()
}

/// Copies the lowest `keep` bins of `spectrum` onto a grid of `len` bins.
fn move_spectrum(spectrum: &[Complex64], len: usize, keep: usize, taper: &[f64]) -> Vec<Complex64> {
    let source_len = spectrum.len();
    let mut moved = vec![Complex64::new(0.0, 0.0); len];
    for k in 0..(keep + 1) / 2 {
        moved[k] = spectrum[k] * taper[k];
    }
    for k in 1..=keep / 2 {
        moved[len - k] = spectrum[source_len - k] * taper[k];
    }
    moved
}

fn resample_stim(samples: &[f64], n_new: usize, ratio: f64) -> Vec<f64> {
    let n_times = samples.len();
    if n_times == 0 {
        return vec![0.0; n_new];
    }
    let mut out: Vec<f64> = (0..n_new)
        .map(|j| samples[((j as f64 / ratio).floor() as usize).min(n_times - 1)])
        .collect();
    // every trigger onset survives, even when the pulse is shorter than one
    // output sample
    for i in 0..n_times {
        let onset = samples[i] != 0.0 && (i == 0 || samples[i - 1] != samples[i]);
        if onset && n_new > 0 {
            out[rescale_sample(i, ratio).min(n_new - 1)] = samples[i];
        }
    }
    out
}

fn row_to_f64(row: ArrayView1<f32>) -> Vec<f64> {
    row.iter().map(|&v| v as f64).collect()
}

fn ensure_finite(data: &Array2<f32>) -> Result<(), EngineError> {
    if data.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(EngineError::NumericalInstability(
            "engine produced non-finite samples".into(),
        ))
    }
}
