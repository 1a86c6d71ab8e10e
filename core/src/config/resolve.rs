use crate::config::raw::{
    RawConfig, RawFilterLength, RawIndexSpec, RawJobs, RawTunable, RawWidths,
};
use crate::config::stage::{
    FilterBand, FilterConfig, FilterLength, FilterMethod, FirDesign, FirWindow, IirParams,
    NotchConfig, NotchMethod, NotchWidths, Parallelism, Phase, ResampleConfig, ResampleWindow,
    Tunable,
};
use crate::math::pad::PadMode;
use crate::recording::Recording;
use crate::report::ReportWarning;
use crate::selection::{ChannelSpec, IndexSpec};
use crate::{FilterError, FilterResult, StageKind};
use serde::Serialize;

/// Annotation label prefixes skipped by default on continuous data.
pub const DEFAULT_SKIP_BY_ANNOTATION: [&str; 2] = ["edge", "bad_acq_skip"];

/// Upper bound on the expanded notch series.
pub const MAX_NOTCH_FREQUENCIES: usize = 4096;

/// Output of [`ParameterResolver::resolve`]: one bundle per enabled stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedConfig {
    pub epoched: bool,
    pub filter: FilterConfig,
    pub notch: Option<NotchConfig>,
    pub resample: Option<ResampleConfig>,
    pub warnings: Vec<ReportWarning>,
}

/// Validates a [`RawConfig`] against the recording it will be applied to and
/// replaces every default or `"auto"` value with a typed decision.
pub struct ParameterResolver {
    sfreq: f64,
    epoched: bool,
}

impl ParameterResolver {
    pub fn new(sfreq: f64, epoched: bool) -> Self {
        Self { sfreq, epoched }
    }

    pub fn for_recording(recording: &Recording) -> Self {
        Self::new(recording.sfreq(), recording.is_epoched())
    }

    pub fn nyquist(&self) -> f64 {
        self.sfreq / 2.0
    }

    pub fn resolve(&self, raw: &RawConfig) -> FilterResult<ResolvedConfig> {
        let requested_epoched = raw.epoched_data.unwrap_or(false);
        if requested_epoched != self.epoched {
            return Err(FilterError::Configuration(format!(
                "epoched_data is {} but the supplied recording is {}",
                requested_epoched,
                if self.epoched { "epoched" } else { "continuous" }
            )));
        }

        let mut warnings = Vec::new();
        let filter = self.resolve_filter(raw, &mut warnings)?;
        let notch = if raw.apply_notch.unwrap_or(false) {
            Some(self.resolve_notch(raw, &mut warnings)?)
        } else {
            None
        };
        let resample = if raw.apply_resample.unwrap_or(false) {
            Some(self.resolve_resample(raw, &filter, &mut warnings)?)
        } else {
            None
        };

        Ok(ResolvedConfig {
            epoched: self.epoched,
            filter,
            notch,
            resample,
            warnings,
        })
    }

    fn resolve_filter(
        &self,
        raw: &RawConfig,
        warnings: &mut Vec<ReportWarning>,
    ) -> FilterResult<FilterConfig> {
        let band = self.resolve_band(raw.l_freq, raw.h_freq)?;
        if band.is_identity() {
            warnings.push(ReportWarning::new(
                StageKind::Filter,
                "l_freq and h_freq are both unset; data passes through the filter stage unchanged",
            ));
        }

        let method = raw.method.unwrap_or(FilterMethod::Fir);
        let is_iir = method == FilterMethod::Iir;
        let phase = raw.phase.unwrap_or(Phase::Zero);
        check_phase("phase", is_iir, phase)?;

        Ok(FilterConfig {
            band,
            picks: ChannelSpec::from_parts(
                raw.picks_by_type_or_name.clone(),
                raw.picks_by_index.clone().map(index_spec),
            )?,
            filter_length: resolve_filter_length("filter_length", raw.filter_length.as_ref())?,
            l_trans_bandwidth: resolve_bandwidth(
                "l_trans_bandwidth",
                raw.l_trans_bandwidth.as_ref(),
            )?,
            h_trans_bandwidth: resolve_bandwidth(
                "h_trans_bandwidth",
                raw.h_trans_bandwidth.as_ref(),
            )?,
            n_jobs: resolve_jobs("n_jobs", raw.n_jobs.as_ref())?,
            method,
            iir_params: resolve_iir(
                StageKind::Filter,
                "",
                is_iir,
                !is_iir,
                raw.iir_params.as_ref(),
                raw.fir_window.is_some(),
                warnings,
            )?,
            phase,
            fir_window: raw.fir_window.unwrap_or(FirWindow::Hamming),
            fir_design: raw.fir_design.unwrap_or(FirDesign::Firwin),
            skip_by_annotation: self.resolve_skip(
                StageKind::Filter,
                "skip_by_annotation",
                raw.skip_by_annotation.as_ref(),
                warnings,
            ),
            pad: raw.pad.unwrap_or(PadMode::ReflectLimited),
        })
    }

    fn resolve_band(&self, l_freq: Option<f64>, h_freq: Option<f64>) -> FilterResult<FilterBand> {
        match (l_freq, h_freq) {
            (None, None) => Ok(FilterBand::Identity),
            (Some(l_freq), None) => {
                self.check_frequency("l_freq", l_freq)?;
                Ok(FilterBand::Highpass { l_freq })
            }
            (None, Some(h_freq)) => {
                self.check_frequency("h_freq", h_freq)?;
                Ok(FilterBand::Lowpass { h_freq })
            }
            (Some(l_freq), Some(h_freq)) => {
                self.check_frequency("l_freq", l_freq)?;
                self.check_frequency("h_freq", h_freq)?;
                if l_freq < h_freq {
                    Ok(FilterBand::Bandpass { l_freq, h_freq })
                } else if l_freq > h_freq {
                    Ok(FilterBand::Bandstop { l_freq, h_freq })
                } else {
                    Err(FilterError::InvalidFrequency(format!(
                        "l_freq and h_freq are both {}Hz",
                        l_freq
                    )))
                }
            }
        }
    }

    fn check_frequency(&self, key: &str, freq: f64) -> FilterResult<()> {
        if !freq.is_finite() || freq <= 0.0 {
            return Err(FilterError::InvalidFrequency(format!(
                "{} must be a positive frequency, got {}",
                key, freq
            )));
        }
        if freq >= self.nyquist() {
            return Err(FilterError::InvalidFrequency(format!(
                "{}={}Hz is at or above the Nyquist frequency ({}Hz)",
                key,
                freq,
                self.nyquist()
            )));
        }
        Ok(())
    }

    fn resolve_skip(
        &self,
        stage: StageKind,
        key: &str,
        supplied: Option<&Vec<String>>,
        warnings: &mut Vec<ReportWarning>,
    ) -> Vec<String> {
        match supplied {
            Some(prefixes) if self.epoched => {
                if !prefixes.is_empty() {
                    warnings.push(ReportWarning::new(
                        stage,
                        format!(
                            "{} {:?} does not apply to epoched data and was dropped",
                            key, prefixes
                        ),
                    ));
                }
                Vec::new()
            }
            Some(prefixes) => prefixes.clone(),
            None if self.epoched => Vec::new(),
            None => DEFAULT_SKIP_BY_ANNOTATION
                .iter()
                .map(|prefix| prefix.to_string())
                .collect(),
        }
    }

    fn resolve_notch(
        &self,
        raw: &RawConfig,
        warnings: &mut Vec<ReportWarning>,
    ) -> FilterResult<NotchConfig> {
        let method = raw.notch_method.unwrap_or(NotchMethod::Fir);
        let is_iir = method == NotchMethod::Iir;

        let freqs = match raw.notch_freqs {
            Some(series) => Tunable::Explicit(expand_notch_series(
                series.start,
                series.end,
                series.step,
                self.nyquist(),
            )?),
            None if method == NotchMethod::SpectrumFit => Tunable::DeferToEngine,
            None => {
                return Err(FilterError::Configuration(
                    "apply_notch requires notch_freqs {start, end, step}".into(),
                ))
            }
        };

        let widths = match &raw.notch_widths {
            None => Tunable::DeferToEngine,
            Some(RawWidths::Single(width)) => {
                Tunable::Explicit(NotchWidths::Uniform(positive("notch_widths", *width)?))
            }
            Some(RawWidths::Many(widths)) => {
                let expected = freqs.explicit().map(Vec::len).ok_or_else(|| {
                    FilterError::Configuration(
                        "per-frequency notch_widths need explicit notch_freqs".into(),
                    )
                })?;
                if widths.len() != expected {
                    return Err(FilterError::Configuration(format!(
                        "notch_widths has {} entries for {} notch frequencies",
                        widths.len(),
                        expected
                    )));
                }
                for width in widths {
                    positive("notch_widths", *width)?;
                }
                Tunable::Explicit(NotchWidths::PerFrequency(widths.clone()))
            }
        };

        let p_value = raw.notch_p_value.unwrap_or(0.05);
        if !(p_value > 0.0 && p_value < 1.0) {
            return Err(FilterError::Configuration(format!(
                "notch_p_value must lie in (0, 1), got {}",
                p_value
            )));
        }

        let phase = raw.notch_phase.unwrap_or(Phase::Zero);
        check_phase("notch_phase", is_iir, phase)?;

        Ok(NotchConfig {
            freqs,
            picks: ChannelSpec::from_parts(
                raw.notch_picks_by_type_or_name.clone(),
                raw.notch_picks_by_index.clone().map(index_spec),
            )?,
            filter_length: resolve_filter_length(
                "notch_filter_length",
                raw.notch_filter_length.as_ref(),
            )?,
            widths,
            trans_bandwidth: positive(
                "notch_trans_bandwidth",
                raw.notch_trans_bandwidth.unwrap_or(1.0),
            )?,
            n_jobs: resolve_jobs("notch_n_jobs", raw.notch_n_jobs.as_ref())?,
            method,
            iir_params: resolve_iir(
                StageKind::Notch,
                "notch_",
                is_iir,
                method == NotchMethod::Fir,
                raw.notch_iir_params.as_ref(),
                raw.notch_fir_window.is_some(),
                warnings,
            )?,
            mt_bandwidth: match raw.notch_mt_bandwidth {
                Some(bandwidth) => Tunable::Explicit(positive("notch_mt_bandwidth", bandwidth)?),
                None => Tunable::DeferToEngine,
            },
            p_value,
            phase,
            fir_window: raw.notch_fir_window.unwrap_or(FirWindow::Hamming),
            fir_design: raw.notch_fir_design.unwrap_or(FirDesign::Firwin),
            skip_by_annotation: self.resolve_skip(
                StageKind::Notch,
                "notch_skip_by_annotation",
                raw.notch_skip_by_annotation.as_ref(),
                warnings,
            ),
            pad: raw.notch_pad.unwrap_or(PadMode::ReflectLimited),
        })
    }

    fn resolve_resample(
        &self,
        raw: &RawConfig,
        filter: &FilterConfig,
        warnings: &mut Vec<ReportWarning>,
    ) -> FilterResult<ResampleConfig> {
        let target_sfreq = raw.target_sfreq.ok_or_else(|| {
            FilterError::Configuration("apply_resample requires target_sfreq".into())
        })?;
        if !target_sfreq.is_finite() || target_sfreq <= 0.0 {
            return Err(FilterError::Configuration(format!(
                "target_sfreq must be positive, got {}",
                target_sfreq
            )));
        }

        if target_sfreq > self.sfreq && !raw.resample_allow_upsampling.unwrap_or(true) {
            warnings.push(ReportWarning::new(
                StageKind::Resample,
                format!(
                    "target_sfreq {}Hz exceeds the current rate {}Hz although upsampling is disabled",
                    target_sfreq, self.sfreq
                ),
            ));
        }

        let new_nyquist = target_sfreq / 2.0;
        if let FilterBand::Lowpass { h_freq } | FilterBand::Bandpass { h_freq, .. } = filter.band {
            if h_freq >= new_nyquist {
                warnings.push(ReportWarning::new(
                    StageKind::Resample,
                    format!(
                        "lowpass edge {}Hz is not below the new Nyquist frequency {}Hz; aliasing may occur",
                        h_freq, new_nyquist
                    ),
                ));
            }
        }

        let npad = match &raw.resample_npad {
            None => Tunable::DeferToEngine,
            Some(RawTunable::Keyword(keyword)) if keyword == "auto" => Tunable::DeferToEngine,
            Some(RawTunable::Keyword(keyword)) => {
                return Err(FilterError::Configuration(format!(
                    "resample_npad must be an integer or 'auto', got '{}'",
                    keyword
                )))
            }
            Some(RawTunable::Value(npad)) if *npad >= 0 => Tunable::Explicit(*npad as usize),
            Some(RawTunable::Value(npad)) => {
                return Err(FilterError::Configuration(format!(
                    "resample_npad must not be negative, got {}",
                    npad
                )))
            }
        };

        let default_pad = if self.epoched {
            PadMode::Edge
        } else {
            PadMode::ReflectLimited
        };

        Ok(ResampleConfig {
            target_sfreq,
            npad,
            window: raw.resample_window.unwrap_or(ResampleWindow::Boxcar),
            stim_picks: raw.resample_stim_picks.clone().map(IndexSpec::Indices),
            n_jobs: resolve_jobs("resample_n_jobs", raw.resample_n_jobs.as_ref())?,
            events: raw.resample_events.clone(),
            pad: raw.resample_pad.unwrap_or(default_pad),
        })
    }
}

/// Expands `start..end` by `step` (end exclusive) into ascending, unique
/// notch targets, each strictly between 0 and `nyquist`.
pub fn expand_notch_series(start: f64, end: f64, step: f64, nyquist: f64) -> FilterResult<Vec<f64>> {
    if !(start.is_finite() && end.is_finite() && step.is_finite()) {
        return Err(FilterError::InvalidFrequency(
            "notch series bounds must be finite".into(),
        ));
    }
    if step <= 0.0 {
        return Err(FilterError::InvalidFrequency(format!(
            "notch step must be positive, got {}",
            step
        )));
    }
    if start >= end {
        return Err(FilterError::InvalidFrequency(format!(
            "notch start {} must be below end {}",
            start, end
        )));
    }

    let count = ((end - start) / step).ceil();
    let last = start + (count - 1.0) * step;
    if start <= 0.0 || last >= nyquist {
        return Err(FilterError::InvalidFrequency(format!(
            "notch series {}..{}Hz must lie strictly between 0 and Nyquist ({}Hz)",
            start, last, nyquist
        )));
    }
    if count > MAX_NOTCH_FREQUENCIES as f64 {
        return Err(FilterError::InvalidFrequency(format!(
            "notch step {} yields more than {} frequencies",
            step, MAX_NOTCH_FREQUENCIES
        )));
    }
    let count = count as usize;
    let mut freqs: Vec<f64> = (0..count).map(|i| start + i as f64 * step).collect();
    freqs.sort_by(|a, b| a.total_cmp(b));
    freqs.dedup_by(|a, b| (*a - *b).abs() < 1e-9);

    for freq in &freqs {
        if *freq <= 0.0 || *freq >= nyquist {
            return Err(FilterError::InvalidFrequency(format!(
                "notch frequency {}Hz must lie strictly between 0 and Nyquist ({}Hz)",
                freq, nyquist
            )));
        }
    }
    Ok(freqs)
}

fn index_spec(raw: RawIndexSpec) -> IndexSpec {
    match raw {
        RawIndexSpec::List(indices) => IndexSpec::Indices(indices),
        RawIndexSpec::Slice { start, stop, step } => IndexSpec::Slice { start, stop, step },
    }
}

fn positive(key: &str, value: f64) -> FilterResult<f64> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(FilterError::Configuration(format!(
            "{} must be positive, got {}",
            key, value
        )))
    }
}

fn check_phase(key: &str, is_iir: bool, phase: Phase) -> FilterResult<()> {
    if phase == Phase::Forward && !is_iir {
        return Err(FilterError::Configuration(format!(
            "{} 'forward' is only available with method 'iir'",
            key
        )));
    }
    Ok(())
}

fn resolve_bandwidth(key: &str, raw: Option<&RawTunable<f64>>) -> FilterResult<Tunable<f64>> {
    match raw {
        None => Ok(Tunable::DeferToEngine),
        Some(RawTunable::Keyword(keyword)) if keyword == "auto" => Ok(Tunable::DeferToEngine),
        Some(RawTunable::Keyword(keyword)) => Err(FilterError::Configuration(format!(
            "{} must be a number or 'auto', got '{}'",
            key, keyword
        ))),
        Some(RawTunable::Value(value)) => positive(key, *value).map(Tunable::Explicit),
    }
}

fn resolve_filter_length(
    key: &str,
    raw: Option<&RawFilterLength>,
) -> FilterResult<Tunable<FilterLength>> {
    match raw {
        None => Ok(Tunable::DeferToEngine),
        Some(RawFilterLength::Taps(taps)) if *taps > 0 => {
            Ok(Tunable::Explicit(FilterLength::Taps(*taps as usize)))
        }
        Some(RawFilterLength::Taps(taps)) => Err(FilterError::Configuration(format!(
            "{} must be positive, got {}",
            key, taps
        ))),
        Some(RawFilterLength::Text(text)) if text == "auto" => Ok(Tunable::DeferToEngine),
        Some(RawFilterLength::Text(text)) => parse_duration(text)
            .map(|secs| Tunable::Explicit(FilterLength::Seconds(secs)))
            .ok_or_else(|| {
                FilterError::Configuration(format!(
                    "{} must be 'auto', a tap count or a duration like '10s', got '{}'",
                    key, text
                ))
            }),
    }
}

fn parse_duration(text: &str) -> Option<f64> {
    let text = text.trim();
    let (number, scale) = if let Some(number) = text.strip_suffix("ms") {
        (number, 1e-3)
    } else if let Some(number) = text.strip_suffix('s') {
        (number, 1.0)
    } else {
        return None;
    };
    let value: f64 = number.trim().parse().ok()?;
    (value.is_finite() && value > 0.0).then_some(value * scale)
}

fn resolve_jobs(key: &str, raw: Option<&RawJobs>) -> FilterResult<Parallelism> {
    match raw {
        None => Ok(Parallelism::Workers(1)),
        Some(RawJobs::Count(-1)) => Ok(Parallelism::AllCores),
        Some(RawJobs::Count(count)) if *count >= 1 => Ok(Parallelism::Workers(*count as usize)),
        Some(RawJobs::Keyword(keyword)) if keyword == "cuda" => Ok(Parallelism::Cuda),
        Some(other) => Err(FilterError::Configuration(format!(
            "{} must be a positive integer, -1 or 'cuda', got {:?}",
            key, other
        ))),
    }
}

fn resolve_iir(
    stage: StageKind,
    prefix: &str,
    is_iir: bool,
    is_fir: bool,
    params: Option<&IirParams>,
    fir_window_supplied: bool,
    warnings: &mut Vec<ReportWarning>,
) -> FilterResult<Tunable<IirParams>> {
    if fir_window_supplied && !is_fir {
        warnings.push(ReportWarning::new(
            stage,
            format!("{}fir_window is ignored because the method is not fir", prefix),
        ));
    }

    let params = match params {
        Some(params) if !params.is_empty() => params,
        _ => return Ok(Tunable::DeferToEngine),
    };

    if !is_iir {
        warnings.push(ReportWarning::new(
            stage,
            format!("{}iir_params is ignored because the method is not iir", prefix),
        ));
        return Ok(Tunable::DeferToEngine);
    }

    let invalid = |reason: &str| -> FilterResult<Tunable<IirParams>> {
        Err(FilterError::Configuration(format!(
            "{}iir_params: {}",
            prefix, reason
        )))
    };
    if params.order == Some(0) {
        return invalid("order must be at least 1");
    }
    if params.b.is_some() != params.a.is_some() {
        return invalid("b and a must be supplied together");
    }
    if params.b.is_some() && params.sos.is_some() {
        return invalid("b/a and sos are mutually exclusive");
    }
    if let (Some(b), Some(a)) = (&params.b, &params.a) {
        if b.is_empty() || a.is_empty() || a[0] == 0.0 {
            return invalid("b must be non-empty and a must start with a non-zero coefficient");
        }
    }
    if params.rp.map_or(false, |rp| rp <= 0.0) || params.rs.map_or(false, |rs| rs <= 0.0) {
        return invalid("rp and rs must be positive");
    }
    Ok(Tunable::Explicit(params.clone()))
}
