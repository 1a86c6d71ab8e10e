//! Report payload assembled over one pipeline run.
//!
//! Stage reports are pushed in execution order and never edited afterwards.
//! The final [`PipelineReport`] adds the recording summary taken before and
//! after processing and the product log consumed by the platform.

use crate::config::ResolvedConfig;
use crate::engine::EngineDiagnostics;
use crate::math::psd::{welch, Spectrum};
use crate::math::stats::StatsHelper;
use crate::recording::Recording;
use crate::telemetry::MetricsSnapshot;
use crate::StageKind;
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};

pub const REPORT_TITLE: &str = "Temporal filtering";
pub const SUCCESS_MESSAGE: &str = "Filtering was applied successfully.";
const SNR_WINDOW_SECS: f64 = 10.0;

/// Non-fatal condition recorded while resolving or running the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportWarning {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<StageKind>,
    pub message: String,
}

impl ReportWarning {
    pub fn new(stage: StageKind, message: impl Into<String>) -> Self {
        Self {
            stage: Some(stage),
            message: message.into(),
        }
    }
}

/// Which part of the recording a stage report covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum StageScope {
    /// The stage was configured as a no-op; the engine was not called.
    Passthrough,
    Segment { start: usize, end: usize },
    Trial { index: usize },
    Recording,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageReport {
    pub stage: StageKind,
    #[serde(flatten)]
    pub scope: StageScope,
    pub channel_count: usize,
    pub parameters: serde_json::Value,
    pub diagnostics: EngineDiagnostics,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Append-only collector owned by one orchestrator run.
#[derive(Debug, Default)]
pub struct ReportAccumulator {
    reports: Vec<StageReport>,
    warnings: Vec<ReportWarning>,
}

impl ReportAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, report: StageReport) {
        for message in &report.warnings {
            self.warnings.push(ReportWarning::new(report.stage, message.clone()));
        }
        self.reports.push(report);
    }

    pub fn warn(&mut self, warning: ReportWarning) {
        self.warnings.push(warning);
    }

    pub fn reports(&self) -> &[StageReport] {
        &self.reports
    }

    pub fn warnings(&self) -> &[ReportWarning] {
        &self.warnings
    }

    pub fn into_parts(self) -> (Vec<StageReport>, Vec<ReportWarning>) {
        (self.reports, self.warnings)
    }
}

/// Acquisition facts shown at the top of the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub epoched: bool,
    pub n_channels: usize,
    pub n_times: usize,
    pub sfreq: f64,
    pub highpass: f64,
    pub lowpass: f64,
    pub bad_channels: Vec<String>,
}

impl RecordingInfo {
    pub fn capture(recording: &Recording) -> Self {
        Self {
            source: recording.source().map(str::to_string),
            epoched: recording.is_epoched(),
            n_channels: recording.channels().len(),
            n_times: recording.n_times(),
            sfreq: recording.sfreq(),
            highpass: recording.highpass(),
            lowpass: recording.lowpass(),
            bad_channels: recording.bad_channels(),
        }
    }
}

/// Frequency axis plus mean power across good data channels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FigurePayload {
    pub title: String,
    pub freqs: Vec<f64>,
    pub power: Vec<f64>,
}

impl FigurePayload {
    fn from_spectrum(title: impl Into<String>, spectrum: Spectrum) -> Self {
        Self {
            title: title.into(),
            freqs: spectrum.freqs,
            power: spectrum.power,
        }
    }
}

/// Info, SNR and PSD of a recording at one point in the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingSummary {
    pub info: RecordingInfo,
    pub snr: Option<f64>,
    pub psd: Option<FigurePayload>,
}

impl RecordingSummary {
    pub fn capture(recording: &Recording, label: &str) -> Self {
        Self {
            info: RecordingInfo::capture(recording),
            snr: signal_to_noise(recording),
            psd: power_spectrum(recording)
                .map(|spectrum| FigurePayload::from_spectrum(format!("PSD {}", label), spectrum)),
        }
    }
}

/// SNR over 10 s windows of the good MEG channels. Each trial counts as one
/// window for epoched data. Each window mean covers the whole window, not a
/// short epoch around its onset.
pub fn signal_to_noise(recording: &Recording) -> Option<f64> {
    let rows = good_rows(recording, |channel| channel.kind.is_meg());
    if rows.is_empty() {
        return None;
    }
    let window_means: Vec<f64> = match recording {
        Recording::Continuous(handle) => {
            let window = (SNR_WINDOW_SECS * handle.sfreq).round() as usize;
            let meg: Array2<f32> = handle.data.select(Axis(0), &rows);
            StatsHelper::window_means(meg.view(), window)
        }
        Recording::Epoched(handle) => handle
            .data
            .outer_iter()
            .filter_map(|trial| StatsHelper::mean_of(trial.select(Axis(0), &rows).view()))
            .collect(),
    };
    StatsHelper::snr(&window_means)
}

/// Welch PSD averaged over good data channels (and trials).
pub fn power_spectrum(recording: &Recording) -> Option<Spectrum> {
    let rows = good_rows(recording, |channel| channel.kind.is_data());
    if rows.is_empty() {
        return None;
    }
    match recording {
        Recording::Continuous(handle) => welch(handle.data.select(Axis(0), &rows).view(), handle.sfreq),
        Recording::Epoched(handle) => {
            let spectra: Vec<Spectrum> = handle
                .data
                .outer_iter()
                .filter_map(|trial| welch(trial.select(Axis(0), &rows).view(), handle.sfreq))
                .collect();
            Spectrum::average(&spectra)
        }
    }
}

fn good_rows(
    recording: &Recording,
    wanted: impl Fn(&crate::recording::ChannelInfo) -> bool,
) -> Vec<usize> {
    recording
        .channels()
        .iter()
        .enumerate()
        .filter(|(_, channel)| !channel.bad && wanted(channel))
        .map(|(row, _)| row)
        .collect()
}

/// One sentence per stage describing what was done.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilteringSummary {
    pub filter: String,
    pub notch: String,
    pub resample: String,
}

impl FilteringSummary {
    pub fn from_config(config: &ResolvedConfig) -> Self {
        Self {
            filter: config.filter.band.summary(),
            notch: config
                .notch
                .as_ref()
                .map(|notch| notch.summary())
                .unwrap_or_else(|| "No Notch filter was applied".to_string()),
            resample: config
                .resample
                .as_ref()
                .map(|resample| resample.summary())
                .unwrap_or_else(|| "Data was not resampled.".to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Info,
    Success,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductMessage {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub msg: String,
}

impl ProductMessage {
    pub fn new(kind: MessageKind, msg: impl Into<String>) -> Self {
        Self {
            kind,
            msg: msg.into(),
        }
    }
}

/// Structured payload for the rendered report and `product.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineReport {
    pub title: String,
    pub info: RecordingInfo,
    pub summary: FilteringSummary,
    pub snr_before: Option<f64>,
    pub snr_after: Option<f64>,
    pub psd_before: Option<FigurePayload>,
    pub psd_after: Option<FigurePayload>,
    pub stage_reports: Vec<StageReport>,
    pub warnings: Vec<ReportWarning>,
    pub metrics: MetricsSnapshot,
    pub product: Vec<ProductMessage>,
}

impl PipelineReport {
    pub fn assemble(
        before: RecordingSummary,
        after: RecordingSummary,
        config: &ResolvedConfig,
        accumulator: ReportAccumulator,
        metrics: MetricsSnapshot,
    ) -> Self {
        let summary = FilteringSummary::from_config(config);
        let (stage_reports, warnings) = accumulator.into_parts();

        let mut product = Vec::new();
        if !config.filter.band.is_identity() {
            product.push(ProductMessage::new(MessageKind::Info, summary.filter.clone()));
        }
        if config.notch.is_some() {
            product.push(ProductMessage::new(
                MessageKind::Info,
                format!("Notch filter was applied at {}", summary.notch),
            ));
        }
        if config.resample.is_some() {
            product.push(ProductMessage::new(MessageKind::Info, summary.resample.clone()));
        }
        product.extend(
            warnings
                .iter()
                .map(|warning| ProductMessage::new(MessageKind::Warning, warning.message.clone())),
        );
        product.push(ProductMessage::new(MessageKind::Success, SUCCESS_MESSAGE));

        Self {
            title: REPORT_TITLE.to_string(),
            info: before.info,
            summary,
            snr_before: before.snr,
            snr_after: after.snr,
            psd_before: before.psd,
            psd_after: after.psd,
            stage_reports,
            warnings,
            metrics,
            product,
        }
    }

    /// `{"brainlife": [...]}` document written next to the outputs.
    pub fn product_json(&self) -> serde_json::Value {
        serde_json::json!({ "brainlife": self.product })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ParameterResolver, RawConfig};
    use crate::recording::{ChannelInfo, ChannelType, RecordingHandle};

    fn recording(sfreq: f64, n_times: usize, kinds: &[ChannelType]) -> Recording {
        let channels = kinds
            .iter()
            .enumerate()
            .map(|(i, kind)| ChannelInfo::new(format!("CH{:03}", i), *kind))
            .collect();
        let data = Array2::from_shape_fn((kinds.len(), n_times), |(row, t)| {
            1.0 + row as f32 + ((t % 7) as f32) * 0.1
        });
        Recording::Continuous(RecordingHandle::new(sfreq, channels, data).unwrap())
    }

    fn resolved(raw: &str, recording: &Recording) -> ResolvedConfig {
        let raw = RawConfig::from_json_str(raw).unwrap();
        ParameterResolver::for_recording(recording).resolve(&raw).unwrap()
    }

    #[test]
    fn accumulator_lifts_stage_warnings() {
        let mut accumulator = ReportAccumulator::new();
        accumulator.push(StageReport {
            stage: StageKind::Notch,
            scope: StageScope::Segment { start: 0, end: 10 },
            channel_count: 2,
            parameters: serde_json::Value::Null,
            diagnostics: EngineDiagnostics::default(),
            warnings: vec!["filter longer than segment".into()],
        });
        accumulator.warn(ReportWarning {
            stage: None,
            message: "bad channel excluded".into(),
        });

        assert_eq!(accumulator.reports().len(), 1);
        assert_eq!(accumulator.warnings().len(), 2);
        assert_eq!(accumulator.warnings()[0].stage, Some(StageKind::Notch));
    }

    #[test]
    fn summaries_cover_disabled_stages() {
        let rec = recording(1000.0, 100, &[ChannelType::Mag]);
        let config = resolved(r#"{"l_freq": 1.0, "h_freq": 40.0}"#, &rec);
        let summary = FilteringSummary::from_config(&config);
        assert_eq!(summary.filter, "Data was filtered between 1 and 40Hz.");
        assert_eq!(summary.notch, "No Notch filter was applied");
        assert_eq!(summary.resample, "Data was not resampled.");
    }

    #[test]
    fn product_log_ends_with_success() {
        let rec = recording(1000.0, 100, &[ChannelType::Mag]);
        let config = resolved(
            r#"{"h_freq": 40.0, "apply_resample": true, "target_sfreq": 250.0}"#,
            &rec,
        );
        let mut accumulator = ReportAccumulator::new();
        accumulator.warn(ReportWarning {
            stage: None,
            message: "something odd".into(),
        });
        let report = PipelineReport::assemble(
            RecordingSummary::capture(&rec, "before"),
            RecordingSummary::capture(&rec, "after"),
            &config,
            accumulator,
            MetricsSnapshot::default(),
        );

        let kinds: Vec<MessageKind> = report.product.iter().map(|m| m.kind).collect();
        assert_eq!(
            kinds,
            vec![
                MessageKind::Info,
                MessageKind::Info,
                MessageKind::Warning,
                MessageKind::Success
            ]
        );
        let json = report.product_json();
        assert_eq!(json["brainlife"][3]["type"], "success");
        assert_eq!(json["brainlife"][3]["msg"], SUCCESS_MESSAGE);
    }

    #[test]
    fn snr_needs_meg_channels_and_two_windows() {
        let eeg_only = recording(100.0, 3000, &[ChannelType::Eeg]);
        assert_eq!(signal_to_noise(&eeg_only), None);

        let short = recording(100.0, 1500, &[ChannelType::Mag]);
        assert_eq!(signal_to_noise(&short), None);

        let long = recording(100.0, 3000, &[ChannelType::Grad, ChannelType::Eeg]);
        assert!(signal_to_noise(&long).map_or(false, |snr| snr > 0.0));
    }

    #[test]
    fn psd_excludes_bad_and_non_data_channels() {
        let mut rec = recording(100.0, 400, &[ChannelType::Eeg, ChannelType::Stim]);
        assert!(power_spectrum(&rec).is_some());
        if let Recording::Continuous(handle) = &mut rec {
            handle.channels[0].bad = true;
        }
        assert!(power_spectrum(&rec).is_none());
    }
}
