use crate::config::{FilterBand, FilterConfig, NotchConfig, ResampleConfig, ResolvedConfig};
use crate::engine::DspEngine;
use crate::math::grid::rescale_index;
use crate::processing::runner::{StageRequest, StageRunner};
use crate::recording::{ChannelType, Recording};
use crate::report::{
    PipelineReport, RecordingSummary, ReportAccumulator, StageReport, StageScope,
};
use crate::segment::SegmentPartitioner;
use crate::selection::{ChannelSelection, ChannelSelector, ChannelSpec};
use crate::telemetry::{LogManager, MetricsRecorder};
use crate::{FilterError, FilterResult, StageKind};
use ndarray::{s, Array2, Array3};
use serde::{Deserialize, Serialize};

/// Position of a run in the fixed filter → notch → resample sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Start,
    Filtering,
    Notching,
    Resampling,
    Done,
    Failed,
}

impl PipelineState {
    /// Successor state on success. Disabled stages are skipped; terminal
    /// states are absorbing.
    pub fn next(self, config: &ResolvedConfig) -> PipelineState {
        let after_filter = || {
            if config.notch.is_some() {
                PipelineState::Notching
            } else {
                after_notch(config)
            }
        };
        match self {
            PipelineState::Start => PipelineState::Filtering,
            PipelineState::Filtering => after_filter(),
            PipelineState::Notching => after_notch(config),
            PipelineState::Resampling | PipelineState::Done => PipelineState::Done,
            PipelineState::Failed => PipelineState::Failed,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Failed)
    }
}

fn after_notch(config: &ResolvedConfig) -> PipelineState {
    if config.resample.is_some() {
        PipelineState::Resampling
    } else {
        PipelineState::Done
    }
}

/// Output of a successful run.
#[derive(Debug, Clone)]
pub struct PipelineResult {
    pub recording: Recording,
    /// `resample_events` relocated onto the new sample grid.
    pub events: Option<Vec<[i64; 3]>>,
    pub report: PipelineReport,
}

impl PipelineResult {
    pub fn stage_reports(&self) -> &[StageReport] {
        &self.report.stage_reports
    }
}

/// Channel selections of every enabled stage, resolved against the
/// recording before any engine call.
struct StageSelections {
    filter: ChannelSelection,
    notch: Option<ChannelSelection>,
    stim_rows: Vec<usize>,
}

impl StageSelections {
    fn resolve(recording: &Recording, config: &ResolvedConfig) -> FilterResult<Self> {
        let channels = recording.channels();
        let filter = ChannelSelector::select(channels, &config.filter.picks)?;
        let notch = config
            .notch
            .as_ref()
            .map(|notch| ChannelSelector::select(channels, &notch.picks))
            .transpose()?;
        let stim_rows = match config.resample.as_ref().and_then(|r| r.stim_picks.as_ref()) {
            Some(spec) => ChannelSelector::select(channels, &ChannelSpec::ByIndex(spec.clone()))?
                .indices()
                .to_vec(),
            None => channels
                .iter()
                .enumerate()
                .filter(|(_, channel)| channel.kind == ChannelType::Stim)
                .map(|(row, _)| row)
                .collect(),
        };
        Ok(Self {
            filter,
            notch,
            stim_rows,
        })
    }
}

/// Drives one recording through the enabled stages. The recording is owned
/// by the run; on failure it is dropped together with any partial output.
pub struct PipelineOrchestrator<'e, E: DspEngine + ?Sized> {
    engine: &'e E,
    state: PipelineState,
    accumulator: ReportAccumulator,
    metrics: MetricsRecorder,
    logger: LogManager,
}

impl<'e, E: DspEngine + ?Sized> PipelineOrchestrator<'e, E> {
    pub fn new(engine: &'e E) -> Self {
        Self {
            engine,
            state: PipelineState::Start,
            accumulator: ReportAccumulator::new(),
            metrics: MetricsRecorder::new(),
            logger: LogManager::new("orchestrator"),
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn run(&mut self, recording: Recording, config: &ResolvedConfig) -> FilterResult<PipelineResult> {
        self.state = PipelineState::Start;
        self.accumulator = ReportAccumulator::new();
        self.metrics = MetricsRecorder::new();

        match self.drive(recording, config) {
            Ok(result) => Ok(result),
            Err(err) => {
                self.state = PipelineState::Failed;
                self.logger.warn(&format!("pipeline failed: {}", err));
                Err(err)
            }
        }
    }

    fn drive(&mut self, mut recording: Recording, config: &ResolvedConfig) -> FilterResult<PipelineResult> {
        recording.validate()?;
        if config.epoched != recording.is_epoched() {
            return Err(FilterError::Configuration(
                "resolved configuration does not match the recording modality".into(),
            ));
        }
        for warning in &config.warnings {
            self.logger.warn(&warning.message);
            self.accumulator.warn(warning.clone());
        }

        let selections = StageSelections::resolve(&recording, config)?;

        let before = RecordingSummary::capture(&recording, "before");
        let mut events = None;
        loop {
            self.state = self.state.next(config);
            match self.state {
                PipelineState::Filtering => {
                    self.filter_stage(&mut recording, &config.filter, &selections.filter)?
                }
                PipelineState::Notching => {
                    if let (Some(notch), Some(selection)) = (&config.notch, &selections.notch) {
                        self.notch_stage(&mut recording, notch, selection)?;
                    }
                }
                PipelineState::Resampling => {
                    if let Some(resample) = &config.resample {
                        events =
                            self.resample_stage(&mut recording, resample, &selections.stim_rows)?;
                    }
                }
                PipelineState::Start | PipelineState::Done | PipelineState::Failed => break,
            }
        }

        let after = RecordingSummary::capture(&recording, "after");
        let accumulator = std::mem::take(&mut self.accumulator);
        let report = PipelineReport::assemble(before, after, config, accumulator, self.metrics.snapshot());
        self.logger.record(&format!(
            "pipeline done with {} stage reports",
            report.stage_reports.len()
        ));
        Ok(PipelineResult {
            recording,
            events,
            report,
        })
    }

    fn filter_stage(
        &mut self,
        recording: &mut Recording,
        config: &FilterConfig,
        selection: &ChannelSelection,
    ) -> FilterResult<()> {
        if config.band.is_identity() {
            self.logger.record("no filter band configured; passing data through");
            self.accumulator
                .push(StageRunner::<E>::passthrough(StageKind::Filter, config));
            return Ok(());
        }

        self.logger.record(&config.band.summary());
        self.apply(
            recording,
            StageRequest::Filter(config),
            selection,
            &config.skip_by_annotation,
        )?;

        match config.band {
            FilterBand::Highpass { l_freq } => recording.record_highpass(l_freq),
            FilterBand::Lowpass { h_freq } => recording.record_lowpass(h_freq),
            FilterBand::Bandpass { l_freq, h_freq } => {
                recording.record_highpass(l_freq);
                recording.record_lowpass(h_freq);
            }
            FilterBand::Bandstop { .. } | FilterBand::Identity => {}
        }
        Ok(())
    }

    fn notch_stage(
        &mut self,
        recording: &mut Recording,
        config: &NotchConfig,
        selection: &ChannelSelection,
    ) -> FilterResult<()> {
        self.logger
            .record(&format!("notch filter at {}", config.summary()));
        self.apply(
            recording,
            StageRequest::Notch(config),
            selection,
            &config.skip_by_annotation,
        )
    }

    /// Runs a row-preserving stage on every keep segment (continuous) or
    /// every trial (epoched), in order.
    fn apply(
        &mut self,
        recording: &mut Recording,
        request: StageRequest<'_>,
        selection: &ChannelSelection,
        skip_by_annotation: &[String],
    ) -> FilterResult<()> {
        let runner = StageRunner::new(self.engine, &self.metrics);
        match recording {
            Recording::Continuous(handle) => {
                let segments = SegmentPartitioner::new(skip_by_annotation.to_vec())
                    .partition(handle.n_times(), &handle.annotations);
                let skipped = segments.iter().filter(|segment| !segment.is_keep()).count();
                if skipped > 0 {
                    self.logger.detail(&format!(
                        "{}: {} annotated spans left untouched",
                        request.kind(),
                        skipped
                    ));
                }
                for segment in segments.iter().filter(|segment| segment.is_keep()) {
                    let view = handle.data.slice_mut(s![.., segment.range()]);
                    let scope = StageScope::Segment {
                        start: segment.start,
                        end: segment.end,
                    };
                    let report = runner.run(request, view, handle.sfreq, selection, scope)?;
                    self.accumulator.push(report);
                }
            }
            Recording::Epoched(handle) => {
                let sfreq = handle.sfreq;
                for (index, trial) in handle.data.outer_iter_mut().enumerate() {
                    let report =
                        runner.run(request, trial, sfreq, selection, StageScope::Trial { index })?;
                    self.accumulator.push(report);
                }
            }
        }
        Ok(())
    }

    fn resample_stage(
        &mut self,
        recording: &mut Recording,
        config: &ResampleConfig,
        stim_rows: &[usize],
    ) -> FilterResult<Option<Vec<[i64; 3]>>> {
        let ratio = config.target_sfreq / recording.sfreq();
        self.logger.record(&config.summary());

        let runner = StageRunner::new(self.engine, &self.metrics);
        match recording {
            Recording::Continuous(handle) => {
                let data = std::mem::replace(&mut handle.data, Array2::zeros((0, 0)));
                let (data, report) =
                    runner.resample(data, handle.sfreq, config, stim_rows, StageScope::Recording)?;
                self.accumulator.push(report);
                handle.data = data;
                handle.sfreq = config.target_sfreq;
                handle.annotations = handle
                    .annotations
                    .iter()
                    .map(|annotation| annotation.rescaled(ratio))
                    .collect();
            }
            Recording::Epoched(handle) => {
                let mut trials = Vec::with_capacity(handle.n_trials());
                for (index, trial) in handle.data.outer_iter().enumerate() {
                    let (data, report) = runner.resample(
                        trial.to_owned(),
                        handle.sfreq,
                        config,
                        stim_rows,
                        StageScope::Trial { index },
                    )?;
                    self.accumulator.push(report);
                    trials.push(data);
                }
                handle.data = stack_trials(&trials, handle.channels.len());
                handle.sfreq = config.target_sfreq;
                for event in handle.events.iter_mut() {
                    event.sample = rescale_index(event.sample, ratio);
                }
            }
        }
        recording.record_lowpass(config.target_sfreq / 2.0);

        Ok(config.events.as_ref().map(|events| {
            events
                .iter()
                .map(|[sample, previous, id]| [rescale_index(*sample, ratio), *previous, *id])
                .collect()
        }))
    }
}

fn stack_trials(trials: &[Array2<f32>], n_channels: usize) -> Array3<f32> {
    let n_times = trials.first().map_or(0, |trial| trial.ncols());
    let mut stacked = Array3::zeros((trials.len(), n_channels, n_times));
    for (mut slot, trial) in stacked.outer_iter_mut().zip(trials) {
        slot.assign(trial);
    }
    stacked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ParameterResolver, RawConfig, Tunable};
    use crate::engine::{EngineDiagnostics, EngineError, EngineOutput, EngineResult, FftEngine};
    use crate::processing::process;
    use crate::recording::{Annotation, ChannelInfo, EpochEvent, EpochedHandle, RecordingHandle};
    use crate::report::SUCCESS_MESSAGE;
    use std::cell::RefCell;

    /// Adds a per-stage offset to every sample it receives and logs each
    /// call as `(stage, rows, samples)`.
    #[derive(Default)]
    struct Recorder {
        calls: RefCell<Vec<(StageKind, usize, usize)>>,
        fail_on: Option<StageKind>,
    }

    impl Recorder {
        fn failing(stage: StageKind) -> Self {
            Self {
                fail_on: Some(stage),
                ..Default::default()
            }
        }

        fn log(&self, stage: StageKind, data: &Array2<f32>) -> Result<(), EngineError> {
            self.calls
                .borrow_mut()
                .push((stage, data.nrows(), data.ncols()));
            if self.fail_on == Some(stage) {
                return Err(EngineError::FilterDesign(format!("{} refused", stage)));
            }
            Ok(())
        }

        fn calls(&self) -> Vec<(StageKind, usize, usize)> {
            self.calls.borrow().clone()
        }
    }

    impl DspEngine for Recorder {
        fn filter(&self, data: Array2<f32>, _: f64, _: &FilterConfig) -> EngineResult {
            self.log(StageKind::Filter, &data)?;
            Ok(EngineOutput {
                data: data + 1.0,
                diagnostics: EngineDiagnostics::default(),
            })
        }

        fn notch(&self, data: Array2<f32>, _: f64, config: &NotchConfig) -> EngineResult {
            self.log(StageKind::Notch, &data)?;
            Ok(EngineOutput {
                data: data + 10.0,
                diagnostics: EngineDiagnostics {
                    rejected_frequencies: config.freqs.explicit().cloned().unwrap_or_default(),
                    ..Default::default()
                },
            })
        }

        fn resample(
            &self,
            data: Array2<f32>,
            sfreq: f64,
            config: &ResampleConfig,
            _: &[usize],
        ) -> EngineResult {
            self.log(StageKind::Resample, &data)?;
            let step = (sfreq / config.target_sfreq).round() as usize;
            Ok(EngineOutput {
                data: data.slice(s![.., ..;step]).to_owned(),
                diagnostics: EngineDiagnostics::default(),
            })
        }
    }

    fn channels() -> Vec<ChannelInfo> {
        vec![
            ChannelInfo::new("MEG0111", ChannelType::Mag),
            ChannelInfo::new("MEG0112", ChannelType::Grad),
            ChannelInfo::new("EEG001", ChannelType::Eeg),
            ChannelInfo::new("STI014", ChannelType::Stim),
        ]
    }

    fn continuous(n_times: usize) -> Recording {
        let data = Array2::from_shape_fn((4, n_times), |(row, t)| (row * 7 + t % 13) as f32 * 0.5);
        let handle = RecordingHandle::new(1000.0, channels(), data)
            .unwrap()
            .with_annotations(vec![Annotation::new("edge", 100, 100)]);
        Recording::Continuous(handle)
    }

    fn zeros(n_times: usize) -> Recording {
        let handle = RecordingHandle::new(1000.0, channels(), Array2::zeros((4, n_times)))
            .unwrap()
            .with_annotations(vec![Annotation::new("edge", 100, 100)]);
        Recording::Continuous(handle)
    }

    fn epoched(n_trials: usize) -> Recording {
        let data = ndarray::Array3::from_shape_fn((n_trials, 4, 200), |(trial, row, t)| {
            ((trial + 1) * (row + 3) * (t % 11)) as f32 * 0.25
        });
        let events = (0..n_trials)
            .map(|trial| EpochEvent {
                sample: 1000 * (trial as i64 + 1),
                id: 1,
            })
            .collect();
        Recording::Epoched(EpochedHandle::new(1000.0, channels(), data, events).unwrap())
    }

    fn resolve(raw: &str, recording: &Recording) -> ResolvedConfig {
        let raw = RawConfig::from_json_str(raw).unwrap();
        ParameterResolver::for_recording(recording).resolve(&raw).unwrap()
    }

    fn continuous_data(recording: &Recording) -> &Array2<f32> {
        match recording {
            Recording::Continuous(handle) => &handle.data,
            Recording::Epoched(_) => panic!("expected continuous data"),
        }
    }

    #[test]
    fn state_sequence_skips_disabled_stages() {
        let rec = zeros(1000);
        let filter_only = resolve(r#"{"h_freq": 40.0}"#, &rec);
        assert_eq!(PipelineState::Start.next(&filter_only), PipelineState::Filtering);
        assert_eq!(PipelineState::Filtering.next(&filter_only), PipelineState::Done);

        let with_resample = resolve(
            r#"{"h_freq": 40.0, "apply_resample": true, "target_sfreq": 250.0}"#,
            &rec,
        );
        assert_eq!(
            PipelineState::Filtering.next(&with_resample),
            PipelineState::Resampling
        );
        assert_eq!(PipelineState::Resampling.next(&with_resample), PipelineState::Done);

        let everything = resolve(
            r#"{"h_freq": 40.0, "apply_notch": true, "notch_freqs": {"start": 50, "end": 200, "step": 50},
                "apply_resample": true, "target_sfreq": 250.0}"#,
            &rec,
        );
        assert_eq!(PipelineState::Filtering.next(&everything), PipelineState::Notching);
        assert_eq!(PipelineState::Notching.next(&everything), PipelineState::Resampling);
        assert_eq!(PipelineState::Failed.next(&everything), PipelineState::Failed);
        assert!(PipelineState::Done.next(&everything).is_terminal());
    }

    #[test]
    fn full_pipeline_at_1000hz_down_to_250hz() {
        let rec = zeros(1000);
        let config = resolve(
            r#"{"l_freq": 1.0, "h_freq": 40.0,
                "apply_notch": true, "notch_freqs": {"start": 50, "end": 200, "step": 50},
                "apply_resample": true, "target_sfreq": 250.0}"#,
            &rec,
        );
        assert_eq!(
            config.notch.as_ref().unwrap().freqs,
            Tunable::Explicit(vec![50.0, 100.0, 150.0])
        );

        let engine = Recorder::default();
        let mut orchestrator = PipelineOrchestrator::new(&engine);
        let result = orchestrator.run(rec, &config).unwrap();
        assert_eq!(orchestrator.state(), PipelineState::Done);

        assert_eq!(
            engine.calls(),
            vec![
                (StageKind::Filter, 3, 100),
                (StageKind::Filter, 3, 800),
                (StageKind::Notch, 3, 100),
                (StageKind::Notch, 3, 800),
                (StageKind::Resample, 4, 1000),
            ]
        );

        let scopes: Vec<StageScope> = result.stage_reports().iter().map(|r| r.scope).collect();
        assert_eq!(scopes[0], StageScope::Segment { start: 0, end: 100 });
        assert_eq!(scopes[1], StageScope::Segment { start: 200, end: 1000 });
        assert_eq!(scopes[4], StageScope::Recording);
        assert_eq!(
            result.stage_reports()[2].diagnostics.rejected_frequencies,
            vec![50.0, 100.0, 150.0]
        );

        let handle = match &result.recording {
            Recording::Continuous(handle) => handle,
            Recording::Epoched(_) => panic!("expected continuous data"),
        };
        assert_eq!(handle.sfreq, 250.0);
        assert_eq!(handle.n_times(), 250);
        assert_eq!(handle.annotations, vec![Annotation::new("edge", 25, 25)]);
        assert_eq!(handle.highpass, 1.0);
        assert_eq!(handle.lowpass, Some(40.0));

        let meg = handle.data.row(0);
        assert!(meg.slice(s![..25]).iter().all(|v| *v == 11.0));
        assert!(meg.slice(s![25..50]).iter().all(|v| *v == 0.0));
        assert!(meg.slice(s![50..]).iter().all(|v| *v == 11.0));
        assert!(handle.data.row(3).iter().all(|v| *v == 0.0));

        let last = result.report.product.last().unwrap();
        assert_eq!(last.msg, SUCCESS_MESSAGE);
        assert_eq!(result.report.metrics.filter_invocations, 2);
        assert_eq!(result.report.metrics.resample_invocations, 1);
    }

    #[test]
    fn disabled_stages_pass_data_through() {
        let rec = continuous(500);
        let original = continuous_data(&rec).clone();
        let config = resolve("{}", &rec);

        let engine = Recorder::default();
        let result = PipelineOrchestrator::new(&engine).run(rec, &config).unwrap();
        assert!(engine.calls().is_empty());
        assert_eq!(continuous_data(&result.recording), &original);
        assert_eq!(result.stage_reports().len(), 1);
        assert_eq!(result.stage_reports()[0].scope, StageScope::Passthrough);
        assert_eq!(result.events, None);
    }

    #[test]
    fn identity_filter_leaves_epoched_data_bit_equal() {
        let rec = epoched(3);
        let original = rec.clone();
        let config = resolve(r#"{"epoched_data": true}"#, &rec);

        let engine = Recorder::default();
        let result = PipelineOrchestrator::new(&engine).run(rec, &config).unwrap();
        assert!(engine.calls().is_empty());
        assert_eq!(result.recording, original);
    }

    #[test]
    fn epoched_stages_run_once_per_trial() {
        let rec = epoched(3);
        let config = resolve(
            r#"{"epoched_data": true, "h_freq": 40.0, "apply_resample": true, "target_sfreq": 250.0}"#,
            &rec,
        );
        let engine = Recorder::default();
        let result = PipelineOrchestrator::new(&engine).run(rec, &config).unwrap();

        let calls = engine.calls();
        assert_eq!(calls.len(), 6);
        assert!(calls[..3].iter().all(|call| *call == (StageKind::Filter, 3, 200)));
        assert!(calls[3..].iter().all(|call| *call == (StageKind::Resample, 4, 200)));
        assert_eq!(
            result.stage_reports()[1].scope,
            StageScope::Trial { index: 1 }
        );

        match &result.recording {
            Recording::Epoched(handle) => {
                assert_eq!(handle.data.dim(), (3, 4, 50));
                assert_eq!(handle.sfreq, 250.0);
                let samples: Vec<i64> = handle.events.iter().map(|e| e.sample).collect();
                assert_eq!(samples, vec![250, 500, 750]);
            }
            Recording::Continuous(_) => panic!("expected epoched data"),
        }
    }

    #[test]
    fn skip_segments_are_bit_identical() {
        let rec = continuous(1000);
        let original = continuous_data(&rec).clone();
        let config = resolve(r#"{"l_freq": 1.0, "h_freq": 40.0}"#, &rec);

        let engine = Recorder::default();
        let result = PipelineOrchestrator::new(&engine).run(rec, &config).unwrap();
        let data = continuous_data(&result.recording);
        assert_eq!(data.slice(s![.., 100..200]), original.slice(s![.., 100..200]));
        assert_eq!(data.row(3), original.row(3));
        assert_eq!(data[[0, 0]], original[[0, 0]] + 1.0);
        assert_eq!(data[[2, 999]], original[[2, 999]] + 1.0);
    }

    #[test]
    fn events_follow_the_resample_ratio() {
        let rec = zeros(1000);
        let config = resolve(
            r#"{"apply_resample": true, "target_sfreq": 250.0,
                "resample_events": [[100, 0, 1], [503, 0, 2], [998, 0, 3]]}"#,
            &rec,
        );
        let engine = Recorder::default();
        let result = PipelineOrchestrator::new(&engine).run(rec, &config).unwrap();

        assert_eq!(
            result.stage_reports().last().unwrap().diagnostics.resample_ratio,
            Some(0.25)
        );
        assert_eq!(result.recording.n_times(), 250);
        let events = result.events.unwrap();
        assert_eq!(events, vec![[25, 0, 1], [126, 0, 2], [250, 0, 3]]);
    }

    #[test]
    fn engine_failure_drops_output_and_fails_the_run() {
        let rec = zeros(1000);
        let config = resolve(
            r#"{"h_freq": 40.0, "apply_notch": true, "notch_freqs": {"start": 50, "end": 100, "step": 50}}"#,
            &rec,
        );
        let engine = Recorder::failing(StageKind::Notch);
        let mut orchestrator = PipelineOrchestrator::new(&engine);
        let err = orchestrator.run(rec, &config).unwrap_err();
        assert!(matches!(err, FilterError::FilterDesign(_)));
        assert_eq!(orchestrator.state(), PipelineState::Failed);
        // the first notch call failed, so the second keep segment was never sent
        assert_eq!(engine.calls().len(), 3);
    }

    #[test]
    fn out_of_range_picks_fail_even_without_a_filter_band() {
        let rec = zeros(1000);
        let config = resolve(r#"{"picks_by_index": [99]}"#, &rec);
        let engine = Recorder::default();
        let mut orchestrator = PipelineOrchestrator::new(&engine);
        let err = orchestrator.run(rec, &config).unwrap_err();
        assert!(matches!(err, FilterError::ChannelIndex(_)));
        assert_eq!(orchestrator.state(), PipelineState::Failed);
    }

    #[test]
    fn later_stage_picks_are_checked_before_any_engine_call() {
        let rec = zeros(1000);
        let bad_notch = resolve(
            r#"{"l_freq": 1.0, "h_freq": 40.0, "apply_notch": true,
                "notch_freqs": {"start": 50, "end": 100, "step": 50},
                "notch_picks_by_index": [99]}"#,
            &rec,
        );
        let engine = Recorder::default();
        let err = PipelineOrchestrator::new(&engine)
            .run(rec.clone(), &bad_notch)
            .unwrap_err();
        assert!(matches!(err, FilterError::ChannelIndex(_)));
        assert!(engine.calls().is_empty());

        let bad_stim = resolve(
            r#"{"h_freq": 40.0, "apply_resample": true, "target_sfreq": 250.0,
                "resample_stim_picks": [-9]}"#,
            &rec,
        );
        let err = PipelineOrchestrator::new(&engine)
            .run(rec, &bad_stim)
            .unwrap_err();
        assert!(matches!(err, FilterError::ChannelIndex(_)));
        assert!(engine.calls().is_empty());
    }

    #[test]
    fn modality_mismatch_is_rejected() {
        let config = resolve("{}", &zeros(10));
        let engine = Recorder::default();
        let err = PipelineOrchestrator::new(&engine)
            .run(epoched(1), &config)
            .unwrap_err();
        assert!(matches!(err, FilterError::Configuration(_)));
    }

    #[test]
    fn reference_engine_runs_end_to_end() {
        let rec = continuous(2000);
        let raw = RawConfig::from_json_str(
            r#"{"l_freq": 1.0, "h_freq": 40.0,
                "apply_notch": true, "notch_freqs": {"start": 50, "end": 150, "step": 50},
                "apply_resample": true, "target_sfreq": 250.0}"#,
        )
        .unwrap();
        let result = process(rec, &raw, &FftEngine::new()).unwrap();
        assert_eq!(result.recording.sfreq(), 250.0);
        assert_eq!(result.recording.n_times(), 500);
        assert_eq!(result.report.summary.resample, "Data was resampled at 250Hz.");
    }
}
