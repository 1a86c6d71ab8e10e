use crate::config::{FilterConfig, NotchConfig, ResampleConfig};
use crate::engine::{DspEngine, EngineDiagnostics, EngineOutput};
use crate::math::grid::rescale_sample;
use crate::report::{StageReport, StageScope};
use crate::selection::ChannelSelection;
use crate::telemetry::{LogManager, MetricsRecorder};
use crate::{FilterError, FilterResult, StageKind};
use ndarray::{Array2, ArrayViewMut2, Axis};
use serde::Serialize;

/// A row-preserving stage handed to [`StageRunner::run`].
#[derive(Debug, Clone, Copy)]
pub enum StageRequest<'c> {
    Filter(&'c FilterConfig),
    Notch(&'c NotchConfig),
}

impl StageRequest<'_> {
    pub fn kind(&self) -> StageKind {
        match self {
            StageRequest::Filter(_) => StageKind::Filter,
            StageRequest::Notch(_) => StageKind::Notch,
        }
    }

    fn parameters(&self) -> serde_json::Value {
        match self {
            StageRequest::Filter(config) => parameters_of(config),
            StageRequest::Notch(config) => parameters_of(config),
        }
    }
}

fn parameters_of<T: Serialize>(config: &T) -> serde_json::Value {
    serde_json::to_value(config).unwrap_or(serde_json::Value::Null)
}

/// Applies one stage to one region (keep segment, trial or whole recording)
/// through the engine, touching only the selected rows.
pub struct StageRunner<'e, E: DspEngine + ?Sized> {
    engine: &'e E,
    metrics: &'e MetricsRecorder,
    logger: LogManager,
}

impl<'e, E: DspEngine + ?Sized> StageRunner<'e, E> {
    pub fn new(engine: &'e E, metrics: &'e MetricsRecorder) -> Self {
        Self {
            engine,
            metrics,
            logger: LogManager::new("stage-runner"),
        }
    }

    /// Report for a stage configured as a no-op; the engine is not called.
    pub fn passthrough<T: Serialize>(stage: StageKind, config: &T) -> StageReport {
        StageReport {
            stage,
            scope: StageScope::Passthrough,
            channel_count: 0,
            parameters: parameters_of(config),
            diagnostics: EngineDiagnostics::default(),
            warnings: Vec::new(),
        }
    }

    /// Runs `request` on the selected rows of `view` and writes the result
    /// back in place. Unselected rows are never read or written.
    pub fn run(
        &self,
        request: StageRequest<'_>,
        mut view: ArrayViewMut2<'_, f32>,
        sfreq: f64,
        selection: &ChannelSelection,
        scope: StageScope,
    ) -> FilterResult<StageReport> {
        let stage = request.kind();
        if selection.is_empty() {
            return Ok(StageReport {
                stage,
                scope,
                channel_count: 0,
                parameters: request.parameters(),
                diagnostics: EngineDiagnostics::default(),
                warnings: vec![format!("no channels selected for the {} stage", stage)],
            });
        }

        let block = view.select(Axis(0), selection.indices());
        let expected = block.dim();
        let result = match request {
            StageRequest::Filter(config) => self.engine.filter(block, sfreq, config),
            StageRequest::Notch(config) => self.engine.notch(block, sfreq, config),
        };
        let output = self.checked(stage, result.map_err(FilterError::from), expected)?;

        for (source, &row) in output.data.outer_iter().zip(selection.indices()) {
            view.row_mut(row).assign(&source);
        }
        self.logger.detail(&format!(
            "{} applied to {} rows over {:?}",
            stage,
            selection.len(),
            scope
        ));
        Ok(report(stage, scope, selection.len(), request.parameters(), output.diagnostics))
    }

    /// Resamples every row of `data`; the sample count changes by the rate
    /// ratio and no rows are selected away.
    pub fn resample(
        &self,
        data: Array2<f32>,
        sfreq: f64,
        config: &ResampleConfig,
        stim_rows: &[usize],
        scope: StageScope,
    ) -> FilterResult<(Array2<f32>, StageReport)> {
        let ratio = config.target_sfreq / sfreq;
        let expected = (data.nrows(), rescale_sample(data.ncols(), ratio));
        let result = self
            .engine
            .resample(data, sfreq, config, stim_rows)
            .map_err(FilterError::from);
        let output = self.checked(StageKind::Resample, result, expected)?;

        let mut diagnostics = output.diagnostics;
        diagnostics.resample_ratio.get_or_insert(ratio);
        let stage_report = report(
            StageKind::Resample,
            scope,
            expected.0,
            parameters_of(config),
            diagnostics,
        );
        Ok((output.data, stage_report))
    }

    fn checked(
        &self,
        stage: StageKind,
        result: FilterResult<EngineOutput>,
        expected: (usize, usize),
    ) -> FilterResult<EngineOutput> {
        let verified = result.and_then(|output| {
            if output.data.dim() != expected {
                return Err(FilterError::NumericalInstability(format!(
                    "{} engine returned shape {:?}, expected {:?}",
                    stage,
                    output.data.dim(),
                    expected
                )));
            }
            if output.data.iter().any(|value| !value.is_finite()) {
                return Err(FilterError::NumericalInstability(format!(
                    "{} engine returned non-finite samples",
                    stage
                )));
            }
            Ok(output)
        });
        match verified {
            Ok(output) => {
                self.metrics.record_invocation(stage, expected.1);
                Ok(output)
            }
            Err(err) => {
                self.metrics.record_error();
                self.logger.warn(&format!("{} stage failed: {}", stage, err));
                Err(err)
            }
        }
    }
}

fn report(
    stage: StageKind,
    scope: StageScope,
    channel_count: usize,
    parameters: serde_json::Value,
    mut diagnostics: EngineDiagnostics,
) -> StageReport {
    let warnings = std::mem::take(&mut diagnostics.warnings);
    StageReport {
        stage,
        scope,
        channel_count,
        parameters,
        diagnostics,
        warnings,
    }
}
