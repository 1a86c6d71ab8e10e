use crate::workflow::config::WorkflowConfig;
use anyhow::{anyhow, Context};
use filtcore::prelude::{process, FftEngine, FilterError, PipelineResult, Recording};
use log::info;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Builder as TokioBuilder;

/// Runs the pipeline for one recording, optionally under a wall-clock limit.
#[derive(Clone)]
pub struct Runner {
    config: WorkflowConfig,
    engine: Arc<FftEngine>,
    timeout: Option<Duration>,
}

impl Runner {
    pub fn new(config: WorkflowConfig) -> Self {
        Self {
            config,
            engine: Arc::new(FftEngine::new()),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn execute(&self, recording: Recording) -> anyhow::Result<PipelineResult> {
        info!(
            "running pipeline on {} channels x {} samples at {}Hz",
            recording.channels().len(),
            recording.n_times(),
            recording.sfreq()
        );
        match self.timeout {
            None => process(recording, &self.config.raw, self.engine.as_ref())
                .context("executing temporal filtering pipeline"),
            Some(limit) => self.execute_with_timeout(recording, limit),
        }
    }

    /// Runs the pipeline on a blocking worker. An overrun abandons the worker
    /// and discards whatever it produces.
    fn execute_with_timeout(&self, recording: Recording, limit: Duration) -> anyhow::Result<PipelineResult> {
        let runtime = TokioBuilder::new_multi_thread()
            .enable_time()
            .build()
            .context("creating runtime for the pipeline timeout")?;
        let raw = self.config.raw.clone();
        let engine = Arc::clone(&self.engine);

        let outcome = runtime.block_on(async move {
            let task = tokio::task::spawn_blocking(move || process(recording, &raw, engine.as_ref()));
            tokio::time::timeout(limit, task).await
        });
        runtime.shutdown_background();

        match outcome {
            Err(_) => Err(FilterError::EngineTimeout(limit))
                .context("executing temporal filtering pipeline"),
            Ok(Err(join)) => Err(anyhow!("pipeline worker aborted: {}", join)),
            Ok(Ok(result)) => result.context("executing temporal filtering pipeline"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::profile::{generate_recording, GeneratorConfig};
    use filtcore::config::RawConfig;

    fn small_recording() -> Recording {
        let config = GeneratorConfig {
            duration_secs: 4.0,
            ..Default::default()
        };
        generate_recording(&config).unwrap()
    }

    fn workflow(json: &str) -> WorkflowConfig {
        WorkflowConfig::from_raw(RawConfig::from_json_str(json).unwrap())
    }

    #[test]
    fn runner_executes_workflow() {
        let runner = Runner::new(workflow(r#"{"l_freq": 1.0, "h_freq": 40.0}"#));
        let result = runner.execute(small_recording()).unwrap();
        assert!(!result.stage_reports().is_empty());
        assert_eq!(result.recording.lowpass(), 40.0);
    }

    #[test]
    fn generous_timeout_still_returns_result() {
        let runner = Runner::new(workflow(r#"{"h_freq": 40.0, "apply_resample": true, "target_sfreq": 250.0}"#))
            .with_timeout(Some(Duration::from_secs(120)));
        let result = runner.execute(small_recording()).unwrap();
        assert_eq!(result.recording.sfreq(), 250.0);
    }

    #[test]
    fn configuration_errors_surface_with_context() {
        let runner = Runner::new(workflow(r#"{"l_freq": 40.0, "h_freq": 40.0}"#));
        let err = runner.execute(small_recording()).unwrap_err();
        assert!(err.downcast_ref::<FilterError>().is_some());
    }
}
