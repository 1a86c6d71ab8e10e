use anyhow::Context;
use filtcore::prelude::{PipelineResult, Recording};
use log::info;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const FILTERED_DIR: &str = "out_dir_temporal_filtering";
pub const REPORT_DIR: &str = "out_dir_report";

/// Reads a recording serialized as JSON (`{"kind": "continuous", ...}`).
pub fn load_recording<P: AsRef<Path>>(path: P) -> anyhow::Result<Recording> {
    let path_ref = path.as_ref();
    let contents = fs::read_to_string(path_ref)
        .with_context(|| format!("reading recording {}", path_ref.display()))?;
    let recording: Recording = serde_json::from_str(&contents)
        .with_context(|| format!("parsing recording {}", path_ref.display()))?;
    recording
        .validate()
        .with_context(|| format!("validating recording {}", path_ref.display()))?;
    Ok(recording)
}

/// Where a successful run writes its outputs.
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn recording_path(&self, epoched: bool) -> PathBuf {
        let name = if epoched {
            "filtered-epo.json"
        } else {
            "filtered-raw.json"
        };
        self.root.join(FILTERED_DIR).join(name)
    }

    pub fn events_path(&self) -> PathBuf {
        self.root.join(FILTERED_DIR).join("events.json")
    }

    pub fn report_path(&self) -> PathBuf {
        self.root.join(REPORT_DIR).join("report_filtering.json")
    }

    pub fn product_path(&self) -> PathBuf {
        self.root.join("product.json")
    }

    pub fn write(&self, result: &PipelineResult) -> anyhow::Result<()> {
        write_json(
            &self.recording_path(result.recording.is_epoched()),
            &result.recording,
        )?;
        if let Some(events) = &result.events {
            write_json(&self.events_path(), events)?;
        }
        write_json(&self.report_path(), &result.report)?;
        write_json(&self.product_path(), &result.report.product_json())?;
        info!("outputs written under {}", self.root.display());
        Ok(())
    }
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating output directory {}", parent.display()))?;
    }
    let text = serde_json::to_string_pretty(value)
        .with_context(|| format!("serializing {}", path.display()))?;
    fs::write(path, text).with_context(|| format!("writing {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::profile::{generate_recording, GeneratorConfig};
    use crate::workflow::config::WorkflowConfig;
    use crate::workflow::runner::Runner;
    use filtcore::config::RawConfig;

    #[test]
    fn recording_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let recording = generate_recording(&GeneratorConfig {
            duration_secs: 1.0,
            ..Default::default()
        })
        .unwrap();
        let path = dir.path().join("rec.json");
        write_json(&path, &recording).unwrap();
        assert_eq!(load_recording(&path).unwrap(), recording);
    }

    #[test]
    fn invalid_recording_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rec.json");
        fs::write(&path, r#"{"kind": "continuous", "sfreq": 0.0, "channels": [],
            "data": {"v": 1, "dim": [0, 0], "data": []}}"#)
            .unwrap();
        assert!(load_recording(&path).is_err());
    }

    #[test]
    fn outputs_land_in_the_expected_layout() {
        let dir = tempfile::tempdir().unwrap();
        let recording = generate_recording(&GeneratorConfig {
            duration_secs: 2.0,
            ..Default::default()
        })
        .unwrap();
        let raw = RawConfig::from_json_str(
            r#"{"h_freq": 40.0, "apply_resample": true, "target_sfreq": 250.0,
                "resample_events": [[1000, 0, 1]]}"#,
        )
        .unwrap();
        let result = Runner::new(WorkflowConfig::from_raw(raw))
            .execute(recording)
            .unwrap();

        let layout = OutputLayout::new(dir.path());
        layout.write(&result).unwrap();

        assert!(layout.recording_path(false).exists());
        let events: Vec<[i64; 3]> =
            serde_json::from_str(&fs::read_to_string(layout.events_path()).unwrap()).unwrap();
        assert_eq!(events, vec![[250, 0, 1]]);
        let product: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(layout.product_path()).unwrap()).unwrap();
        let messages = product["brainlife"].as_array().unwrap();
        assert_eq!(
            messages.last().unwrap()["msg"],
            "Filtering was applied successfully."
        );
        assert!(layout.report_path().exists());
    }
}
