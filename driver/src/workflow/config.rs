use anyhow::Context;
use filtcore::config::RawConfig;
use std::fs;
use std::path::{Path, PathBuf};

/// Pipeline configuration loaded from disk. JSON by default, YAML when the
/// file ends in `.yaml` or `.yml`.
#[derive(Clone, Debug)]
pub struct WorkflowConfig {
    pub raw: RawConfig,
    pub path: PathBuf,
}

impl WorkflowConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading workflow config {}", path_ref.display()))?;
        let raw = match path_ref.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => serde_yaml::from_str(&contents)
                .with_context(|| format!("parsing workflow config {}", path_ref.display()))?,
            _ => RawConfig::from_json_str(&contents)
                .with_context(|| format!("parsing workflow config {}", path_ref.display()))?,
        };
        Ok(Self {
            raw,
            path: path_ref.to_path_buf(),
        })
    }

    pub fn from_raw(raw: RawConfig) -> Self {
        Self {
            raw,
            path: PathBuf::new(),
        }
    }

    /// Recording named by the `fif` key, relative to the config file.
    pub fn input_path(&self) -> Option<PathBuf> {
        let named = PathBuf::from(self.raw.fif.as_ref()?);
        if named.is_absolute() {
            return Some(named);
        }
        match self.path.parent() {
            Some(dir) => Some(dir.join(named)),
            None => Some(named),
        }
    }
}
