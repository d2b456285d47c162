//! Shared JSON configuration file recorder.
//!
//! Downstream services read deployment outputs from a single JSON document.
//! Each persisted key is applied as a read-modify-write that replaces the
//! file atomically, so a crash mid-run never leaves the file truncated and
//! keys written by earlier steps survive later failures.

use {
    crate::traits::ArtifactRecorder,
    anyhow::{Context, Result},
    serde_json::{Map, Value},
    std::path::{Path, PathBuf},
};

pub struct JsonFileRecorder {
    path: PathBuf,
}

impl JsonFileRecorder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read_document(&self) -> Result<Map<String, Value>> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => serde_json::from_str(&contents)
                .with_context(|| format!("{} is not a JSON object", self.path.display())),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Map::new()),
            Err(err) => Err(err)
                .with_context(|| format!("failed to read config file {}", self.path.display())),
        }
    }
}

#[async_trait::async_trait]
impl ArtifactRecorder for JsonFileRecorder {
    async fn persist(&self, key: &str, value: &Value) -> Result<()> {
        let mut document = self.read_document()?;
        document.insert(key.to_string(), value.clone());

        let directory = self.path.parent().unwrap_or(Path::new("."));
        let file = tempfile::NamedTempFile::new_in(directory)
            .context("failed to create temporary config file")?;
        serde_json::to_writer_pretty(&file, &Value::Object(document))
            .context("failed to serialize config")?;
        file.persist(&self.path)
            .with_context(|| format!("failed to replace {}", self.path.display()))?;
        tracing::debug!(key, path = %self.path.display(), "persisted");
        Ok(())
    }
}
