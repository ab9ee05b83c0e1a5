//! Sidecar manifest describing a saved topic model.
//!
//! Written next to the model as `<model_path>.manifest.json` after a
//! successful save.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, instrument};

use reviewtopics_shared::{Result, ReviewTopicsError, RunId};

use crate::summary::TopicSummary;
use crate::topics::TopicParams;

/// Provenance and shape of one fitted model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelManifest {
    pub run_id: RunId,
    pub tool_version: String,
    pub created_at: DateTime<Utc>,
    /// Where the model process reported saving the model.
    pub model_path: PathBuf,
    pub serialization: String,
    pub params: TopicParams,
    /// Documents the model was fitted on.
    pub document_count: usize,
    /// Distinct topics, excluding noise.
    pub topic_count: usize,
    /// Documents labelled as noise.
    pub noise_count: usize,
    /// Hex SHA-256 of the artifact; `None` when it is not a single file.
    pub artifact_sha256: Option<String>,
}

impl ModelManifest {
    /// Describe the model saved at `model_path`, hashing it if it is a file.
    pub fn build(
        run_id: RunId,
        tool_version: &str,
        model_path: &Path,
        serialization: &str,
        params: &TopicParams,
        summary: &TopicSummary,
    ) -> Result<Self> {
        Ok(Self {
            run_id,
            tool_version: tool_version.to_string(),
            created_at: Utc::now(),
            model_path: model_path.to_path_buf(),
            serialization: serialization.to_string(),
            params: params.clone(),
            document_count: summary.rows - summary.unassigned,
            topic_count: summary.distinct_topics(),
            noise_count: summary.noise,
            artifact_sha256: sha256_file(model_path)?,
        })
    }

    /// Sidecar location for a model path.
    pub fn path_for(model_path: &Path) -> PathBuf {
        let mut name = model_path.file_name().unwrap_or_default().to_os_string();
        name.push(".manifest.json");
        model_path.with_file_name(name)
    }

    /// Write the manifest beside the model. Returns the manifest path.
    #[instrument(skip_all, fields(model = %self.model_path.display()))]
    pub fn write(&self) -> Result<PathBuf> {
        let path = Self::path_for(&self.model_path);
        let json = serde_json::to_string_pretty(self).map_err(|e| {
            ReviewTopicsError::validation(format!("JSON serialization failed: {e}"))
        })?;
        std::fs::write(&path, json).map_err(|e| ReviewTopicsError::io(&path, e))?;
        debug!(path = %path.display(), "wrote model manifest");
        Ok(path)
    }
}

/// Hex SHA-256 of a regular file; `None` for directories and missing paths.
fn sha256_file(path: &Path) -> Result<Option<String>> {
    if !path.is_file() {
        return Ok(None);
    }

    let file = File::open(path).map_err(|e| ReviewTopicsError::io(path, e))?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = reader
            .read(&mut buf)
            .map_err(|e| ReviewTopicsError::io(path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(Some(format!("{:x}", hasher.finalize())))
}
