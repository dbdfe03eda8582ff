//! Persisted run state for resuming interrupted multi-pass reviews.
//!
//! A checkpoint is written after every pass and removed once a run
//! completes. While a run is active it holds an exclusive lock on
//! `<checkpoint>.lock`, so two runs cannot resume the same state at once.

use crate::context::ReviewContext;
use crate::cost::PassCost;
use crate::planner::FileChunk;
use crate::review::{PassFailure, PassOutput, ReviewType};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Bumped when the checkpoint layout changes incompatibly.
pub const CHECKPOINT_VERSION: u32 = 1;

/// Default checkpoint location inside a project.
pub const CHECKPOINT_FILE: &str = ".ai-review/checkpoint.json";

/// Everything needed to continue a run at the next chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunCheckpoint {
    pub version: u32,
    pub run_id: Uuid,
    /// Fingerprint of the reviewed file set.
    pub fingerprint: String,
    pub review_type: ReviewType,
    pub model: String,
    pub chunks: Vec<FileChunk>,
    /// Index of the first chunk without output; later chunks are rerun on resume.
    pub next_chunk: usize,
    pub context: ReviewContext,
    pub outputs: Vec<PassOutput>,
    #[serde(default)]
    pub failures: Vec<PassFailure>,
    pub pass_costs: Vec<PassCost>,
    #[serde(default)]
    pub models_used: Vec<String>,
    pub saved_at: DateTime<Utc>,
}

impl RunCheckpoint {
    /// Whether this checkpoint belongs to the same review of the same files.
    pub fn matches(
        &self,
        fingerprint: &str,
        review_type: ReviewType,
        model: &str,
        chunks: &[FileChunk],
    ) -> bool {
        self.version == CHECKPOINT_VERSION
            && self.fingerprint == fingerprint
            && self.review_type == review_type
            && self.model == model
            && self.chunks == chunks
    }
}

/// Exclusive hold on a checkpoint; released on drop.
#[derive(Debug)]
pub struct CheckpointLock {
    _file: fs::File,
    path: PathBuf,
}

impl CheckpointLock {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Reads and writes one checkpoint file.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn for_project(project_dir: &Path) -> Self {
        Self::new(project_dir.join(CHECKPOINT_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".lock");
        PathBuf::from(name)
    }

    fn ensure_parent(&self) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create checkpoint directory: {}", parent.display())
            })?;
        }
        Ok(())
    }

    /// Take the run lock, failing fast if another run holds it.
    pub fn lock(&self) -> Result<CheckpointLock> {
        self.ensure_parent()?;
        let path = self.lock_path();
        let file = fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .with_context(|| format!("Failed to open lock file: {}", path.display()))?;
        FileExt::try_lock_exclusive(&file).with_context(|| {
            format!(
                "Another review run is using {}; wait for it to finish",
                self.path.display()
            )
        })?;
        Ok(CheckpointLock { _file: file, path })
    }

    /// Write atomically via a temp file and rename.
    pub fn save(&self, checkpoint: &RunCheckpoint) -> Result<()> {
        self.ensure_parent()?;
        let json =
            serde_json::to_string_pretty(checkpoint).context("Failed to serialize checkpoint")?;
        let mut tmp = self.path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, json)
            .with_context(|| format!("Failed to write checkpoint: {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to move checkpoint into {}", self.path.display()))?;
        tracing::debug!(
            path = %self.path.display(),
            next_chunk = checkpoint.next_chunk,
            "Saved checkpoint"
        );
        Ok(())
    }

    pub fn load(&self) -> Result<Option<RunCheckpoint>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read checkpoint: {}", self.path.display()))?;
        let checkpoint = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse checkpoint: {}", self.path.display()))?;
        Ok(Some(checkpoint))
    }

    pub fn clear(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path).with_context(|| {
                format!("Failed to remove checkpoint: {}", self.path.display())
            })?;
        }
        Ok(())
    }
}
