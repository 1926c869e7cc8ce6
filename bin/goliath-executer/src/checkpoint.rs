//! Where to pick up after a restart.

use std::{fs, io, path::Path};

use anyhow::Context;
use goliath_execution::{DrainReport, ExecutionTask};
use serde::{Deserialize, Serialize};
use tracing::*;

const CHECKPOINT_FILE: &str = "resume.json";

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub(crate) struct ResumeCheckpoint {
    /// First sequence index that wasn't finished. Watching resumes here.
    pub(crate) resume_index: u64,

    /// Tasks that were still queued at shutdown, for inspection. They are
    /// refetched from the chain on resume.
    pub(crate) pending: Vec<ExecutionTask>,
}

impl ResumeCheckpoint {
    /// Builds the checkpoint for a drained sequencer that started watching at
    /// `start_index`.
    pub(crate) fn from_report(report: DrainReport, start_index: u64) -> Self {
        Self {
            resume_index: report.resume_index.unwrap_or(start_index),
            pending: report.pending,
        }
    }
}

pub(crate) fn load(datadir: &Path) -> anyhow::Result<Option<ResumeCheckpoint>> {
    let path = datadir.join(CHECKPOINT_FILE);
    let raw = match fs::read_to_string(&path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e).with_context(|| format!("reading {}", path.display())),
    };

    let checkpoint = serde_json::from_str(&raw)
        .with_context(|| format!("parsing checkpoint {}", path.display()))?;
    Ok(Some(checkpoint))
}

/// Writes the checkpoint, replacing any previous one atomically.
pub(crate) fn save(datadir: &Path, checkpoint: &ResumeCheckpoint) -> anyhow::Result<()> {
    fs::create_dir_all(datadir)
        .with_context(|| format!("creating datadir {}", datadir.display()))?;

    let path = datadir.join(CHECKPOINT_FILE);
    let tmp = path.with_extension("json.tmp");
    let json = serde_json::to_vec_pretty(checkpoint)?;
    fs::write(&tmp, json).with_context(|| format!("writing {}", tmp.display()))?;
    fs::rename(&tmp, &path).with_context(|| format!("replacing {}", path.display()))?;

    info!(resume_index = %checkpoint.resume_index, pending = %checkpoint.pending.len(), "saved resume checkpoint");
    Ok(())
}
