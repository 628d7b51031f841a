//! One output variation of a request, with its own scratch directory.

use std::path::{Path, PathBuf};
use tempfile::TempDir;
use uuid::Uuid;

use crate::error::{PipelineError, PipelineResult};
use crate::params::{MediaKind, ResolvedParams};

/// A single unit of work. Engines write into the job's scratch directory;
/// only [`MediaJob::finish`] moves the artifact to its final path. The
/// scratch directory is removed when the job is dropped, whatever the
/// outcome.
#[derive(Debug)]
pub struct MediaJob {
    pub id: Uuid,
    pub kind: MediaKind,
    pub input: PathBuf,
    pub output: PathBuf,
    pub params: ResolvedParams,
    /// 1-based
    pub variation_index: usize,
    pub variation_count: usize,
    scratch: TempDir,
}

impl MediaJob {
    pub fn new(
        input: PathBuf,
        output: PathBuf,
        params: ResolvedParams,
        variation_index: usize,
        variation_count: usize,
        scratch_root: &Path,
    ) -> PipelineResult<Self> {
        let id = Uuid::new_v4();
        std::fs::create_dir_all(scratch_root).map_err(|e| PipelineError::io(scratch_root, e))?;
        let scratch = tempfile::Builder::new()
            .prefix(&format!("uniq-{}-", id.simple()))
            .tempdir_in(scratch_root)
            .map_err(|e| PipelineError::io(scratch_root, e))?;
        let kind = match params {
            ResolvedParams::Image(_) => MediaKind::Image,
            ResolvedParams::Video(_) => MediaKind::Video,
        };
        Ok(Self {
            id,
            kind,
            input,
            output,
            params,
            variation_index,
            variation_count,
            scratch,
        })
    }

    pub fn scratch_dir(&self) -> &Path {
        self.scratch.path()
    }

    /// Where the engine writes its artifact.
    pub fn scratch_output(&self) -> PathBuf {
        let name = self
            .output
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "output".into());
        self.scratch.path().join(name)
    }

    /// Move the finished artifact into place and clean up scratch space.
    pub fn finish(self) -> PipelineResult<PathBuf> {
        let staged = self.scratch_output();
        if let Some(parent) = self.output.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| PipelineError::io(parent, e))?;
        }
        if std::fs::rename(&staged, &self.output).is_err() {
            // Different filesystem: copy, then let scratch cleanup remove the original.
            std::fs::copy(&staged, &self.output).map_err(|e| {
                let _ = std::fs::remove_file(&self.output);
                PipelineError::io(&self.output, e)
            })?;
        }
        let output = self.output.clone();
        self.close();
        Ok(output)
    }

    fn close(self) {
        let path = self.scratch.path().to_path_buf();
        if let Err(e) = self.scratch.close() {
            tracing::warn!("Failed to remove scratch dir {:?}: {}", path, e);
        }
    }
}
