//! Video transform engine: probe, plan, transcode.

use std::path::Path;
use std::time::{Duration, Instant};

use super::filter::{EncodeSettings, VideoPlan};
use super::probe::{self, ProbeInfo};
use super::runner::{self, RunError};
use crate::config::{LimitsConfig, VideoConfig};
use crate::error::{truncate_tail, PipelineError, PipelineResult};
use crate::metadata::ContainerTags;
use crate::params::VideoParams;

const STAGE: &str = "transcode";

/// Drives one external transcode per call. Cheap to clone.
#[derive(Debug, Clone)]
pub struct VideoEngine {
    config: VideoConfig,
    limits: LimitsConfig,
}

/// Summary of a finished transcode.
#[derive(Debug, Clone)]
pub struct VideoOutput {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub has_audio: bool,
    pub crf: u8,
}

impl VideoEngine {
    pub fn new(config: VideoConfig, limits: LimitsConfig) -> Self {
        Self { config, limits }
    }

    pub async fn probe(&self, input: &Path) -> PipelineResult<ProbeInfo> {
        probe::probe(
            &self.config.ffprobe_path,
            input,
            Duration::from_millis(self.limits.probe_timeout_ms),
        )
        .await
    }

    /// Transcode `input` to `output`. On any failure the output path is
    /// removed before returning.
    pub async fn transform(
        &self,
        input: &Path,
        output: &Path,
        params: &VideoParams,
    ) -> PipelineResult<VideoOutput> {
        let start = Instant::now();
        let info = self.probe(input).await?;
        tracing::debug!(
            "  probe: {}x{} @ {:.2}fps audio={} ({:?})",
            info.width,
            info.height,
            info.fps,
            info.has_audio(),
            start.elapsed()
        );

        let plan = VideoPlan::build(&info, params, self.config.max_height);
        let (encode, tags) = {
            let mut rng = rand::thread_rng();
            (
                EncodeSettings::sample(&self.config, &mut rng),
                ContainerTags::generate_with(&mut rng),
            )
        };
        let args = plan.ffmpeg_args(input, output, &encode, &tags);
        tracing::debug!("  filters: {}", plan.video_filters.join(","));

        let t = Instant::now();
        let limit = Duration::from_secs(self.config.timeout_secs);
        let result = runner::run(&self.config.ffmpeg_path, &args, limit).await;
        tracing::debug!("  transcode: {:?}", t.elapsed());

        let failure = match result {
            Ok(out) if out.status.success() => match std::fs::metadata(output) {
                Ok(meta) if meta.len() > 0 => None,
                _ => Some(PipelineError::Engine {
                    stage: STAGE.to_string(),
                    message: "transcoder exited cleanly but produced no output".to_string(),
                }),
            },
            Ok(out) => Some(PipelineError::Engine {
                stage: STAGE.to_string(),
                message: self.diagnostic(&out.stderr, out.status.code()),
            }),
            Err(RunError::TimedOut(limit)) => Some(PipelineError::Timeout {
                stage: STAGE.to_string(),
                timeout_ms: limit.as_millis() as u64,
            }),
            Err(e) => Some(PipelineError::Engine {
                stage: STAGE.to_string(),
                message: e.to_string(),
            }),
        };

        if let Some(err) = failure {
            remove_partial(output).await;
            tracing::error!("Transcode failed for {:?}: {}", input, err);
            return Err(err);
        }

        Ok(VideoOutput {
            width: plan.width,
            height: plan.height,
            fps: plan.fps,
            has_audio: plan.has_audio,
            crf: encode.crf,
        })
    }

    fn diagnostic(&self, stderr: &str, code: Option<i32>) -> String {
        let tail = truncate_tail(stderr, self.limits.max_error_chars);
        match (tail.is_empty(), code) {
            (true, Some(code)) => format!("exit status {code}"),
            (true, None) => "terminated by signal".to_string(),
            (false, _) => tail,
        }
    }
}

async fn remove_partial(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => tracing::debug!("Removed partial output {:?}", path),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Failed to remove partial output {:?}: {}", path, e),
    }
}
