//! Job orchestration: fan a request out into independent variations, run
//! each through the governor and the matching engine, and reassemble the
//! results by variation index.

use futures_util::future::join_all;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::Instrument;

use crate::config::Config;
use crate::error::{truncate_tail, AdmissionDenied, ErrorKind, JobError, PipelineError};
use crate::governor::{Governor, JobClass, UserId};
use crate::hash;
use crate::imaging::{Deadline, ImageEngine};
use crate::job::MediaJob;
use crate::params::{JobSpec, MediaKind, ResolvedParams};
use crate::validate::Validator;
use crate::video::VideoEngine;

/// A request for `variations` distinct copies of one input.
#[derive(Debug, Clone)]
pub struct UniqRequest {
    pub kind: MediaKind,
    pub input: PathBuf,
    /// Defaults to the input's directory
    pub output_dir: Option<PathBuf>,
    pub variations: usize,
    pub spec: JobSpec,
}

impl UniqRequest {
    /// One variation with randomized defaults for the given kind.
    pub fn new(kind: MediaKind, input: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            input: input.into(),
            output_dir: None,
            variations: 1,
            spec: JobSpec::default_for(kind),
        }
    }

    /// Like [`UniqRequest::new`], detecting the kind from the extension.
    pub fn detect(input: impl Into<PathBuf>) -> Option<Self> {
        let input = input.into();
        let kind = MediaKind::detect(&input)?;
        Some(Self::new(kind, input))
    }

    pub fn variations(mut self, n: usize) -> Self {
        self.variations = n;
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    /// Replace the transform spec; the request kind follows it.
    pub fn spec(mut self, spec: JobSpec) -> Self {
        self.kind = spec.kind();
        self.spec = spec;
        self
    }
}

/// Outcome of one variation. Never carries unbounded diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct VariationResult {
    /// 1-based
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
    pub elapsed_ms: u64,
}

impl VariationResult {
    fn failed(index: usize, err: &JobError, max_chars: usize, elapsed: Duration) -> Self {
        Self {
            index,
            output_path: None,
            ok: false,
            error: Some(truncate_tail(&err.to_string(), max_chars)),
            error_kind: Some(err.kind()),
            content_hash: None,
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }
}

/// Entry point for uniqualization. Clones share engines and the governor.
#[derive(Clone)]
pub struct Uniqualizer {
    config: Arc<Config>,
    governor: Governor,
    image: Arc<ImageEngine>,
    video: Arc<VideoEngine>,
    validator: Arc<Validator>,
}

impl Uniqualizer {
    pub fn new(config: Config) -> Self {
        let governor = Governor::new(&config.pools, &config.rate);
        Self::with_governor(config, governor)
    }

    /// Use an existing governor, e.g. one shared with other services.
    pub fn with_governor(config: Config, governor: Governor) -> Self {
        Self {
            image: Arc::new(ImageEngine::new(config.image.clone(), config.limits.clone())),
            video: Arc::new(VideoEngine::new(config.video.clone(), config.limits.clone())),
            validator: Arc::new(Validator::new(config.limits.clone())),
            config: Arc::new(config),
            governor,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn governor(&self) -> &Governor {
        &self.governor
    }

    /// Rate-check `user`, then run the request.
    pub async fn uniqualize_as(
        &self,
        user: UserId,
        request: UniqRequest,
    ) -> Result<Vec<VariationResult>, AdmissionDenied> {
        if let Err(denied) = self.governor.check_rate(user) {
            tracing::warn!("Request from user {} denied: {}", user, denied);
            return Err(denied);
        }
        Ok(self.uniqualize(request).await)
    }

    /// Run every variation of `request` concurrently. Per-variation
    /// failures are reported in the results; results are sorted by index.
    pub async fn uniqualize(&self, request: UniqRequest) -> Vec<VariationResult> {
        let count = request.variations.clamp(1, self.config.limits.max_variations.max(1));
        let max_chars = self.config.limits.max_error_chars;

        if request.spec.kind() != request.kind {
            let err = JobError::Pipeline(PipelineError::UnsupportedFormat {
                path: request.input.clone(),
                format: format!("{} spec for {} input", request.spec.kind(), request.kind),
            });
            return failed_batch(count, &err, max_chars);
        }
        if let Err(e) = self.validator.validate(&request.input, request.kind) {
            tracing::warn!("Rejected {:?}: {}", request.input, e);
            return failed_batch(count, &JobError::Pipeline(e), max_chars);
        }

        let output_dir = request
            .output_dir
            .clone()
            .or_else(|| request.input.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from("."));

        let tasks = (1..=count).map(|index| {
            let output = output_path(&request.input, &output_dir, index, self.extension(request.kind));
            self.run_variation(&request, output, index, count)
        });
        let mut results = join_all(tasks).await;
        results.sort_by_key(|r| r.index);

        let ok = results.iter().filter(|r| r.ok).count();
        tracing::info!(
            "Uniqualized {:?}: {}/{} variations succeeded",
            request.input,
            ok,
            count
        );
        results
    }

    fn extension(&self, kind: MediaKind) -> &str {
        match kind {
            MediaKind::Image => "jpg",
            MediaKind::Video => &self.config.video.container,
        }
    }

    async fn run_variation(
        &self,
        request: &UniqRequest,
        output: PathBuf,
        index: usize,
        count: usize,
    ) -> VariationResult {
        let start = Instant::now();
        let params = {
            let mut rng = rand::thread_rng();
            request.spec.resolve(self.config.video.mode, &mut rng)
        };
        let job = match MediaJob::new(
            request.input.clone(),
            output,
            params,
            index,
            count,
            &self.config.scratch_dir(),
        ) {
            Ok(job) => job,
            Err(e) => {
                return VariationResult::failed(
                    index,
                    &e.into(),
                    self.config.limits.max_error_chars,
                    start.elapsed(),
                )
            }
        };

        let span = tracing::info_span!(
            "job",
            job_id = %job.id,
            kind = %job.kind,
            variation = index
        );
        let result = self.execute(job).instrument(span.clone()).await;
        let elapsed = start.elapsed();

        let _guard = span.enter();
        match result {
            Ok(path) => {
                let content_hash = match hash::content_hash(&path) {
                    Ok(h) => Some(h),
                    Err(e) => {
                        tracing::warn!("Could not hash {:?}: {}", path, e);
                        None
                    }
                };
                tracing::info!("Variation {}/{} done in {:?}", index, count, elapsed);
                VariationResult {
                    index,
                    output_path: Some(path),
                    ok: true,
                    error: None,
                    error_kind: None,
                    content_hash,
                    elapsed_ms: elapsed.as_millis() as u64,
                }
            }
            Err(e) => {
                match &e {
                    JobError::Admission(denied) => tracing::warn!("Not admitted: {}", denied),
                    JobError::Pipeline(err) => tracing::error!("Variation {} failed: {}", index, err),
                }
                VariationResult::failed(index, &e, self.config.limits.max_error_chars, elapsed)
            }
        }
    }

    /// Run the engine for `job` under its pool and promote the artifact.
    async fn execute(&self, job: MediaJob) -> Result<PathBuf, JobError> {
        let input = job.input.clone();
        let staged = job.scratch_output();

        match job.params {
            ResolvedParams::Image(params) => {
                let engine = self.image.clone();
                let limit = Duration::from_millis(self.config.limits.image_timeout_ms);
                // The slot stays held until the blocking work actually stops.
                let report = self
                    .governor
                    .submit_blocking(JobClass::Image, move || {
                        engine.transform_within(&input, &staged, &params, Deadline::after(limit))
                    })
                    .await??;
                tracing::debug!(
                    "Encoded {}x{} q={}",
                    report.width,
                    report.height,
                    report.quality
                );
            }
            ResolvedParams::Video(params) => {
                let engine = self.video.clone();
                let report = self
                    .governor
                    .submit(JobClass::Video, async move {
                        engine.transform(&input, &staged, &params).await
                    })
                    .await??;
                tracing::debug!(
                    "Transcoded {}x{} @ {}fps crf={} audio={}",
                    report.width,
                    report.height,
                    report.fps,
                    report.crf,
                    report.has_audio
                );
            }
        }

        Ok(tokio::task::spawn_blocking(move || job.finish())
            .await
            .map_err(|e| PipelineError::Engine {
                stage: "finalize".to_string(),
                message: e.to_string(),
            })??)
    }
}

/// `<output_dir>/<stem>_uniq_<index>.<ext>`
pub fn output_path(input: &Path, output_dir: &Path, index: usize, ext: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    output_dir.join(format!("{stem}_uniq_{index}.{ext}"))
}

fn failed_batch(count: usize, err: &JobError, max_chars: usize) -> Vec<VariationResult> {
    (1..=count)
        .map(|index| VariationResult::failed(index, err, max_chars, Duration::ZERO))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_naming() {
        let path = output_path(Path::new("/in/photo.png"), Path::new("/out"), 3, "jpg");
        assert_eq!(path, PathBuf::from("/out/photo_uniq_3.jpg"));
    }

    #[test]
    fn test_request_builder() {
        let req = UniqRequest::detect("/tmp/clip.MOV").unwrap().variations(4);
        assert_eq!(req.kind, MediaKind::Video);
        assert_eq!(req.variations, 4);
        assert!(UniqRequest::detect("/tmp/notes.txt").is_none());
    }

    #[tokio::test]
    async fn test_missing_input_fails_every_variation() {
        let uniq = Uniqualizer::new(Config::default());
        let results = uniq
            .uniqualize(UniqRequest::new(MediaKind::Image, "/nonexistent/a.jpg").variations(3))
            .await;
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| !r.ok));
        assert_eq!(results[0].error_kind, Some(ErrorKind::Input));
        assert_eq!(
            results.iter().map(|r| r.index).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }

    #[tokio::test]
    async fn test_variation_count_clamped() {
        let uniq = Uniqualizer::new(Config::default());
        let results = uniq
            .uniqualize(UniqRequest::new(MediaKind::Image, "/nonexistent/a.jpg").variations(50))
            .await;
        assert_eq!(results.len(), 10);
        let results = uniq
            .uniqualize(UniqRequest::new(MediaKind::Image, "/nonexistent/a.jpg").variations(0))
            .await;
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn test_rate_limited_user() {
        let mut config = Config::default();
        config.rate.max_requests = 1;
        let uniq = Uniqualizer::new(config);
        let req = UniqRequest::new(MediaKind::Image, "/nonexistent/a.jpg");
        assert!(uniq.uniqualize_as(5, req.clone()).await.is_ok());
        let err = uniq.uniqualize_as(5, req).await.unwrap_err();
        assert!(matches!(err, AdmissionDenied::RateLimited { .. }));
    }
}
