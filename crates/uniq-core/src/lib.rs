//! Uniq Core - media uniqualization library.
//!
//! Takes a photo or video and produces one or more outputs that look the
//! same to a person but differ in bytes, content hash, perceptual
//! fingerprint and metadata.
//!
//! # Architecture
//!
//! ```text
//! Request → Validate → N × (Resolve params → Governor slot → Engine → Stamp metadata) → Results
//! ```
//!
//! Images are transformed in-process; videos go through an external
//! transcoder with a generated filter graph. Every job runs in a bounded
//! per-class worker pool, and callers can be rate limited per user.
//!
//! # Usage
//!
//! ```rust,ignore
//! use uniq_core::{Config, UniqRequest, Uniqualizer};
//!
//! #[tokio::main]
//! async fn main() -> uniq_core::Result<()> {
//!     let uniq = Uniqualizer::new(Config::load()?);
//!     let request = UniqRequest::detect("./photo.jpg").unwrap().variations(5);
//!     for result in uniq.uniqualize(request).await {
//!         println!("{}: {:?}", result.index, result.output_path);
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod governor;
pub mod hash;
pub mod imaging;
pub mod job;
pub mod metadata;
pub mod orchestrator;
pub mod output;
pub mod params;
pub mod validate;
pub mod video;

pub use config::{Config, VideoMode};
pub use error::{
    AdmissionDenied, ConfigError, ErrorKind, JobError, PipelineError, PipelineResult, Result,
    UniqError,
};
pub use governor::{Governor, JobClass, UserId};
pub use imaging::ImageEngine;
pub use orchestrator::{UniqRequest, Uniqualizer, VariationResult};
pub use output::{BatchSummary, OutputFormat};
pub use params::{ImageSpec, JobSpec, MediaKind, Spec, Value, VideoSpec};
pub use video::VideoEngine;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
