//! Transform parameter model.
//!
//! A spec is what the caller asks for (fixed values or ranges, possibly
//! absent); params are what an engine receives (concrete scalars only).
//! Resolution happens exactly once per job, so a job never re-samples a
//! range mid-way, while two jobs from the same spec still differ.

pub mod image;
pub mod value;
pub mod video;

pub use image::{ImageParams, ImageSpec};
pub use value::Value;
pub use video::{VideoParams, VideoSpec};

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::VideoMode;

/// Either the randomized defaults or an explicit caller-supplied spec.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum Spec<T> {
    #[default]
    Default,
    Custom(T),
}

/// What kind of media a job handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// Detect the media kind from a file extension.
    pub fn detect(path: &std::path::Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "jpg" | "jpeg" | "png" | "webp" | "bmp" | "tif" | "tiff" => Some(Self::Image),
            "mp4" | "mov" | "avi" | "mkv" | "webm" | "m4v" => Some(Self::Video),
            _ => None,
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaKind::Image => write!(f, "image"),
            MediaKind::Video => write!(f, "video"),
        }
    }
}

/// The transform spec of a request, typed by media kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum JobSpec {
    Image(Spec<ImageSpec>),
    Video(Spec<VideoSpec>),
}

impl JobSpec {
    /// Randomized defaults for the given kind.
    pub fn default_for(kind: MediaKind) -> Self {
        match kind {
            MediaKind::Image => Self::Image(Spec::Default),
            MediaKind::Video => Self::Video(Spec::Default),
        }
    }

    pub fn kind(&self) -> MediaKind {
        match self {
            Self::Image(_) => MediaKind::Image,
            Self::Video(_) => MediaKind::Video,
        }
    }

    /// Resolve into concrete parameters for one job.
    pub fn resolve<R: Rng + ?Sized>(&self, mode: VideoMode, rng: &mut R) -> ResolvedParams {
        match self {
            Self::Image(Spec::Default) => ResolvedParams::Image(ImageSpec::defaults().resolve(rng)),
            Self::Image(Spec::Custom(spec)) => ResolvedParams::Image(spec.resolve(rng)),
            Self::Video(Spec::Default) => {
                ResolvedParams::Video(VideoSpec::defaults(mode).resolve(rng))
            }
            Self::Video(Spec::Custom(spec)) => ResolvedParams::Video(spec.resolve(rng)),
        }
    }
}

/// Concrete parameters of one job.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolvedParams {
    Image(ImageParams),
    Video(VideoParams),
}
