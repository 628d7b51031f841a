//! Container-level tags for video outputs.

use chrono::{DateTime, Duration, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;

const ENCODERS: &[&str] = &["Lavf58", "Lavf59", "Lavf60", "HandBrake", "FFmpeg", "x264"];
const TITLES: &[&str] = &["Video", "Movie", "Clip", "Recording", "Film"];
const COMMENTS: &[&str] = &["Processed", "Edited", "Converted", "Exported"];

/// Synthetic container metadata written by the transcoder.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContainerTags {
    pub creation_time: DateTime<Utc>,
    pub encoder: String,
    pub title: Option<String>,
    pub comment: Option<String>,
}

impl ContainerTags {
    pub fn generate() -> Self {
        Self::generate_with(&mut rand::thread_rng())
    }

    pub fn generate_with<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let offset = rng.gen_range(86_400..=365 * 86_400);
        let encoder = format!(
            "{} {}.{:02}.{:03}",
            ENCODERS.choose(rng).unwrap_or(&"Lavf60"),
            rng.gen_range(1..=9),
            rng.gen_range(0..=99),
            rng.gen_range(0..=999),
        );
        let title = rng.gen_bool(0.5).then(|| {
            format!(
                "{}_{}",
                TITLES.choose(rng).unwrap_or(&"Video"),
                rng.gen_range(1000..=9999)
            )
        });
        let comment = rng.gen_bool(0.5).then(|| {
            format!(
                "{}_{}",
                COMMENTS.choose(rng).unwrap_or(&"Processed"),
                rng.gen_range(100..=999)
            )
        });
        Self {
            creation_time: Utc::now() - Duration::seconds(offset),
            encoder,
            title,
            comment,
        }
    }

    /// `-metadata key=value` arguments. Source metadata must be dropped
    /// separately with `-map_metadata -1`.
    pub fn to_ffmpeg_args(&self) -> Vec<String> {
        let mut tags = vec![
            format!(
                "creation_time={}",
                self.creation_time.format("%Y-%m-%dT%H:%M:%S%.6fZ")
            ),
            format!("encoder={}", self.encoder),
        ];
        if let Some(title) = &self.title {
            tags.push(format!("title={title}"));
        }
        if let Some(comment) = &self.comment {
            tags.push(format!("comment={comment}"));
        }
        tags.into_iter()
            .flat_map(|tag| ["-metadata".to_string(), tag])
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_serializes_creation_time() {
        let tags = ContainerTags::generate_with(&mut StdRng::seed_from_u64(8));
        let json = serde_json::to_value(&tags).unwrap();
        let parsed: DateTime<Utc> = json["creation_time"].as_str().unwrap().parse().unwrap();
        assert_eq!(parsed, tags.creation_time);
    }

    #[test]
    fn test_encoder_shape() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..100 {
            let tags = ContainerTags::generate_with(&mut rng);
            let (name, version) = tags.encoder.split_once(' ').unwrap();
            assert!(ENCODERS.contains(&name));
            let parts: Vec<_> = version.split('.').collect();
            assert_eq!(parts.len(), 3);
            assert_eq!(parts[1].len(), 2);
            assert_eq!(parts[2].len(), 3);
        }
    }

    #[test]
    fn test_creation_time_in_past() {
        let tags = ContainerTags::generate();
        assert!(tags.creation_time < Utc::now() - Duration::hours(23));
    }

    #[test]
    fn test_optional_tags_sometimes_present() {
        let mut rng = StdRng::seed_from_u64(9);
        let all: Vec<_> = (0..64).map(|_| ContainerTags::generate_with(&mut rng)).collect();
        assert!(all.iter().any(|t| t.title.is_some()));
        assert!(all.iter().any(|t| t.title.is_none()));
        assert!(all.iter().any(|t| t.comment.is_some()));
    }

    #[test]
    fn test_ffmpeg_args_pairs() {
        let tags = ContainerTags {
            creation_time: Utc::now(),
            encoder: "Lavf60 6.01.042".into(),
            title: Some("Clip_1234".into()),
            comment: None,
        };
        let args = tags.to_ffmpeg_args();
        assert_eq!(args.len(), 6);
        assert_eq!(args[0], "-metadata");
        assert!(args[1].starts_with("creation_time="));
        assert_eq!(args[3], "encoder=Lavf60 6.01.042");
        assert_eq!(args[5], "title=Clip_1234");
    }
}
