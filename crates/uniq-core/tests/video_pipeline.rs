//! Video jobs against shell-script stand-ins for ffprobe and ffmpeg.
#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use uniq_core::{
    Config, ErrorKind, JobClass, JobSpec, MediaKind, Spec, UniqRequest, Uniqualizer, Value,
    VideoSpec,
};

const PROBE_NO_AUDIO: &str = r#"#!/bin/sh
cat <<'JSON'
{
  "streams": [
    {"codec_type": "video", "width": 640, "height": 360, "r_frame_rate": "30/1"}
  ],
  "format": {"duration": "10.000000"}
}
JSON
"#;

// Records its arguments next to the input, then writes the last argument.
const FFMPEG_OK: &str = r#"#!/bin/sh
input=""
prev=""
for arg in "$@"; do
  if [ "$prev" = "-i" ]; then input="$arg"; fi
  prev="$arg"
done
printf '%s\n' "$@" > "$input.args"
printf 'transcoded' > "$prev"
"#;

// Leaves a partial file behind and never finishes on its own.
const FFMPEG_HANG: &str = r#"#!/bin/sh
for last; do :; done
printf 'partial' > "$last"
sleep 30
"#;

struct Tools {
    _dir: tempfile::TempDir,
    probe: PathBuf,
    ffmpeg_ok: PathBuf,
    ffmpeg_hang: PathBuf,
}

/// Every script is written before any test spawns a child, so no executable
/// is ever open for writing while another thread forks.
fn tools() -> &'static Tools {
    static TOOLS: OnceLock<Tools> = OnceLock::new();
    TOOLS.get_or_init(|| {
        let dir = tempfile::tempdir().unwrap();
        let write = |name: &str, body: &str| {
            let path = dir.path().join(name);
            std::fs::write(&path, body).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path
        };
        Tools {
            probe: write("ffprobe", PROBE_NO_AUDIO),
            ffmpeg_ok: write("ffmpeg-ok", FFMPEG_OK),
            ffmpeg_hang: write("ffmpeg-hang", FFMPEG_HANG),
            _dir: dir,
        }
    })
}

fn write_clip(dir: &Path) -> PathBuf {
    let mut bytes = b"\x00\x00\x00\x18ftypisom\x00\x00\x02\x00".to_vec();
    bytes.resize(1024, 0);
    let path = dir.join("clip.mp4");
    std::fs::write(&path, bytes).unwrap();
    path
}

fn config(ffmpeg: &Path, scratch: &Path) -> Config {
    let tools = tools();
    let mut config = Config::default();
    config.general.scratch_dir = Some(scratch.to_path_buf());
    config.video.ffprobe_path = tools.probe.to_string_lossy().into_owned();
    config.video.ffmpeg_path = ffmpeg.to_string_lossy().into_owned();
    config
}

#[tokio::test]
async fn tempo_without_audio_builds_video_only_graph() {
    let tools = tools();
    let dir = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let input = write_clip(dir.path());
    let uniq = Uniqualizer::new(config(&tools.ffmpeg_ok, scratch.path()));

    let spec = VideoSpec {
        tempo_pct: Some(Value::Fixed(10.0)),
        ..Default::default()
    };
    let request = UniqRequest::new(MediaKind::Video, &input)
        .spec(JobSpec::Video(Spec::Custom(spec)));
    let results = uniq.uniqualize(request).await;

    let result = &results[0];
    assert!(result.ok, "unexpected failure: {:?}", result.error);
    let output = result.output_path.clone().unwrap();
    assert_eq!(output, dir.path().join("clip_uniq_1.mp4"));
    assert_eq!(std::fs::read(&output).unwrap(), b"transcoded");

    let args = std::fs::read_to_string(input.with_extension("mp4.args")).unwrap();
    let args: Vec<&str> = args.lines().collect();
    let vf = args
        .iter()
        .position(|a| *a == "-vf")
        .map(|i| args[i + 1])
        .unwrap();
    assert!(vf.contains("setpts="), "{vf}");
    assert!(!args.contains(&"-af"));
    assert!(!args.contains(&"-c:a"));
    assert!(!args.iter().any(|a| a.contains("atempo")));
    assert!(args.contains(&"-map_metadata"));
}

#[tokio::test]
async fn transcoder_timeout_cleans_up() {
    let tools = tools();
    let dir = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let input = write_clip(dir.path());
    let mut config = config(&tools.ffmpeg_hang, scratch.path());
    config.video.timeout_secs = 1;
    let uniq = Uniqualizer::new(config);

    let started = std::time::Instant::now();
    let results = uniq
        .uniqualize(UniqRequest::new(MediaKind::Video, &input))
        .await;
    assert!(started.elapsed() < std::time::Duration::from_secs(20));

    let result = &results[0];
    assert!(!result.ok);
    assert_eq!(result.error_kind, Some(ErrorKind::Engine));
    assert!(result.error.as_deref().unwrap().contains("Timeout"));
    assert!(!dir.path().join("clip_uniq_1.mp4").exists());
    assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
    assert_eq!(uniq.governor().pool(JobClass::Video).in_flight(), 0);
}

#[tokio::test]
async fn failing_transcoder_reports_stderr_tail() {
    let dir = tempfile::tempdir().unwrap();
    let scratch = tempfile::tempdir().unwrap();
    let input = write_clip(dir.path());
    let uniq = Uniqualizer::new(config(Path::new("/bin/false"), scratch.path()));

    let results = uniq
        .uniqualize(UniqRequest::new(MediaKind::Video, &input))
        .await;

    assert!(!results[0].ok);
    assert_eq!(results[0].error_kind, Some(ErrorKind::Engine));
    assert_eq!(uniq.governor().pool(JobClass::Video).in_flight(), 0);
}
