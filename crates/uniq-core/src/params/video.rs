//! Video transform parameters.

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::value::{resolve_or, Value};
use crate::config::VideoMode;

/// User-facing video transform spec. Unset fields are skipped and 0 is the
/// no-op value of every field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VideoSpec {
    /// Resolution change in percent (-50..50)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale_pct: Option<Value>,
    /// Frame-rate change in frames per second
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fps_delta: Option<Value>,
    /// Playback speed change in percent (-50..50)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tempo_pct: Option<Value>,
    /// Saturation shift (-25..25, factor `1 + v/50`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saturation: Option<Value>,
    /// Contrast shift (-25..25, factor `1 + v/50`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contrast: Option<Value>,
    /// Brightness shift (-100..100, offset `v/100`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brightness: Option<Value>,
    /// Border width in pixels, applied as symmetric crop + pad
    #[serde(skip_serializing_if = "Option::is_none")]
    pub border: Option<Value>,
    /// Temporal noise strength (0..50)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub noise: Option<Value>,
    /// Audio pitch change in percent (-50..50)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pitch_pct: Option<Value>,
    /// Maximum per-channel colour balance shift (0..0.5)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_balance: Option<Value>,
    /// Micro-rotation in degrees (-10..10)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotation: Option<Value>,
}

impl VideoSpec {
    /// The randomized spec used when the caller supplies none.
    ///
    /// `Fast` only touches scale and colour equalization, which x264 can
    /// absorb almost for free; `Full` enables every filter with small ranges.
    pub fn defaults(mode: VideoMode) -> Self {
        let fast = Self {
            scale_pct: Some(Value::range(-3.0, 3.0)),
            saturation: Some(Value::range(0.5, 1.5)),
            contrast: Some(Value::range(0.5, 1.5)),
            brightness: Some(Value::range(-0.4, 0.4)),
            ..Default::default()
        };
        match mode {
            VideoMode::Fast => fast,
            VideoMode::Full => Self {
                fps_delta: Some(Value::range(-1.0, 1.0)),
                tempo_pct: Some(Value::range(-2.0, 2.0)),
                border: Some(Value::range(1.0, 3.0)),
                noise: Some(Value::range(1.0, 2.0)),
                pitch_pct: Some(Value::range(-1.0, 1.0)),
                color_balance: Some(Value::Fixed(0.02)),
                rotation: Some(Value::range(-0.5, 0.5)),
                ..fast
            },
        }
    }

    /// Sample every range once, producing the concrete parameters for one job.
    pub fn resolve<R: Rng + ?Sized>(&self, rng: &mut R) -> VideoParams {
        let color_balance = self.color_balance.and_then(|v| {
            let magnitude = v.resolve_clamped(rng, 0.0, 0.5, 0.0);
            (magnitude > 0.0).then(|| {
                [
                    rng.gen_range(-magnitude..=magnitude),
                    rng.gen_range(-magnitude..=magnitude),
                    rng.gen_range(-magnitude..=magnitude),
                ]
            })
        });

        VideoParams {
            scale_pct: resolve_or(self.scale_pct, rng, -50.0, 50.0, 0.0),
            fps_delta: resolve_or(self.fps_delta, rng, -30.0, 30.0, 0.0),
            tempo: 1.0 + resolve_or(self.tempo_pct, rng, -50.0, 50.0, 0.0) / 100.0,
            saturation: 1.0 + resolve_or(self.saturation, rng, -25.0, 25.0, 0.0) / 50.0,
            contrast: 1.0 + resolve_or(self.contrast, rng, -25.0, 25.0, 0.0) / 50.0,
            brightness: resolve_or(self.brightness, rng, -100.0, 100.0, 0.0) / 100.0,
            border_px: resolve_or(self.border, rng, 0.0, 50.0, 0.0).round() as u32,
            noise_strength: (resolve_or(self.noise, rng, 0.0, 50.0, 0.0) * 2.0).round() as u32,
            pitch: 1.0 + resolve_or(self.pitch_pct, rng, -50.0, 50.0, 0.0) / 100.0,
            color_balance,
            rotation_deg: resolve_or(self.rotation, rng, -10.0, 10.0, 0.0),
        }
    }
}

/// Concrete video parameters for one job.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VideoParams {
    /// Resolution change in percent
    pub scale_pct: f64,
    /// Frames per second added to the source rate
    pub fps_delta: f64,
    /// Playback speed factor (1.0 = unchanged)
    pub tempo: f64,
    /// `eq` saturation (1.0 = unchanged)
    pub saturation: f64,
    /// `eq` contrast (1.0 = unchanged)
    pub contrast: f64,
    /// `eq` brightness offset (0.0 = unchanged)
    pub brightness: f64,
    /// Border width in pixels (0 = none)
    pub border_px: u32,
    /// `noise` filter strength (0 = none)
    pub noise_strength: u32,
    /// Audio pitch factor (1.0 = unchanged)
    pub pitch: f64,
    /// Per-channel (r, g, b) colour balance shifts
    pub color_balance: Option<[f64; 3]>,
    /// Micro-rotation in degrees
    pub rotation_deg: f64,
}

impl VideoParams {
    /// Parameters that leave every filter disabled.
    pub fn identity() -> Self {
        Self {
            scale_pct: 0.0,
            fps_delta: 0.0,
            tempo: 1.0,
            saturation: 1.0,
            contrast: 1.0,
            brightness: 0.0,
            border_px: 0,
            noise_strength: 0,
            pitch: 1.0,
            color_balance: None,
            rotation_deg: 0.0,
        }
    }

    pub fn tempo_changed(&self) -> bool {
        self.tempo != 1.0
    }

    pub fn pitch_changed(&self) -> bool {
        self.pitch != 1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_misspelled_key_rejected() {
        let err = toml::from_str::<VideoSpec>("tempo = 5\n").unwrap_err();
        assert!(err.to_string().contains("tempo"));

        let spec: VideoSpec = toml::from_str("tempo_pct = 5\n").unwrap();
        assert_eq!(spec.tempo_pct, Some(Value::Fixed(5.0)));
    }

    #[test]
    fn test_unset_spec_is_identity() {
        let mut rng = StdRng::seed_from_u64(5);
        assert_eq!(VideoSpec::default().resolve(&mut rng), VideoParams::identity());
    }

    #[test]
    fn test_fast_defaults_leave_slow_filters_off() {
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..100 {
            let p = VideoSpec::defaults(VideoMode::Fast).resolve(&mut rng);
            assert_eq!(p.border_px, 0);
            assert_eq!(p.noise_strength, 0);
            assert!(!p.tempo_changed());
            assert!(!p.pitch_changed());
            assert!(p.color_balance.is_none());
            assert!((-3.0..=3.0).contains(&p.scale_pct));
            assert!(p.saturation > 1.0 && p.saturation < 1.031);
        }
    }

    #[test]
    fn test_full_defaults_enable_everything() {
        let mut rng = StdRng::seed_from_u64(5);
        let p = VideoSpec::defaults(VideoMode::Full).resolve(&mut rng);
        assert!((1..=3).contains(&p.border_px));
        assert!((2..=4).contains(&p.noise_strength));
        let shifts = p.color_balance.unwrap();
        assert!(shifts.iter().all(|s| s.abs() <= 0.02));
        assert!((-0.5..=0.5).contains(&p.rotation_deg));
    }

    #[test]
    fn test_normalization() {
        let mut rng = StdRng::seed_from_u64(5);
        let spec = VideoSpec {
            tempo_pct: Some(Value::Fixed(10.0)),
            pitch_pct: Some(Value::Fixed(-4.0)),
            brightness: Some(Value::Fixed(5.0)),
            contrast: Some(Value::Fixed(-5.0)),
            noise: Some(Value::Fixed(2.5)),
            border: Some(Value::Fixed(2.4)),
            ..Default::default()
        };
        let p = spec.resolve(&mut rng);
        assert!((p.tempo - 1.1).abs() < 1e-12);
        assert!((p.pitch - 0.96).abs() < 1e-12);
        assert!((p.brightness - 0.05).abs() < 1e-12);
        assert!((p.contrast - 0.9).abs() < 1e-12);
        assert_eq!(p.noise_strength, 5);
        assert_eq!(p.border_px, 2);
    }

    #[test]
    fn test_zero_color_balance_is_skipped() {
        let mut rng = StdRng::seed_from_u64(5);
        let spec = VideoSpec {
            color_balance: Some(Value::Fixed(0.0)),
            ..Default::default()
        };
        assert!(spec.resolve(&mut rng).color_balance.is_none());
    }
}
