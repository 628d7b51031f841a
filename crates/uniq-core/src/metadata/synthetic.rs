//! Fabricated capture provenance for one output file.

use chrono::{Duration, Local, NaiveDateTime};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;

/// Plausible capture locations (latitude, longitude).
const CITY_CENTERS: &[(f64, f64)] = &[
    (48.8566, 2.3522),   // Paris
    (51.5074, -0.1278),  // London
    (40.7128, -74.0060), // New York
    (50.4501, 30.5234),  // Kyiv
    (52.2297, 21.0122),  // Warsaw
    (55.7558, 37.6173),  // Moscow
    (41.9028, 12.4964),  // Rome
    (52.5200, 13.4050),  // Berlin
];

/// Degrees of uniform jitter added to each coordinate.
const GPS_JITTER: f64 = 0.1;

/// Device makes paired with models that belong to them.
const DEVICES: &[(&str, &[&str])] = &[
    (
        "Apple",
        &["iPhone 12 Pro", "iPhone 13", "iPhone 14 Pro Max", "iPhone 15"],
    ),
    (
        "Samsung",
        &["Galaxy S21", "Galaxy S22 Ultra", "Galaxy S23", "Galaxy Note 20"],
    ),
    ("Google", &["Pixel 6", "Pixel 7 Pro", "Pixel 8"]),
    ("Xiaomi", &["Mi 11", "Redmi Note 11", "Poco X5"]),
    ("Huawei", &["P40 Pro", "Mate 40", "P50"]),
    ("OnePlus", &["9 Pro", "10 Pro", "11"]),
];

const ISO_VALUES: &[u16] = &[100, 200, 400, 800];
const EXPOSURE_DENOMINATORS: &[u32] = &[60, 125, 250, 500];
/// f-numbers in tenths (f/1.8 .. f/2.8)
const F_NUMBERS_X10: &[u32] = &[18, 20, 22, 28];

const SECS_PER_DAY: i64 = 86_400;

/// Synthetic EXIF provenance. Generated fresh for every output file and
/// never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyntheticMetadata {
    pub make: String,
    pub model: String,
    pub software: String,
    pub lens: String,
    /// Local capture time, always in the past
    pub captured_at: NaiveDateTime,
    /// Signed decimal degrees (negative = south)
    pub gps_lat: f64,
    /// Signed decimal degrees (negative = west)
    pub gps_lon: f64,
    pub gps_altitude_m: u32,
    pub iso: u16,
    /// Exposure time is `1 / exposure_denominator` seconds
    pub exposure_denominator: u32,
    /// f-number multiplied by ten
    pub f_number_x10: u32,
    /// Focal length in tenths of a millimetre
    pub focal_length_x10: u32,
}

impl SyntheticMetadata {
    /// Generate metadata using the thread-local RNG.
    pub fn generate() -> Self {
        Self::generate_with(&mut rand::thread_rng())
    }

    /// Generate metadata from the given RNG.
    pub fn generate_with<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let (make, models) = DEVICES[rng.gen_range(0..DEVICES.len())];
        let model = models[rng.gen_range(0..models.len())];

        let (lat, lon) = CITY_CENTERS[rng.gen_range(0..CITY_CENTERS.len())];
        let gps_lat = lat + rng.gen_range(-GPS_JITTER..=GPS_JITTER);
        let gps_lon = lon + rng.gen_range(-GPS_JITTER..=GPS_JITTER);

        let offset_secs = rng.gen_range(SECS_PER_DAY..=365 * SECS_PER_DAY);
        let captured_at = Local::now().naive_local() - Duration::seconds(offset_secs);

        Self {
            make: make.to_string(),
            model: model.to_string(),
            software: format!("{make} Camera"),
            lens: format!("{make} {model} Lens"),
            captured_at,
            gps_lat,
            gps_lon,
            gps_altitude_m: rng.gen_range(0..=500),
            iso: *ISO_VALUES.choose(rng).unwrap_or(&100),
            exposure_denominator: *EXPOSURE_DENOMINATORS.choose(rng).unwrap_or(&125),
            f_number_x10: *F_NUMBERS_X10.choose(rng).unwrap_or(&18),
            focal_length_x10: rng.gen_range(24..=70),
        }
    }

    /// Capture time in EXIF's `YYYY:MM:DD HH:MM:SS` form.
    pub fn exif_datetime(&self) -> String {
        self.captured_at.format("%Y:%m:%d %H:%M:%S").to_string()
    }

    /// Latitude as sexagesimal rationals plus its hemisphere letter.
    pub fn latitude_dms(&self) -> (Dms, char) {
        to_dms(self.gps_lat, 'N', 'S')
    }

    /// Longitude as sexagesimal rationals plus its hemisphere letter.
    pub fn longitude_dms(&self) -> (Dms, char) {
        to_dms(self.gps_lon, 'E', 'W')
    }
}

/// Degrees, minutes and seconds as `(numerator, denominator)` rationals.
/// Seconds carry two decimal places (denominator 100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dms {
    pub degrees: (u32, u32),
    pub minutes: (u32, u32),
    pub seconds: (u32, u32),
}

impl Dms {
    /// Back to unsigned decimal degrees.
    pub fn to_decimal(&self) -> f64 {
        let r = |(n, d): (u32, u32)| n as f64 / d as f64;
        r(self.degrees) + r(self.minutes) / 60.0 + r(self.seconds) / 3600.0
    }
}

fn to_dms(value: f64, positive: char, negative: char) -> (Dms, char) {
    let reference = if value < 0.0 { negative } else { positive };
    let abs = value.abs();
    let degrees = abs.trunc();
    let minutes_f = (abs - degrees) * 60.0;
    let minutes = minutes_f.trunc();
    let seconds = (minutes_f - minutes) * 60.0;
    (
        Dms {
            degrees: (degrees as u32, 1),
            minutes: (minutes as u32, 1),
            seconds: ((seconds * 100.0).trunc() as u32, 100),
        },
        reference,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_serializes_capture_time() {
        let meta = SyntheticMetadata::generate_with(&mut StdRng::seed_from_u64(5));
        let json = serde_json::to_value(&meta).unwrap();
        let captured: NaiveDateTime = json["captured_at"].as_str().unwrap().parse().unwrap();
        assert_eq!(captured, meta.captured_at);
        assert_eq!(json["make"], meta.make);
    }

    #[test]
    fn test_model_belongs_to_make() {
        let mut rng = StdRng::seed_from_u64(21);
        for _ in 0..200 {
            let meta = SyntheticMetadata::generate_with(&mut rng);
            let (_, models) = DEVICES
                .iter()
                .find(|(make, _)| *make == meta.make)
                .unwrap();
            assert!(models.contains(&meta.model.as_str()));
            assert!(meta.lens.starts_with(&meta.make));
        }
    }

    #[test]
    fn test_capture_time_in_past_year() {
        let mut rng = StdRng::seed_from_u64(21);
        let now = Local::now().naive_local();
        for _ in 0..200 {
            let meta = SyntheticMetadata::generate_with(&mut rng);
            let age = now - meta.captured_at;
            assert!(age >= Duration::days(1) - Duration::seconds(5));
            assert!(age <= Duration::days(365) + Duration::seconds(5));
        }
    }

    #[test]
    fn test_gps_near_a_city() {
        let mut rng = StdRng::seed_from_u64(21);
        for _ in 0..200 {
            let meta = SyntheticMetadata::generate_with(&mut rng);
            assert!(CITY_CENTERS.iter().any(|(lat, lon)| {
                (meta.gps_lat - lat).abs() <= GPS_JITTER + 1e-9
                    && (meta.gps_lon - lon).abs() <= GPS_JITTER + 1e-9
            }));
        }
    }

    #[test]
    fn test_dms_hemispheres() {
        let (dms, reference) = to_dms(-74.0060, 'E', 'W');
        assert_eq!(reference, 'W');
        assert_eq!(dms.degrees, (74, 1));
        assert_eq!(dms.minutes, (0, 1));
        assert!((dms.to_decimal() - 74.0060).abs() < 1e-4);

        let (dms, reference) = to_dms(48.8566, 'N', 'S');
        assert_eq!(reference, 'N');
        assert_eq!(dms.degrees, (48, 1));
        assert_eq!(dms.minutes, (51, 1));
        assert!((dms.to_decimal() - 48.8566).abs() < 1e-4);
    }

    #[test]
    fn test_exif_datetime_format() {
        let mut rng = StdRng::seed_from_u64(21);
        let meta = SyntheticMetadata::generate_with(&mut rng);
        let s = meta.exif_datetime();
        assert_eq!(s.len(), 19);
        assert_eq!(&s[4..5], ":");
        assert_eq!(&s[10..11], " ");
    }

    #[test]
    fn test_consecutive_generations_differ() {
        let a = SyntheticMetadata::generate();
        let b = SyntheticMetadata::generate();
        assert_ne!(a, b);
    }
}
