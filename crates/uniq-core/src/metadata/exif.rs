//! EXIF encoding and extraction.

use exif::experimental::Writer;
use exif::{Field, In, Rational, Reader, Tag, Value};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, Cursor};
use std::path::Path;

use super::synthetic::{Dms, SyntheticMetadata};

/// Encode synthetic metadata as a little-endian TIFF/EXIF payload, ready to
/// be wrapped in a JPEG APP1 segment.
pub fn encode(meta: &SyntheticMetadata) -> Result<Vec<u8>, exif::Error> {
    let datetime = meta.exif_datetime();
    let (lat, lat_ref) = meta.latitude_dms();
    let (lon, lon_ref) = meta.longitude_dms();

    let fields = vec![
        ascii(Tag::Make, &meta.make),
        ascii(Tag::Model, &meta.model),
        ascii(Tag::Software, &meta.software),
        ascii(Tag::DateTime, &datetime),
        ascii(Tag::DateTimeOriginal, &datetime),
        ascii(Tag::DateTimeDigitized, &datetime),
        field(Tag::ExifVersion, Value::Undefined(b"0232".to_vec(), 0)),
        ascii(Tag::LensMake, &meta.make),
        ascii(Tag::LensModel, &meta.lens),
        field(
            Tag::FocalLength,
            Value::Rational(vec![Rational::from((meta.focal_length_x10, 10))]),
        ),
        field(Tag::PhotographicSensitivity, Value::Short(vec![meta.iso])),
        field(
            Tag::ExposureTime,
            Value::Rational(vec![Rational::from((1, meta.exposure_denominator))]),
        ),
        field(
            Tag::FNumber,
            Value::Rational(vec![Rational::from((meta.f_number_x10, 10))]),
        ),
        ascii(Tag::GPSLatitudeRef, &lat_ref.to_string()),
        field(Tag::GPSLatitude, dms_value(&lat)),
        ascii(Tag::GPSLongitudeRef, &lon_ref.to_string()),
        field(Tag::GPSLongitude, dms_value(&lon)),
        field(
            Tag::GPSAltitude,
            Value::Rational(vec![Rational::from((meta.gps_altitude_m, 1))]),
        ),
        field(Tag::GPSAltitudeRef, Value::Byte(vec![0])),
    ];

    let mut writer = Writer::new();
    for f in &fields {
        writer.push_field(f);
    }
    let mut buf = Cursor::new(Vec::new());
    writer.write(&mut buf, true)?;
    Ok(buf.into_inner())
}

fn field(tag: Tag, value: Value) -> Field {
    Field {
        tag,
        ifd_num: In::PRIMARY,
        value,
    }
}

fn ascii(tag: Tag, text: &str) -> Field {
    field(tag, Value::Ascii(vec![text.as_bytes().to_vec()]))
}

fn dms_value(dms: &Dms) -> Value {
    Value::Rational(vec![
        Rational::from(dms.degrees),
        Rational::from(dms.minutes),
        Rational::from(dms.seconds),
    ])
}

/// Human-readable view of the EXIF fields that matter for provenance.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ExifSummary {
    /// When the photo was captured (EXIF datetime string)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub captured_at: Option<String>,

    /// Camera manufacturer
    #[serde(skip_serializing_if = "Option::is_none")]
    pub camera_make: Option<String>,

    /// Camera model
    #[serde(skip_serializing_if = "Option::is_none")]
    pub camera_model: Option<String>,

    /// GPS latitude (decimal degrees)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gps_latitude: Option<f64>,

    /// GPS longitude (decimal degrees)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gps_longitude: Option<f64>,

    /// ISO sensitivity
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iso: Option<u32>,

    /// Aperture (e.g., "f/1.8")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aperture: Option<String>,

    /// Shutter speed (e.g., "1/125")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shutter_speed: Option<String>,

    /// Lens description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lens: Option<String>,
}

impl ExifSummary {
    fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Read EXIF from an image file.
///
/// Returns `None` if the file has no EXIF data or if extraction fails.
/// Partial data is returned when only some fields are present.
pub fn read(path: &Path) -> Option<ExifSummary> {
    let file = File::open(path).ok()?;
    let mut reader = BufReader::new(file);
    let exif = Reader::new().read_from_container(&mut reader).ok()?;
    summarize(&exif)
}

/// Read EXIF from an in-memory image container.
pub fn read_bytes(bytes: &[u8]) -> Option<ExifSummary> {
    let mut cursor = Cursor::new(bytes);
    let exif = Reader::new().read_from_container(&mut cursor).ok()?;
    summarize(&exif)
}

fn summarize(exif: &exif::Exif) -> Option<ExifSummary> {
    let summary = ExifSummary {
        captured_at: get_string(exif, Tag::DateTimeOriginal)
            .or_else(|| get_string(exif, Tag::DateTime)),
        camera_make: get_string(exif, Tag::Make),
        camera_model: get_string(exif, Tag::Model),
        gps_latitude: get_gps_coord(exif, Tag::GPSLatitude, Tag::GPSLatitudeRef),
        gps_longitude: get_gps_coord(exif, Tag::GPSLongitude, Tag::GPSLongitudeRef),
        iso: get_u32(exif, Tag::PhotographicSensitivity),
        aperture: exif
            .get_field(Tag::FNumber, In::PRIMARY)
            .map(|f| format!("f/{}", f.display_value())),
        shutter_speed: exif
            .get_field(Tag::ExposureTime, In::PRIMARY)
            .map(|f| f.display_value().to_string()),
        lens: get_string(exif, Tag::LensModel),
    };
    (!summary.is_empty()).then_some(summary)
}

/// ASCII tags verbatim. `display_value` would reformat DateTime as
/// `YYYY-MM-DD`, which no longer matches what was stamped.
fn get_string(exif: &exif::Exif, tag: Tag) -> Option<String> {
    let field = exif.get_field(tag, In::PRIMARY)?;
    match &field.value {
        Value::Ascii(parts) => {
            let first = parts.first()?;
            let text = String::from_utf8_lossy(first);
            let text = text.trim_end_matches('\0').trim();
            (!text.is_empty()).then(|| text.to_string())
        }
        _ => Some(field.display_value().to_string().trim_matches('"').to_string()),
    }
}

fn get_u32(exif: &exif::Exif, tag: Tag) -> Option<u32> {
    exif.get_field(tag, In::PRIMARY)
        .and_then(|f| match &f.value {
            Value::Short(v) => v.first().map(|&x| x as u32),
            Value::Long(v) => v.first().copied(),
            _ => None,
        })
}

/// GPS coordinate in signed decimal degrees.
fn get_gps_coord(exif: &exif::Exif, coord_tag: Tag, ref_tag: Tag) -> Option<f64> {
    let coord = exif.get_field(coord_tag, In::PRIMARY)?;
    let reference = exif.get_field(ref_tag, In::PRIMARY)?;

    let degrees = match &coord.value {
        Value::Rational(r) if r.len() >= 3 => {
            r[0].to_f64() + r[1].to_f64() / 60.0 + r[2].to_f64() / 3600.0
        }
        _ => return None,
    };
    let ref_str = reference.display_value().to_string();
    let sign = if ref_str.contains('S') || ref_str.contains('W') {
        -1.0
    } else {
        1.0
    };
    Some(sign * degrees)
}
