//! JPEG marker-segment surgery: strip provenance segments, insert an EXIF
//! APP1, extract an existing one. Entropy-coded data is never touched.

use thiserror::Error;

const SOI: u8 = 0xD8;
const EOI: u8 = 0xD9;
const SOS: u8 = 0xDA;
const APP0: u8 = 0xE0;
const APP1: u8 = 0xE1;
const APP2: u8 = 0xE2;
const APP14: u8 = 0xEE;
const COM: u8 = 0xFE;

const EXIF_HEADER: &[u8] = b"Exif\0\0";

/// Largest payload a single marker segment can carry (length field is u16
/// and counts itself).
pub const MAX_SEGMENT_PAYLOAD: usize = u16::MAX as usize - 2;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum JpegError {
    #[error("not a JPEG stream")]
    NotJpeg,

    #[error("truncated segment at offset {0}")]
    Truncated(usize),

    #[error("expected marker at offset {0}")]
    BadMarker(usize),

    #[error("EXIF payload of {0} bytes does not fit in one APP1 segment")]
    PayloadTooLarge(usize),

    #[error("EXIF encoding failed: {0}")]
    Exif(String),
}

/// One marker segment before the scan. `bytes` includes the marker and length.
#[derive(Debug, Clone, Copy)]
struct Segment<'a> {
    marker: u8,
    bytes: &'a [u8],
}

impl<'a> Segment<'a> {
    fn payload(&self) -> &'a [u8] {
        self.bytes.get(4..).unwrap_or(&[])
    }

    fn is_exif(&self) -> bool {
        self.marker == APP1 && self.payload().starts_with(EXIF_HEADER)
    }
}

/// Header segments plus everything from SOS onwards, verbatim.
struct Parsed<'a> {
    segments: Vec<Segment<'a>>,
    scan: &'a [u8],
}

pub fn is_jpeg(bytes: &[u8]) -> bool {
    bytes.len() >= 3 && bytes[0] == 0xFF && bytes[1] == SOI && bytes[2] == 0xFF
}

fn parse(bytes: &[u8]) -> Result<Parsed<'_>, JpegError> {
    if !is_jpeg(bytes) {
        return Err(JpegError::NotJpeg);
    }
    let mut segments = Vec::new();
    let mut pos = 2;
    loop {
        if pos >= bytes.len() {
            return Ok(Parsed {
                segments,
                scan: &[],
            });
        }
        if bytes[pos] != 0xFF {
            return Err(JpegError::BadMarker(pos));
        }
        let start = pos;
        // Fill bytes
        while pos < bytes.len() && bytes[pos] == 0xFF {
            pos += 1;
        }
        let marker = *bytes.get(pos).ok_or(JpegError::Truncated(start))?;
        pos += 1;

        match marker {
            SOS | EOI => {
                return Ok(Parsed {
                    segments,
                    scan: &bytes[start..],
                })
            }
            0x01 | 0xD0..=0xD7 => {
                segments.push(Segment {
                    marker,
                    bytes: &bytes[start..pos],
                });
            }
            _ => {
                let len_bytes = bytes.get(pos..pos + 2).ok_or(JpegError::Truncated(start))?;
                let len = u16::from_be_bytes([len_bytes[0], len_bytes[1]]) as usize;
                if len < 2 {
                    return Err(JpegError::Truncated(start));
                }
                let end = pos + len;
                if end > bytes.len() {
                    return Err(JpegError::Truncated(start));
                }
                // Normalise away any fill bytes so the segment starts at FF <marker>.
                segments.push(Segment {
                    marker,
                    bytes: &bytes[pos - 2..end],
                });
                pos = end;
            }
        }
    }
}

/// Whether a header segment survives metadata stripping. Colour-relevant
/// segments (JFIF, ICC, Adobe) and all frame/table segments are kept.
fn keep_on_strip(marker: u8) -> bool {
    match marker {
        APP0 | APP2 | APP14 => true,
        0xE1..=0xEF | COM => false,
        _ => true,
    }
}

fn assemble(segments: &[Segment<'_>], insert: Option<(usize, &[u8])>, scan: &[u8]) -> Vec<u8> {
    let extra = insert.map_or(0, |(_, s)| s.len());
    let total = 2 + segments.iter().map(|s| s.bytes.len()).sum::<usize>() + extra + scan.len();
    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(&[0xFF, SOI]);
    for (i, seg) in segments.iter().enumerate() {
        if let Some((at, bytes)) = insert {
            if at == i {
                out.extend_from_slice(bytes);
            }
        }
        out.extend_from_slice(seg.bytes);
    }
    if let Some((at, bytes)) = insert {
        if at >= segments.len() {
            out.extend_from_slice(bytes);
        }
    }
    out.extend_from_slice(scan);
    out
}

/// Remove EXIF, XMP, IPTC, comments and vendor APPn segments.
pub fn strip(bytes: &[u8]) -> Result<Vec<u8>, JpegError> {
    let parsed = parse(bytes)?;
    let kept: Vec<_> = parsed
        .segments
        .into_iter()
        .filter(|s| keep_on_strip(s.marker))
        .collect();
    Ok(assemble(&kept, None, parsed.scan))
}

/// Replace any EXIF APP1 with one carrying `tiff` (a raw TIFF/EXIF payload).
/// The new segment goes right after SOI, or after APP0 when JFIF is present.
pub fn insert_exif(bytes: &[u8], tiff: &[u8]) -> Result<Vec<u8>, JpegError> {
    let payload_len = EXIF_HEADER.len() + tiff.len();
    if payload_len > MAX_SEGMENT_PAYLOAD {
        return Err(JpegError::PayloadTooLarge(payload_len));
    }
    let parsed = parse(bytes)?;
    let kept: Vec<_> = parsed
        .segments
        .into_iter()
        .filter(|s| !s.is_exif())
        .collect();

    let mut segment = Vec::with_capacity(payload_len + 4);
    segment.extend_from_slice(&[0xFF, APP1]);
    segment.extend_from_slice(&((payload_len + 2) as u16).to_be_bytes());
    segment.extend_from_slice(EXIF_HEADER);
    segment.extend_from_slice(tiff);

    let at = kept.iter().take_while(|s| s.marker == APP0).count();
    Ok(assemble(&kept, Some((at, &segment)), parsed.scan))
}

/// The TIFF payload of the first EXIF APP1 segment, if any.
pub fn extract_exif(bytes: &[u8]) -> Result<Option<&[u8]>, JpegError> {
    let parsed = parse(bytes)?;
    Ok(parsed
        .segments
        .iter()
        .find(|s| s.is_exif())
        .map(|s| &s.payload()[EXIF_HEADER.len()..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(marker: u8, payload: &[u8]) -> Vec<u8> {
        let mut out = vec![0xFF, marker];
        out.extend_from_slice(&((payload.len() + 2) as u16).to_be_bytes());
        out.extend_from_slice(payload);
        out
    }

    /// SOI, JFIF, EXIF, XMP, COM, DQT, SOS + scan, EOI
    fn sample() -> Vec<u8> {
        let mut out = vec![0xFF, SOI];
        out.extend(segment(APP0, b"JFIF\0\x01\x01"));
        out.extend(segment(APP1, b"Exif\0\0II*\0old"));
        out.extend(segment(APP1, b"http://ns.adobe.com/xap/1.0/\0<x/>"));
        out.extend(segment(COM, b"hello"));
        out.extend(segment(0xDB, &[0u8; 5]));
        out.extend(segment(SOS, &[1, 2, 3]));
        out.extend_from_slice(&[0x12, 0xFF, 0x00, 0x34]);
        out.extend_from_slice(&[0xFF, EOI]);
        out
    }

    fn markers(bytes: &[u8]) -> Vec<u8> {
        parse(bytes).unwrap().segments.iter().map(|s| s.marker).collect()
    }

    #[test]
    fn test_is_jpeg() {
        assert!(is_jpeg(&sample()));
        assert!(!is_jpeg(b"\x89PNG\r\n"));
        assert!(!is_jpeg(&[0xFF]));
    }

    #[test]
    fn test_extract_exif_borrows_from_input() {
        let bytes = sample();
        let tiff = extract_exif(&bytes).unwrap().unwrap();
        assert_eq!(tiff, b"II*\0old");

        let range = bytes.as_ptr_range();
        assert!(range.contains(&tiff.as_ptr()));
    }

    #[test]
    fn test_strip_removes_provenance() {
        let stripped = strip(&sample()).unwrap();
        assert_eq!(markers(&stripped), vec![APP0, 0xDB]);
        assert!(extract_exif(&stripped).unwrap().is_none());
        // Scan data survives unchanged
        assert!(stripped.ends_with(&[0x12, 0xFF, 0x00, 0x34, 0xFF, EOI]));
    }

    #[test]
    fn test_strip_is_idempotent() {
        let once = strip(&sample()).unwrap();
        let twice = strip(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_insert_replaces_exif_after_jfif() {
        let out = insert_exif(&sample(), b"II*\0new").unwrap();
        assert_eq!(markers(&out), vec![APP0, APP1, APP1, COM, 0xDB]);
        assert_eq!(extract_exif(&out).unwrap(), Some(&b"II*\0new"[..]));
    }

    #[test]
    fn test_insert_without_jfif_goes_first() {
        let mut bare = vec![0xFF, SOI];
        bare.extend(segment(0xDB, &[0u8; 3]));
        bare.extend_from_slice(&[0xFF, EOI]);
        let out = insert_exif(&bare, b"II*\0").unwrap();
        assert_eq!(markers(&out), vec![APP1, 0xDB]);
    }

    #[test]
    fn test_insert_rejects_oversized_payload() {
        let tiff = vec![0u8; MAX_SEGMENT_PAYLOAD];
        assert_eq!(
            insert_exif(&sample(), &tiff),
            Err(JpegError::PayloadTooLarge(MAX_SEGMENT_PAYLOAD + EXIF_HEADER.len()))
        );
    }

    #[test]
    fn test_truncated_segment() {
        let mut bytes = vec![0xFF, SOI, 0xFF, APP1, 0x00, 0x40, 1, 2];
        bytes.truncate(8);
        assert_eq!(strip(&bytes), Err(JpegError::Truncated(2)));
    }

    #[test]
    fn test_not_jpeg() {
        assert_eq!(strip(b"GIF89a"), Err(JpegError::NotJpeg));
    }
}
