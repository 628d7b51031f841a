//! Serialization of variation results for machine consumers.

use serde::Serialize;
use std::io::{self, Write};
use std::str::FromStr;

use crate::orchestrator::VariationResult;

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// One JSON document: `{ "summary": ..., "results": [...] }`
    #[default]
    Json,
    /// One result object per line, summary omitted
    JsonLines,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "jsonl" | "jsonlines" | "ndjson" => Ok(Self::JsonLines),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}

/// Aggregate counts over one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub requested: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Slowest variation; variations run concurrently
    pub wall_ms: u64,
}

impl BatchSummary {
    pub fn from_results(results: &[VariationResult]) -> Self {
        let succeeded = results.iter().filter(|r| r.ok).count();
        Self {
            requested: results.len(),
            succeeded,
            failed: results.len() - succeeded,
            wall_ms: results.iter().map(|r| r.elapsed_ms).max().unwrap_or(0),
        }
    }
}

#[derive(Serialize)]
struct Report<'a> {
    summary: BatchSummary,
    results: &'a [VariationResult],
}

/// Write `results` to `writer` in the requested format.
pub fn write_results<W: Write>(
    mut writer: W,
    results: &[VariationResult],
    format: OutputFormat,
    pretty: bool,
) -> io::Result<()> {
    match format {
        OutputFormat::Json => {
            let report = Report {
                summary: BatchSummary::from_results(results),
                results,
            };
            if pretty {
                serde_json::to_writer_pretty(&mut writer, &report).map_err(io::Error::other)?;
            } else {
                serde_json::to_writer(&mut writer, &report).map_err(io::Error::other)?;
            }
            writeln!(writer)?;
        }
        OutputFormat::JsonLines => {
            for result in results {
                serde_json::to_writer(&mut writer, result).map_err(io::Error::other)?;
                writeln!(writer)?;
            }
        }
    }
    writer.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::path::PathBuf;

    fn results() -> Vec<VariationResult> {
        vec![
            VariationResult {
                index: 1,
                output_path: Some(PathBuf::from("a_uniq_1.jpg")),
                ok: true,
                error: None,
                error_kind: None,
                content_hash: Some("abc".into()),
                elapsed_ms: 40,
            },
            VariationResult {
                index: 2,
                output_path: None,
                ok: false,
                error: Some("boom".into()),
                error_kind: Some(ErrorKind::Engine),
                content_hash: None,
                elapsed_ms: 90,
            },
        ]
    }

    #[test]
    fn test_summary() {
        let summary = BatchSummary::from_results(&results());
        assert_eq!(summary.requested, 2);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.wall_ms, 90);
    }

    #[test]
    fn test_json_report() {
        let mut buf = Vec::new();
        write_results(&mut buf, &results(), OutputFormat::Json, false).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(value["summary"]["succeeded"], 1);
        assert_eq!(value["results"][1]["error_kind"], "engine");
        assert!(value["results"][0].get("error").is_none());
    }

    #[test]
    fn test_jsonl_one_line_per_result() {
        let mut buf = Vec::new();
        write_results(&mut buf, &results(), OutputFormat::JsonLines, false).unwrap();
        let output = String::from_utf8(buf).unwrap();
        assert_eq!(output.lines().count(), 2);
    }

    #[test]
    fn test_format_parse() {
        assert_eq!("JSONL".parse::<OutputFormat>(), Ok(OutputFormat::JsonLines));
        assert!("yaml".parse::<OutputFormat>().is_err());
    }
}
