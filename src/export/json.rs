//! Machine-readable JSON report.
//!
//! Kinds and confidences use their wire names (`goroutine_leak`, `high`, …);
//! empty stack/function/location fields are omitted. The optional LLM
//! explanation is a single top-level field, never attached per finding.

use serde::Serialize;
use std::io::Write;

use crate::domain::{AnalysisReport, ExportError};

use super::round_to_ms;

#[derive(Serialize)]
struct JsonFinding<'a> {
    kind: &'a str,
    confidence: &'a str,
    goroutine_id: u64,
    blocked_on: &'a str,
    blocked_for_ms: u64,
    #[serde(skip_serializing_if = "str::is_empty")]
    function: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    location: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    stack: &'a str,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    trace_file: &'a str,
    duration_ms: i64,
    goroutines_analyzed: usize,
    findings: Vec<JsonFinding<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    llm_explanation: Option<&'a str>,
}

/// Write the report as pretty-printed JSON to `w`.
pub fn write_report<W: Write>(
    w: &mut W,
    report: &AnalysisReport,
    explanation: Option<&str>,
) -> Result<(), ExportError> {
    let out = JsonReport {
        trace_file: &report.trace_file,
        duration_ms: report.duration_ms,
        goroutines_analyzed: report.goroutines_analyzed,
        findings: report
            .findings
            .iter()
            .map(|f| JsonFinding {
                kind: f.kind.as_str(),
                confidence: f.confidence.as_str(),
                goroutine_id: f.goroutine_id.0,
                blocked_on: &f.blocked_on,
                blocked_for_ms: round_to_ms(f.blocked_for),
                function: &f.function,
                location: &f.location,
                stack: &f.stack,
            })
            .collect(),
        llm_explanation: explanation,
    };

    serde_json::to_writer_pretty(&mut *w, &out)?;
    writeln!(w)?;
    Ok(())
}
