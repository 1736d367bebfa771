//! Human-readable terminal report.

use std::io::{self, Write};
use std::time::Duration;

use crate::domain::{AnalysisReport, Finding, FindingKind};

use super::round_to_ms;

/// Write the report to `w`: summary counts, each finding, an optional
/// explanation section, and the footer line.
pub fn write_report<W: Write>(
    w: &mut W,
    report: &AnalysisReport,
    explanation: Option<&str>,
) -> io::Result<()> {
    let separator = "━".repeat(40);

    let leaks = count_kind(&report.findings, FindingKind::GoroutineLeak);
    let deadlocks = count_kind(&report.findings, FindingKind::Deadlock);
    let long_blocks = count_kind(&report.findings, FindingKind::LongBlock);

    writeln!(w, "\nStalltrace Analysis")?;
    writeln!(w, "{separator}")?;
    writeln!(w)?;

    writeln!(w, "  {}", pluralize(leaks, "goroutine leak"))?;
    writeln!(w, "  {}", pluralize(deadlocks, "deadlock"))?;
    writeln!(w, "  {}", pluralize(long_blocks, "long block"))?;

    if report.findings.is_empty() {
        writeln!(w)?;
        writeln!(w, "  No concurrency issues detected.")?;
    }

    for finding in &report.findings {
        writeln!(w)?;
        write_finding(w, finding)?;
    }

    if let Some(explanation) = explanation {
        writeln!(w)?;
        writeln!(w, "  Claude's Analysis")?;
        writeln!(w)?;
        for line in explanation.trim().lines() {
            writeln!(w, "  {line}")?;
        }
    }

    writeln!(w)?;
    writeln!(w, "{separator}")?;
    writeln!(
        w,
        "  Analyzed {} goroutines · {}ms window · {}",
        report.goroutines_analyzed, report.duration_ms, report.trace_file
    )?;
    writeln!(w)?;
    Ok(())
}

fn write_finding<W: Write>(w: &mut W, f: &Finding) -> io::Result<()> {
    let header = match f.kind {
        FindingKind::GoroutineLeak => "● GOROUTINE LEAK",
        FindingKind::Deadlock => "● DEADLOCK",
        FindingKind::LongBlock => "● LONG BLOCK",
        FindingKind::LockLeak => "● LOCK LEAK",
    };
    writeln!(w, "{header}  ({} confidence)", f.confidence)?;

    writeln!(w, "  Goroutine {} blocked on: {}", f.goroutine_id, f.blocked_on)?;

    if f.blocked_for > Duration::ZERO {
        let rounded = Duration::from_millis(round_to_ms(f.blocked_for));
        writeln!(w, "  Blocked for: {}", humantime::format_duration(rounded))?;
    }

    if !f.location.is_empty() {
        writeln!(w, "  Location: {}", f.location)?;
    }

    if !f.stack.is_empty() {
        writeln!(w, "  Stack:")?;
        for line in f.stack.trim_end_matches('\n').lines() {
            writeln!(w, "  {line}")?;
        }
    }
    Ok(())
}

fn count_kind(findings: &[Finding], kind: FindingKind) -> usize {
    findings.iter().filter(|f| f.kind == kind).count()
}

fn pluralize(n: usize, noun: &str) -> String {
    if n == 1 {
        format!("{n} {noun}")
    } else {
        format!("{n} {noun}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Confidence, GoroutineId};

    fn sample_report() -> AnalysisReport {
        AnalysisReport {
            trace_file: "/tmp/trace.out".to_string(),
            duration_ms: 1234,
            goroutines_analyzed: 12,
            findings: vec![Finding {
                kind: FindingKind::GoroutineLeak,
                confidence: Confidence::High,
                goroutine_id: GoroutineId(21),
                blocked_on: "chan send".to_string(),
                blocked_for: Duration::from_millis(700),
                stack: "      main.worker (main.go:25)\n".to_string(),
                function: "main.worker".to_string(),
                location: "main.go:25".to_string(),
            }],
        }
    }

    fn render(report: &AnalysisReport, explanation: Option<&str>) -> String {
        let mut out = Vec::new();
        write_report(&mut out, report, explanation).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_report_sections() {
        let text = render(&sample_report(), None);
        assert!(text.contains("1 goroutine leak\n"));
        assert!(text.contains("0 deadlocks"));
        assert!(text.contains("● GOROUTINE LEAK  (high confidence)"));
        assert!(text.contains("Goroutine 21 blocked on: chan send"));
        assert!(text.contains("Blocked for: 700ms"));
        assert!(text.contains("Location: main.go:25"));
        assert!(text.contains("      main.worker (main.go:25)"));
        assert!(text.contains("Analyzed 12 goroutines · 1234ms window · /tmp/trace.out"));
    }

    #[test]
    fn test_clean_report_says_so() {
        let mut report = sample_report();
        report.findings.clear();
        let text = render(&report, None);
        assert!(text.contains("No concurrency issues detected."));
    }

    #[test]
    fn test_explanation_section() {
        let text = render(&sample_report(), Some("The sender has no receiver.\nAdd one."));
        assert!(text.contains("Claude's Analysis"));
        assert!(text.contains("  The sender has no receiver."));
        assert!(text.contains("  Add one."));
    }

    #[test]
    fn test_pluralize() {
        assert_eq!(pluralize(1, "deadlock"), "1 deadlock");
        assert_eq!(pluralize(0, "deadlock"), "0 deadlocks");
        assert_eq!(pluralize(3, "goroutine leak"), "3 goroutine leaks");
    }
}
