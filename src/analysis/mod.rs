//! Trace analysis: state engine, detectors, and the orchestrator.
//!
//! This module contains pure detection logic, separated from capture and
//! presentation. [`analyze`] is the single entry point: it streams the trace
//! through the state engine, then runs the six detectors over the final
//! snapshot and concatenates their findings.
//!
//! ```text
//! trace file ──► Reader ──► StateEngine ──► snapshot
//!                                             │
//!                  ┌──────────────────────────┤
//!                  ▼            ▼             ▼
//!            leaks/long     deadlock      orphans /
//!              blocks      groups, AB-BA, transient
//!                          chan+lock cycle
//!                  └──────────┬──────────────┘
//!                             ▼
//!                      AnalysisReport
//! ```
//!
//! Findings are never deduplicated across detectors: a goroutine may appear
//! in several findings when each carries distinct evidence.

pub mod deadlock;
pub mod leaks;
pub mod state;

pub use state::{GoroutineState, StateEngine, SyncEntry, SYNC_HISTORY_SIZE};

use log::warn;
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::Path;

use crate::domain::{
    is_channel_reason, AnalysisReport, GoroutineId, Options, TraceError, TraceTime, REASON_SLEEP,
    REASON_SYNC,
};
use crate::trace::Reader;

/// Read a trace file and return all findings.
///
/// Open and header failures surface to the caller. A mid-stream decode
/// error is logged once and terminates ingestion; the state accumulated up
/// to that point is still analyzed.
pub fn analyze(path: impl AsRef<Path>, opts: &Options) -> Result<AnalysisReport, TraceError> {
    let path = path.as_ref();
    let reader = Reader::open(path)?;

    let mut engine = StateEngine::new();
    for item in reader {
        match item {
            Ok(event) => engine.apply(&event),
            Err(err) => {
                warn!("read event: {err}");
                break;
            }
        }
    }

    let last_time = engine.last_time();
    let trace_duration = engine.trace_duration();
    let goroutines = engine.goroutines();

    if opts.debug_filtered {
        let stderr = io::stderr();
        // Diagnostics are best-effort; a closed stderr must not fail analysis.
        let _ = write_debug_filtered(&mut stderr.lock(), goroutines, last_time);
    }

    let mut findings = leaks::detect_leaks(goroutines, last_time, opts);
    findings.extend(deadlock::detect_deadlocks(goroutines, last_time, opts));
    findings.extend(leaks::detect_transient_blocks(goroutines, opts));
    findings.extend(deadlock::detect_abba(goroutines, last_time));
    findings.extend(deadlock::detect_chan_lock_cycle(goroutines, last_time));
    findings.extend(leaks::detect_orphans(goroutines, trace_duration));

    Ok(AnalysisReport {
        trace_file: path.display().to_string(),
        duration_ms: trace_duration.as_millis() as i64,
        goroutines_analyzed: goroutines.len(),
        findings,
    })
}

/// Dump every blocked goroutine with the filter that would reject it.
///
/// Operator aid for diagnosing why a specific goroutine is missing from the
/// findings. Codes: `blocking-stack=runtime`, `reason=sleep`,
/// `chan-block+creation-stack=runtime`,
/// `non-chan-sync-block+creation-stack=runtime`, or `REPORTED`.
pub fn write_debug_filtered<W: Write>(
    w: &mut W,
    goroutines: &HashMap<GoroutineId, GoroutineState>,
    last_time: TraceTime,
) -> io::Result<()> {
    writeln!(w, "=== --debug-filtered: blocked goroutines at trace end ===")?;
    for (gid, g) in goroutines {
        if !g.is_blocked {
            continue;
        }
        let blocked = g.blocked_for(last_time);
        let runtime_blocking = g.stack.is_runtime_only();
        let runtime_creation = !g.creation_seen || g.creation_stack.is_runtime_only();
        let is_chan = is_channel_reason(&g.reason);

        let filter_reason = if runtime_blocking {
            "blocking-stack=runtime"
        } else if g.reason == REASON_SLEEP {
            "reason=sleep"
        } else if is_chan && runtime_creation {
            "chan-block+creation-stack=runtime"
        } else if !is_chan && g.reason != REASON_SYNC && runtime_creation {
            "non-chan-sync-block+creation-stack=runtime"
        } else {
            ""
        };

        let status = if filter_reason.is_empty() {
            "REPORTED".to_string()
        } else {
            format!("FILTERED({filter_reason})")
        };

        writeln!(
            w,
            "  G{:<6} {:<40} reason={:<12} blocked={:<10} {}",
            gid,
            truncate_tail(&g.stack.location, 40),
            g.reason,
            format!("{blocked:?}"),
            status
        )?;
        for line in g.stack.text.lines() {
            writeln!(w, "            {line}")?;
        }
        if runtime_creation && !g.creation_stack.text.is_empty() {
            writeln!(w, "          created at (runtime):")?;
            for line in g.creation_stack.text.lines() {
                writeln!(w, "            {line}")?;
            }
        }
    }

    writeln!(w, "=== alive non-blocked goroutines ===")?;
    for (gid, g) in goroutines {
        if g.is_blocked || g.dead || !g.creation_seen {
            continue;
        }
        writeln!(
            w,
            "  G{:<6} {:<40} runtimeCreation={}",
            gid,
            truncate_tail(&g.creation_stack.location, 40),
            g.creation_stack.is_runtime_only()
        )?;
    }
    writeln!(w, "=== end debug-filtered ===")?;
    Ok(())
}

/// Keep the last `n` characters, marking the cut with a leading ellipsis.
fn truncate_tail(s: &str, n: usize) -> String {
    if s.len() <= n {
        return s.to_string();
    }
    let tail_start = s.len() - (n - 3);
    format!("...{}", &s[tail_start..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify;
    use crate::trace::StackFrame;

    #[test]
    fn test_truncate_tail() {
        assert_eq!(truncate_tail("short.go:1", 40), "short.go:1");
        let long = "very/long/path/to/some/package/file.go:123";
        let cut = truncate_tail(long, 20);
        assert_eq!(cut.len(), 20);
        assert!(cut.starts_with("..."));
        assert!(cut.ends_with("file.go:123"));
    }

    #[test]
    fn test_debug_dump_codes() {
        let mut goroutines = HashMap::new();

        let mut reported = GoroutineState::default();
        reported.is_blocked = true;
        reported.reason = "chan send".to_string();
        reported.block_start = TraceTime(0);
        reported.stack = classify::extract(&[StackFrame::new("main.w", "main.go", 5)]);
        reported.creation_seen = true;
        reported.creation_stack =
            classify::extract(&[StackFrame::new("main.spawn", "main.go", 2)]);
        goroutines.insert(GoroutineId(1), reported);

        let mut sleeper = GoroutineState::default();
        sleeper.is_blocked = true;
        sleeper.reason = REASON_SLEEP.to_string();
        sleeper.stack = classify::extract(&[StackFrame::new("main.nap", "main.go", 9)]);
        goroutines.insert(GoroutineId(2), sleeper);

        let mut out = Vec::new();
        write_debug_filtered(&mut out, &goroutines, TraceTime(1_000_000)).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("REPORTED"));
        assert!(text.contains("FILTERED(reason=sleep)"));
        assert!(text.contains("=== end debug-filtered ==="));
    }
}
