//! Core domain types.
//!
//! Newtypes for trace-supplied identifiers and timestamps, plus the finding
//! vocabulary shared by the detectors and the reporters. Finding kinds and
//! confidence levels are sum types; their string forms exist only at the
//! serialization boundary.

use std::fmt;
use std::time::Duration;

/// Identifier of a goroutine as carried in the trace.
///
/// Values are compared and hashed but never otherwise interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct GoroutineId(pub u64);

impl fmt::Display for GoroutineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Delegate so width and alignment flags apply to the number.
        self.0.fmt(f)
    }
}

/// Nanosecond timestamp measured from the trace origin.
///
/// Timestamps are monotonically non-decreasing within a trace; differences
/// yield wall-clock durations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct TraceTime(pub u64);

impl TraceTime {
    /// Duration elapsed since `earlier`, saturating at zero.
    #[must_use]
    pub fn saturating_since(self, earlier: TraceTime) -> Duration {
        Duration::from_nanos(self.0.saturating_sub(earlier.0))
    }
}

/// Block reason string the trace uses for all sync primitives
/// (`Mutex.Lock`, `RWMutex.Lock`/`RLock`, `Cond.Wait` — the trace does not
/// discriminate between them).
pub const REASON_SYNC: &str = "sync";

/// Block reason for an intentional timer sleep.
pub const REASON_SLEEP: &str = "sleep";

/// Returns true for the two channel block reasons.
#[must_use]
pub fn is_channel_reason(reason: &str) -> bool {
    matches!(reason, "chan send" | "chan receive")
}

/// Category of a detected concurrency issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FindingKind {
    /// A goroutine permanently blocked on a channel operation.
    GoroutineLeak,
    /// Goroutines stuck on a sync primitive (call-site group, AB-BA
    /// inversion, or channel/lock cycle).
    Deadlock,
    /// A block that exceeded the configured threshold.
    LongBlock,
    /// A lock not released on all paths (static collaborator only).
    LockLeak,
}

impl FindingKind {
    /// Serialized form used by the JSON report.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            FindingKind::GoroutineLeak => "goroutine_leak",
            FindingKind::Deadlock => "deadlock",
            FindingKind::LongBlock => "long_block",
            FindingKind::LockLeak => "lock_leak",
        }
    }
}

/// How certain the analyzer is about a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    /// Serialized form used by the JSON report.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Confidence::High => "high",
            Confidence::Medium => "medium",
            Confidence::Low => "low",
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single detected concurrency issue.
#[derive(Debug, Clone)]
pub struct Finding {
    pub kind: FindingKind,
    pub confidence: Confidence,
    pub goroutine_id: GoroutineId,
    /// What the goroutine is blocked on, e.g. `chan send` or
    /// `sync (AB-BA lock inversion)`.
    pub blocked_on: String,
    pub blocked_for: Duration,
    /// Rendered stack trace, one frame per line.
    pub stack: String,
    /// Top user-code function.
    pub function: String,
    /// `file:line` of the top user-code frame.
    pub location: String,
}

/// All findings from one analysis pass.
#[derive(Debug)]
pub struct AnalysisReport {
    pub trace_file: String,
    pub duration_ms: i64,
    pub goroutines_analyzed: usize,
    pub findings: Vec<Finding>,
}

/// Controls analysis behavior.
#[derive(Debug, Clone)]
pub struct Options {
    /// Minimum block duration to flag as a long block.
    pub min_block: Duration,
    /// Dump goroutines filtered out of findings to the diagnostic sink.
    pub debug_filtered: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self { min_block: Duration::from_secs(1), debug_filtered: false }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_reason_categories() {
        assert!(is_channel_reason("chan send"));
        assert!(is_channel_reason("chan receive"));
        assert!(!is_channel_reason("sync"));
        assert!(!is_channel_reason("select"));
        assert!(!is_channel_reason("chan"));
    }

    #[test]
    fn test_trace_time_saturating_since() {
        let early = TraceTime(1_000);
        let late = TraceTime(5_000);
        assert_eq!(late.saturating_since(early), Duration::from_nanos(4_000));
        assert_eq!(early.saturating_since(late), Duration::ZERO);
    }

    #[test]
    fn test_kind_and_confidence_wire_names() {
        assert_eq!(FindingKind::GoroutineLeak.as_str(), "goroutine_leak");
        assert_eq!(FindingKind::LockLeak.as_str(), "lock_leak");
        assert_eq!(Confidence::High.as_str(), "high");
    }

    #[test]
    fn test_default_options() {
        let opts = Options::default();
        assert_eq!(opts.min_block, Duration::from_secs(1));
        assert!(!opts.debug_filtered);
    }
}
