//! Leak, long-block, transient-block, and orphan detectors.
//!
//! All three detectors are pure functions over the final snapshot: state in,
//! findings out. Every filter is a skip; nothing here returns errors.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use crate::domain::{
    is_channel_reason, Confidence, Finding, FindingKind, GoroutineId, Options, TraceTime,
    REASON_SLEEP, REASON_SYNC,
};

use super::state::GoroutineState;

/// Traces shorter than this are the "test exited immediately" regime in
/// which the orphan detector runs. On longer traces, alive non-blocked
/// goroutines are normal workers.
const ORPHAN_TRACE_WINDOW: Duration = Duration::from_millis(200);

/// Classify goroutines still blocked at the end of the trace.
///
/// Channel blocks become leaks; anything else blocked longer than
/// `min_block` becomes a long block. The provenance filter applies to
/// channel and miscellaneous blocks but not to sync blocks: test goroutines
/// that deadlock on mutexes have user code in their blocking stack but
/// runtime/testing code in their creation stack, so filtering on creation
/// would hide real deadlocks.
pub fn detect_leaks(
    goroutines: &HashMap<GoroutineId, GoroutineState>,
    last_time: TraceTime,
    opts: &Options,
) -> Vec<Finding> {
    let mut findings = Vec::new();

    for (gid, g) in goroutines {
        if !g.is_blocked {
            continue;
        }
        // Blocking-stack filter always applies.
        if g.stack.is_runtime_only() {
            continue;
        }
        // The main goroutine sleeping intentionally is not a bug.
        if g.reason == REASON_SLEEP {
            continue;
        }

        let is_chan = is_channel_reason(&g.reason);
        let is_sync = g.reason == REASON_SYNC;

        if is_chan {
            if !g.creation_seen {
                continue;
            }
            // Only filter goroutines created by non-testing runtime code
            // (e.g. net/http worker pools). Goroutines created by
            // testing.T.Run carry user test code and stay reportable.
            if g.creation_stack.is_non_test_runtime_only() {
                continue;
            }
        }
        // Non-channel, non-sync blocks (select, etc.) also need provenance.
        if !is_chan && !is_sync && (!g.creation_seen || g.creation_stack.is_non_test_runtime_only())
        {
            continue;
        }

        let blocked = g.blocked_for(last_time);

        let (kind, confidence) = if is_chan {
            (FindingKind::GoroutineLeak, Confidence::High)
        } else {
            if blocked < opts.min_block {
                continue;
            }
            (FindingKind::LongBlock, Confidence::Medium)
        };

        findings.push(Finding {
            kind,
            confidence,
            goroutine_id: *gid,
            blocked_on: g.reason.clone(),
            blocked_for: blocked,
            stack: g.stack.text.clone(),
            function: g.stack.function.clone(),
            location: g.stack.location.clone(),
        });
    }

    findings
}

/// Recover sync blocks that resolved before trace end.
///
/// When the harness timeout kills a deadlock, the goroutine's final state is
/// no longer blocked, but the peak completed block preserved in the
/// `prev_long_*` fields still proves it. One finding per site.
pub fn detect_transient_blocks(
    goroutines: &HashMap<GoroutineId, GoroutineState>,
    opts: &Options,
) -> Vec<Finding> {
    let mut findings = Vec::new();
    let mut seen_locations = HashSet::new();

    for (gid, g) in goroutines {
        if g.prev_long_duration < opts.min_block {
            continue;
        }
        if g.prev_long_stack.is_runtime_only() {
            continue;
        }
        if !seen_locations.insert(g.prev_long_stack.location.clone()) {
            continue;
        }

        findings.push(Finding {
            kind: FindingKind::LongBlock,
            confidence: Confidence::Medium,
            goroutine_id: *gid,
            blocked_on: g.prev_long_reason.clone(),
            blocked_for: g.prev_long_duration,
            stack: g.prev_long_stack.text.clone(),
            function: g.prev_long_stack.function.clone(),
            location: g.prev_long_stack.location.clone(),
        });
    }

    findings
}

/// Surface goroutines that were created but never ran and never died during
/// a very short trace.
///
/// Targets the pattern where a test spawns goroutines just before returning,
/// leaving them unscheduled. Low confidence by construction.
pub fn detect_orphans(
    goroutines: &HashMap<GoroutineId, GoroutineState>,
    trace_duration: Duration,
) -> Vec<Finding> {
    if trace_duration >= ORPHAN_TRACE_WINDOW {
        return Vec::new();
    }

    let mut findings = Vec::new();
    for (gid, g) in goroutines {
        if g.dead || g.is_blocked || !g.creation_seen {
            continue;
        }
        if g.creation_stack.is_non_test_runtime_only() {
            continue;
        }
        // The goroutine never blocked, so its current stack is empty;
        // without a creation function there is nothing to point at.
        if g.stack.is_runtime_only() && g.creation_stack.function.is_empty() {
            continue;
        }

        findings.push(Finding {
            kind: FindingKind::GoroutineLeak,
            confidence: Confidence::Low,
            goroutine_id: *gid,
            blocked_on: "never ran (test exited before goroutine was scheduled)".to_string(),
            blocked_for: trace_duration,
            stack: g.creation_stack.text.clone(),
            function: g.creation_stack.function.clone(),
            location: g.creation_stack.location.clone(),
        });
    }

    findings
}
