//! Deadlock detectors: call-site groups, AB-BA inversions, and
//! channel-while-holding-lock cycles.
//!
//! The trace does not expose mutex addresses, so a shared call site is the
//! strongest available proxy for a shared lock. All three detectors lean on
//! that proxy, which caps their confidence at Medium: two goroutines at the
//! same `file:line` might still be touching different mutex instances.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use crate::domain::{
    is_channel_reason, Confidence, Finding, FindingKind, GoroutineId, Options, TraceTime,
    REASON_SYNC,
};

use super::state::GoroutineState;

/// How old a sync-history entry can be before the cross-goroutine detectors
/// assume the lock was released and ignore it.
const STALE_LOCK_WINDOW: Duration = Duration::from_secs(5);

/// How long a goroutine must sit on a sync primitive before it counts as a
/// deadlock participant.
const DEADLOCK_THRESHOLD: Duration = Duration::from_millis(500);

/// Identify partial deadlocks: goroutines stuck on a sync primitive at the
/// same call site past the threshold.
///
/// The runtime aborts on a *total* deadlock, so what a trace can show is a
/// subset of goroutines stuck while the rest make progress. Singleton groups
/// are emitted too: a single long-held lock is still suspicious.
pub fn detect_deadlocks(
    goroutines: &HashMap<GoroutineId, GoroutineState>,
    last_time: TraceTime,
    opts: &Options,
) -> Vec<Finding> {
    let mut threshold = DEADLOCK_THRESHOLD;
    if opts.min_block > Duration::ZERO && opts.min_block < threshold {
        threshold = opts.min_block;
    }

    // Group by (reason, location): same call site.
    let mut groups: HashMap<(String, String), Vec<(GoroutineId, &GoroutineState, Duration)>> =
        HashMap::new();

    for (gid, g) in goroutines {
        if !g.is_blocked || g.reason != REASON_SYNC {
            continue;
        }
        if g.stack.is_runtime_only() {
            continue;
        }
        let blocked = g.blocked_for(last_time);
        if blocked < threshold {
            continue;
        }
        groups
            .entry((g.reason.clone(), g.stack.location.clone()))
            .or_default()
            .push((*gid, g, blocked));
    }

    let mut findings = Vec::new();
    for ((reason, _location), members) in groups {
        // The longest-blocked goroutine represents the group.
        let Some(&(gid, g, blocked)) = members.iter().max_by_key(|m| m.2) else {
            continue;
        };

        findings.push(Finding {
            kind: FindingKind::Deadlock,
            confidence: Confidence::Medium,
            goroutine_id: gid,
            blocked_on: reason,
            blocked_for: blocked,
            stack: g.stack.text.clone(),
            function: g.stack.function.clone(),
            location: g.stack.location.clone(),
        });
    }

    findings
}

/// A directed lock edge: the owning goroutine recently acquired a lock at
/// `from` and now waits for one at `to`.
struct LockEdge<'a> {
    from: &'a str,
    to: &'a str,
    gid: GoroutineId,
    g: &'a GoroutineState,
}

/// Detect AB-BA lock-order inversions using the sync-unblock history.
///
/// For each goroutine blocked on sync at `L_wait`, every recent history
/// entry `L_held` contributes the edge `L_held → L_wait`. An inverse pair of
/// edges between two goroutines is an AB-BA deadlock: one holds A and waits
/// for B, the other holds B and waits for A. Using the full history instead
/// of only the most recent entry catches inversions where the first lock
/// was taken several operations back.
pub fn detect_abba(
    goroutines: &HashMap<GoroutineId, GoroutineState>,
    last_time: TraceTime,
) -> Vec<Finding> {
    let mut edges: Vec<LockEdge<'_>> = Vec::new();

    for (gid, g) in goroutines {
        if !g.is_blocked || g.reason != REASON_SYNC {
            continue;
        }
        if g.stack.is_runtime_only() {
            continue;
        }

        for entry in g.recent_sync_unblocks() {
            // Same call site: a single-goroutine double lock, which the
            // call-site grouping already covers.
            if entry.location.is_empty() || entry.location == g.stack.location {
                continue;
            }
            // Too old: the lock was likely released long ago.
            if last_time.saturating_since(entry.end_time) > STALE_LOCK_WINDOW {
                continue;
            }
            edges.push(LockEdge {
                from: &entry.location,
                to: &g.stack.location,
                gid: *gid,
                g,
            });
        }
    }

    let mut findings = Vec::new();
    let mut seen_pairs: HashSet<(String, String)> = HashSet::new();

    for i in 0..edges.len() {
        for j in i + 1..edges.len() {
            let (e1, e2) = (&edges[i], &edges[j]);
            if e1.from != e2.to || e1.to != e2.from {
                continue;
            }
            // Canonical unordered pair so (A,B) and (B,A) collapse.
            let key = if e1.from <= e1.to {
                (e1.from.to_string(), e1.to.to_string())
            } else {
                (e1.to.to_string(), e1.from.to_string())
            };
            if !seen_pairs.insert(key) {
                continue;
            }

            findings.push(Finding {
                kind: FindingKind::Deadlock,
                confidence: Confidence::Medium,
                goroutine_id: e1.gid,
                blocked_on: "sync (AB-BA lock inversion)".to_string(),
                blocked_for: e1.g.blocked_for(last_time),
                stack: e1.g.stack.text.clone(),
                function: e1.g.stack.function.clone(),
                location: e1.g.stack.location.clone(),
            });
        }
    }

    findings
}

/// Detect the cycle where a goroutine holds a lock and blocks on a channel
/// while another goroutine waits for that lock.
///
/// The holder waits for a channel peer that can never arrive, because the
/// would-be peer is stuck on the holder's lock.
pub fn detect_chan_lock_cycle(
    goroutines: &HashMap<GoroutineId, GoroutineState>,
    last_time: TraceTime,
) -> Vec<Finding> {
    // Sites at which some goroutine currently waits for a lock.
    let mut lock_waiters: HashSet<&str> = HashSet::new();
    for g in goroutines.values() {
        if !g.is_blocked || g.reason != REASON_SYNC {
            continue;
        }
        if g.stack.is_runtime_only() {
            continue;
        }
        lock_waiters.insert(g.stack.location.as_str());
    }

    let mut findings = Vec::new();
    let mut seen_locks: HashSet<&str> = HashSet::new();

    for (gid, g) in goroutines {
        if !g.is_blocked || !is_channel_reason(&g.reason) {
            continue;
        }
        if g.prev_sync_location.is_empty() {
            continue;
        }
        if g.stack.is_runtime_only() {
            continue;
        }
        // Lock probably released by now.
        if last_time.saturating_since(g.prev_sync_end_time) > STALE_LOCK_WINDOW {
            continue;
        }
        if !lock_waiters.contains(g.prev_sync_location.as_str()) {
            continue;
        }
        if !seen_locks.insert(g.prev_sync_location.as_str()) {
            continue;
        }

        findings.push(Finding {
            kind: FindingKind::Deadlock,
            confidence: Confidence::Medium,
            goroutine_id: *gid,
            blocked_on: format!("{} (holds lock; lock waiter cannot unblock channel)", g.reason),
            blocked_for: g.blocked_for(last_time),
            stack: g.stack.text.clone(),
            function: g.stack.function.clone(),
            location: g.stack.location.clone(),
        });
    }

    findings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify;
    use crate::trace::StackFrame;

    const SECOND: u64 = 1_000_000_000;

    fn user_extracted(file: &str, line: u32) -> crate::classify::ExtractedStack {
        classify::extract(&[
            StackFrame::new("runtime.gopark", "runtime/proc.go", 364),
            StackFrame::new("main.worker", file, line),
        ])
    }

    fn sync_blocked(start_ns: u64, file: &str, line: u32) -> GoroutineState {
        GoroutineState {
            is_blocked: true,
            reason: REASON_SYNC.to_string(),
            block_start: TraceTime(start_ns),
            stack: user_extracted(file, line),
            ..Default::default()
        }
    }

    fn chan_blocked(reason: &str, start_ns: u64, file: &str, line: u32) -> GoroutineState {
        GoroutineState {
            is_blocked: true,
            reason: reason.to_string(),
            block_start: TraceTime(start_ns),
            stack: user_extracted(file, line),
            ..Default::default()
        }
    }

    fn snapshot(states: Vec<(u64, GoroutineState)>) -> HashMap<GoroutineId, GoroutineState> {
        states.into_iter().map(|(id, g)| (GoroutineId(id), g)).collect()
    }

    #[test]
    fn test_group_emits_one_finding_with_longest_blocked_representative() {
        let last = TraceTime(SECOND);
        let goroutines = snapshot(vec![
            (1, sync_blocked(300_000_000, "p.go", 44)),
            (2, sync_blocked(100_000_000, "p.go", 44)),
            (3, sync_blocked(200_000_000, "p.go", 44)),
        ]);

        let findings = detect_deadlocks(&goroutines, last, &Options::default());
        assert_eq!(findings.len(), 1);
        let f = &findings[0];
        assert_eq!(f.kind, FindingKind::Deadlock);
        assert_eq!(f.confidence, Confidence::Medium);
        assert_eq!(f.goroutine_id, GoroutineId(2));
        assert_eq!(f.blocked_for, Duration::from_millis(900));
        assert_eq!(f.location, "p.go:44");
    }

    #[test]
    fn test_distinct_sites_form_distinct_groups() {
        let last = TraceTime(2 * SECOND);
        let goroutines = snapshot(vec![
            (1, sync_blocked(0, "a.go", 10)),
            (2, sync_blocked(0, "b.go", 20)),
        ]);
        let findings = detect_deadlocks(&goroutines, last, &Options::default());
        assert_eq!(findings.len(), 2);
    }

    #[test]
    fn test_threshold_is_capped_at_500ms() {
        // min_block of 10s must not raise the deadlock threshold.
        let opts = Options { min_block: Duration::from_secs(10), ..Default::default() };
        let last = TraceTime(700_000_000);
        let goroutines = snapshot(vec![(1, sync_blocked(0, "p.go", 44))]);
        assert_eq!(detect_deadlocks(&goroutines, last, &opts).len(), 1);
    }

    #[test]
    fn test_small_min_block_lowers_threshold() {
        let opts = Options { min_block: Duration::from_millis(100), ..Default::default() };
        let last = TraceTime(200_000_000);
        let goroutines = snapshot(vec![(1, sync_blocked(0, "p.go", 44))]);
        assert_eq!(detect_deadlocks(&goroutines, last, &opts).len(), 1);
        // Default 500ms threshold would have skipped a 200ms block.
        assert!(detect_deadlocks(&goroutines, last, &Options::default()).is_empty());
    }

    #[test]
    fn test_short_blocks_and_non_sync_excluded() {
        let last = TraceTime(SECOND);
        let goroutines = snapshot(vec![
            (1, sync_blocked(900_000_000, "p.go", 44)),
            (2, chan_blocked("chan send", 0, "p.go", 44)),
        ]);
        assert!(detect_deadlocks(&goroutines, last, &Options::default()).is_empty());
    }

    #[test]
    fn test_abba_inverse_edges_detected_once() {
        let last = TraceTime(2 * SECOND);

        // G1 acquired A recently, now waits at B.
        let mut g1 = sync_blocked(SECOND, "b.go", 20);
        g1.push_sync_unblock("a.go:10".to_string(), TraceTime(SECOND));

        // G2 acquired B recently, now waits at A.
        let mut g2 = sync_blocked(SECOND, "a.go", 10);
        g2.push_sync_unblock("b.go:20".to_string(), TraceTime(SECOND));

        let goroutines = snapshot(vec![(1, g1), (2, g2)]);
        let findings = detect_abba(&goroutines, last);

        assert_eq!(findings.len(), 1);
        let f = &findings[0];
        assert_eq!(f.kind, FindingKind::Deadlock);
        assert_eq!(f.blocked_on, "sync (AB-BA lock inversion)");
        assert_eq!(f.confidence, Confidence::Medium);
    }

    #[test]
    fn test_abba_found_through_deep_history() {
        let last = TraceTime(3 * SECOND);

        // G1's acquisition of A is three unblocks back but still fresh.
        let mut g1 = sync_blocked(2 * SECOND, "b.go", 20);
        g1.push_sync_unblock("a.go:10".to_string(), TraceTime(SECOND));
        g1.push_sync_unblock("c.go:30".to_string(), TraceTime(SECOND + 1));
        g1.push_sync_unblock("d.go:40".to_string(), TraceTime(SECOND + 2));

        let mut g2 = sync_blocked(2 * SECOND, "a.go", 10);
        g2.push_sync_unblock("b.go:20".to_string(), TraceTime(SECOND));

        let goroutines = snapshot(vec![(1, g1), (2, g2)]);
        assert_eq!(detect_abba(&goroutines, last).len(), 1);
    }

    #[test]
    fn test_abba_stale_entries_ignored() {
        let last = TraceTime(10 * SECOND);

        let mut g1 = sync_blocked(9 * SECOND, "b.go", 20);
        g1.push_sync_unblock("a.go:10".to_string(), TraceTime(SECOND)); // 9s old

        let mut g2 = sync_blocked(9 * SECOND, "a.go", 10);
        g2.push_sync_unblock("b.go:20".to_string(), TraceTime(9 * SECOND));

        let goroutines = snapshot(vec![(1, g1), (2, g2)]);
        assert!(detect_abba(&goroutines, last).is_empty());
    }

    #[test]
    fn test_abba_same_site_entries_skipped() {
        let last = TraceTime(2 * SECOND);

        // History entry at the wait site itself: a re-lock, not an
        // inversion.
        let mut g1 = sync_blocked(SECOND, "a.go", 10);
        g1.push_sync_unblock("a.go:10".to_string(), TraceTime(SECOND));

        let mut g2 = sync_blocked(SECOND, "a.go", 10);
        g2.push_sync_unblock("a.go:10".to_string(), TraceTime(SECOND));

        let goroutines = snapshot(vec![(1, g1), (2, g2)]);
        assert!(detect_abba(&goroutines, last).is_empty());
    }

    #[test]
    fn test_abba_runtime_stack_excluded() {
        let last = TraceTime(2 * SECOND);

        let mut g1 = sync_blocked(SECOND, "b.go", 20);
        g1.stack = classify::extract(&[StackFrame::new("runtime.gopark", "runtime/proc.go", 364)]);
        g1.push_sync_unblock("a.go:10".to_string(), TraceTime(SECOND));

        let mut g2 = sync_blocked(SECOND, "a.go", 10);
        g2.push_sync_unblock("b.go:20".to_string(), TraceTime(SECOND));

        let goroutines = snapshot(vec![(1, g1), (2, g2)]);
        assert!(detect_abba(&goroutines, last).is_empty());
    }

    #[test]
    fn test_chan_lock_cycle() {
        let last = TraceTime(2 * SECOND);

        // G1 acquired the lock at m.go:5, now blocked sending at m.go:12.
        let mut holder = chan_blocked("chan send", SECOND, "m.go", 12);
        holder.push_sync_unblock("m.go:5".to_string(), TraceTime(SECOND));

        // G2 waits for that lock.
        let waiter = sync_blocked(SECOND, "m.go", 5);

        let goroutines = snapshot(vec![(1, holder), (2, waiter)]);
        let findings = detect_chan_lock_cycle(&goroutines, last);

        assert_eq!(findings.len(), 1);
        let f = &findings[0];
        assert_eq!(f.kind, FindingKind::Deadlock);
        assert_eq!(f.confidence, Confidence::Medium);
        assert_eq!(f.location, "m.go:12");
        assert_eq!(f.blocked_on, "chan send (holds lock; lock waiter cannot unblock channel)");
    }

    #[test]
    fn test_chan_lock_cycle_requires_waiter() {
        let last = TraceTime(2 * SECOND);
        let mut holder = chan_blocked("chan receive", SECOND, "m.go", 12);
        holder.push_sync_unblock("m.go:5".to_string(), TraceTime(SECOND));

        let goroutines = snapshot(vec![(1, holder)]);
        assert!(detect_chan_lock_cycle(&goroutines, last).is_empty());
    }

    #[test]
    fn test_chan_lock_cycle_stale_lock_skipped() {
        let last = TraceTime(10 * SECOND);
        let mut holder = chan_blocked("chan send", 9 * SECOND, "m.go", 12);
        holder.push_sync_unblock("m.go:5".to_string(), TraceTime(SECOND)); // 9s old

        let waiter = sync_blocked(9 * SECOND, "m.go", 5);

        let goroutines = snapshot(vec![(1, holder), (2, waiter)]);
        assert!(detect_chan_lock_cycle(&goroutines, last).is_empty());
    }

    #[test]
    fn test_chan_lock_cycle_deduplicates_by_lock_site() {
        let last = TraceTime(2 * SECOND);

        let mut h1 = chan_blocked("chan send", SECOND, "m.go", 12);
        h1.push_sync_unblock("m.go:5".to_string(), TraceTime(SECOND));
        let mut h2 = chan_blocked("chan send", SECOND, "m.go", 13);
        h2.push_sync_unblock("m.go:5".to_string(), TraceTime(SECOND));

        let waiter = sync_blocked(SECOND, "m.go", 5);

        let goroutines = snapshot(vec![(1, h1), (2, h2), (3, waiter)]);
        assert_eq!(detect_chan_lock_cycle(&goroutines, last).len(), 1);
    }
}
