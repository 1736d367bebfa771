//! Per-goroutine state engine.
//!
//! [`StateEngine`] consumes the trace's state-transition stream and keeps
//! one [`GoroutineState`] per goroutine id. Records are created on first
//! reference and accumulate history monotonically until end of trace;
//! nothing is freed while analysis runs.
//!
//! Memory per goroutine is bounded: constant fields plus a five-entry
//! circular buffer of recent sync unblocks. The buffer preserves insertion
//! order so the AB-BA detector can skip stale entries while still seeing
//! lock acquisitions from several operations back.

use std::collections::HashMap;
use std::time::Duration;

use crate::classify::{self, ExtractedStack};
use crate::domain::{GoroutineId, TraceTime, REASON_SYNC};
use crate::trace::{GoState, TransitionEvent};

/// Number of recent sync-unblock sites remembered per goroutine.
pub const SYNC_HISTORY_SIZE: usize = 5;

/// One completed sync wait: the site at which the lock was acquired and
/// when the wait ended.
#[derive(Debug, Clone, Default)]
pub struct SyncEntry {
    pub location: String,
    pub end_time: TraceTime,
}

/// Parse state for a single goroutine.
#[derive(Debug, Default)]
pub struct GoroutineState {
    // Current block. `is_blocked` iff reason and block_start are live.
    pub is_blocked: bool,
    pub reason: String,
    pub block_start: TraceTime,
    pub stack: ExtractedStack,

    // Provenance: filled when the birth transition is observed. When
    // `creation_seen` is false the goroutine predates the trace.
    pub creation_seen: bool,
    pub creation_stack: ExtractedStack,

    // Set on transition to NotExist.
    pub dead: bool,

    // Longest completed sync block observed so far.
    pub prev_long_reason: String,
    pub prev_long_stack: ExtractedStack,
    pub prev_long_duration: Duration,

    // Circular buffer of the last SYNC_HISTORY_SIZE sync unblocks.
    // `sync_history_idx` counts total writes, not capped at the capacity.
    pub(crate) sync_history: [SyncEntry; SYNC_HISTORY_SIZE],
    pub(crate) sync_history_idx: usize,

    // Most-recent sync unblock, kept as a shortcut for the channel/lock
    // cycle detector which only needs one entry.
    pub prev_sync_location: String,
    pub prev_sync_end_time: TraceTime,
}

impl GoroutineState {
    /// Record one completed sync wait ending at `end_time` with the lock
    /// acquired at `location`.
    pub fn push_sync_unblock(&mut self, location: String, end_time: TraceTime) {
        let pos = self.sync_history_idx % SYNC_HISTORY_SIZE;
        self.sync_history[pos] = SyncEntry { location: location.clone(), end_time };
        self.sync_history_idx += 1;
        self.prev_sync_location = location;
        self.prev_sync_end_time = end_time;
    }

    /// Recent sync unblocks, most recent first. Slots never written are
    /// excluded.
    #[must_use]
    pub fn recent_sync_unblocks(&self) -> Vec<&SyncEntry> {
        let n = self.sync_history_idx.min(SYNC_HISTORY_SIZE);
        let mut entries = Vec::with_capacity(n);
        for i in 0..n {
            let pos = (self.sync_history_idx - 1 - i) % SYNC_HISTORY_SIZE;
            let entry = &self.sync_history[pos];
            if !entry.location.is_empty() {
                entries.push(entry);
            }
        }
        entries
    }

    /// How long the goroutine has been in its current block as of `now`.
    #[must_use]
    pub fn blocked_for(&self, now: TraceTime) -> Duration {
        now.saturating_since(self.block_start)
    }

    fn clear_current_block(&mut self) {
        self.is_blocked = false;
        self.reason.clear();
        self.stack = ExtractedStack::default();
    }
}

/// Streaming state machine over the whole trace.
#[derive(Debug, Default)]
pub struct StateEngine {
    goroutines: HashMap<GoroutineId, GoroutineState>,
    first_time: Option<TraceTime>,
    last_time: TraceTime,
}

impl StateEngine {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one state transition.
    pub fn apply(&mut self, event: &TransitionEvent) {
        if self.first_time.is_none() {
            self.first_time = Some(event.time);
        }
        self.last_time = event.time;

        let g = self.goroutines.entry(event.goroutine).or_default();

        // Birth: record provenance.
        if event.from == GoState::NotExist {
            g.creation_stack = classify::extract(&event.stack);
            g.creation_seen = true;
        }

        // Death. A dead goroutine cannot also be blocked.
        if event.to == GoState::NotExist {
            g.dead = true;
            g.clear_current_block();
        }

        // Just blocked.
        if event.from.executing() && event.to == GoState::Waiting {
            g.is_blocked = true;
            g.reason = event.reason.clone();
            g.block_start = event.time;
            g.stack = classify::extract(&event.stack);
        }

        // Just unblocked. Waiting→Runnable counts: wakeups via close(ch)
        // or a condvar signal pass through Runnable before running.
        if event.from == GoState::Waiting
            && (event.to.executing() || event.to == GoState::Runnable)
        {
            if g.is_blocked && g.reason == REASON_SYNC {
                let duration = event.time.saturating_since(g.block_start);
                if duration > g.prev_long_duration {
                    g.prev_long_reason = g.reason.clone();
                    g.prev_long_stack = g.stack.clone();
                    g.prev_long_duration = duration;
                }
                g.push_sync_unblock(g.stack.location.clone(), event.time);
            }
            g.clear_current_block();
        }
    }

    /// Timestamp of the latest event seen.
    #[must_use]
    pub fn last_time(&self) -> TraceTime {
        self.last_time
    }

    /// Wall-clock span covered by the trace.
    #[must_use]
    pub fn trace_duration(&self) -> Duration {
        match self.first_time {
            Some(first) => self.last_time.saturating_since(first),
            None => Duration::ZERO,
        }
    }

    /// Final snapshot for the detectors.
    #[must_use]
    pub fn goroutines(&self) -> &HashMap<GoroutineId, GoroutineState> {
        &self.goroutines
    }
}
