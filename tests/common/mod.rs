//! Shared helpers for building synthetic traces.
#![allow(dead_code)] // not every test binary uses every helper

use stalltrace::domain::{GoroutineId, TraceTime};
use stalltrace::trace::{GoState, StackFrame, TransitionEvent, Writer};
use tempfile::NamedTempFile;

/// Nanoseconds per millisecond, for readable timestamps.
pub const MS: u64 = 1_000_000;

/// Accumulates transition events and writes them as a trace file.
pub struct TraceBuilder {
    events: Vec<TransitionEvent>,
}

impl TraceBuilder {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn push(
        &mut self,
        time_ns: u64,
        gid: u64,
        from: GoState,
        to: GoState,
        reason: &str,
        stack: Vec<StackFrame>,
    ) -> &mut Self {
        self.events.push(TransitionEvent {
            time: TraceTime(time_ns),
            goroutine: GoroutineId(gid),
            from,
            to,
            reason: reason.to_string(),
            stack,
        });
        self
    }

    pub fn bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        let mut writer = Writer::new(&mut out).expect("write header");
        for event in &self.events {
            writer.state_transition(event).expect("write event");
        }
        drop(writer);
        out
    }

    pub fn write_to_file(&self) -> NamedTempFile {
        let file = NamedTempFile::new().expect("create temp trace");
        std::fs::write(file.path(), self.bytes()).expect("write temp trace");
        file
    }
}

/// A blocking stack with one runtime frame on top of a user frame.
pub fn user_stack(function: &str, file: &str, line: u32) -> Vec<StackFrame> {
    vec![
        StackFrame::new("runtime.gopark", "runtime/proc.go", 364),
        StackFrame::new(function, file, line),
    ]
}

/// A creation stack as produced by a `go` statement in a test body.
pub fn test_creation_stack(function: &str, file: &str, line: u32) -> Vec<StackFrame> {
    vec![
        StackFrame::new(function, file, line),
        StackFrame::new("testing.tRunner", "testing/testing.go", 1595),
    ]
}

/// A runtime-only creation stack, as library worker pools have.
pub fn runtime_stack() -> Vec<StackFrame> {
    vec![StackFrame::new("runtime.newproc", "runtime/proc.go", 4477)]
}
