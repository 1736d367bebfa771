//! Stack classification for distinguishing user code from runtime internals.
//!
//! This module provides the heuristics that decide whether a goroutine's
//! stack is entirely Go runtime machinery or carries user code. The
//! distinction drives every detector filter: a goroutine whose blocking
//! stack is all-runtime is a background worker, not a user bug.
//!
//! # Classification Strategy
//!
//! 1. **Function name prefixes** - `runtime.`, `runtime2.`, `testing.`
//! 2. **File path patterns** - `runtime/`, `/runtime/trace`, `_testmain.go`
//!
//! The `testing.` prefix is deliberately part of the *runtime* set: frames
//! of the test framework are not user code. But a creation stack that is
//! runtime-only *because* of testing frames marks a goroutine spawned by
//! `testing.T.Run` — such goroutines run user test bodies and must not be
//! filtered like `net/http` worker pools. [`is_non_test_runtime_only`]
//! encodes exactly that distinction, and it is where most of the tuning in
//! this crate lives.

use std::fmt::Write as _;

use crate::trace::StackFrame;

/// Function-name prefixes that mark a frame as runtime machinery.
const RUNTIME_FUNC_PREFIXES: &[&str] = &["runtime.", "runtime2.", "testing."];

/// File-path fragments that mark a frame as runtime machinery.
const RUNTIME_FILE_PATTERNS: &[&str] = &["runtime/", "/runtime/trace", "_testmain.go"];

/// A rendered stack together with the classifier's verdicts and the first
/// non-runtime frame's identity, computed once at extraction.
#[derive(Debug, Clone)]
pub struct ExtractedStack {
    /// Multi-line rendering, one `      func (file:line)` per frame.
    pub text: String,
    /// Function name of the first non-runtime frame; empty if none.
    pub function: String,
    /// `file:line` of the first non-runtime frame; empty if none.
    pub location: String,
    runtime_only: bool,
    non_test_runtime_only: bool,
}

impl ExtractedStack {
    /// True iff every frame is runtime machinery. An empty stack is
    /// runtime-only.
    #[must_use]
    pub fn is_runtime_only(&self) -> bool {
        self.runtime_only
    }

    /// True iff the stack is runtime-only *and* contains no testing-framework
    /// frame. Goroutines created by `testing.T.Run` fail this predicate and
    /// are therefore treated as test-owned.
    #[must_use]
    pub fn is_non_test_runtime_only(&self) -> bool {
        self.non_test_runtime_only
    }
}

impl Default for ExtractedStack {
    fn default() -> Self {
        // The verdicts for an absent stack match extract(&[]).
        Self {
            text: String::new(),
            function: String::new(),
            location: String::new(),
            runtime_only: true,
            non_test_runtime_only: true,
        }
    }
}

/// Classify a single frame by function name and file path.
#[must_use]
pub fn is_runtime_frame(function: &str, file: &str) -> bool {
    RUNTIME_FUNC_PREFIXES.iter().any(|p| function.starts_with(p))
        || RUNTIME_FILE_PATTERNS.iter().any(|p| file.contains(p))
}

/// True iff every frame of `stack` is a runtime frame. Empty stacks are
/// runtime-only.
#[must_use]
pub fn is_runtime_only(stack: &[StackFrame]) -> bool {
    stack.iter().all(|f| is_runtime_frame(&f.function, &f.file))
}

/// True iff `stack` is runtime-only and involves no `testing.` function.
#[must_use]
pub fn is_non_test_runtime_only(stack: &[StackFrame]) -> bool {
    is_runtime_only(stack) && !stack.iter().any(|f| f.function.starts_with("testing."))
}

/// Render `stack` and pick the first non-runtime frame as the goroutine's
/// user location. Both `function` and `location` are empty when no user
/// frame exists.
#[must_use]
pub fn extract(stack: &[StackFrame]) -> ExtractedStack {
    let mut text = String::new();
    let mut function = String::new();
    let mut location = String::new();

    for frame in stack {
        let _ = writeln!(text, "      {} ({}:{})", frame.function, frame.file, frame.line);
        if location.is_empty() && !is_runtime_frame(&frame.function, &frame.file) {
            function = frame.function.clone();
            location = format!("{}:{}", frame.file, frame.line);
        }
    }

    ExtractedStack {
        text,
        function,
        location,
        runtime_only: is_runtime_only(stack),
        non_test_runtime_only: is_non_test_runtime_only(stack),
    }
}
