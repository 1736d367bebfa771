//! Binary trace format: events, reader, and writer.
//!
//! The analyzer consumes a portable binary encoding of goroutine state
//! transitions. Each trace starts with a fixed header and continues as a
//! sequence of length-prefixed records:
//!
//! ```text
//! +-------------------------+----------------------+
//! | magic "GTRC" (4 bytes)  | version (u16 LE)     |
//! +--------+----------------+----------------------+
//! | kind   | payload length (u32 LE) | payload     |
//! +--------+-------------------------+-------------+
//! ```
//!
//! Record kind 1 is a goroutine state transition; every other kind is
//! treated as noise and skipped via the length prefix. The payload of a
//! state transition:
//!
//! ```text
//! time_ns u64 LE · goroutine u64 LE · from u8 · to u8
//! · reason_len u16 LE · reason (UTF-8)
//! · frame_count u16 LE · frames, each:
//!     func_len u16 LE · func · file_len u16 LE · file · line u32 LE
//! ```
//!
//! Payload lengths are validated against [`MAX_RECORD_PAYLOAD`] before any
//! allocation. Stacks are ordered top to bottom, exactly as the runtime
//! reports them.

pub mod reader;
pub mod writer;

pub use reader::Reader;
pub use writer::Writer;

use crate::domain::{GoroutineId, TraceError, TraceTime};

/// File magic, first four bytes of every trace.
pub const MAGIC: [u8; 4] = *b"GTRC";

/// Current format version.
pub const VERSION: u16 = 1;

/// Upper bound on a single record payload. Validated before allocation.
pub const MAX_RECORD_PAYLOAD: usize = 1 << 20;

/// Record kind for goroutine state transitions.
pub const KIND_STATE_TRANSITION: u8 = 1;

/// Scheduling state of a goroutine as carried in the trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoState {
    NotExist,
    Runnable,
    Running,
    Syscall,
    Waiting,
}

impl GoState {
    /// True while the goroutine occupies a processor. A goroutine in a
    /// syscall still holds its P from the scheduler's point of view.
    #[must_use]
    pub fn executing(self) -> bool {
        matches!(self, GoState::Running | GoState::Syscall)
    }

    pub(crate) fn from_wire(b: u8) -> Result<Self, TraceError> {
        match b {
            0 => Ok(GoState::NotExist),
            1 => Ok(GoState::Runnable),
            2 => Ok(GoState::Running),
            3 => Ok(GoState::Syscall),
            4 => Ok(GoState::Waiting),
            other => Err(TraceError::Decode(format!("unknown goroutine state {other}"))),
        }
    }

    pub(crate) fn to_wire(self) -> u8 {
        match self {
            GoState::NotExist => 0,
            GoState::Runnable => 1,
            GoState::Running => 2,
            GoState::Syscall => 3,
            GoState::Waiting => 4,
        }
    }
}

/// One frame of a stack, top first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    pub function: String,
    pub file: String,
    pub line: u32,
}

impl StackFrame {
    pub fn new(function: impl Into<String>, file: impl Into<String>, line: u32) -> Self {
        Self { function: function.into(), file: file.into(), line }
    }
}

/// A goroutine state-transition event.
///
/// `reason` is the runtime-supplied block reason; it is non-empty only on
/// transitions into `Waiting`. `stack` is the stack at the transition:
/// the creating goroutine's stack for births, the blocking stack for
/// blocks, and the final stack for exits.
#[derive(Debug, Clone)]
pub struct TransitionEvent {
    pub time: TraceTime,
    pub goroutine: GoroutineId,
    pub from: GoState,
    pub to: GoState,
    pub reason: String,
    pub stack: Vec<StackFrame>,
}
