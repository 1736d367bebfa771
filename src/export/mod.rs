//! Report presentation.
//!
//! Two renderings of an [`crate::domain::AnalysisReport`]: a human-readable
//! terminal report and a machine-readable JSON document. Both write to any
//! `io::Write` sink so they can be pointed at stdout, a file, or a test
//! buffer.

pub mod json;
pub mod terminal;

use std::time::Duration;

/// Round a duration to whole milliseconds, half away from zero.
pub(crate) fn round_to_ms(d: Duration) -> u64 {
    ((d.as_nanos() + 500_000) / 1_000_000) as u64
}
