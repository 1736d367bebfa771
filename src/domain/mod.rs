//! Domain model for stalltrace
//!
//! This module contains core domain types and errors that provide:
//! - Compile-time safety via newtype pattern
//! - Self-documenting function signatures
//! - Structured error handling

pub mod errors;
pub mod types;

// Re-export common types for convenience
pub use types::{
    is_channel_reason, AnalysisReport, Confidence, Finding, FindingKind, GoroutineId, Options,
    TraceTime, REASON_SLEEP, REASON_SYNC,
};

pub use errors::{CaptureError, ExplainError, ExportError, TraceError};
