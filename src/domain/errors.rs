//! Structured error types for stalltrace
//!
//! Using thiserror for automatic Display implementation and error chaining.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TraceError {
    #[error("not a stalltrace trace file (bad magic)")]
    BadMagic,

    #[error("unsupported trace format version {0}")]
    UnsupportedVersion(u16),

    #[error("record payload of {0} bytes exceeds the size cap")]
    RecordTooLarge(usize),

    #[error("malformed trace record: {0}")]
    Decode(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("trace file not created — did the test runner start? output:\n{output}")]
    NoTrace { output: String },

    #[error("package listing failed: {0}")]
    PackageList(String),

    #[error("no packages produced a trace (no test files?)")]
    NoPackages,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum ExplainError {
    #[error("API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("empty response from the model")]
    EmptyResponse,

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trace_error_display() {
        let err = TraceError::UnsupportedVersion(7);
        assert_eq!(err.to_string(), "unsupported trace format version 7");
    }

    #[test]
    fn test_capture_error_carries_output() {
        let err = CaptureError::NoTrace { output: "FAIL\tpkg [build failed]".to_string() };
        assert!(err.to_string().contains("build failed"));
    }
}
