//! Trace capture pipeline.
//!
//! Runs the Go test runner with tracing enabled and hands the resulting
//! trace file to the analyzer. Package selectors with `...` wildcards are
//! expanded up front; multi-package runs execute per package and keep the
//! richest trace (the largest file has the most events).
//!
//! Schedule-diversity retries — re-running under constrained `GOMAXPROCS`
//! to provoke scheduling-dependent bugs — are policy, not capture, and live
//! in the CLI layer. [`schedule_diversity_values`] supplies the ladder.

use log::debug;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use crate::domain::CaptureError;

/// Output of one traced test run.
#[derive(Debug)]
pub struct CaptureResult {
    pub trace_file: PathBuf,
    pub output: String,
    pub exit_code: i32,
}

/// Execute `go test -trace <tmpfile> -timeout <secs>s <args…>` and return
/// the path to the captured trace.
///
/// `extra_env` entries are added to the child's environment (e.g.
/// `GOMAXPROCS=1`).
pub fn run(
    args: &[String],
    timeout: Duration,
    extra_env: &[(String, String)],
) -> Result<CaptureResult, CaptureError> {
    let pkgs = expand_packages(args)?;
    if pkgs.len() == 1 {
        run_single(&pkgs, timeout, extra_env)
    } else {
        run_multi(&pkgs, timeout, extra_env)
    }
}

/// GOMAXPROCS values to retry with when the first pass finds nothing.
///
/// 1 fully serializes goroutine scheduling, 2 and 4 allow increasing
/// concurrency; each exposes different interleavings. Values above the host
/// parallelism are skipped, except 1.
#[must_use]
pub fn schedule_diversity_values() -> Vec<usize> {
    let num_cpu = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
    [1usize, 2, 4].into_iter().filter(|&v| v <= num_cpu || v == 1).collect()
}

fn run_single(
    args: &[String],
    timeout: Duration,
    extra_env: &[(String, String)],
) -> Result<CaptureResult, CaptureError> {
    let trace_file = temp_trace_path()?;

    let timeout_arg = format!("{}s", timeout.as_secs());
    let mut cmd = Command::new("go");
    cmd.arg("test")
        .arg("-trace")
        .arg(&trace_file)
        .arg("-timeout")
        .arg(&timeout_arg)
        .args(args);
    for (key, value) in extra_env {
        cmd.env(key, value);
    }

    let output = cmd.output().map_err(|source| {
        let _ = fs::remove_file(&trace_file);
        CaptureError::Spawn { command: format!("go test {}", args.join(" ")), source }
    })?;

    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));
    let exit_code = output.status.code().unwrap_or(-1);

    if !trace_file.exists() {
        return Err(CaptureError::NoTrace { output: combined.trim().to_string() });
    }

    Ok(CaptureResult { trace_file, output: combined, exit_code })
}

/// Run each package separately and keep the trace with the most events.
/// Per-package output is concatenated; the worst exit code wins.
fn run_multi(
    pkgs: &[String],
    timeout: Duration,
    extra_env: &[(String, String)],
) -> Result<CaptureResult, CaptureError> {
    let mut all_output = String::new();
    let mut best_trace: Option<PathBuf> = None;
    let mut best_size = 0u64;
    let mut worst_exit = 0;
    let mut trace_files = Vec::new();

    for pkg in pkgs {
        let result = match run_single(std::slice::from_ref(pkg), timeout, extra_env) {
            Ok(r) => r,
            Err(err) => {
                // Package may have no test files.
                debug!("skipping {pkg}: {err}");
                continue;
            }
        };
        trace_files.push(result.trace_file.clone());
        all_output.push_str(&result.output);
        worst_exit = worst_exit.max(result.exit_code);

        let size = fs::metadata(&result.trace_file).map(|m| m.len()).unwrap_or(0);
        if size > best_size {
            best_size = size;
            best_trace = Some(result.trace_file);
        }
    }

    let Some(best_trace) = best_trace else {
        for f in &trace_files {
            let _ = fs::remove_file(f);
        }
        return Err(CaptureError::NoPackages);
    };

    for f in &trace_files {
        if *f != best_trace {
            let _ = fs::remove_file(f);
        }
    }

    Ok(CaptureResult { trace_file: best_trace, output: all_output, exit_code: worst_exit })
}

/// Resolve `...` package patterns via `go list`. Arguments without
/// wildcards pass through unchanged.
fn expand_packages(args: &[String]) -> Result<Vec<String>, CaptureError> {
    if !args.iter().any(|a| a.contains("...")) {
        return Ok(args.to_vec());
    }

    let output = Command::new("go").arg("list").args(args).output().map_err(|source| {
        CaptureError::Spawn { command: format!("go list {}", args.join(" ")), source }
    })?;
    if !output.status.success() {
        return Err(CaptureError::PackageList(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }

    Ok(String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect())
}

fn temp_trace_path() -> Result<PathBuf, CaptureError> {
    let file = tempfile::Builder::new()
        .prefix("stalltrace-")
        .suffix(".trace")
        .tempfile()?;
    let (_, path) = file.keep().map_err(|e| CaptureError::Io(e.error))?;
    Ok(path)
}
