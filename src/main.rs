//! # Stalltrace - Main Entry Point
//!
//! Two subcommands, mirroring the two ways a trace reaches the analyzer:
//!
//! - `analyze <trace>`: analyze an existing trace file offline.
//! - `run <test args…>`: capture a trace by running the test toolchain with
//!   tracing enabled, then analyze it. When the first pass finds nothing,
//!   the capture is retried under constrained `GOMAXPROCS` values to expose
//!   scheduling-dependent bugs; the first trace that produces findings wins.
//!
//! Both paths finish identically: optional LLM explanation, then the report
//! rendered as terminal text or JSON to stdout or `--output`.

use anyhow::{Context, Result};
use clap::Parser;
use log::warn;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use stalltrace::analysis;
use stalltrace::capture;
use stalltrace::cli::{Args, Command, OutputFormat};
use stalltrace::domain::{AnalysisReport, Options};
use stalltrace::export;
use stalltrace::llm;

fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();
    let opts = Options { min_block: args.min_block, debug_filtered: args.debug_filtered };

    match args.command {
        Command::Analyze { ref trace } => {
            let report = analysis::analyze(trace, &opts)
                .with_context(|| format!("analyze {}", trace.display()))?;
            finish(report, &args)
        }
        Command::Run { ref test_args, duration } => run_and_analyze(test_args, duration, &opts, &args),
    }
}

fn run_and_analyze(
    test_args: &[String],
    duration: std::time::Duration,
    opts: &Options,
    args: &Args,
) -> Result<()> {
    eprintln!(
        "Running: go test -trace <tmpfile> -timeout {} {}",
        humantime::format_duration(duration),
        test_args.join(" ")
    );

    let captured = capture::run(test_args, duration, &[]).context("trace")?;
    print_test_output(&captured.output);

    let mut trace_to_clean = captured.trace_file.clone();
    let mut report = match analysis::analyze(&captured.trace_file, opts) {
        Ok(report) => report,
        Err(err) => {
            let _ = fs::remove_file(&captured.trace_file);
            return Err(err).context("analyze");
        }
    };

    // Schedule-diversity retry loop: no findings on the first pass often
    // means the bug needs a different interleaving. Constraining GOMAXPROCS
    // serializes scheduling to varying degrees.
    for gomaxprocs in capture::schedule_diversity_values() {
        if !report.findings.is_empty() {
            break;
        }
        eprintln!("No findings; retrying with GOMAXPROCS={gomaxprocs}...");
        let env = [("GOMAXPROCS".to_string(), gomaxprocs.to_string())];
        let Ok(retry) = capture::run(test_args, duration, &env) else {
            continue;
        };
        print_test_output(&retry.output);
        match analysis::analyze(&retry.trace_file, opts) {
            Ok(retry_report) if !retry_report.findings.is_empty() => {
                let _ = fs::remove_file(&trace_to_clean);
                trace_to_clean = retry.trace_file;
                report = retry_report;
            }
            _ => {
                let _ = fs::remove_file(&retry.trace_file);
            }
        }
    }

    let result = finish(report, args);
    let _ = fs::remove_file(&trace_to_clean);
    result
}

fn print_test_output(output: &str) {
    if !output.is_empty() {
        eprintln!("--- go test output ---");
        eprint!("{output}");
        eprintln!("--- end output ---");
    }
}

/// Explain (if configured), pick the output sink, and render the report.
fn finish(report: AnalysisReport, args: &Args) -> Result<()> {
    let explanation = if args.no_llm {
        None
    } else {
        explain_findings(&report)
    };

    let mut out = output_writer(args.output.as_deref())?;
    match args.format {
        OutputFormat::Terminal => {
            export::terminal::write_report(&mut out, &report, explanation.as_deref())
                .context("write report")?;
        }
        OutputFormat::Json => {
            export::json::write_report(&mut out, &report, explanation.as_deref())
                .context("write report")?;
        }
    }
    out.flush().context("flush output")?;
    Ok(())
}

fn explain_findings(report: &AnalysisReport) -> Option<String> {
    let api_key = std::env::var("ANTHROPIC_API_KEY").ok()?;
    if api_key.is_empty() || report.findings.is_empty() {
        return None;
    }
    match llm::explain(&report.findings, &api_key) {
        Ok(explanation) => Some(explanation),
        Err(err) => {
            warn!("LLM explanation failed: {err}");
            None
        }
    }
}

fn output_writer(path: Option<&Path>) -> Result<Box<dyn Write>> {
    match path {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("create output file {}", path.display()))?;
            Ok(Box::new(BufWriter::new(file)))
        }
        None => Ok(Box::new(io::stdout())),
    }
}
