//! CLI argument definitions

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "stalltrace")]
#[command(about = "Detect goroutine leaks, deadlocks, and long blocks in Go programs")]
#[command(long_about = "Stalltrace analyzes Go execution traces to find concurrency issues:
  - Goroutine leaks (permanently blocked goroutines)
  - Deadlocks (goroutines stuck on mutex)
  - Long-blocking operations

Run 'stalltrace analyze <trace.out>' or 'stalltrace run ./...' to get started.")]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Output format
    #[arg(long, global = true, value_enum, default_value = "terminal")]
    pub format: OutputFormat,

    /// Write output to file instead of stdout
    #[arg(long, global = true, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Minimum block duration to flag as a long block (e.g. 500ms, 2s)
    #[arg(long, global = true, default_value = "1s", value_parser = humantime::parse_duration)]
    pub min_block: Duration,

    /// Print goroutines filtered from findings to stderr (diagnostic)
    #[arg(long, global = true)]
    pub debug_filtered: bool,

    /// Skip LLM explanation (faster, works without API key)
    #[arg(long, global = true)]
    pub no_llm: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Analyze an existing execution trace file
    #[command(
        after_help = "Examples:\n  stalltrace analyze ./trace.out\n  stalltrace analyze ./trace.out --format json --output findings.json\n  stalltrace analyze ./trace.out --debug-filtered"
    )]
    Analyze {
        /// Trace file to analyze
        trace: PathBuf,
    },

    /// Run tests under tracing, capture a trace, and analyze it
    #[command(
        after_help = "Examples:\n  stalltrace run ./...\n  stalltrace run --duration 30s ./...\n  stalltrace run --duration 60s --no-llm ./pkg/server/..."
    )]
    Run {
        /// Arguments passed to the test runner (package selectors, flags).
        /// Put stalltrace flags before the first selector.
        #[arg(required = true, num_args = 1.., allow_hyphen_values = true)]
        test_args: Vec<String>,

        /// Test timeout / trace duration (e.g. 10s, 30s, 60s)
        #[arg(long, default_value = "10s", value_parser = humantime::parse_duration)]
        duration: Duration,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Terminal,
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analyze_defaults() {
        let args = Args::try_parse_from(["stalltrace", "analyze", "trace.out"]).unwrap();
        assert_eq!(args.format, OutputFormat::Terminal);
        assert_eq!(args.min_block, Duration::from_secs(1));
        assert!(!args.debug_filtered);
        assert!(!args.no_llm);
        match args.command {
            Command::Analyze { trace } => assert_eq!(trace, PathBuf::from("trace.out")),
            Command::Run { .. } => panic!("expected analyze"),
        }
    }

    #[test]
    fn test_run_with_duration_and_globals() {
        let args = Args::try_parse_from([
            "stalltrace",
            "run",
            "--duration",
            "30s",
            "--min-block",
            "500ms",
            "--format",
            "json",
            "./...",
        ])
        .unwrap();
        assert_eq!(args.format, OutputFormat::Json);
        assert_eq!(args.min_block, Duration::from_millis(500));
        match args.command {
            Command::Run { test_args, duration } => {
                assert_eq!(test_args, vec!["./...".to_string()]);
                assert_eq!(duration, Duration::from_secs(30));
            }
            Command::Analyze { .. } => panic!("expected run"),
        }
    }

    #[test]
    fn test_invalid_duration_rejected() {
        assert!(Args::try_parse_from(["stalltrace", "analyze", "t.out", "--min-block", "fast"])
            .is_err());
    }

    #[test]
    fn test_run_requires_test_args() {
        assert!(Args::try_parse_from(["stalltrace", "run"]).is_err());
    }
}
