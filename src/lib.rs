//! # Stalltrace - Concurrency-Bug Analyzer for Go Execution Traces
//!
//! Stalltrace consumes binary execution traces emitted by a Go-runtime test
//! harness and reports goroutine leaks, mutex deadlocks, lock-order
//! inversions, and long-blocking operations. It works entirely post-mortem:
//! no recompilation, no instrumentation, no access to the traced process.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 go test -trace (capture)                    │
//! └───────────────────────┬─────────────────────────────────────┘
//!                         │ binary trace file
//!                         ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Stalltrace (This Crate)                     │
//! │                                                             │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐     │
//! │  │ Trace Reader │──▶│ State Engine │──▶│  Detectors   │     │
//! │  │  (streaming) │   │(per-goroutine│   │ (leaks, dead-│     │
//! │  └──────────────┘   │   records)   │   │ locks, AB-BA)│     │
//! │                     └──────────────┘   └──────┬───────┘     │
//! │                                               │             │
//! │                     ┌──────────────┐   ┌──────▼───────┐     │
//! │                     │   Explainer  │◀──│    Report    │     │
//! │                     │   (Claude)   │   │(terminal/json│     │
//! │                     └──────────────┘   └──────────────┘     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Structure
//!
//! - [`trace`]: the binary wire format, streaming reader, and writer
//! - [`classify`]: stack classification (user code vs runtime internals)
//! - [`analysis`]: the per-goroutine state engine, the six detectors, and
//!   the orchestrator — the core of the crate
//! - [`export`]: terminal and JSON report rendering
//! - [`capture`]: runs the test toolchain under tracing
//! - [`llm`]: optional plain-English explanation of findings
//! - [`domain`]: core types (ids, timestamps, findings) and errors
//! - [`cli`]: command-line argument parsing
//!
//! ## Detection Methods
//!
//! 1. **Leaks**: goroutines still blocked on a channel at trace end, with
//!    provenance filters separating user goroutines from runtime workers
//! 2. **Deadlock groups**: sync-blocked goroutines clustered by call site
//!    past a threshold (the trace hides mutex addresses, so a shared call
//!    site is the best available proxy for a shared lock)
//! 3. **AB-BA inversions**: inverse lock-edge pairs mined from each
//!    goroutine's recent sync-unblock history
//! 4. **Channel/lock cycles**: lock holders blocked on a channel whose
//!    would-be peer waits on that lock
//! 5. **Transient long blocks**: sync blocks that resolved before trace end
//!    (e.g. released by a test timeout)
//! 6. **Orphans**: goroutines never scheduled during very short traces
//!
//! A single analysis pass is O(events) time and O(goroutines) memory; each
//! goroutine record is constant-size (five-entry sync history).
//!
//! ## Typical Usage
//!
//! ```bash
//! # Run a package's tests under tracing and analyze the trace
//! stalltrace run ./... --duration 30s
//!
//! # Analyze an existing trace
//! stalltrace analyze trace.out --format json --output findings.json
//! ```

pub mod analysis;
pub mod capture;
pub mod classify;
pub mod cli;
pub mod domain;
pub mod export;
pub mod llm;
pub mod trace;
