//! Plain-English explanation of findings via the Anthropic Messages API.
//!
//! Strictly a presentation aid: the explanation is attached to the report
//! after detection and never influences it. Failures here are reported as
//! warnings by the caller, not errors.

use serde::Deserialize;
use std::fmt::Write as _;
use std::time::Duration;

use crate::domain::{ExplainError, Finding};

use crate::export::round_to_ms;

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const MODEL: &str = "claude-sonnet-4-6";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    text: String,
}

/// Send the findings to Claude and return a plain-English explanation.
pub fn explain(findings: &[Finding], api_key: &str) -> Result<String, ExplainError> {
    let prompt = build_prompt(findings);

    let body = serde_json::json!({
        "model": MODEL,
        "max_tokens": 1024,
        "messages": [{"role": "user", "content": prompt}],
    });

    let client = reqwest::blocking::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()?;
    let response = client
        .post(API_URL)
        .header("x-api-key", api_key)
        .header("anthropic-version", "2023-06-01")
        .json(&body)
        .send()?;

    let status = response.status();
    if !status.is_success() {
        return Err(ExplainError::Api {
            status: status.as_u16(),
            body: response.text().unwrap_or_default(),
        });
    }

    let parsed: MessagesResponse = response.json()?;
    parsed
        .content
        .into_iter()
        .next()
        .map(|block| block.text)
        .ok_or(ExplainError::EmptyResponse)
}

fn build_prompt(findings: &[Finding]) -> String {
    let mut prompt = format!(
        "I analyzed a Go execution trace and found {} concurrency issue(s).\n\n",
        findings.len()
    );

    for (i, f) in findings.iter().enumerate() {
        let _ = writeln!(
            prompt,
            "Issue {}: {} (confidence: {})",
            i + 1,
            f.kind.as_str(),
            f.confidence
        );
        let _ = writeln!(prompt, "  Goroutine {} is blocked on: {:?}", f.goroutine_id, f.blocked_on);
        if f.blocked_for > Duration::ZERO {
            let _ = writeln!(prompt, "  Blocked for: {}ms", round_to_ms(f.blocked_for));
        }
        if !f.location.is_empty() {
            let _ = writeln!(prompt, "  Location: {}", f.location);
        }
        if !f.function.is_empty() {
            let _ = writeln!(prompt, "  Function: {}", f.function);
        }
        if !f.stack.is_empty() {
            let _ = write!(prompt, "  Stack trace:\n{}", f.stack);
        }
        prompt.push('\n');
    }

    prompt.push_str("For each issue:\n");
    prompt.push_str("1. Explain the root cause in plain English (1-2 sentences)\n");
    prompt.push_str("2. Give a specific code fix a Go developer should apply\n");
    prompt.push_str("3. Show a before/after code diff if possible\n");
    prompt.push_str("4. Keep explanations concise and actionable\n");

    prompt
}
