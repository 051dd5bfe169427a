//! Execution transcript inspection.
//!
//! The remote runner's transcript is scanned for three independent signals:
//! connectivity failures (terminal, never retried), plan bugs that the run's
//! own error handling may have swallowed, and the summary recap's failure
//! counter. Clean transcripts are filtered down to step names and final
//! status lines before being handed to the output-analysis gate, bounding
//! the text passed to the evaluator.

use std::sync::LazyLock;

use regex::Regex;

/// Exit code the remote runner uses for unreachable environments.
pub const UNREACHABLE_EXIT_CODE: i32 = 4;

/// Transcript substrings that indicate the environment could not be reached
/// at all. Regenerating the plan cannot fix any of these.
const CONNECTIVITY_PATTERNS: &[&str] = &[
    "UNREACHABLE",
    "Failed to connect to the host",
    "Connection refused",
    "No route to host",
    "Permission denied",
    "Host key verification failed",
    "data could not be sent",
];

/// Transcript substrings that indicate a bug in the plan itself, paired with
/// a short description. Matched even when the run's own summary counters
/// report zero failures: an ignored-but-fatal error is still a bug.
const PLAN_BUG_PATTERNS: &[(&str, &str)] = &[
    ("undefined variable", "undefined variable"),
    ("is undefined", "reference to undefined value"),
    ("has no attribute", "invalid attribute access"),
    ("template error", "template rendering error"),
    ("Unexpected end of template", "unclosed template block"),
    ("expected token", "template syntax error"),
    ("unbalanced template block", "unbalanced template block"),
    ("cannot be converted to", "type conversion error"),
    ("failed at splitting arguments", "argument parsing error"),
    ("syntax error near unexpected token", "shell syntax error"),
    ("syntax error:", "shell syntax error"),
    ("bad substitution", "shell bad substitution"),
    ("unexpected EOF", "shell unexpected end of file"),
    ("command not found", "missing command"),
];

/// A plan bug found in an execution transcript.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BugFinding {
    pub description: String,
    /// Lines surrounding the first match, for feedback context.
    pub context: String,
}

/// True when the transcript (or exit code) indicates the environment is
/// unreachable rather than the plan being wrong.
pub fn is_connectivity_failure(exit_code: Option<i32>, transcript: &str) -> bool {
    if exit_code == Some(UNREACHABLE_EXIT_CODE) {
        return true;
    }
    CONNECTIVITY_PATTERNS
        .iter()
        .any(|pattern| transcript.contains(pattern))
}

/// Scan the transcript for plan bugs. Returns the first finding with a few
/// lines of surrounding context.
pub fn scan_for_plan_bugs(transcript: &str) -> Option<BugFinding> {
    for (pattern, description) in PLAN_BUG_PATTERNS {
        if !transcript.contains(pattern) {
            continue;
        }
        let lines: Vec<&str> = transcript.lines().collect();
        let context = lines
            .iter()
            .position(|line| line.contains(pattern))
            .map(|idx| {
                let start = idx.saturating_sub(3);
                let end = (idx + 8).min(lines.len());
                lines[start..end].join("\n")
            })
            .unwrap_or_else(|| transcript.chars().take(500).collect());
        return Some(BugFinding {
            description: (*description).to_string(),
            context,
        });
    }
    None
}

/// Number of failed steps reported by the transcript's recap line
/// (`failed=N`), or `None` when no recap is present.
pub fn recap_failed_count(transcript: &str) -> Option<u32> {
    static FAILED_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"failed=(\d+)").unwrap());
    if !transcript.contains("RECAP") {
        return None;
    }
    FAILED_RE
        .captures(transcript)
        .and_then(|caps| caps[1].parse().ok())
}

/// Strip per-step narration, keeping step markers and their terminal status
/// lines (and everything outside step bodies, such as the embedded report
/// and the recap).
pub fn filter_step_narration(transcript: &str) -> String {
    static STEP_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^STEP\s+\[[^\]]+\]").unwrap());
    static STATUS_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"^\s*(ok|changed|fatal|skipping|failed):\s*").unwrap()
    });

    let mut filtered = Vec::new();
    let mut in_step_body = false;
    for line in transcript.lines() {
        if STEP_RE.is_match(line) {
            filtered.push(line);
            in_step_body = true;
            continue;
        }
        if STATUS_RE.is_match(line) {
            in_step_body = false;
        }
        if !in_step_body {
            filtered.push(line);
        }
    }
    filtered.join("\n")
}
