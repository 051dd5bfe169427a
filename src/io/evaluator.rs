//! Free-text evaluation of plans and execution output.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use tracing::info;

use crate::io::process::{command_from_vec, run_with_timeout};

/// What the evaluator is being asked to judge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationKind {
    /// Does the plan's structure cover every requirement?
    Structure,
    /// Does the execution output contain enough evidence per requirement?
    Sufficiency,
    /// Independent per-step judgment of the execution output, for
    /// cross-checking against the plan's own report.
    Verification,
}

/// Serialized as JSON on the evaluator's stdin. `plan` is always present;
/// `transcript` only for the output-analysis evaluations.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct EvaluationRequest {
    pub kind: EvaluationKind,
    pub objective: String,
    pub requirements: Vec<String>,
    pub plan: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub procedure: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
}

/// Returns the evaluator's raw judgment text. Classification into a verdict
/// is the caller's job; the adapter stays format-agnostic.
pub trait Evaluator {
    fn evaluate(&mut self, request: &EvaluationRequest) -> Result<String>;
}

/// Evaluator backed by a configured command.
pub struct CommandEvaluator {
    command: Vec<String>,
    timeout: Duration,
    output_limit_bytes: usize,
}

impl CommandEvaluator {
    pub fn new(command: Vec<String>, timeout: Duration, output_limit_bytes: usize) -> Self {
        Self {
            command,
            timeout,
            output_limit_bytes,
        }
    }
}

impl Evaluator for CommandEvaluator {
    fn evaluate(&mut self, request: &EvaluationRequest) -> Result<String> {
        let input = serde_json::to_vec(request).context("serialize evaluation request")?;
        let cmd = command_from_vec(&self.command)?;
        info!(kind = ?request.kind, "invoking evaluator");
        let output = run_with_timeout(cmd, Some(&input), self.timeout, self.output_limit_bytes)
            .context("run evaluator")?;

        if output.timed_out {
            return Err(anyhow!(
                "evaluator timed out after {}s",
                self.timeout.as_secs()
            ));
        }
        if !output.status.success() {
            return Err(anyhow!(
                "evaluator exited with {:?}: {}",
                output.status.code(),
                String::from_utf8_lossy(&output.stderr)
            ));
        }
        Ok(output.stdout_lossy())
    }
}
