//! Shared deterministic types for the workflow core.
//!
//! These types define stable contracts between the gate chain, the
//! controller, and the collaborator adapters. They carry no I/O and must
//! remain deterministic across runs.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Uniform result produced by every stage gate.
///
/// `advice` feeds the next generation attempt; it may be empty when the
/// diagnostic in `message` is the advice (e.g. a raw syntax error).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateResult {
    pub passed: bool,
    pub message: String,
    pub advice: String,
}

impl GateResult {
    pub fn pass(message: impl Into<String>) -> Self {
        Self {
            passed: true,
            message: message.into(),
            advice: String::new(),
        }
    }

    pub fn fail(message: impl Into<String>, advice: impl Into<String>) -> Self {
        Self {
            passed: false,
            message: message.into(),
            advice: advice.into(),
        }
    }
}

/// Which gate produced a result. Used for feedback labeling and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateKind {
    Syntax,
    Structure,
    Execution,
    OutputAnalysis,
    Promotion,
}

impl fmt::Display for GateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            GateKind::Syntax => "syntax",
            GateKind::Structure => "structure",
            GateKind::Execution => "execution",
            GateKind::OutputAnalysis => "output-analysis",
            GateKind::Promotion => "promotion",
        };
        f.write_str(label)
    }
}

/// Three-way classification of an evaluator judgment.
///
/// All free-text heuristics live behind this tag; the state machine never
/// sees raw evaluator output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail(String),
    Ambiguous(String),
}

/// Closed set of statuses a plan step may report.
///
/// Anything outside this set in a plan's embedded report (including an
/// unevaluated template expression) is a validation failure, not a new status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StepStatus {
    Applied,
    Failed,
    Skipped,
    Unknown,
}

impl StepStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            StepStatus::Applied => "APPLIED",
            StepStatus::Failed => "FAILED",
            StepStatus::Skipped => "SKIPPED",
            StepStatus::Unknown => "UNKNOWN",
        }
    }
}

impl FromStr for StepStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "APPLIED" => Ok(StepStatus::Applied),
            "FAILED" => Ok(StepStatus::Failed),
            "SKIPPED" => Ok(StepStatus::Skipped),
            "UNKNOWN" => Ok(StepStatus::Unknown),
            _ => Err(()),
        }
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Single-slot feedback carried from a failing gate into the next generation.
///
/// Only the most recent failing gate's feedback is retained; the slot is
/// consumed (taken) by the generation step, which bounds prompt growth across
/// retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feedback {
    pub gate: GateKind,
    pub message: String,
    pub advice: String,
}

impl Feedback {
    pub fn from_gate(gate: GateKind, result: &GateResult) -> Self {
        Self {
            gate,
            message: result.message.clone(),
            advice: result.advice.clone(),
        }
    }

    /// Render the feedback block handed to the generator.
    pub fn render(&self) -> String {
        if self.advice.is_empty() {
            format!("{} gate failed:\n{}", self.gate, self.message)
        } else {
            format!(
                "{} gate failed:\n{}\n\nAdvice:\n{}",
                self.gate, self.message, self.advice
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_status_parses_case_insensitively() {
        assert_eq!("applied".parse::<StepStatus>(), Ok(StepStatus::Applied));
        assert_eq!(" FAILED ".parse::<StepStatus>(), Ok(StepStatus::Failed));
        assert_eq!("Skipped".parse::<StepStatus>(), Ok(StepStatus::Skipped));
        assert_eq!("UNKNOWN".parse::<StepStatus>(), Ok(StepStatus::Unknown));
    }

    #[test]
    fn step_status_rejects_unevaluated_expression() {
        assert!("{{ status_1 }}".parse::<StepStatus>().is_err());
        assert!("APPLIED if ok else FAILED".parse::<StepStatus>().is_err());
        assert!("".parse::<StepStatus>().is_err());
    }

    #[test]
    fn feedback_render_includes_advice_when_present() {
        let result = GateResult::fail("step 2 mismatch", "align step 2 status");
        let feedback = Feedback::from_gate(GateKind::OutputAnalysis, &result);
        let rendered = feedback.render();
        assert!(rendered.contains("output-analysis gate failed"));
        assert!(rendered.contains("align step 2 status"));
    }

    #[test]
    fn feedback_render_omits_empty_advice() {
        let result = GateResult::fail("unexpected token", "");
        let feedback = Feedback::from_gate(GateKind::Syntax, &result);
        assert!(!feedback.render().contains("Advice"));
    }
}
