//! Scripted collaborator doubles for driving the workflow in tests.
//!
//! Each double replays a queue of prepared responses and records how it was
//! called, so tests can assert both outcomes and interaction counts.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};

use crate::io::evaluator::{EvaluationKind, EvaluationRequest, Evaluator};
use crate::io::generator::{GenerationRequest, Generator};
use crate::io::runner::{ExecutionReport, PlanRunner};
use crate::io::syntax::{SyntaxChecker, SyntaxOutcome};

/// Generator that replays scripted plans in order.
#[derive(Debug, Default)]
pub struct ScriptedGenerator {
    plans: VecDeque<String>,
    pub requests: Vec<GenerationRequest>,
}

impl ScriptedGenerator {
    pub fn new(plans: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            plans: plans.into_iter().map(Into::into).collect(),
            requests: Vec::new(),
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.len()
    }
}

impl Generator for ScriptedGenerator {
    fn generate(&mut self, request: &GenerationRequest) -> Result<String> {
        self.requests.push(request.clone());
        self.plans
            .pop_front()
            .ok_or_else(|| anyhow!("scripted generator ran out of plans"))
    }
}

/// Syntax checker that replays scripted outcomes.
#[derive(Debug, Default)]
pub struct ScriptedSyntaxChecker {
    outcomes: VecDeque<SyntaxOutcome>,
    pub calls: usize,
}

impl ScriptedSyntaxChecker {
    pub fn new(outcomes: impl IntoIterator<Item = SyntaxOutcome>) -> Self {
        Self {
            outcomes: outcomes.into_iter().collect(),
            calls: 0,
        }
    }

    pub fn passing(times: usize) -> Self {
        Self::new((0..times).map(|_| SyntaxOutcome {
            passed: true,
            diagnostics: String::new(),
        }))
    }

    pub fn failing_once(diagnostics: impl Into<String>) -> Self {
        Self::new([SyntaxOutcome {
            passed: false,
            diagnostics: diagnostics.into(),
        }])
    }
}

impl SyntaxChecker for ScriptedSyntaxChecker {
    fn check(&mut self, _plan_path: &Path, _environment: &str) -> Result<SyntaxOutcome> {
        self.calls += 1;
        self.outcomes
            .pop_front()
            .ok_or_else(|| anyhow!("scripted syntax checker ran out of outcomes"))
    }
}

/// Runner that replays scripted execution reports and records the
/// environments it was asked to run against.
#[derive(Debug, Default)]
pub struct ScriptedRunner {
    reports: VecDeque<ExecutionReport>,
    pub environments: Vec<String>,
    pub plan_paths: Vec<PathBuf>,
}

impl ScriptedRunner {
    pub fn new(reports: impl IntoIterator<Item = ExecutionReport>) -> Self {
        Self {
            reports: reports.into_iter().collect(),
            environments: Vec::new(),
            plan_paths: Vec::new(),
        }
    }

    pub fn calls(&self) -> usize {
        self.environments.len()
    }
}

impl PlanRunner for ScriptedRunner {
    fn run(&mut self, plan_path: &Path, environment: &str) -> Result<ExecutionReport> {
        self.environments.push(environment.to_string());
        self.plan_paths.push(plan_path.to_path_buf());
        self.reports
            .pop_front()
            .ok_or_else(|| anyhow!("scripted runner ran out of reports"))
    }
}

/// Evaluator that replays scripted judgments and records the kinds asked.
#[derive(Debug, Default)]
pub struct ScriptedEvaluator {
    judgments: VecDeque<String>,
    pub kinds: Vec<EvaluationKind>,
}

impl ScriptedEvaluator {
    pub fn new(judgments: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            judgments: judgments.into_iter().map(Into::into).collect(),
            kinds: Vec::new(),
        }
    }

    pub fn calls(&self) -> usize {
        self.kinds.len()
    }
}

impl Evaluator for ScriptedEvaluator {
    fn evaluate(&mut self, request: &EvaluationRequest) -> Result<String> {
        self.kinds.push(request.kind);
        self.judgments
            .pop_front()
            .ok_or_else(|| anyhow!("scripted evaluator ran out of judgments"))
    }
}

/// A successful execution report with an aligned embedded status report for
/// `step_count` steps, all APPLIED.
pub fn passing_execution_report(environment: &str, step_count: u32) -> ExecutionReport {
    let mut transcript = String::new();
    for step in 1..=step_count {
        transcript.push_str(&format!("STEP [step {step}]\nok: [{environment}]\n"));
    }
    for step in 1..=step_count {
        transcript.push_str(&format!("STEP {step} - REQUIREMENT {step}: Status: APPLIED\n"));
    }
    transcript.push_str(&format!(
        "STEP {} - OVERALL: Status: APPLIED\n",
        step_count + 1
    ));
    transcript.push_str(&format!(
        "RECAP {environment} : ok={step_count} changed=0 failed=0\n"
    ));
    ExecutionReport {
        exit_code: Some(0),
        transcript,
        timed_out: false,
    }
}

/// A verification judgment aligned with [`passing_execution_report`].
pub fn aligned_verification_judgment(step_count: u32) -> String {
    let mut judgment = String::new();
    for step in 1..=step_count {
        judgment.push_str(&format!("Step {step}: requirement satisfied\n  Status: APPLIED\n"));
    }
    judgment.push_str("Overall: Status: APPLIED\n");
    judgment
}
