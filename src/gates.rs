//! The four ordered stage gates.
//!
//! Gates run strictly in order and short-circuit on the first failure: a
//! plan that cannot parse is never executed, and output is only analyzed for
//! a plan that ran. Each gate folds its diagnostics into a [`GateResult`]
//! whose advice feeds the next generation attempt.

use std::path::Path;

use anyhow::Result;
use tracing::{info, warn};

use crate::core::alignment::{
    alignment_issues, check_status_values, extract_judgment_statuses, extract_plan_statuses,
};
use crate::core::classifier::{classify_structure, classify_sufficiency};
use crate::core::transcript::{
    filter_step_narration, is_connectivity_failure, recap_failed_count, scan_for_plan_bugs,
};
use crate::core::types::{GateResult, Verdict};
use crate::io::evaluator::{EvaluationKind, EvaluationRequest, Evaluator};
use crate::io::runner::PlanRunner;
use crate::io::syntax::SyntaxChecker;

/// Shared inputs the evaluator-backed gates need.
#[derive(Debug, Clone)]
pub struct GateContext<'a> {
    pub objective: &'a str,
    pub requirements: &'a [String],
    pub plan: &'a str,
    pub procedure: Option<&'a str>,
}

impl GateContext<'_> {
    fn evaluation_request(
        &self,
        kind: EvaluationKind,
        transcript: Option<&str>,
    ) -> EvaluationRequest {
        EvaluationRequest {
            kind,
            objective: self.objective.to_string(),
            requirements: self.requirements.to_vec(),
            plan: self.plan.to_string(),
            procedure: self.procedure.map(str::to_string),
            transcript: transcript.map(str::to_string),
        }
    }
}

/// Gate 1: the plan must parse.
pub fn syntax_gate<S: SyntaxChecker>(
    checker: &mut S,
    plan_path: &Path,
    environment: &str,
) -> Result<GateResult> {
    let outcome = checker.check(plan_path, environment)?;
    if outcome.passed {
        info!("syntax gate passed");
        return Ok(GateResult::pass("plan parsed cleanly"));
    }
    Ok(GateResult::fail(
        "plan failed the syntax check",
        outcome.diagnostics,
    ))
}

/// Gate 2: the plan's structure must cover every requirement.
///
/// An ambiguous judgment passes with a warning; blocking the whole workflow
/// on an oracle that failed to follow its output format helps nobody.
pub fn structure_gate<E: Evaluator>(
    evaluator: &mut E,
    context: &GateContext<'_>,
) -> Result<GateResult> {
    let judgment =
        evaluator.evaluate(&context.evaluation_request(EvaluationKind::Structure, None))?;
    match classify_structure(&judgment) {
        Verdict::Pass => {
            info!("structure gate passed");
            Ok(GateResult::pass("plan structure covers all requirements"))
        }
        Verdict::Fail(reason) => Ok(GateResult::fail(
            "plan structure does not cover the requirements",
            reason,
        )),
        Verdict::Ambiguous(raw) => {
            warn!("structure judgment was ambiguous, passing with warning");
            Ok(GateResult::pass(format!(
                "structure judgment ambiguous, accepted: {}",
                truncate(&raw, 200)
            )))
        }
    }
}

/// What the execution gate observed beyond pass/fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutcome {
    pub result: GateResult,
    /// Transcript with per-step narration stripped; input to output analysis.
    pub transcript: String,
    /// Unreachable environment. Terminal for the workflow: regenerating the
    /// plan cannot fix connectivity.
    pub connectivity_failure: bool,
}

/// Gate 3: the plan must execute without step failures or latent bugs.
pub fn execution_gate<R: PlanRunner>(
    runner: &mut R,
    plan_path: &Path,
    environment: &str,
) -> Result<ExecutionOutcome> {
    let report = runner.run(plan_path, environment)?;
    let transcript = filter_step_narration(&report.transcript);

    if report.timed_out {
        return Ok(ExecutionOutcome {
            result: GateResult::fail(
                "plan execution timed out",
                "the plan ran past its time ceiling; steps may hang waiting for input \
                 or poll without a bound",
            ),
            transcript,
            connectivity_failure: false,
        });
    }

    if is_connectivity_failure(report.exit_code, &report.transcript) {
        return Ok(ExecutionOutcome {
            result: GateResult::fail(
                format!("environment {environment} is unreachable"),
                String::new(),
            ),
            transcript,
            connectivity_failure: true,
        });
    }

    // Bugs are scanned before the recap counters: a step may swallow a fatal
    // error and still report ok.
    if let Some(finding) = scan_for_plan_bugs(&report.transcript) {
        return Ok(ExecutionOutcome {
            result: GateResult::fail(
                format!("plan bug during execution: {}", finding.description),
                finding.context,
            ),
            transcript,
            connectivity_failure: false,
        });
    }

    if let Some(failed) = recap_failed_count(&report.transcript) {
        if failed > 0 {
            return Ok(ExecutionOutcome {
                result: GateResult::fail(
                    format!("{failed} step(s) failed during execution"),
                    transcript.clone(),
                ),
                transcript,
                connectivity_failure: false,
            });
        }
    }

    if report.exit_code != Some(0) {
        return Ok(ExecutionOutcome {
            result: GateResult::fail(
                format!("runner exited with {:?}", report.exit_code),
                transcript.clone(),
            ),
            transcript,
            connectivity_failure: false,
        });
    }

    info!(environment, "execution gate passed");
    Ok(ExecutionOutcome {
        result: GateResult::pass(format!("plan executed cleanly on {environment}")),
        transcript,
        connectivity_failure: false,
    })
}

/// Gate 4: the execution output must be sufficient and self-consistent.
///
/// Three checks, cheapest first: the plan's own status report must use only
/// the closed status set (a local check), the evaluator must judge the output
/// sufficient per requirement, and an independent per-step judgment must
/// align exactly with the plan's report.
pub fn output_analysis_gate<E: Evaluator>(
    evaluator: &mut E,
    context: &GateContext<'_>,
    transcript: &str,
) -> Result<GateResult> {
    if let Err(message) = check_status_values(transcript) {
        return Ok(GateResult::fail(
            "plan status report contains invalid values",
            message,
        ));
    }

    let sufficiency = evaluator.evaluate(
        &context.evaluation_request(EvaluationKind::Sufficiency, Some(transcript)),
    )?;
    match classify_sufficiency(&sufficiency) {
        Verdict::Pass => {}
        Verdict::Fail(reason) => {
            return Ok(GateResult::fail(
                "execution output is insufficient for the requirements",
                reason,
            ));
        }
        Verdict::Ambiguous(_) => {
            warn!("sufficiency judgment was ambiguous, passing with warning");
        }
    }

    let judgment = evaluator.evaluate(
        &context.evaluation_request(EvaluationKind::Verification, Some(transcript)),
    )?;
    let plan_statuses = extract_plan_statuses(transcript);
    let judged_statuses = extract_judgment_statuses(&judgment);
    let issues = alignment_issues(&plan_statuses, &judged_statuses);
    if !issues.is_empty() {
        let mut advice = judgment;
        advice.push_str("\n\nDisagreements:\n");
        for issue in &issues {
            advice.push_str("  - ");
            advice.push_str(issue);
            advice.push('\n');
        }
        return Ok(GateResult::fail(
            format!(
                "plan-reported statuses disagree with the evaluator on {} item(s)",
                issues.len()
            ),
            advice,
        ));
    }

    info!("output analysis gate passed");
    Ok(GateResult::pass("execution output verified"))
}

fn truncate(text: &str, limit: usize) -> &str {
    match text.char_indices().nth(limit) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::io::runner::ExecutionReport;
    use crate::test_support::{
        ScriptedEvaluator, ScriptedRunner, ScriptedSyntaxChecker, aligned_verification_judgment,
        passing_execution_report,
    };

    fn context<'a>(requirements: &'a [String]) -> GateContext<'a> {
        GateContext {
            objective: "harden sshd",
            requirements,
            plan: "STEP [one]",
            procedure: None,
        }
    }

    #[test]
    fn syntax_gate_maps_outcome() {
        let mut checker = ScriptedSyntaxChecker::failing_once("unexpected token near line 4");
        let result =
            syntax_gate(&mut checker, Path::new("plan.txt"), "staging-a").expect("gate");
        assert!(!result.passed);
        assert!(result.advice.contains("unexpected token"));
    }

    #[test]
    fn structure_gate_fails_on_fail_marker() {
        let requirements = vec!["disable root login".to_string()];
        let mut evaluator =
            ScriptedEvaluator::new(["PLAN_STRUCTURE: FAIL\nStep for requirement 1 is missing."]);
        let result = structure_gate(&mut evaluator, &context(&requirements)).expect("gate");
        assert!(!result.passed);
        assert!(result.advice.contains("missing"));
        assert_eq!(evaluator.kinds, vec![EvaluationKind::Structure]);
    }

    #[test]
    fn structure_gate_passes_ambiguous_with_warning() {
        let requirements = vec!["disable root login".to_string()];
        let mut evaluator = ScriptedEvaluator::new(["the plan exists"]);
        let result = structure_gate(&mut evaluator, &context(&requirements)).expect("gate");
        assert!(result.passed);
        assert!(result.message.contains("ambiguous"));
    }

    #[test]
    fn execution_gate_passes_clean_run() {
        let mut runner = ScriptedRunner::new([passing_execution_report("staging-a", 2)]);
        let outcome =
            execution_gate(&mut runner, Path::new("plan.txt"), "staging-a").expect("gate");
        assert!(outcome.result.passed);
        assert!(!outcome.connectivity_failure);
        assert_eq!(runner.environments, vec!["staging-a".to_string()]);
    }

    #[test]
    fn execution_gate_flags_connectivity_as_terminal() {
        let mut runner = ScriptedRunner::new([ExecutionReport {
            exit_code: Some(4),
            transcript: "fatal: [staging-a]: UNREACHABLE!".to_string(),
            timed_out: false,
        }]);
        let outcome =
            execution_gate(&mut runner, Path::new("plan.txt"), "staging-a").expect("gate");
        assert!(!outcome.result.passed);
        assert!(outcome.connectivity_failure);
    }

    #[test]
    fn execution_gate_finds_bug_behind_clean_recap() {
        let mut runner = ScriptedRunner::new([ExecutionReport {
            exit_code: Some(0),
            transcript: "\
STEP [collect]
/bin/sh: 1: Bad: bad substitution
ok: [staging-a]
RECAP staging-a : ok=1 changed=0 failed=0"
                .to_string(),
            timed_out: false,
        }]);
        let outcome =
            execution_gate(&mut runner, Path::new("plan.txt"), "staging-a").expect("gate");
        assert!(!outcome.result.passed);
        assert!(outcome.result.message.contains("bad substitution"));
        assert!(!outcome.connectivity_failure);
    }

    #[test]
    fn execution_gate_fails_on_recap_failures() {
        let mut runner = ScriptedRunner::new([ExecutionReport {
            exit_code: Some(2),
            transcript: "RECAP staging-a : ok=1 changed=0 failed=2".to_string(),
            timed_out: false,
        }]);
        let outcome =
            execution_gate(&mut runner, Path::new("plan.txt"), "staging-a").expect("gate");
        assert!(!outcome.result.passed);
        assert!(outcome.result.message.contains("2 step(s) failed"));
    }

    #[test]
    fn execution_gate_filters_narration_from_transcript() {
        let mut runner = ScriptedRunner::new([ExecutionReport {
            exit_code: Some(0),
            transcript: "\
STEP [collect]
very long narration line
ok: [staging-a]
RECAP staging-a : ok=1 changed=0 failed=0"
                .to_string(),
            timed_out: false,
        }]);
        let outcome =
            execution_gate(&mut runner, Path::new("plan.txt"), "staging-a").expect("gate");
        assert!(outcome.result.passed);
        assert!(!outcome.transcript.contains("very long narration"));
        assert!(outcome.transcript.contains("ok: [staging-a]"));
    }

    #[test]
    fn output_gate_rejects_leaked_template_before_calling_evaluator() {
        let requirements = vec!["r1".to_string()];
        let mut evaluator = ScriptedEvaluator::default();
        let transcript = "STEP 1 - A: Status: {{ status_1 }}";
        let result =
            output_analysis_gate(&mut evaluator, &context(&requirements), transcript)
                .expect("gate");
        assert!(!result.passed);
        assert_eq!(evaluator.calls(), 0);
    }

    #[test]
    fn output_gate_fails_on_insufficient_output() {
        let requirements = vec!["r1".to_string()];
        let mut evaluator = ScriptedEvaluator::new([
            "OUTPUT_SUFFICIENCY: FAIL\nRequirement 1 evidence not collected.",
        ]);
        let report = passing_execution_report("staging-a", 1);
        let result =
            output_analysis_gate(&mut evaluator, &context(&requirements), &report.transcript)
                .expect("gate");
        assert!(!result.passed);
        assert_eq!(evaluator.kinds, vec![EvaluationKind::Sufficiency]);
    }

    #[test]
    fn output_gate_fails_on_single_status_disagreement() {
        let requirements = vec!["r1".to_string(), "r2".to_string()];
        let judgment = "\
Step 1: Status: APPLIED
Step 2: Status: FAILED
Overall: Status: APPLIED";
        let mut evaluator =
            ScriptedEvaluator::new(["OUTPUT_SUFFICIENCY: PASS".to_string(), judgment.to_string()]);
        let report = passing_execution_report("staging-a", 2);
        let result =
            output_analysis_gate(&mut evaluator, &context(&requirements), &report.transcript)
                .expect("gate");
        assert!(!result.passed);
        assert!(result.message.contains("disagree"));
        assert!(result.advice.contains("step 2: plan=APPLIED, evaluator=FAILED"));
    }

    #[test]
    fn output_gate_passes_aligned_reports() {
        let requirements = vec!["r1".to_string(), "r2".to_string()];
        let mut evaluator = ScriptedEvaluator::new([
            "OUTPUT_SUFFICIENCY: PASS".to_string(),
            aligned_verification_judgment(2),
        ]);
        let report = passing_execution_report("staging-a", 2);
        let result =
            output_analysis_gate(&mut evaluator, &context(&requirements), &report.transcript)
                .expect("gate");
        assert!(result.passed);
        assert_eq!(
            evaluator.kinds,
            vec![EvaluationKind::Sufficiency, EvaluationKind::Verification]
        );
    }
}
