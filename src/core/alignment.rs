//! Status extraction and cross-verification.
//!
//! The plan's embedded report and the evaluator's judgment both declare a
//! status per step plus an aggregate "overall" status. Verification extracts
//! `(step, status)` pairs from each text and requires exact equality for
//! every pair, including the aggregate: a single disagreement anywhere fails
//! the whole gate. This is a strict AND, not a vote.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::core::types::StepStatus;

/// Statuses extracted from one side (plan report or evaluator judgment).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusReport {
    pub steps: BTreeMap<u32, StepStatus>,
    pub overall: Option<StepStatus>,
}

static PLAN_STEP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)STEP\s+(\d+)\s*-\s*([^:\n]*):.{0,200}?Status:\s*(APPLIED|FAILED|SKIPPED|UNKNOWN)")
        .unwrap()
});

static OVERALL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^[^\n]*\bOVERALL\b[^\n]*?Status:\s*(APPLIED|FAILED|SKIPPED|UNKNOWN)")
        .unwrap()
});

static JUDGMENT_STEP_HEADER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bStep\s+(\d+)\b").unwrap());

static STATUS_VALUE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)Status\s*:\s*\*{0,2}\s*(APPLIED|FAILED|SKIPPED|UNKNOWN)\b").unwrap()
});

/// Extract per-step and overall statuses from a plan execution transcript.
///
/// Report lines follow `STEP N - TITLE ... Status: X`; a title containing
/// `OVERALL` is treated as the aggregate pseudo-step, as is a standalone
/// `OVERALL ... Status: X` line.
pub fn extract_plan_statuses(transcript: &str) -> StatusReport {
    let mut report = StatusReport::default();
    for caps in PLAN_STEP_RE.captures_iter(transcript) {
        let step: u32 = match caps[1].parse() {
            Ok(n) => n,
            Err(_) => continue,
        };
        let title = caps[2].to_ascii_uppercase();
        let status: StepStatus = match caps[3].parse() {
            Ok(s) => s,
            Err(()) => continue,
        };
        if title.contains("OVERALL") {
            report.overall = Some(status);
        } else {
            report.steps.insert(step, status);
        }
    }
    if report.overall.is_none() {
        if let Some(caps) = OVERALL_RE.captures(transcript) {
            report.overall = caps[1].parse().ok();
        }
    }
    report
}

/// Extract per-step and overall statuses from an evaluator judgment.
///
/// The judgment is prose; a step header (`Step N`) opens a section that runs
/// until the next header, and the first `Status: X` inside it counts. A line
/// mentioning "overall" with a status is the aggregate.
pub fn extract_judgment_statuses(judgment: &str) -> StatusReport {
    let mut report = StatusReport::default();
    let mut current_step: Option<u32> = None;

    for line in judgment.lines() {
        let is_overall_line = line.to_ascii_uppercase().contains("OVERALL");

        if is_overall_line {
            if let Some(caps) = STATUS_VALUE_RE.captures(line) {
                if report.overall.is_none() {
                    report.overall = caps[1].parse().ok();
                }
            }
            current_step = None;
            continue;
        }

        if let Some(caps) = JUDGMENT_STEP_HEADER_RE.captures(line) {
            current_step = caps[1].parse().ok();
        }

        if let Some(step) = current_step {
            if let Some(caps) = STATUS_VALUE_RE.captures(line) {
                if let Ok(status) = caps[1].parse() {
                    report.steps.entry(step).or_insert(status);
                    current_step = None;
                }
            }
        }
    }
    report
}

/// Compare plan-reported statuses with evaluator-judged statuses.
///
/// Returns the list of disagreements (empty means aligned). A status present
/// on one side but missing on the other is a disagreement; so is an aggregate
/// mismatch.
pub fn alignment_issues(plan: &StatusReport, judgment: &StatusReport) -> Vec<String> {
    let mut issues = Vec::new();

    let mut all_steps: Vec<u32> = plan.steps.keys().chain(judgment.steps.keys()).copied().collect();
    all_steps.sort_unstable();
    all_steps.dedup();

    for step in all_steps {
        match (plan.steps.get(&step), judgment.steps.get(&step)) {
            (Some(p), Some(j)) if p != j => {
                issues.push(format!("step {step}: plan={p}, evaluator={j}"));
            }
            (Some(p), None) => {
                issues.push(format!("step {step}: plan has {p} but evaluator status missing"));
            }
            (None, Some(j)) => {
                issues.push(format!("step {step}: evaluator has {j} but plan status missing"));
            }
            _ => {}
        }
    }

    match (plan.overall, judgment.overall) {
        (Some(p), Some(j)) if p != j => {
            issues.push(format!("overall: plan={p}, evaluator={j}"));
        }
        (Some(p), None) => {
            issues.push(format!("overall: plan has {p} but evaluator status missing"));
        }
        (None, Some(j)) => {
            issues.push(format!("overall: evaluator has {j} but plan status missing"));
        }
        _ => {}
    }

    issues
}

/// Template-syntax fragments that must never appear in a reported status
/// value. Their presence means the plan leaked an unevaluated expression
/// into its report.
const TEMPLATE_LEAK_PATTERNS: &[&str] = &["{{", "{%", "APPLIED if", "FAILED if", "SKIPPED if"];

/// Validate that every `Status:` value in the transcript's report is a member
/// of the closed status set and not a leaked template expression.
pub fn check_status_values(transcript: &str) -> Result<(), String> {
    static STATUS_LINE_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?i)Status\s*:\s*(.+?)\s*$").unwrap());

    let mut issues = Vec::new();
    for (idx, line) in transcript.lines().enumerate() {
        let Some(caps) = STATUS_LINE_RE.captures(line) else {
            continue;
        };
        let value = caps[1].trim().trim_matches(|c| c == '"' || c == '\'');

        if TEMPLATE_LEAK_PATTERNS.iter().any(|p| value.contains(p)) {
            issues.push(format!(
                "line {}: status is an unevaluated template expression: {}",
                idx + 1,
                value
            ));
            continue;
        }
        if value.parse::<StepStatus>().is_err() {
            issues.push(format!(
                "line {}: status `{}` is not one of APPLIED/FAILED/SKIPPED/UNKNOWN",
                idx + 1,
                value
            ));
        }
    }

    if issues.is_empty() {
        return Ok(());
    }
    let shown: Vec<&String> = issues.iter().take(5).collect();
    let mut message = String::from("invalid status values in plan report:\n");
    for issue in shown {
        message.push_str("  - ");
        message.push_str(issue);
        message.push('\n');
    }
    if issues.len() > 5 {
        message.push_str(&format!("  ... and {} more\n", issues.len() - 5));
    }
    Err(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = "\
STEP 1 - LOCK SERVICE ACCOUNT: Status: APPLIED
STEP 2 - RESTRICT FILE MODE: Status: SKIPPED
STEP 3 - OVERALL: Status: APPLIED";

    #[test]
    fn plan_statuses_extracted_with_overall_pseudo_step() {
        let report = extract_plan_statuses(REPORT);
        assert_eq!(report.steps.get(&1), Some(&StepStatus::Applied));
        assert_eq!(report.steps.get(&2), Some(&StepStatus::Skipped));
        assert!(!report.steps.contains_key(&3));
        assert_eq!(report.overall, Some(StepStatus::Applied));
    }

    #[test]
    fn standalone_overall_line_extracted() {
        let transcript = "\
STEP 1 - A: Status: APPLIED
OVERALL REMEDIATION: Status: FAILED";
        let report = extract_plan_statuses(transcript);
        assert_eq!(report.overall, Some(StepStatus::Failed));
    }

    #[test]
    fn judgment_statuses_extracted_from_prose() {
        let judgment = "\
**Step 1**: lock the account
  - Status: APPLIED
Step 2: restrict mode
  - Status: SKIPPED
Overall assessment - Status: APPLIED";
        let report = extract_judgment_statuses(judgment);
        assert_eq!(report.steps.get(&1), Some(&StepStatus::Applied));
        assert_eq!(report.steps.get(&2), Some(&StepStatus::Skipped));
        assert_eq!(report.overall, Some(StepStatus::Applied));
    }

    #[test]
    fn aligned_reports_have_no_issues() {
        let plan = extract_plan_statuses(REPORT);
        let judgment = StatusReport {
            steps: plan.steps.clone(),
            overall: plan.overall,
        };
        assert!(alignment_issues(&plan, &judgment).is_empty());
    }

    #[test]
    fn single_disagreement_is_reported() {
        let plan = extract_plan_statuses(REPORT);
        let mut judgment = StatusReport {
            steps: plan.steps.clone(),
            overall: plan.overall,
        };
        judgment.steps.insert(2, StepStatus::Failed);
        let issues = alignment_issues(&plan, &judgment);
        assert_eq!(issues, vec!["step 2: plan=SKIPPED, evaluator=FAILED".to_string()]);
    }

    #[test]
    fn missing_side_is_a_disagreement() {
        let plan = extract_plan_statuses(REPORT);
        let mut judgment = StatusReport {
            steps: plan.steps.clone(),
            overall: None,
        };
        judgment.steps.remove(&1);
        let issues = alignment_issues(&plan, &judgment);
        assert_eq!(issues.len(), 2);
        assert!(issues[0].contains("step 1"));
        assert!(issues[1].contains("overall"));
    }

    #[test]
    fn overall_mismatch_alone_fails_alignment() {
        let plan = extract_plan_statuses(REPORT);
        let judgment = StatusReport {
            steps: plan.steps.clone(),
            overall: Some(StepStatus::Failed),
        };
        let issues = alignment_issues(&plan, &judgment);
        assert_eq!(issues, vec!["overall: plan=APPLIED, evaluator=FAILED".to_string()]);
    }

    #[test]
    fn valid_status_values_pass() {
        assert!(check_status_values(REPORT).is_ok());
    }

    #[test]
    fn leaked_template_expression_fails() {
        let transcript = "STEP 1 - A: Status: {{ status_1 | trim }}";
        let err = check_status_values(transcript).unwrap_err();
        assert!(err.contains("unevaluated template expression"));
    }

    #[test]
    fn literal_conditional_fails() {
        let transcript = "STEP 1 - A: Status: APPLIED if result else FAILED";
        assert!(check_status_values(transcript).is_err());
    }

    #[test]
    fn out_of_set_status_fails() {
        let transcript = "STEP 1 - A: Status: DONE";
        let err = check_status_values(transcript).unwrap_err();
        assert!(err.contains("`DONE`"));
    }
}
