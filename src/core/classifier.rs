//! Classification of free-text evaluator judgments into a three-way verdict.
//!
//! The evaluator is a natural-language oracle; its output format is untrusted.
//! The explicit fail marker is searched before the pass marker because a
//! failure explanation may embed the pass keyword as a substring. When no
//! marker is present, keyword heuristics decide, and a wholly ambiguous
//! response classifies as [`Verdict::Ambiguous`] so the caller can apply a
//! pass-with-warning policy instead of blocking.

use crate::core::types::Verdict;

/// Marker prefix emitted by the structure evaluation.
pub const STRUCTURE_MARKER: &str = "PLAN_STRUCTURE";
/// Marker prefix emitted by the output-sufficiency evaluation.
pub const SUFFICIENCY_MARKER: &str = "OUTPUT_SUFFICIENCY";

const NEGATIVE_KEYWORDS: &[&str] = &[
    "missing",
    "not implemented",
    "not found",
    "not collected",
    "incomplete",
    "incorrect",
    "wrong",
    "error",
];

const POSITIVE_KEYWORDS: &[&str] = &[
    "all requirements",
    "properly implemented",
    "sufficient",
    "correctly",
    "verified",
];

/// Classify an evaluator response against a `MARKER: PASS|FAIL` convention.
pub fn classify(marker: &str, raw: &str) -> Verdict {
    let upper = raw.to_ascii_uppercase();
    let fail_marker = format!("{marker}: FAIL");
    let pass_marker = format!("{marker}: PASS");

    // Fail marker first: a FAIL explanation may quote "PASS" as a substring.
    if upper.contains(&fail_marker) {
        return Verdict::Fail(raw.to_string());
    }
    if upper.contains(&pass_marker) {
        return Verdict::Pass;
    }

    let lower = raw.to_ascii_lowercase();
    if NEGATIVE_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        return Verdict::Fail(raw.to_string());
    }
    if POSITIVE_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        return Verdict::Pass;
    }

    Verdict::Ambiguous(raw.to_string())
}

pub fn classify_structure(raw: &str) -> Verdict {
    classify(STRUCTURE_MARKER, raw)
}

pub fn classify_sufficiency(raw: &str) -> Verdict {
    classify(SUFFICIENCY_MARKER, raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_pass_marker_passes() {
        let verdict = classify_structure("PLAN_STRUCTURE: PASS\nAll steps mapped.");
        assert_eq!(verdict, Verdict::Pass);
    }

    #[test]
    fn fail_marker_wins_even_when_response_quotes_pass() {
        // A failure explanation that embeds the pass keyword must still fail.
        let raw = "PLAN_STRUCTURE: FAIL\nExpected a line like 'PLAN_STRUCTURE: PASS' per step.";
        match classify_structure(raw) {
            Verdict::Fail(reason) => assert!(reason.contains("Expected a line")),
            other => panic!("expected fail, got {other:?}"),
        }
    }

    #[test]
    fn marker_match_is_case_insensitive() {
        assert_eq!(classify_structure("plan_structure: pass"), Verdict::Pass);
    }

    #[test]
    fn negative_keywords_fail_without_marker() {
        let verdict = classify_structure("Step 3 is missing from the plan.");
        assert!(matches!(verdict, Verdict::Fail(_)));
    }

    #[test]
    fn positive_keywords_pass_without_marker() {
        let verdict = classify_sufficiency("All requirements have determinate results, verified.");
        assert_eq!(verdict, Verdict::Pass);
    }

    #[test]
    fn unparseable_response_is_ambiguous() {
        let verdict = classify_sufficiency("The plan exists.");
        assert!(matches!(verdict, Verdict::Ambiguous(_)));
    }
}
