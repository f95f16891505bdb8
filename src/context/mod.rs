//! Prompt context derived from structural analysis
//!
//! Turns a [`StructuralResult`] into a one-line summary the model can use to
//! focus its review. Clauses appear in a fixed order and only when their
//! condition holds.

use crate::analyzer::StructuralResult;

/// Scores strictly above this are called out as high complexity
pub const HIGH_COMPLEXITY_THRESHOLD: f64 = 50.0;

const CLAUSE_SEPARATOR: &str = ". ";

/// Summarize a structural result for prompt enrichment.
///
/// Returns an empty string when nothing is worth mentioning.
pub fn summarize(result: &StructuralResult) -> String {
    let mut clauses = Vec::with_capacity(3);

    if !result.functions.is_empty() {
        clauses.push(format!("File contains {} functions", result.functions.len()));
    }

    if !result.issues.is_empty() {
        clauses.push(format!("Found {} code quality issues", result.issues.len()));
    }

    if result.complexity_score > HIGH_COMPLEXITY_THRESHOLD {
        clauses.push(format!("High complexity score: {}", result.complexity_score));
    }

    clauses.join(CLAUSE_SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::{FunctionInfo, Issue, Location, Severity};

    fn function(name: &str) -> FunctionInfo {
        FunctionInfo {
            name: name.to_string(),
            line_start: 1,
            line_end: 1,
            line_count: 1,
            complexity: 1,
            nested_loops: 0,
        }
    }

    fn issue() -> Issue {
        Issue {
            kind: "potential_infinite_loop".to_string(),
            severity: Severity::Warning,
            location: Location { line: 1, column: 0 },
            message: "While loop without clear exit condition".to_string(),
            suggestion: None,
        }
    }

    fn result(functions: usize, issues: usize, score: f64) -> StructuralResult {
        StructuralResult {
            identity: "sample.py".to_string(),
            total_lines: 10,
            functions: (0..functions).map(|i| function(&format!("f{}", i))).collect(),
            issues: (0..issues).map(|_| issue()).collect(),
            complexity_score: score,
            suggestions: vec![],
        }
    }

    #[test]
    fn test_empty_result_has_no_clauses() {
        assert_eq!(summarize(&result(0, 0, 0.0)), "");
    }

    #[test]
    fn test_single_function_and_issue_are_included() {
        assert_eq!(summarize(&result(1, 0, 3.0)), "File contains 1 functions");
        assert_eq!(summarize(&result(0, 1, 3.0)), "Found 1 code quality issues");
    }

    #[test]
    fn test_complexity_threshold_is_exclusive() {
        assert_eq!(summarize(&result(0, 0, 50.0)), "");
        assert_eq!(summarize(&result(0, 0, 51.0)), "High complexity score: 51");
        assert_eq!(summarize(&result(0, 0, 72.5)), "High complexity score: 72.5");
    }

    #[test]
    fn test_clauses_joined_in_fixed_order() {
        assert_eq!(
            summarize(&result(3, 2, 80.0)),
            "File contains 3 functions. Found 2 code quality issues. High complexity score: 80"
        );
        assert_eq!(
            summarize(&result(0, 2, 90.0)),
            "Found 2 code quality issues. High complexity score: 90"
        );
    }

    #[test]
    fn test_summary_is_deterministic() {
        let a = result(2, 1, 60.0);
        let first = summarize(&a);
        let _ = summarize(&result(9, 9, 99.0));
        assert_eq!(summarize(&a), first);
        assert_eq!(summarize(&a.clone()), first);
    }
}
