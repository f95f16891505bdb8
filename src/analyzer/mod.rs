//! Structural analysis results and the analyzer seam
//!
//! The analyzer itself runs out of process (see [`bridge`]); this module
//! owns the result shape it must produce and the failure taxonomy.
//! Both camelCase and snake_case field names are accepted on the wire so
//! analyzers written against either convention decode the same way.

pub mod bridge;

pub use bridge::AnalyzerBridge;

use crate::source::SourceUnit;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Complete structural analysis for one source unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuralResult {
    #[serde(default, alias = "file_path", alias = "filePath")]
    pub identity: String,
    #[serde(alias = "total_lines")]
    pub total_lines: usize,
    #[serde(default)]
    pub functions: Vec<FunctionInfo>,
    #[serde(default)]
    pub issues: Vec<Issue>,
    #[serde(alias = "complexity_score")]
    pub complexity_score: f64,
    /// General advice reported by the analyzer itself
    #[serde(default)]
    pub suggestions: Vec<String>,
}

impl StructuralResult {
    /// Check that the result is internally consistent.
    ///
    /// Line numbers of 0 mean "not reported" and are not range-checked.
    pub fn validate(&self) -> Result<(), String> {
        if !self.complexity_score.is_finite() {
            return Err(format!(
                "complexity score is not a finite number ({})",
                self.complexity_score
            ));
        }

        for function in &self.functions {
            for line in [function.line_start, function.line_end] {
                if line > self.total_lines {
                    return Err(format!(
                        "function '{}' claims line {} but the file has {} lines",
                        function.name, line, self.total_lines
                    ));
                }
            }
            if function.line_start > 0
                && function.line_end > 0
                && function.line_end < function.line_start
            {
                return Err(format!(
                    "function '{}' ends (line {}) before it starts (line {})",
                    function.name, function.line_end, function.line_start
                ));
            }
        }

        Ok(())
    }

    pub fn count_by_severity(&self, severity: Severity) -> usize {
        self.issues.iter().filter(|i| i.severity == severity).count()
    }
}

/// A function discovered by the analyzer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionInfo {
    pub name: String,
    #[serde(default, alias = "line_start")]
    pub line_start: usize,
    #[serde(default, alias = "line_end")]
    pub line_end: usize,
    #[serde(default, alias = "line_count")]
    pub line_count: usize,
    #[serde(default)]
    pub complexity: u32,
    #[serde(default, alias = "nested_loops")]
    pub nested_loops: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Severity {
    pub fn label(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    #[serde(default)]
    pub line: usize,
    #[serde(default)]
    pub column: usize,
}

/// A code quality finding
///
/// The position may arrive nested (`"location": {"line", "column"}`) or as
/// top-level `line`/`column` keys; the nested form wins when both are present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "IssueWire")]
pub struct Issue {
    pub kind: String,
    pub severity: Severity,
    pub location: Location,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

#[derive(Deserialize)]
struct IssueWire {
    #[serde(default, alias = "issue_type", alias = "issueType")]
    kind: String,
    severity: Severity,
    #[serde(default)]
    location: Option<Location>,
    #[serde(default)]
    line: Option<usize>,
    #[serde(default)]
    column: Option<usize>,
    message: String,
    #[serde(default)]
    suggestion: Option<String>,
}

impl From<IssueWire> for Issue {
    fn from(wire: IssueWire) -> Self {
        let location = wire.location.unwrap_or(Location {
            line: wire.line.unwrap_or_default(),
            column: wire.column.unwrap_or_default(),
        });
        Self {
            kind: wire.kind,
            severity: wire.severity,
            location,
            message: wire.message,
            suggestion: wire.suggestion,
        }
    }
}

/// Why a structural analysis call failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    /// The analyzer process could not be started
    SpawnError,
    /// The process ran but exited unsuccessfully
    NonZeroExit,
    /// The output could not be collected, or was not a valid result
    MalformedOutput,
    /// The process exceeded the configured wall-clock limit
    Timeout,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureReason::SpawnError => "spawn error",
            FailureReason::NonZeroExit => "non-zero exit",
            FailureReason::MalformedOutput => "malformed output",
            FailureReason::Timeout => "timeout",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("analyzer {reason}: {detail}")]
pub struct AnalyzerFailure {
    pub reason: FailureReason,
    pub detail: String,
}

impl AnalyzerFailure {
    pub fn new(reason: FailureReason, detail: impl Into<String>) -> Self {
        Self {
            reason,
            detail: detail.into(),
        }
    }
}

/// Anything that can turn source text into a [`StructuralResult`]
#[async_trait]
pub trait StructuralAnalyzer: Send + Sync {
    async fn analyze(&self, source: &SourceUnit) -> Result<StructuralResult, AnalyzerFailure>;
}
