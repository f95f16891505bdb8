//! Source units flowing through the analysis pipeline
//!
//! A [`SourceUnit`] is the text handed to the analyzer and the model, plus
//! an opaque identity (usually the file path) used for logging and for
//! keying debounced requests.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Code to analyze, immutable for the lifetime of a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceUnit {
    pub text: String,
    pub identity: String,
}

impl SourceUnit {
    pub fn new(text: impl Into<String>, identity: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            identity: identity.into(),
        }
    }

    pub fn line_count(&self) -> usize {
        self.text.lines().count()
    }

    /// Narrow to a 1-based inclusive line range, keeping the identity.
    ///
    /// The end is clamped to the last line. Returns `None` when the range is
    /// empty or starts past the end of the text.
    pub fn narrow(&self, selection: LineSelection) -> Option<SourceUnit> {
        let LineSelection { start, end } = selection;
        if start == 0 || end < start || start > self.line_count() {
            return None;
        }

        let text = self
            .text
            .lines()
            .skip(start - 1)
            .take(end - start + 1)
            .collect::<Vec<_>>()
            .join("\n");

        Some(SourceUnit {
            text,
            identity: self.identity.clone(),
        })
    }
}

/// 1-based inclusive line range, written `START:END` on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineSelection {
    pub start: usize,
    pub end: usize,
}

impl FromStr for LineSelection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (start, end) = s
            .split_once(':')
            .ok_or_else(|| format!("expected START:END, got '{}'", s))?;
        let start: usize = start
            .trim()
            .parse()
            .map_err(|_| format!("invalid start line '{}'", start))?;
        let end: usize = end
            .trim()
            .parse()
            .map_err(|_| format!("invalid end line '{}'", end))?;
        if start == 0 || end < start {
            return Err(format!("empty line range {}:{}", start, end));
        }
        Ok(Self { start, end })
    }
}

impl fmt::Display for LineSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.start, self.end)
    }
}

/// A source unit tagged with its position in the edit stream.
///
/// Sequence numbers are handed out monotonically by the orchestrator; a
/// request whose sequence is no longer the latest for its identity is stale.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub source: SourceUnit,
    pub sequence: u64,
}

impl AnalysisRequest {
    pub fn new(source: SourceUnit, sequence: u64) -> Self {
        Self { source, sequence }
    }

    pub fn identity(&self) -> &str {
        &self.source.identity
    }
}
