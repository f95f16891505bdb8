//! Human-readable rendering of analysis results for the terminal

use crate::analyzer::{Severity, StructuralResult};
use crate::suggest::llm::prompts::fence_tag;
use crate::suggest::SuggestionResult;
use crossterm::style::{Color, Stylize};
use std::fmt::Write;

const RULE_WIDTH: usize = 60;

/// Output styling; `plain()` produces text with no escape codes
#[derive(Debug, Clone, Copy)]
pub struct Palette {
    enabled: bool,
}

impl Palette {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn plain() -> Self {
        Self::new(false)
    }

    fn paint(&self, text: &str, color: Color) -> String {
        if self.enabled {
            text.with(color).to_string()
        } else {
            text.to_string()
        }
    }

    fn heading(&self, text: &str) -> String {
        if self.enabled {
            text.bold().to_string()
        } else {
            text.to_string()
        }
    }
}

fn severity_color(severity: Severity) -> Color {
    match severity {
        Severity::Error => Color::Red,
        Severity::Warning => Color::Yellow,
        Severity::Info => Color::Blue,
    }
}

fn banner(out: &mut String, title: &str, palette: Palette) {
    let rule = "=".repeat(RULE_WIDTH);
    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(out, "{}", palette.heading(title));
    let _ = writeln!(out, "{}", rule);
}

/// Render a structural analysis report
pub fn render_structure(result: &StructuralResult, palette: Palette) -> String {
    let mut out = String::new();
    banner(&mut out, "CODE MENTOR ANALYSIS", palette);

    let _ = writeln!(out, "\nFile: {}", result.identity);
    let _ = writeln!(out, "Total Lines: {}", result.total_lines);
    let _ = writeln!(out, "Complexity Score: {:.1}", result.complexity_score);

    if !result.functions.is_empty() {
        let _ = writeln!(out, "\nFunctions Found: {}", result.functions.len());
        for function in &result.functions {
            let _ = writeln!(
                out,
                "  - {}: {} lines, complexity {}",
                function.name, function.line_count, function.complexity
            );
        }
    }

    if !result.issues.is_empty() {
        let _ = writeln!(out, "\nIssues Found: {}", result.issues.len());
        for issue in &result.issues {
            let marker = format!("[{}]", issue.severity.label());
            let _ = writeln!(
                out,
                "  {} Line {}: {}",
                palette.paint(&marker, severity_color(issue.severity)),
                issue.location.line,
                issue.message
            );
            if let Some(suggestion) = &issue.suggestion {
                let _ = writeln!(out, "     Suggestion: {}", suggestion);
            }
        }
    }

    if !result.suggestions.is_empty() {
        let _ = writeln!(out, "\nGeneral Suggestions:");
        for suggestion in &result.suggestions {
            let _ = writeln!(out, "  - {}", suggestion);
        }
    }

    out
}

/// Render model suggestions; `language` tags the improved-code fence
pub fn render_suggestion(result: &SuggestionResult, language: &str, palette: Palette) -> String {
    let mut out = String::new();
    banner(&mut out, "MODEL SUGGESTIONS", palette);

    let _ = writeln!(out, "\n{}", palette.paint("Explanation:", Color::Green));
    let _ = writeln!(out, "  {}", result.explanation);
    let _ = writeln!(out, "\n{}", palette.paint("Time Complexity:", Color::Green));
    let _ = writeln!(out, "  {}", result.time_complexity);
    let _ = writeln!(out, "\n{}", palette.paint("Space Complexity:", Color::Green));
    let _ = writeln!(out, "  {}", result.space_complexity);

    if !result.suggestions.is_empty() {
        let _ = writeln!(out, "\n{}", palette.paint("Suggestions:", Color::Green));
        for (i, suggestion) in result.suggestions.iter().enumerate() {
            let _ = writeln!(out, "  {}. {}", i + 1, suggestion);
        }
    }

    if result.has_improved_code() {
        let _ = writeln!(out, "\n{}", palette.paint("Improved Code:", Color::Green));
        let _ = writeln!(out, "```{}", fence_tag(language));
        let _ = writeln!(out, "{}", result.improved_code);
        let _ = writeln!(out, "```");
    }

    out
}
