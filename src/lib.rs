//! Code Mentor library crate
//!
//! Runs an out-of-process structural analyzer over a source unit, turns its
//! findings into prompt context, and asks an OpenAI-style completion endpoint
//! for improvement suggestions. The [`app::Orchestrator`] ties the stages
//! together and debounces analysis of documents that are being edited.

pub mod analyzer;
pub mod app;
pub mod config;
pub mod context;
pub mod keyring;
pub mod report;
pub mod source;
pub mod suggest;
pub mod util;
pub mod watch;

#[cfg(test)]
mod testing;

pub use analyzer::{AnalyzerBridge, AnalyzerFailure, StructuralAnalyzer, StructuralResult};
pub use app::{CombinedResult, Orchestrator, PipelineError, ReactiveMessage};
pub use source::{LineSelection, SourceUnit};
pub use suggest::{SuggestionError, SuggestionResult, SuggestionService};
