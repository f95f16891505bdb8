//! Analysis orchestration
//!
//! Wires the structural analyzer, the context builder, and the suggestion
//! service into the operations a host calls:
//!
//! - [`Orchestrator::analyze_full`]: structure plus whole-file suggestions
//! - [`Orchestrator::suggest_focused`]: suggestions steered by the structure
//! - [`Orchestrator::notify_change`]: debounced `analyze_full` on edits
//!
//! The analyzer always runs first; if it fails the suggestion service is
//! never called.

pub mod background;
pub mod messages;

pub use messages::ReactiveMessage;

use crate::analyzer::{AnalyzerFailure, StructuralAnalyzer, StructuralResult};
use crate::context;
use crate::source::{AnalysisRequest, SourceUnit};
use crate::suggest::{SuggestionError, SuggestionResult, SuggestionService};
use background::{spawn_background, DebounceRegister, SlotGuard, SlotRelease};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

/// Structural analysis merged with model suggestions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombinedResult {
    pub structure: StructuralResult,
    pub suggestion: SuggestionResult,
    pub analyzed_at: DateTime<Utc>,
}

/// A hard failure from one pipeline stage
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    #[error("Structural analysis failed: {0}")]
    Analyzer(#[from] AnalyzerFailure),
    #[error("{0}")]
    Suggestion(#[from] SuggestionError),
}

impl PipelineError {
    /// Name of the stage that failed
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::Analyzer(_) => "analyzer",
            PipelineError::Suggestion(_) => "suggestion",
        }
    }
}

pub struct Orchestrator {
    analyzer: Arc<dyn StructuralAnalyzer>,
    suggestions: Arc<SuggestionService>,
    debounce: DebounceRegister,
    tx: UnboundedSender<ReactiveMessage>,
}

impl Orchestrator {
    /// Build an orchestrator; change-triggered results arrive on the receiver.
    pub fn new(
        analyzer: Arc<dyn StructuralAnalyzer>,
        suggestions: Arc<SuggestionService>,
        debounce: Duration,
    ) -> (Arc<Self>, UnboundedReceiver<ReactiveMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let orchestrator = Arc::new(Self {
            analyzer,
            suggestions,
            debounce: DebounceRegister::new(debounce),
            tx,
        });
        (orchestrator, rx)
    }

    /// Structural analysis only
    pub async fn analyze_structure(
        &self,
        source: &SourceUnit,
    ) -> Result<StructuralResult, PipelineError> {
        Ok(self.analyzer.analyze(source).await?)
    }

    /// Structural analysis followed by a whole-file review
    pub async fn analyze_full(&self, source: &SourceUnit) -> Result<CombinedResult, PipelineError> {
        info!(identity = %source.identity, "running full analysis");
        let structure = self.analyzer.analyze(source).await?;

        let file_context = format!("Analyzing file: {}", source.identity);
        let suggestion = self
            .suggestions
            .suggest(source, Some(&file_context))
            .await?;

        Ok(CombinedResult {
            structure,
            suggestion,
            analyzed_at: Utc::now(),
        })
    }

    /// Review steered by a summary of the code's structure.
    ///
    /// `source` may already be narrowed to a selection; the analyzer sees
    /// the same text the model does.
    pub async fn suggest_focused(
        &self,
        source: &SourceUnit,
    ) -> Result<SuggestionResult, PipelineError> {
        let structure = self.analyzer.analyze(source).await?;
        let summary = context::summarize(&structure);
        debug!(identity = %source.identity, context = %summary, "derived prompt context");

        let context = (!summary.is_empty()).then_some(summary.as_str());
        Ok(self.suggestions.suggest(source, context).await?)
    }

    /// Re-read the endpoint credential
    pub fn refresh_configuration(&self) -> u64 {
        self.suggestions.refresh_configuration()
    }

    /// Schedule a debounced `analyze_full` for an edited document.
    ///
    /// Any analysis still pending or running for the same identity is
    /// cancelled. Returns the sequence number of the new request.
    pub fn notify_change(self: &Arc<Self>, source: SourceUnit) -> u64 {
        let (sequence, cancel) = self.debounce.supersede(&source.identity);
        let request = AnalysisRequest::new(source, sequence);
        let window = self.debounce.window();
        let this = Arc::clone(self);
        debug!(identity = %request.identity(), sequence, "change scheduled");

        spawn_background(self.tx.clone(), "reactive_analysis", async move {
            let identity = request.identity().to_string();
            let slot = SlotGuard::new(&this.debounce, &identity, sequence);

            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(identity = %identity, sequence, "change superseded before running");
                    return;
                }
                _ = tokio::time::sleep(window) => {}
            }

            let outcome = tokio::select! {
                _ = cancel.cancelled() => None,
                outcome = this.analyze_full(&request.source) => Some(outcome),
            };

            let release = slot.finish();
            let message = match (outcome, release) {
                (Some(Ok(result)), SlotRelease::Released) => ReactiveMessage::Completed {
                    identity,
                    sequence,
                    result: Box::new(result),
                },
                (Some(Err(error)), SlotRelease::Released) => {
                    warn!(identity = %identity, stage = error.stage(), %error, "change-triggered analysis failed");
                    ReactiveMessage::Failed {
                        identity,
                        sequence,
                        error,
                    }
                }
                (_, SlotRelease::Cancelled) => {
                    debug!(identity = %identity, sequence, "analysis cancelled");
                    ReactiveMessage::Cancelled { identity, sequence }
                }
                _ => {
                    debug!(identity = %identity, sequence, "discarding superseded analysis");
                    ReactiveMessage::Superseded { identity, sequence }
                }
            };
            let _ = this.tx.send(message);
        });

        sequence
    }

    /// Cancel all pending and running change-triggered analyses
    pub fn cancel_pending(&self) {
        self.debounce.cancel_all();
    }

    pub fn pending_count(&self) -> usize {
        self.debounce.pending_count()
    }
}
