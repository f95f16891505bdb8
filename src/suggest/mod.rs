//! Suggestion service
//!
//! Builds a review prompt for a source unit, sends it to the completion
//! endpoint, and decodes the reply into a fully populated
//! [`SuggestionResult`]. Only configuration and transport problems are
//! errors; a reply that ignores the requested format still yields a result.

pub mod llm;

use crate::config::CredentialProvider;
use crate::source::SourceUnit;
use llm::{decode_suggestion, CompletionClient, GenerationParams};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Improvement suggestions for a piece of code
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionResult {
    pub improved_code: String,
    pub time_complexity: String,
    pub space_complexity: String,
    pub explanation: String,
    pub suggestions: Vec<String>,
}

impl SuggestionResult {
    /// Whether `improved_code` is real code rather than a placeholder
    pub fn has_improved_code(&self) -> bool {
        !self.improved_code.is_empty()
            && self.improved_code != llm::parse::UNPARSED_IMPROVED_CODE
            && self.improved_code != llm::parse::NO_IMPROVED_CODE
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SuggestionError {
    #[error("No API key configured. Set OPENAI_API_KEY or run 'mentor setup'.")]
    ConfigurationMissing,
    #[error("Failed to get suggestions: {detail}")]
    EndpointError { detail: String },
}

/// Credential as last read from the provider
#[derive(Debug, Clone, Default)]
struct CredentialSnapshot {
    api_key: Option<String>,
    version: u64,
}

pub struct SuggestionService {
    credentials: Arc<dyn CredentialProvider>,
    client: Arc<dyn CompletionClient>,
    params: GenerationParams,
    language: String,
    snapshot: RwLock<CredentialSnapshot>,
}

impl SuggestionService {
    pub fn new(
        credentials: Arc<dyn CredentialProvider>,
        client: Arc<dyn CompletionClient>,
        params: GenerationParams,
        language: impl Into<String>,
    ) -> Self {
        let snapshot = CredentialSnapshot {
            api_key: credentials.api_key(),
            version: 1,
        };
        Self {
            credentials,
            client,
            params,
            language: language.into(),
            snapshot: RwLock::new(snapshot),
        }
    }

    /// Re-read the credential; returns the new snapshot version.
    pub fn refresh_configuration(&self) -> u64 {
        let api_key = self.credentials.api_key();
        let mut snapshot = self.snapshot.write();
        snapshot.api_key = api_key;
        snapshot.version += 1;
        debug!(
            version = snapshot.version,
            configured = snapshot.api_key.is_some(),
            "suggestion configuration refreshed"
        );
        snapshot.version
    }

    pub fn is_configured(&self) -> bool {
        self.snapshot.read().api_key.is_some()
    }

    pub fn configuration_version(&self) -> u64 {
        self.snapshot.read().version
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    /// Ask the model to review `source`, optionally steered by `context`.
    pub async fn suggest(
        &self,
        source: &SourceUnit,
        context: Option<&str>,
    ) -> Result<SuggestionResult, SuggestionError> {
        let api_key = self
            .snapshot
            .read()
            .api_key
            .clone()
            .ok_or(SuggestionError::ConfigurationMissing)?;

        let system = llm::prompts::review_system(&self.language);
        let user = llm::prompts::review_user(&source.text, context, &self.language);

        let response = self
            .client
            .complete(&api_key, &system, &user, &self.params)
            .await?;

        if response.content.trim().is_empty() {
            return Err(SuggestionError::EndpointError {
                detail: "No response from the model".to_string(),
            });
        }

        let outcome = decode_suggestion(&response.content);
        info!(
            identity = %source.identity,
            fallback = outcome.is_fallback(),
            tokens = response.usage.as_ref().map(|u| u.total_tokens).unwrap_or_default(),
            "suggestions received"
        );
        Ok(outcome.into_result())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeCompletion, SwitchableCredentials};

    fn service(
        credentials: Arc<dyn CredentialProvider>,
        client: Arc<FakeCompletion>,
    ) -> SuggestionService {
        SuggestionService::new(credentials, client, GenerationParams::default(), "Python")
    }

    #[tokio::test]
    async fn test_missing_key_is_configuration_error_without_calling_endpoint() {
        let client = Arc::new(FakeCompletion::replying("{}"));
        let svc = service(Arc::new(SwitchableCredentials::new(None)), client.clone());

        let err = svc
            .suggest(&SourceUnit::new("x = 1", "x.py"), None)
            .await
            .unwrap_err();
        assert_eq!(err, SuggestionError::ConfigurationMissing);
        assert_eq!(client.calls(), 0);
    }

    #[tokio::test]
    async fn test_refresh_picks_up_new_key() {
        let creds = Arc::new(SwitchableCredentials::new(None));
        let client = Arc::new(FakeCompletion::replying(r#"{"explanation": "ok"}"#));
        let svc = service(creds.clone(), client.clone());
        assert!(!svc.is_configured());
        let before = svc.configuration_version();

        creds.set(Some("sk-new"));
        // Not visible until refreshed
        assert!(!svc.is_configured());
        let after = svc.refresh_configuration();
        assert!(after > before);
        assert!(svc.is_configured());

        let result = svc
            .suggest(&SourceUnit::new("x = 1", "x.py"), None)
            .await
            .unwrap();
        assert_eq!(result.explanation, "ok");
        assert_eq!(client.last_api_key().as_deref(), Some("sk-new"));
    }

    #[tokio::test]
    async fn test_prompt_carries_code_and_context() {
        let client = Arc::new(FakeCompletion::replying(r#"{"explanation": "ok"}"#));
        let svc = service(
            Arc::new(SwitchableCredentials::new(Some("sk-test"))),
            client.clone(),
        );
        svc.suggest(
            &SourceUnit::new("def f(x): return x", "f.py"),
            Some("File contains 1 functions"),
        )
        .await
        .unwrap();

        let (system, user) = client.last_prompt().unwrap();
        assert!(system.contains("expert Python code reviewer"));
        assert!(user.contains("def f(x): return x"));
        assert!(user.contains("Context: File contains 1 functions"));
    }

    #[tokio::test]
    async fn test_empty_reply_is_endpoint_error() {
        let client = Arc::new(FakeCompletion::replying("   "));
        let svc = service(
            Arc::new(SwitchableCredentials::new(Some("sk-test"))),
            client,
        );
        let err = svc
            .suggest(&SourceUnit::new("x = 1", "x.py"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, SuggestionError::EndpointError { .. }));
    }

    #[tokio::test]
    async fn test_endpoint_failure_propagates() {
        let client = Arc::new(FakeCompletion::failing("connection refused"));
        let svc = service(
            Arc::new(SwitchableCredentials::new(Some("sk-test"))),
            client,
        );
        let err = svc
            .suggest(&SourceUnit::new("x = 1", "x.py"), None)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            SuggestionError::EndpointError {
                detail: "connection refused".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_prose_reply_degrades_to_fallback() {
        let client = Arc::new(FakeCompletion::replying("Looks good overall."));
        let svc = service(
            Arc::new(SwitchableCredentials::new(Some("sk-test"))),
            client,
        );
        let result = svc
            .suggest(&SourceUnit::new("x = 1", "x.py"), None)
            .await
            .unwrap();
        assert_eq!(result.explanation, "Looks good overall.");
        assert!(!result.has_improved_code());
        assert_eq!(result.suggestions.len(), 1);
    }
}
