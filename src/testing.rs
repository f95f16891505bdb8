//! In-crate fakes for the analyzer, completion endpoint, and credentials

use crate::analyzer::{AnalyzerFailure, StructuralAnalyzer, StructuralResult};
use crate::config::CredentialProvider;
use crate::source::SourceUnit;
use crate::suggest::llm::{CompletionClient, GenerationParams, LlmResponse};
use crate::suggest::SuggestionError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::Instant;

/// Credential provider whose answer can change between refreshes
pub struct SwitchableCredentials {
    key: Mutex<Option<String>>,
}

impl SwitchableCredentials {
    pub fn new(key: Option<&str>) -> Self {
        Self {
            key: Mutex::new(key.map(str::to_string)),
        }
    }

    pub fn set(&self, key: Option<&str>) {
        *self.key.lock() = key.map(str::to_string);
    }
}

impl CredentialProvider for SwitchableCredentials {
    fn api_key(&self) -> Option<String> {
        self.key.lock().clone()
    }
}

/// Completion endpoint returning a canned reply and recording prompts
pub struct FakeCompletion {
    reply: Result<String, String>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<(String, String)>>,
    api_keys: Mutex<Vec<String>>,
}

impl FakeCompletion {
    pub fn replying(content: &str) -> Self {
        Self::with_reply(Ok(content.to_string()))
    }

    pub fn failing(detail: &str) -> Self {
        Self::with_reply(Err(detail.to_string()))
    }

    fn with_reply(reply: Result<String, String>) -> Self {
        Self {
            reply,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
            api_keys: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<(String, String)> {
        self.prompts.lock().last().cloned()
    }

    pub fn last_api_key(&self) -> Option<String> {
        self.api_keys.lock().last().cloned()
    }
}

#[async_trait]
impl CompletionClient for FakeCompletion {
    async fn complete(
        &self,
        api_key: &str,
        system: &str,
        user: &str,
        params: &GenerationParams,
    ) -> Result<LlmResponse, SuggestionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts
            .lock()
            .push((system.to_string(), user.to_string()));
        self.api_keys.lock().push(api_key.to_string());
        match &self.reply {
            Ok(content) => Ok(LlmResponse {
                content: content.clone(),
                usage: None,
                model: params.model.clone(),
            }),
            Err(detail) => Err(SuggestionError::EndpointError {
                detail: detail.clone(),
            }),
        }
    }
}

/// Analyzer returning a fixed outcome and recording what it was asked
pub struct FakeAnalyzer {
    outcome: Result<StructuralResult, AnalyzerFailure>,
    delay: Option<Duration>,
    panics: bool,
    calls: Mutex<Vec<(SourceUnit, Instant)>>,
}

impl FakeAnalyzer {
    pub fn returning(result: StructuralResult) -> Self {
        Self {
            outcome: Ok(result),
            delay: None,
            panics: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(failure: AnalyzerFailure) -> Self {
        Self {
            outcome: Err(failure),
            delay: None,
            panics: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Take `delay` to answer, like a slow analyzer process
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Panic instead of answering, after recording the call
    pub fn panicking(mut self) -> Self {
        self.panics = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.lock().len()
    }

    /// Sources seen so far, with the (possibly paused) clock time of each call
    pub fn seen(&self) -> Vec<(SourceUnit, Instant)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl StructuralAnalyzer for FakeAnalyzer {
    async fn analyze(&self, source: &SourceUnit) -> Result<StructuralResult, AnalyzerFailure> {
        self.calls.lock().push((source.clone(), Instant::now()));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.panics {
            panic!("analyzer crashed on {}", source.identity);
        }
        self.outcome.clone()
    }
}

/// The result an analyzer would give for `def f(x): return x`
pub fn single_function_result() -> StructuralResult {
    serde_json::from_str(
        r#"{"totalLines":1,"functions":[{"name":"f"}],"issues":[],"complexityScore":3}"#,
    )
    .expect("fixture is valid")
}
