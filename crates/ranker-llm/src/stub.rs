//! A fully deterministic [`LlmProvider`] for tests (§4.1: "tests that
//! fix the LLM must inject a deterministic stub").

use async_trait::async_trait;
use std::sync::Mutex;

use crate::provider::{CompletionRequest, LlmProvider, LlmResponse};

/// Returns a fixed JSON response keyed by a substring of the prompt's
/// user message, falling back to `default_response` when nothing
/// matches. Useful for driving the three §4.1 tasks and the §4.5
/// fit-evaluator call with canned, reproducible output.
pub struct StubLlmProvider {
    responses: Vec<(String, String)>,
    default_response: String,
    calls: Mutex<Vec<String>>,
}

impl StubLlmProvider {
    pub fn new(default_response: impl Into<String>) -> Self {
        Self {
            responses: Vec::new(),
            default_response: default_response.into(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_response(mut self, matching_substring: impl Into<String>, response: impl Into<String>) -> Self {
        self.responses.push((matching_substring.into(), response.into()));
        self
    }

    /// The user-message content of every call made so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmProvider for StubLlmProvider {
    fn name(&self) -> &str {
        "stub"
    }

    fn model(&self) -> &str {
        "stub-deterministic"
    }

    async fn complete(&self, request: &CompletionRequest) -> anyhow::Result<LlmResponse> {
        let user_content = request.messages.iter().rev().find(|m| m.role == "user").map(|m| m.content.clone()).unwrap_or_default();
        self.calls.lock().unwrap().push(user_content.clone());

        let content = self
            .responses
            .iter()
            .find(|(needle, _)| user_content.contains(needle.as_str()))
            .map(|(_, response)| response.clone())
            .unwrap_or_else(|| self.default_response.clone());

        Ok(LlmResponse {
            content,
            model: self.model().to_string(),
            usage: None,
            finish_reason: Some("stop".to_string()),
        })
    }
}

/// A `StubLlmProvider` that always fails, for exercising per-task
/// fallback paths (§4.1, §7).
pub struct AlwaysFailingProvider;

#[async_trait]
impl LlmProvider for AlwaysFailingProvider {
    fn name(&self) -> &str {
        "stub-failing"
    }

    fn model(&self) -> &str {
        "stub-failing"
    }

    async fn complete(&self, _request: &CompletionRequest) -> anyhow::Result<LlmResponse> {
        anyhow::bail!("stub provider configured to always fail")
    }
}
