use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

use crate::config::InferenceConfig;
use crate::retry::{with_retries, RetryPolicy};
use crate::types::{Result, ScoutError};

/// Text-in/text-out inference call. The model parameter is the selection
/// knob between the cheaper scoring model and the higher-quality drafting
/// model; everything else about the invocation is shared.
#[async_trait]
pub trait InferenceClient: Send + Sync {
    async fn complete(&self, model: &str, prompt: &str, max_tokens: u32) -> Result<String>;
}

/// Inference client for the Anthropic messages API.
pub struct AnthropicClient {
    client: Client,
    config: InferenceConfig,
    retry: RetryPolicy,
}

impl AnthropicClient {
    pub fn new(config: InferenceConfig, timeout: Duration, retry: RetryPolicy) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .expect("failed to create HTTP client");
        Self {
            client,
            config,
            retry,
        }
    }

    async fn request(&self, model: &str, prompt: &str, max_tokens: u32) -> Result<String> {
        let body = json!({
            "model": model,
            "max_tokens": max_tokens,
            "messages": [{ "role": "user", "content": prompt }]
        });

        let response = self
            .client
            .post(format!("{}/v1/messages", self.config.api_url))
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&body)
            .send()
            .await
            .map_err(|e| ScoutError::InferenceUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScoutError::InferenceUnavailable(format!(
                "HTTP {} from inference service",
                status
            )));
        }

        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ScoutError::InferenceUnavailable(e.to_string()))?;

        value["content"][0]["text"]
            .as_str()
            .map(|text| text.to_string())
            .ok_or_else(|| {
                ScoutError::InferenceUnavailable("response carried no text content".to_string())
            })
    }
}

#[async_trait]
impl InferenceClient for AnthropicClient {
    async fn complete(&self, model: &str, prompt: &str, max_tokens: u32) -> Result<String> {
        debug!("inference request to {}", model);
        with_retries(&self.retry, "inference request", || {
            self.request(model, prompt, max_tokens)
        })
        .await
    }
}

/// Scripted inference client for tests: replays queued responses in order
/// and records every request it receives.
#[derive(Default)]
pub struct MockInferenceClient {
    responses: Mutex<VecDeque<Result<String>>>,
    calls: Mutex<Vec<(String, String)>>,
}

impl MockInferenceClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_text(&self, text: impl Into<String>) {
        self.responses
            .lock()
            .expect("mock lock poisoned")
            .push_back(Ok(text.into()));
    }

    pub fn push_error(&self, err: ScoutError) {
        self.responses
            .lock()
            .expect("mock lock poisoned")
            .push_back(Err(err));
    }

    /// Every `(model, prompt)` pair seen so far.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().expect("mock lock poisoned").clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().expect("mock lock poisoned").len()
    }
}

#[async_trait]
impl InferenceClient for MockInferenceClient {
    async fn complete(&self, model: &str, prompt: &str, _max_tokens: u32) -> Result<String> {
        self.calls
            .lock()
            .expect("mock lock poisoned")
            .push((model.to_string(), prompt.to_string()));
        self.responses
            .lock()
            .expect("mock lock poisoned")
            .pop_front()
            .unwrap_or_else(|| {
                Err(ScoutError::InferenceUnavailable(
                    "no scripted response".to_string(),
                ))
            })
    }
}
