// src/pipeline/llm.rs
//! LLM completion collaborator: trait, OpenAI-compatible implementation,
//! and the test doubles used across the crate.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Ask the provider for a JSON object. The response is still not
    /// guaranteed to parse; see `extract`.
    pub json_mode: bool,
}

#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, req: CompletionRequest) -> Result<String>;
    fn name(&self) -> &'static str;
}

const RETRY_BACKOFF_BASE_MS: u64 = 500;

enum CallError {
    Transient(anyhow::Error),
    Fatal(anyhow::Error),
}

/// OpenAI Chat Completions client. Transient failures (timeouts, 429, 5xx)
/// are retried with exponential backoff; other 4xx responses are not.
pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    max_retries: u32,
}

impl OpenAiClient {
    pub fn new(api_key: String, model: String) -> Self {
        let http = reqwest::Client::builder()
            .user_agent("ai-news-digest/0.1")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(60))
            .build()
            .expect("reqwest client");
        Self {
            http,
            api_key,
            model,
            max_retries: 3,
        }
    }

    pub fn with_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    async fn try_once(&self, req: &CompletionRequest) -> std::result::Result<String, CallError> {
        #[derive(Serialize)]
        struct ResponseFormat {
            #[serde(rename = "type")]
            kind: &'static str,
        }
        #[derive(Serialize)]
        struct Body<'a> {
            model: &'a str,
            messages: &'a [ChatMessage],
            temperature: f32,
            max_tokens: u32,
            #[serde(skip_serializing_if = "Option::is_none")]
            response_format: Option<ResponseFormat>,
        }
        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: ChoiceMsg,
        }
        #[derive(Deserialize)]
        struct ChoiceMsg {
            content: String,
        }

        let body = Body {
            model: &self.model,
            messages: &req.messages,
            temperature: req.temperature,
            max_tokens: req.max_tokens,
            response_format: req.json_mode.then_some(ResponseFormat {
                kind: "json_object",
            }),
        };

        let resp = self
            .http
            .post("https://api.openai.com/v1/chat/completions")
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| CallError::Transient(anyhow!(e).context("llm request failed")))?;

        let status = resp.status();
        if status.as_u16() == 429 || status.is_server_error() {
            return Err(CallError::Transient(anyhow!("llm responded {status}")));
        }
        if !status.is_success() {
            return Err(CallError::Fatal(anyhow!("llm responded {status}")));
        }

        let parsed: Resp = resp
            .json()
            .await
            .map_err(|e| CallError::Fatal(anyhow!(e).context("llm response body")))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();
        Ok(content)
    }
}

#[async_trait::async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, req: CompletionRequest) -> Result<String> {
        if self.api_key.is_empty() {
            return Err(anyhow!("llm disabled: no API key configured"));
        }

        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.try_once(&req).await {
                Ok(text) => return Ok(text),
                Err(CallError::Fatal(e)) => return Err(e),
                Err(CallError::Transient(e)) => {
                    if attempt >= self.max_retries {
                        return Err(e);
                    }
                    let delay = RETRY_BACKOFF_BASE_MS << (attempt - 1);
                    tracing::warn!(error = ?e, attempt, "transient llm failure, backing off");
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                }
            }
        }
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

/// Scripted test double: responses (or failures) are popped in push order.
#[derive(Default)]
pub struct MockLlm {
    script: Mutex<VecDeque<std::result::Result<String, String>>>,
    calls: AtomicUsize,
}

impl MockLlm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_ok(&self, response: impl Into<String>) {
        self.script
            .lock()
            .expect("mock lock poisoned")
            .push_back(Ok(response.into()));
    }

    pub fn push_err(&self, message: impl Into<String>) {
        self.script
            .lock()
            .expect("mock lock poisoned")
            .push_back(Err(message.into()));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl LlmClient for MockLlm {
    async fn complete(&self, _req: CompletionRequest) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.script.lock().expect("mock lock poisoned").pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(msg)) => Err(anyhow!(msg)),
            None => Err(anyhow!("mock llm script exhausted")),
        }
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

/// Deterministic test double: answers with the last user message behind a
/// fixed prefix, so order-preservation and cache tests can assert exact
/// outputs.
pub struct EchoLlm {
    pub prefix: String,
    calls: AtomicUsize,
}

impl EchoLlm {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl LlmClient for EchoLlm {
    async fn complete(&self, req: CompletionRequest) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let last_user = req
            .messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .map(|m| m.content.as_str())
            .unwrap_or_default();
        Ok(format!("{}{}", self.prefix, last_user))
    }

    fn name(&self) -> &'static str {
        "echo"
    }
}
