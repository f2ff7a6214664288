// src/notify/webhook.rs
use anyhow::{anyhow, Result};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use super::{render_markdown, Notifier};
use crate::extract::Digest;

/// Chat webhooks cap message length (Discord: 2000); chunks stay under it
/// with room for formatting.
const CHUNK_MAX_CHARS: usize = 1_900;

/// Webhook sink posting the rendered digest as `{content}` messages.
#[derive(Clone)]
pub struct WebhookNotifier {
    webhook: String,
    client: Client,
    timeout: Duration,
    max_retries: u8,
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    content: &'a str,
}

impl WebhookNotifier {
    pub fn new(webhook: String) -> Self {
        Self {
            webhook,
            client: Client::new(),
            timeout: Duration::from_secs(5),
            max_retries: 3,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries.max(1);
        self
    }

    async fn post_chunk(&self, content: &str) -> Result<()> {
        let payload = WebhookPayload { content };

        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let res = self
                .client
                .post(&self.webhook)
                .timeout(self.timeout)
                .json(&payload)
                .send()
                .await;

            match res {
                Ok(rsp) => {
                    if let Err(e) = rsp.error_for_status_ref() {
                        if attempt < self.max_retries {
                            tokio::time::sleep(Duration::from_millis(500u64 << (attempt - 1)))
                                .await;
                            continue;
                        }
                        return Err(anyhow!("webhook HTTP error: {e}"));
                    }
                    return Ok(());
                }
                Err(e) => {
                    if attempt < self.max_retries {
                        tokio::time::sleep(Duration::from_millis(500u64 << (attempt - 1))).await;
                        continue;
                    }
                    return Err(anyhow!("webhook request failed: {e}"));
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl Notifier for WebhookNotifier {
    async fn publish(&self, digest: &Digest) -> Result<()> {
        let rendered = render_markdown(digest);
        for chunk in chunk_message(&rendered, CHUNK_MAX_CHARS) {
            self.post_chunk(&chunk).await?;
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "webhook"
    }
}

/// Split on line boundaries so no chunk exceeds `max_chars`. A single line
/// longer than the cap is hard-split.
fn chunk_message(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for line in text.lines() {
        let mut line = line.to_string();
        while line.chars().count() > max_chars {
            let head: String = line.chars().take(max_chars).collect();
            let rest: String = line.chars().skip(max_chars).collect();
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            chunks.push(head);
            line = rest;
        }
        let needed = line.chars().count() + 1;
        if current.chars().count() + needed > max_chars && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
        }
        current.push_str(&line);
        current.push('\n');
    }
    if !current.trim().is_empty() {
        chunks.push(current);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_one_chunk() {
        let chunks = chunk_message("hello\nworld\n", 100);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0], "hello\nworld\n");
    }

    #[test]
    fn long_text_splits_on_line_boundaries() {
        let text = format!("{}\n{}\n{}\n", "a".repeat(40), "b".repeat(40), "c".repeat(40));
        let chunks = chunk_message(&text, 90);
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|c| c.chars().count() <= 90));
    }

    #[test]
    fn oversized_single_line_is_hard_split() {
        let text = "x".repeat(250);
        let chunks = chunk_message(&text, 100);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.chars().count() <= 101));
    }
}
