// src/notify/mod.rs
pub mod docapi;
pub mod webhook;

use anyhow::Result;

use crate::extract::Digest;

/// Outbound notification sink. Implementations are best-effort; the mux
/// logs failures and keeps going.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn publish(&self, digest: &Digest) -> Result<()>;
    fn name(&self) -> &'static str;
}

/// Fan-out over every configured sink.
#[derive(Default)]
pub struct NotifierMux {
    sinks: Vec<Box<dyn Notifier>>,
}

impl NotifierMux {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, sink: Box<dyn Notifier>) {
        self.sinks.push(sink);
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Publish to every sink; a failing sink never blocks the others.
    /// Returns the number of sinks that succeeded.
    pub async fn publish_all(&self, digest: &Digest) -> usize {
        let mut ok = 0usize;
        for sink in &self.sinks {
            match sink.publish(digest).await {
                Ok(()) => {
                    tracing::info!(sink = sink.name(), "digest published");
                    ok += 1;
                }
                Err(e) => {
                    tracing::warn!(error = ?e, sink = sink.name(), "sink publish failed");
                }
            }
        }
        ok
    }
}

/// Chat-style rendering shared by webhook sinks.
pub fn render_markdown(digest: &Digest) -> String {
    let date = chrono::Utc::now().format("%Y-%m-%d");
    let mut out = format!("**AI News Digest — {date}**\n");
    for item in &digest.stories {
        out.push('\n');
        out.push_str(&format!("**{}**\n{}\n", item.headline, item.summary));
        if item.link.is_empty() {
            out.push_str(&format!("_{}_\n", item.category));
        } else {
            out.push_str(&format!("_{}_ · <{}>\n", item.category, item.link));
        }
    }
    out
}
