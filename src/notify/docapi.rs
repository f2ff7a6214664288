// src/notify/docapi.rs
use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use std::time::Duration;

use super::Notifier;
use crate::category::{self, Category};
use crate::extract::{Digest, DigestItem};

/// Document-database sink: one page per digest item, with title, date,
/// category and body fields. The category written out is always a member of
/// the fixed category set.
pub struct DocApiNotifier {
    base_url: String,
    token: String,
    database_id: String,
    client: Client,
    timeout: Duration,
}

impl DocApiNotifier {
    pub fn new(base_url: String, token: String, database_id: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            database_id,
            client: Client::new(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    fn page_body(&self, item: &DigestItem, date: &str) -> serde_json::Value {
        let cat: Category = category::classify(Some(&item.category), &item.headline);
        serde_json::json!({
            "parent": { "database_id": self.database_id },
            "properties": {
                "title": { "title": [{ "text": { "content": item.headline } }] },
                "date": { "date": { "start": date } },
                "category": { "select": { "name": cat.label_ko() } },
                "link": { "url": if item.link.is_empty() { serde_json::Value::Null } else { serde_json::Value::String(item.link.clone()) } },
            },
            "children": [{
                "object": "block",
                "type": "paragraph",
                "paragraph": {
                    "rich_text": [{ "type": "text", "text": { "content": item.summary } }]
                }
            }]
        })
    }

    async fn create_page(&self, item: &DigestItem, date: &str) -> Result<()> {
        let body = self.page_body(item, date);
        self.client
            .post(format!("{}/pages", self.base_url))
            .timeout(self.timeout)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .context("doc api request")?
            .error_for_status()
            .context("doc api non-2xx")?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl Notifier for DocApiNotifier {
    async fn publish(&self, digest: &Digest) -> Result<()> {
        let date = chrono::Utc::now().format("%Y-%m-%d").to_string();

        let mut failed = 0usize;
        for item in &digest.stories {
            if let Err(e) = self.create_page(item, &date).await {
                tracing::warn!(error = ?e, headline = %item.headline, "doc page creation failed");
                failed += 1;
            }
        }
        if failed == digest.stories.len() && !digest.stories.is_empty() {
            return Err(anyhow!("all {failed} page creations failed"));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "doc-api"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_body_normalizes_category_to_fixed_set() {
        let sink = DocApiNotifier::new(
            "https://docs.example/v1/".into(),
            "tok".into(),
            "db1".into(),
        );
        let item = DigestItem {
            headline: "New model release".into(),
            summary: "S".into(),
            category: "Something Invalid".into(),
            link: String::new(),
        };
        let body = sink.page_body(&item, "2025-06-15");
        let cat = body["properties"]["category"]["select"]["name"]
            .as_str()
            .unwrap();
        assert_eq!(cat, "모델 업데이트");
        assert!(body["properties"]["link"]["url"].is_null());
    }
}
