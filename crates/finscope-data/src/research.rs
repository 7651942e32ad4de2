use std::sync::OnceLock;

use serde::Deserialize;
use tracing::{info, warn};

use finscope_protocol::ResearchExcerpt;

const MAX_EXCERPTS: usize = 5;

#[derive(Debug, Deserialize)]
struct RawExcerpt {
    filename: String,
    page: u32,
    content: String,
    relevance_score: f64,
}

/// Queries an external retrieval-augmented-generation service for
/// research excerpts. Availability is probed once per process; once
/// marked unavailable the fetcher is silently skipped for the rest of
/// the process lifetime (spec.md §4.5 "Research excerpts").
pub struct ResearchCollector {
    http: reqwest::Client,
    base_url: Option<String>,
    available: OnceLock<bool>,
}

impl ResearchCollector {
    pub fn new(base_url: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url,
            available: OnceLock::new(),
        }
    }

    async fn probe(&self) -> bool {
        let Some(base_url) = &self.base_url else {
            return false;
        };
        match self.http.get(format!("{}/health", base_url)).send().await {
            Ok(resp) if resp.status().is_success() => {
                info!("research retrieval service available");
                true
            }
            Ok(resp) => {
                warn!(status = %resp.status(), "research retrieval service unhealthy, skipping");
                false
            }
            Err(e) => {
                warn!(error = %e, "research retrieval service unreachable, skipping");
                false
            }
        }
    }

    /// Returns `None` when the service was unavailable on its first
    /// probe, rather than an empty `Vec` — the orchestrator treats the
    /// two differently (omit the fetcher vs. a genuinely empty result).
    pub async fn fetch(&self, keywords: &[String]) -> Option<Vec<ResearchExcerpt>> {
        let is_available = match self.available.get() {
            Some(v) => *v,
            None => {
                let probed = self.probe().await;
                let _ = self.available.set(probed);
                probed
            }
        };
        if !is_available {
            return None;
        }

        let base_url = self.base_url.as_ref()?;
        let joined = keywords.join(" ");
        let result = self
            .http
            .get(format!("{}/search", base_url))
            .query(&[("q", joined.as_str()), ("k", &MAX_EXCERPTS.to_string())])
            .send()
            .await;

        let response = match result {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "research query failed, skipping for this message");
                return Some(Vec::new());
            }
        };

        let raw: Vec<RawExcerpt> = match response.json().await {
            Ok(items) => items,
            Err(e) => {
                warn!(error = %e, "research response malformed, skipping for this message");
                return Some(Vec::new());
            }
        };

        Some(
            raw.into_iter()
                .take(MAX_EXCERPTS)
                .map(|e| ResearchExcerpt {
                    filename: e.filename,
                    page: e.page,
                    content: e.content,
                    relevance_score: e.relevance_score,
                })
                .collect(),
        )
    }
}
