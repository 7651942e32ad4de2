use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::warn;

use finscope_protocol::NewsItem;

const MAX_ITEMS_PER_SOURCE: usize = 5;

#[derive(Debug, Deserialize)]
struct RawNewsItem {
    title: String,
    snippet: String,
    url: String,
    published_at: DateTime<Utc>,
}

/// Each of `fetch_market`/`fetch_search` queries exactly one of two
/// independent news providers, so callers can gate each source on its
/// own flag and keyword list without ever touching the other (spec.md
/// §4.5 "News"). A failure on a source degrades to an empty result
/// rather than failing the whole fetch.
pub struct NewsCollector {
    http: reqwest::Client,
    market_news_url: Option<String>,
    search_news_url: Option<String>,
}

impl NewsCollector {
    pub fn new(market_news_url: Option<String>, search_news_url: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            market_news_url,
            search_news_url,
        }
    }

    pub async fn fetch_market(&self, keywords: &[String]) -> Vec<NewsItem> {
        let joined = keywords.join(" ");
        fetch_one(&self.http, self.market_news_url.as_deref(), &joined, "market").await
    }

    pub async fn fetch_search(&self, keywords: &[String]) -> Vec<NewsItem> {
        let joined = keywords.join(" ");
        fetch_one(&self.http, self.search_news_url.as_deref(), &joined, "search").await
    }
}

async fn fetch_one(
    http: &reqwest::Client,
    base_url: Option<&str>,
    keywords: &str,
    source_type: &'static str,
) -> Vec<NewsItem> {
    let Some(base_url) = base_url else {
        return Vec::new();
    };

    let result = http
        .get(format!("{}/search", base_url))
        .query(&[("q", keywords), ("limit", &MAX_ITEMS_PER_SOURCE.to_string())])
        .send()
        .await;

    let response = match result {
        Ok(r) => r,
        Err(e) => {
            warn!(source = source_type, error = %e, "news source unreachable, degrading");
            return Vec::new();
        }
    };

    let raw: Vec<RawNewsItem> = match response.json().await {
        Ok(items) => items,
        Err(e) => {
            warn!(source = source_type, error = %e, "news source returned malformed response");
            return Vec::new();
        }
    };

    raw.into_iter()
        .take(MAX_ITEMS_PER_SOURCE)
        .map(|item| NewsItem {
            title: item.title,
            snippet: item.snippet,
            url: item.url,
            published_at: item.published_at,
            source_type: source_type.to_string(),
            source_name: base_url.to_string(),
        })
        .collect()
}
