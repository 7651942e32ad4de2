use serde::{Deserialize, Serialize};

/// Structured classification of a user query (spec.md §3 Intent, §4.3).
///
/// Immutable once saved on a Message. `forecast_model` absent means
/// "auto-select" (spec.md §9 Open Questions (a)).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Intent {
    pub is_in_scope: bool,
    pub is_forecast: bool,
    pub enable_rag: bool,
    pub enable_search: bool,
    pub enable_domain_info: bool,
    #[serde(default)]
    pub stock_mention: Option<String>,
    #[serde(default)]
    pub stock_full_name: Option<String>,
    #[serde(default)]
    pub raw_search_keywords: Vec<String>,
    #[serde(default)]
    pub raw_rag_keywords: Vec<String>,
    #[serde(default)]
    pub raw_domain_keywords: Vec<String>,
    #[serde(default)]
    pub forecast_model: Option<String>,
    pub history_days: u32,
    pub forecast_horizon: u32,
    pub reason: String,
    #[serde(default)]
    pub out_of_scope_reply: Option<String>,
}

impl Intent {
    /// Conservative fallback returned when the LLM's JSON tail fails to
    /// parse (spec.md §4.3).
    pub fn conservative_default(reason: impl Into<String>) -> Self {
        Self {
            is_in_scope: true,
            is_forecast: false,
            enable_rag: false,
            enable_search: false,
            enable_domain_info: false,
            stock_mention: None,
            stock_full_name: None,
            raw_search_keywords: Vec::new(),
            raw_rag_keywords: Vec::new(),
            raw_domain_keywords: Vec::new(),
            forecast_model: None,
            history_days: 180,
            forecast_horizon: 30,
            reason: reason.into(),
            out_of_scope_reply: None,
        }
    }

    pub fn has_stock(&self) -> bool {
        self.stock_mention.as_deref().is_some_and(|s| !s.is_empty())
    }
}

/// The three keyword lists after entity resolution rewrites aliases to
/// canonical names and injects the entity code (spec.md §3).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolvedKeywords {
    pub search_keywords: Vec<String>,
    pub rag_keywords: Vec<String>,
    pub domain_keywords: Vec<String>,
}

impl ResolvedKeywords {
    /// No entity was resolved: the resolved sets equal the raw sets
    /// (spec.md §8 boundary behavior "Entity mention absent").
    pub fn from_raw(intent: &Intent) -> Self {
        Self {
            search_keywords: intent.raw_search_keywords.clone(),
            rag_keywords: intent.raw_rag_keywords.clone(),
            domain_keywords: intent.raw_domain_keywords.clone(),
        }
    }

    /// Replace the raw mention with the canonical name and append the
    /// entity code to each keyword list (spec.md §4.9 stage 2).
    pub fn resolve(intent: &Intent, canonical_name: &str, entity_code: &str) -> Self {
        let rewrite = |keywords: &[String]| -> Vec<String> {
            let mention = intent.stock_mention.as_deref().unwrap_or("");
            let mut out: Vec<String> = keywords
                .iter()
                .map(|k| {
                    if !mention.is_empty() && k == mention {
                        canonical_name.to_string()
                    } else {
                        k.clone()
                    }
                })
                .collect();
            out.push(entity_code.to_string());
            out
        };

        Self {
            search_keywords: rewrite(&intent.raw_search_keywords),
            rag_keywords: rewrite(&intent.raw_rag_keywords),
            domain_keywords: rewrite(&intent.raw_domain_keywords),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_mention_falls_back_to_raw_keywords() {
        let intent = Intent {
            raw_search_keywords: vec!["moutai".into()],
            ..Intent::conservative_default("test")
        };
        let resolved = ResolvedKeywords::from_raw(&intent);
        assert_eq!(resolved.search_keywords, vec!["moutai".to_string()]);
    }

    #[test]
    fn resolve_appends_entity_code_and_rewrites_mention() {
        let intent = Intent {
            stock_mention: Some("moutai".into()),
            raw_search_keywords: vec!["moutai".into(), "liquor".into()],
            ..Intent::conservative_default("test")
        };
        let resolved = ResolvedKeywords::resolve(&intent, "Kweichow Moutai", "600519");
        assert_eq!(
            resolved.search_keywords,
            vec![
                "Kweichow Moutai".to_string(),
                "liquor".to_string(),
                "600519".to_string()
            ]
        );
    }
}
