use serde::{Deserialize, Serialize};

pub const HIGH_CONFIDENCE_THRESHOLD: f64 = 0.85;
pub const LOW_CONFIDENCE_THRESHOLD: f64 = 0.5;

/// A resolved financial instrument (spec.md GLOSSARY, §4.4).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum Market {
    Shanghai,
    Shenzhen,
    Unknown,
}

/// Market inference from the code prefix — the only place this rule
/// lives (spec.md §4.4).
pub fn infer_market(code: &str) -> Market {
    match code.chars().next() {
        Some('6') => Market::Shanghai,
        Some('0') | Some('3') => Market::Shenzhen,
        _ => Market::Unknown,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub code: String,
    pub canonical_name: String,
    pub market: Market,
}

/// Outcome of an Entity Resolver query (spec.md §3 EntityMatch).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityMatch {
    pub success: bool,
    #[serde(default)]
    pub entity: Option<Entity>,
    pub confidence: f64,
    #[serde(default)]
    pub suggestions: Vec<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl EntityMatch {
    pub fn success(entity: Entity, confidence: f64) -> Self {
        Self {
            success: true,
            entity: Some(entity),
            confidence,
            suggestions: Vec::new(),
            error: None,
        }
    }

    pub fn ambiguous(confidence: f64, suggestions: Vec<String>) -> Self {
        Self {
            success: false,
            entity: None,
            confidence,
            suggestions,
            error: Some("multiple possible matches, please clarify".to_string()),
        }
    }

    pub fn unknown(confidence: f64) -> Self {
        Self {
            success: false,
            entity: None,
            confidence,
            suggestions: Vec::new(),
            error: Some("no such instrument".to_string()),
        }
    }

    pub fn delisted(name: &str) -> Self {
        Self {
            success: false,
            entity: None,
            confidence: 1.0,
            suggestions: Vec::new(),
            error: Some(format!("{} has been delisted", name)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infers_shanghai_from_prefix_six() {
        assert_eq!(infer_market("600519"), Market::Shanghai);
    }

    #[test]
    fn infers_shenzhen_from_prefix_zero_or_three() {
        assert_eq!(infer_market("000001"), Market::Shenzhen);
        assert_eq!(infer_market("300750"), Market::Shenzhen);
    }

    #[test]
    fn unrecognized_prefix_is_unknown() {
        assert_eq!(infer_market("900999"), Market::Unknown);
    }
}
