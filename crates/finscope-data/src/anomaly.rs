use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};

const ZONE_TTL_SECS: i64 = 12 * 60 * 60;

fn zone_key(entity_code: &str) -> String {
    format!("stock_zones:{}", entity_code)
}

/// A contiguous date range flagged as anomalous by the clustering
/// collaborator (spec.md §4.9 F1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyZone {
    pub start: chrono::NaiveDate,
    pub end: chrono::NaiveDate,
    pub label: String,
}

/// Caches anomaly-zone clustering results in Redis, keyed by entity
/// code alone (spec.md §6 persisted state, `stock_zones:{entity_code}`,
/// TTL 12h).
///
/// Spec.md §9 Open Question (b) flags, rather than silently resolves,
/// that zones depend on the history window used to compute them while
/// this key does not encode that window: two concurrent analyses over
/// different windows for the same entity can read back each other's
/// cached zones. This cache implements the key exactly as specified;
/// callers that care about window sensitivity must account for it
/// themselves.
pub struct AnomalyZoneCache {
    conn: ConnectionManager,
}

impl AnomalyZoneCache {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    pub async fn get(&self, entity_code: &str) -> redis::RedisResult<Option<Vec<AnomalyZone>>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(zone_key(entity_code)).await?;
        Ok(raw.and_then(|s| serde_json::from_str(&s).ok()))
    }

    pub async fn put(&self, entity_code: &str, zones: &[AnomalyZone]) -> redis::RedisResult<()> {
        let mut conn = self.conn.clone();
        let raw = serde_json::to_string(zones).unwrap_or_else(|_| "[]".to_string());
        conn.set_ex::<_, _, ()>(zone_key(entity_code), raw, ZONE_TTL_SECS as u64)
            .await
    }
}
