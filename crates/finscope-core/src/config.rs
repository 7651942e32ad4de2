use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 8089;
pub const DEFAULT_BIND: &str = "0.0.0.0";
pub const DEFAULT_FORECAST_MODEL: &str = "prophet";
pub const SESSION_TTL_SECS: u64 = 24 * 60 * 60;
pub const HEARTBEAT_INTERVAL_SECS: u64 = 15;

/// Top-level config (finscope.toml + FINSCOPE_* env overrides, spec.md §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinscopeConfig {
    #[serde(default = "GatewayConfig::default")]
    pub gateway: GatewayConfig,
    pub llm: LlmConfig,
    pub redis: RedisConfig,
    #[serde(default)]
    pub entity: EntityConfig,
    #[serde(default)]
    pub price: PriceConfig,
    #[serde(default)]
    pub news: NewsConfig,
    #[serde(default)]
    pub rag: RagConfig,
    #[serde(default)]
    pub forecast: ForecastConfig,
}

/// Price-series provider configuration (spec.md §4.5 "Price series").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceConfig {
    #[serde(default = "default_price_base_url")]
    pub base_url: String,
}

impl Default for PriceConfig {
    fn default() -> Self {
        Self {
            base_url: default_price_base_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: DEFAULT_BIND.to_string(),
        }
    }
}

/// Credentials and endpoint for the LLM used by the intent classifier,
/// report narration, sentiment scorer and parameter recommender
/// (spec.md §4.3, §4.8).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub api_key: String,
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
}

/// Redis connection settings backing the State Store and Event Fabric
/// (spec.md §4.1, §4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    #[serde(default = "default_redis_host")]
    pub host: String,
    #[serde(default = "default_redis_port")]
    pub port: u16,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub db: u8,
}

impl RedisConfig {
    pub fn url(&self) -> String {
        match &self.password {
            Some(pw) if !pw.is_empty() => {
                format!("redis://:{}@{}:{}/{}", pw, self.host, self.port, self.db)
            }
            _ => format!("redis://{}:{}/{}", self.host, self.port, self.db),
        }
    }
}

/// Semantic entity-index client configuration (spec.md §4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityConfig {
    #[serde(default = "default_entity_base_url")]
    pub base_url: String,
}

impl Default for EntityConfig {
    fn default() -> Self {
        Self {
            base_url: default_entity_base_url(),
        }
    }
}

/// News search provider configuration (spec.md §4.5 NewsCollector) —
/// two independently optional source URLs, fetched in parallel.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NewsConfig {
    #[serde(default)]
    pub market_news_url: Option<String>,
    #[serde(default)]
    pub search_news_url: Option<String>,
}

/// Retrieval-augmented-generation sidecar configuration (spec.md §4.5
/// ResearchCollector).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RagConfig {
    #[serde(default)]
    pub service_url: Option<String>,
}

/// Forecast Runner and Model Selector tuning (spec.md §4.7, §9 Open
/// Questions — baseline-penalty switch).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastConfig {
    #[serde(default = "default_forecast_model")]
    pub default_model: String,
    /// When true, the selector only promotes a candidate over the running
    /// production model if it beats the seasonal-naive baseline (spec.md
    /// §4.7 Model Selector, "is_better_than_baseline").
    #[serde(default = "bool_true")]
    pub baseline_penalty: bool,
    /// Base URL of the HTTP service backing the four candidate forecast
    /// backends (spec.md §4.6, `ForecastRunner::new`).
    #[serde(default = "default_model_service_url")]
    pub model_service_url: String,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            default_model: default_forecast_model(),
            baseline_penalty: true,
            model_service_url: default_model_service_url(),
        }
    }
}

fn bool_true() -> bool {
    true
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_forecast_model() -> String {
    DEFAULT_FORECAST_MODEL.to_string()
}
fn default_llm_base_url() -> String {
    "https://api.anthropic.com".to_string()
}
fn default_llm_model() -> String {
    "claude-sonnet-4-6".to_string()
}
fn default_redis_host() -> String {
    "127.0.0.1".to_string()
}
fn default_redis_port() -> u16 {
    6379
}
fn default_entity_base_url() -> String {
    "http://localhost:8090".to_string()
}
fn default_price_base_url() -> String {
    "http://localhost:8091".to_string()
}
fn default_model_service_url() -> String {
    "http://localhost:8092".to_string()
}

impl FinscopeConfig {
    /// Load config from a TOML file with FINSCOPE_* env var overrides.
    ///
    /// Checks, in order: an explicit path argument, then
    /// `./finscope.toml`.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(|| "finscope.toml".to_string());

        Figment::new()
            .merge(Toml::file(&path))
            .merge(Env::prefixed("FINSCOPE_").split("__"))
            .extract()
            .map_err(|e| crate::error::FinscopeError::Config(e.to_string()))
    }
}
