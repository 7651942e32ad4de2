use std::sync::Arc;

use axum::{routing::get, Router};

use finscope_agent::anthropic::AnthropicProvider;
use finscope_agent::provider::LlmProvider;
use finscope_agent::prompt::PromptBuilder;
use finscope_agent::runtime::AgentRuntime;
use finscope_agent::{ChatResponder, IntentClassifier, NewsSummarizer, ReportNarrator};
use finscope_analysis::{ParameterRecommender, SentimentScorer};
use finscope_core::{FinscopeConfig, SimpleTradingCalendar, TradingCalendar};
use finscope_data::{AnomalyZoneCache, HttpPriceCollector, NewsCollector, PriceCollector, ResearchCollector};
use finscope_entity::{EntityResolver, SemanticIndexResolver};
use finscope_fabric::EventFabric;
use finscope_forecast::ForecastRunner;
use finscope_orchestrator::OrchestratorContext;
use finscope_state::StateStore;

/// Central shared state — passed as Arc<AppState> to all Axum handlers,
/// and to the Orchestrator as its `OrchestratorContext`.
pub struct AppState {
    pub config: FinscopeConfig,
    fabric: EventFabric,
    state: StateStore,
    entity_resolver: Box<dyn EntityResolver>,
    price_collector: Box<dyn PriceCollector>,
    news_collector: NewsCollector,
    research_collector: ResearchCollector,
    anomaly_cache: AnomalyZoneCache,
    forecast_runner: ForecastRunner,
    calendar: Box<dyn TradingCalendar>,
    intent_classifier: IntentClassifier,
    sentiment_scorer: SentimentScorer,
    parameter_recommender: ParameterRecommender,
    report_narrator: ReportNarrator,
    chat_responder: ChatResponder,
    news_summarizer: NewsSummarizer,
}

impl AppState {
    pub async fn new(config: FinscopeConfig) -> anyhow::Result<Self> {
        let conn = finscope_state::connect(&config.redis.url()).await?;
        let pubsub_client = redis::Client::open(config.redis.url())?;

        let provider: Box<dyn LlmProvider> = Box::new(AnthropicProvider::new(
            config.llm.api_key.clone(),
            Some(config.llm.base_url.clone()),
        ));
        let prompt = PromptBuilder::load(None, None);
        let runtime = Arc::new(AgentRuntime::new(provider, prompt, config.llm.model.clone()));

        let intent_classifier = IntentClassifier::new(runtime.clone(), config.llm.model.clone());
        let sentiment_scorer = SentimentScorer::new(runtime.clone(), config.llm.model.clone());
        let parameter_recommender = ParameterRecommender::new(runtime.clone(), config.llm.model.clone());
        let report_narrator = ReportNarrator::new(runtime.clone(), config.llm.model.clone());
        let chat_responder = ChatResponder::new(runtime.clone(), config.llm.model.clone());
        let news_summarizer = NewsSummarizer::new(runtime.clone(), config.llm.model.clone());

        Ok(Self {
            fabric: EventFabric::new(conn.clone(), pubsub_client),
            state: StateStore::new(conn.clone()),
            entity_resolver: Box::new(SemanticIndexResolver::new(config.entity.base_url.clone())),
            price_collector: Box::new(HttpPriceCollector::new(config.price.base_url.clone())),
            news_collector: NewsCollector::new(
                config.news.market_news_url.clone(),
                config.news.search_news_url.clone(),
            ),
            research_collector: ResearchCollector::new(config.rag.service_url.clone()),
            anomaly_cache: AnomalyZoneCache::new(conn.clone()),
            forecast_runner: ForecastRunner::new(&config.forecast.model_service_url),
            calendar: Box::new(SimpleTradingCalendar),
            intent_classifier,
            sentiment_scorer,
            parameter_recommender,
            report_narrator,
            chat_responder,
            news_summarizer,
            config,
        })
    }
}

impl OrchestratorContext for AppState {
    fn fabric(&self) -> &EventFabric {
        &self.fabric
    }

    fn state(&self) -> &StateStore {
        &self.state
    }

    fn entity_resolver(&self) -> &dyn EntityResolver {
        self.entity_resolver.as_ref()
    }

    fn price_collector(&self) -> &dyn PriceCollector {
        self.price_collector.as_ref()
    }

    fn news_collector(&self) -> &NewsCollector {
        &self.news_collector
    }

    fn research_collector(&self) -> &ResearchCollector {
        &self.research_collector
    }

    fn anomaly_cache(&self) -> &AnomalyZoneCache {
        &self.anomaly_cache
    }

    fn forecast_runner(&self) -> &ForecastRunner {
        &self.forecast_runner
    }

    fn calendar(&self) -> &dyn TradingCalendar {
        self.calendar.as_ref()
    }

    fn intent_classifier(&self) -> &IntentClassifier {
        &self.intent_classifier
    }

    fn sentiment_scorer(&self) -> &SentimentScorer {
        &self.sentiment_scorer
    }

    fn parameter_recommender(&self) -> &ParameterRecommender {
        &self.parameter_recommender
    }

    fn report_narrator(&self) -> &ReportNarrator {
        &self.report_narrator
    }

    fn chat_responder(&self) -> &ChatResponder {
        &self.chat_responder
    }

    fn news_summarizer(&self) -> &NewsSummarizer {
        &self.news_summarizer
    }

    fn default_forecast_model(&self) -> &str {
        &self.config.forecast.default_model
    }

    fn baseline_penalty_enabled(&self) -> bool {
        self.config.forecast.baseline_penalty
    }
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(crate::http::health::health_handler))
        .route(
            "/sessions",
            get(crate::http::sessions::list_sessions).post(crate::http::sessions::create_session),
        )
        .route(
            "/sessions/{id}",
            get(crate::http::sessions::get_session)
                .patch(crate::http::sessions::update_session)
                .delete(crate::http::sessions::delete_session),
        )
        .route("/analysis/start", get(crate::http::analysis::start_analysis))
        .route("/analysis/stream", get(crate::http::analysis::stream_analysis))
        .route("/analysis/status", get(crate::http::analysis::analysis_status))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
