use finscope_agent::{ChatResponder, IntentClassifier, NewsSummarizer, ReportNarrator};
use finscope_analysis::{ParameterRecommender, SentimentScorer};
use finscope_core::TradingCalendar;
use finscope_data::{AnomalyZoneCache, NewsCollector, PriceCollector, ResearchCollector};
use finscope_entity::EntityResolver;
use finscope_fabric::EventFabric;
use finscope_forecast::ForecastRunner;
use finscope_state::StateStore;

/// The collaborators a Message Orchestrator needs at every stage, named
/// the way `finscope_agent::pipeline::context::MessageContext` names
/// its own accessors — one trait, implemented once by the host's
/// application state, rather than threading a dozen constructor
/// arguments through every stage function.
pub trait OrchestratorContext: Send + Sync {
    fn fabric(&self) -> &EventFabric;
    fn state(&self) -> &StateStore;
    fn entity_resolver(&self) -> &dyn EntityResolver;
    fn price_collector(&self) -> &dyn PriceCollector;
    fn news_collector(&self) -> &NewsCollector;
    fn research_collector(&self) -> &ResearchCollector;
    fn anomaly_cache(&self) -> &AnomalyZoneCache;
    fn forecast_runner(&self) -> &ForecastRunner;
    fn calendar(&self) -> &dyn TradingCalendar;

    fn intent_classifier(&self) -> &IntentClassifier;
    fn sentiment_scorer(&self) -> &SentimentScorer;
    fn parameter_recommender(&self) -> &ParameterRecommender;
    fn report_narrator(&self) -> &ReportNarrator;
    fn chat_responder(&self) -> &ChatResponder;
    fn news_summarizer(&self) -> &NewsSummarizer;

    /// Forecast backend used when the Model Selector itself fails and
    /// there is no user-specified override (spec.md §7 "Model-selection
    /// failure").
    fn default_forecast_model(&self) -> &str;

    /// Spec.md §9 Open Question (a): whether an auto-selected or
    /// user-specified model still yields to the baseline when it
    /// doesn't beat it.
    fn baseline_penalty_enabled(&self) -> bool;
}
