use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::{json, Value};

use finscope_agent::provider::{Message as AgentMessage, Role as AgentRole};
use finscope_analysis::{extract_features, Features, SentimentResult};
use finscope_data::AnomalyZone;
use finscope_forecast::{
    choose_production_model, ModelSelector, CANDIDATE_BACKENDS, DEFAULT_MIN_TRAIN_SIZE, DEFAULT_N_WINDOWS,
};
use finscope_protocol::{Intent, Message, NewsItem, Role, TimePoint};

use crate::context::OrchestratorContext;
use crate::error as error_codes;
use crate::orchestrator::{conclude, fail, join_chunks, mark_step, publish, spawn_chunk_forwarder};
use crate::steps;

struct ChosenModel {
    model_name: String,
    horizon: usize,
}

/// Runs F1 Collect → F5 Narrate in sequence (spec.md §4.9 "Forecast
/// pipeline"). Every early exit has already published its own terminal
/// event by the time it returns.
pub(crate) async fn run_forecast_pipeline<C: OrchestratorContext + 'static>(
    ctx: &Arc<C>,
    message: &mut Message,
    intent: &Intent,
    history: &[AgentMessage],
) {
    let Some(price) = f1_collect(ctx, message, intent).await else {
        return;
    };

    let (features, sentiment) = f2_analyze(ctx, message).await;

    let chosen = f3_select(ctx, message, intent, &price).await;

    let Some(forecast) = f4_predict(ctx, message, &price, &chosen, &sentiment, &features).await else {
        return;
    };

    f5_narrate(ctx, message, history, &features, &forecast, &sentiment).await;
}

async fn f1_collect<C: OrchestratorContext + 'static>(
    ctx: &Arc<C>,
    message: &mut Message,
    intent: &Intent,
) -> Option<Vec<TimePoint>> {
    mark_step(ctx, message, steps::STEP_DATA_FETCH, finscope_protocol::StepStatus::Running).await;

    let Some(entity_code) = message
        .entity
        .as_ref()
        .and_then(|m| m.entity.as_ref())
        .map(|e| e.code.clone())
    else {
        conclude(
            ctx,
            message,
            "A forecast needs a specific stock to analyze; please mention one.".to_string(),
        )
        .await;
        return None;
    };

    let resolved = message.resolved_keywords.clone().unwrap_or_default();
    let today = Utc::now().date_naive();
    let start = today - Duration::days(intent.history_days as i64);

    let price_fut = ctx.price_collector().fetch(&entity_code, start, today);
    let news_fut = ctx.news_collector().fetch_market(&resolved.domain_keywords);
    let research_fut = async {
        if intent.enable_rag {
            ctx.research_collector().fetch(&resolved.rag_keywords).await
        } else {
            None
        }
    };

    let (price_result, news_items, research) = tokio::join!(price_fut, news_fut, research_fut);

    let price = match price_result {
        Ok(p) => p,
        Err(e) => {
            conclude(ctx, message, e.friendly_markdown()).await;
            return None;
        }
    };

    message.artifacts.time_series_original = Some(price.clone());
    if let Err(e) = ctx.state().save_message(message).await {
        tracing::warn!(error = %e, "orchestrator: failed to persist price series");
    }
    publish(
        ctx,
        message.session_id.clone(),
        message.id.clone(),
        finscope_protocol::EventType::Data,
        json!({"data_type": "time_series_original", "data": price}),
    )
    .await;

    let summarized_news = summarize_news(ctx, news_items).await;
    message.artifacts.news = summarized_news.clone();
    if let Err(e) = ctx.state().save_message(message).await {
        tracing::warn!(error = %e, "orchestrator: failed to persist summarized news");
    }
    publish(
        ctx,
        message.session_id.clone(),
        message.id.clone(),
        finscope_protocol::EventType::Data,
        json!({"data_type": "news", "data": summarized_news}),
    )
    .await;

    if let Some(excerpts) = research {
        message.artifacts.research_excerpts = excerpts;
        if let Err(e) = ctx.state().save_message(message).await {
            tracing::warn!(error = %e, "orchestrator: failed to persist research excerpts");
        }
    }

    emit_anomaly_zones(ctx, message, &entity_code).await;

    mark_step(ctx, message, steps::STEP_DATA_FETCH, finscope_protocol::StepStatus::Completed).await;
    Some(price)
}

/// The clustering routine itself is an out-of-scope collaborator
/// (spec.md §1 Non-goals); this only surfaces whatever another process
/// has already written into the cache for this entity.
async fn emit_anomaly_zones<C: OrchestratorContext>(ctx: &Arc<C>, message: &Message, entity_code: &str) {
    let zones: Option<Vec<AnomalyZone>> = match ctx.anomaly_cache().get(entity_code).await {
        Ok(z) => z,
        Err(e) => {
            tracing::warn!(error = %e, "orchestrator: anomaly zone cache read failed, skipping");
            return;
        }
    };
    if let Some(zones) = zones {
        if !zones.is_empty() {
            publish(
                ctx,
                message.session_id.clone(),
                message.id.clone(),
                finscope_protocol::EventType::Data,
                json!({"data_type": "anomaly_zones", "data": zones}),
            )
            .await;
        }
    }
}

async fn summarize_news<C: OrchestratorContext>(ctx: &Arc<C>, news_items: Vec<NewsItem>) -> Vec<NewsItem> {
    let pairs: Vec<(String, String)> = news_items
        .iter()
        .map(|n| (n.title.clone(), n.snippet.clone()))
        .collect();
    let summaries = ctx.news_summarizer().summarize(&pairs).await;

    news_items
        .into_iter()
        .enumerate()
        .map(|(i, mut item)| {
            if let Some(summary) = summaries.get(i) {
                if !summary.summarized_title.is_empty() {
                    item.title = summary.summarized_title.clone();
                }
                if !summary.summarized_content.is_empty() {
                    item.snippet = summary.summarized_content.clone();
                }
            }
            item
        })
        .collect()
}

async fn f2_analyze<C: OrchestratorContext + 'static>(
    ctx: &Arc<C>,
    message: &mut Message,
) -> (Features, SentimentResult) {
    mark_step(ctx, message, steps::STEP_ANALYSIS, finscope_protocol::StepStatus::Running).await;

    let price = message.artifacts.time_series_original.clone().unwrap_or_default();
    let features = extract_features(&price);

    let (tx, handle) = spawn_chunk_forwarder(
        ctx.clone(),
        message.session_id.clone(),
        message.id.clone(),
        finscope_protocol::EventType::EmotionChunk,
        |chunk, _accumulated| json!({"content": chunk}),
    );
    let sentiment = ctx.sentiment_scorer().score(&message.artifacts.news, tx).await;
    let _ = join_chunks(handle).await;

    message.artifacts.sentiment_score = Some(sentiment.score);
    message.artifacts.sentiment_narrative = Some(sentiment.narrative.clone());
    if let Err(e) = ctx.state().save_message(message).await {
        tracing::warn!(error = %e, "orchestrator: failed to persist sentiment");
    }
    publish(
        ctx,
        message.session_id.clone(),
        message.id.clone(),
        finscope_protocol::EventType::Data,
        json!({"data_type": "emotion", "data": {"score": sentiment.score, "narrative": sentiment.narrative}}),
    )
    .await;

    mark_step(ctx, message, steps::STEP_ANALYSIS, finscope_protocol::StepStatus::Completed).await;
    (features, sentiment)
}

/// F3 Select and F4 Predict together back the single "Model Prediction"
/// UI step — the six-step schedule has no separate slot for model
/// selection (spec.md §9 "Dynamic step list").
async fn f3_select<C: OrchestratorContext>(
    ctx: &Arc<C>,
    message: &mut Message,
    intent: &Intent,
    price: &[TimePoint],
) -> ChosenModel {
    mark_step(ctx, message, steps::STEP_MODEL_PREDICTION, finscope_protocol::StepStatus::Running).await;

    let today = Utc::now().date_naive();
    let last_date = price.last().map(|p| p.date).unwrap_or(today);
    let target = std::cmp::max(last_date + Duration::days(90), today);
    let horizon = ctx.calendar().trading_days_between(last_date, target).max(1);

    let candidates: Vec<String> = CANDIDATE_BACKENDS.iter().map(|s| s.to_string()).collect();
    let selector = ModelSelector::new(ctx.forecast_runner());
    let user_model = intent.forecast_model.clone();

    match selector
        .select(price, &candidates, horizon, ctx.calendar(), DEFAULT_N_WINDOWS, DEFAULT_MIN_TRAIN_SIZE)
        .await
    {
        Ok(result) => {
            let choice = choose_production_model(&result, user_model.as_deref(), ctx.baseline_penalty_enabled());
            publish(
                ctx,
                message.session_id.clone(),
                message.id.clone(),
                finscope_protocol::EventType::ModelSelection,
                json!({
                    "selected_model": choice.model_name,
                    "best_model": result.best_model,
                    "baseline": result.baseline,
                    "model_comparison": result.model_comparison,
                    "is_better_than_baseline": result.is_better_than_baseline,
                    "user_specified_model": user_model,
                    "model_selection_reason": choice.reason,
                }),
            )
            .await;
            message.artifacts.selected_model = Some(choice.model_name.clone());
            message.artifacts.baseline_comparison = serde_json::to_value(&result).ok();
            if let Err(e) = ctx.state().save_message(message).await {
                tracing::warn!(error = %e, "orchestrator: failed to persist model selection");
            }
            ChosenModel { model_name: choice.model_name, horizon }
        }
        Err(e) => {
            let fallback = user_model
                .clone()
                .unwrap_or_else(|| ctx.default_forecast_model().to_string());
            let reason = format!("model selection unavailable ({e}); falling back to {fallback}");
            publish(
                ctx,
                message.session_id.clone(),
                message.id.clone(),
                finscope_protocol::EventType::ModelSelection,
                json!({
                    "selected_model": fallback,
                    "best_model": Value::Null,
                    "baseline": finscope_forecast::BASELINE_BACKEND,
                    "model_comparison": Vec::<Value>::new(),
                    "is_better_than_baseline": false,
                    "user_specified_model": user_model,
                    "model_selection_reason": reason,
                }),
            )
            .await;
            message.artifacts.selected_model = Some(fallback.clone());
            if let Err(e) = ctx.state().save_message(message).await {
                tracing::warn!(error = %e, "orchestrator: failed to persist fallback model selection");
            }
            ChosenModel { model_name: fallback, horizon }
        }
    }
}

async fn f4_predict<C: OrchestratorContext>(
    ctx: &Arc<C>,
    message: &mut Message,
    price: &[TimePoint],
    chosen: &ChosenModel,
    sentiment: &SentimentResult,
    features: &Features,
) -> Option<finscope_forecast::ForecastOutput> {
    let params = ctx.parameter_recommender().recommend(sentiment, features).await;
    let params_value = serde_json::to_value(&params).ok();

    match ctx
        .forecast_runner()
        .run(&chosen.model_name, price, chosen.horizon, ctx.calendar(), params_value.as_ref())
        .await
    {
        Ok(forecast) => {
            let mut full = price.to_vec();
            full.extend(forecast.points.iter().cloned());
            let prediction_start_day = forecast.points.first().map(|p| p.date);

            message.artifacts.time_series_full = Some(full.clone());
            message.artifacts.prediction_start_day = prediction_start_day;
            if let Err(e) = ctx.state().save_message(message).await {
                tracing::warn!(error = %e, "orchestrator: failed to persist full series");
            }
            publish(
                ctx,
                message.session_id.clone(),
                message.id.clone(),
                finscope_protocol::EventType::Data,
                json!({
                    "data_type": "time_series_full",
                    "data": full,
                    "prediction_start_day": prediction_start_day,
                }),
            )
            .await;

            mark_step(ctx, message, steps::STEP_MODEL_PREDICTION, finscope_protocol::StepStatus::Completed).await;
            Some(forecast)
        }
        Err(e) => {
            fail(
                ctx,
                message,
                error_codes::FORECAST_BACKEND_ERROR,
                format!("forecast failed: {e}"),
                true,
                "try again, or ask for a different model",
            )
            .await;
            None
        }
    }
}

async fn f5_narrate<C: OrchestratorContext + 'static>(
    ctx: &Arc<C>,
    message: &mut Message,
    history: &[AgentMessage],
    features: &Features,
    forecast: &finscope_forecast::ForecastOutput,
    sentiment: &SentimentResult,
) {
    mark_step(ctx, message, steps::STEP_REPORT_GENERATION, finscope_protocol::StepStatus::Running).await;

    let data_summary = format!(
        "Trend: {:?}, volatility: {:?}, mean {:.2}, latest {:.2}, range [{:.2}, {:.2}], \
         {} data points ({:?} to {:?}).\n\
         Forecast model: {}, {} predicted points, MAE {:?}.\n\
         Sentiment score {:.2}: {}",
        features.trend,
        features.volatility,
        features.mean,
        features.latest,
        features.min,
        features.max,
        features.point_count,
        features.start_date,
        features.end_date,
        message.artifacts.selected_model.clone().unwrap_or_default(),
        forecast.points.len(),
        forecast.mae,
        sentiment.score,
        sentiment.narrative,
    );

    let (tx, handle) = spawn_chunk_forwarder(
        ctx.clone(),
        message.session_id.clone(),
        message.id.clone(),
        finscope_protocol::EventType::ReportChunk,
        |chunk, _accumulated| json!({"content": chunk}),
    );
    let report = ctx
        .report_narrator()
        .narrate(&message.user_query, &data_summary, history, tx)
        .await;
    let _ = join_chunks(handle).await;

    message.artifacts.conclusion = Some(report.clone());
    message.status = finscope_protocol::MessageStatus::Completed;
    message.streaming_status = finscope_protocol::StreamingStatus::Completed;
    message.updated_at = Utc::now();
    if let Err(e) = ctx.state().save_message(message).await {
        tracing::warn!(error = %e, "orchestrator: failed to persist final report");
    }

    mark_step(ctx, message, steps::STEP_REPORT_GENERATION, finscope_protocol::StepStatus::Completed).await;

    if let Ok(mut session) = ctx.state().require_session(&message.session_id).await {
        session.push_turn(Role::Assistant, report);
        session.current_message_id = Some(message.id.clone());
        session.updated_at = Utc::now();
        if let Err(e) = ctx.state().save_session(&session).await {
            tracing::warn!(error = %e, "orchestrator: failed to persist session transcript");
        }
    }

    publish(
        ctx,
        message.session_id.clone(),
        message.id.clone(),
        finscope_protocol::EventType::AnalysisComplete,
        json!({}),
    )
    .await;
}
