use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info};

use nm_core::{
    Agent, AnalysisMethod, Article, CycleReporter, Decision, Error, InsertOutcome, NewAnalysis,
    NewArticle, RawArticle, Result, SearchProvider, Storage,
};

use crate::dedup::Deduplicator;
use crate::dispatch::ActionDispatcher;
use crate::engine::AnalysisEngine;
use crate::filter::ArticleFilter;

/// Fixed backoff after a failed cycle, used instead of the agent's interval.
const ERROR_BACKOFF: Duration = Duration::from_secs(60);

const PAGE_SIZE: usize = 20;

/// Everything a monitoring loop needs, shared across all agents.
pub struct MonitorContext {
    pub storage: Arc<dyn Storage>,
    pub search: Arc<dyn SearchProvider>,
    pub engine: Arc<AnalysisEngine>,
    pub dispatcher: Arc<ActionDispatcher>,
    pub filter: ArticleFilter,
    pub reporter: Arc<dyn CycleReporter>,
}

#[derive(Debug, Default)]
pub(crate) struct CycleStats {
    pub fetched: usize,
    pub candidates: usize,
    pub actioned: usize,
}

/// One agent's periodic loop: re-read config, run a cycle, sleep, repeat.
/// A failed cycle backs off and continues; only a stop signal or the agent
/// disappearing from storage ends the loop.
pub(crate) async fn run_loop(
    agent_id: i64,
    ctx: Arc<MonitorContext>,
    mut stop: watch::Receiver<bool>,
) {
    loop {
        if *stop.borrow() {
            break;
        }

        // Re-fetch so interval/keyword/threshold edits take effect next cycle.
        let agent = match ctx.storage.get_agent(agent_id).await {
            Ok(Some(agent)) => agent,
            Ok(None) => {
                info!(agent_id, "agent no longer exists, stopping loop");
                break;
            }
            Err(e) => {
                ctx.reporter.cycle_failed(agent_id, "<unknown>", &e);
                if sleep_or_stop(ERROR_BACKOFF, &mut stop).await {
                    break;
                }
                continue;
            }
        };

        let delay = match run_cycle(&agent, &ctx).await {
            Ok(stats) => {
                debug!(
                    agent = %agent.name,
                    fetched = stats.fetched,
                    candidates = stats.candidates,
                    actioned = stats.actioned,
                    "cycle complete"
                );
                agent.check_interval()
            }
            Err(Error::NotFound(_)) => {
                info!(agent = %agent.name, "agent removed mid-cycle, stopping loop");
                break;
            }
            Err(e) => {
                ctx.reporter.cycle_failed(agent.id, &agent.name, &e);
                ERROR_BACKOFF
            }
        };

        if sleep_or_stop(delay, &mut stop).await {
            break;
        }
    }
}

/// Sleep for `delay`, waking early on a stop signal. Returns true when the
/// loop should stop.
async fn sleep_or_stop(delay: Duration, stop: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(delay) => *stop.borrow(),
        changed = stop.changed() => changed.is_err() || *stop.borrow(),
    }
}

/// One fetch → filter → dedup → analyze → act pass.
pub(crate) async fn run_cycle(agent: &Agent, ctx: &MonitorContext) -> Result<CycleStats> {
    info!(agent = %agent.name, "🔍 executing monitoring cycle");

    if agent.keywords.is_empty() {
        debug!(agent = %agent.name, "no keywords configured, skipping cycle");
        ctx.storage.touch_last_checked(agent.id, Utc::now()).await?;
        return Ok(CycleStats::default());
    }

    let raw = ctx
        .search
        .fetch(&agent.query(), agent.news_source.as_deref(), PAGE_SIZE)
        .await?;
    let fetched = raw.len();

    let candidates = ctx.filter.apply(raw);
    info!(
        agent = %agent.name,
        fetched,
        recent = candidates.len(),
        "📰 candidates after filtering"
    );

    let dedup = Deduplicator::new(ctx.storage.clone());
    let mut actioned = 0;

    for article in &candidates {
        let Some(url) = article.url.as_deref() else {
            continue;
        };
        if dedup.seen(url).await? {
            continue;
        }

        let decision = ctx.engine.decide(agent, article).await;
        if !decision.act {
            continue;
        }

        let Some(record) = persist_article(agent, article, &decision, ctx).await? else {
            // Lost the insert race to another loop; already processed.
            continue;
        };

        if decision.method == AnalysisMethod::Ai || ctx.engine.record_fallback() {
            persist_analysis(agent, &record, &decision, ctx).await;
        }

        info!(
            agent = %agent.name,
            action = decision.suggested_action.as_str(),
            confidence = decision.confidence,
            "⚡ executing action for: {}",
            record.title
        );
        ctx.dispatcher.dispatch(agent, &record, &decision).await;
        actioned += 1;
    }

    ctx.storage.touch_last_checked(agent.id, Utc::now()).await?;

    Ok(CycleStats {
        fetched,
        candidates: candidates.len(),
        actioned,
    })
}

async fn persist_article(
    agent: &Agent,
    article: &RawArticle,
    decision: &Decision,
    ctx: &MonitorContext,
) -> Result<Option<Article>> {
    let url = article
        .url
        .clone()
        .ok_or_else(|| Error::InvalidResponse("candidate without url".to_string()))?;

    let new_article = NewArticle {
        agent_id: agent.id,
        url,
        title: article.title.clone().unwrap_or_default(),
        description: article.description.clone(),
        content: article.content.clone(),
        source: article.source.clone(),
        author: article.author.clone(),
        published_at: parse_published(article.published_at.as_deref()),
        keywords_matched: decision.matched_keywords.clone(),
        relevance_score: decision.relevance_score(),
        analysis_method: decision.method,
    };

    match ctx.storage.insert_article(new_article).await? {
        InsertOutcome::Inserted(record) => Ok(Some(record)),
        InsertOutcome::Duplicate => Ok(None),
    }
}

async fn persist_analysis(
    agent: &Agent,
    article: &Article,
    decision: &Decision,
    ctx: &MonitorContext,
) {
    let analysis = NewAnalysis {
        agent_id: agent.id,
        article_url: article.url.clone(),
        summary: decision.reasoning.clone(),
        sentiment: decision.sentiment.clone(),
        confidence: decision.confidence,
        key_points: decision.key_points.clone(),
        suggested_action: decision.suggested_action,
        model_used: ctx.engine.model_used(decision.method),
    };
    if let Err(e) = ctx.storage.insert_analysis(analysis).await {
        tracing::warn!(agent = %agent.name, "failed to persist analysis: {}", e);
    }
}

fn parse_published(raw: Option<&str>) -> Option<DateTime<Utc>> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}
