use async_trait::async_trait;
use tracing::{error, info};

use crate::types::{Agent, Article, Decision};
use crate::{Error, Result};

/// Urgent-notification sink. Fire-and-log: callers log failures and move on.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_urgent(
        &self,
        agent: &Agent,
        article: &Article,
        decision: &Decision,
    ) -> Result<()>;
}

/// Trend-tracking sink for developing stories.
#[async_trait]
pub trait TrendTracker: Send + Sync {
    async fn track(&self, agent: &Agent, article: &Article, decision: &Decision) -> Result<()>;
}

/// Structured reporting for cycle failures. The monitoring loop never
/// crashes on a failed cycle; it reports here and backs off.
pub trait CycleReporter: Send + Sync {
    fn cycle_failed(&self, agent_id: i64, agent_name: &str, error: &Error);
}

pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify_urgent(
        &self,
        agent: &Agent,
        article: &Article,
        decision: &Decision,
    ) -> Result<()> {
        info!(
            agent = %agent.name,
            confidence = decision.confidence,
            "🚨 urgent news: {}",
            article.title
        );
        Ok(())
    }
}

pub struct LogTracker;

#[async_trait]
impl TrendTracker for LogTracker {
    async fn track(&self, agent: &Agent, article: &Article, _decision: &Decision) -> Result<()> {
        info!(agent = %agent.name, "📈 tracking developing story: {}", article.title);
        Ok(())
    }
}

pub struct LogReporter;

impl CycleReporter for LogReporter {
    fn cycle_failed(&self, agent_id: i64, agent_name: &str, err: &Error) {
        error!(agent_id, agent = %agent_name, "monitoring cycle failed: {}", err);
    }
}
