use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use nm_core::{Error, Result};

use crate::monitor::{run_loop, MonitorContext};

/// Condensed view of an agent's most recent AI analysis.
#[derive(Debug, Clone)]
pub struct AnalysisSummary {
    pub article_url: String,
    pub summary: String,
    pub sentiment: Option<String>,
    pub confidence: f64,
    pub suggested_action: String,
    pub created_at: DateTime<Utc>,
}

/// Snapshot of one agent's monitoring state.
#[derive(Debug, Clone)]
pub struct AgentStatus {
    pub agent_id: i64,
    pub name: String,
    pub is_active: bool,
    pub is_monitoring: bool,
    pub last_checked: Option<DateTime<Utc>>,
    pub articles_last_24h: u64,
    pub latest_analysis: Option<AnalysisSummary>,
}

struct RunningAgent {
    /// Distinguishes this loop from any later loop started for the same
    /// agent, so a finished task only cleans up its own bookkeeping.
    generation: u64,
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Owns one monitoring loop per started agent. Start is idempotent per
/// agent; stop is graceful and waits for the loop to finish its current
/// cycle.
pub struct AgentScheduler {
    ctx: Arc<MonitorContext>,
    running: Mutex<HashMap<i64, RunningAgent>>,
    next_generation: std::sync::atomic::AtomicU64,
}

impl AgentScheduler {
    pub fn new(ctx: Arc<MonitorContext>) -> Self {
        Self {
            ctx,
            running: Mutex::new(HashMap::new()),
            next_generation: std::sync::atomic::AtomicU64::new(0),
        }
    }

    /// Start monitoring an agent. A second call while its loop is alive is
    /// a no-op; a stale entry from a finished loop is replaced.
    pub async fn start(self: &Arc<Self>, agent_id: i64) -> Result<()> {
        let agent = self
            .ctx
            .storage
            .get_agent(agent_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("agent {agent_id}")))?;

        if !agent.is_active {
            return Err(Error::InvalidAgent(format!(
                "agent '{}' is not active",
                agent.name
            )));
        }

        // The map lock is held across the check and the insert, so
        // concurrent starts for the same agent resolve to a single loop.
        let mut running = self.running.lock().await;
        if let Some(existing) = running.get(&agent_id) {
            if !existing.handle.is_finished() {
                debug!(agent = %agent.name, "already monitoring");
                return Ok(());
            }
        }

        let generation = self
            .next_generation
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let (stop_tx, stop_rx) = watch::channel(false);

        let ctx = self.ctx.clone();
        let scheduler = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            run_loop(agent_id, ctx, stop_rx).await;
            // Self-cleanup: remove our entry unless a restart already
            // replaced it with a newer generation.
            if let Some(scheduler) = scheduler.upgrade() {
                let mut running = scheduler.running.lock().await;
                if running
                    .get(&agent_id)
                    .is_some_and(|r| r.generation == generation)
                {
                    running.remove(&agent_id);
                }
            }
        });

        running.insert(
            agent_id,
            RunningAgent {
                generation,
                stop: stop_tx,
                handle,
            },
        );
        info!(agent = %agent.name, interval = ?agent.check_interval(), "▶️ started monitoring");
        Ok(())
    }

    /// Stop an agent's loop and wait for it to exit. Stopping an agent that
    /// is not running is a no-op.
    pub async fn stop(&self, agent_id: i64) -> Result<()> {
        let entry = {
            let mut running = self.running.lock().await;
            running.remove(&agent_id)
        };

        let Some(entry) = entry else {
            debug!(agent_id, "stop requested for agent that is not monitoring");
            return Ok(());
        };

        // Send may fail if the loop already exited; joining below still
        // covers that case.
        let _ = entry.stop.send(true);
        // Join outside the map lock so the loop's self-cleanup cannot
        // deadlock against us.
        if let Err(e) = entry.handle.await {
            if e.is_panic() {
                warn!(agent_id, "monitoring loop panicked: {}", e);
            }
        }
        info!(agent_id, "⏹️ stopped monitoring");
        Ok(())
    }

    /// Stop then start, picking up any config changes immediately rather
    /// than at the next cycle boundary.
    pub async fn restart(self: &Arc<Self>, agent_id: i64) -> Result<()> {
        self.stop(agent_id).await?;
        self.start(agent_id).await
    }

    pub async fn is_monitoring(&self, agent_id: i64) -> bool {
        let running = self.running.lock().await;
        running
            .get(&agent_id)
            .is_some_and(|r| !r.handle.is_finished())
    }

    pub async fn running_count(&self) -> usize {
        let running = self.running.lock().await;
        running.values().filter(|r| !r.handle.is_finished()).count()
    }

    pub async fn status(&self, agent_id: i64) -> Result<AgentStatus> {
        let agent = self
            .ctx
            .storage
            .get_agent(agent_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("agent {agent_id}")))?;

        let since = Utc::now() - ChronoDuration::hours(24);
        let articles_last_24h = self.ctx.storage.article_count_since(agent_id, since).await?;
        let latest_analysis =
            self.ctx
                .storage
                .latest_analysis(agent_id)
                .await?
                .map(|record| AnalysisSummary {
                    article_url: record.article_url,
                    summary: record.summary,
                    sentiment: record.sentiment,
                    confidence: record.confidence,
                    suggested_action: record.suggested_action.as_str().to_string(),
                    created_at: record.created_at,
                });

        Ok(AgentStatus {
            agent_id: agent.id,
            name: agent.name,
            is_active: agent.is_active,
            is_monitoring: self.is_monitoring(agent_id).await,
            last_checked: agent.last_checked,
            articles_last_24h,
            latest_analysis,
        })
    }

    /// Stop every running loop and wait for all of them.
    pub async fn shutdown(&self) {
        let entries: Vec<(i64, RunningAgent)> = {
            let mut running = self.running.lock().await;
            running.drain().collect()
        };
        let count = entries.len();

        let mut handles = Vec::with_capacity(count);
        for (_, entry) in entries {
            let _ = entry.stop.send(true);
            handles.push(entry.handle);
        }
        futures::future::join_all(handles).await;
        info!(stopped = count, "scheduler shut down");
    }
}
