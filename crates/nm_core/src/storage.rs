use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::types::{Agent, AgentSpec, AnalysisRecord, Article, NewAnalysis, NewArticle};
use crate::Result;

/// Outcome of an atomic insert-if-url-absent.
#[derive(Debug, Clone)]
pub enum InsertOutcome {
    Inserted(Article),
    /// An article with the same URL already exists. Benign, not an error.
    Duplicate,
}

#[async_trait]
pub trait Storage: Send + Sync {
    async fn create_agent(&self, spec: AgentSpec) -> Result<Agent>;

    async fn get_agent(&self, id: i64) -> Result<Option<Agent>>;

    async fn update_agent(&self, agent: &Agent) -> Result<()>;

    /// Record the completion time of a monitoring cycle.
    async fn touch_last_checked(&self, id: i64, at: DateTime<Utc>) -> Result<()>;

    /// Insert an article if no article with its URL exists yet. The
    /// uniqueness constraint here is the authoritative dedup guard;
    /// concurrent loops racing on the same URL get `Duplicate`, never an
    /// error.
    async fn insert_article(&self, article: NewArticle) -> Result<InsertOutcome>;

    async fn article_by_url(&self, url: &str) -> Result<Option<Article>>;

    async fn article_count_since(&self, agent_id: i64, since: DateTime<Utc>) -> Result<u64>;

    /// Raise an article's relevance score, capped at 100. Returns the new score.
    async fn bump_article_relevance(&self, article_id: i64, by: i32) -> Result<i32>;

    async fn insert_analysis(&self, analysis: NewAnalysis) -> Result<AnalysisRecord>;

    async fn latest_analysis(&self, agent_id: i64) -> Result<Option<AnalysisRecord>>;
}
