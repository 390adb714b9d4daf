use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

use nm_core::{
    parse_keywords, Agent, AgentSpec, AnalysisRecord, Article, Error, InsertOutcome, NewAnalysis,
    NewArticle, Result, Storage,
};

#[derive(Default)]
struct MemoryStore {
    agents: HashMap<i64, Agent>,
    articles: Vec<Article>,
    article_urls: HashSet<String>,
    analyses: Vec<AnalysisRecord>,
    next_agent_id: i64,
    next_article_id: i64,
    next_analysis_id: i64,
}

/// In-memory storage. The URL set and article list are mutated under one
/// write lock, which makes insert-if-absent atomic.
pub struct MemoryStorage {
    store: Arc<RwLock<MemoryStore>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(MemoryStore::default())),
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn create_agent(&self, spec: AgentSpec) -> Result<Agent> {
        spec.validate()?;
        let mut store = self.store.write().await;
        store.next_agent_id += 1;
        let now = Utc::now();
        let agent = Agent {
            id: store.next_agent_id,
            name: spec.name,
            keywords: parse_keywords(&spec.keywords),
            news_source: spec.news_source,
            check_interval_secs: spec.check_interval_secs,
            is_active: spec.is_active,
            llm_enabled: spec.llm_enabled,
            min_confidence: spec.min_confidence,
            last_checked: None,
            created_at: now,
            updated_at: now,
        };
        store.agents.insert(agent.id, agent.clone());
        Ok(agent)
    }

    async fn get_agent(&self, id: i64) -> Result<Option<Agent>> {
        let store = self.store.read().await;
        Ok(store.agents.get(&id).cloned())
    }

    async fn update_agent(&self, agent: &Agent) -> Result<()> {
        let mut store = self.store.write().await;
        match store.agents.get_mut(&agent.id) {
            Some(existing) => {
                *existing = agent.clone();
                existing.updated_at = Utc::now();
                Ok(())
            }
            None => Err(Error::NotFound(format!("agent {}", agent.id))),
        }
    }

    async fn touch_last_checked(&self, id: i64, at: DateTime<Utc>) -> Result<()> {
        let mut store = self.store.write().await;
        match store.agents.get_mut(&id) {
            Some(agent) => {
                agent.last_checked = Some(at);
                Ok(())
            }
            None => Err(Error::NotFound(format!("agent {}", id))),
        }
    }

    async fn insert_article(&self, article: NewArticle) -> Result<InsertOutcome> {
        let mut store = self.store.write().await;
        if store.article_urls.contains(&article.url) {
            return Ok(InsertOutcome::Duplicate);
        }
        store.next_article_id += 1;
        let record = Article {
            id: store.next_article_id,
            agent_id: article.agent_id,
            url: article.url,
            title: article.title,
            description: article.description,
            content: article.content,
            source: article.source,
            author: article.author,
            published_at: article.published_at,
            keywords_matched: article.keywords_matched,
            relevance_score: article.relevance_score,
            analysis_method: article.analysis_method,
            created_at: Utc::now(),
        };
        store.article_urls.insert(record.url.clone());
        store.articles.push(record.clone());
        Ok(InsertOutcome::Inserted(record))
    }

    async fn article_by_url(&self, url: &str) -> Result<Option<Article>> {
        let store = self.store.read().await;
        Ok(store.articles.iter().find(|a| a.url == url).cloned())
    }

    async fn article_count_since(&self, agent_id: i64, since: DateTime<Utc>) -> Result<u64> {
        let store = self.store.read().await;
        Ok(store
            .articles
            .iter()
            .filter(|a| a.agent_id == agent_id && a.created_at >= since)
            .count() as u64)
    }

    async fn bump_article_relevance(&self, article_id: i64, by: i32) -> Result<i32> {
        let mut store = self.store.write().await;
        match store.articles.iter_mut().find(|a| a.id == article_id) {
            Some(article) => {
                article.relevance_score = (article.relevance_score + by).min(100);
                Ok(article.relevance_score)
            }
            None => Err(Error::NotFound(format!("article {}", article_id))),
        }
    }

    async fn insert_analysis(&self, analysis: NewAnalysis) -> Result<AnalysisRecord> {
        let mut store = self.store.write().await;
        store.next_analysis_id += 1;
        let record = AnalysisRecord {
            id: store.next_analysis_id,
            agent_id: analysis.agent_id,
            article_url: analysis.article_url,
            summary: analysis.summary,
            sentiment: analysis.sentiment,
            confidence: analysis.confidence,
            key_points: analysis.key_points,
            suggested_action: analysis.suggested_action,
            model_used: analysis.model_used,
            created_at: Utc::now(),
        };
        store.analyses.push(record.clone());
        Ok(record)
    }

    async fn latest_analysis(&self, agent_id: i64) -> Result<Option<AnalysisRecord>> {
        let store = self.store.read().await;
        Ok(store
            .analyses
            .iter()
            .rev()
            .find(|a| a.agent_id == agent_id)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use nm_core::{AnalysisMethod, SuggestedAction};

    fn test_spec() -> AgentSpec {
        AgentSpec {
            name: "tech watcher".to_string(),
            keywords: "ai, chips".to_string(),
            ..Default::default()
        }
    }

    fn test_article(agent_id: i64, url: &str) -> NewArticle {
        NewArticle {
            agent_id,
            url: url.to_string(),
            title: "Test Article".to_string(),
            description: Some("A long enough description for testing.".to_string()),
            content: None,
            source: Some("test".to_string()),
            author: None,
            published_at: Some(Utc::now()),
            keywords_matched: vec!["ai".to_string()],
            relevance_score: 85,
            analysis_method: AnalysisMethod::Fallback,
        }
    }

    #[tokio::test]
    async fn test_duplicate_url_rejected() {
        let storage = MemoryStorage::new();
        let agent = storage.create_agent(test_spec()).await.unwrap();

        let first = storage
            .insert_article(test_article(agent.id, "http://example.com/a"))
            .await
            .unwrap();
        assert!(matches!(first, InsertOutcome::Inserted(_)));

        let second = storage
            .insert_article(test_article(agent.id, "http://example.com/a"))
            .await
            .unwrap();
        assert!(matches!(second, InsertOutcome::Duplicate));

        let count = storage
            .article_count_since(agent.id, Utc::now() - Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_count_window_excludes_old_articles() {
        let storage = MemoryStorage::new();
        let agent = storage.create_agent(test_spec()).await.unwrap();
        storage
            .insert_article(test_article(agent.id, "http://example.com/recent"))
            .await
            .unwrap();

        // Window starting in the future sees nothing.
        let count = storage
            .article_count_since(agent.id, Utc::now() + Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_relevance_bump_caps_at_100() {
        let storage = MemoryStorage::new();
        let agent = storage.create_agent(test_spec()).await.unwrap();
        let inserted = storage
            .insert_article(test_article(agent.id, "http://example.com/b"))
            .await
            .unwrap();
        let article = match inserted {
            InsertOutcome::Inserted(a) => a,
            InsertOutcome::Duplicate => panic!("expected insert"),
        };

        let score = storage
            .bump_article_relevance(article.id, 20)
            .await
            .unwrap();
        assert_eq!(score, 100);

        let score = storage
            .bump_article_relevance(article.id, 20)
            .await
            .unwrap();
        assert_eq!(score, 100);
    }

    #[tokio::test]
    async fn test_latest_analysis_returns_newest() {
        let storage = MemoryStorage::new();
        let agent = storage.create_agent(test_spec()).await.unwrap();

        for (i, confidence) in [0.4, 0.9].iter().enumerate() {
            storage
                .insert_analysis(NewAnalysis {
                    agent_id: agent.id,
                    article_url: format!("http://example.com/{}", i),
                    summary: "summary".to_string(),
                    sentiment: Some("neutral".to_string()),
                    confidence: *confidence,
                    key_points: vec![],
                    suggested_action: SuggestedAction::Ignore,
                    model_used: "test".to_string(),
                })
                .await
                .unwrap();
        }

        let latest = storage.latest_analysis(agent.id).await.unwrap().unwrap();
        assert_eq!(latest.confidence, 0.9);
        assert!(storage.latest_analysis(999).await.unwrap().is_none());
    }
}
