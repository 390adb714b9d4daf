use std::sync::Arc;

use nm_core::{Result, Storage};

/// Pre-insert duplicate check by canonical URL. Advisory only: the storage
/// uniqueness constraint remains the authoritative guard, and a concurrent
/// insert racing past this check resolves to `InsertOutcome::Duplicate`.
pub struct Deduplicator {
    storage: Arc<dyn Storage>,
}

impl Deduplicator {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub async fn seen(&self, url: &str) -> Result<bool> {
        Ok(self.storage.article_by_url(url).await?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use nm_core::{AgentSpec, AnalysisMethod, NewArticle};
    use nm_storage::MemoryStorage;

    #[tokio::test]
    async fn test_seen_after_insert() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let agent = storage
            .create_agent(AgentSpec {
                name: "tech".to_string(),
                keywords: "ai".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();

        let dedup = Deduplicator::new(storage.clone());
        assert!(!dedup.seen("http://example.com/a").await.unwrap());

        storage
            .insert_article(NewArticle {
                agent_id: agent.id,
                url: "http://example.com/a".to_string(),
                title: "t".to_string(),
                description: None,
                content: None,
                source: None,
                author: None,
                published_at: Some(Utc::now()),
                keywords_matched: vec![],
                relevance_score: 50,
                analysis_method: AnalysisMethod::Fallback,
            })
            .await
            .unwrap();

        assert!(dedup.seen("http://example.com/a").await.unwrap());
        assert!(!dedup.seen("http://example.com/b").await.unwrap());
    }
}
