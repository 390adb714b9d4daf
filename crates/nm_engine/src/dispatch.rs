use std::sync::Arc;
use tracing::{debug, warn};

use nm_core::{Agent, Article, Decision, Notifier, Storage, SuggestedAction, TrendTracker};

/// Relevance bump applied when an article is marked important.
const IMPORTANCE_BUMP: i32 = 20;

/// Maps a suggested action to its side effect. Pure dispatch: failures are
/// logged, never retried, and never interrupt the calling cycle.
pub struct ActionDispatcher {
    storage: Arc<dyn Storage>,
    notifier: Arc<dyn Notifier>,
    tracker: Arc<dyn TrendTracker>,
}

impl ActionDispatcher {
    pub fn new(
        storage: Arc<dyn Storage>,
        notifier: Arc<dyn Notifier>,
        tracker: Arc<dyn TrendTracker>,
    ) -> Self {
        Self {
            storage,
            notifier,
            tracker,
        }
    }

    pub async fn dispatch(&self, agent: &Agent, article: &Article, decision: &Decision) {
        match decision.suggested_action {
            SuggestedAction::NotifyUser => {
                if let Err(e) = self.notifier.notify_urgent(agent, article, decision).await {
                    warn!(agent = %agent.name, "urgent notification failed: {}", e);
                }
            }
            SuggestedAction::TrackTrend => {
                if let Err(e) = self.tracker.track(agent, article, decision).await {
                    warn!(agent = %agent.name, "trend tracking failed: {}", e);
                }
            }
            SuggestedAction::SaveImportant => {
                match self
                    .storage
                    .bump_article_relevance(article.id, IMPORTANCE_BUMP)
                    .await
                {
                    Ok(score) => {
                        debug!(article = %article.title, score, "marked as important");
                    }
                    Err(e) => warn!(agent = %agent.name, "importance bump failed: {}", e),
                }
            }
            SuggestedAction::Ignore => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use nm_core::{
        AgentSpec, AnalysisMethod, Error, InsertOutcome, NewArticle, Result,
    };
    use nm_storage::MemoryStorage;

    struct FailingNotifier;

    #[async_trait]
    impl Notifier for FailingNotifier {
        async fn notify_urgent(
            &self,
            _agent: &Agent,
            _article: &Article,
            _decision: &Decision,
        ) -> Result<()> {
            Err(Error::ProviderUnavailable("notifier down".to_string()))
        }
    }

    struct NoopTracker;

    #[async_trait]
    impl TrendTracker for NoopTracker {
        async fn track(
            &self,
            _agent: &Agent,
            _article: &Article,
            _decision: &Decision,
        ) -> Result<()> {
            Ok(())
        }
    }

    async fn setup() -> (Arc<dyn Storage>, Agent, Article) {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let agent = storage
            .create_agent(AgentSpec {
                name: "tech".to_string(),
                keywords: "ai".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        let outcome = storage
            .insert_article(NewArticle {
                agent_id: agent.id,
                url: "http://example.com/a".to_string(),
                title: "AI news".to_string(),
                description: None,
                content: None,
                source: None,
                author: None,
                published_at: Some(Utc::now()),
                keywords_matched: vec!["ai".to_string()],
                relevance_score: 85,
                analysis_method: AnalysisMethod::Fallback,
            })
            .await
            .unwrap();
        let article = match outcome {
            InsertOutcome::Inserted(a) => a,
            InsertOutcome::Duplicate => panic!("expected insert"),
        };
        (storage, agent, article)
    }

    fn decision(action: SuggestedAction) -> Decision {
        Decision {
            act: true,
            method: AnalysisMethod::Fallback,
            confidence: 0.85,
            reasoning: "test".to_string(),
            suggested_action: action,
            matched_keywords: vec![],
            sentiment: None,
            key_points: vec![],
        }
    }

    #[tokio::test]
    async fn test_save_important_bumps_relevance() {
        let (storage, agent, article) = setup().await;
        let dispatcher = ActionDispatcher::new(
            storage.clone(),
            Arc::new(FailingNotifier),
            Arc::new(NoopTracker),
        );

        dispatcher
            .dispatch(&agent, &article, &decision(SuggestedAction::SaveImportant))
            .await;

        let stored = storage
            .article_by_url("http://example.com/a")
            .await
            .unwrap()
            .unwrap();
        // 85 + 20 capped at 100
        assert_eq!(stored.relevance_score, 100);
    }

    #[tokio::test]
    async fn test_notifier_failure_is_swallowed() {
        let (storage, agent, article) = setup().await;
        let dispatcher = ActionDispatcher::new(
            storage.clone(),
            Arc::new(FailingNotifier),
            Arc::new(NoopTracker),
        );

        // Must not panic or surface the sink error.
        dispatcher
            .dispatch(&agent, &article, &decision(SuggestedAction::NotifyUser))
            .await;
    }

    #[tokio::test]
    async fn test_ignore_has_no_side_effect() {
        let (storage, agent, article) = setup().await;
        let dispatcher = ActionDispatcher::new(
            storage.clone(),
            Arc::new(FailingNotifier),
            Arc::new(NoopTracker),
        );

        dispatcher
            .dispatch(&agent, &article, &decision(SuggestedAction::Ignore))
            .await;

        let stored = storage
            .article_by_url("http://example.com/a")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.relevance_score, 85);
    }
}
