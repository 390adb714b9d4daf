use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use nm_core::{
    Agent, AnalysisMethod, Decision, Judgment, RawArticle, RelevanceProvider, SuggestedAction,
};

use crate::score::score_keywords;

/// Fixed act threshold for the pure-fallback path. Deliberately distinct
/// from the AI path's per-agent `min_confidence`; a product decision to
/// revisit rather than unify.
pub const FALLBACK_ACT_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Upper bound on one relevance call, including its internal retry.
    pub provider_timeout: Duration,
    /// Whether fallback decisions also produce a persisted AnalysisRecord.
    pub record_fallback: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            provider_timeout: Duration::from_secs(90),
            record_fallback: false,
        }
    }
}

/// Two-tier relevance decision: ask the AI provider when enabled, fall back
/// to deterministic keyword scoring on any failure. `decide` never errors;
/// a provider problem always resolves to a fallback decision.
pub struct AnalysisEngine {
    relevance: Arc<dyn RelevanceProvider>,
    config: EngineConfig,
}

impl AnalysisEngine {
    pub fn new(relevance: Arc<dyn RelevanceProvider>, config: EngineConfig) -> Self {
        Self { relevance, config }
    }

    pub fn record_fallback(&self) -> bool {
        self.config.record_fallback
    }

    /// Model identifier recorded with an analysis of the given method.
    pub fn model_used(&self, method: AnalysisMethod) -> String {
        match method {
            AnalysisMethod::Ai => self.relevance.model().to_string(),
            AnalysisMethod::Fallback => "keyword-fallback".to_string(),
        }
    }

    pub async fn decide(&self, agent: &Agent, article: &RawArticle) -> Decision {
        if agent.llm_enabled && !agent.keywords.is_empty() {
            let purpose = agent.purpose();
            let call = self
                .relevance
                .assess(article, &agent.keywords, &purpose);
            match tokio::time::timeout(self.config.provider_timeout, call).await {
                Ok(Ok(judgment)) => return ai_decision(agent, judgment),
                Ok(Err(e)) => {
                    warn!(agent = %agent.name, "AI analysis failed, falling back: {}", e);
                }
                Err(_) => {
                    warn!(
                        agent = %agent.name,
                        "AI analysis timed out after {:?}, falling back",
                        self.config.provider_timeout
                    );
                }
            }
        }
        fallback_decision(agent, article)
    }
}

fn ai_decision(agent: &Agent, judgment: Judgment) -> Decision {
    let act = judgment.is_relevant && judgment.confidence >= agent.min_confidence;
    Decision {
        act,
        method: AnalysisMethod::Ai,
        confidence: judgment.confidence,
        reasoning: judgment.reasoning,
        suggested_action: judgment.suggested_action,
        matched_keywords: Vec::new(),
        sentiment: judgment.sentiment,
        key_points: judgment.key_points,
    }
}

fn fallback_decision(agent: &Agent, article: &RawArticle) -> Decision {
    let matched = score_keywords(article, &agent.keywords);
    let act = matched.score > FALLBACK_ACT_THRESHOLD;
    Decision {
        act,
        method: AnalysisMethod::Fallback,
        confidence: matched.score,
        reasoning: format!("Keyword analysis: {} matches", matched.matched.len()),
        suggested_action: if act {
            SuggestedAction::SaveImportant
        } else {
            SuggestedAction::Ignore
        },
        matched_keywords: matched.matched,
        sentiment: None,
        key_points: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use nm_core::{Error, Result};

    struct FailingProvider;

    #[async_trait]
    impl RelevanceProvider for FailingProvider {
        fn name(&self) -> &str {
            "failing"
        }

        fn model(&self) -> &str {
            "failing-model"
        }

        async fn assess(
            &self,
            _article: &RawArticle,
            _keywords: &[String],
            _purpose: &str,
        ) -> Result<Judgment> {
            Err(Error::ProviderUnavailable("down for maintenance".to_string()))
        }
    }

    struct FixedProvider(Judgment);

    #[async_trait]
    impl RelevanceProvider for FixedProvider {
        fn name(&self) -> &str {
            "fixed"
        }

        fn model(&self) -> &str {
            "fixed-model"
        }

        async fn assess(
            &self,
            _article: &RawArticle,
            _keywords: &[String],
            _purpose: &str,
        ) -> Result<Judgment> {
            Ok(self.0.clone())
        }
    }

    fn test_agent(llm_enabled: bool, keywords: &[&str]) -> Agent {
        Agent {
            id: 1,
            name: "tech".to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            news_source: None,
            check_interval_secs: 300,
            is_active: true,
            llm_enabled,
            min_confidence: 0.7,
            last_checked: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn matching_article() -> RawArticle {
        RawArticle {
            title: Some("the ai race heats up".to_string()),
            description: Some("new chip designs announced".to_string()),
            content: Some(String::new()),
            ..Default::default()
        }
    }

    fn judgment(is_relevant: bool, confidence: f64, action: SuggestedAction) -> Judgment {
        Judgment {
            is_relevant,
            confidence,
            reasoning: "test".to_string(),
            key_points: vec![],
            sentiment: Some("neutral".to_string()),
            urgency: None,
            suggested_action: action,
        }
    }

    #[tokio::test]
    async fn test_provider_failure_falls_back() {
        let engine = AnalysisEngine::new(Arc::new(FailingProvider), EngineConfig::default());
        let agent = test_agent(true, &["ai", "chip"]);

        let decision = engine.decide(&agent, &matching_article()).await;
        assert_eq!(decision.method, AnalysisMethod::Fallback);
        // 1.0 + 0.7 over 2 keywords
        assert!((decision.confidence - 0.85).abs() < 1e-9);
        assert!(decision.act);
        assert_eq!(decision.suggested_action, SuggestedAction::SaveImportant);
    }

    #[tokio::test]
    async fn test_ai_path_applies_min_confidence() {
        let below = FixedProvider(judgment(true, 0.6, SuggestedAction::NotifyUser));
        let engine = AnalysisEngine::new(Arc::new(below), EngineConfig::default());
        let agent = test_agent(true, &["ai"]);

        let decision = engine.decide(&agent, &matching_article()).await;
        assert_eq!(decision.method, AnalysisMethod::Ai);
        assert!(!decision.act);

        let above = FixedProvider(judgment(true, 0.9, SuggestedAction::NotifyUser));
        let engine = AnalysisEngine::new(Arc::new(above), EngineConfig::default());
        let decision = engine.decide(&agent, &matching_article()).await;
        assert!(decision.act);
        assert_eq!(decision.suggested_action, SuggestedAction::NotifyUser);
    }

    #[tokio::test]
    async fn test_irrelevant_judgment_never_acts() {
        let provider = FixedProvider(judgment(false, 0.95, SuggestedAction::SaveImportant));
        let engine = AnalysisEngine::new(Arc::new(provider), EngineConfig::default());
        let agent = test_agent(true, &["ai"]);

        let decision = engine.decide(&agent, &matching_article()).await;
        assert!(!decision.act);
    }

    #[tokio::test]
    async fn test_llm_disabled_goes_straight_to_fallback() {
        let provider = FixedProvider(judgment(true, 0.99, SuggestedAction::NotifyUser));
        let engine = AnalysisEngine::new(Arc::new(provider), EngineConfig::default());
        let agent = test_agent(false, &["ai", "chip"]);

        let decision = engine.decide(&agent, &matching_article()).await;
        assert_eq!(decision.method, AnalysisMethod::Fallback);
    }

    #[tokio::test]
    async fn test_no_keywords_is_vacuously_irrelevant() {
        let engine = AnalysisEngine::new(Arc::new(FailingProvider), EngineConfig::default());
        let agent = test_agent(true, &[]);

        let decision = engine.decide(&agent, &matching_article()).await;
        assert_eq!(decision.method, AnalysisMethod::Fallback);
        assert_eq!(decision.confidence, 0.0);
        assert!(!decision.act);
    }
}
