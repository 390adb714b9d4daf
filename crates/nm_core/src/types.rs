use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Error, Result};

pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 300;
pub const DEFAULT_MIN_CONFIDENCE: f64 = 0.7;

/// Split a comma-delimited keyword specification into trimmed, non-empty terms.
pub fn parse_keywords(spec: &str) -> Vec<String> {
    spec.split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}

/// A configured monitoring worker: what to watch, how often, and how picky to be.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: i64,
    pub name: String,
    pub keywords: Vec<String>,
    pub news_source: Option<String>,
    pub check_interval_secs: u64,
    pub is_active: bool,
    pub llm_enabled: bool,
    pub min_confidence: f64,
    pub last_checked: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Agent {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    /// Disjunctive search query over the agent's keywords.
    pub fn query(&self) -> String {
        self.keywords.join(" OR ")
    }

    pub fn purpose(&self) -> String {
        format!("Monitor {} topics", self.name)
    }
}

/// Creation payload for an agent. Keywords arrive as a comma-delimited string.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSpec {
    pub name: String,
    pub keywords: String,
    pub news_source: Option<String>,
    pub check_interval_secs: u64,
    pub is_active: bool,
    pub llm_enabled: bool,
    pub min_confidence: f64,
}

impl Default for AgentSpec {
    fn default() -> Self {
        Self {
            name: String::new(),
            keywords: String::new(),
            news_source: None,
            check_interval_secs: DEFAULT_CHECK_INTERVAL_SECS,
            is_active: true,
            llm_enabled: true,
            min_confidence: DEFAULT_MIN_CONFIDENCE,
        }
    }
}

impl AgentSpec {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::InvalidAgent("name must not be empty".to_string()));
        }
        if self.check_interval_secs == 0 {
            return Err(Error::InvalidAgent(
                "check interval must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(Error::InvalidAgent(format!(
                "min confidence must be within [0, 1], got {}",
                self.min_confidence
            )));
        }
        if parse_keywords(&self.keywords).is_empty() {
            return Err(Error::InvalidAgent(
                "at least one keyword is required".to_string(),
            ));
        }
        Ok(())
    }
}

/// A candidate article as returned by a search provider, before any filtering.
/// Every field is optional because the wire data is unreliable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawArticle {
    pub title: Option<String>,
    pub description: Option<String>,
    pub content: Option<String>,
    pub url: Option<String>,
    pub source: Option<String>,
    pub author: Option<String>,
    pub published_at: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisMethod {
    Ai,
    Fallback,
}

impl AnalysisMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ai => "ai",
            Self::Fallback => "fallback",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestedAction {
    SaveImportant,
    NotifyUser,
    TrackTrend,
    Ignore,
}

impl SuggestedAction {
    /// Coerce a provider-supplied action string, defaulting unknown values
    /// to the safe `Ignore`.
    pub fn parse_or_ignore(s: &str) -> Self {
        match s {
            "save_important" => Self::SaveImportant,
            "notify_user" => Self::NotifyUser,
            "track_trend" => Self::TrackTrend,
            _ => Self::Ignore,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SaveImportant => "save_important",
            Self::NotifyUser => "notify_user",
            Self::TrackTrend => "track_trend",
            Self::Ignore => "ignore",
        }
    }
}

/// A validated relevance judgment from an AI provider, confidence already
/// normalized to [0, 1].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Judgment {
    pub is_relevant: bool,
    pub confidence: f64,
    pub reasoning: String,
    #[serde(default)]
    pub key_points: Vec<String>,
    pub sentiment: Option<String>,
    pub urgency: Option<String>,
    pub suggested_action: SuggestedAction,
}

/// The engine's answer for one article: whether to act, how sure, and what
/// to do. Produced by either the AI path or the keyword fallback, with a
/// uniform field set.
#[derive(Debug, Clone)]
pub struct Decision {
    pub act: bool,
    pub method: AnalysisMethod,
    pub confidence: f64,
    pub reasoning: String,
    pub suggested_action: SuggestedAction,
    pub matched_keywords: Vec<String>,
    pub sentiment: Option<String>,
    pub key_points: Vec<String>,
}

impl Decision {
    /// Confidence expressed on the stored 0-100 scale.
    pub fn relevance_score(&self) -> i32 {
        (self.confidence * 100.0).round() as i32
    }
}

/// Insert payload for a discovered article.
#[derive(Debug, Clone)]
pub struct NewArticle {
    pub agent_id: i64,
    pub url: String,
    pub title: String,
    pub description: Option<String>,
    pub content: Option<String>,
    pub source: Option<String>,
    pub author: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub keywords_matched: Vec<String>,
    pub relevance_score: i32,
    pub analysis_method: AnalysisMethod,
}

/// A persisted article. The URL is the dedup key, unique across all agents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub id: i64,
    pub agent_id: i64,
    pub url: String,
    pub title: String,
    pub description: Option<String>,
    pub content: Option<String>,
    pub source: Option<String>,
    pub author: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub keywords_matched: Vec<String>,
    pub relevance_score: i32,
    pub analysis_method: AnalysisMethod,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewAnalysis {
    pub agent_id: i64,
    pub article_url: String,
    pub summary: String,
    pub sentiment: Option<String>,
    pub confidence: f64,
    pub key_points: Vec<String>,
    pub suggested_action: SuggestedAction,
    pub model_used: String,
}

/// One analysis outcome, immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub id: i64,
    pub agent_id: i64,
    pub article_url: String,
    pub summary: String,
    pub sentiment: Option<String>,
    pub confidence: f64,
    pub key_points: Vec<String>,
    pub suggested_action: SuggestedAction,
    pub model_used: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_keywords() {
        assert_eq!(parse_keywords("ai, chip , "), vec!["ai", "chip"]);
        assert_eq!(parse_keywords(",,"), Vec::<String>::new());
        assert_eq!(parse_keywords("rust"), vec!["rust"]);
    }

    #[test]
    fn test_agent_spec_validation() {
        let spec = AgentSpec {
            name: "tech".to_string(),
            keywords: "ai, chips".to_string(),
            ..Default::default()
        };
        assert!(spec.validate().is_ok());

        let no_keywords = AgentSpec {
            name: "tech".to_string(),
            keywords: " , ".to_string(),
            ..Default::default()
        };
        assert!(no_keywords.validate().is_err());

        let bad_confidence = AgentSpec {
            name: "tech".to_string(),
            keywords: "ai".to_string(),
            min_confidence: 1.5,
            ..Default::default()
        };
        assert!(bad_confidence.validate().is_err());

        let zero_interval = AgentSpec {
            name: "tech".to_string(),
            keywords: "ai".to_string(),
            check_interval_secs: 0,
            ..Default::default()
        };
        assert!(zero_interval.validate().is_err());
    }

    #[test]
    fn test_action_coercion() {
        assert_eq!(
            SuggestedAction::parse_or_ignore("save_important"),
            SuggestedAction::SaveImportant
        );
        assert_eq!(
            SuggestedAction::parse_or_ignore("delete_everything"),
            SuggestedAction::Ignore
        );
    }

    #[test]
    fn test_relevance_score_scale() {
        let decision = Decision {
            act: true,
            method: AnalysisMethod::Fallback,
            confidence: 0.85,
            reasoning: String::new(),
            suggested_action: SuggestedAction::SaveImportant,
            matched_keywords: vec![],
            sentiment: None,
            key_points: vec![],
        };
        assert_eq!(decision.relevance_score(), 85);
    }
}
