use chrono::{DateTime, Duration, Utc};
use url::Url;

use nm_core::RawArticle;

/// NewsAPI's placeholder title for articles pulled by the publisher.
const REMOVED_TITLE_SENTINEL: &str = "[Removed]";

/// Quality and recency predicates for raw candidates. Articles failing a
/// rule are dropped silently, never treated as errors.
#[derive(Debug, Clone)]
pub struct ArticleFilter {
    pub min_description_chars: usize,
    pub max_age_hours: i64,
}

impl Default for ArticleFilter {
    fn default() -> Self {
        Self {
            min_description_chars: 30,
            max_age_hours: 24,
        }
    }
}

impl ArticleFilter {
    pub fn is_quality(&self, article: &RawArticle) -> bool {
        let Some(title) = article.title.as_deref() else {
            return false;
        };
        if title.trim().is_empty() || title.eq_ignore_ascii_case(REMOVED_TITLE_SENTINEL) {
            return false;
        }
        match article.url.as_deref() {
            Some(url) if Url::parse(url).is_ok() => {}
            _ => return false,
        }
        match article.description.as_deref() {
            Some(description) => description.chars().count() >= self.min_description_chars,
            None => false,
        }
    }

    /// `now` is sampled once per batch by the caller so a slow cycle judges
    /// every candidate against the same clock. The age comparison is
    /// inclusive at exactly `max_age_hours`.
    pub fn is_recent(&self, article: &RawArticle, now: DateTime<Utc>) -> bool {
        let Some(raw) = article.published_at.as_deref() else {
            return false;
        };
        let Ok(published) = DateTime::parse_from_rfc3339(raw) else {
            return false;
        };
        now - published.with_timezone(&Utc) <= Duration::hours(self.max_age_hours)
    }

    pub fn apply(&self, articles: Vec<RawArticle>) -> Vec<RawArticle> {
        let now = Utc::now();
        articles
            .into_iter()
            .filter(|a| self.is_quality(a) && self.is_recent(a, now))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate() -> RawArticle {
        RawArticle {
            title: Some("AI chips are everywhere".to_string()),
            description: Some("A description long enough to pass quality.".to_string()),
            content: Some("Full text".to_string()),
            url: Some("https://example.com/a".to_string()),
            source: Some("test".to_string()),
            author: None,
            published_at: Some(Utc::now().to_rfc3339()),
        }
    }

    #[test]
    fn test_quality_requires_title_and_url() {
        let filter = ArticleFilter::default();
        assert!(filter.is_quality(&candidate()));

        let mut no_title = candidate();
        no_title.title = None;
        assert!(!filter.is_quality(&no_title));

        let mut removed = candidate();
        removed.title = Some("[Removed]".to_string());
        assert!(!filter.is_quality(&removed));

        let mut bad_url = candidate();
        bad_url.url = Some("not a url".to_string());
        assert!(!filter.is_quality(&bad_url));
    }

    #[test]
    fn test_description_boundary_is_inclusive_at_30() {
        let filter = ArticleFilter::default();

        let mut short = candidate();
        short.description = Some("x".repeat(29));
        assert!(!filter.is_quality(&short));

        let mut exact = candidate();
        exact.description = Some("x".repeat(30));
        assert!(filter.is_quality(&exact));

        let mut missing = candidate();
        missing.description = None;
        assert!(!filter.is_quality(&missing));
    }

    #[test]
    fn test_recency_boundary_is_inclusive_at_24h() {
        let filter = ArticleFilter::default();
        let now = Utc::now();

        let mut at_boundary = candidate();
        at_boundary.published_at = Some((now - Duration::hours(24)).to_rfc3339());
        assert!(filter.is_recent(&at_boundary, now));

        // 24.01 hours ago
        let mut too_old = candidate();
        too_old.published_at =
            Some((now - Duration::hours(24) - Duration::seconds(36)).to_rfc3339());
        assert!(!filter.is_recent(&too_old, now));
    }

    #[test]
    fn test_unparseable_timestamp_rejected() {
        let filter = ArticleFilter::default();
        let now = Utc::now();

        let mut garbled = candidate();
        garbled.published_at = Some("yesterday-ish".to_string());
        assert!(!filter.is_recent(&garbled, now));

        let mut missing = candidate();
        missing.published_at = None;
        assert!(!filter.is_recent(&missing, now));
    }
}
