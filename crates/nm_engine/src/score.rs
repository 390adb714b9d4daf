use nm_core::RawArticle;

const TITLE_WEIGHT: f64 = 1.0;
const DESCRIPTION_WEIGHT: f64 = 0.7;
const CONTENT_WEIGHT: f64 = 0.3;

/// Result of keyword-weighted scoring. Each keyword counts once, at the
/// earliest field it matches (title before description before content).
#[derive(Debug, Clone)]
pub struct KeywordMatch {
    pub matched: Vec<String>,
    pub title_matches: usize,
    pub description_matches: usize,
    pub content_matches: usize,
    /// Weighted score normalized by keyword count, capped at 1.0.
    pub score: f64,
}

pub fn score_keywords(article: &RawArticle, keywords: &[String]) -> KeywordMatch {
    let title = article.title.as_deref().unwrap_or("").to_lowercase();
    let description = article.description.as_deref().unwrap_or("").to_lowercase();
    let content = article.content.as_deref().unwrap_or("").to_lowercase();

    let mut matched = Vec::new();
    let mut title_matches = 0;
    let mut description_matches = 0;
    let mut content_matches = 0;

    for keyword in keywords {
        let needle = keyword.trim().to_lowercase();
        if needle.is_empty() {
            continue;
        }
        if title.contains(&needle) {
            title_matches += 1;
        } else if description.contains(&needle) {
            description_matches += 1;
        } else if content.contains(&needle) {
            content_matches += 1;
        } else {
            continue;
        }
        matched.push(keyword.clone());
    }

    let score = if keywords.is_empty() {
        0.0
    } else {
        let weighted = title_matches as f64 * TITLE_WEIGHT
            + description_matches as f64 * DESCRIPTION_WEIGHT
            + content_matches as f64 * CONTENT_WEIGHT;
        (weighted / keywords.len() as f64).min(1.0)
    };

    KeywordMatch {
        matched,
        title_matches,
        description_matches,
        content_matches,
        score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(title: &str, description: &str, content: &str) -> RawArticle {
        RawArticle {
            title: Some(title.to_string()),
            description: Some(description.to_string()),
            content: Some(content.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_weighted_scoring_example() {
        // title hit (1.0) + description hit (0.7) over 2 keywords = 0.85
        let article = article("the ai race heats up", "new chip designs announced", "");
        let keywords = vec!["ai".to_string(), "chip".to_string()];

        let result = score_keywords(&article, &keywords);
        assert_eq!(result.title_matches, 1);
        assert_eq!(result.description_matches, 1);
        assert!((result.score - 0.85).abs() < 1e-9);
    }

    #[test]
    fn test_keyword_counts_once_at_earliest_field() {
        let article = article("ai everywhere", "ai also here", "and ai here too");
        let keywords = vec!["ai".to_string()];

        let result = score_keywords(&article, &keywords);
        assert_eq!(result.title_matches, 1);
        assert_eq!(result.description_matches, 0);
        assert_eq!(result.content_matches, 0);
        assert_eq!(result.matched, vec!["ai"]);
    }

    #[test]
    fn test_score_capped_at_one() {
        let article = article("ai chips", "", "");
        let keywords = vec!["ai".to_string()];
        // Single keyword in title: 1.0 / 1 = 1.0, never above.
        assert_eq!(score_keywords(&article, &keywords).score, 1.0);
    }

    #[test]
    fn test_no_keywords_scores_zero() {
        let article = article("ai chips", "something", "");
        assert_eq!(score_keywords(&article, &[]).score, 0.0);
    }

    #[test]
    fn test_match_is_case_insensitive() {
        let article = article("Nvidia GPU shortage", "", "");
        let keywords = vec!["NVIDIA".to_string()];
        assert_eq!(score_keywords(&article, &keywords).matched.len(), 1);
    }
}
