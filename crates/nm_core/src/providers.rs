use async_trait::async_trait;

use crate::types::{Judgment, RawArticle};
use crate::Result;

#[async_trait]
pub trait SearchProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Fetch candidate articles for a keyword query, optionally restricted
    /// to a source. Rate-limit and auth failures are surfaced distinctly so
    /// the caller can back off vs fail fast; transient network trouble
    /// degrades to an empty result.
    async fn fetch(
        &self,
        query: &str,
        source: Option<&str>,
        page_size: usize,
    ) -> Result<Vec<RawArticle>>;
}

#[async_trait]
pub trait RelevanceProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Identifier of the underlying model, recorded with each analysis.
    fn model(&self) -> &str;

    /// Ask the provider whether one article matters to an agent with the
    /// given keywords and purpose.
    async fn assess(
        &self,
        article: &RawArticle,
        keywords: &[String],
        purpose: &str,
    ) -> Result<Judgment>;
}
