use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::warn;

use nm_core::{Error, RawArticle, Result, SearchProvider};

use crate::config::NewsApiConfig;
use crate::rate_limit::RateLimiter;

const MAX_RATE_LIMIT_RETRIES: u32 = 1;
const MAX_PAGE_SIZE: usize = 100;

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    articles: Vec<WireArticle>,
}

#[derive(Deserialize)]
struct WireArticle {
    title: Option<String>,
    description: Option<String>,
    content: Option<String>,
    url: Option<String>,
    author: Option<String>,
    source: Option<WireSource>,
    #[serde(rename = "publishedAt")]
    published_at: Option<String>,
}

#[derive(Deserialize)]
struct WireSource {
    name: Option<String>,
}

impl From<WireArticle> for RawArticle {
    fn from(wire: WireArticle) -> Self {
        Self {
            title: wire.title,
            description: wire.description,
            content: wire.content,
            url: wire.url,
            source: wire.source.and_then(|s| s.name),
            author: wire.author,
            published_at: wire.published_at,
        }
    }
}

/// NewsAPI `/everything` search client.
pub struct NewsApiSearch {
    client: Client,
    config: NewsApiConfig,
    limiter: RateLimiter,
}

impl NewsApiSearch {
    pub fn new(config: NewsApiConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        let limiter = RateLimiter::new(config.min_call_spacing);
        Ok(Self {
            client,
            config,
            limiter,
        })
    }
}

#[async_trait]
impl SearchProvider for NewsApiSearch {
    fn name(&self) -> &str {
        "newsapi"
    }

    async fn fetch(
        &self,
        query: &str,
        source: Option<&str>,
        page_size: usize,
    ) -> Result<Vec<RawArticle>> {
        let page_size = page_size.min(MAX_PAGE_SIZE);
        let mut attempts = 0u32;

        loop {
            self.limiter.acquire().await;

            let mut request = self
                .client
                .get(format!("{}/everything", self.config.base_url))
                .query(&[
                    ("q", query),
                    ("language", &self.config.language),
                    ("sortBy", "publishedAt"),
                    ("pageSize", &page_size.to_string()),
                    ("apiKey", &self.config.api_key),
                ]);
            if let Some(source) = source {
                request = request.query(&[("sources", source)]);
            }

            let response = match request.send().await {
                Ok(response) => response,
                Err(e) => {
                    // Transient network trouble degrades to an empty cycle
                    // rather than failing it.
                    warn!("news search request failed: {}", e);
                    return Ok(Vec::new());
                }
            };

            match response.status().as_u16() {
                200 => {
                    let body: SearchResponse = response.json().await.map_err(|e| {
                        Error::InvalidResponse(format!("malformed search response: {}", e))
                    })?;
                    return Ok(body.articles.into_iter().map(Into::into).collect());
                }
                429 => {
                    if attempts >= MAX_RATE_LIMIT_RETRIES {
                        return Err(Error::RateLimited {
                            provider: self.name().to_string(),
                            attempts: attempts + 1,
                        });
                    }
                    attempts += 1;
                    warn!(
                        "news search rate limited, retrying in {:?} ({}/{})",
                        self.config.retry_delay, attempts, MAX_RATE_LIMIT_RETRIES
                    );
                    tokio::time::sleep(self.config.retry_delay).await;
                }
                401 | 403 => {
                    return Err(Error::AuthFailure("news search API key rejected".to_string()));
                }
                400 => {
                    let body = response.text().await.unwrap_or_default();
                    return Err(Error::InvalidResponse(format!("bad search request: {}", body)));
                }
                status => {
                    warn!("unexpected news search status {}, treating as empty", status);
                    return Ok(Vec::new());
                }
            }
        }
    }
}
