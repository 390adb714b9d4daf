use std::time::Duration;

use nm_core::{Error, Result};

const NEWSAPI_BASE_URL: &str = "https://newsapi.org/v2";
const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const GEMINI_MODEL: &str = "gemini-1.5-flash";

fn env_var(name: &str) -> Result<String> {
    std::env::var(name).map_err(|_| Error::AuthFailure(format!("{} is not set", name)))
}

#[derive(Debug, Clone)]
pub struct NewsApiConfig {
    pub api_key: String,
    pub base_url: String,
    pub language: String,
    /// Minimum spacing between requests.
    pub min_call_spacing: Duration,
    /// How long to wait before the single retry after a 429.
    pub retry_delay: Duration,
    pub timeout: Duration,
}

impl NewsApiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: NEWSAPI_BASE_URL.to_string(),
            language: "en".to_string(),
            min_call_spacing: Duration::from_secs(1),
            retry_delay: Duration::from_secs(60),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn from_env() -> Result<Self> {
        let mut config = Self::new(env_var("NEWS_API_KEY")?);
        if let Ok(base_url) = std::env::var("NEWS_API_BASE_URL") {
            config.base_url = base_url;
        }
        Ok(config)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub min_call_spacing: Duration,
    pub retry_delay: Duration,
    pub timeout: Duration,
    pub max_output_tokens: u32,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: GEMINI_BASE_URL.to_string(),
            model: GEMINI_MODEL.to_string(),
            min_call_spacing: Duration::from_secs(2),
            retry_delay: Duration::from_secs(60),
            timeout: Duration::from_secs(60),
            max_output_tokens: 1000,
        }
    }

    pub fn from_env() -> Result<Self> {
        let mut config = Self::new(env_var("GEMINI_API_KEY")?);
        if let Ok(base_url) = std::env::var("GEMINI_BASE_URL") {
            config.base_url = base_url;
        }
        if let Ok(model) = std::env::var("GEMINI_MODEL") {
            config.model = model;
        }
        Ok(config)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}
