pub mod config;
pub mod gemini;
pub mod newsapi;
pub mod rate_limit;

pub use config::{GeminiConfig, NewsApiConfig};
pub use gemini::GeminiRelevance;
pub use newsapi::NewsApiSearch;
pub use rate_limit::RateLimiter;
