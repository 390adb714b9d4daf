use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::warn;

use nm_core::{Error, Judgment, RawArticle, RelevanceProvider, Result, SuggestedAction};

use crate::config::GeminiConfig;
use crate::rate_limit::RateLimiter;

const MAX_RATE_LIMIT_RETRIES: u32 = 1;
const MAX_CONTENT_CHARS: usize = 2000;

/// Gemini-backed relevance judge.
pub struct GeminiRelevance {
    client: Client,
    config: GeminiConfig,
    limiter: RateLimiter,
}

impl GeminiRelevance {
    pub fn new(config: GeminiConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        let limiter = RateLimiter::new(config.min_call_spacing);
        Ok(Self {
            client,
            config,
            limiter,
        })
    }

    async fn call_api(&self, prompt: &str) -> Result<Value> {
        let payload = json!({
            "contents": [{
                "parts": [{ "text": prompt }]
            }],
            "generationConfig": {
                "maxOutputTokens": self.config.max_output_tokens,
                "temperature": 0.1,
                "topP": 0.8,
                "topK": 40
            }
        });

        let url = format!(
            "{}/models/{}:generateContent",
            self.config.base_url, self.config.model
        );

        let mut attempts = 0u32;
        loop {
            self.limiter.acquire().await;

            let response = self
                .client
                .post(&url)
                .query(&[("key", &self.config.api_key)])
                .json(&payload)
                .send()
                .await
                .map_err(|e| Error::ProviderUnavailable(format!("gemini request failed: {}", e)))?;

            match response.status().as_u16() {
                200 => {
                    return response.json().await.map_err(|e| {
                        Error::InvalidResponse(format!("malformed gemini body: {}", e))
                    });
                }
                429 => {
                    if attempts >= MAX_RATE_LIMIT_RETRIES {
                        return Err(Error::RateLimited {
                            provider: "gemini".to_string(),
                            attempts: attempts + 1,
                        });
                    }
                    attempts += 1;
                    warn!(
                        "gemini rate limited, retrying in {:?} ({}/{})",
                        self.config.retry_delay, attempts, MAX_RATE_LIMIT_RETRIES
                    );
                    tokio::time::sleep(self.config.retry_delay).await;
                }
                401 | 403 => {
                    return Err(Error::AuthFailure("gemini API key rejected".to_string()));
                }
                400 | 404 => {
                    let body = response.text().await.unwrap_or_default();
                    return Err(Error::InvalidResponse(format!("bad gemini request: {}", body)));
                }
                status => {
                    return Err(Error::ProviderUnavailable(format!(
                        "gemini returned status {}",
                        status
                    )));
                }
            }
        }
    }
}

#[async_trait]
impl RelevanceProvider for GeminiRelevance {
    fn name(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    async fn assess(
        &self,
        article: &RawArticle,
        keywords: &[String],
        purpose: &str,
    ) -> Result<Judgment> {
        let prompt = build_prompt(article, keywords, purpose);
        let body = self.call_api(&prompt).await?;
        let text = extract_text(&body)?;
        parse_judgment(&text)
    }
}

pub fn build_prompt(article: &RawArticle, keywords: &[String], purpose: &str) -> String {
    let title = article.title.as_deref().unwrap_or("");
    let description = article.description.as_deref().unwrap_or("");
    let source = article.source.as_deref().unwrap_or("Unknown");
    let content = article.content.as_deref().unwrap_or("");
    let content = truncate_chars(content, MAX_CONTENT_CHARS);

    format!(
        r#"You are an intelligent news analysis agent with the following mission:
PURPOSE: {purpose}
KEYWORDS OF INTEREST: {keywords}

Please analyze this news article and provide a structured assessment:

ARTICLE DETAILS:
Title: {title}
Source: {source}
Description: {description}
Content: {content}

ANALYSIS REQUIRED:
1. Relevance: Is this article relevant to the agent's purpose and keywords?
2. Confidence: How confident are you in this assessment? (0-100)
3. Reasoning: Why is this article relevant or not relevant?
4. Key Points: What are the 3 most important points in this article?
5. Sentiment: Is the overall tone positive, negative, or neutral?
6. Urgency: How urgent/important is this news? (high/medium/low)
7. Action: What should the agent do?

RESPONSE FORMAT (JSON):
{{
    "is_relevant": boolean,
    "confidence_score": number (0-1),
    "reasoning": "detailed explanation",
    "key_points": ["point1", "point2", "point3"],
    "sentiment": "positive|negative|neutral",
    "urgency": "high|medium|low",
    "suggested_action": "save_important|notify_user|track_trend|ignore"
}}

Respond only with valid JSON."#,
        purpose = purpose,
        keywords = keywords.join(", "),
        title = title,
        source = source,
        description = description,
        content = content,
    )
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Concatenate the text parts of the first candidate.
fn extract_text(body: &Value) -> Result<String> {
    let candidate = body
        .get("candidates")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .ok_or_else(|| Error::InvalidResponse("no candidates in response".to_string()))?;

    let parts = candidate
        .get("content")
        .and_then(|c| c.get("parts"))
        .and_then(|p| p.as_array())
        .ok_or_else(|| Error::InvalidResponse("no parts in candidate".to_string()))?;

    let mut text = String::new();
    for part in parts {
        if let Some(chunk) = part.get("text").and_then(|t| t.as_str()) {
            text.push_str(chunk);
        }
    }

    if text.is_empty() {
        return Err(Error::InvalidResponse("empty candidate text".to_string()));
    }
    Ok(text)
}

/// Normalize a reported confidence onto [0, 1]. Percent-scale values come
/// back as e.g. 85; small overshoots like 1.4 are clamped rather than
/// rescaled.
pub fn normalize_confidence(raw: f64) -> f64 {
    let value = if raw > 10.0 { raw / 100.0 } else { raw };
    value.clamp(0.0, 1.0)
}

/// Parse and validate a judgment from the model's JSON answer. Missing
/// required fields are a validation failure; an unknown suggested action is
/// coerced to `ignore`.
pub fn parse_judgment(text: &str) -> Result<Judgment> {
    let cleaned = strip_code_fence(text);
    let data: Value = serde_json::from_str(cleaned)
        .map_err(|e| Error::InvalidResponse(format!("judgment is not valid JSON: {}", e)))?;

    let is_relevant = data
        .get("is_relevant")
        .and_then(Value::as_bool)
        .ok_or_else(|| Error::InvalidResponse("missing required field: is_relevant".to_string()))?;
    let confidence = data
        .get("confidence_score")
        .and_then(Value::as_f64)
        .ok_or_else(|| {
            Error::InvalidResponse("missing required field: confidence_score".to_string())
        })?;
    let reasoning = data
        .get("reasoning")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::InvalidResponse("missing required field: reasoning".to_string()))?;
    let action = data
        .get("suggested_action")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            Error::InvalidResponse("missing required field: suggested_action".to_string())
        })?;

    let key_points = data
        .get("key_points")
        .and_then(Value::as_array)
        .map(|points| {
            points
                .iter()
                .filter_map(|p| p.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();

    Ok(Judgment {
        is_relevant,
        confidence: normalize_confidence(confidence),
        reasoning: reasoning.to_string(),
        key_points,
        sentiment: data
            .get("sentiment")
            .and_then(Value::as_str)
            .map(str::to_string),
        urgency: data
            .get("urgency")
            .and_then(Value::as_str)
            .map(str::to_string),
        suggested_action: SuggestedAction::parse_or_ignore(action),
    })
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    let rest = rest.strip_suffix("```").unwrap_or(rest);
    rest.trim()
}
