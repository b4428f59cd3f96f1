use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::Client;
use serde_json::{json, Value};

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";

/// One prompt in, the model's raw text out.
pub trait PlanGenerator: Send + Sync {
    fn name(&self) -> &'static str;
    async fn generate(&self, prompt: &str) -> Result<String>;
}

#[derive(Clone)]
pub struct GeminiGenerator {
    http: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiGenerator {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(6))
            .timeout(Duration::from_secs(60))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            http,
            api_key: api_key.into(),
            model: model.into(),
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

impl PlanGenerator for GeminiGenerator {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let payload = json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });

        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", self.api_key.as_str())
            .json(&payload)
            .send()
            .await
            .context("Gemini request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Gemini non-success status {}: {}", status.as_u16(), body);
        }

        let body: Value = response.json().await.context("Gemini parse failed")?;
        extract_candidate_text(&body)
    }
}

/// Text of the first candidate's first part. An `error` object in the body
/// is an upstream failure even under a 2xx status.
pub fn extract_candidate_text(body: &Value) -> Result<String> {
    if let Some(error) = body.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("Gemini error");
        bail!("Gemini error: {}", message);
    }

    body.pointer("/candidates/0/content/parts/0/text")
        .and_then(Value::as_str)
        .filter(|text| !text.trim().is_empty())
        .map(ToString::to_string)
        .context("Gemini output text missing")
}

/// Answers every prompt with the same text. Used for offline runs and tests.
#[derive(Debug, Clone)]
pub struct FixedGenerator {
    response: String,
}

impl FixedGenerator {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
        }
    }
}

impl PlanGenerator for FixedGenerator {
    fn name(&self) -> &'static str {
        "fixed"
    }

    async fn generate(&self, _prompt: &str) -> Result<String> {
        Ok(self.response.clone())
    }
}

#[derive(Clone)]
pub enum Generator {
    Gemini(GeminiGenerator),
    Fixed(FixedGenerator),
}

impl PlanGenerator for Generator {
    fn name(&self) -> &'static str {
        match self {
            Generator::Gemini(generator) => generator.name(),
            Generator::Fixed(generator) => generator.name(),
        }
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        match self {
            Generator::Gemini(generator) => generator.generate(prompt).await,
            Generator::Fixed(generator) => generator.generate(prompt).await,
        }
    }
}
