/// AI gateway
///
/// Builds prompts, calls the configured chat-completion backend and turns
/// the model output into JSON, degrading to fixed fallbacks when the output
/// cannot be parsed. Transport and upstream errors are returned to the caller.

pub mod backend;
pub mod parse;
pub mod prompts;

pub use backend::{ChatBackend, ChatMessage, ChatRequest, ContentPart, ImageUrl, OpenAiCompatibleBackend};

use crate::{
    db::models::PairType,
    error::{AppError, AppResult},
    metrics,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// Sentiment analysis result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sentiment {
    #[serde(default = "neutral")]
    pub sentiment: String,
    #[serde(default = "midpoint")]
    pub score: f64,
    #[serde(default)]
    pub emotions: Vec<String>,
}

fn neutral() -> String {
    "neutral".to_string()
}

fn midpoint() -> f64 {
    5.0
}

impl Default for Sentiment {
    fn default() -> Self {
        Self {
            sentiment: neutral(),
            score: midpoint(),
            emotions: Vec::new(),
        }
    }
}

/// Gateway over a chat backend and the two configured models
#[derive(Clone)]
pub struct AiGateway {
    backend: Arc<dyn ChatBackend>,
    text_model: String,
    multimodal_model: String,
    upload_dir: PathBuf,
}

impl AiGateway {
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        text_model: impl Into<String>,
        multimodal_model: impl Into<String>,
        upload_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            backend,
            text_model: text_model.into(),
            multimodal_model: multimodal_model.into(),
            upload_dir: upload_dir.into(),
        }
    }

    async fn call(
        &self,
        kind: &'static str,
        model: &str,
        messages: Vec<ChatMessage>,
        temperature: f32,
    ) -> AppResult<String> {
        let started = Instant::now();
        let result = self
            .backend
            .complete(ChatRequest {
                model: model.to_string(),
                messages,
                temperature,
            })
            .await;

        metrics::record_ai_request(kind, result.is_ok(), started.elapsed().as_secs_f64());
        if let Err(e) = &result {
            tracing::warn!("AI {} call on {} failed: {}", kind, model, e);
        }
        result
    }

    async fn report(
        &self,
        kind: &'static str,
        model: &str,
        prompt: String,
        temperature: f32,
        fallback: Value,
    ) -> AppResult<Value> {
        let messages = vec![
            ChatMessage::system(prompts::SYSTEM_PROMPT),
            ChatMessage::user(prompt),
        ];
        let output = self.call(kind, model, messages, temperature).await?;
        Ok(parse::parse_json_or(&output, fallback))
    }

    /// Score the emotional tone of a check-in
    pub async fn analyze_sentiment(&self, text: &str) -> AppResult<Sentiment> {
        let messages = vec![
            ChatMessage::system(prompts::SENTIMENT_PROMPT),
            ChatMessage::user(text),
        ];
        let output = self.call("sentiment", &self.text_model, messages, 0.3).await?;
        let value = parse::parse_json_or(&output, prompts::sentiment_fallback());

        let mut sentiment: Sentiment = serde_json::from_value(value).unwrap_or_default();
        sentiment.score = sentiment.score.clamp(0.0, 10.0);
        Ok(sentiment)
    }

    /// Joint report for a day both members checked in
    pub async fn daily_report(
        &self,
        pair_type: PairType,
        content_a: &str,
        content_b: &str,
    ) -> AppResult<Value> {
        let prompt = prompts::fill(
            prompts::DAILY_TEMPLATE,
            &[
                ("pair_type", pair_type.describe()),
                ("content_a", content_a),
                ("content_b", content_b),
            ],
        );
        self.report("daily", &self.text_model, prompt, 0.6, prompts::daily_fallback())
            .await
    }

    /// Personal journal when only one member checked in
    pub async fn solo_report(&self, pair_type: PairType, content: &str) -> AppResult<Value> {
        let prompt = prompts::fill(
            prompts::SOLO_TEMPLATE,
            &[("pair_type", pair_type.describe()), ("content", content)],
        );
        self.report("solo", &self.text_model, prompt, 0.6, prompts::solo_fallback())
            .await
    }

    /// Weekly report from the contents of completed daily reports
    pub async fn weekly_report(&self, pair_type: PairType, daily: &[Value]) -> AppResult<Value> {
        let summaries = prompts::daily_summaries(daily);
        let prompt = prompts::fill(
            prompts::WEEKLY_TEMPLATE,
            &[("pair_type", pair_type.describe()), ("daily_summaries", summaries.as_str())],
        );
        self.report("weekly", &self.multimodal_model, prompt, 0.5, prompts::weekly_fallback())
            .await
    }

    /// Monthly report from the contents of completed weekly reports
    pub async fn monthly_report(&self, pair_type: PairType, weekly: &[Value]) -> AppResult<Value> {
        let summaries = prompts::weekly_summaries(weekly);
        let prompt = prompts::fill(
            prompts::MONTHLY_TEMPLATE,
            &[("pair_type", pair_type.describe()), ("weekly_summaries", summaries.as_str())],
        );
        self.report("monthly", &self.multimodal_model, prompt, 0.5, prompts::monthly_fallback())
            .await
    }

    /// Analyze an uploaded image; never fails
    pub async fn analyze_image(&self, image_url: &str, context: &str) -> Value {
        match self.try_analyze_image(image_url, context).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Image analysis for {} failed: {}", image_url, e);
                json!({"mood": "unknown", "social_signal": e.to_string(), "score": 5})
            }
        }
    }

    async fn try_analyze_image(&self, image_url: &str, context: &str) -> AppResult<Value> {
        let path = self.resolve_upload(image_url)?;
        let bytes = tokio::fs::read(&path).await?;
        let data_url = format!("data:{};base64,{}", image_mime(&path), STANDARD.encode(bytes));

        let messages = vec![
            ChatMessage::system(prompts::IMAGE_SYSTEM_PROMPT),
            ChatMessage::user_parts(vec![
                ContentPart::Text {
                    text: prompts::image_prompt(context),
                },
                ContentPart::ImageUrl {
                    image_url: ImageUrl { url: data_url },
                },
            ]),
        ];

        let output = self.call("image", &self.multimodal_model, messages, 0.4).await?;
        Ok(parse::parse_json_or(&output, prompts::image_fallback()))
    }

    /// Map an `/uploads/...` URL onto the upload directory
    fn resolve_upload(&self, url: &str) -> AppResult<PathBuf> {
        let relative = url
            .strip_prefix("/uploads/")
            .ok_or_else(|| AppError::Validation(format!("not an uploaded file: {}", url)))?;

        let relative = Path::new(relative);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(AppError::Validation(format!("invalid upload path: {}", url)));
        }

        Ok(self.upload_dir.join(relative))
    }
}

/// MIME type by file extension, JPEG when unknown
fn image_mime(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "image/jpeg",
    }
}
