//! Client for Gemini's `generateContent` endpoint.
//!
//! One request per analysis: the fixed medical prompt plus the image as
//! inline base64 data. No retries and no fallback model; failures are
//! classified into [`ProviderError`] and handed back to the caller.

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::core::ingest::UploadedImage;
use crate::utils::constants::{GEMINI_MAX_OUTPUT_TOKENS, GEMINI_TEMPERATURE};
use crate::utils::urls::generate_content_url;

pub const MEDICAL_PROMPT: &str = r#"
You are an expert medical image analysis assistant. Please analyze this medical image and provide a structured report with the following sections:

## IMAGE TYPE & QUALITY
- Identify the type of medical imaging (X-ray, CT, MRI, ultrasound, etc.)
- Comment on image quality and visibility

## ANATOMICAL STRUCTURES
- Describe the main anatomical structures visible
- Note their appearance and positioning

## OBSERVATIONS
- List any notable findings, abnormalities, or areas of concern
- Describe any variations from normal appearance
- Comment on symmetry, density, or other relevant features

## CLINICAL RECOMMENDATIONS
- Suggest potential next steps or additional imaging if needed
- Recommend consultation with specific specialists if appropriate

## IMPORTANT LIMITATIONS
- Note any limitations in the analysis due to image quality or viewing angle
- Mention areas that require clinical correlation

Please provide me an output response with these 4 headings Detailed Analysis, Findings Report, Recommendations and Next Steps, Treatment suggestions
"#;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("request to provider failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("provider rejected the API key ({0})")]
    Auth(StatusCode),

    #[error("provider quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("image was blocked by provider safety filters ({reason})")]
    Blocked { reason: String },

    #[error("provider returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("malformed provider response: {0}")]
    Malformed(String),

    #[error("provider returned no analysis")]
    Empty,
}

impl ProviderError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ProviderError::Transport(e) if e.is_timeout())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProviderReply {
    pub text: String,
    pub model: String,
}

#[async_trait]
pub trait ReportProvider: Send + Sync {
    async fn generate(&self, image: &UploadedImage) -> Result<ProviderReply, ProviderError>;

    fn model(&self) -> &str;
}

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: Url,
    pub timeout: Duration,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize, Debug)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize, Debug)]
#[serde(untagged)]
enum Part<'a> {
    Text { text: &'a str },
    InlineData { inline_data: InlineData<'a> },
}

#[derive(Serialize, Debug)]
struct InlineData<'a> {
    mime_type: &'a str,
    data: String,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize, Debug)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

pub struct GeminiClient {
    http_client: Client,
    config: GeminiConfig,
    endpoint: Url,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self, anyhow::Error> {
        let endpoint = generate_content_url(&config.base_url, &config.model)?;
        let http_client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            http_client,
            config,
            endpoint,
        })
    }

    fn request_body<'a>(&self, image: &'a UploadedImage) -> GenerateContentRequest<'a> {
        GenerateContentRequest {
            contents: vec![Content {
                parts: vec![
                    Part::Text {
                        text: MEDICAL_PROMPT,
                    },
                    Part::InlineData {
                        inline_data: InlineData {
                            mime_type: image.mime_type,
                            data: STANDARD.encode(&image.data),
                        },
                    },
                ],
            }],
            generation_config: GenerationConfig {
                temperature: GEMINI_TEMPERATURE,
                max_output_tokens: GEMINI_MAX_OUTPUT_TOKENS,
            },
        }
    }
}

fn classify_failure(status: StatusCode, body: String) -> ProviderError {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return ProviderError::Auth(status);
    }
    if status == StatusCode::TOO_MANY_REQUESTS || body.to_lowercase().contains("quota") {
        return ProviderError::QuotaExceeded(body);
    }
    if body.to_lowercase().contains("safety") {
        return ProviderError::Blocked {
            reason: "SAFETY".to_string(),
        };
    }
    ProviderError::Status { status, body }
}

fn extract_text(response: GenerateContentResponse) -> Result<String, ProviderError> {
    if let Some(reason) = response
        .prompt_feedback
        .and_then(|feedback| feedback.block_reason)
    {
        return Err(ProviderError::Blocked { reason });
    }

    let candidate = response.candidates.into_iter().next().ok_or(ProviderError::Empty)?;

    let text: String = candidate
        .content
        .map(|c| {
            c.parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        return match candidate.finish_reason.as_deref() {
            Some(reason @ ("SAFETY" | "PROHIBITED_CONTENT" | "BLOCKLIST")) => {
                Err(ProviderError::Blocked {
                    reason: reason.to_string(),
                })
            }
            _ => Err(ProviderError::Empty),
        };
    }

    Ok(text)
}

#[async_trait]
impl ReportProvider for GeminiClient {
    async fn generate(&self, image: &UploadedImage) -> Result<ProviderReply, ProviderError> {
        let response = self
            .http_client
            .post(self.endpoint.clone())
            .header("x-goog-api-key", &self.config.api_key)
            .json(&self.request_body(image))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            tracing::debug!("provider error body: {}", body);
            return Err(classify_failure(status, body));
        }

        let parsed: GenerateContentResponse =
            serde_json::from_str(&body).map_err(|e| ProviderError::Malformed(e.to_string()))?;

        Ok(ProviderReply {
            text: extract_text(parsed)?,
            model: self.config.model.clone(),
        })
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}
