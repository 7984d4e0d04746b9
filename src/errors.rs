use axum::Json;
use axum::extract::multipart::MultipartError;
use axum::http::{HeaderValue, StatusCode, header::RETRY_AFTER};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

use crate::core::gemini::ProviderError;
use crate::core::ingest::ValidationError;

#[derive(Error, Debug)]
pub enum AppError {
    /// Upload failed validation; nothing was sent to the provider
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Session quota exhausted
    #[error("Rate limit reached. Please wait {} seconds before next analysis.", retry_after_secs(.retry_after))]
    RateLimited { retry_after: Duration },

    /// The provider call was attempted and failed
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Multipart body could not be read
    #[error("{}", .0.body_text())]
    Upload(#[from] MultipartError),
}

#[derive(Serialize, Debug)]
pub struct ErrorBody {
    pub error: String,
    pub code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
}

fn retry_after_secs(d: &Duration) -> u64 {
    (d.as_secs_f64().ceil() as u64).max(1)
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(ValidationError::TooLarge { .. }) => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Provider(e) if e.is_timeout() => StatusCode::GATEWAY_TIMEOUT,
            AppError::Provider(_) => StatusCode::BAD_GATEWAY,
            AppError::Upload(e) => e.status(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation_error",
            AppError::RateLimited { .. } => "rate_limited",
            AppError::Provider(ProviderError::QuotaExceeded(_)) => "provider_quota_exceeded",
            AppError::Provider(ProviderError::Blocked { .. }) => "provider_blocked",
            AppError::Provider(_) => "provider_error",
            AppError::Upload(_) => "upload_error",
        }
    }

    /// Message shown to the user. Provider failures are summarised rather
    /// than echoing upstream bodies.
    pub fn user_message(&self) -> String {
        match self {
            AppError::Provider(ProviderError::QuotaExceeded(_)) => {
                "API rate limit exceeded!".to_string()
            }
            AppError::Provider(ProviderError::Blocked { .. }) => {
                "Image was flagged by safety filters.".to_string()
            }
            AppError::Provider(ProviderError::Auth(_)) => {
                "The AI provider rejected the configured API key.".to_string()
            }
            AppError::Provider(ProviderError::Empty) => {
                "No analysis generated. Please try again.".to_string()
            }
            AppError::Provider(e) if e.is_timeout() => {
                "Analysis failed: the AI provider did not respond in time.".to_string()
            }
            AppError::Provider(ProviderError::Status { status, .. }) => {
                format!("Analysis failed: provider returned {}", status)
            }
            AppError::Provider(e) => format!("Analysis failed: {}", e),
            other => other.to_string(),
        }
    }

    pub fn hint(&self) -> Option<&'static str> {
        match self {
            AppError::Provider(ProviderError::QuotaExceeded(_)) => {
                Some("Please wait 1-2 minutes before trying again.")
            }
            AppError::Provider(ProviderError::Blocked { .. }) => {
                Some("Please try a different medical image.")
            }
            AppError::Provider(ProviderError::Auth(_)) => {
                Some("Check the GEMINI_API_KEY the server was started with.")
            }
            AppError::Provider(_) => {
                Some("Please try again or contact support if the issue persists.")
            }
            AppError::Validation(_) => {
                Some("Supported formats: PNG, JPG, JPEG • Maximum size: 5MB")
            }
            AppError::RateLimited { .. } | AppError::Upload(_) => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::Provider(e) => tracing::error!("provider call failed: {}", e),
            AppError::RateLimited { retry_after } => {
                tracing::warn!("analysis rejected by rate limit, retry in {:?}", retry_after)
            }
            other => tracing::warn!("upload rejected: {}", other),
        }

        let retry_after = match &self {
            AppError::RateLimited { retry_after } => Some(retry_after_secs(retry_after)),
            _ => None,
        };

        let body = ErrorBody {
            error: self.user_message(),
            code: self.code(),
            hint: self.hint(),
            retry_after_secs: retry_after,
        };

        let mut response = (self.status_code(), Json(body)).into_response();
        if let Some(secs) = retry_after {
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(RETRY_AFTER, value);
            }
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::gemini::{GeminiClient, GeminiConfig, ReportProvider};
    use crate::core::ingest::ingest;
    use crate::core::ingest::tests::encoded;
    use crate::utils::constants::MAX_IMAGE_BYTES;
    use crate::utils::urls::to_url;
    use image::ImageFormat;
    use reqwest::StatusCode as UpstreamStatus;
    use serde_json::json;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::from(ValidationError::TooLarge { size: 10, limit: 5 }).status_code(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            AppError::from(ValidationError::Empty).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::RateLimited {
                retry_after: Duration::from_secs(3)
            }
            .status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            AppError::from(ProviderError::Empty).status_code(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_user_messages() {
        let quota = AppError::from(ProviderError::QuotaExceeded("quota".to_string()));
        assert_eq!(quota.user_message(), "API rate limit exceeded!");
        assert_eq!(quota.code(), "provider_quota_exceeded");
        assert!(quota.hint().unwrap().contains("wait"));

        let upstream = AppError::from(ProviderError::Status {
            status: UpstreamStatus::INTERNAL_SERVER_ERROR,
            body: "stack trace".to_string(),
        });
        assert!(!upstream.user_message().contains("stack trace"));

        let limited = AppError::RateLimited {
            retry_after: Duration::from_millis(41_200),
        };
        assert_eq!(
            limited.user_message(),
            "Rate limit reached. Please wait 42 seconds before next analysis."
        );
    }

    #[test]
    fn test_rate_limited_response_has_retry_after() {
        let response = AppError::RateLimited {
            retry_after: Duration::from_secs(30),
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[RETRY_AFTER], "30");
    }

    #[tokio::test]
    async fn test_slow_provider_is_gateway_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({
                        "candidates": [{"content": {"parts": [{"text": "too late"}]}}]
                    }))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let client = GeminiClient::new(GeminiConfig {
            api_key: "test-key".to_string(),
            model: "gemini-test".to_string(),
            base_url: to_url(&server.uri()).unwrap(),
            timeout: Duration::from_millis(200),
        })
        .unwrap();
        let image = ingest("a.png", encoded(ImageFormat::Png, 4, 4), MAX_IMAGE_BYTES).unwrap();

        let err = client.generate(&image).await.unwrap_err();
        assert!(err.is_timeout());

        let err = AppError::from(err);
        assert_eq!(err.status_code(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(err.code(), "provider_error");
        assert!(err.user_message().contains("did not respond in time"));
        assert_eq!(err.into_response().status(), StatusCode::GATEWAY_TIMEOUT);
    }
}
