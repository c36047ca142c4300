// Vision-language API client for caption invocations
//
// Speaks the messages-style invocation protocol: one request per
// model id, base64 PNG plus the story prompt, structured JSON back.

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine};
use reqwest::StatusCode;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::core::errors::BackendError;
use crate::core::types::{BackendReply, CaptionRequest};

/// One call to one candidate backend. Implementations map their wire
/// protocol onto the `BackendReply` tags; the fallback loop never
/// inspects anything else.
#[async_trait]
pub trait CaptionBackend: Send + Sync {
    async fn send(
        &self,
        model: &str,
        request: &CaptionRequest,
    ) -> Result<BackendReply, BackendError>;
}

/// HTTP client for a hosted model-invocation API
/// (`POST {base}/model/{model_id}/invoke`).
pub struct VisionApiClient {
    api_url: String,
    http_client: reqwest::Client,
}

impl VisionApiClient {
    pub fn new(api_url: &str, timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(5)
            .pool_idle_timeout(Duration::from_secs(90))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            http_client,
        })
    }

    fn invoke_url(&self, model: &str) -> String {
        format!("{}/model/{}/invoke", self.api_url, model)
    }

    fn build_body(request: &CaptionRequest) -> serde_json::Value {
        let base64_image = general_purpose::STANDARD.encode(&request.image_png);
        serde_json::json!({
            "anthropic_version": "",
            "max_tokens": request.max_tokens,
            "messages": [
                {
                    "role": "user",
                    "content": [
                        {
                            "type": "image",
                            "source": {
                                "type": "base64",
                                "media_type": "image/png",
                                "data": base64_image
                            }
                        },
                        {
                            "type": "text",
                            "text": request.prompt
                        }
                    ]
                },
                {
                    "role": "assistant",
                    "content": [{"type": "text", "text": "<JSON>"}]
                }
            ]
        })
    }
}

#[async_trait]
impl CaptionBackend for VisionApiClient {
    #[instrument(skip(self, request), fields(model = model, image_bytes = request.image_png.len()))]
    async fn send(
        &self,
        model: &str,
        request: &CaptionRequest,
    ) -> Result<BackendReply, BackendError> {
        let url = self.invoke_url(model);
        let body = Self::build_body(request);

        debug!("Invoking caption model {}", model);

        let response = self.http_client.post(&url).json(&body).send().await?;
        let status = response.status();

        // Quota/throttling is the only soft signal; everything else is
        // either success or a hard backend failure.
        if status == StatusCode::TOO_MANY_REQUESTS {
            debug!("Model {} over quota", model);
            return Ok(BackendReply::QuotaExceeded);
        }

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Ok(BackendReply::Failed {
                status: status.as_u16(),
                message,
            });
        }

        let envelope: serde_json::Value = response.json().await?;
        Ok(BackendReply::Ok { body: envelope })
    }
}
