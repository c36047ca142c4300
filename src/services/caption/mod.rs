// Ordered fallback captioning
//
// Walks the configured candidate models strictly in priority order.
// Quota exhaustion on one candidate advances to the next; any other
// failure aborts the walk. The first parsed story wins.

pub mod client;

pub use client::{CaptionBackend, VisionApiClient};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::core::errors::{CaptionError, CaptionResult};
use crate::core::types::{BackendReply, CaptionOutcome, CaptionRequest, Story};
use crate::middleware::circuit_breaker::CircuitBreaker;
use crate::utils::Metrics;

/// Prompt contract for the past-life story caption. The model must
/// answer with nothing but a JSON object carrying the three locales.
const STORY_PROMPT: &str = "\
Analyze the person and objects in the image and invent a fictional past-life story. \
1. Identifying any real individual is forbidden; the protagonist must be an entirely fictional person. \
2. The story must address its subject directly as 'you'. \
3. Keep the story to at most 150 characters per locale. \
4. Output only the story as JSON with Korean, English and Japanese versions and nothing else. \
Example: {\"ko\": \"...\", \"en\": \"...\", \"ja\": \"...\"}";

/// Ordered fallback invoker over the configured caption models.
///
/// Request-scoped and stateless across invocations apart from the
/// per-candidate circuit breakers, which only ever convert a call into
/// a soft skip.
pub struct Captioner {
    backend: Arc<dyn CaptionBackend>,
    models: Vec<String>,
    max_tokens: u32,
    breakers: HashMap<String, CircuitBreaker>,
    metrics: Option<Metrics>,
}

impl Captioner {
    pub fn new(
        backend: Arc<dyn CaptionBackend>,
        models: Vec<String>,
        max_tokens: u32,
        metrics: Option<Metrics>,
    ) -> Self {
        let breakers = models
            .iter()
            .map(|m| (m.clone(), CircuitBreaker::new()))
            .collect();

        Self {
            backend,
            models,
            max_tokens,
            breakers,
            metrics,
        }
    }

    /// Candidate model ids in priority order
    pub fn models(&self) -> &[String] {
        &self.models
    }

    /// Invoke the candidates in order and return the first story.
    ///
    /// Exactly one backend call is made per candidate, never in
    /// parallel, and none beyond the first success.
    #[instrument(skip(self, image_png), fields(image_bytes = image_png.len(), candidates = self.models.len()))]
    pub async fn caption(&self, image_png: Vec<u8>) -> CaptionResult<CaptionOutcome> {
        // "No candidates configured" is a misconfiguration, not a
        // capacity exhaustion event.
        if self.models.is_empty() {
            return Err(CaptionError::NoCandidates);
        }

        let request = CaptionRequest {
            image_png,
            prompt: STORY_PROMPT.to_string(),
            max_tokens: self.max_tokens,
        };

        for model in &self.models {
            let breaker = self.breakers.get(model);

            // An open breaker is the local analogue of a quota signal:
            // skip this candidate, keep walking.
            if let Some(b) = breaker {
                if !b.allow_request() {
                    warn!("Caption model {} breaker is open, skipping", model);
                    if let Some(ref m) = self.metrics {
                        m.record_caption_fallback();
                    }
                    continue;
                }
            }

            debug!("Invoking caption model {}", model);
            let start = Instant::now();
            let reply = self.backend.send(model, &request).await;
            let duration = start.elapsed();

            match reply {
                Err(e) => {
                    if let Some(b) = breaker {
                        b.record_failure();
                    }
                    if let Some(ref m) = self.metrics {
                        m.record_caption_call(model, false, duration);
                    }
                    return Err(CaptionError::Transport {
                        model: model.clone(),
                        source: e,
                    });
                }
                Ok(BackendReply::QuotaExceeded) => {
                    if let Some(b) = breaker {
                        b.record_failure();
                    }
                    if let Some(ref m) = self.metrics {
                        m.record_caption_call(model, false, duration);
                        m.record_caption_fallback();
                    }
                    warn!("Caption model {} over quota, trying next candidate", model);
                    continue;
                }
                Ok(BackendReply::Failed { status, message }) => {
                    if let Some(b) = breaker {
                        b.record_failure();
                    }
                    if let Some(ref m) = self.metrics {
                        m.record_caption_call(model, false, duration);
                    }
                    return Err(CaptionError::BackendFailed {
                        model: model.clone(),
                        status,
                        message,
                    });
                }
                Ok(BackendReply::Ok { body }) => {
                    if let Some(b) = breaker {
                        b.record_success();
                    }
                    if let Some(ref m) = self.metrics {
                        m.record_caption_call(model, true, duration);
                    }

                    // A malformed success is a broken backend
                    // contract: fatal, never a fallback.
                    let story = extract_story(&body).map_err(|reason| {
                        CaptionError::MalformedResponse {
                            model: model.clone(),
                            reason,
                        }
                    })?;

                    info!("Caption produced by model {}", model);
                    return Ok(CaptionOutcome {
                        story,
                        model: model.clone(),
                    });
                }
            }
        }

        if let Some(ref m) = self.metrics {
            m.record_caption_exhausted();
        }
        Err(CaptionError::Exhausted {
            candidates: self.models.len(),
        })
    }
}

/// Pull the story out of a messages-style response envelope: the first
/// content block's text, parsed as the three-locale JSON object.
fn extract_story(body: &serde_json::Value) -> Result<Story, String> {
    let text = body["content"][0]["text"]
        .as_str()
        .ok_or_else(|| "missing content text".to_string())?;

    serde_json::from_str::<Story>(text.trim())
        .map_err(|e| format!("story payload is not valid JSON: {}", e))
}
