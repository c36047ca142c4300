// Domain and wire types for the swap/caption workflow

use serde::{Deserialize, Serialize};

/// One staged swap request.
///
/// `job_id` is a caller-supplied opaque token; every working-area path
/// for this job is derived from it, so concurrent jobs with distinct
/// ids never collide on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapJob {
    #[serde(alias = "uuid")]
    pub job_id: String,
    pub bucket: String,
    /// Object key of the face source image
    pub source: String,
    /// Object key of the target image receiving the face
    pub target: String,
    /// Object key the swapped result is published under
    pub output: String,
}

/// A location in the external content store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRef {
    pub bucket: String,
    pub key: String,
}

/// Response body for a completed swap
#[derive(Debug, Clone, Serialize)]
pub struct SwapResponse {
    pub job_id: String,
    pub bucket: String,
    pub output: String,
}

/// The structured caption payload: a short fictional past-life story
/// in three locales.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Story {
    pub ko: String,
    pub en: String,
    pub ja: String,
}

/// Successful caption invocation: the story plus the model that
/// produced it. Callers rely on the attribution for observability and
/// tests assert it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptionOutcome {
    pub story: Story,
    pub model: String,
}

/// Response body for a completed caption request
#[derive(Debug, Clone, Serialize)]
pub struct CaptionResponse {
    pub job_id: String,
    pub key: String,
    pub story: Story,
    pub model: String,
}

/// Request payload handed to a caption backend
#[derive(Debug, Clone)]
pub struct CaptionRequest {
    pub image_png: Vec<u8>,
    pub prompt: String,
    pub max_tokens: u32,
}

/// Tagged outcome of one backend call.
///
/// The fallback loop switches on this tag only, never on error
/// message strings. `QuotaExceeded` is the sole soft failure.
#[derive(Debug, Clone)]
pub enum BackendReply {
    /// 2xx response; `body` is the raw response envelope
    Ok { body: serde_json::Value },
    /// Recognized transient capacity/quota signal
    QuotaExceeded,
    /// Any other backend-reported error
    Failed { status: u16, message: String },
}
