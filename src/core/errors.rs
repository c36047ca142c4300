// Custom error types for better error handling and debugging
//
// Using thiserror for ergonomic error definitions with:
// - Context preservation
// - Type-safe error matching
// - Automatic Display/Error trait implementations
// - Source error chaining

use std::path::PathBuf;
use thiserror::Error;

/// Object store errors
///
/// The store is an external collaborator; these are the only failure
/// kinds the rest of the crate distinguishes.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },

    #[error("access denied for {bucket}/{key}")]
    AccessDenied { bucket: String, key: String },

    #[error("store transport failure: {0}")]
    Transport(String),
}

/// Staging errors (step 1 of the swap pipeline)
#[derive(Debug, Error)]
pub enum StagingError {
    #[error("failed to fetch input: {0}")]
    Fetch(#[from] StoreError),

    #[error("staged input is not a decodable image: {0}")]
    InvalidImage(#[from] image::ImageError),

    #[error("failed to write staged input {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to allocate working area under {path}: {source}")]
    Workspace {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Transform errors (step 2 of the swap pipeline)
#[derive(Debug, Error)]
pub enum TransformError {
    #[error("image processing failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("transform I/O failed on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("swap model failed: {0}")]
    Model(String),

    #[error("transform task join failed: {0}")]
    TaskJoin(String),
}

/// Publish errors (step 3 of the swap pipeline)
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("failed to read produced artifact {path}: {source}")]
    ReadArtifact {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to upload artifact: {0}")]
    Upload(#[from] StoreError),
}

/// Swap pipeline errors, tagged by the stage that failed
///
/// Cleanup never produces a variant here: release failures are logged
/// and must not mask the pipeline outcome.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("staging failed for job {job_id}: {source}")]
    Staging {
        job_id: String,
        #[source]
        source: StagingError,
    },

    #[error("transform failed for job {job_id}: {source}")]
    Transform {
        job_id: String,
        #[source]
        source: TransformError,
    },

    #[error("publish failed for job {job_id}: {source}")]
    Publish {
        job_id: String,
        #[source]
        source: PublishError,
    },
}

/// Transport-level failure from a caption backend client
#[derive(Debug, Error)]
#[error("caption backend transport failure: {0}")]
pub struct BackendError(pub String);

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        BackendError(e.to_string())
    }
}

/// Caption invocation errors
///
/// `Exhausted` is the only outcome produced by soft failures; every
/// other variant is fatal and stops the candidate walk immediately.
#[derive(Debug, Error)]
pub enum CaptionError {
    #[error("all {candidates} caption models exhausted their quota")]
    Exhausted { candidates: usize },

    #[error("no caption models configured")]
    NoCandidates,

    #[error("model {model} returned a malformed response: {reason}")]
    MalformedResponse { model: String, reason: String },

    #[error("model {model} reported an error (status {status}): {message}")]
    BackendFailed {
        model: String,
        status: u16,
        message: String,
    },

    #[error("request to model {model} failed: {source}")]
    Transport {
        model: String,
        #[source]
        source: BackendError,
    },
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid server config: {0}")]
    InvalidServerConfig(String),

    #[error("invalid store config: {0}")]
    InvalidStoreConfig(String),

    #[error("invalid caption config: {0}")]
    InvalidCaptionConfig(String),

    #[error("invalid workspace root: {0}")]
    InvalidWorkspaceRoot(String),

    #[error("environment variable parsing failed: {0}")]
    EnvVarError(String),
}

// Convenience type aliases for Results
pub type StoreResult<T> = Result<T, StoreError>;
pub type PipelineResult<T> = Result<T, PipelineError>;
pub type CaptionResult<T> = Result<T, CaptionError>;
pub type ConfigResult<T> = Result<T, ConfigError>;
