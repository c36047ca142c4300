pub mod config;
pub mod errors;
pub mod types;

// Re-export commonly used items for convenience
pub use config::Config;
pub use errors::{
    BackendError, CaptionError, ConfigError, PipelineError, PublishError, StagingError,
    StoreError, TransformError,
};
pub use types::{
    ArtifactRef, BackendReply, CaptionOutcome, CaptionRequest, CaptionResponse, Story, SwapJob,
    SwapResponse,
};
