// Library exports for the face-swap gallery workflow

// Core modules
pub mod core;
pub mod middleware;
pub mod pipeline;
pub mod services;
pub mod utils;

// Re-export commonly used types and functions
pub use crate::core::{
    config::Config,
    errors::{
        CaptionError, ConfigError, PipelineError, PublishError, StagingError, StoreError,
        TransformError,
    },
    types::{ArtifactRef, CaptionOutcome, CaptionResponse, Story, SwapJob, SwapResponse},
};

pub use crate::middleware::{CircuitBreaker, CircuitBreakerConfig, CircuitState};

pub use crate::pipeline::{SwapPipeline, Workspace};

pub use crate::services::{
    BlendSwap, CaptionBackend, Captioner, ContentStore, HttpStore, VisionApiClient,
};

pub use crate::utils::Metrics;
