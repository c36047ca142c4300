// Main entry point for the face-swap gallery workflow

use gallery_workflow::{
    core::{errors::{CaptionError, PipelineError, StagingError, StoreError}, Config, types::*},
    pipeline::{SwapPipeline, Workspace},
    services::{BlendSwap, Captioner, ContentStore, HttpStore, VisionApiClient},
    utils::Metrics,
};

use anyhow::Result;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

/// Application state shared across handlers
#[derive(Clone)]
struct AppState {
    config: Arc<Config>,
    pipeline: Arc<SwapPipeline>,
    captioner: Arc<Captioner>,
    store: Arc<dyn ContentStore>,
    metrics: Metrics,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Arc::new(Config::new().expect("Failed to load configuration"));

    // Initialize logging
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::new(format!(
        "gallery_workflow={}",
        match config.log_level() {
            tracing::Level::TRACE => "trace",
            tracing::Level::DEBUG => "debug",
            tracing::Level::INFO => "info",
            tracing::Level::WARN => "warn",
            tracing::Level::ERROR => "error",
        }
    ));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("=== FACE-SWAP GALLERY WORKFLOW ===");
    info!(
        "Config: store={} bucket={} workspace={} caption_models={}",
        config.store_base_url(),
        config.bucket(),
        config.workspace_root(),
        config.caption_models().len()
    );

    // Initialize metrics
    let metrics = Metrics::new();

    // Wire up collaborators
    let store: Arc<dyn ContentStore> = Arc::new(HttpStore::new(
        config.store_base_url(),
        Duration::from_secs(config.store.timeout_seconds),
    )?);
    let transform = Arc::new(BlendSwap::new());
    let workspace = Workspace::new(config.workspace_root());

    let pipeline = Arc::new(SwapPipeline::new(
        store.clone(),
        transform,
        workspace,
        Some(metrics.clone()),
    ));

    let caption_client = Arc::new(VisionApiClient::new(
        config.caption_api_url(),
        Duration::from_secs(config.caption.timeout_seconds),
    )?);
    let captioner = Arc::new(Captioner::new(
        caption_client,
        config.caption_models().to_vec(),
        config.caption_max_tokens(),
        Some(metrics.clone()),
    ));

    let state = AppState {
        config: config.clone(),
        pipeline,
        captioner,
        store,
        metrics,
    };

    // Setup CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Create router with monitoring endpoints
    let app = Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/metrics", get(metrics_endpoint))
        .route("/stats", get(stats_endpoint))
        .route("/swap", post(swap_images))
        .route("/caption/:job_id", get(caption_image))
        .with_state(state)
        .layer(cors);

    let addr = format!("{}:{}", config.server_host(), config.server_port());
    info!("{}", "=".repeat(70));
    info!("Server starting on http://{}", addr);
    info!("{}", "-".repeat(70));
    info!("Endpoints:");
    info!("  GET  /                  - Root endpoint");
    info!("  GET  /health            - Health check");
    info!("  GET  /metrics           - Prometheus metrics");
    info!("  GET  /stats             - Detailed statistics");
    info!("  POST /swap              - Run a staged face-swap job");
    info!("  GET  /caption/:job_id   - Caption a stored image");
    info!("{}", "=".repeat(70));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn root() -> &'static str {
    "Face-Swap Gallery Workflow"
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Prometheus metrics endpoint
async fn metrics_endpoint(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [("Content-Type", "text/plain; version=0.0.4")],
        state.metrics.to_prometheus(),
    )
}

/// Detailed statistics endpoint (JSON)
async fn stats_endpoint(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    let snapshot = state.metrics.snapshot();
    serde_json::to_value(snapshot).map(Json).map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to serialize metrics: {}", e),
        )
    })
}

type ErrorResponse = (StatusCode, Json<serde_json::Value>);

fn error_body(kind: &str, message: String) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "kind": kind, "error": message }))
}

/// Map a pipeline failure to the narrowest external status. Messages
/// name caller-supplied object keys only, never working-area paths.
fn pipeline_error_response(e: &PipelineError) -> ErrorResponse {
    match e {
        PipelineError::Staging { source, .. } => match source {
            StagingError::Fetch(StoreError::NotFound { bucket, key }) => (
                StatusCode::NOT_FOUND,
                error_body("staging", format!("input object not found: {}/{}", bucket, key)),
            ),
            StagingError::Fetch(StoreError::AccessDenied { bucket, key }) => (
                StatusCode::FORBIDDEN,
                error_body("staging", format!("access denied to input object {}/{}", bucket, key)),
            ),
            StagingError::Fetch(StoreError::Transport(_)) => (
                StatusCode::BAD_GATEWAY,
                error_body("staging", "object store unavailable".to_string()),
            ),
            StagingError::InvalidImage(_) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                error_body("staging", "input is not a decodable image".to_string()),
            ),
            StagingError::Write { .. } | StagingError::Workspace { .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_body("staging", "failed to stage inputs".to_string()),
            ),
        },
        PipelineError::Transform { .. } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            error_body("transform", "face swap failed".to_string()),
        ),
        PipelineError::Publish { .. } => (
            StatusCode::BAD_GATEWAY,
            error_body("publish", "failed to publish output".to_string()),
        ),
    }
}

/// Map a caption failure to the narrowest external status. Raw backend
/// payloads stay in the server logs.
fn caption_error_response(e: &CaptionError) -> ErrorResponse {
    match e {
        CaptionError::Exhausted { candidates } => (
            StatusCode::SERVICE_UNAVAILABLE,
            error_body(
                "exhausted",
                format!("all {} caption models are over quota", candidates),
            ),
        ),
        CaptionError::NoCandidates => (
            StatusCode::INTERNAL_SERVER_ERROR,
            error_body("misconfigured", "no caption models configured".to_string()),
        ),
        CaptionError::MalformedResponse { model, .. } => (
            StatusCode::BAD_GATEWAY,
            error_body(
                "malformed",
                format!("caption model {} returned an invalid response", model),
            ),
        ),
        CaptionError::BackendFailed { model, .. } | CaptionError::Transport { model, .. } => (
            StatusCode::BAD_GATEWAY,
            error_body("backend", format!("caption model {} is unavailable", model)),
        ),
    }
}

/// Run one staged swap job
///
/// # Request Format:
/// JSON `SwapJob`: job_id (alias uuid), bucket, source, target, output
///
/// # Response:
/// The published output reference, or a kinded error
async fn swap_images(
    State(state): State<AppState>,
    Json(job): Json<SwapJob>,
) -> Result<Json<SwapResponse>, ErrorResponse> {
    state.metrics.record_endpoint_request("/swap");

    if job.job_id.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            error_body("request", "job_id must not be empty".to_string()),
        ));
    }

    info!("Received swap job {}", job.job_id);

    let artifact = state.pipeline.run(&job).await.map_err(|e| {
        error!("Swap job {} failed: {:?}", job.job_id, e);
        pipeline_error_response(&e)
    })?;

    Ok(Json(SwapResponse {
        job_id: job.job_id,
        bucket: artifact.bucket,
        output: artifact.key,
    }))
}

/// Caption a stored image: fetch it, then walk the candidate models
async fn caption_image(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<CaptionResponse>, ErrorResponse> {
    state.metrics.record_endpoint_request("/caption");

    let key = format!("{}{}.png", state.config.object_path(), job_id);
    info!("Caption request for {}", key);

    let image_png = state
        .store
        .get(state.config.bucket(), &key)
        .await
        .map_err(|e| match e {
            StoreError::NotFound { bucket, key } => (
                StatusCode::NOT_FOUND,
                error_body("staging", format!("image not found: {}/{}", bucket, key)),
            ),
            StoreError::AccessDenied { bucket, key } => (
                StatusCode::FORBIDDEN,
                error_body("staging", format!("access denied to {}/{}", bucket, key)),
            ),
            StoreError::Transport(_) => (
                StatusCode::BAD_GATEWAY,
                error_body("staging", "object store unavailable".to_string()),
            ),
        })?;

    let outcome = state.captioner.caption(image_png).await.map_err(|e| {
        error!("Caption for {} failed: {:?}", job_id, e);
        caption_error_response(&e)
    })?;

    Ok(Json(CaptionResponse {
        job_id,
        key,
        story: outcome.story,
        model: outcome.model,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use gallery_workflow::core::errors::BackendError;

    #[test]
    fn test_staging_not_found_maps_to_404() {
        let e = PipelineError::Staging {
            job_id: "j".to_string(),
            source: StagingError::Fetch(StoreError::NotFound {
                bucket: "b".to_string(),
                key: "k".to_string(),
            }),
        };
        let (status, _) = pipeline_error_response(&e);
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_each_stage_maps_to_a_distinct_status() {
        let staging = PipelineError::Staging {
            job_id: "j".to_string(),
            source: StagingError::Fetch(StoreError::Transport("x".to_string())),
        };
        let transform = PipelineError::Transform {
            job_id: "j".to_string(),
            source: gallery_workflow::core::errors::TransformError::Model("x".to_string()),
        };
        let publish = PipelineError::Publish {
            job_id: "j".to_string(),
            source: gallery_workflow::core::errors::PublishError::Upload(StoreError::Transport(
                "x".to_string(),
            )),
        };

        assert_eq!(pipeline_error_response(&staging).0, StatusCode::BAD_GATEWAY);
        assert_eq!(
            pipeline_error_response(&transform).0,
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(pipeline_error_response(&publish).0, StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_error_bodies_do_not_leak_workspace_paths() {
        let e = PipelineError::Staging {
            job_id: "j".to_string(),
            source: StagingError::Write {
                path: std::path::PathBuf::from("/opt/workspace/source/j.png"),
                source: std::io::Error::other("disk full"),
            },
        };
        let (_, Json(body)) = pipeline_error_response(&e);
        assert!(!body["error"].as_str().unwrap().contains("/opt/workspace"));
    }

    #[test]
    fn test_exhaustion_is_distinguishable_from_misconfiguration() {
        let exhausted = caption_error_response(&CaptionError::Exhausted { candidates: 3 });
        let misconfigured = caption_error_response(&CaptionError::NoCandidates);
        let malformed = caption_error_response(&CaptionError::MalformedResponse {
            model: "m".to_string(),
            reason: "r".to_string(),
        });
        let transport = caption_error_response(&CaptionError::Transport {
            model: "m".to_string(),
            source: BackendError("reset".to_string()),
        });

        assert_eq!(exhausted.0, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(misconfigured.0, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(malformed.0, StatusCode::BAD_GATEWAY);
        assert_eq!(transport.0, StatusCode::BAD_GATEWAY);
        assert_ne!(exhausted.1 .0["kind"], misconfigured.1 .0["kind"]);
        assert_ne!(malformed.1 .0["kind"], exhausted.1 .0["kind"]);
    }
}
