// Staged swap pipeline: stage -> transform -> publish, with the
// working area reclaimed on every exit path.

use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument};

use crate::core::errors::{
    PipelineError, PipelineResult, PublishError, StagingError,
};
use crate::core::types::{ArtifactRef, SwapJob};
use crate::pipeline::workspace::{WorkArea, Workspace};
use crate::services::store::ContentStore;
use crate::services::transform::SwapTransform;
use crate::utils::Metrics;

/// Orchestrates one swap job end to end. Request-scoped: concurrent
/// `run` calls share nothing but the injected collaborators, so no
/// cross-request locking is needed as long as job ids are unique.
pub struct SwapPipeline {
    store: Arc<dyn ContentStore>,
    transform: Arc<dyn SwapTransform>,
    workspace: Workspace,
    metrics: Option<Metrics>,
}

impl SwapPipeline {
    pub fn new(
        store: Arc<dyn ContentStore>,
        transform: Arc<dyn SwapTransform>,
        workspace: Workspace,
        metrics: Option<Metrics>,
    ) -> Self {
        Self {
            store,
            transform,
            workspace,
            metrics,
        }
    }

    /// Run the pipeline for one job and return the published artifact
    /// reference. Whatever happens in between, the job's working area
    /// is released exactly once before this returns.
    #[instrument(skip(self, job), fields(job_id = %job.job_id))]
    pub async fn run(&self, job: &SwapJob) -> PipelineResult<ArtifactRef> {
        let start = Instant::now();

        let area = self
            .workspace
            .allocate(&job.job_id)
            .await
            .map_err(|source| PipelineError::Staging {
                job_id: job.job_id.clone(),
                source,
            })?;

        let result = self.execute(job, &area).await;
        area.release().await;

        if let Some(ref m) = self.metrics {
            m.record_swap_job(result.is_ok(), start.elapsed());
        }

        match &result {
            Ok(artifact) => info!(
                "Job {} published {}/{} in {:.2}s",
                job.job_id,
                artifact.bucket,
                artifact.key,
                start.elapsed().as_secs_f64()
            ),
            Err(e) => info!("Job {} failed: {}", job.job_id, e),
        }

        result
    }

    async fn execute(&self, job: &SwapJob, area: &WorkArea) -> PipelineResult<ArtifactRef> {
        let stage_start = Instant::now();
        self.stage(job, area)
            .await
            .map_err(|source| PipelineError::Staging {
                job_id: job.job_id.clone(),
                source,
            })?;
        if let Some(ref m) = self.metrics {
            m.record_staging_duration(stage_start.elapsed());
        }

        let transform_start = Instant::now();
        self.transform
            .apply(area.source_path(), area.target_path(), area.output_path())
            .await
            .map_err(|source| PipelineError::Transform {
                job_id: job.job_id.clone(),
                source,
            })?;
        if let Some(ref m) = self.metrics {
            m.record_transform_duration(transform_start.elapsed());
        }

        let publish_start = Instant::now();
        self.publish(job, area)
            .await
            .map_err(|source| PipelineError::Publish {
                job_id: job.job_id.clone(),
                source,
            })?;
        if let Some(ref m) = self.metrics {
            m.record_publish_duration(publish_start.elapsed());
        }

        Ok(ArtifactRef {
            bucket: job.bucket.clone(),
            key: job.output.clone(),
        })
    }

    /// Fetch both inputs into their slots. Each fetched object must
    /// decode as an image before it is accepted into the working area.
    async fn stage(&self, job: &SwapJob, area: &WorkArea) -> Result<(), StagingError> {
        for (key, slot) in [
            (&job.source, area.source_path()),
            (&job.target, area.target_path()),
        ] {
            let bytes = self.store.get(&job.bucket, key).await?;
            image::load_from_memory(&bytes)?;

            tokio::fs::write(slot, &bytes)
                .await
                .map_err(|source| StagingError::Write {
                    path: slot.to_path_buf(),
                    source,
                })?;
            debug!("Staged {}/{} ({} bytes)", job.bucket, key, bytes.len());
        }
        Ok(())
    }

    /// Upload the produced artifact. On failure the artifact stays in
    /// the area for the release step to reclaim.
    async fn publish(&self, job: &SwapJob, area: &WorkArea) -> Result<(), PublishError> {
        let bytes = tokio::fs::read(area.output_path()).await.map_err(|source| {
            PublishError::ReadArtifact {
                path: area.output_path().to_path_buf(),
                source,
            }
        })?;

        self.store.put(&job.bucket, &job.output, bytes).await?;
        debug!("Published {}/{}", job.bucket, job.output);
        Ok(())
    }
}
