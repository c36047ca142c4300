// Job-scoped working areas
//
// Every job gets three slots (source, target, output) under the
// workspace root, all namespaced by job id. Allocation and release are
// a pair: `release` consumes the area, so a job cannot keep using
// paths it has already reclaimed.

use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

use crate::core::errors::StagingError;

/// Root of all working areas. Cheap to clone; owns no open resources.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Allocate the working area for one job. Creates the slot
    /// directories; the slot files themselves are written by staging.
    pub async fn allocate(&self, job_id: &str) -> Result<WorkArea, StagingError> {
        let mut slots = [PathBuf::new(), PathBuf::new(), PathBuf::new()];
        for (slot, dir) in slots.iter_mut().zip(["source", "target", "output"]) {
            let parent = self.root.join(dir);
            fs::create_dir_all(&parent)
                .await
                .map_err(|source| StagingError::Workspace {
                    path: parent.clone(),
                    source,
                })?;
            *slot = parent.join(format!("{job_id}.png"));
        }
        let [source, target, output] = slots;

        debug!("Allocated working area for job {}", job_id);
        Ok(WorkArea {
            job_id: job_id.to_string(),
            source,
            target,
            output,
        })
    }
}

/// One job's transient storage. Exclusively owned by the pipeline
/// invocation executing the job; destroyed exactly once via `release`.
#[derive(Debug)]
pub struct WorkArea {
    job_id: String,
    source: PathBuf,
    target: PathBuf,
    output: PathBuf,
}

impl WorkArea {
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn source_path(&self) -> &Path {
        &self.source
    }

    pub fn target_path(&self) -> &Path {
        &self.target
    }

    pub fn output_path(&self) -> &Path {
        &self.output
    }

    /// Remove every slot file. Runs on every exit path of the
    /// pipeline; failures are logged and swallowed so they can never
    /// mask the job outcome. Missing files are normal (a failed stage
    /// leaves later slots unwritten).
    pub async fn release(self) {
        for slot in [&self.source, &self.target, &self.output] {
            match fs::remove_file(slot).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(
                        "Failed to remove {} while releasing job {}: {}",
                        slot.display(),
                        self.job_id,
                        e
                    );
                }
            }
        }
        debug!("Released working area for job {}", self.job_id);
    }
}
