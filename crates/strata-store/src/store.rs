use strata_models::Artifact;

use crate::error::StoreError;

/// Write-only audit trail for run artifacts.
///
/// Nothing is read back during a run; callers treat a failed write as
/// best-effort and keep going.
pub trait ArtifactStore: Send + Sync {
    fn name(&self) -> &str;

    fn persist(&self, artifact: &Artifact) -> Result<(), StoreError>;
}

/// Store that discards every artifact.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullStore;

impl ArtifactStore for NullStore {
    fn name(&self) -> &str {
        "none"
    }

    fn persist(&self, _artifact: &Artifact) -> Result<(), StoreError> {
        Ok(())
    }
}
