use std::fs;
use std::path::{Path, PathBuf};

use strata_models::{Artifact, ArtifactKind};
use tracing::debug;

use crate::error::StoreError;
use crate::store::ArtifactStore;

const EXPERT_DIR: &str = "expert_responses";
const GROUP_DIR: &str = "group_responses";
const FINAL_FILE: &str = "final_investment_strategy.txt";

/// Plain-text artifact store laid out as one file per artifact:
///
/// ```text
/// <root>/expert_responses/<expert>.txt
/// <root>/group_responses/<clean group name>.txt
/// <root>/final_investment_strategy.txt
/// ```
///
/// Files are overwritten by later runs.
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Create the directory layout under `root`.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join(EXPERT_DIR))?;
        fs::create_dir_all(root.join(GROUP_DIR))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where an artifact of the given kind and name is written.
    pub fn path_for(&self, kind: ArtifactKind, name: &str) -> PathBuf {
        match kind {
            ArtifactKind::ExpertAnalysis => self.root.join(EXPERT_DIR).join(format!("{name}.txt")),
            ArtifactKind::GroupSummary => self.root.join(GROUP_DIR).join(format!("{name}.txt")),
            ArtifactKind::FinalReport => self.root.join(FINAL_FILE),
        }
    }
}

impl ArtifactStore for FileStore {
    fn name(&self) -> &str {
        "files"
    }

    fn persist(&self, artifact: &Artifact) -> Result<(), StoreError> {
        let path = self.path_for(artifact.kind, &artifact.name);
        fs::write(&path, artifact.render())?;
        debug!(kind = %artifact.kind, path = %path.display(), "Wrote artifact");
        Ok(())
    }
}
