pub mod artifact;
pub mod config;
pub mod message;
pub mod roster;
pub mod run_state;
pub mod search;

pub use artifact::{Artifact, ArtifactKind};
pub use config::{
    ModelBackend, ModelConfig, PipelineConfig, SearchConfig, SearchProviderKind, StoreBackend,
    StoreConfig, StrataConfig,
};
pub use message::{ChatMessage, Role};
pub use roster::{clean_group_name, ExpertSpec, GroupId, GroupSpec, Roster};
pub use run_state::{RunOutput, RunState, StatePatch};
pub use search::{search_key, SearchEntry, SearchRecord};
